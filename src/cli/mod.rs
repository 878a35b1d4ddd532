//! Command-line interface for the `reviewloom` binary

pub mod commands;
pub mod ui;

pub use commands::review::{OutputFormat, PIPELINE_ERROR_EXIT, ReviewOptions, exit_code};
