//! Config Command
//!
//! Inspect reviewloom configuration.
//!
//! Usage:
//!   reviewloom config show [-f toml|json]
//!   reviewloom config path

use std::path::Path;

use crate::config::ConfigLoader;
use crate::types::Result;

/// Print the effective configuration (merged from all sources)
pub fn show(config_path: Option<&Path>, format: &str) -> Result<()> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_with_project(path)?,
        None => ConfigLoader::load()?,
    };
    println!("{}", ConfigLoader::render(&config, format == "json")?);
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}
