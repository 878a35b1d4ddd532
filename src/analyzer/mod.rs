//! Code Analyzer Module
//!
//! File discovery for review input:
//! - Gitignore-aware directory walking
//! - Glob exclusion and size capping
//! - Binary detection and lossy UTF-8 loading

pub mod scanner;

pub use scanner::FileScanner;
