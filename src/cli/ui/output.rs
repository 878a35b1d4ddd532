use console::{StyledObject, style};

use crate::types::{OverallStatus, Severity};

/// Terminal output helpers for human-readable reports
pub struct Output {
    quiet: bool,
}

impl Output {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✓").green(), message);
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new(false)
    }
}

pub fn status_label(status: OverallStatus) -> StyledObject<&'static str> {
    let label = style(status.as_str()).bold();
    match status {
        OverallStatus::Pass => label.green(),
        OverallStatus::Warning => label.yellow(),
        OverallStatus::Fail | OverallStatus::Error => label.red(),
    }
}

pub fn severity_label(severity: Severity) -> StyledObject<&'static str> {
    let label = style(severity.as_str());
    match severity {
        Severity::High => label.red().bold(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.dim(),
    }
}
