mod output;

pub use output::{Output, severity_label, status_label};
