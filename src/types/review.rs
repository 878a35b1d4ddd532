//! Review Result Model
//!
//! The validated, schema-conformant outcome of one review. Field names follow the
//! camelCase JSON contract the model is asked to emit, and unknown fields are kept
//! in `extra` maps so a valid response passes through without field loss.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// =============================================================================
// Enumerations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    Pass,
    Fail,
    Warning,
    Error,
}

impl OverallStatus {
    pub const ALL: [&'static str; 4] = ["PASS", "FAIL", "WARNING", "ERROR"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub const ALL: [&'static str; 3] = ["HIGH", "MEDIUM", "LOW"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Security,
    Logic,
    Performance,
    Standards,
    Maintainability,
}

impl Category {
    pub const ALL: [&'static str; 5] = [
        "SECURITY",
        "LOGIC",
        "PERFORMANCE",
        "STANDARDS",
        "MAINTAINABILITY",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "SECURITY",
            Self::Logic => "LOGIC",
            Self::Performance => "PERFORMANCE",
            Self::Standards => "STANDARDS",
            Self::Maintainability => "MAINTAINABILITY",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Result Structures
// =============================================================================

/// One finding reported by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(default, deserialize_with = "lenient::text")]
    pub file: String,
    /// 0 when the model gave no usable line number
    #[serde(default, deserialize_with = "lenient::line")]
    pub line: u32,
    pub severity: Severity,
    pub category: Category,
    #[serde(default, deserialize_with = "lenient::text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub recommendation: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub code_snippet: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub overall_status: OverallStatus,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendations {
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub immediate: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text_list")]
    pub long_term: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Token accounting for one review request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// True when the counts are local estimates rather than provider-reported
    #[serde(default)]
    pub estimated: bool,
}

impl TokenUsage {
    pub fn reported(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            estimated: false,
        }
    }

    pub fn estimated(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            estimated: true,
            ..Self::reported(input_tokens, output_tokens)
        }
    }
}

/// Validated outcome of a review.
///
/// `summary.overall_status == Error` holds exactly when `parse_error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub summary: ReviewSummary,
    pub issues: Vec<Issue>,
    pub recommendations: Recommendations,
    #[serde(default, deserialize_with = "lenient::usage")]
    pub usage: TokenUsage,
    #[serde(
        default,
        deserialize_with = "lenient::optional_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub parse_error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReviewResult {
    /// Deterministic fallback for unusable model output
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            summary: ReviewSummary {
                overall_status: OverallStatus::Error,
                extra: Map::new(),
            },
            issues: Vec::new(),
            recommendations: Recommendations::default(),
            usage: TokenUsage::default(),
            parse_error: Some(message.into()),
            extra: Map::new(),
        }
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.summary.overall_status
    }

    pub fn is_error(&self) -> bool {
        self.summary.overall_status == OverallStatus::Error
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Issues of exactly the given severity, in emission order
    pub fn issues_by_severity(&self, severity: Severity) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

/// Field readers for model-authored values.
///
/// Only the status, severity and category enums are schema-checked; every
/// other field accepts whatever JSON type the model produced.
mod lenient {
    use super::*;

    fn to_text(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }

    pub fn text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(to_text(Value::deserialize(d)?).unwrap_or_default())
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(to_text(Value::deserialize(d)?))
    }

    pub fn line<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        let line = match Value::deserialize(d)? {
            Value::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
            Value::String(s) => s.trim().parse::<u64>().ok(),
            _ => None,
        };
        Ok(line.map_or(0, |l| u32::try_from(l).unwrap_or(u32::MAX)))
    }

    pub fn text_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Array(items) => items.into_iter().filter_map(to_text).collect(),
            other => to_text(other).into_iter().collect(),
        })
    }

    pub fn usage<'de, D: Deserializer<'de>>(d: D) -> Result<TokenUsage, D::Error> {
        Ok(serde_json::from_value(Value::deserialize(d)?).unwrap_or_default())
    }
}
