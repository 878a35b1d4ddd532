//! Response Validation
//!
//! Two phases:
//! 1. Best-effort extraction of the first JSON object from the completion text
//! 2. Strict schema validation of that object
//!
//! Validation short-circuits on the first violation. Every failure becomes a
//! `ReviewResult` with `ERROR` status; `parse` never fails.

use serde_json::{Map, Value};
use tracing::debug;

use super::extract::extract_first_json_object;
use crate::types::{Category, OverallStatus, ReviewResult, Severity};

const NO_JSON: &str = "No JSON found in response";
const MODEL_REPORTED_ERROR: &str = "model reported ERROR status";

const REQUIRED_FIELDS: [&str; 3] = ["summary", "issues", "recommendations"];

pub struct ResponseValidator;

impl ResponseValidator {
    /// Parse raw completion text into a review result
    pub fn parse(raw: &str) -> ReviewResult {
        match Self::try_parse(raw) {
            Ok(result) => result,
            Err(message) => {
                debug!(error = %message, response_len = raw.len(), "Response rejected");
                ReviewResult::error(message)
            }
        }
    }

    fn try_parse(raw: &str) -> Result<ReviewResult, String> {
        let span = extract_first_json_object(raw).ok_or_else(|| NO_JSON.to_string())?;
        let value: Value =
            serde_json::from_str(span).map_err(|e| format!("Invalid JSON: {}", e))?;

        Self::validate(&value)?;

        let mut result: ReviewResult =
            serde_json::from_value(value).map_err(|e| format!("Schema mismatch: {}", e))?;

        if result.is_error() {
            result
                .parse_error
                .get_or_insert_with(|| MODEL_REPORTED_ERROR.to_string());
        } else {
            result.parse_error = None;
        }
        Ok(result)
    }

    /// First schema violation, if any
    pub fn validate(value: &Value) -> Result<(), String> {
        let root = value
            .as_object()
            .ok_or_else(|| "Response JSON must be an object".to_string())?;

        for field in REQUIRED_FIELDS {
            if !root.contains_key(field) {
                return Err(format!("Missing required field '{}'", field));
            }
        }

        Self::validate_summary(&root["summary"])?;

        let issues = root["issues"]
            .as_array()
            .ok_or_else(|| "'issues' must be an array".to_string())?;
        for (idx, issue) in issues.iter().enumerate() {
            Self::validate_issue(issue, idx)?;
        }

        if !root["recommendations"].is_object() {
            return Err("'recommendations' must be an object".to_string());
        }

        Ok(())
    }

    fn validate_summary(summary: &Value) -> Result<(), String> {
        let summary = summary
            .as_object()
            .ok_or_else(|| "'summary' must be an object".to_string())?;
        match summary.get("overallStatus") {
            None => Err("Missing required field 'summary.overallStatus'".to_string()),
            Some(status) => check_enum(status, &OverallStatus::ALL, "summary.overallStatus"),
        }
    }

    fn validate_issue(issue: &Value, idx: usize) -> Result<(), String> {
        let issue: &Map<String, Value> = issue
            .as_object()
            .ok_or_else(|| format!("issues[{}] must be an object", idx))?;

        for (field, allowed) in [("severity", &Severity::ALL[..]), ("category", &Category::ALL[..])] {
            let location = format!("issues[{}].{}", idx, field);
            match issue.get(field) {
                None => return Err(format!("Missing required field '{}'", location)),
                Some(v) => check_enum(v, allowed, &location)?,
            }
        }
        Ok(())
    }
}

fn check_enum(value: &Value, allowed: &[&str], location: &str) -> Result<(), String> {
    match value.as_str() {
        Some(s) if allowed.contains(&s) => Ok(()),
        _ => Err(format!(
            "Invalid {}: {} (expected one of {})",
            location,
            value,
            allowed.join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenUsage;
    use proptest::prelude::*;
    use serde_json::json;

    fn valid_response() -> Value {
        json!({
            "summary": {"overallStatus": "FAIL", "overview": "One injection risk"},
            "issues": [
                {
                    "file": "src/db.rs",
                    "line": 42,
                    "severity": "HIGH",
                    "category": "SECURITY",
                    "title": "SQL injection",
                    "description": "User input is concatenated into SQL",
                    "recommendation": "Use bound parameters",
                    "codeSnippet": "format!(\"SELECT * FROM t WHERE id = {}\", id)",
                    "cwe": "CWE-89"
                },
                {
                    "file": "src/util.rs",
                    "line": 0,
                    "severity": "LOW",
                    "category": "STANDARDS",
                    "title": "Unused import",
                    "description": ""
                }
            ],
            "recommendations": {"immediate": ["Fix SQL injection"], "longTerm": []},
            "confidence": 0.8
        })
    }

    #[test]
    fn test_round_trip_preserves_fields_and_order() {
        let original = valid_response();
        let raw = format!("Review below.\n```json\n{}\n```", original);

        let result = ResponseValidator::parse(&raw);
        assert!(!result.is_error());
        assert_eq!(result.parse_error, None);
        assert_eq!(result.issues[0].title, "SQL injection");
        assert_eq!(result.issues[1].title, "Unused import");

        let mut back = serde_json::to_value(&result).unwrap();
        let usage = back.as_object_mut().unwrap().remove("usage").unwrap();
        assert_eq!(
            serde_json::from_value::<TokenUsage>(usage).unwrap(),
            TokenUsage::default()
        );
        assert_eq!(back, original);
    }

    #[test]
    fn test_no_json() {
        let result = ResponseValidator::parse("I could not review these files.");
        assert!(result.is_error());
        assert_eq!(result.parse_error.as_deref(), Some(NO_JSON));
    }

    #[test]
    fn test_invalid_json_reports_parser_message() {
        let result = ResponseValidator::parse(r#"{"summary": nope}"#);
        assert!(result.is_error());
        assert!(result.parse_error.unwrap().starts_with("Invalid JSON"));
    }

    #[test]
    fn test_missing_required_field() {
        let mut value = valid_response();
        value.as_object_mut().unwrap().remove("recommendations");
        let result = ResponseValidator::parse(&value.to_string());
        assert_eq!(
            result.parse_error.as_deref(),
            Some("Missing required field 'recommendations'")
        );
    }

    #[test]
    fn test_invalid_overall_status() {
        let mut value = valid_response();
        value["summary"]["overallStatus"] = json!("pass");
        let result = ResponseValidator::parse(&value.to_string());
        assert!(result.is_error());
        assert!(
            result
                .parse_error
                .unwrap()
                .contains("summary.overallStatus")
        );
    }

    #[test]
    fn test_first_violation_wins() {
        let mut value = valid_response();
        value["issues"][0]["category"] = json!("STYLE");
        value["issues"][1]["severity"] = json!("CRITICAL");
        let result = ResponseValidator::parse(&value.to_string());
        let message = result.parse_error.unwrap();
        assert!(message.contains("issues[0].category"));
        assert!(message.contains("STYLE"));
    }

    #[test]
    fn test_issues_must_be_array() {
        let mut value = valid_response();
        value["issues"] = json!({"file": "a.rs"});
        let result = ResponseValidator::parse(&value.to_string());
        assert_eq!(
            result.parse_error.as_deref(),
            Some("'issues' must be an array")
        );
    }

    #[test]
    fn test_model_reported_error_status() {
        let mut value = valid_response();
        value["summary"]["overallStatus"] = json!("ERROR");
        let result = ResponseValidator::parse(&value.to_string());
        assert!(result.is_error());
        assert_eq!(result.parse_error.as_deref(), Some(MODEL_REPORTED_ERROR));
    }

    #[test]
    fn test_stray_parse_error_cleared_on_success() {
        let mut value = valid_response();
        value["parseError"] = json!("ignore me");
        let result = ResponseValidator::parse(&value.to_string());
        assert!(!result.is_error());
        assert_eq!(result.parse_error, None);
    }

    #[test]
    fn test_loose_issue_fields_pass_like_validate() {
        let mut value = valid_response();
        value["issues"][0]["line"] = json!(null);
        value["issues"][0]["title"] = json!(null);
        value["issues"][1]["line"] = json!("42");
        value["issues"][1]["file"] = json!(null);
        assert!(ResponseValidator::validate(&value).is_ok());

        let result = ResponseValidator::parse(&value.to_string());
        assert!(!result.is_error(), "{:?}", result.parse_error);
        assert_eq!(result.issues[0].line, 0);
        assert_eq!(result.issues[0].title, "");
        assert_eq!(result.issues[1].line, 42);
        assert_eq!(result.issues[1].file, "");
    }

    fn loose_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            any::<f64>().prop_filter("finite", |f| f.is_finite()).prop_map(Value::from),
            ".{0,12}".prop_map(Value::from),
            Just(json!([1, "a"])),
            Just(json!({"k": "v"})),
        ]
    }

    proptest! {
        #[test]
        fn prop_validated_object_parses(
            file in loose_value(),
            line in loose_value(),
            title in loose_value(),
            recommendation in loose_value(),
            immediate in loose_value(),
        ) {
            let mut value = valid_response();
            value["issues"][0]["file"] = file;
            value["issues"][0]["line"] = line;
            value["issues"][0]["title"] = title;
            value["issues"][0]["recommendation"] = recommendation;
            value["recommendations"]["immediate"] = immediate;
            prop_assert!(ResponseValidator::validate(&value).is_ok());

            let result = ResponseValidator::parse(&value.to_string());
            prop_assert!(!result.is_error(), "{:?}", result.parse_error);
            prop_assert_eq!(result.issues.len(), 2);
        }

        #[test]
        fn prop_parse_is_total(raw in any::<String>()) {
            let result = ResponseValidator::parse(&raw);
            prop_assert_eq!(result.is_error(), result.parse_error.is_some());
        }

        #[test]
        fn prop_parse_is_total_on_brace_soup(raw in r#"[{}\[\]":,a-z0-9 \\]{0,64}"#) {
            let result = ResponseValidator::parse(&raw);
            prop_assert_eq!(result.is_error(), result.parse_error.is_some());
        }
    }
}
