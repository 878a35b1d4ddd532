//! Review request messages: one system message with the output contract,
//! an optional context message, and one user message per file.

use serde::{Deserialize, Serialize};

use super::PromptBuilder;
use crate::ai::provider::ChatMessage;
use crate::types::{Category, OverallStatus, ReviewFile, Severity};

/// Caller-supplied description of the change under review
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContext {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Extra reviewer instructions appended verbatim
    #[serde(default)]
    pub instructions: Vec<String>,
}

impl PromptContext {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.instructions.is_empty()
    }
}

pub struct ReviewPrompt;

impl ReviewPrompt {
    /// System instructions including the JSON output contract
    pub fn system_message() -> String {
        let schema = format!(
            r#"{{
  "summary": {{ "overallStatus": "{statuses}" }},
  "issues": [
    {{
      "file": "path/as/given",
      "line": 0,
      "severity": "{severities}",
      "category": "{categories}",
      "title": "short title",
      "description": "what is wrong",
      "recommendation": "how to fix (optional)",
      "codeSnippet": "offending code (optional)"
    }}
  ],
  "recommendations": {{ "immediate": [], "longTerm": [] }}
}}"#,
            statuses = [
                OverallStatus::Pass,
                OverallStatus::Fail,
                OverallStatus::Warning
            ]
            .map(|s| s.as_str())
            .join("|"),
            severities = Severity::ALL.join("|"),
            categories = Category::ALL.join("|"),
        );

        PromptBuilder::new()
            .role("code reviewer", "security, correctness and maintainability")
            .objectives(vec![
                "Review every submitted file for defects a maintainer would block on",
                "Report each finding with file, line, severity and category",
                "Give concrete, minimal fixes",
                "Set overallStatus to FAIL for any HIGH severity issue",
            ])
            .focus(
                "the submitted files",
                vec![
                    "Do NOT report issues in code you cannot see",
                    "Files ending with a truncation marker are partial; do not flag the cut",
                    "Keep line numbers relative to the file as given",
                ],
            )
            .section("Output", "Respond ONLY with one JSON object of this shape:")
            .code("json", &schema)
            .build()
    }

    /// Leading user message describing the change, if any
    pub fn context_message(context: &PromptContext) -> Option<String> {
        if context.is_empty() {
            return None;
        }

        let mut builder = PromptBuilder::new();
        if let Some(title) = &context.title {
            builder = builder.context_item("Title", title);
        }
        if let Some(description) = &context.description {
            builder = builder.section("Description", description);
        }
        for instruction in &context.instructions {
            builder = builder.text(instruction);
        }
        Some(builder.build())
    }

    /// `File: <path>` header followed by the verbatim content
    pub fn file_message(file: &ReviewFile) -> String {
        format!("File: {}\n\n{}", file.path, file.text())
    }

    /// All messages for one review request, files in the given order
    pub fn messages(files: &[ReviewFile], context: &PromptContext) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(files.len() + 2);
        messages.push(ChatMessage::system(Self::system_message()));
        if let Some(ctx) = Self::context_message(context) {
            messages.push(ChatMessage::user(ctx));
        }
        messages.extend(files.iter().map(|f| ChatMessage::user(Self::file_message(f))));
        messages
    }
}
