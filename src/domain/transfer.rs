//! Shapes crossing the import, export and auto-generate boundaries.

use crate::domain::test_case::TestCaseRow;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Row fields a CSV column may be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportField {
    Question,
    ExpectedAnswer,
    LeadingQuestions,
    Notes,
}

/// One source header and the row field it feeds, if any. Entries are kept in
/// source-column order so they line up with each row's cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub header: String,
    #[serde(default)]
    pub target: Option<ImportField>,
}

impl ColumnMapping {
    pub fn new(header: &str, target: Option<ImportField>) -> Self {
        Self {
            header: header.to_string(),
            target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ImportOutcome {
    Imported { rows: Vec<TestCaseRow> },
    Declined { reason: String },
}

impl ImportOutcome {
    pub fn is_imported(&self) -> bool {
        matches!(self, ImportOutcome::Imported { .. })
    }
}

/// One exported row. Field names double as CSV headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "Expected Answer")]
    pub expected_answer: String,
    #[serde(rename = "Leading Questions")]
    pub leading_questions: String,
    #[serde(rename = "AI Response")]
    pub ai_response: String,
    #[serde(rename = "Accuracy")]
    pub accuracy: String,
    #[serde(rename = "Latency")]
    pub latency: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Feedback")]
    pub feedback: String,
    #[serde(rename = "Notes")]
    pub notes: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationSource {
    #[default]
    Knowledge,
    Previous,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AutoGenerateConfig {
    #[validate(range(min = 1, max = 50))]
    pub count: u32,
    #[serde(default)]
    pub based_on: GenerationSource,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}
