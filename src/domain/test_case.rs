use crate::domain::recommendation::Recommendation;
use crate::shared::{generate_id, now_millis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Accuracy at or above this value counts as a pass.
pub const PASS_THRESHOLD: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Complete,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    pub fn from_accuracy(accuracy: u8) -> Self {
        if accuracy >= PASS_THRESHOLD {
            TestStatus::Passed
        } else {
            TestStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Up,
    Down,
}

impl Feedback {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feedback::Up => "up",
            Feedback::Down => "down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiResponse {
    /// Markdown content produced by the agent.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMetrics {
    /// 0-100
    pub accuracy: u8,
    /// Seconds, one decimal.
    pub latency: f64,
    pub status: TestStatus,
}

impl TestMetrics {
    pub fn new(accuracy: u8, latency: f64) -> Self {
        let accuracy = accuracy.min(100);
        Self {
            accuracy,
            latency: latency.max(0.0),
            status: TestStatus::from_accuracy(accuracy),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Value stored under a custom column's field key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomValue {
    Text(String),
    List(Vec<String>),
}

impl CustomValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CustomValue::Text(text) => text.is_empty(),
            CustomValue::List(items) => items.is_empty(),
        }
    }

    pub fn to_text(&self) -> String {
        match self {
            CustomValue::Text(text) => text.clone(),
            CustomValue::List(items) => items.join(","),
        }
    }
}

pub type CustomData = BTreeMap<String, CustomValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseRow {
    pub id: String,
    pub question: String,
    pub expected_answer: String,
    pub leading_questions: String,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_response: Option<AiResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TestMetrics>,
    #[serde(default)]
    pub run_status: RunStatus,
    #[serde(default)]
    pub custom_data: CustomData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TestCaseRow {
    pub fn new(input: NewTestCase) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            question: input.question,
            expected_answer: input.expected_answer,
            leading_questions: input.leading_questions,
            notes: input.notes,
            ai_response: None,
            metrics: None,
            run_status: RunStatus::Idle,
            custom_data: input.custom_data,
            recommendations: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Copy with a fresh identity and no run results. Custom data is kept.
    pub fn clone_for_duplication(&self) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            question: self.question.clone(),
            expected_answer: self.expected_answer.clone(),
            leading_questions: self.leading_questions.clone(),
            notes: self.notes.clone(),
            ai_response: None,
            metrics: None,
            run_status: RunStatus::Idle,
            custom_data: self.custom_data.clone(),
            recommendations: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_patch(&mut self, patch: TestCasePatch) {
        if let Some(question) = patch.question {
            self.question = question;
        }
        if let Some(expected_answer) = patch.expected_answer {
            self.expected_answer = expected_answer;
        }
        if let Some(leading_questions) = patch.leading_questions {
            self.leading_questions = leading_questions;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        for (field, value) in patch.custom_data {
            match value {
                Some(value) => {
                    self.custom_data.insert(field, value);
                }
                None => {
                    self.custom_data.remove(&field);
                }
            }
        }
        self.touch();
    }

    pub fn clear_results(&mut self) {
        self.ai_response = None;
        self.metrics = None;
        self.recommendations = None;
        self.run_status = RunStatus::Idle;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    pub fn is_running(&self) -> bool {
        self.run_status == RunStatus::Running
    }
}

/// Input for a new row; anything left out defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTestCase {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub expected_answer: String,
    #[serde(default)]
    pub leading_questions: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub custom_data: CustomData,
}

/// Cell edits. A `null` custom value removes the key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCasePatch {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub expected_answer: Option<String>,
    #[serde(default)]
    pub leading_questions: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub custom_data: BTreeMap<String, Option<CustomValue>>,
}
