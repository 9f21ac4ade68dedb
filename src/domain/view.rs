//! Filter and sort configuration for the test-case grid.
//!
//! Field paths arrive from the UI as dot-notation strings (`metrics.accuracy`,
//! `customData.custom_1a2b3c4d`). They are parsed once into a [`FieldRef`] so
//! evaluation is a `match`, not a string walk. Unknown paths are kept as
//! [`FieldRef::Unknown`] and always resolve to nothing.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldRef {
    Id,
    Question,
    ExpectedAnswer,
    LeadingQuestions,
    Notes,
    RunStatus,
    ResponseContent,
    ResponseFeedback,
    ResponseGeneratedAt,
    Accuracy,
    Latency,
    Status,
    CreatedAt,
    UpdatedAt,
    /// Custom column, addressed by its `customData` field key.
    Custom(String),
    Unknown(String),
}

impl FieldRef {
    pub fn from_path(path: &str) -> Self {
        let parts: Vec<&str> = path.split('.').collect();
        match parts.as_slice() {
            ["id"] => FieldRef::Id,
            ["question"] => FieldRef::Question,
            ["expectedAnswer"] => FieldRef::ExpectedAnswer,
            ["leadingQuestions"] => FieldRef::LeadingQuestions,
            ["notes"] => FieldRef::Notes,
            ["runStatus"] => FieldRef::RunStatus,
            ["aiResponse", "content"] => FieldRef::ResponseContent,
            ["aiResponse", "feedback"] => FieldRef::ResponseFeedback,
            ["aiResponse", "generatedAt"] => FieldRef::ResponseGeneratedAt,
            ["metrics", "accuracy"] => FieldRef::Accuracy,
            ["metrics", "latency"] => FieldRef::Latency,
            ["metrics", "status"] => FieldRef::Status,
            ["createdAt"] => FieldRef::CreatedAt,
            ["updatedAt"] => FieldRef::UpdatedAt,
            ["customData", key] if !key.is_empty() => FieldRef::Custom((*key).to_string()),
            _ => FieldRef::Unknown(path.to_string()),
        }
    }

    pub fn to_path(&self) -> String {
        match self {
            FieldRef::Id => "id".to_string(),
            FieldRef::Question => "question".to_string(),
            FieldRef::ExpectedAnswer => "expectedAnswer".to_string(),
            FieldRef::LeadingQuestions => "leadingQuestions".to_string(),
            FieldRef::Notes => "notes".to_string(),
            FieldRef::RunStatus => "runStatus".to_string(),
            FieldRef::ResponseContent => "aiResponse.content".to_string(),
            FieldRef::ResponseFeedback => "aiResponse.feedback".to_string(),
            FieldRef::ResponseGeneratedAt => "aiResponse.generatedAt".to_string(),
            FieldRef::Accuracy => "metrics.accuracy".to_string(),
            FieldRef::Latency => "metrics.latency".to_string(),
            FieldRef::Status => "metrics.status".to_string(),
            FieldRef::CreatedAt => "createdAt".to_string(),
            FieldRef::UpdatedAt => "updatedAt".to_string(),
            FieldRef::Custom(key) => format!("customData.{}", key),
            FieldRef::Unknown(path) => path.clone(),
        }
    }
}

impl From<String> for FieldRef {
    fn from(path: String) -> Self {
        FieldRef::from_path(&path)
    }
}

impl From<&str> for FieldRef {
    fn from(path: &str) -> Self {
        FieldRef::from_path(path)
    }
}

impl From<FieldRef> for String {
    fn from(field: FieldRef) -> Self {
        field.to_path()
    }
}

/// A resolved cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
}

impl FieldValue {
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Text(text) => text.clone(),
            FieldValue::Number(number) => format_number(*number),
            FieldValue::List(items) => items.join(","),
        }
    }

    /// Numeric coercion; `None` plays the role of NaN.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(number) if number.is_finite() => Some(*number),
            FieldValue::Number(_) => None,
            FieldValue::Text(text) => parse_number(text),
            FieldValue::List(items) if items.len() == 1 => parse_number(&items[0]),
            FieldValue::List(_) => None,
        }
    }
}

/// Renders integral values without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    IsEmpty,
    IsNotEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FilterValue {
    pub fn to_text(&self) -> String {
        match self {
            FilterValue::Bool(value) => value.to_string(),
            FilterValue::Number(value) => format_number(*value),
            FilterValue::Text(value) => value.clone(),
        }
    }

    pub fn to_number(&self) -> Option<f64> {
        match self {
            FilterValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            FilterValue::Number(value) if value.is_finite() => Some(*value),
            FilterValue::Number(_) => None,
            FilterValue::Text(value) => parse_number(value),
        }
    }
}

impl Default for FilterValue {
    fn default() -> Self {
        FilterValue::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    pub field: FieldRef,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: FilterValue,
}

impl FilterConfig {
    pub fn new(field: impl Into<FieldRef>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortConfig {
    pub field: FieldRef,
    pub direction: SortDirection,
}

/// Search, filters and sort for the grid. Ephemeral; never stored on rows or
/// worksheets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    #[serde(default)]
    pub sort: Option<SortConfig>,
}
