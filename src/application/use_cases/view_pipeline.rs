//! Filter/sort evaluation and the derived grid view.
//!
//! The view is computed in three steps: free-text search over question,
//! expected answer and notes; every filter ANDed together; then at most one
//! stable sort. Values are compared as lower-cased text except for
//! `greaterThan`/`lessThan`, which coerce both sides to numbers.

use crate::domain::test_case::{CustomValue, TestCaseRow};
use crate::domain::view::{
    FieldRef, FieldValue, FilterConfig, FilterOperator, FilterValue, SortConfig, SortDirection,
    ViewState,
};
use crate::domain::worksheet::Worksheet;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolve a field on a row. A missing link anywhere yields `None`.
pub fn resolve_field(row: &TestCaseRow, field: &FieldRef) -> Option<FieldValue> {
    match field {
        FieldRef::Id => Some(FieldValue::Text(row.id.clone())),
        FieldRef::Question => Some(FieldValue::Text(row.question.clone())),
        FieldRef::ExpectedAnswer => Some(FieldValue::Text(row.expected_answer.clone())),
        FieldRef::LeadingQuestions => Some(FieldValue::Text(row.leading_questions.clone())),
        FieldRef::Notes => Some(FieldValue::Text(row.notes.clone())),
        FieldRef::RunStatus => Some(FieldValue::Text(row.run_status.as_str().to_string())),
        FieldRef::ResponseContent => row
            .ai_response
            .as_ref()
            .map(|response| FieldValue::Text(response.content.clone())),
        FieldRef::ResponseFeedback => row
            .ai_response
            .as_ref()
            .and_then(|response| response.feedback)
            .map(|feedback| FieldValue::Text(feedback.as_str().to_string())),
        FieldRef::ResponseGeneratedAt => row
            .ai_response
            .as_ref()
            .and_then(|response| response.generated_at)
            .map(|ts| FieldValue::Number(ts as f64)),
        FieldRef::Accuracy => row
            .metrics
            .as_ref()
            .map(|metrics| FieldValue::Number(f64::from(metrics.accuracy))),
        FieldRef::Latency => row
            .metrics
            .as_ref()
            .map(|metrics| FieldValue::Number(metrics.latency)),
        FieldRef::Status => row
            .metrics
            .as_ref()
            .map(|metrics| FieldValue::Text(metrics.status.as_str().to_string())),
        FieldRef::CreatedAt => Some(FieldValue::Number(row.created_at as f64)),
        FieldRef::UpdatedAt => Some(FieldValue::Number(row.updated_at as f64)),
        FieldRef::Custom(key) => row.custom_data.get(key).map(|value| match value {
            CustomValue::Text(text) => FieldValue::Text(text.clone()),
            CustomValue::List(items) => FieldValue::List(items.clone()),
        }),
        FieldRef::Unknown(_) => None,
    }
}

fn stringify(value: Option<&FieldValue>) -> String {
    value.map(FieldValue::to_text).unwrap_or_default()
}

pub fn matches(value: Option<&FieldValue>, operator: FilterOperator, compare_to: &FilterValue) -> bool {
    let text = stringify(value).to_lowercase();
    let needle = compare_to.to_text().to_lowercase();

    match operator {
        FilterOperator::Equals => text == needle,
        FilterOperator::NotEquals => text != needle,
        FilterOperator::Contains => text.contains(&needle),
        FilterOperator::NotContains => !text.contains(&needle),
        FilterOperator::StartsWith => text.starts_with(&needle),
        FilterOperator::EndsWith => text.ends_with(&needle),
        FilterOperator::IsEmpty => text.is_empty(),
        FilterOperator::IsNotEmpty => !text.is_empty(),
        FilterOperator::GreaterThan => compare_numbers(value, compare_to, |a, b| a > b),
        FilterOperator::LessThan => compare_numbers(value, compare_to, |a, b| a < b),
    }
}

fn compare_numbers(
    value: Option<&FieldValue>,
    compare_to: &FilterValue,
    cmp: impl Fn(f64, f64) -> bool,
) -> bool {
    match (value.and_then(FieldValue::to_number), compare_to.to_number()) {
        (Some(left), Some(right)) => cmp(left, right),
        _ => false,
    }
}

pub fn row_matches_filter(row: &TestCaseRow, filter: &FilterConfig) -> bool {
    let value = resolve_field(row, &filter.field);
    matches(value.as_ref(), filter.operator, &filter.value)
}

pub fn row_matches_search(row: &TestCaseRow, query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let query = query.to_lowercase();
    row.question.to_lowercase().contains(&query)
        || row.expected_answer.to_lowercase().contains(&query)
        || row.notes.to_lowercase().contains(&query)
}

/// Stable sort on the stringified field value. Numbers are compared as text
/// too, so "9" sorts after "10".
pub fn sort_rows(rows: Vec<TestCaseRow>, sort: &SortConfig) -> Vec<TestCaseRow> {
    let mut keyed: Vec<(String, TestCaseRow)> = rows
        .into_iter()
        .map(|row| (stringify(resolve_field(&row, &sort.field).as_ref()), row))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| match sort.direction {
        SortDirection::Asc => a.cmp(b),
        SortDirection::Desc => b.cmp(a),
    });

    keyed.into_iter().map(|(_, row)| row).collect()
}

pub fn derive_view(rows: &[TestCaseRow], view: &ViewState) -> Vec<TestCaseRow> {
    let filtered: Vec<TestCaseRow> = rows
        .iter()
        .filter(|row| row_matches_search(row, &view.search_query))
        .filter(|row| view.filters.iter().all(|filter| row_matches_filter(row, filter)))
        .cloned()
        .collect();

    match &view.sort {
        Some(sort) => sort_rows(filtered, sort),
        None => filtered,
    }
}

struct CachedView {
    revision: u64,
    view: ViewState,
    rows: Arc<Vec<TestCaseRow>>,
}

/// Per-worksheet memo of the derived view. The same `Arc` comes back until
/// the worksheet's revision or the view state changes.
#[derive(Default)]
pub struct ViewCache {
    entries: HashMap<String, CachedView>,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_derive(&mut self, worksheet: &Worksheet, view: &ViewState) -> Arc<Vec<TestCaseRow>> {
        if let Some(cached) = self.entries.get(&worksheet.id) {
            if cached.revision == worksheet.revision && cached.view == *view {
                return Arc::clone(&cached.rows);
            }
        }

        let rows = Arc::new(derive_view(&worksheet.test_cases, view));
        debug!(
            worksheet_id = %worksheet.id,
            revision = worksheet.revision,
            visible = rows.len(),
            "Derived test case view"
        );
        self.entries.insert(
            worksheet.id.clone(),
            CachedView {
                revision: worksheet.revision,
                view: view.clone(),
                rows: Arc::clone(&rows),
            },
        );
        rows
    }

    pub fn invalidate(&mut self, worksheet_id: &str) {
        self.entries.remove(worksheet_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::{AiResponse, Feedback, NewTestCase, TestMetrics};

    fn row(question: &str) -> TestCaseRow {
        TestCaseRow::new(NewTestCase {
            question: question.to_string(),
            ..Default::default()
        })
    }

    fn with_accuracy(question: &str, accuracy: u8) -> TestCaseRow {
        let mut row = row(question);
        row.metrics = Some(TestMetrics::new(accuracy, 1.0));
        row
    }

    fn text(value: &str) -> FilterValue {
        FilterValue::Text(value.to_string())
    }

    #[test]
    fn test_contains_filter_selects_matching_rows() {
        let rows = vec![row("cancel plan"), row("billing info")];
        let view = ViewState {
            filters: vec![FilterConfig::new("question", FilterOperator::Contains, text("cancel"))],
            ..Default::default()
        };

        let result = derive_view(&rows, &view);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, rows[0].id);
    }

    #[test]
    fn test_text_operators_are_case_insensitive() {
        let value = FieldValue::Text("Reset Password".to_string());
        assert!(matches(Some(&value), FilterOperator::Equals, &text("reset password")));
        assert!(matches(Some(&value), FilterOperator::StartsWith, &text("RESET")));
        assert!(matches(Some(&value), FilterOperator::EndsWith, &text("word")));
        assert!(matches(Some(&value), FilterOperator::NotContains, &text("refund")));
        assert!(!matches(Some(&value), FilterOperator::NotEquals, &text("RESET PASSWORD")));
    }

    #[test]
    fn test_empty_checks_ignore_compare_value() {
        let empty = FieldValue::Text(String::new());
        assert!(matches(Some(&empty), FilterOperator::IsEmpty, &text("anything")));
        assert!(matches(None, FilterOperator::IsEmpty, &text("")));
        assert!(!matches(None, FilterOperator::IsNotEmpty, &text("x")));
        let list = FieldValue::List(vec!["a".to_string()]);
        assert!(matches(Some(&list), FilterOperator::IsNotEmpty, &text("")));
    }

    #[test]
    fn test_numeric_comparisons_reject_non_numbers() {
        let accuracy = FieldValue::Number(85.0);
        assert!(matches(Some(&accuracy), FilterOperator::GreaterThan, &FilterValue::Number(80.0)));
        assert!(matches(Some(&accuracy), FilterOperator::LessThan, &text("90")));
        assert!(!matches(Some(&accuracy), FilterOperator::GreaterThan, &text("high")));
        assert!(!matches(None, FilterOperator::LessThan, &FilterValue::Number(100.0)));
        let words = FieldValue::Text("fast".to_string());
        assert!(!matches(Some(&words), FilterOperator::LessThan, &FilterValue::Number(1.0)));
        assert!(!matches(Some(&words), FilterOperator::GreaterThan, &FilterValue::Number(1.0)));
    }

    #[test]
    fn test_resolve_missing_links_yield_none() {
        let plain = row("no run yet");
        assert_eq!(resolve_field(&plain, &FieldRef::Accuracy), None);
        assert_eq!(resolve_field(&plain, &FieldRef::ResponseFeedback), None);
        assert_eq!(resolve_field(&plain, &FieldRef::Custom("custom_missing".into())), None);
        assert_eq!(resolve_field(&plain, &FieldRef::from_path("metrics.tokensUsed")), None);
    }

    #[test]
    fn test_resolve_nested_values() {
        let mut ran = with_accuracy("pricing", 94);
        ran.ai_response = Some(AiResponse {
            content: "Three tiers".to_string(),
            feedback: Some(Feedback::Down),
            generated_at: None,
        });
        ran.custom_data.insert(
            "custom_tags1234".to_string(),
            CustomValue::List(vec!["billing".to_string(), "sales".to_string()]),
        );

        assert_eq!(
            resolve_field(&ran, &FieldRef::Accuracy).map(|v| v.to_text()),
            Some("94".to_string())
        );
        assert_eq!(
            resolve_field(&ran, &FieldRef::ResponseFeedback).map(|v| v.to_text()),
            Some("down".to_string())
        );
        assert_eq!(
            resolve_field(&ran, &FieldRef::Custom("custom_tags1234".into())).map(|v| v.to_text()),
            Some("billing,sales".to_string())
        );
    }

    #[test]
    fn test_search_runs_before_filters() {
        let mut with_note = row("refund window");
        with_note.notes = "Escalation path".to_string();
        let rows = vec![with_note, row("escalation policy"), row("pricing")];

        let view = ViewState {
            search_query: "ESCALATION".to_string(),
            filters: vec![FilterConfig::new("question", FilterOperator::StartsWith, text("refund"))],
            sort: None,
        };

        let result = derive_view(&rows, &view);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].question, "refund window");
    }

    #[test]
    fn test_blank_search_matches_everything() {
        let rows = vec![row("a"), row("b")];
        let view = ViewState {
            search_query: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(derive_view(&rows, &view).len(), 2);
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let rows = vec![
            with_accuracy("first", 90),
            with_accuracy("second", 80),
            with_accuracy("third", 90),
            with_accuracy("fourth", 80),
        ];
        let asc = sort_rows(
            rows.clone(),
            &SortConfig {
                field: FieldRef::Accuracy,
                direction: SortDirection::Asc,
            },
        );
        let names: Vec<&str> = asc.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(names, vec!["second", "fourth", "first", "third"]);

        let desc = sort_rows(
            rows,
            &SortConfig {
                field: FieldRef::Accuracy,
                direction: SortDirection::Desc,
            },
        );
        let names: Vec<&str> = desc.iter().map(|r| r.question.as_str()).collect();
        assert_eq!(names, vec!["first", "third", "second", "fourth"]);
    }

    #[test]
    fn test_sort_numeric_fields_compare_as_text() {
        let mut fast = row("fast");
        fast.metrics = Some(TestMetrics::new(90, 9.0));
        let mut slow = row("slow");
        slow.metrics = Some(TestMetrics::new(90, 10.0));

        let sorted = sort_rows(
            vec![fast, slow],
            &SortConfig {
                field: FieldRef::Latency,
                direction: SortDirection::Asc,
            },
        );
        assert_eq!(sorted[0].question, "slow");
    }

    #[test]
    fn test_unrun_rows_sort_first_ascending() {
        let rows = vec![with_accuracy("ran", 85), row("never ran")];
        let sorted = sort_rows(
            rows,
            &SortConfig {
                field: FieldRef::Accuracy,
                direction: SortDirection::Asc,
            },
        );
        assert_eq!(sorted[0].question, "never ran");
    }

    #[test]
    fn test_view_cache_is_stable_until_inputs_change() {
        let mut sheet = Worksheet::new("Sheet 1".to_string());
        sheet.test_cases.push(row("cancel plan"));
        sheet.test_cases.push(row("billing info"));
        let mut cache = ViewCache::new();
        let view = ViewState::default();

        let first = cache.get_or_derive(&sheet, &view);
        let second = cache.get_or_derive(&sheet, &view);
        assert!(Arc::ptr_eq(&first, &second));

        sheet.test_cases[1].question = "cancel billing".to_string();
        sheet.mark_changed();
        let third = cache.get_or_derive(&sheet, &view);
        assert!(!Arc::ptr_eq(&second, &third));
        assert_eq!(third[1].question, "cancel billing");

        let searched = ViewState {
            search_query: "billing".to_string(),
            ..Default::default()
        };
        let fourth = cache.get_or_derive(&sheet, &searched);
        assert!(!Arc::ptr_eq(&third, &fourth));
        assert_eq!(fourth.len(), 1);
    }
}
