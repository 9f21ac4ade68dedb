//! Fix suggestions for failed rows and the worksheet-level run summary.

use crate::domain::recommendation::{
    Priority, Recommendation, RecommendationGroup, RecommendationKind, RunSummary,
};
use crate::domain::test_case::{TestCaseRow, TestMetrics, TestStatus};
use crate::shared::generate_id;
use std::collections::BTreeMap;

const LOW_ACCURACY: u8 = 70;
const GOOD_ACCURACY: u8 = 90;
const SLOW_LATENCY_SECS: f64 = 2.0;

fn recommendation(
    kind: RecommendationKind,
    priority: Priority,
    title: &str,
    description: String,
) -> Recommendation {
    Recommendation {
        id: generate_id(),
        kind,
        title: title.to_string(),
        priority,
        description,
        action_label: kind.action_label().to_string(),
    }
}

/// Suggestions for one scored row, most urgent first. Never empty.
pub fn generate_recommendations(row: &TestCaseRow, metrics: &TestMetrics) -> Vec<Recommendation> {
    let response_len = row
        .ai_response
        .as_ref()
        .map(|response| response.content.chars().count())
        .unwrap_or(0);
    let expected_len = row.expected_answer.chars().count();

    let mut items = Vec::new();
    if metrics.accuracy < LOW_ACCURACY {
        items.push(recommendation(
            RecommendationKind::Knowledge,
            Priority::High,
            RecommendationKind::Knowledge.title(),
            "The response significantly differs from the expected answer. Add or update the relevant information in the knowledge base.".to_string(),
        ));
    }
    if (response_len as f64) < expected_len as f64 * 0.5 {
        items.push(recommendation(
            RecommendationKind::Prompt,
            Priority::High,
            RecommendationKind::Prompt.title(),
            "The response is missing important details. Update the system prompt to encourage more comprehensive answers.".to_string(),
        ));
    }
    if metrics.latency > SLOW_LATENCY_SECS {
        items.push(recommendation(
            RecommendationKind::Context,
            Priority::Medium,
            RecommendationKind::Context.title(),
            format!(
                "Response time ({:.1}s) is higher than optimal. Reduce the context length or optimize retrieval.",
                metrics.latency
            ),
        ));
    }
    if (LOW_ACCURACY..GOOD_ACCURACY).contains(&metrics.accuracy) {
        items.push(recommendation(
            RecommendationKind::Format,
            Priority::Medium,
            RecommendationKind::Format.title(),
            "The response is partially correct but could be structured better to match expectations.".to_string(),
        ));
    }
    if !row.leading_questions.trim().is_empty() {
        items.push(recommendation(
            RecommendationKind::Intent,
            Priority::Low,
            RecommendationKind::Intent.title(),
            "Multiple variations of this question exist. Add intent mapping to handle different phrasings.".to_string(),
        ));
    }
    if items.is_empty() {
        items.push(recommendation(
            RecommendationKind::Knowledge,
            Priority::Low,
            "Review Knowledge Base Coverage",
            "Review the knowledge base to ensure all relevant information is accurately captured.".to_string(),
        ));
    }

    items.sort_by_key(|item| item.priority);
    items
}

/// Group failed rows by recommendation kind. Rows without stored
/// recommendations get fresh ones from their metrics.
pub fn summarize_recommendations(rows: &[TestCaseRow]) -> Vec<RecommendationGroup> {
    let mut groups: BTreeMap<RecommendationKind, RecommendationGroup> = BTreeMap::new();

    for row in rows {
        let Some(metrics) = row.metrics.as_ref() else {
            continue;
        };
        if metrics.status != TestStatus::Failed {
            continue;
        }
        let items = match row.recommendations.as_ref() {
            Some(items) if !items.is_empty() => items.clone(),
            _ => generate_recommendations(row, metrics),
        };

        for item in items {
            let group = groups.entry(item.kind).or_insert_with(|| RecommendationGroup {
                kind: item.kind,
                label: item.kind.title().to_string(),
                description: item.kind.description().to_string(),
                priority: item.priority,
                count: 0,
                row_ids: Vec::new(),
            });
            if !group.row_ids.contains(&row.id) {
                group.row_ids.push(row.id.clone());
                group.count += 1;
            }
            group.priority = group.priority.min(item.priority);
        }
    }

    let mut groups: Vec<RecommendationGroup> = groups.into_values().collect();
    groups.sort_by(|a, b| a.priority.cmp(&b.priority).then(b.count.cmp(&a.count)));
    groups
}

/// Aggregate over rows that carry metrics. `None` until something has run.
pub fn run_summary(rows: &[TestCaseRow]) -> Option<RunSummary> {
    let scored: Vec<&TestMetrics> = rows.iter().filter_map(|row| row.metrics.as_ref()).collect();
    if scored.is_empty() {
        return None;
    }

    let total = scored.len();
    let passed = scored.iter().filter(|metrics| metrics.passed()).count();
    let accuracy_sum: f64 = scored.iter().map(|metrics| f64::from(metrics.accuracy)).sum();
    let latency_sum: f64 = scored.iter().map(|metrics| metrics.latency).sum();

    Some(RunSummary {
        total_run: total,
        passed,
        efficiency_score: ((passed as f64 / total as f64) * 100.0).round() as u8,
        average_accuracy: (accuracy_sum / total as f64).round() as u8,
        average_latency: ((latency_sum / total as f64) * 10.0).round() / 10.0,
    })
}
