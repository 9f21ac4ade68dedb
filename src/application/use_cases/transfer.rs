//! CSV import mapping, export records, and the import template.

use crate::application::use_cases::test_cases::TestCaseCollection;
use crate::domain::error::Result;
use crate::domain::test_case::{NewTestCase, TestCaseRow};
use crate::domain::transfer::{ColumnMapping, ExportRecord, ImportField, ImportOutcome};
use crate::domain::view::format_number;
use crate::infrastructure::csv::CsvWriter;
use tracing::{debug, info};

pub const EXPORT_HEADERS: [&str; 9] = [
    "Question",
    "Expected Answer",
    "Leading Questions",
    "AI Response",
    "Accuracy",
    "Latency",
    "Status",
    "Feedback",
    "Notes",
];

pub const TEMPLATE_HEADERS: [&str; 4] = ["Question", "Expected Answer", "Leading Questions", "Notes"];

/// Guess a target for each header from its name.
pub fn auto_map_headers(headers: &[String]) -> Vec<ColumnMapping> {
    headers
        .iter()
        .map(|header| {
            let normalized: String = header
                .to_lowercase()
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
                .collect();
            let target = if normalized.contains("leading") {
                Some(ImportField::LeadingQuestions)
            } else if normalized.contains("question") {
                Some(ImportField::Question)
            } else if normalized.contains("expected") || normalized.contains("answer") {
                Some(ImportField::ExpectedAnswer)
            } else if normalized.contains("note") {
                Some(ImportField::Notes)
            } else {
                None
            };
            ColumnMapping::new(header, target)
        })
        .collect()
}

fn build_case(mapping: &[ColumnMapping], cells: &[String]) -> NewTestCase {
    let mut case = NewTestCase::default();
    for (column, cell) in mapping.iter().zip(cells) {
        if cell.is_empty() {
            continue;
        }
        let Some(target) = column.target else {
            continue;
        };
        let slot = match target {
            ImportField::Question => &mut case.question,
            ImportField::ExpectedAnswer => &mut case.expected_answer,
            ImportField::LeadingQuestions => &mut case.leading_questions,
            ImportField::Notes => &mut case.notes,
        };
        *slot = cell.clone();
    }
    case
}

/// Append one row per source row. Declined, with nothing added, unless some
/// column maps to the question. Rows whose cells are all blank are skipped.
pub fn import_test_cases(
    cases: &mut TestCaseCollection<'_>,
    mapping: &[ColumnMapping],
    rows: &[Vec<String>],
) -> Result<ImportOutcome> {
    if !mapping
        .iter()
        .any(|column| column.target == Some(ImportField::Question))
    {
        debug!(columns = mapping.len(), "Import declined: no question column");
        return Ok(ImportOutcome::Declined {
            reason: "At least one column must be mapped to Question".to_string(),
        });
    }

    let new_cases: Vec<NewTestCase> = rows
        .iter()
        .filter(|cells| cells.iter().any(|cell| !cell.trim().is_empty()))
        .map(|cells| build_case(mapping, cells))
        .collect();
    let rows = cases.add_many(new_cases)?;
    info!(count = rows.len(), worksheet_id = %cases.worksheet_id(), "Imported test cases");
    Ok(ImportOutcome::Imported { rows })
}

pub fn export_record(row: &TestCaseRow) -> ExportRecord {
    let response = row.ai_response.as_ref();
    let metrics = row.metrics.as_ref();
    ExportRecord {
        question: row.question.clone(),
        expected_answer: row.expected_answer.clone(),
        leading_questions: row.leading_questions.clone(),
        ai_response: response.map(|r| r.content.clone()).unwrap_or_default(),
        accuracy: metrics
            .map(|m| m.accuracy.to_string())
            .unwrap_or_default(),
        latency: metrics
            .map(|m| format_number(m.latency))
            .unwrap_or_default(),
        status: metrics
            .map(|m| m.status.as_str().to_string())
            .unwrap_or_default(),
        feedback: response
            .and_then(|r| r.feedback)
            .map(|f| f.as_str().to_string())
            .unwrap_or_default(),
        notes: row.notes.clone(),
    }
}

pub fn export_records(rows: &[TestCaseRow]) -> Vec<ExportRecord> {
    rows.iter().map(export_record).collect()
}

pub fn to_csv(records: &[ExportRecord]) -> Result<String> {
    CsvWriter::new().write_records(&EXPORT_HEADERS, records)
}

pub fn template_csv() -> Result<String> {
    let example = vec![
        "What is your product?".to_string(),
        "Our product is...".to_string(),
        "Tell me about your product".to_string(),
        String::new(),
    ];
    CsvWriter::new().write_rows(&TEMPLATE_HEADERS, &[example])
}

pub fn export_file_name(worksheet_name: &str) -> String {
    let safe: String = worksheet_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
        .collect();
    format!("test-cases-{}.csv", safe)
}
