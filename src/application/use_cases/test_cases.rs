//! Row operations for one worksheet.
//!
//! [`TestCaseCollection`] borrows a worksheet mutably and is the only code
//! that changes its rows. Every mutation bumps the worksheet revision so the
//! derived view is recomputed.

use crate::application::use_cases::recommendations::generate_recommendations;
use crate::domain::error::{AppError, Result};
use crate::domain::run::{RunOutcome, RunRequest};
use crate::domain::test_case::{
    AiResponse, CustomValue, Feedback, NewTestCase, RunStatus, TestCasePatch, TestCaseRow,
    TestMetrics,
};
use crate::domain::worksheet::Worksheet;
use crate::shared::now_millis;
use std::collections::HashSet;
use tracing::{debug, warn};

pub struct TestCaseCollection<'a> {
    worksheet: &'a mut Worksheet,
}

impl<'a> TestCaseCollection<'a> {
    pub fn new(worksheet: &'a mut Worksheet) -> Self {
        Self { worksheet }
    }

    pub fn worksheet_id(&self) -> &str {
        &self.worksheet.id
    }

    pub fn rows(&self) -> &[TestCaseRow] {
        &self.worksheet.test_cases
    }

    pub fn get(&self, id: &str) -> Option<&TestCaseRow> {
        self.worksheet.find_row(id)
    }

    /// Custom data may only use field keys of this worksheet's columns.
    fn check_custom_fields<'k>(&self, fields: impl IntoIterator<Item = &'k String>) -> Result<()> {
        match fields
            .into_iter()
            .find(|field| !self.worksheet.has_custom_field(field))
        {
            Some(field) => Err(AppError::ValidationError(format!(
                "Unknown custom field {} for worksheet {}",
                field, self.worksheet.id
            ))),
            None => Ok(()),
        }
    }

    pub fn add(&mut self, input: NewTestCase) -> Result<TestCaseRow> {
        self.check_custom_fields(input.custom_data.keys())?;
        let row = TestCaseRow::new(input);
        self.worksheet.test_cases.push(row.clone());
        self.worksheet.mark_changed();
        Ok(row)
    }

    /// All or nothing: one unknown custom field rejects the whole batch.
    pub fn add_many(&mut self, inputs: Vec<NewTestCase>) -> Result<Vec<TestCaseRow>> {
        self.check_custom_fields(inputs.iter().flat_map(|input| input.custom_data.keys()))?;
        let rows: Vec<TestCaseRow> = inputs.into_iter().map(TestCaseRow::new).collect();
        if rows.is_empty() {
            return Ok(rows);
        }
        self.worksheet.test_cases.extend(rows.iter().cloned());
        self.worksheet.mark_changed();
        Ok(rows)
    }

    /// Append rows as they are, identity and results included. Used when rows
    /// move between worksheets; values for columns this worksheet lacks are
    /// dropped.
    pub fn append_existing(&mut self, mut rows: Vec<TestCaseRow>) {
        if rows.is_empty() {
            return;
        }
        for row in rows.iter_mut() {
            let before = row.custom_data.len();
            row.custom_data
                .retain(|field, _| self.worksheet.has_custom_field(field));
            if row.custom_data.len() != before {
                debug!(
                    row_id = %row.id,
                    dropped = before - row.custom_data.len(),
                    "Dropped custom values"
                );
            }
        }
        self.worksheet.test_cases.extend(rows);
        self.worksheet.mark_changed();
    }

    /// Replace every row, e.g. when sample data is loaded.
    pub fn replace_all(&mut self, rows: Vec<TestCaseRow>) {
        self.worksheet.test_cases = rows;
        self.worksheet.mark_changed();
    }

    pub fn update(&mut self, id: &str, patch: TestCasePatch) -> Result<TestCaseRow> {
        self.check_custom_fields(patch.custom_data.keys())?;
        let row = self
            .worksheet
            .find_row_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Test case {}", id)))?;
        row.apply_patch(patch);
        let updated = row.clone();
        self.worksheet.mark_changed();
        Ok(updated)
    }

    /// Remove every row whose id is listed. Unknown ids are ignored.
    pub fn delete(&mut self, ids: &[String]) -> Vec<TestCaseRow> {
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let (removed, kept): (Vec<TestCaseRow>, Vec<TestCaseRow>) = self
            .worksheet
            .test_cases
            .drain(..)
            .partition(|row| targets.contains(row.id.as_str()));
        self.worksheet.test_cases = kept;
        if !removed.is_empty() {
            self.worksheet.mark_changed();
        }
        removed
    }

    /// Copies of the listed rows, in collection order, appended at the end.
    pub fn duplicate(&mut self, ids: &[String]) -> Vec<TestCaseRow> {
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let copies: Vec<TestCaseRow> = self
            .worksheet
            .test_cases
            .iter()
            .filter(|row| targets.contains(row.id.as_str()))
            .map(TestCaseRow::clone_for_duplication)
            .collect();
        self.append_existing(copies.clone());
        copies
    }

    /// Move the row at `source_index` to `dest_index` in stored (unfiltered)
    /// order.
    pub fn reorder(&mut self, source_index: usize, dest_index: usize) -> Result<()> {
        let len = self.worksheet.test_cases.len();
        if source_index >= len || dest_index >= len {
            return Err(AppError::ValidationError(format!(
                "Reorder indices out of range: {} -> {} (rows: {})",
                source_index, dest_index, len
            )));
        }
        if source_index == dest_index {
            return Ok(());
        }
        let row = self.worksheet.test_cases.remove(source_index);
        self.worksheet.test_cases.insert(dest_index, row);
        self.worksheet.mark_changed();
        Ok(())
    }

    /// Toggle thumbs up/down. Returns the feedback now stored; rows without a
    /// response are left alone.
    pub fn give_feedback(&mut self, id: &str, feedback: Feedback) -> Result<Option<Feedback>> {
        let row = self
            .worksheet
            .find_row_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Test case {}", id)))?;
        let Some(response) = row.ai_response.as_mut() else {
            debug!(row_id = %id, "Ignoring feedback on a row without a response");
            return Ok(None);
        };
        response.feedback = if response.feedback == Some(feedback) {
            None
        } else {
            Some(feedback)
        };
        let current = response.feedback;
        row.touch();
        self.worksheet.mark_changed();
        Ok(current)
    }

    pub fn reset_results(&mut self, ids: &[String]) -> usize {
        let targets: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut reset = 0;
        for row in self
            .worksheet
            .test_cases
            .iter_mut()
            .filter(|row| targets.contains(row.id.as_str()) && !row.is_running())
        {
            row.clear_results();
            reset += 1;
        }
        if reset > 0 {
            self.worksheet.mark_changed();
        }
        reset
    }

    /// Drop `field` from every row's custom data.
    pub fn remove_custom_field(&mut self, field: &str) -> usize {
        let mut touched = 0;
        for row in self.worksheet.test_cases.iter_mut() {
            if row.custom_data.remove(field).is_some() {
                row.touch();
                touched += 1;
            }
        }
        self.worksheet.mark_changed();
        touched
    }

    /// Copy each row's non-empty value under `from` to `to`.
    pub fn copy_custom_field(&mut self, from: &str, to: &str) -> usize {
        let mut copied = 0;
        for row in self.worksheet.test_cases.iter_mut() {
            let value: Option<CustomValue> = row
                .custom_data
                .get(from)
                .filter(|value| !value.is_empty())
                .cloned();
            if let Some(value) = value {
                row.custom_data.insert(to.to_string(), value);
                row.touch();
                copied += 1;
            }
        }
        self.worksheet.mark_changed();
        copied
    }

    /// Mark a row as running and hand back what the agent needs to answer it.
    pub fn begin_run(&mut self, id: &str) -> Result<RunRequest> {
        let worksheet_id = self.worksheet.id.clone();
        let row = self
            .worksheet
            .find_row_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Test case {}", id)))?;
        if row.is_running() {
            return Err(AppError::Conflict(format!("Test case {} is already running", id)));
        }
        row.run_status = RunStatus::Running;
        row.touch();
        let request = RunRequest {
            row_id: row.id.clone(),
            worksheet_id,
            question: row.question.clone(),
            expected_answer: row.expected_answer.clone(),
            leading_questions: row.leading_questions.clone(),
        };
        self.worksheet.mark_changed();
        Ok(request)
    }

    /// Record the result of a run. Returns the final status, or `None` when the
    /// row disappeared while it was running.
    pub fn finish_run(&mut self, id: &str, outcome: Result<RunOutcome>) -> Option<RunStatus> {
        let row = self.worksheet.find_row_mut(id)?;
        match outcome {
            Ok(outcome) => {
                let metrics = TestMetrics::new(outcome.accuracy, outcome.latency);
                row.ai_response = Some(AiResponse {
                    content: outcome.content,
                    feedback: None,
                    generated_at: Some(now_millis()),
                });
                row.metrics = Some(metrics.clone());
                row.recommendations = if metrics.passed() {
                    None
                } else {
                    Some(generate_recommendations(row, &metrics))
                };
                row.run_status = RunStatus::Complete;
            }
            Err(err) => {
                warn!(row_id = %id, error = %err, "Test run failed");
                row.run_status = RunStatus::Error;
            }
        }
        row.touch();
        let status = row.run_status;
        self.worksheet.mark_changed();
        Some(status)
    }
}
