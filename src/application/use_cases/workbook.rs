//! Worksheet manager.
//!
//! A [`Workbook`] owns every worksheet, remembers which one is active, and
//! holds the view state (search, filters, sort) applied to the active sheet.
//! It always contains at least one worksheet.

use crate::application::use_cases::recommendations::{run_summary, summarize_recommendations};
use crate::application::use_cases::test_cases::TestCaseCollection;
use crate::application::use_cases::view_pipeline::ViewCache;
use crate::domain::error::{AppError, Result};
use crate::domain::recommendation::{RecommendationGroup, RunSummary};
use crate::domain::run::{RunOutcome, RunRequest};
use crate::domain::test_case::{RunStatus, TestCaseRow};
use crate::domain::view::{FilterConfig, SortConfig, ViewState};
use crate::domain::worksheet::{ColumnType, CustomColumn, CustomColumnPatch, Worksheet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_WORKSHEET_NAME: &str = "All tests";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookSnapshot {
    pub worksheets: Vec<Worksheet>,
    pub active_worksheet_id: String,
    pub view: ViewState,
    /// Rows with an agent call in flight, sorted.
    #[serde(default)]
    pub running_ids: Vec<String>,
}

pub struct Workbook {
    worksheets: Vec<Worksheet>,
    active_id: String,
    view: ViewState,
    cache: ViewCache,
    running: HashSet<String>,
}

impl Default for Workbook {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbook {
    pub fn new() -> Self {
        Self::from_worksheets(Vec::new())
    }

    pub fn from_worksheets(mut worksheets: Vec<Worksheet>) -> Self {
        if worksheets.is_empty() {
            worksheets.push(Worksheet::new(DEFAULT_WORKSHEET_NAME.to_string()));
        }
        let active_id = worksheets[0].id.clone();
        Self {
            worksheets,
            active_id,
            view: ViewState::default(),
            cache: ViewCache::new(),
            running: HashSet::new(),
        }
    }

    pub fn snapshot(&self) -> WorkbookSnapshot {
        WorkbookSnapshot {
            worksheets: self.worksheets.clone(),
            active_worksheet_id: self.active_id.clone(),
            view: self.view.clone(),
            running_ids: self.running_ids(),
        }
    }

    pub fn worksheets(&self) -> &[Worksheet] {
        &self.worksheets
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.worksheets
            .iter()
            .position(|ws| ws.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Worksheet {}", id)))
    }

    fn active_index(&self) -> usize {
        self.worksheets
            .iter()
            .position(|ws| ws.id == self.active_id)
            .unwrap_or(0)
    }

    pub fn active(&self) -> &Worksheet {
        &self.worksheets[self.active_index()]
    }

    fn active_mut(&mut self) -> &mut Worksheet {
        let index = self.active_index();
        &mut self.worksheets[index]
    }

    /// Row operations on the active worksheet.
    pub fn cases(&mut self) -> TestCaseCollection<'_> {
        TestCaseCollection::new(self.active_mut())
    }

    /// Row operations on whichever worksheet holds `row_id`.
    pub fn cases_for_row(&mut self, row_id: &str) -> Option<TestCaseCollection<'_>> {
        self.worksheets
            .iter_mut()
            .find(|ws| ws.find_row(row_id).is_some())
            .map(TestCaseCollection::new)
    }

    pub fn find_row(&self, row_id: &str) -> Option<&TestCaseRow> {
        self.worksheets.iter().find_map(|ws| ws.find_row(row_id))
    }

    // Worksheets

    pub fn create_worksheet(&mut self, name: Option<String>) -> Worksheet {
        let name = match name {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("Worksheet {}", self.worksheets.len() + 1),
        };
        let worksheet = Worksheet::new(name);
        info!(worksheet_id = %worksheet.id, name = %worksheet.name, "Created worksheet");
        self.active_id = worksheet.id.clone();
        self.worksheets.push(worksheet.clone());
        worksheet
    }

    pub fn rename_worksheet(&mut self, id: &str, name: String) -> Result<Worksheet> {
        let index = self.index_of(id)?;
        let worksheet = &mut self.worksheets[index];
        worksheet.name = name;
        worksheet.mark_changed();
        Ok(worksheet.clone())
    }

    /// Deep copy placed right after the source; the copy becomes active.
    pub fn duplicate_worksheet(&mut self, id: &str) -> Result<Worksheet> {
        let index = self.index_of(id)?;
        let copy = self.worksheets[index].clone_for_duplication();
        info!(source_id = %id, worksheet_id = %copy.id, "Duplicated worksheet");
        self.active_id = copy.id.clone();
        self.worksheets.insert(index + 1, copy.clone());
        Ok(copy)
    }

    /// Returns `false` and changes nothing when `id` is the last worksheet.
    pub fn delete_worksheet(&mut self, id: &str) -> Result<bool> {
        let index = self.index_of(id)?;
        if self.worksheets.len() <= 1 {
            debug!(worksheet_id = %id, "Refusing to delete the last worksheet");
            return Ok(false);
        }
        let removed = self.worksheets.remove(index);
        self.cache.invalidate(&removed.id);
        for row in &removed.test_cases {
            self.running.remove(&row.id);
        }
        if self.active_id == removed.id {
            self.active_id = self.worksheets[0].id.clone();
        }
        info!(worksheet_id = %id, active_id = %self.active_id, "Deleted worksheet");
        Ok(true)
    }

    pub fn set_active(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        self.active_id = self.worksheets[index].id.clone();
        Ok(())
    }

    /// Move rows out of the active worksheet onto the end of `target_id`.
    /// Rows keep their identity and results.
    pub fn move_test_cases(&mut self, ids: &[String], target_id: &str) -> Result<usize> {
        let target = self.index_of(target_id)?;
        if target == self.active_index() {
            return Ok(0);
        }
        let moved = self.cases().delete(ids);
        let count = moved.len();
        TestCaseCollection::new(&mut self.worksheets[target]).append_existing(moved);
        info!(count, target_id = %target_id, "Moved test cases");
        Ok(count)
    }

    pub fn load_sample_data(&mut self, rows: Vec<TestCaseRow>) {
        let index = self.active_index();
        for row in &self.worksheets[index].test_cases {
            self.running.remove(&row.id);
        }
        let count = rows.len();
        self.cases().replace_all(rows);
        info!(count, worksheet_id = %self.active_id, "Loaded sample data");
    }

    // Custom columns, scoped to the active worksheet

    pub fn add_column(
        &mut self,
        name: String,
        column_type: ColumnType,
        options: Option<Vec<String>>,
    ) -> CustomColumn {
        let column = CustomColumn::new(name, column_type, options);
        let worksheet = self.active_mut();
        worksheet.custom_columns.push(column.clone());
        worksheet.mark_changed();
        column
    }

    pub fn update_column(&mut self, id: &str, patch: CustomColumnPatch) -> Result<CustomColumn> {
        let worksheet = self.active_mut();
        let index = worksheet
            .column_index(id)
            .ok_or_else(|| AppError::NotFound(format!("Column {}", id)))?;
        worksheet.custom_columns[index].apply_patch(patch);
        worksheet.mark_changed();
        Ok(worksheet.custom_columns[index].clone())
    }

    /// Remove the column and strip its field from every row.
    pub fn delete_column(&mut self, id: &str) -> Result<CustomColumn> {
        let worksheet = self.active_mut();
        let index = worksheet
            .column_index(id)
            .ok_or_else(|| AppError::NotFound(format!("Column {}", id)))?;
        let column = worksheet.custom_columns.remove(index);
        let stripped = TestCaseCollection::new(worksheet).remove_custom_field(&column.field);
        debug!(column_id = %id, field = %column.field, stripped, "Deleted column");
        Ok(column)
    }

    /// Copy placed right after the source, with per-row values copied to the
    /// new field.
    pub fn duplicate_column(&mut self, id: &str) -> Result<CustomColumn> {
        let worksheet = self.active_mut();
        let index = worksheet
            .column_index(id)
            .ok_or_else(|| AppError::NotFound(format!("Column {}", id)))?;
        let source_field = worksheet.custom_columns[index].field.clone();
        let copy = worksheet.custom_columns[index].clone_as_copy();
        worksheet.custom_columns.insert(index + 1, copy.clone());
        TestCaseCollection::new(worksheet).copy_custom_field(&source_field, &copy.field);
        Ok(copy)
    }

    // View state

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn set_view(&mut self, view: ViewState) {
        self.view = view;
    }

    pub fn set_search_query(&mut self, query: String) {
        self.view.search_query = query;
    }

    pub fn set_filters(&mut self, filters: Vec<FilterConfig>) {
        self.view.filters = filters;
    }

    pub fn set_sort(&mut self, sort: Option<SortConfig>) {
        self.view.sort = sort;
    }

    /// Rows of the active worksheet after search, filters and sort.
    pub fn current_view(&mut self) -> Arc<Vec<TestCaseRow>> {
        let index = self.active_index();
        self.cache.get_or_derive(&self.worksheets[index], &self.view)
    }

    pub fn summary(&mut self) -> Option<RunSummary> {
        run_summary(&self.current_view())
    }

    pub fn recommendation_groups(&self) -> Vec<RecommendationGroup> {
        summarize_recommendations(&self.active().test_cases)
    }

    // Run bookkeeping

    fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.running.iter().cloned().collect();
        ids.sort();
        ids
    }

    pub fn begin_run(&mut self, row_id: &str) -> Result<RunRequest> {
        let request = self
            .cases_for_row(row_id)
            .ok_or_else(|| AppError::NotFound(format!("Test case {}", row_id)))?
            .begin_run(row_id)?;
        self.running.insert(row_id.to_string());
        Ok(request)
    }

    pub fn finish_run(&mut self, row_id: &str, outcome: Result<RunOutcome>) -> Option<RunStatus> {
        self.running.remove(row_id);
        let status = self
            .cases_for_row(row_id)
            .and_then(|mut cases| cases.finish_run(row_id, outcome));
        if status.is_none() {
            debug!(row_id = %row_id, "Run finished for a row that no longer exists");
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::{CustomValue, NewTestCase};
    use crate::domain::view::{FilterOperator, FilterValue};

    fn add_rows(workbook: &mut Workbook, questions: &[&str]) -> Vec<String> {
        questions
            .iter()
            .map(|question| {
                workbook
                    .cases()
                    .add(NewTestCase {
                        question: question.to_string(),
                        ..Default::default()
                    })
                    .unwrap()
                    .id
            })
            .collect()
    }

    fn outcome(accuracy: u8) -> RunOutcome {
        RunOutcome {
            content: "answer".to_string(),
            accuracy,
            latency: 1.0,
        }
    }

    #[test]
    fn test_starts_with_default_worksheet() {
        let workbook = Workbook::new();
        assert_eq!(workbook.worksheets().len(), 1);
        assert_eq!(workbook.active().name, DEFAULT_WORKSHEET_NAME);
        assert!(workbook.active().test_cases.is_empty());
    }

    #[test]
    fn test_create_auto_names_and_activates() {
        let mut workbook = Workbook::new();
        let created = workbook.create_worksheet(None);
        assert_eq!(created.name, "Worksheet 2");
        assert_eq!(workbook.active_id(), created.id);

        let named = workbook.create_worksheet(Some("Billing".to_string()));
        assert_eq!(named.name, "Billing");
        let blank = workbook.create_worksheet(Some("  ".to_string()));
        assert_eq!(blank.name, "Worksheet 4");
    }

    #[test]
    fn test_delete_last_worksheet_is_declined() {
        let mut workbook = Workbook::new();
        let only = workbook.active_id().to_string();
        assert_eq!(workbook.delete_worksheet(&only), Ok(false));
        assert_eq!(workbook.worksheets().len(), 1);
        assert_eq!(workbook.active_id(), only);
    }

    #[test]
    fn test_delete_active_switches_to_first() {
        let mut workbook = Workbook::new();
        let first = workbook.active_id().to_string();
        let second = workbook.create_worksheet(None).id;
        let third = workbook.create_worksheet(None).id;
        workbook.set_active(&second).unwrap();

        assert_eq!(workbook.delete_worksheet(&second), Ok(true));
        assert_eq!(workbook.active_id(), first);
        assert_eq!(workbook.worksheets().len(), 2);

        workbook.set_active(&third).unwrap();
        assert_eq!(workbook.delete_worksheet(&first), Ok(true));
        assert_eq!(workbook.active_id(), third);
    }

    #[test]
    fn test_unknown_worksheet_is_not_found() {
        let mut workbook = Workbook::new();
        assert!(matches!(workbook.set_active("nope"), Err(AppError::NotFound(_))));
        assert!(matches!(workbook.delete_worksheet("nope"), Err(AppError::NotFound(_))));
        assert!(matches!(
            workbook.rename_worksheet("nope", "x".to_string()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_worksheet_inserts_after_source() {
        let mut workbook = Workbook::new();
        let first = workbook.active_id().to_string();
        let ids = add_rows(&mut workbook, &["a", "b"]);
        workbook.begin_run(&ids[0]).unwrap();
        workbook.finish_run(&ids[0], Ok(outcome(90)));
        workbook.add_column("Category".to_string(), ColumnType::Text, None);
        workbook.create_worksheet(None);

        let copy = workbook.duplicate_worksheet(&first).unwrap();
        assert_eq!(workbook.worksheets()[1].id, copy.id);
        assert_eq!(workbook.active_id(), copy.id);
        assert_eq!(copy.name, "All tests (copy)");
        assert_eq!(copy.test_cases.len(), 2);
        assert!(copy.test_cases.iter().all(|row| !ids.contains(&row.id)));
        assert!(copy.test_cases.iter().all(|row| row.metrics.is_none()));
        assert_ne!(copy.custom_columns[0].id, workbook.worksheets()[0].custom_columns[0].id);
    }

    #[test]
    fn test_delete_column_strips_row_data() {
        let mut workbook = Workbook::new();
        let column = workbook.add_column("Tag".to_string(), ColumnType::Text, None);
        assert_eq!(column.width, Some(200));
        let ids = add_rows(&mut workbook, &["a", "b"]);
        for id in &ids {
            let mut patch = crate::domain::test_case::TestCasePatch::default();
            patch
                .custom_data
                .insert(column.field.clone(), Some(CustomValue::Text("x".to_string())));
            workbook.cases().update(id, patch).unwrap();
        }

        workbook.delete_column(&column.id).unwrap();
        assert!(workbook.active().custom_columns.is_empty());
        assert!(workbook
            .active()
            .test_cases
            .iter()
            .all(|row| !row.custom_data.contains_key(&column.field)));
    }

    #[test]
    fn test_duplicate_column_copies_values() {
        let mut workbook = Workbook::new();
        let tags = workbook.add_column(
            "Tags".to_string(),
            ColumnType::Multiselect,
            Some(vec!["a".to_string(), "b".to_string()]),
        );
        workbook.add_column("Owner".to_string(), ColumnType::Text, Some(vec!["x".to_string()]));
        let ids = add_rows(&mut workbook, &["q"]);
        let mut patch = crate::domain::test_case::TestCasePatch::default();
        patch.custom_data.insert(
            tags.field.clone(),
            Some(CustomValue::List(vec!["a".to_string()])),
        );
        workbook.cases().update(&ids[0], patch).unwrap();

        let copy = workbook.duplicate_column(&tags.id).unwrap();
        let columns = &workbook.active().custom_columns;
        assert_eq!(columns[1].id, copy.id);
        assert_eq!(copy.name, "Tags (copy)");
        assert_ne!(copy.field, tags.field);
        assert_eq!(columns[2].options, None);
        let row = &workbook.active().test_cases[0];
        assert_eq!(row.custom_data.get(&copy.field), row.custom_data.get(&tags.field));
    }

    #[test]
    fn test_move_test_cases() {
        let mut workbook = Workbook::new();
        let source = workbook.active_id().to_string();
        let ids = add_rows(&mut workbook, &["a", "b", "c"]);
        let target = workbook.create_worksheet(None).id;
        workbook.set_active(&source).unwrap();

        assert_eq!(workbook.move_test_cases(&[ids[1].clone()], &target), Ok(1));
        assert_eq!(workbook.active().test_cases.len(), 2);
        let target_rows = &workbook.worksheets()[1].test_cases;
        assert_eq!(target_rows[0].id, ids[1]);

        assert_eq!(workbook.move_test_cases(&ids, &source), Ok(0));
        assert!(matches!(
            workbook.move_test_cases(&ids, "missing"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_current_view_tracks_mutations_and_view_state() {
        let mut workbook = Workbook::new();
        let ids = add_rows(&mut workbook, &["pricing plans", "password reset"]);

        let first = workbook.current_view();
        assert!(Arc::ptr_eq(&first, &workbook.current_view()));

        workbook.set_search_query("PASSWORD".to_string());
        let searched = workbook.current_view();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].id, ids[1]);

        workbook.set_search_query(String::new());
        workbook.set_filters(vec![FilterConfig::new(
            "runStatus",
            FilterOperator::Equals,
            FilterValue::Text("complete".to_string()),
        )]);
        assert!(workbook.current_view().is_empty());

        workbook.begin_run(&ids[0]).unwrap();
        workbook.finish_run(&ids[0], Ok(outcome(85)));
        let view = workbook.current_view();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, ids[0]);
    }

    #[test]
    fn test_run_bookkeeping_across_worksheets() {
        let mut workbook = Workbook::new();
        let ids = add_rows(&mut workbook, &["a"]);
        workbook.begin_run(&ids[0]).unwrap();
        assert_eq!(workbook.snapshot().running_ids, vec![ids[0].clone()]);

        workbook.create_worksheet(None);
        assert_eq!(workbook.finish_run(&ids[0], Ok(outcome(60))), Some(RunStatus::Complete));
        assert!(workbook.snapshot().running_ids.is_empty());
        assert!(workbook.find_row(&ids[0]).and_then(|row| row.metrics.clone()).is_some());
        assert!(matches!(workbook.begin_run("missing"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_summary_and_groups() {
        let mut workbook = Workbook::new();
        assert!(workbook.summary().is_none());
        let ids = add_rows(&mut workbook, &["a", "b"]);
        workbook.begin_run(&ids[0]).unwrap();
        workbook.finish_run(&ids[0], Ok(outcome(95)));
        workbook.begin_run(&ids[1]).unwrap();
        workbook.finish_run(&ids[1], Ok(outcome(50)));

        let summary = workbook.summary().unwrap();
        assert_eq!(summary.efficiency_score, 50);
        let groups = workbook.recommendation_groups();
        assert!(groups.iter().all(|group| group.row_ids == vec![ids[1].clone()]));
        assert!(!groups.is_empty());
    }
}
