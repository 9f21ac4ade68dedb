use crate::domain::test_case::TestCaseRow;
use crate::shared::{generate_field_key, generate_id, now_millis};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COLUMN_WIDTH: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Multiselect,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomColumn {
    pub id: String,
    pub name: String,
    /// Key into each row's `customData`.
    pub field: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    pub created_at: i64,
}

impl CustomColumn {
    pub fn new(name: String, column_type: ColumnType, options: Option<Vec<String>>) -> Self {
        let options = match column_type {
            ColumnType::Multiselect => Some(options.unwrap_or_default()),
            _ => None,
        };
        Self {
            id: generate_id(),
            name,
            field: generate_field_key(),
            column_type,
            options,
            width: Some(DEFAULT_COLUMN_WIDTH),
            created_at: now_millis(),
        }
    }

    /// Copy used when duplicating a single column: new id, new field key.
    pub fn clone_as_copy(&self) -> Self {
        Self {
            id: generate_id(),
            name: format!("{} (copy)", self.name),
            field: generate_field_key(),
            column_type: self.column_type,
            options: self.options.clone(),
            width: self.width,
            created_at: now_millis(),
        }
    }

    /// Copy used when duplicating a whole worksheet. The field key is kept so
    /// the copied rows' `customData` still lines up.
    pub fn clone_for_duplication(&self) -> Self {
        Self {
            id: generate_id(),
            created_at: now_millis(),
            ..self.clone()
        }
    }

    pub fn apply_patch(&mut self, patch: CustomColumnPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(column_type) = patch.column_type {
            self.column_type = column_type;
        }
        if let Some(options) = patch.options {
            self.options = Some(options);
        }
        if let Some(width) = patch.width {
            self.width = Some(width);
        }
        if self.column_type != ColumnType::Multiselect {
            self.options = None;
        } else if self.options.is_none() {
            self.options = Some(Vec::new());
        }
    }
}

/// Editable column properties; `id` and `field` never change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomColumnPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub column_type: Option<ColumnType>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub width: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Worksheet {
    pub id: String,
    pub name: String,
    pub test_cases: Vec<TestCaseRow>,
    pub custom_columns: Vec<CustomColumn>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Bumped on every mutation of this worksheet; keys the derived-view cache.
    #[serde(skip)]
    pub revision: u64,
}

impl Worksheet {
    pub fn new(name: String) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            name,
            test_cases: Vec::new(),
            custom_columns: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// Deep copy with fresh ids for the worksheet, every row, and every column.
    /// Rows lose their run results.
    pub fn clone_for_duplication(&self) -> Self {
        let now = now_millis();
        Self {
            id: generate_id(),
            name: format!("{} (copy)", self.name),
            test_cases: self
                .test_cases
                .iter()
                .map(TestCaseRow::clone_for_duplication)
                .collect(),
            custom_columns: self
                .custom_columns
                .iter()
                .map(CustomColumn::clone_for_duplication)
                .collect(),
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    pub fn mark_changed(&mut self) {
        self.revision = self.revision.wrapping_add(1);
        self.updated_at = now_millis();
    }

    pub fn find_row(&self, id: &str) -> Option<&TestCaseRow> {
        self.test_cases.iter().find(|row| row.id == id)
    }

    pub fn find_row_mut(&mut self, id: &str) -> Option<&mut TestCaseRow> {
        self.test_cases.iter_mut().find(|row| row.id == id)
    }

    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.custom_columns.iter().position(|col| col.id == column_id)
    }

    pub fn has_custom_field(&self, field: &str) -> bool {
        self.custom_columns.iter().any(|col| col.field == field)
    }
}
