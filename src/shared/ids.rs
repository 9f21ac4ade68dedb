//! Identifier generation for rows, worksheets, and custom columns.

use uuid::Uuid;

/// Prefix shared by every generated custom-column field key.
pub const CUSTOM_FIELD_PREFIX: &str = "custom_";

pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// A fresh `customData` key. Keys are never reused, so a deleted column's
/// data can never reappear under a new column.
pub fn generate_field_key() -> String {
    let simple = Uuid::new_v4().simple().to_string();
    format!("{}{}", CUSTOM_FIELD_PREFIX, &simple[..8])
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
