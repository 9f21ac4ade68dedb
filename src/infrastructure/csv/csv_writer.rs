// ============================================================
// CSV WRITER
// ============================================================
// Render records as CSV text for export and templates

use crate::domain::error::AppError;
use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;

/// CSV writer producing an in-memory string. Every field is quoted.
#[derive(Debug, Default)]
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    fn builder(&self) -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder
            .has_headers(false)
            .quote_style(QuoteStyle::Always);
        builder
    }

    /// Header row followed by one line per record. The header is written even
    /// when there are no records.
    pub fn write_records<T: Serialize>(
        &self,
        headers: &[&str],
        records: &[T],
    ) -> Result<String, AppError> {
        let mut writer = self.builder().from_writer(Vec::new());

        writer
            .write_record(headers)
            .map_err(|e| AppError::IoError(format!("Failed to write CSV header: {}", e)))?;

        for (index, record) in records.iter().enumerate() {
            writer.serialize(record).map_err(|e| {
                AppError::IoError(format!("Failed to write CSV row {}: {}", index + 1, e))
            })?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::IoError(format!("Failed to flush CSV: {}", e)))?;

        String::from_utf8(bytes)
            .map_err(|e| AppError::ParseError(format!("CSV output is not UTF-8: {}", e)))
    }

    /// Header row plus raw string rows.
    pub fn write_rows(&self, headers: &[&str], rows: &[Vec<String>]) -> Result<String, AppError> {
        self.write_records(headers, rows)
    }
}
