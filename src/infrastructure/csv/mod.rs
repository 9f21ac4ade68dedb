// ============================================================
// CSV INFRASTRUCTURE LAYER
// ============================================================
// CSV output for exports and the import template

mod csv_writer;

pub use csv_writer::CsvWriter;
