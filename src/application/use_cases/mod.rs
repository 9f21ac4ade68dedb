pub mod execution;
pub mod recommendations;
pub mod sample_data;
pub mod test_cases;
pub mod transfer;
pub mod view_pipeline;
pub mod workbook;
pub mod workbook_service;
