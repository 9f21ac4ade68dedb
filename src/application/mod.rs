pub mod use_cases;

pub use use_cases::execution::ExecutionEngine;
pub use use_cases::test_cases::TestCaseCollection;
pub use use_cases::workbook::{Workbook, WorkbookSnapshot};
pub use use_cases::workbook_service::WorkbookHandle;
