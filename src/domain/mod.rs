pub mod error;
pub mod recommendation;
pub mod run;
pub mod test_case;
pub mod transfer;
pub mod view;
pub mod worksheet;
