pub mod simulated;

use crate::domain::error::Result;
use crate::domain::run::{RunMode, RunOutcome, RunRequest};
use crate::domain::test_case::NewTestCase;
use crate::domain::transfer::AutoGenerateConfig;
use async_trait::async_trait;

pub use simulated::SimulatedAgent;

/// The conversational agent under test.
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Ask the agent one row's question and score the answer.
    async fn respond(&self, request: &RunRequest, mode: RunMode) -> Result<RunOutcome>;
    async fn generate_cases(&self, config: &AutoGenerateConfig) -> Result<Vec<NewTestCase>>;
}
