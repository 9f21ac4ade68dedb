use serde::{Deserialize, Serialize};
use validator::Validate;

/// Progress of the current batch, read by the progress banner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestProgress {
    pub completed: usize,
    pub total: usize,
    /// Whole seconds. `None` until the first row completes and after the
    /// batch has been reset.
    pub estimated_time_remaining: Option<u64>,
}

impl TestProgress {
    pub fn starting(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            estimated_time_remaining: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.total == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    #[validate(range(min = 1, max = 100))]
    pub target_score: u8,
    #[validate(range(min = 1, max = 10))]
    pub runs_to_reach: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            target_score: 88,
            runs_to_reach: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationStatus {
    /// 1-indexed pass currently executing.
    pub pass: u32,
    pub runs_to_reach: u32,
    pub target_score: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub is_running: bool,
    pub simulation: Option<SimulationStatus>,
}

/// Scoring regime for a single run. Passed explicitly into every run so an
/// in-flight row never depends on shared mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Standard,
    /// 1-indexed pass of a multi-pass simulation.
    Simulation { pass: u32 },
}

impl RunMode {
    pub fn is_simulation(&self) -> bool {
        matches!(self, RunMode::Simulation { .. })
    }
}

/// What the agent backend needs to know about a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub row_id: String,
    pub worksheet_id: String,
    pub question: String,
    pub expected_answer: String,
    pub leading_questions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub content: String,
    pub accuracy: u8,
    pub latency: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub completed: usize,
    pub total: usize,
    pub cancelled: bool,
}

impl BatchReport {
    /// Stopped before its first row ran.
    pub fn stopped_before_start(&self) -> bool {
        self.cancelled && self.completed == 0
    }
}
