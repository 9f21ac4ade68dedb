//! Stand-in agent that answers with placeholder text and randomized scores.

use super::AgentBackend;
use crate::domain::error::Result;
use crate::domain::run::{RunMode, RunOutcome, RunRequest};
use crate::domain::test_case::NewTestCase;
use crate::domain::transfer::{AutoGenerateConfig, GenerationSource};
use crate::infrastructure::config::{DelayBand, ExecutionConfig};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::debug;
use validator::Validate;

const PLACEHOLDER_RESPONSE: &str = "This is a simulated AI response. In production, this would be the actual response from your AI agent based on the question.";

const FORCED_PASS_FLOOR: u8 = 82;

/// Accuracy band `[min, max)` and the chance of forcing a pass, per simulation
/// pass.
fn simulation_band(pass: u32) -> (u8, u8, f64) {
    match pass {
        0 | 1 => (65, 80, 0.5),
        2 => (75, 88, 0.75),
        _ => (85, 98, 0.95),
    }
}

pub fn standard_accuracy<R: Rng>(rng: &mut R) -> u8 {
    rng.gen_range(70..100)
}

pub fn simulation_accuracy<R: Rng>(rng: &mut R, pass: u32) -> u8 {
    let (min, max, force_pass) = simulation_band(pass);
    let accuracy = if rng.gen_bool(force_pass) {
        // Pass 1 tops out below 82, so its forced draw is exactly 82.
        let floor = min.max(FORCED_PASS_FLOOR);
        rng.gen_range(floor..max.max(floor + 1))
    } else {
        rng.gen_range(min..max)
    };
    accuracy.min(99)
}

/// Seconds in `[0.5, 3.5)`, one decimal.
pub fn latency<R: Rng>(rng: &mut R) -> f64 {
    let raw: f64 = rng.gen_range(0.5..3.5);
    (raw * 10.0).round() / 10.0
}

pub fn accuracy_for<R: Rng>(rng: &mut R, mode: RunMode) -> u8 {
    match mode {
        RunMode::Standard => standard_accuracy(rng),
        RunMode::Simulation { pass } => simulation_accuracy(rng, pass),
    }
}

pub fn draw_delay<R: Rng>(rng: &mut R, band: DelayBand) -> Duration {
    let ms = if band.max_ms <= band.min_ms {
        band.min_ms
    } else {
        rng.gen_range(band.min_ms..=band.max_ms)
    };
    Duration::from_millis(ms)
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

pub struct SimulatedAgent {
    config: ExecutionConfig,
}

impl SimulatedAgent {
    pub fn new(config: ExecutionConfig) -> Self {
        Self { config }
    }

    fn band_for(&self, mode: RunMode) -> DelayBand {
        if mode.is_simulation() {
            self.config.simulation_delay_ms
        } else {
            self.config.standard_delay_ms
        }
    }
}

#[async_trait]
impl AgentBackend for SimulatedAgent {
    async fn respond(&self, request: &RunRequest, mode: RunMode) -> Result<RunOutcome> {
        let delay = {
            let mut rng = rand::thread_rng();
            draw_delay(&mut rng, self.band_for(mode))
        };
        pause(delay).await;

        let (accuracy, latency) = {
            let mut rng = rand::thread_rng();
            (accuracy_for(&mut rng, mode), latency(&mut rng))
        };
        debug!(
            row_id = %request.row_id,
            accuracy,
            latency,
            simulation = mode.is_simulation(),
            "Scored simulated response"
        );

        Ok(RunOutcome {
            content: PLACEHOLDER_RESPONSE.to_string(),
            accuracy,
            latency,
        })
    }

    async fn generate_cases(&self, config: &AutoGenerateConfig) -> Result<Vec<NewTestCase>> {
        config.validate()?;
        pause(Duration::from_millis(self.config.generation_delay_ms)).await;

        let notes = match (config.based_on, config.custom_prompt.as_deref()) {
            (GenerationSource::Custom, Some(prompt)) if !prompt.trim().is_empty() => {
                format!("Auto-generated from prompt: {}", prompt.trim())
            }
            _ => "Auto-generated".to_string(),
        };

        Ok((1..=config.count)
            .map(|n| NewTestCase {
                question: format!("Generated question {}: What is [topic {}]?", n, n),
                expected_answer: format!(
                    "Expected answer for question {}. This would be generated based on your knowledge base.",
                    n
                ),
                leading_questions: format!("Alternative way to ask question {}", n),
                notes: notes.clone(),
                ..Default::default()
            })
            .collect())
    }
}
