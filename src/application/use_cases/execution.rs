//! Test execution engine.
//!
//! Rows run strictly one after another. Progress and engine status are
//! published on `watch` channels; a stop request is honoured before the next
//! row starts and never interrupts a row already in flight.

use crate::application::use_cases::sample_data::sample_test_cases;
use crate::application::use_cases::workbook_service::WorkbookHandle;
use crate::domain::error::{AppError, Result};
use crate::domain::run::{
    BatchReport, EngineStatus, RunMode, SimulationConfig, SimulationStatus, TestProgress,
};
use crate::domain::test_case::{RunStatus, TestCaseRow};
use crate::domain::transfer::AutoGenerateConfig;
use crate::infrastructure::agent::AgentBackend;
use crate::infrastructure::config::ExecutionConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use validator::Validate;

/// Flags and channels shared between the engine and the batch it is running.
struct RunState {
    stop_requested: AtomicBool,
    batch_active: AtomicBool,
    progress: watch::Sender<TestProgress>,
    status: watch::Sender<EngineStatus>,
}

/// The claimed batch slot. Only one exists at a time; dropping it clears the
/// batch flag and the engine status, however the batch ended.
pub struct BatchGuard {
    state: Arc<RunState>,
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        self.state.batch_active.store(false, Ordering::SeqCst);
        self.state.status.send_replace(EngineStatus::default());
    }
}

/// A batch slot claimed for a simulation with an already validated config.
pub struct SimulationClaim {
    guard: BatchGuard,
    config: SimulationConfig,
}

async fn pause_ms(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

pub struct ExecutionEngine {
    workbook: WorkbookHandle,
    backend: Arc<dyn AgentBackend>,
    config: ExecutionConfig,
    state: Arc<RunState>,
}

impl ExecutionEngine {
    pub fn new(
        workbook: WorkbookHandle,
        backend: Arc<dyn AgentBackend>,
        config: ExecutionConfig,
    ) -> Self {
        let (progress, _) = watch::channel(TestProgress::default());
        let (status, _) = watch::channel(EngineStatus::default());
        Self {
            workbook,
            backend,
            config,
            state: Arc::new(RunState {
                stop_requested: AtomicBool::new(false),
                batch_active: AtomicBool::new(false),
                progress,
                status,
            }),
        }
    }

    pub fn workbook(&self) -> &WorkbookHandle {
        &self.workbook
    }

    pub fn progress(&self) -> TestProgress {
        *self.state.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<TestProgress> {
        self.state.progress.subscribe()
    }

    pub fn status(&self) -> EngineStatus {
        *self.state.status.borrow()
    }

    pub fn is_batch_active(&self) -> bool {
        self.state.batch_active.load(Ordering::SeqCst)
    }

    /// Ask the current batch to stop before its next row. A stop that arrives
    /// after a batch was claimed but before its first row still applies.
    pub fn stop(&self) {
        if self.is_batch_active() {
            info!("Stop requested");
        }
        self.state.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Run a single row in standard mode.
    pub async fn run_test(&self, id: &str) -> Result<RunStatus> {
        self.run_one(id, RunMode::Standard).await?.ok_or_else(|| {
            AppError::NotFound(format!("Test case {} was removed while running", id))
        })
    }

    /// Take the batch slot, or `Conflict` if a batch already holds it. Clears
    /// any earlier stop request.
    pub fn claim_batch(&self) -> Result<BatchGuard> {
        self.claim(None)
    }

    /// Validate `config` and take the batch slot for a simulation.
    pub fn claim_simulation(&self, config: SimulationConfig) -> Result<SimulationClaim> {
        config.validate()?;
        let guard = self.claim(Some(SimulationStatus {
            pass: 1,
            runs_to_reach: config.runs_to_reach,
            target_score: config.target_score,
        }))?;
        Ok(SimulationClaim { guard, config })
    }

    /// Run rows sequentially, in the order given.
    pub async fn run_tests(&self, ids: Vec<String>) -> Result<BatchReport> {
        let guard = self.claim_batch()?;
        self.run_claimed_tests(guard, ids).await
    }

    /// Like [`run_tests`](Self::run_tests) on a slot claimed beforehand.
    pub async fn run_claimed_tests(&self, guard: BatchGuard, ids: Vec<String>) -> Result<BatchReport> {
        let _guard = guard;
        info!(total = ids.len(), "Starting test batch");
        let report = self.run_pass(&ids, RunMode::Standard).await?;
        info!(
            completed = report.completed,
            total = report.total,
            cancelled = report.cancelled,
            "Test batch finished"
        );
        Ok(report)
    }

    /// Run every row once per pass, with scores improving pass over pass.
    /// `on_pass_complete` is called with the 1-indexed number of each pass
    /// that ran at least one row.
    pub async fn run_simulation<F>(
        &self,
        ids: Vec<String>,
        config: SimulationConfig,
        on_pass_complete: F,
    ) -> Result<Vec<BatchReport>>
    where
        F: FnMut(u32) + Send,
    {
        let claim = self.claim_simulation(config)?;
        self.run_claimed_simulation(claim, ids, on_pass_complete).await
    }

    pub async fn run_claimed_simulation<F>(
        &self,
        claim: SimulationClaim,
        ids: Vec<String>,
        mut on_pass_complete: F,
    ) -> Result<Vec<BatchReport>>
    where
        F: FnMut(u32) + Send,
    {
        let SimulationClaim { guard: _guard, config } = claim;
        info!(
            rows = ids.len(),
            runs_to_reach = config.runs_to_reach,
            target_score = config.target_score,
            "Starting simulation"
        );

        let mut reports = Vec::new();
        for pass in 1..=config.runs_to_reach {
            self.state.status.send_modify(|status| {
                if let Some(simulation) = status.simulation.as_mut() {
                    simulation.pass = pass;
                }
            });
            let report = self.run_pass(&ids, RunMode::Simulation { pass }).await?;
            info!(pass, completed = report.completed, "Simulation pass finished");
            if !report.stopped_before_start() {
                on_pass_complete(pass);
            }
            let cancelled = report.cancelled;
            reports.push(report);
            if cancelled {
                break;
            }
            if pass < config.runs_to_reach {
                pause_ms(self.config.inter_pass_delay_ms).await;
            }
        }
        Ok(reports)
    }

    /// Ask the agent for new rows and append them to the active worksheet.
    pub async fn generate_test_cases(&self, config: AutoGenerateConfig) -> Result<Vec<TestCaseRow>> {
        config.validate()?;
        let cases = self.backend.generate_cases(&config).await?;
        let rows = self
            .workbook
            .try_with(move |workbook| workbook.cases().add_many(cases))
            .await?;
        info!(count = rows.len(), "Generated test cases");
        Ok(rows)
    }

    /// Replace the active worksheet's rows with the canned sample set.
    pub async fn load_sample_data(&self) -> Result<usize> {
        pause_ms(self.config.sample_data_delay_ms).await;
        let rows = sample_test_cases();
        let count = rows.len();
        self.workbook
            .with(move |workbook| workbook.load_sample_data(rows))
            .await?;
        Ok(count)
    }

    fn claim(&self, simulation: Option<SimulationStatus>) -> Result<BatchGuard> {
        if self
            .state
            .batch_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::Conflict("A test batch is already running".to_string()));
        }
        self.state.stop_requested.store(false, Ordering::SeqCst);
        self.state.status.send_replace(EngineStatus {
            is_running: true,
            simulation,
        });
        Ok(BatchGuard {
            state: Arc::clone(&self.state),
        })
    }

    async fn run_one(&self, id: &str, mode: RunMode) -> Result<Option<RunStatus>> {
        let row_id = id.to_string();
        let request = self
            .workbook
            .try_with(move |workbook| workbook.begin_run(&row_id))
            .await?;

        let outcome = self.backend.respond(&request, mode).await;

        let row_id = id.to_string();
        self.workbook
            .with(move |workbook| workbook.finish_run(&row_id, outcome))
            .await
    }

    async fn run_pass(&self, ids: &[String], mode: RunMode) -> Result<BatchReport> {
        let total = ids.len();
        self.state.progress.send_replace(TestProgress::starting(total));
        let started = Instant::now();
        let mut completed = 0;
        let mut cancelled = false;

        for id in ids {
            if self.state.stop_requested.load(Ordering::SeqCst) {
                info!(completed, total, "Test batch stopped");
                cancelled = true;
                break;
            }

            match self.run_one(id, mode).await {
                Ok(Some(status)) => debug!(row_id = %id, status = status.as_str(), "Row finished"),
                Ok(None) => debug!(row_id = %id, "Row removed while running"),
                Err(AppError::Internal(message)) => {
                    self.state.progress.send_replace(TestProgress::default());
                    return Err(AppError::Internal(message));
                }
                Err(err) => warn!(row_id = %id, error = %err, "Skipping row"),
            }

            completed += 1;
            let per_row = started.elapsed().as_secs_f64() / completed as f64;
            let remaining = (per_row * (total - completed) as f64).round() as u64;
            self.state.progress.send_replace(TestProgress {
                completed,
                total,
                estimated_time_remaining: Some(remaining),
            });
            tokio::task::yield_now().await;
        }

        pause_ms(self.config.progress_reset_delay_ms).await;
        self.state.progress.send_replace(TestProgress::default());

        Ok(BatchReport {
            completed,
            total,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::workbook::Workbook;
    use crate::domain::run::{RunOutcome, RunRequest};
    use crate::domain::test_case::{NewTestCase, TestStatus};
    use crate::domain::transfer::GenerationSource;
    use crate::infrastructure::agent::SimulatedAgent;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend that records call order and fails on request.
    struct ScriptedAgent {
        calls: Mutex<Vec<String>>,
        fail_question: Option<String>,
        delay: Duration,
    }

    impl ScriptedAgent {
        fn new(fail_question: Option<&str>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_question: fail_question.map(str::to_string),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(ms),
                ..Self::new(None)
            }
        }
    }

    #[async_trait]
    impl AgentBackend for ScriptedAgent {
        async fn respond(&self, request: &RunRequest, _mode: RunMode) -> Result<RunOutcome> {
            self.calls.lock().unwrap().push(request.question.clone());
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail_question.as_deref() == Some(request.question.as_str()) {
                return Err(AppError::Internal("agent unavailable".to_string()));
            }
            Ok(RunOutcome {
                content: format!("answer to {}", request.question),
                accuracy: 90,
                latency: 1.0,
            })
        }

        async fn generate_cases(&self, _config: &AutoGenerateConfig) -> Result<Vec<NewTestCase>> {
            Ok(Vec::new())
        }
    }

    async fn engine_with(
        backend: Arc<dyn AgentBackend>,
        questions: &[&str],
    ) -> (Arc<ExecutionEngine>, Vec<String>) {
        let handle = WorkbookHandle::spawn(Workbook::new());
        let questions: Vec<String> = questions.iter().map(|q| q.to_string()).collect();
        let ids = handle
            .with(move |workbook| {
                questions
                    .into_iter()
                    .map(|question| {
                        workbook
                            .cases()
                            .add(NewTestCase {
                                question,
                                ..Default::default()
                            })
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<_>>()
            })
            .await
            .unwrap();
        let engine = ExecutionEngine::new(handle, backend, ExecutionConfig::immediate());
        (Arc::new(engine), ids)
    }

    /// Every progress snapshot published from now until the next reset.
    fn collect_progress(engine: &ExecutionEngine) -> tokio::task::JoinHandle<Vec<TestProgress>> {
        let mut progress = engine.subscribe_progress();
        tokio::spawn(async move {
            let mut snapshots = Vec::new();
            while progress.changed().await.is_ok() {
                let snapshot = *progress.borrow_and_update();
                snapshots.push(snapshot);
                if snapshot.is_idle() {
                    break;
                }
            }
            snapshots
        })
    }

    async fn rows(engine: &ExecutionEngine) -> Vec<TestCaseRow> {
        engine
            .workbook()
            .with(|workbook| workbook.active().test_cases.clone())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_run_tests_is_sequential_in_given_order() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let (engine, ids) = engine_with(agent.clone(), &["a", "b", "c"]).await;
        let order = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];

        let report = engine.run_tests(order).await.unwrap();
        assert_eq!(report, BatchReport { completed: 3, total: 3, cancelled: false });
        assert_eq!(*agent.calls.lock().unwrap(), vec!["c", "a", "b"]);
        assert!(rows(&engine).await.iter().all(|row| row.run_status == RunStatus::Complete));
        assert!(engine.progress().is_idle());
        assert!(!engine.status().is_running);
    }

    #[tokio::test]
    async fn test_progress_snapshots_over_a_batch() {
        let agent = Arc::new(ScriptedAgent::with_delay(20));
        let (engine, ids) = engine_with(agent, &["a", "b", "c"]).await;
        let collector = collect_progress(&engine);

        engine.run_tests(ids).await.unwrap();
        let snapshots = collector.await.unwrap();

        assert_eq!(snapshots.len(), 5);
        assert_eq!(snapshots[0], TestProgress::starting(3));
        for (index, snapshot) in snapshots[1..4].iter().enumerate() {
            assert_eq!(snapshot.completed, index + 1);
            assert_eq!(snapshot.total, 3);
            assert!(snapshot.estimated_time_remaining.is_some());
        }
        assert!(snapshots[..4]
            .windows(2)
            .all(|pair| pair[0].completed <= pair[1].completed));
        assert_eq!(snapshots[4], TestProgress::default());
        assert_eq!(snapshots[4].estimated_time_remaining, None);
    }

    #[tokio::test]
    async fn test_stop_after_second_row() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let (engine, ids) = engine_with(agent, &["a", "b", "c", "d", "e"]).await;
        let mut progress = engine.subscribe_progress();

        let task = {
            let engine = Arc::clone(&engine);
            let ids = ids.clone();
            tokio::spawn(async move { engine.run_tests(ids).await })
        };

        let mut last_active = TestProgress::default();
        loop {
            progress.changed().await.unwrap();
            let snapshot = *progress.borrow_and_update();
            if snapshot.is_idle() {
                break;
            }
            last_active = snapshot;
            if snapshot.completed == 2 {
                engine.stop();
            }
        }
        assert_eq!(last_active.completed, 2);
        assert_eq!(last_active.total, 5);

        let report = task.await.unwrap().unwrap();
        assert_eq!(report.completed, 2);
        assert!(report.cancelled);

        let rows = rows(&engine).await;
        assert!(rows[..2].iter().all(|row| row.run_status == RunStatus::Complete));
        assert!(rows[2..]
            .iter()
            .all(|row| row.run_status == RunStatus::Idle && row.metrics.is_none()));
        assert!(engine.progress().is_idle());
    }

    #[tokio::test]
    async fn test_backend_error_marks_row_and_batch_continues() {
        let agent = Arc::new(ScriptedAgent::new(Some("b")));
        let (engine, ids) = engine_with(agent, &["a", "b", "c"]).await;

        let report = engine.run_tests(ids).await.unwrap();
        assert_eq!(report.completed, 3);
        let statuses: Vec<RunStatus> = rows(&engine).await.iter().map(|r| r.run_status).collect();
        assert_eq!(
            statuses,
            vec![RunStatus::Complete, RunStatus::Error, RunStatus::Complete]
        );
    }

    #[tokio::test]
    async fn test_run_test_conflicts_while_running() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let (engine, ids) = engine_with(agent, &["a"]).await;
        let id = ids[0].clone();
        engine
            .workbook()
            .try_with({
                let id = id.clone();
                move |workbook| workbook.begin_run(&id)
            })
            .await
            .unwrap();

        assert!(matches!(engine.run_test(&id).await, Err(AppError::Conflict(_))));

        let report = engine.run_tests(vec![id.clone()]).await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(rows(&engine).await[0].run_status, RunStatus::Running);
    }

    #[tokio::test]
    async fn test_second_batch_is_rejected() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let (engine, ids) = engine_with(agent, &["a"]).await;
        let guard = engine.claim_batch().unwrap();
        assert!(engine.status().is_running);
        assert!(matches!(engine.run_tests(ids.clone()).await, Err(AppError::Conflict(_))));
        assert!(matches!(engine.claim_batch(), Err(AppError::Conflict(_))));
        drop(guard);
        assert!(!engine.status().is_running);
        assert!(engine.run_tests(ids).await.is_ok());
    }

    #[tokio::test]
    async fn test_stop_between_claim_and_start_cancels_batch() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let (engine, ids) = engine_with(agent.clone(), &["a", "b", "c"]).await;

        let guard = engine.claim_batch().unwrap();
        engine.stop();
        let report = engine.run_claimed_tests(guard, ids).await.unwrap();

        assert_eq!(report, BatchReport { completed: 0, total: 3, cancelled: true });
        assert!(agent.calls.lock().unwrap().is_empty());
        assert!(!engine.is_batch_active());
    }

    #[tokio::test]
    async fn test_claim_clears_earlier_stop() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let (engine, ids) = engine_with(agent, &["a", "b"]).await;

        engine.stop();
        let report = engine.run_tests(ids).await.unwrap();
        assert_eq!(report.completed, 2);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_stop_between_passes_skips_pass_callback() {
        let agent = Arc::new(SimulatedAgent::new(ExecutionConfig::immediate()));
        let (engine, ids) = engine_with(agent, &["a", "b"]).await;
        let mut passes = Vec::new();

        let reports = engine
            .run_simulation(ids, SimulationConfig::default(), |pass| {
                passes.push(pass);
                engine.stop();
            })
            .await
            .unwrap();

        assert_eq!(passes, vec![1]);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].completed, 2);
        assert!(reports[1].stopped_before_start());
        assert!(rows(&engine).await.iter().all(|row| row.metrics.is_some()));
    }

    #[tokio::test]
    async fn test_run_test_unknown_row() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let (engine, _) = engine_with(agent, &[]).await;
        assert!(matches!(engine.run_test("missing").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_simulation_final_pass_scores_high() {
        let agent = Arc::new(SimulatedAgent::new(ExecutionConfig::immediate()));
        let (engine, ids) = engine_with(agent, &["a", "b", "c", "d"]).await;
        let mut passes = Vec::new();

        let reports = engine
            .run_simulation(ids, SimulationConfig::default(), |pass| passes.push(pass))
            .await
            .unwrap();

        assert_eq!(passes, vec![1, 2, 3]);
        assert_eq!(reports.len(), 3);
        for row in rows(&engine).await {
            let metrics = row.metrics.unwrap();
            assert!((85..98).contains(&metrics.accuracy));
            assert_eq!(metrics.status, TestStatus::Passed);
        }
        assert_eq!(engine.status(), EngineStatus::default());
    }

    #[tokio::test]
    async fn test_simulation_rejects_zero_runs() {
        let agent = Arc::new(ScriptedAgent::new(None));
        let (engine, ids) = engine_with(agent, &["a"]).await;
        let config = SimulationConfig {
            target_score: 88,
            runs_to_reach: 0,
        };
        let result = engine.run_simulation(ids, config, |_| {}).await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert!(!engine.is_batch_active());
    }

    #[tokio::test]
    async fn test_generate_and_sample_data() {
        let agent = Arc::new(SimulatedAgent::new(ExecutionConfig::immediate()));
        let (engine, _) = engine_with(agent, &["existing"]).await;

        let generated = engine
            .generate_test_cases(AutoGenerateConfig {
                count: 2,
                based_on: GenerationSource::Previous,
                custom_prompt: None,
            })
            .await
            .unwrap();
        assert_eq!(generated.len(), 2);
        assert_eq!(rows(&engine).await.len(), 3);

        let loaded = engine.load_sample_data().await.unwrap();
        let after = rows(&engine).await;
        assert_eq!(after.len(), loaded);
        assert!(after.iter().all(|row| row.question != "existing"));
    }
}
