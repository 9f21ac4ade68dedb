//! Single-owner access to the [`Workbook`].
//!
//! The workbook lives inside one spawned task. Callers send closures over a
//! channel and await the reply, so every mutation is applied in arrival order
//! and nothing else ever holds a reference to the state.

use crate::application::use_cases::workbook::Workbook;
use crate::domain::error::{AppError, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = Box<dyn FnOnce(&mut Workbook) + Send>;

#[derive(Clone)]
pub struct WorkbookHandle {
    jobs: mpsc::UnboundedSender<Job>,
}

impl WorkbookHandle {
    /// Move `workbook` into a new task and return a handle to it. Must be
    /// called from within a tokio runtime.
    pub fn spawn(mut workbook: Workbook) -> Self {
        let (jobs, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job(&mut workbook);
            }
            debug!("Workbook service stopped");
        });
        Self { jobs }
    }

    /// Run `f` against the workbook and return its result.
    pub async fn with<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Workbook) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |workbook: &mut Workbook| {
            let _ = reply.send(f(workbook));
        });
        if self.jobs.send(job).is_err() {
            error!("Workbook service is no longer running");
            return Err(AppError::Internal("Workbook service is not running".to_string()));
        }
        response
            .await
            .map_err(|_| AppError::Internal("Workbook service dropped the request".to_string()))
    }

    /// Like [`with`](Self::with) for closures that already return a `Result`.
    pub async fn try_with<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Workbook) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.with(f).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_case::NewTestCase;

    #[tokio::test]
    async fn test_jobs_apply_in_order() {
        let handle = WorkbookHandle::spawn(Workbook::new());
        for question in ["first", "second", "third"] {
            let question = question.to_string();
            handle
                .try_with(move |workbook| {
                    workbook.cases().add(NewTestCase {
                        question,
                        ..Default::default()
                    })
                })
                .await
                .unwrap();
        }

        let questions = handle
            .with(|workbook| {
                workbook
                    .active()
                    .test_cases
                    .iter()
                    .map(|row| row.question.clone())
                    .collect::<Vec<_>>()
            })
            .await
            .unwrap();
        assert_eq!(questions, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_try_with_flattens_errors() {
        let handle = WorkbookHandle::spawn(Workbook::new());
        let result = handle
            .try_with(|workbook| workbook.set_active("missing"))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let clone = handle.clone();
        let count = clone.with(|workbook| workbook.worksheets().len()).await;
        assert_eq!(count, Ok(1));
    }
}
