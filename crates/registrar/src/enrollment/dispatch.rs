//! Background execution of auto-load jobs.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::TaskQueueConfig;

use super::auto_load::{auto_load, AutoLoadOutcome};
use super::domain::{StudentId, TermId};
use super::errors::RegistrarError;
use super::repository::{RegistrarStore, RepositoryError};

/// Deferred auto-load request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoLoadJob {
    pub student_ids: Vec<StudentId>,
    pub term_id: TermId,
}

/// Capability for handing auto-load jobs to something that runs them later.
pub trait TaskDispatcher: Send + Sync {
    fn enqueue(&self, job: AutoLoadJob) -> Result<(), DispatchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("task queue unavailable: {0}")]
    Unavailable(String),
    #[error("task queue is full")]
    Saturated,
}

/// Producer half of the bounded in-process job queue.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    sender: Option<mpsc::Sender<AutoLoadJob>>,
}

impl QueueDispatcher {
    /// Dispatcher with no backing worker; every enqueue fails.
    pub fn disconnected() -> Self {
        Self { sender: None }
    }
}

impl TaskDispatcher for QueueDispatcher {
    fn enqueue(&self, job: AutoLoadJob) -> Result<(), DispatchError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| DispatchError::Unavailable("task queue disabled".to_string()))?;

        sender.try_send(job).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => DispatchError::Saturated,
            mpsc::error::TrySendError::Closed(_) => {
                DispatchError::Unavailable("worker has shut down".to_string())
            }
        })
    }
}

/// Retry policy for transient auto-load failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl From<&TaskQueueConfig> for RetryPolicy {
    fn from(config: &TaskQueueConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: config.retry_delay,
        }
    }
}

/// Consumer half of the job queue; run it with [`AutoLoadWorker::run`] on the tokio runtime.
pub struct AutoLoadWorker<S> {
    store: Arc<S>,
    receiver: mpsc::Receiver<AutoLoadJob>,
    retry: RetryPolicy,
}

/// Build a connected dispatcher/worker pair sized from `config`.
pub fn task_queue<S>(store: Arc<S>, config: &TaskQueueConfig) -> (QueueDispatcher, AutoLoadWorker<S>)
where
    S: RegistrarStore + 'static,
{
    let (sender, receiver) = mpsc::channel(config.capacity.max(1));
    let dispatcher = QueueDispatcher {
        sender: Some(sender),
    };
    let worker = AutoLoadWorker {
        store,
        receiver,
        retry: RetryPolicy::from(config),
    };
    (dispatcher, worker)
}

impl<S> AutoLoadWorker<S>
where
    S: RegistrarStore + 'static,
{
    /// Drain jobs until every dispatcher handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            let _ = self.process(job).await;
        }
        info!("auto-load worker stopped");
    }

    /// Run one job, retrying transient persistence failures.
    pub async fn process(&self, job: AutoLoadJob) -> Result<AutoLoadOutcome, RegistrarError> {
        let mut attempt = 0;
        loop {
            let store = Arc::clone(&self.store);
            let batch = job.clone();
            let result = tokio::task::spawn_blocking(move || {
                auto_load(store.as_ref(), &batch.student_ids, batch.term_id)
            })
            .await;

            let result = match result {
                Ok(result) => result,
                Err(join_error) => {
                    error!(error = %join_error, "auto-load job panicked");
                    return Err(RepositoryError::Unavailable(join_error.to_string()).into());
                }
            };

            match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        term_id = %job.term_id,
                        attempt,
                        error = %err,
                        "auto-load failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(err) => {
                    error!(term_id = %job.term_id, error = %err, "auto-load job failed");
                    return Err(err);
                }
            }
        }
    }
}

/// Runs jobs immediately on the caller's thread.
pub struct InlineDispatcher<S> {
    store: Arc<S>,
}

impl<S> InlineDispatcher<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S> TaskDispatcher for InlineDispatcher<S>
where
    S: RegistrarStore,
{
    fn enqueue(&self, job: AutoLoadJob) -> Result<(), DispatchError> {
        if let Err(err) = auto_load(self.store.as_ref(), &job.student_ids, job.term_id) {
            warn!(term_id = %job.term_id, error = %err, "inline auto-load failed");
        }
        Ok(())
    }
}
