use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::common::*;

use crate::config::TaskQueueConfig;
use crate::enrollment::dispatch::{task_queue, AutoLoadJob, DispatchError, QueueDispatcher, TaskDispatcher};
use crate::enrollment::domain::TermId;
use crate::enrollment::errors::{NotFoundError, RegistrarError};
use crate::enrollment::repository::{RegistrarRepository, RegistrarStore, RepositoryError};
use crate::enrollment::store::SqliteRegistrarStore;

fn fast_queue(capacity: usize, max_retries: u32) -> TaskQueueConfig {
    TaskQueueConfig {
        enabled: true,
        capacity,
        max_retries,
        retry_delay: Duration::from_millis(5),
    }
}

fn job(scenario: &Scenario, students: &[&str]) -> AutoLoadJob {
    AutoLoadJob {
        student_ids: students.iter().map(|id| scenario.student(id)).collect(),
        term_id: scenario.active_term.id,
    }
}

/// Store whose first `failures` transactions fail with the error built by `failure`.
struct FlakyStore {
    inner: Arc<SqliteRegistrarStore>,
    failures: AtomicU32,
    attempts: AtomicU32,
    failure: fn() -> RepositoryError,
}

fn locked() -> RepositoryError {
    RepositoryError::Unavailable("database is locked".to_string())
}

fn flaky(scenario: &Scenario, failures: u32, failure: fn() -> RepositoryError) -> Arc<FlakyStore> {
    Arc::new(FlakyStore {
        inner: Arc::clone(&scenario.store),
        failures: AtomicU32::new(failures),
        attempts: AtomicU32::new(0),
        failure,
    })
}

impl RegistrarStore for FlakyStore {
    fn read<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RegistrarRepository) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.inner.read(work)
    }

    fn atomic<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&dyn RegistrarRepository) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err((self.failure)().into());
        }
        self.inner.atomic(work)
    }
}

#[test]
fn disconnected_dispatcher_always_refuses() {
    let scenario = scenario();
    let dispatcher = QueueDispatcher::disconnected();
    assert!(matches!(
        dispatcher.enqueue(job(&scenario, &[BEN])),
        Err(DispatchError::Unavailable(_))
    ));
}

#[tokio::test]
async fn full_queue_reports_saturation() {
    let scenario = scenario();
    let (dispatcher, _worker) = task_queue(Arc::clone(&scenario.store), &fast_queue(1, 0));

    dispatcher
        .enqueue(job(&scenario, &[BEN]))
        .expect("first job fits");
    assert!(matches!(
        dispatcher.enqueue(job(&scenario, &[ANA])),
        Err(DispatchError::Saturated)
    ));
}

#[tokio::test]
async fn stopped_worker_closes_the_queue() {
    let scenario = scenario();
    let (dispatcher, worker) = task_queue(Arc::clone(&scenario.store), &fast_queue(4, 0));
    drop(worker);

    assert!(matches!(
        dispatcher.enqueue(job(&scenario, &[BEN])),
        Err(DispatchError::Unavailable(_))
    ));
}

#[tokio::test]
async fn worker_drains_queued_jobs_until_dispatchers_drop() {
    let scenario = scenario();
    let (dispatcher, worker) = task_queue(Arc::clone(&scenario.store), &fast_queue(4, 0));
    let handle = tokio::spawn(worker.run());

    dispatcher
        .enqueue(job(&scenario, &[ANA]))
        .expect("job queued");
    dispatcher
        .enqueue(job(&scenario, &[BEN, EVE]))
        .expect("job queued");
    drop(dispatcher);

    handle.await.expect("worker exits cleanly");
    assert_eq!(scenario.load_count(), 2);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let scenario = scenario();
    let store = flaky(&scenario, 2, locked);
    let (_dispatcher, worker) = task_queue(Arc::clone(&store), &fast_queue(4, 3));

    let outcome = worker
        .process(job(&scenario, &[ANA]))
        .await
        .expect("third attempt succeeds");
    assert_eq!(outcome.created_load_rows, 1);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_stop_after_the_configured_limit() {
    let scenario = scenario();
    let store = flaky(&scenario, 10, locked);
    let (_dispatcher, worker) = task_queue(Arc::clone(&store), &fast_queue(4, 2));

    let result = worker.process(job(&scenario, &[ANA])).await;
    assert!(matches!(
        result,
        Err(RegistrarError::Repository(RepositoryError::Unavailable(_)))
    ));
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(scenario.load_count(), 0);
}

#[tokio::test]
async fn rule_violations_are_not_retried() {
    let scenario = scenario();
    let store = flaky(&scenario, 0, locked);
    let (_dispatcher, worker) = task_queue(Arc::clone(&store), &fast_queue(4, 3));

    let mut missing_term = job(&scenario, &[ANA]);
    missing_term.term_id = TermId(321);
    let result = worker.process(missing_term).await;

    assert!(matches!(
        result,
        Err(RegistrarError::NotFound(NotFoundError::Term(TermId(321))))
    ));
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn query_failures_are_not_retried() {
    let scenario = scenario();
    let store = flaky(&scenario, 10, || {
        RepositoryError::Query("too many SQL variables".to_string())
    });
    let (_dispatcher, worker) = task_queue(Arc::clone(&store), &fast_queue(4, 3));

    let result = worker.process(job(&scenario, &[ANA])).await;
    assert!(matches!(
        result,
        Err(RegistrarError::Repository(RepositoryError::Query(_)))
    ));
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);
}
