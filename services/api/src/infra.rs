use metrics_exporter_prometheus::PrometheusHandle;
use registrar::enrollment::{QueueDispatcher, RegistrarService, SqliteRegistrarStore};
use registrar::error::AppError;
use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type CliService = RegistrarService<SqliteRegistrarStore, QueueDispatcher>;

pub(crate) fn open_store(path: &str) -> Result<Arc<SqliteRegistrarStore>, AppError> {
    let store = SqliteRegistrarStore::open(path)?;
    info!(database = path, "registrar database opened");
    Ok(Arc::new(store))
}

/// Command-line runs have no worker, so promotion always takes the synchronous path.
pub(crate) fn service_without_queue(store: Arc<SqliteRegistrarStore>) -> CliService {
    RegistrarService::new(store, Arc::new(QueueDispatcher::disconnected()))
}

pub(crate) fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => eprintln!("failed to render output: {err}"),
    }
}
