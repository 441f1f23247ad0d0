use crate::cli::ServeArgs;
use crate::infra::{open_store, AppState};
use crate::routes::with_registrar_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use registrar::config::AppConfig;
use registrar::enrollment::{task_queue, QueueDispatcher, RegistrarService};
use registrar::error::AppError;
use registrar::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(database) = args.database.take() {
        config.database.path = database;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = open_store(&config.database.path)?;
    let dispatcher = if config.task_queue.enabled {
        let (dispatcher, worker) = task_queue(Arc::clone(&store), &config.task_queue);
        tokio::spawn(worker.run());
        info!(
            capacity = config.task_queue.capacity,
            max_retries = config.task_queue.max_retries,
            "auto-load worker started"
        );
        dispatcher
    } else {
        warn!("task queue disabled; promotions will auto-load synchronously");
        QueueDispatcher::disconnected()
    };
    let registrar_service = Arc::new(RegistrarService::new(store, Arc::new(dispatcher)));

    let app = with_registrar_routes(registrar_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "registrar service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
