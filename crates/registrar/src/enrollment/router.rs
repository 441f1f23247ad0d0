use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::dispatch::TaskDispatcher;
use super::domain::{Actor, LoadId, StudentId, TermId};
use super::errors::{RegistrarError, ValidationError};
use super::repository::{RegistrarStore, RepositoryError};
use super::service::{LoadRequest, PromotionRequest, RegistrarService};

/// Header carrying the username the upstream auth layer resolved.
pub const ACTOR_HEADER: &str = "x-registrar-actor";

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 500;

const INTERNAL_ERROR_DETAIL: &str = "The registrar could not complete the request.";

/// Router builder exposing the registrar endpoints.
pub fn registrar_router<S, D>(service: Arc<RegistrarService<S, D>>) -> Router
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    Router::new()
        .route(
            "/api/v1/students/:student_id/auto-load-preview",
            get(preview_handler::<S, D>),
        )
        .route(
            "/api/v1/students/:student_id/auto-load",
            post(auto_load_handler::<S, D>),
        )
        .route(
            "/api/v1/students/:student_id/loads",
            get(student_loads_handler::<S, D>),
        )
        .route(
            "/api/v1/students/:student_id",
            delete(deactivate_handler::<S, D>),
        )
        .route("/api/v1/continuing/promote", post(promote_handler::<S, D>))
        .route("/api/v1/student-loads", post(create_load_handler::<S, D>))
        .route(
            "/api/v1/student-loads/:load_id",
            patch(update_load_handler::<S, D>),
        )
        .route("/api/v1/audit-logs", get(audit_log_handler::<S, D>))
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TermQuery {
    term_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AutoLoadBody {
    #[serde(default)]
    term_id: Option<TermId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusBody {
    status: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditQuery {
    limit: Option<usize>,
}

pub(crate) async fn preview_handler<S, D>(
    State(service): State<Arc<RegistrarService<S, D>>>,
    Path(student_id): Path<String>,
    Query(query): Query<TermQuery>,
) -> Response
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    let Some(raw) = query.term_id.filter(|value| !value.trim().is_empty()) else {
        return detail(StatusCode::BAD_REQUEST, "term_id query parameter is required.");
    };
    let Ok(term_id) = raw.trim().parse::<i64>() else {
        return detail(StatusCode::BAD_REQUEST, "term_id must be an integer.");
    };

    let student_id = StudentId::new(student_id);
    match run_blocking(service, move |service| service.preview(&student_id, TermId(term_id))).await
    {
        Ok(subjects) => (StatusCode::OK, Json(json!({ "subjects": subjects }))).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn auto_load_handler<S, D>(
    State(service): State<Arc<RegistrarService<S, D>>>,
    Path(student_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<AutoLoadBody>>,
) -> Response
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    let Some(term_id) = body.and_then(|Json(body)| body.term_id) else {
        return error_response(ValidationError::MissingField("term_id").into());
    };

    let actor = actor_from(&headers);
    let student_id = StudentId::new(student_id);
    let result = run_blocking(service, move |service| {
        service.auto_load_student(actor.as_ref(), &student_id, term_id)
    })
    .await;
    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn promote_handler<S, D>(
    State(service): State<Arc<RegistrarService<S, D>>>,
    headers: HeaderMap,
    body: Option<Json<PromotionRequest>>,
) -> Response
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let actor = actor_from(&headers);
    match run_blocking(service, move |service| service.promote(actor.as_ref(), request)).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn student_loads_handler<S, D>(
    State(service): State<Arc<RegistrarService<S, D>>>,
    Path(student_id): Path<String>,
) -> Response
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    let student_id = StudentId::new(student_id);
    let lookup = student_id.clone();
    match run_blocking(service, move |service| service.student_loads(&lookup)).await {
        Ok(loads) => (
            StatusCode::OK,
            Json(json!({ "student_id": student_id, "loads": loads })),
        )
            .into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn deactivate_handler<S, D>(
    State(service): State<Arc<RegistrarService<S, D>>>,
    Path(student_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    let actor = actor_from(&headers);
    let student_id = StudentId::new(student_id);
    let result = run_blocking(service, move |service| {
        service.deactivate_student(actor.as_ref(), &student_id)
    })
    .await;
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn create_load_handler<S, D>(
    State(service): State<Arc<RegistrarService<S, D>>>,
    headers: HeaderMap,
    Json(request): Json<LoadRequest>,
) -> Response
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    let actor = actor_from(&headers);
    match run_blocking(service, move |service| service.create_load(actor.as_ref(), request)).await {
        Ok(load) => (StatusCode::CREATED, Json(load)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn update_load_handler<S, D>(
    State(service): State<Arc<RegistrarService<S, D>>>,
    Path(load_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<StatusBody>,
) -> Response
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    let actor = actor_from(&headers);
    let result = run_blocking(service, move |service| {
        service.update_load_status(actor.as_ref(), LoadId(load_id), &body.status)
    })
    .await;
    match result {
        Ok(load) => (StatusCode::OK, Json(load)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn audit_log_handler<S, D>(
    State(service): State<Arc<RegistrarService<S, D>>>,
    Query(query): Query<AuditQuery>,
) -> Response
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
{
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);
    match run_blocking(service, move |service| service.audit_log(limit)).await {
        Ok(entries) => (StatusCode::OK, Json(json!({ "results": entries }))).into_response(),
        Err(response) => response,
    }
}

/// Runs service work on the blocking pool; SQLite calls hold a mutex and may wait out the busy
/// timeout.
async fn run_blocking<S, D, T, F>(
    service: Arc<RegistrarService<S, D>>,
    work: F,
) -> Result<T, Response>
where
    S: RegistrarStore + 'static,
    D: TaskDispatcher + 'static,
    T: Send + 'static,
    F: FnOnce(&RegistrarService<S, D>) -> Result<T, RegistrarError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || work(&service)).await {
        Ok(result) => result.map_err(error_response),
        Err(err) => {
            tracing::error!(error = %err, "registrar task did not complete");
            Err(detail(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL))
        }
    }
}

fn actor_from(headers: &HeaderMap) -> Option<Actor> {
    headers
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Actor::new)
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

pub(crate) fn error_response(err: RegistrarError) -> Response {
    match &err {
        RegistrarError::Validation(_) => detail(StatusCode::BAD_REQUEST, err.to_string()),
        RegistrarError::NotFound(_) => detail(StatusCode::NOT_FOUND, err.to_string()),
        RegistrarError::Repository(RepositoryError::Conflict(_)) => detail(
            StatusCode::CONFLICT,
            "A load for this student, term, and subject already exists.",
        ),
        RegistrarError::Repository(_) => {
            tracing::error!(error = %err, "registrar request failed");
            detail(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_DETAIL)
        }
    }
}
