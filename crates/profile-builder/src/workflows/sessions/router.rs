use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde_json::{json, Value};
use tokio::task::JoinError;
use tracing::error;

use super::repository::{SessionId, SessionRepository};
use super::service::{SessionServiceError, WizardSessionService};
use crate::workflows::submission::{ProfileRecord, SagaOutcome};
use crate::workflows::wizard::{FileHandle, SequencerError, WizardKind};

/// Header carrying the original file name of an uploaded body.
pub const FILE_NAME_HEADER: &str = "x-file-name";

/// Router builder exposing the hosted wizard sessions.
///
/// Attachments and submissions call out to blocking collaborators, so their handlers run
/// on the blocking pool.
pub fn wizard_router<R>(service: Arc<WizardSessionService<R>>) -> Router
where
    R: SessionRepository + 'static,
{
    Router::new()
        .route("/api/v1/wizards/:kind/sessions", post(start_handler::<R>))
        .route(
            "/api/v1/wizards/sessions/:session_id",
            get(view_handler::<R>).delete(abandon_handler::<R>),
        )
        .route(
            "/api/v1/wizards/sessions/:session_id/sections/:section",
            put(section_handler::<R>),
        )
        .route(
            "/api/v1/wizards/sessions/:session_id/files/:section",
            put(file_handler::<R>),
        )
        .route(
            "/api/v1/wizards/sessions/:session_id/next",
            post(next_handler::<R>),
        )
        .route(
            "/api/v1/wizards/sessions/:session_id/previous",
            post(previous_handler::<R>),
        )
        .route(
            "/api/v1/wizards/sessions/:session_id/submit",
            post(submit_handler::<R>),
        )
        .with_state(service)
}

/// An empty body starts a fresh wizard; a profile record starts an edit session.
pub(crate) async fn start_handler<R>(
    State(service): State<Arc<WizardSessionService<R>>>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Response
where
    R: SessionRepository + 'static,
{
    let Some(kind) = WizardKind::from_slug(&kind) else {
        let payload = json!({ "error": format!("unknown wizard '{kind}'") });
        return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
    };

    let started = if body.iter().all(u8::is_ascii_whitespace) {
        service.start(kind)
    } else {
        match serde_json::from_slice::<ProfileRecord>(&body) {
            Ok(record) => service.start_editing(kind, record),
            Err(err) => {
                let payload = json!({ "error": format!("invalid profile record: {err}") });
                return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
            }
        }
    };

    match started {
        Ok(session) => (StatusCode::CREATED, axum::Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn view_handler<R>(
    State(service): State<Arc<WizardSessionService<R>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.get(&SessionId(session_id)) {
        Ok(session) => (StatusCode::OK, axum::Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn abandon_handler<R>(
    State(service): State<Arc<WizardSessionService<R>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.abandon(&SessionId(session_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn section_handler<R>(
    State(service): State<Arc<WizardSessionService<R>>>,
    Path((session_id, section)): Path<(String, String)>,
    axum::Json(value): axum::Json<Value>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.update_section(&SessionId(session_id), &section, value) {
        Ok(session) => (StatusCode::OK, axum::Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn file_handler<R>(
    State(service): State<Arc<WizardSessionService<R>>>,
    Path((session_id, section)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    R: SessionRepository + 'static,
{
    let Some(file_name) = header_text(&headers, FILE_NAME_HEADER) else {
        let payload = json!({ "error": format!("missing {FILE_NAME_HEADER} header") });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    };
    if body.is_empty() {
        let payload = json!({ "error": "file body is empty" });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    }

    let mime_type = header_text(&headers, header::CONTENT_TYPE.as_str())
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());
    let file = FileHandle::new(file_name, mime_type, body.to_vec());

    let attached = tokio::task::spawn_blocking(move || {
        service.attach_file(&SessionId(session_id), &section, file)
    })
    .await;

    match attached {
        Ok(Ok(session)) => (StatusCode::OK, axum::Json(session.view())).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(err) => join_error_response(err),
    }
}

pub(crate) async fn next_handler<R>(
    State(service): State<Arc<WizardSessionService<R>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.next(&SessionId(session_id)) {
        Ok(session) => (StatusCode::OK, axum::Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn previous_handler<R>(
    State(service): State<Arc<WizardSessionService<R>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    match service.previous(&SessionId(session_id)) {
        Ok(session) => (StatusCode::OK, axum::Json(session.view())).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<WizardSessionService<R>>>,
    Path(session_id): Path<String>,
) -> Response
where
    R: SessionRepository + 'static,
{
    let submitted =
        tokio::task::spawn_blocking(move || service.submit(&SessionId(session_id))).await;

    match submitted {
        Ok(Ok(report)) => {
            let status = outcome_status(&report.result.outcome);
            (status, axum::Json(report)).into_response()
        }
        Ok(Err(err)) => error_response(err),
        Err(err) => join_error_response(err),
    }
}

pub(crate) fn outcome_status(outcome: &SagaOutcome) -> StatusCode {
    match outcome {
        SagaOutcome::Success { .. } => StatusCode::CREATED,
        SagaOutcome::PreconditionFailed { .. } | SagaOutcome::ValidationFailed { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SagaOutcome::UploadFailed { .. } | SagaOutcome::PersistenceFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        SagaOutcome::Aborted => StatusCode::CONFLICT,
    }
}

pub(crate) fn error_response(err: SessionServiceError) -> Response {
    let status = err.status_code();
    let payload = match &err {
        SessionServiceError::Sequencer(SequencerError::Validation { step, errors }) => json!({
            "error": err.to_string(),
            "step": step,
            "field_errors": errors,
        }),
        _ => json!({ "error": err.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}

fn join_error_response(err: JoinError) -> Response {
    error!(error = %err, "wizard task did not complete");
    let payload = json!({ "error": "wizard task did not complete" });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
