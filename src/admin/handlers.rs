use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::approval::types::{ApprovalStatus, RequestFilter, RequestId};
use crate::error::GateError;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub pending_requests: usize,
    pub failure_limit: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub requester_id: Option<String>,
    pub subject_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondBody {
    pub approved: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FailureEvent {
    pub subject: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SuccessEvent {
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub fn error_response(err: GateError) -> Response {
    let status = match &err {
        GateError::Validation(_) => StatusCode::BAD_REQUEST,
        GateError::NotFound(_) => StatusCode::NOT_FOUND,
        GateError::AlreadyProcessed { .. } => StatusCode::CONFLICT,
        GateError::TransientInfrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
        GateError::PermanentInfrastructure(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        pending_requests: state.escalator.approvals().summary().pending,
        failure_limit: state.escalator.counter().limit(),
    })
}

pub async fn list_requests(State(state): State<AdminState>, Query(query): Query<ListQuery>) -> Response {
    let status = match query.status.as_deref().map(str::parse::<ApprovalStatus>).transpose() {
        Ok(status) => status,
        Err(e) => return error_response(GateError::Validation(e)),
    };
    let filter = RequestFilter {
        status,
        requester_id: query.requester_id,
        subject_name: query.subject_name,
    };
    Json(state.escalator.approvals().get_all_requests(&filter)).into_response()
}

pub async fn get_request(State(state): State<AdminState>, Path(id): Path<RequestId>) -> Response {
    match state.escalator.approvals().get_request(&id) {
        Some(request) => Json(request).into_response(),
        None => error_response(GateError::NotFound(id)),
    }
}

pub async fn delete_request(State(state): State<AdminState>, Path(id): Path<RequestId>) -> Response {
    if state.escalator.approvals().delete_request(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(GateError::NotFound(id))
    }
}

pub async fn respond(
    State(state): State<AdminState>,
    Path(id): Path<RequestId>,
    Json(body): Json<RespondBody>,
) -> Response {
    match state.escalator.respond(&id, body.approved, body.comment).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn expire_request(State(state): State<AdminState>, Path(id): Path<RequestId>) -> Response {
    match state.escalator.approvals().force_expire(&id) {
        Ok(request) => Json(request).into_response(),
        Err(e) => error_response(e),
    }
}

/// Accepts the event and handles it on a background task.
pub async fn post_failure(State(state): State<AdminState>, Json(event): Json<FailureEvent>) -> Response {
    if event.subject.trim().is_empty() {
        return error_response(GateError::Validation("subject must not be empty".into()));
    }
    let subject = event.subject.clone();
    let _ = state.escalator.spawn_failure(event.subject, event.description);
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "accepted": true, "subject": subject }))).into_response()
}

pub async fn post_success(State(state): State<AdminState>, Json(event): Json<SuccessEvent>) -> Response {
    state.escalator.on_success(&event.subject).await;
    Json(serde_json::json!({ "reset": event.subject })).into_response()
}

pub async fn get_stats(State(state): State<AdminState>) -> Response {
    Json(state.escalator.stats()).into_response()
}

pub async fn get_history(State(state): State<AdminState>, Query(query): Query<HistoryQuery>) -> Response {
    Json(state.escalator.history().recent(query.limit.unwrap_or(50))).into_response()
}
