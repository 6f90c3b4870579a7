//! Operator API over the running gate.
//!
//! Every route sits behind bearer-key authentication.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::escalation::Escalator;

#[derive(Clone)]
pub struct AdminState {
    pub escalator: Arc<Escalator>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(escalator: Arc<Escalator>, api_key: &str) -> Self {
        Self {
            escalator,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/requests", get(list_requests))
        .route("/admin/requests/{id}", get(get_request).delete(delete_request))
        .route("/admin/requests/{id}/respond", post(respond))
        .route("/admin/requests/{id}/expire", post(expire_request))
        .route("/admin/events/failure", post(post_failure))
        .route("/admin/events/success", post(post_success))
        .route("/admin/stats", get(get_stats))
        .route("/admin/history", get(get_history))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
