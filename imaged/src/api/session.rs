//! Session JSON endpoint
//!
//! GET /api/session - the caller's session id, busy flag, and history

use axum::{response::Response, routing::get, Json, Router};
use serde::Serialize;
use uuid::Uuid;

use super::{AppState, SessionContext};
use crate::session::Generation;

/// Build the session router
pub fn router() -> Router<AppState> {
    Router::new().route("/api/session", get(get_session))
}

/// Session view
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub busy: bool,
    pub history: Vec<Generation>,
}

async fn get_session(ctx: SessionContext) -> Response {
    let body = SessionResponse {
        session_id: ctx.session.id(),
        busy: ctx.session.is_busy(),
        history: ctx.session.history(),
    };
    ctx.respond(Json(body))
}
