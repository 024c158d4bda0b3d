//! HTTP API module - form pages, image serving, session JSON

mod form;
mod images;
mod session;

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::images::ImageStore;
use crate::provider::ImageClient;
use crate::session::{Session, SessionStore};
use crate::ui::Pages;

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "imaged_session";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub images: Arc<ImageStore>,
    pub client: Arc<ImageClient>,
    pub pages: Arc<Pages>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(form::router())
        .merge(session::router())
        .nest("/images", images::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse { status: "healthy" })
}

/// The caller's session, resolved from the session cookie.
///
/// A missing or unknown cookie starts a new session; responses built for
/// it must go through [`SessionContext::respond`] so the cookie is set.
pub struct SessionContext {
    pub session: Arc<Session>,
    created: bool,
}

impl FromRequestParts<AppState> for SessionContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (session, created) = state.sessions.get_or_create(session_id(&parts.headers));
        Ok(Self { session, created })
    }
}

impl SessionContext {
    /// Attach the session cookie if the session is new
    pub fn respond(&self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        if self.created {
            if let Ok(value) = HeaderValue::from_str(&session_cookie(self.session.id())) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        response
    }
}

/// Extract the session id from the Cookie header(s)
fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

fn session_cookie(id: Uuid) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Plain-text 500 for failures that should never reach users
fn internal_error(e: impl std::fmt::Display) -> Response {
    tracing::error!("Internal error: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
}
