//! The prompt form
//!
//! GET  /             - render the page for the caller's session
//! POST /generate     - submit a prompt, render the result
//! POST /session/end  - discard the session

use axum::{
    extract::{rejection::FormRejection, State},
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tracing::info;

use super::{expired_session_cookie, internal_error, AppState, SessionContext};
use crate::images::{submit_prompt, Submission};
use crate::ui::{Notice, PageView};

/// Build the form router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/generate", post(generate))
        .route("/session/end", post(end_session))
}

/// Form body for a submit
#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub prompt: String,
}

fn render(state: &AppState, status: StatusCode, view: &PageView) -> Response {
    match state.pages.render(view) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// Render the page
async fn index(State(state): State<AppState>, ctx: SessionContext) -> Response {
    let view = PageView::for_session(&ctx.session);
    ctx.respond(render(&state, StatusCode::OK, &view))
}

/// Run one generation and render the outcome
async fn generate(
    State(state): State<AppState>,
    ctx: SessionContext,
    form: Result<Form<GenerateForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => return ctx.respond(rejection.into_response()),
    };
    let outcome = submit_prompt(&state.client, &state.images, &ctx.session, &form.prompt).await;

    // Rendered after the in-flight token is released, so the form is enabled again
    let view = PageView::for_session(&ctx.session);
    let (status, view) = match outcome {
        Submission::Generated(generated) => (
            StatusCode::OK,
            view.with_notice(Notice::Generated {
                file_name: generated.file_name,
            }),
        ),
        Submission::Failed(e) => (
            StatusCode::BAD_GATEWAY,
            view.with_notice(Notice::generation_failed(&e))
                .with_prompt(form.prompt),
        ),
        Submission::Busy => (
            StatusCode::CONFLICT,
            view.with_notice(Notice::busy()).with_prompt(form.prompt),
        ),
    };

    ctx.respond(render(&state, status, &view))
}

/// Discard the caller's session and clear the cookie
async fn end_session(State(state): State<AppState>, ctx: SessionContext) -> Response {
    let id = ctx.session.id();
    state.sessions.remove(&id);
    info!("Session {} ended by user", id);

    let mut response = Redirect::to("/").into_response();
    if let Ok(value) = HeaderValue::from_str(&expired_session_cookie()) {
        response.headers_mut().insert(header::SET_COOKIE, value);
    }
    response
}
