//! Image serving endpoint
//!
//! GET /images/{file} - Serve a generated PNG inline, or as an attachment
//! with `?download=1`

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use super::{internal_error, AppState};
use crate::images::ImageStore;

/// Build the images router
pub fn router() -> Router<AppState> {
    Router::new().route("/{file}", get(get_image))
}

#[derive(Debug, Default, Deserialize)]
pub struct ImageQuery {
    download: Option<String>,
}

impl ImageQuery {
    fn wants_download(&self) -> bool {
        matches!(self.download.as_deref(), Some(v) if v != "0" && v != "false")
    }
}

/// Serve an image by file name
async fn get_image(
    Path(file): Path<String>,
    Query(query): Query<ImageQuery>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    if !ImageStore::is_valid_file_name(&file) {
        return (StatusCode::BAD_REQUEST, "Invalid image name").into_response();
    }

    let image = match state.images.read(&file).await {
        Ok(Some(image)) => image,
        Ok(None) => return (StatusCode::NOT_FOUND, "Image not found").into_response(),
        Err(e) => return internal_error(e),
    };

    let etag = format!("\"{}\"", image.etag);
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag));
    if not_modified {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
    }

    let disposition = if query.wants_download() {
        format!("attachment; filename=\"{}\"", image.name)
    } else {
        "inline".to_string()
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::ETAG, etag),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        image.data,
    )
        .into_response()
}
