use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use twtr_core::ServiceError;

use crate::api::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/uploads/{*key}", get(serve))
}

/// GET /uploads/{key} — stored images, typed by extension.
async fn serve(
    State(svc): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let bytes = svc
        .blob
        .get(&key)
        .map_err(|e| match e {
            twtr_blob::BlobError::InvalidKey(_) => ServiceError::NotFound(format!("upload {}", key)),
            other => ServiceError::Storage(other.to_string()),
        })?
        .ok_or_else(|| ServiceError::NotFound(format!("upload {}", key)))?;
    Ok((
        [
            (header::CONTENT_TYPE, twtr_blob::content_type_for(&key)),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        bytes,
    ))
}
