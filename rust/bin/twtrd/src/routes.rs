//! Route registration — collects all module routes + system endpoints.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

/// Build the complete router with all routes.
///
/// Module routes carry their own state and authentication; paths are
/// absolute so they are merged rather than nested.
pub fn build_router(module_routes: Vec<(&str, Router)>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    for (name, router) in module_routes {
        tracing::debug!("mounting {} routes", name);
        app = app.merge(router);
    }
    app
}

async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": "twtrd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use twtr_core::Module;
    use twtr_social::service::SocialConfig;
    use twtr_social::service::mail::LogMailer;
    use twtr_social::SocialModule;

    use super::*;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn app(dir: &std::path::Path) -> Router {
        let sql = Arc::new(twtr_sql::SqliteStore::open_in_memory().unwrap());
        let blob = Arc::new(twtr_blob::FileStore::open(&dir.join("blob")).unwrap());
        let module = SocialModule::new(
            sql,
            blob,
            Arc::new(LogMailer),
            SocialConfig::default(),
            twtr_social::api::DEFAULT_MAX_BODY_BYTES,
        )
        .unwrap();
        build_router(vec![(module.name(), module.routes())])
    }

    #[tokio::test]
    async fn health_and_version() {
        let dir = tempfile::tempdir().unwrap();

        let (status, body) = get_json(app(dir.path()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = get_json(app(dir.path()), "/version").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "twtrd");
    }

    #[tokio::test]
    async fn module_routes_are_mounted_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_json(app(dir.path()), "/tweets").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["tweets"].as_array().unwrap().is_empty());
        assert!(body["data"]["links"]["next"].is_null());
    }

    #[tokio::test]
    async fn protected_routes_require_a_token() {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = get_json(app(dir.path()), "/users/user").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
