use axum::extract::State;
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use twtr_core::ServiceError;

use crate::api::AppState;
use crate::model::Purpose;

/// The authenticated user, inserted by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct Actor(pub String);

/// Bearer-token middleware for protected routes.
///
/// Accepts only access tokens. Anything else is rejected with 401 before the
/// handler runs, so no state changes.
pub async fn auth_middleware(
    State(svc): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer(req.headers()) else {
        return ServiceError::Unauthorized("missing bearer token".into()).into_response();
    };

    match svc.verify_token(token, Purpose::Access) {
        Ok(claims) => {
            req.extensions_mut().insert(Actor(claims.sub));
            next.run(req).await
        }
        Err(e) => ServiceError::from(e).into_response(),
    }
}

/// Extract the token from `Authorization: Bearer <token>`. The scheme is
/// case-insensitive.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
