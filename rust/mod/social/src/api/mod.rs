mod form;
mod middleware;
mod tweets;
mod uploads;
mod users;


use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;

use twtr_core::{Envelope, Page, PageParams};

use crate::model::TweetView;
use crate::service::{Feed, SocialService};

/// Shared application state.
pub type AppState = Arc<SocialService>;

/// Default cap on request bodies, uploads included.
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Build the social API router.
///
/// Routes that act on behalf of a user sit behind the bearer-token layer;
/// the rest are public. Both halves are merged so a path can mix public
/// and protected methods (`GET /tweets` vs `POST /tweets`).
pub fn build_router(svc: Arc<SocialService>, max_body_bytes: usize) -> Router {
    let public = Router::new()
        .merge(users::public_routes())
        .merge(tweets::public_routes())
        .merge(uploads::routes());

    let protected = Router::new()
        .merge(users::protected_routes())
        .merge(tweets::protected_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            svc.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(svc)
}

/// `{data: {tweets, links}}` for a page of a tweet list.
pub(crate) fn tweet_page(
    svc: &SocialService,
    feed: Feed<'_>,
    params: PageParams,
) -> Result<serde_json::Value, twtr_core::ServiceError> {
    let page: Page<TweetView> = svc.list_tweets(feed, params)?;
    let links = page.links(&svc.url_for(&feed.route()));
    Ok(serde_json::json!(Envelope::new(serde_json::json!({
        "tweets": page.items,
        "links": links,
    }))))
}
