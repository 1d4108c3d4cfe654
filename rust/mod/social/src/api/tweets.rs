use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use twtr_core::{Envelope, PageParams, PageQuery, ServiceError};

use crate::api::form::TweetPayload;
use crate::api::middleware::Actor;
use crate::api::{AppState, tweet_page};
use crate::service::Feed;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/tweets", get(list_tweets))
        .route("/tweets/{id}", get(get_tweet))
        .route("/tweets/{id}/replies", get(list_replies))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/tweets", post(create_tweet))
        .route("/tweets/{id}", axum::routing::patch(update_tweet).delete(delete_tweet))
}

/// GET /tweets
async fn list_tweets(
    State(svc): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(tweet_page(&svc, Feed::All, PageParams::from_query(&query))?))
}

/// GET /tweets/{id}/replies
async fn list_replies(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(tweet_page(&svc, Feed::RepliesTo(&id), PageParams::from_query(&query))?))
}

/// GET /tweets/{id}
async fn get_tweet(
    State(svc): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Value>>, ServiceError> {
    let tweet = svc.get_tweet(&id)?;
    Ok(Json(Envelope::new(json!({ "tweet": tweet }))))
}

/// POST /tweets — `tweetId` is null when the request undid a retweet.
async fn create_tweet(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    payload: TweetPayload,
) -> Result<Json<Envelope<Value>>, ServiceError> {
    let id = svc.create_tweet(&actor, payload.input, payload.image)?;
    Ok(Json(Envelope::new(json!({ "tweetId": id }))))
}

async fn update_tweet(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<String>,
    payload: TweetPayload,
) -> Result<StatusCode, ServiceError> {
    svc.update_tweet(&actor, &id, payload.input, payload.image)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_tweet(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.delete_tweet(&actor, &id)?;
    Ok(StatusCode::NO_CONTENT)
}
