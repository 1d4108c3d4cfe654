use axum::body::Bytes;
use axum::extract::{Extension, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, patch, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};

use twtr_core::{Envelope, PageParams, PageQuery, ServiceError};

use crate::api::middleware::Actor;
use crate::api::{AppState, tweet_page};
use crate::model::{Credentials, ImageUpload, PasswordReset, ProfilePatch, Registration};
use crate::service::{Feed, ImageSlot, Relation, ToggleOutcome};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register))
        .route("/users/tokens", post(login))
        .route("/users/password", patch(reset_password))
        .route(
            "/users/{id}",
            get(search).patch(confirm).post(request_password_reset),
        )
        .route("/users/{id}/tweets", get(user_tweets))
        .route("/users/{id}/replies", get(user_replies))
        .route("/users/{id}/likes", get(user_likes))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/users/user", get(me).patch(update_profile).delete(delete_account))
        .route("/users/user/avatar", put(upload_avatar))
        .route("/users/user/cover", put(upload_cover))
        .route("/users/user/bookmarks", get(my_bookmarks))
        .route("/users/user/tweets", get(following_feed))
        .route("/users/tweets/{id}/bookmark", patch(toggle_bookmark))
        .route("/users/tweets/{id}/like", patch(toggle_like))
        .route("/users/{id}/follow", patch(toggle_follow))
}

// ── Account ──

/// POST /users
async fn register(
    State(svc): State<AppState>,
    Json(input): Json<Registration>,
) -> Result<StatusCode, ServiceError> {
    svc.register(input)?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /users/{token}
async fn confirm(
    State(svc): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.confirm(&token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/tokens
async fn login(
    State(svc): State<AppState>,
    Json(input): Json<Credentials>,
) -> Result<Json<Envelope<Value>>, ServiceError> {
    let (token, user) = svc.login(input)?;
    Ok(Json(Envelope::new(json!({ "token": token, "user": user }))))
}

/// POST /users/{email}
async fn request_password_reset(
    State(svc): State<AppState>,
    Path(email): Path<String>,
) -> Result<StatusCode, ServiceError> {
    svc.request_password_reset(&email)?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /users/password
async fn reset_password(
    State(svc): State<AppState>,
    Json(input): Json<PasswordReset>,
) -> Result<StatusCode, ServiceError> {
    svc.reset_password(input)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn me(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<Json<Envelope<Value>>, ServiceError> {
    let user = svc.me(&actor)?;
    Ok(Json(Envelope::new(json!({ "user": user }))))
}

async fn update_profile(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Envelope<Value>>, ServiceError> {
    let user = svc.update_profile(&actor, patch)?;
    Ok(Json(Envelope::new(json!({ "user": user }))))
}

async fn delete_account(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
) -> Result<StatusCode, ServiceError> {
    svc.delete_account(&actor)?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Profile images ──

fn raw_upload(headers: &HeaderMap, body: Bytes) -> ImageUpload {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    ImageUpload {
        content_type,
        bytes: body.to_vec(),
    }
}

async fn upload_avatar(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<Value>>, ServiceError> {
    let user = svc.set_profile_image(&actor, ImageSlot::Avatar, raw_upload(&headers, body))?;
    Ok(Json(Envelope::new(json!({ "user": user }))))
}

async fn upload_cover(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Envelope<Value>>, ServiceError> {
    let user = svc.set_profile_image(&actor, ImageSlot::Cover, raw_upload(&headers, body))?;
    Ok(Json(Envelope::new(json!({ "user": user }))))
}

// ── Toggles ──

fn toggled(
    svc: &AppState,
    actor: &str,
    relation: Relation,
    target: &str,
) -> Result<Json<Envelope<ToggleOutcome>>, ServiceError> {
    Ok(Json(Envelope::new(svc.toggle(actor, relation, target)?)))
}

async fn toggle_bookmark(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ToggleOutcome>>, ServiceError> {
    toggled(&svc, &actor, Relation::Bookmarks, &id)
}

async fn toggle_like(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ToggleOutcome>>, ServiceError> {
    toggled(&svc, &actor, Relation::Likes, &id)
}

async fn toggle_follow(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<ToggleOutcome>>, ServiceError> {
    toggled(&svc, &actor, Relation::Following, &id)
}

// ── Lists ──

/// GET /users/{handle}
async fn search(
    State(svc): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<Envelope<Value>>, ServiceError> {
    let users = svc.search_users(&handle)?;
    Ok(Json(Envelope::new(json!({ "users": users }))))
}

async fn user_tweets(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(tweet_page(&svc, Feed::ByAuthor(&id), PageParams::from_query(&query))?))
}

async fn user_replies(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(tweet_page(&svc, Feed::AuthorReplies(&id), PageParams::from_query(&query))?))
}

async fn user_likes(
    State(svc): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(tweet_page(&svc, Feed::LikedBy(&id), PageParams::from_query(&query))?))
}

async fn my_bookmarks(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(tweet_page(&svc, Feed::Bookmarks(&actor), PageParams::from_query(&query))?))
}

async fn following_feed(
    State(svc): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(tweet_page(&svc, Feed::Following(&actor), PageParams::from_query(&query))?))
}
