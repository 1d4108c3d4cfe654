//! Row mapping and the two repository decorators.
//!
//! `populate_*` turn stored rows into client views: they merge the
//! authoritative columns, membership sets and referenced authors/parents.
//! `translate_conflict` turns UNIQUE-constraint failures into field-level
//! conflicts. Both are called explicitly at each access site.

use serde::{Deserialize, Serialize};

use twtr_core::FieldError;
use twtr_sql::{Row, SQLConn, SQLError, Value};

use crate::model::{ReplyRef, TweetKind, TweetView, User, UserSummary};
use crate::service::SocialError;
use crate::service::toggle::{Relation, memberships};

pub(crate) const USER_COLUMNS: &str =
    "id, username, handle, email, password_hash, confirmed, followers, data, created_at, updated_at";

pub(crate) const TWEET_COLUMNS: &str = "seq, id, user_id, kind, retweet_id, reply_id, \
     likes, retweets, replies, data, created_at, updated_at";

/// User `data` document: the fields nothing queries on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct UserDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Blob key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Blob key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct UserRecord {
    pub id: String,
    pub username: String,
    pub handle: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub followers: i64,
    pub doc: UserDoc,
    pub created_at: String,
    pub updated_at: String,
}

/// Tweet `data` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct TweetDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Blob key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct TweetRecord {
    pub id: String,
    pub user_id: String,
    pub kind: TweetKind,
    pub doc: TweetDoc,
    pub retweet_id: Option<String>,
    pub reply_id: Option<String>,
    pub likes: i64,
    pub retweets: i64,
    pub replies: i64,
    pub created_at: String,
    pub updated_at: String,
}

fn text(row: &Row, col: &str) -> Result<String, SocialError> {
    row.get_str(col)
        .map(str::to_string)
        .ok_or_else(|| SocialError::Internal(format!("missing column {}", col)))
}

fn int(row: &Row, col: &str) -> Result<i64, SocialError> {
    row.get_i64(col)
        .ok_or_else(|| SocialError::Internal(format!("missing column {}", col)))
}

fn opt_text(row: &Row, col: &str) -> Option<String> {
    row.get_str(col).map(str::to_string)
}

impl UserRecord {
    fn from_row(row: &Row) -> Result<Self, SocialError> {
        Ok(Self {
            id: text(row, "id")?,
            username: text(row, "username")?,
            handle: text(row, "handle")?,
            email: text(row, "email")?,
            password_hash: text(row, "password_hash")?,
            confirmed: row.get_bool("confirmed").unwrap_or(false),
            followers: int(row, "followers")?,
            doc: serde_json::from_str(&text(row, "data")?)?,
            created_at: text(row, "created_at")?,
            updated_at: text(row, "updated_at")?,
        })
    }
}

impl TweetRecord {
    fn from_row(row: &Row) -> Result<Self, SocialError> {
        let kind = text(row, "kind")?;
        Ok(Self {
            id: text(row, "id")?,
            user_id: text(row, "user_id")?,
            kind: TweetKind::parse(&kind)
                .ok_or_else(|| SocialError::Internal(format!("unknown tweet kind {}", kind)))?,
            doc: serde_json::from_str(&text(row, "data")?)?,
            retweet_id: opt_text(row, "retweet_id"),
            reply_id: opt_text(row, "reply_id"),
            likes: int(row, "likes")?,
            retweets: int(row, "retweets")?,
            replies: int(row, "replies")?,
            created_at: text(row, "created_at")?,
            updated_at: text(row, "updated_at")?,
        })
    }
}

// ── Users ──

fn user_where(db: &dyn SQLConn, clause: &str, param: &str) -> Result<Option<UserRecord>, SocialError> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, clause);
    let rows = db.query(&sql, &[Value::from(param)])?;
    rows.first().map(UserRecord::from_row).transpose()
}

pub(crate) fn find_user(db: &dyn SQLConn, id: &str) -> Result<Option<UserRecord>, SocialError> {
    user_where(db, "id = ?1", id)
}

pub(crate) fn require_user(db: &dyn SQLConn, id: &str) -> Result<UserRecord, SocialError> {
    find_user(db, id)?.ok_or_else(|| SocialError::NotFound(format!("user {}", id)))
}

pub(crate) fn find_user_by_email(
    db: &dyn SQLConn,
    email: &str,
) -> Result<Option<UserRecord>, SocialError> {
    user_where(db, "email = ?1", email)
}

pub(crate) fn insert_user(db: &dyn SQLConn, user: &UserRecord) -> Result<(), SocialError> {
    db.exec(
        "INSERT INTO users (id, username, handle, email, password_hash, confirmed, followers, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?9)",
        &[
            user.id.as_str().into(),
            user.username.as_str().into(),
            user.handle.as_str().into(),
            user.email.as_str().into(),
            user.password_hash.as_str().into(),
            user.confirmed.into(),
            serde_json::to_string(&user.doc)?.into(),
            user.created_at.as_str().into(),
            user.updated_at.as_str().into(),
        ],
    )
    .map_err(translate_conflict)?;
    Ok(())
}

/// Write everything except the follower counter, which only toggles touch.
pub(crate) fn update_user(db: &dyn SQLConn, user: &UserRecord) -> Result<(), SocialError> {
    let affected = db
        .exec(
            "UPDATE users SET username = ?1, handle = ?2, email = ?3, password_hash = ?4,
                 confirmed = ?5, data = ?6, updated_at = ?7
             WHERE id = ?8",
            &[
                user.username.as_str().into(),
                user.handle.as_str().into(),
                user.email.as_str().into(),
                user.password_hash.as_str().into(),
                user.confirmed.into(),
                serde_json::to_string(&user.doc)?.into(),
                user.updated_at.as_str().into(),
                user.id.as_str().into(),
            ],
        )
        .map_err(translate_conflict)?;
    if affected == 0 {
        return Err(SocialError::NotFound(format!("user {}", user.id)));
    }
    Ok(())
}

fn taken_message(field: &str) -> String {
    match field {
        "username" => "Username is already taken".to_string(),
        "handle" => "Handle is already taken".to_string(),
        "email" => "Email is already registered".to_string(),
        other => format!("{} already exists", other),
    }
}

/// Which of `username`, `handle`, `email` already belong to another user.
pub(crate) fn taken_fields(
    db: &dyn SQLConn,
    username: &str,
    handle: &str,
    email: &str,
    except_id: Option<&str>,
) -> Result<Vec<FieldError>, SocialError> {
    let rows = db.query(
        "SELECT username, handle, email FROM users
         WHERE (username = ?1 OR handle = ?2 OR email = ?3) AND id != ?4",
        &[
            username.into(),
            handle.into(),
            email.into(),
            except_id.unwrap_or_default().into(),
        ],
    )?;

    let mut errors = Vec::new();
    for (field, wanted) in [("username", username), ("handle", handle), ("email", email)] {
        if rows.iter().any(|r| r.get_str(field) == Some(wanted)) {
            errors.push(FieldError::new(field, taken_message(field)));
        }
    }
    Ok(errors)
}

/// Map a UNIQUE violation on the users table to field conflicts; anything
/// else is a storage failure.
pub(crate) fn translate_conflict(e: SQLError) -> SocialError {
    match e {
        SQLError::Unique(columns) => SocialError::Conflict(
            columns
                .split(',')
                .map(|c| {
                    let field = c.trim().rsplit('.').next().unwrap_or_default();
                    FieldError::new(field, taken_message(field))
                })
                .collect(),
        ),
        other => other.into(),
    }
}

// ── Tweets ──

pub(crate) fn find_tweet(db: &dyn SQLConn, id: &str) -> Result<Option<TweetRecord>, SocialError> {
    let sql = format!("SELECT {} FROM tweets WHERE id = ?1", TWEET_COLUMNS);
    let rows = db.query(&sql, &[id.into()])?;
    rows.first().map(TweetRecord::from_row).transpose()
}

pub(crate) fn require_tweet(db: &dyn SQLConn, id: &str) -> Result<TweetRecord, SocialError> {
    find_tweet(db, id)?.ok_or_else(|| SocialError::NotFound(format!("tweet {}", id)))
}

/// Run a query that selects `TWEET_COLUMNS`.
pub(crate) fn query_tweets(
    db: &dyn SQLConn,
    sql: &str,
    params: &[Value],
) -> Result<Vec<TweetRecord>, SocialError> {
    db.query(sql, params)?
        .iter()
        .map(TweetRecord::from_row)
        .collect()
}

pub(crate) fn insert_tweet(db: &dyn SQLConn, tweet: &TweetRecord) -> Result<(), SocialError> {
    db.exec(
        "INSERT INTO tweets (id, user_id, kind, retweet_id, reply_id, likes, retweets, replies, data, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0, ?6, ?7, ?8)",
        &[
            tweet.id.as_str().into(),
            tweet.user_id.as_str().into(),
            tweet.kind.as_str().into(),
            tweet.retweet_id.clone().into(),
            tweet.reply_id.clone().into(),
            serde_json::to_string(&tweet.doc)?.into(),
            tweet.created_at.as_str().into(),
            tweet.updated_at.as_str().into(),
        ],
    )?;
    Ok(())
}

/// Write the content fields. Counters and parent references are left alone.
pub(crate) fn update_tweet(db: &dyn SQLConn, tweet: &TweetRecord) -> Result<(), SocialError> {
    let affected = db.exec(
        "UPDATE tweets SET kind = ?1, data = ?2, updated_at = ?3 WHERE id = ?4",
        &[
            tweet.kind.as_str().into(),
            serde_json::to_string(&tweet.doc)?.into(),
            tweet.updated_at.as_str().into(),
            tweet.id.as_str().into(),
        ],
    )?;
    if affected == 0 {
        return Err(SocialError::NotFound(format!("tweet {}", tweet.id)));
    }
    Ok(())
}

// ── populate ──

pub(crate) fn upload_url(public_url: &str, key: &str) -> String {
    format!("{}/uploads/{}", public_url, key)
}

pub(crate) fn populate_user(
    db: &dyn SQLConn,
    user: UserRecord,
    public_url: &str,
) -> Result<User, SocialError> {
    Ok(User {
        following: memberships(db, &user.id, Relation::Following)?,
        likes: memberships(db, &user.id, Relation::Likes)?,
        retweets: memberships(db, &user.id, Relation::Retweets)?,
        replies: memberships(db, &user.id, Relation::Replies)?,
        bookmarks: memberships(db, &user.id, Relation::Bookmarks)?,
        avatar: user.doc.avatar.as_deref().map(|k| upload_url(public_url, k)),
        cover: user.doc.cover.as_deref().map(|k| upload_url(public_url, k)),
        website: user.doc.website,
        id: user.id,
        username: user.username,
        handle: user.handle,
        email: user.email,
        confirmed: user.confirmed,
        followers: user.followers,
        created_at: user.created_at,
        updated_at: user.updated_at,
    })
}

pub(crate) fn summarize(user: &UserRecord, public_url: &str) -> UserSummary {
    UserSummary {
        id: user.id.clone(),
        username: user.username.clone(),
        handle: user.handle.clone(),
        avatar: user.doc.avatar.as_deref().map(|k| upload_url(public_url, k)),
    }
}

pub(crate) fn user_summary(
    db: &dyn SQLConn,
    id: &str,
    public_url: &str,
) -> Result<Option<UserSummary>, SocialError> {
    Ok(find_user(db, id)?.map(|u| summarize(&u, public_url)))
}

/// Build the client view of a tweet. Top-level tweets get their author,
/// retweet parent (with its author) and reply parent `{id, user}`; nested
/// parents stop there.
pub(crate) fn populate_tweet(
    db: &dyn SQLConn,
    tweet: TweetRecord,
    public_url: &str,
    nested: bool,
) -> Result<TweetView, SocialError> {
    let retweet = match (&tweet.retweet_id, nested) {
        (Some(parent_id), false) => match find_tweet(db, parent_id)? {
            Some(parent) => Some(Box::new(populate_tweet(db, parent, public_url, true)?)),
            None => None,
        },
        _ => None,
    };

    let reply = match &tweet.reply_id {
        Some(parent_id) if !nested => {
            let author = match find_tweet(db, parent_id)? {
                Some(parent) => user_summary(db, &parent.user_id, public_url)?,
                None => None,
            };
            Some(ReplyRef {
                id: parent_id.clone(),
                user: author,
            })
        }
        Some(parent_id) => Some(ReplyRef {
            id: parent_id.clone(),
            user: None,
        }),
        None => None,
    };

    Ok(TweetView {
        user: user_summary(db, &tweet.user_id, public_url)?,
        image: tweet.doc.image.as_deref().map(|k| upload_url(public_url, k)),
        text: tweet.doc.text,
        link: tweet.doc.link,
        id: tweet.id,
        kind: tweet.kind,
        likes: tweet.likes,
        retweets: tweet.retweets,
        replies: tweet.replies,
        retweet,
        reply,
        created_at: tweet.created_at,
        updated_at: tweet.updated_at,
    })
}
