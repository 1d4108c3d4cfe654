use serde::{Deserialize, Serialize};

/// A user as returned to clients. The password hash never leaves the
/// service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub handle: String,
    pub email: String,
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Absolute URL of the avatar image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Absolute URL of the cover image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    /// Number of users following this one.
    pub followers: i64,
    /// Ids of followed users.
    pub following: Vec<String>,
    /// Tweet ids, oldest first.
    pub likes: Vec<String>,
    pub retweets: Vec<String>,
    pub replies: Vec<String>,
    pub bookmarks: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Author fields embedded in tweets and search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// `POST /users` body. Missing fields deserialize empty and fail validation
/// with a field error instead of a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Registration {
    pub username: String,
    pub handle: String,
    pub email: String,
    pub password: String,
}

/// `POST /users/tokens` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// `PATCH /users/user` body. Absent fields are left unchanged; an empty
/// `website` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub handle: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
}

/// `PATCH /users/password` body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PasswordReset {
    pub token: String,
    pub password: String,
}
