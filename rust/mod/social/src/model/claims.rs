use serde::{Deserialize, Serialize};

/// What a signed token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    /// Bearer token for API calls.
    Access,
    /// Email confirmation link.
    Confirm,
    /// Password reset link.
    Reset,
}

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub purpose: Purpose,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expires at (unix seconds).
    pub exp: i64,
    /// Reset tokens carry the user's `updated_at` at issue time; any later
    /// write to the account (including the reset itself) invalidates them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
}
