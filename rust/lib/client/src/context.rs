//! Application context: the session token and the notification banner,
//! passed explicitly to whatever needs them.

use std::sync::Arc;

use tracing::warn;

use crate::error::ApiError;

// ── TokenSource ─────────────────────────────────────────────────────

/// Pluggable token provider. Called before every API request.
///
/// Returns `Ok(None)` to skip the Authorization header (anonymous).
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, ApiError>;
}

/// No authentication — anonymous requests.
pub struct NoAuth;

#[async_trait::async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(None)
    }
}

/// Bearer token obtained from a previous login.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, ApiError> {
        Ok(Some(self.0.clone()))
    }
}

// ── Notifier ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Warning,
}

/// A message for the user-facing notification banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub content: String,
}

impl Notification {
    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Warning,
            content: content.into(),
        }
    }
}

/// Receives user-facing notifications.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        warn!("{:?}: {}", notification.kind, notification.content);
    }
}

// ── AppContext ──────────────────────────────────────────────────────

/// Shared client state: server address, HTTP client, token and notifier.
#[derive(Clone)]
pub struct AppContext {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: String,
    pub(crate) token: Arc<dyn TokenSource>,
    pub(crate) notifier: Arc<dyn Notifier>,
}

impl AppContext {
    pub fn new(
        base_url: impl Into<String>,
        token: Arc<dyn TokenSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            notifier,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    /// GET an absolute URL with the current token and decode the JSON body.
    pub(crate) async fn get_json<R: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<R, ApiError> {
        let mut req = self.http.get(url);
        if let Some(token) = self.token.token().await? {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_body(status.as_u16(), &body));
        }
        resp.json::<R>()
            .await
            .map_err(|e| ApiError::Decode(format!("response body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_auth_returns_none() {
        assert!(NoAuth.token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn static_token_returns_value() {
        let ts = StaticToken::new("jwt");
        assert_eq!(ts.token().await.unwrap(), Some("jwt".to_string()));
    }

    #[test]
    fn base_url_is_trimmed() {
        let ctx = AppContext::new("http://localhost:8080/", Arc::new(NoAuth), Arc::new(LogNotifier));
        assert_eq!(ctx.base_url(), "http://localhost:8080");
    }
}
