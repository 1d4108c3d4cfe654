pub mod feed;
pub mod mail;
pub(crate) mod repo;
pub mod schema;
pub mod toggle;
pub mod token;
pub mod tweet;
pub mod user;
pub(crate) mod validate;

use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use twtr_blob::{BlobError, BlobStore};
use twtr_core::{FieldError, ServiceError};
use twtr_sql::{SQLConn, SQLError, SQLStore};

use crate::service::mail::Mailer;

pub use feed::Feed;
pub use toggle::{Relation, ToggleOutcome};
pub use user::ImageSlot;

fn describe(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.name, f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Social service error type.
#[derive(Debug, Error)]
pub enum SocialError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {}", describe(.0))]
    Conflict(Vec<FieldError>),

    #[error("validation: {}", describe(.0))]
    Validation(Vec<FieldError>),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl SocialError {
    pub fn invalid(name: &str, message: &str) -> Self {
        SocialError::Validation(vec![FieldError::new(name, message)])
    }
}

impl From<SocialError> for ServiceError {
    fn from(e: SocialError) -> Self {
        match e {
            SocialError::NotFound(m) => ServiceError::NotFound(m),
            SocialError::Conflict(f) => ServiceError::Conflict(f),
            SocialError::Validation(f) => ServiceError::Validation(f),
            SocialError::Unauthorized(m) => ServiceError::Unauthorized(m),
            SocialError::Forbidden(m) => ServiceError::PermissionDenied(m),
            SocialError::Storage(m) => ServiceError::Storage(m),
            SocialError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

impl From<SQLError> for SocialError {
    fn from(e: SQLError) -> Self {
        SocialError::Storage(e.to_string())
    }
}

impl From<BlobError> for SocialError {
    fn from(e: BlobError) -> Self {
        SocialError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SocialError {
    fn from(e: serde_json::Error) -> Self {
        SocialError::Internal(e.to_string())
    }
}

/// Configuration for the social service.
#[derive(Debug, Clone)]
pub struct SocialConfig {
    /// JWT signing secret. Login refuses to issue tokens while it is empty.
    pub jwt_secret: String,
    /// Access token lifetime in seconds (default: 1h).
    pub access_token_ttl: i64,
    /// Confirmation link lifetime in seconds (default: 24h).
    pub confirm_token_ttl: i64,
    /// Password reset link lifetime in seconds (default: 1h).
    pub reset_token_ttl: i64,
    /// Externally visible base URL of this server, used in pagination links
    /// and upload URLs. No trailing slash.
    pub public_url: String,
    /// Base URL of the web client, used in email links.
    pub client_url: String,
    /// Sender address for outgoing mail.
    pub mail_from: String,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "twtr-dev-secret-change-me".to_string(),
            access_token_ttl: 3600,
            confirm_token_ttl: 86400,
            reset_token_ttl: 3600,
            public_url: "http://localhost:8080".to_string(),
            client_url: "http://localhost:3000".to_string(),
            mail_from: "twtr <no-reply@localhost>".to_string(),
        }
    }
}

/// The social service. Holds storage backends and configuration.
pub struct SocialService {
    pub(crate) sql: Arc<dyn SQLStore>,
    pub(crate) blob: Arc<dyn BlobStore>,
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) config: SocialConfig,
}

impl SocialService {
    /// Create a new SocialService, initializing the DB schema.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        blob: Arc<dyn BlobStore>,
        mailer: Arc<dyn Mailer>,
        mut config: SocialConfig,
    ) -> Result<Arc<Self>, SocialError> {
        schema::init_schema(sql.as_ref())?;
        config.public_url = config.public_url.trim_end_matches('/').to_string();
        config.client_url = config.client_url.trim_end_matches('/').to_string();
        Ok(Arc::new(Self {
            sql,
            blob,
            mailer,
            config,
        }))
    }

    pub fn config(&self) -> &SocialConfig {
        &self.config
    }

    /// Absolute URL for `path` on this server.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.config.public_url, path)
    }

    /// Run `body` in one SQL transaction, carrying its typed result out.
    ///
    /// Any `Err` from `body` rolls the transaction back and is returned as is.
    pub(crate) fn in_transaction<T>(
        &self,
        mut body: impl FnMut(&dyn SQLConn) -> Result<T, SocialError>,
    ) -> Result<T, SocialError> {
        let mut out: Option<Result<T, SocialError>> = None;
        let committed = self.sql.transaction(&mut |conn| match body(conn) {
            Ok(value) => {
                out = Some(Ok(value));
                Ok(())
            }
            Err(e) => {
                out = Some(Err(e));
                Err(SQLError::Aborted("rolled back".into()))
            }
        });
        match (committed, out) {
            (Ok(()), Some(Ok(value))) => Ok(value),
            (_, Some(Err(e))) => Err(e),
            (Err(e), _) => Err(e.into()),
            (Ok(()), None) => Err(SocialError::Internal("transaction body did not run".into())),
        }
    }

    /// Remove stored files that are no longer referenced. Failures are logged.
    pub(crate) fn discard_blobs(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.blob.delete(key) {
                warn!("failed to delete blob {}: {}", key, e);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use twtr_blob::FileStore;
    use twtr_sql::SqliteStore;

    use crate::model::Registration;
    use crate::service::mail::MemoryMailer;
    use crate::service::{SocialConfig, SocialService};

    pub struct Fixture {
        pub svc: Arc<SocialService>,
        pub mailer: Arc<MemoryMailer>,
        _dir: tempfile::TempDir,
    }

    pub fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let sql = Arc::new(SqliteStore::open_in_memory().unwrap());
        let blob = Arc::new(FileStore::open(&dir.path().join("blob")).unwrap());
        let mailer = Arc::new(MemoryMailer::default());
        let svc = SocialService::new(sql, blob, mailer.clone(), SocialConfig::default()).unwrap();
        Fixture {
            svc,
            mailer,
            _dir: dir,
        }
    }

    impl Fixture {
        /// Register and confirm a user named `name`; returns its id.
        pub fn user(&self, name: &str) -> String {
            self.svc
                .register(Registration {
                    username: name.to_string(),
                    handle: name.to_string(),
                    email: format!("{}@example.com", name),
                    password: "correct horse battery".to_string(),
                })
                .unwrap();
            let email = format!("{}@example.com", name);
            let id = self
                .svc
                .in_transaction(|db| crate::service::repo::find_user_by_email(db, &email))
                .unwrap()
                .unwrap()
                .id;
            self.svc.mark_confirmed(&id).unwrap();
            id
        }

        /// Post a plain text tweet; returns its id.
        pub fn tweet(&self, author: &str, text: &str) -> String {
            self.svc
                .create_tweet(
                    author,
                    crate::model::TweetInput {
                        kind: Some("text".into()),
                        text: Some(text.to_string()),
                        ..Default::default()
                    },
                    None,
                )
                .unwrap()
                .unwrap()
        }
    }
}
