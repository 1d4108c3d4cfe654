//! Outgoing mail: templates, transports, and off-request dispatch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use twtr_kv::KVStore;

use crate::service::{SocialConfig, SocialService};

pub const OUTBOX_PREFIX: &str = "mail/outbox/";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// A mail transport.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &Message) -> Result<(), MailError>;
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &Message) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, "mail");
        debug!("{}", message.text);
        Ok(())
    }
}

/// Queues messages in the KV store under `mail/outbox/` for an external
/// relay to pick up.
pub struct OutboxMailer {
    kv: Arc<dyn KVStore>,
}

impl OutboxMailer {
    pub fn new(kv: Arc<dyn KVStore>) -> Self {
        Self { kv }
    }

    /// Queued messages, oldest first.
    pub fn pending(&self) -> Result<Vec<(String, Message)>, MailError> {
        let entries = self
            .kv
            .scan(OUTBOX_PREFIX)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        entries
            .into_iter()
            .map(|(key, raw)| {
                serde_json::from_slice(&raw)
                    .map(|m| (key, m))
                    .map_err(|e| MailError::Transport(e.to_string()))
            })
            .collect()
    }

    /// Drop a message once it has been relayed.
    pub fn ack(&self, key: &str) -> Result<(), MailError> {
        self.kv
            .delete(key)
            .map(|_| ())
            .map_err(|e| MailError::Transport(e.to_string()))
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, message: &Message) -> Result<(), MailError> {
        let key = format!(
            "{}{}-{}",
            OUTBOX_PREFIX,
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.9fZ"),
            twtr_core::new_id()
        );
        let raw = serde_json::to_vec(message).map_err(|e| MailError::Transport(e.to_string()))?;
        self.kv
            .set(&key, &raw)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        debug!("queued mail {} to {}", key, message.to);
        Ok(())
    }
}

// ── Templates ──

fn render(config: &SocialConfig, to: &str, subject: &str, intro: &str, action: &str, link: &str) -> Message {
    Message {
        from: config.mail_from.clone(),
        to: to.to_string(),
        subject: subject.to_string(),
        text: format!("{}\n\n{}: {}\n", intro, action, link),
        html: format!(
            "<p>{}</p><p><a href=\"{}\">{}</a></p>",
            intro, link, action
        ),
    }
}

pub(crate) fn confirmation(config: &SocialConfig, to: &str, token: &str) -> Message {
    render(
        config,
        to,
        "Confirm your email",
        "Thanks for signing up. Confirm your email address to start tweeting.",
        "Confirm email",
        &format!("{}/confirmation/{}", config.client_url, token),
    )
}

pub(crate) fn password_reset(config: &SocialConfig, to: &str, token: &str) -> Message {
    render(
        config,
        to,
        "Reset your password",
        "Someone asked to reset the password for this account. If it wasn't you, ignore this email.",
        "Choose a new password",
        &format!("{}/reset-password/{}", config.client_url, token),
    )
}

impl SocialService {
    /// Send a message without blocking the caller. Inside a tokio runtime the
    /// transport runs on the blocking pool; failures are logged only.
    pub(crate) fn dispatch(&self, message: Message) {
        let mailer = Arc::clone(&self.mailer);
        let deliver = move || {
            if let Err(e) = mailer.send(&message) {
                warn!("failed to send \"{}\" to {}: {}", message.subject, message.to, e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(deliver);
            }
            Err(_) => deliver(),
        }
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryMailer {
    sent: std::sync::Mutex<Vec<Message>>,
}

#[cfg(test)]
impl MemoryMailer {
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Mailer for MemoryMailer {
    fn send(&self, message: &Message) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twtr_kv::RedbStore;

    #[test]
    fn outbox_queues_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let kv = Arc::new(RedbStore::open(&dir.path().join("kv.redb")).unwrap());
        let outbox = OutboxMailer::new(kv);
        let config = SocialConfig::default();

        outbox.send(&confirmation(&config, "a@example.com", "t1")).unwrap();
        outbox.send(&password_reset(&config, "b@example.com", "t2")).unwrap();

        let pending = outbox.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].1.to, "a@example.com");
        assert_eq!(pending[1].1.subject, "Reset your password");

        outbox.ack(&pending[0].0).unwrap();
        assert_eq!(outbox.pending().unwrap().len(), 1);
    }

    #[test]
    fn templates_link_to_client() {
        let config = SocialConfig::default();
        let msg = confirmation(&config, "a@example.com", "tok");
        assert!(msg.text.contains("http://localhost:3000/confirmation/tok"));
        assert!(msg.html.contains("href=\"http://localhost:3000/confirmation/tok\""));
        assert_eq!(msg.from, config.mail_from);
    }

    #[derive(Default)]
    struct FailingMailer {
        attempts: std::sync::atomic::AtomicUsize,
    }

    impl Mailer for FailingMailer {
        fn send(&self, _message: &Message) -> Result<(), MailError> {
            self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(MailError::Transport("smtp down".into()))
        }
    }

    #[test]
    fn delivery_failure_does_not_fail_registration() {
        let dir = tempfile::tempdir().unwrap();
        let mailer = Arc::new(FailingMailer::default());
        let svc = SocialService::new(
            Arc::new(twtr_sql::SqliteStore::open_in_memory().unwrap()),
            Arc::new(twtr_blob::FileStore::open(dir.path()).unwrap()),
            mailer.clone(),
            SocialConfig::default(),
        )
        .unwrap();

        svc.register(crate::model::Registration {
            username: "alice".into(),
            handle: "alice".into(),
            email: "alice@example.com".into(),
            password: "correct horse battery".into(),
        })
        .unwrap();

        // No runtime here, so delivery ran inline.
        assert_eq!(mailer.attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
        let stored = svc
            .in_transaction(|db| crate::service::repo::find_user_by_email(db, "alice@example.com"))
            .unwrap();
        assert!(stored.is_some());

        svc.dispatch(confirmation(svc.config(), "alice@example.com", "tok"));
        assert_eq!(mailer.attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
