//! Bootstrap — configuration checks and storage wiring.
//!
//! When twtrd starts:
//! 1. Verify the config has a JWT secret and a data dir; refuse to start otherwise.
//! 2. Open the SQLite document store, the redb KV store and the blob directory.
//! 3. Pick the mail transport.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use twtr_blob::{BlobStore, FileStore};
use twtr_kv::{KVStore, RedbStore};
use twtr_social::service::SocialConfig;
use twtr_social::service::mail::{LogMailer, Mailer, OutboxMailer};
use twtr_sql::{SQLStore, SqliteStore};

use crate::config::{MailTransport, ServerConfig};

/// Verify server configuration is ready for use.
pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.jwt.secret.is_empty() {
        anyhow::bail!(
            "JWT secret is empty in configuration.\n\
             Set [jwt] secret or the {} environment variable.",
            crate::config::JWT_SECRET_ENV
        );
    }
    if config.storage.data_dir.is_empty() {
        anyhow::bail!("Storage data_dir is empty in configuration.");
    }
    if config.jwt.expire_secs <= 0 {
        anyhow::bail!("JWT expire_secs must be positive.");
    }
    Ok(())
}

/// The embedded stores, shared by all modules.
pub struct Stores {
    pub sql: Arc<dyn SQLStore>,
    pub kv: Arc<dyn KVStore>,
    pub blob: Arc<dyn BlobStore>,
}

pub fn open_stores(config: &ServerConfig) -> anyhow::Result<Stores> {
    let data_dir = PathBuf::from(&config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let sql: Arc<dyn SQLStore> = Arc::new(
        SqliteStore::open(&data_dir.join("data.sqlite"))
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    let kv: Arc<dyn KVStore> = Arc::new(
        RedbStore::open(&data_dir.join("data.redb"))
            .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
    );
    let blob: Arc<dyn BlobStore> = Arc::new(
        FileStore::open(&data_dir.join("blob"))
            .map_err(|e| anyhow::anyhow!("failed to open blob store: {}", e))?,
    );
    info!("Storage opened under {}", data_dir.display());
    Ok(Stores { sql, kv, blob })
}

pub fn mailer(config: &ServerConfig, kv: &Arc<dyn KVStore>) -> Arc<dyn Mailer> {
    match config.mail.transport {
        MailTransport::Log => Arc::new(LogMailer),
        MailTransport::Outbox => Arc::new(OutboxMailer::new(Arc::clone(kv))),
    }
}

pub fn social_config(config: &ServerConfig) -> SocialConfig {
    SocialConfig {
        jwt_secret: config.jwt.secret.clone(),
        access_token_ttl: config.jwt.expire_secs,
        public_url: config.server.public_url.clone(),
        client_url: config.server.client_url.clone(),
        mail_from: config.mail.from.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str, data_dir: &str) -> ServerConfig {
        ServerConfig::parse(&format!(
            "[storage]\ndata_dir = \"{}\"\n[jwt]\nsecret = \"{}\"\n[mail]\ntransport = \"outbox\"\n",
            data_dir, secret
        ))
        .unwrap()
    }

    #[test]
    fn empty_secret_refuses_to_start() {
        assert!(verify_config(&config("", "/tmp/twtr")).is_err());
    }

    #[test]
    fn empty_data_dir_refuses_to_start() {
        assert!(verify_config(&config("x", "")).is_err());
    }

    #[test]
    fn valid_config_passes() {
        assert!(verify_config(&config("x", "/tmp/twtr")).is_ok());
    }

    #[test]
    fn stores_open_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let cfg = config("x", data_dir.to_str().unwrap());
        let stores = open_stores(&cfg).unwrap();
        assert!(data_dir.join("data.sqlite").exists());
        assert!(data_dir.join("data.redb").exists());

        let outbox = mailer(&cfg, &stores.kv);
        let message = twtr_social::service::mail::Message {
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            subject: "hi".into(),
            text: "hello".into(),
            html: "<p>hello</p>".into(),
        };
        outbox.send(&message).unwrap();
        assert_eq!(stores.kv.scan("mail/outbox/").unwrap().len(), 1);
    }

    #[test]
    fn social_config_carries_urls() {
        let cfg = config("x", "/tmp/twtr");
        let social = social_config(&cfg);
        assert_eq!(social.jwt_secret, "x");
        assert_eq!(social.access_token_ttl, 3600);
        assert_eq!(social.public_url, "http://localhost:8080");
    }
}
