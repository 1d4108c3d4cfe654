//! Server configuration file (`/etc/twtr/<name>.toml`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Environment variable that overrides `[jwt] secret`.
pub const JWT_SECRET_ENV: &str = "TWTR_JWT_SECRET";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    pub storage: StorageConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Externally visible base URL, used in pagination links and upload URLs.
    pub public_url: String,
    /// Web client base URL, used in email links.
    pub client_url: String,
    pub max_upload_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:8080".to_string(),
            client_url: "http://localhost:3000".to_string(),
            max_upload_bytes: twtr_social::api::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_expire_secs")]
    pub expire_secs: i64,
}

fn default_expire_secs() -> i64 {
    3600
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Log messages only.
    #[default]
    Log,
    /// Queue messages in the KV outbox for an external relay.
    Outbox,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub transport: MailTransport,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "twtr <no-reply@localhost>".to_string(),
            transport: MailTransport::Log,
        }
    }
}

impl ServerConfig {
    /// A bare context name maps to `/etc/twtr/<name>.toml`; anything that
    /// looks like a path is used as is.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/twtr/{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        let mut config = Self::parse(&content)?;
        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            config.jwt.secret = secret;
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
