//! Social module: users, tweets and the relations between them.
//!
//! # Resources
//!
//! - **User** — account with confirmation flag, profile images and
//!   membership sets (following, likes, retweets, replies, bookmarks)
//! - **Tweet** — text, link or image post; may retweet or reply to another
//!
//! Counters (`likes`, `retweets`, `replies`, `followers`) move together with
//! the membership rows inside one transaction.
//!
//! # Usage
//!
//! ```ignore
//! use twtr_social::{SocialModule, service::SocialConfig};
//!
//! let module = SocialModule::new(sql, blob, mailer, SocialConfig::default(), max_body)?;
//! let router = module.routes();
//! ```

pub mod api;
pub mod model;
pub mod service;

use std::sync::Arc;

use axum::Router;

use twtr_blob::BlobStore;
use twtr_core::{Module, ServiceError};
use twtr_sql::SQLStore;

use crate::service::mail::Mailer;
use crate::service::{SocialConfig, SocialService};

/// Social module implementing the Module trait.
pub struct SocialModule {
    service: Arc<SocialService>,
    max_body_bytes: usize,
}

impl SocialModule {
    pub fn new(
        sql: Arc<dyn SQLStore>,
        blob: Arc<dyn BlobStore>,
        mailer: Arc<dyn Mailer>,
        config: SocialConfig,
        max_body_bytes: usize,
    ) -> Result<Self, ServiceError> {
        let service = SocialService::new(sql, blob, mailer, config)?;
        Ok(Self {
            service,
            max_body_bytes,
        })
    }

    pub fn service(&self) -> &Arc<SocialService> {
        &self.service
    }
}

impl Module for SocialModule {
    fn name(&self) -> &str {
        "social"
    }

    fn routes(&self) -> Router {
        api::build_router(self.service.clone(), self.max_body_bytes)
    }
}
