use serde::{Deserialize, Serialize};

use crate::model::UserSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TweetKind {
    #[default]
    Text,
    Link,
    Image,
}

impl TweetKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(TweetKind::Text),
            "link" => Some(TweetKind::Link),
            "image" => Some(TweetKind::Image),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TweetKind::Text => "text",
            TweetKind::Link => "link",
            TweetKind::Image => "image",
        }
    }
}

/// Fields of a create or update request, from JSON or multipart.
///
/// Everything is optional at this level; the service applies the type rules.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TweetInput {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub text: Option<String>,
    pub link_url: Option<String>,
    pub retweet_id: Option<String>,
    pub reply_id: Option<String>,
}

impl TweetInput {
    /// Treat blank strings (as multipart forms send them) as absent.
    pub fn normalized(self) -> Self {
        fn present(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.trim().is_empty())
        }
        Self {
            kind: present(self.kind),
            text: present(self.text),
            link_url: present(self.link_url),
            retweet_id: present(self.retweet_id),
            reply_id: present(self.reply_id),
        }
    }
}

/// An uploaded file as received by the API layer.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Reply parent reference: the parent's id and author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRef {
    pub id: String,
    pub user: Option<UserSummary>,
}

/// A tweet as returned to clients, with author and parents populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    pub id: String,
    pub user: Option<UserSummary>,
    #[serde(rename = "type")]
    pub kind: TweetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Absolute URL of the attached image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub likes: i64,
    pub retweets: i64,
    pub replies: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweet: Option<Box<TweetView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
    pub created_at: String,
    pub updated_at: String,
}
