//! Page/limit pagination with computed `next`/`prev` links.
//!
//! Query values arrive as raw strings so that garbage (`?page=abc`) falls
//! back to the defaults instead of rejecting the request.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 25;

/// Raw `?page=&limit=&sort=` query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

/// Sort keyword → sort field. Every order is descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first.
    New,
    /// Most liked first.
    #[default]
    Top,
    /// Most retweeted first.
    Trending,
    /// Most replied-to first.
    Replies,
}

impl SortOrder {
    /// Parse a sort keyword. Missing or unknown keywords map to [`SortOrder::Top`].
    pub fn parse(keyword: Option<&str>) -> Self {
        match keyword.map(str::trim) {
            Some("new") => SortOrder::New,
            Some("top") => SortOrder::Top,
            Some("trending") => SortOrder::Trending,
            Some("replies") => SortOrder::Replies,
            _ => SortOrder::default(),
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::New => "new",
            SortOrder::Top => "top",
            SortOrder::Trending => "trending",
            SortOrder::Replies => "replies",
        }
    }

    /// Name of the document field this order sorts on (descending).
    pub fn field(&self) -> &'static str {
        match self {
            SortOrder::New => "created_at",
            SortOrder::Top => "likes",
            SortOrder::Trending => "retweets",
            SortOrder::Replies => "replies",
        }
    }
}

/// Normalized pagination parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    /// 1-based page number.
    pub page: u64,
    pub limit: u64,
    pub sort: SortOrder,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort: SortOrder::default(),
        }
    }
}

fn positive_or(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(default)
}

impl PageParams {
    pub fn new(page: u64, limit: u64, sort: SortOrder) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
            sort,
        }
    }

    pub fn from_query(query: &PageQuery) -> Self {
        Self {
            page: positive_or(query.page.as_deref(), DEFAULT_PAGE),
            limit: positive_or(query.limit.as_deref(), DEFAULT_LIMIT),
            sort: SortOrder::parse(query.sort.as_deref()),
        }
    }

    /// Number of items before this page.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Items left after this page, given the total for the same filter.
    /// Zero when this page reaches or passes the end.
    pub fn remaining(&self, total: u64) -> u64 {
        total.saturating_sub(self.page.saturating_mul(self.limit))
    }

    fn link(&self, base: &str, page: u64) -> String {
        format!(
            "{}?page={}&limit={}&sort={}",
            base,
            page,
            self.limit,
            self.sort.keyword()
        )
    }

    /// Build `next`/`prev` links for `base` (absolute URL of the route).
    pub fn links(&self, base: &str, total: u64) -> Links {
        Links {
            next: (self.remaining(total) > 0).then(|| self.link(base, self.page + 1)),
            prev: (self.page > 1).then(|| self.link(base, self.page - 1)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    pub next: Option<String>,
    pub prev: Option<String>,
}

/// One page of results plus the total for the same filter.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub params: PageParams,
}

impl<T> Page<T> {
    pub fn links(&self, base: &str) -> Links {
        self.params.links(base, self.total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            params: self.params,
        }
    }
}
