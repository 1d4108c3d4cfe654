//! twtr HTTP client.
//!
//! The centerpiece is [`FeedContainer`], an infinite-scroll consumer of the
//! server's paginated tweet lists: it loads the first page for a sort order,
//! follows `next` links on demand and reports failures through the
//! application's [`Notifier`].
//!
//! # Usage
//!
//! ```ignore
//! use twtr_client::{AppContext, FeedContainer, StaticToken, LogNotifier};
//!
//! let ctx = AppContext::new("http://localhost:8080", Arc::new(StaticToken::new(jwt)), Arc::new(LogNotifier));
//! let feed = FeedContainer::new(ctx, "/users/user/tweets");
//! feed.load("new").await?;
//! while feed.load_more().await? {}
//! ```

mod context;
mod error;
mod feed;

pub use context::{AppContext, LogNotifier, NoAuth, Notification, NotificationKind, Notifier, StaticToken, TokenSource};
pub use error::ApiError;
pub use feed::{Author, FeedContainer, Tweet};
