use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use twtr_core::{Envelope, Links};

use crate::context::{AppContext, Notification};
use crate::error::ApiError;

const FETCH_FAILED: &str = "There was an error. Please try again later.";

/// Author fields embedded in a tweet.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Author {
    pub id: String,
    pub username: String,
    pub handle: String,
    pub avatar: Option<String>,
}

/// A tweet as listed by the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub user: Option<Author>,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<String>,
    pub link: Option<String>,
    pub image: Option<String>,
    pub likes: i64,
    pub retweets: i64,
    pub replies: i64,
    pub retweet: Option<Box<Tweet>>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
struct PageBody {
    tweets: Vec<Tweet>,
    links: Links,
}

#[derive(Default)]
struct FeedState {
    tweets: Vec<Tweet>,
    next: Option<String>,
    sort: String,
    /// Bumped on every sort change; responses for older generations are dropped.
    generation: u64,
}

/// Infinite-scroll consumer of one paginated tweet list.
pub struct FeedContainer {
    ctx: AppContext,
    route: String,
    state: Mutex<FeedState>,
}

impl FeedContainer {
    /// `route` is the list path on the server, e.g. `/tweets`.
    pub fn new(ctx: AppContext, route: impl Into<String>) -> Self {
        Self {
            ctx,
            route: route.into(),
            state: Mutex::new(FeedState::default()),
        }
    }

    async fn fetch(&self, url: &str) -> Result<PageBody, ApiError> {
        match self.ctx.get_json::<Envelope<PageBody>>(url).await {
            Ok(envelope) => Ok(envelope.data),
            Err(e) => {
                debug!("feed fetch {} failed: {}", url, e);
                self.ctx.notify(Notification::warning(FETCH_FAILED));
                Err(e)
            }
        }
    }

    /// Replace the feed with the first page for `sort`.
    ///
    /// Returns `Ok(false)` when another `load` started meanwhile and this
    /// response was dropped.
    pub async fn load(&self, sort: &str) -> Result<bool, ApiError> {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.sort = sort.to_string();
            state.next = None;
            state.generation
        };

        let url = format!("{}{}?sort={}", self.ctx.base_url(), self.route, sort);
        let page = self.fetch(&url).await?;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            debug!("dropping stale first page for sort={}", sort);
            return Ok(false);
        }
        state.tweets = page.tweets;
        state.next = page.links.next;
        Ok(true)
    }

    /// Append the page behind the `next` link.
    ///
    /// Returns `Ok(false)` when there is nothing to load: the feed is at its
    /// end, another `load_more` holds the cursor, or the sort changed while
    /// this page was in flight.
    pub async fn load_more(&self) -> Result<bool, ApiError> {
        let (url, generation) = {
            let mut state = self.state.lock().await;
            match state.next.take() {
                Some(url) => (url, state.generation),
                None => return Ok(false),
            }
        };

        match self.fetch(&url).await {
            Ok(page) => {
                let mut state = self.state.lock().await;
                if state.generation != generation {
                    return Ok(false);
                }
                state.tweets.extend(page.tweets);
                state.next = page.links.next;
                Ok(true)
            }
            Err(e) => {
                // Put the cursor back so a later scroll can retry.
                let mut state = self.state.lock().await;
                if state.generation == generation && state.next.is_none() {
                    state.next = Some(url);
                }
                Err(e)
            }
        }
    }

    pub async fn tweets(&self) -> Vec<Tweet> {
        self.state.lock().await.tweets.clone()
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.next.is_some()
    }

    pub async fn sort(&self) -> String {
        self.state.lock().await.sort.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;
    use crate::context::{NoAuth, Notifier, StaticToken};

    const TOTAL: usize = 5;
    const LIMIT: usize = 2;

    struct Stub {
        base: String,
        hits: AtomicUsize,
        gate: Notify,
    }

    /// `sort=slow` pages after the first and the first page of `sort=stale`
    /// wait for `gate`; `sort=broken` fails after the first page.
    async fn list(
        State(stub): State<Arc<Stub>>,
        Query(q): Query<HashMap<String, String>>,
    ) -> Response {
        stub.hits.fetch_add(1, Ordering::SeqCst);
        let page: usize = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
        let sort = q.get("sort").cloned().unwrap_or_else(|| "top".into());

        if (sort == "slow" && page > 1) || (sort == "stale" && page == 1) {
            stub.gate.notified().await;
        }
        if sort == "broken" && page > 1 {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"code": "STORAGE_ERROR", "message": "disk"})),
            )
                .into_response();
        }

        let start = (page - 1) * LIMIT;
        let tweets: Vec<_> = (start..TOTAL.min(start + LIMIT))
            .map(|i| json!({"id": format!("{sort}-{i}"), "type": "text", "likes": 0}))
            .collect();
        let link = |p: usize| format!("{}/tweets?page={p}&limit={LIMIT}&sort={sort}", stub.base);
        let next = (TOTAL as i64 - (page * LIMIT) as i64 > 0).then(|| link(page + 1));
        let prev = (page > 1).then(|| link(page - 1));
        Json(json!({"data": {"tweets": tweets, "links": {"next": next, "prev": prev}}})).into_response()
    }

    async fn private(headers: HeaderMap) -> Response {
        match headers.get("authorization").and_then(|v| v.to_str().ok()) {
            Some("Bearer jwt") => {
                Json(json!({"data": {"tweets": [], "links": {"next": null, "prev": null}}}))
                    .into_response()
            }
            _ => (
                StatusCode::UNAUTHORIZED,
                Json(json!({"code": "UNAUTHENTICATED", "message": "missing bearer token"})),
            )
                .into_response(),
        }
    }

    async fn serve() -> Arc<Stub> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let stub = Arc::new(Stub {
            base: format!("http://{addr}"),
            hits: AtomicUsize::new(0),
            gate: Notify::new(),
        });
        let app = Router::new()
            .route("/tweets", get(list))
            .route("/users/user/tweets", get(private))
            .with_state(stub.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        stub
    }

    #[derive(Default)]
    struct Recorder(std::sync::Mutex<Vec<Notification>>);

    impl Notifier for Recorder {
        fn notify(&self, notification: Notification) {
            self.0.lock().unwrap().push(notification);
        }
    }

    fn container(stub: &Stub, route: &str, notifier: Arc<Recorder>) -> Arc<FeedContainer> {
        let ctx = AppContext::new(stub.base.clone(), Arc::new(NoAuth), notifier);
        Arc::new(FeedContainer::new(ctx, route))
    }

    async fn wait_for_hits(stub: &Stub, n: usize) {
        while stub.hits.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn scrolls_to_the_end_without_gaps() {
        let stub = serve().await;
        let feed = container(&stub, "/tweets", Arc::default());

        assert!(feed.load("new").await.unwrap());
        assert!(feed.has_more().await);
        while feed.load_more().await.unwrap() {}

        let ids: Vec<_> = feed.tweets().await.into_iter().map(|t| t.id).collect();
        let expected: Vec<_> = (0..TOTAL).map(|i| format!("new-{i}")).collect();
        assert_eq!(ids, expected);
        assert!(!feed.has_more().await);
        assert_eq!(feed.sort().await, "new");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_load_more_fetches_once() {
        let stub = serve().await;
        let feed = container(&stub, "/tweets", Arc::default());
        feed.load("slow").await.unwrap();

        let first = tokio::spawn({
            let feed = feed.clone();
            async move { feed.load_more().await }
        });
        wait_for_hits(&stub, 2).await;

        // The cursor is held by the in-flight request.
        assert!(!feed.load_more().await.unwrap());
        stub.gate.notify_one();
        assert!(first.await.unwrap().unwrap());

        assert_eq!(feed.tweets().await.len(), 4);
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn sort_change_drops_stale_response() {
        let stub = serve().await;
        let feed = container(&stub, "/tweets", Arc::default());

        let stale = tokio::spawn({
            let feed = feed.clone();
            async move { feed.load("stale").await }
        });
        wait_for_hits(&stub, 1).await;

        assert!(feed.load("top").await.unwrap());
        stub.gate.notify_one();
        assert!(!stale.await.unwrap().unwrap());

        let ids: Vec<_> = feed.tweets().await.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["top-0".to_string(), "top-1".to_string()]);
        assert_eq!(feed.sort().await, "top");
    }

    #[tokio::test]
    async fn failure_notifies_and_keeps_cursor() {
        let stub = serve().await;
        let notifier = Arc::new(Recorder::default());
        let feed = container(&stub, "/tweets", notifier.clone());

        feed.load("broken").await.unwrap();
        let err = feed.load_more().await.unwrap_err();
        assert!(matches!(err, ApiError::Server { status: 500, .. }));
        assert!(feed.has_more().await);
        assert_eq!(feed.tweets().await.len(), 2);

        let seen = notifier.0.lock().unwrap().clone();
        assert_eq!(seen, vec![Notification::warning(FETCH_FAILED)]);
    }

    #[tokio::test]
    async fn token_source_is_sent() {
        let stub = serve().await;

        let anonymous = container(&stub, "/users/user/tweets", Arc::default());
        match anonymous.load("new").await.unwrap_err() {
            ApiError::Server { status, code, .. } => {
                assert_eq!(status, 401);
                assert_eq!(code, "UNAUTHENTICATED");
            }
            other => panic!("unexpected {other:?}"),
        }

        let ctx = AppContext::new(
            stub.base.clone(),
            Arc::new(StaticToken::new("jwt")),
            Arc::new(Recorder::default()),
        );
        let feed = FeedContainer::new(ctx, "/users/user/tweets");
        assert!(feed.load("new").await.unwrap());
        assert!(feed.tweets().await.is_empty());
    }
}
