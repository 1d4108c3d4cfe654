//! Paginated tweet lists.

use twtr_core::{Page, PageParams};
use twtr_sql::{SQLConn, Value};

use crate::model::TweetView;
use crate::service::repo;
use crate::service::toggle::Relation;
use crate::service::{SocialError, SocialService};

/// Which tweets a list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed<'a> {
    /// Every tweet.
    All,
    /// Tweets written by a user.
    ByAuthor(&'a str),
    /// Replies to a tweet.
    RepliesTo(&'a str),
    /// Replies written by a user.
    AuthorReplies(&'a str),
    /// Tweets a user liked.
    LikedBy(&'a str),
    /// The actor's bookmarks.
    Bookmarks(&'a str),
    /// Tweets by the users the actor follows.
    Following(&'a str),
}

impl Feed<'_> {
    /// Route the list is served on, used as the base of pagination links.
    pub fn route(&self) -> String {
        match self {
            Feed::All => "/tweets".to_string(),
            Feed::ByAuthor(user) => format!("/users/{}/tweets", user),
            Feed::RepliesTo(tweet) => format!("/tweets/{}/replies", tweet),
            Feed::AuthorReplies(user) => format!("/users/{}/replies", user),
            Feed::LikedBy(user) => format!("/users/{}/likes", user),
            Feed::Bookmarks(_) => "/users/user/bookmarks".to_string(),
            Feed::Following(_) => "/users/user/tweets".to_string(),
        }
    }

    /// WHERE clause (without the keyword) and its single parameter.
    fn filter(&self) -> Option<(String, &str)> {
        let member_of = |relation: Relation| {
            format!(
                "id IN (SELECT target_id FROM memberships WHERE user_id = ?1 AND relation = '{}')",
                relation.as_str()
            )
        };
        match *self {
            Feed::All => None,
            Feed::ByAuthor(user) => Some(("user_id = ?1".to_string(), user)),
            Feed::RepliesTo(tweet) => Some(("reply_id = ?1".to_string(), tweet)),
            Feed::AuthorReplies(user) => {
                Some(("user_id = ?1 AND reply_id IS NOT NULL".to_string(), user))
            }
            Feed::LikedBy(user) => Some((member_of(Relation::Likes), user)),
            Feed::Bookmarks(user) => Some((member_of(Relation::Bookmarks), user)),
            Feed::Following(user) => Some((
                format!(
                    "user_id IN (SELECT target_id FROM memberships WHERE user_id = ?1 AND relation = '{}')",
                    Relation::Following.as_str()
                ),
                user,
            )),
        }
    }

    /// The user or tweet the list is scoped to must exist.
    fn check_scope(&self, db: &dyn SQLConn) -> Result<(), SocialError> {
        match *self {
            Feed::All => Ok(()),
            Feed::RepliesTo(tweet) => repo::require_tweet(db, tweet).map(|_| ()),
            Feed::ByAuthor(user)
            | Feed::AuthorReplies(user)
            | Feed::LikedBy(user)
            | Feed::Bookmarks(user)
            | Feed::Following(user) => repo::require_user(db, user).map(|_| ()),
        }
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

impl SocialService {
    /// One page of a tweet list plus the total under the same filter.
    ///
    /// Count and fetch share a transaction. Ties on the sort column fall
    /// back to newest insertion first.
    pub fn list_tweets(
        &self,
        feed: Feed<'_>,
        params: PageParams,
    ) -> Result<Page<TweetView>, SocialError> {
        let (clause, bound) = match feed.filter() {
            Some((clause, param)) => (format!(" WHERE {}", clause), vec![Value::from(param)]),
            None => (String::new(), Vec::new()),
        };

        self.in_transaction(|db| {
            feed.check_scope(db)?;

            let rows = db.query(&format!("SELECT COUNT(*) AS n FROM tweets{}", clause), &bound)?;
            let total = rows
                .first()
                .and_then(|r| r.get_i64("n"))
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(0);

            let n = bound.len();
            let sql = format!(
                "SELECT {} FROM tweets{} ORDER BY {} DESC, seq DESC LIMIT ?{} OFFSET ?{}",
                repo::TWEET_COLUMNS,
                clause,
                params.sort.field(),
                n + 1,
                n + 2
            );
            let mut values = bound.clone();
            values.push(Value::Integer(to_i64(params.limit)));
            values.push(Value::Integer(to_i64(params.skip())));

            let items = repo::query_tweets(db, &sql, &values)?
                .into_iter()
                .map(|t| repo::populate_tweet(db, t, &self.config.public_url, false))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Page {
                items,
                total,
                params,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TweetInput;
    use crate::service::testing::fixture;
    use twtr_core::SortOrder;

    fn ids(page: &Page<TweetView>) -> Vec<String> {
        page.items.iter().map(|t| t.id.clone()).collect()
    }

    #[test]
    fn pages_concatenate_to_full_list() {
        let f = fixture();
        let alice = f.user("alice");
        let mut posted: Vec<String> = (0..7).map(|i| f.tweet(&alice, &format!("t{}", i))).collect();
        posted.reverse();

        let full = f
            .svc
            .list_tweets(Feed::All, PageParams::new(1, 100, SortOrder::Top))
            .unwrap();
        assert_eq!(ids(&full), posted);

        let mut seen = Vec::new();
        let mut page = 1;
        loop {
            let p = f
                .svc
                .list_tweets(Feed::All, PageParams::new(page, 3, SortOrder::Top))
                .unwrap();
            assert_eq!(p.total, 7);
            let links = p.links("http://localhost:8080/tweets");
            assert_eq!(links.prev.is_some(), page > 1);
            seen.extend(ids(&p));
            if links.next.is_none() {
                break;
            }
            page += 1;
        }
        assert_eq!(page, 3);
        assert_eq!(seen, posted);
    }

    #[test]
    fn sorts_by_likes_then_newest() {
        let f = fixture();
        let alice = f.user("alice");
        let bob = f.user("bob");
        let a = f.tweet(&alice, "a");
        let b = f.tweet(&alice, "b");
        let c = f.tweet(&alice, "c");
        f.svc.toggle(&bob, Relation::Likes, &a).unwrap();

        let top = f
            .svc
            .list_tweets(Feed::All, PageParams::new(1, 10, SortOrder::Top))
            .unwrap();
        assert_eq!(ids(&top), vec![a.clone(), c.clone(), b.clone()]);

        let new = f
            .svc
            .list_tweets(Feed::All, PageParams::new(1, 10, SortOrder::New))
            .unwrap();
        assert_eq!(ids(&new), vec![c, b, a]);
    }

    #[test]
    fn scoped_lists() {
        let f = fixture();
        let alice = f.user("alice");
        let bob = f.user("bob");
        let carol = f.user("carol");
        let by_bob = f.tweet(&bob, "bob");
        let by_carol = f.tweet(&carol, "carol");
        let reply = f
            .svc
            .create_tweet(
                &alice,
                TweetInput {
                    text: Some("re".into()),
                    reply_id: Some(by_bob.clone()),
                    ..Default::default()
                },
                None,
            )
            .unwrap()
            .unwrap();
        f.svc.toggle(&alice, Relation::Likes, &by_carol).unwrap();
        f.svc.toggle(&alice, Relation::Bookmarks, &by_bob).unwrap();
        f.svc.toggle(&alice, Relation::Following, &bob).unwrap();

        let list = |feed| ids(&f.svc.list_tweets(feed, PageParams::default()).unwrap());
        assert_eq!(list(Feed::ByAuthor(&bob)), vec![by_bob.clone()]);
        assert_eq!(list(Feed::RepliesTo(&by_bob)), vec![reply.clone()]);
        assert_eq!(list(Feed::AuthorReplies(&alice)), vec![reply]);
        assert_eq!(list(Feed::LikedBy(&alice)), vec![by_carol]);
        assert_eq!(list(Feed::Bookmarks(&alice)), vec![by_bob.clone()]);
        assert_eq!(list(Feed::Following(&alice)), vec![by_bob.clone()]);
        assert!(list(Feed::Following(&bob)).is_empty());
    }

    #[test]
    fn unknown_scope_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.svc.list_tweets(Feed::ByAuthor("ghost"), PageParams::default()),
            Err(SocialError::NotFound(_))
        ));
        assert!(matches!(
            f.svc.list_tweets(Feed::RepliesTo("ghost"), PageParams::default()),
            Err(SocialError::NotFound(_))
        ));
    }

    #[test]
    fn page_past_the_end_is_empty() {
        let f = fixture();
        let alice = f.user("alice");
        f.tweet(&alice, "only");
        let p = f
            .svc
            .list_tweets(Feed::All, PageParams::new(5, 10, SortOrder::Top))
            .unwrap();
        assert!(p.items.is_empty());
        assert_eq!(p.total, 1);
        assert!(p.links("/tweets").next.is_none());
        assert!(p.links("/tweets").prev.is_some());
    }

    #[test]
    fn routes() {
        assert_eq!(Feed::All.route(), "/tweets");
        assert_eq!(Feed::LikedBy("u1").route(), "/users/u1/likes");
        assert_eq!(Feed::Following("u1").route(), "/users/user/tweets");
    }
}
