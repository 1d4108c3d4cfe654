use tracing::{debug, info};

use twtr_core::{new_id, now_rfc3339};
use twtr_sql::SQLConn;

use crate::model::{ImageUpload, TweetInput, TweetKind, TweetView};
use crate::service::repo::{self, TweetDoc, TweetRecord};
use crate::service::toggle::{Relation, bump, is_member, set_member};
use crate::service::validate::{self, TweetContent};
use crate::service::{SocialError, SocialService};

const TWEET_RELATIONS: [Relation; 4] = [
    Relation::Likes,
    Relation::Retweets,
    Relation::Replies,
    Relation::Bookmarks,
];

fn parse_kind(raw: Option<&str>, fallback: TweetKind) -> Result<TweetKind, SocialError> {
    match raw {
        None => Ok(fallback),
        Some(raw) => {
            TweetKind::parse(raw).ok_or_else(|| SocialError::invalid("type", "Unknown tweet type"))
        }
    }
}

/// Ids of `author`'s tweets that point at `parent` through `column`.
fn children_by(
    db: &dyn SQLConn,
    author: &str,
    column: &str,
    parent: &str,
) -> Result<Vec<String>, SocialError> {
    let rows = db.query(
        &format!("SELECT id FROM tweets WHERE user_id = ?1 AND {} = ?2 ORDER BY seq", column),
        &[author.into(), parent.into()],
    )?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get_str("id").map(str::to_string))
        .collect())
}

/// Remove a tweet and every reference to it. Image keys that are no longer
/// referenced are pushed to `orphans` for deletion after commit.
pub(crate) fn delete_cascade(
    db: &dyn SQLConn,
    tweet: &TweetRecord,
    orphans: &mut Vec<String>,
) -> Result<(), SocialError> {
    let id = tweet.id.as_str();

    for relation in TWEET_RELATIONS {
        db.exec(
            "DELETE FROM memberships WHERE relation = ?1 AND target_id = ?2",
            &[relation.as_str().into(), id.into()],
        )?;
    }
    db.exec("UPDATE tweets SET reply_id = NULL WHERE reply_id = ?1", &[id.into()])?;
    db.exec("UPDATE tweets SET retweet_id = NULL WHERE retweet_id = ?1", &[id.into()])?;

    let parents = [
        (Relation::Retweets, "retweet_id", &tweet.retweet_id),
        (Relation::Replies, "reply_id", &tweet.reply_id),
    ];
    for (relation, column, parent) in parents {
        let Some(parent) = parent else { continue };
        bump(db, relation, parent, -1)?;
        let siblings = children_by(db, &tweet.user_id, column, parent)?;
        if siblings.iter().all(|s| s == id) {
            set_member(db, &tweet.user_id, relation, parent, false)?;
        }
    }

    db.exec("DELETE FROM tweets WHERE id = ?1", &[id.into()])?;
    orphans.extend(tweet.doc.image.iter().cloned());
    Ok(())
}

/// Apply the type rules, reporting every failing field.
fn check_content(
    kind: TweetKind,
    text: Option<&str>,
    link_url: Option<&str>,
    is_retweet: bool,
    image: Option<&ImageUpload>,
) -> Result<(), SocialError> {
    let errors = validate::tweet(&TweetContent {
        kind,
        text,
        link_url,
        is_retweet,
        image: image.map(|i| i.content_type.as_str()),
    });
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SocialError::Validation(errors))
    }
}

impl SocialService {
    /// Store an image upload and return its blob key.
    fn store_image(&self, upload: &ImageUpload) -> Result<String, SocialError> {
        let ext = twtr_blob::extension_for(&upload.content_type)
            .ok_or_else(|| SocialError::invalid("image", "File must be an image"))?;
        let key = twtr_blob::upload_key("tweets", ext);
        self.blob.put(&key, &upload.bytes)?;
        Ok(key)
    }

    /// Create a tweet.
    ///
    /// With `retweet_id` this toggles the actor's retweet of the parent: when
    /// one already exists it is deleted and `None` is returned. With
    /// `reply_id` a reply is always created. Files attached to non-image
    /// tweets are ignored.
    pub fn create_tweet(
        &self,
        actor_id: &str,
        input: TweetInput,
        image: Option<ImageUpload>,
    ) -> Result<Option<String>, SocialError> {
        let input = input.normalized();
        let kind = parse_kind(input.kind.as_deref(), TweetKind::Text)?;
        if input.retweet_id.is_some() && input.reply_id.is_some() {
            return Err(SocialError::invalid(
                "replyId",
                "A tweet cannot be both a retweet and a reply",
            ));
        }
        let image = image.filter(|_| kind == TweetKind::Image);
        check_content(
            kind,
            input.text.as_deref(),
            input.link_url.as_deref(),
            input.retweet_id.is_some(),
            image.as_ref(),
        )?;

        let image_key = image.as_ref().map(|i| self.store_image(i)).transpose()?;
        let now = now_rfc3339();
        let record = TweetRecord {
            id: new_id(),
            user_id: actor_id.to_string(),
            kind,
            doc: TweetDoc {
                text: input.text.map(|t| t.trim().to_string()),
                link: if kind == TweetKind::Link {
                    input.link_url.map(|l| l.trim().to_string())
                } else {
                    None
                },
                image: image_key.clone(),
            },
            retweet_id: input.retweet_id,
            reply_id: input.reply_id,
            likes: 0,
            retweets: 0,
            replies: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        let result = self.in_transaction(|db| {
            repo::require_user(db, actor_id)?;
            let mut orphans = Vec::new();

            if let Some(parent) = &record.retweet_id {
                repo::require_tweet(db, parent)?;
                if is_member(db, actor_id, Relation::Retweets, parent)? {
                    for id in children_by(db, actor_id, "retweet_id", parent)? {
                        if let Some(existing) = repo::find_tweet(db, &id)? {
                            delete_cascade(db, &existing, &mut orphans)?;
                        }
                    }
                    // Membership without a retweet row: drop it and restore the counter.
                    if set_member(db, actor_id, Relation::Retweets, parent, false)? {
                        bump(db, Relation::Retweets, parent, -1)?;
                    }
                    return Ok((None, orphans));
                }
                repo::insert_tweet(db, &record)?;
                set_member(db, actor_id, Relation::Retweets, parent, true)?;
                bump(db, Relation::Retweets, parent, 1)?;
            } else if let Some(parent) = &record.reply_id {
                repo::require_tweet(db, parent)?;
                repo::insert_tweet(db, &record)?;
                set_member(db, actor_id, Relation::Replies, parent, true)?;
                bump(db, Relation::Replies, parent, 1)?;
            } else {
                repo::insert_tweet(db, &record)?;
            }
            Ok((Some(record.id.clone()), orphans))
        });

        match result {
            Ok((created, mut orphans)) => {
                if created.is_none() {
                    orphans.extend(image_key);
                }
                self.discard_blobs(&orphans);
                match &created {
                    Some(id) => info!("user {} posted tweet {}", actor_id, id),
                    None => debug!("user {} undid retweet", actor_id),
                }
                Ok(created)
            }
            Err(e) => {
                self.discard_blobs(&image_key.into_iter().collect::<Vec<_>>());
                Err(e)
            }
        }
    }

    /// Replace a tweet's content. Only the author may do this; parent
    /// references and counters are untouched. Image tweets need a new file.
    pub fn update_tweet(
        &self,
        actor_id: &str,
        tweet_id: &str,
        input: TweetInput,
        image: Option<ImageUpload>,
    ) -> Result<(), SocialError> {
        let input = input.normalized();
        let current = self.in_transaction(|db| repo::require_tweet(db, tweet_id))?;
        if current.user_id != actor_id {
            return Err(SocialError::Forbidden(format!(
                "tweet {} belongs to another user",
                tweet_id
            )));
        }

        let kind = parse_kind(input.kind.as_deref(), current.kind)?;
        let image = image.filter(|_| kind == TweetKind::Image);
        let text = input.text.or(current.doc.text.clone());
        let link_url = match kind {
            TweetKind::Link => input.link_url.or(current.doc.link.clone()),
            _ => None,
        };
        check_content(
            kind,
            text.as_deref(),
            link_url.as_deref(),
            current.retweet_id.is_some(),
            image.as_ref(),
        )?;

        let image_key = image.as_ref().map(|i| self.store_image(i)).transpose()?;
        let result = self.in_transaction(|db| {
            let mut tweet = repo::require_tweet(db, tweet_id)?;
            let previous = tweet.doc.image.take();
            tweet.kind = kind;
            tweet.doc = TweetDoc {
                text: text.as_deref().map(|t| t.trim().to_string()),
                link: link_url.as_deref().map(|l| l.trim().to_string()),
                image: image_key.clone(),
            };
            tweet.updated_at = now_rfc3339();
            repo::update_tweet(db, &tweet)?;
            Ok(previous)
        });

        match result {
            Ok(previous) => {
                self.discard_blobs(&previous.into_iter().collect::<Vec<_>>());
                debug!("user {} updated tweet {}", actor_id, tweet_id);
                Ok(())
            }
            Err(e) => {
                self.discard_blobs(&image_key.into_iter().collect::<Vec<_>>());
                Err(e)
            }
        }
    }

    /// Delete a tweet with its references. Only the author may do this.
    pub fn delete_tweet(&self, actor_id: &str, tweet_id: &str) -> Result<(), SocialError> {
        let orphans = self.in_transaction(|db| {
            let tweet = repo::require_tweet(db, tweet_id)?;
            if tweet.user_id != actor_id {
                return Err(SocialError::Forbidden(format!(
                    "tweet {} belongs to another user",
                    tweet_id
                )));
            }
            let mut orphans = Vec::new();
            delete_cascade(db, &tweet, &mut orphans)?;
            Ok(orphans)
        })?;
        self.discard_blobs(&orphans);
        info!("user {} deleted tweet {}", actor_id, tweet_id);
        Ok(())
    }

    pub fn get_tweet(&self, tweet_id: &str) -> Result<TweetView, SocialError> {
        self.in_transaction(|db| {
            let tweet = repo::require_tweet(db, tweet_id)?;
            repo::populate_tweet(db, tweet, &self.config.public_url, false)
        })
    }
}
