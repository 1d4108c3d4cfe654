use serde::{Deserialize, Serialize};

use twtr_core::now_rfc3339;
use twtr_sql::{SQLConn, Value};

use crate::service::repo;
use crate::service::{SocialError, SocialService};

/// A user's membership set, and the counter each one drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Likes,
    Retweets,
    Replies,
    Bookmarks,
    Following,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Likes => "likes",
            Relation::Retweets => "retweets",
            Relation::Replies => "replies",
            Relation::Bookmarks => "bookmarks",
            Relation::Following => "following",
        }
    }

    /// Table holding the target entity.
    fn target_table(&self) -> &'static str {
        match self {
            Relation::Following => "users",
            _ => "tweets",
        }
    }

    /// Counter column on the target, if the relation has one.
    fn counter(&self) -> Option<&'static str> {
        match self {
            Relation::Likes => Some("likes"),
            Relation::Retweets => Some("retweets"),
            Relation::Replies => Some("replies"),
            Relation::Bookmarks => None,
            Relation::Following => Some("followers"),
        }
    }

    fn target_label(&self) -> &'static str {
        match self {
            Relation::Following => "user",
            _ => "tweet",
        }
    }
}

/// Result of a toggle: whether the actor is now a member and the target's
/// counter afterwards (`None` for bookmarks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleOutcome {
    pub relation: Relation,
    pub target_id: String,
    pub active: bool,
    pub count: Option<i64>,
}

/// Ids in `user_id`'s `relation` set, oldest first.
pub(crate) fn memberships(
    db: &dyn SQLConn,
    user_id: &str,
    relation: Relation,
) -> Result<Vec<String>, SocialError> {
    let rows = db.query(
        "SELECT target_id FROM memberships WHERE user_id = ?1 AND relation = ?2 ORDER BY seq",
        &[user_id.into(), relation.as_str().into()],
    )?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get_str("target_id").map(str::to_string))
        .collect())
}

pub(crate) fn is_member(
    db: &dyn SQLConn,
    user_id: &str,
    relation: Relation,
    target_id: &str,
) -> Result<bool, SocialError> {
    let rows = db.query(
        "SELECT 1 AS hit FROM memberships WHERE user_id = ?1 AND relation = ?2 AND target_id = ?3",
        &[user_id.into(), relation.as_str().into(), target_id.into()],
    )?;
    Ok(!rows.is_empty())
}

/// Add or remove `target_id` from the set. Returns whether anything changed.
pub(crate) fn set_member(
    db: &dyn SQLConn,
    user_id: &str,
    relation: Relation,
    target_id: &str,
    member: bool,
) -> Result<bool, SocialError> {
    let affected = if member {
        db.exec(
            "INSERT OR IGNORE INTO memberships (user_id, relation, target_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            &[
                user_id.into(),
                relation.as_str().into(),
                target_id.into(),
                now_rfc3339().into(),
            ],
        )?
    } else {
        db.exec(
            "DELETE FROM memberships WHERE user_id = ?1 AND relation = ?2 AND target_id = ?3",
            &[user_id.into(), relation.as_str().into(), target_id.into()],
        )?
    };
    Ok(affected > 0)
}

/// Adjust the target's counter in place and return the new value.
/// No-op returning `None` for relations without a counter.
pub(crate) fn bump(
    db: &dyn SQLConn,
    relation: Relation,
    target_id: &str,
    delta: i64,
) -> Result<Option<i64>, SocialError> {
    let Some(column) = relation.counter() else {
        return Ok(None);
    };
    let table = relation.target_table();
    db.exec(
        &format!(
            "UPDATE {t} SET {c} = MAX({c} + ?1, 0) WHERE id = ?2",
            t = table,
            c = column
        ),
        &[Value::Integer(delta), target_id.into()],
    )?;
    let rows = db.query(
        &format!("SELECT {} AS n FROM {} WHERE id = ?1", column, table),
        &[target_id.into()],
    )?;
    Ok(rows.first().and_then(|r| r.get_i64("n")))
}

fn target_exists(db: &dyn SQLConn, relation: Relation, target_id: &str) -> Result<bool, SocialError> {
    let rows = db.query(
        &format!("SELECT 1 AS hit FROM {} WHERE id = ?1", relation.target_table()),
        &[target_id.into()],
    )?;
    Ok(!rows.is_empty())
}

/// Flip membership and move the counter with it. Runs inside the caller's
/// transaction.
pub(crate) fn toggle_in(
    db: &dyn SQLConn,
    actor_id: &str,
    relation: Relation,
    target_id: &str,
) -> Result<ToggleOutcome, SocialError> {
    repo::require_user(db, actor_id)?;
    if !target_exists(db, relation, target_id)? {
        return Err(SocialError::NotFound(format!(
            "{} {}",
            relation.target_label(),
            target_id
        )));
    }
    if relation == Relation::Following && actor_id == target_id {
        return Err(SocialError::invalid("userId", "You cannot follow yourself"));
    }

    let active = !is_member(db, actor_id, relation, target_id)?;
    set_member(db, actor_id, relation, target_id, active)?;
    let count = bump(db, relation, target_id, if active { 1 } else { -1 })?;

    Ok(ToggleOutcome {
        relation,
        target_id: target_id.to_string(),
        active,
        count,
    })
}

impl SocialService {
    /// Toggle bookmark, like or follow for the actor.
    ///
    /// Retweets and replies are toggled through tweet creation instead.
    pub fn toggle(
        &self,
        actor_id: &str,
        relation: Relation,
        target_id: &str,
    ) -> Result<ToggleOutcome, SocialError> {
        if matches!(relation, Relation::Retweets | Relation::Replies) {
            return Err(SocialError::Internal(format!(
                "{} is toggled by posting a tweet",
                relation.as_str()
            )));
        }
        let outcome = self.in_transaction(|db| toggle_in(db, actor_id, relation, target_id))?;
        tracing::debug!(
            "toggle {} {} -> {} active={}",
            actor_id,
            relation.as_str(),
            target_id,
            outcome.active
        );
        Ok(outcome)
    }
}
