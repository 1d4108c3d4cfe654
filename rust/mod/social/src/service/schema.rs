use twtr_sql::SQLConn;

use crate::service::SocialError;

/// Initialize the SQLite schema.
///
/// Each table keeps a JSON `data` document plus the columns that are queried,
/// sorted on or updated in place. Those columns are authoritative.
pub fn init_schema<S: SQLConn + ?Sized>(sql: &S) -> Result<(), SocialError> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            handle TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            confirmed INTEGER NOT NULL DEFAULT 0,
            followers INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        // seq gives a stable insertion order for tie-breaking.
        "CREATE TABLE IF NOT EXISTS tweets (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            retweet_id TEXT,
            reply_id TEXT,
            likes INTEGER NOT NULL DEFAULT 0,
            retweets INTEGER NOT NULL DEFAULT 0,
            replies INTEGER NOT NULL DEFAULT 0,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_tweets_user ON tweets(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_tweets_reply ON tweets(reply_id)",
        "CREATE INDEX IF NOT EXISTS idx_tweets_retweet ON tweets(retweet_id)",

        // Membership sets: a user's likes/retweets/replies/bookmarks (tweet ids)
        // and following (user ids).
        "CREATE TABLE IF NOT EXISTS memberships (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            relation TEXT NOT NULL,
            target_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (user_id, relation, target_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_memberships_target ON memberships(relation, target_id)",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])?;
    }

    Ok(())
}
