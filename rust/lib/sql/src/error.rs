use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A UNIQUE constraint rejected the write. Carries the offending
    /// `table.column` list as reported by SQLite.
    #[error("unique constraint failed: {0}")]
    Unique(String),

    /// The transaction body asked for a rollback.
    #[error("transaction aborted: {0}")]
    Aborted(String),
}
