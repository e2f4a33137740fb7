//! Error types for query executors.

use thiserror::Error;

/// Maximum number of query characters carried in errors and logs.
pub const QUERY_PREVIEW_LEN: usize = 100;

/// Errors that can occur when executing a query.
///
/// Both variants carry the beginning of the offending query and the driver
/// diagnostic code (SQLSTATE) when the driver reported one.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The data source could not be reached.
    #[error(
        "Connection failed (SQLSTATE {}): {message}",
        .sqlstate.as_deref().unwrap_or("unknown")
    )]
    Connection {
        query: String,
        sqlstate: Option<String>,
        message: String,
    },

    /// The statement failed after a connection was established.
    #[error(
        "Query failed (SQLSTATE {}): {message} - query: {query}",
        .sqlstate.as_deref().unwrap_or("unknown")
    )]
    Query {
        query: String,
        sqlstate: Option<String>,
        message: String,
    },
}

impl ExecutorError {
    /// Build a connection error for `query`.
    pub fn connection(
        query: &str,
        sqlstate: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        ExecutorError::Connection {
            query: query_preview(query),
            sqlstate,
            message: message.into(),
        }
    }

    /// Build a query error for `query`.
    pub fn query(query: &str, sqlstate: Option<String>, message: impl Into<String>) -> Self {
        ExecutorError::Query {
            query: query_preview(query),
            sqlstate,
            message: message.into(),
        }
    }

    /// The (truncated) query that failed.
    pub fn query_text(&self) -> &str {
        match self {
            ExecutorError::Connection { query, .. } | ExecutorError::Query { query, .. } => query,
        }
    }

    /// Driver diagnostic code, if any.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            ExecutorError::Connection { sqlstate, .. } | ExecutorError::Query { sqlstate, .. } => {
                sqlstate.as_deref()
            }
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ExecutorError::Connection { .. })
    }
}

/// First [`QUERY_PREVIEW_LEN`] characters of a query, whitespace collapsed.
pub fn query_preview(query: &str) -> String {
    let collapsed = query.split_whitespace().collect::<Vec<_>>().join(" ");
    match collapsed.char_indices().nth(QUERY_PREVIEW_LEN) {
        Some((end, _)) => format!("{}...", &collapsed[..end]),
        None => collapsed,
    }
}
