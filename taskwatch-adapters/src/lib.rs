//! # taskwatch-adapters
//!
//! Query executors for reading ERP scheduler state.
//!
//! An executor runs one parameterless SQL statement and hands back every row
//! as an ordered list of column name / value pairs. Executors own the
//! connection lifecycle: a connection is opened per call and released on
//! every exit path.
//!
//! ## Supported Systems
//!
//! - **SQL Server via ODBC** (`mssql` feature) - Any data source reachable
//!   through an ODBC driver, e.g. `ODBC Driver 17 for SQL Server`
//!
//! ## Quick Start (SQL Server)
//!
//! ```rust,ignore
//! use taskwatch_adapters::mssql::OdbcExecutor;
//! use taskwatch_adapters::QueryExecutor;
//!
//! let executor = OdbcExecutor::builder()
//!     .connection_string("DRIVER={ODBC Driver 17 for SQL Server};SERVER=erp;DATABASE=EpicorERP;UID=monitor;PWD=secret;")
//!     .build()?;
//!
//! let rows = executor.execute("SELECT SysTaskNum FROM Ice.SysTask")?;
//! println!("Fetched {} rows", rows.len());
//! ```

pub mod decode;
pub mod error;

#[cfg(feature = "mssql")]
pub mod mssql;

pub use decode::{cell_text, ColumnKind};
pub use error::{query_preview, ExecutorError};

// Re-export types for convenience
pub use taskwatch_types::{Row, Value};

use std::fmt::Debug;

/// Runs SQL text against a data source.
///
/// Implementations must materialize all rows before returning and release
/// any connection they opened, whether the call succeeds or fails.
pub trait QueryExecutor: Debug {
    /// Execute `query` and return every row in driver order.
    fn execute(&self, query: &str) -> Result<Vec<Row>, ExecutorError>;
}

impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    fn execute(&self, query: &str) -> Result<Vec<Row>, ExecutorError> {
        (**self).execute(query)
    }
}
