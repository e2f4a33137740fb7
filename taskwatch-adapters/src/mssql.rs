//! SQL Server executor over ODBC.
//!
//! Connects with a classic ODBC connection string, so the same string that
//! works for other ODBC clients works here.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use taskwatch_adapters::mssql::OdbcExecutor;
//! use taskwatch_adapters::QueryExecutor;
//!
//! let executor = OdbcExecutor::builder()
//!     .connection_string("DRIVER={ODBC Driver 17 for SQL Server};SERVER=erp;DATABASE=EpicorERP;Trusted_Connection=yes;")
//!     .login_timeout(Duration::from_secs(15))
//!     .build()?;
//!
//! for row in executor.execute("SELECT TOP 5 SysTaskNum, TaskDescription FROM Ice.SysTask")? {
//!     println!("{:?}", row.get("SysTaskNum"));
//! }
//! ```

use std::fmt;
use std::time::Duration;

use odbc_api::buffers::TextRowSet;
use odbc_api::{
    Connection, ConnectionOptions, Cursor, DataType, Environment, ResultSetMetadata,
};
use tracing::{debug, warn};

use taskwatch_types::Row;

use crate::decode::{cell_text, ColumnKind};
use crate::error::query_preview;
use crate::{ExecutorError, QueryExecutor};

/// Rows fetched per round trip.
const BATCH_SIZE: usize = 500;

/// Upper bound for a single text cell, in bytes.
///
/// Longer values are cut to this length and a warning is logged once per
/// column and query. Every column the monitor reads is far shorter.
const MAX_TEXT_LEN: usize = 4096;

/// Executor that opens one ODBC connection per query.
pub struct OdbcExecutor {
    environment: Environment,
    connection_string: String,
    login_timeout: Option<Duration>,
}

impl OdbcExecutor {
    /// Create a new builder for configuring the executor.
    pub fn builder() -> OdbcExecutorBuilder {
        OdbcExecutorBuilder::default()
    }

    fn connect(&self) -> Result<Connection<'_>, odbc_api::Error> {
        let options = ConnectionOptions {
            login_timeout_sec: self.login_timeout.map(login_timeout_secs),
            ..ConnectionOptions::default()
        };
        self.environment
            .connect_with_connection_string(&self.connection_string, options)
    }
}

impl QueryExecutor for OdbcExecutor {
    fn execute(&self, query: &str) -> Result<Vec<Row>, ExecutorError> {
        let connection = self
            .connect()
            .map_err(|e| ExecutorError::connection(query, sqlstate(&e), e.to_string()))?;
        debug!("Database connection established");
        debug!("Executing query: {}", query_preview(query));

        let result = fetch_rows(&connection, query)
            .map_err(|e| ExecutorError::query(query, sqlstate(&e), e.to_string()));

        drop(connection);
        debug!("Database connection released");

        let rows = result?;
        debug!("Query returned {} rows", rows.len());
        Ok(rows)
    }
}

impl fmt::Debug for OdbcExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdbcExecutor")
            .field("connection_string", &"<redacted>")
            .field("login_timeout", &self.login_timeout)
            .finish()
    }
}

/// Builder for OdbcExecutor.
#[derive(Default)]
pub struct OdbcExecutorBuilder {
    connection_string: Option<String>,
    login_timeout: Option<Duration>,
}

impl OdbcExecutorBuilder {
    /// Set the ODBC connection string.
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Set the login timeout (driver default if not set).
    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = Some(timeout);
        self
    }

    /// Build the executor.
    ///
    /// Fails with a connection error if the ODBC environment cannot be
    /// allocated (typically a missing driver manager).
    pub fn build(self) -> Result<OdbcExecutor, ExecutorError> {
        let environment = Environment::new()
            .map_err(|e| ExecutorError::connection("", sqlstate(&e), e.to_string()))?;

        Ok(OdbcExecutor {
            environment,
            connection_string: self.connection_string.unwrap_or_default(),
            login_timeout: self.login_timeout,
        })
    }
}

impl fmt::Debug for OdbcExecutorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdbcExecutorBuilder")
            .field("login_timeout", &self.login_timeout)
            .finish_non_exhaustive()
    }
}

fn fetch_rows(connection: &Connection<'_>, query: &str) -> Result<Vec<Row>, odbc_api::Error> {
    let mut prepared = connection.prepare(query)?;
    let Some(mut cursor) = prepared.execute(())? else {
        // Statement produced no result set
        return Ok(Vec::new());
    };

    let columns: Vec<String> = cursor.column_names()?.collect::<Result<_, _>>()?;
    let mut kinds = Vec::with_capacity(columns.len());
    for index in 1..=columns.len() {
        kinds.push(column_kind(cursor.col_data_type(index as u16)?));
    }

    let buffer = TextRowSet::for_cursor(BATCH_SIZE, &mut cursor, Some(MAX_TEXT_LEN))?;
    let mut block = cursor.bind_buffer(buffer)?;

    let mut rows = Vec::new();
    let mut warned = vec![false; columns.len()];
    while let Some(batch) = block.fetch()? {
        for row_index in 0..batch.num_rows() {
            let mut row = Row::with_capacity(columns.len());
            for (col_index, (name, kind)) in columns.iter().zip(&kinds).enumerate() {
                let cell = batch.at(col_index, row_index).map(|raw| {
                    let (text, truncated) = cell_text(raw, MAX_TEXT_LEN);
                    if truncated && !warned[col_index] {
                        warn!(
                            "Column '{}' reached the {} byte fetch limit and may be truncated",
                            name, MAX_TEXT_LEN
                        );
                        warned[col_index] = true;
                    }
                    text
                });
                row.push(name.as_str(), kind.decode(cell.as_deref()));
            }
            rows.push(row);
        }
    }

    Ok(rows)
}

/// Whole seconds for the ODBC login timeout attribute, saturating at `u32::MAX`.
fn login_timeout_secs(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX)
}

fn column_kind(data_type: DataType) -> ColumnKind {
    match data_type {
        DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt => {
            ColumnKind::Integer
        }
        DataType::Decimal { scale: 0, .. } | DataType::Numeric { scale: 0, .. } => {
            ColumnKind::Integer
        }
        DataType::Decimal { .. }
        | DataType::Numeric { .. }
        | DataType::Float { .. }
        | DataType::Real
        | DataType::Double => ColumnKind::Float,
        DataType::Bit => ColumnKind::Bool,
        DataType::Date | DataType::Timestamp { .. } => ColumnKind::Timestamp,
        _ => ColumnKind::Text,
    }
}

fn sqlstate(error: &odbc_api::Error) -> Option<String> {
    match error {
        odbc_api::Error::Diagnostics { record, .. } => Some(record.state.as_str().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_kind_mapping() {
        assert_eq!(column_kind(DataType::Integer), ColumnKind::Integer);
        assert_eq!(column_kind(DataType::BigInt), ColumnKind::Integer);
        assert_eq!(column_kind(DataType::Double), ColumnKind::Float);
        assert_eq!(column_kind(DataType::Bit), ColumnKind::Bool);
        assert_eq!(column_kind(DataType::Date), ColumnKind::Timestamp);
        assert_eq!(
            column_kind(DataType::Timestamp { precision: 3 }),
            ColumnKind::Timestamp
        );
        assert_eq!(
            column_kind(DataType::Numeric {
                precision: 18,
                scale: 0
            }),
            ColumnKind::Integer
        );
        assert_eq!(
            column_kind(DataType::Decimal {
                precision: 18,
                scale: 2
            }),
            ColumnKind::Float
        );
    }

    #[test]
    fn test_login_timeout_saturates() {
        assert_eq!(login_timeout_secs(Duration::from_secs(15)), 15);
        assert_eq!(login_timeout_secs(Duration::from_millis(1500)), 1);
        assert_eq!(
            login_timeout_secs(Duration::from_secs(u64::from(u32::MAX) + 1)),
            u32::MAX
        );
    }

    #[test]
    fn test_debug_redacts_connection_string() {
        let builder = OdbcExecutor::builder().connection_string("PWD=hunter2;");
        assert!(!format!("{:?}", builder).contains("hunter2"));
    }
}
