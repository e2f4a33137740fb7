//! Category-specific processing of scheduler rows.
//!
//! Each [`ProcessingStrategy`] owns the SQL for one category and turns the
//! rows it returns into a [`TaskStatistics`]. A malformed row never fails
//! the category: it is logged and skipped.

mod active;
mod queued;

pub use active::ActiveStrategy;
pub use queued::QueuedStrategy;

use std::fmt::Debug;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::warn;

use taskwatch_types::{Category, Row, Task, TaskStatistics, Value};

/// Turns the rows of one category query into statistics.
pub trait ProcessingStrategy: Debug {
    fn category(&self) -> Category;

    /// Stable name used in logs and notification titles.
    fn category_name(&self) -> &'static str {
        self.category().label()
    }

    /// Parameterless SQL returning this category's rows.
    fn query_text(&self) -> &str;

    /// Build statistics from raw rows. Never fails; bad rows are skipped.
    fn process(&self, rows: &[Row]) -> TaskStatistics;
}

/// Why a row could not be converted into a [`Task`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("required column '{0}' is missing or NULL")]
    MissingColumn(&'static str),

    #[error("column '{column}' holds {value}, expected {expected}")]
    InvalidValue {
        column: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl RowError {
    /// The offending column.
    pub fn column(&self) -> &'static str {
        match self {
            RowError::MissingColumn(column) => column,
            RowError::InvalidValue { column, .. } => column,
        }
    }
}

/// Convert every row with `map_row`, logging and counting the failures.
///
/// Returns the converted tasks in input order and the number of skipped rows.
pub(crate) fn convert_rows<F>(category: Category, rows: &[Row], map_row: F) -> (Vec<Task>, usize)
where
    F: Fn(&Row) -> Result<Task, RowError>,
{
    let mut tasks = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for (index, row) in rows.iter().enumerate() {
        match map_row(row) {
            Ok(task) => tasks.push(task),
            Err(e) => {
                skipped += 1;
                warn!("Skipping row {} in '{}': {}", index, category, e);
            }
        }
    }
    (tasks, skipped)
}

fn present<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.get(column).filter(|v| !v.is_null())
}

fn invalid(column: &'static str, expected: &'static str, value: &Value) -> RowError {
    RowError::InvalidValue {
        column,
        expected,
        value: format!("{:?}", value),
    }
}

pub(crate) fn required_text(row: &Row, column: &'static str) -> Result<String, RowError> {
    present(row, column)
        .and_then(Value::as_text)
        .ok_or(RowError::MissingColumn(column))
}

pub(crate) fn required_timestamp(row: &Row, column: &'static str) -> Result<NaiveDateTime, RowError> {
    let value = present(row, column).ok_or(RowError::MissingColumn(column))?;
    value
        .as_timestamp()
        .ok_or_else(|| invalid(column, "a timestamp", value))
}

pub(crate) fn optional_text(row: &Row, column: &str) -> Option<String> {
    present(row, column).and_then(Value::as_text)
}

pub(crate) fn optional_timestamp(
    row: &Row,
    column: &'static str,
) -> Result<Option<NaiveDateTime>, RowError> {
    present(row, column)
        .map(|value| {
            value
                .as_timestamp()
                .ok_or_else(|| invalid(column, "a timestamp", value))
        })
        .transpose()
}

pub(crate) fn optional_i64(row: &Row, column: &'static str) -> Result<Option<i64>, RowError> {
    present(row, column)
        .map(|value| value.as_i64().ok_or_else(|| invalid(column, "an integer", value)))
        .transpose()
}

pub(crate) fn optional_f64(row: &Row, column: &'static str) -> Result<Option<f64>, RowError> {
    present(row, column)
        .map(|value| value.as_f64().ok_or_else(|| invalid(column, "a number", value)))
        .transpose()
}
