//! Per-category statistics produced by one monitoring pass.

use std::fmt;

use crate::Task;

/// The monitored work-item classes.
///
/// Each category has its own query and its own idea of which task is most
/// noteworthy: the queued backlog cares about staleness, active execution
/// cares about runaway tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Category {
    /// Submitted to the task agent but not yet picked up.
    Queued,
    /// Currently executing.
    Active,
}

impl Category {
    /// Human-readable category name, used in logs and notification titles.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Queued => "Submitted Tasks",
            Category::Active => "Active Processes",
        }
    }

    /// Describes what the representative task means for this category.
    pub fn representative_label(&self) -> &'static str {
        match self {
            Category::Queued => "Oldest queued task",
            Category::Active => "Longest-running task",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Notification severity derived from a set of statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Severity {
    Info,
    Warning,
    Alert,
}

impl Severity {
    /// Attachment color for chat webhooks.
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Info => "#36a64f",
            Severity::Warning => "#FFA500",
            Severity::Alert => "#FF0000",
        }
    }
}

/// Summary of one category for one monitoring pass.
///
/// Created fresh every pass and dropped once observers have been notified.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskStatistics {
    pub category: Category,

    /// Stable category name, same as `category.label()`.
    pub category_name: String,

    /// Number of rows that converted into a [`Task`].
    pub total_count: usize,

    /// Rows dropped because they could not be converted.
    pub skipped_rows: usize,

    /// The ceiling this pass was evaluated against.
    pub max_tasks_limit: usize,

    /// `total_count > max_tasks_limit`.
    pub over_limit: bool,

    /// Oldest task for [`Category::Queued`], longest-running for
    /// [`Category::Active`].
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub representative_task: Option<Task>,
}

impl TaskStatistics {
    /// Create statistics, deriving `over_limit` from the count and limit.
    ///
    /// A count equal to the limit is not over the limit.
    pub fn new(
        category: Category,
        total_count: usize,
        max_tasks_limit: usize,
        representative_task: Option<Task>,
    ) -> Self {
        Self {
            category,
            category_name: category.label().to_string(),
            total_count,
            skipped_rows: 0,
            max_tasks_limit,
            over_limit: total_count > max_tasks_limit,
            representative_task,
        }
    }

    /// Record how many rows were skipped while building these statistics.
    pub fn with_skipped_rows(mut self, skipped_rows: usize) -> Self {
        self.skipped_rows = skipped_rows;
        self
    }

    /// Severity for notification purposes.
    ///
    /// Exceeding the limit wins over the presence of a representative task.
    pub fn severity(&self) -> Severity {
        if self.over_limit {
            Severity::Alert
        } else if self.representative_task.is_some() {
            Severity::Warning
        } else {
            Severity::Info
        }
    }
}
