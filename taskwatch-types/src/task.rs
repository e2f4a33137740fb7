//! Task - one monitored work item.

use std::fmt;

use chrono::NaiveDateTime;

/// Format used when rendering timestamps for humans.
pub const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A monitored work item from the ERP job scheduler.
///
/// The four leading fields are present for every category. The remaining
/// fields are category specific and stay `None` when a category does not
/// report them.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use taskwatch_types::Task;
///
/// let submitted = NaiveDate::from_ymd_opt(2024, 3, 1)
///     .unwrap()
///     .and_hms_opt(7, 0, 0)
///     .unwrap();
///
/// let task = Task::builder("88", "Run MRP", submitted, "planner")
///     .schedule_description("Immediate Run Request")
///     .run_procedure("Erp.Internal.MR.MrpExp.dll")
///     .build();
///
/// assert!(task.duration_minutes.is_none());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Task {
    /// Category-specific identifier (schedule number or system task number).
    pub id: String,

    pub description: String,

    /// Submission time for queued tasks, actual start time for active ones.
    ///
    /// Already shifted to local time by the query.
    pub start_time: NaiveDateTime,

    pub submit_user: String,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub schedule_description: Option<String>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub task_type: Option<String>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub run_procedure: Option<String>,

    /// Maintenance program the task was submitted from.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub param_program: Option<String>,

    /// Epicor function identifier for function-driven tasks.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub function_id: Option<String>,

    /// Minutes elapsed since the task started.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub duration_minutes: Option<i64>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub last_activity_time: Option<NaiveDateTime>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub progress_percent: Option<f64>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub status: Option<String>,

    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub activity_message: Option<String>,
}

impl Task {
    /// Create a task with only the always-present fields set.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        start_time: NaiveDateTime,
        submit_user: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            start_time,
            submit_user: submit_user.into(),
            schedule_description: None,
            task_type: None,
            run_procedure: None,
            param_program: None,
            function_id: None,
            duration_minutes: None,
            last_activity_time: None,
            progress_percent: None,
            status: None,
            activity_message: None,
        }
    }

    /// Create a builder seeded with the always-present fields.
    pub fn builder(
        id: impl Into<String>,
        description: impl Into<String>,
        start_time: NaiveDateTime,
        submit_user: impl Into<String>,
    ) -> TaskBuilder {
        TaskBuilder {
            task: Self::new(id, description, start_time, submit_user),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, Description: '{}', Start: {}",
            self.id,
            self.description,
            self.start_time.format(DISPLAY_TIME_FORMAT)
        )?;
        if let Some(task_type) = self.task_type.as_deref().filter(|t| !t.is_empty()) {
            write!(f, ", Type: {}", task_type)?;
        }
        if let Some(minutes) = self.duration_minutes {
            write!(f, ", Duration: {} min", minutes)?;
        }
        if !self.submit_user.is_empty() {
            write!(f, ", User: {}", self.submit_user)?;
        }
        if let Some(status) = self.status.as_deref().filter(|s| !s.is_empty()) {
            write!(f, ", Status: {}", status)?;
        }
        Ok(())
    }
}

/// Builder for [`Task`].
///
/// Setters take `Option`-free values; anything not set stays `None`.
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn schedule_description(mut self, value: impl Into<String>) -> Self {
        self.task.schedule_description = Some(value.into());
        self
    }

    pub fn task_type(mut self, value: impl Into<String>) -> Self {
        self.task.task_type = Some(value.into());
        self
    }

    pub fn run_procedure(mut self, value: impl Into<String>) -> Self {
        self.task.run_procedure = Some(value.into());
        self
    }

    pub fn param_program(mut self, value: impl Into<String>) -> Self {
        self.task.param_program = Some(value.into());
        self
    }

    pub fn function_id(mut self, value: impl Into<String>) -> Self {
        self.task.function_id = Some(value.into());
        self
    }

    pub fn duration_minutes(mut self, minutes: i64) -> Self {
        self.task.duration_minutes = Some(minutes);
        self
    }

    pub fn last_activity_time(mut self, time: NaiveDateTime) -> Self {
        self.task.last_activity_time = Some(time);
        self
    }

    pub fn progress_percent(mut self, percent: f64) -> Self {
        self.task.progress_percent = Some(percent);
        self
    }

    pub fn status(mut self, value: impl Into<String>) -> Self {
        self.task.status = Some(value.into());
        self
    }

    pub fn activity_message(mut self, value: impl Into<String>) -> Self {
        self.task.activity_message = Some(value.into());
        self
    }

    /// Build the task.
    pub fn build(self) -> Task {
        self.task
    }
}
