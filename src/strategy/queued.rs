//! Tasks submitted to the task agent for immediate run but not yet started.

use tracing::debug;

use taskwatch_types::{Category, Row, Task, TaskStatistics};

use super::{convert_rows, optional_text, required_text, required_timestamp, ProcessingStrategy, RowError};

/// Submission times are stored in UTC; the query shifts them to local time.
const QUERY: &str = "\
SELECT
    t.AgentSchedNum,
    s.SchedDesc,
    t.TaskDesc,
    t.TaskType,
    t.RunProcedure,
    DATEADD(HOUR, -6, SubmittedOn) AS SubmittedOn,
    t.SubmitUser,
    t.ParamMaintProgram
FROM ice.SysAgentTask t
LEFT JOIN Ice.SysAgentSched s ON t.AgentID = s.AgentID AND t.AgentSchedNum = s.AgentSchedNum
WHERE s.SchedDesc = 'Immediate Run Request'
ORDER BY t.AgentSchedNum";

/// The "Submitted Tasks" category. The oldest submission is reported.
#[derive(Debug, Clone)]
pub struct QueuedStrategy {
    max_tasks_limit: usize,
}

impl QueuedStrategy {
    pub fn new(max_tasks_limit: usize) -> Self {
        Self { max_tasks_limit }
    }

    fn map_row(row: &Row) -> Result<Task, RowError> {
        let mut task = Task::new(
            required_text(row, "AgentSchedNum")?,
            required_text(row, "TaskDesc")?,
            required_timestamp(row, "SubmittedOn")?,
            required_text(row, "SubmitUser")?,
        );
        task.schedule_description = optional_text(row, "SchedDesc");
        task.task_type = optional_text(row, "TaskType");
        task.run_procedure = optional_text(row, "RunProcedure");
        task.param_program = optional_text(row, "ParamMaintProgram");
        Ok(task)
    }
}

impl ProcessingStrategy for QueuedStrategy {
    fn category(&self) -> Category {
        Category::Queued
    }

    fn query_text(&self) -> &str {
        QUERY
    }

    fn process(&self, rows: &[Row]) -> TaskStatistics {
        let (tasks, skipped) = convert_rows(self.category(), rows, Self::map_row);

        let mut oldest: Option<&Task> = None;
        for task in &tasks {
            // Strict comparison keeps the first of equal submissions
            if oldest.map_or(true, |o| task.start_time < o.start_time) {
                oldest = Some(task);
            }
        }

        debug!(
            "'{}': {} tasks, {} rows skipped",
            self.category_name(),
            tasks.len(),
            skipped
        );
        TaskStatistics::new(
            self.category(),
            tasks.len(),
            self.max_tasks_limit,
            oldest.cloned(),
        )
        .with_skipped_rows(skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use taskwatch_types::Value;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn row(id: i64, submitted: NaiveDateTime) -> Row {
        Row::new()
            .with("AgentSchedNum", id)
            .with("SchedDesc", "Immediate Run Request")
            .with("TaskDesc", format!("Task {}", id))
            .with("TaskType", "Process")
            .with("RunProcedure", "Erp.Internal.MR.MrpExp.dll")
            .with("SubmittedOn", submitted)
            .with("SubmitUser", "planner")
            .with("ParamMaintProgram", Value::Null)
    }

    #[test]
    fn test_oldest_submission_is_representative() {
        let rows = vec![
            row(1, t0() + Duration::minutes(5)),
            row(2, t0()),
            row(3, t0() + Duration::minutes(10)),
        ];
        let stats = QueuedStrategy::new(100).process(&rows);

        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.category, Category::Queued);
        assert_eq!(stats.representative_task.unwrap().id, "2");
    }

    #[test]
    fn test_first_seen_wins_ties() {
        let rows = vec![row(7, t0()), row(8, t0())];
        let stats = QueuedStrategy::new(100).process(&rows);
        assert_eq!(stats.representative_task.unwrap().id, "7");
    }

    #[test]
    fn test_row_mapping() {
        let stats = QueuedStrategy::new(100).process(&[row(88, t0())]);
        let task = stats.representative_task.unwrap();

        assert_eq!(task.id, "88");
        assert_eq!(task.description, "Task 88");
        assert_eq!(task.submit_user, "planner");
        assert_eq!(task.schedule_description.as_deref(), Some("Immediate Run Request"));
        assert_eq!(task.run_procedure.as_deref(), Some("Erp.Internal.MR.MrpExp.dll"));
        assert!(task.param_program.is_none());
        assert!(task.duration_minutes.is_none());
    }

    #[test]
    fn test_malformed_row_is_skipped() {
        let bad = Row::new()
            .with("AgentSchedNum", 9i64)
            .with("TaskDesc", "no time")
            .with("SubmitUser", "planner");
        let rows = vec![row(1, t0()), bad, row(2, t0() + Duration::hours(1))];

        let stats = QueuedStrategy::new(1).process(&rows);
        assert_eq!(stats.total_count, 2);
        assert_eq!(stats.skipped_rows, 1);
        assert!(stats.over_limit);
    }

    #[test]
    fn test_equal_to_limit_is_not_over() {
        let rows = vec![row(1, t0()), row(2, t0())];
        assert!(!QueuedStrategy::new(2).process(&rows).over_limit);
    }

    #[test]
    fn test_query_targets_immediate_run_requests() {
        let strategy = QueuedStrategy::new(1);
        assert!(strategy.query_text().contains("'Immediate Run Request'"));
        assert_eq!(strategy.category_name(), "Submitted Tasks");
    }
}
