//! Tasks currently executing in the task agent.

use tracing::debug;

use taskwatch_types::{Category, Row, Task, TaskStatistics};

use super::{
    convert_rows, optional_f64, optional_i64, optional_text, optional_timestamp, required_text,
    required_timestamp, ProcessingStrategy, RowError,
};

/// The function id is taken from the schedule parameters first, then from the
/// task's own parameters.
const QUERY: &str = "\
SELECT
    t.SysTaskNum,
    t.TaskDescription,
    ISNULL(IIF(prm.ParamCharacter IS NULL, tprm.ParamCharacter, prm.ParamCharacter), '') AS [Function],
    t.TaskType,
    DATEDIFF(MINUTE, DATEADD(HOUR, -6, StartedOn), CURRENT_TIMESTAMP) AS Duracion,
    DATEADD(HOUR, -6, StartedOn) AS StartedOn,
    DATEADD(HOUR, -6, LastActivityOn) AS LastActivityOn,
    t.ProgressPercent,
    sc.SchedDesc,
    t.SubmitUser,
    t.TaskStatus,
    t.ActivityMsg
FROM ice.SysTask t
LEFT JOIN Ice.SysAgentSched sc ON t.AgentSchedNum = sc.AgentSchedNum
LEFT JOIN Ice.SysAgentTaskParam prm ON t.AgentSchedNum = prm.AgentSchedNum AND prm.ParamName = 'FunctionId'
LEFT JOIN Ice.SysTaskParam tprm ON t.SysTaskNum = tprm.SysTaskNum AND tprm.ParamName = 'FunctionId'
WHERE TaskStatus = 'ACTIVE'
ORDER BY t.SysTaskNum";

/// The "Active Processes" category. The longest-running task is reported.
#[derive(Debug, Clone)]
pub struct ActiveStrategy {
    max_tasks_limit: usize,
}

impl ActiveStrategy {
    pub fn new(max_tasks_limit: usize) -> Self {
        Self { max_tasks_limit }
    }

    fn map_row(row: &Row) -> Result<Task, RowError> {
        let mut task = Task::new(
            required_text(row, "SysTaskNum")?,
            required_text(row, "TaskDescription")?,
            required_timestamp(row, "StartedOn")?,
            required_text(row, "SubmitUser")?,
        );
        task.function_id = optional_text(row, "Function");
        task.task_type = optional_text(row, "TaskType");
        task.duration_minutes = optional_i64(row, "Duracion")?;
        task.last_activity_time = optional_timestamp(row, "LastActivityOn")?;
        task.progress_percent = optional_f64(row, "ProgressPercent")?;
        task.schedule_description = optional_text(row, "SchedDesc");
        task.status = optional_text(row, "TaskStatus");
        task.activity_message = optional_text(row, "ActivityMsg");
        Ok(task)
    }
}

impl ProcessingStrategy for ActiveStrategy {
    fn category(&self) -> Category {
        Category::Active
    }

    fn query_text(&self) -> &str {
        QUERY
    }

    fn process(&self, rows: &[Row]) -> TaskStatistics {
        let (tasks, skipped) = convert_rows(self.category(), rows, Self::map_row);

        let mut longest: Option<(&Task, i64)> = None;
        for task in &tasks {
            let Some(minutes) = task.duration_minutes else {
                continue;
            };
            if longest.map_or(true, |(_, max)| minutes > max) {
                longest = Some((task, minutes));
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
            longest.map(|(task, _)| task.clone()),
        )
        .with_skipped_rows(skipped)
    }
}
