//! End-to-end monitoring passes against a fake executor.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{Duration, NaiveDate, NaiveDateTime};

use taskwatch::{
    Category, CategoryOutcome, ConsoleNotifier, ExecutorError, MonitoringSettings, NotifyError,
    Observer, QueryExecutor, QueuedStrategy, Row, Task, TaskMonitor, TaskStatistics, Value,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Answers queries in call order and records the SQL it received.
#[derive(Debug, Default)]
struct FakeExecutor {
    responses: Mutex<VecDeque<Result<Vec<Row>, ExecutorError>>>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl FakeExecutor {
    fn with_responses(responses: Vec<Result<Vec<Row>, ExecutorError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            queries: Arc::default(),
        }
    }
}

impl QueryExecutor for FakeExecutor {
    fn execute(&self, query: &str) -> Result<Vec<Row>, ExecutorError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Debug, Default)]
struct RecordingObserver {
    updates: Mutex<Vec<TaskStatistics>>,
    alerts: Mutex<Vec<(String, Category)>>,
}

impl Observer for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    fn update(&self, statistics: &TaskStatistics) -> Result<(), NotifyError> {
        self.updates.lock().unwrap().push(statistics.clone());
        Ok(())
    }

    fn notify_long_running_task(&self, task: &Task, category: Category) -> Result<(), NotifyError> {
        self.alerts.lock().unwrap().push((task.id.clone(), category));
        Ok(())
    }
}

#[derive(Debug)]
struct FailingObserver;

impl Observer for FailingObserver {
    fn name(&self) -> &str {
        "failing"
    }

    fn update(&self, _statistics: &TaskStatistics) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }

    fn notify_long_running_task(&self, _task: &Task, _category: Category) -> Result<(), NotifyError> {
        Err(NotifyError::NotConfigured)
    }
}

// ---------------------------------------------------------------------------
// Row fixtures
// ---------------------------------------------------------------------------

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn queued_row(id: i64, submitted: NaiveDateTime) -> Row {
    Row::new()
        .with("AgentSchedNum", id)
        .with("SchedDesc", "Immediate Run Request")
        .with("TaskDesc", format!("Queued {}", id))
        .with("TaskType", "Report")
        .with("RunProcedure", "Erp.Internal.XA.Report.dll")
        .with("SubmittedOn", submitted)
        .with("SubmitUser", "planner")
        .with("ParamMaintProgram", "Erp.UI.MRPEntry")
}

fn active_row(id: i64, duration: impl Into<Value>) -> Row {
    Row::new()
        .with("SysTaskNum", id)
        .with("TaskDescription", format!("Active {}", id))
        .with("Function", "")
        .with("TaskType", "Process")
        .with("Duracion", duration)
        .with("StartedOn", t0())
        .with("LastActivityOn", t0())
        .with("ProgressPercent", Value::Null)
        .with("SchedDesc", Value::Null)
        .with("SubmitUser", "manager")
        .with("TaskStatus", "ACTIVE")
        .with("ActivityMsg", "")
}

fn monitor_with(
    responses: Vec<Result<Vec<Row>, ExecutorError>>,
    limit: usize,
) -> (TaskMonitor, Arc<Mutex<Vec<String>>>) {
    let executor = FakeExecutor::with_responses(responses);
    let queries = executor.queries.clone();
    let monitor = TaskMonitor::with_default_strategies(
        Box::new(executor),
        &MonitoringSettings {
            max_tasks_limit: limit,
        },
    );
    (monitor, queries)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_strategies_run_in_order() {
    let (monitor, queries) = monitor_with(vec![Ok(vec![]), Ok(vec![])], 100);
    monitor.run_monitoring();

    let queries = queries.lock().unwrap();
    assert_eq!(queries.len(), 2);
    assert!(queries[0].contains("ice.SysAgentTask"));
    assert!(queries[1].contains("ice.SysTask"));
}

#[test]
fn test_active_over_limit() {
    let active: Vec<Row> = (1..=101).map(|i| active_row(i, i)).collect();
    let (mut monitor, _) = monitor_with(vec![Ok(vec![]), Ok(active)], 100);
    let observer = Arc::new(RecordingObserver::default());
    monitor.add_observer(observer.clone());

    monitor.run_monitoring();

    let updates = observer.updates.lock().unwrap();
    let active = &updates[1];
    assert_eq!(active.category, Category::Active);
    assert_eq!(active.total_count, 101);
    assert!(active.over_limit);
    assert_eq!(active.representative_task.as_ref().unwrap().id, "101");
}

#[test]
fn test_oldest_queued_task() {
    let queued = vec![
        queued_row(1, t0() + Duration::minutes(5)),
        queued_row(2, t0()),
        queued_row(3, t0() + Duration::minutes(10)),
    ];
    let (monitor, _) = monitor_with(vec![Ok(queued), Ok(vec![])], 100);

    let report = monitor.run_monitoring();
    let queued = report.statistics().next().unwrap();
    assert_eq!(queued.representative_task.as_ref().unwrap().start_time, t0());
}

#[test]
fn test_lone_active_task_without_duration() {
    let (monitor, _) = monitor_with(vec![Ok(vec![]), Ok(vec![active_row(1, Value::Null)])], 100);

    let report = monitor.run_monitoring();
    let active = report.statistics().nth(1).unwrap();
    assert_eq!(active.total_count, 1);
    assert!(active.representative_task.is_none());
}

#[test]
fn test_empty_results_still_notify() {
    let (mut monitor, _) = monitor_with(vec![Ok(vec![]), Ok(vec![])], 100);
    let observer = Arc::new(RecordingObserver::default());
    monitor.add_observer(observer.clone());

    monitor.run_monitoring();

    let updates = observer.updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    for stats in updates.iter() {
        assert_eq!(stats.total_count, 0);
        assert!(!stats.over_limit);
        assert!(stats.representative_task.is_none());
    }
}

#[test]
fn test_failing_category_does_not_stop_the_pass() {
    let error = ExecutorError::query("SELECT ...", Some("42S02".to_string()), "Invalid object name");
    let (mut monitor, _) = monitor_with(vec![Err(error), Ok(vec![active_row(1, 5i64)])], 100);
    let observer = Arc::new(RecordingObserver::default());
    monitor.add_observer(observer.clone());

    let report = monitor.run_monitoring();

    assert!(matches!(
        &report.outcomes[0],
        CategoryOutcome::Failed(e) if e.category == Category::Queued
    ));
    let errors: Vec<_> = report.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source.sqlstate(), Some("42S02"));

    let updates = observer.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].category, Category::Active);
}

#[test]
fn test_connection_failure_is_contained() {
    let error = ExecutorError::connection("SELECT ...", Some("08001".to_string()), "timeout");
    let (monitor, _) = monitor_with(vec![Ok(vec![]), Err(error)], 100);

    let report = monitor.run_monitoring();
    assert_eq!(report.statistics().count(), 1);
    assert!(report.errors().next().unwrap().source.is_connection());
    assert!(!report.is_clean());
}

#[test]
fn test_failing_observer_does_not_stop_fan_out() {
    let (mut monitor, _) = monitor_with(vec![Ok(vec![]), Ok(vec![])], 100);
    let before = Arc::new(RecordingObserver::default());
    let after = Arc::new(RecordingObserver::default());
    monitor.add_observer(before.clone());
    monitor.add_observer(Arc::new(FailingObserver));
    monitor.add_observer(after.clone());

    let report = monitor.run_monitoring();

    assert_eq!(before.updates.lock().unwrap().len(), 2);
    assert_eq!(after.updates.lock().unwrap().len(), 2);
    assert_eq!(report.failed_observers(), 2);
}

#[test]
fn test_removed_observer_is_not_notified() {
    let (mut monitor, _) = monitor_with(vec![Ok(vec![]), Ok(vec![])], 100);
    let observer = Arc::new(RecordingObserver::default());
    let handle: Arc<dyn Observer> = observer.clone();
    monitor.add_observer(handle.clone());
    monitor.remove_observer(&handle);

    monitor.run_monitoring();
    assert!(observer.updates.lock().unwrap().is_empty());
}

#[test]
fn test_malformed_rows_are_skipped() {
    let broken = Row::new()
        .with("AgentSchedNum", 99i64)
        .with("TaskDesc", Value::Null)
        .with("SubmittedOn", t0())
        .with("SubmitUser", "planner");
    let queued = vec![queued_row(1, t0()), broken, queued_row(2, t0())];
    let (monitor, _) = monitor_with(vec![Ok(queued), Ok(vec![])], 100);

    let report = monitor.run_monitoring();
    let queued = report.statistics().next().unwrap();
    assert_eq!(queued.total_count, 2);
    assert_eq!(queued.skipped_rows, 1);
}

#[test]
fn test_long_running_alert_fans_out() {
    let (mut monitor, _) = monitor_with(vec![], 100);
    let observer = Arc::new(RecordingObserver::default());
    monitor.add_observer(observer.clone());
    monitor.add_observer(Arc::new(FailingObserver));

    let task = Task::builder("4711", "Monthly close", t0(), "manager")
        .duration_minutes(225)
        .build();
    let failed = monitor.notify_long_running_task(&task, Category::Active);

    assert_eq!(failed, 1);
    assert_eq!(
        *observer.alerts.lock().unwrap(),
        vec![("4711".to_string(), Category::Active)]
    );
}

#[test]
fn test_run_does_not_trigger_long_running_alerts() {
    let (mut monitor, _) = monitor_with(vec![Ok(vec![]), Ok(vec![active_row(1, 10_000i64)])], 100);
    let observer = Arc::new(RecordingObserver::default());
    monitor.add_observer(observer.clone());

    monitor.run_monitoring();
    assert!(observer.alerts.lock().unwrap().is_empty());
}

#[test]
fn test_console_observer_in_a_pass() {
    let (mut monitor, _) = monitor_with(vec![Ok(vec![queued_row(1, t0())]), Ok(vec![])], 0);
    let console = Arc::new(ConsoleNotifier::new(Vec::new()));
    monitor.add_observer(console.clone());

    let report = monitor.run_monitoring();
    assert!(report.is_clean());

    drop(monitor);
    let console = Arc::try_unwrap(console).unwrap();
    let output = String::from_utf8(console.into_inner()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Task limit exceeded - Submitted Tasks"));
    assert!(lines[1].contains("Task report - Active Processes"));
}

#[test]
fn test_limit_comes_from_the_strategy() {
    let executor = FakeExecutor::with_responses(vec![Ok(vec![
        queued_row(1, t0()),
        queued_row(2, t0()),
        queued_row(3, t0()),
    ])]);
    let monitor = TaskMonitor::new(Box::new(executor), vec![Box::new(QueuedStrategy::new(2))]);

    let report = monitor.run_monitoring();
    let queued = report.statistics().next().unwrap();
    assert_eq!(queued.max_tasks_limit, 2);
    assert!(queued.over_limit);
}
