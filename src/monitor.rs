//! The monitoring pass.
//!
//! [`TaskMonitor`] runs every strategy's query through the executor, turns
//! the rows into statistics and fans them out to the registered observers.
//! Failures are contained: a failing category does not stop the other
//! categories, and a failing observer does not stop the other observers.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use taskwatch_adapters::{ExecutorError, QueryExecutor};
use taskwatch_types::{Category, Task, TaskStatistics};

use crate::config::MonitoringSettings;
use crate::notify::Observer;
use crate::strategy::{ActiveStrategy, ProcessingStrategy, QueuedStrategy};

/// A category whose query could not be executed.
#[derive(Debug, Error)]
#[error("Category '{category}' failed: {source}")]
pub struct CategoryError {
    pub category: Category,
    #[source]
    pub source: ExecutorError,
}

/// What happened to one category during a pass.
#[derive(Debug)]
pub enum CategoryOutcome {
    /// Statistics were built and handed to the observers.
    Completed {
        statistics: TaskStatistics,
        failed_observers: usize,
    },
    Failed(CategoryError),
}

/// Summary of one call to [`TaskMonitor::run_monitoring`], in strategy order.
#[derive(Debug, Default)]
pub struct PassReport {
    pub outcomes: Vec<CategoryOutcome>,
}

impl PassReport {
    /// Statistics of every category that completed.
    pub fn statistics(&self) -> impl Iterator<Item = &TaskStatistics> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            CategoryOutcome::Completed { statistics, .. } => Some(statistics),
            CategoryOutcome::Failed(_) => None,
        })
    }

    /// Errors of every category that failed.
    pub fn errors(&self) -> impl Iterator<Item = &CategoryError> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            CategoryOutcome::Failed(e) => Some(e),
            CategoryOutcome::Completed { .. } => None,
        })
    }

    pub fn failed_observers(&self) -> usize {
        self.outcomes
            .iter()
            .map(|outcome| match outcome {
                CategoryOutcome::Completed {
                    failed_observers, ..
                } => *failed_observers,
                CategoryOutcome::Failed(_) => 0,
            })
            .sum()
    }

    /// `true` when every category completed and every observer succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none() && self.failed_observers() == 0
    }
}

/// Runs monitoring passes and notifies observers.
#[derive(Debug)]
pub struct TaskMonitor {
    executor: Box<dyn QueryExecutor>,
    strategies: Vec<Box<dyn ProcessingStrategy>>,
    observers: Vec<Arc<dyn Observer>>,
}

impl TaskMonitor {
    /// Create a monitor. Strategies run in the given order and each
    /// carries its own task limit.
    pub fn new(
        executor: Box<dyn QueryExecutor>,
        strategies: Vec<Box<dyn ProcessingStrategy>>,
    ) -> Self {
        Self {
            executor,
            strategies,
            observers: Vec::new(),
        }
    }

    /// Monitor with the queued then active strategies.
    pub fn with_default_strategies(
        executor: Box<dyn QueryExecutor>,
        settings: &MonitoringSettings,
    ) -> Self {
        let limit = settings.max_tasks_limit;
        Self::new(
            executor,
            vec![
                Box::new(QueuedStrategy::new(limit)),
                Box::new(ActiveStrategy::new(limit)),
            ],
        )
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Register an observer. Registering the same allocation twice is a no-op.
    pub fn add_observer(&mut self, observer: Arc<dyn Observer>) {
        if self.position_of(&observer).is_none() {
            debug!("Observer '{}' registered", observer.name());
            self.observers.push(observer);
        }
    }

    /// Unregister an observer. Unknown observers are ignored.
    pub fn remove_observer(&mut self, observer: &Arc<dyn Observer>) {
        if let Some(index) = self.position_of(observer) {
            let removed = self.observers.remove(index);
            debug!("Observer '{}' removed", removed.name());
        }
    }

    fn position_of(&self, observer: &Arc<dyn Observer>) -> Option<usize> {
        // Compare data pointers only; vtable pointers are not unique
        let target = Arc::as_ptr(observer) as *const ();
        self.observers
            .iter()
            .position(|o| Arc::as_ptr(o) as *const () == target)
    }

    /// Run one pass over every strategy.
    pub fn run_monitoring(&self) -> PassReport {
        info!(
            "Starting monitoring pass ({} categories, {} observers)",
            self.strategies.len(),
            self.observers.len()
        );

        let mut report = PassReport::default();
        for strategy in &self.strategies {
            report.outcomes.push(self.run_strategy(strategy.as_ref()));
        }

        info!(
            "Monitoring pass finished: {} categories completed, {} failed",
            report.statistics().count(),
            report.errors().count()
        );
        report
    }

    fn run_strategy(&self, strategy: &dyn ProcessingStrategy) -> CategoryOutcome {
        let category = strategy.category();
        debug!("Querying '{}'", strategy.category_name());

        let rows = match self.executor.execute(strategy.query_text()) {
            Ok(rows) => rows,
            Err(source) => {
                error!(
                    "Failed to process '{}': {}",
                    strategy.category_name(),
                    source
                );
                return CategoryOutcome::Failed(CategoryError { category, source });
            }
        };

        let statistics = strategy.process(&rows);
        info!(
            "'{}': {} tasks (limit {}){}",
            statistics.category_name,
            statistics.total_count,
            statistics.max_tasks_limit,
            if statistics.over_limit { ", over limit" } else { "" }
        );

        let failed_observers = self.fan_out(|observer| observer.update(&statistics));
        CategoryOutcome::Completed {
            statistics,
            failed_observers,
        }
    }

    /// Alert every observer about a single long-running task.
    ///
    /// Returns the number of observers that failed.
    pub fn notify_long_running_task(&self, task: &Task, category: Category) -> usize {
        info!("Long-running task {} in '{}'", task.id, category);
        self.fan_out(|observer| observer.notify_long_running_task(task, category))
    }

    fn fan_out<F>(&self, notify: F) -> usize
    where
        F: Fn(&dyn Observer) -> Result<(), crate::notify::NotifyError>,
    {
        let mut failed = 0;
        for observer in &self.observers {
            if let Err(e) = notify(observer.as_ref()) {
                failed += 1;
                error!("Observer '{}' failed: {}", observer.name(), e);
            }
        }
        failed
    }
}
