//! # taskwatch
//!
//! One-shot monitor for the Epicor ERP task agent.
//!
//! Each run queries the scheduler tables once per category, summarizes the
//! result and posts a report to a chat webhook, then exits. Scheduling the
//! runs (cron, Windows Task Scheduler) is left to the host.
//!
//! ## Architecture
//!
//! ```text
//!  ┌────────────┐   rows   ┌────────────┐  statistics  ┌────────────┐
//!  │  executor  │─────────▶│  strategy  │─────────────▶│  observer  │
//!  │  (ODBC)    │          │ queued /   │              │ webhook /  │
//!  └────────────┘          │ active     │              │ console    │
//!        ▲                 └────────────┘              └────────────┘
//!        └──────────────── TaskMonitor ───────────────────────┘
//! ```
//!
//! - **[`config`]**: INI + environment configuration with encrypted secrets
//! - **[`strategy`]**: per-category SQL and row-to-statistics processing
//! - **[`monitor`]**: the pass itself, with failure isolation per category
//!   and per observer
//! - **[`notify`]**: observers that render and deliver reports
//!
//! ## Library usage
//!
//! ```
//! use std::sync::Arc;
//! use taskwatch::{ConsoleNotifier, MonitoringSettings, QueryExecutor, TaskMonitor};
//! use taskwatch::{ExecutorError, Row};
//!
//! #[derive(Debug)]
//! struct NoRows;
//!
//! impl QueryExecutor for NoRows {
//!     fn execute(&self, _query: &str) -> Result<Vec<Row>, ExecutorError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let mut monitor = TaskMonitor::with_default_strategies(
//!     Box::new(NoRows),
//!     &MonitoringSettings { max_tasks_limit: 100 },
//! );
//! monitor.add_observer(Arc::new(ConsoleNotifier::new(Vec::new())));
//!
//! let report = monitor.run_monitoring();
//! assert!(report.is_clean());
//! ```

pub mod config;
pub mod monitor;
pub mod notify;
pub mod strategy;

pub use config::{ConfigError, ConfigStore, MonitoringSettings, Secret, SecretCipher, Settings};
pub use monitor::{CategoryError, CategoryOutcome, PassReport, TaskMonitor};
pub use notify::{ConsoleNotifier, NotifyError, Observer, WebhookNotifier, WebhookPayload};
pub use strategy::{ActiveStrategy, ProcessingStrategy, QueuedStrategy, RowError};

// Re-export the shared types so binaries only need this crate
pub use taskwatch_adapters::{ExecutorError, QueryExecutor};
pub use taskwatch_types::{Category, Row, Severity, Task, TaskStatistics, Value};
