//! # taskwatch-types
//!
//! Core types for ERP task monitoring. This crate defines the uniform task
//! model that every category-specific strategy maps its query rows into, the
//! per-category statistics handed to notification observers, and the raw row
//! representation returned by query executors.
//!
//! ## Design Goals
//!
//! - **Uniform model**: queued and active work items share one [`Task`] type;
//!   fields that do not apply to a category stay `None`
//! - **No sentinels**: absent data is never defaulted to a value that could be
//!   mistaken for real data
//! - **Optional serialization**: enable the `serde` feature as needed
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use taskwatch_types::{Category, Severity, Task, TaskStatistics};
//!
//! let started = NaiveDate::from_ymd_opt(2024, 3, 1)
//!     .unwrap()
//!     .and_hms_opt(8, 30, 0)
//!     .unwrap();
//!
//! let task = Task::builder("4711", "Monthly close", started, "manager")
//!     .duration_minutes(225)
//!     .status("ACTIVE")
//!     .build();
//!
//! let stats = TaskStatistics::new(Category::Active, 12, 100, Some(task));
//!
//! assert!(!stats.over_limit);
//! assert_eq!(stats.severity(), Severity::Warning);
//! ```

mod row;
mod statistics;
mod task;

pub use row::*;
pub use statistics::*;
pub use task::*;
