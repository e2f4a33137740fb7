//! Notification observers.
//!
//! The monitor fans every [`TaskStatistics`] out to each registered
//! [`Observer`]. Observers decide how to render and where to deliver.

mod console;
mod payload;
mod webhook;

pub use console::ConsoleNotifier;
pub use payload::{Attachment, WebhookPayload};
pub use webhook::WebhookNotifier;

use std::fmt::Debug;

use thiserror::Error;

use taskwatch_types::{Category, Task, TaskStatistics};

/// Receiver of monitoring results.
pub trait Observer: Debug {
    /// Label used in logs.
    fn name(&self) -> &str;

    /// Deliver the statistics of one category.
    fn update(&self, statistics: &TaskStatistics) -> Result<(), NotifyError>;

    /// Deliver an alert about a single task that has been running too long.
    fn notify_long_running_task(&self, task: &Task, category: Category) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook URL is not configured")]
    NotConfigured,

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Webhook request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Webhook responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write notification: {0}")]
    Io(#[from] std::io::Error),
}
