//! Chat webhook message layout.

use serde::{Deserialize, Serialize};

use taskwatch_types::{Category, Severity, Task, TaskStatistics};

/// Body of a webhook POST: a headline plus one colored attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub text: String,
    pub color: String,
}

impl WebhookPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: title.into(),
            attachments: vec![Attachment {
                text: body.into(),
                color: severity.color().to_string(),
            }],
        }
    }

    /// Per-category report.
    pub fn report(statistics: &TaskStatistics) -> Self {
        let category = &statistics.category_name;
        let title = if statistics.over_limit {
            format!("🚨 ALERT: Task limit exceeded - {}", category)
        } else {
            format!("Task report - {}", category)
        };

        let mut lines = vec![
            format!("📊 *Task report - {}* 📊", category),
            format!("Total tasks: `{}`", statistics.total_count),
        ];
        if statistics.over_limit {
            lines.push(format!(
                "🚨 WARNING! The limit of {} tasks has been *EXCEEDED*.",
                statistics.max_tasks_limit
            ));
        }
        if let Some(task) = &statistics.representative_task {
            lines.push(format!(
                "⏳ {}:\n```{}```",
                statistics.category.representative_label(),
                task
            ));
        }

        Self::new(title, lines.join("\n"), statistics.severity())
    }

    /// Alert for a single long-running task.
    pub fn long_running(task: &Task, category: Category) -> Self {
        let title = format!("⏰ ALERT: Long-running task detected ({})", category);
        let body = format!(
            "The following task has been running for an excessive time:\n```\n{}\n```\nPlease investigate this task.",
            task
        );
        Self::new(title, body, Severity::Info)
    }

    /// Color of the first attachment.
    pub fn color(&self) -> Option<&str> {
        self.attachments.first().map(|a| a.color.as_str())
    }
}
