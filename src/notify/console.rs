//! Dry-run observer that prints payloads instead of posting them.

use std::fmt;
use std::io::{self, Write};
use std::sync::Mutex;

use taskwatch_types::{Category, Task, TaskStatistics};

use super::{NotifyError, Observer, WebhookPayload};

/// Writes each payload as one JSON line.
pub struct ConsoleNotifier<W = io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleNotifier<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleNotifier<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer, e.g. to inspect captured output.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let line = serde_json::to_string(payload)?;
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::other("console writer lock poisoned"))?;
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write> Observer for ConsoleNotifier<W> {
    fn name(&self) -> &str {
        "console"
    }

    fn update(&self, statistics: &TaskStatistics) -> Result<(), NotifyError> {
        self.write(&WebhookPayload::report(statistics))
    }

    fn notify_long_running_task(&self, task: &Task, category: Category) -> Result<(), NotifyError> {
        self.write(&WebhookPayload::long_running(task, category))
    }
}

impl<W> fmt::Debug for ConsoleNotifier<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleNotifier").finish_non_exhaustive()
    }
}
