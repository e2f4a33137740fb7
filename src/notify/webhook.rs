//! Chat webhook delivery (Slack-compatible incoming webhooks).

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{error, info, warn};

use taskwatch_types::{Category, Task, TaskStatistics};

use super::{NotifyError, Observer, WebhookPayload};
use crate::config::WebhookSettings;

/// Posts reports to a chat webhook.
///
/// Delivery failures are logged and swallowed: a report that cannot be
/// posted must not affect the rest of the pass.
pub struct WebhookNotifier {
    url: String,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let url = url.into();
        if url.trim().is_empty() {
            warn!("Webhook URL is not configured; notifications will not be delivered");
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::Client)?;

        info!("Webhook notifier initialized");
        Ok(Self { url, client })
    }

    pub fn from_settings(settings: &WebhookSettings) -> Result<Self, NotifyError> {
        Self::new(settings.url.clone(), settings.timeout)
    }

    /// POST `payload` once. Non-2xx responses are errors.
    pub fn deliver(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        if self.url.trim().is_empty() {
            return Err(NotifyError::NotConfigured);
        }

        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .map_err(NotifyError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }
        info!("Webhook message delivered (HTTP {})", status.as_u16());
        Ok(())
    }

    fn deliver_logged(&self, payload: &WebhookPayload) {
        if let Err(e) = self.deliver(payload) {
            error!("Failed to deliver webhook message '{}': {}", payload.text, e);
        }
    }
}

impl Observer for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    fn update(&self, statistics: &TaskStatistics) -> Result<(), NotifyError> {
        self.deliver_logged(&WebhookPayload::report(statistics));
        Ok(())
    }

    fn notify_long_running_task(&self, task: &Task, category: Category) -> Result<(), NotifyError> {
        self.deliver_logged(&WebhookPayload::long_running(task, category));
        Ok(())
    }
}

impl fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Incoming webhook URLs embed their credential
        f.debug_struct("WebhookNotifier")
            .field("configured", &!self.url.trim().is_empty())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use taskwatch_types::Severity;

    /// Accept one request, answer with `status`, return the request body.
    fn one_shot_server(status: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                status
            )
            .unwrap();
            String::from_utf8(body).unwrap()
        });

        (url, handle)
    }

    #[test]
    fn test_deliver_posts_json() {
        let (url, server) = one_shot_server("200 OK");
        let notifier = WebhookNotifier::new(url, Duration::from_secs(5)).unwrap();

        notifier
            .deliver(&WebhookPayload::new("title", "body", Severity::Warning))
            .unwrap();

        let body: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(body["text"], "title");
        assert_eq!(body["attachments"][0]["color"], "#FFA500");
    }

    #[test]
    fn test_deliver_reports_http_status() {
        let (url, server) = one_shot_server("500 Internal Server Error");
        let notifier = WebhookNotifier::new(url, Duration::from_secs(5)).unwrap();

        let result = notifier.deliver(&WebhookPayload::new("t", "b", Severity::Info));
        server.join().unwrap();
        assert!(matches!(result, Err(NotifyError::Status { status: 500, .. })));
    }

    #[test]
    fn test_update_absorbs_delivery_failure() {
        let (url, server) = one_shot_server("500 Internal Server Error");
        let notifier = WebhookNotifier::new(url, Duration::from_secs(5)).unwrap();

        let stats = TaskStatistics::new(Category::Queued, 0, 100, None);
        assert!(notifier.update(&stats).is_ok());
        server.join().unwrap();
    }

    #[test]
    fn test_empty_url_is_not_configured() {
        let notifier = WebhookNotifier::new("", Duration::from_secs(1)).unwrap();
        let result = notifier.deliver(&WebhookPayload::new("t", "b", Severity::Info));
        assert!(matches!(result, Err(NotifyError::NotConfigured)));

        let stats = TaskStatistics::new(Category::Active, 1, 100, None);
        assert!(notifier.update(&stats).is_ok());
    }

    #[test]
    fn test_debug_hides_url() {
        let notifier =
            WebhookNotifier::new("https://hooks.example.com/T0/B0/secret", Duration::from_secs(1))
                .unwrap();
        assert!(!format!("{:?}", notifier).contains("secret"));
    }
}
