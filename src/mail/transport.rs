use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{EmailMessage, EmailTransport, MailError};

/// Writes messages to the log instead of sending them (development default)
#[derive(Default)]
pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            template = message.template,
            "email (log transport)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// POSTs messages as JSON `{from, to, subject, text}` to an HTTP mail relay
pub struct HttpRelayTransport {
    client: reqwest::Client,
    url: String,
    from: String,
}

impl HttpRelayTransport {
    pub fn new(url: impl Into<String>, from: impl Into<String>) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl EmailTransport for HttpRelayTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({
                "from": self.from,
                "to": message.to,
                "subject": message.subject,
                "text": message.text,
            }))
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(MailError::Rejected(response.status().as_u16()))
        }
    }

    fn name(&self) -> &'static str {
        "http_relay"
    }
}

/// Keeps every message in memory; optionally fails every send
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<EmailMessage>>,
    failing: std::sync::atomic::AtomicBool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let transport = Self::default();
        transport.failing.store(true, std::sync::atomic::Ordering::SeqCst);
        transport
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    /// Poll until at least `count` messages were recorded or `timeout` passes
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<EmailMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MailError::Transport("recording transport set to fail".into()));
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to: "ada@example.com".into(),
            subject: "Hi".into(),
            text: "Hello".into(),
            template: "welcome",
        }
    }

    #[tokio::test]
    async fn recording_transport_keeps_messages() {
        let transport = RecordingTransport::new();
        transport.send(&message()).await.unwrap();

        assert_eq!(transport.sent().await, vec![message()]);
    }

    #[tokio::test]
    async fn failing_transport_records_nothing() {
        let transport = RecordingTransport::failing();
        assert!(transport.send(&message()).await.is_err());
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn log_transport_always_succeeds() {
        assert!(LogTransport.send(&message()).await.is_ok());
    }
}
