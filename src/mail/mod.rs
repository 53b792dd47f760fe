// ============================================================================
// Mail - transactional email
// ============================================================================
//
// Delivery is best effort: messages are handed to the MailerActor, which
// retries with backoff and then drops the message with an error log. A
// failed email never fails the request that triggered it.
//
// ============================================================================

mod notifier;
mod transport;

use async_trait::async_trait;
use serde::Serialize;

pub use notifier::Notifier;
pub use transport::{HttpRelayTransport, LogTransport, RecordingTransport};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(String),

    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    /// Template name, used as the metrics label
    #[serde(skip)]
    pub template: &'static str,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;

    fn name(&self) -> &'static str;
}
