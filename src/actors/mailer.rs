use std::sync::Arc;

use actix::prelude::*;

use crate::mail::{EmailMessage, EmailTransport};
use crate::metrics::Metrics;
use crate::utils::{retry_with_backoff, RetryConfig};

// ============================================================================
// Mailer Actor
// ============================================================================
//
// Owns the email transport. Requests hand messages over with `do_send` and
// move on; the actor retries with exponential backoff and, once attempts are
// exhausted, logs and drops the message.
//
// ============================================================================

pub struct MailerActor {
    transport: Arc<dyn EmailTransport>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl MailerActor {
    pub fn new(transport: Arc<dyn EmailTransport>, retry: RetryConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            transport,
            retry,
            metrics,
        }
    }
}

impl Actor for MailerActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(transport = self.transport.name(), "MailerActor started");
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Deliver one email; resolves to whether it was delivered
#[derive(Message, Debug, Clone)]
#[rtype(result = "bool")]
pub struct SendEmail(pub EmailMessage);

// ============================================================================
// Handlers
// ============================================================================

impl Handler<SendEmail> for MailerActor {
    type Result = ResponseFuture<bool>;

    fn handle(&mut self, msg: SendEmail, _: &mut Self::Context) -> Self::Result {
        let transport = self.transport.clone();
        let retry = self.retry.clone();
        let metrics = self.metrics.clone();
        let message = msg.0;

        Box::pin(async move {
            let outcome = retry_with_backoff(&retry, |_| {
                let transport = transport.clone();
                let message = message.clone();
                async move { transport.send(&message).await }
            })
            .await;

            let delivered = outcome.result.is_ok();
            metrics.record_email(message.template, delivered);

            match outcome.result {
                Ok(()) => tracing::debug!(
                    to = %message.to,
                    template = message.template,
                    attempts = outcome.attempts,
                    "email delivered"
                ),
                Err(e) => tracing::error!(
                    to = %message.to,
                    template = message.template,
                    attempts = outcome.attempts,
                    error = %e,
                    "email dropped after retries"
                ),
            }

            delivered
        })
    }
}
