//! Dispatcher: sends merged messages one at a time with pacing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::DeliveryError;
use crate::pipeline::types::OutboundMessage;

/// Outbound transport. One call per message, no retry.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Outcome of dispatching one batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.sent + self.failed
    }
}

/// Sends messages sequentially, waiting `pacing` between consecutive sends.
pub struct Dispatcher {
    sink: Arc<dyn WebhookSink>,
    pacing: Duration,
}

impl Dispatcher {
    pub fn new(sink: Arc<dyn WebhookSink>, pacing: Duration) -> Self {
        Self { sink, pacing }
    }

    /// Send a single message immediately, without pacing.
    pub async fn send_one(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        self.sink.send(message).await?;
        info!(destination = %message.destination, content = %message.body.content, "Forwarded");
        Ok(())
    }

    /// Send every message in order. A failure is logged and counted, and the
    /// remaining messages are still sent.
    pub async fn dispatch(&self, messages: &[OutboundMessage]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (i, message) in messages.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            match self.send_one(message).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    error!(
                        destination = %message.destination,
                        content = %message.body.content,
                        error = %e,
                        "Failed to forward message"
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}
