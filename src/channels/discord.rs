//! Outbound delivery to Discord-compatible webhook endpoints.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::DeliveryError;
use crate::pipeline::dispatch::WebhookSink;
use crate::pipeline::types::OutboundMessage;

/// Posts each message as JSON with a per-request timeout. No retry.
pub struct DiscordSink {
    client: reqwest::Client,
    timeout: Duration,
}

impl DiscordSink {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hookbuffer/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl WebhookSink for DiscordSink {
    async fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let url = &message.destination;
        let resp = self
            .client
            .post(url)
            .json(&message.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::Timeout {
                        url: url.clone(),
                        timeout: self.timeout,
                    }
                } else {
                    DeliveryError::Request {
                        url: url.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                url: url.clone(),
                status: status.as_u16(),
                body,
            });
        }

        debug!(%url, status = status.as_u16(), "Downstream accepted message");
        Ok(())
    }
}
