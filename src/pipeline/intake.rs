//! Intake: normalizes each envelope, then either buffers it or forwards it
//! straight away when it is a connectivity probe.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::NormalizeError;
use crate::pipeline::debounce::BufferManager;
use crate::pipeline::dispatch::Dispatcher;
use crate::pipeline::normalize::{Normalized, NormalizerSet};
use crate::pipeline::types::{Envelope, OutboundMessage, retarget};

/// What happened to an accepted envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// Appended to the buffer; `pending` envelopes are now waiting.
    Buffered { pending: usize },
    /// Forwarded immediately. `delivered` is false if the send failed.
    Forwarded { delivered: bool },
}

pub struct Intake {
    normalizers: NormalizerSet,
    buffer: Arc<BufferManager>,
    dispatcher: Arc<Dispatcher>,
    base_url: String,
}

impl Intake {
    pub fn new(
        normalizers: NormalizerSet,
        buffer: Arc<BufferManager>,
        dispatcher: Arc<Dispatcher>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            normalizers,
            buffer,
            dispatcher,
            base_url: base_url.into(),
        }
    }

    pub fn buffer(&self) -> &Arc<BufferManager> {
        &self.buffer
    }

    /// Normalize and route one envelope.
    ///
    /// Payloads that cannot be normalized are logged and dropped; the error is
    /// returned for the caller's benefit only.
    pub async fn accept(&self, mut envelope: Envelope) -> Result<Accepted, NormalizeError> {
        let normalized = match self.normalizers.normalize(&envelope) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(envelope_id = %envelope.id, path = %envelope.source_path, error = %e, "Dropping envelope");
                return Err(e);
            }
        };

        match normalized {
            Normalized::Probe(body) => {
                let message = OutboundMessage {
                    destination: retarget(&self.base_url, &envelope.source_path),
                    body,
                };
                info!(envelope_id = %envelope.id, "Probe received, forwarding without buffering");
                let delivered = match self.dispatcher.send_one(&message).await {
                    Ok(()) => true,
                    Err(e) => {
                        error!(envelope_id = %envelope.id, error = %e, "Failed to forward probe");
                        false
                    }
                };
                Ok(Accepted::Forwarded { delivered })
            }
            Normalized::Buffer(body) => {
                envelope.set_body(body);
                let pending = self.buffer.enqueue(envelope).await;
                Ok(Accepted::Buffered { pending })
            }
        }
    }
}
