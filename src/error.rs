//! Error types for hookbuffer.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Inbound payload could not be turned into a structured body.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Unrecognized payload: {reason}")]
    UnrecognizedPayload { reason: String },

    #[error("Unsupported source (User-Agent: {user_agent:?})")]
    UnsupportedSource { user_agent: Option<String> },
}

impl NormalizeError {
    pub(crate) fn unrecognized(reason: impl Into<String>) -> Self {
        Self::UnrecognizedPayload {
            reason: reason.into(),
        }
    }
}

/// A single embed did not match the expected summary pattern.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Extraction mismatch on {field}: {value:?}")]
    Mismatch { field: &'static str, value: String },
}

/// Outbound send failures. Never retried.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("POST to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("POST to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("POST to {url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_failing_part() {
        let err = NormalizeError::unrecognized("no episodes");
        assert_eq!(err.to_string(), "Unrecognized payload: no episodes");

        let err = ExtractionError::Mismatch {
            field: "description",
            value: "garbage".into(),
        };
        assert_eq!(err.to_string(), "Extraction mismatch on description: \"garbage\"");

        let err = DeliveryError::Status {
            url: "https://discord.com/api/webhooks/1/t".into(),
            status: 429,
            body: "rate limited".into(),
        };
        assert_eq!(
            err.to_string(),
            "POST to https://discord.com/api/webhooks/1/t returned 429: rate limited"
        );
    }
}
