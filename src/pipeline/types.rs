//! Shared types for the webhook pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request headers, lower-cased names to values in arrival order.
pub type Headers = BTreeMap<String, Vec<String>>;

// ── Envelope ────────────────────────────────────────────────────────

/// One received webhook, before or after normalization.
///
/// The raw body and the structured body are never held at the same time:
/// normalizing consumes the bytes.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Generated id, used for log correlation only.
    pub id: Uuid,
    /// When the transport received the request.
    pub received_at: DateTime<Utc>,
    /// Requested path (and query), e.g. `/api/webhooks/123/abc`.
    pub source_path: String,
    pub headers: Headers,
    payload: Payload,
}

#[derive(Debug, Clone)]
enum Payload {
    Raw(Vec<u8>),
    Structured(StructuredBody),
}

impl Envelope {
    /// Create an envelope holding the raw request body.
    pub fn new(source_path: impl Into<String>, headers: Headers, raw_body: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            source_path: source_path.into(),
            headers,
            payload: Payload::Raw(raw_body),
        }
    }

    /// Create an already-normalized envelope.
    pub fn structured(source_path: impl Into<String>, body: StructuredBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            received_at: Utc::now(),
            source_path: source_path.into(),
            headers: Headers::new(),
            payload: Payload::Structured(body),
        }
    }

    /// First value of a header (name is matched case-insensitively).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Raw bytes, if the envelope has not been normalized yet.
    pub fn raw_body(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Raw(bytes) => Some(bytes),
            Payload::Structured(_) => None,
        }
    }

    /// Structured body, once normalized.
    pub fn body(&self) -> Option<&StructuredBody> {
        match &self.payload {
            Payload::Raw(_) => None,
            Payload::Structured(body) => Some(body),
        }
    }

    /// Replace the raw bytes with the structured body, dropping the bytes.
    pub fn set_body(&mut self, body: StructuredBody) {
        self.payload = Payload::Structured(body);
    }
}

// ── Structured body (Discord webhook document) ──────────────────────

/// Canonical message body: content text plus rich embeds.
///
/// Serializes as the downstream webhook's JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredBody {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

impl EmbedField {
    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// The unit the dispatcher sends.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    /// Absolute URL to POST to.
    pub destination: String,
    pub body: StructuredBody,
}

/// Re-target an inbound source path onto the downstream base URL.
///
/// `base_url` is expected to end in `/`; the path's leading `/` is dropped.
pub fn retarget(base_url: &str, source_path: &str) -> String {
    let path = source_path.trim_start_matches('/');
    if base_url.ends_with('/') {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        let mut map = Headers::new();
        for (k, v) in pairs {
            map.entry(k.to_ascii_lowercase())
                .or_default()
                .push(v.to_string());
        }
        map
    }

    #[test]
    fn set_body_drops_raw_bytes() {
        let mut envelope = Envelope::new("/hook", Headers::new(), b"{}".to_vec());
        assert!(envelope.raw_body().is_some());
        assert!(envelope.body().is_none());

        envelope.set_body(StructuredBody::default());
        assert!(envelope.raw_body().is_none());
        assert!(envelope.body().is_some());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let envelope = Envelope::new(
            "/hook",
            headers(&[("User-Agent", "Sonarr/4.0"), ("user-agent", "other")]),
            Vec::new(),
        );
        assert_eq!(envelope.header("USER-AGENT"), Some("Sonarr/4.0"));
        assert_eq!(envelope.header("content-type"), None);
    }

    #[test]
    fn retarget_joins_path() {
        assert_eq!(
            retarget("https://discord.com/", "/api/webhooks/1/abc"),
            "https://discord.com/api/webhooks/1/abc"
        );
        assert_eq!(
            retarget("http://127.0.0.1:9000", "/api/webhooks/1/abc?wait=true"),
            "http://127.0.0.1:9000/api/webhooks/1/abc?wait=true"
        );
    }

    #[test]
    fn body_serializes_as_webhook_document() {
        let body = StructuredBody {
            content: "Grabbed: Show".into(),
            embeds: vec![Embed {
                description: "d".into(),
                title: "t".into(),
                color: 0xFFC130,
                fields: vec![EmbedField::inline("Quality", "HDTV-720p")],
                ..Default::default()
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["content"], "Grabbed: Show");
        assert_eq!(json["embeds"][0]["color"], 0xFFC130);
        assert_eq!(json["embeds"][0]["fields"][0]["inline"], true);
        assert!(json["embeds"][0].get("url").is_none());
        assert!(json["embeds"][0].get("author").is_none());
    }

    #[test]
    fn body_deserializes_leniently() {
        let body: StructuredBody =
            serde_json::from_str(r#"{"embeds":[{"title":"x","text":"ignored"}],"username":"Sonarr"}"#)
                .unwrap();
        assert_eq!(body.content, "");
        assert_eq!(body.embeds[0].title, "x");
        assert_eq!(body.embeds[0].color, 0);
    }
}
