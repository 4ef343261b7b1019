//! Sonarr's Discord connection. The payload is already a Discord document.

use std::sync::Arc;

use crate::error::NormalizeError;
use crate::pipeline::normalize::{Normalized, Normalizer, SourceKind};
use crate::pipeline::rules::SummaryRules;
use crate::pipeline::types::StructuredBody;

pub struct DiscordNormalizer {
    rules: Arc<SummaryRules>,
}

impl DiscordNormalizer {
    pub fn new(rules: Arc<SummaryRules>) -> Self {
        Self { rules }
    }
}

impl Normalizer for DiscordNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::SonarrDiscord
    }

    fn normalize(&self, raw: &[u8]) -> Result<Normalized, NormalizeError> {
        let body: StructuredBody = serde_json::from_slice(raw)
            .map_err(|e| NormalizeError::unrecognized(format!("not a Discord document: {e}")))?;

        if body.content.trim().is_empty() && body.embeds.is_empty() {
            return Err(NormalizeError::unrecognized("empty content and no embeds"));
        }

        if self.rules.is_probe(&body) {
            Ok(Normalized::Probe(body))
        } else {
            Ok(Normalized::Buffer(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> DiscordNormalizer {
        DiscordNormalizer::new(Arc::new(SummaryRules::new()))
    }

    #[test]
    fn passes_document_through() {
        let raw = br#"{
            "username": "Sonarr",
            "content": "Imported: ShowA - 1x03 - Third [Bluray-1080p]",
            "embeds": [{
                "title": "ShowA",
                "description": "ShowA - 1x03 - Third [Bluray-1080p]",
                "color": 2729036,
                "fields": [{"name": "Quality", "value": "Bluray-1080p", "inline": true}]
            }]
        }"#;
        let normalized = normalizer().normalize(raw).unwrap();
        let Normalized::Buffer(body) = normalized else {
            panic!("expected buffered body");
        };
        assert_eq!(body.content, "Imported: ShowA - 1x03 - Third [Bluray-1080p]");
        assert_eq!(body.embeds.len(), 1);
        assert_eq!(body.embeds[0].color, 2729036);
        assert_eq!(body.embeds[0].fields[0].name, "Quality");
    }

    #[test]
    fn test_message_is_probe() {
        let raw = br#"{"content":"Test message","embeds":[]}"#;
        assert!(normalizer().normalize(raw).unwrap().is_probe());
    }

    #[test]
    fn episode_titled_this_is_a_test_is_buffered() {
        let raw = br#"{
            "content": "Grabbed: ShowA - 1x05 - This Is a Test [HDTV-720p]",
            "embeds": [{"title": "ShowA", "description": "ShowA - 1x05 - This Is a Test [HDTV-720p]"}]
        }"#;
        let normalized = normalizer().normalize(raw).unwrap();
        assert!(!normalized.is_probe());
        assert_eq!(
            normalized.body().content,
            "Grabbed: ShowA - 1x05 - This Is a Test [HDTV-720p]"
        );
    }

    #[test]
    fn empty_document_is_unrecognized() {
        let err = normalizer().normalize(br#"{"username":"Sonarr"}"#).unwrap_err();
        assert!(matches!(err, NormalizeError::UnrecognizedPayload { .. }));
    }

    #[test]
    fn wrong_types_are_unrecognized() {
        let err = normalizer().normalize(br#"{"content": 5}"#).unwrap_err();
        assert!(matches!(err, NormalizeError::UnrecognizedPayload { .. }));
    }
}
