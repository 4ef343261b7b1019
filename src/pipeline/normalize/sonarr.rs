//! Sonarr's generic webhook connection (native JSON payload).

use serde::Deserialize;

use crate::error::NormalizeError;
use crate::pipeline::normalize::{Normalized, Normalizer, SourceKind};
use crate::pipeline::rules::{Action, PROBE_COLOR};
use crate::pipeline::types::{Embed, EmbedField, StructuredBody};

// ── Payload ─────────────────────────────────────────────────────────

/// The subset of Sonarr's webhook payload we read.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SonarrPayload {
    pub event_type: String,
    #[serde(default)]
    pub series: Series,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    #[serde(default)]
    pub episode_file: Option<EpisodeFile>,
    #[serde(default)]
    pub release: Option<Release>,
    #[serde(default)]
    pub is_upgrade: Option<bool>,
    #[serde(default)]
    pub instance_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub episode_number: u64,
    pub season_number: u64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeFile {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub release_group: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub release_group: Option<String>,
}

impl SonarrPayload {
    /// Action label for the event. Unknown event types keep their own name.
    fn action_label(&self) -> String {
        match self.event_type.as_str() {
            "Grab" => Action::Grabbed.label().to_string(),
            "Download" if self.is_upgrade.unwrap_or(false) => Action::Upgraded.label().to_string(),
            "Download" => Action::Imported.label().to_string(),
            "Rename" => Action::Renamed.label().to_string(),
            other => other.to_string(),
        }
    }

    fn quality(&self) -> String {
        self.episode_file
            .as_ref()
            .and_then(|file| file.quality.clone())
            .or_else(|| self.release.as_ref().and_then(|r| r.quality.clone()))
            .unwrap_or_else(|| "None".to_string())
    }

    fn release_group(&self) -> Option<String> {
        self.episode_file
            .as_ref()
            .and_then(|file| file.release_group.clone())
            .or_else(|| self.release.as_ref().and_then(|r| r.release_group.clone()))
            .filter(|group| !group.is_empty())
    }
}

// ── Normalizer ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SonarrNormalizer;

impl SonarrNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn probe_body(payload: &SonarrPayload) -> StructuredBody {
        let source = payload.instance_name.as_deref().unwrap_or("Sonarr");
        StructuredBody {
            content: format!("Test message from {source}"),
            embeds: vec![Embed {
                title: source.to_string(),
                description: format!("This is a test message from {source}"),
                color: PROBE_COLOR,
                ..Default::default()
            }],
        }
    }
}

impl Normalizer for SonarrNormalizer {
    fn kind(&self) -> SourceKind {
        SourceKind::SonarrNative
    }

    fn normalize(&self, raw: &[u8]) -> Result<Normalized, NormalizeError> {
        let payload: SonarrPayload = serde_json::from_slice(raw)
            .map_err(|e| NormalizeError::unrecognized(format!("not a Sonarr payload: {e}")))?;

        if payload.event_type == "Test" {
            return Ok(Normalized::Probe(Self::probe_body(&payload)));
        }
        if payload.episodes.is_empty() {
            return Err(NormalizeError::unrecognized(format!(
                "{} event has no episodes",
                payload.event_type
            )));
        }
        if payload.series.title.trim().is_empty() {
            return Err(NormalizeError::unrecognized("series title is missing"));
        }

        let action = payload.action_label();
        let color = Action::classify(&action).color();
        let quality = payload.quality();
        let release_group = payload.release_group();
        let series = &payload.series.title;

        let embeds: Vec<Embed> = payload
            .episodes
            .iter()
            .map(|episode| {
                let mut fields = vec![EmbedField::inline("Quality", quality.clone())];
                if let Some(group) = &release_group {
                    fields.push(EmbedField::inline("Release Group", group.clone()));
                }
                Embed {
                    title: series.clone(),
                    description: format!(
                        "{} - {:02}x{:02} - {} [{}]",
                        series, episode.season_number, episode.episode_number, episode.title, quality
                    ),
                    color,
                    fields,
                    ..Default::default()
                }
            })
            .collect();

        let content = format!("{}: {}", action, embeds[0].description);
        Ok(Normalized::Buffer(StructuredBody { content, embeds }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(event: &str, is_upgrade: bool) -> String {
        serde_json::json!({
            "eventType": event,
            "isUpgrade": is_upgrade,
            "series": { "id": 1, "title": "ShowA", "tvdbId": 12345 },
            "episodes": [
                { "id": 10, "episodeNumber": 1, "seasonNumber": 2, "title": "Pilot", "seriesId": 1 }
            ],
            "episodeFile": { "quality": "HDTV-720p", "releaseGroup": "GRP" },
            "downloadId": "abc"
        })
        .to_string()
    }

    fn buffered(raw: &str) -> StructuredBody {
        match SonarrNormalizer::new().normalize(raw.as_bytes()).unwrap() {
            Normalized::Buffer(body) => body,
            Normalized::Probe(_) => panic!("expected buffered body"),
        }
    }

    #[test]
    fn grab_becomes_grabbed_line() {
        let body = buffered(&payload("Grab", false));
        assert_eq!(body.content, "Grabbed: ShowA - 02x01 - Pilot [HDTV-720p]");
        assert_eq!(body.embeds[0].title, "ShowA");
        assert_eq!(body.embeds[0].description, "ShowA - 02x01 - Pilot [HDTV-720p]");
        assert_eq!(body.embeds[0].color, 0xFFC130);
        assert_eq!(body.embeds[0].fields[1].value, "GRP");
    }

    #[test]
    fn grab_reads_quality_from_release() {
        let raw = serde_json::json!({
            "eventType": "Grab",
            "series": { "id": 7, "title": "ShowA" },
            "episodes": [{ "episodeNumber": 3, "seasonNumber": 1, "title": "Three" }],
            "release": { "quality": "WEBDL-1080p", "releaseGroup": "REL", "indexer": "Example" }
        })
        .to_string();
        let body = buffered(&raw);
        assert_eq!(body.content, "Grabbed: ShowA - 01x03 - Three [WEBDL-1080p]");
        assert_eq!(body.embeds[0].fields[1].value, "REL");
    }

    #[test]
    fn download_upgrade_distinction() {
        assert!(buffered(&payload("Download", false)).content.starts_with("Imported: "));
        assert!(buffered(&payload("Download", true)).content.starts_with("Upgraded: "));
    }

    #[test]
    fn unknown_event_keeps_its_name() {
        let body = buffered(&payload("EpisodeFileDelete", false));
        assert!(body.content.starts_with("EpisodeFileDelete: "));
        assert_eq!(body.embeds[0].color, 0xFFFFFF);
    }

    #[test]
    fn one_embed_per_episode() {
        let raw = serde_json::json!({
            "eventType": "Grab",
            "series": { "title": "ShowA" },
            "episodes": [
                { "episodeNumber": 1, "seasonNumber": 1, "title": "One" },
                { "episodeNumber": 2, "seasonNumber": 1, "title": "Two" }
            ],
            "release": { "quality": "WEBDL-1080p" }
        })
        .to_string();
        let body = buffered(&raw);
        assert_eq!(body.embeds.len(), 2);
        assert_eq!(body.embeds[1].description, "ShowA - 01x02 - Two [WEBDL-1080p]");
        assert_eq!(body.embeds[1].fields.len(), 1);
    }

    #[test]
    fn missing_quality_is_none() {
        let raw = serde_json::json!({
            "eventType": "Grab",
            "series": { "title": "ShowA" },
            "episodes": [{ "episodeNumber": 1, "seasonNumber": 1, "title": "One" }]
        })
        .to_string();
        assert!(buffered(&raw).content.ends_with("[None]"));
    }

    #[test]
    fn test_event_is_probe() {
        let raw = br#"{"eventType":"Test","instanceName":"Sonarr-4K","series":{"title":"Test Title"},"episodes":[]}"#;
        let normalized = SonarrNormalizer::new().normalize(raw).unwrap();
        assert!(normalized.is_probe());
        assert_eq!(normalized.body().content, "Test message from Sonarr-4K");
    }

    #[test]
    fn no_episodes_is_unrecognized() {
        let raw = br#"{"eventType":"Health","series":{"title":"x"}}"#;
        let err = SonarrNormalizer::new().normalize(raw).unwrap_err();
        assert!(matches!(err, NormalizeError::UnrecognizedPayload { .. }));
    }

    #[test]
    fn missing_event_type_is_unrecognized() {
        let err = SonarrNormalizer::new().normalize(br#"{"series":{}}"#).unwrap_err();
        assert!(matches!(err, NormalizeError::UnrecognizedPayload { .. }));
    }
}
