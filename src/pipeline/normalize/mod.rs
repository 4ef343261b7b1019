//! Source normalizers turn a raw inbound payload into a `StructuredBody`.
//!
//! Each upstream format gets its own `Normalizer`. `NormalizerSet` picks one
//! from the request headers and body shape, so the merge and dispatch stages
//! only ever see `StructuredBody`.

pub mod discord;
pub mod sonarr;

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::NormalizeError;
use crate::pipeline::rules::SummaryRules;
use crate::pipeline::types::{Envelope, StructuredBody};

pub use discord::DiscordNormalizer;
pub use sonarr::SonarrNormalizer;

/// Which upstream format a payload is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Sonarr's Discord connection: the body already is a Discord document.
    SonarrDiscord,
    /// Sonarr's generic webhook connection.
    SonarrNative,
}

impl SourceKind {
    /// Detect the source from the `User-Agent` and the body shape.
    pub fn detect(user_agent: Option<&str>, raw: &[u8]) -> Result<Self, NormalizeError> {
        if !is_supported_agent(user_agent) {
            return Err(NormalizeError::UnsupportedSource {
                user_agent: user_agent.map(str::to_string),
            });
        }

        let value: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|e| NormalizeError::unrecognized(format!("invalid JSON: {e}")))?;

        match value.as_object() {
            Some(object) if object.contains_key("eventType") => Ok(Self::SonarrNative),
            Some(_) => Ok(Self::SonarrDiscord),
            None => Err(NormalizeError::unrecognized("body is not a JSON object")),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SonarrDiscord => f.write_str("sonarr-discord"),
            Self::SonarrNative => f.write_str("sonarr-native"),
        }
    }
}

/// Whether a `User-Agent` belongs to a source we can normalize.
pub fn is_supported_agent(user_agent: Option<&str>) -> bool {
    user_agent.is_some_and(|agent| agent.to_ascii_lowercase().starts_with("sonarr"))
}

/// Result of normalizing one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// A real event; goes through the buffer.
    Buffer(StructuredBody),
    /// A connectivity test; forwarded immediately, unmerged.
    Probe(StructuredBody),
}

impl Normalized {
    pub fn body(&self) -> &StructuredBody {
        match self {
            Self::Buffer(body) | Self::Probe(body) => body,
        }
    }

    pub fn is_probe(&self) -> bool {
        matches!(self, Self::Probe(_))
    }
}

/// Converts one upstream payload format. Pure, no side effects.
pub trait Normalizer: Send + Sync {
    fn kind(&self) -> SourceKind;

    fn normalize(&self, raw: &[u8]) -> Result<Normalized, NormalizeError>;
}

/// All known normalizers, selected per envelope.
pub struct NormalizerSet {
    normalizers: Vec<Arc<dyn Normalizer>>,
}

impl NormalizerSet {
    pub fn new(normalizers: Vec<Arc<dyn Normalizer>>) -> Self {
        Self { normalizers }
    }

    /// Normalize the envelope's raw body.
    pub fn normalize(&self, envelope: &Envelope) -> Result<Normalized, NormalizeError> {
        let raw = envelope
            .raw_body()
            .ok_or_else(|| NormalizeError::unrecognized("envelope already normalized"))?;
        let kind = SourceKind::detect(envelope.header("user-agent"), raw)?;

        let normalizer = self
            .normalizers
            .iter()
            .find(|n| n.kind() == kind)
            .ok_or_else(|| NormalizeError::unrecognized(format!("no normalizer for {kind}")))?;

        debug!(envelope_id = %envelope.id, source = %kind, "Normalizing payload");
        normalizer.normalize(raw)
    }
}

impl Default for NormalizerSet {
    fn default() -> Self {
        let rules = Arc::new(SummaryRules::new());
        Self::new(vec![
            Arc::new(DiscordNormalizer::new(Arc::clone(&rules))),
            Arc::new(SonarrNormalizer::new()),
        ])
    }
}
