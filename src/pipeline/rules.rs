//! Pattern rules for reading summary lines.
//!
//! Upstream tools describe each event as a line such as
//! `Grabbed: Show - 1x01 - Pilot [HDTV-720p]`. These rules pull the action,
//! subject and season back out of that text, and recognise connectivity
//! probes so they can skip buffering.

use std::fmt;

use regex::Regex;
use tracing::debug;

use crate::error::ExtractionError;
use crate::pipeline::types::StructuredBody;

/// Classified event action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Grabbed,
    Imported,
    Upgraded,
    Renamed,
    /// Anything outside the known vocabulary. Still grouped.
    Unsupported,
}

impl Action {
    /// Classify the leading word of a content line.
    pub fn classify(word: &str) -> Self {
        match word.trim().to_ascii_lowercase().as_str() {
            "grabbed" => Self::Grabbed,
            "imported" => Self::Imported,
            "upgraded" => Self::Upgraded,
            "renamed" => Self::Renamed,
            _ => Self::Unsupported,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Grabbed => "Grabbed",
            Self::Imported => "Imported",
            Self::Upgraded => "Upgraded",
            Self::Renamed => "Renamed",
            Self::Unsupported => "Unsupported",
        }
    }

    /// Embed color used when no upstream color is available.
    pub fn color(&self) -> u32 {
        match self {
            Self::Grabbed => 0xFFC130,  // yellow
            Self::Imported => 0x29A44C, // green
            Self::Upgraded => 0x3E6800, // dark green
            Self::Renamed => 0xFF00FF,  // purple
            Self::Unsupported => 0xFFFFFF,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Color for connectivity probes.
pub const PROBE_COLOR: u32 = 0x0800FF;

/// One parsed summary line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeLine {
    pub subject: String,
    pub season: u64,
    pub episode: u64,
    /// The full line, e.g. `Show - 1x01 - Pilot [HDTV-720p]`.
    pub line: String,
    /// Everything after the episode number, e.g. `Pilot [HDTV-720p]`.
    pub detail: String,
}

/// Compiled patterns shared by the normalizers and the merge engine.
#[derive(Debug, Clone)]
pub struct SummaryRules {
    action: Regex,
    episode: Regex,
    probe_content: Regex,
    probe_description: Regex,
}

impl SummaryRules {
    pub fn new() -> Self {
        Self {
            action: Regex::new(r"^(?P<action>[A-Za-z][A-Za-z ]*?):\s+(?P<rest>.+)$")
                .expect("action pattern compiles"),
            episode: Regex::new(
                r"^(?P<subject>.+?) - (?P<season>\d+)x(?P<episode>\d+) - (?P<rest>.+)$",
            )
            .expect("episode pattern compiles"),
            probe_content: Regex::new(r"(?i)^\s*test\b").expect("probe pattern compiles"),
            probe_description: Regex::new(r"(?i)^\s*this is a test message from .+$")
                .expect("probe pattern compiles"),
        }
    }

    /// Split `Action: rest` into the classified action and the remainder.
    pub fn split_action<'a>(&self, content: &'a str) -> Result<(Action, &'a str), ExtractionError> {
        let trimmed = content.trim();
        let caps = self
            .action
            .captures(trimmed)
            .ok_or_else(|| ExtractionError::Mismatch {
                field: "content",
                value: content.to_string(),
            })?;
        let word = caps.name("action").map_or("", |m| m.as_str());
        let rest = caps.name("rest").map_or("", |m| m.as_str());
        Ok((Action::classify(word), rest))
    }

    /// Parse a `Subject - SxE - rest` line.
    pub fn parse_line(&self, field: &'static str, text: &str) -> Result<EpisodeLine, ExtractionError> {
        let line = text.trim();
        let mismatch = || ExtractionError::Mismatch {
            field,
            value: text.to_string(),
        };
        let caps = self.episode.captures(line).ok_or_else(mismatch)?;

        let subject = caps.name("subject").map_or("", |m| m.as_str()).trim();
        let detail = caps.name("rest").map_or("", |m| m.as_str()).trim();
        let season = caps
            .name("season")
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .ok_or_else(mismatch)?;
        let episode = caps
            .name("episode")
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .ok_or_else(mismatch)?;

        if subject.is_empty() {
            return Err(mismatch());
        }

        Ok(EpisodeLine {
            subject: subject.to_string(),
            season,
            episode,
            line: line.to_string(),
            detail: detail.to_string(),
        })
    }

    /// Whether a body is a connectivity probe rather than a real event.
    ///
    /// Content that parses as an `Action: Subject - SxE - ...` line is always
    /// a real event, whatever its episode title says.
    pub fn is_probe(&self, body: &StructuredBody) -> bool {
        if self.is_event_line(&body.content) {
            return false;
        }
        if self.probe_content.is_match(&body.content) {
            debug!(content = %body.content, "Content matches probe pattern");
            return true;
        }
        body.embeds
            .iter()
            .any(|embed| self.probe_description.is_match(&embed.description))
    }

    fn is_event_line(&self, content: &str) -> bool {
        self.split_action(content)
            .and_then(|(_, rest)| self.parse_line("content", rest))
            .is_ok()
    }
}

impl Default for SummaryRules {
    fn default() -> Self {
        Self::new()
    }
}
