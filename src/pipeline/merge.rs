//! Merge engine: groups a flushed batch and renders one message per group.
//!
//! Each embed of each envelope yields an `(action, subject, season)` key and a
//! member line. Envelopes sharing a key collapse into one summary message.
//! Groups come out sorted by key so the send order is reproducible.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::ExtractionError;
use crate::pipeline::rules::{Action, EpisodeLine, SummaryRules};
use crate::pipeline::types::{Embed, Envelope, OutboundMessage, StructuredBody, retarget};

/// One envelope's contribution to a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Summary line, e.g. `ShowA - 1x02 - Title [HDTV-720p]`.
    pub summary: String,
    pub season: u64,
    pub episode: u64,
    /// Text after the episode number, e.g. `Title [HDTV-720p]`.
    pub detail: String,
}

/// Envelopes sharing a derived key.
#[derive(Debug, Clone)]
pub struct Group {
    pub action: Action,
    pub subject: String,
    /// Season number, without leading zeros.
    pub subdivision: String,
    pub members: Vec<Member>,
    /// The envelope that created the group.
    pub representative: Envelope,
}

impl Group {
    pub fn key(&self) -> String {
        group_key(self.action, &self.subject, &self.subdivision)
    }

    pub fn is_single(&self) -> bool {
        self.members.len() == 1
    }
}

fn group_key(action: Action, subject: &str, subdivision: &str) -> String {
    format!("{}-{}-{}", action.label(), subject, subdivision)
}

/// Stateless grouping and rendering over a batch snapshot.
pub struct MergeEngine {
    rules: Arc<SummaryRules>,
}

impl MergeEngine {
    pub fn new(rules: Arc<SummaryRules>) -> Self {
        Self { rules }
    }

    /// Group a batch. Embeds that fail extraction are logged and skipped.
    pub fn group(&self, batch: &[Envelope]) -> Vec<Group> {
        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        let mut skipped = 0usize;

        for envelope in batch {
            for extracted in self.extract(envelope) {
                let (action, line) = match extracted {
                    Ok(parts) => parts,
                    Err(e) => {
                        warn!(envelope_id = %envelope.id, error = %e, "Skipping embed");
                        skipped += 1;
                        continue;
                    }
                };

                let subdivision = line.season.to_string();
                let key = group_key(action, &line.subject, &subdivision);
                let member = Member {
                    summary: line.line,
                    season: line.season,
                    episode: line.episode,
                    detail: line.detail,
                };

                match groups.entry(key) {
                    Entry::Occupied(mut entry) => entry.get_mut().members.push(member),
                    Entry::Vacant(entry) => {
                        entry.insert(Group {
                            action,
                            subject: line.subject,
                            subdivision,
                            members: vec![member],
                            representative: envelope.clone(),
                        });
                    }
                }
            }
        }

        info!(
            envelopes = batch.len(),
            groups = groups.len(),
            skipped,
            "Merged batch"
        );
        groups.into_values().collect()
    }

    /// Derive `(action, line)` for every embed of an envelope.
    ///
    /// The action always comes from the content prefix. The member line is
    /// the embed description; the first embed falls back to the content
    /// remainder. An envelope without embeds is read from its content alone.
    pub fn extract(&self, envelope: &Envelope) -> Vec<Result<(Action, EpisodeLine), ExtractionError>> {
        let Some(body) = envelope.body() else {
            return vec![Err(ExtractionError::Mismatch {
                field: "body",
                value: "<not normalized>".to_string(),
            })];
        };

        let (action, rest) = match self.rules.split_action(&body.content) {
            Ok(parts) => parts,
            Err(e) => return vec![Err(e)],
        };

        if body.embeds.is_empty() {
            return vec![self.rules.parse_line("content", rest).map(|line| (action, line))];
        }

        body.embeds
            .iter()
            .enumerate()
            .map(|(i, embed)| {
                let line = match self.rules.parse_line("description", &embed.description) {
                    Err(_) if i == 0 => self.rules.parse_line("content", rest),
                    other => other,
                };
                line.map(|line| (action, line))
            })
            .collect()
    }

    /// Render one outbound message for a group.
    pub fn render(&self, group: &Group, base_url: &str) -> OutboundMessage {
        let template = group.representative.body().and_then(|b| b.embeds.first());
        let color = template
            .map(|embed| embed.color)
            .filter(|color| *color != 0)
            .unwrap_or_else(|| group.action.color());

        let body = if group.is_single() {
            let member = &group.members[0];
            StructuredBody {
                content: format!("{}: {}", group.action, member.summary),
                embeds: vec![Embed {
                    title: group.subject.clone(),
                    description: member.summary.clone(),
                    color,
                    fields: template.map(|e| e.fields.clone()).unwrap_or_default(),
                    ..Default::default()
                }],
            }
        } else {
            let season: u64 = group.subdivision.parse().unwrap_or_default();
            StructuredBody {
                content: format!("{}: {} Season {:02}", group.action, group.subject, season),
                embeds: vec![Embed {
                    title: group.subject.clone(),
                    description: grouped_description(group),
                    color,
                    ..Default::default()
                }],
            }
        };

        let destination = retarget(base_url, &group.representative.source_path);
        debug!(key = %group.key(), members = group.members.len(), %destination, "Rendered group");

        OutboundMessage { destination, body }
    }

    /// Group and render a batch in key order.
    pub fn merge(&self, batch: &[Envelope], base_url: &str) -> Vec<OutboundMessage> {
        self.group(batch)
            .iter()
            .map(|group| self.render(group, base_url))
            .collect()
    }
}

/// One `SxEE - detail` line per distinct episode, ordered by season/episode,
/// with repeats collapsed into `(Nx)`. Season and episode are re-rendered so
/// `01x03` and `1x03` count as the same episode.
fn grouped_description(group: &Group) -> String {
    let mut lines: Vec<(u64, u64, &str, usize)> = Vec::new();
    for member in &group.members {
        let id = (member.season, member.episode, member.detail.as_str());
        match lines.iter_mut().find(|(s, e, d, _)| (*s, *e, *d) == id) {
            Some(existing) => existing.3 += 1,
            None => lines.push((id.0, id.1, id.2, 1)),
        }
    }
    lines.sort();

    lines
        .into_iter()
        .map(|(season, episode, detail, count)| {
            let text = format!("{season}x{episode:02} - {detail}");
            match count {
                1 => text,
                n => format!("{text} ({n}x)"),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
