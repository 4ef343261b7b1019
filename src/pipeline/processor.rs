//! Batch processor: merges a flushed batch and hands the result to the dispatcher.
//!
//! Batches are processed one at a time by a single flush worker, so the sends of
//! two consecutive batches never interleave.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::pipeline::debounce::Batch;
use crate::pipeline::dispatch::{DispatchReport, Dispatcher};
use crate::pipeline::merge::MergeEngine;

pub struct BatchProcessor {
    merge: MergeEngine,
    dispatcher: Arc<Dispatcher>,
    base_url: String,
}

impl BatchProcessor {
    pub fn new(merge: MergeEngine, dispatcher: Arc<Dispatcher>, base_url: impl Into<String>) -> Self {
        Self {
            merge,
            dispatcher,
            base_url: base_url.into(),
        }
    }

    /// Merge one batch and send a message per group.
    pub async fn process(&self, batch: Batch) -> DispatchReport {
        let count = batch.len();
        let waited_ms = batch
            .iter()
            .map(|envelope| envelope.received_at)
            .min()
            .map_or(0, |oldest| (Utc::now() - oldest).num_milliseconds());
        info!(count, waited_ms, "Processing flushed batch");

        let messages = self.merge.merge(&batch, &self.base_url);
        let report = self.dispatcher.dispatch(&messages).await;

        if report.failed > 0 {
            warn!(
                sent = report.sent,
                failed = report.failed,
                "Batch delivered with failures"
            );
        } else {
            info!(envelopes = count, sent = report.sent, "Batch delivered");
        }
        report
    }
}

/// Drain flushed batches until every sender is gone.
pub fn spawn_flush_worker(
    processor: Arc<BatchProcessor>,
    mut batches: mpsc::UnboundedReceiver<Batch>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = batches.recv().await {
            processor.process(batch).await;
        }
        info!("Flush worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::DebounceConfig;
    use crate::pipeline::debounce::BufferManager;
    use crate::pipeline::dispatch::recording::RecordingSink;
    use crate::pipeline::rules::SummaryRules;
    use crate::pipeline::types::{Embed, Envelope, StructuredBody};

    const BASE: &str = "https://discord.com/";

    fn hook(action: &str, show: &str, season: u64, episode: u64) -> Envelope {
        let line = format!("{show} - {season}x{episode:02} - Episode {episode} [HDTV-720p]");
        Envelope::structured(
            "/api/webhooks/1/abc",
            StructuredBody {
                content: format!("{action}: {line}"),
                embeds: vec![Embed {
                    title: show.to_string(),
                    description: line,
                    color: 0xFFC130,
                    ..Default::default()
                }],
            },
        )
    }

    fn processor(sink: Arc<RecordingSink>) -> BatchProcessor {
        let dispatcher = Arc::new(Dispatcher::new(sink, Duration::from_secs(1)));
        BatchProcessor::new(MergeEngine::new(Arc::new(SummaryRules::new())), dispatcher, BASE)
    }

    #[tokio::test(start_paused = true)]
    async fn one_message_per_group() {
        let sink = Arc::new(RecordingSink::default());
        let report = processor(sink.clone())
            .process(vec![
                hook("Grabbed", "ShowA", 1, 1),
                hook("Grabbed", "ShowA", 1, 2),
                hook("Grabbed", "ShowB", 2, 5),
            ])
            .await;

        assert_eq!(report, DispatchReport { sent: 2, failed: 0 });
        let messages = sink.messages();
        assert_eq!(messages[0].body.content, "Grabbed: ShowA Season 01");
        assert_eq!(messages[0].body.embeds[0].description, "1x01 - Episode 1 [HDTV-720p]\n1x02 - Episode 2 [HDTV-720p]");
        assert_eq!(messages[1].body.content, "Grabbed: ShowB - 2x05 - Episode 5 [HDTV-720p]");
        assert!(messages.iter().all(|m| m.destination == "https://discord.com/api/webhooks/1/abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_group_does_not_block_others() {
        let sink = Arc::new(RecordingSink::failing_on(&[0]));
        let report = processor(sink.clone())
            .process(vec![
                hook("Grabbed", "ShowA", 1, 1),
                hook("Imported", "ShowA", 1, 1),
                hook("Grabbed", "ShowB", 1, 1),
            ])
            .await;

        assert_eq!(report, DispatchReport { sent: 2, failed: 1 });
        assert_eq!(sink.messages().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_envelopes_are_skipped() {
        let sink = Arc::new(RecordingSink::default());
        let junk = Envelope::structured(
            "/api/webhooks/1/abc",
            StructuredBody {
                content: "no structure here".into(),
                embeds: vec![],
            },
        );
        let report = processor(sink.clone())
            .process(vec![junk, hook("Grabbed", "ShowA", 1, 1)])
            .await;

        assert_eq!(report.sent, 1);
        assert_eq!(sink.messages()[0].body.content, "Grabbed: ShowA - 1x01 - Episode 1 [HDTV-720p]");
    }

    #[tokio::test(start_paused = true)]
    async fn worker_drains_flushed_batches() {
        let sink = Arc::new(RecordingSink::default());
        let (buffer, rx) = BufferManager::new(DebounceConfig {
            window: Duration::from_secs(10),
            tick: Duration::from_secs(1),
        });
        let worker = spawn_flush_worker(Arc::new(processor(sink.clone())), rx);

        buffer.enqueue(hook("Grabbed", "ShowA", 1, 1)).await;
        buffer.enqueue(hook("Grabbed", "ShowA", 1, 2)).await;
        buffer.flush_now().await;

        // Give the worker a chance to run.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(sink.messages().len(), 1);
        assert_eq!(sink.messages()[0].body.content, "Grabbed: ShowA Season 01");

        drop(buffer);
        tokio::time::timeout(Duration::from_secs(5), worker)
            .await
            .expect("worker should stop once the buffer is dropped")
            .unwrap();
    }
}
