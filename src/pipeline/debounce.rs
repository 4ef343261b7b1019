//! Shared buffer with a resettable debounce countdown.
//!
//! Every accepted envelope is appended here. The first append starts a
//! countdown task; later appends only reset the remaining time. When the
//! countdown reaches zero the whole buffer is swapped out and handed to the
//! flush worker over a channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::DebounceConfig;
use crate::pipeline::types::Envelope;

/// A flushed buffer snapshot.
pub type Batch = Vec<Envelope>;

/// Countdown state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running { remaining: Duration },
}

impl TimerState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn remaining(&self) -> Duration {
        match self {
            Self::Idle => Duration::ZERO,
            Self::Running { remaining } => *remaining,
        }
    }
}

struct BufferState {
    pending: Batch,
    timer: TimerState,
    countdown: Option<JoinHandle<()>>,
}

/// Owns the buffer, the timer and the countdown task.
///
/// Append and start/reset happen under one lock, and so does expiry plus the
/// buffer swap, so an envelope lands in exactly one batch.
pub struct BufferManager {
    config: DebounceConfig,
    state: Mutex<BufferState>,
    batch_tx: mpsc::UnboundedSender<Batch>,
}

impl BufferManager {
    /// Create a manager and the receiving end for flushed batches.
    pub fn new(config: DebounceConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<Batch>) {
        let (batch_tx, batch_rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            config,
            state: Mutex::new(BufferState {
                pending: Vec::new(),
                timer: TimerState::Idle,
                countdown: None,
            }),
            batch_tx,
        });
        (manager, batch_rx)
    }

    /// Append an envelope and start or reset the countdown.
    ///
    /// Returns the number of envelopes now waiting.
    pub async fn enqueue(self: &Arc<Self>, envelope: Envelope) -> usize {
        let mut state = self.state.lock().await;

        debug!(envelope_id = %envelope.id, path = %envelope.source_path, "Buffering envelope");
        state.pending.push(envelope);

        match state.timer {
            TimerState::Running { .. } => {
                state.timer = TimerState::Running {
                    remaining: self.config.window,
                };
                debug!(pending = state.pending.len(), "Debounce timer reset");
            }
            TimerState::Idle => {
                state.timer = TimerState::Running {
                    remaining: self.config.window,
                };
                state.countdown = Some(self.spawn_countdown());
                info!(
                    window_secs = self.config.window.as_secs_f64(),
                    "Debounce timer started"
                );
            }
        }

        state.pending.len()
    }

    /// Current countdown state.
    pub async fn timer(&self) -> TimerState {
        self.state.lock().await.timer
    }

    /// Number of envelopes waiting for the next flush.
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Stop the countdown and flush whatever is buffered right away.
    ///
    /// Returns the number of envelopes handed off.
    pub async fn flush_now(&self) -> usize {
        let mut state = self.state.lock().await;
        if let Some(handle) = state.countdown.take() {
            handle.abort();
        }
        self.expire(&mut state)
    }

    fn spawn_countdown(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let tick = self.config.tick;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            // A late tick counts once; missed ticks are never replayed.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let mut state = manager.state.lock().await;
                match state.timer {
                    TimerState::Idle => break,
                    TimerState::Running { remaining } if remaining.is_zero() => {
                        state.countdown = None;
                        manager.expire(&mut state);
                        break;
                    }
                    TimerState::Running { remaining } => {
                        state.timer = TimerState::Running {
                            remaining: remaining.saturating_sub(tick),
                        };
                    }
                }
            }
        })
    }

    /// Swap the buffer out and hand it off. Caller holds the lock.
    fn expire(&self, state: &mut BufferState) -> usize {
        state.timer = TimerState::Idle;
        let batch = std::mem::take(&mut state.pending);
        let count = batch.len();
        if count == 0 {
            return 0;
        }

        info!(count, "Debounce timer expired, flushing buffer");
        if self.batch_tx.send(batch).is_err() {
            warn!(count, "Flush worker is gone, dropping batch");
        }
        count
    }
}
