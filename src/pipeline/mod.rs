//! Webhook buffering pipeline.
//!
//! Every inbound request flows through:
//! 1. `Intake::accept()`: source detection and normalization; probes are
//!    forwarded immediately
//! 2. `BufferManager::enqueue()`: shared buffer with a resettable countdown
//! 3. `MergeEngine::merge()`: groups a flushed batch by action, subject and season
//! 4. `Dispatcher::dispatch()`: paced, sequential delivery downstream

pub mod debounce;
pub mod dispatch;
pub mod intake;
pub mod merge;
pub mod normalize;
pub mod processor;
pub mod rules;
pub mod types;
