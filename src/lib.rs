//! Hookbuffer: buffers bursts of Sonarr webhooks and forwards them to Discord
//! as grouped summary messages.

pub mod channels;
pub mod config;
pub mod error;
pub mod pipeline;
