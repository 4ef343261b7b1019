//! HTTP edges: the inbound webhook router and the outbound Discord sink.

pub mod discord;
pub mod webhook;

pub use discord::DiscordSink;
pub use webhook::webhook_routes;
