use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use hookbuffer::channels::{DiscordSink, webhook_routes};
use hookbuffer::config::HookbufferConfig;
use hookbuffer::pipeline::debounce::BufferManager;
use hookbuffer::pipeline::dispatch::Dispatcher;
use hookbuffer::pipeline::intake::Intake;
use hookbuffer::pipeline::merge::MergeEngine;
use hookbuffer::pipeline::normalize::NormalizerSet;
use hookbuffer::pipeline::processor::{self, BatchProcessor};
use hookbuffer::pipeline::rules::SummaryRules;

/// How long pending sends may take once a shutdown signal arrives.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = HookbufferConfig::from_env();

    eprintln!("📦 Hookbuffer v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Listening: http://0.0.0.0:{}", config.port);
    eprintln!("   Destination: {}", config.destination_url);
    eprintln!(
        "   Debounce: {}s window, {}ms tick",
        config.debounce.window.as_secs(),
        config.debounce.tick.as_millis()
    );
    eprintln!(
        "   Delivery: {}ms pacing, {}s timeout\n",
        config.pacing_delay.as_millis(),
        config.send_timeout.as_secs()
    );

    // ── Delivery ────────────────────────────────────────────────────────
    let sink = DiscordSink::new(config.send_timeout).context("failed to build HTTP client")?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(sink), config.pacing_delay));

    // ── Buffer + flush worker ───────────────────────────────────────────
    let (buffer, batches) = BufferManager::new(config.debounce);
    let batch_processor = Arc::new(BatchProcessor::new(
        MergeEngine::new(Arc::new(SummaryRules::new())),
        Arc::clone(&dispatcher),
        config.destination_url.clone(),
    ));
    let flush_handle = processor::spawn_flush_worker(batch_processor, batches);

    // ── Inbound ─────────────────────────────────────────────────────────
    let intake = Arc::new(Intake::new(
        NormalizerSet::default(),
        Arc::clone(&buffer),
        dispatcher,
        config.destination_url.clone(),
    ));
    let app = webhook_routes(intake);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(port = config.port, "Hookbuffer server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated")?;

    // Deliver whatever is still buffered before exiting.
    let flushed = buffer.flush_now().await;
    drop(buffer);
    if tokio::time::timeout(SHUTDOWN_GRACE, flush_handle).await.is_err() {
        tracing::warn!(flushed, "Flush worker did not finish before shutdown");
    }

    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "Could not install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("Received ctrl_c, shutting down"),
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Received ctrl_c, shutting down");
}
