//! Configuration types.

use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ConfigError;

/// Default downstream base URL. Source paths are appended to it verbatim.
pub const DEFAULT_DESTINATION_URL: &str = "https://discord.com/";

/// Countdown configuration for the shared buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceConfig {
    /// Quiet period after the last event before a batch is flushed.
    pub window: Duration,
    /// Countdown granularity.
    pub tick: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10),
            tick: Duration::from_secs(1),
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct HookbufferConfig {
    /// Port the inbound listener binds on.
    pub port: u16,
    /// Downstream base URL, always ending in `/`.
    pub destination_url: String,
    pub debounce: DebounceConfig,
    /// Delay inserted between consecutive outbound sends.
    pub pacing_delay: Duration,
    /// Timeout for a single outbound POST.
    pub send_timeout: Duration,
}

impl Default for HookbufferConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            destination_url: DEFAULT_DESTINATION_URL.to_string(),
            debounce: DebounceConfig::default(),
            pacing_delay: Duration::from_secs(1),
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl HookbufferConfig {
    /// Build config from `HOOKBUFFER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Malformed values are logged and replaced by their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = parse_or("HOOKBUFFER_PORT", &lookup, defaults.port);

        let destination_url = match lookup("HOOKBUFFER_DESTINATION_URL") {
            Some(url) if !url.trim().is_empty() => with_trailing_slash(url.trim()),
            _ => defaults.destination_url,
        };

        let window = parse_or(
            "HOOKBUFFER_DEBOUNCE_SECS",
            &lookup,
            defaults.debounce.window.as_secs(),
        );
        let tick = parse_or(
            "HOOKBUFFER_TICK_MS",
            &lookup,
            defaults.debounce.tick.as_millis() as u64,
        )
        .max(1);
        let pacing = parse_or(
            "HOOKBUFFER_PACING_MS",
            &lookup,
            defaults.pacing_delay.as_millis() as u64,
        );
        let send_timeout = parse_or(
            "HOOKBUFFER_SEND_TIMEOUT_SECS",
            &lookup,
            defaults.send_timeout.as_secs(),
        );

        Self {
            port,
            destination_url,
            debounce: DebounceConfig {
                window: Duration::from_secs(window),
                tick: Duration::from_millis(tick),
            },
            pacing_delay: Duration::from_millis(pacing),
            send_timeout: Duration::from_secs(send_timeout),
        }
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> T
where
    T: FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        debug!(key, %default, "Not set, using default");
        return default;
    };

    match parse_value::<T>(key, &raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, %default, "Using default");
            default
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        })
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
