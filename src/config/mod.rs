use crate::error::TrackerError;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which transport feeds progress events into the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Server-sent events from `/documents/{id}/events`.
    Push,
    /// Simulated stage advance plus periodic `/documents/{id}` checks.
    Poll,
}

impl FromStr for TransportMode {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "push" | "sse" | "events" => Ok(TransportMode::Push),
            "poll" | "polling" => Ok(TransportMode::Poll),
            other => Err(TrackerError::Config(format!(
                "unknown transport '{}', expected 'push' or 'poll'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Push => f.write_str("push"),
            TransportMode::Poll => f.write_str("poll"),
        }
    }
}

/// Cadences of the polling transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// How often the simulated stage moves forward (default: 1.3 s)
    pub stage_advance_interval: Duration,

    /// How often the authoritative status is fetched (default: 3 s)
    pub status_poll_interval: Duration,

    /// Status checks before the item is failed as stalled (default: 60)
    pub max_status_polls: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            stage_advance_interval: Duration::from_millis(1300),
            status_poll_interval: Duration::from_millis(3000),
            max_status_polls: 60,
        }
    }
}

/// Client configuration for the upload tracker
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the OCR API (default: "http://localhost:8000")
    pub api_base_url: String,

    /// Bearer token attached to every request
    pub auth_token: Option<String>,

    /// Progress transport (default: push)
    pub transport: TransportMode,

    pub poll: PollSettings,

    /// Timeout for upload and status requests; never applied to the event
    /// stream (default: 120 s)
    pub request_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            auth_token: None,
            transport: TransportMode::Push,
            poll: PollSettings::default(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

impl TrackerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            api_base_url: env::var("OCR_API_URL").unwrap_or(default.api_base_url),

            auth_token: env::var("OCR_API_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty()),

            transport: env::var("TRACKER_TRANSPORT")
                .ok()
                .and_then(|v| match v.parse() {
                    Ok(mode) => Some(mode),
                    Err(e) => {
                        tracing::warn!("{}; falling back to {}", e, default.transport);
                        None
                    }
                })
                .unwrap_or(default.transport),

            poll: PollSettings {
                stage_advance_interval: env::var("STAGE_ADVANCE_INTERVAL_MS")
                    .ok()
                    .and_then(|v| parse_interval_ms(&v))
                    .unwrap_or(default.poll.stage_advance_interval),

                status_poll_interval: env::var("STATUS_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| parse_interval_ms(&v))
                    .unwrap_or(default.poll.status_poll_interval),

                max_status_polls: env::var("MAX_STATUS_POLLS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|n: &u32| *n > 0)
                    .unwrap_or(default.poll.max_status_polls),
            },

            request_timeout: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.request_timeout),
        }
    }
}

/// Parses a positive millisecond count; zero yields `None`.
fn parse_interval_ms(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse()
        .ok()
        .filter(|ms: &u64| *ms > 0)
        .map(Duration::from_millis)
}
