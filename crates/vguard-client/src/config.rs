//! Consumer configuration.

use std::time::Duration;

use vguard_models::OrgId;

/// Remote progress consumer settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Base URL of the API, e.g. `http://localhost:8000`
    pub base_url: String,
    /// Progress WebSocket endpoint
    pub ws_url: String,
    /// Organization the consumer acts for
    pub org_id: OrgId,
    /// Interval of the status poll running beside the push channel
    pub poll_interval: Duration,
    /// Pause before reconnecting a dropped push connection
    pub reconnect_delay: Duration,
    /// Timeout of one status query
    pub request_timeout: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000/ws/progress".to_string(),
            org_id: OrgId::from_string("default"),
            poll_interval: Duration::from_secs(2),
            reconnect_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ConsumerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("VGUARD_API_URL").unwrap_or(defaults.base_url),
            ws_url: std::env::var("VGUARD_WS_URL").unwrap_or(defaults.ws_url),
            org_id: std::env::var("VGUARD_ORG_ID")
                .map(OrgId::from_string)
                .unwrap_or(defaults.org_id),
            poll_interval: millis_var("CONSUMER_POLL_INTERVAL_MS").unwrap_or(defaults.poll_interval),
            reconnect_delay: millis_var("CONSUMER_RECONNECT_DELAY_MS").unwrap_or(defaults.reconnect_delay),
            request_timeout: millis_var("CONSUMER_REQUEST_TIMEOUT_MS").unwrap_or(defaults.request_timeout),
        }
    }
}

fn millis_var(name: &str) -> Option<Duration> {
    std::env::var(name).ok().as_deref().and_then(parse_millis)
}

/// Positive millisecond counts only; zero would spin the poll loop.
fn parse_millis(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
