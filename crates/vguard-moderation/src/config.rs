//! Moderation configuration.

use std::time::Duration;

const DEFAULT_SIGHTENGINE_URL: &str = "https://api.sightengine.com/1.0/check.json";
const DEFAULT_VISION_URL: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Configuration for content classification.
#[derive(Debug, Clone)]
pub struct ModerationConfig {
    /// Sightengine API user (probabilistic backend)
    pub sightengine_api_user: Option<String>,
    /// Sightengine API secret (probabilistic backend)
    pub sightengine_api_secret: Option<String>,
    /// Probabilistic backend endpoint
    pub sightengine_url: String,
    /// Google Vision API key (categorical backend)
    pub google_vision_api_key: Option<String>,
    /// Categorical backend endpoint
    pub google_vision_url: String,
    /// Hard bound on one frame classification
    pub frame_timeout: Duration,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            sightengine_api_user: None,
            sightengine_api_secret: None,
            sightengine_url: DEFAULT_SIGHTENGINE_URL.to_string(),
            google_vision_api_key: None,
            google_vision_url: DEFAULT_VISION_URL.to_string(),
            frame_timeout: Duration::from_millis(5000),
        }
    }
}

impl ModerationConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            sightengine_api_user: non_empty_env("SIGHTENGINE_API_USER"),
            sightengine_api_secret: non_empty_env("SIGHTENGINE_API_SECRET"),
            sightengine_url: non_empty_env("SIGHTENGINE_URL")
                .unwrap_or_else(|| DEFAULT_SIGHTENGINE_URL.to_string()),
            google_vision_api_key: non_empty_env("GOOGLE_VISION_API_KEY"),
            google_vision_url: non_empty_env("GOOGLE_VISION_URL")
                .unwrap_or_else(|| DEFAULT_VISION_URL.to_string()),
            frame_timeout: Duration::from_millis(
                std::env::var("MODERATION_FRAME_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|ms: &u64| *ms > 0)
                    .unwrap_or(5000),
            ),
        }
    }

    /// Probabilistic backend credentials, when both halves are present.
    pub fn sightengine_credentials(&self) -> Option<(&str, &str)> {
        match (&self.sightengine_api_user, &self.sightengine_api_secret) {
            (Some(user), Some(secret)) => Some((user.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModerationConfig::default();
        assert_eq!(config.frame_timeout, Duration::from_secs(5));
        assert!(config.sightengine_credentials().is_none());
        assert!(config.google_vision_api_key.is_none());
    }

    #[test]
    fn test_credentials_need_both_halves() {
        let config = ModerationConfig {
            sightengine_api_user: Some("user".to_string()),
            ..Default::default()
        };
        assert!(config.sightengine_credentials().is_none());

        let config = ModerationConfig {
            sightengine_api_secret: Some("secret".to_string()),
            ..config
        };
        assert_eq!(config.sightengine_credentials(), Some(("user", "secret")));
    }
}
