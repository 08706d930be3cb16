//! Classification backend interface and startup selection.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use vguard_models::FrameVerdict;

use crate::categorical::CategoricalBackend;
use crate::config::ModerationConfig;
use crate::error::ClassifierResult;
use crate::probabilistic::ProbabilisticBackend;

/// External content-classification provider.
#[async_trait]
pub trait ContentBackend: Send + Sync {
    /// Score one still image.
    async fn classify(&self, frame: &Path) -> ClassifierResult<FrameVerdict>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Builds a backend when its prerequisites are configured.
pub trait BackendProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when this backend cannot be used.
    fn provide(&self, config: &ModerationConfig) -> Option<Arc<dyn ContentBackend>>;
}

struct ProbabilisticProvider;

impl BackendProvider for ProbabilisticProvider {
    fn name(&self) -> &'static str {
        "probabilistic"
    }

    fn provide(&self, config: &ModerationConfig) -> Option<Arc<dyn ContentBackend>> {
        let (user, secret) = config.sightengine_credentials()?;
        match ProbabilisticBackend::new(&config.sightengine_url, user, secret) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(e) => {
                warn!("Probabilistic backend configured but unusable: {}", e);
                None
            }
        }
    }
}

struct CategoricalProvider;

impl BackendProvider for CategoricalProvider {
    fn name(&self) -> &'static str {
        "categorical"
    }

    fn provide(&self, config: &ModerationConfig) -> Option<Arc<dyn ContentBackend>> {
        let key = config.google_vision_api_key.as_deref()?;
        match CategoricalBackend::new(&config.google_vision_url, key) {
            Ok(backend) => Some(Arc::new(backend)),
            Err(e) => {
                warn!("Categorical backend configured but unusable: {}", e);
                None
            }
        }
    }
}

/// Providers in priority order.
pub fn default_providers() -> Vec<Box<dyn BackendProvider>> {
    vec![Box::new(ProbabilisticProvider), Box::new(CategoricalProvider)]
}

/// Resolve the first usable backend. Called once per process.
pub fn select_backend(
    providers: &[Box<dyn BackendProvider>],
    config: &ModerationConfig,
) -> Option<Arc<dyn ContentBackend>> {
    for provider in providers {
        if let Some(backend) = provider.provide(config) {
            info!("Content classification backend: {}", backend.name());
            return Some(backend);
        }
    }
    warn!("No content classification backend configured; every job will be flagged for review");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nothing_configured_selects_none() {
        let backend = select_backend(&default_providers(), &ModerationConfig::default());
        assert!(backend.is_none());
    }

    #[test]
    fn test_probabilistic_ranks_first() {
        let config = ModerationConfig {
            sightengine_api_user: Some("u".to_string()),
            sightengine_api_secret: Some("s".to_string()),
            google_vision_api_key: Some("k".to_string()),
            ..Default::default()
        };
        let backend = select_backend(&default_providers(), &config).unwrap();
        assert_eq!(backend.name(), "probabilistic");
    }

    #[test]
    fn test_categorical_is_fallback() {
        let config = ModerationConfig {
            sightengine_api_user: Some("u".to_string()),
            google_vision_api_key: Some("k".to_string()),
            ..Default::default()
        };
        let backend = select_backend(&default_providers(), &config).unwrap();
        assert_eq!(backend.name(), "categorical");
    }
}
