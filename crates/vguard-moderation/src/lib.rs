//! Content moderation for sampled video frames.
//!
//! This crate provides:
//! - A single [`ContentBackend`] interface over external classification services
//! - A ranked provider list resolving the backend once at startup
//! - [`ContentClassifier`], which bounds every per-frame call by a timeout
//! - [`SensitivityAggregator`], which reduces frame records to a job verdict

pub mod aggregator;
pub mod backend;
pub mod categorical;
pub mod classifier;
pub mod config;
pub mod error;
pub mod probabilistic;

pub use aggregator::{AggregationInput, SensitivityAggregator};
pub use backend::{default_providers, select_backend, BackendProvider, ContentBackend};
pub use categorical::{CategoricalBackend, Likelihood};
pub use classifier::ContentClassifier;
pub use config::ModerationConfig;
pub use error::{ClassifierError, ClassifierResult};
pub use probabilistic::ProbabilisticBackend;
