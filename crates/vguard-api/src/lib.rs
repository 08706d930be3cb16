//! Axum HTTP API server.
//!
//! This crate provides:
//! - Job creation with a synchronous metadata precondition
//! - Organization-scoped job status queries
//! - WebSocket progress subscriptions
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

#[cfg(test)]
mod test_support;

pub use auth::{OrgAuthorizer, OrgContext, SameOrgAuthorizer};
pub use config::{ApiConfig, BackendKind};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
