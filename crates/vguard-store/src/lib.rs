//! Persistence for video job records.
//!
//! The pipeline orchestrator is the only writer; status queries and
//! reconciliation polls only read.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod repository;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;
pub use redis_store::{RedisJobStore, StoreConfig};
pub use repository::JobRepository;
