//! Durable, owner-namespaced state for the ReelForge pipeline.
//!
//! Two stores back the core: a `JobStore` with single-writer discipline
//! (write leases, atomic whole-record commits, monotonic phase and
//! progress) and a `ProjectStore` for projects and their plans. Each has an
//! in-memory backend for tests and development and a Redis backend for
//! deployment.

pub mod error;
pub mod job_store;
pub mod lease;
pub mod memory;
pub mod project_store;
pub mod redis_store;

pub use error::{StoreError, StoreResult};
pub use job_store::JobStore;
pub use lease::WriteLease;
pub use memory::{MemoryJobStore, MemoryProjectStore};
pub use project_store::ProjectStore;
pub use redis_store::{RedisJobStore, RedisProjectStore, RedisStoreConfig};
