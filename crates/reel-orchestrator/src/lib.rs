//! The job orchestrator.
//!
//! A durable, resumable state machine that drives each approved plan
//! through image synthesis, video synthesis, and optional compilation.
//! Every wake-up claims the job's write lease, re-derives the work to do
//! from persisted state, performs at most a bounded amount of external
//! work with commits between suspension points, and either advances,
//! re-arms a timer, or reaches a terminal phase.

pub mod adapters;
pub mod backoff;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod scheduler;

pub use adapters::{AdapterFactory, CredentialAdapterFactory, FixedAdapterFactory};
pub use backoff::BackoffPolicy;
pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, OrchestratorResult};
pub use orchestrator::Orchestrator;
pub use scheduler::{Scheduler, WakeUp};
