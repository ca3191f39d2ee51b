//! Request handlers.

pub mod health;
pub mod jobs;
pub mod projects;

pub use health::{health, ready};
pub use jobs::{cancel_job, get_job};
pub use projects::{
    approve_project, create_project, direct_project, generate_project, refine_project,
};
