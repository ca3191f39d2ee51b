//! The project store contract.

use async_trait::async_trait;

use reel_models::{Project, ProjectId};

use crate::error::StoreResult;

/// Projects and their plans, keyed by `(owner_id, project_id)`.
///
/// Plans are stored as part of the project record (a single JSON blob per
/// project). Listing is not part of the core contract; only keyed lookup.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Persist a new project. Fails with `AlreadyExists` on id collision.
    async fn create(&self, project: &Project) -> StoreResult<()>;

    /// Fetch a project. Returns `None` when it does not exist under this
    /// owner.
    async fn get(&self, owner_id: &str, project_id: &ProjectId) -> StoreResult<Option<Project>>;

    /// Replace an existing project record.
    async fn update(&self, project: &Project) -> StoreResult<()>;
}
