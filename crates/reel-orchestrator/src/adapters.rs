//! Adapter construction at phase entry.
//!
//! Adapters are never persisted: each resume rebuilds them from the job's
//! frozen provider tags plus a fresh credential lookup. The factory trait
//! is the seam that lets tests inject long-lived scripted adapters while
//! production reconstructs real clients every time.

use std::sync::Arc;

use async_trait::async_trait;

use reel_models::{CompileProviderConfig, ImageProviderConfig, VideoProviderConfig};
use reel_providers::{
    build_compilation, build_image, build_video, Capability, Compilation, CredentialStore,
    ImageSynthesis, ProviderResult, VideoSynthesis,
};

/// Builds the per-capability adapters the orchestrator calls.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn image(
        &self,
        owner_id: &str,
        config: &ImageProviderConfig,
    ) -> ProviderResult<Arc<dyn ImageSynthesis>>;

    async fn video(
        &self,
        owner_id: &str,
        config: &VideoProviderConfig,
    ) -> ProviderResult<Arc<dyn VideoSynthesis>>;

    async fn compile(
        &self,
        owner_id: &str,
        config: &CompileProviderConfig,
    ) -> ProviderResult<Option<Arc<dyn Compilation>>>;
}

/// Production factory: fresh credential lookup per phase entry, then the
/// construction switch over the provider tags.
pub struct CredentialAdapterFactory {
    credentials: Arc<dyn CredentialStore>,
}

impl CredentialAdapterFactory {
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl AdapterFactory for CredentialAdapterFactory {
    async fn image(
        &self,
        owner_id: &str,
        config: &ImageProviderConfig,
    ) -> ProviderResult<Arc<dyn ImageSynthesis>> {
        let credential = self.credentials.lookup(owner_id, Capability::Image).await;
        build_image(config, credential)
    }

    async fn video(
        &self,
        owner_id: &str,
        config: &VideoProviderConfig,
    ) -> ProviderResult<Arc<dyn VideoSynthesis>> {
        let credential = self.credentials.lookup(owner_id, Capability::Video).await;
        build_video(config, credential)
    }

    async fn compile(
        &self,
        owner_id: &str,
        config: &CompileProviderConfig,
    ) -> ProviderResult<Option<Arc<dyn Compilation>>> {
        let credential = self.credentials.lookup(owner_id, Capability::Compile).await;
        build_compilation(config, credential)
    }
}

/// Test factory: hands back the same scripted adapter instances on every
/// phase entry so poll state and call counters survive across resumes.
pub struct FixedAdapterFactory {
    pub image: Arc<dyn ImageSynthesis>,
    pub video: Arc<dyn VideoSynthesis>,
    pub compile: Option<Arc<dyn Compilation>>,
}

#[async_trait]
impl AdapterFactory for FixedAdapterFactory {
    async fn image(
        &self,
        _owner_id: &str,
        _config: &ImageProviderConfig,
    ) -> ProviderResult<Arc<dyn ImageSynthesis>> {
        Ok(Arc::clone(&self.image))
    }

    async fn video(
        &self,
        _owner_id: &str,
        _config: &VideoProviderConfig,
    ) -> ProviderResult<Arc<dyn VideoSynthesis>> {
        Ok(Arc::clone(&self.video))
    }

    async fn compile(
        &self,
        _owner_id: &str,
        config: &CompileProviderConfig,
    ) -> ProviderResult<Option<Arc<dyn Compilation>>> {
        if matches!(config, CompileProviderConfig::None) {
            return Ok(None);
        }
        Ok(self.compile.clone())
    }
}
