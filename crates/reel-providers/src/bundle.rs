//! Adapter construction from provider tags plus credentials.
//!
//! Construction is a switch over the closed config variants. Mock variants
//! need no credential; everything else fails with a permanent
//! `MissingCredentials` when the owner has none, which the orchestrator
//! surfaces without retrying.

use std::sync::Arc;

use reel_models::{
    CompileProviderConfig, ImageProviderConfig, ProviderSelection, TextProviderConfig,
    VideoProviderConfig,
};

use crate::credentials::{Capability, Credential};
use crate::error::{ProviderError, ProviderResult};
use crate::gemini::GeminiText;
use crate::mock::{MockCompilation, MockImage, MockText, MockVideo};
use crate::openrouter::OpenRouterText;
use crate::rest::{RestCompilation, RestImage, RestVideo};
use crate::traits::{Compilation, ImageSynthesis, TextCompletion, VideoSynthesis};

fn require(
    credential: Option<Credential>,
    capability: Capability,
) -> ProviderResult<Credential> {
    credential.ok_or_else(|| ProviderError::missing_credentials(capability.as_str()))
}

/// Build a text completion adapter.
pub fn build_text(
    config: &TextProviderConfig,
    credential: Option<Credential>,
) -> ProviderResult<Arc<dyn TextCompletion>> {
    match config {
        TextProviderConfig::Gemini { model } => {
            let credential = require(credential, Capability::Text)?;
            Ok(Arc::new(GeminiText::new(&credential, model.as_deref())?))
        }
        TextProviderConfig::OpenRouter { model } => {
            let credential = require(credential, Capability::Text)?;
            Ok(Arc::new(OpenRouterText::new(&credential, model.as_deref())?))
        }
        TextProviderConfig::Mock => Ok(Arc::new(MockText::new())),
    }
}

/// Build an image synthesis adapter.
pub fn build_image(
    config: &ImageProviderConfig,
    credential: Option<Credential>,
) -> ProviderResult<Arc<dyn ImageSynthesis>> {
    match config {
        ImageProviderConfig::Rest { endpoint } => {
            let credential = require(credential, Capability::Image)?;
            Ok(Arc::new(RestImage::new(&credential, endpoint.as_deref())?))
        }
        ImageProviderConfig::Mock => Ok(Arc::new(MockImage::new())),
    }
}

/// Build a video synthesis adapter.
pub fn build_video(
    config: &VideoProviderConfig,
    credential: Option<Credential>,
) -> ProviderResult<Arc<dyn VideoSynthesis>> {
    match config {
        VideoProviderConfig::Rest {
            endpoint,
            supports_end_frame,
        } => {
            let credential = require(credential, Capability::Video)?;
            Ok(Arc::new(RestVideo::new(
                &credential,
                endpoint.as_deref(),
                *supports_end_frame,
            )?))
        }
        VideoProviderConfig::Mock => Ok(Arc::new(MockVideo::new())),
    }
}

/// Build a compilation adapter; `None` when compilation is disabled.
pub fn build_compilation(
    config: &CompileProviderConfig,
    credential: Option<Credential>,
) -> ProviderResult<Option<Arc<dyn Compilation>>> {
    match config {
        CompileProviderConfig::Rest { endpoint } => {
            let credential = require(credential, Capability::Compile)?;
            Ok(Some(Arc::new(RestCompilation::new(
                &credential,
                endpoint.as_deref(),
            )?)))
        }
        CompileProviderConfig::None => Ok(None),
        CompileProviderConfig::Mock => Ok(Some(Arc::new(MockCompilation::new()))),
    }
}

/// The four adapters selected for an owner.
///
/// Built fresh per use; never stored in durable state.
#[derive(Clone)]
pub struct ProviderBundle {
    pub text: Arc<dyn TextCompletion>,
    pub image: Arc<dyn ImageSynthesis>,
    pub video: Arc<dyn VideoSynthesis>,
    pub compile: Option<Arc<dyn Compilation>>,
}

impl ProviderBundle {
    /// Build the full bundle for a provider selection. Credentials are
    /// looked up by the caller, one per capability.
    pub fn build(
        selection: &ProviderSelection,
        text_credential: Option<Credential>,
        image_credential: Option<Credential>,
        video_credential: Option<Credential>,
        compile_credential: Option<Credential>,
    ) -> ProviderResult<Self> {
        Ok(Self {
            text: build_text(&selection.text, text_credential)?,
            image: build_image(&selection.image, image_credential)?,
            video: build_video(&selection.video, video_credential)?,
            compile: build_compilation(&selection.compile, compile_credential)?,
        })
    }

    /// All-mock bundle for tests.
    pub fn mock() -> Self {
        Self {
            text: Arc::new(MockText::new()),
            image: Arc::new(MockImage::new()),
            video: Arc::new(MockVideo::new()),
            compile: None,
        }
    }
}
