//! Uniform adapters over heterogeneous external AI services.
//!
//! Four capabilities are consumed by the core: text completion, image
//! synthesis, video synthesis (submit + poll), and clip compilation
//! (submit + poll). Each is a small trait independent of the vendor wire
//! format; construction is a switch over the closed provider config tags.
//!
//! Adapter instances are never persisted. The orchestrator rebuilds them at
//! each phase entry from the job's frozen provider tags plus a fresh
//! credential lookup.

pub mod bundle;
pub mod credentials;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod openrouter;
pub mod rest;
pub mod traits;

pub use bundle::{build_compilation, build_image, build_text, build_video, ProviderBundle};
pub use credentials::{Capability, Credential, CredentialStore, EnvCredentialStore, InMemoryCredentialStore};
pub use error::{ProviderError, ProviderResult};
pub use gemini::GeminiText;
pub use mock::{MockCompilation, MockImage, MockText, MockVideo};
pub use openrouter::OpenRouterText;
pub use rest::{RestCompilation, RestImage, RestVideo};
pub use traits::{
    ChatOptions, ChatOutput, CompileOptions, CompilePoll, Compilation, ImageOutput,
    ImageSynthesis, RemoteStatus, TextCompletion, VideoPoll, VideoRequest, VideoSynthesis,
};
