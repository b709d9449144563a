mod reporter;

pub mod config;
pub mod credentials;
pub mod dryrun;
pub mod error;
pub mod gemini;
pub mod media_store;
pub mod model_creator;
pub mod pipeline;
pub mod prompts;
pub mod provider;

pub use config::{EngineConfig, ResolvedModels};
pub use credentials::{CredentialManager, EnvCredentialManager};
pub use dryrun::DryrunProvider;
pub use error::{error_chain_text, is_credential_error, ApiError, PipelineError, Stage};
pub use gemini::GeminiProvider;
pub use media_store::MediaStore;
pub use model_creator::{ModelCreator, ModelSession};
pub use pipeline::{AdPipeline, MAX_FRAME_ATTEMPTS};
pub use provider::{
    default_provider_registry, CapabilityProvider, ContentPart, DownloadedMedia, ImageRequest,
    ProviderRegistry, SpeechRequest, VideoJob, VideoRequest,
};
