pub mod config;
pub mod credentials;
pub mod error;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod studio;

pub use config::{resolve_generation, GenerationSettings, ResolvedGeneration, StudioConfig};
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use error::StudioError;
pub use orchestrator::{
    BatchInput, BatchObserver, BatchOutcome, BatchState, CancelToken, GeneratedResult,
    NoopObserver, Orchestrator, PoseFailure,
};
pub use provider::{
    default_provider_registry, DryrunProvider, FashionRequest, GeminiProvider, GeneratedPayload,
    ImageProvider, ImageProviderRegistry,
};
pub use studio::{download_file_name, write_result_image, Studio};
