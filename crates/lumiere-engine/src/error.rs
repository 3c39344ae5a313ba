use thiserror::Error;

/// Failures callers are expected to tell apart. Everything else travels as a
/// plain `anyhow::Error` with context.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StudioError {
    #[error("a portrait image is required before generating")]
    MissingPortrait,
    #[error("at least one product image is required before generating")]
    MissingProducts,
    #[error("at most {max} product images are supported, got {got}")]
    TooManyProducts { max: usize, got: usize },
    #[error("no image generated in response")]
    NoImageReturned,
    #[error("no API key available (set GEMINI_API_KEY or GOOGLE_API_KEY)")]
    MissingCredential,
    #[error("no generated result with id '{0}'")]
    UnknownResult(String),
}
