//! Image normalization for generated ad creatives, plus the generation and
//! upscale services that wrap it.
//!
//! The core entry point is [`normalize`]: strip near-white letterbox bands,
//! crop to the requested aspect ratio, and resample to a fixed-resolution PNG.

pub mod borders;
pub mod config;
pub mod crop;
pub mod dimensions;
pub mod dryrun;
pub mod enrich;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod raster;
pub mod retry;
pub mod upscale;

pub use config::{NormalizeConfig, ResampleFilter};
pub use dryrun::{DryrunAssistant, DryrunGenerator};
pub use enrich::{Assisted, PromptAssistant};
pub use error::{GenerationError, NormalizeError, UpscaleError};
pub use generate::{
    GeneratedImage, Generation, GenerationRequest, GenerationService, ImageGenerator, InlineImage,
    ProviderCall,
};
pub use pipeline::{BestEffort, NormalizationPlan, NormalizeOutcome, Normalized, Normalizer};
pub use retry::RetryPolicy;
pub use upscale::{ResampleUpscaler, UpscaleOptions, UpscaleService, Upscaled, Upscaler};

/// Normalizes `encoded` to `target` (`"Auto"` or `"W:H"`) with default settings.
pub fn normalize(encoded: &[u8], target: &str) -> Result<Vec<u8>, NormalizeError> {
    Normalizer::default().normalize(encoded, target)
}
