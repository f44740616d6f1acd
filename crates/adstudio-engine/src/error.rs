use adstudio_contracts::aspect::UnsupportedRatioError;

/// Everything that can go wrong inside the normalization pipeline.
///
/// Callers treat every variant as recoverable: the original image is used
/// when normalization fails.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("image decode failed: {0}")]
    Decode(String),

    #[error(transparent)]
    UnsupportedRatio(#[from] UnsupportedRatioError),

    #[error("computed output dimensions {width}x{height} are not valid")]
    InvalidDimensions { width: f64, height: f64 },

    #[error("resource limit: {0}")]
    ResourceLimit(String),

    #[error("resample failed: {0}")]
    Resize(String),

    #[error("png encode failed: {0}")]
    Encode(String),
}

/// Failures reported by a generation collaborator that retrying cannot fix.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("request blocked by safety filters: {0}")]
    Blocked(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("generation stopped ({0})")]
    Stopped(String),

    #[error("no image data in provider response")]
    EmptyResponse,
}

#[derive(Debug, thiserror::Error)]
pub enum UpscaleError {
    #[error("upscaling is disabled")]
    Disabled,

    #[error("monthly upscale quota exhausted ({used}/{total})")]
    QuotaExhausted { used: u32, total: u32 },
}
