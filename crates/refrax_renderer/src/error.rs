//! Error types for the renderer.

use refrax_core::SceneError;
use thiserror::Error;

/// Rejected render settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A per-pixel sample count is zero.
    #[error("{0} must be at least 1")]
    ZeroSamples(&'static str),

    #[error("max_depth {depth} exceeds the limit of {limit}")]
    DepthTooLarge { depth: u32, limit: u32 },

    /// A coefficient that must be non-negative is not.
    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("threads must be at least 1 when set")]
    ZeroThreads,

    /// Invalid spatial index parameters.
    #[error("invalid acceleration settings: {0}")]
    InvalidAccel(String),

    #[error("failed to parse render config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that can occur while setting up or running a render.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;
