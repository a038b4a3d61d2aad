// src/rendering_lib/error.rs

use thiserror::Error;

use crate::volume_lib::ConfigError;

/// GPU resource failures. Fatal to the strategy that hit them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    #[error("shader program '{label}' failed to build: {message}")]
    ShaderCompilation { label: String, message: String },

    #[error("texture '{label}' could not be allocated: {message}")]
    TextureAllocation { label: String, message: String },

    #[error("buffer '{label}' could not be allocated: {message}")]
    BufferAllocation { label: String, message: String },

    #[error("upload to '{label}' expected {expected} bytes, got {actual}")]
    UploadSize { label: String, expected: usize, actual: usize },

    #[error("unknown GPU resource: {0}")]
    UnknownResource(String),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(String),
}

/// Errors surfaced by the rendering context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("no rendering strategy is active")]
    NoStrategy,

    #[error("render requested before any volume was configured")]
    NotConfigured,
}
