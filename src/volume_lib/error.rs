// src/volume_lib/error.rs

use thiserror::Error;

/// Caller contract violations detected while configuring a renderer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("volume contains no samples")]
    EmptyVolume,

    #[error("volume dimensions must be positive, got {x}x{y}x{z}")]
    InvalidDimensions { x: i64, y: i64, z: i64 },

    #[error("volume expects {expected} samples but {actual} were supplied")]
    SampleCountMismatch { expected: usize, actual: usize },

    #[error("invalid intensity window: min {min}, width {width} (width must be finite and > 0)")]
    InvalidWindow { min: f32, width: f32 },

    #[error("layer {layer} is outside the volume depth {depth}")]
    LayerOutOfRange { layer: u32, depth: u32 },
}

/// Failures while decoding a volume blob.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("volume header needs 12 bytes, blob has {len}")]
    TruncatedHeader { len: usize },

    #[error("volume blob holds {actual} sample bytes, {expected} required")]
    TruncatedSamples { expected: usize, actual: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("could not read volume file: {0}")]
    Io(#[from] std::io::Error),
}
