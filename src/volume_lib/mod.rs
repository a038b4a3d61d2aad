// src/volume_lib/mod.rs

pub mod cache;
pub mod config;
pub mod error;
pub mod state;
pub mod transfer;
pub mod volume;

pub use cache::VolumeCache;
pub use config::{ConfigField, Configuration, TriggerSet};
pub use error::{ConfigError, LoadError};
pub use state::{ConfigureOutcome, RendererState};
pub use transfer::{map_sample, TransferFunction};
pub use volume::{Dimensions, Volume};
