// src/rendering_lib/mod.rs

pub mod backend;
pub mod camera;
pub mod context;
pub mod error;
pub mod headless;
pub mod settings;
pub mod shader;
pub mod strategies;
pub mod vertex;
pub mod wgpu_backend;

pub use backend::GpuBackend;
pub use context::RenderingContext;
pub use error::{RenderError, ResourceError};
pub use headless::HeadlessBackend;
pub use settings::{AtlasSettings, RendererSettings, VolumeViewSettings};
pub use strategies::{RenderStrategy, StrategyKind};
pub use wgpu_backend::WgpuBackend;
