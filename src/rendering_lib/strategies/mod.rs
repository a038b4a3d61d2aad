// src/rendering_lib/strategies/mod.rs

pub mod atlas;
pub mod mesh_quads;
pub mod mesh_strip;
pub mod texture_2d;
pub mod texture_3d;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use super::backend::{BufferId, BufferKind, GpuBackend, ProgramDescriptor, ProgramId, TextureDescriptor, TextureId};
use super::error::{RenderError, ResourceError};
use super::settings::RendererSettings;
use crate::volume_lib::{Configuration, ConfigureOutcome, Dimensions, RendererState, TriggerSet, Volume};

pub use atlas::AtlasPseudo3D;
pub use mesh_quads::MeshQuads;
pub use mesh_strip::MeshTriangleStrip;
pub use texture_2d::Texture2D;
pub use texture_3d::Texture3D;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    MeshQuads,
    MeshTriangleStrip,
    Texture2D,
    AtlasPseudo3D,
    Texture3D,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::MeshQuads,
        StrategyKind::MeshTriangleStrip,
        StrategyKind::Texture2D,
        StrategyKind::AtlasPseudo3D,
        StrategyKind::Texture3D,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::MeshQuads => "Quads (Triangles)",
            StrategyKind::MeshTriangleStrip => "Quad Strip (Triangle Strip)",
            StrategyKind::Texture2D => "Texture",
            StrategyKind::AtlasPseudo3D => "3D (2D Atlas)",
            StrategyKind::Texture3D => "3D (3D Texture)",
        }
    }

    /// Configuration fields whose change forces this strategy to re-window.
    pub fn triggers(&self) -> TriggerSet {
        match self {
            StrategyKind::MeshQuads | StrategyKind::MeshTriangleStrip | StrategyKind::Texture3D => TriggerSet::WINDOW,
            StrategyKind::Texture2D | StrategyKind::AtlasPseudo3D => TriggerSet::WINDOW_AND_LAYER,
        }
    }

    /// Builds the strategy's programs and buffers. Nothing is left allocated on failure.
    pub fn create(
        &self,
        gpu: &mut dyn GpuBackend,
        settings: &RendererSettings,
    ) -> Result<Box<dyn RenderStrategy>, ResourceError> {
        Ok(match self {
            StrategyKind::MeshQuads => Box::new(MeshQuads::new(gpu)?),
            StrategyKind::MeshTriangleStrip => Box::new(MeshTriangleStrip::new(gpu)?),
            StrategyKind::Texture2D => Box::new(Texture2D::new(gpu)?),
            StrategyKind::AtlasPseudo3D => Box::new(AtlasPseudo3D::new(gpu, settings.atlas)?),
            StrategyKind::Texture3D => Box::new(Texture3D::new(gpu, settings.volume)?),
        })
    }
}

/// One way of turning a configured volume into draw calls.
///
/// Implementations own their GPU resources. `sync` runs after every
/// configure with what changed, `render` reads the state without mutating
/// it, and `dispose` hands every resource back to the backend.
pub trait RenderStrategy {
    fn kind(&self) -> StrategyKind;

    fn sync(
        &mut self,
        gpu: &mut dyn GpuBackend,
        state: &RendererState,
        outcome: &ConfigureOutcome,
    ) -> Result<(), ResourceError>;

    fn render(&mut self, gpu: &mut dyn GpuBackend, state: &RendererState) -> Result<(), ResourceError>;

    fn dispose(&mut self, gpu: &mut dyn GpuBackend);
}

/// A strategy together with the state it renders from.
pub struct Renderer {
    strategy: Box<dyn RenderStrategy>,
    state: Option<RendererState>,
    disposed: bool,
}

impl Renderer {
    pub fn new(strategy: Box<dyn RenderStrategy>) -> Self {
        Self { strategy, state: None, disposed: false }
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn state(&self) -> Option<&RendererState> {
        self.state.as_ref()
    }

    pub fn configure(
        &mut self,
        gpu: &mut dyn GpuBackend,
        volume: Arc<Volume>,
        config: Configuration,
    ) -> Result<ConfigureOutcome, RenderError> {
        let triggers = self.kind().triggers();
        let outcome = RendererState::configure_slot(&mut self.state, volume, config, triggers)?;
        if let Some(state) = &self.state {
            if let Err(e) = self.strategy.sync(gpu, state, &outcome) {
                // Start over on the next configure rather than keep a cache the GPU never saw.
                self.state = None;
                return Err(e.into());
            }
        }
        Ok(outcome)
    }

    pub fn render(&mut self, gpu: &mut dyn GpuBackend) -> Result<(), RenderError> {
        let state = self.state.as_ref().ok_or(RenderError::NotConfigured)?;
        self.strategy.render(gpu, state)?;
        Ok(())
    }

    /// Releases the strategy's resources. Later calls do nothing.
    pub fn dispose(&mut self, gpu: &mut dyn GpuBackend) {
        if self.disposed {
            return;
        }
        self.strategy.dispose(gpu);
        self.state = None;
        self.disposed = true;
        log::debug!("Disposed {:?} renderer", self.kind());
    }
}

/// Every GPU object a strategy created, so they can be released together.
#[derive(Debug, Default)]
pub struct GpuResources {
    programs: Vec<ProgramId>,
    buffers: Vec<BufferId>,
    textures: Vec<TextureId>,
}

impl GpuResources {
    pub fn program(
        &mut self,
        gpu: &mut dyn GpuBackend,
        descriptor: &ProgramDescriptor,
    ) -> Result<ProgramId, ResourceError> {
        let id = gpu.create_program(descriptor).map_err(|e| {
            log::error!("Program '{}' failed: {}", descriptor.label, e);
            e
        })?;
        self.programs.push(id);
        Ok(id)
    }

    pub fn buffer(&mut self, gpu: &mut dyn GpuBackend, label: &str, kind: BufferKind) -> Result<BufferId, ResourceError> {
        let id = gpu.create_buffer(label, kind)?;
        self.buffers.push(id);
        Ok(id)
    }

    pub fn texture(
        &mut self,
        gpu: &mut dyn GpuBackend,
        descriptor: &TextureDescriptor,
    ) -> Result<TextureId, ResourceError> {
        let id = gpu.create_texture(descriptor)?;
        self.textures.push(id);
        Ok(id)
    }

    /// Releases a single texture ahead of the rest, e.g. when it is resized.
    pub fn release_texture(&mut self, gpu: &mut dyn GpuBackend, id: TextureId) {
        if let Some(pos) = self.textures.iter().position(|t| *t == id) {
            self.textures.swap_remove(pos);
            gpu.release_texture(id);
        }
    }

    pub fn release_all(&mut self, gpu: &mut dyn GpuBackend) {
        for id in self.textures.drain(..) {
            gpu.release_texture(id);
        }
        for id in self.buffers.drain(..) {
            gpu.release_buffer(id);
        }
        for id in self.programs.drain(..) {
            gpu.release_program(id);
        }
    }
}

/// Runs `build`, releasing whatever it created if it fails.
pub(crate) fn build_with_rollback<T>(
    gpu: &mut dyn GpuBackend,
    build: impl FnOnce(&mut dyn GpuBackend, &mut GpuResources) -> Result<T, ResourceError>,
) -> Result<(T, GpuResources), ResourceError> {
    let mut resources = GpuResources::default();
    match build(gpu, &mut resources) {
        Ok(value) => Ok((value, resources)),
        Err(e) => {
            resources.release_all(gpu);
            Err(e)
        }
    }
}

/// Grid size uniform shared by the 2D strategies.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct GridDimensionsUniform {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

impl GridDimensionsUniform {
    pub(crate) fn new(dims: Dimensions) -> Self {
        Self { width: dims.x as f32, height: dims.y as f32, _padding1: 0.0, _padding2: 0.0 }
    }
}

/// Expands grey shades to texels, writing `alpha` or the shade itself into a fourth channel.
pub(crate) fn expand_shades(shades: &[u8], channels: usize, alpha: Option<u8>, out: &mut Vec<u8>) {
    out.clear();
    out.reserve(shades.len() * channels);
    for &shade in shades {
        out.extend_from_slice(&[shade, shade, shade]);
        if channels == 4 {
            out.push(alpha.unwrap_or(shade));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::rendering_lib::headless::HeadlessBackend;

    #[test]
    fn failed_creation_releases_partial_resources() {
        for kind in StrategyKind::ALL {
            let mut gpu = HeadlessBackend::new(64, 64);
            // Every strategy creates its buffers before its program.
            gpu.fail_program(&format!("{} Program", kind.name()));
            let result = kind.create(&mut gpu, &RendererSettings::default());
            assert!(matches!(result, Err(ResourceError::ShaderCompilation { .. })), "{kind:?}");
            assert_eq!(gpu.live_resources(), 0, "{kind:?} leaked resources");
            assert_eq!(gpu.counters().invalid_releases, 0);
        }
    }

    #[test]
    fn dispose_releases_everything_once() {
        for kind in StrategyKind::ALL {
            let mut gpu = HeadlessBackend::new(64, 64);
            let mut renderer = Renderer::new(kind.create(&mut gpu, &RendererSettings::default()).unwrap());
            renderer.configure(&mut gpu, ramp_volume(4, 3, 5), window(1)).unwrap();
            renderer.render(&mut gpu).unwrap();
            renderer.dispose(&mut gpu);
            renderer.dispose(&mut gpu);
            assert_eq!(gpu.live_resources(), 0, "{kind:?}");
            assert_eq!(gpu.counters().invalid_releases, 0, "{kind:?}");
        }
    }

    #[test]
    fn render_before_configure_is_an_error() {
        let mut gpu = HeadlessBackend::new(64, 64);
        let mut renderer = Renderer::new(StrategyKind::MeshQuads.create(&mut gpu, &RendererSettings::default()).unwrap());
        assert_eq!(renderer.render(&mut gpu), Err(RenderError::NotConfigured));
    }

    #[test]
    fn trigger_sets_per_strategy() {
        use crate::volume_lib::ConfigField;
        assert!(!StrategyKind::MeshQuads.triggers().contains(ConfigField::Layer));
        assert!(!StrategyKind::MeshTriangleStrip.triggers().contains(ConfigField::Layer));
        assert!(!StrategyKind::Texture3D.triggers().contains(ConfigField::Layer));
        assert!(StrategyKind::Texture2D.triggers().contains(ConfigField::Layer));
        assert!(StrategyKind::AtlasPseudo3D.triggers().contains(ConfigField::Layer));
    }

    #[test]
    fn expand_shades_layouts() {
        let mut out = Vec::new();
        expand_shades(&[1, 2], 3, None, &mut out);
        assert_eq!(out, vec![1, 1, 1, 2, 2, 2]);
        expand_shades(&[9], 4, Some(128), &mut out);
        assert_eq!(out, vec![9, 9, 9, 128]);
        expand_shades(&[9], 4, None, &mut out);
        assert_eq!(out, vec![9, 9, 9, 9]);
    }
}
