// src/rendering_lib/strategies/texture_3d.rs

use bytemuck::{Pod, Zeroable};

use super::{build_with_rollback, expand_shades, GpuResources, RenderStrategy, StrategyKind};
use crate::rendering_lib::backend::{
    BlendMode, BufferId, BufferKind, DrawCommand, Geometry, GpuBackend, ProgramDescriptor, ProgramId, TexelFormat,
    TextureDescriptor, TextureDimension, TextureId, Topology,
};
use crate::rendering_lib::camera::Camera;
use crate::rendering_lib::error::ResourceError;
use crate::rendering_lib::settings::VolumeViewSettings;
use crate::rendering_lib::shader::VOLUME_SHADER_SOURCE;
use crate::rendering_lib::vertex::SliceVertex;
use crate::volume_lib::{ConfigureOutcome, Dimensions, RendererState};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct VolumeTransformsUniform {
    pub projection: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub tex_projection: [[f32; 4]; 4],
}

/// The whole volume in one 3D texture, cut by a stack of cross-section
/// quads. The cache is uploaded only on refresh; the selected layer picks
/// which cross-sections are drawn, so layer changes cost nothing here.
pub struct Texture3D {
    settings: VolumeViewSettings,
    camera: Camera,
    resources: GpuResources,
    program: ProgramId,
    vertex_buffer: BufferId,
    texture: Option<(TextureId, Dimensions)>,
    texels: Vec<u8>,
}

impl Texture3D {
    pub fn new(gpu: &mut dyn GpuBackend, settings: VolumeViewSettings) -> Result<Self, ResourceError> {
        let label = format!("{} Program", StrategyKind::Texture3D.name());
        let ((program, vertex_buffer), resources) = build_with_rollback(gpu, |gpu, res| {
            let vertex_buffer = res.buffer(gpu, "Cross-section Vertex Buffer", BufferKind::Vertex)?;
            let program = res.program(
                gpu,
                &ProgramDescriptor {
                    label: &label,
                    source: VOLUME_SHADER_SOURCE,
                    vertex_layout: SliceVertex::layout(),
                    topology: Topology::TriangleList,
                    blend: BlendMode::Alpha,
                    uniform_size: std::mem::size_of::<VolumeTransformsUniform>() as u64,
                    texture: Some(TextureDimension::D3),
                },
            )?;
            Ok((program, vertex_buffer))
        })?;

        Ok(Self {
            settings,
            camera: Camera::new(&settings),
            resources,
            program,
            vertex_buffer,
            texture: None,
            texels: Vec::new(),
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    fn ensure_texture(&mut self, gpu: &mut dyn GpuBackend, dims: Dimensions) -> Result<TextureId, ResourceError> {
        if let Some((id, current)) = self.texture {
            if current == dims {
                return Ok(id);
            }
            self.resources.release_texture(gpu, id);
            self.texture = None;
        }

        let id = self.resources.texture(
            gpu,
            &TextureDescriptor {
                label: "Volume Texture".to_owned(),
                dimension: TextureDimension::D3,
                width: dims.x,
                height: dims.y,
                depth: dims.z,
                format: TexelFormat::Rgba8,
            },
        )?;
        gpu.write_buffer(self.vertex_buffer, bytemuck::cast_slice(&cross_sections(dims.z)))?;
        self.texture = Some((id, dims));
        log::debug!("Texture3D: volume texture {}x{}x{} allocated", dims.x, dims.y, dims.z);
        Ok(id)
    }
}

/// One quad per layer in a unit cube centred on the origin, layer 0 nearest
/// the camera. Quads are stored deepest first, so the first `z - layer`
/// quads are exactly the layers `layer..z` in back-to-front order.
pub fn cross_sections(depth: u32) -> Vec<SliceVertex> {
    let mut vertices = Vec::with_capacity(depth as usize * 6);
    for layer in (0..depth).rev() {
        let w = (layer as f32 + 0.5) / depth as f32;
        let z = 0.5 - w;
        let corner = |x: f32, y: f32, u: f32, v: f32| SliceVertex::new([x, y, z], [u, v, w]);

        vertices.push(corner(-0.5, 0.5, 0.0, 0.0));
        vertices.push(corner(0.5, 0.5, 1.0, 0.0));
        vertices.push(corner(-0.5, -0.5, 0.0, 1.0));
        vertices.push(corner(-0.5, -0.5, 0.0, 1.0));
        vertices.push(corner(0.5, 0.5, 1.0, 0.0));
        vertices.push(corner(0.5, -0.5, 1.0, 1.0));
    }
    vertices
}

impl RenderStrategy for Texture3D {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Texture3D
    }

    fn sync(
        &mut self,
        gpu: &mut dyn GpuBackend,
        state: &RendererState,
        outcome: &ConfigureOutcome,
    ) -> Result<(), ResourceError> {
        if !outcome.refreshed {
            return Ok(());
        }
        let texture = self.ensure_texture(gpu, state.volume().dims())?;
        expand_shades(state.cache().shades(), 4, None, &mut self.texels);
        gpu.write_texture(texture, &self.texels)
    }

    fn render(&mut self, gpu: &mut dyn GpuBackend, state: &RendererState) -> Result<(), ResourceError> {
        let Some((texture, dims)) = self.texture else {
            return Ok(());
        };

        self.camera.rotate(self.settings.rotation_per_frame);
        let uniform = VolumeTransformsUniform {
            projection: self.camera.projection_matrix(gpu.viewport()).to_cols_array_2d(),
            model: self.camera.view_matrix().to_cols_array_2d(),
            tex_projection: self.camera.texture_matrix().to_cols_array_2d(),
        };

        let visible = dims.z - state.config().layer;
        gpu.draw(&DrawCommand {
            program: self.program,
            vertex_buffer: self.vertex_buffer,
            geometry: Geometry::Arrays { vertices: 0..visible * 6 },
            texture: Some(texture),
            uniforms: bytemuck::bytes_of(&uniform),
        })
    }

    fn dispose(&mut self, gpu: &mut dyn GpuBackend) {
        self.resources.release_all(gpu);
        self.texture = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering_lib::headless::HeadlessBackend;
    use crate::rendering_lib::strategies::test_support::*;
    use crate::rendering_lib::strategies::Renderer;

    #[test]
    fn cross_sections_run_back_to_front() {
        let quads = cross_sections(4);
        assert_eq!(quads.len(), 24);
        assert!(quads[0].position[2] < quads[23].position[2]);
        assert_eq!(quads[0].tex_coord[2], 0.875);
        assert_eq!(quads[23].tex_coord[2], 0.125);
    }

    #[test]
    fn uploads_whole_volume_with_shade_alpha() {
        let mut gpu = HeadlessBackend::new(8, 8);
        let mut renderer = Renderer::new(Box::new(Texture3D::new(&mut gpu, VolumeViewSettings::default()).unwrap()));
        renderer.configure(&mut gpu, scenario_volume(), window(0)).unwrap();
        renderer.render(&mut gpu).unwrap();

        let texture = gpu.pending_frame().draws[0].texture.unwrap();
        let data = gpu.texture_data(texture).unwrap();
        assert_eq!(data.len(), 8 * 4);
        assert_eq!(&data[4..8], &[128, 128, 128, 128]);
        assert_eq!(gpu.texture_descriptor(texture).unwrap().depth, 2);
    }

    #[test]
    fn layer_selects_cross_sections_without_upload() {
        let mut gpu = HeadlessBackend::new(8, 8);
        let mut renderer = Renderer::new(Box::new(Texture3D::new(&mut gpu, VolumeViewSettings::default()).unwrap()));
        let volume = ramp_volume(3, 3, 6);

        renderer.configure(&mut gpu, volume.clone(), window(0)).unwrap();
        renderer.render(&mut gpu).unwrap();
        let texture = gpu.pending_frame().draws[0].texture.unwrap();
        assert_eq!(gpu.pending_frame().draws[0].element_count(), 36);

        let outcome = renderer.configure(&mut gpu, volume, window(4)).unwrap();
        assert!(!outcome.refreshed);
        renderer.render(&mut gpu).unwrap();
        assert_eq!(gpu.pending_frame().draws[1].element_count(), 12);
        assert_eq!(gpu.texture_uploads(texture), 1);
    }

    #[test]
    fn rotation_advances_each_render() {
        let mut gpu = HeadlessBackend::new(8, 8);
        let settings = VolumeViewSettings { rotation_per_frame: 0.25, ..Default::default() };
        let mut strategy = Texture3D::new(&mut gpu, settings).unwrap();
        let state = crate::volume_lib::RendererState::new(scenario_volume(), window(0)).unwrap();
        let outcome = ConfigureOutcome { refreshed: true, volume_changed: true, changed: Vec::new() };
        strategy.sync(&mut gpu, &state, &outcome).unwrap();

        strategy.render(&mut gpu, &state).unwrap();
        strategy.render(&mut gpu, &state).unwrap();
        assert!((strategy.camera().yaw() - 0.5).abs() < 1e-6);
        let draws = &gpu.pending_frame().draws;
        assert_ne!(draws[0].uniforms, draws[1].uniforms);
    }

    #[test]
    fn oversized_volume_fails_to_allocate() {
        let mut gpu = HeadlessBackend::new(8, 8);
        gpu.set_max_texture_dimension(4);
        let mut renderer = Renderer::new(Box::new(Texture3D::new(&mut gpu, VolumeViewSettings::default()).unwrap()));
        let err = renderer.configure(&mut gpu, ramp_volume(2, 2, 5), window(0)).unwrap_err();
        assert!(matches!(
            err,
            crate::rendering_lib::error::RenderError::Resource(ResourceError::TextureAllocation { .. })
        ));
        assert!(renderer.state().is_none());
    }
}
