// src/rendering_lib/strategies/texture_2d.rs

use super::{build_with_rollback, expand_shades, GpuResources, GridDimensionsUniform, RenderStrategy, StrategyKind};
use crate::rendering_lib::backend::{
    BlendMode, BufferId, BufferKind, DrawCommand, Geometry, GpuBackend, ProgramDescriptor, ProgramId, TexelFormat,
    TextureDescriptor, TextureDimension, TextureId, Topology,
};
use crate::rendering_lib::error::ResourceError;
use crate::rendering_lib::shader::TEXTURE_SHADER_SOURCE;
use crate::rendering_lib::vertex::TexturedVertex;
use crate::volume_lib::{ConfigureOutcome, Dimensions, RendererState};

/// A fixed quad textured with the selected layer. The texture is
/// re-uploaded only when the cache is refreshed.
pub struct Texture2D {
    resources: GpuResources,
    program: ProgramId,
    vertex_buffer: BufferId,
    texture: Option<(TextureId, Dimensions)>,
    texels: Vec<u8>,
}

impl Texture2D {
    pub fn new(gpu: &mut dyn GpuBackend) -> Result<Self, ResourceError> {
        let label = format!("{} Program", StrategyKind::Texture2D.name());
        let ((program, vertex_buffer), resources) = build_with_rollback(gpu, |gpu, res| {
            let vertex_buffer = res.buffer(gpu, "Slice Quad Vertex Buffer", BufferKind::Vertex)?;
            let program = res.program(
                gpu,
                &ProgramDescriptor {
                    label: &label,
                    source: TEXTURE_SHADER_SOURCE,
                    vertex_layout: TexturedVertex::layout(),
                    topology: Topology::TriangleList,
                    blend: BlendMode::Opaque,
                    uniform_size: std::mem::size_of::<GridDimensionsUniform>() as u64,
                    texture: Some(TextureDimension::D2),
                },
            )?;
            Ok((program, vertex_buffer))
        })?;

        Ok(Self { resources, program, vertex_buffer, texture: None, texels: Vec::new() })
    }

    /// Recreates the texture and quad when the grid size changes.
    fn ensure_layout(&mut self, gpu: &mut dyn GpuBackend, dims: Dimensions) -> Result<TextureId, ResourceError> {
        if let Some((id, current)) = self.texture {
            if current.x == dims.x && current.y == dims.y {
                return Ok(id);
            }
            self.resources.release_texture(gpu, id);
            self.texture = None;
        }

        let id = self.resources.texture(
            gpu,
            &TextureDescriptor {
                label: "Slice Texture".to_owned(),
                dimension: TextureDimension::D2,
                width: dims.x,
                height: dims.y,
                depth: 1,
                format: TexelFormat::Rgb8,
            },
        )?;
        self.texture = Some((id, dims));
        gpu.write_buffer(self.vertex_buffer, bytemuck::cast_slice(&slice_quad(dims)))?;
        log::debug!("Texture2D: slice texture {}x{} allocated", dims.x, dims.y);
        Ok(id)
    }
}

/// Two triangles covering the grid, texture v running with grid y.
pub fn slice_quad(dims: Dimensions) -> [TexturedVertex; 6] {
    let (w, h) = (dims.x as f32, dims.y as f32);
    [
        TexturedVertex::new([0.0, 0.0], [0.0, 0.0]),
        TexturedVertex::new([w, 0.0], [1.0, 0.0]),
        TexturedVertex::new([0.0, h], [0.0, 1.0]),
        TexturedVertex::new([0.0, h], [0.0, 1.0]),
        TexturedVertex::new([w, 0.0], [1.0, 0.0]),
        TexturedVertex::new([w, h], [1.0, 1.0]),
    ]
}

impl RenderStrategy for Texture2D {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Texture2D
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
        let texture = self.ensure_layout(gpu, state.volume().dims())?;
        expand_shades(state.selected_layer(), 3, None, &mut self.texels);
        gpu.write_texture(texture, &self.texels)
    }

    fn render(&mut self, gpu: &mut dyn GpuBackend, state: &RendererState) -> Result<(), ResourceError> {
        let Some((texture, _)) = self.texture else {
            return Ok(());
        };
        let uniform = GridDimensionsUniform::new(state.volume().dims());
        gpu.draw(&DrawCommand {
            program: self.program,
            vertex_buffer: self.vertex_buffer,
            geometry: Geometry::Arrays { vertices: 0..6 },
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

    fn renderer(gpu: &mut HeadlessBackend) -> Renderer {
        Renderer::new(Box::new(Texture2D::new(gpu).unwrap()))
    }

    #[test]
    fn uploads_selected_layer_as_rgb() {
        let mut gpu = HeadlessBackend::new(8, 8);
        let mut renderer = renderer(&mut gpu);
        renderer.configure(&mut gpu, scenario_volume(), window(0)).unwrap();
        renderer.render(&mut gpu).unwrap();

        let texture = gpu.pending_frame().draws[0].texture.unwrap();
        assert_eq!(gpu.texture_data(texture).unwrap(), &[0, 0, 0, 128, 128, 128, 255, 255, 255, 255, 255, 255]);
        assert_eq!(gpu.texture_descriptor(texture).unwrap().format, TexelFormat::Rgb8);
    }

    #[test]
    fn layer_change_reuploads_without_rebuilding_geometry() {
        let mut gpu = HeadlessBackend::new(8, 8);
        let mut renderer = renderer(&mut gpu);
        let volume = scenario_volume();
        renderer.configure(&mut gpu, volume.clone(), window(0)).unwrap();
        renderer.render(&mut gpu).unwrap();
        let texture = gpu.pending_frame().draws[0].texture.unwrap();
        let created = gpu.counters().textures_created;

        let outcome = renderer.configure(&mut gpu, volume.clone(), window(1)).unwrap();
        assert!(outcome.refreshed);
        assert_eq!(gpu.texture_uploads(texture), 2);
        assert_eq!(gpu.counters().textures_created, created);
        assert!(gpu.texture_data(texture).unwrap().iter().all(|t| *t == 255));

        // Nothing changed: no upload.
        renderer.configure(&mut gpu, volume, window(1)).unwrap();
        assert_eq!(gpu.texture_uploads(texture), 2);
    }

    #[test]
    fn new_grid_size_replaces_texture() {
        let mut gpu = HeadlessBackend::new(8, 8);
        let mut renderer = renderer(&mut gpu);
        renderer.configure(&mut gpu, ramp_volume(2, 2, 1), window(0)).unwrap();
        renderer.configure(&mut gpu, ramp_volume(3, 2, 1), window(0)).unwrap();
        let counters = gpu.counters();
        assert_eq!(counters.textures_created, 2);
        assert_eq!(counters.textures_released, 1);
    }

    #[test]
    fn quad_covers_grid() {
        let quad = slice_quad(Dimensions::new(4, 3, 1));
        assert_eq!(quad[5], TexturedVertex::new([4.0, 3.0], [1.0, 1.0]));
    }
}
