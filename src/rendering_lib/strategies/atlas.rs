// src/rendering_lib/strategies/atlas.rs

use std::ops::Range;

use super::{build_with_rollback, expand_shades, GpuResources, RenderStrategy, StrategyKind};
use crate::rendering_lib::backend::{
    BlendMode, BufferId, BufferKind, DrawCommand, Geometry, GpuBackend, ProgramDescriptor, ProgramId, TexelFormat,
    TextureDescriptor, TextureDimension, TextureId, Topology,
};
use crate::rendering_lib::error::ResourceError;
use crate::rendering_lib::settings::AtlasSettings;
use crate::rendering_lib::shader::ATLAS_SHADER_SOURCE;
use crate::rendering_lib::vertex::SliceVertex;
use crate::volume_lib::{ConfigureOutcome, Dimensions, RendererState};

/// Offset between consecutive slices, spread over this much of clip space.
const STACK_SPREAD: f32 = 0.4;
const SLICE_EXTENT: f32 = 1.2;

/// Pseudo-3D view: a window of adjacent layers tiled vertically into one
/// 2D atlas, drawn as offset translucent quads from deepest to shallowest.
pub struct AtlasPseudo3D {
    settings: AtlasSettings,
    resources: GpuResources,
    program: ProgramId,
    vertex_buffer: BufferId,
    texture: Option<(TextureId, AtlasLayout)>,
    texels: Vec<u8>,
}

/// Size and position of the layer window held by the atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AtlasLayout {
    pub width: u32,
    pub layer_height: u32,
    /// First volume layer in the atlas.
    pub first_layer: u32,
    /// Number of layers in the atlas.
    pub layers: u32,
}

impl AtlasLayout {
    /// Window of `min(visible, z)` layers starting at `selected`, pulled
    /// back so it never runs past the last layer.
    pub fn new(dims: Dimensions, selected: u32, visible: u32) -> Self {
        let layers = visible.clamp(1, dims.z);
        let first_layer = selected.min(dims.z - layers);
        Self { width: dims.x, layer_height: dims.y, first_layer, layers }
    }

    pub fn height(&self) -> u32 {
        self.layer_height * self.layers
    }

    pub fn layer_range(&self) -> Range<u32> {
        self.first_layer..self.first_layer + self.layers
    }

    fn same_texture_size(&self, other: &AtlasLayout) -> bool {
        self.width == other.width && self.height() == other.height()
    }
}

impl AtlasPseudo3D {
    pub fn new(gpu: &mut dyn GpuBackend, settings: AtlasSettings) -> Result<Self, ResourceError> {
        let label = format!("{} Program", StrategyKind::AtlasPseudo3D.name());
        let ((program, vertex_buffer), resources) = build_with_rollback(gpu, |gpu, res| {
            let vertex_buffer = res.buffer(gpu, "Atlas Slice Vertex Buffer", BufferKind::Vertex)?;
            let program = res.program(
                gpu,
                &ProgramDescriptor {
                    label: &label,
                    source: ATLAS_SHADER_SOURCE,
                    vertex_layout: SliceVertex::layout(),
                    topology: Topology::TriangleList,
                    blend: BlendMode::Alpha,
                    uniform_size: 0,
                    texture: Some(TextureDimension::D2),
                },
            )?;
            Ok((program, vertex_buffer))
        })?;

        Ok(Self { settings, resources, program, vertex_buffer, texture: None, texels: Vec::new() })
    }

    fn ensure_texture(&mut self, gpu: &mut dyn GpuBackend, layout: AtlasLayout) -> Result<TextureId, ResourceError> {
        if let Some((id, current)) = self.texture {
            if current.same_texture_size(&layout) {
                if current.layers != layout.layers {
                    gpu.write_buffer(self.vertex_buffer, bytemuck::cast_slice(&slice_stack(layout.layers)))?;
                }
                self.texture = Some((id, layout));
                return Ok(id);
            }
            self.resources.release_texture(gpu, id);
            self.texture = None;
        }

        let id = self.resources.texture(
            gpu,
            &TextureDescriptor {
                label: "Layer Atlas".to_owned(),
                dimension: TextureDimension::D2,
                width: layout.width,
                height: layout.height(),
                depth: 1,
                format: TexelFormat::Rgba8,
            },
        )?;
        gpu.write_buffer(self.vertex_buffer, bytemuck::cast_slice(&slice_stack(layout.layers)))?;
        self.texture = Some((id, layout));
        log::debug!("Atlas: {} layers in a {}x{} texture", layout.layers, layout.width, layout.height());
        Ok(id)
    }
}

/// Six vertices per layer, deepest layer first so alpha blending composes
/// back to front. Layer `i` samples band `[i / k, (i + 1) / k)` of the atlas.
pub fn slice_stack(layers: u32) -> Vec<SliceVertex> {
    let mut vertices = Vec::with_capacity(layers as usize * 6);
    let step = STACK_SPREAD / layers as f32;
    for i in (0..layers).rev() {
        let offset = i as f32 * step;
        let (x0, y0) = (-0.8 + offset, -0.8 + offset);
        let (x1, y1) = (x0 + SLICE_EXTENT, y0 + SLICE_EXTENT);
        let v_top = i as f32 / layers as f32;
        let v_bottom = (i + 1) as f32 / layers as f32;
        let corner = |x: f32, y: f32, u: f32, v: f32| SliceVertex::new([x, y, 0.5], [u, v, 0.0]);

        vertices.push(corner(x0, y1, 0.0, v_top));
        vertices.push(corner(x1, y1, 1.0, v_top));
        vertices.push(corner(x0, y0, 0.0, v_bottom));
        vertices.push(corner(x0, y0, 0.0, v_bottom));
        vertices.push(corner(x1, y1, 1.0, v_top));
        vertices.push(corner(x1, y0, 1.0, v_bottom));
    }
    vertices
}

impl RenderStrategy for AtlasPseudo3D {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AtlasPseudo3D
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
        let dims = state.volume().dims();
        let layout = AtlasLayout::new(dims, state.config().layer, self.settings.visible_layers);
        let texture = self.ensure_texture(gpu, layout)?;

        let layer_len = dims.layer_len();
        let start = layout.first_layer as usize * layer_len;
        let end = start + layout.layers as usize * layer_len;
        expand_shades(&state.cache().shades()[start..end], 4, Some(self.settings.slice_alpha), &mut self.texels);
        gpu.write_texture(texture, &self.texels)
    }

    fn render(&mut self, gpu: &mut dyn GpuBackend, _state: &RendererState) -> Result<(), ResourceError> {
        let Some((texture, layout)) = self.texture else {
            return Ok(());
        };
        gpu.draw(&DrawCommand {
            program: self.program,
            vertex_buffer: self.vertex_buffer,
            geometry: Geometry::Arrays { vertices: 0..layout.layers * 6 },
            texture: Some(texture),
            uniforms: &[],
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
    use crate::volume_lib::Configuration;

    #[test]
    fn window_is_capped_and_clamped() {
        let dims = Dimensions::new(4, 4, 10);
        assert_eq!(AtlasLayout::new(dims, 2, 3).layer_range(), 2..5);
        assert_eq!(AtlasLayout::new(dims, 9, 3).layer_range(), 7..10);
        assert_eq!(AtlasLayout::new(dims, 5, 32).layer_range(), 0..10);
        assert_eq!(AtlasLayout::new(dims, 5, 0).layers, 1);
    }

    #[test]
    fn stack_is_back_to_front() {
        let stack = slice_stack(4);
        assert_eq!(stack.len(), 24);
        // First quad samples the deepest band.
        assert_eq!(stack[0].tex_coord[1], 0.75);
        assert_eq!(stack[23].tex_coord[1], 0.25);
    }

    #[test]
    fn atlas_tiles_visible_layers_with_alpha() {
        let mut gpu = HeadlessBackend::new(8, 8);
        let settings = AtlasSettings { visible_layers: 2, slice_alpha: 77 };
        let mut renderer = Renderer::new(Box::new(AtlasPseudo3D::new(&mut gpu, settings).unwrap()));
        let volume = ramp_volume(2, 1, 4);
        renderer.configure(&mut gpu, volume, Configuration::new(1, 0.0, 255.0)).unwrap();
        renderer.render(&mut gpu).unwrap();

        let draw = &gpu.pending_frame().draws[0];
        assert_eq!(draw.element_count(), 12);
        let texture = draw.texture.unwrap();
        let descriptor = gpu.texture_descriptor(texture).unwrap();
        assert_eq!((descriptor.width, descriptor.height), (2, 2));
        // Layers 1 and 2 of the ramp: samples 2, 3, 4, 5.
        assert_eq!(
            gpu.texture_data(texture).unwrap(),
            &[2, 2, 2, 77, 3, 3, 3, 77, 4, 4, 4, 77, 5, 5, 5, 77]
        );
    }

    #[test]
    fn layer_change_moves_window() {
        let mut gpu = HeadlessBackend::new(8, 8);
        let settings = AtlasSettings { visible_layers: 1, slice_alpha: 255 };
        let mut renderer = Renderer::new(Box::new(AtlasPseudo3D::new(&mut gpu, settings).unwrap()));
        let volume = scenario_volume();
        renderer.configure(&mut gpu, volume.clone(), window(0)).unwrap();
        let outcome = renderer.configure(&mut gpu, volume, window(1)).unwrap();
        assert!(outcome.refreshed);
        renderer.render(&mut gpu).unwrap();
        let texture = gpu.pending_frame().draws[0].texture.unwrap();
        assert!(gpu.texture_data(texture).unwrap().iter().all(|t| *t == 255));
        assert_eq!(gpu.counters().textures_created, 1);
    }
}
