// src/rendering_lib/strategies/mesh_quads.rs

use super::{build_with_rollback, GpuResources, GridDimensionsUniform, RenderStrategy, StrategyKind};
use crate::rendering_lib::backend::{
    BlendMode, BufferId, BufferKind, DrawCommand, Geometry, GpuBackend, ProgramDescriptor, ProgramId, Topology,
};
use crate::rendering_lib::error::ResourceError;
use crate::rendering_lib::shader::MESH_SHADER_SOURCE;
use crate::rendering_lib::vertex::ShadedVertex;
use crate::volume_lib::{ConfigureOutcome, Dimensions, RendererState};

const QUAD_INDICES: [u32; 6] = [3, 2, 1, 3, 1, 0];

/// One independent quad per cell of the selected layer, shaded per corner.
/// Geometry is rebuilt on every render.
pub struct MeshQuads {
    resources: GpuResources,
    program: ProgramId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    vertices: Vec<ShadedVertex>,
    indices: Vec<u32>,
}

impl MeshQuads {
    pub fn new(gpu: &mut dyn GpuBackend) -> Result<Self, ResourceError> {
        let label = format!("{} Program", StrategyKind::MeshQuads.name());
        let ((program, vertex_buffer, index_buffer), resources) = build_with_rollback(gpu, |gpu, res| {
            let vertex_buffer = res.buffer(gpu, "Quad Vertex Buffer", BufferKind::Vertex)?;
            let index_buffer = res.buffer(gpu, "Quad Index Buffer", BufferKind::Index)?;
            let program = res.program(
                gpu,
                &ProgramDescriptor {
                    label: &label,
                    source: MESH_SHADER_SOURCE,
                    vertex_layout: ShadedVertex::layout(),
                    topology: Topology::TriangleList,
                    blend: BlendMode::Opaque,
                    uniform_size: std::mem::size_of::<GridDimensionsUniform>() as u64,
                    texture: None,
                },
            )?;
            Ok((program, vertex_buffer, index_buffer))
        })?;

        Ok(Self { resources, program, vertex_buffer, index_buffer, vertices: Vec::new(), indices: Vec::new() })
    }
}

/// Emits a quad for each cell between four neighbouring samples:
/// `(x-1) * (y-1)` quads, 4 vertices and 6 indices each.
pub fn build_quads(dims: Dimensions, shades: &[u8], vertices: &mut Vec<ShadedVertex>, indices: &mut Vec<u32>) {
    vertices.clear();
    indices.clear();
    let cells = dims.x.saturating_sub(1) as usize * dims.y.saturating_sub(1) as usize;
    vertices.reserve(cells * 4);
    indices.reserve(cells * 6);

    let shade = |x: u32, y: u32| shades[(x + y * dims.x) as usize];
    for y in 0..dims.y.saturating_sub(1) {
        for x in 0..dims.x.saturating_sub(1) {
            let base = vertices.len() as u32;
            vertices.push(ShadedVertex::new(x, y, shade(x, y)));
            vertices.push(ShadedVertex::new(x, y + 1, shade(x, y + 1)));
            vertices.push(ShadedVertex::new(x + 1, y + 1, shade(x + 1, y + 1)));
            vertices.push(ShadedVertex::new(x + 1, y, shade(x + 1, y)));
            indices.extend(QUAD_INDICES.iter().map(|i| base + i));
        }
    }
}

impl RenderStrategy for MeshQuads {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeshQuads
    }

    fn sync(&mut self, _: &mut dyn GpuBackend, _: &RendererState, _: &ConfigureOutcome) -> Result<(), ResourceError> {
        Ok(())
    }

    fn render(&mut self, gpu: &mut dyn GpuBackend, state: &RendererState) -> Result<(), ResourceError> {
        let dims = state.volume().dims();
        build_quads(dims, state.selected_layer(), &mut self.vertices, &mut self.indices);
        if self.indices.is_empty() {
            return Ok(());
        }

        gpu.write_buffer(self.vertex_buffer, bytemuck::cast_slice(&self.vertices))?;
        gpu.write_buffer(self.index_buffer, bytemuck::cast_slice(&self.indices))?;

        let uniform = GridDimensionsUniform::new(dims);
        gpu.draw(&DrawCommand {
            program: self.program,
            vertex_buffer: self.vertex_buffer,
            geometry: Geometry::Indexed { index_buffer: self.index_buffer, indices: 0..self.indices.len() as u32 },
            texture: None,
            uniforms: bytemuck::bytes_of(&uniform),
        })
    }

    fn dispose(&mut self, gpu: &mut dyn GpuBackend) {
        self.resources.release_all(gpu);
    }
}
