// src/rendering_lib/strategies/mesh_strip.rs

use super::{build_with_rollback, GpuResources, GridDimensionsUniform, RenderStrategy, StrategyKind};
use crate::rendering_lib::backend::{
    BlendMode, BufferId, BufferKind, DrawCommand, Geometry, GpuBackend, ProgramDescriptor, ProgramId, Topology,
};
use crate::rendering_lib::error::ResourceError;
use crate::rendering_lib::shader::MESH_SHADER_SOURCE;
use crate::rendering_lib::vertex::ShadedVertex;
use crate::volume_lib::{ConfigureOutcome, Dimensions, RendererState};

/// The selected layer as a single triangle strip with shared vertices.
pub struct MeshTriangleStrip {
    resources: GpuResources,
    program: ProgramId,
    vertex_buffer: BufferId,
    vertices: Vec<ShadedVertex>,
}

impl MeshTriangleStrip {
    pub fn new(gpu: &mut dyn GpuBackend) -> Result<Self, ResourceError> {
        let label = format!("{} Program", StrategyKind::MeshTriangleStrip.name());
        let ((program, vertex_buffer), resources) = build_with_rollback(gpu, |gpu, res| {
            let vertex_buffer = res.buffer(gpu, "Strip Vertex Buffer", BufferKind::Vertex)?;
            let program = res.program(
                gpu,
                &ProgramDescriptor {
                    label: &label,
                    source: MESH_SHADER_SOURCE,
                    vertex_layout: ShadedVertex::layout(),
                    topology: Topology::TriangleStrip,
                    blend: BlendMode::Opaque,
                    uniform_size: std::mem::size_of::<GridDimensionsUniform>() as u64,
                    texture: None,
                },
            )?;
            Ok((program, vertex_buffer))
        })?;

        Ok(Self { resources, program, vertex_buffer, vertices: Vec::new() })
    }
}

/// Zig-zags across each pair of rows, `(x, y)` then `(x, y + 1)`.
///
/// Rows are stitched with two degenerate vertices (the last vertex of one
/// row and the first of the next). Each row contributes an even number of
/// vertices, so every row starts on the same winding parity.
pub fn build_strip(dims: Dimensions, shades: &[u8], vertices: &mut Vec<ShadedVertex>) {
    vertices.clear();
    let rows = dims.y.saturating_sub(1);
    if rows == 0 {
        return;
    }
    vertices.reserve(strip_vertex_count(dims));

    let shade = |x: u32, y: u32| shades[(x + y * dims.x) as usize];
    for y in 0..rows {
        if y > 0 {
            let last = vertices[vertices.len() - 1];
            vertices.push(last);
            vertices.push(ShadedVertex::new(0, y, shade(0, y)));
        }
        for x in 0..dims.x {
            vertices.push(ShadedVertex::new(x, y, shade(x, y)));
            vertices.push(ShadedVertex::new(x, y + 1, shade(x, y + 1)));
        }
    }
}

/// `(y - 1) * 2x` row vertices plus two per row join.
pub fn strip_vertex_count(dims: Dimensions) -> usize {
    let rows = dims.y.saturating_sub(1) as usize;
    if rows == 0 {
        return 0;
    }
    rows * 2 * dims.x as usize + (rows - 1) * 2
}

impl RenderStrategy for MeshTriangleStrip {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MeshTriangleStrip
    }

    fn sync(&mut self, _: &mut dyn GpuBackend, _: &RendererState, _: &ConfigureOutcome) -> Result<(), ResourceError> {
        Ok(())
    }

    fn render(&mut self, gpu: &mut dyn GpuBackend, state: &RendererState) -> Result<(), ResourceError> {
        let dims = state.volume().dims();
        build_strip(dims, state.selected_layer(), &mut self.vertices);
        if self.vertices.len() < 3 {
            return Ok(());
        }

        gpu.write_buffer(self.vertex_buffer, bytemuck::cast_slice(&self.vertices))?;
        let uniform = GridDimensionsUniform::new(dims);
        gpu.draw(&DrawCommand {
            program: self.program,
            vertex_buffer: self.vertex_buffer,
            geometry: Geometry::Arrays { vertices: 0..self.vertices.len() as u32 },
            texture: None,
            uniforms: bytemuck::bytes_of(&uniform),
        })
    }

    fn dispose(&mut self, gpu: &mut dyn GpuBackend) {
        self.resources.release_all(gpu);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_area(a: &ShadedVertex, b: &ShadedVertex, c: &ShadedVertex) -> f32 {
        let (ax, ay) = (a.position[0], a.position[1]);
        let (bx, by) = (b.position[0], b.position[1]);
        let (cx, cy) = (c.position[0], c.position[1]);
        (bx - ax) * (cy - ay) - (by - ay) * (cx - ax)
    }

    #[test]
    fn vertex_count_matches_formula() {
        let dims = Dimensions::new(3, 3, 1);
        let mut vertices = Vec::new();
        build_strip(dims, &[0; 9], &mut vertices);
        assert_eq!(vertices.len(), 14);
        assert_eq!(strip_vertex_count(dims), 14);
    }

    #[test]
    fn winding_is_consistent_across_rows() {
        let dims = Dimensions::new(4, 5, 1);
        let mut vertices = Vec::new();
        build_strip(dims, &[0; 20], &mut vertices);

        let mut expected_sign = None;
        for i in 0..vertices.len() - 2 {
            let area = signed_area(&vertices[i], &vertices[i + 1], &vertices[i + 2]);
            if area == 0.0 {
                continue;
            }
            // Strip triangles alternate orientation; undo that to compare.
            let normalised = if i % 2 == 0 { area } else { -area };
            let sign = normalised > 0.0;
            assert_eq!(*expected_sign.get_or_insert(sign), sign, "triangle {i}");
        }
    }

    #[test]
    fn shades_follow_positions() {
        let dims = Dimensions::new(2, 2, 1);
        let mut vertices = Vec::new();
        build_strip(dims, &[10, 20, 30, 40], &mut vertices);
        let shades: Vec<u8> = vertices.iter().map(ShadedVertex::shade).collect();
        assert_eq!(shades, vec![10, 30, 20, 40]);
    }

    #[test]
    fn single_row_has_no_strip() {
        let mut vertices = Vec::new();
        build_strip(Dimensions::new(5, 1, 1), &[0; 5], &mut vertices);
        assert!(vertices.is_empty());
    }
}
