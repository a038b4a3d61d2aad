// src/rendering_lib/headless.rs

use std::collections::HashMap;

use super::backend::{
    BlendMode, BufferId, BufferKind, DrawCommand, Geometry, GpuBackend, ProgramDescriptor, ProgramId,
    TextureDescriptor, TextureDimension, TextureId, Topology,
};
use super::error::ResourceError;

/// Create/release tallies per resource kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounters {
    pub programs_created: u32,
    pub programs_released: u32,
    pub buffers_created: u32,
    pub buffers_released: u32,
    pub textures_created: u32,
    pub textures_released: u32,
    /// Releases of ids that were never created or already released.
    pub invalid_releases: u32,
}

impl ResourceCounters {
    pub fn total_released(&self) -> u32 {
        self.programs_released + self.buffers_released + self.textures_released
    }
}

#[derive(Clone, Debug)]
pub struct ProgramRecord {
    pub label: String,
    pub topology: Topology,
    pub blend: BlendMode,
    pub texture: Option<TextureDimension>,
    pub uniform_size: u64,
}

#[derive(Clone, Debug)]
struct BufferRecord {
    label: String,
    kind: BufferKind,
    data: Vec<u8>,
}

#[derive(Clone, Debug)]
struct TextureRecord {
    descriptor: TextureDescriptor,
    data: Vec<u8>,
    uploads: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub geometry: Geometry,
    pub texture: Option<TextureId>,
    pub uniforms: Vec<u8>,
}

impl RecordedDraw {
    /// Vertices (or indices) consumed by the draw.
    pub fn element_count(&self) -> u32 {
        match &self.geometry {
            Geometry::Arrays { vertices } => vertices.end - vertices.start,
            Geometry::Indexed { indices, .. } => indices.end - indices.start,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedFrame {
    pub clears: Vec<[f32; 4]>,
    pub draws: Vec<RecordedDraw>,
}

/// A backend that keeps everything in memory and records what it is asked
/// to do. Used for tests and for running the renderers without a GPU.
#[derive(Debug)]
pub struct HeadlessBackend {
    viewport: (u32, u32),
    max_texture_dimension: u32,
    next_id: u32,
    programs: HashMap<ProgramId, ProgramRecord>,
    buffers: HashMap<BufferId, BufferRecord>,
    textures: HashMap<TextureId, TextureRecord>,
    failing_programs: Vec<String>,
    counters: ResourceCounters,
    current: RecordedFrame,
    frames: Vec<RecordedFrame>,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            max_texture_dimension: 8192,
            next_id: 1,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            failing_programs: Vec::new(),
            counters: ResourceCounters::default(),
            current: RecordedFrame::default(),
            frames: Vec::new(),
        }
    }

    /// Makes `create_program` fail for programs with this label.
    pub fn fail_program(&mut self, label: &str) {
        self.failing_programs.push(label.to_owned());
    }

    pub fn clear_failures(&mut self) {
        self.failing_programs.clear();
    }

    pub fn set_max_texture_dimension(&mut self, max: u32) {
        self.max_texture_dimension = max;
    }

    pub fn counters(&self) -> ResourceCounters {
        self.counters
    }

    pub fn live_resources(&self) -> usize {
        self.programs.len() + self.buffers.len() + self.textures.len()
    }

    pub fn program(&self, id: ProgramId) -> Option<&ProgramRecord> {
        self.programs.get(&id)
    }

    pub fn buffer_data(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(|b| b.data.as_slice())
    }

    pub fn texture_data(&self, id: TextureId) -> Option<&[u8]> {
        self.textures.get(&id).map(|t| t.data.as_slice())
    }

    pub fn texture_descriptor(&self, id: TextureId) -> Option<&TextureDescriptor> {
        self.textures.get(&id).map(|t| &t.descriptor)
    }

    pub fn texture_uploads(&self, id: TextureId) -> u32 {
        self.textures.get(&id).map_or(0, |t| t.uploads)
    }

    /// Frames submitted through `flush`, oldest first.
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// Work recorded since the last `flush`.
    pub fn pending_frame(&self) -> &RecordedFrame {
        &self.current
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl GpuBackend for HeadlessBackend {
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        if self.failing_programs.iter().any(|label| label == descriptor.label) {
            return Err(ResourceError::ShaderCompilation {
                label: descriptor.label.to_owned(),
                message: "link failure injected by headless backend".to_owned(),
            });
        }
        let id = ProgramId(self.allocate_id());
        self.programs.insert(
            id,
            ProgramRecord {
                label: descriptor.label.to_owned(),
                topology: descriptor.topology,
                blend: descriptor.blend,
                texture: descriptor.texture,
                uniform_size: descriptor.uniform_size,
            },
        );
        self.counters.programs_created += 1;
        Ok(id)
    }

    fn create_buffer(&mut self, label: &str, kind: BufferKind) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, BufferRecord { label: label.to_owned(), kind, data: Vec::new() });
        self.counters.buffers_created += 1;
        Ok(id)
    }

    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or_else(|| ResourceError::UnknownResource(format!("{id:?}")))?;
        buffer.data.clear();
        buffer.data.extend_from_slice(data);
        Ok(())
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let largest = descriptor.width.max(descriptor.height).max(descriptor.depth);
        if largest > self.max_texture_dimension || descriptor.byte_len() == 0 {
            return Err(ResourceError::TextureAllocation {
                label: descriptor.label.clone(),
                message: format!(
                    "{}x{}x{} outside 1..={}",
                    descriptor.width, descriptor.height, descriptor.depth, self.max_texture_dimension
                ),
            });
        }
        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            TextureRecord { descriptor: descriptor.clone(), data: vec![0; descriptor.byte_len()], uploads: 0 },
        );
        self.counters.textures_created += 1;
        Ok(id)
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        let texture = self
            .textures
            .get_mut(&id)
            .ok_or_else(|| ResourceError::UnknownResource(format!("{id:?}")))?;
        let expected = texture.descriptor.byte_len();
        if data.len() != expected {
            return Err(ResourceError::UploadSize {
                label: texture.descriptor.label.clone(),
                expected,
                actual: data.len(),
            });
        }
        texture.data.copy_from_slice(data);
        texture.uploads += 1;
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), ResourceError> {
        self.current.clears.push(color);
        Ok(())
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<(), ResourceError> {
        if !self.programs.contains_key(&command.program) {
            return Err(ResourceError::UnknownResource(format!("{:?}", command.program)));
        }
        if !self.buffers.contains_key(&command.vertex_buffer) {
            return Err(ResourceError::UnknownResource(format!("{:?}", command.vertex_buffer)));
        }
        if let Geometry::Indexed { index_buffer, .. } = &command.geometry {
            match self.buffers.get(index_buffer) {
                Some(buffer) if buffer.kind == BufferKind::Index => {}
                _ => return Err(ResourceError::UnknownResource(format!("{index_buffer:?}"))),
            }
        }
        if let Some(texture) = command.texture {
            if !self.textures.contains_key(&texture) {
                return Err(ResourceError::UnknownResource(format!("{texture:?}")));
            }
        }
        self.current.draws.push(RecordedDraw {
            program: command.program,
            vertex_buffer: command.vertex_buffer,
            geometry: command.geometry.clone(),
            texture: command.texture,
            uniforms: command.uniforms.to_vec(),
        });
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ResourceError> {
        self.frames.push(std::mem::take(&mut self.current));
        Ok(())
    }

    fn release_program(&mut self, id: ProgramId) {
        if self.programs.remove(&id).is_some() {
            self.counters.programs_released += 1;
        } else {
            log::warn!("HeadlessBackend: release of unknown program {id:?}");
            self.counters.invalid_releases += 1;
        }
    }

    fn release_buffer(&mut self, id: BufferId) {
        match self.buffers.remove(&id) {
            Some(buffer) => {
                log::trace!("HeadlessBackend: released buffer '{}'", buffer.label);
                self.counters.buffers_released += 1;
            }
            None => {
                log::warn!("HeadlessBackend: release of unknown buffer {id:?}");
                self.counters.invalid_releases += 1;
            }
        }
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() {
            self.counters.textures_released += 1;
        } else {
            log::warn!("HeadlessBackend: release of unknown texture {id:?}");
            self.counters.invalid_releases += 1;
        }
    }

    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering_lib::backend::TexelFormat;

    fn texture(width: u32) -> TextureDescriptor {
        TextureDescriptor {
            label: "t".into(),
            dimension: TextureDimension::D2,
            width,
            height: 2,
            depth: 1,
            format: TexelFormat::Rgb8,
        }
    }

    #[test]
    fn upload_size_is_checked() {
        let mut gpu = HeadlessBackend::new(4, 4);
        let id = gpu.create_texture(&texture(2)).unwrap();
        assert!(matches!(
            gpu.write_texture(id, &[0; 5]),
            Err(ResourceError::UploadSize { expected: 12, actual: 5, .. })
        ));
        gpu.write_texture(id, &[7; 12]).unwrap();
        assert_eq!(gpu.texture_uploads(id), 1);
    }

    #[test]
    fn oversized_texture_is_rejected() {
        let mut gpu = HeadlessBackend::new(4, 4);
        gpu.set_max_texture_dimension(16);
        assert!(matches!(gpu.create_texture(&texture(17)), Err(ResourceError::TextureAllocation { .. })));
    }

    #[test]
    fn double_release_is_counted() {
        let mut gpu = HeadlessBackend::new(4, 4);
        let id = gpu.create_buffer("b", BufferKind::Vertex).unwrap();
        gpu.release_buffer(id);
        gpu.release_buffer(id);
        let counters = gpu.counters();
        assert_eq!(counters.buffers_released, 1);
        assert_eq!(counters.invalid_releases, 1);
    }

    #[test]
    fn flush_closes_frame() {
        let mut gpu = HeadlessBackend::new(4, 4);
        gpu.clear([0.0; 4]).unwrap();
        gpu.flush().unwrap();
        assert_eq!(gpu.frames().len(), 1);
        assert_eq!(gpu.last_frame().unwrap().clears.len(), 1);
        assert!(gpu.pending_frame().clears.is_empty());
    }
}
