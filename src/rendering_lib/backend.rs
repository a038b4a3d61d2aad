// src/rendering_lib/backend.rs

use std::ops::Range;

use super::error::ResourceError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Unorm8x4,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Unorm8x4 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub offset: u64,
    pub location: u32,
    pub format: VertexFormat,
}

/// Interleaved layout of a single vertex buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: &'static [VertexAttribute],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    TriangleList,
    TriangleStrip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendMode {
    Opaque,
    Alpha,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureDimension {
    D2,
    D3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexelFormat {
    Rgb8,
    Rgba8,
}

impl TexelFormat {
    pub fn bytes_per_texel(&self) -> usize {
        match self {
            TexelFormat::Rgb8 => 3,
            TexelFormat::Rgba8 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Everything needed to build one shader program.
///
/// The WGSL source must expose `vs_main` and `fs_main`. Bind group 0 holds
/// the uniform block at binding 0 (when `uniform_size > 0`) and, when
/// `texture` is set, the texture at binding 1 and its sampler at binding 2.
#[derive(Clone, Debug)]
pub struct ProgramDescriptor<'a> {
    pub label: &'a str,
    pub source: &'a str,
    pub vertex_layout: VertexLayout,
    pub topology: Topology,
    pub blend: BlendMode,
    pub uniform_size: u64,
    pub texture: Option<TextureDimension>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: String,
    pub dimension: TextureDimension,
    pub width: u32,
    pub height: u32,
    /// Depth for 3D textures, 1 for 2D ones.
    pub depth: u32,
    pub format: TexelFormat,
}

impl TextureDescriptor {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize * self.format.bytes_per_texel()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Geometry {
    Arrays { vertices: Range<u32> },
    Indexed { index_buffer: BufferId, indices: Range<u32> },
}

#[derive(Clone, Debug)]
pub struct DrawCommand<'a> {
    pub program: ProgramId,
    pub vertex_buffer: BufferId,
    pub geometry: Geometry,
    pub texture: Option<TextureId>,
    pub uniforms: &'a [u8],
}

/// The GPU primitives the renderers are written against.
///
/// All calls come from the single render thread. Uploads are synchronous
/// from the caller's point of view; `flush` ends the frame. Every created
/// resource must be handed back through the matching `release_*` call.
pub trait GpuBackend {
    /// Compiles and links a program.
    /// ## Errors
    /// * `ResourceError::ShaderCompilation` - if the source or pipeline is rejected.
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError>;

    fn create_buffer(&mut self, label: &str, kind: BufferKind) -> Result<BufferId, ResourceError>;

    /// Replaces the whole contents of a buffer, growing it if needed.
    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), ResourceError>;

    /// ## Errors
    /// * `ResourceError::TextureAllocation` - if the size exceeds the device limits.
    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Uploads every texel. `data.len()` must equal the descriptor's byte length.
    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), ResourceError>;

    fn clear(&mut self, color: [f32; 4]) -> Result<(), ResourceError>;

    fn draw(&mut self, command: &DrawCommand) -> Result<(), ResourceError>;

    /// Submits the frame recorded so far.
    fn flush(&mut self) -> Result<(), ResourceError>;

    fn release_program(&mut self, id: ProgramId);

    fn release_buffer(&mut self, id: BufferId);

    fn release_texture(&mut self, id: TextureId);

    /// Size of the render target in pixels.
    fn viewport(&self) -> (u32, u32);
}

impl<T: GpuBackend + ?Sized> GpuBackend for &mut T {
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        (**self).create_program(descriptor)
    }

    fn create_buffer(&mut self, label: &str, kind: BufferKind) -> Result<BufferId, ResourceError> {
        (**self).create_buffer(label, kind)
    }

    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), ResourceError> {
        (**self).write_buffer(id, data)
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        (**self).create_texture(descriptor)
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        (**self).write_texture(id, data)
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), ResourceError> {
        (**self).clear(color)
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<(), ResourceError> {
        (**self).draw(command)
    }

    fn flush(&mut self) -> Result<(), ResourceError> {
        (**self).flush()
    }

    fn release_program(&mut self, id: ProgramId) {
        (**self).release_program(id)
    }

    fn release_buffer(&mut self, id: BufferId) {
        (**self).release_buffer(id)
    }

    fn release_texture(&mut self, id: TextureId) {
        (**self).release_texture(id)
    }

    fn viewport(&self) -> (u32, u32) {
        (**self).viewport()
    }
}
