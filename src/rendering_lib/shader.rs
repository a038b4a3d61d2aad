// src/rendering_lib/shader.rs

/// Per-vertex shaded meshes (quads and strips). Positions are in grid units.
pub const MESH_SHADER_SOURCE: &str = r#"
struct GridDimensions {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

@group(0) @binding(0)
var<uniform> grid: GridDimensions;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.color = model.color;

    // Row 0 at the top of the viewport.
    let normalized_x = (model.position.x / (grid.width / 2.0)) - 1.0;
    let normalized_y = 1.0 - (model.position.y / (grid.height / 2.0));
    out.clip_position = vec4<f32>(normalized_x, normalized_y, 0.0, 1.0);

    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Single textured quad over the grid.
pub const TEXTURE_SHADER_SOURCE: &str = r#"
struct GridDimensions {
    width: f32,
    height: f32,
    _padding1: f32,
    _padding2: f32,
}

@group(0) @binding(0)
var<uniform> grid: GridDimensions;
@group(0) @binding(1)
var slice_texture: texture_2d<f32>;
@group(0) @binding(2)
var slice_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.uv = model.uv;
    let normalized_x = (model.position.x / (grid.width / 2.0)) - 1.0;
    let normalized_y = 1.0 - (model.position.y / (grid.height / 2.0));
    out.clip_position = vec4<f32>(normalized_x, normalized_y, 0.0, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(slice_texture, slice_sampler, in.uv);
}
"#;

/// Stack of translucent quads sampling bands of a 2D atlas.
pub const ATLAS_SHADER_SOURCE: &str = r#"
@group(0) @binding(1)
var atlas_texture: texture_2d<f32>;
@group(0) @binding(2)
var atlas_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) tex_coord: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.uv = model.tex_coord.xy;
    out.clip_position = vec4<f32>(model.position, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(atlas_texture, atlas_sampler, in.uv);
}
"#;

/// Cross-section quads sampling a 3D texture through a rotating texture matrix.
pub const VOLUME_SHADER_SOURCE: &str = r#"
struct VolumeTransforms {
    projection: mat4x4<f32>,
    model: mat4x4<f32>,
    tex_projection: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> transforms: VolumeTransforms;
@group(0) @binding(1)
var volume_texture: texture_3d<f32>;
@group(0) @binding(2)
var volume_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) tex_coord: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uvw: vec3<f32>,
}

@vertex
fn vs_main(model: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.uvw = (transforms.tex_projection * vec4<f32>(model.tex_coord, 1.0)).xyz;
    out.clip_position = transforms.projection * transforms.model * vec4<f32>(model.position, 1.0);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSample(volume_texture, volume_sampler, in.uvw);
    if (any(in.uvw < vec3<f32>(0.0)) || any(in.uvw > vec3<f32>(1.0))) {
        discard;
    }
    return color;
}
"#;
