// src/rendering_lib/wgpu_backend.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use wgpu::util::DeviceExt;
use winit::window::Window;

use super::backend::{
    BlendMode, BufferId, BufferKind, DrawCommand, Geometry, GpuBackend, ProgramDescriptor, ProgramId, TexelFormat,
    TextureDescriptor, TextureDimension, TextureId, Topology, VertexFormat,
};
use super::error::ResourceError;

struct GpuProgram {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_size: u64,
    texture: Option<TextureDimension>,
}

struct GpuBuffer {
    label: String,
    kind: BufferKind,
    raw: Option<wgpu::Buffer>,
    capacity: u64,
}

struct GpuTexture {
    descriptor: TextureDescriptor,
    raw: wgpu::Texture,
    view: wgpu::TextureView,
}

/// The surface texture and encoder of the frame being recorded.
struct Frame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
    pending_clear: Option<wgpu::Color>,
}

/// `GpuBackend` on top of wgpu, drawing into a winit window's surface.
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    sampler: wgpu::Sampler,
    validation_error: Arc<Mutex<Option<String>>>,
    next_id: u32,
    programs: HashMap<ProgramId, GpuProgram>,
    buffers: HashMap<BufferId, GpuBuffer>,
    textures: HashMap<TextureId, GpuTexture>,
    staging: Vec<u8>,
    frame: Option<Frame>,
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>) -> Result<Self, ResourceError> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window).map_err(|e| ResourceError::Surface(e.to_string()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(ResourceError::NoAdapter)?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: Some("Tomogram Viewer Device"),
                },
                None,
            )
            .await
            .map_err(|e| ResourceError::DeviceRequest(e.to_string()))?;
        log::info!("Using adapter: {:?}", adapter.get_info().name);

        let validation_error = Arc::new(Mutex::new(None));
        let sink = validation_error.clone();
        device.on_uncaptured_error(Box::new(move |error| {
            log::error!("wgpu: {error}");
            if let Ok(mut slot) = sink.lock() {
                slot.get_or_insert_with(|| error.to_string());
            }
        }));

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| ResourceError::Surface("surface reports no formats".to_owned()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Volume Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            surface,
            device,
            queue,
            config,
            sampler,
            validation_error,
            next_id: 1,
            programs: HashMap::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            staging: Vec::new(),
            frame: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Lets the caller record extra passes (e.g. UI) into the current frame,
    /// after everything drawn so far and before `flush`.
    pub fn overlay<F>(&mut self, record: F) -> Result<(), ResourceError>
    where
        F: FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView),
    {
        self.begin_frame()?;
        let Some(frame) = self.frame.as_mut() else {
            return Ok(());
        };
        apply_pending_clear(frame);
        record(&self.device, &self.queue, &mut frame.encoder, &frame.view);
        Ok(())
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn take_validation_error(&self) -> Option<String> {
        self.validation_error.lock().ok().and_then(|mut slot| slot.take())
    }

    fn begin_frame(&mut self) -> Result<(), ResourceError> {
        if self.frame.is_some() {
            return Ok(());
        }
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Err(ResourceError::Surface("surface lost, reconfigured".to_owned()));
            }
            Err(e) => return Err(ResourceError::Surface(e.to_string())),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Frame Command Encoder") });
        self.frame = Some(Frame { output, view, encoder, pending_clear: None });
        Ok(())
    }
}

fn apply_pending_clear(frame: &mut Frame) {
    if let Some(color) = frame.pending_clear.take() {
        frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Clear(color), store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }
}

fn vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
    }
}

fn view_dimension(dimension: TextureDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureDimension::D3 => wgpu::TextureViewDimension::D3,
    }
}

impl GpuBackend for WgpuBackend {
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ResourceError> {
        let compile_error = |message: String| ResourceError::ShaderCompilation {
            label: descriptor.label.to_owned(),
            message,
        };
        // Drop anything left over from earlier calls.
        self.take_validation_error();

        let shader_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(descriptor.label),
            source: wgpu::ShaderSource::Wgsl(descriptor.source.into()),
        });
        if let Some(message) = self.take_validation_error() {
            return Err(compile_error(message));
        }

        let mut entries = Vec::with_capacity(3);
        if descriptor.uniform_size > 0 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(descriptor.uniform_size),
                },
                count: None,
            });
        }
        if let Some(dimension) = descriptor.texture {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: view_dimension(dimension),
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            });
        }
        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(descriptor.label),
            entries: &entries,
        });

        let render_pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(descriptor.label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let attributes: Vec<wgpu::VertexAttribute> = descriptor
            .vertex_layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                offset: a.offset,
                shader_location: a.location,
                format: vertex_format(a.format),
            })
            .collect();
        let blend = match descriptor.blend {
            BlendMode::Opaque => wgpu::BlendState::REPLACE,
            BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
        };
        let topology = match descriptor.topology {
            Topology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            Topology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(descriptor.label),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader_module,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: descriptor.vertex_layout.stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader_module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.config.format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
            multiview: None,
        });
        if let Some(message) = self.take_validation_error() {
            return Err(compile_error(message));
        }

        let id = ProgramId(self.allocate_id());
        self.programs.insert(
            id,
            GpuProgram {
                pipeline,
                bind_group_layout,
                uniform_size: descriptor.uniform_size,
                texture: descriptor.texture,
            },
        );
        log::debug!("Created program '{}' as {id:?}", descriptor.label);
        Ok(id)
    }

    fn create_buffer(&mut self, label: &str, kind: BufferKind) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, GpuBuffer { label: label.to_owned(), kind, raw: None, capacity: 0 });
        Ok(id)
    }

    fn write_buffer(&mut self, id: BufferId, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or_else(|| ResourceError::UnknownResource(format!("{id:?}")))?;
        if data.is_empty() {
            return Ok(());
        }

        let padded = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if padded > self.device.limits().max_buffer_size {
            return Err(ResourceError::BufferAllocation {
                label: buffer.label.clone(),
                message: format!("{padded} bytes exceeds the device limit"),
            });
        }
        if buffer.raw.is_none() || buffer.capacity < padded {
            let usage = match buffer.kind {
                BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
                BufferKind::Index => wgpu::BufferUsages::INDEX,
            } | wgpu::BufferUsages::COPY_DST;
            if let Some(old) = buffer.raw.take() {
                old.destroy();
            }
            let capacity = padded.next_power_of_two();
            buffer.raw = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&buffer.label),
                size: capacity,
                usage,
                mapped_at_creation: false,
            }));
            buffer.capacity = capacity;
        }

        let Some(raw) = buffer.raw.as_ref() else {
            return Ok(());
        };
        if padded as usize == data.len() {
            self.queue.write_buffer(raw, 0, data);
        } else {
            self.staging.clear();
            self.staging.extend_from_slice(data);
            self.staging.resize(padded as usize, 0);
            self.queue.write_buffer(raw, 0, &self.staging);
        }
        Ok(())
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let limits = self.device.limits();
        let (max, dimension, depth) = match descriptor.dimension {
            TextureDimension::D2 => (limits.max_texture_dimension_2d, wgpu::TextureDimension::D2, 1),
            TextureDimension::D3 => (limits.max_texture_dimension_3d, wgpu::TextureDimension::D3, descriptor.depth),
        };
        let largest = descriptor.width.max(descriptor.height).max(depth);
        if largest > max || descriptor.byte_len() == 0 {
            return Err(ResourceError::TextureAllocation {
                label: descriptor.label.clone(),
                message: format!(
                    "{}x{}x{} outside 1..={max}",
                    descriptor.width, descriptor.height, descriptor.depth
                ),
            });
        }

        let raw = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&descriptor.label),
            size: wgpu::Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers: depth,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension,
            // No 3-channel format exists; Rgb8 is widened on upload.
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = raw.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(view_dimension(descriptor.dimension)),
            ..Default::default()
        });

        let id = TextureId(self.allocate_id());
        self.textures.insert(id, GpuTexture { descriptor: descriptor.clone(), raw, view });
        Ok(id)
    }

    fn write_texture(&mut self, id: TextureId, data: &[u8]) -> Result<(), ResourceError> {
        let texture = self
            .textures
            .get(&id)
            .ok_or_else(|| ResourceError::UnknownResource(format!("{id:?}")))?;
        let descriptor = &texture.descriptor;
        if data.len() != descriptor.byte_len() {
            return Err(ResourceError::UploadSize {
                label: descriptor.label.clone(),
                expected: descriptor.byte_len(),
                actual: data.len(),
            });
        }

        let texels = match descriptor.format {
            TexelFormat::Rgba8 => data,
            TexelFormat::Rgb8 => {
                self.staging.clear();
                self.staging.reserve(data.len() / 3 * 4);
                for rgb in data.chunks_exact(3) {
                    self.staging.extend_from_slice(rgb);
                    self.staging.push(255);
                }
                self.staging.as_slice()
            }
        };

        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture.raw,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            texels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * descriptor.width),
                rows_per_image: Some(descriptor.height),
            },
            wgpu::Extent3d {
                width: descriptor.width,
                height: descriptor.height,
                depth_or_array_layers: descriptor.depth,
            },
        );
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) -> Result<(), ResourceError> {
        self.begin_frame()?;
        if let Some(frame) = self.frame.as_mut() {
            let [r, g, b, a] = color.map(f64::from);
            frame.pending_clear = Some(wgpu::Color { r, g, b, a });
        }
        Ok(())
    }

    fn draw(&mut self, command: &DrawCommand) -> Result<(), ResourceError> {
        self.begin_frame()?;

        let program = self
            .programs
            .get(&command.program)
            .ok_or_else(|| ResourceError::UnknownResource(format!("{:?}", command.program)))?;
        let vertex_buffer = self
            .buffers
            .get(&command.vertex_buffer)
            .ok_or_else(|| ResourceError::UnknownResource(format!("{:?}", command.vertex_buffer)))?;
        let Some(vertices) = vertex_buffer.raw.as_ref() else {
            log::trace!("Skipping draw from empty buffer '{}'", vertex_buffer.label);
            return Ok(());
        };

        let uniform_buffer = (program.uniform_size > 0).then(|| {
            let mut contents = command.uniforms.to_vec();
            contents.resize(program.uniform_size as usize, 0);
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Draw Uniform Buffer"),
                contents: &contents,
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });
        let texture_view = match (program.texture, command.texture) {
            (None, _) => None,
            (Some(_), Some(id)) => Some(
                &self
                    .textures
                    .get(&id)
                    .ok_or_else(|| ResourceError::UnknownResource(format!("{id:?}")))?
                    .view,
            ),
            (Some(_), None) => {
                return Err(ResourceError::UnknownResource(format!("{:?} needs a texture", command.program)))
            }
        };

        let mut entries = Vec::with_capacity(3);
        if let Some(buffer) = &uniform_buffer {
            entries.push(wgpu::BindGroupEntry { binding: 0, resource: buffer.as_entire_binding() });
        }
        if let Some(view) = texture_view {
            entries.push(wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(view) });
            entries.push(wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&self.sampler) });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Bind Group"),
            layout: &program.bind_group_layout,
            entries: &entries,
        });

        let index_buffer = match &command.geometry {
            Geometry::Indexed { index_buffer, .. } => {
                let buffer = self
                    .buffers
                    .get(index_buffer)
                    .filter(|b| b.kind == BufferKind::Index)
                    .ok_or_else(|| ResourceError::UnknownResource(format!("{index_buffer:?}")))?;
                match buffer.raw.as_ref() {
                    Some(raw) => Some(raw),
                    None => return Ok(()),
                }
            }
            Geometry::Arrays { .. } => None,
        };

        let Some(frame) = self.frame.as_mut() else {
            return Ok(());
        };
        let load = match frame.pending_clear.take() {
            Some(color) => wgpu::LoadOp::Clear(color),
            None => wgpu::LoadOp::Load,
        };
        let mut render_pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Strategy Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(&program.pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.set_vertex_buffer(0, vertices.slice(..));
        match (&command.geometry, index_buffer) {
            (Geometry::Indexed { indices, .. }, Some(raw)) => {
                render_pass.set_index_buffer(raw.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(indices.clone(), 0, 0..1);
            }
            (Geometry::Arrays { vertices }, _) => render_pass.draw(vertices.clone(), 0..1),
            (Geometry::Indexed { .. }, None) => {}
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ResourceError> {
        let Some(mut frame) = self.frame.take() else {
            return Ok(());
        };
        apply_pending_clear(&mut frame);
        self.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.output.present();
        Ok(())
    }

    fn release_program(&mut self, id: ProgramId) {
        if self.programs.remove(&id).is_none() {
            log::warn!("Release of unknown program {id:?}");
        }
    }

    fn release_buffer(&mut self, id: BufferId) {
        match self.buffers.remove(&id) {
            Some(GpuBuffer { raw: Some(raw), .. }) => raw.destroy(),
            Some(_) => {}
            None => log::warn!("Release of unknown buffer {id:?}"),
        }
    }

    fn release_texture(&mut self, id: TextureId) {
        match self.textures.remove(&id) {
            Some(texture) => texture.raw.destroy(),
            None => log::warn!("Release of unknown texture {id:?}"),
        }
    }

    fn viewport(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}
