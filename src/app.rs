// src/app.rs

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use winit::{event::WindowEvent, window::Window};

use crate::ui::{build_ui, Controls, PanelChanges, PanelInfo};
use tomogram_viewer::rendering_lib::{
    GpuBackend, RenderError, RendererSettings, RenderingContext, ResourceError, WgpuBackend,
};
use tomogram_viewer::volume_lib::Volume;

/// Frames per second, averaged over roughly one second.
struct FpsCounter {
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self { window_start: Instant::now(), frames: 0, fps: 0.0 }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
            self.frames = 0;
            self.window_start = Instant::now();
        }
    }
}

pub struct ViewerApp {
    context: RenderingContext<WgpuBackend>,
    volume: Option<Arc<Volume>>,
    controls: Controls,
    status: String,
    fps: FpsCounter,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl ViewerApp {
    pub async fn new(window: Arc<Window>, volume_path: &Path) -> Result<Self, ResourceError> {
        let backend = WgpuBackend::new(window.clone()).await?;

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(backend.device(), backend.surface_format(), None, 1);

        let (volume, status) = match Volume::from_path(volume_path) {
            Ok(volume) => {
                let dims = volume.dims();
                let status = format!("{}: {}x{}x{}", volume_path.display(), dims.x, dims.y, dims.z);
                (Some(Arc::new(volume)), status)
            }
            Err(e) => {
                log::error!("Could not load {}: {}", volume_path.display(), e);
                (None, format!("No volume: {e}"))
            }
        };

        let mut app = Self {
            context: RenderingContext::new(backend, RendererSettings::default()),
            volume,
            controls: Controls::default(),
            status,
            fps: FpsCounter::new(),
            egui_ctx,
            egui_state,
            egui_renderer,
        };
        app.activate_strategy();
        app.reconfigure();
        Ok(app)
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.context.backend_mut().resize(new_size.width, new_size.height);
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        self.egui_state.on_window_event(window, event).consumed
    }

    fn activate_strategy(&mut self) {
        let kind = self.controls.strategy;
        if let Err(e) = self.context.set_strategy(kind) {
            self.status = format!("{} unavailable: {e}", kind.name());
            if let Some(active) = self.context.active_kind() {
                self.controls.strategy = active;
            }
        }
    }

    fn reconfigure(&mut self) {
        let Some(volume) = self.volume.clone() else {
            return;
        };
        match self.context.configure(volume, self.controls.configuration()) {
            Ok(outcome) if outcome.refreshed => log::debug!("Window refreshed for {:?}", outcome.changed),
            Ok(_) => {}
            Err(e) => {
                log::warn!("Configuration rejected: {e}");
                self.status = e.to_string();
            }
        }
    }

    pub fn render(&mut self, window: &Window) -> Result<(), RenderError> {
        self.fps.tick();

        let raw_input = self.egui_state.take_egui_input(window);
        let info = PanelInfo {
            depth: self.volume.as_ref().map_or(0, |v| v.dims().z),
            status: &self.status,
            fps: self.fps.fps,
        };
        let mut changes = PanelChanges::default();
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            changes = build_ui(ctx, &mut self.controls, &info);
        });
        self.egui_state.handle_platform_output(window, full_output.platform_output);

        if changes.strategy {
            self.activate_strategy();
        }
        if changes.configuration {
            self.reconfigure();
        }

        self.context.clear()?;
        match self.context.render() {
            Ok(()) | Err(RenderError::NotConfigured) => {}
            Err(e) => return Err(e),
        }

        let tris = self.egui_ctx.tessellate(full_output.shapes, self.egui_ctx.pixels_per_point());
        let (width, height) = self.context.backend().viewport();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: window.scale_factor() as f32,
        };
        let egui_renderer = &mut self.egui_renderer;
        self.context.backend_mut().overlay(|device, queue, encoder, view| {
            for (id, image_delta) in &full_output.textures_delta.set {
                egui_renderer.update_texture(device, queue, *id, image_delta);
            }
            egui_renderer.update_buffers(device, queue, encoder, &tris, &screen_descriptor);
            {
                let mut gui_render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("GUI Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                egui_renderer.render(&mut gui_render_pass, &tris, &screen_descriptor);
            }
            for tex_id in &full_output.textures_delta.free {
                egui_renderer.free_texture(tex_id);
            }
        })?;

        self.context.flush()
    }
}
