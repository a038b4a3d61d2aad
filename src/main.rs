// src/main.rs

mod app;
mod ui;

use std::path::PathBuf;

use app::ViewerApp;
use tomogram_viewer::rendering_lib::{RenderError, ResourceError};
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::WindowBuilder,
};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

const DEFAULT_VOLUME_PATH: &str = "sample.bin";

#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub async fn run() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Warn).expect("Couldn't initialize logger");
        } else {
            env_logger::init();
        }
    }

    let volume_path: PathBuf = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_VOLUME_PATH.to_owned()).into();

    let event_loop = EventLoop::new().expect("Couldn't create event loop");
    let window = std::sync::Arc::new(
        WindowBuilder::new()
            .with_title("Tomogram Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(768, 768))
            .build(&event_loop)
            .expect("Couldn't create window"),
    );

    #[cfg(target_arch = "wasm32")]
    {
        use winit::platform::web::WindowExtWebSys;
        web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let dst = doc.get_element_by_id("wasm-viewport")?;
                let canvas = web_sys::Element::from(window.canvas()?);
                dst.append_child(&canvas).ok()?;
                Some(())
            })
            .expect("Couldn't append canvas to document body.");
    }

    let mut app_state = match ViewerApp::new(window.clone(), &volume_path).await {
        Ok(app) => app,
        Err(e) => {
            log::error!("GPU initialisation failed: {e}");
            return;
        }
    };

    let result = event_loop.run(move |event, target: &EventLoopWindowTarget<()>| {
        target.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { ref event, window_id } if window_id == window.id() => {
                if !app_state.handle_window_event(event, &window) {
                    match event {
                        WindowEvent::CloseRequested => target.exit(),
                        WindowEvent::Resized(physical_size) => app_state.resize(*physical_size),
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                match app_state.render(&window) {
                    Ok(()) => {}
                    // The backend reconfigures a lost surface itself; skip the frame.
                    Err(RenderError::Resource(ResourceError::Surface(e))) => log::warn!("Frame skipped: {e}"),
                    Err(e) => {
                        log::error!("Rendering failed: {e}");
                        target.exit();
                    }
                }

                if !target.exiting() {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    });
    if let Err(e) = result {
        log::error!("Event loop error: {e}");
    }
}

#[tokio::main]
async fn main() {
    run().await;
}
