// src/ui.rs

use tomogram_viewer::rendering_lib::StrategyKind;
use tomogram_viewer::volume_lib::Configuration;

/// Values edited through the control panel.
pub struct Controls {
    pub strategy: StrategyKind,
    pub layer: u32,
    pub window_min: f32,
    pub window_width: f32,
}

impl Default for Controls {
    fn default() -> Self {
        let config = Configuration::default();
        Self {
            strategy: StrategyKind::MeshQuads,
            layer: config.layer,
            window_min: config.window_min,
            window_width: config.window_width,
        }
    }
}

impl Controls {
    pub fn configuration(&self) -> Configuration {
        Configuration::new(self.layer, self.window_min, self.window_width)
    }
}

/// Read-only values shown in the panel.
pub struct PanelInfo<'a> {
    /// Layers in the loaded volume, 0 when none is loaded.
    pub depth: u32,
    pub status: &'a str,
    pub fps: f32,
}

#[derive(Default)]
pub struct PanelChanges {
    pub strategy: bool,
    pub configuration: bool,
}

pub fn build_ui(ctx: &egui::Context, controls: &mut Controls, info: &PanelInfo) -> PanelChanges {
    let mut changes = PanelChanges::default();
    egui::Window::new("Tomogram")
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
        .resizable(false)
        .show(ctx, |ui| {
            ui.vertical(|ui| {
                egui::ComboBox::from_label("Strategy")
                    .selected_text(controls.strategy.name())
                    .show_ui(ui, |ui| {
                        for kind in StrategyKind::ALL {
                            changes.strategy |=
                                ui.selectable_value(&mut controls.strategy, kind, kind.name()).changed();
                        }
                    });
                ui.separator();

                ui.add_enabled_ui(info.depth > 0, |ui| {
                    let last_layer = info.depth.saturating_sub(1);
                    changes.configuration |=
                        ui.add(egui::Slider::new(&mut controls.layer, 0..=last_layer).text("Layer")).changed();
                });
                changes.configuration |= ui
                    .add(egui::Slider::new(&mut controls.window_min, 0.0..=255.0).step_by(1.0).text("Window min"))
                    .changed();
                changes.configuration |= ui
                    .add(egui::Slider::new(&mut controls.window_width, 1.0..=255.0).step_by(1.0).text("Window width"))
                    .changed();
                ui.separator();

                ui.label(format!(
                    "Layer: {} | Min: {} | Width: {}",
                    controls.layer, controls.window_min, controls.window_width
                ));
                ui.label(info.status);
                ui.label(format!("FPS: {:.1}", info.fps));
            });
        });
    changes
}
