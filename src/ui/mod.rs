//! The "Tweaks" debug panel.

use crate::environment::{EnvironmentController, EnvironmentMode};
use crate::scene::{RotationTarget, SceneState};
use egui::{ComboBox, Context, Slider};
use glam::Vec3;
use std::f32::consts::TAU;

pub const PANEL_TITLE: &str = "Tweaks";
const PANEL_WIDTH: f32 = 375.0;

/// Changes the panel cannot apply on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    SelectMode(EnvironmentMode),
    SetWireframe(bool),
}

pub struct TweakPanel {
    visible: bool,
    last_error: Option<String>,
}

impl Default for TweakPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl TweakPanel {
    pub fn new() -> Self {
        Self {
            visible: true,
            last_error: None,
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        log::debug!("Tweaks panel {}", if self.visible { "shown" } else { "hidden" });
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Sliders write straight into `scene`; mode and wireframe changes come
    /// back as actions.
    pub fn show(
        &mut self,
        ctx: &Context,
        scene: &mut SceneState,
        controller: &EnvironmentController,
    ) -> Vec<UiAction> {
        let mut actions = Vec::new();
        if !self.visible {
            return actions;
        }

        let affordances = controller.affordances();
        let status = status_line(controller, self.last_error.as_deref());

        egui::Window::new(PANEL_TITLE)
            .default_width(PANEL_WIDTH)
            .resizable(false)
            .show(ctx, |ui| {
                let current = controller.pending_mode().unwrap_or(controller.active_mode());
                let mut selected = current;
                ComboBox::from_label("environment")
                    .selected_text(selected.display_name())
                    .show_ui(ui, |ui| {
                        for mode in EnvironmentMode::ALL {
                            ui.selectable_value(&mut selected, mode, mode.display_name());
                        }
                    });
                if selected != current {
                    actions.push(UiAction::SelectMode(selected));
                }

                if affordances.wireframe_toggle {
                    let mut wireframe = controller.wireframe();
                    if ui.checkbox(&mut wireframe, "wireframe").changed() {
                        actions.push(UiAction::SetWireframe(wireframe));
                    }
                }

                let env = scene.environment_mut();
                ui.add(
                    Slider::new(&mut env.environment_intensity, 0.0..=3.0)
                        .step_by(0.001)
                        .text("environmentIntensity"),
                );
                if affordances.blurriness_slider {
                    ui.add(
                        Slider::new(&mut env.background_blurriness, 0.0..=1.0)
                            .step_by(0.0001)
                            .text("backgroundBlurriness"),
                    );
                }
                if affordances.background_intensity_slider {
                    ui.add(
                        Slider::new(&mut env.background_intensity, 0.0..=5.0)
                            .step_by(0.001)
                            .text("backgroundIntensity"),
                    );
                }

                if affordances.background_rotation {
                    if let Some(rotation) = scene.rotation_mut(controller.rotation_target()) {
                        ui.collapsing("backgroundRotation", |ui| rotation_sliders(ui, rotation));
                    }
                }
                if affordances.environment_rotation {
                    if let Some(rotation) = scene.rotation_mut(RotationTarget::SceneEnvironment) {
                        ui.collapsing("environmentRotation", |ui| rotation_sliders(ui, rotation));
                    }
                }

                if let Some(status) = &status {
                    ui.separator();
                    ui.label(status);
                }
            });

        actions
    }
}

fn rotation_sliders(ui: &mut egui::Ui, rotation: &mut Vec3) {
    ui.add(Slider::new(&mut rotation.x, 0.0..=TAU).step_by(0.001).text("x"));
    ui.add(Slider::new(&mut rotation.y, 0.0..=TAU).step_by(0.001).text("y"));
    ui.add(Slider::new(&mut rotation.z, 0.0..=TAU).step_by(0.001).text("z"));
}

/// Status text under the sliders: a pending load wins over the last error.
pub fn status_line(controller: &EnvironmentController, error: Option<&str>) -> Option<String> {
    if let Some(mode) = controller.pending_mode() {
        return Some(format!("Loading {}...", mode.display_name()));
    }
    error.map(|message| format!("Error: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{EnvMapSource, LoadTicket};
    use std::path::Path;

    struct NullSource;

    impl EnvMapSource for NullSource {
        fn request_env_map(&mut self, _ticket: LoadTicket, _path: &Path) {}
    }

    fn run_panel(
        panel: &mut TweakPanel,
        scene: &mut SceneState,
        controller: &EnvironmentController,
    ) -> Vec<UiAction> {
        let ctx = Context::default();
        let mut actions = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            actions = panel.show(ctx, scene, controller);
        });
        actions
    }

    #[test]
    fn status_prefers_pending_load() {
        let mut scene = SceneState::new();
        let mut controller = EnvironmentController::new(EnvironmentMode::Field1);
        assert_eq!(status_line(&controller, None), None);
        assert_eq!(
            status_line(&controller, Some("missing file")).as_deref(),
            Some("Error: missing file")
        );

        controller.set_mode(EnvironmentMode::RealTime, &mut scene, &mut NullSource);
        let status = status_line(&controller, Some("missing file"));
        assert_eq!(
            status.as_deref(),
            Some(format!("Loading {}...", EnvironmentMode::RealTime.display_name()).as_str())
        );
    }

    #[test]
    fn idle_panel_emits_no_actions() {
        let mut scene = SceneState::new();
        let controller = EnvironmentController::new(EnvironmentMode::Field1);
        let mut panel = TweakPanel::new();
        assert!(run_panel(&mut panel, &mut scene, &controller).is_empty());

        panel.toggle();
        assert!(run_panel(&mut panel, &mut scene, &controller).is_empty());
    }
}
