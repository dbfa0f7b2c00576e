//! Per-mode recipes. Adding a mode means adding a row here.

use super::EnvironmentMode;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyboxRecipe {
    pub height: f32,
    pub radius: f32,
    pub yaw: f32,
    pub y_offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RealTimeRecipe {
    pub accent_y: f32,
    pub accent_radius: f32,
    pub accent_tube: f32,
    pub capture_y: f32,
    pub capture_resolution: u32,
    pub capture_near: f32,
    pub capture_far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundRecipe {
    /// Transparent; the skybox mesh (if any) provides the backdrop.
    None,
    /// The loaded map is also drawn as the scene background.
    EnvMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentRecipe {
    EnvMap,
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationBinding {
    Skybox,
    SceneBackground,
}

/// Panel changes relative to the defaults restored on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelDelta {
    pub hide_wireframe: bool,
    pub hide_background_rotation: bool,
    pub hide_environment_rotation: bool,
    pub show_background_sliders: bool,
    pub unrestricted_polar: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModePreset {
    pub mode: EnvironmentMode,
    pub env_map: &'static str,
    pub background: BackgroundRecipe,
    pub environment: EnvironmentRecipe,
    pub environment_intensity: f32,
    pub background_blurriness: f32,
    pub background_intensity: f32,
    /// Applied to both the background and environment rotation.
    pub scene_rotation_y: f32,
    pub skybox: Option<SkyboxRecipe>,
    pub real_time: Option<RealTimeRecipe>,
    pub rotation: RotationBinding,
    pub panel: PanelDelta,
}

const FIELD_SKYBOX_HEIGHT: f32 = 1.0;
const FIELD_SKYBOX_RADIUS: f32 = 10.0;
const FIELD_SKYBOX_Y: f32 = 0.95;

const FIELD_1: ModePreset = ModePreset {
    mode: EnvironmentMode::Field1,
    env_map: "environment_maps/field/field_2k.hdr",
    background: BackgroundRecipe::None,
    environment: EnvironmentRecipe::EnvMap,
    environment_intensity: 1.0,
    background_blurriness: 0.0,
    background_intensity: 1.0,
    scene_rotation_y: 5.0,
    skybox: Some(SkyboxRecipe {
        height: FIELD_SKYBOX_HEIGHT,
        radius: FIELD_SKYBOX_RADIUS,
        yaw: 5.55,
        y_offset: FIELD_SKYBOX_Y,
    }),
    real_time: None,
    rotation: RotationBinding::Skybox,
    panel: PanelDelta {
        hide_wireframe: false,
        hide_background_rotation: false,
        hide_environment_rotation: false,
        show_background_sliders: false,
        unrestricted_polar: false,
    },
};

const FIELD_2: ModePreset = ModePreset {
    mode: EnvironmentMode::Field2,
    env_map: "environment_maps/field_2/field_2k.hdr",
    scene_rotation_y: 0.0,
    skybox: Some(SkyboxRecipe {
        height: FIELD_SKYBOX_HEIGHT,
        radius: FIELD_SKYBOX_RADIUS,
        yaw: 5.0,
        y_offset: FIELD_SKYBOX_Y,
    }),
    ..FIELD_1
};

const REAL_TIME: ModePreset = ModePreset {
    mode: EnvironmentMode::RealTime,
    env_map: "environment_maps/field_3/field_2k.hdr",
    environment: EnvironmentRecipe::Capture,
    environment_intensity: 2.0,
    real_time: Some(RealTimeRecipe {
        accent_y: 0.8,
        accent_radius: 0.1,
        accent_tube: 0.015,
        capture_y: 1.25,
        capture_resolution: 256,
        capture_near: 0.1,
        capture_far: 100.0,
    }),
    panel: PanelDelta {
        hide_environment_rotation: true,
        ..FIELD_1.panel
    },
    ..FIELD_2
};

const LIGHT_STUDIO: ModePreset = ModePreset {
    mode: EnvironmentMode::LightStudio,
    env_map: "environment_maps/custom/custom_2k.hdr",
    background: BackgroundRecipe::EnvMap,
    environment: EnvironmentRecipe::EnvMap,
    environment_intensity: 0.75,
    background_blurriness: 0.8,
    background_intensity: 0.5,
    scene_rotation_y: 3.0,
    skybox: None,
    real_time: None,
    rotation: RotationBinding::SceneBackground,
    panel: PanelDelta {
        hide_wireframe: true,
        hide_background_rotation: true,
        hide_environment_rotation: true,
        show_background_sliders: true,
        unrestricted_polar: true,
    },
};

pub const PRESETS: [ModePreset; 4] = [FIELD_1, FIELD_2, REAL_TIME, LIGHT_STUDIO];

pub fn preset(mode: EnvironmentMode) -> &'static ModePreset {
    match mode {
        EnvironmentMode::Field1 => &PRESETS[0],
        EnvironmentMode::Field2 => &PRESETS[1],
        EnvironmentMode::RealTime => &PRESETS[2],
        EnvironmentMode::LightStudio => &PRESETS[3],
    }
}
