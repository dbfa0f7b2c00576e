//! Environment mode controller.
//!
//! Owns the active [`EnvironmentMode`] and the scene objects that mode
//! allocated. A switch is split in two: [`EnvironmentController::set_mode`]
//! tears the previous mode down and requests the new map, and
//! [`EnvironmentController::complete_load`] applies the mode once the map
//! arrives. Every request carries a generation number; only the newest
//! request is ever applied, so overlapping switches settle on the last one
//! the user asked for.

mod preset;

pub use preset::preset;

use crate::assets::{AssetError, EnvMap};
use crate::scene::{
    AccentData, CubeCaptureData, EnvironmentSource, GroundedSkyboxData, ObjectId, RotationTarget,
    SceneObjectKind, SceneState, Transform,
};
use glam::Vec3;
use preset::{BackgroundRecipe, EnvironmentRecipe, RotationBinding};
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Fixed point the real-time accent circles and faces (the pig).
pub const FOCUS_POINT: Vec3 = Vec3::new(0.0, 0.6, 0.0);
const ACCENT_ORBIT_RADIUS: f32 = 0.5;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize,
)]
pub enum EnvironmentMode {
    #[default]
    #[serde(rename = "field_1")]
    Field1,
    #[serde(rename = "field_2")]
    Field2,
    #[serde(rename = "real-time")]
    RealTime,
    #[serde(rename = "light-studio")]
    LightStudio,
}

impl EnvironmentMode {
    pub const ALL: [EnvironmentMode; 4] = [
        EnvironmentMode::Field1,
        EnvironmentMode::Field2,
        EnvironmentMode::RealTime,
        EnvironmentMode::LightStudio,
    ];

    /// Value stored by the mode selector and in config files.
    pub fn label(self) -> &'static str {
        match self {
            EnvironmentMode::Field1 => "field_1",
            EnvironmentMode::Field2 => "field_2",
            EnvironmentMode::RealTime => "real-time",
            EnvironmentMode::LightStudio => "light-studio",
        }
    }

    /// Option name shown in the mode selector.
    pub fn display_name(self) -> &'static str {
        match self {
            EnvironmentMode::Field1 => "skybox_field",
            EnvironmentMode::Field2 => "skybox_field_2",
            EnvironmentMode::RealTime => "real_time_env",
            EnvironmentMode::LightStudio => "light_studio_env",
        }
    }
}

/// Identifies one env map request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub generation: u64,
    pub mode: EnvironmentMode,
}

/// Asynchronous env map loading, as consumed by the controller. The
/// implementation must eventually hand the ticket back together with the
/// result to [`EnvironmentController::complete_load`].
pub trait EnvMapSource {
    fn request_env_map(&mut self, ticket: LoadTicket, path: &Path);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolarLimit {
    /// Camera stays above the horizon.
    UpperHemisphere,
    Unrestricted,
}

impl PolarLimit {
    pub fn max_polar_angle(self) -> f32 {
        match self {
            PolarLimit::UpperHemisphere => FRAC_PI_2,
            PolarLimit::Unrestricted => f32::INFINITY,
        }
    }
}

/// Which panel widgets are shown, plus the camera limit that goes with them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelAffordances {
    pub wireframe_toggle: bool,
    pub background_rotation: bool,
    pub environment_rotation: bool,
    pub blurriness_slider: bool,
    pub background_intensity_slider: bool,
    pub polar_limit: PolarLimit,
}

impl Default for PanelAffordances {
    fn default() -> Self {
        Self {
            wireframe_toggle: true,
            background_rotation: true,
            environment_rotation: true,
            blurriness_slider: false,
            background_intensity_slider: false,
            polar_limit: PolarLimit::UpperHemisphere,
        }
    }
}

/// Scene objects allocated by the active mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeResources {
    pub skybox: Option<ObjectId>,
    pub accent: Option<ObjectId>,
    pub capture: Option<ObjectId>,
}

/// Per-frame work the active mode wants done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHook {
    Idle,
    RealTime { accent: ObjectId, capture: ObjectId },
}

impl FrameHook {
    /// Advance the hook; returns the capture that must be re-rendered.
    pub fn run(&self, scene: &mut SceneState, elapsed: f32) -> Option<ObjectId> {
        let FrameHook::RealTime { accent, capture } = *self else {
            return None;
        };
        let object = scene.get_mut(accent)?;
        let (sin, cos) = elapsed.sin_cos();
        object.transform.position.x = sin * ACCENT_ORBIT_RADIUS;
        object.transform.position.z = cos * ACCENT_ORBIT_RADIUS;
        object.transform.look_at(FOCUS_POINT);
        scene.contains(capture).then_some(capture)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModeSwitchError {
    #[error("failed to load environment for {}: {source}", .mode.label())]
    Load {
        mode: EnvironmentMode,
        #[source]
        source: AssetError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Applied(EnvironmentMode),
    /// A newer request superseded this one; nothing changed.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct PendingSwitch {
    ticket: LoadTicket,
}

pub struct EnvironmentController {
    active: EnvironmentMode,
    pending: Option<PendingSwitch>,
    generation: u64,
    resources: ModeResources,
    rotation_target: RotationTarget,
    affordances: PanelAffordances,
    wireframe: bool,
    env_map_paths: HashMap<EnvironmentMode, PathBuf>,
}

impl EnvironmentController {
    pub fn new(initial: EnvironmentMode) -> Self {
        let env_map_paths = EnvironmentMode::ALL
            .into_iter()
            .map(|mode| (mode, PathBuf::from(preset(mode).env_map)))
            .collect();
        Self {
            active: initial,
            pending: None,
            generation: 0,
            resources: ModeResources::default(),
            rotation_target: RotationTarget::SceneBackground,
            affordances: PanelAffordances::default(),
            wireframe: false,
            env_map_paths,
        }
    }

    pub fn with_env_map_path(mut self, mode: EnvironmentMode, path: impl Into<PathBuf>) -> Self {
        self.env_map_paths.insert(mode, path.into());
        self
    }

    pub fn active_mode(&self) -> EnvironmentMode {
        self.active
    }

    /// Mode whose map is still loading, if any.
    pub fn pending_mode(&self) -> Option<EnvironmentMode> {
        self.pending.map(|pending| pending.ticket.mode)
    }

    pub fn resources(&self) -> ModeResources {
        self.resources
    }

    pub fn rotation_target(&self) -> RotationTarget {
        self.rotation_target
    }

    pub fn affordances(&self) -> PanelAffordances {
        self.affordances
    }

    pub fn wireframe(&self) -> bool {
        self.wireframe
    }

    pub fn env_map_path(&self, mode: EnvironmentMode) -> &Path {
        self.env_map_paths
            .get(&mode)
            .map(PathBuf::as_path)
            .unwrap_or_else(|| Path::new(preset(mode).env_map))
    }

    /// Tear down the current mode and start loading `target`.
    pub fn set_mode(
        &mut self,
        target: EnvironmentMode,
        scene: &mut SceneState,
        source: &mut dyn EnvMapSource,
    ) -> LoadTicket {
        self.reset(scene);

        self.generation += 1;
        let ticket = LoadTicket {
            generation: self.generation,
            mode: target,
        };
        if let Some(previous) = self.pending.replace(PendingSwitch { ticket }) {
            log::debug!(
                "Switch to {} superseded by {}",
                previous.ticket.mode.label(),
                target.label()
            );
        }
        let path = self.env_map_path(target).to_path_buf();
        source.request_env_map(ticket, &path);
        ticket
    }

    /// Continuation of [`set_mode`](Self::set_mode): apply the loaded map.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Arc<EnvMap>, AssetError>,
        scene: &mut SceneState,
    ) -> Result<SwitchOutcome, ModeSwitchError> {
        let is_current = self
            .pending
            .is_some_and(|pending| pending.ticket == ticket);
        if !is_current {
            log::debug!(
                "Dropping stale env map for {} (generation {})",
                ticket.mode.label(),
                ticket.generation
            );
            return Ok(SwitchOutcome::Stale);
        }
        self.pending = None;

        let map = result.map_err(|source| ModeSwitchError::Load {
            mode: ticket.mode,
            source,
        })?;
        self.apply(ticket.mode, map, scene);
        Ok(SwitchOutcome::Applied(ticket.mode))
    }

    pub fn set_wireframe(&mut self, scene: &mut SceneState, wireframe: bool) {
        self.wireframe = wireframe;
        let Some(id) = self.resources.skybox else {
            return;
        };
        if let Some(object) = scene.get_mut(id) {
            if let SceneObjectKind::GroundedSkybox(data) = &mut object.kind {
                data.wireframe = wireframe;
            }
        }
    }

    pub fn frame_hook(&self) -> FrameHook {
        if self.active != EnvironmentMode::RealTime {
            return FrameHook::Idle;
        }
        match (self.resources.accent, self.resources.capture) {
            (Some(accent), Some(capture)) => FrameHook::RealTime { accent, capture },
            _ => FrameHook::Idle,
        }
    }

    fn reset(&mut self, scene: &mut SceneState) {
        let resources = std::mem::take(&mut self.resources);
        for id in [resources.skybox, resources.accent, resources.capture]
            .into_iter()
            .flatten()
        {
            if scene.remove(id).is_none() {
                log::warn!("Environment object {:?} was already detached", id);
            }
        }
        scene.reset_environment();
        self.affordances = PanelAffordances::default();
        self.rotation_target = RotationTarget::SceneBackground;
    }

    fn apply(&mut self, mode: EnvironmentMode, map: Arc<EnvMap>, scene: &mut SceneState) {
        let preset = preset(mode);

        let skybox = preset.skybox.map(|recipe| {
            scene.add(
                SceneObjectKind::GroundedSkybox(GroundedSkyboxData {
                    map: map.clone(),
                    height: recipe.height,
                    radius: recipe.radius,
                    wireframe: self.wireframe,
                }),
                Transform::from_position(Vec3::new(0.0, recipe.y_offset, 0.0)).with_yaw(recipe.yaw),
            )
        });

        let (accent, capture) = match preset.real_time {
            Some(recipe) => {
                let accent = scene.add(
                    SceneObjectKind::Accent(AccentData {
                        radius: recipe.accent_radius,
                        tube: recipe.accent_tube,
                        color: [1.0, 1.0, 1.0],
                    }),
                    Transform::from_position(Vec3::new(0.0, recipe.accent_y, 0.0)),
                );
                let capture = scene.add(
                    SceneObjectKind::CubeCapture(CubeCaptureData {
                        resolution: recipe.capture_resolution,
                        near: recipe.capture_near,
                        far: recipe.capture_far,
                    }),
                    Transform::from_position(Vec3::new(0.0, recipe.capture_y, 0.0)),
                );
                (Some(accent), Some(capture))
            }
            None => (None, None),
        };

        let env = scene.environment_mut();
        env.background = match preset.background {
            BackgroundRecipe::None => None,
            BackgroundRecipe::EnvMap => Some(map.clone()),
        };
        env.environment = match (preset.environment, capture) {
            (EnvironmentRecipe::Capture, Some(capture)) => Some(EnvironmentSource::Capture(capture)),
            _ => Some(EnvironmentSource::Map(map.clone())),
        };
        env.environment_intensity = preset.environment_intensity;
        env.background_blurriness = preset.background_blurriness;
        env.background_intensity = preset.background_intensity;
        env.background_rotation.y = preset.scene_rotation_y;
        env.environment_rotation.y = preset.scene_rotation_y;

        self.rotation_target = match (preset.rotation, skybox) {
            (RotationBinding::Skybox, Some(id)) => RotationTarget::Object(id),
            _ => RotationTarget::SceneBackground,
        };

        let delta = preset.panel;
        self.affordances = PanelAffordances {
            wireframe_toggle: !delta.hide_wireframe,
            background_rotation: !delta.hide_background_rotation,
            environment_rotation: !delta.hide_environment_rotation,
            blurriness_slider: delta.show_background_sliders,
            background_intensity_slider: delta.show_background_sliders,
            polar_limit: if delta.unrestricted_polar {
                PolarLimit::Unrestricted
            } else {
                PolarLimit::UpperHemisphere
            },
        };

        self.resources = ModeResources {
            skybox,
            accent,
            capture,
        };
        self.active = mode;
        log::info!(
            "Environment mode {} active ({} at {}x{})",
            mode.label(),
            map.label(),
            map.width(),
            map.height()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneObject;

    /// Records requests so tests decide when and how loads complete.
    #[derive(Default)]
    struct ScriptedSource {
        requests: Vec<(LoadTicket, PathBuf)>,
    }

    impl EnvMapSource for ScriptedSource {
        fn request_env_map(&mut self, ticket: LoadTicket, path: &Path) {
            self.requests.push((ticket, path.to_path_buf()));
        }
    }

    struct Harness {
        controller: EnvironmentController,
        scene: SceneState,
        source: ScriptedSource,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                controller: EnvironmentController::new(EnvironmentMode::Field1),
                scene: SceneState::new(),
                source: ScriptedSource::default(),
            }
        }

        fn request(&mut self, mode: EnvironmentMode) -> LoadTicket {
            self.controller
                .set_mode(mode, &mut self.scene, &mut self.source)
        }

        fn resolve(&mut self, ticket: LoadTicket) -> SwitchOutcome {
            let map = Arc::new(EnvMap::from_rgb32f(
                ticket.mode.label(),
                4,
                2,
                &[0.25; 4 * 2 * 3],
            ));
            self.controller
                .complete_load(ticket, Ok(map), &mut self.scene)
                .unwrap()
        }

        fn switch(&mut self, mode: EnvironmentMode) {
            let ticket = self.request(mode);
            assert_eq!(self.resolve(ticket), SwitchOutcome::Applied(mode));
        }

        fn count(&self, predicate: impl Fn(&SceneObject) -> bool) -> usize {
            self.scene.objects().iter().filter(|o| predicate(o)).count()
        }

        fn skyboxes(&self) -> usize {
            self.count(|o| matches!(o.kind, SceneObjectKind::GroundedSkybox(_)))
        }

        fn accents(&self) -> usize {
            self.count(|o| matches!(o.kind, SceneObjectKind::Accent(_)))
        }

        fn captures(&self) -> usize {
            self.count(|o| matches!(o.kind, SceneObjectKind::CubeCapture(_)))
        }
    }

    #[test]
    fn each_mode_attaches_exactly_its_resources() {
        let sequence = [
            EnvironmentMode::Field1,
            EnvironmentMode::RealTime,
            EnvironmentMode::LightStudio,
            EnvironmentMode::Field2,
            EnvironmentMode::RealTime,
            EnvironmentMode::Field1,
            EnvironmentMode::LightStudio,
        ];
        let mut h = Harness::new();
        for mode in sequence {
            h.switch(mode);
            let expected = match mode {
                EnvironmentMode::Field1 | EnvironmentMode::Field2 => (1, 0, 0),
                EnvironmentMode::RealTime => (1, 1, 1),
                EnvironmentMode::LightStudio => (0, 0, 0),
            };
            assert_eq!((h.skyboxes(), h.accents(), h.captures()), expected, "{mode:?}");
            assert_eq!(h.scene.objects().len(), expected.0 + expected.1 + expected.2);
            assert_eq!(h.controller.active_mode(), mode);
            assert!(h.controller.pending_mode().is_none());
        }
    }

    #[test]
    fn reset_releases_previous_resources_before_load() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::RealTime);
        let old = h.controller.resources();
        h.scene.take_released();

        h.request(EnvironmentMode::Field2);
        assert!(h.scene.objects().is_empty());
        assert_eq!(h.controller.resources(), ModeResources::default());

        let mut released = h.scene.take_released();
        released.sort();
        let mut expected: Vec<ObjectId> = [old.skybox, old.accent, old.capture]
            .into_iter()
            .flatten()
            .collect();
        expected.sort();
        assert_eq!(released, expected);

        // Active mode only changes once the load completes.
        assert_eq!(h.controller.active_mode(), EnvironmentMode::RealTime);
        assert_eq!(h.controller.pending_mode(), Some(EnvironmentMode::Field2));
        let env = h.scene.environment();
        assert_eq!(env.environment_intensity, 1.0);
        assert!(env.environment.is_none());
    }

    #[test]
    fn requests_use_mode_asset_paths() {
        let mut h = Harness::new();
        h.request(EnvironmentMode::LightStudio);
        h.request(EnvironmentMode::Field2);
        let paths: Vec<_> = h.source.requests.iter().map(|(_, path)| path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("environment_maps/custom/custom_2k.hdr"),
                PathBuf::from("environment_maps/field_2/field_2k.hdr"),
            ]
        );
    }

    #[test]
    fn configured_paths_override_presets() {
        let mut h = Harness::new();
        h.controller = EnvironmentController::new(EnvironmentMode::Field1)
            .with_env_map_path(EnvironmentMode::Field1, "custom/field.hdr");
        h.request(EnvironmentMode::Field1);
        assert_eq!(h.source.requests[0].1, PathBuf::from("custom/field.hdr"));
    }

    #[test]
    fn repeated_switch_is_idempotent() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::LightStudio);
        let first = h.scene.environment().clone();
        h.switch(EnvironmentMode::LightStudio);
        let second = h.scene.environment();

        assert_eq!(first.environment_intensity, second.environment_intensity);
        assert_eq!(first.background_blurriness, second.background_blurriness);
        assert_eq!(first.background_intensity, second.background_intensity);
        assert_eq!(first.background_rotation, second.background_rotation);
        assert_eq!(first.environment_rotation, second.environment_rotation);
        assert!(h.scene.objects().is_empty());
    }

    #[test]
    fn rotation_target_follows_the_active_mode() {
        let mut h = Harness::new();
        for mode in EnvironmentMode::ALL {
            h.switch(mode);
            let target = h.controller.rotation_target();
            match mode {
                EnvironmentMode::LightStudio => {
                    assert_eq!(target, RotationTarget::SceneBackground)
                }
                _ => {
                    let skybox = h.controller.resources().skybox.unwrap();
                    assert_eq!(target, RotationTarget::Object(skybox));
                    assert!(h.scene.rotation_mut(target).is_some());
                }
            }
        }
    }

    #[test]
    fn skybox_placement_matches_preset() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::Field1);
        let skybox = h.controller.resources().skybox.unwrap();
        let object = h.scene.get(skybox).unwrap();
        assert_eq!(object.transform.rotation.y, 5.55);
        assert_eq!(object.transform.position.y, 0.95);
        match &object.kind {
            SceneObjectKind::GroundedSkybox(data) => {
                assert_eq!((data.height, data.radius), (1.0, 10.0));
            }
            other => panic!("expected skybox, got {other:?}"),
        }
        assert_eq!(h.scene.environment().background_rotation.y, 5.0);

        h.switch(EnvironmentMode::Field2);
        let skybox = h.controller.resources().skybox.unwrap();
        assert_eq!(h.scene.get(skybox).unwrap().transform.rotation.y, 5.0);
        assert_eq!(h.scene.environment().background_rotation.y, 0.0);
    }

    #[test]
    fn light_studio_defaults_survive_round_trip() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::LightStudio);
        {
            let env = h.scene.environment_mut();
            env.environment_intensity = 2.9;
            env.background_blurriness = 0.1;
            env.background_intensity = 4.0;
            env.background_rotation.y = 0.5;
        }
        h.switch(EnvironmentMode::Field1);
        h.switch(EnvironmentMode::LightStudio);

        let env = h.scene.environment();
        assert_eq!(env.environment_intensity, 0.75);
        assert_eq!(env.background_blurriness, 0.8);
        assert_eq!(env.background_intensity, 0.5);
        assert_eq!(env.background_rotation.y, 3.0);
        assert_eq!(env.environment_rotation.y, 3.0);
    }

    #[test]
    fn panel_visibility_per_mode() {
        let mut h = Harness::new();
        for mode in EnvironmentMode::ALL {
            h.switch(mode);
            let a = h.controller.affordances();
            match mode {
                EnvironmentMode::LightStudio => {
                    assert!(!a.wireframe_toggle);
                    assert!(!a.background_rotation);
                    assert!(!a.environment_rotation);
                    assert!(a.blurriness_slider);
                    assert!(a.background_intensity_slider);
                    assert_eq!(a.polar_limit, PolarLimit::Unrestricted);
                }
                EnvironmentMode::RealTime => {
                    assert!(a.wireframe_toggle);
                    assert!(a.background_rotation);
                    assert!(!a.environment_rotation);
                    assert_eq!(a.polar_limit, PolarLimit::UpperHemisphere);
                }
                _ => {
                    assert_eq!(a, PanelAffordances::default());
                }
            }
        }
    }

    #[test]
    fn real_time_scenario() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::Field1);
        h.switch(EnvironmentMode::RealTime);

        let resources = h.controller.resources();
        assert!(resources.skybox.is_some());
        let accent = h.scene.get(resources.accent.unwrap()).unwrap();
        assert_eq!(accent.transform.position.y, 0.8);
        let capture = h.scene.get(resources.capture.unwrap()).unwrap();
        assert_eq!(capture.transform.position.y, 1.25);

        let env = h.scene.environment();
        assert_eq!(env.environment_intensity, 2.0);
        assert!(env.background.is_none());
        assert!(matches!(
            env.environment,
            Some(EnvironmentSource::Capture(id)) if Some(id) == resources.capture
        ));
        assert!(!h.controller.affordances().environment_rotation);
    }

    #[test]
    fn light_studio_scenario() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::LightStudio);

        let env = h.scene.environment();
        let background = env.background.as_ref().unwrap();
        match &env.environment {
            Some(EnvironmentSource::Map(map)) => assert!(Arc::ptr_eq(map, background)),
            other => panic!("expected map environment, got {other:?}"),
        }
        assert_eq!(env.background_rotation.y, 3.0);
        assert_eq!(env.environment_rotation.y, 3.0);
        assert_eq!(
            h.controller.affordances().polar_limit.max_polar_angle(),
            f32::INFINITY
        );
    }

    #[test]
    fn stale_completion_is_discarded() {
        let mut h = Harness::new();
        let first = h.request(EnvironmentMode::LightStudio);
        let second = h.request(EnvironmentMode::RealTime);

        // The later request resolves first, then the earlier one arrives.
        assert_eq!(h.resolve(second), SwitchOutcome::Applied(EnvironmentMode::RealTime));
        assert_eq!(h.resolve(first), SwitchOutcome::Stale);

        assert_eq!(h.controller.active_mode(), EnvironmentMode::RealTime);
        assert!(h.scene.environment().background.is_none());
        assert_eq!((h.skyboxes(), h.accents(), h.captures()), (1, 1, 1));
    }

    #[test]
    fn earlier_completion_arriving_first_is_also_discarded() {
        let mut h = Harness::new();
        let first = h.request(EnvironmentMode::RealTime);
        let second = h.request(EnvironmentMode::Field2);

        assert_eq!(h.resolve(first), SwitchOutcome::Stale);
        assert!(h.scene.objects().is_empty());
        assert_eq!(h.controller.pending_mode(), Some(EnvironmentMode::Field2));

        assert_eq!(h.resolve(second), SwitchOutcome::Applied(EnvironmentMode::Field2));
        assert_eq!((h.skyboxes(), h.accents(), h.captures()), (1, 0, 0));
    }

    #[test]
    fn failed_load_leaves_reset_state() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::Field2);

        let ticket = h.request(EnvironmentMode::LightStudio);
        let error = AssetError::Read {
            path: "custom_2k.hdr".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        let result = h.controller.complete_load(ticket, Err(error), &mut h.scene);

        assert!(matches!(
            result,
            Err(ModeSwitchError::Load {
                mode: EnvironmentMode::LightStudio,
                ..
            })
        ));
        assert_eq!(h.controller.active_mode(), EnvironmentMode::Field2);
        assert!(h.controller.pending_mode().is_none());
        assert!(h.scene.objects().is_empty());
        assert!(h.scene.environment().environment.is_none());
        assert_eq!(h.controller.affordances(), PanelAffordances::default());
        assert_eq!(h.controller.frame_hook(), FrameHook::Idle);
    }

    #[test]
    fn wireframe_applies_to_current_and_future_skyboxes() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::Field1);
        h.controller.set_wireframe(&mut h.scene, true);

        let is_wire = |h: &Harness| {
            let id = h.controller.resources().skybox.unwrap();
            matches!(
                &h.scene.get(id).unwrap().kind,
                SceneObjectKind::GroundedSkybox(data) if data.wireframe
            )
        };
        assert!(is_wire(&h));
        h.switch(EnvironmentMode::Field2);
        assert!(is_wire(&h));
    }

    #[test]
    fn frame_hook_only_runs_in_real_time() {
        let mut h = Harness::new();
        h.switch(EnvironmentMode::Field1);
        assert_eq!(h.controller.frame_hook(), FrameHook::Idle);
        assert_eq!(FrameHook::Idle.run(&mut h.scene, 1.0), None);

        h.switch(EnvironmentMode::RealTime);
        let hook = h.controller.frame_hook();
        let resources = h.controller.resources();
        assert_eq!(
            hook,
            FrameHook::RealTime {
                accent: resources.accent.unwrap(),
                capture: resources.capture.unwrap(),
            }
        );

        let elapsed = 0.7f32;
        assert_eq!(hook.run(&mut h.scene, elapsed), resources.capture);
        let accent = h.scene.get(resources.accent.unwrap()).unwrap().transform;
        assert!((accent.position.x - elapsed.sin() * 0.5).abs() < 1e-6);
        assert!((accent.position.z - elapsed.cos() * 0.5).abs() < 1e-6);
        assert_eq!(accent.position.y, 0.8);
        let facing = accent.quat() * Vec3::Z;
        assert!(facing.abs_diff_eq((FOCUS_POINT - accent.position).normalize(), 1e-4));

        // While a switch away is pending the accent is gone and the hook idles.
        h.request(EnvironmentMode::Field1);
        assert_eq!(h.controller.frame_hook(), FrameHook::Idle);
    }

    #[test]
    fn mode_labels_round_trip() {
        for mode in EnvironmentMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.label()));
        }
        assert_eq!(
            serde_json::from_str::<EnvironmentMode>("\"light-studio\"").unwrap(),
            EnvironmentMode::LightStudio
        );
        assert!(serde_json::from_str::<EnvironmentMode>("\"skybox_field\"").is_err());
        assert_eq!(EnvironmentMode::default(), EnvironmentMode::Field1);
    }
}
