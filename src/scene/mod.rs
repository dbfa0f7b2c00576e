pub mod geometry;

use crate::assets::{EnvMap, LoadedModel};
use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};
use std::sync::Arc;

/// Stable handle for an object attached to the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Where the lit materials take their ambient light from.
#[derive(Debug, Clone)]
pub enum EnvironmentSource {
    Map(Arc<EnvMap>),
    /// Live cube capture owned by the scene object with this id.
    Capture(ObjectId),
}

/// Scene-level environment parameters - matches what can be edited in UI
#[derive(Debug, Clone)]
pub struct EnvironmentParams {
    pub background: Option<Arc<EnvMap>>,
    pub environment: Option<EnvironmentSource>,
    pub environment_intensity: f32,
    pub background_blurriness: f32,
    pub background_intensity: f32,
    /// Euler XYZ, radians.
    pub background_rotation: Vec3,
    /// Euler XYZ, radians.
    pub environment_rotation: Vec3,
}

impl Default for EnvironmentParams {
    fn default() -> Self {
        Self {
            background: None,
            environment: None,
            environment_intensity: 1.0,
            background_blurriness: 0.0,
            background_intensity: 1.0,
            background_rotation: Vec3::ZERO,
            environment_rotation: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler XYZ, radians. Edited live by the rotation sliders.
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_yaw(mut self, yaw: f32) -> Self {
        self.rotation.y = yaw;
        self
    }

    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    pub fn quat(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }

    /// Rotate so the local +Z axis points at `target`.
    pub fn look_at(&mut self, target: Vec3) {
        let forward = target - self.position;
        if forward.length_squared() < 1e-12 {
            return;
        }
        let z = forward.normalize();
        let mut x = Vec3::Y.cross(z);
        if x.length_squared() < 1e-12 {
            // Looking straight up or down.
            x = Vec3::X;
        }
        let x = x.normalize();
        let y = z.cross(x);
        let rotation = Quat::from_mat3(&Mat3::from_cols(x, y, z));
        let (rx, ry, rz) = rotation.to_euler(EulerRot::XYZ);
        self.rotation = Vec3::new(rx, ry, rz);
    }
}

#[derive(Debug, Clone)]
pub struct GroundedSkyboxData {
    pub map: Arc<EnvMap>,
    pub height: f32,
    pub radius: f32,
    pub wireframe: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccentData {
    pub radius: f32,
    pub tube: f32,
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeCaptureData {
    pub resolution: u32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialOverride {
    pub roughness: f32,
    pub metalness: f32,
}

#[derive(Debug, Clone)]
pub struct ModelData {
    pub model: Arc<LoadedModel>,
    pub material: MaterialOverride,
}

#[derive(Debug, Clone)]
pub enum SceneObjectKind {
    GroundedSkybox(GroundedSkyboxData),
    Accent(AccentData),
    CubeCapture(CubeCaptureData),
    Model(ModelData),
}

#[derive(Debug, Clone)]
pub struct SceneObject {
    pub id: ObjectId,
    pub transform: Transform,
    pub kind: SceneObjectKind,
}

/// Retained scene graph read by the renderer every frame.
#[derive(Debug, Default)]
pub struct SceneState {
    environment: EnvironmentParams,
    objects: Vec<SceneObject>,
    next_id: u32,
    released: Vec<ObjectId>,
}

impl SceneState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn environment(&self) -> &EnvironmentParams {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut EnvironmentParams {
        &mut self.environment
    }

    pub fn reset_environment(&mut self) {
        self.environment = EnvironmentParams::default();
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn add(&mut self, kind: SceneObjectKind, transform: Transform) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.push(SceneObject {
            id,
            transform,
            kind,
        });
        id
    }

    /// Detach an object. Its GPU resources are released on the next sync.
    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        let index = self.objects.iter().position(|object| object.id == id)?;
        let object = self.objects.remove(index);
        self.released.push(id);
        Some(object)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.iter().find(|object| object.id == id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|object| object.id == id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub fn take_released(&mut self) -> Vec<ObjectId> {
        std::mem::take(&mut self.released)
    }

    /// Resolve a rotation binding to the live Euler triplet it edits.
    pub fn rotation_mut(&mut self, target: RotationTarget) -> Option<&mut Vec3> {
        match target {
            RotationTarget::SceneBackground => Some(&mut self.environment.background_rotation),
            RotationTarget::SceneEnvironment => Some(&mut self.environment.environment_rotation),
            RotationTarget::Object(id) => self.get_mut(id).map(|object| &mut object.transform.rotation),
        }
    }

    /// Ids of every env map some part of the scene still samples.
    pub fn referenced_env_maps(&self) -> Vec<u64> {
        let mut ids = Vec::new();
        if let Some(map) = &self.environment.background {
            ids.push(map.id());
        }
        if let Some(EnvironmentSource::Map(map)) = &self.environment.environment {
            ids.push(map.id());
        }
        for object in &self.objects {
            if let SceneObjectKind::GroundedSkybox(data) = &object.kind {
                ids.push(data.map.id());
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Which rotation triplet the "backgroundRotation" sliders are bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationTarget {
    SceneBackground,
    SceneEnvironment,
    Object(ObjectId),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accent() -> SceneObjectKind {
        SceneObjectKind::Accent(AccentData {
            radius: 0.1,
            tube: 0.015,
            color: [1.0, 1.0, 1.0],
        })
    }

    #[test]
    fn removed_objects_are_reported_once() {
        let mut scene = SceneState::new();
        let a = scene.add(accent(), Transform::default());
        let b = scene.add(accent(), Transform::default());
        assert_ne!(a, b);

        assert!(scene.remove(a).is_some());
        assert!(scene.remove(a).is_none());
        assert!(!scene.contains(a));
        assert!(scene.contains(b));

        assert_eq!(scene.take_released(), vec![a]);
        assert!(scene.take_released().is_empty());
    }

    #[test]
    fn rotation_binding_follows_object_lifetime() {
        let mut scene = SceneState::new();
        let id = scene.add(accent(), Transform::default().with_yaw(1.5));
        let target = RotationTarget::Object(id);
        assert_eq!(scene.rotation_mut(target).map(|r| r.y), Some(1.5));

        scene.remove(id);
        assert!(scene.rotation_mut(target).is_none());
        assert!(scene.rotation_mut(RotationTarget::SceneBackground).is_some());
    }

    #[test]
    fn environment_defaults() {
        let mut scene = SceneState::new();
        scene.environment_mut().environment_intensity = 2.0;
        scene.environment_mut().background_rotation.y = 3.0;
        scene.reset_environment();

        let env = scene.environment();
        assert_eq!(env.environment_intensity, 1.0);
        assert_eq!(env.background_blurriness, 0.0);
        assert_eq!(env.background_intensity, 1.0);
        assert_eq!(env.background_rotation, Vec3::ZERO);
        assert_eq!(env.environment_rotation, Vec3::ZERO);
        assert!(env.background.is_none());
        assert!(env.environment.is_none());
    }

    #[test]
    fn look_at_points_local_z_at_target() {
        let mut transform = Transform::from_position(Vec3::new(0.5, 0.8, 0.0));
        let target = Vec3::new(0.0, 0.6, 0.0);
        transform.look_at(target);

        let forward = transform.quat() * Vec3::Z;
        let expected = (target - transform.position).normalize();
        assert!(forward.abs_diff_eq(expected, 1e-4), "{forward:?} vs {expected:?}");
    }

    #[test]
    fn look_at_same_point_keeps_rotation() {
        let mut transform = Transform::from_position(Vec3::ONE).with_yaw(0.3);
        transform.look_at(Vec3::ONE);
        assert_eq!(transform.rotation.y, 0.3);
    }
}
