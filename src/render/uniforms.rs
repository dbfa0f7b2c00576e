use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Mat4, Quat, Vec3};

/// Mirrors `Frame` in scene.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub camera_position: [f32; 4],
    pub environment_rotation: [[f32; 4]; 4],
    pub background_rotation: [[f32; 4]; 4],
    pub environment: [f32; 4],
    pub background: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnvironmentBinding {
    None,
    Equirect { max_lod: f32 },
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub environment: EnvironmentBinding,
    pub environment_intensity: f32,
    pub environment_rotation: Vec3,
    pub background: Option<BackgroundInputs>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundInputs {
    pub intensity: f32,
    pub blurriness: f32,
    pub max_lod: f32,
    pub rotation: Vec3,
}

/// Lookup rotation for an environment rotated by `euler`: world direction
/// `d` samples the map at `R⁻¹ d`.
pub fn lookup_rotation(euler: Vec3) -> Mat4 {
    let rotation = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);
    Mat4::from_quat(rotation.inverse())
}

impl FrameUniforms {
    pub fn new(inputs: &FrameInputs) -> Self {
        let view_proj = inputs.projection * inputs.view;
        let (environment_flag, cube_flag, env_lod) = match inputs.environment {
            EnvironmentBinding::None => (0.0, 0.0, 0.0),
            EnvironmentBinding::Equirect { max_lod } => (1.0, 0.0, max_lod),
            EnvironmentBinding::Cube => (1.0, 1.0, 0.0),
        };
        let background = match inputs.background {
            Some(bg) => [bg.intensity, bg.blurriness.clamp(0.0, 1.0) * bg.max_lod, 1.0, 0.0],
            None => [0.0; 4],
        };
        let background_rotation = inputs
            .background
            .map(|bg| lookup_rotation(bg.rotation))
            .unwrap_or(Mat4::IDENTITY);

        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_position: inputs.camera_position.extend(1.0).to_array(),
            environment_rotation: lookup_rotation(inputs.environment_rotation).to_cols_array_2d(),
            background_rotation: background_rotation.to_cols_array_2d(),
            environment: [inputs.environment_intensity, cube_flag, env_lod, environment_flag],
            background,
        }
    }
}

/// Mirrors `Object` in scene.wgsl.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub material: [f32; 4],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceInputs {
    pub base_color: [f32; 4],
    pub roughness: f32,
    pub metalness: f32,
    pub unlit: bool,
    pub textured: bool,
}

impl ObjectUniforms {
    pub fn new(model: Mat4, surface: &SurfaceInputs) -> Self {
        let normal_matrix = model.inverse().transpose();
        let flag = |value: bool| if value { 1.0 } else { 0.0 };
        Self {
            model: model.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            base_color: surface.base_color,
            material: [
                surface.roughness,
                surface.metalness,
                flag(surface.unlit),
                flag(surface.textured),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> FrameInputs {
        FrameInputs {
            view: Mat4::look_at_rh(Vec3::new(-0.5, 1.0, 2.0), Vec3::new(0.0, 0.4, 0.0), Vec3::Y),
            projection: Mat4::perspective_rh(45f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0),
            camera_position: Vec3::new(-0.5, 1.0, 2.0),
            environment: EnvironmentBinding::Equirect { max_lod: 11.0 },
            environment_intensity: 0.75,
            environment_rotation: Vec3::new(0.0, 3.0, 0.0),
            background: Some(BackgroundInputs {
                intensity: 0.5,
                blurriness: 0.8,
                max_lod: 10.0,
                rotation: Vec3::ZERO,
            }),
        }
    }

    #[test]
    fn uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 4 * 64 + 3 * 16);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 2 * 64 + 2 * 16);
    }

    #[test]
    fn frame_flags_and_lods() {
        let frame = FrameUniforms::new(&inputs());
        assert_eq!(frame.environment, [0.75, 0.0, 11.0, 1.0]);
        assert!((frame.background[1] - 8.0).abs() < 1e-5);
        assert_eq!(frame.background[2], 1.0);

        let mut cube = inputs();
        cube.environment = EnvironmentBinding::Cube;
        cube.background = None;
        let frame = FrameUniforms::new(&cube);
        assert_eq!(frame.environment[1], 1.0);
        assert_eq!(frame.background, [0.0; 4]);
        assert_eq!(frame.background_rotation, Mat4::IDENTITY.to_cols_array_2d());
    }

    #[test]
    fn lookup_rotation_undoes_environment_rotation() {
        let euler = Vec3::new(0.2, 3.0, -0.4);
        let rotated = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z) * Vec3::X;
        let back = lookup_rotation(euler).transform_vector3(rotated);
        assert!(back.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn unlit_flag_is_packed() {
        let uniforms = ObjectUniforms::new(
            Mat4::from_scale(Vec3::splat(0.1)),
            &SurfaceInputs {
                base_color: [1.0; 4],
                roughness: 1.0,
                metalness: 0.25,
                unlit: true,
                textured: false,
            },
        );
        assert_eq!(uniforms.material, [1.0, 0.25, 1.0, 0.0]);
        // Uniform scale keeps normals parallel, only rescaled.
        assert!((uniforms.normal_matrix[0][0] - 10.0).abs() < 1e-4);
    }
}
