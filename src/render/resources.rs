//! GPU-side copies of scene assets.

use super::pipelines::{SceneLayouts, CAPTURE_FORMAT, DEPTH_FORMAT};
use super::uniforms::{FrameUniforms, ObjectUniforms};
use crate::assets::{EnvMap, RgbaTexture};
use crate::scene::geometry::MeshData;
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

pub struct GpuEnvMap {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub max_lod: f32,
}

impl GpuEnvMap {
    pub fn upload(device: &wgpu::Device, queue: &wgpu::Queue, map: &EnvMap) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(map.label()),
            size: wgpu::Extent3d {
                width: map.width(),
                height: map.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: map.mip_count(),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (mip_level, level) in map.levels().iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: mip_level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytemuck::cast_slice(&level.texels),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(level.width * 8),
                    rows_per_image: Some(level.height),
                },
                wgpu::Extent3d {
                    width: level.width,
                    height: level.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
            max_lod: map.mip_count().saturating_sub(1) as f32,
        }
    }
}

pub fn upload_rgba_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &RgbaTexture,
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: image.width.max(1),
        height: image.height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Model Texture"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &image.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * 4),
            rows_per_image: Some(size.height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// 1×1 placeholders bound wherever a slot has nothing to sample.
pub struct DummyTextures {
    pub white: wgpu::TextureView,
    pub black_2d: wgpu::TextureView,
    pub black_cube: wgpu::TextureView,
}

impl DummyTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let white = upload_rgba_texture(
            device,
            queue,
            &RgbaTexture {
                id: 0,
                width: 1,
                height: 1,
                pixels: vec![255; 4],
            },
        );
        let black = |layers: u32, dimension| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some("Black Placeholder"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: layers,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            // Fresh textures are zero-initialized.
            texture.create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(dimension),
                ..Default::default()
            })
        };
        Self {
            white,
            black_2d: black(1, wgpu::TextureViewDimension::D2),
            black_cube: black(6, wgpu::TextureViewDimension::Cube),
        }
    }
}

pub struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    wire: Option<(wgpu::Buffer, u32)>,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, label: &str, mesh: &MeshData, with_wire: bool) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let wire = with_wire.then(|| {
            let indices = mesh.wire_indices();
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
            (buffer, indices.len() as u32)
        });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            wire,
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, wireframe: bool) {
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        match (&self.wire, wireframe) {
            (Some((buffer, count)), true) => {
                pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..*count, 0, 0..1);
            }
            _ => {
                pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
        }
    }
}

/// One mesh plus its object uniforms and material bindings.
pub struct GpuDraw {
    pub mesh: GpuMesh,
    pub local_transform: Mat4,
    pub base_color: [f32; 4],
    pub textured: bool,
    uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl GpuDraw {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        layouts: &SceneLayouts,
        sampler: &wgpu::Sampler,
        mesh: GpuMesh,
        local_transform: Mat4,
        base_color: [f32; 4],
        texture: Option<&wgpu::TextureView>,
        fallback: &wgpu::TextureView,
    ) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniforms"),
            size: std::mem::size_of::<ObjectUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Object Bind Group"),
            layout: &layouts.object,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(texture.unwrap_or(fallback)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            mesh,
            local_transform,
            base_color,
            textured: texture.is_some(),
            uniform_buffer,
            bind_group,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, uniforms: &ObjectUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }
}

pub fn create_frame_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<FrameUniforms>() as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub struct FrameTextures<'a> {
    pub environment: &'a wgpu::TextureView,
    pub environment_cube: &'a wgpu::TextureView,
    pub background: &'a wgpu::TextureView,
}

pub fn create_frame_bind_group(
    device: &wgpu::Device,
    layouts: &SceneLayouts,
    buffer: &wgpu::Buffer,
    textures: &FrameTextures,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Frame Bind Group"),
        layout: &layouts.frame,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(textures.environment),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(textures.environment_cube),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(textures.background),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

pub fn create_depth_view(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    label: &str,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Face order of a wgpu cube texture with the up vector of each face.
const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// View and projection for each cube face seen from `position`.
pub fn cube_face_matrices(position: Vec3, near: f32, far: f32) -> [(Mat4, Mat4); 6] {
    // Cube faces store their rows top-down in the opposite sense of a
    // right-handed camera with these up vectors.
    let projection =
        Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0)) * Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near, far);
    CUBE_FACES.map(|(direction, up)| (Mat4::look_to_rh(position, direction, up), projection))
}

/// Render target a cube capture draws into, plus its per-face frame state.
pub struct CubeCaptureTarget {
    _texture: wgpu::Texture,
    pub cube_view: wgpu::TextureView,
    pub face_views: Vec<wgpu::TextureView>,
    pub depth_view: wgpu::TextureView,
    pub face_buffers: Vec<wgpu::Buffer>,
    pub face_bind_groups: Vec<wgpu::BindGroup>,
    pub near: f32,
    pub far: f32,
}

impl CubeCaptureTarget {
    pub fn new(
        device: &wgpu::Device,
        layouts: &SceneLayouts,
        dummies: &DummyTextures,
        sampler: &wgpu::Sampler,
        resolution: u32,
        near: f32,
        far: f32,
    ) -> Self {
        let resolution = resolution.max(1);
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Cube Capture"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: CAPTURE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let cube_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Cube Capture View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let face_views = (0..6)
            .map(|face| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Cube Capture Face"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: face,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        let depth_view = create_depth_view(device, resolution, resolution, "Cube Capture Depth");

        // The capture cannot sample itself, so faces see no environment.
        let textures = FrameTextures {
            environment: &dummies.black_2d,
            environment_cube: &dummies.black_cube,
            background: &dummies.black_2d,
        };
        let face_buffers: Vec<wgpu::Buffer> = (0..6)
            .map(|_| create_frame_buffer(device, "Cube Capture Frame Uniforms"))
            .collect();
        let face_bind_groups = face_buffers
            .iter()
            .map(|buffer| create_frame_bind_group(device, layouts, buffer, &textures, sampler))
            .collect();

        Self {
            _texture: texture,
            cube_view,
            face_views,
            depth_view,
            face_buffers,
            face_bind_groups,
            near,
            far,
        }
    }
}
