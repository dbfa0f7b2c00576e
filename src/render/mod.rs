mod camera;
mod egui_overlay;
mod pipelines;
mod resources;
mod uniforms;

pub use camera::OrbitControls;

use crate::app::EguiFrameOutput;
use crate::assets::EnvMap;
use crate::scene::geometry::{self, GROUNDED_SKYBOX_RESOLUTION};
use crate::scene::{EnvironmentSource, ObjectId, SceneObject, SceneObjectKind, SceneState};
use egui_overlay::EguiOverlay;
use glam::{Mat4, Vec3};
use pipelines::{SceneLayouts, ScenePipelines, CAPTURE_FORMAT};
use resources::{
    create_depth_view, create_frame_bind_group, create_frame_buffer, cube_face_matrices,
    upload_rgba_texture, CubeCaptureTarget, DummyTextures, FrameTextures, GpuDraw, GpuEnvMap,
    GpuMesh,
};
use std::collections::HashMap;
use std::sync::Arc;
use uniforms::{
    BackgroundInputs, EnvironmentBinding, FrameInputs, FrameUniforms, ObjectUniforms,
    SurfaceInputs,
};
use winit::dpi::PhysicalSize;
use winit::window::Window;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to create window surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),
    #[error("window surface reports no supported formats")]
    NoSurfaceFormat,
    #[error("failed to acquire frame: {0}")]
    FrameUnavailable(#[source] wgpu::SurfaceError),
}

enum GpuObject {
    Skybox(GpuDraw),
    Accent(GpuDraw),
    Model(Vec<GpuDraw>),
    Capture(CubeCaptureTarget),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvironmentKey {
    None,
    Map(u64),
    Capture(ObjectId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameBindingKey {
    environment: EnvironmentKey,
    background: Option<u64>,
}

pub struct RenderContext {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    layouts: SceneLayouts,
    surface_pipelines: ScenePipelines,
    capture_pipelines: ScenePipelines,
    environment_sampler: wgpu::Sampler,
    material_sampler: wgpu::Sampler,
    dummies: DummyTextures,
    frame_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    frame_binding_key: FrameBindingKey,
    env_maps: HashMap<u64, GpuEnvMap>,
    objects: HashMap<ObjectId, GpuObject>,
    egui: EguiOverlay,
}

impl RenderContext {
    pub fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let window_size = window.inner_size();
        let width = window_size.width.max(1);
        let height = window_size.height.max(1);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        log::info!(
            "Using GPU adapter {} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Envmap Viewer Device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            experimental_features: Default::default(),
            trace: wgpu::Trace::Off,
        }))?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or(RenderError::NoSurfaceFormat)?;
        let alpha_mode = capabilities
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("Surface configured {}x{} ({:?})", width, height, format);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });
        let layouts = SceneLayouts::new(&device);
        let surface_pipelines = ScenePipelines::new(&device, &shader, &layouts, format);
        let capture_pipelines = ScenePipelines::new(&device, &shader, &layouts, CAPTURE_FORMAT);

        let environment_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let material_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let dummies = DummyTextures::new(&device, &queue);
        let frame_buffer = create_frame_buffer(&device, "Frame Uniforms");
        let frame_bind_group = create_frame_bind_group(
            &device,
            &layouts,
            &frame_buffer,
            &FrameTextures {
                environment: &dummies.black_2d,
                environment_cube: &dummies.black_cube,
                background: &dummies.black_2d,
            },
            &environment_sampler,
        );
        let depth_view = create_depth_view(&device, width, height, "Depth Buffer");
        let egui = EguiOverlay::new(&device, format);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_view,
            layouts,
            surface_pipelines,
            capture_pipelines,
            environment_sampler,
            material_sampler,
            dummies,
            frame_buffer,
            frame_bind_group,
            frame_binding_key: FrameBindingKey {
                environment: EnvironmentKey::None,
                background: None,
            },
            env_maps: HashMap::new(),
            objects: HashMap::new(),
            egui,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let width = new_size.width.max(1);
        let height = new_size.height.max(1);
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        self.depth_view = create_depth_view(&self.device, width, height, "Depth Buffer");
    }

    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }

    pub fn viewport_height(&self) -> f32 {
        self.config.height as f32
    }

    /// Draw one frame. `capture` names a cube capture to refresh first.
    pub fn render(
        &mut self,
        scene: &mut SceneState,
        camera: &OrbitControls,
        capture: Option<ObjectId>,
        ui: Option<&EguiFrameOutput>,
    ) -> Result<(), RenderError> {
        self.sync(scene);

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring frame; skipping");
                return Ok(());
            }
            Err(err) => return Err(RenderError::FrameUnavailable(err)),
        };
        let target = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.write_object_uniforms(scene);
        self.update_frame_bindings(scene);
        let inputs = self.frame_inputs(scene, camera);
        self.queue.write_buffer(
            &self.frame_buffer,
            0,
            bytemuck::bytes_of(&FrameUniforms::new(&inputs)),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        if let Some(id) = capture {
            self.render_capture(&mut encoder, scene, id);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(depth_attachment(&self.depth_view)),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            draw_scene(
                &mut pass,
                &self.surface_pipelines,
                &self.frame_bind_group,
                scene,
                &self.objects,
                inputs.background.is_some(),
            );
        }

        if let Some(ui) = ui {
            self.egui
                .render(&self.device, &self.queue, &mut encoder, &target, ui);
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Bring GPU resources in line with the scene model.
    fn sync(&mut self, scene: &mut SceneState) {
        for id in scene.take_released() {
            if self.objects.remove(&id).is_some() {
                log::debug!("Released GPU resources of object {}", id.raw());
            }
        }

        for object in scene.objects() {
            if !self.objects.contains_key(&object.id) {
                let gpu = self.upload_object(object);
                self.objects.insert(object.id, gpu);
            }
        }

        let env = scene.environment();
        if let Some(map) = &env.background {
            ensure_env_map(&self.device, &self.queue, &mut self.env_maps, map);
        }
        if let Some(EnvironmentSource::Map(map)) = &env.environment {
            ensure_env_map(&self.device, &self.queue, &mut self.env_maps, map);
        }

        let referenced = scene.referenced_env_maps();
        let before = self.env_maps.len();
        self.env_maps.retain(|id, _| referenced.contains(id));
        if self.env_maps.len() != before {
            log::debug!("Evicted {} env map texture(s)", before - self.env_maps.len());
        }
    }

    fn upload_object(&mut self, object: &SceneObject) -> GpuObject {
        match &object.kind {
            SceneObjectKind::GroundedSkybox(data) => {
                let mesh =
                    geometry::grounded_skybox(data.height, data.radius, GROUNDED_SKYBOX_RESOLUTION);
                let gpu_mesh = GpuMesh::new(&self.device, "Grounded Skybox", &mesh, true);
                let env = ensure_env_map(&self.device, &self.queue, &mut self.env_maps, &data.map);
                GpuObject::Skybox(GpuDraw::new(
                    &self.device,
                    &self.layouts,
                    &self.environment_sampler,
                    gpu_mesh,
                    Mat4::IDENTITY,
                    [1.0; 4],
                    Some(&env.view),
                    &self.dummies.white,
                ))
            }
            SceneObjectKind::Accent(data) => {
                let mesh = geometry::torus(data.radius, data.tube);
                let gpu_mesh = GpuMesh::new(&self.device, "Accent", &mesh, false);
                let [r, g, b] = data.color;
                GpuObject::Accent(GpuDraw::new(
                    &self.device,
                    &self.layouts,
                    &self.material_sampler,
                    gpu_mesh,
                    Mat4::IDENTITY,
                    [r, g, b, 1.0],
                    None,
                    &self.dummies.white,
                ))
            }
            SceneObjectKind::CubeCapture(data) => {
                log::info!(
                    "Creating {}x{} cube capture for object {}",
                    data.resolution,
                    data.resolution,
                    object.id.raw()
                );
                GpuObject::Capture(CubeCaptureTarget::new(
                    &self.device,
                    &self.layouts,
                    &self.dummies,
                    &self.environment_sampler,
                    data.resolution,
                    data.near,
                    data.far,
                ))
            }
            SceneObjectKind::Model(data) => {
                let mut textures: HashMap<u64, wgpu::TextureView> = HashMap::new();
                let draws = data
                    .model
                    .primitives
                    .iter()
                    .map(|primitive| {
                        let gpu_mesh =
                            GpuMesh::new(&self.device, &data.model.name, &primitive.mesh, false);
                        let texture = primitive.base_color_texture.as_ref().map(|image| {
                            &*textures.entry(image.id).or_insert_with(|| {
                                upload_rgba_texture(&self.device, &self.queue, image)
                            })
                        });
                        GpuDraw::new(
                            &self.device,
                            &self.layouts,
                            &self.material_sampler,
                            gpu_mesh,
                            primitive.local_transform,
                            primitive.base_color,
                            texture,
                            &self.dummies.white,
                        )
                    })
                    .collect();
                GpuObject::Model(draws)
            }
        }
    }

    fn write_object_uniforms(&self, scene: &SceneState) {
        for object in scene.objects() {
            let Some(gpu) = self.objects.get(&object.id) else {
                continue;
            };
            let world = object.transform.matrix();
            match (gpu, &object.kind) {
                (GpuObject::Skybox(draw), _) | (GpuObject::Accent(draw), _) => {
                    let surface = SurfaceInputs {
                        base_color: draw.base_color,
                        roughness: 1.0,
                        metalness: 0.0,
                        unlit: true,
                        textured: draw.textured,
                    };
                    draw.write(&self.queue, &ObjectUniforms::new(world, &surface));
                }
                (GpuObject::Model(draws), SceneObjectKind::Model(data)) => {
                    for draw in draws {
                        let surface = SurfaceInputs {
                            base_color: draw.base_color,
                            roughness: data.material.roughness,
                            metalness: data.material.metalness,
                            unlit: false,
                            textured: draw.textured,
                        };
                        draw.write(
                            &self.queue,
                            &ObjectUniforms::new(world * draw.local_transform, &surface),
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn binding_key(&self, scene: &SceneState) -> FrameBindingKey {
        let env = scene.environment();
        let environment = match &env.environment {
            Some(EnvironmentSource::Map(map)) if self.env_maps.contains_key(&map.id()) => {
                EnvironmentKey::Map(map.id())
            }
            Some(EnvironmentSource::Capture(id))
                if matches!(self.objects.get(id), Some(GpuObject::Capture(_))) =>
            {
                EnvironmentKey::Capture(*id)
            }
            _ => EnvironmentKey::None,
        };
        let background = env
            .background
            .as_ref()
            .map(|map| map.id())
            .filter(|id| self.env_maps.contains_key(id));
        FrameBindingKey {
            environment,
            background,
        }
    }

    fn update_frame_bindings(&mut self, scene: &SceneState) {
        let key = self.binding_key(scene);
        if key == self.frame_binding_key {
            return;
        }

        let environment = match key.environment {
            EnvironmentKey::Map(id) => self.env_maps.get(&id).map(|map| &map.view),
            _ => None,
        };
        let environment_cube = match key.environment {
            EnvironmentKey::Capture(id) => match self.objects.get(&id) {
                Some(GpuObject::Capture(target)) => Some(&target.cube_view),
                _ => None,
            },
            _ => None,
        };
        let background = key
            .background
            .and_then(|id| self.env_maps.get(&id))
            .map(|map| &map.view);

        self.frame_bind_group = create_frame_bind_group(
            &self.device,
            &self.layouts,
            &self.frame_buffer,
            &FrameTextures {
                environment: environment.unwrap_or(&self.dummies.black_2d),
                environment_cube: environment_cube.unwrap_or(&self.dummies.black_cube),
                background: background.unwrap_or(&self.dummies.black_2d),
            },
            &self.environment_sampler,
        );
        log::debug!("Rebuilt frame bindings: {:?}", key);
        self.frame_binding_key = key;
    }

    fn frame_inputs(&self, scene: &SceneState, camera: &OrbitControls) -> FrameInputs {
        let env = scene.environment();
        let key = self.frame_binding_key;
        let environment = match key.environment {
            EnvironmentKey::None => EnvironmentBinding::None,
            EnvironmentKey::Map(id) => EnvironmentBinding::Equirect {
                max_lod: self.env_maps.get(&id).map_or(0.0, |map| map.max_lod),
            },
            EnvironmentKey::Capture(_) => EnvironmentBinding::Cube,
        };
        let background = key.background.map(|id| BackgroundInputs {
            intensity: env.background_intensity,
            blurriness: env.background_blurriness,
            max_lod: self.env_maps.get(&id).map_or(0.0, |map| map.max_lod),
            rotation: env.background_rotation,
        });
        FrameInputs {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(self.aspect()),
            camera_position: camera.position(),
            environment,
            environment_intensity: env.environment_intensity,
            environment_rotation: env.environment_rotation,
            background,
        }
    }

    fn render_capture(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        scene: &SceneState,
        id: ObjectId,
    ) {
        let (Some(object), Some(GpuObject::Capture(target))) = (scene.get(id), self.objects.get(&id))
        else {
            log::debug!("Capture {} not ready; skipping refresh", id.raw());
            return;
        };
        let position: Vec3 = object.transform.position;
        let faces = cube_face_matrices(position, target.near, target.far);

        for (face, (view, projection)) in faces.into_iter().enumerate() {
            let uniforms = FrameUniforms::new(&FrameInputs {
                view,
                projection,
                camera_position: position,
                environment: EnvironmentBinding::None,
                environment_intensity: 0.0,
                environment_rotation: Vec3::ZERO,
                background: None,
            });
            self.queue
                .write_buffer(&target.face_buffers[face], 0, bytemuck::bytes_of(&uniforms));

            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Cube Capture Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.face_views[face],
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(depth_attachment(&target.depth_view)),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            draw_scene(
                &mut pass,
                &self.capture_pipelines,
                &target.face_bind_groups[face],
                scene,
                &self.objects,
                false,
            );
        }
    }
}

fn ensure_env_map<'a>(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    cache: &'a mut HashMap<u64, GpuEnvMap>,
    map: &EnvMap,
) -> &'a GpuEnvMap {
    cache.entry(map.id()).or_insert_with(|| {
        log::info!(
            "Uploading env map {} ({}x{}, {} mips)",
            map.label(),
            map.width(),
            map.height(),
            map.mip_count()
        );
        GpuEnvMap::upload(device, queue, map)
    })
}

fn depth_attachment(view: &wgpu::TextureView) -> wgpu::RenderPassDepthStencilAttachment<'_> {
    wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load: wgpu::LoadOp::Clear(1.0),
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    }
}

/// Background, then skyboxes, then models and accents.
fn draw_scene(
    pass: &mut wgpu::RenderPass<'_>,
    pipelines: &ScenePipelines,
    frame_bind_group: &wgpu::BindGroup,
    scene: &SceneState,
    objects: &HashMap<ObjectId, GpuObject>,
    draw_background: bool,
) {
    pass.set_bind_group(0, frame_bind_group, &[]);

    if draw_background {
        pass.set_pipeline(&pipelines.background);
        pass.draw(0..3, 0..1);
    }

    for object in scene.objects() {
        if let (Some(GpuObject::Skybox(draw)), SceneObjectKind::GroundedSkybox(data)) =
            (objects.get(&object.id), &object.kind)
        {
            let pipeline = if data.wireframe {
                &pipelines.skybox_wire
            } else {
                &pipelines.skybox
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(1, &draw.bind_group, &[]);
            draw.mesh.draw(pass, data.wireframe);
        }
    }

    pass.set_pipeline(&pipelines.mesh);
    for object in scene.objects() {
        match objects.get(&object.id) {
            Some(GpuObject::Model(draws)) => {
                for draw in draws {
                    pass.set_bind_group(1, &draw.bind_group, &[]);
                    draw.mesh.draw(pass, false);
                }
            }
            Some(GpuObject::Accent(draw)) => {
                pass.set_bind_group(1, &draw.bind_group, &[]);
                draw.mesh.draw(pass, false);
            }
            _ => {}
        }
    }
}
