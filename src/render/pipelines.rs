//! Bind group layouts and render pipelines for the scene shader.
//!
//! Pipelines are built once per color target format: the window surface and
//! the half-float cube capture faces.

use crate::scene::geometry::MeshVertex;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const CAPTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

pub struct SceneLayouts {
    pub frame: wgpu::BindGroupLayout,
    pub object: wgpu::BindGroupLayout,
}

impl SceneLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = |binding, visibility| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let texture = |binding, view_dimension| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension,
                multisampled: false,
            },
            count: None,
        };
        let sampler = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let frame = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                uniform(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                texture(1, wgpu::TextureViewDimension::D2),
                texture(2, wgpu::TextureViewDimension::Cube),
                texture(3, wgpu::TextureViewDimension::D2),
                sampler(4),
            ],
        });
        let object = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object Bind Group Layout"),
            entries: &[
                uniform(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                texture(1, wgpu::TextureViewDimension::D2),
                sampler(2),
            ],
        });

        Self { frame, object }
    }
}

/// Every pipeline needed to draw the scene into one color format.
pub struct ScenePipelines {
    pub background: wgpu::RenderPipeline,
    pub skybox: wgpu::RenderPipeline,
    pub skybox_wire: wgpu::RenderPipeline,
    pub mesh: wgpu::RenderPipeline,
}

#[derive(Clone, Copy)]
struct PipelineConfig<'a> {
    label: &'a str,
    vertex_entry: &'a str,
    fragment_entry: &'a str,
    topology: wgpu::PrimitiveTopology,
    depth_write: bool,
    depth_compare: wgpu::CompareFunction,
    with_vertices: bool,
}

impl ScenePipelines {
    pub fn new(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        layouts: &SceneLayouts,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let build = |config: PipelineConfig| {
            create_pipeline(device, shader, layouts, color_format, config)
        };
        let skybox = PipelineConfig {
            label: "Skybox Pipeline",
            vertex_entry: "vs_mesh",
            fragment_entry: "fs_skybox",
            topology: wgpu::PrimitiveTopology::TriangleList,
            depth_write: false,
            depth_compare: wgpu::CompareFunction::LessEqual,
            with_vertices: true,
        };

        Self {
            background: build(PipelineConfig {
                label: "Background Pipeline",
                vertex_entry: "vs_background",
                fragment_entry: "fs_background",
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth_write: false,
                depth_compare: wgpu::CompareFunction::Always,
                with_vertices: false,
            }),
            skybox: build(skybox),
            skybox_wire: build(PipelineConfig {
                label: "Skybox Wireframe Pipeline",
                topology: wgpu::PrimitiveTopology::LineList,
                ..skybox
            }),
            mesh: build(PipelineConfig {
                label: "Mesh Pipeline",
                vertex_entry: "vs_mesh",
                fragment_entry: "fs_mesh",
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth_write: true,
                depth_compare: wgpu::CompareFunction::Less,
                with_vertices: true,
            }),
        }
    }
}

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layouts: &SceneLayouts,
    color_format: wgpu::TextureFormat,
    config: PipelineConfig,
) -> wgpu::RenderPipeline {
    // The fullscreen background only reads the frame group.
    let bind_group_layouts: &[&wgpu::BindGroupLayout] = if config.with_vertices {
        &[&layouts.frame, &layouts.object]
    } else {
        &[&layouts.frame]
    };
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(config.label),
        bind_group_layouts,
        push_constant_ranges: &[],
    });
    let vertex_buffers = [vertex_layout()];
    let buffers: &[wgpu::VertexBufferLayout] = if config.with_vertices {
        &vertex_buffers
    } else {
        &[]
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(config.label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(config.vertex_entry),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(config.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: config.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // Skybox is seen from inside and glTF models may be double sided.
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: config.depth_write,
            depth_compare: config.depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}
