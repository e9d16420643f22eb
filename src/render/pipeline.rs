use bytemuck::{Pod, Zeroable};

use super::canvas::{Composite, FillRule};
use super::color::ColorSpace;

/// Float canvas storage, wide enough for HDR headroom.
pub const CANVAS_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// 8-bit frames handed to the encoder.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
/// Unquantized readback of canvas content.
pub const EXPORT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
pub const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;
pub const SAMPLE_COUNT: u32 = 4;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PaintUniforms {
    /// Straight (non-premultiplied) color; alpha in `color[3]`.
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BlitUniforms {
    pub scale: f32,
    pub headroom: f32,
    pub convert: f32,
    pub _padding: f32,
}

impl BlitUniforms {
    pub fn new(scale: f32, headroom: f32, from: ColorSpace, to: ColorSpace) -> Self {
        let convert = match (from, to) {
            (ColorSpace::DisplayP3, ColorSpace::Srgb) => 1.0,
            (ColorSpace::Srgb, ColorSpace::DisplayP3) => 2.0,
            _ => 0.0,
        };
        Self {
            scale,
            headroom,
            convert,
            _padding: 0.0,
        }
    }
}

/// How a stencil pass marks covered samples before the cover pass paints them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Coverage {
    Winding(FillRule),
    /// Any covered sample counts once; used for strokes.
    Union,
}

pub struct CanvasPipelines {
    pub paint_layout: wgpu::BindGroupLayout,
    pub blit_layout: wgpu::BindGroupLayout,
    pub sampler: wgpu::Sampler,
    stencil_nonzero: wgpu::RenderPipeline,
    stencil_evenodd: wgpu::RenderPipeline,
    stencil_union: wgpu::RenderPipeline,
    cover_over: wgpu::RenderPipeline,
    cover_lighter: wgpu::RenderPipeline,
    plain_over: wgpu::RenderPipeline,
    plain_lighter: wgpu::RenderPipeline,
    blit: wgpu::RenderPipeline,
    present: wgpu::RenderPipeline,
    export: wgpu::RenderPipeline,
}

const LIGHTER: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

const PATH_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

struct Target {
    format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    write_mask: wgpu::ColorWrites,
    /// Canvas passes are multisampled and carry a stencil attachment.
    stencil: Option<wgpu::StencilState>,
}

impl CanvasPipelines {
    pub fn new(device: &wgpu::Device) -> Self {
        let fill_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fill_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/fill.wgsl").into()),
        });
        let blit_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/blit.wgsl").into()),
        });

        let paint_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("paint_bind_group_layout"),
            entries: &[uniform_entry(0)],
        });

        let blit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit_bind_group_layout"),
            entries: &[
                uniform_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("canvas_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let paint_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("paint_pipeline_layout"),
            bind_group_layouts: &[&paint_layout],
            push_constant_ranges: &[],
        });
        let blit_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit_pipeline_layout"),
            bind_group_layouts: &[&blit_layout],
            push_constant_ranges: &[],
        });

        let path = |label: &str, target: Target| {
            build(device, label, &paint_pipeline_layout, &fill_shader, true, target)
        };
        let fullscreen = |label: &str, target: Target| {
            build(device, label, &blit_pipeline_layout, &blit_shader, false, target)
        };

        let stencil_only = |face: wgpu::StencilFaceState, back: wgpu::StencilFaceState| Target {
            format: CANVAS_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::empty(),
            stencil: Some(wgpu::StencilState {
                front: face,
                back,
                read_mask: 0xff,
                write_mask: 0xff,
            }),
        };
        let covered = wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::NotEqual,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::Keep,
        };
        let painted = |blend: wgpu::BlendState, stencil: wgpu::StencilState| Target {
            format: CANVAS_FORMAT,
            blend: Some(blend),
            write_mask: wgpu::ColorWrites::ALL,
            stencil: Some(stencil),
        };
        let cover = wgpu::StencilState {
            front: covered,
            back: covered,
            read_mask: 0xff,
            write_mask: 0,
        };
        let ignore = wgpu::StencilState::default();

        Self {
            stencil_nonzero: path(
                "stencil_nonzero",
                stencil_only(writes(wgpu::StencilOperation::IncrementWrap), writes(wgpu::StencilOperation::DecrementWrap)),
            ),
            stencil_evenodd: path(
                "stencil_evenodd",
                stencil_only(writes(wgpu::StencilOperation::Invert), writes(wgpu::StencilOperation::Invert)),
            ),
            stencil_union: path(
                "stencil_union",
                stencil_only(writes(wgpu::StencilOperation::Replace), writes(wgpu::StencilOperation::Replace)),
            ),
            cover_over: path("cover_over", painted(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING, cover.clone())),
            cover_lighter: path("cover_lighter", painted(LIGHTER, cover)),
            plain_over: path("plain_over", painted(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING, ignore.clone())),
            plain_lighter: path("plain_lighter", painted(LIGHTER, ignore.clone())),
            blit: fullscreen("blit", painted(wgpu::BlendState::REPLACE, ignore)),
            present: fullscreen(
                "present",
                Target {
                    format: OUTPUT_FORMAT,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                    stencil: None,
                },
            ),
            export: fullscreen(
                "export",
                Target {
                    format: EXPORT_FORMAT,
                    // 32-bit float targets are not blendable.
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                    stencil: None,
                },
            ),
            paint_layout,
            blit_layout,
            sampler,
        }
    }

    pub fn stencil(&self, coverage: Coverage) -> &wgpu::RenderPipeline {
        match coverage {
            Coverage::Winding(FillRule::NonZero) => &self.stencil_nonzero,
            Coverage::Winding(FillRule::EvenOdd) => &self.stencil_evenodd,
            Coverage::Union => &self.stencil_union,
        }
    }

    /// Color pass; `covered` restricts it to samples marked by a stencil pass.
    pub fn paint(&self, composite: Composite, covered: bool) -> &wgpu::RenderPipeline {
        match (composite, covered) {
            (Composite::SourceOver, true) => &self.cover_over,
            (Composite::Lighter, true) => &self.cover_lighter,
            (Composite::SourceOver, false) => &self.plain_over,
            (Composite::Lighter, false) => &self.plain_lighter,
        }
    }

    pub fn blit(&self) -> &wgpu::RenderPipeline {
        &self.blit
    }

    pub fn present(&self) -> &wgpu::RenderPipeline {
        &self.present
    }

    pub fn export(&self) -> &wgpu::RenderPipeline {
        &self.export
    }
}

fn writes(op: wgpu::StencilOperation) -> wgpu::StencilFaceState {
    wgpu::StencilFaceState {
        compare: wgpu::CompareFunction::Always,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op: op,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn build(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    path_vertices: bool,
    target: Target,
) -> wgpu::RenderPipeline {
    let layouts = [wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &PATH_ATTRIBUTES,
    }];
    let buffers: &[wgpu::VertexBufferLayout] = if path_vertices { &layouts } else { &[] };
    let (depth_stencil, count) = match target.stencil {
        Some(stencil) => (
            Some(wgpu::DepthStencilState {
                format: STENCIL_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil,
                bias: wgpu::DepthBiasState::default(),
            }),
            SAMPLE_COUNT,
        ),
        None => (None, 1),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: target.format,
                blend: target.blend,
                write_mask: target.write_mask,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil,
        multisample: wgpu::MultisampleState {
            count,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}
