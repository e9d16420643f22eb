//! GPU drawing surface with the handful of 2D-context operations the
//! visualizer needs: path fill/stroke, additive compositing, scaled blits.
//!
//! Coordinates are centred: (0, 0) is the middle of the surface, +y points down.
//! Paths are tessellated on the CPU and drawn stencil-then-cover into a 4x
//! multisampled float target, which every pass resolves into a single-sample
//! texture that blits, snapshots and readback sample from.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::color::{Color, ColorSpace};
use super::frame::FrameReadback;
use super::geometry::Point;
use super::gpu::GpuContext;
use super::pipeline::{
    BlitUniforms, Coverage, PaintUniforms, CANVAS_FORMAT, EXPORT_FORMAT, OUTPUT_FORMAT,
    SAMPLE_COUNT, STENCIL_FORMAT,
};
use crate::error::ContextError;

/// Full-target rectangle the cover pass draws through the stencil.
const COVER_QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
];

/// Largest half-float; restoring a surface from its own snapshot must not clamp.
const UNCLAMPED: f32 = 65504.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Composite {
    #[default]
    SourceOver,
    /// Additive: overlapping colors brighten.
    Lighter,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub alpha: f32,
    pub composite: Composite,
}

impl Paint {
    pub fn solid(color: Color) -> Self {
        Self {
            color,
            alpha: 1.0,
            composite: Composite::SourceOver,
        }
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha.clamp(0.0, 1.0);
        self
    }

    pub fn with_composite(mut self, composite: Composite) -> Self {
        self.composite = composite;
        self
    }
}

#[derive(Clone, Debug, Default)]
struct SubPath {
    points: Vec<Point>,
    closed: bool,
}

/// Polyline path made of sub-paths. Filling closes every sub-path implicitly.
#[derive(Clone, Debug, Default)]
pub struct Path {
    subpaths: Vec<SubPath>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.subpaths.push(SubPath {
            points: vec![Point { x, y }],
            closed: false,
        });
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        match self.subpaths.last_mut() {
            Some(sp) if !sp.closed => sp.points.push(Point { x, y }),
            Some(sp) => {
                // After close() the pen sits at the start of the closed sub-path.
                let start = sp.points[0];
                self.subpaths.push(SubPath {
                    points: vec![start, Point { x, y }],
                    closed: false,
                });
            }
            None => self.move_to(x, y),
        }
    }

    /// `move_to` for the first vertex of a sweep, `line_to` afterwards.
    pub fn vertex(&mut self, first: bool, p: Point) {
        if first {
            self.move_to(p.x, p.y);
        } else {
            self.line_to(p.x, p.y);
        }
    }

    pub fn close(&mut self) {
        if let Some(sp) = self.subpaths.last_mut() {
            sp.closed = true;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(|sp| sp.points.len() < 2)
    }

    pub fn subpath_count(&self) -> usize {
        self.subpaths.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.subpaths.iter().map(|sp| sp.points.len()).sum()
    }

    /// Signed shoelace area per sub-path (positive is clockwise on screen).
    pub fn signed_areas(&self) -> Vec<f64> {
        self.subpaths.iter().map(|sp| signed_area(&sp.points)).collect()
    }
}

fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

/// One triangle fan per sub-path. The stencil pass counts how often each
/// sample is wound, so the fans may overlap and self-intersect freely.
fn fill_triangles(path: &Path) -> Vec<Point> {
    let mut tris = Vec::new();
    for sp in path.subpaths.iter().filter(|sp| sp.points.len() > 2) {
        let pivot = sp.points[0];
        for pair in sp.points[1..].windows(2) {
            tris.extend([pivot, pair[0], pair[1]]);
        }
    }
    tris
}

/// A quad per segment, plus octagon joins once the stroke is wider than 1.5 px.
fn stroke_triangles(path: &Path, width: f64) -> Vec<Point> {
    let mut tris = Vec::new();
    if width <= 0.0 {
        return tris;
    }
    let half = 0.5 * width;
    for sp in &path.subpaths {
        let mut pts = sp.points.clone();
        if sp.closed && pts.len() > 1 {
            pts.push(pts[0]);
        }
        for seg in pts.windows(2) {
            let (a, b) = (seg[0], seg[1]);
            let (dx, dy) = (b.x - a.x, b.y - a.y);
            let len = (dx * dx + dy * dy).sqrt();
            if len <= f64::EPSILON {
                continue;
            }
            let (nx, ny) = (-dy / len * half, dx / len * half);
            let q = [
                Point { x: a.x + nx, y: a.y + ny },
                Point { x: b.x + nx, y: b.y + ny },
                Point { x: b.x - nx, y: b.y - ny },
                Point { x: a.x - nx, y: a.y - ny },
            ];
            tris.extend([q[0], q[1], q[2], q[0], q[2], q[3]]);
        }
        if half <= 0.75 {
            continue;
        }
        let joins = if sp.closed { pts.len().saturating_sub(1) } else { pts.len().saturating_sub(2) };
        for p in pts.iter().skip(if sp.closed { 0 } else { 1 }).take(joins) {
            let d = disc(*p, half);
            for pair in d[1..].windows(2) {
                tris.extend([d[0], pair[0], pair[1]]);
            }
        }
    }
    tris
}

fn disc(c: Point, r: f64) -> Vec<Point> {
    (0..8)
        .map(|k| {
            let a = k as f64 * std::f64::consts::FRAC_PI_4;
            Point {
                x: c.x + r * a.cos(),
                y: c.y + r * a.sin(),
            }
        })
        .collect()
}

/// Centred pixel coordinates to clip space. Triangles with a non-finite
/// corner are dropped.
fn clip_space(tris: &[Point], width: u32, height: u32) -> Vec<[f32; 2]> {
    let (sx, sy) = (2.0 / width as f64, -2.0 / height as f64);
    tris.chunks_exact(3)
        .filter(|t| t.iter().all(|p| p.x.is_finite() && p.y.is_finite()))
        .flatten()
        .map(|p| [(p.x * sx) as f32, (p.y * sy) as f32])
        .collect()
}

struct Targets {
    msaa: wgpu::TextureView,
    resolved: wgpu::Texture,
    resolved_view: wgpu::TextureView,
    stencil: wgpu::TextureView,
    frame: FrameReadback,
}

impl Targets {
    fn new(gpu: &GpuContext, width: u32, height: u32) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = |label: &str,
                       format: wgpu::TextureFormat,
                       sample_count: u32,
                       usage: wgpu::TextureUsages| {
            gpu.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let msaa = texture(
            "canvas_msaa",
            CANVAS_FORMAT,
            SAMPLE_COUNT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let resolved = texture(
            "canvas_resolved",
            CANVAS_FORMAT,
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        );
        let stencil = texture(
            "canvas_stencil",
            STENCIL_FORMAT,
            SAMPLE_COUNT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let view = |t: &wgpu::Texture| t.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            msaa: view(&msaa),
            resolved_view: view(&resolved),
            resolved,
            stencil: view(&stencil),
            frame: FrameReadback::new(gpu, width, height, OUTPUT_FORMAT),
        }
    }
}

/// Pass over the multisampled target. Stencil starts at zero in every pass.
fn canvas_pass<'e>(
    encoder: &'e mut wgpu::CommandEncoder,
    targets: &Targets,
    load: wgpu::LoadOp<wgpu::Color>,
    resolve: bool,
) -> wgpu::RenderPass<'e> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("canvas_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: &targets.msaa,
            resolve_target: resolve.then_some(&targets.resolved_view),
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: &targets.stencil,
            depth_ops: None,
            stencil_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(0),
                store: wgpu::StoreOp::Discard,
            }),
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

pub struct Surface {
    gpu: Arc<GpuContext>,
    width: u32,
    height: u32,
    space: ColorSpace,
    headroom: f32,
    targets: Targets,
    /// The resolved texture was written directly (snapshot copy) and the
    /// multisampled target has to be reloaded from it before the next draw.
    msaa_stale: bool,
}

impl Surface {
    pub fn new(
        gpu: Arc<GpuContext>,
        width: u32,
        height: u32,
        space: ColorSpace,
        headroom: f32,
    ) -> Result<Self, ContextError> {
        check_dimensions(width, height, gpu.max_dimension())?;
        let targets = Targets::new(&gpu, width, height);
        let mut surface = Self {
            gpu,
            width,
            height,
            space,
            headroom,
            targets,
            msaa_stale: false,
        };
        surface.clear();
        Ok(surface)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color_space(&self) -> ColorSpace {
        self.space
    }

    pub fn headroom(&self) -> f32 {
        self.headroom
    }

    /// Reallocate; like a canvas, resizing discards the content.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), ContextError> {
        check_dimensions(width, height, self.gpu.max_dimension())?;
        self.targets = Targets::new(&self.gpu, width, height);
        self.width = width;
        self.height = height;
        self.clear();
        Ok(())
    }

    pub fn clear(&mut self) {
        let mut encoder = self.encoder("clear_encoder");
        {
            let _pass = canvas_pass(
                &mut encoder,
                &self.targets,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                true,
            );
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.msaa_stale = false;
    }

    pub fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, paint: &Paint) {
        let c = [
            Point { x, y },
            Point { x: x + w, y },
            Point { x: x + w, y: y + h },
            Point { x, y: y + h },
        ];
        self.paint_triangles(&[c[0], c[1], c[2], c[0], c[2], c[3]], paint, None);
    }

    pub fn fill_path(&mut self, path: &Path, paint: &Paint, rule: FillRule) {
        self.paint_triangles(&fill_triangles(path), paint, Some(Coverage::Winding(rule)));
    }

    /// Stroke every segment as a quad of the given width, with rounded joins.
    /// Overlapping pieces are painted once.
    pub fn stroke_path(&mut self, path: &Path, paint: &Paint, width: f64) {
        self.paint_triangles(&stroke_triangles(path, width), paint, Some(Coverage::Union));
    }

    /// Draw `src` scaled by `scale` about the centre, replacing covered pixels.
    pub fn draw_scaled(&mut self, src: &Surface, scale: f64) {
        if !(scale.is_finite() && scale > 0.0) {
            return;
        }
        let uniforms = BlitUniforms::new(scale as f32, self.headroom, src.space, self.space);
        let bind_group = self.blit_bind_group(&src.targets.resolved_view, uniforms);

        let mut encoder = self.encoder("blit_encoder");
        self.restore_msaa(&mut encoder);
        {
            let mut pass = canvas_pass(&mut encoder, &self.targets, wgpu::LoadOp::Load, true);
            pass.set_pipeline(self.gpu.pipelines.blit());
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Full copy of `src` into this surface (top-left aligned). A surface in
    /// another color space is converted through a blit instead.
    pub fn copy_from(&mut self, src: &Surface) {
        self.clear();
        if src.space != self.space {
            self.draw_scaled(src, 1.0);
            return;
        }

        let mut encoder = self.encoder("snapshot_encoder");
        encoder.copy_texture_to_texture(
            src.targets.resolved.as_image_copy(),
            self.targets.resolved.as_image_copy(),
            wgpu::Extent3d {
                width: self.width.min(src.width),
                height: self.height.min(src.height),
                depth_or_array_layers: 1,
            },
        );
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        self.msaa_stale = true;
    }

    /// 8-bit sRGB RGBA, the layout the encoder consumes.
    pub fn to_rgba8(&self) -> Result<Vec<u8>, ContextError> {
        let uniforms = BlitUniforms::new(1.0, 1.0, self.space, ColorSpace::Srgb);
        let bind_group = self.blit_bind_group(&self.targets.resolved_view, uniforms);
        self.targets
            .frame
            .render_and_readback(&self.gpu, self.gpu.pipelines.present(), &bind_group)
    }

    /// Float RGB per pixel in the surface's own color space, clamped to headroom.
    pub fn pixels(&self) -> Result<Vec<[f32; 3]>, ContextError> {
        let export = FrameReadback::new(&self.gpu, self.width, self.height, EXPORT_FORMAT);
        let uniforms = BlitUniforms::new(1.0, self.headroom, self.space, self.space);
        let bind_group = self.blit_bind_group(&self.targets.resolved_view, uniforms);
        let bytes = export.render_and_readback(&self.gpu, self.gpu.pipelines.export(), &bind_group)?;
        Ok(bytes
            .chunks_exact(16)
            .map(|texel| {
                let [r, g, b, _]: [f32; 4] = bytemuck::pod_read_unaligned(texel);
                [r, g, b]
            })
            .collect())
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn blit_bind_group(&self, source: &wgpu::TextureView, uniforms: BlitUniforms) -> wgpu::BindGroup {
        let device = &self.gpu.device;
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("blit_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit_bind_group"),
            layout: &self.gpu.pipelines.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.gpu.pipelines.sampler),
                },
            ],
        })
    }

    /// Reload the multisampled target from the resolved texture. The pass
    /// does not resolve, since it samples the resolve target.
    fn restore_msaa(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if !self.msaa_stale {
            return;
        }
        let uniforms = BlitUniforms::new(1.0, UNCLAMPED, self.space, self.space);
        let bind_group = self.blit_bind_group(&self.targets.resolved_view, uniforms);
        {
            let mut pass = canvas_pass(
                encoder,
                &self.targets,
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                false,
            );
            pass.set_pipeline(self.gpu.pipelines.blit());
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.msaa_stale = false;
    }

    fn paint_triangles(&mut self, tris: &[Point], paint: &Paint, coverage: Option<Coverage>) {
        let mut vertices = clip_space(tris, self.width, self.height);
        if vertices.is_empty() || paint.alpha <= 0.0 {
            return;
        }
        let shape = 0..vertices.len() as u32;
        if coverage.is_some() {
            vertices.extend_from_slice(&COVER_QUAD);
        }

        let gpu = Arc::clone(&self.gpu);
        let vertex_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("path_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let [r, g, b] = paint
            .color
            .to_space(self.space)
            .channels()
            .map(|v| (v as f32).clamp(0.0, self.headroom));
        let uniforms = PaintUniforms {
            color: [r, g, b, paint.alpha],
        };
        let uniform_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("paint_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("paint_bind_group"),
            layout: &gpu.pipelines.paint_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let mut encoder = self.encoder("paint_encoder");
        self.restore_msaa(&mut encoder);
        {
            let mut pass = canvas_pass(&mut encoder, &self.targets, wgpu::LoadOp::Load, true);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.set_bind_group(0, &bind_group, &[]);
            match coverage {
                Some(coverage) => {
                    pass.set_pipeline(gpu.pipelines.stencil(coverage));
                    pass.set_stencil_reference(1);
                    pass.draw(shape.clone(), 0..1);
                    pass.set_pipeline(gpu.pipelines.paint(paint.composite, true));
                    pass.set_stencil_reference(0);
                    pass.draw(shape.end..vertices.len() as u32, 0..1);
                }
                None => {
                    pass.set_pipeline(gpu.pipelines.paint(paint.composite, false));
                    pass.draw(shape, 0..1);
                }
            }
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn check_dimensions(width: u32, height: u32, max: u32) -> Result<(), ContextError> {
    if width == 0 || height == 0 {
        return Err(ContextError::EmptySurface);
    }
    if width > max || height > max {
        return Err(ContextError::TooLarge(width, height));
    }
    Ok(())
}
