use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use glam::{DMat4, Mat4, Vec4};
use log::{debug, info, warn};
use wgpu::util::DeviceExt;

use super::{
    BlendFactor, Capability, FramebufferHandle, FramebufferStatus, GpuBackend, MatrixMode,
    PixelFormat, QuadVertex, RenderbufferHandle, TextureHandle, MAX_TEXTURE_UNITS,
};
use crate::error::{RenderError, RenderResult};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Maps OpenGL clip space (z in -1..1) onto wgpu's (z in 0..1).
#[rustfmt::skip]
const OPENGL_TO_WGPU: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

/// [`GpuBackend`] on wgpu.
///
/// Renders off-screen: the default framebuffer is a color/depth texture pair
/// of screen size. Fixed-function state (matrix stacks, blend factors, bound
/// units) is tracked on the CPU and baked into a cached pipeline plus a
/// uniform per quad. Work is encoded as it is issued and submitted by
/// [`GpuBackend::finish_frame`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    max_dimension: u32,
    screen_color: GpuTexture,
    screen_depth: GpuTexture,
    white: GpuTexture,
    shader: wgpu::ShaderModule,
    bind_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    index_buffer: wgpu::Buffer,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    textures: HashMap<TextureHandle, GpuTexture>,
    renderbuffers: HashMap<RenderbufferHandle, GpuTexture>,
    framebuffers: HashMap<FramebufferHandle, Framebuffer>,
    next_handle: u32,
    bound_framebuffer: Option<FramebufferHandle>,
    blend: (BlendFactor, BlendFactor),
    blend_enabled: bool,
    depth_test: bool,
    units: [Option<TextureHandle>; MAX_TEXTURE_UNITS],
    units_enabled: [bool; MAX_TEXTURE_UNITS],
    projection: MatrixStack,
    model_view: MatrixStack,
    viewport: Option<(i32, i32, u32, u32)>,
    encoder: Option<wgpu::CommandEncoder>,
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: PixelFormat,
    width: u32,
    height: u32,
}

impl GpuTexture {
    fn create(device: &wgpu::Device, label: &str, format: PixelFormat, width: u32, height: u32) -> Self {
        let (wgpu_format, usage) = if format.is_depth() {
            (
                DEPTH_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            )
        } else {
            (
                COLOR_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
            )
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            format,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Framebuffer {
    color: Option<TextureHandle>,
    depth: Option<DepthAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepthAttachment {
    Texture(TextureHandle),
    Renderbuffer(RenderbufferHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    blend: Option<(BlendFactor, BlendFactor)>,
    depth_test: bool,
    has_depth: bool,
}

/// Fixed-function style matrix stack. The top is always present.
#[derive(Debug, Clone)]
struct MatrixStack {
    stack: Vec<DMat4>,
}

impl MatrixStack {
    fn new() -> Self {
        Self {
            stack: vec![DMat4::IDENTITY],
        }
    }

    fn top(&self) -> DMat4 {
        self.stack.last().copied().unwrap_or(DMat4::IDENTITY)
    }

    fn top_mut(&mut self) -> &mut DMat4 {
        if self.stack.is_empty() {
            self.stack.push(DMat4::IDENTITY);
        }
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn push(&mut self) {
        let top = self.top();
        self.stack.push(top);
    }

    fn pop(&mut self) -> bool {
        if self.stack.len() > 1 {
            self.stack.pop();
            true
        } else {
            false
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct QuadUniform {
    mvp: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GpuVertex {
    position: [f32; 3],
    tex_coord: [f32; 2],
}

impl WgpuBackend {
    /// Brings up a device and an off-screen default framebuffer of
    /// `width`×`height` pixels. Fails when no adapter is available.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("screen has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| anyhow!("failed to acquire GPU adapter"))?;
        info!("Using GPU adapter {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("demo-player-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            },
            None,
        ))
        .context("failed to create GPU device")?;

        let max_dimension = device.limits().max_texture_dimension_2d;
        if width > max_dimension || height > max_dimension {
            return Err(anyhow!(
                "screen {width}x{height} exceeds the device limit of {max_dimension}"
            ));
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("quad-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quad-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<QuadUniform>() as u64,
                        ),
                    },
                    count: None,
                },
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quad-pipeline-layout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("quad-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad-indices"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let white = GpuTexture::create(&device, "white", PixelFormat::Rgba, 1, 1);
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &white.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255, 255, 255, 255],
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );

        let screen_color = GpuTexture::create(&device, "screen-color", PixelFormat::Rgba, width, height);
        let screen_depth = GpuTexture::create(&device, "screen-depth", PixelFormat::Depth, width, height);

        Ok(Self {
            device,
            queue,
            max_dimension,
            screen_color,
            screen_depth,
            white,
            shader,
            bind_layout,
            pipeline_layout,
            sampler,
            index_buffer,
            pipelines: HashMap::new(),
            textures: HashMap::new(),
            renderbuffers: HashMap::new(),
            framebuffers: HashMap::new(),
            next_handle: 0,
            bound_framebuffer: None,
            blend: (BlendFactor::DEFAULT_SRC, BlendFactor::DEFAULT_DST),
            blend_enabled: false,
            depth_test: true,
            units: [None; MAX_TEXTURE_UNITS],
            units_enabled: [false; MAX_TEXTURE_UNITS],
            projection: MatrixStack::new(),
            model_view: MatrixStack::new(),
            viewport: None,
            encoder: None,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }

    fn stack_mut(&mut self, mode: MatrixMode) -> &mut MatrixStack {
        match mode {
            MatrixMode::Projection => &mut self.projection,
            MatrixMode::ModelView => &mut self.model_view,
        }
    }

    /// Color and depth views plus size of the bound framebuffer.
    fn target_views(&self) -> Option<(&wgpu::TextureView, Option<&wgpu::TextureView>, (u32, u32))> {
        let Some(handle) = self.bound_framebuffer else {
            return Some((
                &self.screen_color.view,
                Some(&self.screen_depth.view),
                (self.screen_color.width, self.screen_color.height),
            ));
        };
        let framebuffer = self.framebuffers.get(&handle)?;
        let color = self.textures.get(&framebuffer.color?)?;
        let depth = match framebuffer.depth {
            Some(DepthAttachment::Texture(texture)) => self.textures.get(&texture).map(|t| &t.view),
            Some(DepthAttachment::Renderbuffer(renderbuffer)) => {
                self.renderbuffers.get(&renderbuffer).map(|t| &t.view)
            }
            None => None,
        };
        Some((&color.view, depth, (color.width, color.height)))
    }

    fn ensure_pipeline(&mut self, key: PipelineKey) {
        let device = &self.device;
        let shader = &self.shader;
        let layout = &self.pipeline_layout;
        self.pipelines
            .entry(key)
            .or_insert_with(|| create_pipeline(device, shader, layout, key));
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("frame-encoder"),
                })
        })
    }

    fn attach_to_bound(&mut self, what: &str, attach: impl FnOnce(&mut Framebuffer)) {
        match self
            .bound_framebuffer
            .and_then(|handle| self.framebuffers.get_mut(&handle))
        {
            Some(framebuffer) => attach(framebuffer),
            None => warn!("Ignoring {what} attachment without a bound framebuffer"),
        }
    }
}

impl GpuBackend for WgpuBackend {
    fn set_blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.blend = (src, dst);
    }

    fn enable(&mut self, capability: Capability) {
        match capability {
            Capability::Blend => self.blend_enabled = true,
            Capability::DepthTest => self.depth_test = true,
        }
    }

    fn disable(&mut self, capability: Capability) {
        match capability {
            Capability::Blend => self.blend_enabled = false,
            Capability::DepthTest => self.depth_test = false,
        }
    }

    fn enable_texture_unit(&mut self, unit: usize) {
        if let Some(enabled) = self.units_enabled.get_mut(unit) {
            *enabled = true;
        }
    }

    fn disable_texture_unit(&mut self, unit: usize) {
        if let Some(enabled) = self.units_enabled.get_mut(unit) {
            *enabled = false;
        }
    }

    fn bind_texture(&mut self, unit: usize, texture: Option<TextureHandle>) {
        match self.units.get_mut(unit) {
            Some(slot) => *slot = texture,
            None => warn!("Texture unit {unit} does not exist"),
        }
    }

    fn push_matrix(&mut self, mode: MatrixMode) {
        self.stack_mut(mode).push();
    }

    fn pop_matrix(&mut self, mode: MatrixMode) {
        if !self.stack_mut(mode).pop() {
            warn!("{mode:?} matrix stack underflow");
        }
    }

    fn load_matrix(&mut self, mode: MatrixMode, matrix: DMat4) {
        *self.stack_mut(mode).top_mut() = matrix;
    }

    fn multiply_matrix(&mut self, mode: MatrixMode, matrix: DMat4) {
        let top = self.stack_mut(mode).top_mut();
        *top *= matrix;
    }

    fn draw_quad(&mut self, vertices: &[QuadVertex; 4]) {
        let mvp = OPENGL_TO_WGPU * (self.projection.top() * self.model_view.top()).as_mat4();
        let key = PipelineKey {
            blend: self.blend_enabled.then_some(self.blend),
            depth_test: self.depth_test,
            has_depth: matches!(self.target_views(), Some((_, Some(_), _))),
        };
        self.ensure_pipeline(key);
        let mut encoder = self.take_encoder();

        let Some((color_view, depth_view, target_size)) = self.target_views() else {
            warn!("Skipping quad: bound framebuffer has no color attachment");
            self.encoder = Some(encoder);
            return;
        };
        let Some((x, y, width, height)) = clamp_viewport(self.viewport, target_size) else {
            self.encoder = Some(encoder);
            return;
        };

        let sampled = self.units[0]
            .filter(|_| self.units_enabled[0])
            .and_then(|handle| self.textures.get(&handle));
        let source = match sampled {
            Some(texture) if texture.format.is_depth() => {
                warn!("Depth textures cannot be sampled as color, drawing untextured");
                &self.white
            }
            Some(texture) if std::ptr::eq(&texture.view, color_view) => {
                warn!("Texture is bound as both source and render target, drawing untextured");
                &self.white
            }
            Some(texture) => texture,
            None => &self.white,
        };

        let gpu_vertices = vertices.map(|vertex| GpuVertex {
            position: vertex.position.as_vec3().to_array(),
            tex_coord: vertex.tex_coord.as_vec2().to_array(),
        });
        let vertex_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad-vertices"),
                contents: bytemuck::cast_slice(&gpu_vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quad-uniform"),
                contents: bytes_of(&QuadUniform {
                    mvp: mvp.to_cols_array_2d(),
                }),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("quad-bind-group"),
            layout: &self.bind_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quad-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: depth_view.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if let Some(pipeline) = self.pipelines.get(&key) {
                pass.set_pipeline(pipeline);
            }
            pass.set_viewport(x, y, width, height, 0.0, 1.0);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
        }
        self.encoder = Some(encoder);
    }

    fn clear(&mut self, color: Vec4, depth: bool) {
        let mut encoder = self.take_encoder();
        match self.target_views() {
            Some((color_view, depth_view, _)) => {
                let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("clear-pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: color_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color {
                                r: f64::from(color.x),
                                g: f64::from(color.y),
                                b: f64::from(color.z),
                                a: f64::from(color.w),
                            }),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: depth_view.map(|view| {
                        wgpu::RenderPassDepthStencilAttachment {
                            view,
                            depth_ops: Some(wgpu::Operations {
                                load: if depth {
                                    wgpu::LoadOp::Clear(1.0)
                                } else {
                                    wgpu::LoadOp::Load
                                },
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
            }
            None => warn!("Skipping clear: bound framebuffer has no color attachment"),
        }
        self.encoder = Some(encoder);
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Some((x, y, width, height));
    }

    fn create_texture(
        &mut self,
        format: PixelFormat,
        width: u32,
        height: u32,
    ) -> RenderResult<TextureHandle> {
        check_extent(width, height, self.max_dimension)?;
        let handle = TextureHandle(self.allocate());
        let label = format!("texture-{}", handle.0);
        let texture = GpuTexture::create(&self.device, &label, format, width, height);
        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        for unit in self.units.iter_mut() {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    fn create_framebuffer(&mut self) -> RenderResult<FramebufferHandle> {
        let handle = FramebufferHandle(self.allocate());
        self.framebuffers.insert(handle, Framebuffer::default());
        Ok(handle)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        self.framebuffers.remove(&framebuffer);
        if self.bound_framebuffer == Some(framebuffer) {
            self.bound_framebuffer = None;
        }
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferHandle>) {
        if let Some(handle) = framebuffer {
            if !self.framebuffers.contains_key(&handle) {
                warn!("Binding unknown framebuffer {}", handle.0);
            }
        }
        self.bound_framebuffer = framebuffer;
    }

    fn create_renderbuffer(&mut self, width: u32, height: u32) -> RenderResult<RenderbufferHandle> {
        check_extent(width, height, self.max_dimension)?;
        let handle = RenderbufferHandle(self.allocate());
        let label = format!("renderbuffer-{}", handle.0);
        let depth = GpuTexture::create(&self.device, &label, PixelFormat::Depth, width, height);
        self.renderbuffers.insert(handle, depth);
        Ok(handle)
    }

    fn delete_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.renderbuffers.remove(&renderbuffer);
    }

    fn attach_color_texture(&mut self, texture: TextureHandle) {
        self.attach_to_bound("color", |framebuffer| framebuffer.color = Some(texture));
    }

    fn attach_depth_texture(&mut self, texture: TextureHandle) {
        self.attach_to_bound("depth", |framebuffer| {
            framebuffer.depth = Some(DepthAttachment::Texture(texture))
        });
    }

    fn attach_depth_renderbuffer(&mut self, renderbuffer: RenderbufferHandle) {
        self.attach_to_bound("depth", |framebuffer| {
            framebuffer.depth = Some(DepthAttachment::Renderbuffer(renderbuffer))
        });
    }

    fn framebuffer_status(&mut self) -> FramebufferStatus {
        let Some(handle) = self.bound_framebuffer else {
            return FramebufferStatus::Complete;
        };
        let Some(framebuffer) = self.framebuffers.get(&handle) else {
            return FramebufferStatus::Unsupported;
        };
        let describe = |texture: Option<&GpuTexture>| {
            texture.map(|texture| AttachmentInfo {
                format: texture.format,
                width: texture.width,
                height: texture.height,
            })
        };
        let color = framebuffer
            .color
            .map(|handle| describe(self.textures.get(&handle)));
        let depth = framebuffer.depth.map(|attachment| match attachment {
            DepthAttachment::Texture(handle) => describe(self.textures.get(&handle)),
            DepthAttachment::Renderbuffer(handle) => describe(self.renderbuffers.get(&handle)),
        });
        completeness(color, depth, self.max_dimension)
    }

    fn finish_frame(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        if self.device.poll(wgpu::Maintain::Poll).is_queue_empty() {
            debug!("GPU queue drained at end of frame");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AttachmentInfo {
    format: PixelFormat,
    width: u32,
    height: u32,
}

/// Framebuffer completeness from its attachments. The outer `Option` is
/// whether the point is attached, the inner whether the object still exists.
fn completeness(
    color: Option<Option<AttachmentInfo>>,
    depth: Option<Option<AttachmentInfo>>,
    max_dimension: u32,
) -> FramebufferStatus {
    if color.is_none() && depth.is_none() {
        return FramebufferStatus::MissingAttachment;
    }
    let mut sizes = Vec::with_capacity(2);
    for (point, wants_depth) in [(color, false), (depth, true)] {
        match point {
            None => {}
            Some(None) => return FramebufferStatus::IncompleteAttachment,
            Some(Some(info)) if info.format.is_depth() != wants_depth => {
                return FramebufferStatus::IncompleteAttachment
            }
            Some(Some(info)) => sizes.push((info.width, info.height)),
        }
    }
    if sizes.windows(2).any(|pair| pair[0] != pair[1]) {
        return FramebufferStatus::IncompleteDimensions;
    }
    if sizes
        .iter()
        .any(|&(width, height)| width > max_dimension || height > max_dimension)
    {
        return FramebufferStatus::Unsupported;
    }
    FramebufferStatus::Complete
}

fn check_extent(width: u32, height: u32, max_dimension: u32) -> RenderResult<()> {
    if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
        return Err(RenderError::BackendAllocation(format!(
            "{width}x{height} is outside 1..={max_dimension}"
        )));
    }
    Ok(())
}

/// Intersects the requested viewport with the target, in wgpu's top-left
/// origin. `None` means nothing is visible.
fn clamp_viewport(
    viewport: Option<(i32, i32, u32, u32)>,
    (target_width, target_height): (u32, u32),
) -> Option<(f32, f32, f32, f32)> {
    let (x, y, width, height) = viewport.unwrap_or((0, 0, target_width, target_height));
    let left = i64::from(x).max(0);
    let right = (i64::from(x) + i64::from(width)).min(i64::from(target_width));
    // GL viewports count rows from the bottom.
    let top_gl = i64::from(y) + i64::from(height);
    let bottom = (i64::from(target_height) - top_gl).max(0);
    let lower = (i64::from(target_height) - i64::from(y)).min(i64::from(target_height));
    if right <= left || lower <= bottom {
        return None;
    }
    Some((
        left as f32,
        bottom as f32,
        (right - left) as f32,
        (lower - bottom) as f32,
    ))
}

fn wgpu_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

fn blend_state((src, dst): (BlendFactor, BlendFactor)) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: wgpu_blend_factor(src),
        dst_factor: wgpu_blend_factor(dst),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::PipelineLayout,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("quad-pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<GpuVertex>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    },
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: (3 * std::mem::size_of::<f32>()) as u64,
                        shader_location: 1,
                    },
                ],
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil: key.has_depth.then(|| wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: key.depth_test,
            depth_compare: if key.depth_test {
                wgpu::CompareFunction::Less
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: COLOR_FORMAT,
                blend: key.blend.map(blend_state),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    })
}

const SHADER: &str = r#"
struct QuadUniform {
    mvp: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> quad: QuadUniform;

@group(0) @binding(1)
var quad_texture: texture_2d<f32>;

@group(0) @binding(2)
var quad_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) tex_coord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = quad.mvp * vec4<f32>(input.position, 1.0);
    // Texture rows are stored top-down.
    out.tex_coord = vec2<f32>(input.tex_coord.x, 1.0 - input.tex_coord.y);
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(quad_texture, quad_sampler, input.tex_coord);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn info(format: PixelFormat, width: u32, height: u32) -> Option<Option<AttachmentInfo>> {
        Some(Some(AttachmentInfo {
            format,
            width,
            height,
        }))
    }

    #[test]
    fn complete_when_sizes_match() {
        assert_eq!(
            completeness(info(PixelFormat::Rgba, 64, 32), info(PixelFormat::Depth, 64, 32), 8192),
            FramebufferStatus::Complete
        );
        assert_eq!(
            completeness(info(PixelFormat::Rgb, 64, 32), None, 8192),
            FramebufferStatus::Complete
        );
    }

    #[test]
    fn incomplete_framebuffers_are_classified() {
        assert_eq!(completeness(None, None, 8192), FramebufferStatus::MissingAttachment);
        assert_eq!(
            completeness(Some(None), None, 8192),
            FramebufferStatus::IncompleteAttachment
        );
        assert_eq!(
            completeness(info(PixelFormat::Depth, 8, 8), None, 8192),
            FramebufferStatus::IncompleteAttachment
        );
        assert_eq!(
            completeness(info(PixelFormat::Rgba, 64, 32), info(PixelFormat::Depth, 32, 32), 8192),
            FramebufferStatus::IncompleteDimensions
        );
        assert_eq!(
            completeness(info(PixelFormat::Rgba, 4096, 16), None, 2048),
            FramebufferStatus::Unsupported
        );
    }

    #[test]
    fn matrix_stack_keeps_its_base() {
        let mut stack = MatrixStack::new();
        *stack.top_mut() = DMat4::from_translation(glam::DVec3::X);
        stack.push();
        *stack.top_mut() *= DMat4::from_scale(glam::DVec3::splat(2.0));
        assert!(stack.pop());
        assert_eq!(stack.top(), DMat4::from_translation(glam::DVec3::X));
        assert!(!stack.pop());
        assert_eq!(stack.top(), DMat4::from_translation(glam::DVec3::X));
    }

    #[test]
    fn depth_correction_maps_gl_clip_range() {
        let near = OPENGL_TO_WGPU * Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = OPENGL_TO_WGPU * Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(near.truncate(), Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(far.truncate(), Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn viewport_is_flipped_and_clamped() {
        assert_eq!(
            clamp_viewport(Some((0, 0, 800, 600)), (800, 600)),
            Some((0.0, 0.0, 800.0, 600.0))
        );
        assert_eq!(
            clamp_viewport(Some((0, 0, 400, 300)), (800, 600)),
            Some((0.0, 300.0, 400.0, 300.0))
        );
        assert_eq!(
            clamp_viewport(Some((240, 0, 1440, 1080)), (800, 600)),
            Some((240.0, 0.0, 560.0, 600.0))
        );
        assert_eq!(clamp_viewport(Some((900, 0, 10, 10)), (800, 600)), None);
        assert_eq!(clamp_viewport(None, (64, 32)), Some((0.0, 0.0, 64.0, 32.0)));
    }

    #[test]
    fn blend_factors_map_one_to_one() {
        let mapped: std::collections::HashSet<wgpu::BlendFactor> = BlendFactor::ALL
            .into_iter()
            .map(wgpu_blend_factor)
            .collect();
        assert_eq!(mapped.len(), BlendFactor::ALL.len());
        let state = blend_state((BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha));
        assert_eq!(state.color, wgpu::BlendState::ALPHA_BLENDING.color);
        assert_eq!(state.alpha, state.color);
    }
}
