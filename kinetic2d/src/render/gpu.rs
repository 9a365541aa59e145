//! wgpu presenter for recorded frames.
//!
//! The scene records into a [`DrawList`](super::DrawList); once per redraw
//! the runner hands the commands to [`GpuRenderer::present`], which uploads
//! textures on first use, builds one uniform block per sprite and a vertex
//! list for rectangles and lines, and draws everything in recording order in
//! a single pass.

use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::path::Path;

use anyhow::{anyhow, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2};
use log::{debug, warn};
use wgpu::util::DeviceExt;
use wgpu::{
    vertex_attr_array, AddressMode, BindGroup, BindGroupDescriptor, BindGroupEntry,
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingResource,
    BindingType, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoderDescriptor, CompositeAlphaMode, DeviceDescriptor, Extent3d, FilterMode,
    FragmentState, Instance, LoadOp, MultisampleState, Operations, Origin3d,
    PipelineLayoutDescriptor, PresentMode, PrimitiveState, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, RequestAdapterOptions,
    SamplerBindingType, SamplerDescriptor, ShaderModuleDescriptor, ShaderSource,
    SurfaceConfiguration, TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect,
    TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType, TextureUsages,
    TextureViewDescriptor, TextureViewDimension, VertexState,
};
use winit::{dpi::PhysicalSize, window::Window};

use super::{Color, DrawCommand, Rect, Sprite, TextureHandle};
use crate::assets::TextureCache;

const MAX_SPRITES_PER_FRAME: u64 = 4096;
const LINE_WIDTH: f32 = 1.5;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SpriteVertex {
    position: [f32; 2],
    uv: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SpriteUniforms {
    mvp: [[f32; 4]; 4],
    color: [f32; 4],
    uv_offset: [f32; 2],
    uv_scale: [f32; 2],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
struct ShapeVertex {
    position: [f32; 2],
    color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ShapeUniforms {
    mvp: [[f32; 4]; 4],
}

/// Unit quad with a top-left origin; sprites scale it to their source size.
const SPRITE_VERTICES: [SpriteVertex; 6] = [
    SpriteVertex { position: [0.0, 0.0], uv: [0.0, 0.0] },
    SpriteVertex { position: [1.0, 0.0], uv: [1.0, 0.0] },
    SpriteVertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
    SpriteVertex { position: [0.0, 0.0], uv: [0.0, 0.0] },
    SpriteVertex { position: [1.0, 1.0], uv: [1.0, 1.0] },
    SpriteVertex { position: [0.0, 1.0], uv: [0.0, 1.0] },
];

struct SpritePipeline {
    pipeline: RenderPipeline,
    vertex_buffer: Buffer,
    uniform_buffer: Buffer,
    bind_group_layout: BindGroupLayout,
    uniform_stride: u64,
}

struct ShapePipeline {
    pipeline: RenderPipeline,
    uniform_buffer: Buffer,
    bind_group: BindGroup,
}

struct GpuTexture {
    /// Kept alive for the bind group's view.
    _texture: wgpu::Texture,
    bind_group: BindGroup,
    size: (u32, u32),
}

enum Batch {
    Sprite { uniform_offset: u32, texture: TextureHandle },
    Shapes { vertices: Range<u32> },
}

/// Window surface plus the two pipelines needed to present a [`DrawCommand`]
/// stream.
pub struct GpuRenderer<'window> {
    surface: wgpu::Surface<'window>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: SurfaceConfiguration,
    present_mode: PresentMode,
    sprite_pipeline: SpritePipeline,
    shape_pipeline: ShapePipeline,
    textures: HashMap<TextureHandle, GpuTexture>,
    failed_textures: HashSet<TextureHandle>,
}

impl<'window> GpuRenderer<'window> {
    pub fn new(window: &'window Window, vsync: bool) -> Result<Self> {
        let instance = Instance::default();
        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;

        let (device, queue) = pollster::block_on(adapter.request_device(&DeviceDescriptor {
            label: Some("kinetic2d-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
        }))?;

        let size = window.inner_size();
        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;

        let present_mode = choose_present_mode(&capabilities.present_modes, vsync);
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: choose_alpha_mode(&capabilities.alpha_modes),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);
        debug!(
            "surface configured: {}x{} {format:?} {present_mode:?}",
            surface_config.width, surface_config.height
        );

        let sprite_pipeline = create_sprite_pipeline(&device, format);
        let shape_pipeline = create_shape_pipeline(&device, format);

        Ok(Self {
            surface,
            device,
            queue,
            surface_config,
            present_mode,
            sprite_pipeline,
            shape_pipeline,
            textures: HashMap::new(),
            failed_textures: HashSet::new(),
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.surface_config.width = new_size.width;
        self.surface_config.height = new_size.height;
        self.surface_config.present_mode = self.present_mode;
        self.surface.configure(&self.device, &self.surface_config);
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    /// Draw one recorded frame and present it.
    pub fn present(&mut self, commands: &[DrawCommand], textures: &TextureCache) -> Result<()> {
        self.textures
            .retain(|handle, _| textures.by_handle(*handle).is_some());

        let (width, height) = self.surface_size();
        let projection = Mat4::orthographic_rh(0.0, width as f32, height as f32, 0.0, -1.0, 1.0);

        let stride = self.sprite_pipeline.uniform_stride;
        let mut clear = Color::BLACK;
        let mut view = Mat4::IDENTITY;
        let mut batches: Vec<Batch> = Vec::new();
        let mut sprite_bytes: Vec<u8> = Vec::new();
        let mut shape_vertices: Vec<ShapeVertex> = Vec::new();
        let mut sprite_count = 0u64;

        for command in commands {
            match command {
                DrawCommand::Clear(color) => clear = *color,
                DrawCommand::Begin(matrix) => view = *matrix,
                DrawCommand::End => view = Mat4::IDENTITY,
                DrawCommand::Sprite(sprite) => {
                    if sprite_count >= MAX_SPRITES_PER_FRAME {
                        continue;
                    }
                    let Some(size) = self.ensure_texture(sprite.texture, textures) else {
                        continue;
                    };
                    let uniforms = sprite_uniforms(projection * view, sprite, size);
                    let offset = sprite_count * stride;
                    sprite_bytes.resize((offset + stride) as usize, 0);
                    sprite_bytes[offset as usize..offset as usize + std::mem::size_of::<SpriteUniforms>()]
                        .copy_from_slice(bytemuck::bytes_of(&uniforms));
                    sprite_count += 1;
                    batches.push(Batch::Sprite {
                        uniform_offset: offset as u32,
                        texture: sprite.texture,
                    });
                }
                DrawCommand::FillRect(rect, color) => {
                    let start = shape_vertices.len() as u32;
                    shape_vertices.extend(rect_vertices(view, *rect, *color));
                    push_shapes(&mut batches, start..shape_vertices.len() as u32);
                }
                DrawCommand::Line { from, to, color } => {
                    let start = shape_vertices.len() as u32;
                    shape_vertices.extend(line_vertices(view, *from, *to, *color));
                    push_shapes(&mut batches, start..shape_vertices.len() as u32);
                }
            }
        }
        if sprite_count >= MAX_SPRITES_PER_FRAME {
            warn!("sprite limit of {MAX_SPRITES_PER_FRAME} per frame reached; extra sprites skipped");
        }

        if !sprite_bytes.is_empty() {
            self.queue
                .write_buffer(&self.sprite_pipeline.uniform_buffer, 0, &sprite_bytes);
        }
        self.queue.write_buffer(
            &self.shape_pipeline.uniform_buffer,
            0,
            bytemuck::bytes_of(&ShapeUniforms {
                mvp: projection.to_cols_array_2d(),
            }),
        );
        let shape_buffer = (!shape_vertices.is_empty()).then(|| {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("shape-vertices"),
                    contents: bytemuck::cast_slice(&shape_vertices),
                    usage: BufferUsages::VERTEX,
                })
        });

        let surface_texture = self.acquire()?;
        let target = surface_texture
            .texture
            .create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: clear.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                multiview_mask: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for batch in &batches {
                match batch {
                    Batch::Sprite {
                        uniform_offset,
                        texture,
                    } => {
                        let Some(entry) = self.textures.get(texture) else {
                            continue;
                        };
                        pass.set_pipeline(&self.sprite_pipeline.pipeline);
                        pass.set_vertex_buffer(0, self.sprite_pipeline.vertex_buffer.slice(..));
                        pass.set_bind_group(0, &entry.bind_group, &[*uniform_offset]);
                        pass.draw(0..SPRITE_VERTICES.len() as u32, 0..1);
                    }
                    Batch::Shapes { vertices } => {
                        let Some(buffer) = shape_buffer.as_ref() else {
                            continue;
                        };
                        pass.set_pipeline(&self.shape_pipeline.pipeline);
                        pass.set_bind_group(0, &self.shape_pipeline.bind_group, &[]);
                        pass.set_vertex_buffer(0, buffer.slice(..));
                        pass.draw(vertices.clone(), 0..1);
                    }
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        surface_texture.present();
        Ok(())
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture> {
        loop {
            match self.surface.get_current_texture() {
                Ok(texture) => return Ok(texture),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    self.surface.configure(&self.device, &self.surface_config);
                }
                Err(wgpu::SurfaceError::Timeout) => continue,
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    return Err(anyhow!("surface ran out of memory"));
                }
                Err(wgpu::SurfaceError::Other) => return Err(anyhow!("surface error: other")),
            }
        }
    }

    /// Upload the pixels behind `handle` on first use. Missing or unreadable
    /// files are reported once and skipped afterwards.
    fn ensure_texture(&mut self, handle: TextureHandle, cache: &TextureCache) -> Option<(u32, u32)> {
        if let Some(entry) = self.textures.get(&handle) {
            return Some(entry.size);
        }
        if self.failed_textures.contains(&handle) {
            return None;
        }
        let texture = cache.by_handle(handle)?;
        match self.upload(&texture.path) {
            Ok(entry) => {
                let size = entry.size;
                self.textures.insert(handle, entry);
                Some(size)
            }
            Err(err) => {
                warn!("cannot upload texture {}: {err}", texture.path.display());
                self.failed_textures.insert(handle);
                None
            }
        }
    }

    fn upload(&self, path: &Path) -> Result<GpuTexture> {
        let image = image::open(path)?.to_rgba8();
        let (width, height) = image.dimensions();
        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some("sprite-texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            &image,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );

        let view = texture.create_view(&TextureViewDescriptor::default());
        let sampler = self.device.create_sampler(&SamplerDescriptor {
            label: Some("sprite-sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let bind_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("sprite-bind-group"),
            layout: &self.sprite_pipeline.bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.sprite_pipeline.uniform_buffer,
                        offset: 0,
                        size: std::num::NonZeroU64::new(
                            std::mem::size_of::<SpriteUniforms>() as u64,
                        ),
                    }),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::TextureView(&view),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: BindingResource::Sampler(&sampler),
                },
            ],
        });

        Ok(GpuTexture {
            _texture: texture,
            bind_group,
            size: (width, height),
        })
    }
}

fn push_shapes(batches: &mut Vec<Batch>, range: Range<u32>) {
    if let Some(Batch::Shapes { vertices }) = batches.last_mut() {
        if vertices.end == range.start {
            vertices.end = range.end;
            return;
        }
    }
    batches.push(Batch::Shapes { vertices: range });
}

/// Model-view-projection for one sprite: the unit quad is scaled to the
/// source size, moved so `origin` is the pivot, then scaled, rotated and
/// placed at `position`.
fn sprite_model(sprite: &Sprite, source: Rect) -> Mat4 {
    Mat4::from_translation(sprite.position.extend(0.0))
        * Mat4::from_rotation_z(sprite.rotation)
        * Mat4::from_scale(sprite.scale.extend(1.0))
        * Mat4::from_translation((-sprite.origin).extend(0.0))
        * Mat4::from_scale(Vec2::new(source.width, source.height).extend(1.0))
}

fn sprite_uniforms(view_projection: Mat4, sprite: &Sprite, size: (u32, u32)) -> SpriteUniforms {
    let (tw, th) = (size.0.max(1) as f32, size.1.max(1) as f32);
    let source = sprite.source.unwrap_or(Rect::new(0.0, 0.0, tw, th));
    let mvp = view_projection * sprite_model(sprite, source);
    SpriteUniforms {
        mvp: mvp.to_cols_array_2d(),
        color: color_array(sprite.tint),
        uv_offset: [source.x / tw, source.y / th],
        uv_scale: [source.width / tw, source.height / th],
    }
}

fn color_array(color: Color) -> [f32; 4] {
    [color.r, color.g, color.b, color.a]
}

fn to_screen(view: Mat4, point: Vec2) -> Vec2 {
    view.transform_point3(point.extend(0.0)).truncate()
}

fn quad(corners: [Vec2; 4], color: Color) -> [ShapeVertex; 6] {
    let color = color_array(color);
    let v = |p: Vec2| ShapeVertex {
        position: [p.x, p.y],
        color,
    };
    [
        v(corners[0]),
        v(corners[1]),
        v(corners[2]),
        v(corners[0]),
        v(corners[2]),
        v(corners[3]),
    ]
}

/// Rectangle corners are transformed on the CPU so rotated views stay exact.
fn rect_vertices(view: Mat4, rect: Rect, color: Color) -> [ShapeVertex; 6] {
    let corners = [
        Vec2::new(rect.x, rect.y),
        Vec2::new(rect.x + rect.width, rect.y),
        Vec2::new(rect.x + rect.width, rect.y + rect.height),
        Vec2::new(rect.x, rect.y + rect.height),
    ];
    quad(corners.map(|c| to_screen(view, c)), color)
}

/// Lines become screen-space quads of constant width regardless of zoom.
fn line_vertices(view: Mat4, from: Vec2, to: Vec2, color: Color) -> [ShapeVertex; 6] {
    let (a, b) = (to_screen(view, from), to_screen(view, to));
    let normal = (b - a).perp().normalize_or_zero() * (LINE_WIDTH * 0.5);
    quad([a - normal, b - normal, b + normal, a + normal], color)
}

fn create_sprite_pipeline(device: &wgpu::Device, surface_format: TextureFormat) -> SpritePipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("sprite-shader"),
        source: ShaderSource::Wgsl(include_str!("sprite.wgsl").into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("sprite-bind-group-layout"),
        entries: &[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<SpriteUniforms>() as u64,
                    ),
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: BindingType::Sampler(SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("sprite-pipeline-layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("sprite-vertices"),
        contents: bytemuck::cast_slice(&SPRITE_VERTICES),
        usage: BufferUsages::VERTEX,
    });

    let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
    let uniform_size = std::mem::size_of::<SpriteUniforms>() as u64;
    let uniform_stride = (uniform_size + alignment - 1) & !(alignment - 1);

    let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("sprite-uniform-buffer"),
        size: MAX_SPRITES_PER_FRAME * uniform_stride,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("sprite-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<SpriteVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &vertex_attr_array![0 => Float32x2, 1 => Float32x2],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState::default(),
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    SpritePipeline {
        pipeline,
        vertex_buffer,
        uniform_buffer,
        bind_group_layout,
        uniform_stride,
    }
}

fn create_shape_pipeline(device: &wgpu::Device, surface_format: TextureFormat) -> ShapePipeline {
    let shader = device.create_shader_module(ShaderModuleDescriptor {
        label: Some("shape-shader"),
        source: ShaderSource::Wgsl(include_str!("shape.wgsl").into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some("shape-bind-group-layout"),
        entries: &[BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: std::num::NonZeroU64::new(
                    std::mem::size_of::<ShapeUniforms>() as u64,
                ),
            },
            count: None,
        }],
    });

    let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
        label: Some("shape-pipeline-layout"),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });

    let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("shape-uniform-buffer"),
        size: std::mem::size_of::<ShapeUniforms>() as u64,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let bind_group = device.create_bind_group(&BindGroupDescriptor {
        label: Some("shape-bind-group"),
        layout: &bind_group_layout,
        entries: &[BindGroupEntry {
            binding: 0,
            resource: uniform_buffer.as_entire_binding(),
        }],
    });

    let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some("shape-pipeline"),
        layout: Some(&pipeline_layout),
        vertex: VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<ShapeVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &vertex_attr_array![0 => Float32x2, 1 => Float32x4],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    });

    ShapePipeline {
        pipeline,
        uniform_buffer,
        bind_group,
    }
}

fn choose_present_mode(modes: &[PresentMode], vsync: bool) -> PresentMode {
    if vsync {
        modes
            .iter()
            .copied()
            .find(|mode| matches!(mode, PresentMode::Fifo | PresentMode::FifoRelaxed))
            .unwrap_or(PresentMode::Fifo)
    } else {
        modes
            .iter()
            .copied()
            .find(|mode| matches!(mode, PresentMode::Immediate | PresentMode::Mailbox))
            .unwrap_or(PresentMode::Fifo)
    }
}

fn choose_alpha_mode(modes: &[CompositeAlphaMode]) -> CompositeAlphaMode {
    modes
        .iter()
        .copied()
        .find(|mode| matches!(mode, CompositeAlphaMode::Auto))
        .unwrap_or_else(|| modes.first().copied().unwrap_or(CompositeAlphaMode::Opaque))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sprite_model_pivots_on_origin() {
        let mut sprite = Sprite::new(TextureHandle(1));
        sprite.position = Vec2::new(100.0, 50.0);
        sprite.origin = Vec2::new(16.0, 8.0);
        let model = sprite_model(&sprite, Rect::new(0.0, 0.0, 32.0, 16.0));

        // The quad's centre lands on the sprite position.
        let centre = model.transform_point3(glam::Vec3::new(0.5, 0.5, 0.0));
        assert_relative_eq!(centre.x, 100.0, epsilon = 1e-4);
        assert_relative_eq!(centre.y, 50.0, epsilon = 1e-4);
    }

    #[test]
    fn test_source_rect_maps_to_uv_window() {
        let mut sprite = Sprite::new(TextureHandle(1));
        sprite.source = Some(Rect::new(32.0, 0.0, 32.0, 32.0));
        let uniforms = sprite_uniforms(Mat4::IDENTITY, &sprite, (128, 64));
        assert_relative_eq!(uniforms.uv_offset[0], 0.25);
        assert_relative_eq!(uniforms.uv_scale[0], 0.25);
        assert_relative_eq!(uniforms.uv_scale[1], 0.5);
    }

    #[test]
    fn test_line_quad_has_constant_width() {
        let vertices = line_vertices(
            Mat4::from_scale(glam::Vec3::splat(10.0)),
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            Color::RED,
        );
        let top = Vec2::from(vertices[0].position);
        let bottom = Vec2::from(vertices[5].position);
        assert_relative_eq!((bottom - top).length(), LINE_WIDTH, epsilon = 1e-4);
        assert_relative_eq!(vertices[1].position[0], 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_adjacent_shapes_share_a_batch() {
        let mut batches = Vec::new();
        push_shapes(&mut batches, 0..6);
        push_shapes(&mut batches, 6..12);
        batches.push(Batch::Sprite {
            uniform_offset: 0,
            texture: TextureHandle(1),
        });
        push_shapes(&mut batches, 12..18);
        assert_eq!(batches.len(), 3);
        assert!(matches!(&batches[0], Batch::Shapes { vertices } if *vertices == (0..12)));
    }
}
