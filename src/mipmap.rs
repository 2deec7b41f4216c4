//! Mip Chain Generation & Pipeline Cache
//!
//! The [`MipmapGenerator`] builds full mip chains on the GPU with a bilinear
//! fullscreen blit per level transition. It caches one shader module, one
//! linear sampler and one render pipeline **per texture format** (layout and
//! color targets depend on the format), all scoped to a single device
//! generation: the entire cache is dropped the moment the handle's epoch
//! differs from the one it was populated under.
//!
//! The bilinear downsample is a deliberate cost/quality tradeoff; this is
//! not a high-quality box/Lanczos filter.

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::context::DeviceHandle;

const BLIT_WGSL: &str = r"
struct VertexOutput {
    @builtin(position) position : vec4<f32>,
    @location(0) uv : vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) vertexIndex : u32) -> VertexOutput {
    var pos = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 3.0, -1.0),
        vec2<f32>(-1.0,  3.0)
    );
    var output : VertexOutput;
    output.position = vec4<f32>(pos[vertexIndex], 0.0, 1.0);
    output.uv = pos[vertexIndex] * 0.5 + 0.5;
    output.uv.y = 1.0 - output.uv.y;
    return output;
}

@group(0) @binding(0) var t_src : texture_2d<f32>;
@group(0) @binding(1) var s_src : sampler;

@fragment
fn fs_main(in : VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(t_src, s_src, in.uv);
}
";

/// Number of mip levels for a full chain over a `width × height` base level:
/// `1 + floor(log2(max(width, height)))`.
#[must_use]
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    1 + width.max(height).max(1).ilog2()
}

/// Dimensions of the next mip level: each axis halves, floored at 1.
#[must_use]
pub fn next_mip_extent(width: u32, height: u32) -> (u32, u32) {
    ((width / 2).max(1), (height / 2).max(1))
}

/// CPU-side RGBA8 pixel data for one texture layer.
#[derive(Clone, Copy)]
pub struct TextureSource<'a> {
    /// Tightly packed RGBA8 rows, `width × height × 4` bytes.
    pub data: &'a [u8],
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Upload options for [`MipmapGenerator::create_texture_from_source`].
#[derive(Clone, Copy, Debug)]
pub struct TextureOptions {
    /// Generate a full mip chain after uploading level 0.
    pub mips: bool,
    /// Flip rows vertically during upload.
    pub flip_y: bool,
    /// Multiply color channels by alpha during upload.
    pub premultiplied_alpha: bool,
    /// Pixel format of the created texture.
    pub format: wgpu::TextureFormat,
    /// Debug label.
    pub label: Option<&'static str>,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            mips: true,
            flip_y: false,
            premultiplied_alpha: false,
            format: wgpu::TextureFormat::Rgba8Unorm,
            label: None,
        }
    }
}

struct SharedResources {
    shader: wgpu::ShaderModule,
    sampler: wgpu::Sampler,
    layout: wgpu::BindGroupLayout,
}

impl SharedResources {
    fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mipmap Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(BLIT_WGSL)),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mipmap Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        // Always declared D2: cube/array sources are bound
                        // one layer at a time through a D2 view.
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Mipmap Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        Self {
            shader,
            sampler,
            layout,
        }
    }
}

/// Builds and caches the resources needed to generate mip chains.
pub struct MipmapGenerator {
    last_epoch: Option<u64>,
    shared: Option<SharedResources>,
    pipelines: FxHashMap<wgpu::TextureFormat, wgpu::RenderPipeline>,
}

impl MipmapGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_epoch: None,
            shared: None,
            pipelines: FxHashMap::default(),
        }
    }

    /// Invalidation gate, checked on every access path: a device change
    /// makes the shader module, sampler, layout and every cached pipeline
    /// invalid at once.
    fn ensure_epoch(&mut self, handle: &DeviceHandle) {
        if self.last_epoch != Some(handle.epoch()) {
            if self.last_epoch.is_some() {
                log::debug!(
                    "Mipmap cache invalidated: device epoch {:?} -> {}",
                    self.last_epoch,
                    handle.epoch()
                );
            }
            self.shared = None;
            self.pipelines.clear();
            self.last_epoch = Some(handle.epoch());
        }
    }

    fn get_pipeline(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let shared = self.shared.get_or_insert_with(|| SharedResources::new(device));
        self.pipelines
            .entry(format)
            .or_insert_with(|| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(&format!("Mipmap Pipeline {format:?}")),
                    layout: Some(&device.create_pipeline_layout(
                        &wgpu::PipelineLayoutDescriptor {
                            label: Some("Mipmap Pipeline Layout"),
                            bind_group_layouts: &[&shared.layout],
                            immediate_size: 0,
                        },
                    )),
                    vertex: wgpu::VertexState {
                        module: &shared.shader,
                        entry_point: Some("vs_main"),
                        buffers: &[],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shared.shader,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        ..Default::default()
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    multiview_mask: None,
                    cache: None,
                })
            })
            .clone()
    }

    /// Generates the full mip chain for `texture` in one submission.
    ///
    /// All level transitions for all array layers are recorded into a single
    /// command buffer and submitted once at the end. No-op for textures with
    /// fewer than two levels.
    pub fn generate(&mut self, handle: &DeviceHandle, texture: &wgpu::Texture) {
        if texture.mip_level_count() < 2 {
            return;
        }
        let mut encoder = handle
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Mipmap Encoder"),
            });
        self.encode(handle, &mut encoder, texture);
        handle.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Records the mip chain passes into a caller-owned encoder.
    pub fn encode(
        &mut self,
        handle: &DeviceHandle,
        encoder: &mut wgpu::CommandEncoder,
        texture: &wgpu::Texture,
    ) {
        self.ensure_epoch(handle);

        let mip_count = texture.mip_level_count();
        if mip_count < 2 {
            return;
        }

        let device = &handle.device;
        let format = texture.format();
        let pipeline = self.get_pipeline(device, format);
        let layer_count = texture.depth_or_array_layers();

        // Shared resources exist after get_pipeline.
        let Some(shared) = &self.shared else { return };

        for layer in 0..layer_count {
            for level in 0..mip_count - 1 {
                let src_view = texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Mipmap Src"),
                    format: None,
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect: wgpu::TextureAspect::All,
                    base_mip_level: level,
                    mip_level_count: Some(1),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    usage: Some(wgpu::TextureUsages::TEXTURE_BINDING),
                });

                let dst_view = texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Mipmap Dst"),
                    format: None,
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    aspect: wgpu::TextureAspect::All,
                    base_mip_level: level + 1,
                    mip_level_count: Some(1),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    usage: Some(wgpu::TextureUsages::RENDER_ATTACHMENT),
                });

                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Mipmap BG"),
                    layout: &shared.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&src_view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&shared.sampler),
                        },
                    ],
                });

                let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Mipmap Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &dst_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                    multiview_mask: None,
                });
                rpass.set_pipeline(&pipeline);
                rpass.set_bind_group(0, &bind_group, &[]);
                rpass.draw(0..3, 0..1);
            }
        }
    }

    /// Creates a texture from one CPU-side source, optionally with a full
    /// mip chain generated from level 0.
    pub fn create_texture_from_source(
        &mut self,
        handle: &DeviceHandle,
        source: &TextureSource<'_>,
        options: &TextureOptions,
    ) -> wgpu::Texture {
        self.create_texture_from_sources(handle, std::slice::from_ref(source), options)
    }

    /// Multi-source variant: sources become array layers. All sources must
    /// share dimensions.
    pub fn create_texture_from_sources(
        &mut self,
        handle: &DeviceHandle,
        sources: &[TextureSource<'_>],
        options: &TextureOptions,
    ) -> wgpu::Texture {
        assert!(!sources.is_empty(), "at least one texture source required");
        let (width, height) = (sources[0].width, sources[0].height);
        assert!(
            sources.iter().all(|s| s.width == width && s.height == height),
            "all texture sources must share dimensions"
        );

        let level_count = if options.mips {
            mip_level_count(width, height)
        } else {
            1
        };

        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if level_count > 1 {
            // Intermediate levels are both sampled and rendered to.
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }

        let texture = handle.device.create_texture(&wgpu::TextureDescriptor {
            label: options.label,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: sources.len() as u32,
            },
            mip_level_count: level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: options.format,
            usage,
            view_formats: &[],
        });

        for (layer, source) in sources.iter().enumerate() {
            upload_layer(&handle.queue, &texture, layer as u32, source, options);
        }

        if level_count > 1 {
            self.generate(handle, &texture);
        }
        texture
    }

    /// Number of pipelines currently cached (one per distinct format seen
    /// since the last device change).
    #[must_use]
    pub fn cached_pipeline_count(&self) -> usize {
        self.pipelines.len()
    }
}

impl Default for MipmapGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn upload_layer(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    layer: u32,
    source: &TextureSource<'_>,
    options: &TextureOptions,
) {
    const BYTES_PER_PIXEL: u32 = 4;
    let expected = (source.width * source.height * BYTES_PER_PIXEL) as usize;
    assert_eq!(
        source.data.len(),
        expected,
        "texture source data must be tightly packed RGBA8"
    );

    let bytes_per_row = source.width * BYTES_PER_PIXEL;
    let processed: Option<Vec<u8>> = if options.flip_y || options.premultiplied_alpha {
        let mut out = Vec::with_capacity(expected);
        let rows: Box<dyn Iterator<Item = &[u8]>> = if options.flip_y {
            Box::new(source.data.chunks_exact(bytes_per_row as usize).rev())
        } else {
            Box::new(source.data.chunks_exact(bytes_per_row as usize))
        };
        for row in rows {
            if options.premultiplied_alpha {
                for px in row.chunks_exact(4) {
                    let a = u16::from(px[3]);
                    out.push(((u16::from(px[0]) * a) / 255) as u8);
                    out.push(((u16::from(px[1]) * a) / 255) as u8);
                    out.push(((u16::from(px[2]) * a) / 255) as u8);
                    out.push(px[3]);
                }
            } else {
                out.extend_from_slice(row);
            }
        }
        Some(out)
    } else {
        None
    };

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        processed.as_deref().unwrap_or(source.data),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_row),
            rows_per_image: Some(source.height),
        },
        wgpu::Extent3d {
            width: source.width,
            height: source.height,
            depth_or_array_layers: 1,
        },
    );
}
