//! Fullscreen blit plumbing shared by every post-processing pass.
//!
//! Each draw samples up to two source textures and writes a fullscreen quad
//! into the target, with all pass parameters carried in one uniform struct.
//! Pipelines are created lazily per (pass, target format, blend) combination
//! and cached for the lifetime of the [`Blitter`].

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::settings::FinalBlendMode;

/// Every fullscreen pass the post FX stack can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FxPass {
    /// Straight copy.
    Copy,
    /// Bloom threshold prefilter at half resolution.
    BloomPrefilter,
    /// Prefilter with luminance-weighted firefly damping.
    BloomPrefilterFireflies,
    /// Horizontal blur while downsampling.
    BloomHorizontal,
    /// Vertical blur.
    BloomVertical,
    /// Additive upsample combine.
    BloomAdd,
    /// Scattering upsample combine.
    BloomScatter,
    /// Final scattering combine, re-adding thresholded light.
    BloomScatterFinal,
    /// Bake the grading LUT without tone mapping.
    ColorGradingNone,
    /// Bake the grading LUT through the ACES fitted curve.
    ColorGradingAces,
    /// Bake the grading LUT through the neutral curve.
    ColorGradingNeutral,
    /// Bake the grading LUT through Reinhard.
    ColorGradingReinhard,
    /// Apply the baked LUT to the source.
    ApplyColorGrading,
    /// Apply the LUT and store luma in alpha for FXAA.
    ApplyColorGradingWithLuma,
    /// FXAA computing luma from color.
    Fxaa,
    /// FXAA reading precomputed luma from alpha.
    FxaaWithLuma,
    /// Bilinear-or-bicubic rescale to the output size.
    FinalRescale,
}

/// Parameters for every fullscreen pass, written fresh per draw.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FxUniform {
    /// `(2^exposure, contrast, hue shift, saturation)`.
    pub color_adjustments: [f32; 4],
    /// Multiplicative color filter.
    pub color_filter: [f32; 4],
    /// White balance LMS coefficients.
    pub white_balance: [f32; 4],
    /// Split-toning shadow tint, `w` = balance.
    pub split_toning_shadows: [f32; 4],
    /// Split-toning highlight tint.
    pub split_toning_highlights: [f32; 4],
    /// Channel mixer red output row.
    pub channel_mixer_red: [f32; 4],
    /// Channel mixer green output row.
    pub channel_mixer_green: [f32; 4],
    /// Channel mixer blue output row.
    pub channel_mixer_blue: [f32; 4],
    /// Shadows wheel color.
    pub smh_shadows: [f32; 4],
    /// Midtones wheel color.
    pub smh_midtones: [f32; 4],
    /// Highlights wheel color.
    pub smh_highlights: [f32; 4],
    /// `(shadows start, shadows end, highlights start, highlights end)`.
    pub smh_range: [f32; 4],
    /// LUT parameters; generation and application use different values.
    pub lut_params: [f32; 4],
    /// Knee-softened bloom threshold vector.
    pub bloom_threshold: [f32; 4],
    /// `(fixed threshold, relative threshold, subpixel blending, quality)`.
    pub fxaa_config: [f32; 4],
    /// `x` bloom intensity, `y` bicubic bloom upsample, `z` bicubic rescale,
    /// `w` LUT baked in LogC.
    pub params: [f32; 4],
    /// Source texel info `(1/w, 1/h, w, h)`.
    pub texel_size: [f32; 4],
}

impl Default for FxUniform {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl FxUniform {
    /// Set the source texel vector from a source size.
    pub fn set_source_size(&mut self, width: u32, height: u32) {
        self.texel_size = [
            1.0 / width as f32,
            1.0 / height as f32,
            width as f32,
            height as f32,
        ];
    }
}

/// Vertex for fullscreen quad rendering (position + uv).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FullscreenVertex {
    /// Clip-space position.
    pub position: [f32; 2],
    /// UV coordinates.
    pub uv: [f32; 2],
}

impl FullscreenVertex {
    /// Vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 0,
                    shader_location: 0,
                },
                wgpu::VertexAttribute {
                    format: wgpu::VertexFormat::Float32x2,
                    offset: 8,
                    shader_location: 1,
                },
            ],
        }
    }
}

/// Fullscreen quad vertices (two triangles).
pub const FULLSCREEN_QUAD_VERTICES: [FullscreenVertex; 6] = [
    FullscreenVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    FullscreenVertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    FullscreenVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
    FullscreenVertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    FullscreenVertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
    FullscreenVertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    pass: FxPass,
    format: wgpu::TextureFormat,
    blend: Option<(wgpu::BlendFactor, wgpu::BlendFactor)>,
}

/// One fullscreen draw.
pub struct BlitOp<'a> {
    /// Which pass to draw.
    pub pass: FxPass,
    /// Primary source.
    pub source: &'a wgpu::TextureView,
    /// Secondary source for combine/apply passes; falls back to `source`.
    pub source2: Option<&'a wgpu::TextureView>,
    /// Target view.
    pub target: &'a wgpu::TextureView,
    /// Target format, for pipeline selection.
    pub target_format: wgpu::TextureFormat,
    /// Pass parameters.
    pub uniform: FxUniform,
    /// Load behavior of the target.
    pub load: wgpu::LoadOp<wgpu::Color>,
    /// Hardware blend for final draws; `None` = opaque overwrite.
    pub blend: Option<FinalBlendMode>,
    /// Viewport `(x, y, w, h)` for partial-target finals.
    pub viewport: Option<(f32, f32, f32, f32)>,
}

/// Fullscreen-pass recorder with a lazy pipeline cache.
pub struct Blitter {
    layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    quad_buffer: wgpu::Buffer,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl Blitter {
    /// Create the shared blit resources.
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Post FX Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
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
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Post FX Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Post FX Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Post FX Quad Buffer"),
            contents: bytemuck::cast_slice(&FULLSCREEN_QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            layout,
            pipeline_layout,
            sampler,
            quad_buffer,
            pipelines: HashMap::new(),
        }
    }

    /// Record one fullscreen draw.
    pub fn blit(&mut self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, op: &BlitOp) {
        let key = PipelineKey {
            pass: op.pass,
            format: op.target_format,
            blend: op.blend.map(|b| (b.source, b.destination)),
        };
        if !self.pipelines.contains_key(&key) {
            let pipeline = create_pipeline(device, &self.pipeline_layout, key);
            self.pipelines.insert(key, pipeline);
        }
        let pipeline = &self.pipelines[&key];

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Post FX Uniform"),
            contents: bytemuck::bytes_of(&op.uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Post FX Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(op.source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(op.source2.unwrap_or(op.source)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Post FX Blit"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: op.target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: op.load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        if let Some((x, y, w, h)) = op.viewport {
            pass.set_viewport(x, y, w, h, 0.0, 1.0);
        }
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
        pass.draw(0..6, 0..1);
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    key: PipelineKey,
) -> wgpu::RenderPipeline {
    let source = format!("{}{}", SHADER_COMMON, fragment_source(key.pass));
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Post FX Shader"),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let blend = key.blend.map(|(source, destination)| wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: source,
            dst_factor: destination,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: source,
            dst_factor: destination,
            operation: wgpu::BlendOperation::Add,
        },
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Post FX Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some("vs_main"),
            buffers: &[FullscreenVertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

// Shared WGSL: bindings, the fullscreen vertex stage and helper functions.
const SHADER_COMMON: &str = r#"
struct FxUniform {
    color_adjustments: vec4<f32>,
    color_filter: vec4<f32>,
    white_balance: vec4<f32>,
    split_toning_shadows: vec4<f32>,
    split_toning_highlights: vec4<f32>,
    channel_mixer_red: vec4<f32>,
    channel_mixer_green: vec4<f32>,
    channel_mixer_blue: vec4<f32>,
    smh_shadows: vec4<f32>,
    smh_midtones: vec4<f32>,
    smh_highlights: vec4<f32>,
    smh_range: vec4<f32>,
    lut_params: vec4<f32>,
    bloom_threshold: vec4<f32>,
    fxaa_config: vec4<f32>,
    params: vec4<f32>,
    texel_size: vec4<f32>,
}

@group(0) @binding(0) var source: texture_2d<f32>;
@group(0) @binding(1) var source2: texture_2d<f32>;
@group(0) @binding(2) var fx_sampler: sampler;
@group(0) @binding(3) var<uniform> fx: FxUniform;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = vec4<f32>(in.position, 0.0, 1.0);
    out.uv = in.uv;
    return out;
}

fn get_source(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(source, fx_sampler, uv, 0.0);
}

fn get_source2(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(source2, fx_sampler, uv, 0.0);
}

fn luminance(c: vec3<f32>) -> f32 {
    return dot(c, vec3<f32>(0.2126, 0.7152, 0.0722));
}

// 4-tap B-spline bicubic, used for bloom upsampling and the final rescale.
fn get_source_bicubic(uv: vec2<f32>) -> vec4<f32> {
    let texel = fx.texel_size.xy;
    let position = uv * fx.texel_size.zw - 0.5;
    let center = floor(position) + 0.5;
    let f = position - center;
    let f2 = f * f;
    let f3 = f2 * f;

    let w0 = f2 - 0.5 * (f3 + f);
    let w1 = 1.5 * f3 - 2.5 * f2 + 1.0;
    let w3 = 0.5 * (f3 - f2);
    let w2 = 1.0 - w0 - w1 - w3;

    let s0 = w0 + w1;
    let s1 = w2 + w3;
    let f0 = w1 / s0;
    let f1 = w3 / s1;

    let t0 = (center - 1.0 + f0) * texel;
    let t1 = (center + 1.0 + f1) * texel;

    return
        get_source(vec2<f32>(t0.x, t0.y)) * s0.x * s0.y +
        get_source(vec2<f32>(t1.x, t0.y)) * s1.x * s0.y +
        get_source(vec2<f32>(t0.x, t1.y)) * s0.x * s1.y +
        get_source(vec2<f32>(t1.x, t1.y)) * s1.x * s1.y;
}

fn apply_bloom_threshold(color: vec3<f32>) -> vec3<f32> {
    let brightness = max(color.r, max(color.g, color.b));
    var soft = brightness + fx.bloom_threshold.y;
    soft = clamp(soft, 0.0, fx.bloom_threshold.z);
    soft = soft * soft * fx.bloom_threshold.w;
    var contribution = max(soft, brightness - fx.bloom_threshold.x);
    contribution = contribution / max(brightness, 0.00001);
    return color * contribution;
}

const LOGC_A: f32 = 5.555556;
const LOGC_B: f32 = 0.047996;
const LOGC_C: f32 = 0.244161;
const LOGC_D: f32 = 0.386036;
const ACESCC_MIDGRAY: f32 = 0.4135884;
const LOG10_E_INV: f32 = 0.4342944819;

fn linear_to_logc(x: vec3<f32>) -> vec3<f32> {
    return LOGC_C * log(LOGC_A * max(x, vec3<f32>(0.0)) + LOGC_B) * LOG10_E_INV + LOGC_D;
}

fn logc_to_linear(x: vec3<f32>) -> vec3<f32> {
    return (pow(vec3<f32>(10.0), (x - LOGC_D) / LOGC_C) - LOGC_B) / LOGC_A;
}

// Strip coordinate -> LUT input color during generation.
// lut_params = (height, 0.5/width, 0.5/height, height/(height-1)).
fn lut_strip_value(raw_uv: vec2<f32>) -> vec3<f32> {
    let uv = raw_uv - fx.lut_params.yz;
    var color: vec3<f32>;
    color.r = fract(uv.x * fx.lut_params.x);
    color.b = uv.x - color.r / fx.lut_params.x;
    color.g = uv.y;
    return color * fx.lut_params.w;
}

// Sample the strip as a 3D table; blue picks the slice pair to blend.
// lut_params = (1/width, 1/height, height - 1) during application.
fn apply_lut(color: vec3<f32>) -> vec3<f32> {
    let scale = fx.lut_params.xyz;
    let z = color.b * scale.z;
    let shift = floor(z);
    let x = color.r * scale.z * scale.x + scale.x * 0.5 + shift * scale.y;
    let y = color.g * scale.z * scale.y + scale.y * 0.5;
    let lo = textureSampleLevel(source2, fx_sampler, vec2<f32>(x, y), 0.0).rgb;
    let hi = textureSampleLevel(source2, fx_sampler, vec2<f32>(x + scale.y, y), 0.0).rgb;
    return mix(lo, hi, z - shift);
}

fn rgb_to_hsv(c: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(0.0, -1.0 / 3.0, 2.0 / 3.0, -1.0);
    var p: vec4<f32>;
    if c.g < c.b {
        p = vec4<f32>(c.bg, k.wz);
    } else {
        p = vec4<f32>(c.gb, k.xy);
    }
    var q: vec4<f32>;
    if c.r < p.x {
        q = vec4<f32>(p.xyw, c.r);
    } else {
        q = vec4<f32>(c.r, p.yzx);
    }
    let d = q.x - min(q.w, q.y);
    let e = 1.0e-10;
    return vec3<f32>(abs(q.z + (q.w - q.y) / (6.0 * d + e)), d / (q.x + e), q.x);
}

fn hsv_to_rgb(c: vec3<f32>) -> vec3<f32> {
    let k = vec4<f32>(1.0, 2.0 / 3.0, 1.0 / 3.0, 3.0);
    let p = abs(fract(c.xxx + k.xyz) * 6.0 - k.www);
    return c.z * mix(k.xxx, clamp(p - k.xxx, vec3<f32>(0.0), vec3<f32>(1.0)), c.y);
}

fn soft_light(base: vec3<f32>, blend: vec3<f32>) -> vec3<f32> {
    return (1.0 - 2.0 * blend) * base * base + 2.0 * blend * base;
}

fn grade_color(input: vec3<f32>) -> vec3<f32> {
    // Exposure.
    var color = input * fx.color_adjustments.x;
    // White balance in LMS space.
    let lms = vec3<f32>(
        dot(color, vec3<f32>(0.390405, 0.549941, 0.0089263)),
        dot(color, vec3<f32>(0.0708416, 0.963172, 0.00135775)),
        dot(color, vec3<f32>(0.0231082, 0.128021, 0.936245)),
    ) * fx.white_balance.rgb;
    color = vec3<f32>(
        dot(lms, vec3<f32>(2.85847, -1.62879, -0.024891)),
        dot(lms, vec3<f32>(-0.210182, 1.15820, 0.000324281)),
        dot(lms, vec3<f32>(-0.041812, -0.118169, 1.06867)),
    );
    // Contrast around log-space mid gray.
    let logc = linear_to_logc(color);
    color = logc_to_linear((logc - ACESCC_MIDGRAY) * fx.color_adjustments.y + ACESCC_MIDGRAY);
    // Filter.
    color = max(color, vec3<f32>(0.0)) * fx.color_filter.rgb;
    // Split toning in gamma space around the luminance balance point.
    let gamma = pow(max(color, vec3<f32>(0.0)), vec3<f32>(1.0 / 2.2));
    let t = clamp(luminance(clamp(gamma, vec3<f32>(0.0), vec3<f32>(1.0))) + fx.split_toning_shadows.w, 0.0, 1.0);
    let shadow_tone = mix(vec3<f32>(0.5), fx.split_toning_shadows.rgb, 1.0 - t);
    let highlight_tone = mix(vec3<f32>(0.5), fx.split_toning_highlights.rgb, t);
    var toned = soft_light(gamma, shadow_tone);
    toned = soft_light(toned, highlight_tone);
    color = pow(max(toned, vec3<f32>(0.0)), vec3<f32>(2.2));
    // Channel mixer.
    color = vec3<f32>(
        dot(color, fx.channel_mixer_red.rgb),
        dot(color, fx.channel_mixer_green.rgb),
        dot(color, fx.channel_mixer_blue.rgb),
    );
    color = max(color, vec3<f32>(0.0));
    // Shadows / midtones / highlights.
    let luma = luminance(color);
    let shadows_weight = 1.0 - smoothstep(fx.smh_range.x, fx.smh_range.y, luma);
    let highlights_weight = smoothstep(fx.smh_range.z, fx.smh_range.w, luma);
    let midtones_weight = 1.0 - shadows_weight - highlights_weight;
    color = color * fx.smh_shadows.rgb * shadows_weight
        + color * fx.smh_midtones.rgb * midtones_weight
        + color * fx.smh_highlights.rgb * highlights_weight;
    // Hue shift.
    var hsv = rgb_to_hsv(color);
    hsv.x = fract(hsv.x + fx.color_adjustments.z);
    color = hsv_to_rgb(hsv);
    // Saturation.
    let gray = luminance(color);
    color = (color - gray) * fx.color_adjustments.w + gray;
    return max(color, vec3<f32>(0.0));
}

fn tonemap_aces(x: vec3<f32>) -> vec3<f32> {
    // Fitted ACES curve.
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    return clamp((x * (a * x + b)) / (x * (c * x + d) + e), vec3<f32>(0.0), vec3<f32>(1.0));
}

fn neutral_curve(x: vec3<f32>) -> vec3<f32> {
    let a = 0.2;
    let b = 0.29;
    let c = 0.24;
    let d = 0.272;
    let e = 0.02;
    let f = 0.3;
    return ((x * (a * x + c * b) + d * e) / (x * (a * x + b) + d * f)) - vec3<f32>(e / f);
}

fn tonemap_neutral(color: vec3<f32>) -> vec3<f32> {
    let white_level = vec3<f32>(5.3);
    let white_scale = vec3<f32>(1.0) / neutral_curve(white_level);
    return neutral_curve(color * white_scale) * white_scale;
}

fn fxaa_luma(uv: vec2<f32>, from_alpha: bool) -> f32 {
    let s = get_source(uv);
    if from_alpha {
        return s.a;
    }
    return sqrt(luminance(s.rgb));
}

fn fxaa_apply(uv: vec2<f32>, from_alpha: bool) -> vec4<f32> {
    let texel = fx.texel_size.xy;
    let m = fxaa_luma(uv, from_alpha);
    let n = fxaa_luma(uv + vec2<f32>(0.0, -texel.y), from_alpha);
    let s = fxaa_luma(uv + vec2<f32>(0.0, texel.y), from_alpha);
    let e = fxaa_luma(uv + vec2<f32>(texel.x, 0.0), from_alpha);
    let w = fxaa_luma(uv + vec2<f32>(-texel.x, 0.0), from_alpha);
    let ne = fxaa_luma(uv + vec2<f32>(texel.x, -texel.y), from_alpha);
    let nw = fxaa_luma(uv + vec2<f32>(-texel.x, -texel.y), from_alpha);
    let se = fxaa_luma(uv + texel, from_alpha);
    let sw = fxaa_luma(uv + vec2<f32>(-texel.x, texel.y), from_alpha);

    let max_luma = max(m, max(max(n, s), max(e, w)));
    let min_luma = min(m, min(min(n, s), min(e, w)));
    let range = max_luma - min_luma;
    if range < max(fx.fxaa_config.x, fx.fxaa_config.y * max_luma) {
        return get_source(uv);
    }

    // Subpixel blend strength from the lowpass contrast.
    var filter_value = 2.0 * (n + s + e + w) + ne + nw + se + sw;
    filter_value = abs(filter_value * (1.0 / 12.0) - m);
    filter_value = clamp(filter_value / range, 0.0, 1.0);
    filter_value = smoothstep(0.0, 1.0, filter_value);
    let pixel_blend = filter_value * filter_value * fx.fxaa_config.z;

    let horizontal = 2.0 * abs(n + s - 2.0 * m) + abs(ne + se - 2.0 * e) + abs(nw + sw - 2.0 * w)
        >= 2.0 * abs(e + w - 2.0 * m) + abs(ne + nw - 2.0 * n) + abs(se + sw - 2.0 * s);
    var step_size: vec2<f32>;
    var positive: f32;
    var negative: f32;
    if horizontal {
        step_size = vec2<f32>(0.0, texel.y);
        positive = s;
        negative = n;
    } else {
        step_size = vec2<f32>(texel.x, 0.0);
        positive = e;
        negative = w;
    }
    let gradient_positive = abs(positive - m);
    let gradient_negative = abs(negative - m);
    var edge_luma: f32;
    if gradient_positive < gradient_negative {
        step_size = -step_size;
        edge_luma = 0.5 * (m + negative);
    } else {
        edge_luma = 0.5 * (m + positive);
    }
    let gradient_threshold = 0.25 * max(gradient_positive, gradient_negative);

    // Walk along the edge in both directions until the luma leaves the edge.
    var edge_uv = uv + step_size * 0.5;
    var along: vec2<f32>;
    if horizontal {
        along = vec2<f32>(texel.x, 0.0);
    } else {
        along = vec2<f32>(0.0, texel.y);
    }
    let steps = i32(4.0 + fx.fxaa_config.w * 4.0);

    var p_uv = edge_uv + along;
    var p_delta = fxaa_luma(p_uv, from_alpha) - edge_luma;
    var p_end = abs(p_delta) >= gradient_threshold;
    var p_distance = 1.0;
    for (var i = 0; i < 16; i = i + 1) {
        if i >= steps || p_end {
            break;
        }
        p_uv = p_uv + along;
        p_delta = fxaa_luma(p_uv, from_alpha) - edge_luma;
        p_end = abs(p_delta) >= gradient_threshold;
        p_distance = p_distance + 1.0;
    }

    var n_uv = edge_uv - along;
    var n_delta = fxaa_luma(n_uv, from_alpha) - edge_luma;
    var n_end = abs(n_delta) >= gradient_threshold;
    var n_distance = 1.0;
    for (var i = 0; i < 16; i = i + 1) {
        if i >= steps || n_end {
            break;
        }
        n_uv = n_uv - along;
        n_delta = fxaa_luma(n_uv, from_alpha) - edge_luma;
        n_end = abs(n_delta) >= gradient_threshold;
        n_distance = n_distance + 1.0;
    }

    var shortest: f32;
    var delta_sign: bool;
    if p_distance <= n_distance {
        shortest = p_distance;
        delta_sign = p_delta >= 0.0;
    } else {
        shortest = n_distance;
        delta_sign = n_delta >= 0.0;
    }
    var edge_blend: f32;
    if delta_sign == (m - edge_luma >= 0.0) {
        edge_blend = 0.0;
    } else {
        edge_blend = 0.5 - shortest / (p_distance + n_distance);
    }

    let blend = max(pixel_blend, edge_blend);
    return get_source(uv + step_size * blend);
}
"#;

fn fragment_source(pass: FxPass) -> &'static str {
    match pass {
        FxPass::Copy => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return get_source(in.uv);
}
"#
        }
        FxPass::BloomPrefilter => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = apply_bloom_threshold(get_source(in.uv).rgb);
    return vec4<f32>(color, 1.0);
}
"#
        }
        FxPass::BloomPrefilterFireflies => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = vec3<f32>(0.0);
    var weight_sum = 0.0;
    let offsets = array<vec2<f32>, 5>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(-1.0, -1.0), vec2<f32>(-1.0, 1.0),
        vec2<f32>(1.0, -1.0), vec2<f32>(1.0, 1.0),
    );
    for (var i = 0; i < 5; i = i + 1) {
        var c = get_source(in.uv + offsets[i] * fx.texel_size.xy * 2.0).rgb;
        c = apply_bloom_threshold(c);
        let w = 1.0 / (luminance(c) + 1.0);
        color = color + c * w;
        weight_sum = weight_sum + w;
    }
    return vec4<f32>(color / weight_sum, 1.0);
}
"#
        }
        FxPass::BloomHorizontal => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = vec3<f32>(0.0);
    let weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    color = get_source(in.uv).rgb * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = vec2<f32>(f32(i) * fx.texel_size.x, 0.0);
        color = color + get_source(in.uv + offset).rgb * weights[i];
        color = color + get_source(in.uv - offset).rgb * weights[i];
    }
    return vec4<f32>(color, 1.0);
}
"#
        }
        FxPass::BloomVertical => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = vec3<f32>(0.0);
    let weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    color = get_source(in.uv).rgb * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = vec2<f32>(0.0, f32(i) * fx.texel_size.y);
        color = color + get_source(in.uv + offset).rgb * weights[i];
        color = color + get_source(in.uv - offset).rgb * weights[i];
    }
    return vec4<f32>(color, 1.0);
}
"#
        }
        FxPass::BloomAdd => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var low_res: vec3<f32>;
    if fx.params.y != 0.0 {
        low_res = get_source_bicubic(in.uv).rgb;
    } else {
        low_res = get_source(in.uv).rgb;
    }
    let high_res = get_source2(in.uv);
    return vec4<f32>(low_res * fx.params.x + high_res.rgb, high_res.a);
}
"#
        }
        FxPass::BloomScatter => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var low_res: vec3<f32>;
    if fx.params.y != 0.0 {
        low_res = get_source_bicubic(in.uv).rgb;
    } else {
        low_res = get_source(in.uv).rgb;
    }
    let high_res = get_source2(in.uv).rgb;
    return vec4<f32>(mix(high_res, low_res, fx.params.x), 1.0);
}
"#
        }
        FxPass::BloomScatterFinal => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var low_res: vec3<f32>;
    if fx.params.y != 0.0 {
        low_res = get_source_bicubic(in.uv).rgb;
    } else {
        low_res = get_source(in.uv).rgb;
    }
    let high_res = get_source2(in.uv);
    // Re-add the light the threshold removed so scattering conserves energy.
    low_res = low_res + high_res.rgb - apply_bloom_threshold(high_res.rgb);
    return vec4<f32>(mix(high_res.rgb, low_res, fx.params.x), high_res.a);
}
"#
        }
        FxPass::ColorGradingNone => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = lut_strip_value(in.uv);
    if fx.params.w != 0.0 {
        color = logc_to_linear(color);
    }
    return vec4<f32>(grade_color(color), 1.0);
}
"#
        }
        FxPass::ColorGradingAces => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = lut_strip_value(in.uv);
    if fx.params.w != 0.0 {
        color = logc_to_linear(color);
    }
    return vec4<f32>(tonemap_aces(grade_color(color)), 1.0);
}
"#
        }
        FxPass::ColorGradingNeutral => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = lut_strip_value(in.uv);
    if fx.params.w != 0.0 {
        color = logc_to_linear(color);
    }
    return vec4<f32>(tonemap_neutral(grade_color(color)), 1.0);
}
"#
        }
        FxPass::ColorGradingReinhard => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var color = lut_strip_value(in.uv);
    if fx.params.w != 0.0 {
        color = logc_to_linear(color);
    }
    color = grade_color(color);
    return vec4<f32>(color / (1.0 + color), 1.0);
}
"#
        }
        FxPass::ApplyColorGrading => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let src = get_source(in.uv);
    var color = src.rgb;
    if fx.params.w != 0.0 {
        color = linear_to_logc(color);
    }
    color = apply_lut(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)));
    return vec4<f32>(color, src.a);
}
"#
        }
        FxPass::ApplyColorGradingWithLuma => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let src = get_source(in.uv);
    var color = src.rgb;
    if fx.params.w != 0.0 {
        color = linear_to_logc(color);
    }
    color = apply_lut(clamp(color, vec3<f32>(0.0), vec3<f32>(1.0)));
    // FXAA reads its luma from alpha.
    return vec4<f32>(color, sqrt(luminance(color)));
}
"#
        }
        FxPass::Fxaa => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return fxaa_apply(in.uv, false);
}
"#
        }
        FxPass::FxaaWithLuma => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return fxaa_apply(in.uv, true);
}
"#
        }
        FxPass::FinalRescale => {
            r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    if fx.params.z != 0.0 {
        return get_source_bicubic(in.uv);
    }
    return get_source(in.uv);
}
"#
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_size_is_vec4_aligned() {
        assert_eq!(std::mem::size_of::<FxUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<FxUniform>(), 17 * 16);
    }

    #[test]
    fn test_set_source_size() {
        let mut uniform = FxUniform::default();
        uniform.set_source_size(800, 600);
        assert_eq!(uniform.texel_size, [1.0 / 800.0, 1.0 / 600.0, 800.0, 600.0]);
    }

    #[test]
    fn test_every_pass_has_a_fragment() {
        let passes = [
            FxPass::Copy,
            FxPass::BloomPrefilter,
            FxPass::BloomPrefilterFireflies,
            FxPass::BloomHorizontal,
            FxPass::BloomVertical,
            FxPass::BloomAdd,
            FxPass::BloomScatter,
            FxPass::BloomScatterFinal,
            FxPass::ColorGradingNone,
            FxPass::ColorGradingAces,
            FxPass::ColorGradingNeutral,
            FxPass::ColorGradingReinhard,
            FxPass::ApplyColorGrading,
            FxPass::ApplyColorGradingWithLuma,
            FxPass::Fxaa,
            FxPass::FxaaWithLuma,
            FxPass::FinalRescale,
        ];
        for pass in passes {
            assert!(fragment_source(pass).contains("fs_main"));
        }
    }
}
