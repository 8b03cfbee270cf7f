//! Post-processing orchestration.
//!
//! One [`PostFxStack`] lives for the pipeline's lifetime and is fed one
//! frame at a time: bloom first when it is feasible, then grading, tone
//! mapping, FXAA and the final draw. Every transient texture is pooled and
//! released before `render` returns.

use crate::rt_pool::RtPool;
use crate::settings::{BicubicRescalingMode, FinalBlendMode, FxaaSettings};

use super::blit::{BlitOp, Blitter, FxPass, FxUniform};
use super::bloom::{record_bloom, BloomPlan};
use super::config::{ColorLutResolution, PostFxSettings};
use super::grading::{record_grading, GradingInput, GradingTarget, LDR_FORMAT};

/// HDR format of scene color and bloom intermediates.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Everything one camera frame feeds into the stack.
pub struct PostFxFrame<'a> {
    /// Scene color at working resolution.
    pub source: &'a wgpu::TextureView,
    /// Working resolution.
    pub buffer_size: (u32, u32),
    /// Camera output resolution.
    pub output_size: (u32, u32),
    /// Whether intermediates are HDR.
    pub use_hdr: bool,
    /// Preserve alpha through grading.
    pub keep_alpha: bool,
    /// FXAA settings with camera consent applied.
    pub fxaa: FxaaSettings,
    /// Final draw blending.
    pub final_blend: FinalBlendMode,
    /// Rescale filter policy.
    pub bicubic_rescaling: BicubicRescalingMode,
    /// Grading LUT resolution.
    pub lut_resolution: ColorLutResolution,
    /// Camera target view.
    pub target: &'a wgpu::TextureView,
    /// Camera target format.
    pub target_format: wgpu::TextureFormat,
    /// Camera viewport when it does not own the whole target.
    pub target_viewport: Option<(f32, f32, f32, f32)>,
}

/// The multi-pass post-processing stack.
pub struct PostFxStack {
    blitter: Blitter,
}

impl PostFxStack {
    /// Create the stack's shared GPU plumbing.
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            blitter: Blitter::new(device),
        }
    }

    /// Record the full post FX chain for one frame.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pool: &mut RtPool,
        settings: &PostFxSettings,
        frame: &PostFxFrame<'_>,
    ) {
        let working_format = if frame.use_hdr { HDR_FORMAT } else { LDR_FORMAT };

        let bloom_result = BloomPlan::build(&settings.bloom, frame.buffer_size, frame.output_size)
            .map(|plan| {
                record_bloom(
                    &mut self.blitter,
                    device,
                    encoder,
                    pool,
                    &plan,
                    frame.source,
                    frame.buffer_size,
                    frame.output_size,
                    working_format,
                )
            });

        let grading_source = match &bloom_result {
            Some(result) => result.view(),
            None => frame.source,
        };

        record_grading(
            &mut self.blitter,
            device,
            encoder,
            pool,
            settings,
            &GradingInput {
                source: grading_source,
                buffer_size: frame.buffer_size,
                output_size: frame.output_size,
                use_hdr: frame.use_hdr,
                keep_alpha: frame.keep_alpha,
                fxaa: frame.fxaa.clone(),
                final_blend: frame.final_blend,
                bicubic_rescaling: frame.bicubic_rescaling,
                lut_resolution: frame.lut_resolution,
            },
            &GradingTarget {
                view: frame.target,
                format: frame.target_format,
                viewport: frame.target_viewport,
            },
        );

        if let Some(result) = bloom_result {
            pool.release(result);
        }
    }

    /// Draw `source` straight to the camera target with the final blend
    /// mode applied.
    ///
    /// The fallback for frames that rendered into an intermediate buffer
    /// but have the post FX chain disabled.
    #[allow(clippy::too_many_arguments)]
    pub fn copy_to_target(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        source_size: (u32, u32),
        final_blend: FinalBlendMode,
        target: &wgpu::TextureView,
        target_format: wgpu::TextureFormat,
        target_viewport: Option<(f32, f32, f32, f32)>,
    ) {
        let mut uniform = FxUniform::default();
        uniform.set_source_size(source_size.0, source_size.1);
        let load = if final_blend.replaces_destination() && target_viewport.is_none() {
            wgpu::LoadOp::Clear(wgpu::Color::BLACK)
        } else {
            wgpu::LoadOp::Load
        };
        self.blitter.blit(
            device,
            encoder,
            &BlitOp {
                pass: FxPass::Copy,
                source,
                source2: None,
                target,
                target_format,
                uniform,
                load,
                blend: Some(final_blend),
                viewport: target_viewport,
            },
        );
    }
}
