//! Bloom pyramid compositing.
//!
//! Bloom is planned on the CPU first: [`BloomPlan::build`] decides whether
//! bloom runs at all and how deep the pyramid goes, without touching the GPU.
//! Recording then walks the plan: threshold prefilter at half resolution,
//! separable blur down the chain, and an additive or scattering combine back
//! up into a full-resolution result texture. Every level texture comes from
//! the pool and is released as soon as the next draw has consumed it.

use glam::Vec4;

use crate::color::srgb_to_linear;
use crate::rt_pool::{PooledRt, RtDesc, RtPool};

use super::blit::{BlitOp, Blitter, FxPass, FxUniform};
use super::config::{BloomMode, BloomSettings};

/// Pixel size of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BloomLevelSize {
    /// Level width.
    pub width: u32,
    /// Level height.
    pub height: u32,
}

/// A frame's bloom decisions, computed before any GPU work.
#[derive(Debug, Clone)]
pub struct BloomPlan {
    /// Prefilter target size (half the source).
    pub half_size: BloomLevelSize,
    /// Downsample chain sizes, starting at a quarter of the source.
    pub levels: Vec<BloomLevelSize>,
    /// Threshold prefilter variant.
    pub prefilter_pass: FxPass,
    /// Pass used for intermediate upsample combines.
    pub combine_pass: FxPass,
    /// Pass used for the last combine with the original source.
    pub final_pass: FxPass,
    /// Intensity of intermediate combines.
    pub step_intensity: f32,
    /// Intensity of the final combine.
    pub final_intensity: f32,
    /// Knee-softened threshold vector.
    pub threshold: Vec4,
    /// Bicubic upsample toggle.
    pub bicubic_upsampling: bool,
}

impl BloomPlan {
    /// Plan bloom for a frame, or `None` when bloom cannot contribute.
    ///
    /// `buffer_size` is the scaled working resolution, `pixel_size` the
    /// camera output resolution used when render scale is ignored. Inactive
    /// frames allocate nothing; the caller feeds the unmodified source to
    /// the grading stage instead.
    pub fn build(
        settings: &BloomSettings,
        buffer_size: (u32, u32),
        pixel_size: (u32, u32),
    ) -> Option<Self> {
        let (source_width, source_height) = if settings.ignore_render_scale {
            pixel_size
        } else {
            buffer_size
        };
        let mut width = source_width / 2;
        let mut height = source_height / 2;

        if settings.max_iterations == 0
            || settings.intensity <= 0.0
            || height < settings.downscale_limit * 2
            || width < settings.downscale_limit * 2
        {
            return None;
        }

        let half_size = BloomLevelSize { width, height };
        width /= 2;
        height /= 2;

        let mut levels = Vec::with_capacity(settings.max_iterations as usize);
        for _ in 0..settings.max_iterations {
            if height < settings.downscale_limit || width < settings.downscale_limit {
                break;
            }
            levels.push(BloomLevelSize { width, height });
            width /= 2;
            height /= 2;
        }

        let (combine_pass, final_pass, step_intensity, final_intensity) = match settings.mode {
            BloomMode::Additive => (FxPass::BloomAdd, FxPass::BloomAdd, 1.0, settings.intensity),
            BloomMode::Scattering => (
                FxPass::BloomScatter,
                FxPass::BloomScatterFinal,
                settings.scatter,
                settings.intensity.min(0.95),
            ),
        };

        Some(Self {
            half_size,
            levels,
            prefilter_pass: if settings.fade_fireflies {
                FxPass::BloomPrefilterFireflies
            } else {
                FxPass::BloomPrefilter
            },
            combine_pass,
            final_pass,
            step_intensity,
            final_intensity,
            threshold: threshold_vec(settings.threshold, settings.threshold_knee),
            bicubic_upsampling: settings.bicubic_upsampling,
        })
    }

    /// Upsample combine draws this plan will record.
    pub fn upsample_steps(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }
}

/// Knee-softened threshold vector consumed by the prefilter.
///
/// `x` holds the linear-space threshold; the remaining components encode the
/// soft knee so the shader evaluates it with one clamp and multiply-add.
pub fn threshold_vec(threshold: f32, knee: f32) -> Vec4 {
    let t = srgb_to_linear(threshold);
    let mut y = t * knee;
    let z = 2.0 * y;
    let w = 0.25 / (y + 1e-5);
    y -= t;
    Vec4::new(t, y, z, w)
}

/// CPU mirror of the prefilter curve: contribution factor for a pixel whose
/// brightest channel is `brightness`.
pub fn threshold_contribution(brightness: f32, threshold: Vec4) -> f32 {
    let mut soft = brightness + threshold.y;
    soft = soft.clamp(0.0, threshold.z);
    soft = soft * soft * threshold.w;
    soft.max(brightness - threshold.x) / brightness.max(1e-5)
}

struct Level {
    mid: PooledRt,
    dest: PooledRt,
    size: BloomLevelSize,
}

/// Record the planned pyramid and return the full-resolution bloom result.
///
/// `source` is sampled twice: by the prefilter and by the final combine. The
/// returned texture is pool-owned and must be released by the caller once
/// the grading stage has consumed it.
#[allow(clippy::too_many_arguments)]
pub fn record_bloom(
    blitter: &mut Blitter,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    pool: &mut RtPool,
    plan: &BloomPlan,
    source: &wgpu::TextureView,
    source_size: (u32, u32),
    output_size: (u32, u32),
    format: wgpu::TextureFormat,
) -> PooledRt {
    let mut uniform = FxUniform {
        bloom_threshold: plan.threshold.to_array(),
        ..FxUniform::default()
    };
    uniform.params[1] = if plan.bicubic_upsampling { 1.0 } else { 0.0 };

    let blit = |blitter: &mut Blitter,
                encoder: &mut wgpu::CommandEncoder,
                pass: FxPass,
                from: &wgpu::TextureView,
                from2: Option<&wgpu::TextureView>,
                to: &wgpu::TextureView,
                uniform: FxUniform| {
        blitter.blit(
            device,
            encoder,
            &BlitOp {
                pass,
                source: from,
                source2: from2,
                target: to,
                target_format: format,
                uniform,
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                blend: None,
                viewport: None,
            },
        );
    };

    // Threshold prefilter into the half-resolution root.
    let prefilter = pool.acquire(
        device,
        RtDesc::new(plan.half_size.width, plan.half_size.height, format),
    );
    uniform.set_source_size(source_size.0, source_size.1);
    blit(
        blitter,
        encoder,
        plan.prefilter_pass,
        source,
        None,
        prefilter.view(),
        uniform,
    );

    // Separable blur down the chain; each level keeps both textures alive
    // until the upsample walk consumes them.
    let mut pyramid: Vec<Level> = Vec::with_capacity(plan.levels.len());
    for &size in &plan.levels {
        let (source_view, source_size) = match pyramid.last() {
            Some(previous) => (previous.dest.view(), previous.size),
            None => (prefilter.view(), plan.half_size),
        };
        let mid = pool.acquire(device, RtDesc::new(size.width, size.height, format));
        let dest = pool.acquire(device, RtDesc::new(size.width, size.height, format));

        uniform.set_source_size(source_size.width, source_size.height);
        blit(
            blitter,
            encoder,
            FxPass::BloomHorizontal,
            source_view,
            None,
            mid.view(),
            uniform,
        );
        uniform.set_source_size(size.width, size.height);
        blit(
            blitter,
            encoder,
            FxPass::BloomVertical,
            mid.view(),
            None,
            dest.view(),
            uniform,
        );

        pyramid.push(Level { mid, dest, size });
    }

    // Walk back up, combining each level with the one above it.
    uniform.params[0] = plan.step_intensity;
    let mut ascending = pyramid.into_iter().rev();
    let (mut from, mut from_size) = match ascending.next() {
        Some(deepest) => {
            pool.release(prefilter);
            pool.release(deepest.mid);
            (deepest.dest, deepest.size)
        }
        // The plan guarantees at least one level; degrade to the blurless
        // root if a hand-built plan has none.
        None => (prefilter, plan.half_size),
    };
    for level in ascending {
        uniform.set_source_size(from_size.width, from_size.height);
        blit(
            blitter,
            encoder,
            plan.combine_pass,
            from.view(),
            Some(level.dest.view()),
            level.mid.view(),
            uniform,
        );
        pool.release(from);
        pool.release(level.dest);
        from = level.mid;
        from_size = level.size;
    }

    // Final combine with the unfiltered source at output resolution.
    uniform.params[0] = plan.final_intensity;
    uniform.set_source_size(from_size.width, from_size.height);
    let result = pool.acquire(device, RtDesc::new(output_size.0, output_size.1, format));
    blit(
        blitter,
        encoder,
        plan.final_pass,
        from.view(),
        Some(source),
        result.view(),
        uniform,
    );
    pool.release(from);

    log::debug!(
        "bloom: {} levels from {}x{}, {:?}",
        plan.levels.len(),
        plan.half_size.width,
        plan.half_size.height,
        plan.final_pass,
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn active_settings() -> BloomSettings {
        BloomSettings {
            max_iterations: 16,
            intensity: 1.0,
            downscale_limit: 2,
            ..BloomSettings::default()
        }
    }

    #[test]
    fn test_zero_iterations_is_inactive() {
        let settings = BloomSettings {
            max_iterations: 0,
            ..active_settings()
        };
        assert!(BloomPlan::build(&settings, (1920, 1080), (1920, 1080)).is_none());
    }

    #[test]
    fn test_zero_intensity_is_inactive() {
        let settings = BloomSettings {
            intensity: 0.0,
            ..active_settings()
        };
        assert!(BloomPlan::build(&settings, (1920, 1080), (1920, 1080)).is_none());
    }

    #[test]
    fn test_tiny_source_is_inactive() {
        // Half resolution of 6 is 3, below downscale_limit * 2.
        let settings = active_settings();
        assert!(BloomPlan::build(&settings, (6, 6), (6, 6)).is_none());
    }

    #[test]
    fn test_single_iteration_skips_upsample() {
        let settings = BloomSettings {
            max_iterations: 1,
            ..active_settings()
        };
        let plan = BloomPlan::build(&settings, (1920, 1080), (1920, 1080)).unwrap();
        assert_eq!(plan.levels.len(), 1);
        assert_eq!(plan.upsample_steps(), 0);
    }

    #[test]
    fn test_levels_halve_until_limit() {
        let settings = BloomSettings {
            downscale_limit: 60,
            ..active_settings()
        };
        let plan = BloomPlan::build(&settings, (1920, 1080), (1920, 1080)).unwrap();
        assert_eq!(plan.half_size, BloomLevelSize { width: 960, height: 540 });
        assert_eq!(
            plan.levels,
            vec![
                BloomLevelSize { width: 480, height: 270 },
                BloomLevelSize { width: 240, height: 135 },
                BloomLevelSize { width: 120, height: 67 },
            ]
        );
    }

    #[test]
    fn test_ignore_render_scale_uses_pixel_size() {
        let mut settings = active_settings();
        settings.ignore_render_scale = true;
        let plan = BloomPlan::build(&settings, (960, 540), (1920, 1080)).unwrap();
        assert_eq!(plan.half_size, BloomLevelSize { width: 960, height: 540 });
    }

    #[test]
    fn test_scattering_intensities() {
        let settings = BloomSettings {
            mode: BloomMode::Scattering,
            scatter: 0.6,
            intensity: 2.0,
            ..active_settings()
        };
        let plan = BloomPlan::build(&settings, (1920, 1080), (1920, 1080)).unwrap();
        assert_eq!(plan.combine_pass, FxPass::BloomScatter);
        assert_eq!(plan.final_pass, FxPass::BloomScatterFinal);
        assert_relative_eq!(plan.step_intensity, 0.6);
        // The final scatter blend clamps at 0.95.
        assert_relative_eq!(plan.final_intensity, 0.95);
    }

    #[test]
    fn test_additive_intensities() {
        let settings = BloomSettings {
            intensity: 0.8,
            ..active_settings()
        };
        let plan = BloomPlan::build(&settings, (1920, 1080), (1920, 1080)).unwrap();
        assert_eq!(plan.combine_pass, FxPass::BloomAdd);
        assert_relative_eq!(plan.step_intensity, 1.0);
        assert_relative_eq!(plan.final_intensity, 0.8);
    }

    #[test]
    fn test_threshold_vec_knee_algebra() {
        let t = threshold_vec(1.0, 0.5);
        // sRGB 1.0 is linear 1.0.
        assert_relative_eq!(t.x, 1.0);
        assert_relative_eq!(t.y, -0.5);
        assert_relative_eq!(t.z, 1.0);
        assert_relative_eq!(t.w, 0.25 / 0.50001);
    }

    #[test]
    fn test_midgray_below_threshold_contributes_nothing() {
        let t = threshold_vec(1.0, 0.5);
        assert_eq!(threshold_contribution(0.5, t), 0.0);
    }

    #[test]
    fn test_bright_pixels_keep_over_threshold_light() {
        let t = threshold_vec(1.0, 0.5);
        let contribution = threshold_contribution(2.0, t);
        assert_relative_eq!(contribution, (2.0 - 1.0) / 2.0, epsilon = 1e-4);
    }

    #[test]
    fn test_hard_knee_is_a_step() {
        let t = threshold_vec(0.5, 0.0);
        let linear_half = srgb_to_linear(0.5);
        assert_eq!(threshold_contribution(linear_half * 0.99, t), 0.0);
        assert!(threshold_contribution(linear_half * 2.0, t) > 0.0);
    }
}
