//! Color grading, tone mapping and final output composition.
//!
//! Grading is baked into a strip-encoded 3D LUT every frame, then applied to
//! the scene in a single pass, optionally followed by FXAA. When the working
//! resolution differs from the output, grading and FXAA run at working
//! resolution and a dedicated rescale blit happens last; the two paths stay
//! separate because only the scaled one owns an intermediate texture.

use glam::Vec4;

use crate::color::white_balance_coeffs;
use crate::rt_pool::{RtDesc, RtPool};
use crate::settings::{BicubicRescalingMode, FinalBlendMode, FxaaQuality, FxaaSettings};

use super::blit::{BlitOp, Blitter, FxPass, FxUniform};
use super::config::{ColorLutResolution, PostFxSettings, ToneMappingMode};

/// LDR format of grading results and intermediates.
pub const LDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Format of the grading LUT; HDR so log-encoded ranges survive.
pub const LUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// LUT-generation pass for a tone mapping mode.
///
/// An explicit table; the shader pass list and the settings enum must never
/// be coupled through ordinal arithmetic.
pub fn lut_pass(mode: ToneMappingMode) -> FxPass {
    match mode {
        ToneMappingMode::None => FxPass::ColorGradingNone,
        ToneMappingMode::Aces => FxPass::ColorGradingAces,
        ToneMappingMode::Neutral => FxPass::ColorGradingNeutral,
        ToneMappingMode::Reinhard => FxPass::ColorGradingReinhard,
    }
}

/// LUT texture size: height per axis, width = height squared.
pub fn lut_size(resolution: ColorLutResolution) -> (u32, u32) {
    let height = resolution.height();
    (height * height, height)
}

/// LUT parameters while baking: `(h, 0.5/w, 0.5/h, h/(h-1))`.
pub fn lut_generation_params(resolution: ColorLutResolution) -> Vec4 {
    let (width, height) = lut_size(resolution);
    let h = height as f32;
    Vec4::new(h, 0.5 / width as f32, 0.5 / h, h / (h - 1.0))
}

/// LUT parameters while applying: `(1/w, 1/h, h-1, 0)`.
pub fn lut_application_params(resolution: ColorLutResolution) -> Vec4 {
    let (width, height) = lut_size(resolution);
    Vec4::new(
        1.0 / width as f32,
        1.0 / height as f32,
        height as f32 - 1.0,
        0.0,
    )
}

/// Whether the final rescale samples bicubically.
///
/// Up-only mode keeps downscales bilinear, where bicubic adds cost without
/// visible benefit.
pub fn use_bicubic_rescale(mode: BicubicRescalingMode, buffer_width: u32, output_width: u32) -> bool {
    match mode {
        BicubicRescalingMode::Off => false,
        BicubicRescalingMode::UpOnly => buffer_width < output_width,
        BicubicRescalingMode::UpAndDown => true,
    }
}

/// Pack every grading block into the shared pass uniform.
pub fn pack_grading(uniform: &mut FxUniform, settings: &PostFxSettings) {
    let adjustments = &settings.color_adjustments;
    uniform.color_adjustments = [
        2f32.powf(adjustments.post_exposure),
        adjustments.contrast * 0.01 + 1.0,
        adjustments.hue_shift / 360.0,
        adjustments.saturation * 0.01 + 1.0,
    ];
    uniform.color_filter = adjustments.color_filter.extend(1.0).to_array();
    uniform.white_balance = white_balance_coeffs(
        settings.white_balance.temperature,
        settings.white_balance.tint,
    )
    .extend(1.0)
    .to_array();
    uniform.split_toning_shadows = settings
        .split_toning
        .shadows
        .extend(settings.split_toning.balance * 0.01)
        .to_array();
    uniform.split_toning_highlights = settings.split_toning.highlights.extend(1.0).to_array();
    uniform.channel_mixer_red = settings.channel_mixer.red.extend(0.0).to_array();
    uniform.channel_mixer_green = settings.channel_mixer.green.extend(0.0).to_array();
    uniform.channel_mixer_blue = settings.channel_mixer.blue.extend(0.0).to_array();
    let smh = &settings.shadows_midtones_highlights;
    uniform.smh_shadows = smh.shadows.extend(0.0).to_array();
    uniform.smh_midtones = smh.midtones.extend(0.0).to_array();
    uniform.smh_highlights = smh.highlights.extend(0.0).to_array();
    uniform.smh_range = [
        smh.shadows_start,
        smh.shadows_end,
        smh.highlights_start,
        smh.highlights_end,
    ];
}

/// FXAA config vector `(fixed threshold, relative threshold, subpixel
/// blending, quality tier)`.
pub fn fxaa_config_vec(fxaa: &FxaaSettings) -> [f32; 4] {
    let quality = match fxaa.quality {
        FxaaQuality::Low => 0.0,
        FxaaQuality::Medium => 1.0,
        FxaaQuality::High => 2.0,
    };
    [
        fxaa.fixed_threshold,
        fxaa.relative_threshold,
        fxaa.subpixel_blending,
        quality,
    ]
}

/// Where the graded frame finally lands.
pub struct GradingTarget<'a> {
    /// Camera target view.
    pub view: &'a wgpu::TextureView,
    /// Camera target format.
    pub format: wgpu::TextureFormat,
    /// Sub-rect viewport when the camera does not own the whole target.
    pub viewport: Option<(f32, f32, f32, f32)>,
}

/// Inputs for one grading pass.
pub struct GradingInput<'a> {
    /// Scene color (or bloom result) at working resolution.
    pub source: &'a wgpu::TextureView,
    /// Working resolution.
    pub buffer_size: (u32, u32),
    /// Camera output resolution.
    pub output_size: (u32, u32),
    /// Whether the source is HDR (enables LogC LUT encoding).
    pub use_hdr: bool,
    /// Preserve source alpha instead of storing FXAA luma there.
    pub keep_alpha: bool,
    /// FXAA settings with camera consent applied.
    pub fxaa: FxaaSettings,
    /// Final-draw blending.
    pub final_blend: FinalBlendMode,
    /// Rescale filter policy.
    pub bicubic_rescaling: BicubicRescalingMode,
    /// LUT resolution.
    pub lut_resolution: ColorLutResolution,
}

/// Bake the LUT, apply grading (+ FXAA), and draw to the camera target,
/// rescaling last when the working resolution differs.
pub fn record_grading(
    blitter: &mut Blitter,
    device: &wgpu::Device,
    encoder: &mut wgpu::CommandEncoder,
    pool: &mut RtPool,
    settings: &PostFxSettings,
    input: &GradingInput<'_>,
    target: &GradingTarget<'_>,
) {
    let mut uniform = FxUniform::default();
    pack_grading(&mut uniform, settings);
    uniform.fxaa_config = fxaa_config_vec(&input.fxaa);

    // Bake the LUT. Log encoding only pays off when tone mapping compresses
    // an HDR range into it.
    let (lut_width, lut_height) = lut_size(input.lut_resolution);
    let pass = lut_pass(settings.tone_mapping);
    let lut_in_logc = input.use_hdr && pass != FxPass::ColorGradingNone;
    uniform.params[3] = if lut_in_logc { 1.0 } else { 0.0 };
    uniform.lut_params = lut_generation_params(input.lut_resolution).to_array();

    let lut = pool.acquire(device, RtDesc::new(lut_width, lut_height, LUT_FORMAT));
    blitter.blit(
        device,
        encoder,
        &BlitOp {
            pass,
            source: input.source,
            source2: None,
            target: lut.view(),
            target_format: LUT_FORMAT,
            uniform,
            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            blend: None,
            viewport: None,
        },
    );

    uniform.lut_params = lut_application_params(input.lut_resolution).to_array();
    uniform.set_source_size(input.buffer_size.0, input.buffer_size.1);

    let apply_pass = if input.keep_alpha {
        FxPass::ApplyColorGrading
    } else {
        FxPass::ApplyColorGradingWithLuma
    };
    let fxaa_pass = if input.keep_alpha {
        FxPass::Fxaa
    } else {
        FxPass::FxaaWithLuma
    };

    // FXAA consumes a graded LDR intermediate in both resolution branches.
    let grading_result = input.fxaa.enabled.then(|| {
        let result = pool.acquire(
            device,
            RtDesc::new(input.buffer_size.0, input.buffer_size.1, LDR_FORMAT),
        );
        blitter.blit(
            device,
            encoder,
            &BlitOp {
                pass: apply_pass,
                source: input.source,
                source2: Some(lut.view()),
                target: result.view(),
                target_format: LDR_FORMAT,
                uniform,
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                blend: None,
                viewport: None,
            },
        );
        result
    });

    let final_load = if input.final_blend.replaces_destination() && target.viewport.is_none() {
        wgpu::LoadOp::Clear(wgpu::Color::BLACK)
    } else {
        wgpu::LoadOp::Load
    };

    if input.buffer_size == input.output_size {
        // Native resolution: grading or FXAA draws straight to the target.
        match grading_result {
            Some(result) => {
                blitter.blit(
                    device,
                    encoder,
                    &BlitOp {
                        pass: fxaa_pass,
                        source: result.view(),
                        source2: None,
                        target: target.view,
                        target_format: target.format,
                        uniform,
                        load: final_load,
                        blend: Some(input.final_blend),
                        viewport: target.viewport,
                    },
                );
                pool.release(result);
            }
            None => {
                blitter.blit(
                    device,
                    encoder,
                    &BlitOp {
                        pass: FxPass::ApplyColorGrading,
                        source: input.source,
                        source2: Some(lut.view()),
                        target: target.view,
                        target_format: target.format,
                        uniform,
                        load: final_load,
                        blend: Some(input.final_blend),
                        viewport: target.viewport,
                    },
                );
            }
        }
    } else {
        // Scaled rendering: finish at working resolution, rescale last so
        // grading and FXAA never see resampled pixels.
        let final_result = pool.acquire(
            device,
            RtDesc::new(input.buffer_size.0, input.buffer_size.1, LDR_FORMAT),
        );
        match grading_result {
            Some(result) => {
                blitter.blit(
                    device,
                    encoder,
                    &BlitOp {
                        pass: fxaa_pass,
                        source: result.view(),
                        source2: None,
                        target: final_result.view(),
                        target_format: LDR_FORMAT,
                        uniform,
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        blend: None,
                        viewport: None,
                    },
                );
                pool.release(result);
            }
            None => {
                blitter.blit(
                    device,
                    encoder,
                    &BlitOp {
                        pass: FxPass::ApplyColorGrading,
                        source: input.source,
                        source2: Some(lut.view()),
                        target: final_result.view(),
                        target_format: LDR_FORMAT,
                        uniform,
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        blend: None,
                        viewport: None,
                    },
                );
            }
        }

        let bicubic = use_bicubic_rescale(
            input.bicubic_rescaling,
            input.buffer_size.0,
            input.output_size.0,
        );
        uniform.params[2] = if bicubic { 1.0 } else { 0.0 };
        blitter.blit(
            device,
            encoder,
            &BlitOp {
                pass: FxPass::FinalRescale,
                source: final_result.view(),
                source2: None,
                target: target.view,
                target_format: target.format,
                uniform,
                load: final_load,
                blend: Some(input.final_blend),
                viewport: target.viewport,
            },
        );
        pool.release(final_result);
    }

    pool.release(lut);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lut_32_is_1024_by_32() {
        assert_eq!(lut_size(ColorLutResolution::Lut32), (1024, 32));
    }

    #[test]
    fn test_lut_pass_table() {
        assert_eq!(lut_pass(ToneMappingMode::None), FxPass::ColorGradingNone);
        assert_eq!(lut_pass(ToneMappingMode::Aces), FxPass::ColorGradingAces);
        assert_eq!(lut_pass(ToneMappingMode::Neutral), FxPass::ColorGradingNeutral);
        assert_eq!(lut_pass(ToneMappingMode::Reinhard), FxPass::ColorGradingReinhard);
    }

    #[test]
    fn test_lut_generation_params() {
        let params = lut_generation_params(ColorLutResolution::Lut32);
        assert_relative_eq!(params.x, 32.0);
        assert_relative_eq!(params.y, 0.5 / 1024.0);
        assert_relative_eq!(params.z, 0.5 / 32.0);
        assert_relative_eq!(params.w, 32.0 / 31.0);
    }

    #[test]
    fn test_lut_application_params() {
        let params = lut_application_params(ColorLutResolution::Lut16);
        assert_relative_eq!(params.x, 1.0 / 256.0);
        assert_relative_eq!(params.y, 1.0 / 16.0);
        assert_relative_eq!(params.z, 15.0);
    }

    #[test]
    fn test_pack_grading_ranges() {
        let mut settings = PostFxSettings::default();
        settings.color_adjustments.post_exposure = 1.0;
        settings.color_adjustments.contrast = 50.0;
        settings.color_adjustments.hue_shift = 90.0;
        settings.color_adjustments.saturation = -100.0;
        settings.split_toning.balance = 20.0;

        let mut uniform = FxUniform::default();
        pack_grading(&mut uniform, &settings);
        assert_relative_eq!(uniform.color_adjustments[0], 2.0);
        assert_relative_eq!(uniform.color_adjustments[1], 1.5);
        assert_relative_eq!(uniform.color_adjustments[2], 0.25);
        assert_relative_eq!(uniform.color_adjustments[3], 0.0);
        assert_relative_eq!(uniform.split_toning_shadows[3], 0.2);
    }

    #[test]
    fn test_neutral_grading_is_identity_packed() {
        let mut uniform = FxUniform::default();
        pack_grading(&mut uniform, &PostFxSettings::default());
        assert_eq!(uniform.color_adjustments, [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(uniform.channel_mixer_red, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(uniform.channel_mixer_green, [0.0, 1.0, 0.0, 0.0]);
        assert_eq!(uniform.channel_mixer_blue, [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_fxaa_config_vec() {
        let fxaa = FxaaSettings {
            quality: FxaaQuality::High,
            ..FxaaSettings::default()
        };
        let config = fxaa_config_vec(&fxaa);
        assert_relative_eq!(config[0], 0.0833);
        assert_relative_eq!(config[1], 0.166);
        assert_relative_eq!(config[2], 0.75);
        assert_eq!(config[3], 2.0);
    }

    #[test]
    fn test_bicubic_rescale_policy() {
        use BicubicRescalingMode::*;
        assert!(!use_bicubic_rescale(Off, 960, 1920));
        assert!(use_bicubic_rescale(UpOnly, 960, 1920));
        assert!(!use_bicubic_rescale(UpOnly, 1920, 960));
        assert!(use_bicubic_rescale(UpAndDown, 1920, 960));
    }
}
