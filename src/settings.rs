//! Pipeline-wide and per-camera settings, and their resolution.
//!
//! Pipeline defaults live in [`PipelineSettings`]; a camera may carry a
//! [`CameraSettings`] override. The two are combined exactly once per camera
//! through [`EffectiveCameraSettings::resolve`] so no stage ever consults an
//! implicit default instance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::postfx::{ColorLutResolution, PostFxSettings};
use crate::shadows::{ShadowSettings, MAX_CASCADES};

/// Lowest allowed render scale.
pub const RENDER_SCALE_MIN: f32 = 0.1;

/// Highest allowed render scale.
pub const RENDER_SCALE_MAX: f32 = 2.0;

/// FXAA quality tier, selecting one of three shader variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FxaaQuality {
    /// Cheapest edge search.
    Low,
    /// Balanced edge search.
    #[default]
    Medium,
    /// Full-quality edge search.
    High,
}

/// FXAA configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxaaSettings {
    /// Whether FXAA runs at all.
    pub enabled: bool,
    /// Quality tier.
    pub quality: FxaaQuality,
    /// Absolute contrast below which pixels are skipped (0.0312-0.0833).
    pub fixed_threshold: f32,
    /// Contrast relative to local maximum below which pixels are skipped.
    pub relative_threshold: f32,
    /// Strength of subpixel blending (0-1).
    pub subpixel_blending: f32,
}

impl Default for FxaaSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            quality: FxaaQuality::Medium,
            fixed_threshold: 0.0833,
            relative_threshold: 0.166,
            subpixel_blending: 0.75,
        }
    }
}

/// When the final rescale blit uses bicubic filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BicubicRescalingMode {
    /// Always bilinear.
    Off,
    /// Bicubic only when upscaling; downscales stay bilinear.
    #[default]
    UpOnly,
    /// Bicubic in both directions.
    UpAndDown,
}

/// Pipeline-level camera buffer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraBufferSettings {
    /// Render to HDR intermediate buffers when the camera allows it.
    pub allow_hdr: bool,
    /// Copy the color attachment for sampling by transparents.
    pub copy_color: bool,
    /// Copy the depth attachment for sampling by transparents.
    pub copy_depth: bool,
    /// Global render scale multiplier.
    pub render_scale: f32,
    /// Bicubic mode of the final rescale.
    pub bicubic_rescaling: BicubicRescalingMode,
    /// FXAA configuration.
    pub fxaa: FxaaSettings,
}

impl Default for CameraBufferSettings {
    fn default() -> Self {
        Self {
            allow_hdr: true,
            copy_color: true,
            copy_depth: true,
            render_scale: 1.0,
            bicubic_rescaling: BicubicRescalingMode::UpOnly,
            fxaa: FxaaSettings::default(),
        }
    }
}

/// How a camera's render scale combines with the pipeline's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderScaleMode {
    /// Use the pipeline scale unchanged.
    #[default]
    Inherit,
    /// Multiply the pipeline scale by the camera's.
    Multiply,
    /// Replace the pipeline scale with the camera's.
    Override,
}

/// Blend factors for the final draw to the camera target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalBlendMode {
    /// Source factor.
    pub source: wgpu::BlendFactor,
    /// Destination factor.
    pub destination: wgpu::BlendFactor,
}

impl Default for FinalBlendMode {
    fn default() -> Self {
        Self {
            source: wgpu::BlendFactor::One,
            destination: wgpu::BlendFactor::Zero,
        }
    }
}

impl FinalBlendMode {
    /// Whether the final draw replaces the target, allowing a dont-care load.
    pub fn replaces_destination(&self) -> bool {
        self.destination == wgpu::BlendFactor::Zero
    }
}

/// Per-camera overrides of the pipeline defaults.
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Rendering layers this camera draws.
    pub rendering_layer_mask: u32,
    /// Apply the layer mask to lights as well as geometry.
    pub mask_lights: bool,
    /// Replace the pipeline's post FX settings for this camera.
    pub override_post_fx: Option<PostFxSettings>,
    /// Preserve the alpha channel through post FX (for compositing cameras).
    pub keep_alpha: bool,
    /// Allow FXAA when the pipeline enables it.
    pub allow_fxaa: bool,
    /// Copy color for this camera when the pipeline does.
    pub copy_color: bool,
    /// Copy depth for this camera when the pipeline does.
    pub copy_depth: bool,
    /// How `render_scale` combines with the pipeline scale.
    pub render_scale_mode: RenderScaleMode,
    /// Camera render scale.
    pub render_scale: f32,
    /// Blend factors for the final draw.
    pub final_blend: FinalBlendMode,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            rendering_layer_mask: u32::MAX,
            mask_lights: false,
            override_post_fx: None,
            keep_alpha: false,
            allow_fxaa: true,
            copy_color: true,
            copy_depth: true,
            render_scale_mode: RenderScaleMode::Inherit,
            render_scale: 1.0,
            final_blend: FinalBlendMode::default(),
        }
    }
}

impl CameraSettings {
    fn combined_render_scale(&self, pipeline_scale: f32) -> f32 {
        match self.render_scale_mode {
            RenderScaleMode::Inherit => pipeline_scale,
            RenderScaleMode::Multiply => pipeline_scale * self.render_scale,
            RenderScaleMode::Override => self.render_scale,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Camera buffer configuration.
    pub camera_buffer: CameraBufferSettings,
    /// Shadow configuration.
    pub shadows: ShadowSettings,
    /// Post FX configuration.
    pub post_fx: PostFxSettings,
    /// Grading LUT resolution.
    pub color_lut_resolution: ColorLutResolution,
}

/// Invalid settings reported by [`PipelineSettings::validate`].
#[derive(Error, Debug, PartialEq)]
pub enum SettingsError {
    /// Render scale outside the supported range.
    #[error("render scale {0} outside [{RENDER_SCALE_MIN}, {RENDER_SCALE_MAX}]")]
    RenderScale(f32),
    /// Bloom downscale limit below one.
    #[error("bloom downscale limit must be at least 1")]
    BloomDownscaleLimit,
    /// Bloom scatter outside its stable range.
    #[error("bloom scatter {0} outside [0.05, 0.95]")]
    BloomScatter(f32),
    /// Cascade count outside 1-4.
    #[error("cascade count {0} outside [1, {MAX_CASCADES}]")]
    CascadeCount(u32),
}

impl PipelineSettings {
    /// Check invariants that struct-literal construction can bypass.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let scale = self.camera_buffer.render_scale;
        if !(RENDER_SCALE_MIN..=RENDER_SCALE_MAX).contains(&scale) {
            return Err(SettingsError::RenderScale(scale));
        }
        if self.post_fx.bloom.downscale_limit < 1 {
            return Err(SettingsError::BloomDownscaleLimit);
        }
        let scatter = self.post_fx.bloom.scatter;
        if !(0.05..=0.95).contains(&scatter) {
            return Err(SettingsError::BloomScatter(scatter));
        }
        let cascades = self.shadows.directional.cascade_count;
        if !(1..=MAX_CASCADES as u32).contains(&cascades) {
            return Err(SettingsError::CascadeCount(cascades));
        }
        Ok(())
    }
}

/// Settings a camera actually renders with, resolved once per camera.
#[derive(Debug, Clone)]
pub struct EffectiveCameraSettings {
    /// Clamped combined render scale.
    pub render_scale: f32,
    /// Whether the intermediate buffers differ from the output size.
    pub use_scaled_rendering: bool,
    /// Whether color is copied for sampling.
    pub use_color_texture: bool,
    /// Whether depth is copied for sampling.
    pub use_depth_texture: bool,
    /// FXAA with camera consent applied.
    pub fxaa: FxaaSettings,
    /// Post FX settings in effect.
    pub post_fx: PostFxSettings,
    /// Preserve alpha through post FX.
    pub keep_alpha: bool,
    /// Apply the layer mask to lights.
    pub mask_lights: bool,
    /// Rendering layers drawn.
    pub rendering_layer_mask: u32,
    /// Final draw blending.
    pub final_blend: FinalBlendMode,
    /// Bicubic mode of the final rescale.
    pub bicubic_rescaling: BicubicRescalingMode,
    /// Grading LUT resolution.
    pub color_lut_resolution: ColorLutResolution,
}

impl EffectiveCameraSettings {
    /// Combine a camera's optional overrides with the pipeline defaults.
    pub fn resolve(camera: Option<&CameraSettings>, pipeline: &PipelineSettings) -> Self {
        let default_camera = CameraSettings::default();
        let camera = camera.unwrap_or(&default_camera);
        let buffer = &pipeline.camera_buffer;

        let render_scale = camera
            .combined_render_scale(buffer.render_scale)
            .clamp(RENDER_SCALE_MIN, RENDER_SCALE_MAX);

        let mut fxaa = buffer.fxaa.clone();
        fxaa.enabled &= camera.allow_fxaa;

        Self {
            render_scale,
            use_scaled_rendering: !(0.99..=1.01).contains(&render_scale),
            use_color_texture: buffer.copy_color && camera.copy_color,
            use_depth_texture: buffer.copy_depth && camera.copy_depth,
            fxaa,
            post_fx: camera
                .override_post_fx
                .clone()
                .unwrap_or_else(|| pipeline.post_fx.clone()),
            keep_alpha: camera.keep_alpha,
            mask_lights: camera.mask_lights,
            rendering_layer_mask: camera.rendering_layer_mask,
            final_blend: camera.final_blend,
            bicubic_rescaling: buffer.bicubic_rescaling,
            color_lut_resolution: pipeline.color_lut_resolution,
        }
    }

    /// Intermediate buffer size for a camera output size.
    pub fn buffer_size(&self, pixel_width: u32, pixel_height: u32) -> (u32, u32) {
        if self.use_scaled_rendering {
            (
                (pixel_width as f32 * self.render_scale) as u32,
                (pixel_height as f32 * self.render_scale) as u32,
            )
        } else {
            (pixel_width, pixel_height)
        }
    }

    /// Layer mask to filter lights with; all layers unless `mask_lights`.
    pub fn light_layer_mask(&self) -> u32 {
        if self.mask_lights {
            self.rendering_layer_mask
        } else {
            u32::MAX
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_without_override_uses_pipeline() {
        let pipeline = PipelineSettings::default();
        let effective = EffectiveCameraSettings::resolve(None, &pipeline);
        assert_eq!(effective.render_scale, 1.0);
        assert!(!effective.use_scaled_rendering);
        assert_eq!(effective.rendering_layer_mask, u32::MAX);
    }

    #[test]
    fn test_render_scale_modes() {
        let mut pipeline = PipelineSettings::default();
        pipeline.camera_buffer.render_scale = 0.5;

        let multiply = CameraSettings {
            render_scale_mode: RenderScaleMode::Multiply,
            render_scale: 0.5,
            ..CameraSettings::default()
        };
        let effective = EffectiveCameraSettings::resolve(Some(&multiply), &pipeline);
        assert_eq!(effective.render_scale, 0.25);
        assert!(effective.use_scaled_rendering);

        let override_mode = CameraSettings {
            render_scale_mode: RenderScaleMode::Override,
            render_scale: 1.0,
            ..CameraSettings::default()
        };
        let effective = EffectiveCameraSettings::resolve(Some(&override_mode), &pipeline);
        assert_eq!(effective.render_scale, 1.0);
        assert!(!effective.use_scaled_rendering);
    }

    #[test]
    fn test_render_scale_clamped() {
        let mut pipeline = PipelineSettings::default();
        pipeline.camera_buffer.render_scale = 1.0;
        let camera = CameraSettings {
            render_scale_mode: RenderScaleMode::Override,
            render_scale: 5.0,
            ..CameraSettings::default()
        };
        let effective = EffectiveCameraSettings::resolve(Some(&camera), &pipeline);
        assert_eq!(effective.render_scale, RENDER_SCALE_MAX);
    }

    #[test]
    fn test_fxaa_requires_both_consents() {
        let mut pipeline = PipelineSettings::default();
        pipeline.camera_buffer.fxaa.enabled = true;
        let camera = CameraSettings {
            allow_fxaa: false,
            ..CameraSettings::default()
        };
        let effective = EffectiveCameraSettings::resolve(Some(&camera), &pipeline);
        assert!(!effective.fxaa.enabled);

        let effective = EffectiveCameraSettings::resolve(None, &pipeline);
        assert!(effective.fxaa.enabled);
    }

    #[test]
    fn test_buffer_size_scaling() {
        let mut pipeline = PipelineSettings::default();
        pipeline.camera_buffer.render_scale = 0.5;
        let effective = EffectiveCameraSettings::resolve(None, &pipeline);
        assert_eq!(effective.buffer_size(1920, 1080), (960, 540));
    }

    #[test]
    fn test_validate_rejects_bad_scatter() {
        let mut pipeline = PipelineSettings::default();
        pipeline.post_fx.bloom.scatter = 0.99;
        assert_eq!(
            pipeline.validate(),
            Err(SettingsError::BloomScatter(0.99))
        );
        pipeline.post_fx.bloom.scatter = 0.7;
        assert!(pipeline.validate().is_ok());
    }

    #[test]
    fn test_light_layer_mask() {
        let pipeline = PipelineSettings::default();
        let camera = CameraSettings {
            mask_lights: true,
            rendering_layer_mask: 0b101,
            ..CameraSettings::default()
        };
        let effective = EffectiveCameraSettings::resolve(Some(&camera), &pipeline);
        assert_eq!(effective.light_layer_mask(), 0b101);
        assert_eq!(
            EffectiveCameraSettings::resolve(None, &pipeline).light_layer_mask(),
            u32::MAX
        );
    }
}
