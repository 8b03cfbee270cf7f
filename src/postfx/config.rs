//! Post-processing configuration types.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::MAX_BLOOM_PYRAMID_LEVELS;

/// How upsampled bloom levels combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BloomMode {
    /// Classic additive bloom; intensity scales the final blend.
    #[default]
    Additive,
    /// Energy-conserving scatter; intensity scales each blend step.
    Scattering,
}

/// Bloom settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloomSettings {
    /// Size the pyramid from the camera's pixel size instead of the scaled
    /// buffer size, keeping bloom stable under render-scale changes.
    pub ignore_render_scale: bool,
    /// Maximum pyramid depth (0-16); zero disables bloom.
    pub max_iterations: u32,
    /// Stop downsampling once a dimension would fall below this.
    pub downscale_limit: u32,
    /// Use bicubic filtering while upsampling.
    pub bicubic_upsampling: bool,
    /// Brightness threshold in gamma space.
    pub threshold: f32,
    /// Softening knee for the threshold (0-1).
    pub threshold_knee: f32,
    /// Bloom strength; zero disables bloom.
    pub intensity: f32,
    /// Dampen single-pixel HDR flicker during prefiltering.
    pub fade_fireflies: bool,
    /// Combine mode.
    pub mode: BloomMode,
    /// Scatter amount per blend step (0.05-0.95), Scattering mode only.
    pub scatter: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            ignore_render_scale: false,
            max_iterations: 5,
            downscale_limit: 2,
            bicubic_upsampling: false,
            threshold: 0.8,
            threshold_knee: 0.5,
            intensity: 0.5,
            fade_fireflies: false,
            mode: BloomMode::Additive,
            scatter: 0.7,
        }
    }
}

impl BloomSettings {
    /// Create settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum iteration count.
    pub fn max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = iterations.min(MAX_BLOOM_PYRAMID_LEVELS as u32);
        self
    }

    /// Set the downscale limit.
    pub fn downscale_limit(mut self, limit: u32) -> Self {
        self.downscale_limit = limit.max(1);
        self
    }

    /// Set the threshold.
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold.max(0.0);
        self
    }

    /// Set the threshold knee.
    pub fn threshold_knee(mut self, knee: f32) -> Self {
        self.threshold_knee = knee.clamp(0.0, 1.0);
        self
    }

    /// Set the intensity.
    pub fn intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity.max(0.0);
        self
    }

    /// Set the combine mode.
    pub fn mode(mut self, mode: BloomMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the scatter amount.
    pub fn scatter(mut self, scatter: f32) -> Self {
        self.scatter = scatter.clamp(0.05, 0.95);
        self
    }
}

/// Exposure, contrast, filter, hue and saturation adjustments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorAdjustmentsSettings {
    /// Exposure in stops.
    pub post_exposure: f32,
    /// Contrast in percent (-100 to 100).
    pub contrast: f32,
    /// Multiplicative HDR color filter, linear.
    pub color_filter: Vec3,
    /// Hue shift in degrees (-180 to 180).
    pub hue_shift: f32,
    /// Saturation in percent (-100 to 100).
    pub saturation: f32,
}

impl Default for ColorAdjustmentsSettings {
    fn default() -> Self {
        Self {
            post_exposure: 0.0,
            contrast: 0.0,
            color_filter: Vec3::ONE,
            hue_shift: 0.0,
            saturation: 0.0,
        }
    }
}

/// White balance in temperature/tint percent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WhiteBalanceSettings {
    /// Warm/cool shift (-100 to 100).
    pub temperature: f32,
    /// Green/magenta shift (-100 to 100).
    pub tint: f32,
}

/// Separate tints for shadows and highlights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitToningSettings {
    /// Shadow tint, gamma space.
    pub shadows: Vec3,
    /// Highlight tint, gamma space.
    pub highlights: Vec3,
    /// Balance point between the two (-100 to 100).
    pub balance: f32,
}

impl Default for SplitToningSettings {
    fn default() -> Self {
        Self {
            shadows: Vec3::splat(0.5),
            highlights: Vec3::splat(0.5),
            balance: 0.0,
        }
    }
}

/// 3x3 output-channel mixing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMixerSettings {
    /// Input weights for the red output channel.
    pub red: Vec3,
    /// Input weights for the green output channel.
    pub green: Vec3,
    /// Input weights for the blue output channel.
    pub blue: Vec3,
}

impl Default for ChannelMixerSettings {
    fn default() -> Self {
        Self {
            red: Vec3::X,
            green: Vec3::Y,
            blue: Vec3::Z,
        }
    }
}

/// Per-range color wheels with configurable range boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowsMidtonesHighlightsSettings {
    /// Shadow tint, linear HDR.
    pub shadows: Vec3,
    /// Midtone tint, linear HDR.
    pub midtones: Vec3,
    /// Highlight tint, linear HDR.
    pub highlights: Vec3,
    /// Luminance where the shadow range starts falling off.
    pub shadows_start: f32,
    /// Luminance where the shadow range ends.
    pub shadows_end: f32,
    /// Luminance where the highlight range starts.
    pub highlights_start: f32,
    /// Luminance where the highlight range is fully in effect.
    pub highlights_end: f32,
}

impl Default for ShadowsMidtonesHighlightsSettings {
    fn default() -> Self {
        Self {
            shadows: Vec3::ONE,
            midtones: Vec3::ONE,
            highlights: Vec3::ONE,
            shadows_start: 0.0,
            shadows_end: 0.3,
            highlights_start: 0.55,
            highlights_end: 1.0,
        }
    }
}

/// Tone mapping operator applied while baking the grading LUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ToneMappingMode {
    /// No tone mapping; HDR values clip.
    #[default]
    None,
    /// ACES filmic curve.
    Aces,
    /// Neutral curve that mostly preserves hue.
    Neutral,
    /// Classic Reinhard.
    Reinhard,
}

/// Resolution of the color grading lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorLutResolution {
    /// 16 points per axis.
    Lut16,
    /// 32 points per axis (default).
    #[default]
    Lut32,
    /// 64 points per axis.
    Lut64,
}

impl ColorLutResolution {
    /// LUT height in pixels; width is the square of this.
    pub fn height(self) -> u32 {
        match self {
            Self::Lut16 => 16,
            Self::Lut32 => 32,
            Self::Lut64 => 64,
        }
    }
}

/// Complete post-processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFxSettings {
    /// Bloom stage.
    pub bloom: BloomSettings,
    /// Basic color adjustments.
    pub color_adjustments: ColorAdjustmentsSettings,
    /// White balance.
    pub white_balance: WhiteBalanceSettings,
    /// Split toning.
    pub split_toning: SplitToningSettings,
    /// Channel mixer.
    pub channel_mixer: ChannelMixerSettings,
    /// Shadows/midtones/highlights wheels.
    pub shadows_midtones_highlights: ShadowsMidtonesHighlightsSettings,
    /// Tone mapping operator.
    pub tone_mapping: ToneMappingMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_clamps() {
        let bloom = BloomSettings::new().max_iterations(99).scatter(2.0).downscale_limit(0);
        assert_eq!(bloom.max_iterations, 16);
        assert_eq!(bloom.scatter, 0.95);
        assert_eq!(bloom.downscale_limit, 1);
    }

    #[test]
    fn test_lut_resolutions() {
        assert_eq!(ColorLutResolution::Lut16.height(), 16);
        assert_eq!(ColorLutResolution::Lut32.height(), 32);
        assert_eq!(ColorLutResolution::Lut64.height(), 64);
    }

    #[test]
    fn test_channel_mixer_defaults_to_identity() {
        let mixer = ChannelMixerSettings::default();
        assert_eq!(mixer.red, Vec3::X);
        assert_eq!(mixer.green, Vec3::Y);
        assert_eq!(mixer.blue, Vec3::Z);
    }
}
