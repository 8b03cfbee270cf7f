//! Shadow configuration types.

use serde::{Deserialize, Serialize};

use super::MAX_CASCADES;

/// Square shadow atlas resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AtlasSize {
    /// 256x256.
    Size256,
    /// 512x512.
    Size512,
    /// 1024x1024 (default).
    #[default]
    Size1024,
    /// 2048x2048.
    Size2048,
    /// 4096x4096.
    Size4096,
    /// 8192x8192.
    Size8192,
}

impl AtlasSize {
    /// Edge length in pixels.
    pub fn pixels(self) -> u32 {
        match self {
            Self::Size256 => 256,
            Self::Size512 => 512,
            Self::Size1024 => 1024,
            Self::Size2048 => 2048,
            Self::Size4096 => 4096,
            Self::Size8192 => 8192,
        }
    }

    /// Size of one texel in UV units.
    pub fn texel_size(self) -> f32 {
        1.0 / self.pixels() as f32
    }
}

/// PCF filter quality for shadow sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterQuality {
    /// 3x3 tent filter.
    #[default]
    Pcf3,
    /// 5x5 tent filter.
    Pcf5,
    /// 7x7 tent filter.
    Pcf7,
}

impl FilterQuality {
    /// How many texels the filter reaches across, used to widen normal
    /// biases and shrink cascade culling spheres.
    pub fn texel_scale(self) -> f32 {
        match self {
            Self::Pcf3 => 2.0,
            Self::Pcf5 => 3.0,
            Self::Pcf7 => 4.0,
        }
    }
}

/// Global shadow-mask sampling mode, a project-level quality setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadowMaskMode {
    /// Sample the baked mask everywhere.
    Always,
    /// Sample the baked mask only beyond the real-time shadow distance.
    #[default]
    Distance,
}

/// Blend mode between directional cascades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CascadeBlend {
    /// Hard cascade transitions.
    #[default]
    None,
    /// Smooth interpolation in the transition band.
    Soft,
    /// Dithered transition, cheaper than soft.
    Dither,
}

/// Settings for directional (cascaded) shadows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionalShadowSettings {
    /// Atlas resolution.
    pub atlas_size: AtlasSize,
    /// PCF filter quality.
    pub filter: FilterQuality,
    /// Number of cascades (1-4).
    pub cascade_count: u32,
    /// Split ratios for cascades 1-3 as fractions of the max distance.
    pub cascade_ratios: [f32; 3],
    /// Fraction of a cascade used to fade into the next one.
    pub cascade_fade: f32,
    /// Blend mode between cascades.
    pub cascade_blend: CascadeBlend,
}

impl Default for DirectionalShadowSettings {
    fn default() -> Self {
        Self {
            atlas_size: AtlasSize::Size1024,
            filter: FilterQuality::Pcf3,
            cascade_count: 4,
            cascade_ratios: [0.1, 0.25, 0.5],
            cascade_fade: 0.1,
            cascade_blend: CascadeBlend::Soft,
        }
    }
}

impl DirectionalShadowSettings {
    /// Create settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the atlas resolution.
    pub fn atlas_size(mut self, size: AtlasSize) -> Self {
        self.atlas_size = size;
        self
    }

    /// Set the filter quality.
    pub fn filter(mut self, filter: FilterQuality) -> Self {
        self.filter = filter;
        self
    }

    /// Set the cascade count.
    pub fn cascade_count(mut self, count: u32) -> Self {
        self.cascade_count = count.clamp(1, MAX_CASCADES as u32);
        self
    }

    /// Set the cascade split ratios.
    pub fn cascade_ratios(mut self, ratios: [f32; 3]) -> Self {
        self.cascade_ratios = ratios.map(|r| r.clamp(0.0, 1.0));
        self
    }

    /// Set the cascade fade fraction.
    pub fn cascade_fade(mut self, fade: f32) -> Self {
        self.cascade_fade = fade.clamp(0.001, 1.0);
        self
    }

    /// Set the cascade blend mode.
    pub fn cascade_blend(mut self, blend: CascadeBlend) -> Self {
        self.cascade_blend = blend;
        self
    }
}

/// Settings for point and spot light shadows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherShadowSettings {
    /// Atlas resolution.
    pub atlas_size: AtlasSize,
    /// PCF filter quality.
    pub filter: FilterQuality,
}

impl Default for OtherShadowSettings {
    fn default() -> Self {
        Self {
            atlas_size: AtlasSize::Size1024,
            filter: FilterQuality::Pcf3,
        }
    }
}

impl OtherShadowSettings {
    /// Create settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the atlas resolution.
    pub fn atlas_size(mut self, size: AtlasSize) -> Self {
        self.atlas_size = size;
        self
    }

    /// Set the filter quality.
    pub fn filter(mut self, filter: FilterQuality) -> Self {
        self.filter = filter;
        self
    }
}

/// Top-level shadow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowSettings {
    /// Maximum distance at which shadows are rendered.
    pub max_distance: f32,
    /// Fraction of the max distance over which shadows fade out.
    pub distance_fade: f32,
    /// Global baked shadow-mask mode.
    pub shadow_mask_mode: ShadowMaskMode,
    /// Directional light settings.
    pub directional: DirectionalShadowSettings,
    /// Point/spot light settings.
    pub other: OtherShadowSettings,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            distance_fade: 0.1,
            shadow_mask_mode: ShadowMaskMode::default(),
            directional: DirectionalShadowSettings::default(),
            other: OtherShadowSettings::default(),
        }
    }
}

impl ShadowSettings {
    /// Create settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum shadow distance.
    pub fn max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance.max(0.001);
        self
    }

    /// Set the distance fade fraction.
    pub fn distance_fade(mut self, fade: f32) -> Self {
        self.distance_fade = fade.clamp(0.001, 1.0);
        self
    }

    /// Set the global shadow-mask mode.
    pub fn shadow_mask_mode(mut self, mode: ShadowMaskMode) -> Self {
        self.shadow_mask_mode = mode;
        self
    }

    /// Set the directional settings.
    pub fn directional(mut self, directional: DirectionalShadowSettings) -> Self {
        self.directional = directional;
        self
    }

    /// Set the point/spot settings.
    pub fn other(mut self, other: OtherShadowSettings) -> Self {
        self.other = other;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atlas_sizes_are_powers_of_two() {
        for size in [
            AtlasSize::Size256,
            AtlasSize::Size512,
            AtlasSize::Size1024,
            AtlasSize::Size2048,
            AtlasSize::Size4096,
            AtlasSize::Size8192,
        ] {
            assert!(size.pixels().is_power_of_two());
            assert_eq!(size.texel_size(), 1.0 / size.pixels() as f32);
        }
    }

    #[test]
    fn test_filter_texel_scale() {
        assert_eq!(FilterQuality::Pcf3.texel_scale(), 2.0);
        assert_eq!(FilterQuality::Pcf5.texel_scale(), 3.0);
        assert_eq!(FilterQuality::Pcf7.texel_scale(), 4.0);
    }

    #[test]
    fn test_cascade_count_clamped() {
        let settings = DirectionalShadowSettings::new().cascade_count(9);
        assert_eq!(settings.cascade_count, 4);
        let settings = DirectionalShadowSettings::new().cascade_count(0);
        assert_eq!(settings.cascade_count, 1);
    }
}
