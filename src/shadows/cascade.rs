//! Cascade culling-sphere data for directional shadows.
//!
//! Cascades are camera-aligned, not light-aligned, so one set of culling
//! spheres serves every shadowed directional light; the planner records them
//! from the first light only and shares the arrays with the shading stage.

use glam::{Vec4, Vec4Swizzles};

use super::config::FilterQuality;
use super::MAX_CASCADES;

const SQRT2: f32 = std::f32::consts::SQRT_2;

/// Per-frame cascade spheres and derived shading data.
#[derive(Debug, Clone, Default)]
pub struct CascadeFrame {
    /// Culling spheres, `xyz` center and `w` the squared filter-shrunk radius.
    spheres: [Vec4; MAX_CASCADES],
    /// Per-cascade `(1 / r^2, filter_size * sqrt(2), 0, 0)`.
    data: [Vec4; MAX_CASCADES],
    count: u32,
}

impl CascadeFrame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record cascade `index` from a culling sphere in world space
    /// (`w` = radius) as produced by the host's split computation.
    ///
    /// The radius is shrunk by the world-space reach of the PCF filter so
    /// samples never read outside the cascade, then squared so the shader
    /// compares against distance squared. Filter sizes large enough to
    /// consume the whole sphere are clamped out.
    pub fn set_cascade(
        &mut self,
        index: usize,
        mut culling_sphere: Vec4,
        tile_size: u32,
        filter: FilterQuality,
    ) {
        let texel_size = 2.0 * culling_sphere.w / tile_size as f32;
        let filter_size = texel_size * filter.texel_scale();
        culling_sphere.w = (culling_sphere.w - filter_size).max(f32::EPSILON);
        culling_sphere.w *= culling_sphere.w;
        self.spheres[index] = culling_sphere;
        self.data[index] = Vec4::new(1.0 / culling_sphere.w, filter_size * SQRT2, 0.0, 0.0);
        self.count = self.count.max(index as u32 + 1);
    }

    /// Culling sphere array for binding.
    #[inline]
    pub fn spheres(&self) -> &[Vec4; MAX_CASCADES] {
        &self.spheres
    }

    /// Derived data array for binding.
    #[inline]
    pub fn data(&self) -> &[Vec4; MAX_CASCADES] {
        &self.data
    }

    /// Number of recorded cascades.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Distance fade vector `(1/max_distance, 1/distance_fade, 1/(1-f^2), 0)`
/// with `f = 1 - cascade_fade`, consumed by the shading stage to fade both
/// the shadow distance and the last cascade edge.
pub fn distance_fade_vec(max_distance: f32, distance_fade: f32, cascade_fade: f32) -> Vec4 {
    let f = 1.0 - cascade_fade;
    Vec4::new(
        1.0 / max_distance,
        1.0 / distance_fade,
        1.0 / (1.0 - f * f),
        0.0,
    )
}

/// Caster culling factor for cascade blend bands.
///
/// Large fades keep more casters alive in the band to avoid popping, so the
/// factor shrinks toward zero as the fade grows.
pub fn blend_culling_factor(cascade_fade: f32) -> f32 {
    (0.8 - cascade_fade).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cascade_radius_shrinks_and_squares() {
        let mut frame = CascadeFrame::new();
        frame.set_cascade(0, Vec4::new(1.0, 2.0, 3.0, 10.0), 512, FilterQuality::Pcf3);

        let texel = 2.0 * 10.0 / 512.0;
        let filter = texel * 2.0;
        let shrunk = 10.0 - filter;
        let sphere = frame.spheres()[0];
        assert_eq!(sphere.xyz(), glam::Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(sphere.w, shrunk * shrunk);
        assert_relative_eq!(frame.data()[0].x, 1.0 / (shrunk * shrunk));
        assert_relative_eq!(frame.data()[0].y, filter * SQRT2);
    }

    #[test]
    fn test_cascade_radius_never_negative() {
        let mut frame = CascadeFrame::new();
        // A tiny sphere on a tiny tile: the filter reach exceeds the radius.
        frame.set_cascade(0, Vec4::new(0.0, 0.0, 0.0, 0.001), 2, FilterQuality::Pcf7);
        assert!(frame.spheres()[0].w > 0.0);
        assert!(frame.data()[0].x.is_finite());
    }

    #[test]
    fn test_cascade_count_tracks_highest_index() {
        let mut frame = CascadeFrame::new();
        frame.set_cascade(2, Vec4::new(0.0, 0.0, 0.0, 5.0), 256, FilterQuality::Pcf3);
        assert_eq!(frame.count(), 3);
    }

    #[test]
    fn test_distance_fade_vec() {
        let fade = distance_fade_vec(100.0, 0.1, 0.25);
        assert_relative_eq!(fade.x, 0.01);
        assert_relative_eq!(fade.y, 10.0);
        let f = 0.75f32;
        assert_relative_eq!(fade.z, 1.0 / (1.0 - f * f));
    }

    #[test]
    fn test_blend_culling_factor_floors_at_zero() {
        assert_relative_eq!(blend_culling_factor(0.1), 0.7);
        assert_eq!(blend_culling_factor(0.9), 0.0);
    }
}
