//! Interfaces to the host's culling and caster-drawing machinery.
//!
//! The pipeline core never walks a scene itself. The host supplies per-light
//! shadow matrices and caster bounds through [`ShadowCasterSource`], and
//! issues the actual caster draws when asked. Everything the core hands back
//! (viewport, matrices, biases) travels in a [`DrawShadowsRequest`].

use glam::{Mat4, Vec3, Vec4};

/// World-space axis-aligned bounds of a light's shadow casters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Box center.
    pub center: Vec3,
    /// Half-extents along each axis.
    pub extents: Vec3,
}

impl Bounds {
    /// Create bounds from center and half-extents.
    pub fn new(center: Vec3, extents: Vec3) -> Self {
        Self { center, extents }
    }
}

/// View/projection pair plus split data for one shadow sub-pass.
///
/// The culling sphere is `(center.xyz, radius)` in world space; only
/// directional cascades carry a meaningful one.
#[derive(Debug, Clone, Copy)]
pub struct ShadowSplit {
    /// World-to-light view matrix.
    pub view: Mat4,
    /// Light-space projection matrix.
    pub projection: Mat4,
    /// World-space culling sphere, `w` = radius.
    pub culling_sphere: Vec4,
}

impl ShadowSplit {
    /// Combined view-projection matrix for this split.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Cube map faces for point light shadow rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CubeFace {
    /// Positive X (+X).
    PositiveX = 0,
    /// Negative X (-X).
    NegativeX = 1,
    /// Positive Y (+Y).
    PositiveY = 2,
    /// Negative Y (-Y).
    NegativeY = 3,
    /// Positive Z (+Z).
    PositiveZ = 4,
    /// Negative Z (-Z).
    NegativeZ = 5,
}

impl CubeFace {
    /// All faces in render order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Outward direction of this face.
    pub fn direction(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    /// Up vector used when rendering this face.
    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::Z,
            CubeFace::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }
}

/// Everything a host needs to rasterize the casters of one shadow tile.
#[derive(Debug, Clone, Copy)]
pub struct DrawShadowsRequest {
    /// Index of the light in the host's visible-light list.
    pub visible_light_index: usize,
    /// Split data for this sub-pass.
    pub split: ShadowSplit,
    /// Slope-scale depth bias the host must apply while drawing.
    pub slope_scale_bias: f32,
    /// Culling factor for casters in cascade blend bands, `max(0, 0.8 - fade)`.
    pub blend_culling_factor: f32,
    /// Clamp casters behind the near plane onto it instead of clipping them.
    /// Set for directional (orthographic) tiles only.
    pub pancake: bool,
}

/// Host-side culling results and caster drawing.
///
/// Mirrors what the engine's culling step can answer about each visible
/// light; `draw_shadows` is expected to bind its own caster pipelines and
/// issue every draw for the sub-pass described by the request. The render
/// pass it receives already has the correct atlas viewport set.
pub trait ShadowCasterSource {
    /// Bounds of the light's shadow casters, or `None` when nothing in
    /// range casts a shadow for it.
    fn caster_bounds(&self, visible_light_index: usize) -> Option<Bounds>;

    /// Matrices and split data for one cascade of a directional light.
    fn directional_cascade(
        &self,
        visible_light_index: usize,
        cascade: u32,
        cascade_count: u32,
        ratios: [f32; 3],
        tile_size: u32,
        near_plane_offset: f32,
    ) -> ShadowSplit;

    /// Matrices and split data for a spot light.
    fn spot_split(&self, visible_light_index: usize) -> ShadowSplit;

    /// Matrices and split data for one cube face of a point light.
    ///
    /// `fov_bias_deg` widens the 90 degree face frustum to hide filtering
    /// seams at face edges.
    fn point_face_split(
        &self,
        visible_light_index: usize,
        face: CubeFace,
        fov_bias_deg: f32,
    ) -> ShadowSplit;

    /// Issue all caster draws for one sub-pass.
    fn draw_shadows(&self, pass: &mut wgpu::RenderPass<'_>, request: &DrawShadowsRequest);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_face_axes_are_orthogonal() {
        for face in CubeFace::ALL {
            assert_eq!(face.direction().dot(face.up()), 0.0);
            assert_eq!(face.direction().length(), 1.0);
            assert_eq!(face.up().length(), 1.0);
        }
    }

    #[test]
    fn test_view_projection_order() {
        let split = ShadowSplit {
            view: Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            projection: Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0),
            culling_sphere: Vec4::ZERO,
        };
        let p = split.view_projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        // The translation must be applied before the projection.
        assert!(p.z != 0.0);
    }
}
