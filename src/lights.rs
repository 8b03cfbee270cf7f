//! Visible-light descriptions and GPU light-array packing.
//!
//! The host's culling step hands the pipeline a flat list of [`VisibleLight`]s
//! each frame. [`LightBuffer`] packs them into the fixed-size vector arrays
//! the shading stage binds, reserving shadow tiles through the planner as it
//! goes so each light's shadow reservation lands next to its other data.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use crate::culling::ShadowCasterSource;
use crate::shadows::ShadowPlanner;

/// Maximum number of directional lights the shading stage supports.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

/// Maximum number of point/spot lights the shading stage supports.
pub const MAX_OTHER_LIGHTS: usize = 64;

/// The kind of a visible light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Sun-like light with parallel rays.
    Directional,
    /// Omnidirectional light with a range.
    Point,
    /// Cone-shaped light with a range and angles.
    Spot,
}

/// Shadow parameters of a light that casts real-time shadows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightShadowParams {
    /// Shadow strength in [0, 1]; zero disables the shadow entirely.
    pub strength: f32,
    /// Slope-scale depth bias applied while rendering casters.
    pub slope_scale_bias: f32,
    /// Normal bias applied while sampling.
    pub normal_bias: f32,
    /// Near-plane pullback for directional shadow projections.
    pub near_plane_offset: f32,
}

impl Default for LightShadowParams {
    fn default() -> Self {
        Self {
            strength: 1.0,
            slope_scale_bias: 0.05,
            normal_bias: 0.4,
            near_plane_offset: 0.2,
        }
    }
}

/// One visible light as reported by the host's culling step.
#[derive(Debug, Clone)]
pub struct VisibleLight {
    /// Light kind.
    pub kind: LightKind,
    /// Linear color, premultiplied by intensity.
    pub color: Vec3,
    /// World position; unused for directional lights.
    pub position: Vec3,
    /// Direction the light points, normalized.
    pub direction: Vec3,
    /// Influence range; unused for directional lights.
    pub range: f32,
    /// Outer spot angle in degrees.
    pub spot_angle: f32,
    /// Inner spot angle in degrees.
    pub inner_spot_angle: f32,
    /// Rendering layer bits this light affects.
    pub rendering_layer_mask: u32,
    /// Real-time shadow parameters, `None` when the light casts none.
    pub shadow: Option<LightShadowParams>,
    /// Baked shadow-mask channel when the light was baked in mixed
    /// shadow-mask mode.
    pub shadow_mask_channel: Option<u32>,
}

impl VisibleLight {
    /// Create a directional light.
    pub fn directional(color: Vec3, direction: Vec3) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            position: Vec3::ZERO,
            direction: direction.normalize(),
            range: f32::INFINITY,
            spot_angle: 0.0,
            inner_spot_angle: 0.0,
            rendering_layer_mask: u32::MAX,
            shadow: None,
            shadow_mask_channel: None,
        }
    }

    /// Create a point light.
    pub fn point(color: Vec3, position: Vec3, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            position,
            direction: Vec3::NEG_Y,
            range,
            spot_angle: 0.0,
            inner_spot_angle: 0.0,
            rendering_layer_mask: u32::MAX,
            shadow: None,
            shadow_mask_channel: None,
        }
    }

    /// Create a spot light. Angles are in degrees.
    pub fn spot(
        color: Vec3,
        position: Vec3,
        direction: Vec3,
        range: f32,
        spot_angle: f32,
        inner_spot_angle: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            color,
            position,
            direction: direction.normalize(),
            range,
            spot_angle,
            inner_spot_angle,
            rendering_layer_mask: u32::MAX,
            shadow: None,
            shadow_mask_channel: None,
        }
    }

    /// Enable real-time shadows.
    pub fn with_shadows(mut self, params: LightShadowParams) -> Self {
        self.shadow = Some(params);
        self
    }

    /// Assign a baked shadow-mask channel.
    pub fn with_shadow_mask_channel(mut self, channel: u32) -> Self {
        self.shadow_mask_channel = Some(channel);
        self
    }

    /// Restrict the light to specific rendering layers.
    pub fn with_rendering_layer_mask(mut self, mask: u32) -> Self {
        self.rendering_layer_mask = mask;
        self
    }
}

/// GPU-friendly lighting data, bound once per camera.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightingUniform {
    /// Directional light colors.
    pub dir_colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Directional directions, `w` = layer mask bits.
    pub dir_directions_and_masks: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Directional shadow reservations.
    pub dir_shadow_data: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Other light colors.
    pub other_colors: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Other positions, `w` = 1 / range^2.
    pub other_positions: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Other directions, `w` = layer mask bits.
    pub other_directions_and_masks: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Spot angle falloff pairs.
    pub other_spot_angles: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Other shadow reservations.
    pub other_shadow_data: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// `x` = directional count, `y` = other count.
    pub counts: [f32; 4],
}

impl Default for LightingUniform {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Packs visible lights into the shading stage's fixed arrays.
#[derive(Debug, Clone, Default)]
pub struct LightBuffer {
    uniform: LightingUniform,
    dir_count: usize,
    other_count: usize,
}

impl LightBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pack `lights` and reserve shadow tiles for them.
    ///
    /// Lights outside `rendering_layer_mask` are skipped, as are lights past
    /// the per-kind capacity. The planner must already be set up for the
    /// frame; `source` answers caster-bounds queries during reservation.
    pub fn setup(
        &mut self,
        lights: &[VisibleLight],
        rendering_layer_mask: u32,
        planner: &mut ShadowPlanner,
        source: &dyn ShadowCasterSource,
    ) {
        self.uniform = LightingUniform::zeroed();
        self.dir_count = 0;
        self.other_count = 0;

        for (visible_index, light) in lights.iter().enumerate() {
            if light.rendering_layer_mask & rendering_layer_mask == 0 {
                continue;
            }
            let has_casters = source.caster_bounds(visible_index).is_some();
            match light.kind {
                LightKind::Directional => {
                    if self.dir_count < MAX_DIRECTIONAL_LIGHTS {
                        self.setup_directional(visible_index, light, planner, has_casters);
                    }
                }
                LightKind::Point => {
                    if self.other_count < MAX_OTHER_LIGHTS {
                        self.setup_point(visible_index, light, planner, has_casters);
                    }
                }
                LightKind::Spot => {
                    if self.other_count < MAX_OTHER_LIGHTS {
                        self.setup_spot(visible_index, light, planner, has_casters);
                    }
                }
            }
        }

        self.uniform.counts = [self.dir_count as f32, self.other_count as f32, 0.0, 0.0];
    }

    fn setup_directional(
        &mut self,
        visible_index: usize,
        light: &VisibleLight,
        planner: &mut ShadowPlanner,
        has_casters: bool,
    ) {
        let i = self.dir_count;
        self.uniform.dir_colors[i] = light.color.extend(1.0).to_array();
        self.uniform.dir_directions_and_masks[i] = Vec4::new(
            -light.direction.x,
            -light.direction.y,
            -light.direction.z,
            f32::from_bits(light.rendering_layer_mask),
        )
        .to_array();
        self.uniform.dir_shadow_data[i] = planner
            .reserve_directional(light, visible_index, has_casters)
            .to_array();
        self.dir_count += 1;
    }

    fn setup_point(
        &mut self,
        visible_index: usize,
        light: &VisibleLight,
        planner: &mut ShadowPlanner,
        has_casters: bool,
    ) {
        let i = self.other_count;
        self.uniform.other_colors[i] = light.color.extend(1.0).to_array();
        self.uniform.other_positions[i] = light
            .position
            .extend(1.0 / light.range.powi(2).max(1e-5))
            .to_array();
        // No angle falloff for point lights.
        self.uniform.other_spot_angles[i] = [0.0, 1.0, 0.0, 0.0];
        self.uniform.other_directions_and_masks[i] =
            [0.0, 0.0, 0.0, f32::from_bits(light.rendering_layer_mask)];
        self.uniform.other_shadow_data[i] = planner
            .reserve_other(light, visible_index, has_casters)
            .to_array();
        self.other_count += 1;
    }

    fn setup_spot(
        &mut self,
        visible_index: usize,
        light: &VisibleLight,
        planner: &mut ShadowPlanner,
        has_casters: bool,
    ) {
        let i = self.other_count;
        self.uniform.other_colors[i] = light.color.extend(1.0).to_array();
        self.uniform.other_positions[i] = light
            .position
            .extend(1.0 / light.range.powi(2).max(1e-5))
            .to_array();
        self.uniform.other_directions_and_masks[i] = Vec4::new(
            -light.direction.x,
            -light.direction.y,
            -light.direction.z,
            f32::from_bits(light.rendering_layer_mask),
        )
        .to_array();
        self.uniform.other_spot_angles[i] = spot_angles(light.spot_angle, light.inner_spot_angle);
        self.uniform.other_shadow_data[i] = planner
            .reserve_other(light, visible_index, has_casters)
            .to_array();
        self.other_count += 1;
    }

    /// The packed uniform for binding.
    #[inline]
    pub fn uniform(&self) -> &LightingUniform {
        &self.uniform
    }

    /// Number of packed directional lights.
    #[inline]
    pub fn directional_count(&self) -> usize {
        self.dir_count
    }

    /// Number of packed point/spot lights.
    #[inline]
    pub fn other_count(&self) -> usize {
        self.other_count
    }
}

/// Angle falloff pair `(1/(cos_inner - cos_outer), -cos_outer * that)` so the
/// shader can evaluate the cone attenuation with a single mad + saturate.
fn spot_angles(outer_deg: f32, inner_deg: f32) -> [f32; 4] {
    let inner_cos = (inner_deg.to_radians() * 0.5).cos();
    let outer_cos = (outer_deg.to_radians() * 0.5).cos();
    let angle_range_inv = 1.0 / (inner_cos - outer_cos).max(0.001);
    [angle_range_inv, -outer_cos * angle_range_inv, 0.0, 0.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::{Bounds, CubeFace, DrawShadowsRequest, ShadowSplit};
    use crate::shadows::ShadowSettings;
    use approx::assert_relative_eq;

    struct NoCasters;

    impl ShadowCasterSource for NoCasters {
        fn caster_bounds(&self, _: usize) -> Option<Bounds> {
            None
        }
        fn directional_cascade(
            &self,
            _: usize,
            _: u32,
            _: u32,
            _: [f32; 3],
            _: u32,
            _: f32,
        ) -> ShadowSplit {
            unreachable!()
        }
        fn spot_split(&self, _: usize) -> ShadowSplit {
            unreachable!()
        }
        fn point_face_split(&self, _: usize, _: CubeFace, _: f32) -> ShadowSplit {
            unreachable!()
        }
        fn draw_shadows(&self, _: &mut wgpu::RenderPass<'_>, _: &DrawShadowsRequest) {}
    }

    fn white() -> Vec3 {
        Vec3::ONE
    }

    #[test]
    fn test_directional_limit() {
        let lights: Vec<VisibleLight> = (0..6)
            .map(|_| VisibleLight::directional(white(), Vec3::NEG_Y))
            .collect();
        let mut buffer = LightBuffer::new();
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        buffer.setup(&lights, u32::MAX, &mut planner, &NoCasters);
        assert_eq!(buffer.directional_count(), MAX_DIRECTIONAL_LIGHTS);
    }

    #[test]
    fn test_layer_mask_filters_lights() {
        let lights = vec![
            VisibleLight::point(white(), Vec3::ZERO, 5.0).with_rendering_layer_mask(0b01),
            VisibleLight::point(white(), Vec3::ZERO, 5.0).with_rendering_layer_mask(0b10),
        ];
        let mut buffer = LightBuffer::new();
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        buffer.setup(&lights, 0b10, &mut planner, &NoCasters);
        assert_eq!(buffer.other_count(), 1);
    }

    #[test]
    fn test_point_light_packing() {
        let lights = vec![VisibleLight::point(white(), Vec3::new(1.0, 2.0, 3.0), 10.0)];
        let mut buffer = LightBuffer::new();
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        buffer.setup(&lights, u32::MAX, &mut planner, &NoCasters);

        let position = buffer.uniform().other_positions[0];
        assert_relative_eq!(position[3], 1.0 / 100.0);
        // Full-sphere falloff pair.
        assert_eq!(buffer.uniform().other_spot_angles[0][0], 0.0);
        assert_eq!(buffer.uniform().other_spot_angles[0][1], 1.0);
    }

    #[test]
    fn test_spot_angle_packing() {
        let angles = spot_angles(90.0, 45.0);
        let inner_cos = (45.0f32.to_radians() * 0.5).cos();
        let outer_cos = (90.0f32.to_radians() * 0.5).cos();
        let inv = 1.0 / (inner_cos - outer_cos);
        assert_relative_eq!(angles[0], inv);
        assert_relative_eq!(angles[1], -outer_cos * inv);
    }

    #[test]
    fn test_direction_is_negated_for_shading() {
        let lights = vec![VisibleLight::directional(white(), Vec3::new(0.0, -1.0, 0.0))];
        let mut buffer = LightBuffer::new();
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        buffer.setup(&lights, u32::MAX, &mut planner, &NoCasters);
        // The shading stage wants the direction toward the light.
        assert_eq!(buffer.uniform().dir_directions_and_masks[0][1], 1.0);
    }

    #[test]
    fn test_uniform_is_pod() {
        let uniform = LightingUniform::default();
        let bytes = bytemuck::bytes_of(&uniform);
        assert_eq!(bytes.len(), std::mem::size_of::<LightingUniform>());
    }
}
