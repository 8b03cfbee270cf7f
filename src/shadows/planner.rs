//! Per-frame shadow tile reservation.
//!
//! Before any atlas rendering happens, every shadowed light asks for tiles.
//! Directional lights get one tile per cascade, spot lights one tile, point
//! lights six. Refusals are not errors: the light receives a sentinel record
//! and the shading stage falls back to unshadowed lighting or the baked
//! shadow mask.

use glam::Vec4;

use crate::lights::VisibleLight;

use super::config::{ShadowMaskMode, ShadowSettings};
use super::{MAX_SHADOWED_DIRECTIONAL_LIGHTS, MAX_SHADOWED_OTHER_TILES};

/// Fixed four-component shadow reservation record for one light.
///
/// A negative `strength` means no geometry casts real-time shadows for the
/// light this frame: the shading stage skips the atlas but still applies the
/// baked mask when `mask_channel` is non-negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservationResult {
    /// Shadow strength; negative = "no casters" sentinel.
    pub strength: f32,
    /// First tile index (other lights) or cascade-array offset (directional).
    pub tile_index: f32,
    /// Normal bias (directional) or point-light flag (other).
    pub normal_bias_or_flag: f32,
    /// Baked shadow-mask channel, -1 when unused.
    pub mask_channel: f32,
}

impl ReservationResult {
    /// Record for a light with no shadows at all.
    pub const NONE: Self = Self {
        strength: 0.0,
        tile_index: 0.0,
        normal_bias_or_flag: 0.0,
        mask_channel: -1.0,
    };

    fn sentinel(strength: f32, mask_channel: f32) -> Self {
        Self {
            strength: -strength,
            tile_index: 0.0,
            normal_bias_or_flag: 0.0,
            mask_channel,
        }
    }

    /// Whether this is the "no casters" sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.strength < 0.0
    }

    /// As the vec4 the shading stage binds.
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(
            self.strength,
            self.tile_index,
            self.normal_bias_or_flag,
            self.mask_channel,
        )
    }

    /// As a plain float array.
    pub fn to_array(self) -> [f32; 4] {
        self.to_vec4().to_array()
    }
}

/// A reserved directional shadow caster.
#[derive(Debug, Clone, Copy)]
pub struct ShadowedDirectionalLight {
    /// Index into the host's visible-light list.
    pub visible_light_index: usize,
    /// Slope-scale depth bias while rendering its casters.
    pub slope_scale_bias: f32,
    /// Near-plane pullback for its shadow projections.
    pub near_plane_offset: f32,
}

/// A reserved point or spot shadow caster.
#[derive(Debug, Clone, Copy)]
pub struct ShadowedOtherLight {
    /// Index into the host's visible-light list.
    pub visible_light_index: usize,
    /// Slope-scale depth bias while rendering its casters.
    pub slope_scale_bias: f32,
    /// Normal bias for sampling.
    pub normal_bias: f32,
    /// Point lights occupy six consecutive tiles.
    pub is_point: bool,
    /// First tile index in the other-light atlas.
    pub tile_index: u32,
}

impl ShadowedOtherLight {
    /// Tiles this light occupies.
    pub fn tile_count(&self) -> u32 {
        if self.is_point {
            6
        } else {
            1
        }
    }
}

/// Collects tile reservations for one frame.
#[derive(Debug, Clone)]
pub struct ShadowPlanner {
    settings: ShadowSettings,
    directional: Vec<ShadowedDirectionalLight>,
    other: Vec<ShadowedOtherLight>,
    other_tiles_used: u32,
    use_shadow_mask: bool,
}

impl ShadowPlanner {
    /// Create a planner for one frame.
    pub fn new(settings: ShadowSettings) -> Self {
        Self {
            settings,
            directional: Vec::with_capacity(MAX_SHADOWED_DIRECTIONAL_LIGHTS),
            other: Vec::new(),
            other_tiles_used: 0,
            use_shadow_mask: false,
        }
    }

    /// Reserve cascade tiles for a directional light.
    ///
    /// `has_casters` is the host's caster-bounds answer; without casters the
    /// light gets the sentinel and consumes nothing.
    pub fn reserve_directional(
        &mut self,
        light: &VisibleLight,
        visible_light_index: usize,
        has_casters: bool,
    ) -> ReservationResult {
        let Some(shadow) = light.shadow else {
            return ReservationResult::NONE;
        };
        if self.directional.len() >= MAX_SHADOWED_DIRECTIONAL_LIGHTS || shadow.strength <= 0.0 {
            return ReservationResult::NONE;
        }

        let mask_channel = self.note_shadow_mask(light);
        if !has_casters {
            return ReservationResult::sentinel(shadow.strength, mask_channel);
        }

        let index = self.directional.len();
        self.directional.push(ShadowedDirectionalLight {
            visible_light_index,
            slope_scale_bias: shadow.slope_scale_bias,
            near_plane_offset: shadow.near_plane_offset,
        });
        ReservationResult {
            strength: shadow.strength,
            tile_index: (self.settings.directional.cascade_count as usize * index) as f32,
            normal_bias_or_flag: shadow.normal_bias,
            mask_channel,
        }
    }

    /// Reserve atlas tiles for a point or spot light.
    ///
    /// Point lights need six tiles, spot lights one. The reservation fails
    /// closed: when the remaining capacity is smaller than the cost, nothing
    /// is consumed and the sentinel is returned, so the atlas renderer can
    /// never observe a partially reserved light.
    pub fn reserve_other(
        &mut self,
        light: &VisibleLight,
        visible_light_index: usize,
        has_casters: bool,
    ) -> ReservationResult {
        let Some(shadow) = light.shadow else {
            return ReservationResult::NONE;
        };
        if shadow.strength <= 0.0 {
            return ReservationResult::NONE;
        }

        let mask_channel = self.note_shadow_mask(light);
        let is_point = light.kind == crate::lights::LightKind::Point;
        let cost = if is_point { 6 } else { 1 };
        if self.other_tiles_used + cost > MAX_SHADOWED_OTHER_TILES as u32 || !has_casters {
            return ReservationResult::sentinel(shadow.strength, mask_channel);
        }

        let tile_index = self.other_tiles_used;
        self.other.push(ShadowedOtherLight {
            visible_light_index,
            slope_scale_bias: shadow.slope_scale_bias,
            normal_bias: shadow.normal_bias,
            is_point,
            tile_index,
        });
        self.other_tiles_used += cost;
        ReservationResult {
            strength: shadow.strength,
            tile_index: tile_index as f32,
            normal_bias_or_flag: if is_point { 1.0 } else { 0.0 },
            mask_channel,
        }
    }

    fn note_shadow_mask(&mut self, light: &VisibleLight) -> f32 {
        match light.shadow_mask_channel {
            Some(channel) => {
                self.use_shadow_mask = true;
                channel as f32
            }
            None => -1.0,
        }
    }

    /// Frame settings the reservations were made against.
    #[inline]
    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// Reserved directional lights.
    #[inline]
    pub fn directional_lights(&self) -> &[ShadowedDirectionalLight] {
        &self.directional
    }

    /// Reserved point/spot lights.
    #[inline]
    pub fn other_lights(&self) -> &[ShadowedOtherLight] {
        &self.other
    }

    /// Total directional tiles: lights x cascades.
    pub fn directional_tile_count(&self) -> u32 {
        self.directional.len() as u32 * self.settings.directional.cascade_count
    }

    /// Total other-light tiles consumed.
    #[inline]
    pub fn other_tile_count(&self) -> u32 {
        self.other_tiles_used
    }

    /// Whether any reserved light samples the baked shadow mask, and in
    /// which global mode.
    pub fn shadow_mask(&self, mode: ShadowMaskMode) -> Option<ShadowMaskMode> {
        self.use_shadow_mask.then_some(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lights::{LightShadowParams, VisibleLight};
    use glam::Vec3;

    fn dir_light() -> VisibleLight {
        VisibleLight::directional(Vec3::ONE, Vec3::NEG_Y)
            .with_shadows(LightShadowParams::default())
    }

    fn point_light() -> VisibleLight {
        VisibleLight::point(Vec3::ONE, Vec3::ZERO, 10.0).with_shadows(LightShadowParams::default())
    }

    fn spot_light() -> VisibleLight {
        VisibleLight::spot(Vec3::ONE, Vec3::ZERO, Vec3::NEG_Y, 10.0, 60.0, 40.0)
            .with_shadows(LightShadowParams::default())
    }

    #[test]
    fn test_five_directional_lights_reserve_four() {
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        let light = dir_light();
        let mut results = Vec::new();
        for i in 0..5 {
            results.push(planner.reserve_directional(&light, i, true));
        }

        assert_eq!(planner.directional_lights().len(), 4);
        assert_eq!(planner.directional_tile_count(), 16);
        assert_eq!(crate::shadows::split_for_tiles(planner.directional_tile_count()), 4);
        assert_eq!(results[4], ReservationResult::NONE);
        // Cascade-array offsets step by the cascade count.
        assert_eq!(results[1].tile_index, 4.0);
        assert_eq!(results[3].tile_index, 12.0);
    }

    #[test]
    fn test_directional_without_casters_is_sentinel() {
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        let result = planner.reserve_directional(&dir_light(), 0, false);
        assert!(result.is_sentinel());
        assert_eq!(result.strength, -1.0);
        assert!(planner.directional_lights().is_empty());
    }

    #[test]
    fn test_point_costs_six_spot_costs_one() {
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        planner.reserve_other(&point_light(), 0, true);
        assert_eq!(planner.other_tile_count(), 6);
        planner.reserve_other(&spot_light(), 1, true);
        assert_eq!(planner.other_tile_count(), 7);
        assert_eq!(planner.other_lights()[1].tile_index, 6);
    }

    #[test]
    fn test_full_atlas_is_reservable() {
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        for i in 0..16 {
            let result = planner.reserve_other(&spot_light(), i, true);
            assert!(!result.is_sentinel());
        }
        assert_eq!(planner.other_tile_count(), 16);
    }

    #[test]
    fn test_refusal_never_partially_reserves() {
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        // 12 spot tiles leave room for 4; a point light needs 6.
        for i in 0..12 {
            planner.reserve_other(&spot_light(), i, true);
        }
        let refused = planner.reserve_other(&point_light(), 12, true);
        assert!(refused.is_sentinel());
        assert_eq!(planner.other_tile_count(), 12);
        assert_eq!(planner.other_lights().len(), 12);

        // The remaining capacity is still usable by cheaper lights.
        let accepted = planner.reserve_other(&spot_light(), 13, true);
        assert!(!accepted.is_sentinel());
        assert_eq!(accepted.tile_index, 12.0);
    }

    #[test]
    fn test_zero_strength_reserves_nothing() {
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        let mut light = point_light();
        light.shadow = Some(LightShadowParams {
            strength: 0.0,
            ..LightShadowParams::default()
        });
        assert_eq!(planner.reserve_other(&light, 0, true), ReservationResult::NONE);
        assert_eq!(planner.other_tile_count(), 0);
    }

    #[test]
    fn test_shadow_mask_channel_survives_refusal() {
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        let light = point_light().with_shadow_mask_channel(2);
        let result = planner.reserve_other(&light, 0, false);
        assert!(result.is_sentinel());
        assert_eq!(result.mask_channel, 2.0);
        assert_eq!(
            planner.shadow_mask(ShadowMaskMode::Distance),
            Some(ShadowMaskMode::Distance)
        );
    }

    #[test]
    fn test_no_mask_without_masked_lights() {
        let mut planner = ShadowPlanner::new(ShadowSettings::default());
        planner.reserve_other(&spot_light(), 0, true);
        assert_eq!(planner.shadow_mask(ShadowMaskMode::Always), None);
    }
}
