//! Tiled shadow atlas subsystem.
//!
//! Shadows render into two pooled depth atlases, one for directional lights
//! (tiled per cascade) and one for point/spot lights (one tile per spot, six
//! per point). Each frame runs reservation first ([`ShadowPlanner`]), then
//! atlas recording ([`ShadowAtlasRenderer`]); the shading stage consumes the
//! resulting matrices, tile records and selectors.
//!
//! # Example
//!
//! ```ignore
//! use ember::shadows::{ShadowPlanner, ShadowAtlasRenderer, ShadowSettings};
//!
//! let mut planner = ShadowPlanner::new(ShadowSettings::default());
//! light_buffer.setup(&visible_lights, u32::MAX, &mut planner, &culling);
//!
//! let renderer = ShadowAtlasRenderer::new(false);
//! let output = renderer.render(&device, &mut encoder, &planner, &culling, &mut pool);
//! // ... bind output, record shading ...
//! output.release(&mut pool);
//! ```

mod cascade;
mod config;
mod planner;
mod renderer;
mod tiles;

pub use cascade::{blend_culling_factor, distance_fade_vec, CascadeFrame};
pub use config::{
    AtlasSize, CascadeBlend, DirectionalShadowSettings, FilterQuality, OtherShadowSettings,
    ShadowMaskMode, ShadowSettings,
};
pub use planner::{
    ReservationResult, ShadowPlanner, ShadowedDirectionalLight, ShadowedOtherLight,
};
pub use renderer::{
    point_fov_bias, ShadowAtlasRenderer, ShadowKeywords, ShadowRenderOutput, ShadowUniform,
};
pub use tiles::{
    other_tile_data, split_for_tiles, tile_offset, tile_viewport, to_atlas_space, TileViewport,
};

/// Maximum number of shadowed directional lights.
pub const MAX_SHADOWED_DIRECTIONAL_LIGHTS: usize = 4;

/// Maximum number of cascades per directional light.
pub const MAX_CASCADES: usize = 4;

/// Maximum directional atlas tiles: lights times cascades.
pub const MAX_DIRECTIONAL_TILES: usize = MAX_SHADOWED_DIRECTIONAL_LIGHTS * MAX_CASCADES;

/// Maximum tiles in the other-light atlas; a point light consumes six.
pub const MAX_SHADOWED_OTHER_TILES: usize = 16;
