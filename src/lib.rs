//! # Ember - Custom Render Pipeline Core
//!
//! Ember is the reusable core of a hand-rolled HDR render pipeline on wgpu:
//! a tiled shadow-atlas system and a multi-pass post-processing stack. The
//! host application owns scene traversal, culling and caster drawing; Ember
//! owns everything between the culling results and the bound shading data.
//!
//! ## Features
//!
//! - **Shadows**: per-frame tile reservation, cascaded directional shadow
//!   maps, point/spot tiles with border and bias records, all packed into
//!   two pooled depth atlases
//! - **Lights**: visible-light packing into fixed GPU arrays with per-light
//!   shadow reservations
//! - **Post FX**: threshold bloom pyramid (additive or scattering), LUT
//!   color grading with ACES/Neutral/Reinhard tone mapping, FXAA, and
//!   render-scale-aware final rescale
//! - **Resources**: descriptor-keyed render target pool; every per-frame
//!   texture is acquired and released inside its owning stage
//!
//! ## Example
//!
//! ```ignore
//! use ember::prelude::*;
//!
//! let settings = PipelineSettings::default();
//! let effective = EffectiveCameraSettings::resolve(None, &settings);
//!
//! let mut planner = ShadowPlanner::new(settings.shadows.clone());
//! let mut lights = LightBuffer::new();
//! lights.setup(&visible_lights, effective.light_layer_mask(), &mut planner, &culling);
//!
//! let shadows = ShadowAtlasRenderer::new(false)
//!     .render(&device, &mut encoder, &planner, &culling, &mut pool);
//! // ... bind shadows + lights, draw the scene into camera targets ...
//! shadows.release(&mut pool);
//! ```

#![warn(missing_docs)]

pub mod color;
pub mod culling;
pub mod lights;
pub mod postfx;
pub mod rt_pool;
pub mod settings;
pub mod shadows;
pub mod targets;

// Re-export commonly used types.
pub mod prelude {
    //! Convenient re-exports of commonly used types.

    pub use crate::culling::{Bounds, CubeFace, DrawShadowsRequest, ShadowCasterSource, ShadowSplit};
    pub use crate::lights::{LightBuffer, LightKind, LightShadowParams, VisibleLight};
    pub use crate::postfx::{
        BloomMode, BloomSettings, ColorLutResolution, PostFxFrame, PostFxSettings, PostFxStack,
        ToneMappingMode,
    };
    pub use crate::rt_pool::{RtDesc, RtPool};
    pub use crate::settings::{
        CameraBufferSettings, CameraSettings, EffectiveCameraSettings, FinalBlendMode,
        FxaaQuality, FxaaSettings, PipelineSettings,
    };
    pub use crate::shadows::{
        AtlasSize, CascadeBlend, FilterQuality, ShadowAtlasRenderer, ShadowMaskMode,
        ShadowPlanner, ShadowSettings,
    };
    pub use crate::targets::{CameraTargets, CameraTargetsDesc, PlaceholderTexture};
}
