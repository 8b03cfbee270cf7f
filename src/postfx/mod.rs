//! Multi-pass post-processing stack.
//!
//! The chain runs per camera after the scene renders: bloom builds and
//! recombines an image pyramid of the thresholded scene, grading bakes every
//! color adjustment plus the tone mapping operator into a LUT and applies it
//! in one pass, FXAA optionally smooths the graded LDR image, and a final
//! rescale blit handles render-scaled cameras.

mod blit;
mod bloom;
mod config;
mod grading;
mod stack;

pub use blit::{BlitOp, Blitter, FullscreenVertex, FxPass, FxUniform, FULLSCREEN_QUAD_VERTICES};
pub use bloom::{
    record_bloom, threshold_contribution, threshold_vec, BloomLevelSize, BloomPlan,
};
pub use config::{
    BloomMode, BloomSettings, ChannelMixerSettings, ColorAdjustmentsSettings, ColorLutResolution,
    PostFxSettings, ShadowsMidtonesHighlightsSettings, SplitToningSettings, ToneMappingMode,
    WhiteBalanceSettings,
};
pub use grading::{
    fxaa_config_vec, lut_application_params, lut_generation_params, lut_pass, lut_size,
    pack_grading, record_grading, use_bicubic_rescale, GradingInput, GradingTarget, LDR_FORMAT,
    LUT_FORMAT,
};
pub use stack::{PostFxFrame, PostFxStack, HDR_FORMAT};

/// Upper bound on bloom pyramid depth.
pub const MAX_BLOOM_PYRAMID_LEVELS: usize = 16;
