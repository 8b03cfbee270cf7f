//! Shadow atlas rendering.
//!
//! Consumes a frame's [`ShadowPlanner`] reservations and records depth-only
//! passes into pooled atlas textures, one viewport per tile. Caster draws are
//! delegated to the host through [`ShadowCasterSource::draw_shadows`]; this
//! module owns tile layout, per-tile matrices and the data the shading stage
//! binds afterwards.

use bytemuck::{Pod, Zeroable};

use crate::culling::{CubeFace, DrawShadowsRequest, ShadowCasterSource};
use crate::rt_pool::{PooledRt, RtDesc, RtPool};

use super::cascade::{blend_culling_factor, distance_fade_vec, CascadeFrame};
use super::config::{CascadeBlend, FilterQuality, ShadowMaskMode};
use super::planner::ShadowPlanner;
use super::tiles::{other_tile_data, split_for_tiles, tile_offset, tile_viewport, to_atlas_space};
use super::{MAX_CASCADES, MAX_DIRECTIONAL_TILES, MAX_SHADOWED_OTHER_TILES};

const SQRT2: f32 = std::f32::consts::SQRT_2;

/// Enumerated sampling selectors the shading stage keys its shader variants
/// on. Never encoded as strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowKeywords {
    /// Directional atlas filter.
    pub directional_filter: FilterQuality,
    /// Other atlas filter.
    pub other_filter: FilterQuality,
    /// Cascade blend mode.
    pub cascade_blend: CascadeBlend,
    /// Baked shadow-mask mode, `None` when no reserved light uses the mask.
    pub shadow_mask: Option<ShadowMaskMode>,
}

/// GPU-side shadow data, bound by the shading stage.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowUniform {
    /// Atlas-space matrices, indexed `light * cascade_count + cascade`.
    pub dir_matrices: [[[f32; 4]; 4]; MAX_DIRECTIONAL_TILES],
    /// Atlas-space matrices for other lights, indexed by tile.
    pub other_matrices: [[[f32; 4]; 4]; MAX_SHADOWED_OTHER_TILES],
    /// Per-tile bounds and bias records for other lights.
    pub other_tiles: [[f32; 4]; MAX_SHADOWED_OTHER_TILES],
    /// Cascade culling spheres, `w` = squared shrunk radius.
    pub cascade_spheres: [[f32; 4]; MAX_CASCADES],
    /// Per-cascade `(1/r^2, filter_size * sqrt 2)`.
    pub cascade_data: [[f32; 4]; MAX_CASCADES],
    /// `(dir_size, 1/dir_size, other_size, 1/other_size)`.
    pub atlas_sizes: [f32; 4],
    /// Shadow distance fade parameters.
    pub distance_fade: [f32; 4],
    /// `x` = cascade count (0 when no directional shadows), `y` = shadowed
    /// directional lights, `z` = other tiles used.
    pub counts: [f32; 4],
}

impl Default for ShadowUniform {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Everything the shading stage needs after the shadow pass ran.
pub struct ShadowRenderOutput {
    /// The directional atlas (a 1x1 stub when nothing was reserved).
    pub directional_atlas: PooledRt,
    /// The other-light atlas; `None` means it aliases the directional one.
    pub other_atlas: Option<PooledRt>,
    /// Packed arrays for binding.
    pub uniform: ShadowUniform,
    /// Shader-variant selectors.
    pub keywords: ShadowKeywords,
}

impl ShadowRenderOutput {
    /// View to bind as the other-light atlas, falling back to the
    /// directional atlas when no other light rendered shadows.
    pub fn other_atlas_view(&self) -> &wgpu::TextureView {
        match &self.other_atlas {
            Some(atlas) => atlas.view(),
            None => self.directional_atlas.view(),
        }
    }

    /// Return the atlases to the pool. Must run on every frame exit path.
    pub fn release(self, pool: &mut RtPool) {
        pool.release(self.directional_atlas);
        if let Some(atlas) = self.other_atlas {
            pool.release(atlas);
        }
    }
}

/// Records shadow atlas passes for one frame's reservations.
#[derive(Debug, Clone, Copy)]
pub struct ShadowAtlasRenderer {
    /// Whether the host's projections use a reversed depth buffer.
    reversed_z: bool,
}

impl ShadowAtlasRenderer {
    /// Create a renderer for the host's depth convention.
    pub fn new(reversed_z: bool) -> Self {
        Self { reversed_z }
    }

    /// Record all reserved shadow tiles and assemble the shading-stage data.
    ///
    /// Atlases are acquired from `pool`; the caller owns the returned output
    /// and must [`ShadowRenderOutput::release`] it once the frame's shading
    /// is recorded.
    pub fn render(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        planner: &ShadowPlanner,
        source: &dyn ShadowCasterSource,
        pool: &mut RtPool,
    ) -> ShadowRenderOutput {
        let settings = planner.settings();
        let mut uniform = ShadowUniform::default();
        let mut cascades = CascadeFrame::new();

        let dir_size = settings.directional.atlas_size.pixels();
        let other_size = settings.other.atlas_size.pixels();
        uniform.atlas_sizes = [
            dir_size as f32,
            1.0 / dir_size as f32,
            other_size as f32,
            1.0 / other_size as f32,
        ];

        let directional_atlas = if planner.directional_lights().is_empty() {
            // Keep a bindable texture around so samplers never see null.
            pool.acquire(device, RtDesc::new(1, 1, wgpu::TextureFormat::Depth32Float))
        } else {
            let atlas = pool.acquire(
                device,
                RtDesc::new(dir_size, dir_size, wgpu::TextureFormat::Depth32Float),
            );
            self.render_directional(encoder, planner, source, &atlas, &mut uniform, &mut cascades);
            atlas
        };

        let other_atlas = if planner.other_lights().is_empty() {
            None
        } else {
            let atlas = pool.acquire(
                device,
                RtDesc::new(other_size, other_size, wgpu::TextureFormat::Depth32Float),
            );
            self.render_other(encoder, planner, source, &atlas, &mut uniform);
            Some(atlas)
        };

        let dir_count = planner.directional_lights().len();
        uniform.cascade_spheres = cascades.spheres().map(|v| v.to_array());
        uniform.cascade_data = cascades.data().map(|v| v.to_array());
        uniform.distance_fade = distance_fade_vec(
            settings.max_distance,
            settings.distance_fade,
            settings.directional.cascade_fade,
        )
        .to_array();
        uniform.counts = [
            if dir_count > 0 {
                settings.directional.cascade_count as f32
            } else {
                0.0
            },
            dir_count as f32,
            planner.other_tile_count() as f32,
            0.0,
        ];

        log::debug!(
            "shadow atlases: {} directional lights ({} tiles), {} other lights ({} tiles)",
            dir_count,
            planner.directional_tile_count(),
            planner.other_lights().len(),
            planner.other_tile_count(),
        );

        ShadowRenderOutput {
            directional_atlas,
            other_atlas,
            uniform,
            keywords: ShadowKeywords {
                directional_filter: settings.directional.filter,
                other_filter: settings.other.filter,
                cascade_blend: settings.directional.cascade_blend,
                shadow_mask: planner.shadow_mask(settings.shadow_mask_mode),
            },
        }
    }

    fn render_directional(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        planner: &ShadowPlanner,
        source: &dyn ShadowCasterSource,
        atlas: &PooledRt,
        uniform: &mut ShadowUniform,
        cascades: &mut CascadeFrame,
    ) {
        let settings = planner.settings();
        let directional = &settings.directional;
        let atlas_size = directional.atlas_size.pixels();

        let tiles = planner.directional_tile_count();
        let split = split_for_tiles(tiles);
        let tile_size = atlas_size / split;
        let tile_scale = 1.0 / split as f32;
        let culling_factor = blend_culling_factor(directional.cascade_fade);

        let mut pass = begin_atlas_pass(encoder, atlas, "Directional Shadow Atlas");

        for (light_index, light) in planner.directional_lights().iter().enumerate() {
            let tile_base = light_index as u32 * directional.cascade_count;
            for cascade in 0..directional.cascade_count {
                let shadow_split = source.directional_cascade(
                    light.visible_light_index,
                    cascade,
                    directional.cascade_count,
                    directional.cascade_ratios,
                    tile_size,
                    light.near_plane_offset,
                );
                // Cascades are shared; the first light defines them.
                if light_index == 0 {
                    cascades.set_cascade(
                        cascade as usize,
                        shadow_split.culling_sphere,
                        tile_size,
                        directional.filter,
                    );
                }

                let tile_index = tile_base + cascade;
                let offset = tile_offset(tile_index, split);
                uniform.dir_matrices[tile_index as usize] = to_atlas_space(
                    shadow_split.view_projection(),
                    offset,
                    tile_scale,
                    self.reversed_z,
                )
                .to_cols_array_2d();

                set_tile_viewport(&mut pass, tile_index, split, tile_size);
                source.draw_shadows(
                    &mut pass,
                    &DrawShadowsRequest {
                        visible_light_index: light.visible_light_index,
                        split: shadow_split,
                        slope_scale_bias: light.slope_scale_bias,
                        blend_culling_factor: culling_factor,
                        pancake: true,
                    },
                );
            }
        }
    }

    fn render_other(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        planner: &ShadowPlanner,
        source: &dyn ShadowCasterSource,
        atlas: &PooledRt,
        uniform: &mut ShadowUniform,
    ) {
        let settings = planner.settings();
        let other = &settings.other;
        let atlas_size = other.atlas_size.pixels();

        let split = split_for_tiles(planner.other_tile_count());
        let tile_size = atlas_size / split;
        let tile_scale = 1.0 / split as f32;
        let atlas_texel = other.atlas_size.texel_size();

        let mut pass = begin_atlas_pass(encoder, atlas, "Other Shadow Atlas");

        for light in planner.other_lights() {
            if light.is_point {
                self.render_point(
                    &mut pass, source, light, other.filter, split, tile_size, tile_scale,
                    atlas_texel, uniform,
                );
            } else {
                self.render_spot(
                    &mut pass, source, light, other.filter, split, tile_size, tile_scale,
                    atlas_texel, uniform,
                );
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_spot(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        source: &dyn ShadowCasterSource,
        light: &super::planner::ShadowedOtherLight,
        filter: FilterQuality,
        split: u32,
        tile_size: u32,
        tile_scale: f32,
        atlas_texel: f32,
        uniform: &mut ShadowUniform,
    ) {
        let shadow_split = source.spot_split(light.visible_light_index);
        // Perspective projections concentrate texels near the apex; scale
        // the world texel size by the projection's focal term.
        let texel_size = 2.0 / (tile_size as f32 * shadow_split.projection.x_axis.x);
        let filter_size = texel_size * filter.texel_scale();
        let bias = light.normal_bias * filter_size * SQRT2;

        let tile_index = light.tile_index;
        let offset = tile_offset(tile_index, split);
        uniform.other_tiles[tile_index as usize] =
            other_tile_data(offset, tile_scale, atlas_texel, bias).to_array();
        uniform.other_matrices[tile_index as usize] = to_atlas_space(
            shadow_split.view_projection(),
            offset,
            tile_scale,
            self.reversed_z,
        )
        .to_cols_array_2d();

        set_tile_viewport(pass, tile_index, split, tile_size);
        source.draw_shadows(
            pass,
            &DrawShadowsRequest {
                visible_light_index: light.visible_light_index,
                split: shadow_split,
                slope_scale_bias: light.slope_scale_bias,
                blend_culling_factor: 0.0,
                pancake: false,
            },
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn render_point(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        source: &dyn ShadowCasterSource,
        light: &super::planner::ShadowedOtherLight,
        filter: FilterQuality,
        split: u32,
        tile_size: u32,
        tile_scale: f32,
        atlas_texel: f32,
        uniform: &mut ShadowUniform,
    ) {
        let texel_size = 2.0 / tile_size as f32;
        let filter_size = texel_size * filter.texel_scale();
        let bias = light.normal_bias * filter_size * SQRT2;
        let fov_bias = point_fov_bias(bias, filter_size);

        for (face_index, face) in CubeFace::ALL.into_iter().enumerate() {
            let mut shadow_split =
                source.point_face_split(light.visible_light_index, face, fov_bias);
            // Point shadows render caster back faces to curb acne; undo the
            // winding flip by negating the view's Y row.
            shadow_split.view.y_axis.y = -shadow_split.view.y_axis.y;
            shadow_split.view.z_axis.y = -shadow_split.view.z_axis.y;
            shadow_split.view.w_axis.y = -shadow_split.view.w_axis.y;

            let tile_index = light.tile_index + face_index as u32;
            let offset = tile_offset(tile_index, split);
            uniform.other_tiles[tile_index as usize] =
                other_tile_data(offset, tile_scale, atlas_texel, bias).to_array();
            uniform.other_matrices[tile_index as usize] = to_atlas_space(
                shadow_split.view_projection(),
                offset,
                tile_scale,
                self.reversed_z,
            )
            .to_cols_array_2d();

            set_tile_viewport(pass, tile_index, split, tile_size);
            source.draw_shadows(
                pass,
                &DrawShadowsRequest {
                    visible_light_index: light.visible_light_index,
                    split: shadow_split,
                    slope_scale_bias: light.slope_scale_bias,
                    blend_culling_factor: 0.0,
                    pancake: false,
                },
            );
        }
    }
}

/// Widened field of view, in degrees beyond 90, that hides PCF seams along
/// cube face edges.
pub fn point_fov_bias(bias: f32, filter_size: f32) -> f32 {
    (1.0 + bias + filter_size).atan().to_degrees() * 2.0 - 90.0
}

fn begin_atlas_pass<'a>(
    encoder: &'a mut wgpu::CommandEncoder,
    atlas: &'a PooledRt,
    label: &'static str,
) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
            view: atlas.view(),
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
    })
}

fn set_tile_viewport(pass: &mut wgpu::RenderPass<'_>, index: u32, split: u32, tile_size: u32) {
    let viewport = tile_viewport(index, split, tile_size as f32);
    pass.set_viewport(viewport.x, viewport.y, viewport.size, viewport.size, 0.0, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_fov_bias_is_zero_without_widening() {
        // atan(1) is 45 degrees, so a zero bias keeps the 90 degree frustum.
        assert!(point_fov_bias(0.0, 0.0).abs() < 1e-4);
    }

    #[test]
    fn test_point_fov_bias_grows_with_filter() {
        let narrow = point_fov_bias(0.01, 0.01);
        let wide = point_fov_bias(0.01, 0.1);
        assert!(wide > narrow && narrow > 0.0);
    }

    #[test]
    fn test_shadow_uniform_is_pod() {
        let uniform = ShadowUniform::default();
        let bytes = bytemuck::bytes_of(&uniform);
        assert_eq!(bytes.len(), std::mem::size_of::<ShadowUniform>());
    }
}
