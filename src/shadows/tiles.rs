//! Atlas tile layout and atlas-space matrix conversion.
//!
//! A shadow atlas is cut into `split * split` equal square tiles, where the
//! split is picked from the number of tiles a frame needs. Reservation caps
//! tile counts before layout runs, so the allocator itself has no error path.

use glam::{Mat4, Vec2, Vec4};

/// Tiles-per-row for a given tile count: 1, 2 or 4.
///
/// The caller guarantees `tiles <= 16`; the policy is fixed rather than a
/// general packer.
pub fn split_for_tiles(tiles: u32) -> u32 {
    if tiles <= 1 {
        1
    } else if tiles <= 4 {
        2
    } else {
        4
    }
}

/// Tile position in split units: `(index % split, index / split)`.
pub fn tile_offset(index: u32, split: u32) -> Vec2 {
    Vec2::new((index % split) as f32, (index / split) as f32)
}

/// Pixel-space viewport of one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileViewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Bottom edge in pixels.
    pub y: f32,
    /// Edge length in pixels.
    pub size: f32,
}

/// Viewport rect of the tile at `index`.
pub fn tile_viewport(index: u32, split: u32, tile_size: f32) -> TileViewport {
    let offset = tile_offset(index, split);
    TileViewport {
        x: offset.x * tile_size,
        y: offset.y * tile_size,
        size: tile_size,
    }
}

/// Per-tile bounds and bias record for point/spot shadow sampling.
///
/// `x,y` are the UV minimum inset by half a texel, `z` the usable UV span,
/// `w` the filter-widened normal bias. The border keeps PCF taps from
/// bleeding into neighboring tiles.
pub fn other_tile_data(offset: Vec2, scale: f32, atlas_texel_size: f32, normal_bias: f32) -> Vec4 {
    let border = atlas_texel_size * 0.5;
    Vec4::new(
        offset.x * scale + border,
        offset.y * scale + border,
        scale - border - border,
        normal_bias,
    )
}

/// Remap a world-to-clip matrix into one tile's sub-rectangle of the atlas.
///
/// Clip-space XY in [-1, 1] maps to the tile's [0, 1] window scaled by
/// `scale = 1 / split`; depth maps to [0, 1] unscaled since it is shared by
/// all tiles. With a reversed depth buffer the Z row is negated first.
pub fn to_atlas_space(m: Mat4, offset: Vec2, scale: f32, reversed_z: bool) -> Mat4 {
    let mut r0 = m.row(0);
    let mut r1 = m.row(1);
    let mut r2 = m.row(2);
    let r3 = m.row(3);

    if reversed_z {
        r2 = -r2;
    }

    r0 = (0.5 * (r0 + r3) + offset.x * r3) * scale;
    r1 = (0.5 * (r1 + r3) + offset.y * r3) * scale;
    r2 = 0.5 * (r2 + r3);

    Mat4::from_cols(r0, r1, r2, r3).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;

    #[test]
    fn test_split_policy() {
        assert_eq!(split_for_tiles(0), 1);
        assert_eq!(split_for_tiles(1), 1);
        assert_eq!(split_for_tiles(2), 2);
        assert_eq!(split_for_tiles(4), 2);
        assert_eq!(split_for_tiles(5), 4);
        assert_eq!(split_for_tiles(16), 4);
    }

    #[test]
    fn test_tile_offsets() {
        for split in [1u32, 2, 4] {
            for index in 0..split * split {
                let offset = tile_offset(index, split);
                assert_eq!(offset.x, (index % split) as f32);
                assert_eq!(offset.y, (index / split) as f32);
            }
        }
    }

    #[test]
    fn test_tiles_cover_atlas_without_overlap() {
        let atlas_size = 1024.0;
        for split in [1u32, 2, 4] {
            let tile_size = atlas_size / split as f32;
            let tiles: Vec<TileViewport> = (0..split * split)
                .map(|i| tile_viewport(i, split, tile_size))
                .collect();

            let area: f32 = tiles.iter().map(|t| t.size * t.size).sum();
            assert_relative_eq!(area, atlas_size * atlas_size);

            for (i, a) in tiles.iter().enumerate() {
                for b in tiles.iter().skip(i + 1) {
                    let overlap_x = a.x < b.x + b.size && b.x < a.x + a.size;
                    let overlap_y = a.y < b.y + b.size && b.y < a.y + a.size;
                    assert!(!(overlap_x && overlap_y), "tiles overlap");
                }
                assert!(a.x + a.size <= atlas_size && a.y + a.size <= atlas_size);
            }
        }
    }

    #[test]
    fn test_atlas_matrix_maps_clip_bounds_to_tile_bounds() {
        let m = Mat4::perspective_rh(1.0, 1.0, 0.5, 50.0)
            * Mat4::look_at_rh(Vec3::new(3.0, 4.0, 5.0), Vec3::ZERO, Vec3::Y);

        for split in [1u32, 2, 4] {
            let scale = 1.0 / split as f32;
            for index in 0..split * split {
                let offset = tile_offset(index, split);
                let atlas = to_atlas_space(m, offset, scale, false);

                // A world point that projects onto the clip boundary must land
                // exactly on the tile edge in atlas space.
                for (clip_x, expected_u) in [(-1.0f32, offset.x * scale), (1.0, (offset.x + 1.0) * scale)] {
                    // Invert the projection for an arbitrary depth.
                    let clip = Vec4::new(clip_x * 2.0, 0.3 * 2.0, 0.7 * 2.0, 2.0);
                    let world = m.inverse() * clip;
                    let mapped = atlas * world;
                    assert_relative_eq!(mapped.x / mapped.w, expected_u, epsilon = 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_atlas_matrix_depth_is_split_independent() {
        let m = Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 0.1, 100.0);
        let world = Vec4::new(1.0, 2.0, -30.0, 1.0);

        let a1 = to_atlas_space(m, Vec2::ZERO, 1.0, false) * world;
        let a4 = to_atlas_space(m, Vec2::new(3.0, 2.0), 0.25, false) * world;
        assert_relative_eq!(a1.z / a1.w, a4.z / a4.w, epsilon = 1e-5);
    }

    #[test]
    fn test_reversed_z_negates_depth_row() {
        let m = Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.0, 1.0);
        let world = Vec4::new(0.0, 0.0, -0.25, 1.0);

        let normal = to_atlas_space(m, Vec2::ZERO, 1.0, false) * world;
        let reversed = to_atlas_space(m, Vec2::ZERO, 1.0, true) * world;
        // Remapped depth flips around 0.5 when the source depth row is negated.
        assert_relative_eq!(normal.z + reversed.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_other_tile_data_border() {
        let texel = 1.0 / 1024.0;
        let data = other_tile_data(Vec2::new(1.0, 0.0), 0.5, texel, 0.02);
        assert_relative_eq!(data.x, 0.5 + texel * 0.5);
        assert_relative_eq!(data.y, texel * 0.5);
        assert_relative_eq!(data.z, 0.5 - texel);
        assert_eq!(data.w, 0.02);
    }
}
