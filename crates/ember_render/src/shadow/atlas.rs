//! Atlas Tile Geometry
//!
//! Pure math for packing square shadow tiles into a square atlas: grid
//! split selection, tile placement, sampling bounds, and the remap of a
//! light's clip-space projection into its tile's sub-rectangle.

use glam::{Mat4, Vec2, Vec4};

/// Pixel-space viewport of one atlas tile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileViewport {
    /// Left edge in pixels
    pub x: u32,
    /// Bottom edge in pixels
    pub y: u32,
    /// Edge length in pixels
    pub size: u32,
}

/// Grid split for a tile demand: the smallest of {1, 2, 4} whose square
/// covers `tiles`
pub fn split_for_tiles(tiles: u32) -> u32 {
    if tiles <= 1 {
        1
    } else if tiles <= 4 {
        2
    } else {
        4
    }
}

/// Grid cell of tile `index` in an NxN split, in grid units
pub fn tile_offset(index: u32, split: u32) -> Vec2 {
    Vec2::new((index % split) as f32, (index / split) as f32)
}

/// Pixel viewport of tile `index` in an NxN split
pub fn tile_viewport(index: u32, split: u32, tile_size: u32) -> TileViewport {
    TileViewport {
        x: (index % split) * tile_size,
        y: (index / split) * tile_size,
        size: tile_size,
    }
}

/// Remap a light-space clip transform into an atlas tile
///
/// `offset` is the tile's grid cell and `scale` is `1 / split`. The x and
/// y rows are remapped from clip [-1, 1] into the tile's normalized
/// sub-rectangle, the depth row from [-1, 1] into [0, 1]. On reversed-Z
/// platforms the depth row is negated first; the xy remap is unaffected.
pub fn to_atlas_matrix(m: Mat4, offset: Vec2, scale: f32, reversed_z: bool) -> Mat4 {
    let r0 = m.row(0);
    let r1 = m.row(1);
    let mut r2 = m.row(2);
    let r3 = m.row(3);

    if reversed_z {
        r2 = -r2;
    }

    let r0 = (0.5 * (r0 + r3) + offset.x * r3) * scale;
    let r1 = (0.5 * (r1 + r3) + offset.y * r3) * scale;
    let r2 = 0.5 * (r2 + r3);

    Mat4::from_cols(r0, r1, r2, r3).transpose()
}

/// Sampling bounds and final bias for one spot/point tile
///
/// xy: normalized atlas position of the tile's lower corner, inset by half
/// a texel; z: normalized tile extent minus a full texel; w: the depth
/// bias. The inset keeps the filter kernel from reading the neighboring
/// tile.
pub fn tile_bounds(offset: Vec2, scale: f32, half_texel: f32, bias: f32) -> Vec4 {
    Vec4::new(
        offset.x * scale + half_texel,
        offset.y * scale + half_texel,
        scale - half_texel - half_texel,
        bias,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_is_minimal() {
        assert_eq!(split_for_tiles(0), 1);
        assert_eq!(split_for_tiles(1), 1);
        assert_eq!(split_for_tiles(2), 2);
        assert_eq!(split_for_tiles(3), 2);
        assert_eq!(split_for_tiles(4), 2);
        assert_eq!(split_for_tiles(5), 4);
        assert_eq!(split_for_tiles(16), 4);
    }

    #[test]
    fn test_tile_offset_row_major() {
        assert_eq!(tile_offset(0, 2), Vec2::new(0.0, 0.0));
        assert_eq!(tile_offset(1, 2), Vec2::new(1.0, 0.0));
        assert_eq!(tile_offset(2, 2), Vec2::new(0.0, 1.0));
        assert_eq!(tile_offset(3, 2), Vec2::new(1.0, 1.0));
        assert_eq!(tile_offset(5, 4), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_tile_viewport_pixels() {
        let vp = tile_viewport(3, 2, 512);
        assert_eq!(vp, TileViewport { x: 512, y: 512, size: 512 });
    }

    #[test]
    fn test_atlas_matrix_centers_first_quadrant() {
        // A clip-space center point must land in the middle of tile (0,0)
        // for a 2x2 split, with or without reversed depth.
        for reversed_z in [false, true] {
            let m = to_atlas_matrix(Mat4::IDENTITY, Vec2::ZERO, 0.5, reversed_z);
            let p = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
            assert!((p.x - 0.25).abs() < 1e-6, "reversed_z={reversed_z}");
            assert!((p.y - 0.25).abs() < 1e-6, "reversed_z={reversed_z}");
        }
    }

    #[test]
    fn test_atlas_matrix_offsets_tiles() {
        let m = to_atlas_matrix(Mat4::IDENTITY, Vec2::new(1.0, 1.0), 0.5, false);
        let p = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - 0.75).abs() < 1e-6);
        assert!((p.y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_atlas_matrix_depth_rows() {
        // Standard depth: clip z [-1, 1] -> [0, 1].
        let m = to_atlas_matrix(Mat4::IDENTITY, Vec2::ZERO, 1.0, false);
        assert!(((m * Vec4::new(0.0, 0.0, -1.0, 1.0)).z - 0.0).abs() < 1e-6);
        assert!(((m * Vec4::new(0.0, 0.0, 1.0, 1.0)).z - 1.0).abs() < 1e-6);

        // Reversed depth flips the mapping.
        let m = to_atlas_matrix(Mat4::IDENTITY, Vec2::ZERO, 1.0, true);
        assert!(((m * Vec4::new(0.0, 0.0, -1.0, 1.0)).z - 1.0).abs() < 1e-6);
        assert!(((m * Vec4::new(0.0, 0.0, 1.0, 1.0)).z - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_tile_bounds_border() {
        let half_texel = 0.5 / 2048.0;
        let bounds = tile_bounds(Vec2::new(1.0, 0.0), 0.5, half_texel, 0.01);
        assert!((bounds.x - (0.5 + half_texel)).abs() < 1e-7);
        assert!((bounds.y - half_texel).abs() < 1e-7);
        assert!((bounds.z - (0.5 - 2.0 * half_texel)).abs() < 1e-7);
        assert_eq!(bounds.w, 0.01);
    }
}
