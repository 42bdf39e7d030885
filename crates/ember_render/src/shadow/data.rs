//! GPU Shadow Data
//!
//! The shadow uniform block uploaded once per frame, plus the capacity
//! constants the allocator enforces. The struct is bytemuck Pod for
//! direct GPU upload; its field layout is described by a compile-time
//! schema table instead of string-keyed property lookups.

use core::mem::{offset_of, size_of};

use crate::uniform::UniformField;

/// Maximum shadow-casting directional lights per frame
pub const MAX_SHADOWED_DIRECTIONAL_LIGHTS: usize = 4;

/// Maximum spot/point shadow tile slots per frame (a point light uses 6)
pub const MAX_SHADOWED_OTHER_LIGHTS: usize = 16;

/// Maximum directional cascade count
pub const MAX_CASCADES: usize = 4;

/// Directional atlas tile capacity
pub const MAX_DIRECTIONAL_TILES: usize = MAX_SHADOWED_DIRECTIONAL_LIGHTS * MAX_CASCADES;

/// Shadow uniform block
///
/// Matrices are column-major world-to-atlas transforms. `atlas_sizes`
/// packs (directional edge, 1/edge, other edge, 1/edge). `distance_fade`
/// packs the fade terms from [`super::cascade::distance_fade`].
/// `shadow_mask_mode` selects the mask shader variant: -1 off, 0 always,
/// 1 distance.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuShadowUniforms {
    /// World-to-atlas matrices, one per directional tile
    pub dir_matrices: [[[f32; 4]; 4]; MAX_DIRECTIONAL_TILES],
    /// World-to-atlas matrices, one per other-light tile slot
    pub other_matrices: [[[f32; 4]; 4]; MAX_SHADOWED_OTHER_LIGHTS],
    /// Cascade culling spheres: xyz center, w squared radius
    pub cascade_spheres: [[f32; 4]; MAX_CASCADES],
    /// Per-cascade derived data: x = 1/r^2, y = penumbra filter size
    pub cascade_data: [[f32; 4]; MAX_CASCADES],
    /// Per-slot sampling bounds and bias for spot/point tiles
    pub other_tiles: [[f32; 4]; MAX_SHADOWED_OTHER_LIGHTS],
    /// Atlas edge lengths and reciprocals
    pub atlas_sizes: [f32; 4],
    /// Distance fade terms
    pub distance_fade: [f32; 4],
    /// Active cascade count, 0 when no directional shadows rendered
    pub cascade_count: i32,
    /// Shadow mask variant selector
    pub shadow_mask_mode: i32,
    /// Padding to 16 bytes
    pub _pad: [i32; 2],
}

impl Default for GpuShadowUniforms {
    fn default() -> Self {
        let mut uniforms: Self = bytemuck::Zeroable::zeroed();
        uniforms.shadow_mask_mode = -1;
        uniforms
    }
}

impl GpuShadowUniforms {
    /// Field schema of the block, in declaration order
    pub const LAYOUT: [UniformField; 9] = [
        UniformField {
            name: "dir_shadow_matrices",
            offset: offset_of!(GpuShadowUniforms, dir_matrices),
            size: size_of::<[[[f32; 4]; 4]; MAX_DIRECTIONAL_TILES]>(),
        },
        UniformField {
            name: "other_shadow_matrices",
            offset: offset_of!(GpuShadowUniforms, other_matrices),
            size: size_of::<[[[f32; 4]; 4]; MAX_SHADOWED_OTHER_LIGHTS]>(),
        },
        UniformField {
            name: "cascade_culling_spheres",
            offset: offset_of!(GpuShadowUniforms, cascade_spheres),
            size: size_of::<[[f32; 4]; MAX_CASCADES]>(),
        },
        UniformField {
            name: "cascade_data",
            offset: offset_of!(GpuShadowUniforms, cascade_data),
            size: size_of::<[[f32; 4]; MAX_CASCADES]>(),
        },
        UniformField {
            name: "other_shadow_tiles",
            offset: offset_of!(GpuShadowUniforms, other_tiles),
            size: size_of::<[[f32; 4]; MAX_SHADOWED_OTHER_LIGHTS]>(),
        },
        UniformField {
            name: "shadow_atlas_sizes",
            offset: offset_of!(GpuShadowUniforms, atlas_sizes),
            size: size_of::<[f32; 4]>(),
        },
        UniformField {
            name: "shadow_distance_fade",
            offset: offset_of!(GpuShadowUniforms, distance_fade),
            size: size_of::<[f32; 4]>(),
        },
        UniformField {
            name: "cascade_count",
            offset: offset_of!(GpuShadowUniforms, cascade_count),
            size: size_of::<i32>(),
        },
        UniformField {
            name: "shadow_mask_mode",
            offset: offset_of!(GpuShadowUniforms, shadow_mask_mode),
            size: size_of::<i32>(),
        },
    ];

    /// Whole block as bytes for GPU upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        assert_eq!(size_of::<GpuShadowUniforms>() % 16, 0);
    }

    #[test]
    fn test_default_disables_mask() {
        let uniforms = GpuShadowUniforms::default();
        assert_eq!(uniforms.shadow_mask_mode, -1);
        assert_eq!(uniforms.cascade_count, 0);
    }

    #[test]
    fn test_layout_is_contiguous() {
        for pair in GpuShadowUniforms::LAYOUT.windows(2) {
            assert!(
                pair[0].end() <= pair[1].offset,
                "{} overlaps {}",
                pair[0].name,
                pair[1].name
            );
        }
        let last = GpuShadowUniforms::LAYOUT[GpuShadowUniforms::LAYOUT.len() - 1];
        assert!(last.end() <= size_of::<GpuShadowUniforms>());
    }

    #[test]
    fn test_bytes_length() {
        let uniforms = GpuShadowUniforms::default();
        assert_eq!(uniforms.as_bytes().len(), size_of::<GpuShadowUniforms>());
    }
}
