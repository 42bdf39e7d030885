//! Shadow Culling Interface
//!
//! Abstract interface to the host's visibility system. The shadow phase
//! needs three things from it: whether a light has any visible shadow
//! casters, and view/projection/culling data for each shadow tile it wants
//! to render (per cascade, per spot cone, per cube face).
//!
//! Keeping this behind a trait keeps the allocator free of the concrete
//! frustum-fitting math and lets unit tests supply a double.

use glam::{Mat4, Vec3, Vec4};

/// Axis-aligned bounds of a light's visible shadow casters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CasterBounds {
    /// World-space center
    pub center: Vec3,
    /// Half-extents along each axis
    pub extents: Vec3,
}

/// View/projection pair plus culling volume for one shadow tile
#[derive(Clone, Copy, Debug)]
pub struct ShadowSplit {
    /// Light-space view matrix
    pub view: Mat4,
    /// Light projection matrix
    pub proj: Mat4,
    /// Culling sphere: xyz = world-space center, w = radius
    pub culling_sphere: Vec4,
}

/// Cube map face order for point light shadows
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// All six faces in tile order
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    /// Tile offset of this face relative to the light's base slot
    pub fn index(self) -> u32 {
        self as u32
    }
}

/// Host-provided culling and shadow-projection queries
///
/// `light_index` is always the light's position in the frame's visible
/// light list. Any query may return `None` when the host has no valid
/// culling data for that light; the caller treats that as fatal for the
/// affected atlas only.
pub trait ShadowCuller {
    /// Bounds of the light's visible shadow casters, `None` when nothing
    /// within shadow range casts a shadow for this light
    fn caster_bounds(&self, light_index: usize) -> Option<CasterBounds>;

    /// View/projection and culling sphere for one directional cascade
    #[allow(clippy::too_many_arguments)]
    fn directional_split(
        &self,
        light_index: usize,
        cascade: u32,
        cascade_count: u32,
        ratios: [f32; 3],
        tile_size: u32,
        near_plane_offset: f32,
    ) -> Option<ShadowSplit>;

    /// View/projection and culling data for a spot light cone
    fn spot_split(&self, light_index: usize) -> Option<ShadowSplit>;

    /// View/projection and culling data for one point light cube face,
    /// with the field of view widened by `fov_bias_deg` degrees so the
    /// filter kernel can sample past the face edge
    fn point_split(
        &self,
        light_index: usize,
        face: CubeFace,
        fov_bias_deg: f32,
    ) -> Option<ShadowSplit>;
}
