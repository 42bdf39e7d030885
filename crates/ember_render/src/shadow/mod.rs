//! Shadow Atlas Allocation and Rendering
//!
//! Two-phase, capacity-constrained shadow preparation:
//!
//! - **Reserve**: while the light aggregator walks the visible-light
//!   list, [`ShadowMapper::reserve_directional`] and
//!   [`ShadowMapper::reserve_other`] record which lights get atlas space
//!   and immediately return the 4-component shadow vector embedded in the
//!   light uniforms. No atlas work happens here.
//! - **Render**: [`ShadowMapper::render`] consumes the reservations,
//!   packs tiles into the directional and other atlases, emits one
//!   [`TileDraw`] per tile for the host to rasterize, and fills the
//!   shadow uniform block the reserve phase already handed out indices
//!   into.
//!
//! Capacity overflow and lights without visible casters degrade to
//! "no shadow" sentinels; they are never errors. All state is frame
//! scoped: [`ShadowMapper::begin_frame`] resets everything.
//!
//! # Architecture
//!
//! - **Config**: global settings and shader-variant choices
//! - **Atlas**: tile grid and atlas-space matrix math
//! - **Cascade**: cascade table derivation
//! - **Data**: the GPU-ready uniform block

pub mod atlas;
pub mod cascade;
pub mod config;
pub mod data;

use alloc::vec::Vec;
use core::fmt;

use glam::Vec4;

use crate::culling::{CubeFace, ShadowCuller};
use crate::light::{LightKind, VisibleLight};

pub use atlas::TileViewport;
pub use cascade::CascadeEntry;
pub use config::{
    CascadeBlend, DirectionalShadowSettings, OtherShadowSettings, PcfFilter, ShadowMaskMode,
    ShadowSettings,
};
pub use data::{
    GpuShadowUniforms, MAX_CASCADES, MAX_DIRECTIONAL_TILES, MAX_SHADOWED_DIRECTIONAL_LIGHTS,
    MAX_SHADOWED_OTHER_LIGHTS,
};

/// Shadow vector for a light that casts no shadow at all
const NO_SHADOW: [f32; 4] = [0.0, 0.0, 0.0, -1.0];

/// Which atlas a tile or error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtlasKind {
    /// Cascaded directional shadows
    Directional,
    /// Spot and point shadows
    Other,
}

impl AtlasKind {
    fn name(self) -> &'static str {
        match self {
            Self::Directional => "directional",
            Self::Other => "other",
        }
    }

    /// Depth pancaking is only valid for orthographic directional tiles
    fn pancaking(self) -> bool {
        matches!(self, Self::Directional)
    }
}

/// Errors that can occur during the shadow render phase
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShadowError {
    /// The culling provider has no valid data for a reserved light; the
    /// affected atlas is skipped for the frame
    MissingCullingData {
        /// Atlas that was being rendered
        atlas: AtlasKind,
        /// Visible-light index the query failed for
        light_index: usize,
    },
}

impl fmt::Display for ShadowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCullingData { atlas, light_index } => write!(
                f,
                "no culling data for light {} in {} atlas",
                light_index,
                atlas.name()
            ),
        }
    }
}

/// One shadow tile for the host to rasterize
#[derive(Clone, Copy, Debug)]
pub struct TileDraw {
    /// Visible-light index whose casters are drawn
    pub light_index: usize,
    /// Pixel viewport inside the atlas
    pub viewport: TileViewport,
    /// Light view matrix (already handedness-corrected for cube faces)
    pub view: glam::Mat4,
    /// Light projection matrix
    pub proj: glam::Mat4,
    /// Slope-scale depth bias active while drawing this tile
    pub slope_scale_bias: f32,
    /// Culling sphere for caster selection
    pub culling_sphere: Vec4,
    /// Cascade blend culling factor (0 for spot/point tiles)
    pub blend_culling_factor: f32,
}

/// Render work for one atlas
#[derive(Clone, Debug)]
pub struct AtlasPass {
    /// Which atlas this pass renders
    pub kind: AtlasKind,
    /// Atlas edge length in pixels; 1 for a placeholder
    pub size: u32,
    /// Enable depth pancaking while rendering this atlas
    pub pancaking: bool,
    /// The pass binds a dummy texture and draws nothing
    pub placeholder: bool,
    /// Tile draws in packing order
    pub draws: Vec<TileDraw>,
}

impl AtlasPass {
    /// A pass that only satisfies the texture-binding contract
    fn placeholder(kind: AtlasKind) -> Self {
        Self {
            kind,
            size: 1,
            pancaking: kind.pancaking(),
            placeholder: true,
            draws: Vec::new(),
        }
    }
}

/// Shader variant selection for the frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderVariants {
    /// Directional atlas sampling filter
    pub directional_filter: PcfFilter,
    /// Other atlas sampling filter
    pub other_filter: PcfFilter,
    /// Cascade boundary blending
    pub cascade_blend: CascadeBlend,
    /// Shadow mask participation
    pub shadow_mask: ShadowMaskVariant,
}

/// Shadow mask shader variant for the frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowMaskVariant {
    /// No reserved light uses the baked mask
    Off,
    /// Mask applies at all distances
    Always,
    /// Mask takes over past the shadow distance
    Distance,
}

impl ShadowMaskVariant {
    /// Uniform selector value: -1 off, 0 always, 1 distance
    pub fn selector(self) -> i32 {
        match self {
            Self::Off => -1,
            Self::Always => 0,
            Self::Distance => 1,
        }
    }
}

/// Everything the shading stage needs from the shadow phase
#[derive(Clone, Debug)]
pub struct ShadowFrame {
    /// Directional atlas work
    pub directional: AtlasPass,
    /// Spot/point atlas work
    pub other: AtlasPass,
    /// The finished shadow uniform block
    pub uniforms: GpuShadowUniforms,
    /// Shader variants selected for the frame
    pub variants: ShaderVariants,
}

/// Per-frame reservation counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ShadowStats {
    /// Directional reservations accepted
    pub directional_reserved: u32,
    /// Spot/point reservations accepted
    pub other_reserved: u32,
    /// Reservations rejected because an atlas was full
    pub rejected_over_capacity: u32,
    /// Reserved lights with no visible shadow casters
    pub degenerate_casters: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Reserving,
    Rendered,
}

#[derive(Clone, Copy, Debug)]
struct DirectionalReservation {
    light_index: usize,
    slope_scale_bias: f32,
    near_plane_offset: f32,
}

#[derive(Clone, Copy, Debug)]
struct OtherReservation {
    light_index: usize,
    base_slot: u32,
    slope_scale_bias: f32,
    normal_bias: f32,
    is_point: bool,
}

/// Two-phase shadow atlas allocator
///
/// Owns all frame-scoped shadow state. Reserve calls must all happen
/// before [`render`](Self::render); the phase is checked at runtime and
/// misuse degrades to the no-shadow sentinel rather than corrupting the
/// reservation set.
#[derive(Clone, Debug)]
pub struct ShadowMapper {
    settings: ShadowSettings,
    directional: Vec<DirectionalReservation>,
    other: Vec<OtherReservation>,
    other_slots: u32,
    use_shadow_mask: bool,
    phase: Phase,
    stats: ShadowStats,
}

impl ShadowMapper {
    /// Create a mapper; the settings are validated once here
    pub fn new(mut settings: ShadowSettings) -> Self {
        settings.validate();
        Self {
            settings,
            directional: Vec::with_capacity(MAX_SHADOWED_DIRECTIONAL_LIGHTS),
            other: Vec::with_capacity(MAX_SHADOWED_OTHER_LIGHTS),
            other_slots: 0,
            use_shadow_mask: false,
            phase: Phase::Reserving,
            stats: ShadowStats::default(),
        }
    }

    /// Reset all frame-scoped state and start a new reserve phase
    pub fn begin_frame(&mut self) {
        self.directional.clear();
        self.other.clear();
        self.other_slots = 0;
        self.use_shadow_mask = false;
        self.phase = Phase::Reserving;
        self.stats = ShadowStats::default();
    }

    /// Replace the settings; takes effect from the next reserve call
    pub fn set_settings(&mut self, mut settings: ShadowSettings) {
        settings.validate();
        self.settings = settings;
    }

    /// Current settings
    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// Whether any reserved light participates in the baked shadow mask
    pub fn uses_shadow_mask(&self) -> bool {
        self.use_shadow_mask
    }

    /// This frame's reservation counters
    pub fn stats(&self) -> &ShadowStats {
        &self.stats
    }

    /// Reserve cascaded atlas tiles for a directional light
    ///
    /// Returns (strength, first tile index, normal bias, mask channel).
    /// Capacity exhaustion, disabled shadows, or zero strength return the
    /// no-shadow sentinel `(0, 0, 0, -1)`. A light with no visible
    /// casters keeps its strength but gets no tiles: `(strength, 0, 0,
    /// mask channel)`.
    pub fn reserve_directional(
        &mut self,
        culler: &dyn ShadowCuller,
        light: &VisibleLight,
        visible_index: usize,
    ) -> [f32; 4] {
        if self.phase != Phase::Reserving {
            log::warn!("directional shadow reserved after render, ignoring");
            return NO_SHADOW;
        }

        if self.directional.len() < MAX_SHADOWED_DIRECTIONAL_LIGHTS
            && light.shadows.casts_shadows()
            && light.shadow_strength > 0.0
        {
            let mask_channel = self.resolve_mask_channel(light);

            if culler.caster_bounds(visible_index).is_none() {
                self.stats.degenerate_casters += 1;
                return [light.shadow_strength, 0.0, 0.0, mask_channel];
            }

            let index = self.directional.len() as u32;
            self.directional.push(DirectionalReservation {
                light_index: visible_index,
                slope_scale_bias: light.slope_scale_bias,
                near_plane_offset: light.shadow_near_plane,
            });
            self.stats.directional_reserved += 1;
            return [
                light.shadow_strength,
                (self.settings.directional.cascade_count * index) as f32,
                light.normal_bias,
                mask_channel,
            ];
        }

        if self.directional.len() >= MAX_SHADOWED_DIRECTIONAL_LIGHTS
            && light.shadows.casts_shadows()
            && light.shadow_strength > 0.0
        {
            self.stats.rejected_over_capacity += 1;
        }
        NO_SHADOW
    }

    /// Reserve atlas tiles for a spot or point light
    ///
    /// Returns (strength, base tile index, is-point flag, mask channel).
    /// Point lights consume 6 contiguous slots; the cube faces sit at
    /// `base + face`. A request past the slot capacity or a light with no
    /// visible casters returns a *negated* strength: allocated-but-
    /// degenerate, distinct from the `(0, 0, 0, -1)` no-shadow sentinel.
    pub fn reserve_other(
        &mut self,
        culler: &dyn ShadowCuller,
        light: &VisibleLight,
        visible_index: usize,
    ) -> [f32; 4] {
        if self.phase != Phase::Reserving {
            log::warn!("other shadow reserved after render, ignoring");
            return NO_SHADOW;
        }

        if !light.shadows.casts_shadows() || light.shadow_strength <= 0.0 {
            return NO_SHADOW;
        }

        let mask_channel = self.resolve_mask_channel(light);

        let is_point = light.kind == LightKind::Point;
        let width = if is_point { 6 } else { 1 };
        if self.other_slots + width > MAX_SHADOWED_OTHER_LIGHTS as u32 {
            self.stats.rejected_over_capacity += 1;
            return [-light.shadow_strength, 0.0, 0.0, mask_channel];
        }
        if culler.caster_bounds(visible_index).is_none() {
            self.stats.degenerate_casters += 1;
            return [-light.shadow_strength, 0.0, 0.0, mask_channel];
        }

        let base_slot = self.other_slots;
        self.other.push(OtherReservation {
            light_index: visible_index,
            base_slot,
            slope_scale_bias: light.slope_scale_bias,
            normal_bias: light.normal_bias,
            is_point,
        });
        self.other_slots += width;
        self.stats.other_reserved += 1;

        [
            light.shadow_strength,
            base_slot as f32,
            if is_point { 1.0 } else { 0.0 },
            mask_channel,
        ]
    }

    /// Consume the frame's reservations and produce the shadow frame
    ///
    /// Packs both atlases, emits tile draws, and fills the uniform block.
    /// A second call without [`begin_frame`](Self::begin_frame) yields
    /// placeholder passes only.
    pub fn render(&mut self, culler: &dyn ShadowCuller, reversed_z: bool) -> ShadowFrame {
        let mut uniforms = GpuShadowUniforms::default();

        if self.phase == Phase::Rendered {
            log::warn!("shadow render called twice without begin_frame");
            return self.finish_frame(
                AtlasPass::placeholder(AtlasKind::Directional),
                AtlasPass::placeholder(AtlasKind::Other),
                uniforms,
            );
        }
        self.phase = Phase::Rendered;

        let directional = if self.directional.is_empty() {
            log::trace!("no directional shadows, binding placeholder atlas");
            AtlasPass::placeholder(AtlasKind::Directional)
        } else {
            match self.render_directional(culler, reversed_z, &mut uniforms) {
                Ok(pass) => {
                    let size = self.settings.directional.atlas_size as f32;
                    uniforms.atlas_sizes[0] = size;
                    uniforms.atlas_sizes[1] = 1.0 / size;
                    uniforms.cascade_count = self.settings.directional.cascade_count as i32;
                    pass
                }
                Err(err) => {
                    log::warn!("{}; skipping directional shadows this frame", err);
                    AtlasPass::placeholder(AtlasKind::Directional)
                }
            }
        };

        let other = if self.other.is_empty() {
            log::trace!("no spot/point shadows, binding placeholder atlas");
            AtlasPass::placeholder(AtlasKind::Other)
        } else {
            match self.render_other(culler, reversed_z, &mut uniforms) {
                Ok(pass) => {
                    let size = self.settings.other.atlas_size as f32;
                    uniforms.atlas_sizes[2] = size;
                    uniforms.atlas_sizes[3] = 1.0 / size;
                    pass
                }
                Err(err) => {
                    log::warn!("{}; skipping spot/point shadows this frame", err);
                    AtlasPass::placeholder(AtlasKind::Other)
                }
            }
        };

        self.finish_frame(directional, other, uniforms)
    }

    fn finish_frame(
        &self,
        directional: AtlasPass,
        other: AtlasPass,
        mut uniforms: GpuShadowUniforms,
    ) -> ShadowFrame {
        uniforms.distance_fade = cascade::distance_fade(
            self.settings.max_distance,
            self.settings.distance_fade,
            self.settings.directional.cascade_fade,
        )
        .to_array();

        let shadow_mask = if self.use_shadow_mask {
            match self.settings.shadow_mask {
                ShadowMaskMode::Always => ShadowMaskVariant::Always,
                ShadowMaskMode::Distance => ShadowMaskVariant::Distance,
            }
        } else {
            ShadowMaskVariant::Off
        };
        uniforms.shadow_mask_mode = shadow_mask.selector();

        ShadowFrame {
            directional,
            other,
            uniforms,
            variants: ShaderVariants {
                directional_filter: self.settings.directional.filter,
                other_filter: self.settings.other.filter,
                cascade_blend: self.settings.directional.cascade_blend,
                shadow_mask,
            },
        }
    }

    fn resolve_mask_channel(&mut self, light: &VisibleLight) -> f32 {
        if light.baked.shadow_mask {
            self.use_shadow_mask = true;
            light.baked.occlusion_channel as f32
        } else {
            -1.0
        }
    }

    fn render_directional(
        &self,
        culler: &dyn ShadowCuller,
        reversed_z: bool,
        uniforms: &mut GpuShadowUniforms,
    ) -> Result<AtlasPass, ShadowError> {
        let cfg = &self.settings.directional;
        let cascade_count = cfg.cascade_count;
        let tiles = self.directional.len() as u32 * cascade_count;
        let split = atlas::split_for_tiles(tiles);
        let tile_size = cfg.atlas_size / split;
        let tile_scale = 1.0 / split as f32;
        let culling_factor = (0.8 - cfg.cascade_fade).max(0.0);

        let mut draws = Vec::with_capacity(tiles as usize);
        for (light, reservation) in self.directional.iter().enumerate() {
            let tile_base = light as u32 * cascade_count;
            for cascade in 0..cascade_count {
                let split_data = culler
                    .directional_split(
                        reservation.light_index,
                        cascade,
                        cascade_count,
                        cfg.cascade_ratios,
                        tile_size,
                        reservation.near_plane_offset,
                    )
                    .ok_or(ShadowError::MissingCullingData {
                        atlas: AtlasKind::Directional,
                        light_index: reservation.light_index,
                    })?;

                // Cascade splitting is camera-driven, so every directional
                // light shares the first light's cascade table.
                if light == 0 {
                    let entry = cascade::cascade_entry(
                        split_data.culling_sphere,
                        tile_size as f32,
                        cfg.filter,
                    );
                    uniforms.cascade_spheres[cascade as usize] = entry.culling_sphere.to_array();
                    uniforms.cascade_data[cascade as usize] = entry.data.to_array();
                }

                let tile_index = tile_base + cascade;
                let offset = atlas::tile_offset(tile_index, split);
                uniforms.dir_matrices[tile_index as usize] = atlas::to_atlas_matrix(
                    split_data.proj * split_data.view,
                    offset,
                    tile_scale,
                    reversed_z,
                )
                .to_cols_array_2d();

                draws.push(TileDraw {
                    light_index: reservation.light_index,
                    viewport: atlas::tile_viewport(tile_index, split, tile_size),
                    view: split_data.view,
                    proj: split_data.proj,
                    slope_scale_bias: reservation.slope_scale_bias,
                    culling_sphere: split_data.culling_sphere,
                    blend_culling_factor: culling_factor,
                });
            }
        }

        Ok(AtlasPass {
            kind: AtlasKind::Directional,
            size: cfg.atlas_size,
            pancaking: true,
            placeholder: false,
            draws,
        })
    }

    fn render_other(
        &self,
        culler: &dyn ShadowCuller,
        reversed_z: bool,
        uniforms: &mut GpuShadowUniforms,
    ) -> Result<AtlasPass, ShadowError> {
        let cfg = &self.settings.other;
        let split = atlas::split_for_tiles(self.other_slots);
        let tile_size = cfg.atlas_size / split;
        let tile_scale = 1.0 / split as f32;
        let half_texel = 0.5 / cfg.atlas_size as f32;

        let mut draws = Vec::with_capacity(self.other_slots as usize);
        for reservation in &self.other {
            if reservation.is_point {
                self.render_point(
                    culler,
                    reservation,
                    split,
                    tile_size,
                    tile_scale,
                    half_texel,
                    reversed_z,
                    uniforms,
                    &mut draws,
                )?;
            } else {
                self.render_spot(
                    culler,
                    reservation,
                    split,
                    tile_size,
                    tile_scale,
                    half_texel,
                    reversed_z,
                    uniforms,
                    &mut draws,
                )?;
            }
        }

        Ok(AtlasPass {
            kind: AtlasKind::Other,
            size: cfg.atlas_size,
            pancaking: false,
            placeholder: false,
            draws,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn render_spot(
        &self,
        culler: &dyn ShadowCuller,
        reservation: &OtherReservation,
        split: u32,
        tile_size: u32,
        tile_scale: f32,
        half_texel: f32,
        reversed_z: bool,
        uniforms: &mut GpuShadowUniforms,
        draws: &mut Vec<TileDraw>,
    ) -> Result<(), ShadowError> {
        let split_data =
            culler
                .spot_split(reservation.light_index)
                .ok_or(ShadowError::MissingCullingData {
                    atlas: AtlasKind::Other,
                    light_index: reservation.light_index,
                })?;

        // Perspective projection: world-space texel size grows with
        // distance, so derive it from the projection's vertical scale.
        let texel_size = 2.0 / (tile_size as f32 * split_data.proj.x_axis.x);
        let filter_size = texel_size * self.settings.other.filter.kernel_scale();
        let bias = reservation.normal_bias * filter_size * core::f32::consts::SQRT_2;

        let slot = reservation.base_slot;
        let offset = atlas::tile_offset(slot, split);
        uniforms.other_tiles[slot as usize] =
            atlas::tile_bounds(offset, tile_scale, half_texel, bias).to_array();
        uniforms.other_matrices[slot as usize] = atlas::to_atlas_matrix(
            split_data.proj * split_data.view,
            offset,
            tile_scale,
            reversed_z,
        )
        .to_cols_array_2d();

        draws.push(TileDraw {
            light_index: reservation.light_index,
            viewport: atlas::tile_viewport(slot, split, tile_size),
            view: split_data.view,
            proj: split_data.proj,
            slope_scale_bias: reservation.slope_scale_bias,
            culling_sphere: split_data.culling_sphere,
            blend_culling_factor: 0.0,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn render_point(
        &self,
        culler: &dyn ShadowCuller,
        reservation: &OtherReservation,
        split: u32,
        tile_size: u32,
        tile_scale: f32,
        half_texel: f32,
        reversed_z: bool,
        uniforms: &mut GpuShadowUniforms,
        draws: &mut Vec<TileDraw>,
    ) -> Result<(), ShadowError> {
        let texel_size = 2.0 / tile_size as f32;
        let filter_size = texel_size * self.settings.other.filter.kernel_scale();
        let bias = reservation.normal_bias * filter_size * core::f32::consts::SQRT_2;
        // Widen each face's 90-degree frustum so the filter kernel can
        // sample past the face edge without leaving the tile.
        let fov_bias = (1.0 + bias + filter_size).atan().to_degrees() * 2.0 - 90.0;

        for face in CubeFace::ALL {
            let mut split_data = culler
                .point_split(reservation.light_index, face, fov_bias)
                .ok_or(ShadowError::MissingCullingData {
                    atlas: AtlasKind::Other,
                    light_index: reservation.light_index,
                })?;

            // Flip the view's second row to undo the cube-face render
            // convention of drawing upside down.
            split_data.view.y_axis.y = -split_data.view.y_axis.y;
            split_data.view.z_axis.y = -split_data.view.z_axis.y;
            split_data.view.w_axis.y = -split_data.view.w_axis.y;

            let slot = reservation.base_slot + face.index();
            let offset = atlas::tile_offset(slot, split);
            uniforms.other_tiles[slot as usize] =
                atlas::tile_bounds(offset, tile_scale, half_texel, bias).to_array();
            uniforms.other_matrices[slot as usize] = atlas::to_atlas_matrix(
                split_data.proj * split_data.view,
                offset,
                tile_scale,
                reversed_z,
            )
            .to_cols_array_2d();

            draws.push(TileDraw {
                light_index: reservation.light_index,
                viewport: atlas::tile_viewport(slot, split, tile_size),
                view: split_data.view,
                proj: split_data.proj,
                slope_scale_bias: reservation.slope_scale_bias,
                culling_sphere: split_data.culling_sphere,
                blend_culling_factor: 0.0,
            });
        }
        Ok(())
    }
}

impl Default for ShadowMapper {
    fn default() -> Self {
        Self::new(ShadowSettings::default())
    }
}
