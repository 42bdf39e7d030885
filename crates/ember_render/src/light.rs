//! Visible Light Description
//!
//! Input-side description of one light as produced by the host's culling
//! pass. This is read-only, per-frame data: the aggregator consumes a slice
//! of these in visibility order and never stores references past the frame.

use glam::Vec3;

/// Classification of a visible light
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LightKind {
    /// Infinite-distance light with direction only
    Directional,
    /// Omnidirectional light with position and range
    Point,
    /// Cone light with position, direction, range and angles
    Spot,
}

/// Shadow casting mode for a light
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowMode {
    /// Light casts no shadows
    None,
    /// Hard shadow edges (single tap)
    Hard,
    /// Filtered shadow edges
    Soft,
}

impl ShadowMode {
    /// Check if shadow rendering is requested at all
    pub fn casts_shadows(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Baked-lighting output relevant to real-time shadowing
///
/// When a light was baked in mixed mode with a shadow mask, the real-time
/// path must also sample the baked occlusion texture channel assigned to
/// the light.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BakedShadowing {
    /// Light participates in the baked shadow mask
    pub shadow_mask: bool,
    /// Occlusion mask texture channel (0-3), meaningful only with
    /// `shadow_mask` set
    pub occlusion_channel: u32,
}

/// One visible light for the current frame
///
/// `direction` is the light's forward axis (the direction light travels),
/// normalized. Colors are linear RGB with intensity already applied.
#[derive(Clone, Copy, Debug)]
pub struct VisibleLight {
    /// Light classification
    pub kind: LightKind,
    /// Final linear color, intensity pre-applied
    pub color: [f32; 3],
    /// World-space position (unused for directional lights)
    pub position: Vec3,
    /// World-space forward axis, normalized
    pub direction: Vec3,
    /// Maximum range in world units (unused for directional lights)
    pub range: f32,
    /// Full inner cone angle in radians (spot only)
    pub spot_inner_angle: f32,
    /// Full outer cone angle in radians (spot only)
    pub spot_outer_angle: f32,
    /// Rendering layer membership bits
    pub rendering_layer_mask: u32,
    /// Shadow casting mode
    pub shadows: ShadowMode,
    /// Shadow strength in [0, 1]
    pub shadow_strength: f32,
    /// Slope-scale depth bias applied while rendering this light's tiles
    pub slope_scale_bias: f32,
    /// Normal-offset bias, scaled by the tile's filter footprint
    pub normal_bias: f32,
    /// Shadow near plane offset (directional lights)
    pub shadow_near_plane: f32,
    /// Baked shadow-mask participation
    pub baked: BakedShadowing,
}

impl VisibleLight {
    /// Create a directional light
    pub fn directional(direction: Vec3, color: [f32; 3]) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            position: Vec3::ZERO,
            direction,
            range: 0.0,
            spot_inner_angle: 0.0,
            spot_outer_angle: 0.0,
            rendering_layer_mask: u32::MAX,
            shadows: ShadowMode::None,
            shadow_strength: 1.0,
            slope_scale_bias: 1.0,
            normal_bias: 0.5,
            shadow_near_plane: 0.1,
            baked: BakedShadowing::default(),
        }
    }

    /// Create a point light
    pub fn point(position: Vec3, range: f32, color: [f32; 3]) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            position,
            direction: Vec3::NEG_Y,
            range,
            spot_inner_angle: 0.0,
            spot_outer_angle: 0.0,
            rendering_layer_mask: u32::MAX,
            shadows: ShadowMode::None,
            shadow_strength: 1.0,
            slope_scale_bias: 1.0,
            normal_bias: 0.5,
            shadow_near_plane: 0.1,
            baked: BakedShadowing::default(),
        }
    }

    /// Create a spot light; angles are full cone angles in radians
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        range: f32,
        inner_angle: f32,
        outer_angle: f32,
        color: [f32; 3],
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            color,
            position,
            direction,
            range,
            spot_inner_angle: inner_angle,
            spot_outer_angle: outer_angle,
            rendering_layer_mask: u32::MAX,
            shadows: ShadowMode::None,
            shadow_strength: 1.0,
            slope_scale_bias: 1.0,
            normal_bias: 0.5,
            shadow_near_plane: 0.1,
            baked: BakedShadowing::default(),
        }
    }

    /// Enable shadow casting with the given strength
    pub fn with_shadows(mut self, mode: ShadowMode, strength: f32) -> Self {
        self.shadows = mode;
        self.shadow_strength = strength;
        self
    }

    /// Set depth bias parameters
    pub fn with_bias(mut self, slope_scale: f32, normal: f32) -> Self {
        self.slope_scale_bias = slope_scale;
        self.normal_bias = normal;
        self
    }

    /// Restrict the light to specific rendering layers
    pub fn with_layer_mask(mut self, mask: u32) -> Self {
        self.rendering_layer_mask = mask;
        self
    }

    /// Mark the light as baked into a shadow mask channel
    pub fn with_shadow_mask(mut self, occlusion_channel: u32) -> Self {
        self.baked = BakedShadowing {
            shadow_mask: true,
            occlusion_channel,
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_classify() {
        let d = VisibleLight::directional(Vec3::NEG_Y, [1.0; 3]);
        assert_eq!(d.kind, LightKind::Directional);
        assert_eq!(d.shadows, ShadowMode::None);

        let p = VisibleLight::point(Vec3::new(0.0, 5.0, 0.0), 10.0, [1.0; 3]);
        assert_eq!(p.kind, LightKind::Point);
        assert_eq!(p.range, 10.0);

        let s = VisibleLight::spot(
            Vec3::ZERO,
            Vec3::NEG_Y,
            20.0,
            30.0_f32.to_radians(),
            45.0_f32.to_radians(),
            [1.0; 3],
        );
        assert_eq!(s.kind, LightKind::Spot);
        assert!(s.spot_inner_angle < s.spot_outer_angle);
    }

    #[test]
    fn test_shadow_mode() {
        assert!(!ShadowMode::None.casts_shadows());
        assert!(ShadowMode::Hard.casts_shadows());
        assert!(ShadowMode::Soft.casts_shadows());
    }

    #[test]
    fn test_builder_helpers() {
        let light = VisibleLight::point(Vec3::ZERO, 5.0, [1.0; 3])
            .with_shadows(ShadowMode::Soft, 0.75)
            .with_bias(2.0, 0.4)
            .with_layer_mask(0b10)
            .with_shadow_mask(2);

        assert_eq!(light.shadow_strength, 0.75);
        assert_eq!(light.slope_scale_bias, 2.0);
        assert_eq!(light.rendering_layer_mask, 0b10);
        assert!(light.baked.shadow_mask);
        assert_eq!(light.baked.occlusion_channel, 2);
    }
}
