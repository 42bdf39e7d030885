//! Shadow Settings
//!
//! Global shadow configuration with serde support for hot-reload. Shader
//! variant choices (filter kernel, cascade blend, shadow mask handling)
//! are typed enums rather than string keywords.

use serde::{Deserialize, Serialize};

use super::data::MAX_CASCADES;

/// PCF filter kernel applied when sampling an atlas
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PcfFilter {
    /// Hardware bilinear comparison only
    Pcf2x2,
    Pcf3x3,
    Pcf5x5,
    Pcf7x7,
}

impl PcfFilter {
    /// Filter footprint in texels, as a multiple of one texel
    pub fn kernel_scale(self) -> f32 {
        self as u32 as f32 + 1.0
    }

    /// Tap width of the kernel
    pub fn tap_width(self) -> u32 {
        match self {
            Self::Pcf2x2 => 2,
            Self::Pcf3x3 => 3,
            Self::Pcf5x5 => 5,
            Self::Pcf7x7 => 7,
        }
    }
}

/// How neighboring cascades are blended at their boundary
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeBlend {
    /// Hard switch between cascades
    Hard,
    /// Interpolated blend over the fade region
    Soft,
    /// Dithered selection over the fade region
    Dither,
}

/// Which shadow-mask shader variant the frame selects when any reserved
/// light participates in the baked mask
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShadowMaskMode {
    /// Mask applies at all distances
    Always,
    /// Mask takes over past the real-time shadow distance
    Distance,
}

/// Directional atlas settings
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DirectionalShadowSettings {
    /// Atlas edge length in pixels (power of 2)
    pub atlas_size: u32,
    /// Sampling filter
    pub filter: PcfFilter,
    /// Cascade count (1-4)
    pub cascade_count: u32,
    /// Cascade split positions as fractions of the shadow distance
    pub cascade_ratios: [f32; 3],
    /// Fraction of a cascade over which it fades into the next
    pub cascade_fade: f32,
    /// Cascade boundary blending
    pub cascade_blend: CascadeBlend,
}

impl Default for DirectionalShadowSettings {
    fn default() -> Self {
        Self {
            atlas_size: 2048,
            filter: PcfFilter::Pcf2x2,
            cascade_count: 4,
            cascade_ratios: [0.1, 0.25, 0.5],
            cascade_fade: 0.1,
            cascade_blend: CascadeBlend::Hard,
        }
    }
}

/// Spot/point atlas settings
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct OtherShadowSettings {
    /// Atlas edge length in pixels (power of 2)
    pub atlas_size: u32,
    /// Sampling filter
    pub filter: PcfFilter,
}

impl Default for OtherShadowSettings {
    fn default() -> Self {
        Self {
            atlas_size: 2048,
            filter: PcfFilter::Pcf2x2,
        }
    }
}

/// Global shadow configuration
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ShadowSettings {
    /// Maximum shadow distance from the camera
    pub max_distance: f32,
    /// Fraction of the shadow distance over which shadows fade out
    pub distance_fade: f32,
    /// Shadow mask handling when baked masks are present
    pub shadow_mask: ShadowMaskMode,
    /// Directional atlas settings
    pub directional: DirectionalShadowSettings,
    /// Spot/point atlas settings
    pub other: OtherShadowSettings,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            max_distance: 100.0,
            distance_fade: 0.1,
            shadow_mask: ShadowMaskMode::Distance,
            directional: DirectionalShadowSettings::default(),
            other: OtherShadowSettings::default(),
        }
    }
}

impl ShadowSettings {
    /// High-quality preset: larger atlases, wider filters, soft cascade
    /// boundaries
    pub fn high_quality() -> Self {
        Self {
            max_distance: 150.0,
            directional: DirectionalShadowSettings {
                atlas_size: 4096,
                filter: PcfFilter::Pcf5x5,
                cascade_blend: CascadeBlend::Soft,
                ..Default::default()
            },
            other: OtherShadowSettings {
                atlas_size: 4096,
                filter: PcfFilter::Pcf5x5,
            },
            ..Default::default()
        }
    }

    /// Low-quality preset for performance
    pub fn low_quality() -> Self {
        Self {
            max_distance: 50.0,
            directional: DirectionalShadowSettings {
                atlas_size: 1024,
                cascade_count: 2,
                ..Default::default()
            },
            other: OtherShadowSettings {
                atlas_size: 1024,
                filter: PcfFilter::Pcf2x2,
            },
            ..Default::default()
        }
    }

    /// Validate and clamp all values to usable ranges
    pub fn validate(&mut self) {
        self.max_distance = self.max_distance.max(0.001);
        self.distance_fade = self.distance_fade.clamp(0.001, 1.0);

        let d = &mut self.directional;
        d.atlas_size = d.atlas_size.clamp(256, 8192).next_power_of_two();
        d.cascade_count = d.cascade_count.clamp(1, MAX_CASCADES as u32);
        for ratio in &mut d.cascade_ratios {
            *ratio = ratio.clamp(0.0, 1.0);
        }
        d.cascade_fade = d.cascade_fade.clamp(0.001, 1.0);

        self.other.atlas_size = self.other.atlas_size.clamp(256, 8192).next_power_of_two();
    }
}
