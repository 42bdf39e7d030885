//! Light Uniform Aggregation
//!
//! Consumes the frame's visible-light list once, in list order, and builds
//! the flat per-light uniform arrays the shading stage reads. Capacity is
//! fixed: 4 directional and 64 other lights; lights beyond a cap or
//! filtered out by the rendering layer mask are dropped silently.
//!
//! For every eligible shadow-casting light the aggregator asks the shadow
//! mapper for a reservation and embeds the returned 4-component shadow
//! vector directly into the light's uniform slot.

use alloc::vec::Vec;
use core::mem::{offset_of, size_of};

use glam::Vec4;

use crate::culling::ShadowCuller;
use crate::light::{LightKind, VisibleLight};
use crate::shadow::ShadowMapper;
use crate::uniform::UniformField;

/// Maximum directional lights per frame
pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;

/// Maximum spot/point lights per frame
pub const MAX_OTHER_LIGHTS: usize = 64;

/// Per-object sentinel for "light not selected this frame"
pub const UNSELECTED_LIGHT: i32 = -1;

/// Light uniform block
///
/// Directions point from the surface toward the light. The rendering
/// layer mask is bit-reinterpreted into the w component of each direction
/// vector. Shadow data is (strength, tile index base, normal bias or
/// is-point flag, mask channel) as produced by the shadow mapper.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuLightUniforms {
    /// Directional light colors
    pub dir_colors: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Directional light directions, layer mask bits in w
    pub dir_directions_and_masks: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Directional shadow data vectors
    pub dir_shadow_data: [[f32; 4]; MAX_DIRECTIONAL_LIGHTS],
    /// Other light colors
    pub other_colors: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Other light positions, 1/range^2 in w
    pub other_positions: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Other light directions, layer mask bits in w
    pub other_directions_and_masks: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Spot angle falloff terms (scale, bias)
    pub other_spot_angles: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Other shadow data vectors
    pub other_shadow_data: [[f32; 4]; MAX_OTHER_LIGHTS],
    /// Active directional light count
    pub dir_count: u32,
    /// Active other light count
    pub other_count: u32,
    /// Padding to 16 bytes
    pub _pad: [u32; 2],
}

impl Default for GpuLightUniforms {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

impl GpuLightUniforms {
    /// Field schema of the block, in declaration order
    pub const LAYOUT: [UniformField; 10] = [
        UniformField {
            name: "dir_light_colors",
            offset: offset_of!(GpuLightUniforms, dir_colors),
            size: size_of::<[[f32; 4]; MAX_DIRECTIONAL_LIGHTS]>(),
        },
        UniformField {
            name: "dir_light_directions_and_masks",
            offset: offset_of!(GpuLightUniforms, dir_directions_and_masks),
            size: size_of::<[[f32; 4]; MAX_DIRECTIONAL_LIGHTS]>(),
        },
        UniformField {
            name: "dir_light_shadow_data",
            offset: offset_of!(GpuLightUniforms, dir_shadow_data),
            size: size_of::<[[f32; 4]; MAX_DIRECTIONAL_LIGHTS]>(),
        },
        UniformField {
            name: "other_light_colors",
            offset: offset_of!(GpuLightUniforms, other_colors),
            size: size_of::<[[f32; 4]; MAX_OTHER_LIGHTS]>(),
        },
        UniformField {
            name: "other_light_positions",
            offset: offset_of!(GpuLightUniforms, other_positions),
            size: size_of::<[[f32; 4]; MAX_OTHER_LIGHTS]>(),
        },
        UniformField {
            name: "other_light_directions_and_masks",
            offset: offset_of!(GpuLightUniforms, other_directions_and_masks),
            size: size_of::<[[f32; 4]; MAX_OTHER_LIGHTS]>(),
        },
        UniformField {
            name: "other_light_spot_angles",
            offset: offset_of!(GpuLightUniforms, other_spot_angles),
            size: size_of::<[[f32; 4]; MAX_OTHER_LIGHTS]>(),
        },
        UniformField {
            name: "other_light_shadow_data",
            offset: offset_of!(GpuLightUniforms, other_shadow_data),
            size: size_of::<[[f32; 4]; MAX_OTHER_LIGHTS]>(),
        },
        UniformField {
            name: "dir_light_count",
            offset: offset_of!(GpuLightUniforms, dir_count),
            size: size_of::<u32>(),
        },
        UniformField {
            name: "other_light_count",
            offset: offset_of!(GpuLightUniforms, other_count),
            size: size_of::<u32>(),
        },
    ];

    /// Whole block as bytes for GPU upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Per-frame aggregation counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Directional lights accepted
    pub directional: u32,
    /// Other lights accepted
    pub other: u32,
    /// Lights dropped because a cap was reached
    pub dropped_over_capacity: u32,
    /// Lights skipped by the rendering layer filter
    pub filtered_by_layer: u32,
}

/// Builds the light uniform block from the visible-light list
#[derive(Clone, Debug, Default)]
pub struct LightAggregator {
    uniforms: GpuLightUniforms,
    per_object_indices: Vec<i32>,
    track_per_object: bool,
    stats: AggregatorStats,
}

impl LightAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame state
    pub fn reset(&mut self) {
        self.uniforms = GpuLightUniforms::default();
        self.per_object_indices.clear();
        self.track_per_object = false;
        self.stats = AggregatorStats::default();
    }

    /// Consume the visible-light list for this frame
    ///
    /// Iteration order is the list's order and decides which lights fill
    /// the capped arrays. Shadow reservations are made through `shadows`
    /// as lights are accepted, so every reserve call for the frame has
    /// happened by the time this returns.
    pub fn collect(
        &mut self,
        culler: &dyn ShadowCuller,
        lights: &[VisibleLight],
        shadows: &mut ShadowMapper,
        layer_filter: u32,
        track_per_object: bool,
    ) {
        self.track_per_object = track_per_object;
        if track_per_object {
            self.per_object_indices.reserve(lights.len());
        }

        for (index, light) in lights.iter().enumerate() {
            let mut other_slot = UNSELECTED_LIGHT;

            if light.rendering_layer_mask & layer_filter != 0 {
                match light.kind {
                    LightKind::Directional => {
                        if (self.uniforms.dir_count as usize) < MAX_DIRECTIONAL_LIGHTS {
                            self.set_directional(culler, light, index, shadows);
                        } else {
                            self.stats.dropped_over_capacity += 1;
                        }
                    }
                    LightKind::Point => {
                        if (self.uniforms.other_count as usize) < MAX_OTHER_LIGHTS {
                            other_slot = self.uniforms.other_count as i32;
                            self.set_point(culler, light, index, shadows);
                        } else {
                            self.stats.dropped_over_capacity += 1;
                        }
                    }
                    LightKind::Spot => {
                        if (self.uniforms.other_count as usize) < MAX_OTHER_LIGHTS {
                            other_slot = self.uniforms.other_count as i32;
                            self.set_spot(culler, light, index, shadows);
                        } else {
                            self.stats.dropped_over_capacity += 1;
                        }
                    }
                }
            } else {
                self.stats.filtered_by_layer += 1;
            }

            if track_per_object {
                self.per_object_indices.push(other_slot);
            }
        }

        if self.stats.dropped_over_capacity > 0 {
            log::debug!(
                "light caps reached, {} light(s) dropped",
                self.stats.dropped_over_capacity
            );
        }
    }

    /// The finished uniform block
    pub fn uniforms(&self) -> &GpuLightUniforms {
        &self.uniforms
    }

    /// Per-object light index remap, when tracking was requested
    ///
    /// One entry per visible light: the light's slot in the other-light
    /// arrays, or [`UNSELECTED_LIGHT`] when it was dropped, filtered, or
    /// directional.
    pub fn per_object_indices(&self) -> Option<&[i32]> {
        self.track_per_object.then(|| self.per_object_indices.as_slice())
    }

    /// This frame's counters
    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }

    fn set_directional(
        &mut self,
        culler: &dyn ShadowCuller,
        light: &VisibleLight,
        visible_index: usize,
        shadows: &mut ShadowMapper,
    ) {
        let slot = self.uniforms.dir_count as usize;
        self.uniforms.dir_colors[slot] = color_vec(light.color);
        self.uniforms.dir_directions_and_masks[slot] = (-light.direction)
            .extend(mask_bits(light.rendering_layer_mask))
            .to_array();
        self.uniforms.dir_shadow_data[slot] =
            shadows.reserve_directional(culler, light, visible_index);
        self.uniforms.dir_count += 1;
        self.stats.directional += 1;
    }

    fn set_point(
        &mut self,
        culler: &dyn ShadowCuller,
        light: &VisibleLight,
        visible_index: usize,
        shadows: &mut ShadowMapper,
    ) {
        let slot = self.uniforms.other_count as usize;
        self.uniforms.other_colors[slot] = color_vec(light.color);
        self.uniforms.other_positions[slot] = light
            .position
            .extend(inverse_range_sq(light.range))
            .to_array();
        self.uniforms.other_spot_angles[slot] = [0.0, 1.0, 0.0, 0.0];
        self.uniforms.other_directions_and_masks[slot] =
            [0.0, 0.0, 0.0, mask_bits(light.rendering_layer_mask)];
        self.uniforms.other_shadow_data[slot] =
            shadows.reserve_other(culler, light, visible_index);
        self.uniforms.other_count += 1;
        self.stats.other += 1;
    }

    fn set_spot(
        &mut self,
        culler: &dyn ShadowCuller,
        light: &VisibleLight,
        visible_index: usize,
        shadows: &mut ShadowMapper,
    ) {
        let slot = self.uniforms.other_count as usize;
        self.uniforms.other_colors[slot] = color_vec(light.color);
        self.uniforms.other_positions[slot] = light
            .position
            .extend(inverse_range_sq(light.range))
            .to_array();
        self.uniforms.other_directions_and_masks[slot] = (-light.direction)
            .extend(mask_bits(light.rendering_layer_mask))
            .to_array();

        let inner_cos = (0.5 * light.spot_inner_angle).cos();
        let outer_cos = (0.5 * light.spot_outer_angle).cos();
        let angle_range_inv = 1.0 / (inner_cos - outer_cos).max(0.001);
        self.uniforms.other_spot_angles[slot] =
            Vec4::new(angle_range_inv, -outer_cos * angle_range_inv, 0.0, 0.0).to_array();

        self.uniforms.other_shadow_data[slot] =
            shadows.reserve_other(culler, light, visible_index);
        self.uniforms.other_count += 1;
        self.stats.other += 1;
    }
}

fn color_vec(color: [f32; 3]) -> [f32; 4] {
    [color[0], color[1], color[2], 1.0]
}

fn mask_bits(mask: u32) -> f32 {
    f32::from_bits(mask)
}

fn inverse_range_sq(range: f32) -> f32 {
    1.0 / (range * range).max(1e-5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::{CasterBounds, CubeFace, ShadowSplit};
    use crate::light::ShadowMode;
    use crate::shadow::config::ShadowSettings;
    use glam::{Mat4, Vec3, Vec4};

    struct StubCuller;

    impl ShadowCuller for StubCuller {
        fn caster_bounds(&self, _light_index: usize) -> Option<CasterBounds> {
            Some(CasterBounds {
                center: Vec3::ZERO,
                extents: Vec3::ONE,
            })
        }

        fn directional_split(
            &self,
            _light_index: usize,
            _cascade: u32,
            _cascade_count: u32,
            _ratios: [f32; 3],
            _tile_size: u32,
            _near_plane_offset: f32,
        ) -> Option<ShadowSplit> {
            Some(identity_split())
        }

        fn spot_split(&self, _light_index: usize) -> Option<ShadowSplit> {
            Some(identity_split())
        }

        fn point_split(
            &self,
            _light_index: usize,
            _face: CubeFace,
            _fov_bias_deg: f32,
        ) -> Option<ShadowSplit> {
            Some(identity_split())
        }
    }

    fn identity_split() -> ShadowSplit {
        ShadowSplit {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            culling_sphere: Vec4::new(0.0, 0.0, 0.0, 10.0),
        }
    }

    fn mapper() -> ShadowMapper {
        let mut mapper = ShadowMapper::new(ShadowSettings::default());
        mapper.begin_frame();
        mapper
    }

    #[test]
    fn test_directional_cap_keeps_first_four() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let lights: Vec<VisibleLight> = (0..5)
            .map(|i| {
                VisibleLight::directional(Vec3::NEG_Y, [i as f32, 0.0, 0.0])
                    .with_shadows(ShadowMode::Soft, 1.0)
            })
            .collect();

        aggregator.collect(&StubCuller, &lights, &mut shadows, u32::MAX, false);

        let uniforms = aggregator.uniforms();
        assert_eq!(uniforms.dir_count, 4);
        for i in 0..4 {
            assert_eq!(uniforms.dir_colors[i][0], i as f32);
        }
        assert_eq!(aggregator.stats().dropped_over_capacity, 1);
        // The fifth light got no reservation: 4 accepted, in list order.
        for i in 0..4 {
            assert_eq!(uniforms.dir_shadow_data[i][1], (i * 4) as f32);
        }
    }

    #[test]
    fn test_other_cap() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let lights: Vec<VisibleLight> = (0..70)
            .map(|_| VisibleLight::point(Vec3::ZERO, 10.0, [1.0; 3]))
            .collect();

        aggregator.collect(&StubCuller, &lights, &mut shadows, u32::MAX, false);

        assert_eq!(aggregator.uniforms().other_count, 64);
        assert_eq!(aggregator.stats().dropped_over_capacity, 6);
    }

    #[test]
    fn test_direction_negated_and_mask_packed() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let lights = [VisibleLight::directional(Vec3::new(0.0, -1.0, 0.0), [1.0; 3])
            .with_layer_mask(0b101)];

        aggregator.collect(&StubCuller, &lights, &mut shadows, u32::MAX, false);

        let dir = aggregator.uniforms().dir_directions_and_masks[0];
        assert_eq!(dir[1], 1.0);
        assert_eq!(dir[3].to_bits(), 0b101);
    }

    #[test]
    fn test_point_light_uniforms() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let lights = [VisibleLight::point(Vec3::new(1.0, 2.0, 3.0), 10.0, [1.0; 3])];

        aggregator.collect(&StubCuller, &lights, &mut shadows, u32::MAX, false);

        let uniforms = aggregator.uniforms();
        assert_eq!(uniforms.other_count, 1);
        let pos = uniforms.other_positions[0];
        assert_eq!(&pos[0..3], &[1.0, 2.0, 3.0]);
        assert!((pos[3] - 0.01).abs() < 1e-7);
        assert_eq!(uniforms.other_spot_angles[0], [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_spot_angle_falloff() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let inner = 30.0_f32.to_radians();
        let outer = 60.0_f32.to_radians();
        let lights = [VisibleLight::spot(Vec3::ZERO, Vec3::NEG_Y, 10.0, inner, outer, [1.0; 3])];

        aggregator.collect(&StubCuller, &lights, &mut shadows, u32::MAX, false);

        let inner_cos = (0.5 * inner).cos();
        let outer_cos = (0.5 * outer).cos();
        let inv = 1.0 / (inner_cos - outer_cos).max(0.001);
        let angles = aggregator.uniforms().other_spot_angles[0];
        assert!((angles[0] - inv).abs() < 1e-5);
        assert!((angles[1] + outer_cos * inv).abs() < 1e-5);
    }

    #[test]
    fn test_layer_filter_skips() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let lights = [
            VisibleLight::point(Vec3::ZERO, 10.0, [1.0; 3]).with_layer_mask(0b01),
            VisibleLight::point(Vec3::ZERO, 10.0, [1.0; 3]).with_layer_mask(0b10),
        ];

        aggregator.collect(&StubCuller, &lights, &mut shadows, 0b01, true);

        assert_eq!(aggregator.uniforms().other_count, 1);
        assert_eq!(aggregator.stats().filtered_by_layer, 1);
        assert_eq!(aggregator.per_object_indices(), Some(&[0, -1][..]));
    }

    #[test]
    fn test_per_object_remap_directional_is_unselected() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let lights = [
            VisibleLight::directional(Vec3::NEG_Y, [1.0; 3]),
            VisibleLight::point(Vec3::ZERO, 10.0, [1.0; 3]),
            VisibleLight::spot(
                Vec3::ZERO,
                Vec3::NEG_Y,
                10.0,
                0.4,
                0.8,
                [1.0; 3],
            ),
        ];

        aggregator.collect(&StubCuller, &lights, &mut shadows, u32::MAX, true);

        assert_eq!(aggregator.per_object_indices(), Some(&[-1, 0, 1][..]));
    }

    #[test]
    fn test_per_object_remap_disabled() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let lights = [VisibleLight::point(Vec3::ZERO, 10.0, [1.0; 3])];

        aggregator.collect(&StubCuller, &lights, &mut shadows, u32::MAX, false);

        assert!(aggregator.per_object_indices().is_none());
    }

    #[test]
    fn test_reset_clears_counts() {
        let mut aggregator = LightAggregator::new();
        let mut shadows = mapper();
        let lights = [VisibleLight::point(Vec3::ZERO, 10.0, [1.0; 3])];
        aggregator.collect(&StubCuller, &lights, &mut shadows, u32::MAX, true);

        aggregator.reset();

        assert_eq!(aggregator.uniforms().other_count, 0);
        assert!(aggregator.per_object_indices().is_none());
        assert_eq!(aggregator.stats(), &AggregatorStats::default());
    }

    #[test]
    fn test_alignment_and_layout() {
        assert_eq!(size_of::<GpuLightUniforms>() % 16, 0);
        for pair in GpuLightUniforms::LAYOUT.windows(2) {
            assert!(pair[0].end() <= pair[1].offset);
        }
    }
}
