//! Frame Preparation Facade
//!
//! Ties the aggregator and the shadow mapper together in the order the
//! pipeline requires: reset, aggregate (which reserves shadows per
//! accepted light), then render the shadow atlases. Hosts that need finer
//! control can drive [`LightAggregator`] and [`ShadowMapper`] directly.

use alloc::vec::Vec;

use crate::culling::ShadowCuller;
use crate::light::VisibleLight;
use crate::lights::{AggregatorStats, GpuLightUniforms, LightAggregator};
use crate::shadow::{ShadowFrame, ShadowMapper, ShadowSettings, ShadowStats};

/// Per-frame preparation options
#[derive(Clone, Copy, Debug)]
pub struct FrameOptions {
    /// Rendering layer filter; lights outside it are skipped
    pub layer_filter: u32,
    /// Build the per-object light index remap
    pub per_object_indices: bool,
    /// Target platform uses a reversed depth range
    pub reversed_z: bool,
}

impl Default for FrameOptions {
    fn default() -> Self {
        Self {
            layer_filter: u32::MAX,
            per_object_indices: false,
            reversed_z: false,
        }
    }
}

/// Everything the shading stage consumes for one frame
#[derive(Clone, Debug)]
pub struct PreparedFrame {
    /// Light uniform block
    pub lights: GpuLightUniforms,
    /// Shadow atlas passes, uniforms and shader variants
    pub shadows: ShadowFrame,
    /// Per-object light index remap, when requested
    pub per_object_indices: Option<Vec<i32>>,
}

/// Per-frame light and shadow preparation
#[derive(Clone, Debug, Default)]
pub struct FrameLighting {
    aggregator: LightAggregator,
    shadows: ShadowMapper,
}

impl FrameLighting {
    /// Create with the given shadow settings
    pub fn new(settings: ShadowSettings) -> Self {
        Self {
            aggregator: LightAggregator::new(),
            shadows: ShadowMapper::new(settings),
        }
    }

    /// Replace the shadow settings for subsequent frames
    pub fn set_shadow_settings(&mut self, settings: ShadowSettings) {
        self.shadows.set_settings(settings);
    }

    /// Prepare one frame from the visible-light list
    pub fn prepare(
        &mut self,
        culler: &dyn ShadowCuller,
        lights: &[VisibleLight],
        options: &FrameOptions,
    ) -> PreparedFrame {
        self.shadows.begin_frame();
        self.aggregator.reset();
        self.aggregator.collect(
            culler,
            lights,
            &mut self.shadows,
            options.layer_filter,
            options.per_object_indices,
        );
        let shadows = self.shadows.render(culler, options.reversed_z);

        PreparedFrame {
            lights: *self.aggregator.uniforms(),
            per_object_indices: self
                .aggregator
                .per_object_indices()
                .map(|indices| indices.to_vec()),
            shadows,
        }
    }

    /// Aggregation counters from the last prepared frame
    pub fn aggregator_stats(&self) -> &AggregatorStats {
        self.aggregator.stats()
    }

    /// Shadow reservation counters from the last prepared frame
    pub fn shadow_stats(&self) -> &ShadowStats {
        self.shadows.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::culling::{CasterBounds, CubeFace, ShadowSplit};
    use crate::light::ShadowMode;
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
            cascade: u32,
            _cascade_count: u32,
            _ratios: [f32; 3],
            _tile_size: u32,
            _near_plane_offset: f32,
        ) -> Option<ShadowSplit> {
            Some(ShadowSplit {
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
                culling_sphere: Vec4::new(0.0, 0.0, 0.0, 10.0 + cascade as f32),
            })
        }

        fn spot_split(&self, _light_index: usize) -> Option<ShadowSplit> {
            Some(ShadowSplit {
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
                culling_sphere: Vec4::new(0.0, 0.0, 0.0, 5.0),
            })
        }

        fn point_split(
            &self,
            _light_index: usize,
            _face: CubeFace,
            _fov_bias_deg: f32,
        ) -> Option<ShadowSplit> {
            Some(ShadowSplit {
                view: Mat4::IDENTITY,
                proj: Mat4::IDENTITY,
                culling_sphere: Vec4::new(0.0, 0.0, 0.0, 5.0),
            })
        }
    }

    fn scene() -> Vec<VisibleLight> {
        alloc::vec![
            VisibleLight::directional(Vec3::NEG_Y, [1.0; 3]).with_shadows(ShadowMode::Soft, 1.0),
            VisibleLight::directional(Vec3::NEG_X, [0.5; 3]),
            VisibleLight::spot(Vec3::ZERO, Vec3::NEG_Y, 10.0, 0.4, 0.8, [1.0; 3])
                .with_shadows(ShadowMode::Hard, 0.8),
            VisibleLight::point(Vec3::new(1.0, 2.0, 3.0), 10.0, [1.0; 3])
                .with_shadows(ShadowMode::Soft, 1.0),
            VisibleLight::point(Vec3::ZERO, 5.0, [0.2; 3]),
        ]
    }

    #[test]
    fn test_prepare_full_frame() {
        let mut lighting = FrameLighting::new(ShadowSettings::default());
        let options = FrameOptions {
            per_object_indices: true,
            ..Default::default()
        };

        let frame = lighting.prepare(&StubCuller, &scene(), &options);

        assert_eq!(frame.lights.dir_count, 2);
        assert_eq!(frame.lights.other_count, 3);
        // 1 shadowed directional x 4 cascades; spot + 6 point faces.
        assert_eq!(frame.shadows.directional.draws.len(), 4);
        assert_eq!(frame.shadows.other.draws.len(), 7);
        assert_eq!(
            frame.per_object_indices,
            Some(alloc::vec![-1, -1, 0, 1, 2])
        );
        // Shadow data embedded into the light uniforms.
        assert_eq!(frame.lights.dir_shadow_data[0][0], 1.0);
        assert_eq!(frame.lights.dir_shadow_data[1], [0.0, 0.0, 0.0, -1.0]);
        assert_eq!(frame.lights.other_shadow_data[0][0], 0.8);
        assert_eq!(frame.lights.other_shadow_data[1][2], 1.0);
    }

    #[test]
    fn test_prepare_is_repeatable_across_frames() {
        let mut lighting = FrameLighting::new(ShadowSettings::default());
        let options = FrameOptions::default();
        let lights = scene();

        let first = lighting.prepare(&StubCuller, &lights, &options);
        let second = lighting.prepare(&StubCuller, &lights, &options);

        assert_eq!(second.lights.dir_count, first.lights.dir_count);
        assert_eq!(
            second.shadows.directional.draws.len(),
            first.shadows.directional.draws.len()
        );
        assert_eq!(
            second.lights.other_shadow_data[0],
            first.lights.other_shadow_data[0]
        );
    }

    #[test]
    fn test_prepare_empty_scene() {
        let mut lighting = FrameLighting::new(ShadowSettings::default());

        let frame = lighting.prepare(&StubCuller, &[], &FrameOptions::default());

        assert_eq!(frame.lights.dir_count, 0);
        assert_eq!(frame.lights.other_count, 0);
        assert!(frame.shadows.directional.placeholder);
        assert!(frame.shadows.other.placeholder);
    }

    #[test]
    fn test_stats_exposed() {
        let mut lighting = FrameLighting::new(ShadowSettings::default());
        lighting.prepare(&StubCuller, &scene(), &FrameOptions::default());

        assert_eq!(lighting.aggregator_stats().directional, 2);
        assert_eq!(lighting.aggregator_stats().other, 3);
        assert_eq!(lighting.shadow_stats().directional_reserved, 1);
        assert_eq!(lighting.shadow_stats().other_reserved, 2);
    }
}
