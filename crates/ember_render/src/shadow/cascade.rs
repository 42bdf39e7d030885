//! Cascade Table Derivation
//!
//! Converts the culling provider's cascade spheres into the packed form
//! the shading stage samples: a filter-shrunk squared-radius sphere plus
//! the penumbra filter footprint, and the global distance-fade terms.

use glam::Vec4;

use super::config::PcfFilter;

/// Packed entry of the global cascade table
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeEntry {
    /// xyz = sphere center, w = squared radius after shrinking by the
    /// filter footprint
    pub culling_sphere: Vec4,
    /// x = 1 / squared radius, y = world-space filter footprint scaled by
    /// the diagonal
    pub data: Vec4,
}

/// Derive one cascade entry from a culling sphere
///
/// The sphere radius is shrunk by the filter footprint so samples near the
/// cascade edge never read outside the rendered region, then squared so
/// the shader compares against squared distances.
pub fn cascade_entry(culling_sphere: Vec4, tile_size: f32, filter: PcfFilter) -> CascadeEntry {
    let texel_size = 2.0 * culling_sphere.w / tile_size;
    let filter_size = texel_size * filter.kernel_scale();

    let radius = culling_sphere.w - filter_size;
    let radius_sq = radius * radius;

    CascadeEntry {
        culling_sphere: Vec4::new(
            culling_sphere.x,
            culling_sphere.y,
            culling_sphere.z,
            radius_sq,
        ),
        data: Vec4::new(1.0 / radius_sq, filter_size * core::f32::consts::SQRT_2, 0.0, 0.0),
    }
}

/// Distance-fade terms for the shading stage
///
/// x = 1 / max distance, y = 1 / fade fraction, z = 1 / (1 - f^2) with
/// f = 1 - cascade fade, used to fade out the last cascade.
pub fn distance_fade(max_distance: f32, distance_fade: f32, cascade_fade: f32) -> Vec4 {
    let f = 1.0 - cascade_fade;
    Vec4::new(
        1.0 / max_distance,
        1.0 / distance_fade,
        1.0 / (1.0 - f * f),
        0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_entry_shrinks_and_squares() {
        let sphere = Vec4::new(1.0, 2.0, 3.0, 10.0);
        let entry = cascade_entry(sphere, 512.0, PcfFilter::Pcf2x2);

        let texel = 2.0 * 10.0 / 512.0;
        let shrunk = 10.0 - texel;
        assert_eq!(entry.culling_sphere.x, 1.0);
        assert!((entry.culling_sphere.w - shrunk * shrunk).abs() < 1e-4);
        assert!((entry.data.x - 1.0 / (shrunk * shrunk)).abs() < 1e-7);
        assert!((entry.data.y - texel * core::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_cascade_entry_filter_widens_footprint() {
        let sphere = Vec4::new(0.0, 0.0, 0.0, 10.0);
        let narrow = cascade_entry(sphere, 512.0, PcfFilter::Pcf2x2);
        let wide = cascade_entry(sphere, 512.0, PcfFilter::Pcf7x7);

        assert!(wide.data.y > narrow.data.y);
        // Wider filters shrink the usable sphere further.
        assert!(wide.culling_sphere.w < narrow.culling_sphere.w);
    }

    #[test]
    fn test_distance_fade_terms() {
        let fade = distance_fade(100.0, 0.1, 0.1);
        assert!((fade.x - 0.01).abs() < 1e-7);
        assert!((fade.y - 10.0).abs() < 1e-5);
        // f = 0.9, 1 / (1 - 0.81)
        assert!((fade.z - 1.0 / 0.19).abs() < 1e-4);
        assert_eq!(fade.w, 0.0);
    }
}
