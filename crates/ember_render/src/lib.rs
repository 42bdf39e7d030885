//! # ember_render - Per-Frame Light and Shadow Preparation
//!
//! Backend-agnostic frame preparation for a forward shading pipeline:
//!
//! - Light aggregation into fixed-capacity uniform arrays
//! - Two-phase shadow atlas allocation (reserve, then render)
//! - Cascaded directional shadows, spot and point (cube face) tiles
//! - Atlas-space matrix remapping with reversed-Z support
//!
//! ## Architecture
//!
//! Each frame runs the same sequence:
//!
//! 1. The host's culling pass produces an ordered [`VisibleLight`] list.
//! 2. [`LightAggregator`] consumes it, filling the light uniform block
//!    and reserving shadow space per eligible light through
//!    [`ShadowMapper`].
//! 3. [`ShadowMapper::render`] packs both atlases and emits the tile
//!    draws and the shadow uniform block.
//!
//! [`FrameLighting`] wraps the sequence behind one call.
//!
//! ## Example
//!
//! ```ignore
//! use ember_render::prelude::*;
//!
//! let mut lighting = FrameLighting::new(ShadowSettings::default());
//!
//! // Once per frame:
//! let frame = lighting.prepare(&culler, &visible_lights, &FrameOptions::default());
//!
//! // Upload frame.lights / frame.shadows.uniforms, then rasterize
//! // frame.shadows.directional.draws and frame.shadows.other.draws.
//! ```
//!
//! Rasterization, the culling math behind [`ShadowCuller`], and the image
//! pipeline after shading are out of scope; this crate only prepares the
//! data they exchange.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod culling;
pub mod frame;
pub mod light;
pub mod lights;
pub mod shadow;
pub mod uniform;

pub use culling::{CasterBounds, CubeFace, ShadowCuller, ShadowSplit};
pub use frame::{FrameLighting, FrameOptions, PreparedFrame};
pub use light::{BakedShadowing, LightKind, ShadowMode, VisibleLight};
pub use lights::{
    AggregatorStats, GpuLightUniforms, LightAggregator, MAX_DIRECTIONAL_LIGHTS, MAX_OTHER_LIGHTS,
    UNSELECTED_LIGHT,
};
pub use shadow::{
    AtlasKind, AtlasPass, GpuShadowUniforms, ShaderVariants, ShadowError, ShadowFrame,
    ShadowMapper, ShadowMaskVariant, ShadowSettings, ShadowStats, TileDraw,
};
pub use uniform::UniformField;

/// Commonly used types
pub mod prelude {
    pub use crate::culling::{CasterBounds, CubeFace, ShadowCuller, ShadowSplit};
    pub use crate::frame::{FrameLighting, FrameOptions, PreparedFrame};
    pub use crate::light::{LightKind, ShadowMode, VisibleLight};
    pub use crate::lights::{GpuLightUniforms, LightAggregator};
    pub use crate::shadow::{
        GpuShadowUniforms, ShadowFrame, ShadowMapper, ShadowSettings, TileDraw,
    };
}
