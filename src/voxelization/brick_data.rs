//! Brick Pool Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in brick_operations.rs

use crate::compute::buffer_data::Texture3D;

/// Three RGBA8 volumes tiled with 3x3x3 bricks.
///
/// Slot `s` lives at brick coordinate `(s % n, (s / n) % n, s / n²)` with
/// `n = bricks_per_axis`.
#[derive(Debug)]
pub struct BrickPool {
    pub color: Texture3D,
    pub normal: Texture3D,
    pub irradiance: Texture3D,
    pub bricks_per_axis: u32,
    pub capacity: u64,
}

/// All channels of one brick texel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrickSample {
    pub color: u32,
    pub normal: u32,
    pub irradiance: u32,
}
