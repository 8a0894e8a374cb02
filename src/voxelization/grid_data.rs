//! Attribute Grid Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in rasterizer.rs

use crate::compute::buffer_data::{AtomicBuffer, Texture3D};

/// Dense voxelization output.
///
/// A texel of `albedo` is non-zero exactly when `fragments` holds one entry
/// for that cell.
#[derive(Debug)]
pub struct AttributeGrid {
    /// RGBA8 running average, alpha counts contributing triangles
    pub albedo: Texture3D,
    /// Encoded normal running average, same alpha convention
    pub normal: Texture3D,
    /// Packed positions of touched cells
    pub fragments: AtomicBuffer,
    pub fragment_capacity: u64,
}
