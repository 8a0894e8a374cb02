//! Compute Buffer Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in buffer_operations.rs

use glam::UVec3;
use std::sync::atomic::AtomicU32;

/// Flat array of 32-bit words that kernels read and write concurrently.
///
/// Every device resource of the pipeline (counters, node arrays, queues,
/// indirect arguments) is one of these.
#[derive(Debug)]
pub struct AtomicBuffer {
    pub label: String,
    pub words: Vec<AtomicU32>,
}

/// Dense 3D texture of packed RGBA8 texels, x-major.
#[derive(Debug)]
pub struct Texture3D {
    pub label: String,
    pub dim: UVec3,
    pub texels: Vec<AtomicU32>,
}
