//! Voxelization Meta Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in meta_operations.rs

use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};

/// Build context handed to every pass.
///
/// Derived from the scene bounds and config at (re)build time; `cur_level`
/// is advanced by the orchestrator once per level iteration.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VoxelizationMeta {
    /// Grid cells per axis
    pub cell_dim: UVec3,
    /// Finest octree cells per axis (`2^total_level`)
    pub svo_dim: UVec3,
    pub world_min: Vec3,
    pub world_max: Vec3,
    pub cell_size: f32,
    pub cell_count: u32,
    pub total_level: u32,
    pub cur_level: u32,
    pub brick_pool_resolution: u32,
}

static_assertions::assert_eq_size!(VoxelizationMeta, [u8; 68]);
