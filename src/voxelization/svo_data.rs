//! Sparse Voxel Octree Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in svo_operations.rs

use crate::compute::buffer_data::AtomicBuffer;

/// Device buffers describing the octree topology.
///
/// Nodes 0..8 are the children of the implicit root. `next[n]` holds the tag
/// bit and the first child of `n`'s tile, `color[n]` the brick pointer.
#[derive(Debug)]
pub struct SvoBuffers {
    pub next: AtomicBuffer,
    pub color: AtomicBuffer,
    /// First node address of each level `0..=total_level`, plus one trailing
    /// entry that stays unassigned
    pub level_address: AtomicBuffer,
    /// Same-depth neighbour along +X, +Y, +Z
    pub neighbours: [AtomicBuffer; 3],
    /// Tagged nodes; level `l` owns entries `[Σ_{i<l} 8^i, Σ_{i<=l} 8^i)`
    pub tagged_queue: AtomicBuffer,
    pub node_capacity: u64,
    pub total_level: u32,
}

/// Octree statistics
#[derive(Debug, Clone, PartialEq)]
pub struct SvoStats {
    pub total_nodes: u32,
    pub node_capacity: u64,
    /// Tagged nodes per level; entry 0 is the implicit root
    pub tagged_per_level: Vec<u32>,
}
