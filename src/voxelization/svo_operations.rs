//! Sparse Voxel Octree Operations - Pure DOP Functions
//!
//! Node encoding helpers, descent from the root tile, and the tag and
//! subdivide kernels that grow the octree one level at a time.

use super::atomic_indirect::{self, slot};
use super::meta_data::VoxelizationMeta;
use super::meta_operations::{level_node_capacity, level_queue_offset, node_capacity};
use super::packing::unpack_position;
use super::svo_data::{SvoBuffers, SvoStats};
use crate::compute::buffer_data::AtomicBuffer;
use crate::compute::buffer_operations::{self, clear_buffer, create_buffer, load};
use crate::compute::dispatch::ComputeDevice;
use crate::constants::{dispatch, node};
use crate::error::SvoResult;
use glam::UVec3;
use std::sync::atomic::Ordering;

/// Allocate node, level and queue buffers for `meta.total_level`
pub fn create_svo_buffers(meta: &VoxelizationMeta) -> SvoBuffers {
    // child pointers are 30 bits wide
    let capacity = node_capacity(meta.total_level).min(node::CHILD_MASK as u64 + 1);
    let len = capacity as usize;
    log::debug!(
        "[create_svo_buffers] total_level={} node_capacity={}",
        meta.total_level,
        capacity
    );

    SvoBuffers {
        next: create_buffer("svo.next", len),
        color: create_buffer("svo.color", len),
        level_address: create_buffer("svo.level_address", meta.total_level as usize + 2),
        neighbours: [
            create_buffer("svo.neighbour_x", len),
            create_buffer("svo.neighbour_y", len),
            create_buffer("svo.neighbour_z", len),
        ],
        tagged_queue: create_buffer("svo.tagged_queue", len),
        node_capacity: capacity,
        total_level: meta.total_level,
    }
}

/// Reset every buffer to its pre-build state
pub fn clear_svo_buffers(svo: &SvoBuffers) {
    clear_buffer(&svo.next, 0);
    clear_buffer(&svo.color, 0);
    clear_buffer(&svo.level_address, node::NULL_ADDRESS);
    for links in &svo.neighbours {
        clear_buffer(links, node::NULL_ADDRESS);
    }
    clear_buffer(&svo.tagged_queue, 0);
}

#[inline]
pub fn is_tagged(next: u32) -> bool {
    next & node::TAG_BIT != 0
}

/// First child of the node's tile, `None` when not subdivided
#[inline]
pub fn child_address(next: u32) -> Option<u32> {
    match next & node::CHILD_MASK {
        0 => None,
        address => Some(address),
    }
}

#[inline]
pub fn has_brick(color: u32) -> bool {
    color & node::BRICK_BIT != 0
}

/// Octant (x bit 0, y bit 1, z bit 2) of `cell` inside its level-`level`
/// parent
#[inline]
pub fn octant_at_level(cell: UVec3, level: u32, total_level: u32) -> u32 {
    let shift = total_level - level;
    ((cell.x >> shift) & 1) | ((cell.y >> shift) & 1) << 1 | ((cell.z >> shift) & 1) << 2
}

/// Address of the level-`level` node containing finest cell `cell`.
///
/// `None` when an ancestor is not subdivided or `level` is out of range.
pub fn descend(svo: &SvoBuffers, cell: UVec3, level: u32) -> Option<u32> {
    if level == 0 || level > svo.total_level {
        return None;
    }

    let mut address = octant_at_level(cell, 1, svo.total_level);
    for depth in 2..=level {
        let first_child = child_address(load(&svo.next, address as usize)?)?;
        address = first_child + octant_at_level(cell, depth, svo.total_level);
    }
    Some(address)
}

/// Allocate the root's child tile: nodes 0..8 and level 1's address
pub fn subdivide_root(device: &mut ComputeDevice, atomic: &AtomicBuffer, svo: &SvoBuffers) {
    device.dispatch("svo.subdivide_root", [1, 1, 1], [1, 1, 1], |_| {
        let base = atomic_indirect::bump(atomic, slot::NODE_COUNT, node::TILE_SIZE);
        if base as u64 + node::TILE_SIZE as u64 > svo.node_capacity {
            return;
        }
        if let Some(first) = buffer_operations::word(&svo.level_address, 1) {
            first.fetch_min(base, Ordering::AcqRel);
        }
    });
}

/// Tag every level-`level` node that contains a fragment.
///
/// The invocation that sets a node's tag bit appends it to the level's
/// region of the tagged queue.
pub fn tag_level(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    fragments: &AtomicBuffer,
    level: u32,
) -> SvoResult<()> {
    let queue_base = level_queue_offset(level);
    let queue_limit = level_node_capacity(level);

    device.dispatch_indirect(
        "svo.tag",
        atomic,
        slot::FRAGMENT_ARGS,
        [dispatch::LINEAR_GROUP_SIZE, 1, 1],
        |inv| {
            let items = load(atomic, slot::FRAGMENT_ARGS + 3).unwrap_or(0) as u64;
            if inv.linear >= items {
                return;
            }
            let Some(packed) = load(fragments, inv.linear as usize) else {
                return;
            };
            let Some(address) = descend(svo, unpack_position(packed), level) else {
                return;
            };
            let Some(entry) = buffer_operations::word(&svo.next, address as usize) else {
                return;
            };

            if entry.fetch_or(node::TAG_BIT, Ordering::AcqRel) & node::TAG_BIT == 0 {
                let index = atomic_indirect::bump(atomic, slot::TAGGED_PER_LEVEL + level as usize, 1);
                if (index as u64) < queue_limit {
                    buffer_operations::store(
                        &svo.tagged_queue,
                        (queue_base + index as u64) as usize,
                        address,
                    );
                }
            }
        },
    )
}

/// Give every tagged node of `level` a tile of 8 children
pub fn subdivide_level(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    level: u32,
) -> SvoResult<()> {
    atomic_indirect::compute_queue_args(device, atomic, level);

    device.dispatch_indirect(
        "svo.subdivide",
        atomic,
        slot::QUEUE_ARGS,
        [dispatch::LINEAR_GROUP_SIZE, 1, 1],
        |inv| {
            let items = load(atomic, slot::QUEUE_ARGS + 3).unwrap_or(0) as u64;
            if inv.linear >= items {
                return;
            }
            let first = load(atomic, slot::QUEUE_ARGS + 5).unwrap_or(0) as u64;
            let Some(address) = load(&svo.tagged_queue, (first + inv.linear) as usize) else {
                return;
            };

            let base = atomic_indirect::bump(atomic, slot::NODE_COUNT, node::TILE_SIZE);
            if base as u64 + node::TILE_SIZE as u64 > svo.node_capacity {
                return;
            }
            if let Some(entry) = buffer_operations::word(&svo.next, address as usize) {
                entry.fetch_or(base, Ordering::AcqRel);
            }
            if let Some(next_level) = buffer_operations::word(&svo.level_address, level as usize + 1) {
                next_level.fetch_min(base, Ordering::AcqRel);
            }
        },
    )
}

/// Addresses of all nodes allocated on `level`, read back from the level
/// address table
pub fn level_node_range(svo: &SvoBuffers, atomic: &AtomicBuffer, level: u32) -> std::ops::Range<u32> {
    let start = load(&svo.level_address, level as usize).unwrap_or(node::NULL_ADDRESS);
    if start == node::NULL_ADDRESS {
        return 0..0;
    }
    let allocated = (load(atomic, slot::NODE_COUNT).unwrap_or(0) as u64).min(svo.node_capacity) as u32;
    let end = match load(&svo.level_address, level as usize + 1) {
        Some(next) if next != node::NULL_ADDRESS => next,
        _ => allocated,
    };
    start..end.max(start)
}

/// Tagged nodes of `level` with their node coordinate at that level,
/// found by walking down from the root tile
pub fn tagged_nodes(svo: &SvoBuffers, level: u32) -> Vec<(UVec3, u32)> {
    let mut found = Vec::new();
    if level == 0 || level > svo.total_level {
        return found;
    }

    let mut stack: Vec<(UVec3, u32, u32)> = (0..node::TILE_SIZE)
        .map(|octant| (octant_offset(octant), octant, 1))
        .collect();

    while let Some((coord, address, depth)) = stack.pop() {
        let Some(next) = load(&svo.next, address as usize) else {
            continue;
        };
        if !is_tagged(next) {
            continue;
        }
        if depth == level {
            found.push((coord, address));
            continue;
        }
        if let Some(first) = child_address(next) {
            for octant in 0..node::TILE_SIZE {
                stack.push((coord * 2 + octant_offset(octant), first + octant, depth + 1));
            }
        }
    }

    found.sort_by_key(|(coord, _)| (coord.z, coord.y, coord.x));
    found
}

#[inline]
pub fn octant_offset(octant: u32) -> UVec3 {
    UVec3::new(octant & 1, (octant >> 1) & 1, (octant >> 2) & 1)
}

/// Octree statistics
pub fn get_stats(svo: &SvoBuffers, atomic: &AtomicBuffer) -> SvoStats {
    let total_nodes = load(atomic, slot::NODE_COUNT).unwrap_or(0);
    let mut tagged_per_level = vec![1];
    tagged_per_level.extend((1..=svo.total_level).map(|level| atomic_indirect::tagged_count(atomic, level)));

    SvoStats {
        total_nodes,
        node_capacity: svo.node_capacity,
        tagged_per_level,
    }
}
