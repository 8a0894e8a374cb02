//! Neighbour linking
//!
//! For every node holding a fragment, record the same-depth node one step
//! along +X, +Y and +Z, or `NULL_ADDRESS` when the neighbour is outside the
//! grid or one of its ancestors was never subdivided.

use super::atomic_indirect::slot;
use super::packing::unpack_position;
use super::svo_data::SvoBuffers;
use super::svo_operations::descend;
use crate::compute::buffer_data::AtomicBuffer;
use crate::compute::buffer_operations::{load, store};
use crate::compute::dispatch::ComputeDevice;
use crate::constants::{dispatch, node};
use crate::error::SvoResult;
use glam::UVec3;

/// Finest-cell origin of the level-`level` node one step along `axis`
pub fn neighbour_cell(cell: UVec3, level: u32, total_level: u32, axis: usize) -> Option<UVec3> {
    let shift = total_level - level;
    let mut neighbour = (cell >> shift) << shift;
    let stepped = neighbour[axis].checked_add(1 << shift)?;
    if stepped >= 1 << total_level {
        return None;
    }
    neighbour[axis] = stepped;
    Some(neighbour)
}

/// Same-depth neighbour address of the node containing `cell`
pub fn find_neighbour(svo: &SvoBuffers, cell: UVec3, level: u32, axis: usize) -> u32 {
    neighbour_cell(cell, level, svo.total_level, axis)
        .and_then(|n| descend(svo, n, level))
        .unwrap_or(node::NULL_ADDRESS)
}

/// Link the level-`level` nodes touched by fragments to their neighbours
pub fn link_neighbours(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    fragments: &AtomicBuffer,
    level: u32,
) -> SvoResult<()> {
    device.dispatch_indirect(
        "svo.link_neighbours",
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
            let cell = unpack_position(packed);
            let Some(address) = descend(svo, cell, level) else {
                return;
            };

            for (axis, links) in svo.neighbours.iter().enumerate() {
                store(links, address as usize, find_neighbour(svo, cell, level, axis));
            }
        },
    )
}
