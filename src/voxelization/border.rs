//! Border transfer between axis-adjacent bricks
//!
//! For a node A with a +axis neighbour B, A's +face (slice 2) receives B's
//! interior slice (1) and B's -face (slice 0) receives A's interior slice.
//! Every face texel has exactly one writer: the node on its -axis side.

use super::atomic_indirect::{self, slot};
use super::brick_data::BrickPool;
use super::brick_operations::{node_brick, read_brick_sample, write_brick_sample};
use super::svo_data::SvoBuffers;
use crate::compute::buffer_data::AtomicBuffer;
use crate::compute::buffer_operations::load;
use crate::compute::dispatch::ComputeDevice;
use crate::constants::{brick, dispatch, node};
use crate::error::SvoResult;
use glam::UVec3;

/// Texel at `slice` along `axis`, `(u, v)` across the face
#[inline]
pub fn face_texel(axis: usize, slice: u32, u: u32, v: u32) -> UVec3 {
    let mut texel = UVec3::ZERO;
    texel[axis] = slice;
    texel[(axis + 1) % 3] = u;
    texel[(axis + 2) % 3] = v;
    texel
}

/// Copy faces along `axis` for every node of `level`
pub fn transfer_level_axis(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    pool: &BrickPool,
    level: u32,
    axis: usize,
) -> SvoResult<()> {
    atomic_indirect::compute_range_args(device, atomic, &svo.level_address, level, svo.node_capacity);

    let label = ["bricks.border_x", "bricks.border_y", "bricks.border_z"][axis];
    device.dispatch_indirect(
        label,
        atomic,
        slot::RANGE_ARGS,
        [dispatch::LINEAR_GROUP_SIZE, 1, 1],
        |inv| {
            let items = load(atomic, slot::RANGE_ARGS + 3).unwrap_or(0) as u64;
            if inv.linear >= items {
                return;
            }
            let address = (load(atomic, slot::RANGE_ARGS + 5).unwrap_or(0) as u64 + inv.linear) as u32;
            let Some(own) = node_brick(&svo.color, address) else {
                return;
            };
            let neighbour = load(&svo.neighbours[axis], address as usize).unwrap_or(node::NULL_ADDRESS);
            if neighbour == node::NULL_ADDRESS {
                return;
            }
            let Some(other) = node_brick(&svo.color, neighbour) else {
                return;
            };

            let last = brick::BRICK_SIZE - 1;
            for v in 0..brick::BRICK_SIZE {
                for u in 0..brick::BRICK_SIZE {
                    let inward = read_brick_sample(pool, other, face_texel(axis, 1, u, v));
                    let outward = read_brick_sample(pool, own, face_texel(axis, 1, u, v));
                    write_brick_sample(pool, own, face_texel(axis, last, u, v), inward);
                    write_brick_sample(pool, other, face_texel(axis, 0, u, v), outward);
                }
            }
        },
    )
}

/// Exchange borders on levels `total_level ..= 1`, axes X, Y, Z in turn
pub fn transfer_borders(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    pool: &BrickPool,
) -> SvoResult<()> {
    for level in (1..=svo.total_level).rev() {
        for axis in 0..3 {
            transfer_level_axis(device, atomic, svo, pool, level, axis)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_texel() {
        assert_eq!(face_texel(0, 2, 1, 0), UVec3::new(2, 1, 0));
        assert_eq!(face_texel(1, 0, 1, 2), UVec3::new(2, 0, 1));
        assert_eq!(face_texel(2, 1, 0, 2), UVec3::new(0, 2, 1));
    }
}
