//! Leaf value spreading
//!
//! Box-filters child bricks into their parent's brick, one level at a time
//! from just above the leaves up to level 1. Each parent texel averages the
//! non-empty child texels that overlap it; normals are renormalised.

use super::atomic_indirect::{self, slot};
use super::brick_data::{BrickPool, BrickSample};
use super::brick_operations::{allocate_brick, node_brick, read_brick_sample, write_brick_sample};
use super::packing::{decode_normal, pack_normal, PackedRgba8};
use super::svo_data::SvoBuffers;
use super::svo_operations::child_address;
use crate::compute::buffer_data::AtomicBuffer;
use crate::compute::buffer_operations::load;
use crate::compute::dispatch::ComputeDevice;
use crate::constants::{brick, dispatch, node};
use crate::error::SvoResult;
use glam::{UVec3, Vec3, Vec4};

/// `(child octant bit, child texel)` pairs overlapping parent texel `p`
/// along one axis
#[inline]
pub fn axis_contributions(p: u32) -> &'static [(u32, u32)] {
    match p {
        0 => &[(0, 0), (0, 1)],
        1 => &[(0, 1), (0, 2), (1, 0), (1, 1)],
        _ => &[(1, 1), (1, 2)],
    }
}

/// Mean of the non-empty RGBA8 samples, alpha forced to full
pub fn average_color(samples: &[u32]) -> Option<u32> {
    let filled: Vec<Vec4> = samples
        .iter()
        .filter(|&&s| s != 0)
        .map(|&s| PackedRgba8(s).to_vec4())
        .collect();
    if filled.is_empty() {
        return None;
    }
    let mean = filled.iter().fold(Vec4::ZERO, |acc, v| acc + *v) / filled.len() as f32;
    Some(PackedRgba8::from_vec4(mean.truncate().extend(1.0)).0)
}

/// Renormalised mean of the non-empty encoded normals
pub fn average_normal(samples: &[u32]) -> Option<u32> {
    let mut sum = Vec3::ZERO;
    let mut any = false;
    for &s in samples.iter().filter(|&&s| s != 0) {
        sum += decode_normal(PackedRgba8(s)).normalize_or_zero();
        any = true;
    }
    any.then(|| pack_normal(sum.normalize_or_zero()).0)
}

/// Filter parent texel `p` from the children's bricks
pub fn filter_parent_texel(pool: &BrickPool, children: &[Option<UVec3>; 8], p: UVec3) -> Option<BrickSample> {
    let mut colors = Vec::with_capacity(8);
    let mut normals = Vec::with_capacity(8);
    let mut irradiance = Vec::with_capacity(8);

    for &(bz, tz) in axis_contributions(p.z) {
        for &(by, ty) in axis_contributions(p.y) {
            for &(bx, tx) in axis_contributions(p.x) {
                let octant = (bx | by << 1 | bz << 2) as usize;
                if let Some(coord) = children[octant] {
                    let sample = read_brick_sample(pool, coord, UVec3::new(tx, ty, tz));
                    colors.push(sample.color);
                    normals.push(sample.normal);
                    irradiance.push(sample.irradiance);
                }
            }
        }
    }

    let color = average_color(&colors);
    let normal = average_normal(&normals);
    let irradiance = average_color(&irradiance);
    if color.is_none() && normal.is_none() && irradiance.is_none() {
        return None;
    }
    Some(BrickSample {
        color: color.unwrap_or(0),
        normal: normal.unwrap_or(0),
        irradiance: irradiance.unwrap_or(0),
    })
}

/// Fill the bricks of every subdivided node on `level`
pub fn spread_level(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    pool: &BrickPool,
    level: u32,
) -> SvoResult<()> {
    atomic_indirect::compute_range_args(device, atomic, &svo.level_address, level, svo.node_capacity);

    device.dispatch_indirect(
        "bricks.spread",
        atomic,
        slot::RANGE_ARGS,
        [dispatch::LINEAR_GROUP_SIZE, 1, 1],
        |inv| {
            let items = load(atomic, slot::RANGE_ARGS + 3).unwrap_or(0) as u64;
            if inv.linear >= items {
                return;
            }
            let address = load(atomic, slot::RANGE_ARGS + 5).unwrap_or(0) as u64 + inv.linear;
            let Some(first_child) = load(&svo.next, address as usize).and_then(child_address) else {
                return;
            };

            let mut children = [None; node::TILE_SIZE as usize];
            for (octant, child) in children.iter_mut().enumerate() {
                *child = node_brick(&svo.color, first_child + octant as u32);
            }
            if children.iter().all(Option::is_none) {
                return;
            }

            let Some(parent) = allocate_brick(atomic, pool, &svo.color, address as u32) else {
                return;
            };
            for z in 0..brick::BRICK_SIZE {
                for y in 0..brick::BRICK_SIZE {
                    for x in 0..brick::BRICK_SIZE {
                        let p = UVec3::new(x, y, z);
                        if let Some(sample) = filter_parent_texel(pool, &children, p) {
                            write_brick_sample(pool, parent, p, sample);
                        }
                    }
                }
            }
        },
    )
}

/// Spread leaf values up through levels `total_level - 1 ..= 1`
pub fn spread_leaf_values(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    pool: &BrickPool,
) -> SvoResult<()> {
    for level in (1..svo.total_level).rev() {
        spread_level(device, atomic, svo, pool, level)?;
    }
    Ok(())
}
