//! Brick Pool Operations - Pure DOP Functions
//!
//! Slot allocation gated on the node's color entry, the leaf writer and
//! texel access for consumers.

use super::atomic_indirect::{self, slot};
use super::brick_data::{BrickPool, BrickSample};
use super::grid_data::AttributeGrid;
use super::lighting::{inject_irradiance, ShadowQuery};
use super::meta_data::VoxelizationMeta;
use super::meta_operations::{brick_capacity, bricks_per_axis, cell_center_world};
use super::packing::{decode_normal, pack_brick_coord, unpack_brick_coord, unpack_position, PackedRgba8};
use super::svo_data::SvoBuffers;
use super::svo_operations::{descend, has_brick};
use crate::compute::buffer_data::AtomicBuffer;
use crate::compute::buffer_operations::{self, clear_texture, create_texture_3d, load, texture_load, texture_store};
use crate::compute::dispatch::ComputeDevice;
use crate::config::DirectionalLight;
use crate::constants::{brick, dispatch, node};
use crate::error::SvoResult;
use glam::UVec3;
use std::sync::atomic::Ordering;

/// Centre texel of a brick; leaves store their sample here
pub const BRICK_CENTER: UVec3 = UVec3::new(1, 1, 1);

pub fn create_brick_pool(meta: &VoxelizationMeta) -> BrickPool {
    let dim = UVec3::splat(meta.brick_pool_resolution);
    BrickPool {
        color: create_texture_3d("bricks.color", dim),
        normal: create_texture_3d("bricks.normal", dim),
        irradiance: create_texture_3d("bricks.irradiance", dim),
        bricks_per_axis: bricks_per_axis(meta),
        capacity: brick_capacity(meta),
    }
}

pub fn clear_brick_pool(pool: &BrickPool) {
    clear_texture(&pool.color);
    clear_texture(&pool.normal);
    clear_texture(&pool.irradiance);
}

/// Brick coordinate of slot `slot`
#[inline]
pub fn slot_to_brick(slot: u32, bricks_per_axis: u32) -> UVec3 {
    let n = bricks_per_axis.max(1);
    UVec3::new(slot % n, (slot / n) % n, slot / (n * n))
}

/// First texel of a brick in the pool volumes
#[inline]
pub fn brick_origin(coord: UVec3) -> UVec3 {
    coord * brick::BRICK_SIZE
}

/// Brick of `node`, if one has been allocated
pub fn node_brick(color: &AtomicBuffer, node: u32) -> Option<UVec3> {
    let entry = load(color, node as usize)?;
    has_brick(entry).then(|| unpack_brick_coord(entry & node::BRICK_MASK))
}

/// Give `node` a brick slot unless it already has one.
///
/// The color entry moves `0 -> PENDING -> BRICK | coord`, so a node never
/// receives two slots. When the pool is full the counter still advances
/// and the entry returns to 0.
pub fn allocate_brick(atomic: &AtomicBuffer, pool: &BrickPool, color: &AtomicBuffer, node: u32) -> Option<UVec3> {
    let entry = buffer_operations::word(color, node as usize)?;
    match entry.compare_exchange(0, node::BRICK_PENDING, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => {
            let slot = atomic_indirect::bump(atomic, slot::BRICK_COUNT, 1);
            if slot as u64 >= pool.capacity {
                entry.store(0, Ordering::Release);
                return None;
            }
            let coord = slot_to_brick(slot, pool.bricks_per_axis);
            entry.store(node::BRICK_BIT | pack_brick_coord(coord), Ordering::Release);
            Some(coord)
        }
        Err(current) if has_brick(current) => Some(unpack_brick_coord(current & node::BRICK_MASK)),
        Err(_) => None,
    }
}

/// All channels of one texel of the brick at `coord`
pub fn read_brick_sample(pool: &BrickPool, coord: UVec3, offset: UVec3) -> BrickSample {
    let texel = brick_origin(coord) + offset;
    BrickSample {
        color: texture_load(&pool.color, texel).unwrap_or(0),
        normal: texture_load(&pool.normal, texel).unwrap_or(0),
        irradiance: texture_load(&pool.irradiance, texel).unwrap_or(0),
    }
}

pub fn write_brick_sample(pool: &BrickPool, coord: UVec3, offset: UVec3, sample: BrickSample) {
    let texel = brick_origin(coord) + offset;
    texture_store(&pool.color, texel, sample.color);
    texture_store(&pool.normal, texel, sample.normal);
    texture_store(&pool.irradiance, texel, sample.irradiance);
}

/// Texel `offset` of `node`'s brick, `None` if the node has no brick
pub fn brick_texel(pool: &BrickPool, color: &AtomicBuffer, node: u32, offset: UVec3) -> Option<BrickSample> {
    if offset.cmpge(UVec3::splat(brick::BRICK_SIZE)).any() {
        return None;
    }
    node_brick(color, node).map(|coord| read_brick_sample(pool, coord, offset))
}

/// Allocate a brick for every tagged node of the leaf level
pub fn allocate_leaf_bricks(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    pool: &BrickPool,
    leaf_level: u32,
) -> SvoResult<()> {
    atomic_indirect::compute_queue_args(device, atomic, leaf_level);

    device.dispatch_indirect(
        "bricks.allocate_leaves",
        atomic,
        slot::QUEUE_ARGS,
        [dispatch::LINEAR_GROUP_SIZE, 1, 1],
        |inv| {
            let items = load(atomic, slot::QUEUE_ARGS + 3).unwrap_or(0) as u64;
            if inv.linear >= items {
                return;
            }
            let first = load(atomic, slot::QUEUE_ARGS + 5).unwrap_or(0) as u64;
            if let Some(address) = load(&svo.tagged_queue, (first + inv.linear) as usize) {
                allocate_brick(atomic, pool, &svo.color, address);
            }
        },
    )
}

/// Write albedo, normal and injected irradiance of every fragment into the
/// centre texel of its leaf's brick
#[allow(clippy::too_many_arguments)]
pub fn write_leaf_values(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    svo: &SvoBuffers,
    grid: &AttributeGrid,
    pool: &BrickPool,
    meta: &VoxelizationMeta,
    light: &DirectionalLight,
    shadow: &dyn ShadowQuery,
) -> SvoResult<()> {
    device.dispatch_indirect(
        "bricks.write_leaves",
        atomic,
        slot::FRAGMENT_ARGS,
        [dispatch::LINEAR_GROUP_SIZE, 1, 1],
        |inv| {
            let items = load(atomic, slot::FRAGMENT_ARGS + 3).unwrap_or(0) as u64;
            if inv.linear >= items {
                return;
            }
            let Some(packed) = load(&grid.fragments, inv.linear as usize) else {
                return;
            };
            let cell = unpack_position(packed);
            let Some(coord) = descend(svo, cell, meta.total_level).and_then(|leaf| node_brick(&svo.color, leaf)) else {
                return;
            };

            let albedo_texel = PackedRgba8(texture_load(&grid.albedo, cell).unwrap_or(0));
            let normal_texel = PackedRgba8(texture_load(&grid.normal, cell).unwrap_or(0));
            let [r, g, b, _] = albedo_texel.channels();
            let [nx, ny, nz, _] = normal_texel.channels();

            let albedo = albedo_texel.to_vec4().truncate().extend(1.0);
            let normal = decode_normal(normal_texel).normalize_or_zero();
            let visibility = shadow.visibility(cell_center_world(meta, cell), normal);
            let irradiance = inject_irradiance(albedo, normal, light, visibility);

            write_brick_sample(
                pool,
                coord,
                BRICK_CENTER,
                BrickSample {
                    color: PackedRgba8::new(r, g, b, 255).0,
                    normal: PackedRgba8::new(nx, ny, nz, 255).0,
                    irradiance: PackedRgba8::from_vec4(irradiance).0,
                },
            );
        },
    )
}
