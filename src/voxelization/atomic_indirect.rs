//! Atomic counters and device-computed indirect arguments
//!
//! One small buffer holds every allocation counter of the build plus three
//! indirect argument blocks. Argument blocks are written by 1x1x1 kernels so
//! the orchestrator never reads a count to size a dispatch.

use crate::compute::buffer_data::AtomicBuffer;
use crate::compute::buffer_operations::{self, create_buffer};
use crate::compute::dispatch::{linear_group_counts, ComputeDevice};
use crate::constants::{core, dispatch, node};
use crate::error::SvoResult;
use crate::voxelization::meta_operations::level_queue_offset;
use bytemuck::{Pod, Zeroable};

/// Word offsets inside the atomic/indirect buffer
pub mod slot {
    use crate::constants::core::MAX_LEVEL;

    pub const FRAGMENT_COUNT: usize = 0;
    pub const NODE_COUNT: usize = 1;
    pub const BRICK_COUNT: usize = 2;
    /// Dispatch over the fragment list
    pub const FRAGMENT_ARGS: usize = 3;
    /// Dispatch over one level's tagged queue
    pub const QUEUE_ARGS: usize = FRAGMENT_ARGS + super::INDIRECT_ARGS_WORDS;
    /// Dispatch over one level's node range
    pub const RANGE_ARGS: usize = QUEUE_ARGS + super::INDIRECT_ARGS_WORDS;
    /// Tagged node count per level, `0..=MAX_LEVEL`
    pub const TAGGED_PER_LEVEL: usize = RANGE_ARGS + super::INDIRECT_ARGS_WORDS;
    pub const LEN: usize = TAGGED_PER_LEVEL + MAX_LEVEL as usize + 1;
}

pub const INDIRECT_ARGS_WORDS: usize = 7;

/// Indirect dispatch arguments followed by the payload kernels read
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IndirectArgs {
    pub group_x: u32,
    pub group_y: u32,
    pub group_z: u32,
    pub item_count: u32,
    pub level: u32,
    pub first_node: u32,
    pub reserved: u32,
}

static_assertions::assert_eq_size!(IndirectArgs, [u8; 28]);
static_assertions::assert_eq_size!(IndirectArgs, [u32; INDIRECT_ARGS_WORDS]);

impl IndirectArgs {
    /// One harmless group and no items
    pub const INITIAL: Self = Self {
        group_x: 1,
        group_y: 1,
        group_z: 1,
        item_count: 0,
        level: 1,
        first_node: 0,
        reserved: 0,
    };
}

/// Arguments covering `item_count` invocations of a linear kernel
pub fn args_for_items(item_count: u32, level: u32, first_node: u32) -> IndirectArgs {
    let [group_x, group_y, group_z] = linear_group_counts(item_count, dispatch::LINEAR_GROUP_SIZE);
    IndirectArgs {
        group_x,
        group_y,
        group_z,
        item_count,
        level,
        first_node,
        reserved: 0,
    }
}

pub fn create_atomic_indirect_buffer() -> AtomicBuffer {
    create_buffer("svo.atomic_indirect", slot::LEN)
}

/// Zero every counter and reset all argument blocks to `INITIAL`
pub fn reset_atomic_indirect(buffer: &AtomicBuffer) -> SvoResult<()> {
    buffer_operations::clear_buffer(buffer, 0);
    for offset in [slot::FRAGMENT_ARGS, slot::QUEUE_ARGS, slot::RANGE_ARGS] {
        write_indirect_args(buffer, offset, &IndirectArgs::INITIAL)?;
    }
    Ok(())
}

pub fn write_indirect_args(buffer: &AtomicBuffer, offset: usize, args: &IndirectArgs) -> SvoResult<()> {
    let words: [u32; INDIRECT_ARGS_WORDS] = bytemuck::cast(*args);
    buffer_operations::write_words(buffer, offset, &words)
}

pub fn read_indirect_args(buffer: &AtomicBuffer, offset: usize) -> SvoResult<IndirectArgs> {
    let words = buffer_operations::read_words(buffer, offset, INDIRECT_ARGS_WORDS)?;
    let mut array = [0u32; INDIRECT_ARGS_WORDS];
    array.copy_from_slice(&words);
    Ok(bytemuck::cast(array))
}

/// Store `args` word by word from inside a kernel
fn store_args(buffer: &AtomicBuffer, offset: usize, args: &IndirectArgs) {
    let words: [u32; INDIRECT_ARGS_WORDS] = bytemuck::cast(*args);
    for (i, word) in words.iter().enumerate() {
        buffer_operations::store(buffer, offset + i, *word);
    }
}

fn load_counter(buffer: &AtomicBuffer, index: usize) -> u32 {
    buffer_operations::load(buffer, index).unwrap_or(0)
}

/// Turn the fragment counter into dispatch arguments over the fragment list.
///
/// The item count is clamped to `capacity` so kernels never read entries
/// that were refused.
pub fn compact_fragment_list(device: &mut ComputeDevice, buffer: &AtomicBuffer, capacity: u64) {
    device.dispatch("svo.compact_fragments", [1, 1, 1], [1, 1, 1], |_| {
        let count = load_counter(buffer, slot::FRAGMENT_COUNT) as u64;
        let items = count.min(capacity) as u32;
        store_args(buffer, slot::FRAGMENT_ARGS, &args_for_items(items, 0, 0));
    });
}

/// Arguments over the tagged queue of `level`
pub fn compute_queue_args(device: &mut ComputeDevice, buffer: &AtomicBuffer, level: u32) {
    device.dispatch("svo.queue_args", [1, 1, 1], [1, 1, 1], |_| {
        let tagged = load_counter(buffer, slot::TAGGED_PER_LEVEL + level as usize);
        let first = level_queue_offset(level) as u32;
        store_args(buffer, slot::QUEUE_ARGS, &args_for_items(tagged, level, first));
    });
}

/// Arguments over every node of `level`, from the level address table.
///
/// A level ends where the next level starts, or at the node counter for the
/// deepest populated level.
pub fn compute_range_args(
    device: &mut ComputeDevice,
    buffer: &AtomicBuffer,
    level_address: &AtomicBuffer,
    level: u32,
    node_capacity: u64,
) {
    device.dispatch("svo.range_args", [1, 1, 1], [1, 1, 1], |_| {
        let start = buffer_operations::load(level_address, level as usize).unwrap_or(node::NULL_ADDRESS);
        let args = if start == node::NULL_ADDRESS {
            args_for_items(0, level, 0)
        } else {
            let next = buffer_operations::load(level_address, level as usize + 1)
                .unwrap_or(node::NULL_ADDRESS);
            let allocated = (load_counter(buffer, slot::NODE_COUNT) as u64).min(node_capacity) as u32;
            let end = if next == node::NULL_ADDRESS { allocated } else { next };
            args_for_items(end.saturating_sub(start), level, start)
        };
        store_args(buffer, slot::RANGE_ARGS, &args);
    });
}

/// Atomically bump a counter, returning the previous value
#[inline]
pub fn bump(buffer: &AtomicBuffer, index: usize, amount: u32) -> u32 {
    buffer_operations::fetch_add(buffer, index, amount).unwrap_or(u32::MAX)
}

/// Tagged node count recorded for `level`
pub fn tagged_count(buffer: &AtomicBuffer, level: u32) -> u32 {
    if level > core::MAX_LEVEL {
        return 0;
    }
    load_counter(buffer, slot::TAGGED_PER_LEVEL + level as usize)
}
