//! Kernel dispatch on the CPU compute device
//!
//! A dispatch runs one kernel invocation per thread of a
//! `group_count * group_size` grid, in parallel, and returns once every
//! invocation has finished. Passes issued one after another therefore observe
//! each other's writes in program order, the same guarantee a single in-order
//! command stream gives on an accelerator.

use super::buffer_data::AtomicBuffer;
use super::buffer_operations;
use crate::constants::dispatch::MAX_GROUPS_PER_DIMENSION;
use crate::error::{SvoError, SvoResult};
use glam::UVec3;
use rayon::prelude::*;

/// Identity of one kernel invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub global_id: UVec3,
    /// x-major flattening of `global_id` over the full dispatch grid
    pub linear: u64,
}

/// Counters accumulated by the device since the last reset
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    pub dispatches: u32,
    pub indirect_dispatches: u32,
    pub invocations: u64,
}

/// Executes kernels over invocation grids
#[derive(Debug, Default)]
pub struct ComputeDevice {
    stats: DispatchStats,
}

impl ComputeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = DispatchStats::default();
    }

    /// Run `kernel` once per invocation of the grid
    pub fn dispatch<F>(&mut self, label: &str, group_count: [u32; 3], group_size: [u32; 3], kernel: F)
    where
        F: Fn(Invocation) + Sync + Send,
    {
        let width = group_count[0] as u64 * group_size[0] as u64;
        let height = group_count[1] as u64 * group_size[1] as u64;
        let depth = group_count[2] as u64 * group_size[2] as u64;
        let total = width * height * depth;

        self.stats.dispatches += 1;
        self.stats.invocations += total;

        log::debug!(
            "[ComputeDevice::dispatch] '{}' groups={:?} size={:?} invocations={}",
            label,
            group_count,
            group_size,
            total
        );

        if total == 0 {
            return;
        }

        (0..total as usize)
            .into_par_iter()
            .with_min_len(256)
            .for_each(|index| {
                let linear = index as u64;
                let x = linear % width;
                let y = (linear / width) % height;
                let z = linear / (width * height);
                kernel(Invocation {
                    global_id: UVec3::new(x as u32, y as u32, z as u32),
                    linear,
                });
            });
    }

    /// Run `kernel` with the group counts stored in `args` at word `offset`.
    ///
    /// The counts are read when the dispatch is issued, so they may be the
    /// output of the previous kernel.
    pub fn dispatch_indirect<F>(
        &mut self,
        label: &str,
        args: &AtomicBuffer,
        offset: usize,
        group_size: [u32; 3],
        kernel: F,
    ) -> SvoResult<()>
    where
        F: Fn(Invocation) + Sync + Send,
    {
        let words = buffer_operations::read_words(args, offset, 3).map_err(|_| {
            SvoError::IndirectArgsOutOfRange {
                label: args.label.clone(),
                offset,
            }
        })?;

        let group_count = [words[0], words[1], words[2]];
        if group_count.iter().any(|&g| g > MAX_GROUPS_PER_DIMENSION) {
            log::error!(
                "[ComputeDevice::dispatch_indirect] '{}' read invalid group counts {:?} from '{}'",
                label,
                group_count,
                args.label
            );
            return Err(SvoError::IndirectArgsOutOfRange {
                label: args.label.clone(),
                offset,
            });
        }

        self.stats.indirect_dispatches += 1;
        self.dispatch(label, group_count, group_size, kernel);
        Ok(())
    }
}

/// Group counts covering `item_count` invocations of a linear kernel.
///
/// Never returns a zero count; oversized X spills into Y.
pub fn linear_group_counts(item_count: u32, group_size: u32) -> [u32; 3] {
    let groups = item_count.div_ceil(group_size.max(1)).max(1);
    if groups <= MAX_GROUPS_PER_DIMENSION {
        [groups, 1, 1]
    } else {
        [
            MAX_GROUPS_PER_DIMENSION,
            groups.div_ceil(MAX_GROUPS_PER_DIMENSION),
            1,
        ]
    }
}
