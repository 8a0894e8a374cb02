//! Sparse voxel octree construction
//!
//! Data-oriented layout: `*_data.rs` files hold plain structs, the matching
//! `*_operations.rs` files (and the single-file passes) hold the kernels.
//! `pipeline` ties the passes into one ordered build.

pub mod atomic_indirect;
pub mod border;
pub mod brick_data;
pub mod brick_operations;
pub mod grid_data;
pub mod lighting;
pub mod meta_data;
pub mod meta_operations;
pub mod neighbours;
pub mod packing;
pub mod pipeline;
pub mod rasterizer;
pub mod spread;
pub mod svo_data;
pub mod svo_operations;

pub use atomic_indirect::IndirectArgs;
pub use brick_data::{BrickPool, BrickSample};
pub use grid_data::AttributeGrid;
pub use lighting::{ShadowQuery, Unshadowed};
pub use meta_data::VoxelizationMeta;
pub use pipeline::{create_shared_pass, BuildStats, SharedVoxelizationPass, VoxelizationPass};
pub use svo_data::{SvoBuffers, SvoStats};
