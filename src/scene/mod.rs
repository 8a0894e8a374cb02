//! Scene input for voxelization
//!
//! The pass consumes a `VoxelScene`: world bounds plus indexed triangle
//! batches with a per-batch albedo.

pub mod scene_data;
pub mod scene_operations;

pub use scene_data::{SceneBounds, SceneTriangle, StaticScene, TriangleBatch, VoxelScene};
pub use scene_operations::{
    bounds_center, bounds_radius, box_batch, empty_scene, scene_from_batches, unit_cube_scene,
    validate_scene,
};
