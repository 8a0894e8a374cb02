// SVO Builder - Data-Oriented Programming (DOP) Architecture
//
// Voxelizes a triangle scene into a sparse voxel octree with a 3x3x3 brick
// pool, the data layout used by voxel cone tracing style global illumination.
// - *_data modules hold plain data
// - *_operations modules hold pure functions and compute kernels
// - VoxelizationPass orders the kernels into one build

// Constants module
pub mod constants;

// Core modules
pub mod config;
pub mod error;

// CPU compute device (buffers, textures, dispatch)
pub mod compute;

// Scene input
pub mod scene;

// Octree construction
pub mod voxelization;

pub use compute::{AtomicBuffer, ComputeDevice, DispatchStats, Invocation, Texture3D};
pub use config::{load_config, save_config, DirectionalLight, GridSizing, VoxelizationConfig};
pub use error::{CapacityResource, OptionExt, SvoError, SvoResult};
pub use scene::{SceneBounds, SceneTriangle, StaticScene, TriangleBatch, VoxelScene};
pub use voxelization::{
    create_shared_pass, AttributeGrid, BrickPool, BrickSample, BuildStats, IndirectArgs,
    ShadowQuery, SharedVoxelizationPass, SvoBuffers, SvoStats, Unshadowed, VoxelizationMeta,
    VoxelizationPass,
};
