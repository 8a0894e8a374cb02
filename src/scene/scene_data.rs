//! Scene Data - Pure DOP
//!
//! NO METHODS. Just data.
//! All transformations happen in scene_operations.rs

use glam::{Vec3, Vec4};

/// World-space axis-aligned bounds of a scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneBounds {
    pub min: Vec3,
    pub max: Vec3,
}

/// Indexed triangle list sharing one albedo
#[derive(Debug, Clone)]
pub struct TriangleBatch {
    pub positions: Vec<Vec3>,
    /// Per-vertex normals; empty means use the face normal
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Linear RGBA in [0, 1]
    pub albedo: Vec4,
}

/// One triangle resolved from a batch, ready for rasterization
#[derive(Debug, Clone, Copy)]
pub struct SceneTriangle {
    pub positions: [Vec3; 3],
    pub normal: Vec3,
    pub albedo: Vec4,
}

/// Geometry source for voxelization.
///
/// Implementors own loading and animation; the pass only reads bounds and
/// triangles when it builds.
pub trait VoxelScene: Send + Sync {
    fn bounds(&self) -> SceneBounds;
    fn batches(&self) -> &[TriangleBatch];
}

/// Immutable in-memory scene
#[derive(Debug, Clone)]
pub struct StaticScene {
    pub bounds: SceneBounds,
    pub batches: Vec<TriangleBatch>,
}

impl VoxelScene for StaticScene {
    fn bounds(&self) -> SceneBounds {
        self.bounds
    }

    fn batches(&self) -> &[TriangleBatch] {
        &self.batches
    }
}
