//! Scene Operations - Pure DOP Functions
//!
//! Bounds math, batch validation and a few canned scenes.

use super::scene_data::{SceneBounds, SceneTriangle, StaticScene, TriangleBatch, VoxelScene};
use crate::error::{SvoError, SvoResult};
use glam::{Vec3, Vec4};

/// Create bounds from min/max corners
pub fn create_bounds(min: Vec3, max: Vec3) -> SceneBounds {
    SceneBounds { min, max }
}

/// Tightest bounds around `points`, `None` when empty
pub fn bounds_from_points(points: impl IntoIterator<Item = Vec3>) -> Option<SceneBounds> {
    let mut iter = points.into_iter();
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
    Some(SceneBounds { min, max })
}

pub fn bounds_center(bounds: &SceneBounds) -> Vec3 {
    (bounds.min + bounds.max) * 0.5
}

pub fn bounds_extent(bounds: &SceneBounds) -> Vec3 {
    bounds.max - bounds.min
}

/// Radius of the bounding sphere around the box
pub fn bounds_radius(bounds: &SceneBounds) -> f32 {
    bounds_extent(bounds).length() * 0.5
}

/// Reject non-finite or inverted bounds
pub fn validate_bounds(bounds: &SceneBounds) -> SvoResult<()> {
    if !bounds.min.is_finite() || !bounds.max.is_finite() {
        return Err(SvoError::InvalidScene {
            reason: format!("non-finite bounds {:?}..{:?}", bounds.min, bounds.max),
        });
    }
    if bounds.min.cmpgt(bounds.max).any() {
        return Err(SvoError::InvalidScene {
            reason: format!("inverted bounds {:?}..{:?}", bounds.min, bounds.max),
        });
    }
    Ok(())
}

/// Check index count, index range and normal count of a batch
pub fn validate_batch(batch: &TriangleBatch) -> SvoResult<()> {
    if batch.indices.len() % 3 != 0 {
        return Err(SvoError::InvalidScene {
            reason: format!("index count {} is not a multiple of 3", batch.indices.len()),
        });
    }
    if !batch.normals.is_empty() && batch.normals.len() != batch.positions.len() {
        return Err(SvoError::InvalidScene {
            reason: format!(
                "{} normals for {} positions",
                batch.normals.len(),
                batch.positions.len()
            ),
        });
    }
    if let Some(&bad) = batch
        .indices
        .iter()
        .find(|&&i| i as usize >= batch.positions.len())
    {
        return Err(SvoError::InvalidScene {
            reason: format!("index {} out of range for {} positions", bad, batch.positions.len()),
        });
    }
    Ok(())
}

/// Validate bounds and every batch of a scene
pub fn validate_scene(scene: &dyn VoxelScene) -> SvoResult<()> {
    validate_bounds(&scene.bounds())?;
    for batch in scene.batches() {
        validate_batch(batch)?;
    }
    Ok(())
}

pub fn triangle_count(batch: &TriangleBatch) -> usize {
    batch.indices.len() / 3
}

/// Resolve triangle `index` of `batch`
pub fn batch_triangle(batch: &TriangleBatch, index: usize) -> Option<SceneTriangle> {
    let base = index.checked_mul(3)?;
    let ids = batch.indices.get(base..base + 3)?;
    let fetch = |i: u32| batch.positions.get(i as usize).copied();
    let positions = [fetch(ids[0])?, fetch(ids[1])?, fetch(ids[2])?];

    let face = (positions[1] - positions[0]).cross(positions[2] - positions[0]);
    let normal = if batch.normals.is_empty() {
        face.normalize_or_zero()
    } else {
        let sum = ids
            .iter()
            .filter_map(|&i| batch.normals.get(i as usize))
            .fold(Vec3::ZERO, |acc, n| acc + *n);
        let averaged = sum.normalize_or_zero();
        if averaged == Vec3::ZERO {
            face.normalize_or_zero()
        } else {
            averaged
        }
    };

    Some(SceneTriangle {
        positions,
        normal,
        albedo: batch.albedo,
    })
}

/// All triangles of a scene in batch order
pub fn collect_triangles(scene: &dyn VoxelScene) -> Vec<SceneTriangle> {
    scene
        .batches()
        .iter()
        .flat_map(|batch| (0..triangle_count(batch)).filter_map(move |i| batch_triangle(batch, i)))
        .collect()
}

/// Scene whose bounds enclose every batch position
pub fn scene_from_batches(batches: Vec<TriangleBatch>) -> SvoResult<StaticScene> {
    let bounds = bounds_from_points(batches.iter().flat_map(|b| b.positions.iter().copied()))
        .ok_or_else(|| SvoError::InvalidScene {
            reason: "scene has no vertices; use empty_scene with explicit bounds".to_string(),
        })?;
    let scene = StaticScene { bounds, batches };
    validate_scene(&scene)?;
    Ok(scene)
}

/// Scene with bounds but no geometry
pub fn empty_scene(bounds: SceneBounds) -> StaticScene {
    StaticScene {
        bounds,
        batches: Vec::new(),
    }
}

/// Axis-aligned box as 12 outward-facing triangles
pub fn box_batch(min: Vec3, max: Vec3, albedo: Vec4) -> TriangleBatch {
    let positions = vec![
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(max.x, max.y, max.z),
        Vec3::new(min.x, max.y, max.z),
    ];
    #[rustfmt::skip]
    let indices = vec![
        0, 2, 1, 0, 3, 2, // -z
        4, 5, 6, 4, 6, 7, // +z
        0, 1, 5, 0, 5, 4, // -y
        3, 7, 6, 3, 6, 2, // +y
        0, 4, 7, 0, 7, 3, // -x
        1, 2, 6, 1, 6, 5, // +x
    ];
    TriangleBatch {
        positions,
        normals: Vec::new(),
        indices,
        albedo,
    }
}

/// Unit cube centred on the origin
pub fn unit_cube_scene(albedo: Vec4) -> StaticScene {
    let batch = box_batch(Vec3::splat(-0.5), Vec3::splat(0.5), albedo);
    StaticScene {
        bounds: create_bounds(Vec3::splat(-0.5), Vec3::splat(0.5)),
        batches: vec![batch],
    }
}
