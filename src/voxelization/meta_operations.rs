//! Voxelization Meta Operations - Pure DOP Functions
//!
//! Grid fitting, level arithmetic and the axis view-projections.

use super::meta_data::VoxelizationMeta;
use crate::config::{estimate_build_memory, GridSizing, VoxelizationConfig};
use crate::constants::{brick, core};
use crate::error::{invalid_config, SvoError, SvoResult};
use crate::scene::scene_data::SceneBounds;
use crate::scene::scene_operations::{bounds_center, bounds_radius, validate_bounds};
use glam::{Mat4, UVec3, Vec3};

/// Nodes in all levels `1..=total_level` (`Σ 8^i`)
pub fn node_capacity(total_level: u32) -> u64 {
    (1..=total_level).map(level_node_capacity).sum()
}

/// Nodes a full level can hold (`8^level`)
pub fn level_node_capacity(level: u32) -> u64 {
    1u64 << (3 * level)
}

/// First tagged-queue entry of `level`
pub fn level_queue_offset(level: u32) -> u64 {
    node_capacity(level.saturating_sub(1))
}

/// Resolution and cell size covering `side` world units
pub fn fit_grid(sizing: GridSizing, side: f32) -> SvoResult<(u32, f32)> {
    let resolution = match sizing {
        GridSizing::Resolution(resolution) => resolution,
        GridSizing::CellSize(cell_size) => {
            if !cell_size.is_finite() || cell_size <= 0.0 {
                return Err(invalid_config(
                    "grid.cell_size",
                    cell_size,
                    "must be finite and positive",
                ));
            }
            let cells = (side / cell_size).ceil();
            if cells > core::MAX_GRID_RESOLUTION as f32 {
                return Err(invalid_config(
                    "grid.cell_size",
                    cell_size,
                    "scene needs more than 1024 cells per axis",
                ));
            }
            (cells as u32).max(core::MIN_GRID_RESOLUTION).next_power_of_two()
        }
    };

    if resolution < core::MIN_GRID_RESOLUTION
        || !resolution.is_power_of_two()
        || resolution > core::MAX_GRID_RESOLUTION
    {
        return Err(invalid_config(
            "grid.resolution",
            resolution,
            "must be a power of two between 2 and 1024",
        ));
    }

    Ok((resolution, side / resolution as f32))
}

/// Derive the build context for `bounds`.
///
/// The grid is the cube of side `2 * radius` around the bounds' centre, the
/// same volume the axis view-projections cover.
pub fn create_meta(config: &VoxelizationConfig, bounds: &SceneBounds) -> SvoResult<VoxelizationMeta> {
    config.check()?;
    validate_bounds(bounds)?;

    let radius = bounds_radius(bounds);
    if radius <= 0.0 {
        return Err(SvoError::InvalidScene {
            reason: format!("zero-size bounds at {:?}", bounds.min),
        });
    }

    let side = 2.0 * radius;
    let (resolution, cell_size) = fit_grid(config.grid, side)?;
    let total_level = resolution.trailing_zeros();
    if total_level > core::MAX_LEVEL {
        return Err(invalid_config(
            "total_level",
            total_level,
            "exceeds the maximum of 10",
        ));
    }

    let bytes = estimate_build_memory(resolution, config.brick_pool_resolution);
    if bytes > core::MAX_BUILD_MEMORY_BYTES {
        return Err(invalid_config(
            "grid.resolution",
            resolution,
            &format!(
                "build needs {}MB with a {} texel brick pool, over the {}MB budget",
                bytes / 1024 / 1024,
                config.brick_pool_resolution,
                core::MAX_BUILD_MEMORY_BYTES / 1024 / 1024
            ),
        ));
    }

    let center = bounds_center(bounds);
    let meta = VoxelizationMeta {
        cell_dim: UVec3::splat(resolution),
        svo_dim: UVec3::splat(1 << total_level),
        world_min: center - Vec3::splat(radius),
        world_max: center + Vec3::splat(radius),
        cell_size,
        cell_count: resolution * resolution * resolution,
        total_level,
        cur_level: 1,
        brick_pool_resolution: config.brick_pool_resolution,
    };

    log::debug!(
        "[create_meta] resolution={} total_level={} cell_size={:.5} world={:?}..{:?}",
        resolution,
        total_level,
        cell_size,
        meta.world_min,
        meta.world_max
    );
    Ok(meta)
}

/// Copy of `meta` positioned at `level`
pub fn meta_at_level(meta: &VoxelizationMeta, level: u32) -> VoxelizationMeta {
    VoxelizationMeta {
        cur_level: level,
        ..*meta
    }
}

pub fn resolution(meta: &VoxelizationMeta) -> u32 {
    meta.cell_dim.x
}

/// Fragment buffer capacity in entries
pub fn fragment_capacity(meta: &VoxelizationMeta) -> u64 {
    core::FRAGMENT_CAPACITY_FACTOR * meta.cell_count as u64
}

pub fn bricks_per_axis(meta: &VoxelizationMeta) -> u32 {
    meta.brick_pool_resolution / brick::BRICK_SIZE
}

/// Brick slots available in the pool
pub fn brick_capacity(meta: &VoxelizationMeta) -> u64 {
    (bricks_per_axis(meta) as u64).pow(3)
}

/// Affine map from world space to continuous grid coordinates
pub fn grid_from_world(meta: &VoxelizationMeta) -> Mat4 {
    Mat4::from_scale(Vec3::splat(1.0 / meta.cell_size)) * Mat4::from_translation(-meta.world_min)
}

pub fn cell_center_world(meta: &VoxelizationMeta, cell: UVec3) -> Vec3 {
    meta.world_min + (cell.as_vec3() + Vec3::splat(0.5)) * meta.cell_size
}

/// Orthographic view-projections looking down X, Y and Z at the scene.
///
/// Each eye sits `1.5 * radius` from the centre; the frustum is the
/// bounding cube of the bounding sphere.
pub fn axis_view_projections(bounds: &SceneBounds) -> [Mat4; 3] {
    let center = bounds_center(bounds);
    let radius = bounds_radius(bounds);
    let projection = Mat4::orthographic_rh(-radius, radius, -radius, radius, 0.1, 4.0 * radius);

    let views = [
        (Vec3::X, Vec3::Y),
        (Vec3::Y, Vec3::X),
        (Vec3::Z, Vec3::Y),
    ];
    views.map(|(axis, up)| {
        let eye = center + axis * (1.5 * radius);
        projection * Mat4::look_at_rh(eye, center, up)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::scene_operations::create_bounds;

    fn unit_bounds() -> SceneBounds {
        create_bounds(Vec3::splat(-0.5), Vec3::splat(0.5))
    }

    #[test]
    fn test_node_capacity() {
        assert_eq!(node_capacity(0), 0);
        assert_eq!(node_capacity(1), 8);
        assert_eq!(node_capacity(3), 8 + 64 + 512);
        assert_eq!(level_queue_offset(1), 0);
        assert_eq!(level_queue_offset(3), 72);
    }

    #[test]
    fn test_create_meta_from_resolution() {
        let meta = create_meta(&VoxelizationConfig::with_resolution(8), &unit_bounds())
            .expect("valid meta");
        assert_eq!(meta.total_level, 3);
        assert_eq!(meta.cell_dim, UVec3::splat(8));
        assert_eq!(meta.svo_dim, UVec3::splat(8));
        assert_eq!(meta.cell_count, 512);
        let side = 3.0f32.sqrt();
        assert!((meta.cell_size - side / 8.0).abs() < 1e-6);
        assert!((meta.world_max - meta.world_min - Vec3::splat(side)).length() < 1e-5);
    }

    #[test]
    fn test_cell_size_fixture_rounds_up_to_power_of_two() {
        let bounds = create_bounds(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0));
        // side is 10, 10 / 0.7 = 14.3 cells -> 16
        let (resolution, cell) = fit_grid(GridSizing::CellSize(0.7), 10.0).expect("fits");
        assert_eq!(resolution, 16);
        assert!((cell - 10.0 / 16.0).abs() < 1e-6);

        let meta = create_meta(&VoxelizationConfig::with_cell_size(0.7), &bounds).expect("valid meta");
        assert_eq!(meta.total_level, 4);
        assert!(meta.cell_size <= 0.7);
    }

    #[test]
    fn test_memory_budget_is_enforced_on_derived_resolution() {
        let result = create_meta(&VoxelizationConfig::with_resolution(1024), &unit_bounds());
        assert!(matches!(
            result,
            Err(SvoError::InvalidConfig { ref field, .. }) if field == "grid.resolution"
        ));

        // 2 / 0.002 = 1000 cells -> 1024
        let bounds = create_bounds(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        let result = create_meta(&VoxelizationConfig::with_cell_size(0.002), &bounds);
        assert!(matches!(result, Err(SvoError::InvalidConfig { .. })));

        let mut config = VoxelizationConfig::with_resolution(8);
        config.brick_pool_resolution = 3072;
        assert!(config.check().is_ok());
        assert!(matches!(
            create_meta(&config, &unit_bounds()),
            Err(SvoError::InvalidConfig { .. })
        ));

        assert!(create_meta(&VoxelizationConfig::with_resolution(512), &unit_bounds()).is_ok());
    }

    #[test]
    fn test_cell_size_too_small_is_rejected() {
        let result = create_meta(&VoxelizationConfig::with_cell_size(1e-4), &unit_bounds());
        assert!(matches!(result, Err(SvoError::InvalidConfig { .. })));
    }

    #[test]
    fn test_degenerate_bounds_are_rejected() {
        let point = create_bounds(Vec3::ONE, Vec3::ONE);
        assert!(matches!(
            create_meta(&VoxelizationConfig::with_resolution(8), &point),
            Err(SvoError::InvalidScene { .. })
        ));
        let inverted = create_bounds(Vec3::ONE, Vec3::ZERO);
        assert!(create_meta(&VoxelizationConfig::default(), &inverted).is_err());
    }

    #[test]
    fn test_cell_center_maps_to_grid_center() {
        let meta = create_meta(&VoxelizationConfig::with_resolution(8), &unit_bounds())
            .expect("valid meta");
        let center = cell_center_world(&meta, UVec3::new(1, 2, 3));
        let grid = grid_from_world(&meta).transform_point3(center);
        assert!((grid - Vec3::new(1.5, 2.5, 3.5)).length() < 1e-4);
    }

    #[test]
    fn test_view_projections_map_grid_into_ndc() {
        let bounds = unit_bounds();
        let meta = create_meta(&VoxelizationConfig::with_resolution(8), &bounds).expect("valid meta");
        for view_projection in axis_view_projections(&bounds) {
            for corner in [meta.world_min, meta.world_max] {
                let ndc = view_projection.project_point3(corner);
                assert!(ndc.x.abs() <= 1.0 + 1e-4 && ndc.y.abs() <= 1.0 + 1e-4);
                assert!(ndc.z >= 0.0 && ndc.z <= 1.0);
            }
        }
    }
}
