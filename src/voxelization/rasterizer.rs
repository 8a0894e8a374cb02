//! Grid rasterizer
//!
//! Projects each triangle along its dominant axis, rasterizes it
//! conservatively over a `resolution²` pixel grid and unprojects the depth
//! span under every covered pixel back into grid cells.

use super::atomic_indirect::{self, slot};
use super::grid_data::AttributeGrid;
use super::meta_data::VoxelizationMeta;
use super::meta_operations::{fragment_capacity, grid_from_world, resolution};
use super::packing::{atomic_rgba8_avg, encode_normal, pack_position, PackedRgba8};
use crate::compute::buffer_data::AtomicBuffer;
use crate::compute::buffer_operations::{
    self, clear_buffer, clear_texture, create_buffer, create_texture_3d,
};
use crate::compute::dispatch::{linear_group_counts, ComputeDevice};
use crate::constants::dispatch;
use crate::scene::scene_data::SceneTriangle;
use glam::{Mat4, UVec3, Vec2, Vec3};

pub fn create_attribute_grid(meta: &VoxelizationMeta) -> AttributeGrid {
    let capacity = fragment_capacity(meta);
    AttributeGrid {
        albedo: create_texture_3d("grid.albedo", meta.cell_dim),
        normal: create_texture_3d("grid.normal", meta.cell_dim),
        fragments: create_buffer("grid.fragments", capacity as usize),
        fragment_capacity: capacity,
    }
}

pub fn clear_attribute_grid(grid: &AttributeGrid) {
    clear_texture(&grid.albedo);
    clear_texture(&grid.normal);
    clear_buffer(&grid.fragments, 0);
}

/// Index of the largest normal component
#[inline]
pub fn dominant_axis(normal: Vec3) -> usize {
    let a = normal.abs();
    if a.x >= a.y && a.x >= a.z {
        0
    } else if a.y >= a.z {
        1
    } else {
        2
    }
}

/// Per-axis raster transforms
#[derive(Debug, Clone, Copy)]
pub struct AxisRaster {
    pub view_projection: Mat4,
    pub grid_from_ndc: Mat4,
}

pub fn axis_rasters(meta: &VoxelizationMeta, view_projections: &[Mat4; 3]) -> [AxisRaster; 3] {
    let grid_from_world = grid_from_world(meta);
    view_projections.map(|view_projection| AxisRaster {
        view_projection,
        grid_from_ndc: grid_from_world * view_projection.inverse(),
    })
}

#[inline]
fn cross2(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Every grid cell the triangle touches, each reported once
pub fn rasterize_triangle(
    positions: &[Vec3; 3],
    rasters: &[AxisRaster; 3],
    resolution: u32,
    mut emit: impl FnMut(UVec3),
) {
    let face = (positions[1] - positions[0]).cross(positions[2] - positions[0]);
    if !face.is_finite() || face.length_squared() <= f32::EPSILON * f32::EPSILON {
        return;
    }
    let axis = dominant_axis(face);
    let raster = &rasters[axis];
    let res = resolution as f32;

    let ndc = positions.map(|p| raster.view_projection.project_point3(p));
    let screen = ndc.map(|p| (Vec2::new(p.x, p.y) + Vec2::ONE) * 0.5 * res);
    let depth = ndc.map(|p| p.z);

    let e1 = screen[1] - screen[0];
    let e2 = screen[2] - screen[0];
    let area = cross2(e1, e2);
    if area.abs() <= f32::EPSILON {
        return;
    }
    let winding = area.signum();

    // depth plane z = z0 + dzdx * (x - x0) + dzdy * (y - y0)
    let dz1 = depth[1] - depth[0];
    let dz2 = depth[2] - depth[0];
    let dzdx = (dz1 * e2.y - dz2 * e1.y) / area;
    let dzdy = (dz2 * e1.x - dz1 * e2.x) / area;
    let depth_at = |x: f32, y: f32| depth[0] + dzdx * (x - screen[0].x) + dzdy * (y - screen[0].y);
    let depth_min = depth[0].min(depth[1]).min(depth[2]);
    let depth_max = depth[0].max(depth[1]).max(depth[2]);

    let edges = [
        (screen[0], screen[1] - screen[0]),
        (screen[1], screen[2] - screen[1]),
        (screen[2], screen[0] - screen[2]),
    ];

    let lo = screen[0].min(screen[1]).min(screen[2]).floor().max(Vec2::ZERO);
    let hi = screen[0].max(screen[1]).max(screen[2]).floor().min(Vec2::splat(res - 1.0));
    if lo.x > hi.x || lo.y > hi.y {
        return;
    }

    let max_cell = resolution as i32 - 1;
    for py in lo.y as u32..=hi.y as u32 {
        for px in lo.x as u32..=hi.x as u32 {
            let center = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);

            // edge functions dilated by half a pixel
            let covered = edges.iter().all(|(origin, dir)| {
                winding * cross2(*dir, center - *origin) + 0.5 * (dir.x.abs() + dir.y.abs()) >= 0.0
            });
            if !covered {
                continue;
            }

            let (x0, x1, y0, y1) = (px as f32, px as f32 + 1.0, py as f32, py as f32 + 1.0);
            let corners = [depth_at(x0, y0), depth_at(x1, y0), depth_at(x0, y1), depth_at(x1, y1)];
            let span_min = corners.iter().fold(f32::MAX, |m, &z| m.min(z)).clamp(depth_min, depth_max);
            let span_max = corners.iter().fold(f32::MIN, |m, &z| m.max(z)).clamp(depth_min, depth_max);

            let ndc_xy = center / res * 2.0 - Vec2::ONE;
            let near = raster
                .grid_from_ndc
                .transform_point3(Vec3::new(ndc_xy.x, ndc_xy.y, span_min));
            let far = raster
                .grid_from_ndc
                .transform_point3(Vec3::new(ndc_xy.x, ndc_xy.y, span_max));

            let column = near.floor().as_ivec3();
            let d0 = near[axis].min(far[axis]).floor() as i32;
            let d1 = near[axis].max(far[axis]).floor() as i32;
            if d1 < 0 || d0 > max_cell {
                continue;
            }

            let mut cell = column;
            if (0..3).any(|a| a != axis && (column[a] < 0 || column[a] > max_cell)) {
                continue;
            }
            for d in d0.max(0)..=d1.min(max_cell) {
                cell[axis] = d;
                emit(cell.as_uvec3());
            }
        }
    }
}

/// Rasterize every triangle into the grid and fragment list.
///
/// One invocation per triangle; the first writer of a cell appends it to
/// the fragment list.
pub fn rasterize_scene(
    device: &mut ComputeDevice,
    atomic: &AtomicBuffer,
    grid: &AttributeGrid,
    meta: &VoxelizationMeta,
    view_projections: &[Mat4; 3],
    triangles: &[SceneTriangle],
) {
    let rasters = axis_rasters(meta, view_projections);
    let resolution = resolution(meta);
    let count = triangles.len() as u32;

    device.dispatch(
        "grid.rasterize",
        linear_group_counts(count, dispatch::LINEAR_GROUP_SIZE),
        [dispatch::LINEAR_GROUP_SIZE, 1, 1],
        |inv| {
            let Some(triangle) = triangles.get(inv.linear as usize) else {
                return;
            };
            let [r, g, b, _] = PackedRgba8::from_vec4(triangle.albedo).channels();
            let normal = encode_normal(triangle.normal);

            rasterize_triangle(&triangle.positions, &rasters, resolution, |cell| {
                let Some(albedo_texel) = buffer_operations::texel(&grid.albedo, cell) else {
                    return;
                };
                let previous = atomic_rgba8_avg(albedo_texel, [r, g, b]);
                if let Some(normal_texel) = buffer_operations::texel(&grid.normal, cell) {
                    atomic_rgba8_avg(normal_texel, normal);
                }

                if previous == 0 {
                    let index = atomic_indirect::bump(atomic, slot::FRAGMENT_COUNT, 1);
                    if (index as u64) < grid.fragment_capacity {
                        buffer_operations::store(&grid.fragments, index as usize, pack_position(cell));
                    }
                }
            });
        },
    );

    log::debug!(
        "[rasterize_scene] {} triangles -> {} fragments",
        count,
        buffer_operations::load(atomic, slot::FRAGMENT_COUNT).unwrap_or(0)
    );
}
