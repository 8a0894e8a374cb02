//! Voxelization pass
//!
//! Owns every device resource of the build and issues the passes in order:
//! rasterize, compact, then tag / link / subdivide level by level, allocate
//! and write leaf bricks, spread values upward and exchange borders.
//! A build runs only when `needs_refresh` is set.

use super::atomic_indirect::{self, slot};
use super::border::transfer_borders;
use super::brick_data::{BrickPool, BrickSample};
use super::brick_operations::{self, allocate_leaf_bricks, write_leaf_values};
use super::grid_data::AttributeGrid;
use super::lighting::{ShadowQuery, Unshadowed};
use super::meta_data::VoxelizationMeta;
use super::meta_operations::{axis_view_projections, create_meta, level_node_capacity, meta_at_level};
use super::neighbours::link_neighbours;
use super::rasterizer::{clear_attribute_grid, create_attribute_grid, rasterize_scene};
use super::spread::spread_leaf_values;
use super::svo_data::{SvoBuffers, SvoStats};
use super::svo_operations::{self, clear_svo_buffers, create_svo_buffers, subdivide_level, subdivide_root, tag_level};
use crate::compute::buffer_data::AtomicBuffer;
use crate::compute::buffer_operations::load;
use crate::compute::dispatch::ComputeDevice;
use crate::config::VoxelizationConfig;
use crate::error::{CapacityResource, OptionExt, SvoError, SvoResult};
use crate::scene::scene_data::VoxelScene;
use crate::scene::scene_operations::{collect_triangles, validate_scene};
use glam::{Mat4, UVec3};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Counters read back after a build
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    /// Raw fragment counter, may exceed capacity on overflow
    pub fragment_count: u32,
    /// Tagged nodes per level; entry 0 is the implicit root
    pub tagged_per_level: Vec<u32>,
    pub allocated_nodes: u32,
    pub bricks: u32,
    pub dispatches: u32,
    pub invocations: u64,
    pub elapsed: Duration,
}

impl BuildStats {
    /// Occupied leaves
    pub fn leaf_count(&self) -> u32 {
        self.tagged_per_level.last().copied().unwrap_or(0)
    }
}

pub struct VoxelizationPass {
    scene: Arc<dyn VoxelScene>,
    shadow: Arc<dyn ShadowQuery>,
    config: VoxelizationConfig,
    meta: VoxelizationMeta,
    view_projections: [Mat4; 3],
    device: ComputeDevice,
    atomic: AtomicBuffer,
    grid: AttributeGrid,
    svo: SvoBuffers,
    bricks: BrickPool,
    needs_refresh: bool,
    last_stats: Option<BuildStats>,
}

impl std::fmt::Debug for VoxelizationPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoxelizationPass")
            .field("scene", &"<VoxelScene>")
            .field("shadow", &"<ShadowQuery>")
            .field("config", &self.config)
            .field("meta", &self.meta)
            .field("needs_refresh", &self.needs_refresh)
            .field("last_stats", &self.last_stats)
            .finish()
    }
}

/// Thread-safe shared pass (Arc<RwLock<>>)
pub type SharedVoxelizationPass = Arc<RwLock<VoxelizationPass>>;

pub fn create_shared_pass(pass: VoxelizationPass) -> SharedVoxelizationPass {
    Arc::new(RwLock::new(pass))
}

impl VoxelizationPass {
    /// Validate inputs and allocate every buffer; the first build is pending
    pub fn new(scene: Arc<dyn VoxelScene>, config: VoxelizationConfig) -> SvoResult<Self> {
        validate_scene(scene.as_ref())?;
        let bounds = scene.bounds();
        let meta = create_meta(&config, &bounds)?;

        log::info!(
            "[VoxelizationPass::new] resolution={} total_level={} brick_pool={} ({} bricks)",
            meta.cell_dim.x,
            meta.total_level,
            meta.brick_pool_resolution,
            super::meta_operations::brick_capacity(&meta)
        );

        Ok(Self {
            scene,
            shadow: Arc::new(Unshadowed),
            config,
            meta,
            view_projections: axis_view_projections(&bounds),
            device: ComputeDevice::new(),
            atomic: atomic_indirect::create_atomic_indirect_buffer(),
            grid: create_attribute_grid(&meta),
            svo: create_svo_buffers(&meta),
            bricks: brick_operations::create_brick_pool(&meta),
            needs_refresh: true,
            last_stats: None,
        })
    }

    pub fn with_shadow_query(mut self, shadow: Arc<dyn ShadowQuery>) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn set_shadow_query(&mut self, shadow: Arc<dyn ShadowQuery>) {
        self.shadow = shadow;
        self.needs_refresh = true;
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    pub fn request_refresh(&mut self) {
        self.needs_refresh = true;
    }

    /// Re-derive the build context from the scene and config.
    ///
    /// Buffers are re-created only when the grid or pool layout changed.
    pub fn rebuild(&mut self) -> SvoResult<()> {
        validate_scene(self.scene.as_ref())?;
        let bounds = self.scene.bounds();
        let meta = create_meta(&self.config, &bounds)?;

        let layout_changed = meta.cell_dim != self.meta.cell_dim
            || meta.brick_pool_resolution != self.meta.brick_pool_resolution;
        if layout_changed {
            log::info!(
                "[VoxelizationPass::rebuild] Re-creating buffers: resolution {} -> {}, pool {} -> {}",
                self.meta.cell_dim.x,
                meta.cell_dim.x,
                self.meta.brick_pool_resolution,
                meta.brick_pool_resolution
            );
            self.grid = create_attribute_grid(&meta);
            self.svo = create_svo_buffers(&meta);
            self.bricks = brick_operations::create_brick_pool(&meta);
        } else if meta != self.meta {
            log::debug!("[VoxelizationPass::rebuild] Bounds or cell size changed, buffers kept");
        }

        self.meta = meta;
        self.view_projections = axis_view_projections(&bounds);
        self.needs_refresh = true;
        Ok(())
    }

    pub fn set_config(&mut self, config: VoxelizationConfig) -> SvoResult<()> {
        config.check()?;
        let previous = std::mem::replace(&mut self.config, config);
        if let Err(e) = self.rebuild() {
            self.config = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn set_scene(&mut self, scene: Arc<dyn VoxelScene>) -> SvoResult<()> {
        let previous = std::mem::replace(&mut self.scene, scene);
        if let Err(e) = self.rebuild() {
            self.scene = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Build if a refresh is pending
    pub fn on_render(&mut self) -> SvoResult<Option<BuildStats>> {
        if !self.needs_refresh {
            return Ok(None);
        }
        self.build().map(Some)
    }

    /// Run the whole pipeline.
    ///
    /// On error `needs_refresh` stays set and the buffers hold a partial
    /// octree.
    pub fn build(&mut self) -> SvoResult<BuildStats> {
        let start = Instant::now();
        self.device.reset_stats();

        if let Err(e) = self.run_passes() {
            log::error!("[VoxelizationPass::build] Build failed: {}", e);
            self.needs_refresh = true;
            return Err(e);
        }
        if let Err(e) = self.check_capacities() {
            log::warn!("[VoxelizationPass::build] {}", e);
            self.needs_refresh = true;
            return Err(e);
        }

        let device_stats = self.device.stats();
        let svo_stats = svo_operations::get_stats(&self.svo, &self.atomic);
        let stats = BuildStats {
            fragment_count: self.counter(slot::FRAGMENT_COUNT)?,
            tagged_per_level: svo_stats.tagged_per_level,
            allocated_nodes: svo_stats.total_nodes,
            bricks: self.counter(slot::BRICK_COUNT)?,
            dispatches: device_stats.dispatches,
            invocations: device_stats.invocations,
            elapsed: start.elapsed(),
        };

        log::info!(
            "[VoxelizationPass::build] {} fragments, {} nodes, {} leaves, {} bricks in {} dispatches ({:.2}ms)",
            stats.fragment_count,
            stats.allocated_nodes,
            stats.leaf_count(),
            stats.bricks,
            stats.dispatches,
            stats.elapsed.as_secs_f64() * 1000.0
        );

        self.needs_refresh = false;
        self.last_stats = Some(stats.clone());
        Ok(stats)
    }

    fn run_passes(&mut self) -> SvoResult<()> {
        clear_attribute_grid(&self.grid);
        clear_svo_buffers(&self.svo);
        brick_operations::clear_brick_pool(&self.bricks);
        atomic_indirect::reset_atomic_indirect(&self.atomic)?;

        let triangles = collect_triangles(self.scene.as_ref());
        rasterize_scene(
            &mut self.device,
            &self.atomic,
            &self.grid,
            &self.meta,
            &self.view_projections,
            &triangles,
        );
        atomic_indirect::compact_fragment_list(&mut self.device, &self.atomic, self.grid.fragment_capacity);

        subdivide_root(&mut self.device, &self.atomic, &self.svo);
        let total_level = self.meta.total_level;
        for level in 1..=total_level {
            self.meta = meta_at_level(&self.meta, level);
            let level = self.meta.cur_level;

            tag_level(&mut self.device, &self.atomic, &self.svo, &self.grid.fragments, level)?;
            link_neighbours(&mut self.device, &self.atomic, &self.svo, &self.grid.fragments, level)?;
            if level < total_level {
                subdivide_level(&mut self.device, &self.atomic, &self.svo, level)?;
            }
        }

        allocate_leaf_bricks(&mut self.device, &self.atomic, &self.svo, &self.bricks, total_level)?;
        write_leaf_values(
            &mut self.device,
            &self.atomic,
            &self.svo,
            &self.grid,
            &self.bricks,
            &self.meta,
            &self.config.light,
            self.shadow.as_ref(),
        )?;
        spread_leaf_values(&mut self.device, &self.atomic, &self.svo, &self.bricks)?;
        transfer_borders(&mut self.device, &self.atomic, &self.svo, &self.bricks)?;
        Ok(())
    }

    /// Read one atomic counter; a slot outside the buffer is an error
    fn counter(&self, index: usize) -> SvoResult<u32> {
        load(&self.atomic, index).ok_or_svo(|| SvoError::BufferAccess {
            index,
            size: self.atomic.words.len(),
        })
    }

    /// Compare every allocation counter with its buffer's capacity
    pub fn check_capacities(&self) -> SvoResult<()> {
        let fragments = self.counter(slot::FRAGMENT_COUNT)? as u64;
        if fragments > self.grid.fragment_capacity {
            return Err(SvoError::CapacityExceeded {
                resource: CapacityResource::Fragments,
                requested: fragments,
                capacity: self.grid.fragment_capacity,
            });
        }

        let nodes = self.counter(slot::NODE_COUNT)? as u64;
        if nodes > self.svo.node_capacity {
            return Err(SvoError::CapacityExceeded {
                resource: CapacityResource::Nodes,
                requested: nodes,
                capacity: self.svo.node_capacity,
            });
        }

        for level in 1..=self.meta.total_level {
            let tagged = self.counter(slot::TAGGED_PER_LEVEL + level as usize)? as u64;
            if tagged > level_node_capacity(level) {
                return Err(SvoError::CapacityExceeded {
                    resource: CapacityResource::TaggedQueue,
                    requested: tagged,
                    capacity: level_node_capacity(level),
                });
            }
        }

        let bricks = self.counter(slot::BRICK_COUNT)? as u64;
        if bricks > self.bricks.capacity {
            return Err(SvoError::CapacityExceeded {
                resource: CapacityResource::Bricks,
                requested: bricks,
                capacity: self.bricks.capacity,
            });
        }
        Ok(())
    }

    pub fn meta(&self) -> &VoxelizationMeta {
        &self.meta
    }

    pub fn config(&self) -> &VoxelizationConfig {
        &self.config
    }

    pub fn view_projections(&self) -> &[Mat4; 3] {
        &self.view_projections
    }

    pub fn grid(&self) -> &AttributeGrid {
        &self.grid
    }

    pub fn svo(&self) -> &SvoBuffers {
        &self.svo
    }

    pub fn node_next(&self) -> &AtomicBuffer {
        &self.svo.next
    }

    pub fn node_color(&self) -> &AtomicBuffer {
        &self.svo.color
    }

    pub fn level_address(&self) -> &AtomicBuffer {
        &self.svo.level_address
    }

    /// Neighbour links along `axis` (0 = X, 1 = Y, 2 = Z)
    pub fn neighbours(&self, axis: usize) -> SvoResult<&AtomicBuffer> {
        self.svo.neighbours.get(axis).ok_or_svo(|| SvoError::BufferAccess {
            index: axis,
            size: self.svo.neighbours.len(),
        })
    }

    pub fn brick_pool(&self) -> &BrickPool {
        &self.bricks
    }

    pub fn atomic_indirect(&self) -> &AtomicBuffer {
        &self.atomic
    }

    pub fn last_stats(&self) -> Option<&BuildStats> {
        self.last_stats.as_ref()
    }

    pub fn svo_stats(&self) -> SvoStats {
        svo_operations::get_stats(&self.svo, &self.atomic)
    }

    /// Node at `level` containing finest cell `cell`
    pub fn find_node(&self, cell: UVec3, level: u32) -> Option<u32> {
        if cell.cmpge(self.meta.svo_dim).any() {
            return None;
        }
        svo_operations::descend(&self.svo, cell, level)
    }

    /// Texel `offset` (each axis 0..3) of `node`'s brick
    pub fn brick_texel(&self, node: u32, offset: UVec3) -> Option<BrickSample> {
        brick_operations::brick_texel(&self.bricks, &self.svo.color, node, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::buffer_operations::{count_nonzero_texels, read_all, store, texture_load};
    use crate::constants::node;
    use crate::scene::scene_data::{SceneTriangle, StaticScene, TriangleBatch};
    use crate::scene::scene_operations::{box_batch, create_bounds, empty_scene, unit_cube_scene};
    use crate::voxelization::atomic_indirect::{read_indirect_args, IndirectArgs};
    use crate::voxelization::brick_operations::BRICK_CENTER;
    use crate::voxelization::border::face_texel;
    use crate::voxelization::packing::{unpack_position, PackedRgba8};
    use crate::voxelization::svo_operations::{child_address, is_tagged, tagged_nodes};
    use glam::{Vec3, Vec4};
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashSet;

    const ALBEDO: Vec4 = Vec4::new(0.8, 0.4, 0.2, 1.0);

    fn cube_pass(resolution: u32) -> VoxelizationPass {
        VoxelizationPass::new(
            Arc::new(unit_cube_scene(ALBEDO)),
            VoxelizationConfig::with_resolution(resolution),
        )
        .expect("valid pass")
    }

    fn assert_level_bounds(stats: &BuildStats) {
        assert_eq!(stats.tagged_per_level[0], 1);
        for level in 1..stats.tagged_per_level.len() {
            assert!(
                stats.tagged_per_level[level] <= 8 * stats.tagged_per_level[level - 1],
                "level {} tagged {:?}",
                level,
                stats.tagged_per_level
            );
        }
    }

    struct NoLight;

    impl ShadowQuery for NoLight {
        fn visibility(&self, _world_position: Vec3, _normal: Vec3) -> f32 {
            0.0
        }
    }

    #[test]
    fn test_unit_cube_at_resolution_8() {
        let mut pass = cube_pass(8);
        assert!(pass.needs_refresh());
        let stats = pass.build().expect("build succeeds");
        assert!(!pass.needs_refresh());

        assert_eq!(pass.meta().total_level, 3);
        assert_eq!(stats.tagged_per_level.len(), 4);
        assert!(stats.tagged_per_level[1] <= 8);
        assert!(stats.tagged_per_level[2] <= 64);
        assert!(stats.tagged_per_level[3] <= 512);
        assert!(stats.leaf_count() > 0);
        assert_level_bounds(&stats);

        assert!(stats.allocated_nodes as u64 <= 8 + 64 + 512);
        assert_eq!(
            stats.allocated_nodes,
            8 + 8 * (stats.tagged_per_level[1] + stats.tagged_per_level[2])
        );
        // one fragment per finest cell, one leaf per fragment
        assert_eq!(stats.leaf_count(), stats.fragment_count);
        assert_eq!(load(pass.level_address(), 0), Some(node::NULL_ADDRESS));
        assert_eq!(load(pass.level_address(), 1), Some(0));
    }

    #[test]
    fn test_empty_scene_keeps_only_root_tile() {
        let scene = empty_scene(create_bounds(Vec3::splat(-1.0), Vec3::splat(1.0)));
        let mut pass = VoxelizationPass::new(Arc::new(scene), VoxelizationConfig::with_resolution(8))
            .expect("valid pass");
        let stats = pass.build().expect("build succeeds");

        assert_eq!(stats.fragment_count, 0);
        assert_eq!(stats.allocated_nodes, 8);
        assert_eq!(stats.tagged_per_level, vec![1, 0, 0, 0]);
        assert_eq!(stats.leaf_count(), 0);
        assert_eq!(stats.bricks, 0);
        assert_eq!(load(pass.level_address(), 2), Some(node::NULL_ADDRESS));

        for offset in [slot::FRAGMENT_ARGS, slot::QUEUE_ARGS, slot::RANGE_ARGS] {
            let args: IndirectArgs = read_indirect_args(pass.atomic_indirect(), offset).expect("args");
            assert!(args.group_x >= 1 && args.group_y >= 1 && args.group_z >= 1);
        }
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let mut pass = cube_pass(16);
        let first = pass.build().expect("first build");
        let first_leaves: HashSet<UVec3> = tagged_nodes(pass.svo(), 4).into_iter().map(|(c, _)| c).collect();

        pass.request_refresh();
        let second = pass.on_render().expect("second build").expect("refresh was pending");
        let second_leaves: HashSet<UVec3> = tagged_nodes(pass.svo(), 4).into_iter().map(|(c, _)| c).collect();

        assert_eq!(first.fragment_count, second.fragment_count);
        assert_eq!(first.tagged_per_level, second.tagged_per_level);
        assert_eq!(first.allocated_nodes, second.allocated_nodes);
        assert_eq!(first.bricks, second.bricks);
        assert_eq!(first.dispatches, second.dispatches);
        assert_eq!(first_leaves, second_leaves);
    }

    #[test]
    fn test_on_render_builds_only_when_requested() {
        let mut pass = cube_pass(4);
        assert!(pass.on_render().expect("build").is_some());
        assert!(pass.on_render().expect("no build").is_none());
        pass.request_refresh();
        assert!(pass.on_render().expect("build").is_some());
        assert!(pass.last_stats().is_some());
    }

    #[test]
    fn test_leaves_hold_fragment_values() {
        let mut pass = cube_pass(8);
        pass.build().expect("build");
        let [r, g, b, _] = PackedRgba8::from_vec4(ALBEDO).channels();

        let count = load(pass.atomic_indirect(), slot::FRAGMENT_COUNT).expect("counter");
        for i in 0..count {
            let cell = unpack_position(load(&pass.grid().fragments, i as usize).expect("fragment"));
            let leaf = pass.find_node(cell, 3).expect("leaf exists");
            assert!(is_tagged(load(pass.node_next(), leaf as usize).expect("node")));

            let sample = pass.brick_texel(leaf, BRICK_CENTER).expect("leaf has brick");
            assert_eq!(PackedRgba8(sample.color).channels(), [r, g, b, 255]);
            assert_eq!(PackedRgba8(sample.normal).alpha(), 255);
            assert_eq!(PackedRgba8(sample.irradiance).alpha(), 255);
            assert!(texture_load(&pass.grid().albedo, cell).expect("in grid") != 0);
        }
        assert_eq!(pass.find_node(UVec3::splat(8), 3), None);
    }

    #[test]
    fn test_interior_bricks_average_children() {
        let mut pass = cube_pass(8);
        pass.build().expect("build");
        let [r, g, b, _] = PackedRgba8::from_vec4(ALBEDO).channels();

        for level in 1..3 {
            let nodes = tagged_nodes(pass.svo(), level);
            assert!(!nodes.is_empty());
            for (_, address) in nodes {
                let sample = pass.brick_texel(address, BRICK_CENTER).expect("interior brick");
                let [sr, sg, sb, sa] = PackedRgba8(sample.color).channels();
                assert!((sr as i32 - r as i32).abs() <= 1);
                assert!((sg as i32 - g as i32).abs() <= 1);
                assert!((sb as i32 - b as i32).abs() <= 1);
                assert_eq!(sa, 255);
            }
        }
    }

    #[test]
    fn test_neighbour_links_point_one_node_over() {
        let mut pass = cube_pass(8);
        pass.build().expect("build");

        let mut linked = 0;
        for (coord, address) in tagged_nodes(pass.svo(), 3) {
            for axis in 0..3 {
                let link = load(pass.neighbours(axis).expect("axis"), address as usize).expect("link");
                let mut step = UVec3::ZERO;
                step[axis] = 1;
                let expected = if coord[axis] + 1 < 8 {
                    pass.find_node(coord + step, 3).unwrap_or(node::NULL_ADDRESS)
                } else {
                    node::NULL_ADDRESS
                };
                assert_eq!(link, expected);
                if link != node::NULL_ADDRESS {
                    linked += 1;
                }
            }
        }
        assert!(linked > 0);
        assert!(pass.neighbours(3).is_err());
    }

    #[test]
    fn test_border_transfer_is_symmetric() {
        let mut pass = cube_pass(8);
        pass.build().expect("build");

        let mut checked = 0;
        for (_, a) in tagged_nodes(pass.svo(), 3) {
            for axis in 0..3 {
                let b = load(pass.neighbours(axis).expect("axis"), a as usize).expect("link");
                let a_face = pass.brick_texel(a, face_texel(axis, 2, 1, 1)).expect("leaf brick");
                if b == node::NULL_ADDRESS || pass.brick_texel(b, BRICK_CENTER).is_none() {
                    assert_eq!(a_face, BrickSample::default());
                    continue;
                }
                let a_center = pass.brick_texel(a, BRICK_CENTER).expect("leaf brick");
                let b_center = pass.brick_texel(b, BRICK_CENTER).expect("neighbour brick");
                let b_face = pass.brick_texel(b, face_texel(axis, 0, 1, 1)).expect("neighbour brick");
                assert_eq!(a_face, b_center);
                assert_eq!(b_face, a_center);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_brick_count_within_pool() {
        let mut pass = cube_pass(16);
        let stats = pass.build().expect("build");
        assert!((stats.bricks as u64) <= pass.brick_pool().capacity);
        let interior: u32 = stats.tagged_per_level[1..4].iter().sum();
        assert_eq!(stats.bricks, stats.leaf_count() + interior);
    }

    #[test]
    fn test_brick_overflow_is_reported() {
        let mut config = VoxelizationConfig::with_resolution(8);
        config.brick_pool_resolution = 3;
        let mut pass = VoxelizationPass::new(Arc::new(unit_cube_scene(ALBEDO)), config).expect("valid pass");
        match pass.build() {
            Err(SvoError::CapacityExceeded {
                resource: CapacityResource::Bricks,
                capacity,
                requested,
            }) => {
                assert_eq!(capacity, 1);
                assert!(requested > 1);
            }
            other => panic!("expected brick overflow, got {:?}", other),
        }
        assert!(pass.needs_refresh());
    }

    #[test]
    fn test_node_overflow_is_refused_and_reported() {
        let mut pass = cube_pass(8);
        // root tile plus one child tile
        pass.svo.node_capacity = 16;

        match pass.build() {
            Err(SvoError::CapacityExceeded {
                resource: CapacityResource::Nodes,
                requested,
                capacity,
            }) => {
                assert_eq!(capacity, 16);
                assert!(requested > 16, "counter should overshoot, got {}", requested);
            }
            other => panic!("expected node overflow, got {:?}", other),
        }
        assert!(pass.needs_refresh());

        let next = read_all(pass.node_next());
        assert!(next[16..].iter().all(|&entry| entry == 0));
        let subdivided: Vec<u32> = next.iter().filter_map(|&entry| child_address(entry)).collect();
        assert_eq!(subdivided, vec![8]);
        let addresses = read_all(pass.level_address());
        assert!(addresses
            .iter()
            .all(|&address| address == node::NULL_ADDRESS || address < 16));
    }

    #[test]
    fn test_fragment_overflow_is_refused_and_reported() {
        let mut pass = cube_pass(8);
        pass.grid.fragment_capacity = 4;

        match pass.build() {
            Err(SvoError::CapacityExceeded {
                resource: CapacityResource::Fragments,
                requested,
                capacity,
            }) => {
                assert_eq!(capacity, 4);
                // every touched cell still bumps the counter
                assert_eq!(requested as usize, count_nonzero_texels(&pass.grid().albedo));
                assert!(requested > 4);
            }
            other => panic!("expected fragment overflow, got {:?}", other),
        }

        let fragments = read_all(&pass.grid().fragments);
        assert!(fragments[4..].iter().all(|&packed| packed == 0));
        let args = read_indirect_args(pass.atomic_indirect(), slot::FRAGMENT_ARGS).expect("args");
        assert_eq!(args.item_count, 4);
        assert!(pass.needs_refresh());
    }

    #[test]
    fn test_tagged_queue_overflow_is_reported() {
        let mut pass = cube_pass(8);
        pass.build().expect("build");
        assert!(pass.check_capacities().is_ok());

        store(pass.atomic_indirect(), slot::TAGGED_PER_LEVEL + 2, 65);
        match pass.check_capacities() {
            Err(SvoError::CapacityExceeded {
                resource: CapacityResource::TaggedQueue,
                requested,
                capacity,
            }) => {
                assert_eq!(requested, 65);
                assert_eq!(capacity, 64);
            }
            other => panic!("expected tagged queue overflow, got {:?}", other),
        }
    }

    #[test]
    fn test_counter_outside_buffer_is_an_error() {
        let pass = cube_pass(4);
        assert!(pass.counter(slot::NODE_COUNT).is_ok());
        assert!(matches!(
            pass.counter(slot::LEN),
            Err(SvoError::BufferAccess { index, .. }) if index == slot::LEN
        ));
    }

    #[test]
    fn test_invalid_inputs_fail_at_construction() {
        let scene: Arc<dyn VoxelScene> = Arc::new(unit_cube_scene(ALBEDO));

        let mut config = VoxelizationConfig::with_resolution(8);
        config.brick_pool_resolution = 200;
        assert!(matches!(
            VoxelizationPass::new(scene.clone(), config),
            Err(SvoError::InvalidConfig { .. })
        ));
        assert!(matches!(
            VoxelizationPass::new(scene.clone(), VoxelizationConfig::with_resolution(2048)),
            Err(SvoError::InvalidConfig { .. })
        ));
        assert!(matches!(
            VoxelizationPass::new(scene.clone(), VoxelizationConfig::with_resolution(0)),
            Err(SvoError::InvalidConfig { .. })
        ));
        // over the memory budget, rejected before any buffer is allocated
        assert!(matches!(
            VoxelizationPass::new(scene, VoxelizationConfig::with_resolution(1024)),
            Err(SvoError::InvalidConfig { .. })
        ));

        let inverted = empty_scene(create_bounds(Vec3::ONE, Vec3::ZERO));
        assert!(matches!(
            VoxelizationPass::new(Arc::new(inverted), VoxelizationConfig::with_resolution(8)),
            Err(SvoError::InvalidScene { .. })
        ));
    }

    #[test]
    fn test_set_config_recreates_buffers() {
        let mut pass = cube_pass(8);
        pass.build().expect("build");
        pass.set_config(VoxelizationConfig::with_resolution(16)).expect("valid config");
        assert!(pass.needs_refresh());
        assert_eq!(pass.meta().total_level, 4);
        assert_eq!(pass.svo().node_capacity, 8 + 64 + 512 + 4096);
        let stats = pass.build().expect("build at new resolution");
        assert_eq!(stats.tagged_per_level.len(), 5);

        assert!(pass.set_config(VoxelizationConfig::with_resolution(3)).is_err());
        assert!(matches!(
            pass.set_config(VoxelizationConfig::with_resolution(1024)),
            Err(SvoError::InvalidConfig { .. })
        ));
        assert_eq!(pass.meta().total_level, 4);
        assert_eq!(pass.config().grid, crate::config::GridSizing::Resolution(16));
    }

    #[test]
    fn test_set_scene_moves_grid() {
        let mut pass = cube_pass(8);
        let moved = StaticScene {
            bounds: create_bounds(Vec3::splat(10.0), Vec3::splat(12.0)),
            batches: vec![box_batch(Vec3::splat(10.0), Vec3::splat(12.0), ALBEDO)],
        };
        pass.set_scene(Arc::new(moved)).expect("valid scene");
        assert!(pass.meta().world_min.x > 9.0);
        let stats = pass.build().expect("build");
        assert!(stats.fragment_count > 0);
    }

    #[test]
    fn test_shadowed_scene_has_black_irradiance() {
        let mut pass = cube_pass(8).with_shadow_query(Arc::new(NoLight));
        pass.build().expect("build");
        for (_, leaf) in tagged_nodes(pass.svo(), 3) {
            let sample = pass.brick_texel(leaf, BRICK_CENTER).expect("leaf brick");
            assert_eq!(PackedRgba8(sample.irradiance).channels(), [0, 0, 0, 255]);
        }
    }

    #[test]
    fn test_random_soup_properties() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut positions = Vec::new();
        for _ in 0..150 {
            positions.push(Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)));
        }
        let batch = TriangleBatch {
            indices: (0..positions.len() as u32).collect(),
            positions,
            normals: Vec::new(),
            albedo: ALBEDO,
        };
        let scene = crate::scene::scene_operations::scene_from_batches(vec![batch]).expect("valid scene");
        let mut pass = VoxelizationPass::new(Arc::new(scene), VoxelizationConfig::with_resolution(32))
            .expect("valid pass");
        let stats = pass.build().expect("build");

        assert_level_bounds(&stats);
        assert_eq!(stats.leaf_count(), stats.fragment_count);
        assert!(stats.allocated_nodes as u64 <= pass.svo().node_capacity);
        assert!(stats.dispatches > 0);
    }

    #[test]
    fn test_shared_pass_reads_after_build() {
        let shared = create_shared_pass(cube_pass(4));
        shared.write().build().expect("build");
        let reader = Arc::clone(&shared);
        let leaves = std::thread::spawn(move || reader.read().last_stats().map(|s| s.leaf_count()))
            .join()
            .expect("reader thread");
        assert!(leaves.unwrap_or(0) > 0);
    }

    #[test]
    fn test_triangle_outside_grid_is_ignored() {
        let far = SceneTriangle {
            positions: [Vec3::splat(50.0), Vec3::new(51.0, 50.0, 50.0), Vec3::new(50.0, 51.0, 50.0)],
            normal: Vec3::Z,
            albedo: ALBEDO,
        };
        let pass = cube_pass(4);
        let mut cells = 0;
        crate::voxelization::rasterizer::rasterize_triangle(
            &far.positions,
            &crate::voxelization::rasterizer::axis_rasters(pass.meta(), pass.view_projections()),
            4,
            |_| cells += 1,
        );
        assert_eq!(cells, 0);
    }
}
