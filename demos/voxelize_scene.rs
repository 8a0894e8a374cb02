//! Example voxelizing a small scene into a sparse voxel octree
//!
//! Builds a floor slab with two boxes on top, prints per-level statistics
//! and samples a few bricks.
//!
//! Usage: `cargo run --example voxelize_scene [config.toml]`

use glam::{UVec3, Vec3, Vec4};
use std::sync::Arc;
use svo_builder::{
    load_config, scene::scene_operations::{box_batch, scene_from_batches},
    voxelization::brick_operations::BRICK_CENTER, voxelization::packing::PackedRgba8,
    VoxelizationConfig, VoxelizationPass,
};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    println!("Sparse Voxel Octree Build Example");
    println!("=================================");

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path)?,
        None => {
            let config = VoxelizationConfig::with_resolution(64);
            config.validate()?;
            config
        }
    };

    let scene = scene_from_batches(vec![
        box_batch(Vec3::new(-4.0, -0.25, -4.0), Vec3::new(4.0, 0.0, 4.0), Vec4::new(0.7, 0.7, 0.7, 1.0)),
        box_batch(Vec3::new(-2.5, 0.0, -1.0), Vec3::new(-0.5, 2.0, 1.0), Vec4::new(0.9, 0.2, 0.2, 1.0)),
        box_batch(Vec3::new(1.0, 0.0, -0.5), Vec3::new(2.0, 3.0, 0.5), Vec4::new(0.2, 0.3, 0.9, 1.0)),
    ])?;

    let mut pass = VoxelizationPass::new(Arc::new(scene), config)?;
    let meta = *pass.meta();
    println!(
        "\nGrid: {}^3 cells of {:.4} units, {} octree levels",
        meta.cell_dim.x, meta.cell_size, meta.total_level
    );

    let stats = match pass.on_render()? {
        Some(stats) => stats,
        None => anyhow::bail!("first frame did not build"),
    };

    println!("\nBuild finished in {:.2}ms", stats.elapsed.as_secs_f64() * 1000.0);
    println!("  Fragments: {}", stats.fragment_count);
    println!("  Nodes:     {} / {}", stats.allocated_nodes, pass.svo().node_capacity);
    println!("  Bricks:    {} / {}", stats.bricks, pass.brick_pool().capacity);
    println!("  Dispatches: {} ({} invocations)", stats.dispatches, stats.invocations);
    for (level, tagged) in stats.tagged_per_level.iter().enumerate() {
        println!("  Level {:>2}: {} tagged", level, tagged);
    }

    println!("\nSamples along the floor diagonal:");
    let dim = meta.svo_dim.x;
    for step in 0..4 {
        let cell = UVec3::new(dim / 4 + step * dim / 8, dim / 2 - 1, dim / 4 + step * dim / 8);
        match pass
            .find_node(cell, meta.total_level)
            .and_then(|leaf| pass.brick_texel(leaf, BRICK_CENTER))
        {
            Some(sample) => println!(
                "  cell {:?}: color {:?} irradiance {:?}",
                cell,
                PackedRgba8(sample.color).channels(),
                PackedRgba8(sample.irradiance).channels()
            ),
            None => println!("  cell {:?}: empty", cell),
        }
    }

    Ok(())
}
