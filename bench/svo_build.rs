//! Full build benchmarks over a seeded random triangle soup

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::{Vec3, Vec4};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use svo_builder::{
    scene::scene_operations::{scene_from_batches, unit_cube_scene},
    StaticScene, TriangleBatch, VoxelizationConfig, VoxelizationPass,
};

fn triangle_soup(count: usize, seed: u64) -> StaticScene {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut positions = Vec::with_capacity(count * 3);
    for _ in 0..count {
        let center = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        for _ in 0..3 {
            let offset = Vec3::new(rng.gen_range(-0.1..0.1), rng.gen_range(-0.1..0.1), rng.gen_range(-0.1..0.1));
            positions.push(center + offset);
        }
    }
    let batch = TriangleBatch {
        indices: (0..positions.len() as u32).collect(),
        positions,
        normals: Vec::new(),
        albedo: Vec4::new(0.6, 0.6, 0.6, 1.0),
    };
    match scene_from_batches(vec![batch]) {
        Ok(scene) => scene,
        Err(e) => panic!("benchmark scene is invalid: {}", e),
    }
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("svo_build");
    group.sample_size(10);

    for resolution in [32u32, 64] {
        let mut soup = VoxelizationPass::new(
            Arc::new(triangle_soup(2_000, 11)),
            VoxelizationConfig::with_resolution(resolution),
        )
        .expect("valid pass");
        group.bench_with_input(BenchmarkId::new("soup", resolution), &resolution, |b, _| {
            b.iter(|| soup.build().expect("build"))
        });

        let mut cube = VoxelizationPass::new(
            Arc::new(unit_cube_scene(Vec4::ONE)),
            VoxelizationConfig::with_resolution(resolution),
        )
        .expect("valid pass");
        group.bench_with_input(BenchmarkId::new("cube", resolution), &resolution, |b, _| {
            b.iter(|| cube.build().expect("build"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build);
criterion_main!(benches);
