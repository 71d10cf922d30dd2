//! Benchmarks for the weld and edge collapse passes

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use decimesh_core::{Point3f, TriangleMesh};
use decimesh_simplification::{weld, EdgeCollapseSimplifier, MeshSimplifier, WeldOptions};

fn generate_grid_mesh(size: usize) -> TriangleMesh {
    let mut vertices = Vec::with_capacity(size * size);
    for y in 0..size {
        for x in 0..size {
            let fx = x as f32 / (size - 1) as f32 * std::f32::consts::PI;
            let fy = y as f32 / (size - 1) as f32 * std::f32::consts::PI;
            vertices.push(Point3f::new(x as f32, y as f32, (fx.sin() * fy.sin()) * 2.0));
        }
    }
    let mut faces = Vec::with_capacity((size - 1) * (size - 1) * 2);
    for y in 0..(size - 1) {
        for x in 0..(size - 1) {
            let tl = y * size + x;
            let tr = tl + 1;
            let bl = (y + 1) * size + x;
            let br = bl + 1;
            faces.push([tl, bl, tr]);
            faces.push([tr, bl, br]);
        }
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

/// Expand an indexed mesh into a triangle soup, the shape the weld pass undoes
fn unweld(mesh: &TriangleMesh) -> TriangleMesh {
    let vertices = mesh.faces.iter().flatten().map(|&v| mesh.vertices[v]).collect();
    let faces = (0..mesh.faces.len()).map(|t| [3 * t, 3 * t + 1, 3 * t + 2]).collect();
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

fn bench_simplification(c: &mut Criterion) {
    let sizes = [10, 20, 40];
    let ratios = [0.3f32, 0.5, 0.7];
    let simplifier = EdgeCollapseSimplifier::new();

    let mut group = c.benchmark_group("edge_collapse");
    for &size in &sizes {
        let mesh = generate_grid_mesh(size);
        let face_count = mesh.face_count();

        for &ratio in &ratios {
            group.bench_with_input(
                BenchmarkId::new("qem", format!("{}f_r{}", face_count, (ratio * 100.0) as u32)),
                &(&mesh, ratio),
                |b, &(mesh, ratio)| {
                    b.iter(|| {
                        let result = simplifier.simplify(black_box(mesh), ratio, 0.05).unwrap();
                        black_box(result);
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_weld(c: &mut Criterion) {
    let mut group = c.benchmark_group("weld");
    for size in [20, 80] {
        let soup = unweld(&generate_grid_mesh(size));
        group.bench_with_input(BenchmarkId::from_parameter(soup.vertex_count()), &soup, |b, soup| {
            b.iter(|| black_box(weld(black_box(soup), &WeldOptions::default())));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_simplification, bench_weld);
criterion_main!(benches);
