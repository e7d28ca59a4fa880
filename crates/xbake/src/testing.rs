//! Mesh fixtures shared by the engine tests.

use std::f64::consts::PI;

use xbake_math::{Point2, Point3};
use xbake_mesh::Mesh;

/// Unit quad in the plane `z = height`, UVs covering `[0, 1]^2`.
pub fn quad(name: &str, height: f64) -> Mesh {
    Mesh {
        name: name.into(),
        positions: vec![
            Point3::new(0.0, 0.0, height),
            Point3::new(1.0, 0.0, height),
            Point3::new(1.0, 1.0, height),
            Point3::new(0.0, 1.0, height),
        ],
        uvs: vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
        ],
        indices: vec![0, 1, 2, 0, 2, 3],
        ..Default::default()
    }
}

/// Outward-wound UV sphere centered at the origin.
///
/// Each pole is split into one vertex per segment so every cap triangle
/// has its own UV wedge. The seam column is duplicated.
pub fn uv_sphere(name: &str, radius: f64, segments: usize, rings: usize) -> Mesh {
    let mut mesh = Mesh::new(name);
    let row = segments + 1;

    for i in 1..rings {
        let theta = PI * i as f64 / rings as f64;
        for j in 0..=segments {
            let phi = 2.0 * PI * j as f64 / segments as f64;
            mesh.positions.push(Point3::new(
                radius * theta.sin() * phi.cos(),
                radius * theta.sin() * phi.sin(),
                radius * theta.cos(),
            ));
            mesh.uvs.push(Point2::new(
                j as f64 / segments as f64,
                1.0 - i as f64 / rings as f64,
            ));
        }
    }
    let ring = |i: usize, j: usize| ((i - 1) * row + j) as u32;

    let north = mesh.positions.len();
    for j in 0..segments {
        mesh.positions.push(Point3::new(0.0, 0.0, radius));
        mesh.uvs.push(Point2::new((j as f64 + 0.5) / segments as f64, 1.0));
    }
    let south = mesh.positions.len();
    for j in 0..segments {
        mesh.positions.push(Point3::new(0.0, 0.0, -radius));
        mesh.uvs.push(Point2::new((j as f64 + 0.5) / segments as f64, 0.0));
    }

    for j in 0..segments {
        mesh.indices
            .extend([(north + j) as u32, ring(1, j), ring(1, j + 1)]);
        mesh.indices
            .extend([ring(rings - 1, j), (south + j) as u32, ring(rings - 1, j + 1)]);
    }
    for i in 1..rings - 1 {
        for j in 0..segments {
            let (a, b) = (ring(i, j), ring(i, j + 1));
            let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
            mesh.indices.extend([a, c, b, b, c, d]);
        }
    }
    mesh
}

/// Floor quad at `z = 0` flanked by two unit-height walls at `x = 0` and
/// `x = 1` (separate vertices, so the floor normals stay vertical).
pub fn trough(name: &str) -> Mesh {
    let mut mesh = quad(name, 0.0);
    mesh.uvs.clear();
    for x in [0.0, 1.0] {
        let base = mesh.positions.len() as u32;
        mesh.positions.extend([
            Point3::new(x, -1.0, 0.0),
            Point3::new(x, 2.0, 0.0),
            Point3::new(x, 2.0, 1.0),
            Point3::new(x, -1.0, 1.0),
        ]);
        mesh.indices
            .extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}
