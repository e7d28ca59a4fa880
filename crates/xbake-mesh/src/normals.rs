//! Smoothed vertex normals.
//!
//! The cage is extruded along these normals, so they must be continuous
//! across shared edges. Each adjacent face contributes its unit normal
//! weighted by the corner angle at the vertex (Thürmer & Wüthrich), which
//! keeps the result independent of how a polygon was split into triangles.
//! Vertices split at UV seams or hard edges but sharing a position pool
//! their contributions, so the cage does not tear along seams.

use std::collections::HashMap;

use xbake_math::{Dir3, Point3, Vec3};

use crate::Mesh;

/// Per-vertex smoothed normals. `None` marks a degenerate vertex.
#[derive(Debug, Clone)]
pub struct SmoothNormals {
    /// One entry per mesh vertex.
    pub normals: Vec<Option<Dir3>>,
}

impl SmoothNormals {
    /// Normal of vertex `v`, if it has one.
    #[inline]
    pub fn get(&self, v: usize) -> Option<Dir3> {
        self.normals[v]
    }

    /// Indices of vertices without a valid normal.
    pub fn degenerate_vertices(&self) -> Vec<u32> {
        self.normals
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_none())
            .map(|(i, _)| i as u32)
            .collect()
    }
}

/// Cross product of two triangle edges: twice the area, along the face normal.
#[inline]
pub fn face_area_vector(a: &Point3, b: &Point3, c: &Point3) -> Vec3 {
    (b - a).cross(&(c - a))
}

/// Interior angle at `a` in triangle `(a, b, c)`, or 0 for a collapsed corner.
fn corner_angle(a: &Point3, b: &Point3, c: &Point3) -> f64 {
    let e1 = b - a;
    let e2 = c - a;
    let denom = e1.norm() * e2.norm();
    if denom <= f64::MIN_POSITIVE {
        return 0.0;
    }
    (e1.dot(&e2) / denom).clamp(-1.0, 1.0).acos()
}

/// Compute angle-weighted smoothed normals.
///
/// Fallback order per vertex: angle-weighted sum, unweighted sum of the
/// adjacent unit face normals, the imported normal. A vertex for which all
/// three vanish (isolated, or surrounded only by zero-area faces without an
/// imported normal) is reported as `None`.
pub fn smooth_normals(mesh: &Mesh) -> SmoothNormals {
    let n = mesh.num_vertices();
    let mut weighted = vec![Vec3::zeros(); n];
    let mut unweighted = vec![Vec3::zeros(); n];

    for t in 0..mesh.num_triangles() {
        let idx = mesh.triangle(t);
        let [a, b, c] = mesh.triangle_positions(t);
        let Some(face) = face_area_vector(&a, &b, &c).try_normalize(f64::MIN_POSITIVE) else {
            continue;
        };

        let angles = [
            corner_angle(&a, &b, &c),
            corner_angle(&b, &c, &a),
            corner_angle(&c, &a, &b),
        ];
        for (k, &vi) in idx.iter().enumerate() {
            weighted[vi] += face * angles[k];
            unweighted[vi] += face;
        }
    }

    weld_coincident(&mesh.positions, &mut weighted);
    weld_coincident(&mesh.positions, &mut unweighted);

    let normals = (0..n)
        .map(|v| {
            Dir3::try_new(weighted[v], 1e-12)
                .or_else(|| Dir3::try_new(unweighted[v], 1e-12))
                .or_else(|| {
                    mesh.normals
                        .get(v)
                        .and_then(|imported| Dir3::try_new(*imported, 1e-12))
                })
        })
        .collect();

    SmoothNormals { normals }
}

/// Bit pattern of a position, with `-0.0` folded into `0.0`.
fn position_key(p: &Point3) -> [u64; 3] {
    [p.x, p.y, p.z].map(|c| (c + 0.0).to_bits())
}

/// Replace each vertex's sum with the total over all vertices at the same position.
fn weld_coincident(positions: &[Point3], sums: &mut [Vec3]) {
    let mut totals: HashMap<[u64; 3], Vec3> = HashMap::with_capacity(positions.len());
    for (p, s) in positions.iter().zip(sums.iter()) {
        *totals.entry(position_key(p)).or_insert_with(Vec3::zeros) += s;
    }
    for (p, s) in positions.iter().zip(sums.iter_mut()) {
        *s = totals[&position_key(p)];
    }
}

/// Normals used for shading frames: imported normals where present and
/// usable, otherwise the smoothed normal, otherwise zero.
pub fn shading_normals(mesh: &Mesh, smooth: &SmoothNormals) -> Vec<Vec3> {
    (0..mesh.num_vertices())
        .map(|v| {
            mesh.normals
                .get(v)
                .and_then(|n| n.try_normalize(1e-12))
                .or_else(|| smooth.get(v).map(|d| d.into_inner()))
                .unwrap_or_else(Vec3::zeros)
        })
        .collect()
}
