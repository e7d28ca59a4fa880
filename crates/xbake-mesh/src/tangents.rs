//! Per-vertex tangent frames.
//!
//! Tangent-space normal maps are expressed relative to the frame
//! `(T, B, N)` where `T` follows increasing U and `B` increasing V.
//! Frames are accumulated from per-triangle UV gradients (Lengyel,
//! "Computing Tangent Space Basis Vectors for an Arbitrary Mesh"),
//! orthogonalized against the shading normal, and carry a handedness
//! sign so mirrored UV islands produce a flipped bitangent.

use xbake_math::{orthonormal_basis, Dir3, Vec3};

use crate::Mesh;

/// Tangent and bitangent handedness for one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TangentFrame {
    /// Unit tangent, orthogonal to the vertex shading normal.
    pub tangent: Vec3,
    /// +1 or -1; bitangent = `sign * normal x tangent`.
    pub sign: f64,
}

impl TangentFrame {
    /// Bitangent for this frame given the shading normal.
    #[inline]
    pub fn bitangent(&self, normal: &Vec3) -> Vec3 {
        normal.cross(&self.tangent) * self.sign
    }
}

/// Compute tangent frames for every vertex.
///
/// Imported tangents are used as-is (re-orthogonalized) when the mesh has
/// them. `normals` are the shading normals (see
/// [`shading_normals`](crate::shading_normals)). Vertices without a usable
/// UV gradient get an arbitrary frame around their normal.
pub fn tangent_frames(mesh: &Mesh, normals: &[Vec3]) -> Vec<TangentFrame> {
    let n = mesh.num_vertices();

    if !mesh.tangents.is_empty() {
        return (0..n)
            .map(|v| {
                let t = mesh.tangents[v];
                let sign = if t.w < 0.0 { -1.0 } else { 1.0 };
                orthogonalize(&normals[v], &t.xyz(), sign)
            })
            .collect();
    }

    let mut tan1 = vec![Vec3::zeros(); n];
    let mut tan2 = vec![Vec3::zeros(); n];

    if mesh.has_uvs() {
        for t in 0..mesh.num_triangles() {
            let [i0, i1, i2] = mesh.triangle(t);
            let [p0, p1, p2] = mesh.triangle_positions(t);
            let (w0, w1, w2) = (mesh.uvs[i0], mesh.uvs[i1], mesh.uvs[i2]);

            let e1 = p1 - p0;
            let e2 = p2 - p0;
            let (s1, t1) = (w1.x - w0.x, w1.y - w0.y);
            let (s2, t2) = (w2.x - w0.x, w2.y - w0.y);

            let det = s1 * t2 - s2 * t1;
            if det.abs() < 1e-20 {
                continue;
            }
            let r = 1.0 / det;
            let sdir = (e1 * t2 - e2 * t1) * r;
            let tdir = (e2 * s1 - e1 * s2) * r;

            for vi in [i0, i1, i2] {
                tan1[vi] += sdir;
                tan2[vi] += tdir;
            }
        }
    }

    (0..n)
        .map(|v| {
            let normal = &normals[v];
            let sign = if normal.cross(&tan1[v]).dot(&tan2[v]) < 0.0 {
                -1.0
            } else {
                1.0
            };
            orthogonalize(normal, &tan1[v], sign)
        })
        .collect()
}

/// Gram-Schmidt `tangent` against `normal`, falling back to an arbitrary
/// perpendicular when the projection vanishes.
fn orthogonalize(normal: &Vec3, tangent: &Vec3, sign: f64) -> TangentFrame {
    let projected = tangent - normal * normal.dot(tangent);
    let tangent = match projected.try_normalize(1e-12) {
        Some(t) => t,
        None => match Dir3::try_new(*normal, 1e-12) {
            Some(n) => orthonormal_basis(&n).0,
            None => Vec3::x(),
        },
    };
    TangentFrame { tangent, sign }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normals::{shading_normals, smooth_normals};
    use crate::test_meshes::{cube, quad};
    use xbake_math::{Point2, Vec4};

    fn frames(mesh: &Mesh) -> (Vec<Vec3>, Vec<TangentFrame>) {
        let normals = shading_normals(mesh, &smooth_normals(mesh));
        let frames = tangent_frames(mesh, &normals);
        (normals, frames)
    }

    #[test]
    fn test_quad_frame_follows_uv_axes() {
        let (normals, frames) = frames(&quad());
        for (n, f) in normals.iter().zip(&frames) {
            assert!((f.tangent - Vec3::x()).norm() < 1e-12);
            assert_eq!(f.sign, 1.0);
            assert!((f.bitangent(n) - Vec3::y()).norm() < 1e-12);
        }
    }

    #[test]
    fn test_mirrored_uvs_flip_sign() {
        let mut mesh = quad();
        for uv in &mut mesh.uvs {
            *uv = Point2::new(1.0 - uv.x, uv.y);
        }
        let (normals, frames) = frames(&mesh);
        for (n, f) in normals.iter().zip(&frames) {
            assert!((f.tangent + Vec3::x()).norm() < 1e-12);
            assert_eq!(f.sign, -1.0);
            // V still increases along +Y
            assert!((f.bitangent(n) - Vec3::y()).norm() < 1e-12);
        }
    }

    #[test]
    fn test_imported_tangents_are_orthogonalized() {
        let mut mesh = quad();
        mesh.tangents = vec![Vec4::new(1.0, 0.0, 0.5, -1.0); 4];
        let (_, frames) = frames(&mesh);
        assert!((frames[0].tangent - Vec3::x()).norm() < 1e-12);
        assert_eq!(frames[0].sign, -1.0);
    }

    #[test]
    fn test_missing_uvs_give_orthonormal_fallback() {
        let (normals, frames) = frames(&cube());
        for (n, f) in normals.iter().zip(&frames) {
            assert!((f.tangent.norm() - 1.0).abs() < 1e-12);
            assert!(f.tangent.dot(n).abs() < 1e-12);
        }
    }
}
