#![warn(missing_docs)]

//! Triangle mesh model for the xbake texture baker.
//!
//! A [`Mesh`] is an indexed triangle list with optional per-vertex
//! normals, UVs and tangents, exactly as handed over by an importer.
//! Derived vertex data needed by the baker lives in sibling modules:
//!
//! - [`normals`] - angle-weighted smoothed normals with degenerate fallback
//! - [`tangents`] - per-vertex tangent frames from UV gradients
//!
//! Meshes are immutable once a bake job starts; the only mutation offered
//! here ([`Mesh::convert_orientation`]) is meant to run once at load time.

pub mod error;
pub mod normals;
pub mod tangents;

pub use error::{MeshError, Result};
pub use normals::{face_area_vector, shading_normals, smooth_normals, SmoothNormals};
pub use tangents::{tangent_frames, TangentFrame};

use serde::{Deserialize, Serialize};
use xbake_math::{Aabb3, Point2, Point3, Transform, Vec3, Vec4};

/// Axis convention of imported meshes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisConvention {
    /// +Z up, +Y forward. The baker's internal convention.
    #[default]
    ZUp,
    /// +Y up, +Z forward (Maya and most game engines).
    YUp,
}

impl AxisConvention {
    /// Convention selected by the `use_maya_orientation` flag.
    pub fn from_maya_flag(use_maya_orientation: bool) -> Self {
        if use_maya_orientation {
            AxisConvention::YUp
        } else {
            AxisConvention::ZUp
        }
    }

    /// Transform from this convention into the internal +Z-up frame,
    /// or `None` when no conversion is needed.
    pub fn to_internal(self) -> Option<Transform> {
        match self {
            AxisConvention::ZUp => None,
            AxisConvention::YUp => Some(Transform::y_up_to_z_up()),
        }
    }
}

/// Indexed triangle mesh.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Mesh name, used for error reporting and output naming.
    pub name: String,
    /// Vertex positions.
    pub positions: Vec<Point3>,
    /// Imported vertex normals. Empty when the source had none.
    pub normals: Vec<Vec3>,
    /// Texture coordinates (UV channel 0). Empty when the source had none.
    pub uvs: Vec<Point2>,
    /// Imported tangents: xyz direction, w handedness sign. May be empty.
    pub tangents: Vec<Vec4>,
    /// Flat array of triangle indices: `[i0, i1, i2, ...]`.
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Create an empty named mesh.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Number of triangles.
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Vertex indices of triangle `t`.
    #[inline]
    pub fn triangle(&self, t: usize) -> [usize; 3] {
        [
            self.indices[t * 3] as usize,
            self.indices[t * 3 + 1] as usize,
            self.indices[t * 3 + 2] as usize,
        ]
    }

    /// Vertex positions of triangle `t`.
    #[inline]
    pub fn triangle_positions(&self, t: usize) -> [Point3; 3] {
        let [a, b, c] = self.triangle(t);
        [self.positions[a], self.positions[b], self.positions[c]]
    }

    /// True if the mesh carries a UV coordinate for every vertex.
    pub fn has_uvs(&self) -> bool {
        !self.uvs.is_empty() && self.uvs.len() == self.positions.len()
    }

    /// True if the mesh carries imported normals.
    pub fn has_normals(&self) -> bool {
        !self.normals.is_empty()
    }

    /// Axis-aligned bounds of all vertex positions.
    pub fn bounds(&self) -> Aabb3 {
        Aabb3::from_points(&self.positions)
    }

    /// Check structural integrity.
    ///
    /// Attribute arrays are optional, but when present they must have one
    /// entry per vertex.
    pub fn validate(&self) -> Result<()> {
        if self.indices.is_empty() {
            return Err(MeshError::Empty(self.name.clone()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(MeshError::NotTriangulated {
                name: self.name.clone(),
                len: self.indices.len(),
            });
        }

        let vertices = self.positions.len();
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertices) {
            return Err(MeshError::IndexOutOfRange {
                name: self.name.clone(),
                index,
                vertices,
            });
        }

        let attributes = [
            ("normal", self.normals.len()),
            ("uv", self.uvs.len()),
            ("tangent", self.tangents.len()),
        ];
        for (attribute, len) in attributes {
            if len != 0 && len != vertices {
                return Err(MeshError::AttributeLength {
                    name: self.name.clone(),
                    attribute,
                    len,
                    expected: vertices,
                });
            }
        }

        if let Some(vertex) = self
            .positions
            .iter()
            .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
        {
            return Err(MeshError::NonFinite {
                name: self.name.clone(),
                vertex,
            });
        }

        Ok(())
    }

    /// [`Mesh::validate`] plus the UV requirement of a bake target.
    pub fn validate_with_uvs(&self) -> Result<()> {
        self.validate()?;
        if !self.has_uvs() {
            return Err(MeshError::MissingUvs(self.name.clone()));
        }
        Ok(())
    }

    /// Apply an affine transform to positions, normals and tangents.
    pub fn apply_transform(&mut self, transform: &Transform) {
        for p in &mut self.positions {
            *p = transform.apply_point(p);
        }
        for n in &mut self.normals {
            *n = transform.apply_normal(n);
        }
        for t in &mut self.tangents {
            let dir = transform.apply_vec(&t.xyz());
            *t = Vec4::new(dir.x, dir.y, dir.z, t.w);
        }
    }

    /// Bring the mesh from `convention` into the internal +Z-up frame.
    pub fn convert_orientation(&mut self, convention: AxisConvention) {
        if let Some(transform) = convention.to_internal() {
            self.apply_transform(&transform);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_meshes::{cube, quad};
    use super::*;

    #[test]
    fn test_counts_and_bounds() {
        let mesh = cube();
        assert_eq!(mesh.num_triangles(), 12);
        assert_eq!(mesh.num_vertices(), 8);
        let bounds = mesh.bounds();
        assert_eq!(bounds.min, Point3::origin());
        assert_eq!(bounds.max, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_validate_ok() {
        assert!(quad().validate_with_uvs().is_ok());
        assert!(cube().validate().is_ok());
    }

    #[test]
    fn test_validate_missing_uvs() {
        let err = cube().validate_with_uvs().unwrap_err();
        assert_eq!(err, MeshError::MissingUvs("cube".into()));
    }

    #[test]
    fn test_validate_bad_index() {
        let mut mesh = quad();
        mesh.indices[4] = 9;
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::IndexOutOfRange { index: 9, .. })
        ));
    }

    #[test]
    fn test_validate_not_triangulated() {
        let mut mesh = quad();
        mesh.indices.pop();
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::NotTriangulated { len: 5, .. })
        ));
    }

    #[test]
    fn test_validate_attribute_length() {
        let mut mesh = quad();
        mesh.normals = vec![Vec3::z(); 3];
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::AttributeLength {
                attribute: "normal",
                len: 3,
                expected: 4,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_empty_and_nan() {
        assert!(matches!(
            Mesh::new("nothing").validate(),
            Err(MeshError::Empty(_))
        ));

        let mut mesh = quad();
        mesh.positions[2].z = f64::NAN;
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::NonFinite { vertex: 2, .. })
        ));
    }

    #[test]
    fn test_convert_orientation_y_up() {
        let mut mesh = quad();
        mesh.normals = vec![Vec3::y(); 4];
        mesh.positions[2] = Point3::new(1.0, 2.0, 3.0);
        mesh.convert_orientation(AxisConvention::YUp);

        assert_eq!(mesh.positions[2], Point3::new(-1.0, 3.0, 2.0));
        assert!((mesh.normals[0] - Vec3::z()).norm() < 1e-12);
        // UVs and indices are untouched
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.uvs[2], Point2::new(1.0, 1.0));
    }

    #[test]
    fn test_convert_orientation_z_up_is_noop() {
        let mut mesh = cube();
        let before = mesh.positions.clone();
        mesh.convert_orientation(AxisConvention::ZUp);
        assert_eq!(mesh.positions, before);
    }
}
