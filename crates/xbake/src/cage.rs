//! Projection cage.
//!
//! The cage is the low-poly surface pushed outward along its smoothed
//! normals, or a user-supplied mesh with the same topology. Projection rays
//! start on the cage and travel back inward, so the cage has to enclose the
//! high-poly detail for every low-poly triangle.

use xbake_math::{Aabb3, Dir3, Point3};
use xbake_mesh::{Mesh, SmoothNormals};

use crate::error::{BakeError, Result};

/// Extruded low-poly vertices.
#[derive(Debug, Clone)]
pub struct Cage {
    extrusion: f64,
    positions: Vec<Point3>,
    normals: Vec<Option<Dir3>>,
    offsets: Vec<f64>,
}

impl Cage {
    /// Extrude every vertex of `mesh` by `extrusion` along its smoothed
    /// normal. Degenerate vertices (no normal) stay in place.
    pub fn build(mesh: &Mesh, normals: &SmoothNormals, extrusion: f64) -> Self {
        let mut cage = Self {
            extrusion,
            positions: mesh.positions.clone(),
            normals: normals.normals.clone(),
            offsets: vec![extrusion; mesh.num_vertices()],
        };
        cage.extrude(mesh);
        cage
    }

    /// Use the vertices of `cage_mesh` as the cage of `mesh`.
    ///
    /// Both meshes must share vertex count and triangle indices. Each cage
    /// normal points from the low-poly vertex to its cage vertex; where the
    /// two coincide the smoothed normal is used instead.
    pub fn from_mesh(mesh: &Mesh, cage_mesh: &Mesh, normals: &SmoothNormals) -> Result<Self> {
        if cage_mesh.num_vertices() != mesh.num_vertices() {
            return Err(BakeError::CageMismatch(format!(
                "{} vertices, low-poly has {}",
                cage_mesh.num_vertices(),
                mesh.num_vertices()
            )));
        }
        if cage_mesh.indices != mesh.indices {
            return Err(BakeError::CageMismatch(
                "triangle indices differ from the low-poly mesh".into(),
            ));
        }

        let mut cage_normals = Vec::with_capacity(mesh.num_vertices());
        let mut offsets = Vec::with_capacity(mesh.num_vertices());
        for (v, (low, high)) in mesh.positions.iter().zip(&cage_mesh.positions).enumerate() {
            let offset = high - low;
            cage_normals.push(Dir3::try_new(offset, 1e-12).or(normals.normals[v]));
            offsets.push(offset.norm());
        }
        Ok(Self {
            extrusion: offsets.iter().copied().fold(0.0, f64::max),
            positions: cage_mesh.positions.clone(),
            normals: cage_normals,
            offsets,
        })
    }

    /// Scale the shared extrusion per vertex and re-extrude.
    ///
    /// `scales` must have one entry per vertex; missing entries keep their
    /// current offset.
    pub fn with_scales(mut self, mesh: &Mesh, scales: &[f64]) -> Self {
        for (dst, &s) in self.offsets.iter_mut().zip(scales) {
            *dst = self.extrusion * s;
        }
        self.extrude(mesh);
        self
    }

    fn extrude(&mut self, mesh: &Mesh) {
        for v in 0..self.positions.len() {
            self.positions[v] = match self.normals[v] {
                Some(n) => mesh.positions[v] + n.into_inner() * self.offsets[v],
                None => {
                    self.offsets[v] = 0.0;
                    mesh.positions[v]
                }
            };
        }
    }

    /// Shared extrusion distance. For a cage taken from a mesh, the largest
    /// vertex offset.
    pub fn extrusion(&self) -> f64 {
        self.extrusion
    }

    /// Extruded position of vertex `v`.
    #[inline]
    pub fn position(&self, v: usize) -> Point3 {
        self.positions[v]
    }

    /// Outward cage normal of vertex `v`, `None` for degenerate vertices.
    #[inline]
    pub fn normal(&self, v: usize) -> Option<Dir3> {
        self.normals[v]
    }

    /// Distance between vertex `v` and its cage position.
    pub fn offset(&self, v: usize) -> f64 {
        self.offsets[v]
    }

    /// Bounds of the cage vertices.
    pub fn bounds(&self) -> Aabb3 {
        Aabb3::from_points(&self.positions)
    }

    /// Number of cage vertices.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True for a cage over an empty mesh.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
