//! Error types for mesh validation.

use thiserror::Error;

/// Errors that make a mesh unusable for baking.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// Mesh has no triangles.
    #[error("mesh '{0}' has no triangles")]
    Empty(String),

    /// Index buffer length is not a multiple of three.
    #[error("mesh '{name}' has {len} indices, which is not a multiple of 3")]
    NotTriangulated {
        /// Mesh name.
        name: String,
        /// Index buffer length.
        len: usize,
    },

    /// A triangle references a vertex that does not exist.
    #[error("mesh '{name}' index {index} out of range ({vertices} vertices)")]
    IndexOutOfRange {
        /// Mesh name.
        name: String,
        /// Offending index value.
        index: u32,
        /// Vertex count.
        vertices: usize,
    },

    /// A per-vertex attribute array does not match the position count.
    #[error("mesh '{name}' attribute '{attribute}' has {len} entries, expected {expected}")]
    AttributeLength {
        /// Mesh name.
        name: String,
        /// Attribute name (`normal`, `uv`, `tangent`).
        attribute: &'static str,
        /// Actual length.
        len: usize,
        /// Expected length (vertex count).
        expected: usize,
    },

    /// A vertex position is NaN or infinite.
    #[error("mesh '{name}' vertex {vertex} has a non-finite position")]
    NonFinite {
        /// Mesh name.
        name: String,
        /// Vertex index.
        vertex: usize,
    },

    /// The mesh has no UV coordinates.
    #[error("mesh '{0}' has no UV coordinates")]
    MissingUvs(String),
}

/// Result type for mesh operations.
pub type Result<T> = std::result::Result<T, MeshError>;
