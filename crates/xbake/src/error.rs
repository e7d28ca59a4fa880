//! Error types for the baking engine.

use std::fmt;

use thiserror::Error;
use xbake_mesh::MeshError;

/// Which of the two input meshes an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshRole {
    /// The UV-unwrapped bake target.
    LowPoly,
    /// The detailed reference mesh.
    HighPoly,
    /// An explicit projection cage.
    Cage,
}

impl fmt::Display for MeshRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshRole::LowPoly => f.write_str("low-poly"),
            MeshRole::HighPoly => f.write_str("high-poly"),
            MeshRole::Cage => f.write_str("cage"),
        }
    }
}

/// Fatal errors that abort a bake job.
///
/// Degenerate geometry and ray misses are not errors; they are collected in
/// the [`BakeReport`](crate::BakeReport) instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BakeError {
    /// An input mesh failed validation.
    #[error("{role} input rejected: {source}")]
    Mesh {
        /// Which mesh was rejected.
        role: MeshRole,
        /// The validation failure.
        #[source]
        source: MeshError,
    },

    /// The cage mesh does not share the low-poly topology.
    #[error("cage does not match the low-poly mesh: {0}")]
    CageMismatch(String),

    /// Invalid bake settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The job was cancelled before all tiles completed.
    #[error("bake cancelled")]
    Cancelled,
}

impl BakeError {
    pub(crate) fn mesh(role: MeshRole) -> impl FnOnce(MeshError) -> Self {
        move |source| BakeError::Mesh { role, source }
    }
}

/// Result type for baking operations.
pub type Result<T> = std::result::Result<T, BakeError>;
