//! Mesh importers.
//!
//! The file stem becomes the mesh name, which drives output naming
//! (`crate_low.glb` + `crate_high.obj` bake to `crate_normal.png`, ...).

mod gltf;
mod obj;

use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;
use xbake_mesh::Mesh;

/// Load a mesh, picking the importer from the file extension.
pub fn load_mesh(path: &Path) -> Result<Mesh> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let mesh = match ext.as_deref() {
        Some("gltf") | Some("glb") => self::gltf::load(path, name)?,
        Some("obj") => self::obj::load(path, name)?,
        _ => bail!(
            "Unsupported mesh format: {} (expected .gltf, .glb or .obj)",
            path.display()
        ),
    };

    info!(
        path = %path.display(),
        vertices = mesh.num_vertices(),
        triangles = mesh.num_triangles(),
        uvs = mesh.has_uvs(),
        normals = mesh.has_normals(),
        "loaded mesh"
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_extension() {
        let err = load_mesh(Path::new("model.fbx")).unwrap_err();
        assert!(err.to_string().contains("Unsupported mesh format"));
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Panel_Low.OBJ");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mesh = load_mesh(&path).unwrap();
        assert_eq!(mesh.name, "Panel_Low");
        assert_eq!(mesh.num_triangles(), 1);
    }
}
