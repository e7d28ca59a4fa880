//! glTF 2.0 import (`.gltf` with external or embedded buffers, `.glb`).
//!
//! All triangle primitives of the first mesh are merged into one [`Mesh`].
//! Node transforms are not applied: both bake inputs are expected to share
//! the same local space. An optional attribute is kept only when every
//! primitive provides it.

use std::path::Path;

use anyhow::{bail, Context, Result};
use gltf::mesh::Mode;
use tracing::warn;
use xbake_math::{Point2, Point3, Vec3, Vec4};
use xbake_mesh::Mesh;

pub(super) fn load(path: &Path, name: String) -> Result<Mesh> {
    let (document, buffers, _images) = gltf::import(path)
        .with_context(|| format!("Failed to load glTF: {}", path.display()))?;

    let source = document
        .meshes()
        .next()
        .with_context(|| format!("No meshes found in {}", path.display()))?;
    let mesh_count = document.meshes().count();
    if mesh_count > 1 {
        warn!(
            path = %path.display(),
            meshes = mesh_count,
            "glTF has several meshes; only the first is used"
        );
    }

    let mut mesh = Mesh::new(name);
    let (mut all_uvs, mut all_normals, mut all_tangents) = (true, true, true);

    for primitive in source.primitives() {
        if primitive.mode() != Mode::Triangles {
            bail!(
                "Primitive {} of mesh '{}' uses {:?}; only triangle lists are supported",
                primitive.index(),
                source.name().unwrap_or_default(),
                primitive.mode()
            );
        }
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let base = mesh.positions.len() as u32;
        let positions: Vec<[f32; 3]> = reader
            .read_positions()
            .with_context(|| format!("Primitive {} has no positions", primitive.index()))?
            .collect();
        let count = positions.len();
        mesh.positions
            .extend(positions.iter().map(|p| Point3::new(p[0].into(), p[1].into(), p[2].into())));

        match reader.read_indices() {
            Some(indices) => mesh.indices.extend(indices.into_u32().map(|i| base + i)),
            None => mesh.indices.extend(base..base + count as u32),
        }

        // glTF puts the UV origin top-left; the baker's is bottom-left
        match reader.read_tex_coords(0) {
            Some(uvs) if all_uvs => mesh
                .uvs
                .extend(uvs.into_f32().map(|t| Point2::new(t[0].into(), 1.0 - f64::from(t[1])))),
            Some(_) => {}
            None => all_uvs = false,
        }
        match reader.read_normals() {
            Some(normals) if all_normals => mesh
                .normals
                .extend(normals.map(|n| Vec3::new(n[0].into(), n[1].into(), n[2].into()))),
            Some(_) => {}
            None => all_normals = false,
        }
        // glTF bitangents already point toward image-up, which is +V after the flip
        match reader.read_tangents() {
            Some(tangents) if all_tangents => mesh
                .tangents
                .extend(tangents.map(|t| Vec4::new(t[0].into(), t[1].into(), t[2].into(), t[3].into()))),
            Some(_) => {}
            None => all_tangents = false,
        }
    }

    if !all_uvs {
        mesh.uvs.clear();
    }
    if !all_normals {
        mesh.normals.clear();
    }
    if !all_tangents || mesh.normals.is_empty() {
        mesh.tangents.clear();
    }
    Ok(mesh)
}
