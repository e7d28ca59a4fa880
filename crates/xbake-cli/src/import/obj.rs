//! Wavefront OBJ import.
//!
//! Reads `v`, `vt`, `vn` and `f`; everything else (groups, materials,
//! smoothing groups, lines) is ignored. Polygons are fan-triangulated.
//! Corners with the same `v/vt/vn` triple share one mesh vertex.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::warn;
use xbake_math::{Point2, Point3, Vec3};
use xbake_mesh::Mesh;

/// Position, texture coordinate and normal index of one face corner.
type Corner = (usize, Option<usize>, Option<usize>);

pub(super) fn load(path: &Path, name: String) -> Result<Mesh> {
    let file =
        File::open(path).with_context(|| format!("Failed to open OBJ: {}", path.display()))?;
    parse(BufReader::new(file), name)
        .with_context(|| format!("Failed to parse OBJ: {}", path.display()))
}

fn parse(reader: impl BufRead, name: String) -> Result<Mesh> {
    let mut positions: Vec<Point3> = Vec::new();
    let mut tex_coords: Vec<Point2> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();

    let mut mesh = Mesh::new(name);
    let mut vertex_uvs: Vec<Option<Point2>> = Vec::new();
    let mut vertex_normals: Vec<Option<Vec3>> = Vec::new();
    let mut corners: HashMap<Corner, u32> = HashMap::new();

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let [x, y, z] = parse_floats(&mut parts, line_no)?;
                positions.push(Point3::new(x, y, z));
            }
            "vt" => {
                let [u, v] = parse_floats(&mut parts, line_no)?;
                tex_coords.push(Point2::new(u, v));
            }
            "vn" => {
                let [x, y, z] = parse_floats(&mut parts, line_no)?;
                normals.push(Vec3::new(x, y, z));
            }
            "f" => {
                let mut face = Vec::new();
                for token in parts {
                    let corner =
                        parse_corner(token, positions.len(), tex_coords.len(), normals.len())
                            .with_context(|| format!("line {line_no}: bad face vertex '{token}'"))?;
                    let index = *corners.entry(corner).or_insert_with(|| {
                        let (vi, vti, vni) = corner;
                        mesh.positions.push(positions[vi]);
                        vertex_uvs.push(vti.map(|t| tex_coords[t]));
                        vertex_normals.push(vni.map(|n| normals[n]));
                        (mesh.positions.len() - 1) as u32
                    });
                    face.push(index);
                }
                if face.len() < 3 {
                    warn!(line = line_no, "skipping face with fewer than 3 vertices");
                    continue;
                }
                for k in 1..face.len() - 1 {
                    mesh.indices.extend([face[0], face[k], face[k + 1]]);
                }
            }
            _ => {}
        }
    }

    if mesh.indices.is_empty() {
        bail!("No faces found in OBJ file");
    }

    mesh.uvs = complete_attribute(vertex_uvs, "texture coordinates");
    mesh.normals = complete_attribute(vertex_normals, "normals");
    Ok(mesh)
}

/// Keep a per-vertex attribute only if every vertex has it.
fn complete_attribute<T>(values: Vec<Option<T>>, what: &str) -> Vec<T> {
    let present = values.iter().filter(|v| v.is_some()).count();
    if present > 0 && present < values.len() {
        warn!(
            missing = values.len() - present,
            "some face corners have no {what}; ignoring {what}"
        );
    }
    if present == values.len() {
        values.into_iter().flatten().collect()
    } else {
        Vec::new()
    }
}

fn parse_floats<'a, const N: usize>(
    parts: &mut impl Iterator<Item = &'a str>,
    line_no: usize,
) -> Result<[f64; N]> {
    let mut out = [0.0; N];
    for value in &mut out {
        let token = parts
            .next()
            .with_context(|| format!("line {line_no}: expected {N} numbers"))?;
        *value = token
            .parse()
            .with_context(|| format!("line {line_no}: invalid number '{token}'"))?;
    }
    Ok(out)
}

/// Parse `v`, `v/vt`, `v/vt/vn` or `v//vn`.
fn parse_corner(token: &str, positions: usize, tex_coords: usize, normals: usize) -> Result<Corner> {
    let mut fields = token.split('/');
    let vi = match fields.next() {
        Some(s) if !s.is_empty() => resolve_index(s, positions)?,
        _ => bail!("missing position index"),
    };
    let vti = match fields.next() {
        Some(s) if !s.is_empty() => Some(resolve_index(s, tex_coords)?),
        _ => None,
    };
    let vni = match fields.next() {
        Some(s) if !s.is_empty() => Some(resolve_index(s, normals)?),
        _ => None,
    };
    Ok((vi, vti, vni))
}

/// 1-based index, or negative index relative to the end of the list so far.
fn resolve_index(s: &str, len: usize) -> Result<usize> {
    let i: i64 = s.parse().with_context(|| format!("invalid index '{s}'"))?;
    let resolved = match i {
        i if i > 0 => i - 1,
        i if i < 0 => len as i64 + i,
        _ => bail!("index 0 is not valid in OBJ"),
    };
    if resolved < 0 || resolved >= len as i64 {
        bail!("index {i} out of range ({len} defined)");
    }
    Ok(resolved as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(src: &str) -> Result<Mesh> {
        parse(src.as_bytes(), "test".into())
    }

    #[test]
    fn test_quad_shares_vertices() {
        let mesh = parse_str(
            "# quad\n\
             o panel\n\
             v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             vn 0 0 1\n\
             usemtl none\n\
             f 1/1/1 2/2/1 3/3/1\n\
             f 1/1/1 3/3/1 4/4/1\n",
        )
        .unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert!(mesh.has_uvs());
        assert_eq!(mesh.uvs[2], Point2::new(1.0, 1.0));
        assert_eq!(mesh.normals, vec![Vec3::z(); 4]);
        assert!(mesh.validate_with_uvs().is_ok());
    }

    #[test]
    fn test_fan_triangulation_and_negative_indices() {
        let mesh = parse_str(
            "v 0 0 0\nv 2 0 0\nv 3 1 0\nv 1 2 0\nv -1 1 0\n\
             f -5 -4 -3 -2 -1\n",
        )
        .unwrap();
        assert_eq!(mesh.num_triangles(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3, 0, 3, 4]);
        assert!(!mesh.has_uvs());
    }

    #[test]
    fn test_seam_splits_vertex() {
        let mesh = parse_str(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\n\
             vt 0 0\nvt 1 0\nvt 0 1\nvt 1 1\nvt 0.5 0.5\n\
             f 1/1 2/2 3/3\n\
             f 2/5 4/4 3/3\n",
        )
        .unwrap();
        // Position 2 appears with two different UVs
        assert_eq!(mesh.num_vertices(), 5);
        assert_eq!(mesh.positions[1], mesh.positions[3]);
    }

    #[test]
    fn test_partial_uvs_are_dropped() {
        let mesh = parse_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nf 1/1 2 3\n").unwrap();
        assert!(mesh.uvs.is_empty());
    }

    #[test]
    fn test_errors_name_the_line() {
        let err = parse_str("v 0 0 0\nv 1 0 0\nf 1 2 7\n").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 3"), "{msg}");
        assert!(msg.contains("out of range"), "{msg}");

        let err = parse_str("v 0 zero 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("line 1: invalid number 'zero'"));

        assert!(parse_str("v 0 0 0\n").is_err());
        assert!(parse_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n").is_err());
    }
}
