use std::io::Read;

use rv_binio::ReadExt;

use crate::error::{Error, Result};
use crate::resolution::resolution_name;
use crate::types::{Face, FaceVertex, Format, Lod, NamedProperty, P3dFile, Vec3};

const TAGG_SIG: [u8; 4] = *b"TAGG";

fn bbox_from_vertices(vertices: &[Vec3]) -> (Vec3, Vec3, Vec3, f32) {
    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    for v in vertices {
        for axis in 0..3 {
            min[axis] = min[axis].min(v[axis]);
            max[axis] = max[axis].max(v[axis]);
        }
    }
    if vertices.is_empty() {
        min = [0.0; 3];
        max = [0.0; 3];
    }
    let center = [
        (min[0] + max[0]) / 2.0,
        (min[1] + max[1]) / 2.0,
        (min[2] + max[2]) / 2.0,
    ];
    let radius = vertices
        .iter()
        .map(|v| {
            let d = [v[0] - center[0], v[1] - center[1], v[2] - center[2]];
            (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
        })
        .fold(0.0f32, f32::max);
    (min, max, center, radius)
}

fn read_mlod_lod<R: Read>(r: &mut R, index: usize) -> Result<Lod> {
    let sig = r.read_signature()?;
    if &sig != b"P3DM" && &sig != b"SP3X" {
        return Err(Error::BadMlodSignature(sig));
    }
    let _version_major = r.read_u32()?;
    let _version_minor = r.read_u32()?;

    let point_count = r.read_u32()? as usize;
    let normal_count = r.read_u32()? as usize;
    let face_count = r.read_u32()? as usize;
    let _flags = r.read_u32()?;

    let mut vertices = Vec::with_capacity(point_count);
    for _ in 0..point_count {
        let p = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
        let _point_flags = r.read_u32()?;
        vertices.push(p);
    }

    let mut normals = Vec::with_capacity(normal_count);
    for _ in 0..normal_count {
        normals.push([r.read_f32()?, r.read_f32()?, r.read_f32()?]);
    }

    let mut face_data = Vec::with_capacity(face_count);
    let mut faces = Vec::with_capacity(face_count);
    let mut textures = std::collections::BTreeSet::new();
    let mut materials = std::collections::BTreeSet::new();

    for face in 0..face_count {
        let n_vertices = r.read_i32()?;
        if !(0..=4).contains(&n_vertices) {
            return Err(Error::InvalidFaceVertexCount {
                face,
                count: n_vertices,
            });
        }
        let n_vertices = n_vertices as usize;
        let mut slots = Vec::with_capacity(4);
        for _ in 0..4 {
            let point_index = r.read_i32()? as u32;
            let normal_index = r.read_i32()?;
            let u = r.read_f32()?;
            let v = r.read_f32()?;
            slots.push(FaceVertex {
                point_index,
                normal_index: if normal_index < 0 {
                    None
                } else {
                    Some(normal_index as u32)
                },
                uv: [u, v],
            });
        }
        slots.truncate(n_vertices);
        // Reversed to match ODOL winding order.
        slots.reverse();

        let face_flags = r.read_u32()?;
        let texture = r.read_cstring()?;
        let material = r.read_cstring()?;
        if !texture.is_empty() {
            textures.insert(texture.clone());
        }
        if !material.is_empty() {
            materials.insert(material.clone());
        }

        faces.push(slots.iter().map(|fv| fv.point_index).collect());
        face_data.push(Face {
            vertices: slots,
            flags: face_flags,
            texture,
            material,
            texture_index: None,
        });
    }

    let mut named_selections = Vec::new();
    let mut named_selection_vertices = std::collections::HashMap::new();
    let mut named_properties = Vec::new();

    loop {
        let sig = r.read_signature()?;
        if sig != TAGG_SIG {
            return Err(Error::BadTaggSignature(sig));
        }
        let _active = r.read_u8()?;
        let name = r.read_cstring()?;
        let size = r.read_u32()? as usize;

        if name == "#EndOfFile#" {
            break;
        } else if name == "#Property#" {
            let prop_name = r.read_fixed_string(64)?;
            let prop_value = r.read_fixed_string(64)?;
            named_properties.push(NamedProperty {
                name: prop_name,
                value: prop_value,
            });
        } else if let Some(selection) = name.strip_prefix('#') {
            // Any other `#`-prefixed tag is a reserved TAGG kind we don't
            // model; skip its payload.
            let _ = selection;
            r.read_bytes(size)?;
        } else {
            let membership = r.read_bytes(point_count)?;
            let mut indices: Vec<u32> = membership
                .iter()
                .enumerate()
                .filter(|&(_, &b)| b == 1)
                .map(|(i, _)| i as u32)
                .collect();
            indices.sort_unstable();
            indices.dedup();
            named_selections.push(name.clone());
            named_selection_vertices.insert(name, indices);
        }
    }

    let resolution = r.read_f32()?;

    let (bounding_box_min, bounding_box_max, bounding_center, bounding_radius) =
        bbox_from_vertices(&vertices);

    Ok(Lod {
        index,
        resolution,
        resolution_name: resolution_name(resolution),
        textures: textures.into_iter().collect(),
        materials: materials.into_iter().collect(),
        named_properties,
        named_selections,
        named_selection_vertices,
        named_selection_faces: std::collections::HashMap::new(),
        vertices,
        normals,
        uv_sets: Vec::new(),
        face_data,
        faces,
        vertex_count: point_count,
        face_count,
        bounding_box_min,
        bounding_box_max,
        bounding_center,
        bounding_radius,
    })
}

pub fn read_mlod<R: Read>(r: &mut R) -> Result<P3dFile> {
    let version = r.read_u32()?;
    let lod_count = r.read_u32()?;
    if lod_count > 10_000 {
        return Err(Error::InvalidLodCount(i64::from(lod_count)));
    }
    let mut lods = Vec::with_capacity(lod_count as usize);
    for index in 0..lod_count as usize {
        lods.push(read_mlod_lod(r, index)?);
    }
    Ok(P3dFile {
        format: Format::Mlod,
        version,
        lods,
        model_info: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn write_cstring(buf: &mut Vec<u8>, s: &str) {
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
    }

    fn build_single_triangle_lod() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"P3DM");
        buf.extend_from_slice(&0x1Cu32.to_le_bytes());
        buf.extend_from_slice(&0x100u32.to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes()); // points
        buf.extend_from_slice(&1u32.to_le_bytes()); // normals
        buf.extend_from_slice(&1u32.to_le_bytes()); // faces
        buf.extend_from_slice(&0u32.to_le_bytes()); // flags

        for p in [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
            for c in p {
                buf.extend_from_slice(&(c as f32).to_le_bytes());
            }
            buf.extend_from_slice(&0u32.to_le_bytes());
        }
        for c in [0.0f32, 0.0, 1.0] {
            buf.extend_from_slice(&c.to_le_bytes());
        }

        buf.extend_from_slice(&3i32.to_le_bytes());
        for (point_idx, (u, v)) in [(1i32, (0.0f32, 0.0f32)), (2, (1.0, 0.0)), (3, (0.0, 1.0))] {
            buf.extend_from_slice(&point_idx.to_le_bytes());
            buf.extend_from_slice(&0i32.to_le_bytes());
            buf.extend_from_slice(&u.to_le_bytes());
            buf.extend_from_slice(&v.to_le_bytes());
        }
        // fourth (unused) slot
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0f32.to_le_bytes());
        buf.extend_from_slice(&0f32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // face flags
        write_cstring(&mut buf, "tex.paa");
        write_cstring(&mut buf, "mat.rvmat");

        // TAGG: #EndOfFile#
        buf.extend_from_slice(b"TAGG");
        buf.push(1);
        write_cstring(&mut buf, "#EndOfFile#");
        buf.extend_from_slice(&0u32.to_le_bytes());

        buf.extend_from_slice(&1.0f32.to_le_bytes()); // resolution
        buf
    }

    #[test]
    fn reads_single_lod_and_reverses_face_winding() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x1Cu32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&build_single_triangle_lod());

        let mut cursor = Cursor::new(buf);
        let file = read_mlod(&mut cursor).unwrap();
        assert_eq!(file.lods.len(), 1);
        let face = &file.lods[0].face_data[0];
        let indices: Vec<u32> = face.vertices.iter().map(|v| v.point_index).collect();
        assert_eq!(indices, vec![3, 2, 1]);
        assert_eq!(face.texture, "tex.paa");
        assert_eq!(file.lods[0].resolution_name, "1.000");
    }

    #[test]
    fn rejects_out_of_range_face_vertex_count() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"P3DM");
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&5i32.to_le_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_mlod_lod(&mut cursor, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidFaceVertexCount { count: 5, .. }));
    }
}
