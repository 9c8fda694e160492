use std::io::Read;

use rv_binio::ReadExt;

use crate::error::Result;
use crate::resolution::resolution_name;
use crate::types::{Face, FaceVertex, Format, Lod, LodRoles, ModelInfo, NamedProperty, P3dFile, Vec3};

/// Reads a v7 "compressed array": a `u32` element count followed by the
/// array body, LZSS-framed above 1024 bytes and raw below it.
fn read_compressed_array_v7<R: Read>(r: &mut R, elem_size: usize) -> Result<(u32, Vec<u8>)> {
    let count = r.read_u32()?;
    let data = rv_lzss::decompress_or_raw_from_reader(r, count as usize * elem_size)?;
    Ok((count, data))
}

fn skip_compressed_array_v7<R: Read>(r: &mut R, elem_size: usize) -> Result<u32> {
    let (count, _) = read_compressed_array_v7(r, elem_size)?;
    Ok(count)
}

fn read_vec3_array<R: Read>(r: &mut R) -> Result<Vec<Vec3>> {
    let count = r.read_u32()? as usize;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push([r.read_f32()?, r.read_f32()?, r.read_f32()?]);
    }
    Ok(out)
}

fn read_string_array<R: Read>(r: &mut R) -> Result<Vec<String>> {
    let count = r.read_u32()? as usize;
    (0..count).map(|_| r.read_cstring()).collect()
}

fn read_named_properties<R: Read>(r: &mut R) -> Result<Vec<NamedProperty>> {
    let count = r.read_u32()? as usize;
    (0..count)
        .map(|_| {
            Ok(NamedProperty {
                name: r.read_cstring()?,
                value: r.read_cstring()?,
            })
        })
        .collect()
}

fn skip_named_sections<R: Read>(
    r: &mut R,
) -> Result<(Vec<String>, std::collections::HashMap<String, Vec<u32>>)> {
    let count = r.read_u32()? as usize;
    let mut names = Vec::with_capacity(count);
    let mut selection_vertices = std::collections::HashMap::new();

    for _ in 0..count {
        let name = r.read_cstring()?;
        skip_compressed_array_v7(r, 2)?; // selected faces
        skip_compressed_array_v7(r, 1)?; // face weights
        skip_compressed_array_v7(r, 2)?; // face indices
        let _need_selection = r.read_u8()?;
        skip_compressed_array_v7(r, 2)?; // face selection indices 2

        let (vertex_count, vertex_bytes) = read_compressed_array_v7(r, 2)?;
        let vertices: Vec<u16> = vertex_bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let (_, weight_bytes) = read_compressed_array_v7(r, 1)?;

        let mut selected = Vec::new();
        for i in 0..vertex_count as usize {
            if weight_bytes.get(i).copied().unwrap_or(0) != 0 {
                selected.push(u32::from(vertices[i]));
            }
        }
        selected.sort_unstable();
        selected.dedup();
        names.push(name.clone());
        selection_vertices.insert(name, selected);
    }

    Ok((names, selection_vertices))
}

/// Proxy records (named attachment points) aren't modeled in [`Lod`];
/// skipped as raw bytes once their shape is known.
fn skip_proxies<R: Read>(r: &mut R) -> Result<()> {
    let count = r.read_u32()? as usize;
    for _ in 0..count {
        let _name = r.read_cstring()?;
        r.read_bytes(48)?; // 3x4 transform matrix
        let _index = r.read_i32()?;
    }
    Ok(())
}

fn read_odol7_lod<R: Read>(r: &mut R, index: usize) -> Result<Lod> {
    let vertex_count = skip_compressed_array_v7(r, 4)? as usize; // per-vertex flags

    let (uv_count, uv_bytes) = read_compressed_array_v7(r, 8)?;
    let mut uvs = Vec::with_capacity(uv_count as usize);
    for c in uv_bytes.chunks_exact(8) {
        let u = f32::from_le_bytes([c[0], c[1], c[2], c[3]]);
        let v = f32::from_le_bytes([c[4], c[5], c[6], c[7]]);
        uvs.push([u, v]);
    }

    let vertices = read_vec3_array(r)?;
    let normals = read_vec3_array(r)?;

    r.read_bytes(8)?; // hint flags

    let bounding_box_min = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bounding_box_max = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bounding_center = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bounding_radius = r.read_f32()?;

    let textures = read_string_array(r)?;

    skip_compressed_array_v7(r, 2)?; // pointToVertices
    skip_compressed_array_v7(r, 2)?; // vertexToPoints

    let face_count = r.read_u32()? as usize;
    let mut face_data = Vec::with_capacity(face_count);
    let mut faces = Vec::with_capacity(face_count);
    for _ in 0..face_count {
        let flags = r.read_u32()?;
        let texture_index = r.read_u16()?;
        let n = r.read_u8()? as usize;
        let mut point_indices = Vec::with_capacity(n);
        for _ in 0..n {
            point_indices.push(u32::from(r.read_u16()?));
        }

        let fvs: Vec<FaceVertex> = point_indices
            .iter()
            .map(|&pi| FaceVertex {
                point_index: pi,
                normal_index: if (pi as usize) < normals.len() {
                    Some(pi)
                } else {
                    None
                },
                uv: uvs.get(pi as usize).copied().unwrap_or([0.0, 0.0]),
            })
            .collect();

        faces.push(point_indices);
        face_data.push(Face {
            vertices: fvs,
            flags,
            texture: textures
                .get(texture_index as usize)
                .cloned()
                .unwrap_or_default(),
            material: String::new(),
            texture_index: Some(i32::from(texture_index)),
        });
    }

    let sections_count = r.read_u32()? as usize;
    r.read_bytes(sections_count * 18)?;

    let (named_selections, named_selection_vertices) = skip_named_sections(r)?;
    let named_properties = read_named_properties(r)?;

    let anim_phase_count = r.read_u32()? as usize;
    r.read_bytes(anim_phase_count * 4)?;
    let padding_size = r.read_u32()? as usize;
    r.read_bytes(padding_size)?;
    skip_proxies(r)?;

    Ok(Lod {
        index,
        resolution: 0.0,
        resolution_name: String::new(),
        textures,
        materials: Vec::new(),
        named_properties,
        named_selections,
        named_selection_vertices,
        named_selection_faces: std::collections::HashMap::new(),
        vertices,
        normals,
        uv_sets: vec![uvs],
        face_data,
        faces,
        vertex_count,
        face_count,
        bounding_box_min,
        bounding_box_max,
        bounding_center,
        bounding_radius,
    })
}

fn read_model_info_v7<R: Read>(r: &mut R) -> Result<ModelInfo> {
    let bounding_sphere = r.read_f32()?;
    let bounding_box_min = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bounding_box_max = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let center_of_mass = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let mass = r.read_f32()?;
    let armor = r.read_f32()?;
    let mut roles = [0i32; 12];
    for slot in &mut roles {
        *slot = r.read_i32()?;
    }
    Ok(ModelInfo {
        bounding_sphere,
        bounding_box_min,
        bounding_box_max,
        center_of_mass,
        mass,
        armor,
        lod_roles: LodRoles(roles),
    })
}

pub fn read_odol7<R: Read>(r: &mut R, version: u32) -> Result<P3dFile> {
    let lod_count = r.read_u32()? as usize;
    let mut lods = Vec::with_capacity(lod_count);
    for index in 0..lod_count {
        lods.push(read_odol7_lod(r, index)?);
    }

    for lod in &mut lods {
        lod.resolution = r.read_f32()?;
        lod.resolution_name = resolution_name(lod.resolution);
    }

    let model_info = read_model_info_v7(r)?;

    Ok(P3dFile {
        format: Format::Odol,
        version,
        lods,
        model_info: Some(model_info),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn empty_compressed_array(buf: &mut Vec<u8>) {
        buf.extend_from_slice(&0u32.to_le_bytes());
    }

    #[test]
    fn reads_empty_model_with_one_lod() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u32.to_le_bytes()); // lod count

        // -- one LOD, everything empty --
        empty_compressed_array(&mut buf); // per-vertex flags
        empty_compressed_array(&mut buf); // uv
        buf.extend_from_slice(&0u32.to_le_bytes()); // vertices
        buf.extend_from_slice(&0u32.to_le_bytes()); // normals
        buf.extend_from_slice(&[0u8; 8]); // hint flags
        buf.extend_from_slice(&[0u8; 4 * 10]); // bbox min/max/center + radius
        buf.extend_from_slice(&0u32.to_le_bytes()); // textures
        empty_compressed_array(&mut buf); // pointToVertices
        empty_compressed_array(&mut buf); // vertexToPoints
        buf.extend_from_slice(&0u32.to_le_bytes()); // face count
        buf.extend_from_slice(&0u32.to_le_bytes()); // sections count
        buf.extend_from_slice(&0u32.to_le_bytes()); // named sections count
        buf.extend_from_slice(&0u32.to_le_bytes()); // named properties count
        buf.extend_from_slice(&0u32.to_le_bytes()); // anim phase count
        buf.extend_from_slice(&0u32.to_le_bytes()); // padding size
        buf.extend_from_slice(&0u32.to_le_bytes()); // proxies count

        // resolution array
        buf.extend_from_slice(&1.0f32.to_le_bytes());

        // model info
        buf.extend_from_slice(&0f32.to_le_bytes()); // bounding sphere
        buf.extend_from_slice(&[0u8; 4 * 9]); // bbox min/max, center of mass
        buf.extend_from_slice(&0f32.to_le_bytes()); // mass
        buf.extend_from_slice(&0f32.to_le_bytes()); // armor
        for v in [1i32, 0, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1] {
            buf.extend_from_slice(&v.to_le_bytes());
        }

        let mut cursor = Cursor::new(buf);
        let file = read_odol7(&mut cursor, 7).unwrap();
        assert_eq!(file.lods.len(), 1);
        assert_eq!(file.lods[0].resolution_name, "1.000");
        let roles = file.model_info.unwrap().lod_roles;
        assert_eq!(roles.geometry(), Some(0));
        assert_eq!(roles.memory(), Some(1));
        assert_eq!(roles.fire_geometry(), None);
    }
}
