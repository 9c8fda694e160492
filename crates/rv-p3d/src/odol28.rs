use std::io::{Read, Seek, SeekFrom};

use rv_binio::ReadExt;

use crate::error::Result;
use crate::resolution::resolution_name;
use crate::types::{Face, FaceVertex, Format, Lod, LodRoles, ModelInfo, NamedProperty, P3dFile, Vec3};

const NORMAL_PACK_SCALE: f32 = -0.0019569471;
const UV_DEQUANT_SCALE: f32 = 1.525_878_9e-5; // 2^-16

/// Holds the version of an ODOL v28-75 stream and the two gate booleans
/// every compressed/condensed array read is conditioned on.
pub struct Odol28Ctx {
    version: u32,
    use_lzo: bool,
    use_flag: bool,
}

impl Odol28Ctx {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            use_lzo: version >= 44,
            use_flag: version >= 64,
        }
    }

    /// Reads `count * elem_size` bytes, compressed per the version's
    /// scheme: LZSS below v44 (1024-byte raw threshold), LZO at/above,
    /// with an explicit leading compressed/raw flag byte at v64+.
    fn read_compressed_array<R: Read>(&self, r: &mut R, count: usize, elem_size: usize) -> Result<Vec<u8>> {
        let expected = count * elem_size;
        if self.use_flag {
            let flag = r.read_u8()?;
            if flag == 0 {
                return Ok(r.read_bytes(expected)?);
            }
            return if self.use_lzo {
                Ok(rv_lzo::decompress_from_reader(r, expected)?)
            } else {
                Ok(rv_lzss::decompress_from_reader(r, expected)?)
            };
        }
        if self.use_lzo {
            Ok(rv_lzo::decompress_auto_from_reader(r, expected)?)
        } else {
            Ok(rv_lzss::decompress_or_raw_from_reader(r, expected)?)
        }
    }

    /// Condensed array: one default-value byte follows the count; a
    /// non-zero value means the single stored element repeats `count`
    /// times, zero means a normal compressed payload follows.
    fn read_condensed_array<R: Read>(&self, r: &mut R, count: usize, elem_size: usize) -> Result<Vec<u8>> {
        let default_flag = r.read_u8()?;
        if default_flag != 0 {
            let one = r.read_bytes(elem_size)?;
            let mut out = Vec::with_capacity(count * elem_size);
            for _ in 0..count {
                out.extend_from_slice(&one);
            }
            Ok(out)
        } else {
            self.read_compressed_array(r, count, elem_size)
        }
    }

    fn index_size(&self) -> usize {
        if self.version >= 69 { 4 } else { 2 }
    }

    fn read_index_array<R: Read>(&self, r: &mut R, count: usize) -> Result<Vec<u32>> {
        let elem = self.index_size();
        let bytes = self.read_compressed_array(r, count, elem)?;
        Ok(decode_index_bytes(&bytes, elem))
    }
}

fn decode_index_bytes(bytes: &[u8], elem_size: usize) -> Vec<u32> {
    if elem_size == 4 {
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    } else {
        bytes
            .chunks_exact(2)
            .map(|c| u32::from(u16::from_le_bytes([c[0], c[1]])))
            .collect()
    }
}

fn unpack_normal10(packed: u32) -> Vec3 {
    let extract = |shift: u32| -> f32 {
        let raw = (packed >> shift) & 0x3FF;
        let signed = if raw & 0x200 != 0 {
            raw as i32 - 0x400
        } else {
            raw as i32
        };
        signed as f32 * NORMAL_PACK_SCALE
    };
    [extract(0), extract(10), extract(20)]
}

fn dequantize_uv(s: i16, min: f32, max: f32) -> f32 {
    (f32::from(s) + 32767.0) * UV_DEQUANT_SCALE * (max - min) + min
}

fn read_model_info<R: Read>(ctx: &Odol28Ctx, r: &mut R) -> Result<ModelInfo> {
    let bounding_sphere = r.read_f32()?;
    let bounding_box_min = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bounding_box_max = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let center_of_mass = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let mass = r.read_f32()?;
    let armor = r.read_f32()?;

    let v = ctx.version;
    if v >= 23 {
        let _is_discrete = r.read_u8()?;
    }
    if v >= 30 {
        let animations = r.read_u8()?;
        if animations != 0 {
            let count = r.read_u32()? as usize;
            r.read_bytes(count * 8)?;
        }
    }
    if v >= 31 {
        let _unknown_v31 = r.read_u32()?;
    }
    if v >= 33 {
        let _force_not_alpha_model = r.read_u8()?;
    }
    if v >= 37 {
        let _sb_source = r.read_u32()?;
        let _prefer_shadow_volume = r.read_u8()?;
    }
    if v >= 38 {
        let _can_blend = r.read_u8()?;
    }
    if v >= 39 {
        let _has_skeleton = r.read_u8()?;
    }
    if v >= 41 {
        let _pivots_name_obsolete = r.read_u8()?;
    }
    if v >= 42 {
        let _thermal_profile = [r.read_f32()?, r.read_f32()?, r.read_f32()?, r.read_f32()?];
    }
    if v >= 43 {
        let _m_fact = r.read_f32()?;
        let _t_body = r.read_f32()?;
    }
    if v >= 48 {
        let _shadow_offset = r.read_f32()?;
    }
    if v >= 52 {
        let _visual_min = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
        let _visual_max = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    }
    if v >= 53 {
        let _geometry_simple = r.read_i32()?;
    }
    if v >= 54 {
        let _geometry_phys = r.read_i32()?;
    }
    if v >= 55 {
        let _hide_anim_extra = r.read_f32()?;
    }
    if v >= 56 {
        let _anim_period = r.read_f32()?;
        let _anim_init_phase = r.read_f32()?;
    }
    if v >= 57 {
        let preferred_shadow_volume_count = r.read_u32()? as usize;
        r.read_bytes(preferred_shadow_volume_count * 4)?;
        let preferred_shadow_buffer_count = r.read_u32()? as usize;
        r.read_bytes(preferred_shadow_buffer_count * 4)?;
    }
    if v >= 58 {
        let _muzzle_flash = r.read_cstring()?;
    }
    if v >= 59 {
        let _app_id = r.read_u32()?;
    }
    if v >= 67 {
        let _unknown_v67 = r.read_u32()?;
    }
    if v >= 68 {
        let _extra_byte = r.read_u8()?;
    }
    if v >= 70 {
        let _lod_density_coef = r.read_f32()?;
    }
    if v >= 71 {
        let _draw_importance = r.read_f32()?;
    }
    if v >= 72 {
        let _explosion_shielding = r.read_f32()?;
    }
    if v >= 73 {
        let ai_covers_count = r.read_u32()? as usize;
        r.read_bytes(ai_covers_count * 4)?;
    }
    if v >= 74 {
        let _unknown_v74_a = r.read_u32()?;
        let _unknown_v74_b = r.read_u32()?;
    }

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

fn read_embedded_material<R: Read>(r: &mut R) -> Result<String> {
    let mini_version = r.read_u32()?;
    let name = r.read_cstring()?;
    if !name.is_empty() {
        return Ok(name);
    }

    let stage_count = r.read_u32()? as usize;
    let mut first_texture = String::new();
    if mini_version >= 8 {
        let mut textures = Vec::with_capacity(stage_count);
        for _ in 0..stage_count {
            textures.push(r.read_cstring()?);
        }
        for _ in 0..stage_count {
            r.read_bytes(48)?;
        }
        for _ in 0..stage_count {
            r.read_u32()?;
        }
        if let Some(t) = textures.into_iter().next() {
            first_texture = t;
        }
    } else {
        for i in 0..stage_count {
            let tex = r.read_cstring()?;
            r.read_bytes(48)?;
            r.read_u32()?;
            if i == 0 {
                first_texture = tex;
            }
        }
    }
    Ok(first_texture)
}

struct Section {
    face_lower: u32,
    face_upper: u32,
    texture_index: i32,
    material_index: i32,
    inline_material: Option<String>,
}

fn read_section<R: Read>(ctx: &Odol28Ctx, r: &mut R) -> Result<Section> {
    let face_lower = r.read_u32()?;
    let face_upper = r.read_u32()?;
    let texture_index = r.read_i32()?;
    let material_index = r.read_i32()?;
    let inline_material = if material_index < 0 {
        Some(r.read_cstring()?)
    } else {
        None
    };
    if ctx.version >= 36 {
        let _unknown_v36 = r.read_u32()?;
    }
    if ctx.version >= 67 {
        let _section_extension_v67 = r.read_u32()?;
    }
    Ok(Section {
        face_lower,
        face_upper,
        texture_index,
        material_index,
        inline_material,
    })
}

fn read_named_selection<R: Read>(
    ctx: &Odol28Ctx,
    r: &mut R,
) -> Result<(String, Vec<u32>, Vec<u32>)> {
    let name = r.read_cstring()?;
    let face_count = r.read_u32()? as usize;
    let faces = ctx.read_index_array(r, face_count)?;
    let vertex_count = r.read_u32()? as usize;
    let vertices = ctx.read_index_array(r, vertex_count)?;
    let weight_bytes = ctx.read_compressed_array(r, vertex_count, 1)?;

    let mut selected_vertices = Vec::with_capacity(vertex_count);
    for (i, &v) in vertices.iter().enumerate() {
        if weight_bytes.get(i).copied().unwrap_or(1) != 0 {
            selected_vertices.push(v);
        }
    }
    Ok((name, faces, selected_vertices))
}

fn read_lod<R: Read>(ctx: &Odol28Ctx, r: &mut R, index: usize, resolution: f32) -> Result<Lod> {
    // proxies
    let proxy_count = r.read_u32()? as usize;
    for _ in 0..proxy_count {
        let _name = r.read_cstring()?;
        r.read_bytes(48)?;
        let _memory_index = r.read_i32()?;
        if ctx.version >= 40 {
            let _section_index = r.read_i32()?;
        }
    }

    // subSkeletonsToSkeleton / skeletonToSubSkeleton
    for _ in 0..2 {
        let n = r.read_u32()? as usize;
        r.read_bytes(n * 4)?;
    }

    let mut vertex_count = 0usize;
    if ctx.version >= 50 {
        vertex_count = r.read_u32()? as usize;
        ctx.read_condensed_array(r, vertex_count, 1)?; // clip flags
    }
    if ctx.version >= 51 {
        let _face_area = r.read_f32()?;
    }

    r.read_bytes(8)?; // hints

    let bounding_box_min = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bounding_box_max = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bounding_center = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
    let bounding_radius = r.read_f32()?;

    let textures = (0..r.read_u32()? as usize)
        .map(|_| r.read_cstring())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let material_count = r.read_u32()? as usize;
    let materials = (0..material_count)
        .map(|_| read_embedded_material(r))
        .collect::<Result<Vec<_>>>()?;

    let point_to_vertex_count = r.read_u32()? as usize;
    ctx.read_index_array(r, point_to_vertex_count)?; // skipped

    let vertex_to_point_count = r.read_u32()? as usize;
    let vertex_to_point = ctx.read_index_array(r, vertex_to_point_count)?;

    let index_size = ctx.index_size();
    let face_count = r.read_u32()? as usize;
    let mut face_data = Vec::with_capacity(face_count);
    let mut faces = Vec::with_capacity(face_count);
    let mut face_offsets = Vec::with_capacity(face_count);
    let mut offset = 0u32;
    for _ in 0..face_count {
        let flags = r.read_u32()?;
        let n = r.read_u8()? as usize;
        let mut indices = Vec::with_capacity(n);
        for _ in 0..n {
            let idx = if index_size == 4 {
                r.read_u32()?
            } else {
                u32::from(r.read_u16()?)
            };
            indices.push(idx);
        }
        face_offsets.push(offset);
        offset += (index_size as u32) * (1 + n as u32);
        faces.push(indices.clone());
        face_data.push((flags, indices));
    }

    let section_count = r.read_u32()? as usize;
    let mut sections = Vec::with_capacity(section_count);
    for _ in 0..section_count {
        sections.push(read_section(ctx, r)?);
    }

    let resolve_section = |byte_offset: u32| -> Option<&Section> {
        sections
            .iter()
            .find(|s| byte_offset >= s.face_lower && byte_offset < s.face_upper)
    };

    let mut resolved_faces = Vec::with_capacity(face_count);
    for (i, (flags, indices)) in face_data.into_iter().enumerate() {
        let section = resolve_section(face_offsets[i]);
        let (texture, material, texture_index) = match section {
            Some(s) => (
                textures.get(s.texture_index.max(0) as usize).cloned().unwrap_or_default(),
                s.inline_material.clone().unwrap_or_else(|| {
                    materials.get(s.material_index.max(0) as usize).cloned().unwrap_or_default()
                }),
                Some(s.texture_index),
            ),
            None => (String::new(), String::new(), None),
        };
        let vertices = indices
            .iter()
            .map(|&pi| FaceVertex {
                point_index: pi,
                normal_index: Some(pi),
                uv: [0.0, 0.0],
            })
            .collect();
        resolved_faces.push(Face {
            vertices,
            flags,
            texture,
            material,
            texture_index,
        });
    }

    let named_selection_count = r.read_u32()? as usize;
    let mut named_selections = Vec::with_capacity(named_selection_count);
    let mut named_selection_faces = std::collections::HashMap::new();
    let mut named_selection_vertices = std::collections::HashMap::new();
    for _ in 0..named_selection_count {
        let (name, mut sel_faces, mut sel_vertices) = read_named_selection(ctx, r)?;
        sel_faces.retain(|&f| (f as usize) < face_count);
        sel_faces.sort_unstable();
        sel_faces.dedup();
        let effective_vertex_count = if vertex_count > 0 {
            vertex_count
        } else {
            vertex_to_point_count
        };
        sel_vertices.retain(|&v| (v as usize) < effective_vertex_count);
        sel_vertices.sort_unstable();
        sel_vertices.dedup();
        named_selections.push(name.clone());
        named_selection_faces.insert(name.clone(), sel_faces);
        named_selection_vertices.insert(name, sel_vertices);
    }

    let named_properties = read_named_properties(r)?;

    // frame keyframes (skipped)
    let keyframe_count = r.read_u32()? as usize;
    for _ in 0..keyframe_count {
        r.read_f32()?;
        r.read_bytes(48)?;
    }

    // vertex-bone refs (skipped) -- named identically to the VertexBoneRef
    // block later in the per-LOD layout.
    if vertex_count > 0 {
        ctx.read_condensed_array(r, vertex_count, 4)?;
    }

    let uv_vertex_count = if vertex_count > 0 {
        vertex_count
    } else {
        vertex_to_point.len().max(1)
    };
    let uv_set = if ctx.version >= 45 {
        let min_u = r.read_f32()?;
        let min_v = r.read_f32()?;
        let max_u = r.read_f32()?;
        let max_v = r.read_f32()?;
        let count = r.read_u32()? as usize;
        let raw = ctx.read_condensed_array(r, count, 4)?;
        let mut out = Vec::with_capacity(count);
        for c in raw.chunks_exact(4) {
            let su = i16::from_le_bytes([c[0], c[1]]);
            let sv = i16::from_le_bytes([c[2], c[3]]);
            out.push([dequantize_uv(su, min_u, max_u), dequantize_uv(sv, min_v, max_v)]);
        }
        out
    } else {
        let count = r.read_u32()? as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push([r.read_f32()?, r.read_f32()?]);
        }
        out
    };

    let point_count = r.read_u32()? as usize;
    let position_bytes = ctx.read_compressed_array(r, point_count, 12)?;
    let points: Vec<Vec3> = position_bytes
        .chunks_exact(12)
        .map(|c| {
            [
                f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                f32::from_le_bytes([c[8], c[9], c[10], c[11]]),
            ]
        })
        .collect();
    let vertices = if vertex_to_point.is_empty() {
        points.clone()
    } else {
        vertex_to_point
            .iter()
            .map(|&pi| points.get(pi as usize).copied().unwrap_or([0.0, 0.0, 0.0]))
            .collect()
    };

    let normal_elem_size = if ctx.version >= 45 { 4 } else { 12 };
    let normal_count = vertices.len();
    let normal_bytes = ctx.read_condensed_array(r, normal_count, normal_elem_size)?;
    let normals: Vec<Vec3> = if ctx.version >= 45 {
        normal_bytes
            .chunks_exact(4)
            .map(|c| unpack_normal10(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
            .collect()
    } else {
        normal_bytes
            .chunks_exact(12)
            .map(|c| {
                [
                    f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                    f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                    f32::from_le_bytes([c[8], c[9], c[10], c[11]]),
                ]
            })
            .collect()
    };

    for face in &mut resolved_faces {
        for fv in &mut face.vertices {
            fv.uv = uv_set.get(fv.point_index as usize).copied().unwrap_or([0.0, 0.0]);
            fv.normal_index = if (fv.point_index as usize) < normals.len() {
                Some(fv.point_index)
            } else {
                None
            };
        }
    }

    // STCoords
    let st_elem_size = if ctx.version >= 45 { 4 } else { 8 };
    ctx.read_condensed_array(r, vertices.len(), st_elem_size)?;
    // VertexBoneRef
    ctx.read_condensed_array(r, vertices.len(), 4)?;
    // NeighborBoneRef
    ctx.read_condensed_array(r, face_count, 8)?;

    Ok(Lod {
        index,
        resolution,
        resolution_name: resolution_name(resolution),
        textures,
        materials,
        named_properties,
        named_selections,
        named_selection_vertices,
        named_selection_faces,
        vertices: vertices.clone(),
        normals,
        uv_sets: vec![uv_set],
        face_data: resolved_faces,
        faces,
        vertex_count: vertices.len(),
        face_count,
        bounding_box_min,
        bounding_box_max,
        bounding_center,
        bounding_radius,
    })
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

/// Skips a non-permanent LOD's body without materializing it: only its
/// byte span (from `start` to `end`) is known, so the reader jumps past it.
fn skip_loadable_lod<R: Read + Seek>(r: &mut R, end: u64) -> Result<()> {
    r.seek(SeekFrom::Start(end))?;
    Ok(())
}

pub fn read_odol28<R: Read + Seek>(r: &mut R, version: u32) -> Result<P3dFile> {
    let ctx = Odol28Ctx::new(version);

    let lod_count = r.read_u32()? as usize;
    let mut resolutions = Vec::with_capacity(lod_count);
    for _ in 0..lod_count {
        resolutions.push(r.read_f32()?);
    }

    let anim_block_count = r.read_u32()? as usize;
    r.read_bytes(anim_block_count * 4)?;

    let model_info = read_model_info(&ctx, r)?;

    let mut start_addrs = Vec::with_capacity(lod_count);
    for _ in 0..lod_count {
        start_addrs.push(u64::from(r.read_u32()?));
    }
    let mut end_addrs = Vec::with_capacity(lod_count);
    for _ in 0..lod_count {
        end_addrs.push(u64::from(r.read_u32()?));
    }
    let mut permanent = Vec::with_capacity(lod_count);
    for _ in 0..lod_count {
        permanent.push(r.read_u8()? != 0);
    }

    let mut lods = Vec::with_capacity(lod_count);
    for index in 0..lod_count {
        r.seek(SeekFrom::Start(start_addrs[index]))?;
        if permanent[index] {
            lods.push(read_lod(&ctx, r, index, resolutions[index])?);
        } else {
            skip_loadable_lod(r, end_addrs[index])?;
            lods.push(Lod {
                index,
                resolution: resolutions[index],
                resolution_name: resolution_name(resolutions[index]),
                ..Lod::default()
            });
        }
    }

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

    #[test]
    fn gate_booleans_match_version_thresholds() {
        let ctx = Odol28Ctx::new(43);
        assert!(!ctx.use_lzo);
        assert!(!ctx.use_flag);
        let ctx = Odol28Ctx::new(44);
        assert!(ctx.use_lzo);
        assert!(!ctx.use_flag);
        let ctx = Odol28Ctx::new(64);
        assert!(ctx.use_lzo);
        assert!(ctx.use_flag);
    }

    #[test]
    fn index_size_switches_at_v69() {
        assert_eq!(Odol28Ctx::new(68).index_size(), 2);
        assert_eq!(Odol28Ctx::new(69).index_size(), 4);
    }

    #[test]
    fn uv_dequantization_matches_formula() {
        let v = dequantize_uv(-32767, 0.0, 1.0);
        assert!((v - 0.0).abs() < 1e-4);
        let v = dequantize_uv(32767, 0.0, 1.0);
        assert!((v - 1.0).abs() < 1e-4);
    }

    #[test]
    fn normal_unpack_round_trip_on_axis() {
        // +1.0 on X roughly: value n where n * SCALE ~= 1.0 -> n ~= -511 (scale is negative)
        let n = (1.0 / NORMAL_PACK_SCALE).round() as i32;
        let raw = (n & 0x3FF) as u32;
        let packed = raw;
        let unpacked = unpack_normal10(packed);
        assert!((unpacked[0] - 1.0).abs() < 0.01);
    }
}
