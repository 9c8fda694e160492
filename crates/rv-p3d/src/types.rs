use std::collections::HashMap;

pub type Vec3 = [f32; 3];
pub type Uv = [f32; 2];

/// Key-value metadata pair attached to a LOD (`#Property#` TAGG, or the
/// equivalent ODOL `NamedProperties` array).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedProperty {
    pub name: String,
    pub value: String,
}

/// Per-vertex face attributes: which point it indexes, which normal (if
/// any matched by vertex index), and its UV coordinate in the first set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceVertex {
    pub point_index: u32,
    pub normal_index: Option<u32>,
    pub uv: Uv,
}

/// A single polygon: its vertices plus resolved texture/material.
#[derive(Debug, Clone, PartialEq)]
pub struct Face {
    pub vertices: Vec<FaceVertex>,
    pub flags: u32,
    pub texture: String,
    pub material: String,
    pub texture_index: Option<i32>,
}

/// The twelve distinguished LOD roles, in the order the original format
/// stores them: `-1` marks a role with no corresponding LOD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LodRoles(pub [i32; 12]);

impl LodRoles {
    #[must_use]
    pub fn memory(&self) -> Option<usize> {
        role(self.0[0])
    }
    #[must_use]
    pub fn geometry(&self) -> Option<usize> {
        role(self.0[1])
    }
    #[must_use]
    pub fn fire_geometry(&self) -> Option<usize> {
        role(self.0[2])
    }
    #[must_use]
    pub fn view_geometry(&self) -> Option<usize> {
        role(self.0[3])
    }
    #[must_use]
    pub fn view_pilot(&self) -> Option<usize> {
        role(self.0[4])
    }
    #[must_use]
    pub fn view_gunner(&self) -> Option<usize> {
        role(self.0[5])
    }
    #[must_use]
    pub fn view_commander(&self) -> Option<usize> {
        role(self.0[6])
    }
    #[must_use]
    pub fn view_cargo(&self) -> Option<usize> {
        role(self.0[7])
    }
    #[must_use]
    pub fn land_contact(&self) -> Option<usize> {
        role(self.0[8])
    }
    #[must_use]
    pub fn roadway(&self) -> Option<usize> {
        role(self.0[9])
    }
    #[must_use]
    pub fn paths(&self) -> Option<usize> {
        role(self.0[10])
    }
    #[must_use]
    pub fn hitpoints(&self) -> Option<usize> {
        role(self.0[11])
    }
}

fn role(idx: i32) -> Option<usize> {
    if idx < 0 { None } else { Some(idx as usize) }
}

/// A single level of detail: geometry, its named selections/properties,
/// and resolution metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Lod {
    pub index: usize,
    pub resolution: f32,
    pub resolution_name: String,
    pub textures: Vec<String>,
    /// MLOD: per-face materials. ODOL v28+: embedded rvmat paths.
    pub materials: Vec<String>,
    pub named_properties: Vec<NamedProperty>,
    pub named_selections: Vec<String>,
    pub named_selection_vertices: HashMap<String, Vec<u32>>,
    pub named_selection_faces: HashMap<String, Vec<u32>>,
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    /// UV sets, one `Vec<Uv>` per set, indexed by vertex.
    pub uv_sets: Vec<Vec<Uv>>,
    pub face_data: Vec<Face>,
    pub faces: Vec<Vec<u32>>,
    pub vertex_count: usize,
    pub face_count: usize,
    pub bounding_box_min: Vec3,
    pub bounding_box_max: Vec3,
    pub bounding_center: Vec3,
    pub bounding_radius: f32,
}

/// Model-level metadata, present only for ODOL files.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelInfo {
    pub bounding_sphere: f32,
    pub bounding_box_min: Vec3,
    pub bounding_box_max: Vec3,
    pub center_of_mass: Vec3,
    pub mass: f32,
    pub armor: f32,
    pub lod_roles: LodRoles,
}

/// Top-level signature: `ODOL` (v7 or v28-75) or `MLOD` (editable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Odol,
    Mlod,
}

/// Parsed metadata for a P3D model file.
#[derive(Debug, Clone, PartialEq)]
pub struct P3dFile {
    pub format: Format,
    pub version: u32,
    pub lods: Vec<Lod>,
    pub model_info: Option<ModelInfo>,
}

/// Model dimensions calculated from a LOD's bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeInfo {
    pub source: String,
    pub bbox_min: Vec3,
    pub bbox_max: Vec3,
    pub bbox_center: Vec3,
    pub bbox_radius: f32,
    pub dimensions: Vec3,
}
