use crate::resolution::is_visual_lod;
use crate::types::{Lod, P3dFile, SizeInfo};

fn size_from_lod(lod: &Lod, source: &str) -> SizeInfo {
    let min = lod.bounding_box_min;
    let max = lod.bounding_box_max;
    let dimensions = [max[0] - min[0], max[1] - min[1], max[2] - min[2]];
    SizeInfo {
        source: source.to_string(),
        bbox_min: min,
        bbox_max: max,
        bbox_center: lod.bounding_center,
        bbox_radius: lod.bounding_radius,
        dimensions,
    }
}

fn lowest_resolution_visual_lod(file: &P3dFile) -> Option<&Lod> {
    file.lods
        .iter()
        .filter(|l| l.vertex_count > 0 && is_visual_lod(&l.resolution_name))
        .min_by(|a, b| a.resolution.partial_cmp(&b.resolution).unwrap_or(std::cmp::Ordering::Equal))
}

/// Geometry-LOD-first dimension calculation, falling back to the lowest
/// resolution visual LOD with vertices. The returned `String` is a
/// human-readable note on which source was used, empty when Geometry was
/// found directly.
#[must_use]
pub fn calculate_size(file: &P3dFile) -> (Option<SizeInfo>, String) {
    if let Some(info) = &file.model_info {
        if let Some(idx) = info.lod_roles.geometry() {
            if let Some(lod) = file.lods.get(idx) {
                if lod.vertex_count > 0 {
                    return (Some(size_from_lod(lod, "Geometry")), String::new());
                }
            }
        }
    }

    match lowest_resolution_visual_lod(file) {
        Some(lod) => (
            Some(size_from_lod(lod, &format!("visual LOD {}", lod.resolution_name))),
            format!(
                "no Geometry LOD with vertices found; falling back to visual LOD {}",
                lod.resolution_name
            ),
        ),
        None => (
            None,
            "no Geometry LOD or visual LOD with vertices found".to_string(),
        ),
    }
}

/// Prefers the `"1.000"` resolution LOD, else the lowest resolution
/// visual LOD with vertices.
#[must_use]
pub fn visual_bbox(file: &P3dFile) -> Option<SizeInfo> {
    if let Some(lod) = file
        .lods
        .iter()
        .find(|l| l.resolution_name == "1.000" && l.vertex_count > 0)
    {
        return Some(size_from_lod(lod, "1.000"));
    }
    lowest_resolution_visual_lod(file).map(|lod| size_from_lod(lod, &lod.resolution_name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Format, ModelInfo};
    use pretty_assertions::assert_eq;

    fn lod(resolution: f32, resolution_name: &str, vertex_count: usize) -> Lod {
        Lod {
            resolution,
            resolution_name: resolution_name.to_string(),
            vertex_count,
            bounding_box_min: [0.0, 0.0, 0.0],
            bounding_box_max: [2.0, 4.0, 6.0],
            ..Lod::default()
        }
    }

    #[test]
    fn prefers_geometry_lod_when_present() {
        let mut info = ModelInfo::default();
        info.lod_roles.0[1] = 0;
        let file = P3dFile {
            format: Format::Odol,
            version: 45,
            lods: vec![lod(0.0, "Geometry", 8)],
            model_info: Some(info),
        };
        let (size, note) = calculate_size(&file);
        assert!(note.is_empty());
        assert_eq!(size.unwrap().dimensions, [2.0, 4.0, 6.0]);
    }

    #[test]
    fn falls_back_to_lowest_resolution_visual_lod() {
        let file = P3dFile {
            format: Format::Odol,
            version: 45,
            lods: vec![lod(1.0, "1.000", 8), lod(0.5, "0.500", 8)],
            model_info: None,
        };
        let (size, note) = calculate_size(&file);
        assert!(!note.is_empty());
        assert!(size.is_some());
    }

    #[test]
    fn visual_bbox_prefers_unit_resolution() {
        let file = P3dFile {
            format: Format::Odol,
            version: 45,
            lods: vec![lod(0.5, "0.500", 4), lod(1.0, "1.000", 8)],
            model_info: None,
        };
        assert_eq!(visual_bbox(&file).unwrap().source, "1.000");
    }
}
