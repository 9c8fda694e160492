/// Maps a LOD's raw resolution float to a human-readable name, matching
/// the exact bit-pattern table the format uses for its special values.
#[must_use]
pub fn resolution_name(r: f32) -> String {
    let bits = r.to_bits();

    let name = match bits {
        0x551184e7 => Some("Geometry"),
        0x58635fa9 => Some("Memory"),
        0x58e35fa9 => Some("LandContact"),
        0x592a87bf => Some("Roadway"),
        0x59635fa9 => Some("Paths"),
        0x598e1bca => Some("HitPoints"),
        0x59aa87bf => Some("ViewGeometry"),
        0x59c6f3b4 => Some("FireGeometry"),
        0x59e35fa9 => Some("ViewCargoGeometry"),
        0x59ffcb9e => Some("ViewCargoFireGeometry"),
        0x5a0e1bca => Some("ViewCommander"),
        0x5a1c51c4 => Some("ViewCommanderGeometry"),
        0x5a2a87bf => Some("ViewCommanderFireGeometry"),
        0x5a38bdb9 => Some("ViewPilotGeometry"),
        0x5a46f3b4 => Some("ViewPilotFireGeometry"),
        0x5a5529af => Some("ViewGunnerGeometry"),
        0x5a635fa9 => Some("ViewGunnerFireGeometry"),
        0x559184e7 => Some("Buoyancy"),
        0x561184e7 => Some("PhysX"),
        0x5a9536c7 => Some("Wreck"),
        _ => None,
    };
    if let Some(n) = name {
        return n.to_string();
    }

    if (1e4..2e4).contains(&r) {
        return format!("ShadowVolume {:.0}", r - 1e4);
    }

    format!("{r:.3}")
}

/// True for visual (distance-based) LOD resolution names: these start
/// with a digit (`"1.000"`, `"0.500"`, ...) rather than a named role.
#[must_use]
pub fn is_visual_lod(name: &str) -> bool {
    name.as_bytes().first().is_some_and(u8::is_ascii_digit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_known_bit_patterns() {
        assert_eq!(resolution_name(f32::from_bits(0x551184e7)), "Geometry");
        assert_eq!(resolution_name(f32::from_bits(0x598e1bca)), "HitPoints");
    }

    #[test]
    fn formats_shadow_volume_range() {
        assert_eq!(resolution_name(10500.0), "ShadowVolume 500");
    }

    #[test]
    fn falls_back_to_three_decimal_places() {
        assert_eq!(resolution_name(1.0), "1.000");
    }

    #[test]
    fn visual_lod_detection() {
        assert!(is_visual_lod("1.000"));
        assert!(!is_visual_lod("Geometry"));
        assert!(!is_visual_lod(""));
    }
}
