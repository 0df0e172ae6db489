/// Fill and outline color for cities and major-city clusters.
pub const CITY_RED: &str = "#d00";
/// Fill for plain and major-city mileposts.
pub const MILEPOST_BLACK: &str = "#000";

/// Track colors a player can pick when creating or joining a game, with their RGB values.
pub const PLAYER_COLORS: &[(&str, (u8, u8, u8))] = &[
    ("aqua", (0, 255, 255)),
    ("black", (0, 0, 0)),
    ("blue", (0, 0, 255)),
    ("fuchsia", (255, 0, 255)),
    ("gray", (128, 128, 128)),
    ("green", (0, 128, 0)),
    ("lime", (0, 255, 0)),
    ("maroon", (128, 0, 0)),
    ("navy", (0, 0, 128)),
    ("olive", (128, 128, 0)),
    ("orange", (255, 165, 0)),
    ("purple", (128, 0, 128)),
    ("red", (255, 0, 0)),
    ("silver", (192, 192, 192)),
    ("teal", (0, 128, 128)),
    ("yellow", (255, 255, 0)),
];

/// RGB for a player's color name. Names outside the palette get a
/// deterministic color derived from the CRC32 of the name.
pub fn player_color(name: &str) -> (u8, u8, u8) {
    let lower = name.trim().to_ascii_lowercase();
    if let Some((_, rgb)) = PLAYER_COLORS.iter().find(|(n, _)| *n == lower) {
        return *rgb;
    }
    let bytes = crc32fast::hash(lower.as_bytes()).to_be_bytes();
    (bytes[0], bytes[1], bytes[2])
}

/// Format RGBA as a CSS color string.
pub fn rgba_css(r: u8, g: u8, b: u8, a: f64) -> String {
    format!("rgba({r},{g},{b},{a})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_lookup_is_case_insensitive() {
        assert_eq!(player_color("Teal"), (0, 128, 128));
        assert_eq!(player_color(" orange "), (255, 165, 0));
    }

    #[test]
    fn unknown_names_hash_deterministically() {
        assert_eq!(player_color("chartreuse"), player_color("CHARTREUSE"));
        assert_ne!(player_color("chartreuse"), player_color("vermilion"));
    }

    #[test]
    fn rgba_css_format() {
        assert_eq!(rgba_css(1, 2, 3, 0.5), "rgba(1,2,3,0.5)");
    }
}
