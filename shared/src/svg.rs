use std::sync::OnceLock;

use regex_lite::Regex;

/// An SVG viewBox: the native coordinate space of a map or glyph asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

fn root_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<svg\b[^>]*>").expect("static regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-\w:.]*)\s*=\s*["']([^"']*)["']"#).expect("static regex")
    })
}

fn root_attr(svg: &str, name: &str) -> Option<String> {
    let tag = root_tag_re().find(svg)?.as_str();
    attr_re()
        .captures_iter(tag)
        .find(|caps| &caps[1] == name)
        .map(|caps| caps[2].to_string())
}

/// Parse a numeric length such as `"120"`, `"120.5px"`; percentages are rejected.
fn parse_length(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.ends_with('%') {
        return None;
    }
    let number = trimmed.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    number.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

impl ViewBox {
    pub const fn new(min_x: f64, min_y: f64, width: f64, height: f64) -> Self {
        Self {
            min_x,
            min_y,
            width,
            height,
        }
    }

    /// Parse a `viewBox` attribute value ("min-x min-y width height",
    /// separated by whitespace and/or commas).
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<f64> = value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<_, _>>()
            .ok()?;
        let [min_x, min_y, width, height] = parts.as_slice() else {
            return None;
        };
        if *width <= 0.0 || *height <= 0.0 {
            return None;
        }
        Some(Self::new(*min_x, *min_y, *width, *height))
    }

    /// Read the root element's viewBox, falling back to its width/height.
    pub fn from_svg(svg: &str) -> Option<Self> {
        if let Some(vb) = root_attr(svg, "viewBox").and_then(|v| Self::parse(&v)) {
            return Some(vb);
        }
        let width = root_attr(svg, "width").and_then(|v| parse_length(&v))?;
        let height = root_attr(svg, "height").and_then(|v| parse_length(&v))?;
        Some(Self::new(0.0, 0.0, width, height))
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_viewbox_attribute() {
        let svg = r#"<?xml version="1.0"?>
            <svg xmlns="http://www.w3.org/2000/svg"
                 viewBox="0 -10 2400.5 1800" width="100%">
              <g id="land"/>
            </svg>"#;
        assert_eq!(
            ViewBox::from_svg(svg),
            Some(ViewBox::new(0.0, -10.0, 2400.5, 1800.0))
        );
    }

    #[test]
    fn falls_back_to_width_and_height() {
        let svg = r#"<svg width="200px" height='100'><path d="M0 0"/></svg>"#;
        assert_eq!(ViewBox::from_svg(svg), Some(ViewBox::new(0.0, 0.0, 200.0, 100.0)));
    }

    #[test]
    fn ignores_nested_viewboxes() {
        let svg = r#"<svg width="10" height="10"><symbol viewBox="0 0 99 99"/></svg>"#;
        assert_eq!(ViewBox::from_svg(svg), Some(ViewBox::new(0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn rejects_degenerate_boxes() {
        assert_eq!(ViewBox::parse("0 0 0 10"), None);
        assert_eq!(ViewBox::parse("0,0,10"), None);
        assert_eq!(ViewBox::parse("a b c d"), None);
        assert_eq!(ViewBox::parse("0,0, 10,20"), Some(ViewBox::new(0.0, 0.0, 10.0, 20.0)));
        assert_eq!(ViewBox::from_svg("<svg width=\"50%\" height=\"10\"/>"), None);
    }
}
