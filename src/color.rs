use std::fmt;
use std::str::FromStr;

use palette::{Hsl, IntoColor, Srgb};
use serde::{Deserialize, Serialize, Serializer};

/// Saturation of generated series colours.
pub const SATURATION: f32 = 0.70;
/// Lightness of generated series colours.
pub const LIGHTNESS: f32 = 0.50;

// ---------------------------------------------------------------------------
// Hex colours from configuration
// ---------------------------------------------------------------------------

/// An sRGB colour written as `#RRGGBB` in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(Srgb<u8>);

impl HexColor {
    pub fn rgb(&self) -> Srgb<u8> {
        self.0
    }
}

impl FromStr for HexColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim();
        if !hex.starts_with('#') || hex.len() != 7 {
            return Err(format!("expected a #RRGGBB colour, got '{s}'"));
        }
        Srgb::<u8>::from_str(hex)
            .map(HexColor)
            .map_err(|e| format!("invalid colour '{s}': {e}"))
    }
}

impl TryFrom<String> for HexColor {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HexColor> for String {
    fn from(c: HexColor) -> Self {
        c.to_string()
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.0;
        write!(f, "#{:02X}{:02X}{:02X}", c.red, c.green, c.blue)
    }
}

// ---------------------------------------------------------------------------
// Series colours
// ---------------------------------------------------------------------------

/// Colour assigned to one plotted column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesColor {
    /// Caller-supplied override.
    Explicit(HexColor),
    /// Evenly spaced hue at fixed saturation/lightness.
    Derived { hue: f32 },
}

impl SeriesColor {
    pub fn hue(&self) -> Option<f32> {
        match self {
            SeriesColor::Derived { hue } => Some(*hue),
            SeriesColor::Explicit(_) => None,
        }
    }

    pub fn to_srgb(&self) -> Srgb<u8> {
        match self {
            SeriesColor::Explicit(c) => c.rgb(),
            SeriesColor::Derived { hue } => {
                let hsl = Hsl::new(*hue, SATURATION, LIGHTNESS);
                let rgb: Srgb = hsl.into_color();
                Srgb::new(
                    (rgb.red * 255.0).round() as u8,
                    (rgb.green * 255.0).round() as u8,
                    (rgb.blue * 255.0).round() as u8,
                )
            }
        }
    }

    /// CSS notation, e.g. `#FF7F50` or `hsl(120, 70%, 50%)`.
    pub fn css(&self) -> String {
        match self {
            SeriesColor::Explicit(c) => c.to_string(),
            SeriesColor::Derived { hue } => format!(
                "hsl({hue}, {}%, {}%)",
                (SATURATION * 100.0).round(),
                (LIGHTNESS * 100.0).round()
            ),
        }
    }
}

impl Serialize for SeriesColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.css())
    }
}

/// Hue of the `position`-th of `count` evenly spaced colours.
pub fn hue_for(position: usize, count: usize) -> f32 {
    if count == 0 {
        return 0.0;
    }
    position as f32 * 360.0 / count as f32
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<SeriesColor> {
    (0..n)
        .map(|i| SeriesColor::Derived { hue: hue_for(i, n) })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_evenly_spaced() {
        let hues: Vec<f32> = generate_palette(3).iter().filter_map(|c| c.hue()).collect();
        assert_eq!(hues, vec![0.0, 120.0, 240.0]);
        assert!(generate_palette(0).is_empty());
    }

    #[test]
    fn derived_colour_renders_like_css_hsl() {
        let red = SeriesColor::Derived { hue: 0.0 };
        assert_eq!(red.css(), "hsl(0, 70%, 50%)");
        // hsl(0, 70%, 50%) == rgb(217, 38, 38)
        assert_eq!(red.to_srgb(), Srgb::new(217, 38, 38));
        assert_eq!(SeriesColor::Derived { hue: 120.0 }.css(), "hsl(120, 70%, 50%)");
    }

    #[test]
    fn hex_colours_parse_and_print() {
        let coral: HexColor = "#FF7F50".parse().unwrap();
        assert_eq!(coral.rgb(), Srgb::new(255, 127, 80));
        assert_eq!(coral.to_string(), "#FF7F50");
        assert_eq!(SeriesColor::Explicit(coral).css(), "#FF7F50");

        assert!("FF7F50".parse::<HexColor>().is_err());
        assert!("#GG0000".parse::<HexColor>().is_err());
    }

    #[test]
    fn hex_colour_deserializes_from_json_string() {
        let c: HexColor = serde_json::from_str("\"#000000\"").unwrap();
        assert_eq!(c.rgb(), Srgb::new(0, 0, 0));
        assert!(serde_json::from_str::<HexColor>("\"black\"").is_err());
    }
}
