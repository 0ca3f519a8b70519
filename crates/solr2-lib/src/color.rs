//! RGB color type, HSV conversion, and color string parsing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An 8-bit-per-channel color as sent on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn is_black(self) -> bool {
        self == Rgb::BLACK
    }

    /// Largest of the three channels.
    pub fn max_channel(self) -> u8 {
        self.r.max(self.g).max(self.b)
    }

    /// Multiply every channel by `k` (expected in `0.0..=1.0`), truncating.
    pub fn scale(self, k: f64) -> Rgb {
        let ch = |c: u8| (c as f64 * k) as u8;
        Rgb::new(ch(self.r), ch(self.g), ch(self.b))
    }

    /// Build from unit-range floats, scaling to `0..=255` and truncating.
    pub fn from_unit(r: f64, g: f64, b: f64) -> Rgb {
        let ch = |c: f64| (c * 255.0) as u8;
        Rgb::new(ch(r), ch(g), ch(b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.r, self.g, self.b)
    }
}

/// Convert HSV (all components in `0.0..=1.0`) to unit-range RGB.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Parse a color string.
///
/// Accepts:
/// - Named: `"red"`, `"green"`, `"blue"`, `"white"`, `"orange"`, `"yellow"`,
///   `"purple"`, `"cyan"`, `"off"`
/// - Hex: `"#FF8000"`, `"ff8000"`
/// - Components: `"255,128,0"` or `"255 128 0"`
pub fn parse_color(s: &str) -> crate::error::Result<Rgb> {
    let s = s.trim();

    match s.to_lowercase().as_str() {
        "red" => return Ok(Rgb::new(255, 0, 0)),
        "green" => return Ok(Rgb::new(0, 255, 0)),
        "blue" => return Ok(Rgb::new(0, 0, 255)),
        "white" => return Ok(Rgb::new(255, 255, 255)),
        "orange" => return Ok(Rgb::new(255, 128, 0)),
        "yellow" => return Ok(Rgb::new(255, 255, 0)),
        "purple" => return Ok(Rgb::new(128, 0, 255)),
        "cyan" => return Ok(Rgb::new(0, 255, 255)),
        "off" | "black" => return Ok(Rgb::BLACK),
        _ => {}
    }

    let parts: Vec<&str> = s
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() == 3 {
        let mut ch = [0u8; 3];
        for (slot, part) in ch.iter_mut().zip(&parts) {
            *slot = part.parse::<u8>().map_err(|_| {
                crate::Solr2Error::Color(format!("Invalid component '{part}' in {s} (use 0..255)"))
            })?;
        }
        return Ok(Rgb::new(ch[0], ch[1], ch[2]));
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 {
        return Err(crate::Solr2Error::Color(format!(
            "Invalid color: {s} (use #RRGGBB, R,G,B or a color name)"
        )));
    }
    let val = u32::from_str_radix(hex, 16)
        .map_err(|_| crate::Solr2Error::Color(format!("Invalid hex color: {s}")))?;
    Ok(Rgb::new((val >> 16) as u8, (val >> 8) as u8, val as u8))
}

/// Format a color as `#RRGGBB`.
pub fn format_color(c: Rgb) -> String {
    format!("#{:02X}{:02X}{:02X}", c.r, c.g, c.b)
}
