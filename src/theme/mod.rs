//! Theme System for mdexport
//!
//! This module holds the color primitives the export pipeline reasons
//! about: parsing CSS color values into sRGB, judging whether a color reads
//! as dark or light, and the fixed light palette exports are forced into.
//!
//! # Architecture
//!
//! - `light.rs` - The literal light values written into exported content
//! - `manager.rs` - Capturing, forcing and restoring the live document's
//!   global theme markers (`ThemeState`, `ThemeGuard`)
//!
//! Colors in the preview come from two worlds: legacy sRGB notations
//! (`#hex`, `rgb()`, `hsl()`, named colors) handled by `csscolorparser`, and
//! the wide-gamut functions emitted by modern utility frameworks (`oklch()`,
//! `oklab()`, `lab()`, `lch()`), which are converted here.

pub mod light;
pub mod manager;

pub use light::ExportPalette;
pub use manager::{ThemeGuard, ThemeState};

use csscolorparser::Color as CssColor;
use std::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// Rgb
// ─────────────────────────────────────────────────────────────────────────────

/// An sRGB color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Opacity in `0.0..=1.0`
    pub a: f32,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Parse any CSS color value this crate understands.
    ///
    /// Returns `None` for `currentcolor`, unknown keywords and functions
    /// that cannot be converted without context (`color()`, `color-mix()`).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value.is_empty() || value == "currentcolor" {
            return None;
        }
        if value == "transparent" {
            return Some(Rgb::new(0, 0, 0).with_alpha(0.0));
        }

        if let Some(args) = function_args(&value, "oklch") {
            return parse_oklch(args);
        }
        if let Some(args) = function_args(&value, "oklab") {
            return parse_oklab(args);
        }
        if let Some(args) = function_args(&value, "lch") {
            return parse_lch(args);
        }
        if let Some(args) = function_args(&value, "lab") {
            return parse_lab(args);
        }
        if value.starts_with("color(") || value.starts_with("color-mix(") {
            return None;
        }

        let parsed: CssColor = value.parse().ok()?;
        let [r, g, b, a] = parsed.to_rgba8();
        Some(Rgb::new(r, g, b).with_alpha(a as f32 / 255.0))
    }

    /// Average channel value, `0.0..=255.0`.
    pub fn brightness(&self) -> f32 {
        (self.r as f32 + self.g as f32 + self.b as f32) / 3.0
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= f32::EPSILON
    }

    /// `#rrggbb`, ignoring alpha.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Uppercase `RRGGBB` as used by OOXML color attributes.
    pub fn to_ooxml_hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Composite this color over an opaque background.
    pub fn over(&self, background: Rgb) -> Rgb {
        let blend = |fg: u8, bg: u8| -> u8 {
            (fg as f32 * self.a + bg as f32 * (1.0 - self.a)).round() as u8
        };
        Rgb::new(
            blend(self.r, background.r),
            blend(self.g, background.g),
            blend(self.b, background.b),
        )
    }
}

impl fmt::Display for Rgb {
    /// Legacy `rgb()`/`rgba()` notation, understood by every consumer.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
        } else {
            let alpha = (self.a * 1000.0).round() / 1000.0;
            write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, alpha)
        }
    }
}

/// Whether a computed value uses a color function outside legacy sRGB.
pub fn is_wide_gamut(value: &str) -> bool {
    const FUNCTIONS: [&str; 6] = ["oklch(", "oklab(", "lab(", "lch(", "color(", "color-mix("];
    let lower = value.to_ascii_lowercase();
    FUNCTIONS.iter().any(|f| lower.contains(f))
}

// ─────────────────────────────────────────────────────────────────────────────
// Wide-gamut conversions
// ─────────────────────────────────────────────────────────────────────────────

fn function_args<'a>(value: &'a str, name: &str) -> Option<&'a str> {
    value
        .strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Split `L C H / A` into components, tolerating legacy commas.
fn components(args: &str) -> Option<(Vec<&str>, Option<&str>)> {
    let (channels, alpha) = match args.split_once('/') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (args, None),
    };
    let parts: Vec<&str> = channels
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() == 3 {
        Some((parts, alpha))
    } else {
        None
    }
}

/// A number or percentage; `percent_scale` is the value of `100%`.
fn number(token: &str, percent_scale: f32) -> Option<f32> {
    if token == "none" {
        return Some(0.0);
    }
    if let Some(p) = token.strip_suffix('%') {
        return p.parse::<f32>().ok().map(|v| v / 100.0 * percent_scale);
    }
    token.parse::<f32>().ok()
}

fn hue(token: &str) -> Option<f32> {
    let token = token.strip_suffix("deg").unwrap_or(token);
    number(token, 1.0)
}

fn alpha(token: Option<&str>) -> Option<f32> {
    match token {
        Some(t) => number(t, 1.0),
        None => Some(1.0),
    }
}

fn parse_oklch(args: &str) -> Option<Rgb> {
    let (parts, a) = components(args)?;
    let l = number(parts[0], 1.0)?;
    let c = number(parts[1], 0.4)?;
    let h = hue(parts[2])?.to_radians();
    Some(oklab_to_rgb(l, c * h.cos(), c * h.sin()).with_alpha(alpha(a)?))
}

fn parse_oklab(args: &str) -> Option<Rgb> {
    let (parts, a) = components(args)?;
    let l = number(parts[0], 1.0)?;
    let ca = number(parts[1], 0.4)?;
    let cb = number(parts[2], 0.4)?;
    Some(oklab_to_rgb(l, ca, cb).with_alpha(alpha(a)?))
}

fn parse_lch(args: &str) -> Option<Rgb> {
    let (parts, a) = components(args)?;
    let l = number(parts[0], 100.0)?;
    let c = number(parts[1], 150.0)?;
    let h = hue(parts[2])?.to_radians();
    Some(lab_to_rgb(l, c * h.cos(), c * h.sin()).with_alpha(alpha(a)?))
}

fn parse_lab(args: &str) -> Option<Rgb> {
    let (parts, a) = components(args)?;
    let l = number(parts[0], 100.0)?;
    let ca = number(parts[1], 125.0)?;
    let cb = number(parts[2], 125.0)?;
    Some(lab_to_rgb(l, ca, cb).with_alpha(alpha(a)?))
}

fn oklab_to_rgb(l: f32, a: f32, b: f32) -> Rgb {
    let l_ = l + 0.396_337_78 * a + 0.215_803_76 * b;
    let m_ = l - 0.105_561_346 * a - 0.063_854_17 * b;
    let s_ = l - 0.089_484_18 * a - 1.291_485_5 * b;
    let (l3, m3, s3) = (l_.powi(3), m_.powi(3), s_.powi(3));

    let r = 4.076_741_7 * l3 - 3.307_711_6 * m3 + 0.230_969_94 * s3;
    let g = -1.268_438 * l3 + 2.609_757_4 * m3 - 0.341_319_38 * s3;
    let b = -0.004_196_086_3 * l3 - 0.703_418_6 * m3 + 1.707_614_7 * s3;
    Rgb::new(encode_srgb(r), encode_srgb(g), encode_srgb(b))
}

/// CIE Lab (D50) to sRGB (D65, Bradford-adapted).
fn lab_to_rgb(l: f32, a: f32, b: f32) -> Rgb {
    const EPSILON: f32 = 216.0 / 24389.0;
    const KAPPA: f32 = 24389.0 / 27.0;

    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let inverse = |f: f32| {
        let cube = f * f * f;
        if cube > EPSILON {
            cube
        } else {
            (116.0 * f - 16.0) / KAPPA
        }
    };
    let x = inverse(fx) * 0.964_22;
    let y = if l > KAPPA * EPSILON { fy.powi(3) } else { l / KAPPA };
    let z = inverse(fz) * 0.825_21;

    let r = 3.133_856_1 * x - 1.616_866_7 * y - 0.490_614_6 * z;
    let g = -0.978_768_4 * x + 1.916_141_5 * y + 0.033_454 * z;
    let b = 0.071_945_3 * x - 0.228_991_4 * y + 1.405_242_7 * z;
    Rgb::new(encode_srgb(r), encode_srgb(g), encode_srgb(b))
}

fn encode_srgb(linear: f32) -> u8 {
    let linear = linear.clamp(0.0, 1.0);
    let encoded = if linear <= 0.003_130_8 {
        12.92 * linear
    } else {
        1.055 * linear.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round().clamp(0.0, 255.0) as u8
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_legacy_notations() {
        assert_eq!(Rgb::parse("#ffffff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse("rgb(0, 0, 0)"), Some(Rgb::BLACK));
        assert_eq!(Rgb::parse("white"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse("  #F5F5F5 "), Some(Rgb::new(245, 245, 245)));
    }

    #[test]
    fn test_parse_transparent_and_currentcolor() {
        let transparent = Rgb::parse("transparent").unwrap();
        assert!(transparent.is_transparent());
        assert!(Rgb::parse("currentColor").is_none());
        assert!(Rgb::parse("").is_none());
    }

    #[test]
    fn test_parse_oklch_extremes() {
        assert_eq!(Rgb::parse("oklch(1 0 0)"), Some(Rgb::WHITE));
        assert_eq!(Rgb::parse("oklch(0% 0 0)"), Some(Rgb::BLACK));
    }

    #[test]
    fn test_parse_oklch_dark_gray_is_dark() {
        // Tailwind gray-900
        let c = Rgb::parse("oklch(21% 0.034 264.665)").unwrap();
        assert!(c.brightness() < 128.0);
        // Tailwind gray-100
        let c = Rgb::parse("oklch(96.7% 0.003 264.542)").unwrap();
        assert!(c.brightness() > 200.0);
    }

    #[test]
    fn test_parse_oklch_with_alpha() {
        let c = Rgb::parse("oklch(37.9% 0.146 265.522 / 0.2)").unwrap();
        assert!((c.a - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_parse_lab_white_and_black() {
        let white = Rgb::parse("lab(100 0 0)").unwrap();
        assert!(white.brightness() > 250.0);
        assert_eq!(Rgb::parse("lab(0% 0 0)"), Some(Rgb::BLACK));
        let gray = Rgb::parse("lch(50 0 0)").unwrap();
        assert!((gray.brightness() - 119.0).abs() < 3.0);
    }

    #[test]
    fn test_unconvertible_functions() {
        assert!(Rgb::parse("color(display-p3 1 0 0)").is_none());
        assert!(Rgb::parse("color-mix(in srgb, red, blue)").is_none());
        assert!(Rgb::parse("oklch(1 0)").is_none());
    }

    #[test]
    fn test_brightness() {
        assert_eq!(Rgb::WHITE.brightness(), 255.0);
        assert_eq!(Rgb::BLACK.brightness(), 0.0);
        assert_eq!(Rgb::new(30, 60, 90).brightness(), 60.0);
    }

    #[test]
    fn test_display_and_hex() {
        assert_eq!(Rgb::new(1, 2, 3).to_string(), "rgb(1, 2, 3)");
        assert_eq!(
            Rgb::new(1, 2, 3).with_alpha(0.5).to_string(),
            "rgba(1, 2, 3, 0.5)"
        );
        assert_eq!(Rgb::new(245, 245, 245).to_hex(), "#f5f5f5");
        assert_eq!(Rgb::new(245, 245, 245).to_ooxml_hex(), "F5F5F5");
    }

    #[test]
    fn test_over_white() {
        let half_black = Rgb::BLACK.with_alpha(0.5);
        assert_eq!(half_black.over(Rgb::WHITE), Rgb::new(128, 128, 128));
    }

    #[test]
    fn test_is_wide_gamut() {
        assert!(is_wide_gamut("oklch(0.5 0.1 200)"));
        assert!(is_wide_gamut("2px solid LAB(50 0 0)"));
        assert!(is_wide_gamut("color-mix(in oklab, red, blue)"));
        assert!(!is_wide_gamut("rgb(0, 0, 0)"));
        assert!(!is_wide_gamut("#ffffff"));
    }
}
