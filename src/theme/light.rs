//! Light Export Palette
//!
//! Every export is rendered light regardless of the live UI theme. These are
//! the literal values written over theme-dependent styling, together with
//! the thresholds that decide when a computed color needs replacing.

use super::Rgb;

/// Fixed light values and the brightness thresholds that trigger them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportPalette {
    /// Page and dark-surface replacement background
    pub background: Rgb,
    /// Replacement for text that would vanish on a light page
    pub text: Rgb,
    /// Shading for inline code and preformatted blocks
    pub code_background: Rgb,
    /// Backgrounds darker than this are replaced
    pub dark_background_threshold: f32,
    /// Text brighter than this is replaced
    pub light_text_threshold: f32,
}

impl Default for ExportPalette {
    fn default() -> Self {
        Self::light()
    }
}

impl ExportPalette {
    pub fn light() -> Self {
        Self {
            background: Rgb::WHITE,
            text: Rgb::BLACK,
            code_background: Rgb::new(245, 245, 245),
            dark_background_threshold: 128.0,
            light_text_threshold: 200.0,
        }
    }

    /// Whether an opaque-enough background would print as a dark surface.
    pub fn is_dark_background(&self, color: Rgb) -> bool {
        !color.is_transparent() && color.brightness() < self.dark_background_threshold
    }

    /// Whether text in this color would be unreadable on a white page.
    pub fn is_light_text(&self, color: Rgb) -> bool {
        !color.is_transparent() && color.brightness() > self.light_text_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_palette_values() {
        let palette = ExportPalette::light();
        assert_eq!(palette.background.to_hex(), "#ffffff");
        assert_eq!(palette.text.to_hex(), "#000000");
        assert_eq!(palette.code_background.to_hex(), "#f5f5f5");
    }

    #[test]
    fn test_dark_background_threshold() {
        let palette = ExportPalette::light();
        assert!(palette.is_dark_background(Rgb::new(17, 24, 39)));
        assert!(!palette.is_dark_background(Rgb::new(128, 128, 128)));
        assert!(!palette.is_dark_background(Rgb::BLACK.with_alpha(0.0)));
    }

    #[test]
    fn test_light_text_threshold() {
        let palette = ExportPalette::light();
        assert!(palette.is_light_text(Rgb::new(243, 244, 246)));
        assert!(!palette.is_light_text(Rgb::new(200, 200, 200)));
        assert!(!palette.is_light_text(Rgb::new(55, 65, 81)));
    }
}
