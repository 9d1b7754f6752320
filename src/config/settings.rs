//! Export settings for mdexport
//!
//! This module defines the `Settings` struct that holds all user-configurable
//! export options, with serde support for JSON persistence.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Theme Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Color theme of the rendered preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Value carried by the page's `data-theme` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn is_dark(&self) -> bool {
        matches!(self, Theme::Dark)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Page Size Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Paper size for paginated output. Portrait only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    /// ISO A4, 210 x 297 mm
    #[default]
    A4,
    /// US Letter, 8.5 x 11 in
    Letter,
}

impl PageSize {
    /// Page width in PDF points.
    pub fn width_pt(&self) -> f32 {
        match self {
            PageSize::A4 => 595.28,
            PageSize::Letter => 612.0,
        }
    }

    /// Page height in PDF points.
    pub fn height_pt(&self) -> f32 {
        match self {
            PageSize::A4 => 841.89,
            PageSize::Letter => 792.0,
        }
    }

    /// Page width in twentieths of a point (OOXML section units).
    pub fn width_twips(&self) -> u32 {
        match self {
            PageSize::A4 => 11906,
            PageSize::Letter => 12240,
        }
    }

    /// Page height in twentieths of a point.
    pub fn height_twips(&self) -> u32 {
        match self {
            PageSize::A4 => 16838,
            PageSize::Letter => 15840,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "Letter",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// Export preferences that persist across sessions.
///
/// All fields have sensible defaults via the `Default` trait and `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────
    /// Theme the preview is rendered with before export
    pub theme: Theme,

    /// Paper size for the PDF and DOCX section
    pub page_size: PageSize,

    /// Width in CSS pixels at which the preview is laid out for rasterizing
    pub viewport_width: f32,

    /// Oversampling factor applied when rasterizing (never below 2.0)
    pub scale_factor: f32,

    /// JPEG quality for the page bitmap, 1-100
    pub jpeg_quality: u8,

    // ─────────────────────────────────────────────────────────────────────────
    // Timing
    // ─────────────────────────────────────────────────────────────────────────
    /// Upper bound on how long a single image may take to load
    pub image_timeout_ms: u64,

    /// Pause after forcing the light theme before a raster export
    pub raster_settle_ms: u64,

    /// Pause after forcing the light theme before a structured export
    pub structured_settle_ms: u64,

    // ─────────────────────────────────────────────────────────────────────────
    // Document
    // ─────────────────────────────────────────────────────────────────────────
    /// Id of the element holding the rendered content
    pub content_root_id: String,

    // ─────────────────────────────────────────────────────────────────────────
    // Output
    // ─────────────────────────────────────────────────────────────────────────
    /// Directory artifacts are written to (current directory when unset)
    pub output_directory: Option<PathBuf>,

    /// Whether to open exported files after export
    pub open_after_export: bool,

    /// Last directory an export was written to
    pub last_export_directory: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Rendering
            theme: Theme::default(),
            page_size: PageSize::default(),
            viewport_width: 800.0,
            scale_factor: 2.0,
            jpeg_quality: 95,

            // Timing
            image_timeout_ms: 5000,
            raster_settle_ms: 1000,
            structured_settle_ms: 100,

            // Document
            content_root_id: String::from(Self::DEFAULT_CONTENT_ROOT_ID),

            // Output
            output_directory: None,
            open_after_export: false,
            last_export_directory: None,
        }
    }
}

impl Settings {
    // ─────────────────────────────────────────────────────────────────────────
    // Validation Constants and Sanitization
    // ─────────────────────────────────────────────────────────────────────────

    /// Id of the preview's content element.
    pub const DEFAULT_CONTENT_ROOT_ID: &'static str = "markdown-preview";
    /// Minimum layout width.
    pub const MIN_VIEWPORT_WIDTH: f32 = 320.0;
    /// Maximum layout width.
    pub const MAX_VIEWPORT_WIDTH: f32 = 4000.0;
    /// Minimum oversampling factor.
    pub const MIN_SCALE_FACTOR: f32 = 2.0;
    /// Maximum oversampling factor.
    pub const MAX_SCALE_FACTOR: f32 = 4.0;
    /// Minimum JPEG quality.
    pub const MIN_JPEG_QUALITY: u8 = 50;
    /// Maximum JPEG quality.
    pub const MAX_JPEG_QUALITY: u8 = 100;
    /// Minimum per-image wait.
    pub const MIN_IMAGE_TIMEOUT_MS: u64 = 100;
    /// Maximum per-image wait.
    pub const MAX_IMAGE_TIMEOUT_MS: u64 = 60_000;
    /// Maximum settle delay.
    pub const MAX_SETTLE_MS: u64 = 10_000;

    /// Sanitize settings by clamping values to valid ranges.
    ///
    /// This is useful after loading settings from a file that might have
    /// been manually edited with invalid values.
    pub fn sanitize(&mut self) {
        if !self.viewport_width.is_finite() {
            self.viewport_width = 800.0;
        }
        self.viewport_width = self
            .viewport_width
            .clamp(Self::MIN_VIEWPORT_WIDTH, Self::MAX_VIEWPORT_WIDTH);

        if !self.scale_factor.is_finite() {
            self.scale_factor = Self::MIN_SCALE_FACTOR;
        }
        self.scale_factor = self
            .scale_factor
            .clamp(Self::MIN_SCALE_FACTOR, Self::MAX_SCALE_FACTOR);

        self.jpeg_quality = self
            .jpeg_quality
            .clamp(Self::MIN_JPEG_QUALITY, Self::MAX_JPEG_QUALITY);

        self.image_timeout_ms = self
            .image_timeout_ms
            .clamp(Self::MIN_IMAGE_TIMEOUT_MS, Self::MAX_IMAGE_TIMEOUT_MS);
        self.raster_settle_ms = self.raster_settle_ms.min(Self::MAX_SETTLE_MS);
        self.structured_settle_ms = self.structured_settle_ms.min(Self::MAX_SETTLE_MS);

        // An id with whitespace can never match an element
        let id = self.content_root_id.trim();
        if id.is_empty() || id.contains(char::is_whitespace) {
            self.content_root_id = String::from(Self::DEFAULT_CONTENT_ROOT_ID);
        } else if id.len() != self.content_root_id.len() {
            self.content_root_id = id.to_string();
        }
    }

    /// Parse settings from JSON and sanitize values.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Directory artifacts go to, falling back to the current directory.
    pub fn resolved_output_directory(&self) -> PathBuf {
        self.output_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
