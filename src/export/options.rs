//! Export Formats and Preparation Options
//!
//! This module defines the output formats and how the export clone is
//! prepared for each of them before a generator runs.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use super::flatten::FlattenMode;
use super::sanitize::SanitizeMode;
use crate::config::Settings;

// ─────────────────────────────────────────────────────────────────────────────
// Export Format
// ─────────────────────────────────────────────────────────────────────────────

/// Supported export formats for documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Page-fitted PDF built from a rasterized snapshot
    #[default]
    Pdf,
    /// Word document built from the markup structure
    Docx,
    /// Standalone HTML with flattened styles
    Html,
}

/// Which generator produces a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportPath {
    Raster,
    Structured,
    Snapshot,
}

impl ExportFormat {
    /// Get the display label for this format.
    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "PDF",
            ExportFormat::Docx => "DOCX",
            ExportFormat::Html => "HTML",
        }
    }

    /// Get the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Docx => "docx",
            ExportFormat::Html => "html",
        }
    }

    /// Get the MIME type of the produced file.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ExportFormat::Html => "text/html",
        }
    }

    pub fn path(&self) -> ExportPath {
        match self {
            ExportFormat::Pdf => ExportPath::Raster,
            ExportFormat::Docx => ExportPath::Structured,
            ExportFormat::Html => ExportPath::Snapshot,
        }
    }

    /// Get all available export formats.
    pub fn all() -> &'static [ExportFormat] {
        &[ExportFormat::Pdf, ExportFormat::Docx, ExportFormat::Html]
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "docx" | "word" => Ok(ExportFormat::Docx),
            "html" | "htm" => Ok(ExportFormat::Html),
            other => Err(format!("unknown export format: {}", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Preparation
// ─────────────────────────────────────────────────────────────────────────────

/// How the export clone is prepared for one format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preparation {
    /// Pause after forcing the light theme so the preview can restyle
    pub settle_delay: Duration,
    pub sanitize: SanitizeMode,
    pub flatten: FlattenMode,
}

impl Preparation {
    pub fn for_format(format: ExportFormat, settings: &Settings) -> Self {
        match format.path() {
            ExportPath::Raster => Self {
                settle_delay: Duration::from_millis(settings.raster_settle_ms),
                sanitize: SanitizeMode::Raster,
                flatten: FlattenMode::Inline,
            },
            ExportPath::Structured => Self {
                settle_delay: Duration::from_millis(settings.structured_settle_ms),
                sanitize: SanitizeMode::Structured,
                flatten: FlattenMode::Inline,
            },
            // The snapshot keeps the markup; one rule per class signature
            ExportPath::Snapshot => Self {
                settle_delay: Duration::from_millis(settings.structured_settle_ms),
                sanitize: SanitizeMode::Raster,
                flatten: FlattenMode::Stylesheet,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_default() {
        assert_eq!(ExportFormat::default(), ExportFormat::Pdf);
    }

    #[test]
    fn test_export_format_label() {
        assert_eq!(ExportFormat::Pdf.label(), "PDF");
        assert_eq!(ExportFormat::Docx.label(), "DOCX");
    }

    #[test]
    fn test_export_format_extension() {
        assert_eq!(ExportFormat::Pdf.extension(), "pdf");
        assert_eq!(ExportFormat::Docx.extension(), "docx");
        assert_eq!(ExportFormat::Html.extension(), "html");
    }

    #[test]
    fn test_export_format_from_str() {
        assert_eq!("PDF".parse::<ExportFormat>(), Ok(ExportFormat::Pdf));
        assert_eq!(" docx ".parse::<ExportFormat>(), Ok(ExportFormat::Docx));
        assert!("odt".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_export_format_serialization() {
        let json = serde_json::to_string(&ExportFormat::Docx).unwrap();
        assert_eq!(json, "\"docx\"");
        let back: ExportFormat = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ExportFormat::Docx);
    }

    #[test]
    fn test_preparation_per_path() {
        let settings = Settings::default();

        let raster = Preparation::for_format(ExportFormat::Pdf, &settings);
        assert_eq!(raster.settle_delay, Duration::from_millis(1000));
        assert_eq!(raster.sanitize, SanitizeMode::Raster);

        let structured = Preparation::for_format(ExportFormat::Docx, &settings);
        assert_eq!(structured.settle_delay, Duration::from_millis(100));
        assert_eq!(structured.sanitize, SanitizeMode::Structured);

        let snapshot = Preparation::for_format(ExportFormat::Html, &settings);
        assert_eq!(snapshot.flatten, FlattenMode::Stylesheet);
    }
}
