//! mdexport
//!
//! Exports a rendered Markdown preview to a page-fitted PDF (rasterized
//! snapshot), a structured DOCX, or a standalone HTML file. The preview is
//! always exported light, whatever theme it is displayed in.
//!
//! ```ignore
//! let settings = load_config();
//! let preview = render_preview(&markdown, settings.theme, &settings.content_root_id);
//! let exporter = Exporter::new(settings, LocalFetcher::new("."), DirectorySink::new("out"));
//! let body = preview.document.body_element().unwrap();
//! exporter.export(&preview.document, &body, "notes.md", ExportFormat::Pdf).await?;
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod export;
pub mod markdown;
pub mod style;
pub mod theme;

pub use error::{Error, Result};
