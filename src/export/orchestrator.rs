//! Export Orchestrator
//!
//! Drives one export from a live element to a saved file:
//!
//! ```text
//! Idle -> Preparing -> Generating -> Saving -> Done
//!            \------------\------------\-----> Failed
//! ```
//!
//! Preparing checks the input, forces the light theme through
//! [`ThemeGuard`], waits for the preview to restyle and builds the prepared
//! clone (normalize, sanitize, flatten). Generating hands the clone to the
//! format's generator; Saving passes the artifact to the sink. Whatever
//! happens, the guard puts the live theme back when the call returns.

use kuchiki::NodeRef;
use log::{debug, info, warn};
use std::cell::Cell;
use std::fmt;

use super::flatten::{flatten, FlattenOutcome};
use super::html::generate_html_document;
use super::images::ResourceFetcher;
use super::normalize::normalize;
use super::options::{ExportFormat, ExportPath, Preparation};
use super::raster::{self, RasterOptions};
use super::sanitize::sanitize;
use super::sink::{Artifact, ArtifactSink, SavedArtifact};
use super::structured::{self, StructuredOptions};
use crate::config::Settings;
use crate::dom::{self, LiveDocument};
use crate::error::{Error, Result};
use crate::style::{ComputedStyle, StyleResolver};
use crate::theme::{ExportPalette, ThemeGuard};

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Where an export currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportState {
    #[default]
    Idle,
    Preparing,
    Generating,
    Saving,
    Done,
    Failed,
}

impl ExportState {
    pub fn can_transition_to(self, next: ExportState) -> bool {
        use ExportState::*;
        matches!(
            (self, next),
            (Idle, Preparing)
                | (Preparing, Generating)
                | (Generating, Saving)
                | (Saving, Done)
                | (Preparing | Generating | Saving, Failed)
                | (Done | Failed, Idle)
        )
    }

    /// Whether an export is under way.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            ExportState::Preparing | ExportState::Generating | ExportState::Saving
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Broad category of a failed export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportErrorKind {
    /// Nothing to export
    Input,
    Rendering,
    Serialization,
    /// A format library failed
    Conversion,
    /// The artifact could not be saved
    Save,
    /// The exporter was misused (e.g. a second export while one is running)
    Internal,
}

impl ExportErrorKind {
    fn of(error: &Error) -> Self {
        match error {
            Error::EmptyContent(_) => ExportErrorKind::Input,
            Error::Rendering(_) => ExportErrorKind::Rendering,
            Error::Serialization(_) => ExportErrorKind::Serialization,
            Error::Application(_) => ExportErrorKind::Internal,
            Error::FileWrite { .. } => ExportErrorKind::Save,
            _ => ExportErrorKind::Conversion,
        }
    }
}

/// The single error type callers of [`Exporter::export`] see.
#[derive(Debug)]
pub struct ExportError {
    pub format: ExportFormat,
    pub kind: ExportErrorKind,
    pub message: String,
    source: Error,
}

impl ExportError {
    fn new(format: ExportFormat, kind: ExportErrorKind, source: Error) -> Self {
        Self {
            format,
            kind,
            message: source.to_string(),
            source,
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to export {}: {}", self.format.label(), self.message)
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Exporter
// ─────────────────────────────────────────────────────────────────────────────

/// The prepared clone and what it inherits.
struct Prepared {
    clone: NodeRef,
    context: ComputedStyle,
    flattened: FlattenOutcome,
    title: Option<String>,
}

/// Runs exports of a live document, one at a time.
pub struct Exporter {
    settings: Settings,
    resolver: StyleResolver,
    palette: ExportPalette,
    fetcher: Box<dyn ResourceFetcher>,
    sink: Box<dyn ArtifactSink>,
    state: Cell<ExportState>,
}

impl Exporter {
    pub fn new(
        settings: Settings,
        fetcher: impl ResourceFetcher + 'static,
        sink: impl ArtifactSink + 'static,
    ) -> Self {
        Self {
            settings,
            resolver: StyleResolver::new(),
            palette: ExportPalette::light(),
            fetcher: Box::new(fetcher),
            sink: Box::new(sink),
            state: Cell::new(ExportState::Idle),
        }
    }

    pub fn with_palette(mut self, palette: ExportPalette) -> Self {
        self.palette = palette;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// State of the current or most recent export.
    pub fn state(&self) -> ExportState {
        self.state.get()
    }

    /// Export `element` (or the content root inside it) as `format`.
    ///
    /// `base_name` is usually the Markdown file name; it is sanitized before
    /// it reaches the file system.
    pub async fn export(
        &self,
        doc: &LiveDocument,
        element: &NodeRef,
        base_name: &str,
        format: ExportFormat,
    ) -> std::result::Result<SavedArtifact, ExportError> {
        if self.state().is_in_flight() {
            let error = Error::Application(format!(
                "an export is already {:?}",
                self.state()
            ));
            return Err(ExportError::new(format, ExportErrorKind::Internal, error));
        }
        self.state.set(ExportState::Idle);

        match self.run(doc, element, base_name, format).await {
            Ok(saved) => {
                info!(
                    "Exported {} to {}",
                    format.label(),
                    saved.path.display()
                );
                Ok(saved)
            }
            Err(error) => {
                let kind = if self.state() == ExportState::Saving {
                    ExportErrorKind::Save
                } else {
                    ExportErrorKind::of(&error)
                };
                if let Err(e) = self.advance(ExportState::Failed) {
                    debug!("{}", e);
                }
                let error = ExportError::new(format, kind, error);
                warn!("{}", error);
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        doc: &LiveDocument,
        element: &NodeRef,
        base_name: &str,
        format: ExportFormat,
    ) -> Result<SavedArtifact> {
        self.advance(ExportState::Preparing)?;

        let target = dom::find_content_root(element, &self.settings.content_root_id);
        if dom::is_empty_subtree(&target) {
            return Err(Error::EmptyContent(
                "There is no content to export".to_string(),
            ));
        }

        let preparation = Preparation::for_format(format, &self.settings);
        let _guard = ThemeGuard::acquire(doc);
        if !preparation.settle_delay.is_zero() {
            debug!("Waiting {:?} for the preview to restyle", preparation.settle_delay);
            tokio::time::sleep(preparation.settle_delay).await;
        }
        let prepared = self.prepare(doc, &target, &preparation);

        self.advance(ExportState::Generating)?;
        let payload = self.generate(&prepared, format).await?;
        let artifact = Artifact::new(base_name, format, payload)?;

        self.advance(ExportState::Saving)?;
        let saved = self.sink.save(&artifact).await?;

        self.advance(ExportState::Done)?;
        Ok(saved)
    }

    fn prepare(
        &self,
        doc: &LiveDocument,
        target: &NodeRef,
        preparation: &Preparation,
    ) -> Prepared {
        let clone = normalize(doc, target, &self.resolver, &self.palette);
        let context = self.resolver.context_style(target);

        let report = sanitize(&clone, preparation.sanitize);
        if !report.is_clean() {
            debug!(
                "Sanitized clone: {} removed, {} placeholders, {} attributes stripped",
                report.removed, report.placeholders, report.stripped_attributes
            );
        }

        let flattened = flatten(&clone, &context, &self.resolver, preparation.flatten);
        Prepared {
            clone,
            context,
            flattened,
            title: doc.title(),
        }
    }

    async fn generate(&self, prepared: &Prepared, format: ExportFormat) -> Result<Vec<u8>> {
        match format.path() {
            ExportPath::Raster => {
                let options = RasterOptions::from_settings(&self.settings)
                    .with_title(prepared.title.clone());
                raster::generate(
                    &prepared.clone,
                    &prepared.context,
                    &self.resolver,
                    self.fetcher.as_ref(),
                    &options,
                )
                .await
            }
            ExportPath::Structured => {
                let options = StructuredOptions {
                    page_size: self.settings.page_size,
                    title: prepared.title.clone(),
                };
                structured::generate(&prepared.clone, &options).await
            }
            ExportPath::Snapshot => Ok(generate_html_document(
                &prepared.clone,
                &prepared.flattened.stylesheet,
                prepared.title.as_deref(),
                &self.palette,
            )
            .into_bytes()),
        }
    }

    fn advance(&self, next: ExportState) -> Result<()> {
        let current = self.state.get();
        if !current.can_transition_to(next) {
            return Err(Error::Application(format!(
                "invalid export transition {:?} -> {:?}",
                current, next
            )));
        }
        debug!("Export state: {:?} -> {:?}", current, next);
        self.state.set(next);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::images::tests::StallingFetcher;
    use crate::export::images::LocalFetcher;
    use crate::theme::ThemeState;
    use async_trait::async_trait;
    use std::io::{self, Cursor, Read};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink {
        saved: Arc<Mutex<Vec<Artifact>>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ArtifactSink for RecordingSink {
        async fn save(&self, artifact: &Artifact) -> Result<SavedArtifact> {
            if self.fail {
                return Err(Error::FileWrite {
                    path: PathBuf::from("/read-only").join(artifact.file_name()),
                    source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
                });
            }
            self.saved.lock().unwrap().push(artifact.clone());
            Ok(SavedArtifact {
                path: PathBuf::from(artifact.file_name()),
                format: artifact.format(),
                bytes: artifact.payload().len(),
            })
        }
    }

    fn settings() -> Settings {
        Settings {
            raster_settle_ms: 0,
            structured_settle_ms: 0,
            image_timeout_ms: 50,
            ..Settings::default()
        }
    }

    fn dark_page(content: &str) -> LiveDocument {
        LiveDocument::parse(&format!(
            r#"<html class="dark" data-theme="dark"><head><title>Notes</title></head><body class="dark"><main id="app"><article id="markdown-preview" class="dark:bg-gray-900">{}</article></main></body></html>"#,
            content
        ))
    }

    fn app(doc: &LiveDocument) -> NodeRef {
        doc.element_by_id("app").unwrap()
    }

    fn document_xml(docx: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
        let mut file = archive.by_name("word/document.xml").unwrap();
        let mut xml = String::new();
        file.read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn test_state_transitions() {
        use ExportState::*;
        assert!(Idle.can_transition_to(Preparing));
        assert!(Saving.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Idle));
        assert!(!Idle.can_transition_to(Generating));
        assert!(!Done.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(Failed));
    }

    #[tokio::test]
    async fn test_docx_export_restores_theme() {
        let doc = dark_page("<h1>Report</h1><p>Body text.</p>");
        let before = ThemeState::capture(&doc);
        let sink = RecordingSink::default();
        let exporter = Exporter::new(settings(), LocalFetcher::default(), sink.clone());

        let saved = exporter
            .export(&doc, &app(&doc), "My Report!! v2.md", ExportFormat::Docx)
            .await
            .unwrap();

        assert_eq!(saved.path, PathBuf::from("My_Report_v2.docx"));
        assert_eq!(exporter.state(), ExportState::Done);
        assert_eq!(ThemeState::capture(&doc), before);
        assert_eq!(sink.count(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_restores_theme() {
        let doc = dark_page("<h1>Report</h1>");
        let before = ThemeState::capture(&doc);
        let exporter = Exporter::new(settings(), LocalFetcher::default(), RecordingSink::failing());

        let error = exporter
            .export(&doc, &app(&doc), "report", ExportFormat::Docx)
            .await
            .unwrap_err();

        assert_eq!(error.kind, ExportErrorKind::Save);
        assert!(error.to_string().starts_with("Failed to export DOCX: "));
        assert_eq!(exporter.state(), ExportState::Failed);
        assert_eq!(ThemeState::capture(&doc), before);
    }

    #[tokio::test]
    async fn test_empty_content_never_saves() {
        for format in [ExportFormat::Pdf, ExportFormat::Docx] {
            let doc = dark_page("  \n ");
            let before = doc.to_html();
            let sink = RecordingSink::default();
            let exporter = Exporter::new(settings(), LocalFetcher::default(), sink.clone());

            let error = exporter
                .export(&doc, &app(&doc), "empty", format)
                .await
                .unwrap_err();

            assert_eq!(error.kind, ExportErrorKind::Input);
            assert_eq!(error.format, format);
            assert_eq!(sink.count(), 0);
            assert_eq!(doc.to_html(), before);
        }
    }

    #[tokio::test]
    async fn test_only_heading_survives_sanitizing() {
        let doc = dark_page(
            r#"<script>alert("x")</script><canvas width="10" height="10">fallback</canvas><h1>Kept heading</h1>"#,
        );
        let sink = RecordingSink::default();
        let exporter = Exporter::new(settings(), LocalFetcher::default(), sink.clone());

        exporter
            .export(&doc, &app(&doc), "notes.md", ExportFormat::Docx)
            .await
            .unwrap();

        let saved = sink.saved.lock().unwrap();
        let xml = document_xml(saved[0].payload());
        assert!(xml.contains("Kept heading"));
        assert!(!xml.contains("alert"));
        assert!(!xml.contains("fallback"));
        assert_eq!(xml.matches("<w:p>").count(), 1);
    }

    #[tokio::test]
    async fn test_stalled_image_still_exports_pdf() {
        let doc = dark_page(r#"<h1>Pictures</h1><img src="slow.png" width="3" height="2">"#);
        let before = ThemeState::capture(&doc);
        let sink = RecordingSink::default();
        let exporter = Exporter::new(settings(), StallingFetcher, sink.clone());

        let saved = exporter
            .export(&doc, &app(&doc), "pictures", ExportFormat::Pdf)
            .await
            .unwrap();

        assert_eq!(saved.format, ExportFormat::Pdf);
        assert!(sink.saved.lock().unwrap()[0].payload().starts_with(b"%PDF"));
        assert_eq!(ThemeState::capture(&doc), before);
    }

    #[tokio::test]
    async fn test_html_snapshot_carries_rules_and_title() {
        let doc = dark_page(r#"<p class="italic">Styled</p>"#);
        let sink = RecordingSink::default();
        let exporter = Exporter::new(settings(), LocalFetcher::default(), sink.clone());

        exporter
            .export(&doc, &app(&doc), "notes", ExportFormat::Html)
            .await
            .unwrap();

        let saved = sink.saved.lock().unwrap();
        let html = String::from_utf8(saved[0].payload().to_vec()).unwrap();
        assert!(html.contains("<title>Notes</title>"));
        assert!(html.contains("p.italic {"));
        assert!(html.contains("Styled"));
    }

    #[test]
    fn test_export_error_display() {
        let error = ExportError::new(
            ExportFormat::Pdf,
            ExportErrorKind::Rendering,
            Error::Rendering("bitmap has zero dimension".to_string()),
        );
        assert_eq!(
            error.to_string(),
            "Failed to export PDF: Rendering failed: bitmap has zero dimension"
        );
    }
}
