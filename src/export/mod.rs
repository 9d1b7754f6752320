//! Document Export Module
//!
//! Turns the rendered Markdown preview into portable files. Every export
//! works on a detached clone of the preview; the live document only has its
//! theme markers touched, and those are restored afterwards.
//!
//! # Supported Export Formats
//!
//! - **PDF**: the clone is laid out, rasterized once and sliced into pages
//! - **DOCX**: the clone's markup is walked into native Word structure
//! - **HTML**: the clone with its computed styles flattened into one stylesheet
//!
//! # Architecture
//!
//! - `orchestrator.rs` - state machine driving one export end to end
//! - `normalize.rs` - light-theme clone of the target subtree
//! - `sanitize.rs` - removal of scripts, controls and diagrams
//! - `flatten.rs` - computed styles written out as literal CSS
//! - `images.rs` - bounded image loading
//! - `raster/` - PDF generation
//! - `structured/` - DOCX generation
//! - `html.rs` - standalone HTML snapshot
//! - `options.rs` - formats and per-format preparation
//! - `sink.rs` - artifacts and where they are saved
//! - `filename.rs` - output file names

pub mod filename;
pub mod flatten;
pub mod html;
pub mod images;
pub mod normalize;
pub mod options;
pub mod orchestrator;
pub mod raster;
pub mod sanitize;
pub mod sink;
pub mod structured;

pub use filename::{export_file_name, sanitize_file_name};
pub use images::{LocalFetcher, ResourceFetcher};
pub use options::ExportFormat;
pub use orchestrator::{ExportError, ExportErrorKind, ExportState, Exporter};
pub use sink::{Artifact, ArtifactSink, DirectorySink, SavedArtifact};
