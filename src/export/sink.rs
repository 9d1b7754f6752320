//! Artifacts and Saving
//!
//! An [`Artifact`] is a finished export held in memory; an [`ArtifactSink`]
//! is where it goes. [`DirectorySink`] writes `<dir>/<name>.<ext>`.

use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};

use super::filename::sanitize_file_name;
use super::options::ExportFormat;
use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Artifact
// ─────────────────────────────────────────────────────────────────────────────

/// A generated export ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    base_file_name: String,
    format: ExportFormat,
    payload: Vec<u8>,
}

impl Artifact {
    /// Wrap generator output. The name is sanitized; an empty payload is a
    /// rendering failure, never an artifact.
    pub fn new(base_name: &str, format: ExportFormat, payload: Vec<u8>) -> Result<Self> {
        if payload.is_empty() {
            return Err(Error::Rendering(format!(
                "{} generator produced no bytes",
                format.label()
            )));
        }
        Ok(Self {
            base_file_name: sanitize_file_name(base_name),
            format,
            payload,
        })
    }

    pub fn base_file_name(&self) -> &str {
        &self.base_file_name
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// `<base_file_name>.<extension>`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.base_file_name, self.format.extension())
    }
}

/// Where and how much was saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub bytes: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Local-save primitive the orchestrator hands finished artifacts to.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn save(&self, artifact: &Artifact) -> Result<SavedArtifact>;
}

/// Writes artifacts into one directory, creating it when missing.
/// Existing files of the same name are replaced.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn save(&self, artifact: &Artifact) -> Result<SavedArtifact> {
        if !self.dir.as_os_str().is_empty() && !tokio::fs::try_exists(&self.dir).await? {
            debug!("Creating output directory: {}", self.dir.display());
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|source| Error::FileWrite {
                    path: self.dir.clone(),
                    source,
                })?;
        }

        let path = self.dir.join(artifact.file_name());
        tokio::fs::write(&path, artifact.payload())
            .await
            .map_err(|source| Error::FileWrite {
                path: path.clone(),
                source,
            })?;

        info!(
            "Saved {} ({} bytes) to {}",
            artifact.format().label(),
            artifact.payload().len(),
            path.display()
        );
        Ok(SavedArtifact {
            path,
            format: artifact.format(),
            bytes: artifact.payload().len(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_rejects_empty_payload() {
        let result = Artifact::new("notes.md", ExportFormat::Pdf, Vec::new());
        assert!(matches!(result, Err(Error::Rendering(_))));
    }

    #[test]
    fn test_artifact_name_is_sanitized() {
        let artifact = Artifact::new("My Report!! v2.md", ExportFormat::Docx, vec![1]).unwrap();
        assert_eq!(artifact.base_file_name(), "My_Report_v2");
        assert_eq!(artifact.file_name(), "My_Report_v2.docx");
    }

    #[tokio::test]
    async fn test_directory_sink_writes_file() {
        let temp = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path().join("out"));
        let artifact = Artifact::new("notes.md", ExportFormat::Pdf, b"%PDF-1.7".to_vec()).unwrap();

        let saved = sink.save(&artifact).await.unwrap();
        assert_eq!(saved.path, temp.path().join("out").join("notes.pdf"));
        assert_eq!(saved.bytes, 8);
        assert_eq!(std::fs::read(&saved.path).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_directory_sink_overwrites() {
        let temp = TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path());
        let first = Artifact::new("a", ExportFormat::Html, b"one".to_vec()).unwrap();
        let second = Artifact::new("a", ExportFormat::Html, b"two".to_vec()).unwrap();

        sink.save(&first).await.unwrap();
        let saved = sink.save(&second).await.unwrap();
        assert_eq!(std::fs::read(saved.path).unwrap(), b"two");
    }
}
