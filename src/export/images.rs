//! Image Settling
//!
//! Before the raster path lays out the clone, every `<img>` must either be
//! loaded or given up on. Each image gets its own bounded wait: a race
//! between the fetch and a timer. A wait never fails the export; images
//! that time out or fail to load are simply left out of the bitmap.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use futures::future::join_all;
use kuchiki::NodeRef;
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dom;
use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Fetching
// ─────────────────────────────────────────────────────────────────────────────

/// Source of image bytes for `<img src>` values.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, src: &str) -> Result<Vec<u8>>;
}

/// Resolves data URIs and local files; never touches the network.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    base_dir: PathBuf,
}

impl LocalFetcher {
    /// Relative paths resolve against `base_dir`, normally the directory of
    /// the Markdown source.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, src: &str) -> PathBuf {
        let path = src.strip_prefix("file://").unwrap_or(src);
        let path = percent_decode(path.split(['?', '#']).next().unwrap_or(path));
        let path = PathBuf::from(String::from_utf8_lossy(&path).into_owned());
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }
}

impl Default for LocalFetcher {
    fn default() -> Self {
        Self::new(".")
    }
}

#[async_trait]
impl ResourceFetcher for LocalFetcher {
    async fn fetch(&self, src: &str) -> Result<Vec<u8>> {
        if let Some(rest) = src.strip_prefix("data:") {
            return decode_data_uri(rest);
        }
        let lower = src.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
        {
            return Err(Error::conversion(
                "image",
                format!("remote image not fetched: {}", src),
            ));
        }
        let path = self.resolve(src);
        Ok(tokio::fs::read(&path).await?)
    }
}

/// Payload of a `data:` URI (the part after `data:`).
fn decode_data_uri(rest: &str) -> Result<Vec<u8>> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::conversion("image", "data URI without payload"))?;
    if meta.ends_with(";base64") {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        BASE64
            .decode(compact)
            .map_err(|e| Error::conversion("image", format!("invalid base64 data URI: {}", e)))
    } else {
        Ok(percent_decode(payload))
    }
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(value) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Settling
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded-enough image: bytes plus intrinsic size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl LoadedImage {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)?;
        let decoded = image::load_from_memory_with_format(&bytes, format)?;
        Ok(Self {
            mime: format.to_mime_type(),
            width: decoded.width(),
            height: decoded.height(),
            bytes,
        })
    }

    /// `data:` URI embedding the original bytes.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, BASE64.encode(&self.bytes))
    }
}

/// Outcome of waiting for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageStatus {
    Loaded(LoadedImage),
    Failed(String),
    TimedOut,
}

/// Settled images keyed by their `src` attribute.
#[derive(Debug, Clone, Default)]
pub struct ResolvedImages {
    images: HashMap<String, ImageStatus>,
}

impl ResolvedImages {
    pub fn get(&self, src: &str) -> Option<&LoadedImage> {
        match self.images.get(src) {
            Some(ImageStatus::Loaded(image)) => Some(image),
            _ => None,
        }
    }

    pub fn status(&self, src: &str) -> Option<&ImageStatus> {
        self.images.get(src)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn loaded_count(&self) -> usize {
        self.images
            .values()
            .filter(|s| matches!(s, ImageStatus::Loaded(_)))
            .count()
    }
}

/// Distinct `src` values of every `<img>` under `root`, in document order.
pub fn image_sources(root: &NodeRef) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for node in root.inclusive_descendants() {
        if !dom::is_tag(&node, &["img"]) {
            continue;
        }
        if let Some(src) = dom::get_attr(&node, "src") {
            let src = src.trim().to_string();
            if !src.is_empty() && !sources.contains(&src) {
                sources.push(src);
            }
        }
    }
    sources
}

/// Wait for every image under `root`, each bounded by `timeout`.
///
/// All waits run concurrently; the call returns once each has loaded,
/// failed or timed out.
pub async fn settle_images<F: ResourceFetcher + ?Sized>(
    root: &NodeRef,
    fetcher: &F,
    timeout: Duration,
) -> ResolvedImages {
    let sources = image_sources(root);
    if sources.is_empty() {
        return ResolvedImages::default();
    }

    let waits = sources.into_iter().map(|src| async move {
        let status = match tokio::time::timeout(timeout, fetcher.fetch(&src)).await {
            Ok(Ok(bytes)) => match LoadedImage::from_bytes(bytes) {
                Ok(image) => ImageStatus::Loaded(image),
                Err(e) => ImageStatus::Failed(e.to_string()),
            },
            Ok(Err(e)) => ImageStatus::Failed(e.to_string()),
            Err(_) => ImageStatus::TimedOut,
        };
        match &status {
            ImageStatus::Loaded(image) => {
                debug!("Image loaded: {} ({}x{})", src, image.width, image.height)
            }
            ImageStatus::Failed(reason) => warn!("Image skipped: {}: {}", src, reason),
            ImageStatus::TimedOut => warn!("Image timed out after {:?}: {}", timeout, src),
        }
        (src, status)
    });

    let images = join_all(waits).await.into_iter().collect();
    ResolvedImages { images }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    /// A 3x2 PNG.
    pub(crate) fn png_bytes() -> Vec<u8> {
        let pixels = image::RgbImage::from_pixel(3, 2, image::Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        pixels
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// Never answers.
    pub(crate) struct StallingFetcher;

    #[async_trait]
    impl ResourceFetcher for StallingFetcher {
        async fn fetch(&self, _src: &str) -> Result<Vec<u8>> {
            futures::future::pending::<()>().await;
            Ok(Vec::new())
        }
    }

    fn root(html: &str) -> NodeRef {
        dom::parse_fragment(&format!("<article>{}</article>", html))
            .into_iter()
            .next()
            .unwrap()
    }

    #[test]
    fn test_image_sources_dedupes() {
        let article = root(r#"<img src="a.png"><p><img src=" a.png "><img src="b.png"><img></p>"#);
        assert_eq!(image_sources(&article), vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_percent_decode() {
        assert_eq!(percent_decode("my%20file.png"), b"my file.png");
        assert_eq!(percent_decode("100%"), b"100%");
        assert_eq!(percent_decode("%zz"), b"%zz");
    }

    #[tokio::test]
    async fn test_data_uri_image_loads() {
        let uri = format!("data:image/png;base64,{}", BASE64.encode(png_bytes()));
        let article = root(&format!(r#"<img src="{}">"#, uri));

        let images = settle_images(&article, &LocalFetcher::default(), Duration::from_secs(5)).await;
        let image = images.get(&uri).unwrap();
        assert_eq!((image.width, image.height), (3, 2));
        assert_eq!(image.mime, "image/png");
    }

    #[tokio::test]
    async fn test_local_file_resolves_against_base_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("pic one.png"), png_bytes()).unwrap();
        let article = root(r#"<img src="pic%20one.png"><img src="missing.png">"#);

        let fetcher = LocalFetcher::new(dir.path());
        let images = settle_images(&article, &fetcher, Duration::from_secs(5)).await;
        assert_eq!(images.len(), 2);
        assert_eq!(images.loaded_count(), 1);
        assert!(matches!(
            images.status("missing.png"),
            Some(ImageStatus::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_images_are_not_fetched() {
        let article = root(r#"<img src="https://example.com/a.png">"#);
        let images = settle_images(&article, &LocalFetcher::default(), Duration::from_secs(5)).await;
        assert!(matches!(
            images.status("https://example.com/a.png"),
            Some(ImageStatus::Failed(_))
        ));
    }

    #[tokio::test]
    async fn test_stalled_image_times_out() {
        let article = root(r#"<img src="slow.png">"#);
        let images = settle_images(&article, &StallingFetcher, Duration::from_millis(20)).await;
        assert_eq!(images.status("slow.png"), Some(&ImageStatus::TimedOut));
        assert!(images.get("slow.png").is_none());
    }
}
