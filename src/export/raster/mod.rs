//! Raster Export Generator
//!
//! The PDF path: settle images, lay the flattened clone out as an SVG
//! scene, rasterize it with resvg at the oversampling factor, encode the
//! bitmap once as JPEG and cut it into pages.
//!
//! - `layout.rs` - flow layout of the clone into an SVG scene
//! - `paginate.rs` - page slicing of the tall bitmap
//! - `pdf.rs` - PDF assembly around the shared page image

pub mod layout;
pub mod paginate;
pub mod pdf;

pub use layout::{layout_document, Scene};
pub use paginate::{plan_pages, PageSlice};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use kuchiki::NodeRef;
use log::{debug, warn};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use super::images::{settle_images, ResourceFetcher};
use crate::config::{PageSize, Settings};
use crate::error::{Error, Result};
use crate::style::{ComputedStyle, StyleResolver};

/// Smallest oversampling factor the bitmap is rendered at.
pub const MIN_SCALE_FACTOR: f32 = 2.0;

/// Encoded bitmaps shorter than this are treated as a failed render.
pub const MIN_ENCODED_BYTES: usize = 100;

/// Largest bitmap edge a baseline JPEG can describe.
const MAX_JPEG_DIMENSION: u32 = 65_535;

#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// Layout width in CSS pixels
    pub viewport_width: f32,
    /// Oversampling factor, raised to [`MIN_SCALE_FACTOR`] when lower
    pub scale_factor: f32,
    pub jpeg_quality: u8,
    pub page_size: PageSize,
    /// Per-image load bound
    pub image_timeout: Duration,
    /// Written to the PDF Info dictionary
    pub title: Option<String>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl RasterOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            viewport_width: settings.viewport_width,
            scale_factor: settings.scale_factor,
            jpeg_quality: settings.jpeg_quality,
            page_size: settings.page_size,
            image_timeout: Duration::from_millis(settings.image_timeout_ms),
            title: None,
        }
    }

    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    fn effective_scale(&self) -> f32 {
        if self.scale_factor.is_finite() {
            self.scale_factor.max(MIN_SCALE_FACTOR)
        } else {
            MIN_SCALE_FACTOR
        }
    }
}

/// Produce PDF bytes for the prepared clone.
///
/// `context` is the computed style the clone's root inherits from.
pub async fn generate(
    root: &NodeRef,
    context: &ComputedStyle,
    resolver: &StyleResolver,
    fetcher: &dyn ResourceFetcher,
    options: &RasterOptions,
) -> Result<Vec<u8>> {
    let images = settle_images(root, fetcher, options.image_timeout).await;
    debug!(
        "Images settled: {} of {} loaded",
        images.loaded_count(),
        images.len()
    );

    let scene = layout_document(root, context, resolver, &images, options.viewport_width)?;
    debug!("Laid out scene {}x{} px", scene.width, scene.height);

    let options = options.clone();
    tokio::task::spawn_blocking(move || render_pdf(&scene, &options))
        .await
        .map_err(|e| Error::conversion("raster", e.to_string()))?
}

/// Rasterize a scene and wrap it into a PDF.
pub fn render_pdf(scene: &Scene, options: &RasterOptions) -> Result<Vec<u8>> {
    let (jpeg, width, height) = rasterize(scene, options)?;
    pdf::assemble(
        &jpeg,
        width,
        height,
        options.page_size,
        options.title.as_deref(),
    )
}

fn font_database() -> Arc<usvg::fontdb::Database> {
    static FONTS: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    FONTS
        .get_or_init(|| {
            let mut fontdb = usvg::fontdb::Database::new();
            fontdb.load_system_fonts();
            if fontdb.is_empty() {
                warn!("No system fonts found, exported text will be missing");
            }
            Arc::new(fontdb)
        })
        .clone()
}

/// Render the scene to a white-backed bitmap and JPEG-encode it once.
/// Returns the encoded bytes with the bitmap's pixel size.
fn rasterize(scene: &Scene, options: &RasterOptions) -> Result<(Vec<u8>, u32, u32)> {
    let tree = {
        let mut opts = usvg::Options::default();
        opts.fontdb = font_database();
        usvg::Tree::from_str(&scene.svg, &opts)
            .map_err(|e| Error::conversion("svg", format!("scene parsing failed: {}", e)))?
    };

    let scale = options.effective_scale();
    let size = tree.size();
    let width = (size.width() * scale).ceil() as u32;
    let height = (size.height() * scale).ceil() as u32;
    if width == 0 || height == 0 {
        return Err(Error::Rendering(format!(
            "bitmap has zero dimension ({}x{})",
            width, height
        )));
    }
    if width > MAX_JPEG_DIMENSION || height > MAX_JPEG_DIMENSION {
        return Err(Error::Rendering(format!(
            "bitmap {}x{} exceeds the JPEG limit of {} px; lower the scale factor",
            width, height, MAX_JPEG_DIMENSION
        )));
    }

    let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
        Error::Rendering(format!("failed to allocate bitmap ({}x{})", width, height))
    })?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(
        &tree,
        tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    let rgb: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue()]
        })
        .collect();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, options.jpeg_quality.clamp(1, 100)).encode(
        &rgb,
        width,
        height,
        ExtendedColorType::Rgb8,
    )?;
    if jpeg.len() < MIN_ENCODED_BYTES {
        return Err(Error::Rendering(format!(
            "encoded page image is only {} bytes",
            jpeg.len()
        )));
    }
    debug!(
        "Rasterized {}x{} px at {}x, {} byte JPEG",
        width,
        height,
        scale,
        jpeg.len()
    );
    Ok((jpeg, width, height))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
