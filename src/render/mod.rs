//! Page rasterization.
//!
//! The [`Rasterizer`] trait is the seam to the rendering engine: it opens a
//! document, hands every page to a [`PageSink`] in order and closes the
//! document again before returning. [`PageRenderer`] drives a rasterizer at a
//! chosen [`Dpi`] and persists each page as `page-{n}.png`.

#[cfg(feature = "pdfium")]
mod pdfium;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use tracing::debug;

use crate::error::{Error, Result};
use crate::job::Dpi;

/// Native page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// Used by page documents when a page reports no size.
    pub const FALLBACK: PageSize = PageSize {
        width: 600.0,
        height: 800.0,
    };

    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Integer viewport size, truncating fractional points.
    pub fn viewport(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }
}

/// One rasterized page as produced by the engine.
#[derive(Debug, Clone)]
pub struct RasterPage {
    /// 1-based page number.
    pub index: usize,
    /// Unscaled size of the page.
    pub size: PageSize,
    /// Opaque RGB pixels at the requested scale.
    pub pixels: RgbImage,
}

/// Receives pages from a [`Rasterizer`].
pub trait PageSink {
    /// Called once, after the document is open and before any page.
    fn begin(&mut self, page_count: usize) -> Result<()>;

    /// Called for each page, in page order.
    fn page(&mut self, page: RasterPage) -> Result<()>;
}

/// A page rasterization engine.
///
/// Implementations report an unreadable document as [`Error::Open`] and a
/// page that cannot be drawn as [`Error::Render`]. Errors returned by the
/// sink must be propagated unchanged.
pub trait Rasterizer: Send + Sync {
    /// Rasterize every page of `path` at `scale` pixels per point.
    fn rasterize(&self, path: &Path, scale: f32, sink: &mut dyn PageSink) -> Result<()>;
}

/// A page image written to the scratch area.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    /// 1-based page number.
    pub index: usize,
    /// Location of the PNG in the scratch area.
    pub path: PathBuf,
    /// Native page size, independent of the DPI.
    pub size: Option<PageSize>,
}

impl RenderedImage {
    /// `page-{n}.png`
    pub fn file_name(&self) -> String {
        image_file_name(self.index)
    }
}

/// File name of the raster for page `index`.
pub fn image_file_name(index: usize) -> String {
    format!("page-{index}.png")
}

/// Progress notifications emitted while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderProgress {
    Opened { pages: usize },
    Page { index: usize, total: usize },
}

/// Whether progress for `index` of `total` is worth reporting.
///
/// First page, every tenth page and the last page.
pub fn should_report(index: usize, total: usize) -> bool {
    index == 1 || index % 10 == 0 || index == total
}

/// Renders a document into `page-{n}.png` files inside a directory.
pub struct PageRenderer<'a> {
    rasterizer: &'a dyn Rasterizer,
    dpi: Dpi,
}

impl<'a> PageRenderer<'a> {
    pub fn new(rasterizer: &'a dyn Rasterizer, dpi: Dpi) -> Self {
        Self { rasterizer, dpi }
    }

    /// Render every page of `input` into `dest`, in page order.
    ///
    /// `on_progress` receives the page count once, then sampled page events.
    pub fn render_all(
        &self,
        input: &Path,
        dest: &Path,
        on_progress: &mut dyn FnMut(RenderProgress),
    ) -> Result<Vec<RenderedImage>> {
        let mut sink = ImageWriter {
            dest,
            total: 0,
            images: Vec::new(),
            on_progress,
        };
        self.rasterizer
            .rasterize(input, self.dpi.scale(), &mut sink)?;
        Ok(sink.images)
    }
}

struct ImageWriter<'a, 'p> {
    dest: &'a Path,
    total: usize,
    images: Vec<RenderedImage>,
    on_progress: &'p mut dyn FnMut(RenderProgress),
}

impl PageSink for ImageWriter<'_, '_> {
    fn begin(&mut self, page_count: usize) -> Result<()> {
        self.total = page_count;
        self.images.reserve(page_count);
        (self.on_progress)(RenderProgress::Opened { pages: page_count });
        Ok(())
    }

    fn page(&mut self, page: RasterPage) -> Result<()> {
        let expected = self.images.len() + 1;
        if page.index != expected {
            return Err(Error::render(
                page.index,
                format!("page delivered out of order, expected page {expected}"),
            ));
        }
        if should_report(page.index, self.total) {
            (self.on_progress)(RenderProgress::Page {
                index: page.index,
                total: self.total,
            });
        }

        let path = self.dest.join(image_file_name(page.index));
        page.pixels
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| Error::write(&path, e))?;
        debug!(
            page = page.index,
            width = page.pixels.width(),
            height = page.pixels.height(),
            "wrote page raster"
        );

        self.images.push(RenderedImage {
            index: page.index,
            path,
            size: Some(page.size),
        });
        Ok(())
    }
}
