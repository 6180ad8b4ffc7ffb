//! Rasterizer backed by Google's pdfium through `pdfium-render`.

use std::path::{Path, PathBuf};

use ::image::{DynamicImage, RgbaImage};
use pdfium_render::prelude::*;
use tracing::debug;

use super::{PageSink, PageSize, RasterPage, Rasterizer};
use crate::error::{Error, Result};

/// Renders PDF pages with pdfium.
///
/// The library is bound on every call and released when the call returns,
/// so the rasterizer itself holds no engine state and can be shared across
/// threads.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    /// Use the pdfium shared library installed on the system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look for the pdfium shared library in `dir` first.
    pub fn with_library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    fn bind(&self, document: &Path) -> Result<Pdfium> {
        let bindings = match &self.library_dir {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| Error::open(document, format!("pdfium library unavailable: {e}")))?;
        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, path: &Path, scale: f32, sink: &mut dyn PageSink) -> Result<()> {
        let pdfium = self.bind(path)?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| Error::open(path, e))?;

        let pages = document.pages();
        let page_count = pages.len() as usize;
        debug!(path = %path.display(), page_count, scale, "opened document");
        sink.begin(page_count)?;

        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        for (i, page) in pages.iter().enumerate() {
            let index = i + 1;
            let size = PageSize::new(page.width().value, page.height().value);

            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| Error::render(index, e))?;
            let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
            let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes())
                .ok_or_else(|| Error::render(index, "bitmap size does not match its buffer"))?;

            sink.page(RasterPage {
                index,
                size,
                pixels: DynamicImage::ImageRgba8(rgba).into_rgb8(),
            })?;
        }

        Ok(())
    }
}
