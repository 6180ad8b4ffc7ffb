//! Test rasterizer reading a tiny text format instead of real PDFs.
//!
//! ```text
//! %FAKEPDF
//! 612 792
//! 300 400
//! fail
//! ```
//!
//! The header line is required; each following line is one page given as
//! `width height` in points, or `fail` for a page that cannot be rendered.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use pdfxl::render::{PageSink, PageSize, RasterPage};
use pdfxl::{Error, Rasterizer, Result};

pub const HEADER: &str = "%FAKEPDF";

pub struct FakeRasterizer;

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, path: &Path, scale: f32, sink: &mut dyn PageSink) -> Result<()> {
        let open_error = |reason: &str| Error::Open {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let text = fs::read_to_string(path).map_err(|e| open_error(&e.to_string()))?;
        let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
        if lines.next() != Some(HEADER) {
            return Err(open_error("missing header"));
        }
        let pages: Vec<&str> = lines.collect();

        sink.begin(pages.len())?;
        for (i, line) in pages.iter().enumerate() {
            let index = i + 1;
            if *line == "fail" {
                return Err(Error::Render {
                    page: index,
                    reason: "corrupt content stream".to_string(),
                });
            }
            let mut dims = line.split_whitespace().map(str::parse::<f32>);
            let (Some(Ok(width)), Some(Ok(height))) = (dims.next(), dims.next()) else {
                return Err(open_error("bad page line"));
            };
            let w = (width * scale).round().max(1.0) as u32;
            let h = (height * scale).round().max(1.0) as u32;
            sink.page(RasterPage {
                index,
                size: PageSize::new(width, height),
                pixels: RgbImage::from_pixel(w, h, Rgb([255, 255, 255])),
            })?;
        }
        Ok(())
    }
}

/// Write a fake document with the given page sizes to `dir/name`.
pub fn write_doc(dir: &Path, name: &str, pages: &[(f32, f32)]) -> PathBuf {
    let mut text = format!("{HEADER}\n");
    for (w, h) in pages {
        text.push_str(&format!("{w} {h}\n"));
    }
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Write a file that fails to open.
pub fn write_corrupt(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"%PDF-1.7 truncated").unwrap();
    path
}

/// Names of every entry under `dir` starting with the scratch prefix.
pub fn scratch_dirs(dir: &Path) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("pdfxl_"))
        .collect()
}
