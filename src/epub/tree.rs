//! Scratch directory mirroring the archive layout.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use super::templates::{self, CONTAINER_XML, STYLESHEET};
use super::{EpubProject, MIMETYPE, layout};
use crate::error::{Error, Result};
use crate::render::RenderedImage;

/// Prefix of every scratch directory created by this crate.
pub const SCRATCH_PREFIX: &str = "pdfxl_";

/// Write `content` to `path` as UTF-8.
pub fn write_text(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| Error::write(path, e))
}

/// A scratch root holding the build tree (`epub_build/`) and the raw page
/// rasters (`images_raw/`).
///
/// Dropping the tree removes the scratch root on a best-effort basis;
/// [`BuildTree::cleanup`] removes it and reports failure.
#[derive(Debug)]
pub struct BuildTree {
    scratch: TempDir,
    build: PathBuf,
    raw_images: PathBuf,
}

impl BuildTree {
    /// Create a uniquely named scratch root inside `parent`.
    pub fn create(parent: &Path) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| Error::write(&parent.join(SCRATCH_PREFIX), e))?;

        let build = scratch.path().join("epub_build");
        let raw_images = scratch.path().join("images_raw");
        let tree = Self {
            scratch,
            build,
            raw_images,
        };

        for dir in [
            tree.build.clone(),
            tree.raw_images.clone(),
            tree.build.join(layout::META_INF),
            tree.build.join(layout::IMAGES),
            tree.build.join(layout::PAGES),
            tree.build.join(layout::CSS),
        ] {
            fs::create_dir_all(&dir).map_err(|e| Error::write(&dir, e))?;
        }
        debug!(root = %tree.root().display(), "created scratch directory");
        Ok(tree)
    }

    /// The scratch root.
    pub fn root(&self) -> &Path {
        self.scratch.path()
    }

    /// Root of the archive layout; what the packager walks.
    pub fn build_root(&self) -> &Path {
        &self.build
    }

    /// Where the renderer writes page rasters.
    pub fn raw_images_dir(&self) -> &Path {
        &self.raw_images
    }

    /// Absolute path of an archive-relative `entry`.
    pub fn path(&self, entry: &str) -> PathBuf {
        self.build.join(entry)
    }

    /// Write the mimetype marker, container, package, navigation and stylesheet.
    pub fn write_structure(&self, project: &EpubProject) -> Result<()> {
        write_text(&self.path(layout::MIMETYPE), MIMETYPE)?;
        write_text(&self.path(layout::CONTAINER), CONTAINER_XML)?;
        write_text(
            &self.path(layout::PACKAGE),
            &templates::package_document(project),
        )?;
        write_text(&self.path(layout::NAV), &templates::nav_document(project))?;
        write_text(&self.path(layout::STYLESHEET), STYLESHEET)?;
        Ok(())
    }

    /// Write one page document per page and copy each raster into `OEBPS/images`.
    pub fn write_pages(&self, project: &EpubProject, images: &[RenderedImage]) -> Result<()> {
        for (page, image) in project.pages().iter().zip(images) {
            let document = self.path(layout::PAGES).join(format!("{}.xhtml", page.page_id()));
            write_text(&document, &templates::page_document(page))?;

            let dest = self.path(layout::IMAGES).join(page.image_name());
            fs::copy(&image.path, &dest).map_err(|e| Error::write(&dest, e))?;
        }
        Ok(())
    }

    /// Delete the scratch root.
    pub fn cleanup(self) -> Result<()> {
        let path = self.scratch.path().to_path_buf();
        self.scratch
            .close()
            .map_err(|source| Error::Cleanup { path, source })
    }
}
