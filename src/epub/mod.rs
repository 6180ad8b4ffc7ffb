//! Fixed-layout EPUB 3 generation.
//!
//! An [`EpubProject`] describes the package being built: title, a fresh
//! identifier, a modification timestamp and one [`ProjectPage`] per rendered
//! page. [`templates`] turns it into the XML documents, [`BuildTree`] lays
//! them out on disk, and [`Packager`] zips the result.

mod packager;
pub mod templates;
mod tree;

pub use packager::Packager;
pub use tree::{BuildTree, write_text};

use crate::render::{PageSize, RenderedImage, image_file_name};

/// Media type stored in the `mimetype` entry.
pub const MIMETYPE: &str = "application/epub+zip";

/// Archive paths, relative to the build root.
pub mod layout {
    pub const MIMETYPE: &str = "mimetype";
    pub const META_INF: &str = "META-INF";
    pub const CONTAINER: &str = "META-INF/container.xml";
    pub const OEBPS: &str = "OEBPS";
    pub const PACKAGE: &str = "OEBPS/content.opf";
    pub const NAV: &str = "OEBPS/nav.xhtml";
    pub const IMAGES: &str = "OEBPS/images";
    pub const PAGES: &str = "OEBPS/xhtml";
    pub const CSS: &str = "OEBPS/css";
    pub const STYLESHEET: &str = "OEBPS/css/styles.css";
}

/// One page of the package.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectPage {
    /// 1-based page number.
    pub index: usize,
    /// Native page size, if the engine reported one.
    pub size: Option<PageSize>,
}

impl ProjectPage {
    /// Manifest id of the page document.
    pub fn page_id(&self) -> String {
        format!("page{}", self.index)
    }

    /// Manifest id of the page image.
    pub fn image_id(&self) -> String {
        format!("img{}", self.index)
    }

    /// Page document href, relative to `OEBPS/`.
    pub fn page_href(&self) -> String {
        format!("xhtml/page{}.xhtml", self.index)
    }

    /// Image href, relative to `OEBPS/`.
    pub fn image_href(&self) -> String {
        format!("images/{}", self.image_name())
    }

    /// `page-{n}.png`
    pub fn image_name(&self) -> String {
        image_file_name(self.index)
    }
}

/// The package under construction.
#[derive(Debug, Clone)]
pub struct EpubProject {
    pub title: String,
    /// `urn:uuid:...`, fresh for every conversion.
    pub identifier: String,
    /// `dcterms:modified` value.
    pub modified: String,
    pages: Vec<ProjectPage>,
}

impl EpubProject {
    /// Start a project with a new identifier and the current time.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_identity(
            title,
            format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        )
    }

    /// Start a project with a fixed identifier and timestamp.
    pub fn with_identity(
        title: impl Into<String>,
        identifier: impl Into<String>,
        modified: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            identifier: identifier.into(),
            modified: modified.into(),
            pages: Vec::new(),
        }
    }

    /// Append the next page. Pages are numbered 1..N in insertion order.
    pub fn push_page(&mut self, size: Option<PageSize>) -> &ProjectPage {
        let index = self.pages.len() + 1;
        self.pages.push(ProjectPage { index, size });
        &self.pages[index - 1]
    }

    /// Build a project from rendered images, which must be in page order.
    pub fn from_images(title: impl Into<String>, images: &[RenderedImage]) -> Self {
        let mut project = Self::new(title);
        for image in images {
            debug_assert_eq!(image.index, project.pages.len() + 1);
            project.push_page(image.size);
        }
        project
    }

    pub fn pages(&self) -> &[ProjectPage] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
