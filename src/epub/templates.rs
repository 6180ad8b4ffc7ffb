//! XML and CSS documents of a fixed-layout package.
//!
//! Every function here is pure: the same project always yields the same
//! text. Identifier and timestamp live on the [`EpubProject`].

use std::borrow::Cow;

use super::{EpubProject, ProjectPage};
use crate::render::PageSize;

/// `META-INF/container.xml`
pub const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

/// `OEBPS/css/styles.css`
///
/// The SVG wrapper fills the viewport; the image fills the wrapper and keeps
/// its aspect ratio.
pub const STYLESHEET: &str = r#"body { margin: 0; padding: 0; }
.page-svg-container {
    width: 100vw;
    height: 100vh;
    display: flex;
    justify-content: center;
    align-items: center;
    overflow: hidden;
}
svg { display: block; width: 100%; height: 100%; }
image { width: 100%; height: 100%; object-fit: contain; }
"#;

/// Properties attached to every spine item.
const SPINE_PROPERTIES: &str = "page-spread-left rendition:layout-pre-paginated rendition:orientation-auto rendition:spread-auto";

/// Escape XML special characters.
pub fn escape_xml(s: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(s)
}

/// Generate `OEBPS/content.opf`: metadata, manifest and spine.
pub fn package_document(project: &EpubProject) -> String {
    let mut opf = String::new();

    opf.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="BookId" version="3.0" prefix="rendition: http://www.idpf.org/vocab/rendition/#">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
"#,
    );
    opf.push_str(&format!(
        "    <dc:identifier id=\"BookId\">{}</dc:identifier>\n",
        escape_xml(&project.identifier)
    ));
    opf.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        escape_xml(&project.title)
    ));
    opf.push_str("    <dc:language>en</dc:language>\n");
    opf.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        escape_xml(&project.modified)
    ));
    if let Some(first) = project.pages().first() {
        opf.push_str(&format!(
            "    <meta name=\"cover\" content=\"{}\"/>\n",
            first.image_id()
        ));
    }
    opf.push_str("    <meta property=\"rendition:layout\">pre-paginated</meta>\n");
    opf.push_str("    <meta property=\"rendition:orientation\">auto</meta>\n");
    opf.push_str("    <meta property=\"rendition:spread\">auto</meta>\n");
    opf.push_str("  </metadata>\n");

    // Manifest
    opf.push_str("  <manifest>\n");
    opf.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\"/>\n",
    );
    opf.push_str("    <item id=\"css\" href=\"css/styles.css\" media-type=\"text/css\"/>\n");
    for page in project.pages() {
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            page.page_id(),
            page.page_href()
        ));
        let cover = if page.index == 1 {
            " properties=\"cover-image\""
        } else {
            ""
        };
        opf.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"image/png\"{}/>\n",
            page.image_id(),
            page.image_href(),
            cover
        ));
    }
    opf.push_str("  </manifest>\n");

    // Spine
    opf.push_str("  <spine toc=\"nav\">\n");
    for page in project.pages() {
        opf.push_str(&format!(
            "    <itemref idref=\"{}\" properties=\"{}\"/>\n",
            page.page_id(),
            SPINE_PROPERTIES
        ));
    }
    opf.push_str("  </spine>\n");

    opf.push_str("</package>\n");
    opf
}

/// Generate `OEBPS/nav.xhtml` with a table of contents and a hidden page list.
pub fn nav_document(project: &EpubProject) -> String {
    let mut toc = String::new();
    let mut page_list = String::new();
    for page in project.pages() {
        toc.push_str(&format!(
            "      <li><a href=\"{}\">Page {}</a></li>\n",
            page.page_href(),
            page.index
        ));
        page_list.push_str(&format!(
            "      <li><a href=\"{}\">{}</a></li>\n",
            page.page_href(),
            page.index
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
  <head>
    <title>{title} - Contents</title>
    <link rel="stylesheet" type="text/css" href="css/styles.css"/>
  </head>
  <body>
    <nav epub:type="toc" id="toc">
      <h1>Table of Contents</h1>
      <ol>
{toc}      </ol>
    </nav>
    <nav epub:type="page-list" id="page-list" hidden="">
      <h1>Page List</h1>
      <ol>
{page_list}      </ol>
    </nav>
  </body>
</html>
"#,
        title = escape_xml(&project.title),
    )
}

/// Generate `OEBPS/xhtml/page{n}.xhtml`, wrapping the page image in an SVG
/// sized to the native page dimensions.
pub fn page_document(page: &ProjectPage) -> String {
    let (width, height) = page.size.unwrap_or(PageSize::FALLBACK).viewport();
    let index = page.index;
    let image = page.image_name();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="en" lang="en">
  <head>
    <title>Page {index}</title>
    <meta charset="UTF-8"/>
    <meta name="viewport" content="width={width}, height={height}"/>
    <link rel="stylesheet" type="text/css" href="../css/styles.css"/>
  </head>
  <body>
    <div class="page-svg-container">
      <svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" version="1.1" width="{width}" height="{height}" viewBox="0 0 {width} {height}" preserveAspectRatio="xMidYMid meet">
        <image width="{width}" height="{height}" xlink:href="../images/{image}"/>
      </svg>
    </div>
  </body>
</html>
"#
    )
}
