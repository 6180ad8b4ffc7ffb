//! Archive packaging of a populated build tree.

use std::fs::File;
use std::io::{self, Seek, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use super::layout;
use crate::error::{Error, Result};

/// Zips a populated build tree into an EPUB archive.
///
/// The `mimetype` entry is written first and stored uncompressed; every other
/// file is deflated under its path relative to the build root.
///
/// # Example
///
/// ```no_run
/// use pdfxl::epub::Packager;
/// use std::path::Path;
///
/// Packager::new()
///     .with_compression_level(Some(9))
///     .package(Path::new("/tmp/build"), Path::new("book.epub"))?;
/// # Ok::<(), pdfxl::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Packager {
    compression_level: Option<i64>,
}

impl Packager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deflate level for non-mimetype entries (0-9, default 6).
    pub fn with_compression_level(mut self, level: Option<i64>) -> Self {
        self.compression_level = level;
        self
    }

    /// Write the archive for `build_root` to `output`.
    ///
    /// The archive is assembled in a temporary file next to `output` and only
    /// moved into place once complete.
    pub fn package(&self, build_root: &Path, output: &Path) -> Result<()> {
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut staging = NamedTempFile::new_in(dir).map_err(|e| Error::write(output, e))?;

        self.write_archive(build_root, staging.as_file_mut())?;

        staging
            .persist(output)
            .map_err(|e| Error::write(output, e.error))?;
        debug!(output = %output.display(), "archive written");
        Ok(())
    }

    /// Write the archive for `build_root` to any [`Write`] + [`Seek`] destination.
    pub fn write_archive<W: Write + Seek>(&self, build_root: &Path, writer: W) -> Result<()> {
        let mut zip = ZipWriter::new(writer);

        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(self.compression_level.unwrap_or(6)));

        // 1. mimetype (must be first, uncompressed)
        let mimetype = build_root.join(layout::MIMETYPE);
        zip.start_file(layout::MIMETYPE, stored)
            .map_err(|e| Error::write(&mimetype, e))?;
        copy_into(&mimetype, &mut zip)?;

        // 2. everything else, in a stable order
        for entry in WalkDir::new(build_root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::write(build_root, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = archive_name(build_root, entry.path()) else {
                continue;
            };
            if name == layout::MIMETYPE {
                continue;
            }

            debug!(entry = %name, "adding archive entry");
            zip.start_file(name.as_str(), deflated)
                .map_err(|e| Error::write(entry.path(), e))?;
            copy_into(entry.path(), &mut zip)?;
        }

        zip.finish().map_err(|e| Error::write(build_root, e))?;
        Ok(())
    }
}

fn copy_into<W: Write>(path: &Path, writer: &mut W) -> Result<()> {
    let mut file = File::open(path).map_err(|e| Error::write(path, e))?;
    io::copy(&mut file, writer).map_err(|e| Error::write(path, e))?;
    Ok(())
}

/// Forward-slash path of `path` relative to `root`.
fn archive_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    (!parts.is_empty()).then(|| parts.join("/"))
}
