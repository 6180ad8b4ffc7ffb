//! # pdfxl
//!
//! Converts PDF documents into fixed-layout EPUB 3 packages, one rasterized
//! image per page.
//!
//! ## Features
//!
//! - Renders every page at a configurable resolution (default 150 DPI)
//! - Keeps the native page size as the viewport of each page document
//! - Writes a valid OCF container with an uncompressed leading `mimetype`
//! - Converts batches sequentially on a worker thread, reporting progress
//!   over a status channel
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfxl::{ConversionJob, JobOptions, PdfiumRasterizer, Reporter, convert};
//!
//! let job = ConversionJob::new("scan.pdf", &JobOptions::default())?;
//! let (reporter, status) = Reporter::channel();
//! let output = convert(&job, &PdfiumRasterizer::new(), &reporter)?;
//!
//! for message in status.drain() {
//!     println!("{message:?}");
//! }
//! println!("wrote {}", output.display());
//! # Ok::<(), pdfxl::Error>(())
//! ```
//!
//! ## Batches
//!
//! [`BatchSequencer`] runs a list of jobs one at a time and turns the status
//! channel into [`BatchEvent`]s:
//!
//! ```no_run
//! use std::sync::Arc;
//! use pdfxl::{BatchEvent, BatchSequencer, ConversionJob, JobOptions, PdfiumRasterizer};
//! use pdfxl::batch::DEFAULT_POLL_INTERVAL;
//!
//! let options = JobOptions::default();
//! let jobs = ["a.pdf", "b.pdf"]
//!     .iter()
//!     .map(|p| ConversionJob::new(p, &options))
//!     .collect::<Result<Vec<_>, _>>()?;
//!
//! let batch = BatchSequencer::new(jobs, Arc::new(PdfiumRasterizer::new()));
//! batch.run(DEFAULT_POLL_INTERVAL, |event| {
//!     if let BatchEvent::Status(text) = event {
//!         println!("{text}");
//!     }
//! });
//! # Ok::<(), pdfxl::Error>(())
//! ```

pub mod batch;
pub mod epub;
mod error;
pub mod job;
pub mod pipeline;
pub mod render;

pub use batch::{BatchEvent, BatchSequencer, BatchSummary, JobOutcome, JobRecord};
pub use error::{BoxError, Error, ErrorKind, Result};
pub use job::{ConversionJob, Dpi, JobOptions, collect_inputs, plan_jobs};
pub use pipeline::{ConversionPipeline, Reporter, Stage, StatusMessage, convert};
pub use render::{PageRenderer, Rasterizer};

#[cfg(feature = "pdfium")]
pub use render::PdfiumRasterizer;
