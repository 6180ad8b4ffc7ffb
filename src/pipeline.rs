//! Conversion of a single document.
//!
//! A [`ConversionPipeline`] walks one [`ConversionJob`] through
//! `Opening → Rendering → Structuring → Packaging → Cleanup → Done`, or from
//! any of the first four through `Cleanup` to `Failed`. Status text and a
//! final sentinel are pushed to a [`Reporter`]; the pipeline never waits on
//! whoever reads them.
//!
//! The scratch directory is released on every exit path: explicitly (with
//! failures reported) on normal return, and by its destructor on unwind.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::epub::{BuildTree, EpubProject, Packager};
use crate::error::{Error, ErrorKind, Result};
use crate::job::ConversionJob;
use crate::render::{PageRenderer, RenderProgress, Rasterizer};

/// A message on the status channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    /// Human-readable progress text.
    Progress(String),
    /// The current file was converted; always the last message of a job.
    JobSucceeded { output: PathBuf },
    /// The current file failed; always the last message of a job.
    JobFailed {
        kind: ErrorKind,
        message: String,
        trace: String,
    },
}

impl StatusMessage {
    /// Whether this message ends a job.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, StatusMessage::Progress(_))
    }
}

/// Sending half of the status channel.
///
/// Sending never fails from the pipeline's point of view: if the consumer is
/// gone there is nobody left to tell.
#[derive(Debug, Clone)]
pub struct Reporter {
    sender: flume::Sender<StatusMessage>,
}

impl Reporter {
    pub fn new(sender: flume::Sender<StatusMessage>) -> Self {
        Self { sender }
    }

    /// A reporter and the receiver for its messages.
    pub fn channel() -> (Self, flume::Receiver<StatusMessage>) {
        let (sender, receiver) = flume::unbounded();
        (Self::new(sender), receiver)
    }

    pub fn progress(&self, text: impl Into<String>) {
        self.send(StatusMessage::Progress(text.into()));
    }

    pub fn send(&self, message: StatusMessage) {
        if self.sender.send(message).is_err() {
            debug!("status receiver dropped");
        }
    }
}

/// Where a conversion currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Opening,
    Rendering,
    Structuring,
    Packaging,
    /// Removing the scratch directory; runs after success and failure alike.
    Cleanup,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Opening => "opening",
            Stage::Rendering => "rendering",
            Stage::Structuring => "structuring",
            Stage::Packaging => "packaging",
            Stage::Cleanup => "cleaning up",
            Stage::Done => "done",
            Stage::Failed => "failed",
        })
    }
}

/// Converts one document into a fixed-layout EPUB.
pub struct ConversionPipeline<'a> {
    job: &'a ConversionJob,
    rasterizer: &'a dyn Rasterizer,
    reporter: &'a Reporter,
    stage: Stage,
    failed_at: Option<Stage>,
}

impl<'a> ConversionPipeline<'a> {
    pub fn new(job: &'a ConversionJob, rasterizer: &'a dyn Rasterizer, reporter: &'a Reporter) -> Self {
        Self {
            job,
            rasterizer,
            reporter,
            stage: Stage::Opening,
            failed_at: None,
        }
    }

    /// Current stage; [`Stage::Done`] or [`Stage::Failed`] once `run` returns.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The stage that was running when the conversion failed.
    pub fn failed_at(&self) -> Option<Stage> {
        self.failed_at
    }

    /// Run the conversion to completion.
    ///
    /// Exactly one sentinel is sent, after the scratch directory is gone.
    pub fn run(&mut self) -> Result<PathBuf> {
        info!(input = %self.job.input().display(), dpi = %self.job.dpi(), "starting conversion");

        let mut tree = None;
        let result = self.build(&mut tree);
        self.finish(result, tree)
    }

    /// Report a failure, release the scratch tree and send the sentinel.
    fn finish(&mut self, result: Result<PathBuf>, tree: Option<BuildTree>) -> Result<PathBuf> {
        if let Err(e) = &result {
            self.failed_at = Some(self.stage);
            self.report_failure(e);
        }
        if let Some(tree) = tree {
            self.enter(Stage::Cleanup);
            self.cleanup(tree);
        }

        match result {
            Ok(output) => {
                self.stage = Stage::Done;
                info!(output = %output.display(), "conversion finished");
                self.reporter.send(StatusMessage::JobSucceeded {
                    output: output.clone(),
                });
                Ok(output)
            }
            Err(e) => {
                self.stage = Stage::Failed;
                self.reporter.send(StatusMessage::JobFailed {
                    kind: e.kind(),
                    message: e.to_string(),
                    trace: self.trace(&e),
                });
                Err(e)
            }
        }
    }

    fn build(&mut self, tree: &mut Option<BuildTree>) -> Result<PathBuf> {
        let job = self.job;
        let name = job.file_name();
        let output = job.output();

        self.enter(Stage::Opening);
        let scratch_parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let tree = tree.insert(BuildTree::create(scratch_parent)?);

        self.enter(Stage::Rendering);
        let reporter = self.reporter;
        let renderer = PageRenderer::new(self.rasterizer, job.dpi());
        let images = renderer.render_all(
            job.input(),
            tree.raw_images_dir(),
            &mut |progress: RenderProgress| match progress {
                RenderProgress::Opened { pages } => {
                    reporter.progress(format!("Processing {name}: {pages} pages..."))
                }
                RenderProgress::Page { index, total } => {
                    reporter.progress(format!("  -> Rendering page {index}/{total}..."))
                }
            },
        )?;
        self.reporter
            .progress(format!("  -> Rendered {} pages.", images.len()));
        if images.is_empty() {
            return Err(Error::EmptyDocument {
                path: job.input().to_path_buf(),
            });
        }

        self.enter(Stage::Structuring);
        self.reporter.progress("  -> Generating EPUB structure...");
        let project = EpubProject::from_images(job.title(), &images);
        tree.write_structure(&project)?;
        self.reporter
            .progress("  -> Creating page files and copying images...");
        tree.write_pages(&project, &images)?;
        debug!(pages = project.page_count(), identifier = %project.identifier, "structure written");

        self.enter(Stage::Packaging);
        self.reporter
            .progress(format!("  -> Creating EPUB archive: {}", output.display()));
        Packager::new()
            .with_compression_level(job.compression_level())
            .package(tree.build_root(), output)?;

        Ok(output.to_path_buf())
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        info!(input = %self.job.file_name(), %stage, "stage");
    }

    fn report_failure(&self, e: &Error) {
        error!(input = %self.job.input().display(), stage = %self.stage, "conversion failed: {e}");
        self.reporter
            .progress(format!("ERROR converting {}:", self.job.file_name()));
        self.reporter.progress(format!("   {}: {}", e.kind(), e));
        self.reporter.progress("--- Error Details ---");
        self.reporter.progress(self.trace(e));
        self.reporter.progress("---------------------");
    }

    fn cleanup(&self, tree: BuildTree) {
        let root = tree.root().to_path_buf();
        match tree.cleanup() {
            Ok(()) => debug!(root = %root.display(), "removed scratch directory"),
            Err(e) => {
                warn!("{e}");
                self.reporter
                    .progress(format!("warning: {}: {}", e.kind(), e));
            }
        }
    }

    fn trace(&self, e: &Error) -> String {
        format!(
            "{kind} while {stage} {input}\n{chain}",
            kind = e.kind(),
            stage = self.failed_at.unwrap_or(self.stage),
            input = self.job.input().display(),
            chain = e.chain()
        )
    }
}

/// Convert a single job, reporting to `reporter`.
pub fn convert(
    job: &ConversionJob,
    rasterizer: &dyn Rasterizer,
    reporter: &Reporter,
) -> Result<PathBuf> {
    ConversionPipeline::new(job, rasterizer, reporter).run()
}
