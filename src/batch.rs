//! Sequential batch conversion.
//!
//! A [`BatchSequencer`] owns the job list, the cursor and the status channel.
//! It runs at most one [`ConversionPipeline`](crate::pipeline::ConversionPipeline)
//! at a time on a worker thread and learns about completion only through the
//! channel. The cursor moves exclusively on the consumer side, when a
//! sentinel is drained.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pdfxl::{BatchSequencer, ConversionJob, JobOptions, PdfiumRasterizer};
//!
//! let options = JobOptions::default();
//! let jobs = vec![ConversionJob::new("a.pdf", &options)?, ConversionJob::new("b.pdf", &options)?];
//! let batch = BatchSequencer::new(jobs, Arc::new(PdfiumRasterizer::new()));
//! let summary = batch.run(Duration::from_millis(100), |event| println!("{event:?}"));
//! println!("{} converted, {} failed", summary.succeeded(), summary.failed());
//! # Ok::<(), pdfxl::Error>(())
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::job::ConversionJob;
use crate::pipeline::{Reporter, StatusMessage, convert};
use crate::render::Rasterizer;

/// Default interval between two drains of the status channel.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Result of [`BatchSequencer::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A pipeline was started for the job at the new cursor.
    Started,
    /// A pipeline is still running; nothing was started.
    InFlight,
    /// No job left.
    BatchComplete,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded {
        output: PathBuf,
    },
    Failed {
        kind: ErrorKind,
        message: String,
        trace: String,
    },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// Something the consumer should show.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// Status text from the running job or the sequencer.
    Status(String),
    /// The job at `index` (0-based) ended.
    JobFinished {
        index: usize,
        outcome: JobOutcome,
        /// Batch progress in percent after this job.
        percent: f64,
    },
    /// Every job has ended.
    BatchComplete,
}

/// Outcome of one job, kept for the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub input: PathBuf,
    pub outcome: JobOutcome,
}

/// Outcome of every job, in job order.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub records: Vec<JobRecord>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }
}

/// Jobs, cursor and status channel of a batch.
#[derive(Debug)]
pub struct BatchState {
    jobs: Vec<ConversionJob>,
    /// `None` until the first job starts; `Some(jobs.len())` once complete.
    cursor: Option<usize>,
    reporter: Reporter,
    receiver: flume::Receiver<StatusMessage>,
}

impl BatchState {
    pub fn new(jobs: Vec<ConversionJob>) -> Self {
        let (reporter, receiver) = Reporter::channel();
        Self {
            jobs,
            cursor: None,
            reporter,
            receiver,
        }
    }

    pub fn jobs(&self) -> &[ConversionJob] {
        &self.jobs
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.is_some_and(|c| c >= self.jobs.len())
    }

    /// `(cursor + 1) / total * 100`, clamped to 100.
    pub fn percent(&self) -> f64 {
        let total = self.jobs.len();
        match self.cursor {
            _ if total == 0 => 100.0,
            None => 0.0,
            Some(c) => ((c + 1).min(total) as f64 / total as f64) * 100.0,
        }
    }
}

/// Runs conversion jobs one after another.
pub struct BatchSequencer {
    state: BatchState,
    rasterizer: Arc<dyn Rasterizer>,
    worker: Option<JoinHandle<()>>,
    records: Vec<JobRecord>,
}

impl BatchSequencer {
    pub fn new(jobs: Vec<ConversionJob>, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            state: BatchState::new(jobs),
            rasterizer,
            worker: None,
            records: Vec::new(),
        }
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    /// Move the cursor to the next job and start it.
    pub fn advance(&mut self) -> Advance {
        if self.worker.is_some() {
            return Advance::InFlight;
        }
        let total = self.state.jobs.len();
        let next = match self.state.cursor {
            Some(c) if c >= total => return Advance::BatchComplete,
            Some(c) => c + 1,
            None => 0,
        };
        self.state.cursor = Some(next);
        if next >= total {
            info!(jobs = total, "batch complete");
            return Advance::BatchComplete;
        }

        let job = self.state.jobs[next].clone();
        let reporter = self.state.reporter.clone();
        reporter.progress(format!(
            "[{}/{}] Starting: {}...",
            next + 1,
            total,
            job.file_name()
        ));

        let rasterizer = Arc::clone(&self.rasterizer);
        let worker_reporter = reporter.clone();
        let spawned = thread::Builder::new()
            .name(format!("pdfxl-job-{}", next + 1))
            .spawn(move || run_job(&job, rasterizer.as_ref(), &worker_reporter));

        match spawned {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                warn!("cannot start conversion worker: {e}");
                let message = format!("cannot start conversion worker: {e}");
                report_worker_failure(&reporter, &self.state.jobs[next], message);
            }
        }
        Advance::Started
    }

    /// Drain every queued status message without blocking.
    ///
    /// A sentinel finishes the current job and starts the next one.
    pub fn poll(&mut self) -> Vec<BatchEvent> {
        let mut events = Vec::new();
        while let Ok(message) = self.state.receiver.try_recv() {
            match message {
                StatusMessage::Progress(text) => events.push(BatchEvent::Status(text)),
                StatusMessage::JobSucceeded { output } => {
                    self.finish(JobOutcome::Succeeded { output }, &mut events)
                }
                StatusMessage::JobFailed {
                    kind,
                    message,
                    trace,
                } => self.finish(
                    JobOutcome::Failed {
                        kind,
                        message,
                        trace,
                    },
                    &mut events,
                ),
            }
        }
        events
    }

    fn finish(&mut self, outcome: JobOutcome, events: &mut Vec<BatchEvent>) {
        if let Some(handle) = self.worker.take()
            && handle.join().is_err()
        {
            warn!("conversion worker exited abnormally");
        }

        let index = self.state.cursor.unwrap_or(0);
        let percent = self.state.percent();
        if let Some(job) = self.state.jobs.get(index) {
            self.records.push(JobRecord {
                input: job.input().to_path_buf(),
                outcome: outcome.clone(),
            });
        }
        events.push(BatchEvent::JobFinished {
            index,
            outcome,
            percent,
        });

        if self.advance() == Advance::BatchComplete {
            events.push(BatchEvent::BatchComplete);
        }
    }

    /// Start the batch and poll until every job has ended.
    pub fn run(mut self, interval: Duration, mut on_event: impl FnMut(&BatchEvent)) -> BatchSummary {
        info!(jobs = self.state.jobs.len(), "starting batch");
        if self.advance() == Advance::BatchComplete {
            on_event(&BatchEvent::BatchComplete);
            return self.into_summary();
        }

        loop {
            let mut complete = false;
            for event in self.poll() {
                complete |= event == BatchEvent::BatchComplete;
                on_event(&event);
            }
            if complete {
                break;
            }
            thread::sleep(interval);
        }
        self.into_summary()
    }

    pub fn into_summary(self) -> BatchSummary {
        BatchSummary {
            records: self.records,
        }
    }
}

fn run_job(job: &ConversionJob, rasterizer: &dyn Rasterizer, reporter: &Reporter) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| convert(job, rasterizer, reporter)));
    if let Err(payload) = result {
        let message = format!("conversion worker panicked: {}", panic_message(payload.as_ref()));
        report_worker_failure(reporter, job, message);
    }
}

fn report_worker_failure(reporter: &Reporter, job: &ConversionJob, message: String) {
    let kind = ErrorKind::WorkerFailure;
    let trace = format!("{kind} while converting {}\n{message}", display(job.input()));
    reporter.progress(format!("ERROR converting {}:", job.file_name()));
    reporter.progress(format!("   {kind}: {message}"));
    reporter.progress(trace.clone());
    reporter.send(StatusMessage::JobFailed {
        kind,
        message,
        trace,
    });
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
