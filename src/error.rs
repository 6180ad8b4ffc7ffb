//! Error types for pdfxl operations.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Boxed source for failures coming from heterogeneous writers (files, images, zip).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while converting a document.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("{} produced no pages", path.display())]
    EmptyDocument { path: PathBuf },

    #[error("cannot render page {page}: {reason}")]
    Render { page: usize, reason: String },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("cannot remove scratch directory {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub(crate) fn open(path: &Path, reason: impl fmt::Display) -> Self {
        Error::Open {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn render(page: usize, reason: impl fmt::Display) -> Self {
        Error::Render {
            page,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, source: impl Into<BoxError>) -> Self {
        Error::Write {
            path: path.to_path_buf(),
            source: source.into(),
        }
    }

    /// Taxonomy bucket this error reports under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Open { .. } => ErrorKind::OpenFailure,
            Error::EmptyDocument { .. } => ErrorKind::EmptyDocument,
            Error::Render { .. } => ErrorKind::RenderFailure,
            Error::Write { .. } => ErrorKind::WriteFailure,
            Error::Cleanup { .. } => ErrorKind::CleanupFailure,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// The error followed by every underlying cause, one per line.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            out.push_str("\ncaused by: ");
            out.push_str(&cause.to_string());
            source = cause.source();
        }
        out
    }
}

/// Coarse classification of a failure, as shown on the status channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    OpenFailure,
    EmptyDocument,
    RenderFailure,
    WriteFailure,
    CleanupFailure,
    InvalidInput,
    /// The conversion worker panicked or could not be started.
    WorkerFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::OpenFailure => "OpenFailure",
            ErrorKind::EmptyDocument => "EmptyDocument",
            ErrorKind::RenderFailure => "RenderFailure",
            ErrorKind::WriteFailure => "WriteFailure",
            ErrorKind::CleanupFailure => "CleanupFailure",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::WorkerFailure => "WorkerFailure",
        }
    }

    /// Whether this kind aborts the document it occurred in.
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::CleanupFailure)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
