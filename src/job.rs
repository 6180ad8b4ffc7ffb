//! Conversion jobs and their options.
//!
//! A [`ConversionJob`] is fully resolved before a batch starts: absolute input
//! path, final output path and rendering resolution. Nothing about a job
//! changes once the batch is running.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Rendering resolution in dots per inch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dpi(u32);

impl Dpi {
    /// Resolution used when none (or an unusable one) is given.
    pub const DEFAULT: Dpi = Dpi(150);

    /// PDF user space unit: 1/72 inch.
    pub const POINTS_PER_INCH: f32 = 72.0;

    /// Returns `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Dpi(value))
    }

    /// Parse a user-supplied value, falling back to [`Dpi::DEFAULT`].
    ///
    /// The second element explains why the fallback was taken, if it was.
    pub fn parse_lenient(value: &str) -> (Dpi, Option<String>) {
        let trimmed = value.trim();
        match trimmed.parse::<i64>() {
            Ok(v) if v > 0 && v <= u32::MAX as i64 => (Dpi(v as u32), None),
            Ok(_) => (
                Dpi::DEFAULT,
                Some(format!(
                    "DPI must be positive, got '{trimmed}'; using default {}",
                    Dpi::DEFAULT
                )),
            ),
            Err(_) => (
                Dpi::DEFAULT,
                Some(format!(
                    "invalid DPI '{trimmed}'; using default {}",
                    Dpi::DEFAULT
                )),
            ),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Linear scale factor from page points to pixels.
    pub fn scale(self) -> f32 {
        self.0 as f32 / Self::POINTS_PER_INCH
    }
}

impl Default for Dpi {
    fn default() -> Self {
        Dpi::DEFAULT
    }
}

impl fmt::Display for Dpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Settings shared by every job of a batch.
#[derive(Debug, Clone, Default)]
pub struct JobOptions {
    pub dpi: Dpi,
    /// Directory receiving the archives; next to each input when `None`.
    pub output_dir: Option<PathBuf>,
    /// Deflate level for every entry except `mimetype` (0-9, default 6).
    pub compression_level: Option<i64>,
}

impl JobOptions {
    /// Check settings that must hold before any job starts.
    pub fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.output_dir
            && !dir.is_dir()
        {
            return Err(Error::InvalidInput(format!(
                "output directory does not exist: {}",
                dir.display()
            )));
        }
        if let Some(level) = self.compression_level
            && !(0..=9).contains(&level)
        {
            return Err(Error::InvalidInput(format!(
                "compression level must be between 0 and 9, got {level}"
            )));
        }
        Ok(())
    }
}

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    input: PathBuf,
    output: PathBuf,
    dpi: Dpi,
    compression_level: Option<i64>,
}

impl ConversionJob {
    /// Resolve the absolute input path and the archive path for `input`.
    pub fn new(input: impl AsRef<Path>, options: &JobOptions) -> Result<Self> {
        let input = std::path::absolute(input.as_ref()).map_err(|e| {
            Error::InvalidInput(format!("cannot resolve {}: {e}", input.as_ref().display()))
        })?;
        let output = output_path(&input, options.output_dir.as_deref())?;
        Ok(Self {
            input,
            output,
            dpi: options.dpi,
            compression_level: options.compression_level,
        })
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn dpi(&self) -> Dpi {
        self.dpi
    }

    pub fn compression_level(&self) -> Option<i64> {
        self.compression_level
    }

    /// File name of the input, for status text.
    pub fn file_name(&self) -> String {
        self.input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.display().to_string())
    }

    /// Book title derived from the input file name.
    pub fn title(&self) -> String {
        derive_title(&self.input)
    }
}

/// File stem with underscores turned into spaces.
pub fn derive_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
}

fn output_path(input: &Path, output_dir: Option<&Path>) -> Result<PathBuf> {
    let stem = input.file_stem().ok_or_else(|| {
        Error::InvalidInput(format!("{} has no file name", input.display()))
    })?;
    let mut name = stem.to_os_string();
    name.push(".epub");

    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    Ok(dir.join(name))
}

/// Why an input path was left out of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    NotPdf,
    Duplicate,
    /// An earlier input already writes to the same archive.
    OutputCollision,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NotFound => "not found",
            SkipReason::NotPdf => "not a PDF",
            SkipReason::Duplicate => "duplicate",
            SkipReason::OutputCollision => "output collides with an earlier input",
        })
    }
}

/// Result of filtering user-supplied input paths.
#[derive(Debug, Default)]
pub struct CollectedInputs {
    pub accepted: Vec<PathBuf>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

/// Keep existing `.pdf` files in first-seen order, dropping duplicates.
pub fn collect_inputs<I, P>(paths: I) -> CollectedInputs
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut collected = CollectedInputs::default();
    let mut seen = HashSet::new();

    for path in paths {
        let path = path.as_ref();
        let abs = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        if !abs.is_file() {
            collected.skipped.push((abs, SkipReason::NotFound));
            continue;
        }
        let is_pdf = abs
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            collected.skipped.push((abs, SkipReason::NotPdf));
            continue;
        }
        if !seen.insert(abs.clone()) {
            collected.skipped.push((abs, SkipReason::Duplicate));
            continue;
        }
        collected.accepted.push(abs);
    }

    collected
}

/// Jobs of a batch, plus the inputs left out of it.
#[derive(Debug, Default)]
pub struct BatchPlan {
    pub jobs: Vec<ConversionJob>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

/// Turn accepted inputs into jobs, keeping the first input for each output path.
pub fn plan_jobs(inputs: &[PathBuf], options: &JobOptions) -> Result<BatchPlan> {
    let mut plan = BatchPlan::default();
    let mut outputs = HashSet::new();

    for input in inputs {
        let job = ConversionJob::new(input, options)?;
        if !outputs.insert(job.output().to_path_buf()) {
            plan.skipped
                .push((job.input().to_path_buf(), SkipReason::OutputCollision));
            continue;
        }
        plan.jobs.push(job);
    }
    Ok(plan)
}
