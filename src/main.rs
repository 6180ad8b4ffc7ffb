//! pdfxl - PDF to fixed-layout EPUB converter

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::warn;

use pdfxl::batch::DEFAULT_POLL_INTERVAL;
use pdfxl::{
    BatchEvent, BatchSequencer, BatchSummary, Dpi, JobOptions, JobOutcome, PdfiumRasterizer,
    collect_inputs, plan_jobs,
};

#[derive(Parser)]
#[command(name = "pdfxl")]
#[command(version, about = "Convert PDF documents into fixed-layout EPUB 3 packages", long_about = None)]
#[command(after_help = "EXAMPLES:
    pdfxl scan.pdf                  Write scan.epub next to scan.pdf
    pdfxl -d 300 a.pdf b.pdf        Render at 300 DPI
    pdfxl -o out/ *.pdf             Write every archive into out/")]
struct Cli {
    /// Input PDF files, converted in the given order
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<PathBuf>,

    /// Rendering resolution; invalid values fall back to 150
    #[arg(short, long, env = "PDFXL_DPI", default_value = "150")]
    dpi: String,

    /// Directory receiving the archives (default: next to each input)
    #[arg(short, long, value_name = "DIR", env = "PDFXL_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Deflate level for archive entries
    #[arg(long, value_name = "0-9")]
    compression_level: Option<i64>,

    /// Directory containing the pdfium shared library
    #[arg(long, value_name = "DIR", env = "PDFIUM_LIB_DIR")]
    pdfium_lib: Option<PathBuf>,

    /// Suppress progress messages
    #[arg(short, long)]
    quiet: bool,

    /// Log at info level
    #[arg(short, long)]
    verbose: bool,

    /// Print a JSON summary when the batch is done
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonSummary {
    succeeded: usize,
    failed: usize,
    jobs: Vec<JsonJob>,
}

#[derive(Serialize)]
struct JsonJob {
    input: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<&BatchSummary> for JsonSummary {
    fn from(summary: &BatchSummary) -> Self {
        let jobs = summary
            .records
            .iter()
            .map(|record| match &record.outcome {
                JobOutcome::Succeeded { output } => JsonJob {
                    input: record.input.clone(),
                    output: Some(output.clone()),
                    error_kind: None,
                    error: None,
                },
                JobOutcome::Failed { kind, message, .. } => JsonJob {
                    input: record.input.clone(),
                    output: None,
                    error_kind: Some(kind.to_string()),
                    error: Some(message.clone()),
                },
            })
            .collect();
        Self {
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            jobs,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&cli) {
        Ok(summary) if summary.failed() == 0 => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<BatchSummary, String> {
    let (dpi, fallback) = Dpi::parse_lenient(&cli.dpi);
    if let Some(reason) = fallback {
        warn!("{reason}");
        eprintln!("warning: {reason}");
    }

    let options = JobOptions {
        dpi,
        output_dir: cli.output_dir.clone(),
        compression_level: cli.compression_level,
    };
    options.validate().map_err(|e| e.to_string())?;

    let collected = collect_inputs(&cli.inputs);
    for (path, reason) in &collected.skipped {
        eprintln!("skipping {}: {reason}", path.display());
    }
    if collected.accepted.is_empty() {
        return Err("no PDF files to convert".to_string());
    }

    let plan = plan_jobs(&collected.accepted, &options).map_err(|e| e.to_string())?;
    for (path, reason) in &plan.skipped {
        eprintln!("skipping {}: {reason}", path.display());
    }
    let jobs = plan.jobs;

    let mut rasterizer = PdfiumRasterizer::new();
    if let Some(dir) = &cli.pdfium_lib {
        rasterizer = rasterizer.with_library_dir(dir);
    }

    let quiet = cli.quiet;
    let batch = BatchSequencer::new(jobs, Arc::new(rasterizer));
    let summary = batch.run(DEFAULT_POLL_INTERVAL, |event| match event {
        BatchEvent::Status(text) if !quiet => println!("{text}"),
        BatchEvent::Status(_) => {}
        BatchEvent::JobFinished {
            index,
            outcome,
            percent,
        } => {
            if quiet {
                return;
            }
            match outcome {
                JobOutcome::Succeeded { .. } => println!("File {} completed.", index + 1),
                JobOutcome::Failed { .. } => println!("Error processing file {}.", index + 1),
            }
            println!("Progress: {percent:.0}%");
        }
        BatchEvent::BatchComplete => {
            if !quiet {
                println!("All conversions complete.");
            }
        }
    });

    if cli.json {
        let json = serde_json::to_string_pretty(&JsonSummary::from(&summary))
            .map_err(|e| e.to_string())?;
        println!("{json}");
    } else if !quiet {
        println!(
            "{} converted, {} failed",
            summary.succeeded(),
            summary.failed()
        );
    }

    Ok(summary)
}
