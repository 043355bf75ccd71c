// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Four commands are supported:
//   1. `preprocess` — build every artifact from a dataset
//   2. `normalize`  — print normalized text
//   3. `encode`     — map requests to ids, one JSON per line
//   4. `batches`    — report what the batch pipeline yields
//
// Ctrl-C during `preprocess` sets a ShutdownSignal; the record
// writers stop between records and metadata is still saved.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use clap::Parser;
use commands::{BatchesArgs, Commands, EncodeArgs, NormalizeArgs, PreprocessArgs};

use crate::application::batches_use_case::{BatchReport, BatchesUseCase};
use crate::application::encode_use_case::EncodeUseCase;
use crate::application::preprocess_use_case::{PreprocessConfig, PreprocessUseCase};
use crate::data::normalizer::Normalizer;
use crate::data::record_writer::ShutdownSignal;
use crate::data::segmenter::UnigramSegmenter;

/// clap reads the fields and generates the argument parser.
#[derive(Parser, Debug)]
#[command(
    name = "tweet-prepro",
    version,
    about = "Normalize tweets, freeze vocab indices and embeddings, and batch padded records."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Route to the use case. This layer only routes and prints.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Preprocess(args) => run_preprocess(args),
            Commands::Normalize(args)  => run_normalize(args),
            Commands::Encode(args)     => run_encode(args),
            Commands::Batches(args)    => run_batches(args),
        }
    }
}

fn run_preprocess(args: PreprocessArgs) -> Result<()> {
    let config: PreprocessConfig = match args.config.clone() {
        Some(path) => {
            let body = std::fs::read_to_string(&path)
                .with_context(|| format!("Cannot read config file '{path}'"))?;
            serde_json::from_str(&body).with_context(|| format!("Invalid config file '{path}'"))?
        }
        None => args.into(),
    };

    let shutdown = ShutdownSignal::new();
    let handler  = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("Interrupt received, finishing the current record");
        handler.request();
    }) {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }

    tracing::info!("Preprocessing '{}' into '{}'", config.input_path, config.output_dir);
    let output_dir = config.output_dir.clone();
    let meta = PreprocessUseCase::new(config).execute(&shutdown)?;

    println!(
        "{} train / {} val records, {} classes, {} words ({} from frequency), {} chars",
        meta.num_train,
        meta.num_val,
        meta.num_classes,
        meta.num_words,
        meta.num_frequency_words,
        meta.num_chars
    );
    println!(
        "Embedding coverage {:.1}%, {} rows skipped",
        meta.embedding_coverage() * 100.0,
        meta.skipped.total()
    );
    for (kind, count) in &meta.skipped.counts {
        println!("  {kind:<18} {count}");
    }
    if meta.interrupted {
        println!("Interrupted: record files are complete up to the last written record.");
    }
    println!("Artifacts saved to '{output_dir}'.");
    Ok(())
}

fn run_normalize(args: NormalizeArgs) -> Result<()> {
    let normalizer = match &args.segmenter {
        Some(path) => Normalizer::new(std::sync::Arc::new(UnigramSegmenter::from_file(path)?)),
        None       => Normalizer::default(),
    };

    if let Some(text) = &args.text {
        println!("{}", normalizer.normalize(text));
        return Ok(());
    }
    for line in io::stdin().lock().lines() {
        let line = line.context("Cannot read stdin")?;
        println!("{}", normalizer.normalize(&line));
    }
    Ok(())
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let mut encoder = EncodeUseCase::load(&args.artifact_dir)?;

    if let Some(body) = args.request_body() {
        println!("{}", serde_json::to_string_pretty(&encoder.handle(&body))?);
        return Ok(());
    }
    for line in io::stdin().lock().lines() {
        let line = line.context("Cannot read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        println!("{}", serde_json::to_string(&encoder.handle(&line))?);
    }
    Ok(())
}

fn run_batches(args: BatchesArgs) -> Result<()> {
    let json   = args.json;
    let report = BatchesUseCase::new(args.into()).execute()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &BatchReport) {
    println!(
        "{} batches, {} of {} records, padding efficiency {:.3}",
        report.num_batches, report.num_examples, report.num_records, report.efficiency
    );
    println!("{:<7} {:<11} {:>8} {:>9} {:>7}  shapes", "bucket", "lengths", "batches", "examples", "eff");
    for b in &report.buckets {
        let shapes: Vec<String> = b.shapes.iter().map(|(s, n)| format!("{s}×{n}")).collect();
        println!(
            "{:<7} {:<11} {:>8} {:>9} {:>7.3}  {}",
            b.bucket,
            format!("{}..{}", b.lengths.0, b.lengths.1),
            b.batches,
            b.examples,
            b.efficiency,
            shapes.join(" ")
        );
    }
}
