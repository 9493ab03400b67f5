//! dcard CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use dc_card::{Datacard, DatasetMetadata, HistogramMap, JobConfig, check_completeness};

#[derive(Parser)]
#[command(name = "dcard")]
#[command(about = "dcard - CMS Combine datacards from weighted histograms")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Inputs {
    /// Job configuration (YAML, or JSON by `.json` extension)
    #[arg(short, long)]
    config: PathBuf,

    /// Histogram mapping `sample -> dataset -> histogram` (JSON)
    #[arg(long)]
    histograms: PathBuf,

    /// Dataset metadata `by_datataking_period` (JSON)
    #[arg(long)]
    metadata: PathBuf,

    /// Override the configured year.
    #[arg(long)]
    year: Option<String>,

    /// Override the configured category.
    #[arg(long)]
    category: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the datacard and its shape file
    Render {
        #[command(flatten)]
        inputs: Inputs,

        /// Output directory
        #[arg(long)]
        out_dir: PathBuf,

        /// Output file for the summary (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the histograms cover every process, dataset and variation
    Validate {
        #[command(flatten)]
        inputs: Inputs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Render { inputs, out_dir, output } => {
            cmd_render(&inputs, &out_dir, output.as_ref())
        }
        Commands::Validate { inputs } => cmd_validate(&inputs),
    }
}

struct Loaded {
    job: JobConfig,
    histograms: HistogramMap,
    metadata: DatasetMetadata,
}

fn load(inputs: &Inputs) -> Result<Loaded> {
    let mut job = JobConfig::from_path(&inputs.config)
        .with_context(|| format!("failed to read config {}", inputs.config.display()))?;
    if let Some(year) = &inputs.year {
        job.year = year.clone();
    }
    if let Some(category) = &inputs.category {
        job.category = category.clone();
    }
    let histograms = dc_card::read_histograms(&inputs.histograms)
        .with_context(|| format!("failed to read histograms {}", inputs.histograms.display()))?;
    let metadata = DatasetMetadata::from_path(&inputs.metadata)
        .with_context(|| format!("failed to read metadata {}", inputs.metadata.display()))?;
    tracing::info!(
        samples = histograms.len(),
        year = %job.year,
        category = %job.category,
        "inputs loaded"
    );
    Ok(Loaded { job, histograms, metadata })
}

fn cmd_render(inputs: &Inputs, out_dir: &Path, output: Option<&PathBuf>) -> Result<()> {
    let Loaded { job, histograms, metadata } = load(inputs)?;
    let processes = job.processes()?;
    let systematics = job.systematics()?;

    let card = Datacard::new(
        &histograms,
        &metadata,
        &processes,
        &systematics,
        &job.year,
        &job.category,
        job.options(),
    )?;
    let written = card.dump(out_dir, &job.card_name)?;

    let mut rates = serde_json::Map::new();
    for p in card.columns() {
        rates.insert(p.name().to_string(), serde_json::json!(card.rate(p.name())?));
    }
    let summary = serde_json::json!({
        "bin": card.bin_name(),
        "imax": card.imax(),
        "jmax": card.jmax(),
        "kmax": card.kmax(),
        "rates": rates,
        "datacard": written.card,
        "shapes": written.shapes,
    });
    write_json(output, summary)
}

fn cmd_validate(inputs: &Inputs) -> Result<()> {
    let Loaded { job, histograms, metadata } = load(inputs)?;
    let processes = job.processes()?.for_year(&job.year);
    let variations = job.systematics()?.for_year(&job.year).required_variations();

    let report = check_completeness(
        &histograms,
        &metadata,
        &processes,
        &variations,
        &job.year,
        &job.category,
    );
    if !report.is_empty() {
        tracing::error!(missing = report.entries.len(), "inputs incomplete");
    }
    report.into_result()?;
    println!("ok: {} processes, {} variations", processes.len(), variations.len());
    Ok(())
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
