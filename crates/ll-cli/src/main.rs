//! llflow CLI

mod config;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ll_engine::{
    CutFlowConfig, CutFlowEngine, ProjectionReference, SampleHistograms, Stage,
    aggregate_sample_par,
};
use ll_store::{EventTable, append_derived_columns, extract_columns, inspect_columns};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::config::{AnalysisConfig, SampleSpec};

const OVERLAY_SCHEMA: &str = "llflow_overlay_v0";

#[derive(Parser)]
#[command(name = "llflow")]
#[command(about = "llflow - dilepton cut flow and derived-variable tool")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    /// Threads (0 = auto). Results do not depend on this.
    #[arg(long, global = true, default_value = "0")]
    threads: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply the six-stage selection and print per-stage survivor counts
    Cutflow {
        /// Input table(s); several shards are chained in order
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Analysis config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Label shown in the report header. Defaults to the first input's file name.
        #[arg(long)]
        label: Option<String>,

        /// Also write the report as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,

        #[command(flatten)]
        cuts: CutArgs,
    },

    /// Append delta_phi_1, delta_phi_2, delta_phi_min and projected_MET columns
    ProjectMet {
        /// Input table
        #[arg(short, long)]
        input: PathBuf,

        /// Output table. Defaults to rewriting the input in place.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Analysis config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Objects the MET is projected against (overrides the config)
        #[arg(long, value_enum)]
        reference: Option<ReferenceArg>,
    },

    /// Copy an allow-listed set of columns from one or more shards into one table
    Extract {
        /// Input shard(s), chained in order
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output table
        #[arg(short, long)]
        output: PathBuf,

        /// Columns to keep (comma separated or repeated)
        #[arg(short, long, required = true, value_delimiter = ',')]
        keep: Vec<String>,
    },

    /// Print the stored type of named columns
    Inspect {
        /// Input table
        #[arg(short, long)]
        input: PathBuf,

        /// Column names (comma separated or repeated)
        #[arg(short, long, required = true, value_delimiter = ',')]
        column: Vec<String>,
    },

    /// Build unit-normalized shape histograms for every configured sample
    Overlay {
        /// Analysis config (YAML) listing the samples
        #[arg(short, long)]
        config: PathBuf,

        /// Output file for the artifact (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReferenceArg {
    /// Two highest-pt objects of the event
    LeadingObjects,
    /// Two highest-pt identification-passing objects
    IdentifiedObjects,
}

impl From<ReferenceArg> for ProjectionReference {
    fn from(r: ReferenceArg) -> Self {
        match r {
            ReferenceArg::LeadingObjects => ProjectionReference::LeadingObjects,
            ReferenceArg::IdentifiedObjects => ProjectionReference::IdentifiedObjects,
        }
    }
}

/// Threshold overrides; each one replaces the config value.
#[derive(Args)]
struct CutArgs {
    /// Leading object pt threshold
    #[arg(long)]
    lead_pt_min: Option<f64>,
    /// Subleading object pt threshold
    #[arg(long)]
    sublead_pt_min: Option<f64>,
    /// Maximum |eta| of both objects
    #[arg(long)]
    eta_max: Option<f64>,
    /// Lower edge of the mass window
    #[arg(long)]
    mll_min: Option<f64>,
    /// Upper edge of the mass window
    #[arg(long)]
    mll_max: Option<f64>,
    /// Projected MET threshold
    #[arg(long)]
    projected_met_max: Option<f64>,
    /// Pair pt threshold
    #[arg(long)]
    ptll_max: Option<f64>,
    /// Minimum pair |dphi|
    #[arg(long)]
    dphill_min: Option<f64>,
}

impl CutArgs {
    fn apply(&self, cuts: &mut CutFlowConfig) {
        let overrides = [
            (self.lead_pt_min, &mut cuts.lead_pt_min),
            (self.sublead_pt_min, &mut cuts.sublead_pt_min),
            (self.eta_max, &mut cuts.eta_max),
            (self.mll_min, &mut cuts.mll_min),
            (self.mll_max, &mut cuts.mll_max),
            (self.projected_met_max, &mut cuts.projected_met_max),
            (self.ptll_max, &mut cuts.ptll_max),
            (self.dphill_min, &mut cuts.dphill_min),
        ];
        for (value, slot) in overrides {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(cli.threads).build_global();
    }

    match cli.command {
        Commands::Cutflow { input, config, label, json, cuts } => {
            cmd_cutflow(&input, config.as_deref(), label, json.as_deref(), &cuts, cli.threads)
        }
        Commands::ProjectMet { input, output, config, reference } => {
            cmd_project_met(&input, output.as_deref(), config.as_deref(), reference)
        }
        Commands::Extract { input, output, keep } => cmd_extract(&input, &output, &keep),
        Commands::Inspect { input, column } => cmd_inspect(&input, &column),
        Commands::Overlay { config, output } => cmd_overlay(&config, output.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    match path {
        Some(p) => AnalysisConfig::load(p),
        None => Ok(AnalysisConfig::default()),
    }
}

fn file_label(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn cmd_cutflow(
    input: &[PathBuf],
    config: Option<&Path>,
    label: Option<String>,
    json: Option<&Path>,
    overrides: &CutArgs,
    threads: usize,
) -> Result<()> {
    let cfg = load_config(config)?;
    let mut cuts = cfg.effective_cuts();
    overrides.apply(&mut cuts);
    cuts.validate()?;

    let table = EventTable::load(input, &cfg.columns, cfg.capacity)?;
    let engine = CutFlowEngine::new(cuts);
    let report =
        if threads == 1 { engine.run(table.events()) } else { engine.run_par(table.events()) };
    let label = label.unwrap_or_else(|| file_label(&input[0]));
    let report = report.with_label(label);
    tracing::info!(total = report.counters.total, passed = report.counters.passed(), "cut flow done");

    if let Some(path) = json {
        let value = serde_json::json!({
            "label": report.label,
            "inputs": input,
            "config": report.config,
            "total": report.counters.total,
            "stages": report.stages(),
            "passed": report.counters.passed(),
        });
        write_json(Some(path), value)?;
    }
    println!("{report}");
    Ok(())
}

fn cmd_project_met(
    input: &Path,
    output: Option<&Path>,
    config: Option<&Path>,
    reference: Option<ReferenceArg>,
) -> Result<()> {
    let cfg = load_config(config)?;
    let reference = reference.map(ProjectionReference::from).unwrap_or(cfg.projection);
    let summary = append_derived_columns(input, output, &cfg.columns, cfg.capacity, reference)
        .with_context(|| format!("failed to derive columns for {}", input.display()))?;
    write_json(None, serde_json::to_value(summary)?)
}

fn cmd_extract(input: &[PathBuf], output: &Path, keep: &[String]) -> Result<()> {
    let summary = extract_columns(input, keep, output)?;
    write_json(None, serde_json::to_value(summary)?)
}

fn cmd_inspect(input: &Path, columns: &[String]) -> Result<()> {
    let info = inspect_columns(input, columns)?;
    for c in info {
        println!("{c}");
    }
    Ok(())
}

fn run_sample(spec: &SampleSpec, cfg: &AnalysisConfig) -> Result<SampleHistograms> {
    let inputs = spec.inputs();
    let table = EventTable::load(&inputs, &cfg.columns, cfg.capacity)
        .with_context(|| format!("sample '{}'", spec.label))?;
    let hists = aggregate_sample_par(
        &spec.label,
        spec.weight,
        cfg.effective_cuts().lepton_mass,
        &cfg.binning,
        table.events(),
    )?;
    Ok(hists)
}

fn cmd_overlay(config: &Path, output: Option<&Path>) -> Result<()> {
    let cfg = AnalysisConfig::load(config)?;
    if cfg.samples.is_empty() {
        anyhow::bail!("no samples configured in {}", config.display());
    }

    let samples =
        cfg.samples.par_iter().map(|s| run_sample(s, &cfg)).collect::<Result<Vec<_>>>()?;

    let value = serde_json::json!({
        "schema_version": OVERLAY_SCHEMA,
        "selection": Stage::OppositeSignPair.describe(&cfg.effective_cuts()),
        "samples": samples.iter().map(SampleHistograms::summary).collect::<Vec<_>>(),
    });
    write_json(output, value)
}

fn write_json(output: Option<&Path>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
