//! # detect-anomalies
//!
//! Batch detection over a directory of yearly ACE proton files.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use solar_anomaly::batch;
use solar_anomaly::{DegeneratePolicy, RunConfig};

#[derive(Parser)]
#[command(name = "detect-anomalies")]
#[command(about = "Detect extreme solar-wind proton anomalies month by month", long_about = None)]
struct Cli {
    /// Directory containing ACE_SW_Proton_Data_<year> files
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output directory for Monthly_graphs/ and the master log
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON run configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Isolation forest seed
    #[arg(long)]
    seed: Option<u64>,

    /// Skip per-month PNG charts
    #[arg(long)]
    no_graphs: bool,

    /// Add the column header to header-less CSV files before loading
    #[arg(long)]
    repair_headers: bool,

    /// Master log file name, relative to the output directory
    #[arg(long)]
    log_file: Option<String>,

    /// Handling of zero-variance features in z-score selection
    #[arg(long, value_enum)]
    degenerate_policy: Option<PolicyArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    NonExtreme,
    Reject,
}

impl From<PolicyArg> for DegeneratePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::NonExtreme => DegeneratePolicy::NonExtreme,
            PolicyArg::Reject => DegeneratePolicy::Reject,
        }
    }
}

impl Cli {
    fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => RunConfig::default(),
        };
        if let Some(input) = self.input {
            config.input_dir = input;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(seed) = self.seed {
            config.detection.seed = seed;
        }
        if self.no_graphs {
            config.graphs = false;
        }
        if self.repair_headers {
            config.repair_headers = true;
        }
        if let Some(log_file) = self.log_file {
            config.log_file = log_file;
        }
        if let Some(policy) = self.degenerate_policy {
            config.detection.degenerate_policy = policy.into();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config()?;
    let summary = batch::run(&config)
        .with_context(|| format!("processing {}", config.input_dir.display()))?;

    println!(
        "Processed {} year(s), {} failed, {} anomalies",
        summary.years.len(),
        summary.failed.len(),
        summary.total_anomalies
    );
    if let Some(path) = &summary.log_path {
        println!("Master log: {}", path.display());
    }
    Ok(())
}
