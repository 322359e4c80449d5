use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use gfakt::{GfaktConfig, Pipeline, PipelineSettings};

#[derive(Parser)]
#[command(
    name = "gfakt",
    about = "Two-stage GPU/CPU pipeline driver for GMP-ECM",
    version,
    long_about = "Two-stage GPU/CPU pipeline driver for GMP-ECM.\n\n\
                  Runs ECM stage 1 on GPUs, splits each save file into shards and resumes \
                  them on a bounded pool of CPU slots.\n\n\
                  Give B1 right after a single-valued flag or before -d, e.g.:\n  gfakt -t 4 11000000 -d 0 1 -N c101:1234... 5678..."
)]
struct Cli {
    /// Use verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log file name
    #[arg(short = 'l', long)]
    log_file: Option<PathBuf>,

    /// Number of curves to run on the GPU
    #[arg(short, long)]
    curves: Option<u32>,

    /// List of GPU devices to use
    #[arg(short, long, num_args = 1..)]
    devices: Vec<u32>,

    /// Number of CPU threads to use for stage 2
    #[arg(short, long)]
    threads: Option<usize>,

    /// Path to the GPU-enabled GMP-ECM binary
    #[arg(long, env = "GFAKT_ECM")]
    ecm: Option<PathBuf>,

    /// Directory for input, save and log files
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print a JSON run report on stdout when done
    #[arg(long)]
    json: bool,

    /// B1 bound (overrides `pipeline.b1` from the config file)
    #[arg(value_name = "B1")]
    b1: Option<String>,

    /// B2 bound (accepted for compatibility, not used)
    #[arg(value_name = "B2")]
    b2: Option<String>,

    /// Numbers to factor, as `id:number` or `number`
    #[arg(short = 'N', long, num_args = 1.., required = true)]
    numbers: Vec<String>,
}

impl Cli {
    fn apply(&self, config: &mut GfaktConfig) {
        if self.verbose {
            config.logging.verbose = true;
        }
        if let Some(log_file) = &self.log_file {
            config.logging.log_file = log_file.clone();
        }
        if self.curves.is_some() {
            config.pipeline.curves = self.curves;
        }
        if !self.devices.is_empty() {
            config.pipeline.devices = self.devices.clone();
        }
        if let Some(threads) = self.threads {
            config.pipeline.stage2_slots = threads;
        }
        if let Some(ecm) = &self.ecm {
            config.ecm.path = ecm.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            config.pipeline.work_dir = work_dir.clone();
        }
        if let Some(b1) = &self.b1 {
            config.pipeline.b1 = Some(b1.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = GfaktConfig::load_or_default(cli.config.as_deref())?;
    cli.apply(&mut config);
    gfakt::logging::init(config.logging.verbose, Some(&config.logging.log_file))?;
    tracing::info!("{} version {}.", gfakt::NAME, gfakt::VERSION);
    if let Some(b2) = &cli.b2 {
        tracing::debug!(%b2, "B2 bound ignored; stage 2 uses GMP-ECM's default");
    }

    let mut settings = PipelineSettings::from_config(&config)?;
    if cli.json {
        // keep stdout clean for the report
        settings.echo_reports = false;
    }
    let report = Pipeline::new(settings)
        .run(&cli.numbers)
        .await
        .context("pipeline run failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
