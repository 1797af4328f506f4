#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use prealloc_core::{DEFAULT_TARGET_GIB, DEFAULT_VOLUME, PreallocConfig, RunReport};
use prealloc_error::PreallocError;
use prealloc_types::FillMode;
use prealloc_volume::StatvfsStats;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Keep a volume filled to a target level with 1 GiB filler files.
///
/// Files live in `<path>/.preallocation`. Usage below the target allocates
/// files, usage above it deletes them. A single file taking more than ten
/// minutes stops the run.
#[derive(Debug, Parser)]
#[command(name = "prealloc", version)]
struct Args {
    /// Target total disk usage in GiB. Must be a non-negative whole number.
    #[arg(long, value_name = "GIB", default_value_t = DEFAULT_TARGET_GIB)]
    size: u64,

    /// Mount path of the volume.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_VOLUME)]
    path: PathBuf,

    /// Fill new files with random bytes instead of zeros.
    #[arg(long)]
    random: bool,

    /// Print a JSON run report on stdout.
    #[arg(long)]
    json: bool,
}

impl Args {
    fn to_config(&self) -> PreallocConfig {
        PreallocConfig {
            volume: self.path.clone(),
            target_gib: self.size,
            fill: FillMode::from_random_flag(self.random),
            ..PreallocConfig::default()
        }
    }
}

fn main() {
    init_logging();
    let args = Args::parse();
    if let Err(err) = run(&args) {
        error!("{err:#}");
        std::process::exit(exit_code(&err));
    }
}

/// `RUST_LOG` wins; otherwise `info`. Logs go to stderr so `--json` output
/// stays clean.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<PreallocError>()
        .map_or(1, PreallocError::exit_code)
}

fn run(args: &Args) -> Result<()> {
    let config = args.to_config();
    info!(
        volume = %config.volume.display(),
        target_gib = config.target_gib,
        fill = %config.fill,
        "starting"
    );

    let report = prealloc_core::run(&config, &StatvfsStats)
        .with_context(|| format!("preallocation on {} failed", config.volume.display()))?;
    summarize(&report);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize run report")?
        );
    }
    Ok(())
}

fn summarize(report: &RunReport) {
    info!(
        plan = ?report.plan,
        completed = report.completed,
        reclaim_noops = report.reclaim_noops,
        stopped_slow = report.stopped_slow,
        "done"
    );
}
