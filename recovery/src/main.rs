//! Replay tool for captured model output.
//!
//! Runs the recovery cascade and size governance over a file (or stdin) and
//! prints a JSON report. The exit code reports parser confidence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use recovery::core::clock::SystemClock;
use recovery::core::stats::AtomicStats;
use recovery::exit_codes;
use recovery::io::config::{RecoveryConfig, load_config, write_config};
use recovery::io::raw_output::RawSource;
use recovery::io::report::{render_json, write_json};
use recovery::io::schema::parse_record;
use recovery::logging;
use recovery::pipeline::Pipeline;

#[derive(Parser)]
#[command(
    name = "recovery",
    version,
    about = "Recover and bound structured task records from raw model output"
)]
struct Cli {
    /// TOML file with `[parser]` and `[budget]` tables; defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write the JSON report here instead of stdout.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the recovery cascade only.
    Parse {
        /// Raw output file, or `-` for stdin.
        input: String,
        /// Task id used when the output does not carry one.
        #[arg(long)]
        task_id: Option<String>,
    },
    /// Apply size governance to a record JSON file.
    Govern {
        /// Record file matching the record schema, or `-` for stdin.
        input: String,
    },
    /// Parse, govern, and check postconditions.
    Process {
        /// Raw output file, or `-` for stdin.
        input: String,
        /// Task id used when the output does not carry one.
        #[arg(long)]
        task_id: Option<String>,
    },
    /// Write the effective configuration (defaults, or `--config`) as TOML.
    InitConfig {
        /// Destination TOML file.
        path: PathBuf,
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RecoveryConfig::default(),
    };
    let stats = Arc::new(AtomicStats::new());
    let pipeline = Pipeline::new(&config, stats, Arc::new(SystemClock))?;
    let output = cli.output.as_deref();

    match cli.command {
        Command::Parse { input, task_id } => {
            let raw = RawSource::from_arg(&input).read_bytes()?;
            let outcome = pipeline.parser().parse_bytes(&raw, task_id.as_deref());
            emit(output, &outcome)?;
            Ok(exit_codes::for_completeness(outcome.completeness))
        }
        Command::Govern { input } => {
            let text = RawSource::from_arg(&input).read_lossy()?;
            let record = parse_record(&text).with_context(|| format!("load record {input}"))?;
            let outcome = pipeline.governor().govern(&record);
            emit(output, &outcome)?;
            Ok(exit_codes::OK)
        }
        Command::Process { input, task_id } => {
            let raw = RawSource::from_arg(&input).read_bytes()?;
            let outcome = pipeline.run_bytes(&raw, task_id.as_deref());
            emit(output, &outcome)?;
            if !outcome.violations.is_empty() {
                return Ok(exit_codes::INVALID);
            }
            Ok(exit_codes::for_completeness(outcome.completeness))
        }
        Command::InitConfig { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to replace it)", path.display());
            }
            write_config(&path, &config)?;
            Ok(exit_codes::OK)
        }
    }
}

fn emit<T: Serialize>(output: Option<&Path>, value: &T) -> Result<()> {
    match output {
        Some(path) => write_json(path, value),
        None => {
            print!("{}", render_json(value)?);
            Ok(())
        }
    }
}
