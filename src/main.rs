use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gameresult2csv::convert::{DEFAULT_INPUT, DEFAULT_KEY, DEFAULT_OUTPUT, Options, convert};
use tracing::{Level, error, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Convert a JSON document of game results into a flat CSV file.
#[derive(Parser, Debug)]
#[command(author, version, about = "Convert game results JSON to CSV", long_about = None)]
struct Cli {
    /// JSON document to read
    #[arg(default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// CSV file to write
    #[arg(default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Top-level key holding the array of records
    #[arg(long, default_value = DEFAULT_KEY)]
    key: String,
}

fn run(cli: Cli) -> Result<()> {
    let opts = Options {
        input: cli.input,
        output: cli.output,
        key: cli.key,
    };

    let report = convert(&opts)?;
    if !report.skipped.is_empty() {
        warn!("{} of {} game results skipped", report.skipped.len(), report.read);
    }
    Ok(())
}

fn main() {
    // Progress on stdout, warnings and errors on stderr
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(writer)
        .without_time()
        .with_target(false)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!("{e}");
        std::process::exit(1);
    }
}
