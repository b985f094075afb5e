use std::path::PathBuf;

use aria_reports::config::ProcessConfig;
use aria_reports::io::csv_read;
use aria_reports::pipeline;
use aria_reports::{ReportError, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Process(args) => execute_process(args),
        Command::Report(args) => execute_report(args),
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .map_err(|error| ReportError::Logging(error.to_string()))
}

fn execute_process(args: ProcessArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let outcome = pipeline::process(&args.input, &config)?;
    if let Some(path) = outcome.processed_path {
        println!("processed table written to {}", path.display());
    }
    Ok(())
}

fn execute_report(args: ReportArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(ReportError::MissingInput(args.input));
    }
    let config = load_config(&args.config)?;
    let table = csv_read::read_table(&args.input)?;
    pipeline::generate_reports(&table, &args.output, args.factors, &args.parts, &config)
}

fn load_config(path: &Option<PathBuf>) -> Result<ProcessConfig> {
    match path {
        Some(path) => ProcessConfig::from_json_file(path),
        None => Ok(ProcessConfig::default()),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Turn per-aria feature tables into stratified statistical reports."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clean and merge a raw feature table into its processed form.
    Process(ProcessArgs),
    /// Generate grouped reports from a processed feature table.
    Report(ReportArgs),
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Raw feature table (CSV).
    #[arg(long)]
    input: PathBuf,

    /// Optional JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
struct ReportArgs {
    /// Processed feature table (CSV).
    #[arg(long)]
    input: PathBuf,

    /// Report root directory.
    #[arg(long)]
    output: PathBuf,

    /// Maximum factor count to generate (0 runs the per-work baseline).
    #[arg(long, default_value_t = 1)]
    factors: usize,

    /// Restrict reports to these instrument tokens.
    #[arg(long)]
    parts: Vec<String>,

    /// Optional JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}
