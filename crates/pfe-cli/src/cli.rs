//! Argument parsing and command dispatch.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pfe_app::{SimulationPlan, init_telemetry, load_settings};
use pfe_telemetry::LogFormat;

use crate::commands::{handle_hash, handle_run, handle_settings_init, handle_settings_show};
use crate::error::CliResult;

/// Parse arguments, execute the command, and report failures on stderr.
///
/// Returns the process exit code: `0` on success, `2` for invalid input,
/// `3` for operational failures.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    if let Command::Hash(command) = &cli.command {
        return handle_hash(command);
    }
    let (file, settings) = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Command::Run(args) => {
            init_telemetry(
                &settings,
                cli.log_level.as_deref(),
                cli.log_format.map(LogFormatArg::into_format),
            )?;
            handle_run(settings, args, cli.output).await
        }
        Command::Hash(command) => handle_hash(&command),
        Command::Settings(command) => match command {
            SettingsCommand::Show => handle_settings_show(&settings),
            SettingsCommand::Init(args) => handle_settings_init(&file, args.force),
        },
    }
}

#[derive(Parser)]
#[command(name = "pfe", about = "Seeding lifecycle monitor")]
pub(crate) struct Cli {
    /// Settings file; defaults to `PFE_SETTINGS` or the file beside the executable.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,
    /// Log filter overriding the settings file.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
    #[arg(
        long = "output",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor a simulated session.
    Run(RunArgs),
    /// Convert content hashes between text forms.
    #[command(subcommand)]
    Hash(HashCommand),
    /// Inspect or create the settings file.
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct RunArgs {
    /// Number of simulated transfers.
    #[arg(long, default_value_t = 3)]
    pub(crate) transfers: usize,
    /// Payload size of each transfer in bytes.
    #[arg(long, default_value_t = 64 * 1024 * 1024)]
    pub(crate) size: u64,
    #[arg(long, default_value_t = 4 * 1024 * 1024)]
    pub(crate) download_bps: u64,
    #[arg(long, default_value_t = 2 * 1024 * 1024)]
    pub(crate) upload_bps: u64,
    /// Total bytes peers request per transfer; unbounded when omitted.
    #[arg(long)]
    pub(crate) upload_budget: Option<u64>,
    /// Start every transfer complete.
    #[arg(long)]
    pub(crate) seed: bool,
    /// Simulated engine step in milliseconds.
    #[arg(long, default_value_t = 250)]
    pub(crate) step_ms: u64,
    /// Exit once every transfer has stopped.
    #[arg(long)]
    pub(crate) exit_when_idle: bool,
}

impl RunArgs {
    pub(crate) const fn plan(&self) -> SimulationPlan {
        SimulationPlan {
            transfers: self.transfers,
            size_bytes: self.size,
            download_bps: self.download_bps,
            upload_bps: self.upload_bps,
            upload_budget: self.upload_budget,
            seed: self.seed,
            step: Duration::from_millis(self.step_ms),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum HashCommand {
    /// Base32 to hex.
    ToHex(HashArgs),
    /// Hex to base32.
    ToBase32(HashArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct HashArgs {
    pub(crate) value: String,
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the effective settings as JSON.
    Show,
    /// Write a settings file with default values.
    Init(SettingsInitArgs),
}

#[derive(Args)]
struct SettingsInitArgs {
    /// Overwrite an existing file.
    #[arg(long)]
    force: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum LogFormatArg {
    Json,
    Pretty,
}

impl LogFormatArg {
    const fn into_format(self) -> LogFormat {
        match self {
            Self::Json => LogFormat::Json,
            Self::Pretty => LogFormat::Pretty,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}
