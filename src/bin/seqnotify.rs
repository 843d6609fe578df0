//! # Seqnotify CLI
//!
//! Command-line entry points for the sequencing notification pipelines.
//! Every subcommand is a single cron-friendly invocation; task durability
//! and scheduling live in the porch server, not here.

mod cli;

use clap::{Parser, Subcommand, ValueEnum};
use seqnotify::ont::EventType;
use seqnotify::{NotifyConfig, NotifyResult};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cli::{handle_ont_command, handle_pacbio_command};

#[derive(Parser, Debug)]
#[command(name = "seqnotify")]
#[command(about = "Customer notifications for sequencing platforms")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: PathBuf,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write logs as JSON lines instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Subcommands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// PacBio QC notification operations
    #[command(subcommand)]
    Pacbio(PacbioCommands),

    /// ONT run event notification operations
    #[command(subcommand)]
    Ont(OntCommands),
}

#[derive(Debug, Subcommand)]
pub enum PacbioCommands {
    /// Register recently QC-ed products as porch tasks
    Register,
    /// Claim one task and email the study contacts
    Process,
}

#[derive(Debug, Subcommand)]
pub enum OntCommands {
    /// Read baton collections and add an email task for each
    Add {
        /// The event to report in the emails
        #[arg(long, value_enum, default_value_t = EventArg::Uploaded)]
        event: EventArg,
        /// Input file with one baton JSON document per line (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output file for the echoed documents (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Claim a batch of tasks and send the emails
    Run,
    /// Register the pipeline with the porch server (admin, run once)
    Register,
    /// Mint a new pipeline token (admin)
    Token {
        /// A description stored against the token
        #[arg(short, long, default_value = "ont-event-email")]
        description: String,
    },
}

/// CLI spelling of the ONT event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EventArg {
    Uploaded,
    Basecalled,
    BasecalledHac,
    BasecalledSup,
    BasecalledMod,
}

impl From<EventArg> for EventType {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Uploaded => EventType::Uploaded,
            EventArg::Basecalled => EventType::Basecalled,
            EventArg::BasecalledHac => EventType::BasecalledHac,
            EventArg::BasecalledSup => EventType::BasecalledSup,
            EventArg::BasecalledMod => EventType::BasecalledMod,
        }
    }
}

#[tokio::main]
async fn main() -> NotifyResult<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity level; RUST_LOG wins when set
    let default_directive = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = NotifyConfig::load_from_file(&cli.config)?;
    info!(porch_url = %config.porch.url, "Seqnotify starting");

    let clean = match cli.command {
        Commands::Pacbio(pacbio_cmd) => handle_pacbio_command(pacbio_cmd, &config).await?,
        Commands::Ont(ont_cmd) => handle_ont_command(ont_cmd, &config).await?,
    };

    if !clean {
        std::process::exit(1);
    }
    Ok(())
}
