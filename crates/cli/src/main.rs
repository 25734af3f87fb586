//! `morph-split`: drive the augmentation backend from the command line.

mod commands;
mod error;
mod notify;
mod state;
mod types;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use morph_split_storage::{ClientSettings, DEFAULT_BASE_URL};
use tracing_subscriber::EnvFilter;

use crate::commands::Command;
use crate::error::CommandError;
use crate::state::{Context, StateDir};

#[derive(Debug, Parser)]
#[command(name = "morph-split", version, about)]
struct Cli {
    /// Backend address
    #[arg(long, env = "MORPH_SPLIT_BACKEND_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Directory holding the session id and configuration
    #[arg(long, env = "MORPH_SPLIT_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn init_tracing(verbose: bool) {
    let default_level: &str = if verbose { "debug" } else { "info" };
    let filter: EnvFilter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let state: StateDir = cli
        .state_dir
        .map(StateDir::new)
        .unwrap_or_else(StateDir::default_location);
    let settings: ClientSettings = ClientSettings::default()
        .with_base_url(cli.base_url)
        .with_user_agent(format!("morph-split-cli/{}", env!("CARGO_PKG_VERSION")));
    let context: Context = state.open(&settings)?;
    cli.command.run(&context).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli: Cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !err.reported {
                eprintln!("error: {}", err);
            }
            ExitCode::FAILURE
        }
    }
}
