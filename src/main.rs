//! focusrun - sequential focus sessions from the terminal
//!
//! A session is an ordered list of work and break tasks. The daemon runs
//! the loaded session second by second, plays background music and warns
//! when the user goes idle; every other subcommand talks to it.

use anyhow::Result;
use clap::Parser;

use focusrun::cli::{self, Cli, Commands, Display};
use focusrun::daemon;
use focusrun::store::AppPaths;

/// Main entry point
#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    let is_daemon = matches!(cli.command, Some(Commands::Daemon));
    init_tracing(default_filter(is_daemon, cli.verbose));

    // Execute command
    if let Err(e) = run(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Returns the log filter used when `RUST_LOG` is unset.
fn default_filter(is_daemon: bool, verbose: bool) -> &'static str {
    match (is_daemon, verbose) {
        (_, true) => "debug",
        (true, false) => "info",
        (false, false) => "warn",
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing(default: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves the application directory and dispatches the command.
async fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::resolve()?;
    tracing::debug!("Application directory: {}", paths.base_dir().display());

    match cli.command {
        Some(Commands::Daemon) => daemon::run_daemon(&paths).await,
        command => cli::execute(command, &paths).await,
    }
}

// ============================================================================
// Tests
// ============================================================================
