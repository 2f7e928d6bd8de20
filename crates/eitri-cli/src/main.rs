//! eitri CLI - Main entry point

mod repl;

use clap::{Parser, Subcommand};
use eitri_core::{Environment, SessionBuilder, SessionRunner, Workspace};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// eitri - reusable docker-compose toolkit environments
#[derive(Parser, Debug)]
#[command(name = "eitri")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start an interactive session in a workspace
    Run {
        /// Workspace directory (defaults to the current directory)
        workspace: Option<PathBuf>,

        /// Toolkit to use, by name (defaults to the first installed)
        #[arg(short, long)]
        toolkit: Option<String>,
    },
    /// Install a toolkit
    Add {
        /// Toolkit source to install
        name: String,
    },
    /// Remove an installed toolkit
    Rm {
        /// Toolkit name to remove
        name: String,
    },
    /// List installed toolkits
    Ls,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match args.command {
        None => run(None, None).await,
        Some(Command::Run { workspace, toolkit }) => run(workspace, toolkit).await,
        Some(Command::Add { .. }) | Some(Command::Rm { .. }) | Some(Command::Ls) => {
            anyhow::bail!("toolkit management commands are not implemented yet")
        }
    }
}

/// Resolve the environment, build the session, and hand control to the
/// prompt loop. Resolution errors abort here, before any session
/// resource exists.
async fn run(workspace: Option<PathBuf>, toolkit: Option<String>) -> anyhow::Result<()> {
    let workspace = match workspace {
        Some(path) => Workspace::load(path)?,
        None => Workspace::load(std::env::current_dir()?)?,
    };

    let environment = Environment::detect(Environment::default_toolkit_root()?).await?;
    let toolkit = environment.resolve_toolkit(toolkit.as_deref())?;

    println!(
        "eitri {} | {}: {} | {}",
        env!("CARGO_PKG_VERSION"),
        toolkit.name(),
        toolkit.version(),
        workspace
    );

    let session = SessionBuilder::new(workspace, toolkit, environment)
        .build()
        .await?;
    repl::run_loop(SessionRunner::new(session)).await
}
