//! Teams sender CLI - main entry point

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use teams_sender::{commands, metrics};
use tracing::warn;

#[derive(Parser)]
#[command(name = "teams_sender")]
#[command(about = "Send a Microsoft Teams direct message to a list of users", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to every email address in a file (one per line)
    Send {
        /// Path to the newline-delimited list of email addresses
        users_file: PathBuf,

        /// Message text (defaults to the configured greeting)
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("teams_sender=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let start = Instant::now();
    let result = execute_command(cli.command).await;
    metrics::record_run_result(start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Send {
            users_file,
            message,
        } => {
            commands::send::run(commands::SendArgs {
                users_file,
                message,
            })
            .await?;
        }
    }

    Ok(())
}
