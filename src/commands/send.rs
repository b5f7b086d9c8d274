//! Send one message to every user listed in a file

use std::path::PathBuf;

use crate::auth::provider_from_config;
use crate::config::Config;
use crate::dispatcher::{Dispatcher, RunSummary};
use crate::error::Result;
use crate::recipients;

/// Arguments for the send command.
pub struct SendArgs {
    pub users_file: PathBuf,
    pub message: Option<String>,
}

/// CLI entry point
pub async fn run(args: SendArgs) -> Result<RunSummary> {
    // Nothing may prompt for sign-in before the users file is known to exist.
    recipients::ensure_exists(&args.users_file)?;

    let config = Config::new();
    run_with_config(args, &config).await
}

pub async fn run_with_config(args: SendArgs, config: &Config) -> Result<RunSummary> {
    let message = args
        .message
        .unwrap_or_else(|| config.default_message.clone());

    let provider = provider_from_config(config)?;
    let summary = Dispatcher::new(provider.as_ref(), config)
        .run(&args.users_file, &message)
        .await?;

    print_summary(&summary);
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Summary");
    println!("Success: {}", summary.success_count);
    println!("Failed:  {}", summary.fail_count);
    println!("Total:   {}", summary.total_count);
}
