use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, error::ErrorKind};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use ti_purge::{
    AzureCliTokenProvider, Purger, ReqwestHttpClient, StaticTokenProvider, StopReason,
    ThreatIntelClient, TokenProvider,
};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_or_exit();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let filter = cli.filter().context("Invalid filter")?;
    let endpoints = cli.endpoints().context("Invalid workspace")?;

    let token_provider: Box<dyn TokenProvider> = match &cli.access_token {
        Some(token) => Box::new(StaticTokenProvider::new(token.clone())),
        None => Box::new(AzureCliTokenProvider::new()),
    };
    let token = token_provider
        .token()
        .await
        .context("Azure authentication token is required")?;

    let mut client = ThreatIntelClient::new(ReqwestHttpClient::new(), endpoints);
    if let Some(timeout_ms) = cli.timeout_ms() {
        client = client.with_timeout_ms(timeout_ms);
    }

    let shutdown_token = CancellationToken::new();
    tokio::spawn({
        let shutdown_token = shutdown_token.clone();
        async move {
            match shutdown_signal().await {
                Ok(()) => {
                    tracing::info!("Received an interrupt, stopping...");
                    shutdown_token.cancel();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signals"),
            }
        }
    });

    let purger = Arc::new(Purger::new(
        client,
        filter,
        token,
        cli.purge_config(),
        shutdown_token,
    ));

    let summary = purger.run().await.context("Failed to process indicators")?;

    tracing::info!(
        cycles = summary.cycles,
        reported_deleted = summary.reported_deleted,
        confirmed = summary.confirmed,
        failed = summary.failed,
        skipped = summary.skipped,
        interrupted = summary.stop_reason == StopReason::Cancelled,
        "Purge finished"
    );

    Ok(())
}

/// Parse the command line, exiting with status 1 and usage text on bad input.
fn parse_or_exit() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            eprintln!("\n{}", Cli::command().render_help());
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
