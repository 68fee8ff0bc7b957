use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use ephemera_server::{EphemeraServer, ServerConfig};
use ephemera_store::{EphemeralStore, ExpiryLoop, StartupPolicy, StoreConfig};
use tokio_util::sync::CancellationToken;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Sweep(args) => cmd_sweep(args).await,
        Command::Config(args) => cmd_config(args),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(ServerConfig::default()),
    }
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind.parse().with_context(|| format!("invalid bind address {bind}"))?;
    }
    if let Some(dir) = args.dir {
        config.store.directory = dir;
    }
    if let Some(retention) = args.retention {
        config.store.retention_secs = retention;
    }

    let store = Arc::new(EphemeralStore::open_fs(config.store.clone()).await?);
    println!(
        "{} Ephemera on {} (dir: {}, retention: {}s)",
        "✓".green().bold(),
        config.bind_addr.to_string().bold(),
        config.store.directory.display(),
        config.store.retention_secs
    );

    let cancel = CancellationToken::new();
    let expiry = ExpiryLoop::new(Arc::clone(&store), cancel.clone()).spawn();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
        tracing::info!("shutting down");
        shutdown.cancel();
    });

    let served = EphemeraServer::new(config, store).serve(cancel.clone()).await;
    cancel.cancel();
    expiry.await.context("expiry loop panicked")?;
    served?;
    Ok(())
}

async fn cmd_sweep(args: SweepArgs) -> anyhow::Result<()> {
    let mut config = StoreConfig {
        startup: StartupPolicy::Ignore,
        ..StoreConfig::with_directory(&args.dir)
    };
    if let Some(retention) = args.retention {
        config.retention_secs = retention;
    }

    let store = EphemeralStore::open_fs(config).await?;
    let report = store.sweep().await?;

    println!("{} Swept {}", "✓".green().bold(), args.dir.display().to_string().bold());
    println!("  staging cleared:  {}", report.staging_cleared);
    println!("  expired removed:  {}", report.expired_removed.to_string().red());
    println!("  still live:       {}", report.rescheduled.to_string().green());
    if report.foreign > 0 {
        println!("  {} {} unrecognised file(s) left in place", "!".yellow(), report.foreign);
    }
    Ok(())
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    print!("{}", config.to_toml()?);
    Ok(())
}
