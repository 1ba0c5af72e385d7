//! affinity: regional primary affinity placement rules for Ceph pools.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use affinity_core::config::{Config, LogFormat};
use affinity_mgr::{
    CephCli, CommandHandler, CrushTool, RuleSynthesizer, Service, SynthesizerConfig,
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod cli;
mod rule_cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("affinity {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    init_logging(&config)?;

    match cli.command {
        Commands::CreatePoolRule(args) => {
            let handler = build_handler(&config);
            let retval = rule_cli::handle_create_pool_rule(&handler, &config, args).await?;
            if retval != 0 {
                // Negative errno values map to their positive exit status.
                let code = i32::try_from(retval.unsigned_abs().clamp(1, 255)).unwrap_or(1);
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::PreviewRule(args) => {
            rule_cli::handle_preview_rule(&build_handler(&config), args).await
        }
        Commands::RenderRule(args) => rule_cli::handle_render_rule(&config, args),
        Commands::Serve => run_service(&config).await,
        Commands::Version => Ok(()),
    }
}

fn build_handler(config: &Config) -> CommandHandler {
    let synthesizer = RuleSynthesizer::new(
        Arc::new(CephCli::new(config.cluster.clone())),
        Arc::new(CrushTool::new(config.converter.crushtool_binary.clone())),
        SynthesizerConfig::from_config(config),
    );
    CommandHandler::new(synthesizer, config.rule.name_suffix.clone())
}

async fn run_service(config: &Config) -> Result<()> {
    let service = Service::new(Duration::from_secs(config.service.interval_secs));
    let handle = service.handle();

    tokio::spawn(async move {
        shutdown_signal().await;
        handle.shutdown();
    });

    service.serve().await;
    info!("Service shutdown complete");
    Ok(())
}

fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    Config::load(path.as_deref()).context("Failed to load configuration")
}

fn init_logging(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    // Command output goes to stdout; keep logs off it.
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry().with(filter).with(fmt_layer.json()).try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
