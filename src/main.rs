//! Transaction fraud detection - command line entry point
//!
//! Batch preprocessing, evaluation, single-record prediction, the HTTP form
//! and the NATS streaming loop.

use anyhow::{Context, Result};
use clap::Parser;
use transaction_fraud_detection::cli::{Cli, Command};
use transaction_fraud_detection::commands::{batch, evaluate, predict, stream};
use transaction_fraud_detection::config::{AppConfig, LoggingConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    init_tracing(&config.logging)?;
    info!(command = ?cli.command, "Configuration loaded");

    match cli.command {
        Command::Featurize => {
            batch::featurize(&config)?;
        }
        Command::Split => {
            batch::split(&config)?;
        }
        Command::Encode => {
            batch::encode(&config)?;
        }
        Command::Scale => {
            batch::scale(&config)?;
        }
        Command::Select => {
            batch::select(&config)?;
        }
        Command::Prepare => batch::prepare(&config)?,
        Command::Evaluate { model } => {
            for metrics in evaluate::run(&config, model.as_deref())? {
                println!("Model: {}\n{}", metrics.model, metrics.classification_report());
            }
        }
        Command::Predict { input } => {
            let prediction =
                tokio::task::block_in_place(|| predict::run(&config, input.as_deref()))?;
            println!("{}", serde_json::to_string_pretty(&prediction)?);
        }
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            predict::serve(&config).await?;
        }
        Command::Stream => stream::run(&config).await?,
    }
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let directive = format!("transaction_fraud_detection={}", logging.level)
        .parse::<tracing_subscriber::filter::Directive>()
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(directive);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
