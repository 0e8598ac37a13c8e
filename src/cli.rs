//! Command line interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "fraud-pipeline",
    version,
    about = "Transaction fraud detection: feature pipeline, evaluation and serving"
)]
pub struct Cli {
    /// Configuration file (defaults to config/config.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Derive engineered features from the raw transaction CSV
    Featurize,
    /// Stratified train / validation / test split of the featured data
    Split,
    /// Fit the one-hot encoder on the training split and encode all splits
    Encode,
    /// Fit the min-max scaler on the encoded training split and scale all splits
    Scale,
    /// Keep the model input columns and write the feature schema
    Select,
    /// Run featurize, split, encode, scale and select in order
    Prepare,
    /// Score the test split and write metrics per model
    Evaluate {
        /// Evaluate only this configured model
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Classify one JSON transaction read from a file or stdin
    Predict {
        /// JSON file with a single transaction; stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Serve the interactive prediction form
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Score transactions from NATS and publish fraud alerts
    Stream,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_config() {
        let cli = Cli::parse_from(["fraud-pipeline", "serve", "--port", "9000", "-c", "alt.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        match cli.command {
            Command::Serve { host, port } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
