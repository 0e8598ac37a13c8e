//! Test Transaction Producer
//!
//! Generates PaySim-style transactions and publishes them to NATS for
//! exercising the streaming pipeline.

use anyhow::Context;
use clap::Parser;
use rand::Rng;
use std::time::Duration;
use tracing::{info, warn};
use transaction_fraud_detection::types::transaction::{RawTransaction, TRANSACTION_TYPES};

#[derive(Parser, Debug)]
#[command(name = "test_producer", about = "Publish synthetic transactions to NATS")]
struct Args {
    #[arg(long, default_value = "nats://localhost:4222")]
    nats_url: String,
    #[arg(long, default_value = "transactions")]
    subject: String,
    /// Number of transactions to publish
    #[arg(short = 'n', long, default_value_t = 100)]
    count: u64,
    /// Share of account-draining transactions
    #[arg(long, default_value_t = 0.1)]
    fraud_rate: f64,
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,
}

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
    step: u32,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
            step: 1,
        }
    }

    fn next_id(&mut self) -> String {
        self.transaction_counter += 1;
        // one simulated hour per 50 transactions
        if self.transaction_counter % 50 == 0 {
            self.step += 1;
        }
        format!("tx_{:012}", self.transaction_counter)
    }

    fn account(&mut self, prefix: char) -> String {
        format!("{}{}", prefix, self.rng.gen_range(1_000_000_000u64..2_000_000_000))
    }

    /// Ordinary transaction with consistent balance movements
    fn generate_legitimate(&mut self) -> RawTransaction {
        let id = self.next_id();
        let tx_type = TRANSACTION_TYPES[self.rng.gen_range(0..TRANSACTION_TYPES.len())];
        let amount = (self.rng.gen_range(10.0..5_000.0_f64) * 100.0).round() / 100.0;
        let old_orig = self.rng.gen_range(0.0..50_000.0_f64).max(amount);

        let (new_orig, dest_prefix) = match tx_type {
            "CASH_IN" => (old_orig + amount, 'C'),
            "PAYMENT" => (old_orig - amount, 'M'),
            _ => (old_orig - amount, 'C'),
        };
        let (old_dest, new_dest) = if dest_prefix == 'M' {
            (0.0, 0.0)
        } else {
            let old = self.rng.gen_range(0.0..100_000.0_f64);
            let new = if tx_type == "CASH_IN" { (old - amount).max(0.0) } else { old + amount };
            (old, new)
        };

        let orig = self.account('C');
        let dest = self.account(dest_prefix);
        let mut tx = RawTransaction::new(self.step, tx_type, amount)
            .with_accounts(orig, dest)
            .with_origin_balances(old_orig, new_orig)
            .with_destination_balances(old_dest, new_dest);
        tx.transaction_id = Some(id);
        tx
    }

    /// Transfer or cash-out that empties the origin account
    fn generate_suspicious(&mut self) -> RawTransaction {
        let id = self.next_id();
        let tx_type = if self.rng.gen_bool(0.5) { "TRANSFER" } else { "CASH_OUT" };
        let balance = (self.rng.gen_range(10_000.0..1_000_000.0_f64) * 100.0).round() / 100.0;

        let orig = self.account('C');
        let dest = self.account('C');
        let mut tx = RawTransaction::new(self.step, tx_type, balance)
            .with_accounts(orig, dest)
            .with_origin_balances(balance, 0.0)
            .with_destination_balances(0.0, 0.0);
        tx.transaction_id = Some(id);
        tx
    }

    fn generate(&mut self, fraud_rate: f64) -> (RawTransaction, bool) {
        if self.rng.gen_bool(fraud_rate) {
            (self.generate_suspicious(), true)
        } else {
            (self.generate_legitimate(), false)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_producer=info".parse()?),
        )
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.fraud_rate),
        "fraud rate must be within [0, 1]"
    );
    info!(
        nats_url = %args.nats_url,
        subject = %args.subject,
        count = args.count,
        fraud_rate = args.fraud_rate,
        delay_ms = args.delay_ms,
        "Starting Test Transaction Producer"
    );

    let client = match async_nats::connect(&args.nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(&args).await;
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut legitimate_count = 0;
    let mut suspicious_count = 0;

    for i in 0..args.count {
        let (transaction, suspicious) = generator.generate(args.fraud_rate);
        if suspicious {
            suspicious_count += 1;
        } else {
            legitimate_count += 1;
        }

        let payload = serde_json::to_vec(&transaction)?;
        client
            .publish(args.subject.clone(), payload.into())
            .await
            .context("Failed to publish transaction")?;

        if (i + 1) % 10 == 0 {
            info!(
                published = i + 1,
                total = args.count,
                legitimate = legitimate_count,
                suspicious = suspicious_count,
                "Progress"
            );
        }

        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }

    client.flush().await.context("Failed to flush NATS client")?;
    info!(
        legitimate = legitimate_count,
        suspicious = suspicious_count,
        "Completed! Published {} transactions",
        args.count
    );
    Ok(())
}

async fn run_dry_mode(args: &Args) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    for i in 0..args.count {
        let (transaction, _) = generator.generate(args.fraud_rate);
        let json = serde_json::to_string_pretty(&transaction)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(args.delay_ms)).await;
    }
    Ok(())
}
