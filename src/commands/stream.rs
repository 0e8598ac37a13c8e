//! Consume transactions from NATS, score them and publish fraud alerts.
//!
//! Processing runs in parallel, bounded by `pipeline.workers`.

use crate::config::AppConfig;
use crate::consumer::{decode_transaction, TransactionConsumer};
use crate::metrics::{MetricsReporter, PipelineMetrics};
use crate::pipeline::FraudPipeline;
use crate::producer::AlertProducer;
use crate::types::alert::FraudAlert;
use anyhow::{Context, Result};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

pub async fn run(config: &AppConfig) -> Result<()> {
    info!(
        threshold = config.detection.threshold,
        medium = config.detection.risk_levels.medium,
        high = config.detection.risk_levels.high,
        critical = config.detection.risk_levels.critical,
        "Starting streaming fraud detection"
    );

    let pipeline = Arc::new(super::load_pipeline(config)?);
    let metrics = Arc::new(PipelineMetrics::new());

    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = TransactionConsumer::new(client.clone(), &config.nats.transaction_subject)
        .with_queue_group(config.nats.queue_group.clone());
    let producer = Arc::new(AlertProducer::new(client.clone(), &config.nats.alert_subject));

    let num_workers = config.pipeline.workers;
    let worker_permits = u32::try_from(num_workers)
        .with_context(|| format!("pipeline.workers = {} is too large", num_workers))?;
    info!(
        workers = num_workers,
        subject = %consumer.subject(),
        alerts = %producer.subject(),
        "Starting transaction processing loop"
    );

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.report_interval_secs);
    let reporter_handle = tokio::spawn(reporter.start());

    let mut subscription = consumer.subscribe().await?;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let message = tokio::select! {
            message = subscription.next() => match message {
                Some(message) => message,
                None => break,
            },
            _ = &mut shutdown => {
                info!("Shutdown signal received, draining in-flight transactions");
                break;
            }
        };

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .context("Worker semaphore closed")?;

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let _permit = permit;

            if let Some(alert) = process_payload(&pipeline, &metrics, &message.payload) {
                if let Err(e) = producer.publish(&alert).await {
                    error!(
                        transaction_id = %alert.transaction_id,
                        error = %e,
                        "Failed to publish fraud alert"
                    );
                } else {
                    info!(
                        transaction_id = %alert.transaction_id,
                        fraud_probability = ?alert.fraud_probability,
                        risk_level = ?alert.risk_level,
                        "Fraud alert published"
                    );
                }
            }

            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
            if count % 100 == 0 {
                let processing_stats = metrics.get_processing_stats();
                info!(
                    processed = count,
                    throughput = format!("{:.1} tx/s", metrics.get_throughput()),
                    avg_latency_us = processing_stats.mean_us,
                    "Processing milestone"
                );
            }
        });
    }

    // wait for in-flight transactions before the final summary
    match semaphore.acquire_many(worker_permits).await {
        Ok(_drained) => debug!("In-flight transactions drained"),
        Err(e) => error!(error = %e, "Worker semaphore closed before draining"),
    }
    reporter_handle.abort();

    info!("Pipeline shutting down...");
    metrics.print_summary();
    Ok(())
}

/// Decode and score one message, recording the outcome in `metrics`.
///
/// Returns the alert to publish when the transaction is classified as fraud.
pub fn process_payload(
    pipeline: &FraudPipeline,
    metrics: &PipelineMetrics,
    payload: &[u8],
) -> Option<FraudAlert> {
    let start_time = Instant::now();

    let transaction = match decode_transaction(payload) {
        Ok(transaction) => transaction,
        Err(e) => {
            metrics.record_failure(None);
            warn!(error = %e, "Failed to deserialize transaction");
            return None;
        }
    };
    let tx_id = transaction.transaction_id.clone().unwrap_or_default();

    let prediction = match pipeline.predict(&transaction) {
        Ok(prediction) => prediction,
        Err(e) => {
            metrics.record_failure(e.stage());
            error!(
                transaction_id = %tx_id,
                stage = ?e.stage(),
                error = %e,
                "Transaction rejected by the pipeline"
            );
            return None;
        }
    };

    let processing_time = start_time.elapsed();
    metrics.record_transaction(processing_time, prediction.fraud_probability);
    metrics.record_model_agreement(&prediction.model_scores);

    if !prediction.is_fraud() {
        debug!(
            transaction_id = %tx_id,
            fraud_probability = ?prediction.fraud_probability,
            processing_time_us = processing_time.as_micros() as u64,
            "Transaction processed (not fraud)"
        );
        return None;
    }

    let alert = FraudAlert::from_prediction(&transaction, &prediction);
    metrics.record_alert(alert.risk_level.map_or("unknown", |level| level.as_str()));
    Some(alert)
}
