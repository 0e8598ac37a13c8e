//! Throughput and latency statistics for the streaming pipeline.

use crate::error::Stage;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for pipeline performance
pub struct PipelineMetrics {
    /// Total transactions scored
    pub transactions_processed: AtomicU64,
    /// Total alerts generated
    pub alerts_generated: AtomicU64,
    /// Transactions rejected by a pipeline stage or undecodable
    pub transactions_failed: AtomicU64,
    alerts_by_level: RwLock<HashMap<String, u64>>,
    failures_by_stage: RwLock<HashMap<String, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Fraud probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    start_time: Instant,
    /// 1 - std dev of the per-model scores, per transaction
    model_agreements: RwLock<Vec<f64>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_processed: AtomicU64::new(0),
            alerts_generated: AtomicU64::new(0),
            transactions_failed: AtomicU64::new(0),
            alerts_by_level: RwLock::new(HashMap::new()),
            failures_by_stage: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
            model_agreements: RwLock::new(Vec::with_capacity(1000)),
        }
    }

    /// Record a scored transaction
    pub fn record_transaction(&self, processing_time: Duration, probability: Option<f64>) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only the most recent samples
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        if let Some(p) = probability {
            let bucket = (p.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
            if let Ok(mut buckets) = self.score_buckets.write() {
                buckets[bucket] += 1;
            }
        }
    }

    /// Record an alert
    pub fn record_alert(&self, risk_level: &str) {
        self.alerts_generated.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_level) = self.alerts_by_level.write() {
            *by_level.entry(risk_level.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a rejected transaction; `None` means it never reached the pipeline
    pub fn record_failure(&self, stage: Option<Stage>) {
        self.transactions_failed.fetch_add(1, Ordering::Relaxed);

        let key = stage.map_or_else(|| "decode".to_string(), |s| s.to_string());
        if let Ok(mut by_stage) = self.failures_by_stage.write() {
            *by_stage.entry(key).or_insert(0) += 1;
        }
    }

    /// Record model agreement (std dev of scores)
    pub fn record_model_agreement(&self, model_scores: &BTreeMap<String, f64>) {
        if model_scores.len() < 2 {
            return;
        }

        let scores: Vec<f64> = model_scores.values().copied().collect();
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
        let agreement = 1.0 - variance.sqrt().min(1.0);

        if let Ok(mut agreements) = self.model_agreements.write() {
            agreements.push(agreement);
            if agreements.len() > 1000 {
                agreements.drain(0..500);
            }
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted: Vec<u64> = match self.processing_times.read() {
            Ok(times) if !times.is_empty() => times.clone(),
            _ => return ProcessingStats::default(),
        };
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let percentile = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.5),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get average model agreement
    pub fn get_avg_agreement(&self) -> f64 {
        match self.model_agreements.read() {
            Ok(agreements) if !agreements.is_empty() => {
                agreements.iter().sum::<f64>() / agreements.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Get current throughput (transactions per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    pub fn get_alerts_by_level(&self) -> HashMap<String, u64> {
        self.alerts_by_level
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    pub fn get_failures_by_stage(&self) -> HashMap<String, u64> {
        self.failures_by_stage
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let tx_count = self.transactions_processed.load(Ordering::Relaxed);
        let alert_count = self.alerts_generated.load(Ordering::Relaxed);
        let failed = self.transactions_failed.load(Ordering::Relaxed);
        let alert_rate = if tx_count > 0 {
            (alert_count as f64 / tx_count as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let score_dist = self.get_score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║           FRAUD DETECTION PIPELINE - METRICS SUMMARY         ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored:    {:>8}  │  Throughput: {:>6.1} tx/s ║",
            tx_count,
            self.get_throughput()
        );
        info!(
            "║ Alerts Generated:       {:>8}  │  Alert Rate: {:>6.1}%     ║",
            alert_count, alert_rate
        );
        info!("║ Rejected:               {:>8}                              ║", failed);
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!(
            "║ Model Agreement: {:>5.1}% (higher = models agree more)        ║",
            self.get_avg_agreement() * 100.0
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        for (level, count) in &self.get_alerts_by_level() {
            info!("║   alert {:10}: {:>6}                                    ║", level, count);
        }
        for (stage, count) in &self.get_failures_by_stage() {
            info!("║   failed at {:8}: {:>6}                                  ║", stage, count);
        }
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Fraud Probability Distribution:                              ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar: String = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Real-time metrics reporter that prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs.max(1)));
        // the first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_transaction(Duration::from_micros(100), Some(0.5));
        metrics.record_transaction(Duration::from_micros(200), Some(1.0));
        metrics.record_transaction(Duration::from_micros(300), None);
        metrics.record_alert("high");

        assert_eq!(metrics.transactions_processed.load(Ordering::Relaxed), 3);
        assert_eq!(metrics.alerts_generated.load(Ordering::Relaxed), 1);

        let dist = metrics.get_score_distribution();
        assert_eq!(dist[5], 1);
        assert_eq!(dist[9], 1);
        assert_eq!(dist.iter().sum::<u64>(), 2);

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean_us, 200);
        assert_eq!(stats.max_us, 300);
    }

    #[test]
    fn test_failures_by_stage() {
        let metrics = PipelineMetrics::new();
        metrics.record_failure(Some(Stage::Derive));
        metrics.record_failure(Some(Stage::Derive));
        metrics.record_failure(None);

        let by_stage = metrics.get_failures_by_stage();
        assert_eq!(by_stage.get("derive"), Some(&2));
        assert_eq!(by_stage.get("decode"), Some(&1));
        assert_eq!(metrics.transactions_failed.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_model_agreement() {
        let metrics = PipelineMetrics::new();

        let mut scores = BTreeMap::new();
        scores.insert("random_forest".to_string(), 0.8);
        scores.insert("xgboost".to_string(), 0.82);
        metrics.record_model_agreement(&scores);

        assert!(metrics.get_avg_agreement() > 0.9);
    }

    #[test]
    fn test_empty_stats() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.get_processing_stats().count, 0);
        assert_eq!(metrics.get_avg_agreement(), 0.0);
    }
}
