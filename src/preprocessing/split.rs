//! Stratified train / validation / test partitioning

use crate::error::{PipelineError, Result};
use crate::frame::{drop_columns, has_column, numeric_values, take_rows};
use polars::prelude::DataFrame;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Partitioning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of all rows held out as the test partition
    pub test_size: f64,
    /// Fraction of the remaining rows held out as the validation partition
    pub valid_size: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            valid_size: 0.2,
            seed: 42,
        }
    }
}

/// Features and labels of the three partitions
#[derive(Debug, Clone)]
pub struct SplitDataset {
    pub x_train: DataFrame,
    pub x_valid: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Vec<u8>,
    pub y_valid: Vec<u8>,
    pub y_test: Vec<u8>,
}

/// Read a binary label column, rejecting anything but 0/1
pub fn binary_labels(df: &DataFrame, label: &str) -> Result<Vec<u8>> {
    if !has_column(df, label) {
        return Err(PipelineError::Validation(format!(
            "missing label column '{}'",
            label
        )));
    }
    let non_binary =
        || PipelineError::Validation(format!("'{}' column contains non-binary values", label));

    numeric_values(df, label)
        .map_err(|_| non_binary())?
        .into_iter()
        .map(|v| {
            if v == 0.0 {
                Ok(0)
            } else if v == 1.0 {
                Ok(1)
            } else {
                Err(non_binary())
            }
        })
        .collect()
}

/// Split row indices into (kept, held out), preserving class proportions.
///
/// Each class contributes `round(n_class * holdout)` rows to the held-out
/// side. Both sides are shuffled with the seeded generator.
pub fn stratified_indices(
    labels: &[u8],
    rows: &[usize],
    holdout: f64,
    rng: &mut ChaCha8Rng,
) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(holdout > 0.0 && holdout < 1.0) {
        return Err(PipelineError::Config(format!(
            "holdout fraction must be in (0, 1), got {}",
            holdout
        )));
    }

    let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
    for &row in rows {
        by_class.entry(labels[row]).or_default().push(row);
    }

    let mut kept = Vec::new();
    let mut held_out = Vec::new();
    for indices in by_class.values_mut() {
        indices.shuffle(rng);
        let n_holdout = (indices.len() as f64 * holdout).round() as usize;
        held_out.extend_from_slice(&indices[..n_holdout]);
        kept.extend_from_slice(&indices[n_holdout..]);
    }

    if kept.is_empty() || held_out.is_empty() {
        return Err(PipelineError::Validation(format!(
            "stratified split of {} rows left an empty partition",
            rows.len()
        )));
    }

    kept.shuffle(rng);
    held_out.shuffle(rng);
    Ok((kept, held_out))
}

/// Two-stage stratified split: test first, then validation out of the rest.
///
/// `drop` lists columns removed from the feature frames (the label is always
/// removed).
pub fn split_dataset(
    df: &DataFrame,
    label: &str,
    drop: &[&str],
    config: &SplitConfig,
) -> Result<SplitDataset> {
    let labels = binary_labels(df, label)?;
    let mut dropped: Vec<&str> = drop.to_vec();
    dropped.push(label);
    let features = drop_columns(df, &dropped)?;

    if features.width() == 0 || features.height() == 0 {
        return Err(PipelineError::Validation(
            "no valid data remaining after cleaning".to_string(),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let all: Vec<usize> = (0..labels.len()).collect();
    let (temp, test) = stratified_indices(&labels, &all, config.test_size, &mut rng)?;
    let (train, valid) = stratified_indices(&labels, &temp, config.valid_size, &mut rng)?;

    debug!(
        train = train.len(),
        valid = valid.len(),
        test = test.len(),
        "Stratified split computed"
    );

    let pick = |rows: &[usize]| rows.iter().map(|&i| labels[i]).collect::<Vec<u8>>();

    Ok(SplitDataset {
        x_train: take_rows(&features, &train)?,
        x_valid: take_rows(&features, &valid)?,
        x_test: take_rows(&features, &test)?,
        y_train: pick(&train),
        y_valid: pick(&valid),
        y_test: pick(&test),
    })
}

/// Share of positive labels
pub fn positive_rate(labels: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    labels.iter().filter(|&&l| l == 1).count() as f64 / labels.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::float_column;
    use polars::prelude::*;

    fn dataset(n: usize, positives: usize) -> DataFrame {
        let labels: Vec<i64> = (0..n).map(|i| i64::from(i < positives)).collect();
        DataFrame::new(vec![
            float_column("step", (0..n).map(|i| i as f64).collect()),
            Series::new("name_orig".into(), vec!["C"; n]).into(),
            Series::new("is_fraud".into(), labels).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_partitions_are_disjoint_and_complete() {
        let config = SplitConfig::default();
        let data = split_dataset(&dataset(100, 10), "is_fraud", &["name_orig"], &config).unwrap();

        let mut steps: Vec<f64> = [&data.x_train, &data.x_valid, &data.x_test]
            .iter()
            .flat_map(|df| numeric_values(df, "step").unwrap())
            .collect();
        steps.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(steps, (0..100).map(|i| i as f64).collect::<Vec<_>>());

        assert_eq!(data.x_test.height(), 20);
        assert_eq!(data.x_valid.height(), 16);
        assert_eq!(data.x_train.height(), 64);
        assert!(!has_column(&data.x_train, "name_orig"));
        assert!(!has_column(&data.x_train, "is_fraud"));
    }

    #[test]
    fn test_class_ratio_preserved() {
        let config = SplitConfig::default();
        let data = split_dataset(&dataset(200, 20), "is_fraud", &[], &config).unwrap();

        for (labels, n) in [(&data.y_train, 128.0), (&data.y_valid, 32.0), (&data.y_test, 40.0)] {
            let positives = labels.iter().filter(|&&l| l == 1).count() as f64;
            assert_eq!(labels.len() as f64, n);
            assert!((positives - 0.1 * n).abs() <= 1.0, "{} positives in {}", positives, n);
        }
    }

    #[test]
    fn test_same_seed_same_split() {
        let config = SplitConfig::default();
        let a = split_dataset(&dataset(50, 5), "is_fraud", &[], &config).unwrap();
        let b = split_dataset(&dataset(50, 5), "is_fraud", &[], &config).unwrap();
        assert!(a.x_test.equals(&b.x_test));
        assert_eq!(a.y_train, b.y_train);
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let mut df = dataset(10, 2);
        df.with_column(Series::new("is_fraud".into(), &[0i64, 1, 2, 0, 0, 0, 0, 0, 0, 0]))
            .unwrap();

        let err = split_dataset(&df, "is_fraud", &[], &SplitConfig::default()).unwrap_err();
        assert!(err.to_string().contains("non-binary"));
    }

    #[test]
    fn test_tiny_dataset_reports_empty_partition() {
        let err =
            split_dataset(&dataset(2, 1), "is_fraud", &[], &SplitConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_positive_rate() {
        assert_eq!(positive_rate(&[0, 1, 1, 0]), 0.5);
        assert_eq!(positive_rate(&[]), 0.0);
    }
}
