//! Model evaluation on a held-out partition

use crate::artifacts::write_json;
use crate::error::{PipelineError, Result, Stage};
use crate::frame::to_feature_rows;
use crate::models::FraudModel;
use crate::preprocessing::FeatureSchema;
use crate::types::prediction::FraudClass;
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::info;

pub const METRICS_FILE: &str = "evaluation_metrics.json";
pub const REPORT_FILE: &str = "classification_report.txt";

/// Binary confusion matrix, positive class = fraud
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub true_positive: u64,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        y_true
            .iter()
            .zip(y_pred)
            .fold(Self::default(), |mut m, (&t, &p)| {
                match (t, p) {
                    (1, 1) => m.true_positive += 1,
                    (1, _) => m.false_negative += 1,
                    (_, 1) => m.false_positive += 1,
                    _ => m.true_negative += 1,
                }
                m
            })
    }

    pub fn total(&self) -> u64 {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    /// Precision, recall, F1 and support of one class (0 or 1)
    pub fn class_metrics(&self, class: u8) -> ClassMetrics {
        let (tp, fp, fn_) = if class == 1 {
            (self.true_positive, self.false_positive, self.false_negative)
        } else {
            (self.true_negative, self.false_negative, self.false_positive)
        };

        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        ClassMetrics {
            precision,
            recall,
            f1,
            support: tp + fn_,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

/// Evaluation summary persisted as `evaluation_metrics.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub accuracy: f64,
    /// Precision of the fraud class; 0 when nothing was predicted as fraud
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` without probabilities or when only one class is present
    pub roc_auc: Option<f64>,
    pub confusion_matrix: ConfusionMatrix,
}

impl EvaluationMetrics {
    /// Compute the metrics from true labels, predicted labels and, when the
    /// model exposes them, fraud probabilities.
    pub fn compute(
        model: &str,
        y_true: &[u8],
        y_pred: &[u8],
        y_score: Option<&[f64]>,
    ) -> Result<Self> {
        if y_true.is_empty() {
            return Err(PipelineError::Validation(
                "cannot evaluate on an empty partition".to_string(),
            ));
        }
        if y_true.len() != y_pred.len() || y_score.map_or(false, |s| s.len() != y_true.len()) {
            return Err(PipelineError::Validation(format!(
                "label count {} does not match prediction count {}",
                y_true.len(),
                y_pred.len()
            )));
        }

        let matrix = ConfusionMatrix::from_labels(y_true, y_pred);
        let fraud = matrix.class_metrics(1);

        Ok(Self {
            timestamp: Utc::now(),
            model: model.to_string(),
            accuracy: ratio(matrix.true_positive + matrix.true_negative, matrix.total()),
            precision: fraud.precision,
            recall: fraud.recall,
            f1: fraud.f1,
            roc_auc: y_score.and_then(|scores| roc_auc(y_true, scores)),
            confusion_matrix: matrix,
        })
    }

    /// Text report with per-class, macro and weighted averages
    pub fn classification_report(&self) -> String {
        let m = &self.confusion_matrix;
        let classes = [m.class_metrics(0), m.class_metrics(1)];
        let total = m.total();

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>12} {:>9} {:>9} {:>9} {:>9}\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for (label, c) in classes.iter().enumerate() {
            let _ = writeln!(
                out,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                label, c.precision, c.recall, c.f1, c.support
            );
        }
        out.push('\n');
        let _ = writeln!(
            out,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, total
        );

        let weighted_total = total.max(1) as f64;
        let rows = [
            ("macro avg", [0.5, 0.5]),
            (
                "weighted avg",
                [
                    classes[0].support as f64 / weighted_total,
                    classes[1].support as f64 / weighted_total,
                ],
            ),
        ];
        for (name, weights) in rows {
            let avg = |f: fn(&ClassMetrics) -> f64| {
                classes.iter().zip(weights).map(|(c, w)| f(c) * w).sum::<f64>()
            };
            let _ = writeln!(
                out,
                "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name,
                avg(|c| c.precision),
                avg(|c| c.recall),
                avg(|c| c.f1),
                total
            );
        }
        out
    }

    /// Write `evaluation_metrics.json` and `classification_report.txt` into `dir`
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        write_json(dir.join(METRICS_FILE), self)?;
        let report_path = dir.join(REPORT_FILE);
        fs::write(&report_path, self.classification_report())
            .map_err(|e| PipelineError::io(&report_path, e))?;
        info!(dir = %dir.display(), model = %self.model, "Evaluation results saved");
        Ok(())
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged.
///
/// `None` when only one class is present.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let positives = y_true.iter().filter(|&&y| y == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        rank_sum += order[i..=j]
            .iter()
            .filter(|&&idx| y_true[idx] == 1)
            .count() as f64
            * mean_rank;
        i = j + 1;
    }

    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// Score a prepared feature frame, returning predicted labels and the
/// fraud probabilities when every output carried one.
pub fn score_frame(
    model: &dyn FraudModel,
    schema: &FeatureSchema,
    features: &DataFrame,
    threshold: f64,
) -> Result<(Vec<u8>, Option<Vec<f64>>)> {
    let rows = schema
        .select(features)
        .and_then(|selected| to_feature_rows(&selected))
        .map_err(|e| e.in_stage(Stage::Select))?;
    let outputs = model
        .score_batch(&rows)
        .map_err(|e| e.in_stage(Stage::Predict))?;

    let probabilities: Option<Vec<f64>> = outputs.iter().map(|o| o.probability).collect();
    let labels = outputs
        .iter()
        .map(|o| match (o.probability, o.label) {
            (Some(p), _) => Ok(FraudClass::from(p >= threshold).label()),
            (None, Some(label)) => Ok(FraudClass::from(label).label()),
            (None, None) => Err(PipelineError::Model(
                "model returned neither a probability nor a label".to_string(),
            )
            .in_stage(Stage::Predict)),
        })
        .collect::<Result<Vec<u8>>>()?;

    Ok((labels, probabilities))
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
