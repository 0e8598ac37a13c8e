//! Min-max scaling of numerical columns

use crate::error::{PipelineError, Result};
use crate::frame::{float_column, has_column, is_categorical, numeric_values};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Numerical columns min-max scaled by default. `step` is an hour index and
/// reaches the model unscaled.
pub const NUMERIC_COLUMNS: [&str; 7] = [
    "amount",
    "oldbalance_org",
    "newbalance_orig",
    "oldbalance_dest",
    "newbalance_dest",
    "diff_new_old_balance",
    "diff_new_old_destiny",
];

/// Training-time range of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRange {
    pub column: String,
    pub min: f64,
    pub max: f64,
}

impl ColumnRange {
    /// `max == min`: every training value was identical
    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    /// Divisor used by [`scale`](Self::scale). A degenerate range divides by
    /// one, so values are shifted by `min` and never divided by zero.
    fn span(&self) -> f64 {
        if self.is_degenerate() {
            1.0
        } else {
            self.max - self.min
        }
    }

    /// `(x - min) / (max - min)`; values outside the training range are not clipped
    pub fn scale(&self, x: f64) -> f64 {
        (x - self.min) / self.span()
    }

    pub fn unscale(&self, x: f64) -> f64 {
        x * self.span() + self.min
    }
}

/// Fitted min-max ranges, learned on the training partition only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingState {
    pub ranges: Vec<ColumnRange>,
}

impl ScalingState {
    /// Compute per-column min/max. Every listed column must be present and numeric.
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let missing: Vec<&str> = columns
            .iter()
            .filter(|c| !has_column(df, c))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Config(format!(
                "missing numerical column(s): {}",
                missing.join(", ")
            )));
        }
        if df.height() == 0 {
            return Err(PipelineError::Config(
                "cannot fit scaler on an empty partition".to_string(),
            ));
        }

        let ranges = columns
            .iter()
            .map(|name| {
                if is_categorical(df, name) {
                    return Err(PipelineError::Config(format!(
                        "column '{}' is not numeric",
                        name
                    )));
                }
                let values = numeric_values(df, name)?;

                let (min, max) = values
                    .iter()
                    .filter(|v| v.is_finite())
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                if min > max {
                    return Err(PipelineError::Config(format!(
                        "column '{}' has no finite values",
                        name
                    )));
                }

                Ok(ColumnRange {
                    column: name.clone(),
                    min,
                    max,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { ranges })
    }

    /// Scale the fitted columns with the training ranges.
    /// A fitted column missing from `df` is a schema mismatch.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.apply(df, ColumnRange::scale)
    }

    /// Map scaled values back to their original units
    pub fn inverse_transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.apply(df, ColumnRange::unscale)
    }

    pub fn columns(&self) -> Vec<&str> {
        self.ranges.iter().map(|r| r.column.as_str()).collect()
    }

    pub fn range(&self, column: &str) -> Option<&ColumnRange> {
        self.ranges.iter().find(|r| r.column == column)
    }

    /// Build every replacement column first, then swap them in place
    fn apply(&self, df: &DataFrame, f: fn(&ColumnRange, f64) -> f64) -> Result<DataFrame> {
        let replacements = self
            .ranges
            .iter()
            .map(|range| {
                if !has_column(df, &range.column) {
                    return Err(PipelineError::Schema(format!(
                        "missing scaled column '{}'",
                        range.column
                    )));
                }
                let values = numeric_values(df, &range.column)?;
                let scaled = values.into_iter().map(|v| f(range, v)).collect();
                Ok(float_column(&range.column, scaled))
            })
            .collect::<Result<Vec<Column>>>()?;

        let mut out = df.clone();
        for column in replacements {
            out.with_column(column)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::drop_columns;

    fn frame(amount: Vec<f64>, flat: Vec<f64>) -> DataFrame {
        DataFrame::new(vec![float_column("amount", amount), float_column("flat", flat)]).unwrap()
    }

    fn values(df: &DataFrame, name: &str) -> Vec<f64> {
        numeric_values(df, name).unwrap()
    }

    fn columns() -> Vec<String> {
        vec!["amount".to_string(), "flat".to_string()]
    }

    #[test]
    fn test_training_rows_map_into_unit_interval() {
        let train = frame(vec![-1000.0, 0.0, 250.0, 1000.0], vec![3.0; 4]);
        let state = ScalingState::fit(&train, &columns()).unwrap();
        let scaled = state.transform(&train).unwrap();

        for name in columns() {
            for v in values(&scaled, &name) {
                assert!((0.0..=1.0).contains(&v), "{} = {}", name, v);
            }
        }
        assert_eq!(values(&scaled, "amount"), vec![0.0, 0.5, 0.625, 1.0]);
    }

    #[test]
    fn test_degenerate_range_never_divides_by_zero() {
        let train = frame(vec![1.0, 2.0], vec![5.0, 5.0]);
        let state = ScalingState::fit(&train, &columns()).unwrap();
        assert!(state.range("flat").unwrap().is_degenerate());

        let scaled = state.transform(&frame(vec![1.0, 2.0], vec![5.0, 7.0])).unwrap();
        assert_eq!(values(&scaled, "flat"), vec![0.0, 2.0]);
    }

    #[test]
    fn test_transform_uses_training_range() {
        let train = frame(vec![0.0, 100.0], vec![0.0, 1.0]);
        let state = ScalingState::fit(&train, &columns()).unwrap();

        let test = frame(vec![50.0, 200.0], vec![0.0, 1.0]);
        let scaled = state.transform(&test).unwrap();
        assert_eq!(values(&scaled, "amount"), vec![0.5, 2.0]);
    }

    #[test]
    fn test_unscaled_columns_pass_through() {
        let train = DataFrame::new(vec![
            Series::new("step".into(), &[1i64, 743]).into(),
            float_column("amount", vec![0.0, 10.0]),
        ])
        .unwrap();
        let state = ScalingState::fit(&train, &["amount".to_string()]).unwrap();

        let scaled = state.transform(&train).unwrap();
        assert_eq!(values(&scaled, "step"), vec![1.0, 743.0]);
        assert_eq!(values(&scaled, "amount"), vec![0.0, 1.0]);
    }

    #[test]
    fn test_default_columns_leave_step_unscaled() {
        assert!(!NUMERIC_COLUMNS.contains(&"step"));
    }

    #[test]
    fn test_fit_missing_column_is_config_error() {
        let train = frame(vec![0.0], vec![0.0]);
        let err = ScalingState::fit(&train, &["balance".to_string()]).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_fit_categorical_column_is_config_error() {
        let train = DataFrame::new(vec![Series::new("type".into(), &["TRANSFER"]).into()]).unwrap();
        let err = ScalingState::fit(&train, &["type".to_string()]).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_transform_missing_column_is_schema_error() {
        let train = frame(vec![0.0, 1.0], vec![0.0, 1.0]);
        let state = ScalingState::fit(&train, &columns()).unwrap();

        let err = state
            .transform(&drop_columns(&train, &["flat"]).unwrap())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_inverse_transform() {
        let train = frame(vec![10.0, 30.0], vec![2.0, 2.0]);
        let state = ScalingState::fit(&train, &columns()).unwrap();
        let restored = state
            .inverse_transform(&state.transform(&train).unwrap())
            .unwrap();
        assert!(restored.equals(&train));
    }
}
