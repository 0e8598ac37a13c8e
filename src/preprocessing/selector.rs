//! Projection onto the versioned set of model input features

use crate::error::{PipelineError, Result};
use crate::frame::select_columns;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Current feature schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Model input features of schema version 1, in model order
pub const FINAL_FEATURES: [&str; 7] = [
    "step",
    "oldbalance_org",
    "newbalance_orig",
    "newbalance_dest",
    "diff_new_old_balance",
    "diff_new_old_destiny",
    "type_TRANSFER",
];

/// Named, ordered list of the columns a trained model expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(version: u32, columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(PipelineError::Config(
                "feature schema must list at least one column".to_string(),
            ));
        }
        Ok(Self { version, columns })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Project `frame` to the schema's columns in schema order.
    ///
    /// A missing column signals drift between the training-time and
    /// serving-time feature sets and is never zero-filled.
    pub fn select(&self, df: &DataFrame) -> Result<DataFrame> {
        select_columns(df, &self.columns).map_err(|e| match e {
            PipelineError::Schema(msg) => {
                PipelineError::Schema(format!("feature schema v{}: {}", self.version, msg))
            }
            other => other,
        })
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            columns: FINAL_FEATURES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{column_names, drop_columns, float_column};

    fn encoded_frame() -> DataFrame {
        let columns = [
            "step",
            "amount",
            "oldbalance_org",
            "newbalance_orig",
            "oldbalance_dest",
            "newbalance_dest",
            "diff_new_old_balance",
            "diff_new_old_destiny",
            "type_PAYMENT",
            "type_TRANSFER",
        ]
        .into_iter()
        .map(|name| float_column(name, vec![0.5]))
        .collect();
        DataFrame::new(columns).unwrap()
    }

    #[test]
    fn test_select_orders_by_schema() {
        let selected = FeatureSchema::default().select(&encoded_frame()).unwrap();
        assert_eq!(column_names(&selected), FINAL_FEATURES.to_vec());
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = drop_columns(&encoded_frame(), &["type_TRANSFER"]).unwrap();
        let err = FeatureSchema::default().select(&df).unwrap_err();

        assert!(matches!(err, PipelineError::Schema(_)));
        assert!(err.to_string().contains("type_TRANSFER"));
        assert!(err.to_string().contains("v1"));
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(FeatureSchema::new(2, Vec::new()).is_err());
    }
}
