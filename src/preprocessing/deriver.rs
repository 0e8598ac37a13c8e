//! Feature derivation for raw transactions.
//!
//! Adds balance deltas, time-unit conversions and the account-kind reduction
//! of account ids. Pure per-row arithmetic, nothing is fitted here.

use crate::error::{PipelineError, Result};
use crate::frame::float_column;
use crate::types::transaction::RawTransaction;
use polars::prelude::*;

/// Label column of the training data
pub const LABEL_COLUMN: &str = "is_fraud";

/// Columns handed to the encoder/scaler, in order
pub const MODEL_INPUT_COLUMNS: [&str; 9] = [
    "step",
    "type",
    "amount",
    "oldbalance_org",
    "newbalance_orig",
    "oldbalance_dest",
    "newbalance_dest",
    "diff_new_old_balance",
    "diff_new_old_destiny",
];

/// Columns of the featured dataset that never reach the model
pub const NON_FEATURE_COLUMNS: [&str; 6] = [
    "is_fraud",
    "is_flagged_fraud",
    "name_orig",
    "name_dest",
    "step_weeks",
    "step_days",
];

/// A raw transaction plus its derived columns
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTransaction {
    pub step: u32,
    pub tx_type: String,
    pub amount: f64,
    /// Leading character of `name_orig`, if an id was supplied
    pub origin_kind: Option<char>,
    pub oldbalance_org: f64,
    pub newbalance_orig: f64,
    /// Leading character of `name_dest`, if an id was supplied
    pub destination_kind: Option<char>,
    pub oldbalance_dest: f64,
    pub newbalance_dest: f64,
    pub is_fraud: Option<i64>,
    pub is_flagged_fraud: Option<i64>,
    pub step_days: f64,
    pub step_weeks: f64,
    pub diff_new_old_balance: f64,
    pub diff_new_old_destiny: f64,
}

/// Derives engineered columns from raw transactions
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureDeriver;

impl FeatureDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Derive the engineered columns of a single transaction
    pub fn derive(&self, tx: &RawTransaction) -> Result<DerivedTransaction> {
        if tx.tx_type.trim().is_empty() {
            return Err(PipelineError::Validation(
                "transaction type must not be empty".to_string(),
            ));
        }

        let amount = non_negative("amount", tx.amount)?;
        let oldbalance_org = non_negative("oldbalance_org", tx.oldbalance_org)?;
        let newbalance_orig = non_negative("newbalance_orig", tx.newbalance_orig)?;
        let oldbalance_dest = non_negative("oldbalance_dest", tx.oldbalance_dest)?;
        let newbalance_dest = non_negative("newbalance_dest", tx.newbalance_dest)?;

        let step = f64::from(tx.step);

        Ok(DerivedTransaction {
            step: tx.step,
            tx_type: tx.tx_type.trim().to_string(),
            amount,
            origin_kind: account_kind("name_orig", tx.name_orig.as_deref())?,
            oldbalance_org,
            newbalance_orig,
            destination_kind: account_kind("name_dest", tx.name_dest.as_deref())?,
            oldbalance_dest,
            newbalance_dest,
            is_fraud: tx.is_fraud,
            is_flagged_fraud: tx.is_flagged_fraud,
            step_days: step / 24.0,
            step_weeks: step / (24.0 * 7.0),
            diff_new_old_balance: newbalance_orig - oldbalance_org,
            diff_new_old_destiny: newbalance_dest - oldbalance_dest,
        })
    }

    /// Derive every row, failing on the first invalid one
    pub fn derive_batch(&self, txs: &[RawTransaction]) -> Result<Vec<DerivedTransaction>> {
        txs.iter()
            .enumerate()
            .map(|(row, tx)| {
                self.derive(tx).map_err(|e| match e {
                    PipelineError::Validation(msg) => {
                        PipelineError::Validation(format!("row {}: {}", row, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Frame of the columns the model-side stages consume
    /// (see [`MODEL_INPUT_COLUMNS`]).
    pub fn model_frame(&self, rows: &[DerivedTransaction]) -> Result<DataFrame> {
        Ok(DataFrame::new(vec![
            steps(rows),
            types(rows),
            numeric(rows, "amount", |r| r.amount),
            numeric(rows, "oldbalance_org", |r| r.oldbalance_org),
            numeric(rows, "newbalance_orig", |r| r.newbalance_orig),
            numeric(rows, "oldbalance_dest", |r| r.oldbalance_dest),
            numeric(rows, "newbalance_dest", |r| r.newbalance_dest),
            numeric(rows, "diff_new_old_balance", |r| r.diff_new_old_balance),
            numeric(rows, "diff_new_old_destiny", |r| r.diff_new_old_destiny),
        ])?)
    }

    /// Full featured dataset: every raw column plus the derived ones.
    ///
    /// Account ids are required here. Each label column is written when the
    /// first row carries it and must then be present on every row.
    pub fn featured_frame(&self, rows: &[DerivedTransaction]) -> Result<DataFrame> {
        let mut columns = vec![
            steps(rows),
            types(rows),
            numeric(rows, "amount", |r| r.amount),
            account_kinds(rows, "name_orig", |r| r.origin_kind)?,
            numeric(rows, "oldbalance_org", |r| r.oldbalance_org),
            numeric(rows, "newbalance_orig", |r| r.newbalance_orig),
            account_kinds(rows, "name_dest", |r| r.destination_kind)?,
            numeric(rows, "oldbalance_dest", |r| r.oldbalance_dest),
            numeric(rows, "newbalance_dest", |r| r.newbalance_dest),
        ];

        let first = rows.first();
        if first.map_or(false, |r| r.is_fraud.is_some()) {
            columns.push(labels(rows, "is_fraud", |r| r.is_fraud)?);
        }
        if first.map_or(false, |r| r.is_flagged_fraud.is_some()) {
            columns.push(labels(rows, "is_flagged_fraud", |r| r.is_flagged_fraud)?);
        }

        columns.extend([
            numeric(rows, "step_days", |r| r.step_days),
            numeric(rows, "step_weeks", |r| r.step_weeks),
            numeric(rows, "diff_new_old_balance", |r| r.diff_new_old_balance),
            numeric(rows, "diff_new_old_destiny", |r| r.diff_new_old_destiny),
        ]);
        Ok(DataFrame::new(columns)?)
    }
}

fn steps(rows: &[DerivedTransaction]) -> Column {
    let values: Vec<i64> = rows.iter().map(|r| i64::from(r.step)).collect();
    Series::new("step".into(), values).into()
}

fn types(rows: &[DerivedTransaction]) -> Column {
    let values: Vec<&str> = rows.iter().map(|r| r.tx_type.as_str()).collect();
    Series::new("type".into(), values).into()
}

fn numeric(
    rows: &[DerivedTransaction],
    name: &str,
    pick: impl Fn(&DerivedTransaction) -> f64,
) -> Column {
    float_column(name, rows.iter().map(pick).collect())
}

fn account_kinds(
    rows: &[DerivedTransaction],
    field: &str,
    pick: fn(&DerivedTransaction) -> Option<char>,
) -> Result<Column> {
    let values = rows
        .iter()
        .enumerate()
        .map(|(row, r)| {
            pick(r).map(String::from).ok_or_else(|| {
                PipelineError::Validation(format!("row {}: missing {}", row, field))
            })
        })
        .collect::<Result<Vec<String>>>()?;
    Ok(Series::new(field.into(), values).into())
}

fn labels(
    rows: &[DerivedTransaction],
    field: &str,
    pick: fn(&DerivedTransaction) -> Option<i64>,
) -> Result<Column> {
    let values = rows
        .iter()
        .enumerate()
        .map(|(row, r)| {
            pick(r).ok_or_else(|| {
                PipelineError::Validation(format!("row {}: missing {}", row, field))
            })
        })
        .collect::<Result<Vec<i64>>>()?;
    Ok(Series::new(field.into(), values).into())
}

fn non_negative(field: &str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(PipelineError::Validation(format!(
            "{} must be a non-negative number, got {}",
            field, value
        )))
    }
}

/// Reduce an account id to its leading character (`C`ustomer, `M`erchant)
fn account_kind(field: &str, id: Option<&str>) -> Result<Option<char>> {
    match id {
        None => Ok(None),
        Some(id) => id.trim().chars().next().map(Some).ok_or_else(|| {
            PipelineError::Validation(format!("{} must not be empty", field))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{column_names, has_column, numeric_values};

    fn transfer() -> RawTransaction {
        RawTransaction::new(1, "TRANSFER", 1000.0)
            .with_origin_balances(1000.0, 0.0)
            .with_destination_balances(0.0, 1000.0)
    }

    #[test]
    fn test_balance_deltas() {
        let derived = FeatureDeriver::new().derive(&transfer()).unwrap();

        assert_eq!(derived.diff_new_old_balance, -1000.0);
        assert_eq!(derived.diff_new_old_destiny, 1000.0);
    }

    #[test]
    fn test_time_units() {
        let tx = RawTransaction::new(336, "PAYMENT", 10.0);
        let derived = FeatureDeriver::new().derive(&tx).unwrap();

        assert_eq!(derived.step_days, 14.0);
        assert_eq!(derived.step_weeks, 2.0);
    }

    #[test]
    fn test_account_kind_is_leading_character() {
        let tx = transfer().with_accounts("C1231006815", "M1979787155");
        let derived = FeatureDeriver::new().derive(&tx).unwrap();

        assert_eq!(derived.origin_kind, Some('C'));
        assert_eq!(derived.destination_kind, Some('M'));
    }

    #[test]
    fn test_empty_account_id_fails_fast() {
        let tx = transfer().with_accounts("", "M1979787155");
        let err = FeatureDeriver::new().derive(&tx).unwrap_err();

        assert!(matches!(err, PipelineError::Validation(_)));
        assert!(err.to_string().contains("name_orig"));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let tx = RawTransaction::new(1, "PAYMENT", -5.0);
        assert!(FeatureDeriver::new().derive(&tx).is_err());

        let tx = RawTransaction::new(1, "PAYMENT", f64::NAN);
        assert!(FeatureDeriver::new().derive(&tx).is_err());
    }

    #[test]
    fn test_batch_error_names_row() {
        let rows = vec![transfer(), transfer().with_accounts("C1", " ")];
        let err = FeatureDeriver::new().derive_batch(&rows).unwrap_err();

        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_model_frame_columns() {
        let deriver = FeatureDeriver::new();
        let derived = deriver.derive_batch(&[transfer()]).unwrap();
        let df = deriver.model_frame(&derived).unwrap();

        assert_eq!(column_names(&df), MODEL_INPUT_COLUMNS.to_vec());
        assert_eq!(df.height(), 1);
    }

    #[test]
    fn test_featured_frame_requires_accounts() {
        let deriver = FeatureDeriver::new();
        let derived = deriver.derive_batch(&[transfer()]).unwrap();
        assert!(deriver.featured_frame(&derived).is_err());

        let mut labelled = transfer().with_accounts("C1", "C2").with_label(1);
        labelled.is_flagged_fraud = Some(0);
        let derived = deriver.derive_batch(&[labelled]).unwrap();
        let df = deriver.featured_frame(&derived).unwrap();

        assert_eq!(numeric_values(&df, "is_fraud").unwrap(), vec![1.0]);
        let kinds: Vec<Option<&str>> = df
            .column("name_orig")
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(kinds, vec![Some("C")]);
        for column in NON_FEATURE_COLUMNS {
            assert!(has_column(&df, column), "{} should be in the featured frame", column);
        }
    }
}
