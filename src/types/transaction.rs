//! Raw transaction records as they arrive from the dataset, the form or the stream

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Transaction kinds present in the source dataset
pub const TRANSACTION_TYPES: [&str; 5] = ["CASH_IN", "CASH_OUT", "DEBIT", "PAYMENT", "TRANSFER"];

/// A single mobile-money transaction before any feature engineering.
///
/// Field aliases accept the camelCase headers of the raw dataset
/// (`nameOrig`, `oldbalanceOrg`, ...) as well as the snake_case names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Optional caller-supplied identifier, carried into alerts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    /// Hour index of the simulation (1 step = 1 hour)
    pub step: u32,

    /// Transaction kind, see [`TRANSACTION_TYPES`]
    #[serde(rename = "type", alias = "tx_type")]
    pub tx_type: String,

    pub amount: f64,

    /// Originating account id; only its leading character is used
    #[serde(default, alias = "nameOrig", skip_serializing_if = "Option::is_none")]
    pub name_orig: Option<String>,

    #[serde(alias = "oldbalanceOrg")]
    pub oldbalance_org: f64,

    #[serde(alias = "newbalanceOrig")]
    pub newbalance_orig: f64,

    /// Destination account id; only its leading character is used
    #[serde(default, alias = "nameDest", skip_serializing_if = "Option::is_none")]
    pub name_dest: Option<String>,

    #[serde(alias = "oldbalanceDest")]
    pub oldbalance_dest: f64,

    #[serde(alias = "newbalanceDest")]
    pub newbalance_dest: f64,

    /// Ground-truth label, present in training data only
    #[serde(default, alias = "isFraud", skip_serializing_if = "Option::is_none")]
    pub is_fraud: Option<i64>,

    /// Rule-based flag from the source system, present in training data only
    #[serde(default, alias = "isFlaggedFraud", skip_serializing_if = "Option::is_none")]
    pub is_flagged_fraud: Option<i64>,
}

impl RawTransaction {
    /// Create an unlabelled transaction with zero balances
    pub fn new(step: u32, tx_type: impl Into<String>, amount: f64) -> Self {
        Self {
            transaction_id: None,
            step,
            tx_type: tx_type.into(),
            amount,
            name_orig: None,
            oldbalance_org: 0.0,
            newbalance_orig: 0.0,
            name_dest: None,
            oldbalance_dest: 0.0,
            newbalance_dest: 0.0,
            is_fraud: None,
            is_flagged_fraud: None,
        }
    }

    pub fn with_accounts(
        mut self,
        name_orig: impl Into<String>,
        name_dest: impl Into<String>,
    ) -> Self {
        self.name_orig = Some(name_orig.into());
        self.name_dest = Some(name_dest.into());
        self
    }

    pub fn with_origin_balances(mut self, old: f64, new: f64) -> Self {
        self.oldbalance_org = old;
        self.newbalance_orig = new;
        self
    }

    pub fn with_destination_balances(mut self, old: f64, new: f64) -> Self {
        self.oldbalance_dest = old;
        self.newbalance_dest = new;
        self
    }

    pub fn with_label(mut self, is_fraud: i64) -> Self {
        self.is_fraud = Some(is_fraud);
        self
    }
}

/// Read every row of a raw transaction CSV
pub fn read_transactions<P: AsRef<Path>>(path: P) -> Result<Vec<RawTransaction>> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path).map_err(|e| match e.into_kind() {
        csv::ErrorKind::Io(source) => PipelineError::io(path, source),
        other => PipelineError::malformed(path, format!("{:?}", other)),
    })?;

    rdr.deserialize()
        .enumerate()
        .map(|(row, record)| {
            record.map_err(|e| PipelineError::malformed(path, format!("row {}: {}", row, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_serialization() {
        let tx = RawTransaction::new(1, "TRANSFER", 1000.0)
            .with_accounts("C1231006815", "M1979787155")
            .with_origin_balances(1000.0, 0.0);

        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"type\":\"TRANSFER\""));

        let deserialized: RawTransaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn test_accepts_dataset_headers() {
        let json = r#"{
            "step": 1, "type": "PAYMENT", "amount": 9839.64,
            "nameOrig": "C1231006815", "oldbalanceOrg": 170136.0, "newbalanceOrig": 160296.36,
            "nameDest": "M1979787155", "oldbalanceDest": 0.0, "newbalanceDest": 0.0,
            "isFraud": 0, "isFlaggedFraud": 0
        }"#;

        let tx: RawTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.name_orig.as_deref(), Some("C1231006815"));
        assert_eq!(tx.oldbalance_org, 170136.0);
        assert_eq!(tx.is_fraud, Some(0));
    }

    #[test]
    fn test_csv_row_with_original_header() {
        let data = concat!(
            "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,",
            "nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud\n",
            "1,TRANSFER,181.0,C1305486145,181.0,0.0,C553264065,0.0,0.0,1,0\n",
        );
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<RawTransaction> = rdr
            .deserialize()
            .collect::<std::result::Result<_, _>>()
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].tx_type, "TRANSFER");
        assert_eq!(rows[0].name_dest.as_deref(), Some("C553264065"));
        assert_eq!(rows[0].is_fraud, Some(1));
    }

    #[test]
    fn test_read_transactions_reports_bad_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        std::fs::write(
            &path,
            concat!(
                "step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,",
                "nameDest,oldbalanceDest,newbalanceDest\n",
                "1,PAYMENT,10.0,C1,10.0,0.0,M1,0.0,0.0\n",
                "2,PAYMENT,abc,C1,10.0,0.0,M1,0.0,0.0\n",
            ),
        )
        .unwrap();

        let err = read_transactions(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
        assert!(err.to_string().contains("row 1"), "{}", err);

        let missing = read_transactions(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(missing, PipelineError::Io { .. }));
    }
}
