//! NATS message consumer for incoming transactions

use crate::types::transaction::RawTransaction;
use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving raw transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: None,
        }
    }

    /// Share the subject with other consumers of the same queue group
    pub fn with_queue_group(mut self, group: Option<String>) -> Self {
        self.queue_group = group;
        self
    }

    /// Subscribe to the transaction subject
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => self
                .client
                .queue_subscribe(self.subject.clone(), group.clone())
                .await
                .with_context(|| format!("Failed to join queue group {}", group))?,
            None => self
                .client
                .subscribe(self.subject.clone())
                .await
                .with_context(|| format!("Failed to subscribe to {}", self.subject))?,
        };
        info!(
            subject = %self.subject,
            queue_group = ?self.queue_group,
            "Subscribed to transaction subject"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Decode a message payload into a raw transaction
pub fn decode_transaction(payload: &[u8]) -> Result<RawTransaction> {
    serde_json::from_slice(payload).context("Failed to deserialize transaction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dataset_payload() {
        let payload = br#"{"transaction_id":"tx-1","step":3,"type":"CASH_OUT","amount":229133.94,
            "nameOrig":"C905080434","oldbalanceOrg":15325.0,"newbalanceOrig":0.0,
            "nameDest":"C476402209","oldbalanceDest":5083.0,"newbalanceDest":51513.44}"#;

        let tx = decode_transaction(payload).unwrap();
        assert_eq!(tx.transaction_id.as_deref(), Some("tx-1"));
        assert_eq!(tx.tx_type, "CASH_OUT");
        assert_eq!(tx.is_fraud, None);
    }

    #[test]
    fn test_decode_rejects_missing_amount() {
        assert!(decode_transaction(br#"{"step":1,"type":"PAYMENT"}"#).is_err());
    }
}
