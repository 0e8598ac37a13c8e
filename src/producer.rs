//! NATS message producer for fraud alerts

use crate::types::alert::FraudAlert;
use anyhow::Result;
use async_nats::Client;
use tracing::debug;

/// Producer for publishing fraud alerts to NATS
#[derive(Clone)]
pub struct AlertProducer {
    client: Client,
    subject: String,
}

impl AlertProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish a fraud alert
    pub async fn publish(&self, alert: &FraudAlert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            alert_id = %alert.alert_id,
            transaction_id = %alert.transaction_id,
            fraud_probability = ?alert.fraud_probability,
            "Published fraud alert"
        );

        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
