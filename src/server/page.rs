//! Server-rendered HTML for the prediction form

use super::error::ServerError;
use crate::types::prediction::PredictionResult;
use crate::types::transaction::{RawTransaction, TRANSACTION_TYPES};
use serde::Deserialize;
use std::fmt::Write;
use std::str::FromStr;

/// Raw form fields; kept as text so a bad value can be shown back to the user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransactionForm {
    pub step: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub amount: String,
    pub name_orig: String,
    pub oldbalance_org: String,
    pub newbalance_orig: String,
    pub name_dest: String,
    pub oldbalance_dest: String,
    pub newbalance_dest: String,
}

impl TransactionForm {
    pub fn to_transaction(&self) -> Result<RawTransaction, ServerError> {
        let mut tx = RawTransaction::new(
            parse_field("step", &self.step)?,
            self.tx_type.trim(),
            parse_field("amount", &self.amount)?,
        )
        .with_origin_balances(
            parse_field("oldbalance_org", &self.oldbalance_org)?,
            parse_field("newbalance_orig", &self.newbalance_orig)?,
        )
        .with_destination_balances(
            parse_field("oldbalance_dest", &self.oldbalance_dest)?,
            parse_field("newbalance_dest", &self.newbalance_dest)?,
        );

        // blank ids are passed on so the deriver rejects them
        tx.name_orig = Some(self.name_orig.trim().to_string());
        tx.name_dest = Some(self.name_dest.trim().to_string());
        Ok(tx)
    }
}

fn parse_field<T: FromStr>(name: &str, value: &str) -> Result<T, ServerError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServerError::BadRequest(format!("{} is required", name)));
    }
    value.parse().map_err(|_| {
        ServerError::BadRequest(format!("{} must be a number, got '{}'", name, value))
    })
}

pub enum Outcome<'a> {
    Prediction(&'a PredictionResult),
    Failure(&'a ServerError),
}

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = "body{font-family:sans-serif;max-width:40em;margin:2em auto}\
label{display:block;margin-top:.6em}input,select{width:100%;padding:.3em}\
.result{padding:1em;margin-top:1em;border-radius:4px}\
.fraud{background:#fdd}.not_fraud{background:#dfd}.failure{background:#fec}";

/// Render the form, prefilled with `form`, followed by the outcome if any
pub fn render(form: &TransactionForm, outcome: Option<Outcome<'_>>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Fraud Detection</title>\
         <style>{}</style></head><body><h1>Transaction Fraud Detection</h1>\
         <form method=\"post\" action=\"/predict\">",
        STYLE
    );

    input(&mut html, "step", "Step (hour)", &form.step);

    html.push_str("<label for=\"type\">Type</label><select id=\"type\" name=\"type\">");
    for tx_type in TRANSACTION_TYPES {
        let selected = if form.tx_type == tx_type { " selected" } else { "" };
        let _ = write!(html, "<option value=\"{0}\"{1}>{0}</option>", tx_type, selected);
    }
    html.push_str("</select>");

    input(&mut html, "amount", "Amount", &form.amount);
    input(&mut html, "name_orig", "Origin account", &form.name_orig);
    input(&mut html, "oldbalance_org", "Origin balance before", &form.oldbalance_org);
    input(&mut html, "newbalance_orig", "Origin balance after", &form.newbalance_orig);
    input(&mut html, "name_dest", "Destination account", &form.name_dest);
    input(&mut html, "oldbalance_dest", "Destination balance before", &form.oldbalance_dest);
    input(&mut html, "newbalance_dest", "Destination balance after", &form.newbalance_dest);

    html.push_str("<p><button type=\"submit\">Predict</button></p></form>");

    match outcome {
        Some(Outcome::Prediction(result)) => {
            let probability = result
                .fraud_probability
                .map_or_else(|| "n/a".to_string(), |p| format!("{:.4}", p));
            let risk = result.risk_level.map_or("n/a", |r| r.as_str());
            let css = if result.is_fraud() { "fraud" } else { "not_fraud" };
            let _ = write!(
                html,
                "<div class=\"result {}\"><h2>Prediction: {}</h2>\
                 <p>Fraud probability: {}</p><p>Risk level: {}</p>\
                 <p>Threshold: {}</p></div>",
                css,
                escape(&result.class.to_string()),
                probability,
                risk,
                result.threshold
            );
        }
        Some(Outcome::Failure(error)) => {
            let _ = write!(
                html,
                "<div class=\"result failure\"><h2>Prediction failed</h2><p>{}</p></div>",
                escape(&error.to_string())
            );
        }
        None => {}
    }

    html.push_str("</body></html>");
    html
}

fn input(html: &mut String, name: &str, label: &str, value: &str) {
    let _ = write!(
        html,
        "<label for=\"{0}\">{1}</label><input id=\"{0}\" name=\"{0}\" value=\"{2}\">",
        name,
        label,
        escape(value)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> TransactionForm {
        TransactionForm {
            step: "1".into(),
            tx_type: "TRANSFER".into(),
            amount: " 1000 ".into(),
            name_orig: " C1 ".into(),
            oldbalance_org: "1000".into(),
            newbalance_orig: "0".into(),
            name_dest: "C2".into(),
            oldbalance_dest: "0".into(),
            newbalance_dest: "1000".into(),
        }
    }

    #[test]
    fn test_form_to_transaction() {
        let tx = filled().to_transaction().unwrap();
        assert_eq!(tx.amount, 1000.0);
        assert_eq!(tx.name_orig.as_deref(), Some("C1"));
        assert_eq!(tx.name_dest.as_deref(), Some("C2"));
        assert_eq!(tx.newbalance_dest, 1000.0);
    }

    #[test]
    fn test_blank_account_id_is_kept() {
        let form = TransactionForm {
            name_orig: "   ".into(),
            ..filled()
        };
        let tx = form.to_transaction().unwrap();
        assert_eq!(tx.name_orig.as_deref(), Some(""));
    }

    #[test]
    fn test_missing_field() {
        let form = TransactionForm {
            step: "".into(),
            ..filled()
        };
        let err = form.to_transaction().unwrap_err();
        assert_eq!(err.to_string(), "invalid request: step is required");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_selected_type_is_kept() {
        let html = render(&filled(), None);
        assert!(html.contains("<option value=\"TRANSFER\" selected>"));
        assert!(!html.contains("class=\"result"));
    }
}
