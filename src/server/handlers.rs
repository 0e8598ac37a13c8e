//! Request handlers

use super::error::{Result, ServerError};
use super::page::{self, Outcome, TransactionForm};
use super::AppState;
use crate::pipeline::FraudPipeline;
use crate::types::prediction::PredictionResult;
use crate::types::transaction::RawTransaction;
use axum::{
    extract::State,
    response::{Html, IntoResponse, Response},
    Form, Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub async fn index() -> Html<String> {
    Html(page::render(&TransactionForm::default(), None))
}

/// Form submission: always answers with the page, showing either the
/// prediction or the error
pub async fn predict_form(
    State(state): State<AppState>,
    Form(form): Form<TransactionForm>,
) -> Response {
    let result = match form.to_transaction() {
        Ok(tx) => run_prediction(state.pipeline.clone(), tx).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(prediction) => {
            Html(page::render(&form, Some(Outcome::Prediction(&prediction)))).into_response()
        }
        Err(e) => {
            e.log();
            (e.status(), Html(page::render(&form, Some(Outcome::Failure(&e))))).into_response()
        }
    }
}

pub async fn predict_json(
    State(state): State<AppState>,
    Json(tx): Json<RawTransaction>,
) -> Result<Json<PredictionResult>> {
    let prediction = run_prediction(state.pipeline.clone(), tx).await?;
    Ok(Json(prediction))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let schema = &state.pipeline.artifacts().schema;
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);

    Json(json!({
        "status": "healthy",
        "model": state.pipeline.model_name(),
        "threshold": state.pipeline.threshold(),
        "schema_version": schema.version,
        "features": schema.columns,
        "uptime_secs": uptime.num_seconds(),
    }))
}

/// Scoring may block on the ONNX session, so it runs off the async workers
async fn run_prediction(
    pipeline: Arc<FraudPipeline>,
    tx: RawTransaction,
) -> Result<PredictionResult> {
    let transaction_id = tx.transaction_id.clone();
    let prediction = tokio::task::spawn_blocking(move || pipeline.predict(&tx))
        .await
        .map_err(|e| ServerError::Internal(format!("prediction task failed: {}", e)))??;

    info!(
        transaction_id = ?transaction_id,
        class = %prediction.class,
        fraud_probability = ?prediction.fraud_probability,
        "Prediction served"
    );
    Ok(prediction)
}

#[cfg(test)]
mod tests {
    use crate::server::{create_router, AppState};
    use crate::testing::pipeline;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        create_router(AppState::new(Arc::new(pipeline())))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    const EXAMPLE_FORM: &str = "step=1&type=TRANSFER&amount=1000&name_orig=C1&oldbalance_org=1000\
        &newbalance_orig=0&name_dest=C2&oldbalance_dest=0&newbalance_dest=1000";

    #[tokio::test]
    async fn test_index_renders_form() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("<form"));
        assert!(html.contains("<option value=\"TRANSFER\""));
    }

    #[tokio::test]
    async fn test_form_prediction() {
        let response = app().oneshot(form_request(EXAMPLE_FORM)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("result fraud"), "{}", html);
        assert!(html.contains("0.9500"), "{}", html);
    }

    #[tokio::test]
    async fn test_form_error_names_the_stage() {
        let body = EXAMPLE_FORM.replace("amount=1000", "amount=-5");
        let response = app().oneshot(form_request(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("derive stage failed"), "{}", html);
    }

    #[tokio::test]
    async fn test_form_rejects_blank_account_id() {
        let body = EXAMPLE_FORM.replace("name_orig=C1", "name_orig=");
        let response = app().oneshot(form_request(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("derive stage failed"), "{}", html);
        assert!(html.contains("name_orig must not be empty"), "{}", html);
        assert!(!html.contains("result fraud"), "{}", html);
    }

    #[tokio::test]
    async fn test_form_rejects_non_numeric_field() {
        let body = EXAMPLE_FORM.replace("amount=1000", "amount=%3Cb%3E");
        let response = app().oneshot(form_request(&body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("amount must be a number"));
        assert!(html.contains("&lt;b&gt;"));
        assert!(!html.contains("<b>"));
    }

    #[tokio::test]
    async fn test_json_prediction() {
        let body = r#"{"step":1,"type":"PAYMENT","amount":20.0,"oldbalanceOrg":5000.0,
            "newbalanceOrig":4980.0,"oldbalanceDest":0.0,"newbalanceDest":0.0}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["class"], "not_fraud");
        assert_eq!(json["threshold"], 0.5);
    }

    #[tokio::test]
    async fn test_json_error_body() {
        let body = r#"{"step":1,"type":"TRANSFER","amount":1.0,"oldbalance_org":0.0,
            "newbalance_orig":0.0,"name_dest":"","oldbalance_dest":0.0,"newbalance_dest":0.0}"#;
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["error"], true);
        assert_eq!(json["stage"], "derive");
        assert_eq!(json["kind"], "validation");
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["model"], "transfer_stub");
        assert_eq!(json["schema_version"], 1);
    }
}
