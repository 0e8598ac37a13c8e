//! Error types for the server

use crate::error::{ErrorKind, PipelineError, Stage};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Pipeline(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Model => StatusCode::BAD_GATEWAY,
                ErrorKind::Schema | ErrorKind::Config | ErrorKind::Io => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            ServerError::Pipeline(e) => e.stage(),
            _ => None,
        }
    }

    /// Log failures that point at the deployment rather than the input
    pub(crate) fn log(&self) {
        if self.status().is_server_error() {
            tracing::error!(stage = ?self.stage(), detail = %self, "Prediction failed");
        } else {
            tracing::debug!(stage = ?self.stage(), detail = %self, "Rejected input");
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        self.log();

        let kind = match &self {
            ServerError::Pipeline(e) => Some(e.kind()),
            _ => None,
        };
        let body = Json(json!({
            "error": true,
            "kind": kind,
            "stage": self.stage(),
            "message": self.to_string(),
        }));

        (self.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_per_kind() {
        let validation = ServerError::from(
            PipelineError::Validation("amount must be non-negative".into()).in_stage(Stage::Derive),
        );
        assert_eq!(validation.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(validation.stage(), Some(Stage::Derive));

        let schema = ServerError::from(PipelineError::Schema("missing type_TRANSFER".into()));
        assert_eq!(schema.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let model = ServerError::from(PipelineError::Model("session failed".into()));
        assert_eq!(model.status(), StatusCode::BAD_GATEWAY);

        assert_eq!(
            ServerError::BadRequest("step".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
