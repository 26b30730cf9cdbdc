use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::interview::prompts::MissingFieldError;
use crate::llm_client::extract::ExtractionError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Callers match on the variant to choose recovery: completion failures are
/// worth a manual retry, extraction failures carry the offending output.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Completion error: {0}")]
    Completion(LlmError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Missing field: {0}")]
    MissingField(#[from] MissingFieldError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LlmError> for AppError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::Configuration(msg) => AppError::Configuration(msg),
            other => AppError::Completion(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "CONFIGURATION_ERROR",
                    "The service is not configured correctly".to_string(),
                )
            }
            AppError::Completion(e) => {
                tracing::error!("Completion error: {e}");
                (
                    StatusCode::BAD_GATEWAY,
                    "COMPLETION_ERROR",
                    "The AI service could not complete the request. Please try again.".to_string(),
                )
            }
            AppError::Extraction(e) => {
                tracing::warn!("Extraction error: {e}");
                (StatusCode::BAD_GATEWAY, "EXTRACTION_ERROR", e.to_string())
            }
            AppError::MissingField(e) => {
                (StatusCode::BAD_REQUEST, "MISSING_FIELD", e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::prompts::PromptTemplate;

    #[test]
    fn test_llm_configuration_maps_to_configuration() {
        let err: AppError = LlmError::Configuration("no key".to_string()).into();
        assert!(matches!(err, AppError::Configuration(_)));

        let err: AppError = LlmError::EmptyContent.into();
        assert!(matches!(err, AppError::Completion(LlmError::EmptyContent)));
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::Validation("x".to_string()), StatusCode::BAD_REQUEST),
            (
                AppError::MissingField(MissingFieldError {
                    template: PromptTemplate::Grading,
                    field: "student_answer",
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Completion(LlmError::EmptyContent),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Extraction(ExtractionError::NoStructuredData {
                    snippet: "no structure here".to_string(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::Configuration("x".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
