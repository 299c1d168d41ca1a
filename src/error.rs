use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error taxonomy for the retrieval-and-answerability engine.
///
/// `InsufficientEvidence` from spec.md's error kinds is intentionally not a
/// variant here: a refusal is a successful [`crate::retrieval::fusion::RetrievalResult`]
/// with an empty selection, not a transport-level failure.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("query received before a successful initialization")]
    NotInitialized,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("workbook yielded no snippets")]
    EmptyCorpus,

    #[error("upstream dependency failed: {0}")]
    UpstreamFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::NotInitialized => "not_initialized",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::EmptyCorpus => "empty_corpus",
            AppError::UpstreamFailure(_) => "upstream_failure",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotInitialized => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::EmptyCorpus => StatusCode::BAD_REQUEST,
            AppError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if matches!(self, AppError::Internal(_)) {
            tracing::error!(error = %self, "internal error");
        } else {
            tracing::warn!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
