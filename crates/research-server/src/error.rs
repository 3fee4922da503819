//! Translates [`ResearchError`] into HTTP responses, grounded on the
//! teacher's `LangServeError -> IntoResponse` mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use research_core::error::ResearchError;
use serde::Serialize;

/// Wire shape for every non-2xx response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable reason code, stable across releases.
    pub error: String,
    /// Human-readable detail.
    pub message: String,
    /// HTTP status, duplicated in the body for non-HTTP callers.
    pub status: u16,
}

/// Wrapper so `research-server` can implement a foreign trait
/// ([`IntoResponse`]) for a foreign type ([`ResearchError`]).
pub struct ApiError(pub ResearchError);

impl From<ResearchError> for ApiError {
    fn from(error: ResearchError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self.0;
        let status = match &error {
            ResearchError::InputError(_) => StatusCode::BAD_REQUEST,
            ResearchError::ProviderTransportError { .. }
            | ResearchError::ProviderShapeError(_)
            | ResearchError::PersistenceError(_)
            | ResearchError::InternalError(_)
            | ResearchError::BudgetExhausted
            | ResearchError::DeadlineExceeded
            | ResearchError::Cancelled => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            error: error.reason_code().to_string(),
            message: error.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
