use axum::{
    Json,
    body::Body,
    http::{HeaderValue, Response, StatusCode, header::CONTENT_RANGE},
    response::IntoResponse,
};
use serde::Serialize;

use crate::services::streaming::StreamError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response<Body> {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

// A generic error report
// Produced via `Err(some_err).wrap_err("Some context")`
// or `Err(color_eyre::eyre::Report::new(SomeError))`
pub struct Report(color_eyre::Report);

impl std::fmt::Debug for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl<E> From<E> for Report
where
    E: Into<color_eyre::Report>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Tell axum how to convert `Report` into a response.
impl IntoResponse for Report {
    fn into_response(self) -> Response<Body> {
        tracing::error!(error = ?self.0, "Request failed");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
    }
}

/// Errors of the catalog endpoints.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Unavailable(String),
    Internal(Report),
}

impl From<color_eyre::Report> for ApiError {
    fn from(err: color_eyre::Report) -> Self {
        Self::Internal(Report(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response<Body> {
        match self {
            ApiError::NotFound(detail) => error_response(StatusCode::NOT_FOUND, detail),
            ApiError::Unavailable(detail) => {
                error_response(StatusCode::SERVICE_UNAVAILABLE, detail)
            }
            ApiError::Internal(report) => report.into_response(),
        }
    }
}

impl IntoResponse for StreamError {
    fn into_response(self) -> Response<Body> {
        match self {
            StreamError::TrackNotFound(_)
            | StreamError::StationNotFound(_)
            | StreamError::StationEmpty(_) => {
                tracing::info!(error = %self, "Stream target not found");
                error_response(StatusCode::NOT_FOUND, self.to_string())
            }
            StreamError::ObjectMissing { ref key } => {
                tracing::warn!(key, "Catalog entry points at a missing audio object");
                error_response(StatusCode::NOT_FOUND, self.to_string())
            }
            StreamError::StationInactive(_) => {
                error_response(StatusCode::FORBIDDEN, self.to_string())
            }
            StreamError::RangeNotSatisfiable { size } => {
                let mut response =
                    error_response(StatusCode::RANGE_NOT_SATISFIABLE, self.to_string());
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                    response.headers_mut().insert(CONTENT_RANGE, value);
                }
                response
            }
            StreamError::Internal(err) => {
                tracing::error!(error = ?err, "Streaming failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error streaming audio")
            }
        }
    }
}
