//! Response envelopes: `{success, ..., processingTime}` on every endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pivot_core::Error;
use serde::Serialize;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidParams,
    InvalidUrl,
    NotConfigured,
    ProviderUnavailable,
    MalformedResponse,
    UnexpectedError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParams => "invalid_params",
            Self::InvalidUrl => "invalid_url",
            Self::NotConfigured => "not_configured",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::MalformedResponse => "malformed_response",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    /// Caller mistakes are 400; configuration and upstream failures are 500.
    pub fn status(self) -> StatusCode {
        match self {
            Self::InvalidParams | Self::InvalidUrl => StatusCode::BAD_REQUEST,
            Self::NotConfigured
            | Self::ProviderUnavailable
            | Self::MalformedResponse
            | Self::UnexpectedError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&Error> for ErrorCode {
    fn from(e: &Error) -> Self {
        match e {
            Error::Validation(_) => Self::InvalidParams,
            Error::InvalidUrl(_) => Self::InvalidUrl,
            Error::NotConfigured(_) => Self::NotConfigured,
            Error::Provider { .. } | Error::Timeout { .. } | Error::Transport { .. } => {
                Self::ProviderUnavailable
            }
            Error::MalformedResponse { .. } | Error::MissingTopic => Self::MalformedResponse,
        }
    }
}

fn elapsed_ms(t0: Instant) -> u64 {
    t0.elapsed().as_millis().try_into().unwrap_or(u64::MAX)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Failure<'a> {
    success: bool,
    error: String,
    code: &'a str,
    processing_time: u64,
}

fn failure_with(code: ErrorCode, message: String, t0: Instant) -> Response {
    let body = Failure {
        success: false,
        error: message,
        code: code.as_str(),
        processing_time: elapsed_ms(t0),
    };
    (code.status(), Json(body)).into_response()
}

pub fn failure(e: &Error, t0: Instant) -> Response {
    failure_with(ErrorCode::from(e), e.to_string(), t0)
}

/// `payload` must serialize to a JSON object; `success` and `processingTime` are added.
pub fn success<T: Serialize>(payload: &T, t0: Instant) -> Response {
    let mut v = match serde_json::to_value(payload) {
        Ok(serde_json::Value::Object(m)) => m,
        Ok(_) => serde_json::Map::new(),
        Err(e) => {
            return failure_with(ErrorCode::UnexpectedError, e.to_string(), t0);
        }
    };
    v.insert("success".to_string(), serde_json::Value::Bool(true));
    v.insert("processingTime".to_string(), serde_json::json!(elapsed_ms(t0)));
    (StatusCode::OK, Json(serde_json::Value::Object(v))).into_response()
}
