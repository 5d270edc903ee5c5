use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::{ProfileError, SimulationError};
use crate::gateway::GatewayError;

/// `{success, timestamp, data, message}`, the body of every response.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub timestamp: String,
    pub data: Option<T>,
    pub message: Option<String>,
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn ok<T: Serialize>(data: T) -> Response {
    json_response(
        StatusCode::OK,
        Envelope {
            success: true,
            timestamp: now_iso(),
            data: Some(data),
            message: None,
        },
    )
}

pub fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    json_response(
        status,
        Envelope::<Value> {
            success: false,
            timestamp: now_iso(),
            data: None,
            message: Some(message.into()),
        },
    )
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Too many requests, please try again later")]
    RateLimited,

    #[error("Page not found")]
    NotFound,

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    ProviderUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn from_gateway(action: &str, err: GatewayError) -> Self {
        match err {
            GatewayError::Configuration(_) => ApiError::Configuration(err.to_string()),
            other => ApiError::ProviderUnavailable(format!("{action}: {other}")),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Configuration(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<SimulationError> for ApiError {
    fn from(err: SimulationError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl From<ProfileError> for ApiError {
    fn from(err: ProfileError) -> Self {
        ApiError::Validation(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("request failed with {status}: {self}");
        }
        failure(status, self.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
