use std::{io, net::SocketAddr};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_core::DispatchError;
use thiserror::Error;
use tracing::{debug, error};

/// Per-request failure, rendered as a plain-text HTTP response.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("script not enabled for http: {0}")]
    NotFound(String),

    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("script executor not initialized")]
    ExecutorUnavailable,

    #[error("script execution timed out")]
    Timeout,

    #[error("server is shutting down")]
    Unavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::ExecutorUnavailable | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::ExecutorUnavailable => ApiError::ExecutorUnavailable,
            // Swept slots are requests that outlived the expiry threshold.
            DispatchError::Timeout(_) | DispatchError::Expired => ApiError::Timeout,
            DispatchError::Stopped => ApiError::Unavailable,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        } else {
            debug!(%status, error = %self, "request rejected");
        }
        (status, self.to_string()).into_response()
    }
}

/// Server lifecycle failure.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server is already running")]
    AlreadyRunning,

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to stop server: {0}")]
    StopFailed(String),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn dispatch_errors_map_to_documented_statuses() {
        let cases = [
            (DispatchError::ExecutorUnavailable, StatusCode::INTERNAL_SERVER_ERROR),
            (
                DispatchError::Timeout(Duration::from_secs(30)),
                StatusCode::REQUEST_TIMEOUT,
            ),
            (DispatchError::Expired, StatusCode::REQUEST_TIMEOUT),
            (DispatchError::Stopped, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err.clone()).status(), status, "{err:?}");
        }
    }

    #[test]
    fn into_response_uses_status() {
        let response = ApiError::NotFound("abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
