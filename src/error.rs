use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::api::MessageBody;

pub type TunnelResult<T> = Result<T, TunnelError>;

/// Errors surfaced by lifecycle operations.
///
/// Each variant terminates the requested operation. Teardown-family
/// operations never return these; their sub-step failures are logged.
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Failed to create tunnel endpoint: {0}")]
    Creation(String),

    #[error("Failed to configure interface: {0}")]
    Configuration(String),

    #[error("Tunnel endpoint already created as {0}")]
    AlreadyCreated(String),

    #[error("Interface is already running")]
    AlreadyRunning,

    #[error("Interface is not running")]
    NotRunning,

    #[error("Interface not created")]
    NotCreated,

    #[error("Failed to discover default gateway: {0}")]
    GatewayDiscovery(String),

    #[error("Failed to apply route: {0}")]
    RouteApply(String),

    #[error("Failed to back up routing table: {0}")]
    RouteBackup(String),

    #[error("Failed to start packet-read task: {0}")]
    TaskSpawn(#[source] std::io::Error),
}

/// Errors from running an external network-configuration command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{command} failed: {output}")]
    Failed { command: String, output: String },

    #[error("{0}")]
    Parse(String),
}

/// Errors loading daemon configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by control API handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Tunnel(#[from] TunnelError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Tunnel(TunnelError::AlreadyCreated(_) | TunnelError::AlreadyRunning) => {
                StatusCode::CONFLICT
            }
            ApiError::Tunnel(TunnelError::NotCreated | TunnelError::NotRunning) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Tunnel(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("{}: {}", status, message);
        } else {
            tracing::warn!("{}: {}", status, message);
        }
        (status, Json(MessageBody::error(message))).into_response()
    }
}
