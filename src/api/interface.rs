//! Interface lifecycle endpoints.
//!
//! POST   /api/interface/create
//! GET    /api/interface/status
//! POST   /api/interface/start
//! POST   /api/interface/stop
//! DELETE /api/interface/delete
//! POST   /api/interface/intercept  (unsafe mode only)

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::{ApiState, MessageBody};
use crate::domain::{InterfaceDetails, InterfaceStatus, LifecycleState};
use crate::error::{ApiError, TunnelResult};
use crate::manager::InterfaceManager;

/// Run a blocking manager call off the async runtime.
async fn blocking<T, F>(manager: InterfaceManager, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&InterfaceManager) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&manager))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

async fn run(
    state: ApiState,
    f: impl FnOnce(&InterfaceManager) -> TunnelResult<()> + Send + 'static,
    message: impl Into<String>,
) -> Result<Response, ApiError> {
    blocking(state.manager, f).await??;
    Ok(Json(MessageBody::success(message)).into_response())
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    status: InterfaceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<InterfaceDetails>,
}

/// Handle POST /api/interface/create
pub async fn handle_create(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let name = blocking(state.manager, |m| m.create()).await??;
    tracing::info!("Interface {} created via API", name);
    Ok(Json(MessageBody::success(format!("Interface {name} created successfully"))).into_response())
}

/// Handle GET /api/interface/status
///
/// Reports `no_interface` until something has been created.
pub async fn handle_status(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let (status, details) = blocking(state.manager, |m| (m.status(), m.interface_details())).await?;

    if status.state == LifecycleState::Uninitialized && !status.handle_active {
        return Ok(Json(MessageBody::new("no_interface", "No interface has been created")).into_response());
    }
    Ok(Json(StatusResponse { status, details }).into_response())
}

/// Handle POST /api/interface/start
pub async fn handle_start(State(state): State<ApiState>) -> Result<Response, ApiError> {
    run(state, |m| m.start(), "Interface started successfully").await
}

/// Handle POST /api/interface/stop
pub async fn handle_stop(State(state): State<ApiState>) -> Result<Response, ApiError> {
    run(state, |m| m.stop(), "Interface stopped successfully").await
}

/// Handle DELETE /api/interface/delete
///
/// Full cleanup; sub-step failures are logged, never returned.
pub async fn handle_delete(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let status = blocking(state.manager.clone(), |m| m.status()).await?;
    if status.state == LifecycleState::Uninitialized && !status.handle_active {
        return Err(ApiError::BadRequest("No interface to delete".to_string()));
    }

    run(
        state,
        |m| {
            m.cleanup();
            Ok(())
        },
        "Interface deleted successfully",
    )
    .await
}

/// Handle POST /api/interface/intercept
pub async fn handle_intercept(State(state): State<ApiState>) -> Result<Response, ApiError> {
    run(
        state,
        |m| m.intercept_all_traffic(),
        "All traffic is now being intercepted",
    )
    .await
}
