//! HTTP control API.

pub mod interface;

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::manager::InterfaceManager;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub manager: InterfaceManager,
    /// Enables routes that rewrite the host's default route.
    pub unsafe_mode: bool,
}

impl ApiState {
    pub fn new(manager: InterfaceManager, unsafe_mode: bool) -> Self {
        Self {
            manager,
            unsafe_mode,
        }
    }
}

/// `{"status": ..., "message": ...}` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageBody {
    pub status: String,
    pub message: String,
}

impl MessageBody {
    pub fn new(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new("success", message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("error", message)
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    service: &'static str,
}

async fn health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "healthy",
        service: env!("CARGO_PKG_NAME"),
    })
}

/// HTTP request logging middleware.
///
/// Logs each request in format: "IP METHOD PATH - STATUS"
async fn request_logging(request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!("{} {} {} - {}", peer, method, uri, response.status().as_u16());
    response
}

/// Create the control router.
///
/// `/api/interface/intercept` exists only in unsafe mode.
pub fn create_router(state: ApiState) -> Router {
    let mut router = Router::new()
        .route("/api/interface/create", post(interface::handle_create))
        .route("/api/interface/status", get(interface::handle_status))
        .route("/api/interface/start", post(interface::handle_start))
        .route("/api/interface/stop", post(interface::handle_stop))
        .route("/api/interface/delete", delete(interface::handle_delete));

    if state.unsafe_mode {
        tracing::warn!("UNSAFE MODE ENABLED - traffic interception endpoint available");
        router = router.route("/api/interface/intercept", post(interface::handle_intercept));
    }

    router
        .route("/health", get(health))
        .layer(middleware::from_fn(request_logging))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InterfaceConfig;
    use crate::system::{LinuxCommands, SystemCommandRunner};
    use crate::testing::{FakeDeviceFactory, FakeExecutor};
    use axum::http::{Method, StatusCode};
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        manager: InterfaceManager,
        executor: Arc<FakeExecutor>,
        _dir: TempDir,
    }

    fn app(unsafe_mode: bool) -> TestApp {
        let executor = Arc::new(FakeExecutor::new());
        executor.respond("ip route show default", "default via 192.168.1.254 dev eth0\n");
        let dir = TempDir::new().unwrap();
        let config = InterfaceConfig::new(
            "tun-api",
            1500,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        let manager = InterfaceManager::builder(config)
            .runner(SystemCommandRunner::new(executor.clone(), Box::new(LinuxCommands)))
            .device_factory(Arc::new(FakeDeviceFactory::new()))
            .backup_dir(dir.path())
            .read_timeout(Duration::from_millis(20))
            .signal_handling(false)
            .build();

        TestApp {
            router: create_router(ApiState::new(manager.clone(), unsafe_mode)),
            manager,
            executor,
            _dir: dir,
        }
    }

    async fn call(router: &Router, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    mod health_tests {
        use super::*;

        #[tokio::test]
        async fn health_reports_service() {
            let app = app(false);
            let (status, body) = call(&app.router, Method::GET, "/health").await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "healthy");
            assert_eq!(body["service"], "tunwarden");
        }
    }

    mod lifecycle_tests {
        use super::*;

        #[tokio::test]
        async fn status_before_create() {
            let app = app(false);
            let (status, body) = call(&app.router, Method::GET, "/api/interface/status").await;

            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "no_interface");
        }

        #[tokio::test]
        async fn full_lifecycle() {
            let app = app(false);

            let (status, body) = call(&app.router, Method::POST, "/api/interface/create").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["status"], "success");
            assert_eq!(body["message"], "Interface tun-api created successfully");

            let (status, _) = call(&app.router, Method::POST, "/api/interface/start").await;
            assert_eq!(status, StatusCode::OK);

            let (status, body) = call(&app.router, Method::GET, "/api/interface/status").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["state"], "running");
            assert_eq!(body["handle_active"], true);
            assert_eq!(body["name"], "tun-api");

            let (status, _) = call(&app.router, Method::POST, "/api/interface/stop").await;
            assert_eq!(status, StatusCode::OK);

            let (status, body) = call(&app.router, Method::DELETE, "/api/interface/delete").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], "Interface deleted successfully");
            assert!(!app.manager.status().handle_active);
        }

        #[tokio::test]
        async fn create_twice_conflicts() {
            let app = app(false);
            call(&app.router, Method::POST, "/api/interface/create").await;

            let (status, body) = call(&app.router, Method::POST, "/api/interface/create").await;
            assert_eq!(status, StatusCode::CONFLICT);
            assert_eq!(body["status"], "error");
        }

        #[tokio::test]
        async fn start_without_interface_is_bad_request() {
            let app = app(false);
            let (status, _) = call(&app.router, Method::POST, "/api/interface/start").await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        #[tokio::test]
        async fn stop_when_not_running_is_bad_request() {
            let app = app(false);
            call(&app.router, Method::POST, "/api/interface/create").await;

            let (status, _) = call(&app.router, Method::POST, "/api/interface/stop").await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        #[tokio::test]
        async fn delete_without_interface_is_bad_request() {
            let app = app(false);
            let (status, body) = call(&app.router, Method::DELETE, "/api/interface/delete").await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["message"], "Bad request: No interface to delete");
        }

        #[tokio::test]
        async fn configuration_failure_is_server_error() {
            let app = app(false);
            app.executor.fail("ip link set dev tun-api up");

            let (status, _) = call(&app.router, Method::POST, "/api/interface/create").await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(!app.manager.status().handle_active);
        }

        #[tokio::test]
        async fn wrong_method_is_rejected() {
            let app = app(false);
            let (status, _) = call(&app.router, Method::GET, "/api/interface/create").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        }
    }

    mod intercept_tests {
        use super::*;

        #[tokio::test]
        async fn intercept_hidden_without_unsafe() {
            let app = app(false);
            call(&app.router, Method::POST, "/api/interface/create").await;

            let (status, _) = call(&app.router, Method::POST, "/api/interface/intercept").await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(!app.manager.status().intercepting);
        }

        #[tokio::test]
        async fn intercept_in_unsafe_mode() {
            let app = app(true);
            call(&app.router, Method::POST, "/api/interface/create").await;

            let (status, body) = call(&app.router, Method::POST, "/api/interface/intercept").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], "All traffic is now being intercepted");
            assert!(app.manager.status().intercepting);

            call(&app.router, Method::DELETE, "/api/interface/delete").await;
            assert!(!app.manager.status().intercepting);
        }
    }
}
