//! Health check and operator HTTP server

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mailpool_common::Signal;
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::{HealthChecker, HealthConfig, HealthError};

/// Health check HTTP server
///
/// - `GET /health/live` and `GET /health/ready` for probes
/// - `GET /health/accounts` for the account health report
/// - `POST /health/actions` for operator actions
pub struct HealthServer {
    listener: TcpListener,
    router: Router,
}

impl HealthServer {
    /// Bind the configured address and build the router.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the address fails.
    pub async fn new(
        config: HealthConfig,
        health_checker: Arc<HealthChecker>,
    ) -> Result<Self, HealthError> {
        let listener = TcpListener::bind(&config.listen_address)
            .await
            .map_err(|e| HealthError::BindError {
                address: config.listen_address.clone(),
                source: e,
            })?;

        tracing::info!(
            address = %config.listen_address,
            "Health check server bound successfully"
        );

        Ok(Self {
            listener,
            router: router(health_checker, &config),
        })
    }

    /// Run until a shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails while running.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), HealthError> {
        tracing::info!("Health check server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Health check server received shutdown signal");
            })
            .await
            .map_err(|e| HealthError::ServerError(e.to_string()))?;

        tracing::info!("Health check server stopped");
        Ok(())
    }
}

/// Routes served by [`HealthServer`].
pub fn router(health_checker: Arc<HealthChecker>, config: &HealthConfig) -> Router {
    let mut router = Router::new()
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/health/accounts", get(accounts_handler));

    if config.actions_enabled {
        router = router.route("/health/actions", post(action_handler));
    }

    router
        .with_state(health_checker)
        .layer(TimeoutLayer::new(Duration::from_millis(config.request_timeout_ms)))
}

async fn liveness_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    if health_checker.is_alive() {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
    }
}

async fn readiness_handler(State(health_checker): State<Arc<HealthChecker>>) -> Response {
    if health_checker.is_ready() {
        (StatusCode::OK, "OK").into_response()
    } else {
        let status = health_checker.get_status();
        tracing::warn!(
            monitor_running = status.monitor_running,
            can_send = status.can_send,
            healthy_accounts = status.healthy_accounts,
            total_accounts = status.total_accounts,
            "Readiness probe failed"
        );
        (StatusCode::SERVICE_UNAVAILABLE, Json(status)).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReportQuery {
    #[serde(default)]
    include_errors: bool,
}

async fn accounts_handler(
    State(health_checker): State<Arc<HealthChecker>>,
    Query(query): Query<ReportQuery>,
) -> Response {
    let report = health_checker.pool().health_report(query.include_errors);

    tracing::debug!(
        score = report.system.score,
        healthy = report.accounts.healthy,
        total = report.accounts.total,
        "Served account health report"
    );

    Json(json!({ "success": true, "data": report })).into_response()
}

/// Body of `POST /health/actions`
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub account: Option<String>,
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "success": false, "error": error.into() })),
    )
        .into_response()
}

async fn action_handler(
    State(health_checker): State<Arc<HealthChecker>>,
    Json(request): Json<ActionRequest>,
) -> Response {
    let pool = health_checker.pool();

    tracing::info!(
        action = %request.action,
        account = request.account.as_deref().unwrap_or("-"),
        "Health action requested"
    );

    match request.action.as_str() {
        "healthCheck" => {
            let summary = pool.run_health_check();
            Json(json!({
                "success": true,
                "message": "Health check completed",
                "data": summary,
            }))
            .into_response()
        }
        "resetAccount" => {
            let Some(account) = request.account.filter(|a| !a.is_empty()) else {
                return failure(
                    StatusCode::BAD_REQUEST,
                    "Account email is required for reset action",
                );
            };

            if pool.reset_account(&account) {
                Json(json!({
                    "success": true,
                    "message": format!("Account {account} health reset successfully"),
                }))
                .into_response()
            } else {
                failure(StatusCode::NOT_FOUND, format!("Unknown account {account}"))
            }
        }
        "resetAllAccounts" => {
            let count = pool.reset_all_accounts();
            Json(json!({
                "success": true,
                "message": format!("Reset {count} accounts successfully"),
            }))
            .into_response()
        }
        _ => failure(
            StatusCode::BAD_REQUEST,
            "Invalid action. Supported actions: healthCheck, resetAccount, resetAllAccounts",
        ),
    }
}
