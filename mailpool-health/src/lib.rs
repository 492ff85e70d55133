//! Health endpoints for the mailpool daemon
//!
//! # Endpoints
//!
//! - **`/health/live`** - Liveness probe: 200 while the process can respond
//! - **`/health/ready`** - Readiness probe: 200 once the health monitor runs and
//!   at least one sender account can send
//! - **`/health/accounts`** - Account health report, `?include_errors=true` adds
//!   the most recent send errors
//! - **`/health/actions`** - `POST {"action": "healthCheck" | "resetAccount" | "resetAllAccounts", "account": ...}`
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mailpool_dispatch::{AccountPool, PoolConfig};
//! use mailpool_health::{HealthChecker, HealthConfig, HealthServer};
//!
//! # async fn example(config: PoolConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let pool = Arc::new(AccountPool::new(config)?);
//! let checker = Arc::new(HealthChecker::new(pool));
//! let server = HealthServer::new(HealthConfig::default(), checker).await?;
//!
//! // server.serve(shutdown_receiver).await?;
//! # Ok(())
//! # }
//! ```

mod checker;
mod config;
mod error;
mod server;

pub use checker::{HealthChecker, ReadinessStatus};
pub use config::HealthConfig;
pub use error::HealthError;
pub use server::{ActionRequest, HealthServer, router};
