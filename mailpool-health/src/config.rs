//! Health server configuration

use serde::Deserialize;

/// Configuration for the health and operator endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// When disabled, the health server is not started.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Address to bind, e.g. `[::]:8080` or `127.0.0.1:8080`
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Enable the `POST /health/actions` operator endpoint
    #[serde(default = "default_actions_enabled")]
    pub actions_enabled: bool,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

const fn default_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "[::]:8080".to_string()
}

const fn default_actions_enabled() -> bool {
    true
}

const fn default_request_timeout_ms() -> u64 {
    1000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            listen_address: default_listen_address(),
            actions_enabled: default_actions_enabled(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}
