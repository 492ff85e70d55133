use std::{
    path::Path,
    sync::{Arc, LazyLock},
};

use mailpool_common::{Signal, internal, logging};
use mailpool_dispatch::{
    AccountPool, DispatchError, FallbackConfig, LimitsConfig, PoolConfig, PoolStatusService,
    SenderAccount,
};
use mailpool_health::{HealthChecker, HealthConfig, HealthServer};
use mailpool_metrics::MetricsConfig;
use serde::Deserialize;
use tokio::sync::broadcast;

/// Daemon configuration, read from `mailpool.config.ron`
#[derive(Debug, Default, Deserialize)]
pub struct Mailpool {
    #[serde(alias = "account", default)]
    accounts: Vec<SenderAccount>,
    #[serde(default)]
    fallback: FallbackConfig,
    #[serde(default)]
    limits: LimitsConfig,
    #[serde(default)]
    health: HealthConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered, shutting down");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate Signal received, shutting down");
        }
    };

    if let Err(e) = SHUTDOWN_BROADCAST.send(Signal::Shutdown) {
        tracing::debug!("No shutdown listeners: {e}");
    }

    Ok(())
}

impl Mailpool {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid RON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
        })?;

        Ok(ron::from_str(&content)?)
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            accounts: self.accounts.clone(),
            fallback: self.fallback.clone(),
            limits: self.limits.clone(),
        }
    }

    /// # Errors
    ///
    /// Returns a configuration error if the account catalog or limits are invalid.
    pub fn build_pool(&self) -> Result<Arc<AccountPool>, DispatchError> {
        AccountPool::new(self.pool_config()).map(Arc::new)
    }

    /// Run the pool, its health monitor and the health server until a
    /// shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// This function will return an error if the configuration is invalid or
    /// the health server cannot be started.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        mailpool_metrics::init_metrics(&self.metrics)?;

        let pool = self.build_pool()?;

        internal!(
            level = INFO,
            accounts = pool.registry().accounts().len(),
            fallback = pool.registry().fallback_enabled(),
            "Account pool ready"
        );

        let monitor = pool.start_monitor();
        let checker = Arc::new(HealthChecker::new(
            Arc::clone(&pool) as Arc<dyn PoolStatusService>
        ));
        checker.set_monitor_running(true);

        let server = if self.health.enabled {
            let server = HealthServer::new(self.health.clone(), Arc::clone(&checker)).await?;
            Some(tokio::spawn(server.serve(SHUTDOWN_BROADCAST.subscribe())))
        } else {
            internal!(level = INFO, "Health server disabled");
            None
        };

        internal!(level = INFO, "Controller running");

        let ret = shutdown().await;

        internal!(level = INFO, "Shutting down...");

        if let Some(server) = server {
            match server.await {
                Ok(Err(e)) => tracing::error!("Health server failed: {e}"),
                Err(e) => tracing::error!("Health server task panicked: {e}"),
                Ok(Ok(())) => {}
            }
        }

        checker.set_monitor_running(false);
        monitor.shutdown().await;

        let _ = SHUTDOWN_BROADCAST.send(Signal::Finalised);

        ret
    }
}
