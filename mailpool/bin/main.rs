#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use std::path::PathBuf;

use mailpool::Mailpool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = find_config_file()?;
    let mailpool = Mailpool::load(&config_path)?;

    mailpool.run().await
}

/// Find the configuration file using the following precedence:
/// 1. `MAILPOOL_CONFIG` environment variable
/// 2. ./mailpool.config.ron (current working directory)
/// 3. /etc/mailpool/mailpool.config.ron (system-wide config)
fn find_config_file() -> anyhow::Result<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILPOOL_CONFIG") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        anyhow::bail!(
            "MAILPOOL_CONFIG points to non-existent file: {}",
            path.display()
        );
    }

    let default_paths = [
        PathBuf::from("./mailpool.config.ron"),
        PathBuf::from("/etc/mailpool/mailpool.config.ron"),
    ];

    if let Some(path) = default_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let paths_tried = default_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    anyhow::bail!(
        "No configuration file found. Tried:\n  - MAILPOOL_CONFIG environment variable\n{paths_tried}"
    )
}
