pub mod channels;
pub mod config_cmd;
pub mod doctor;
pub mod run;

use parley_config::AppConfig;
use parley_core::store::ChatStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Load the given file, or `~/.parley/config.toml`, with env overrides.
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    AppConfig::load_with_env(&path).map_err(|e| format!("Failed to load config: {e}").into())
}

/// Open the configured store. `force_memory` overrides the backend.
pub async fn open_store(
    config: &AppConfig,
    force_memory: bool,
) -> Result<Arc<dyn ChatStore>, Box<dyn std::error::Error>> {
    if force_memory || config.store.backend == "memory" {
        return Ok(Arc::new(parley_store::InMemoryStore::new()));
    }

    let path = config.store.resolved_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store = parley_store::SqliteStore::new(&path.to_string_lossy()).await?;
    Ok(Arc::new(store))
}
