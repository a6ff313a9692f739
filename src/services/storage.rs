/// Settings persistence service.
/// Owns the JSON settings file and the in-memory copy handed to the compositor.
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::config::WelcomeConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to save settings to {}: {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<WelcomeConfig>,
}

impl ConfigStore {
    /// Load settings from `path`.
    /// A missing or malformed file is replaced with the defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<WelcomeConfig>(&raw) {
                Ok(cfg) => {
                    info!("Loaded settings from {}", path.display());
                    return Self {
                        path,
                        current: RwLock::new(cfg),
                    };
                }
                Err(e) => {
                    error!("Error decoding {}: {}. Using default settings.", path.display(), e);
                    WelcomeConfig::default()
                }
            },
            Err(_) => {
                info!("{} not found. Creating with default settings.", path.display());
                WelcomeConfig::default()
            }
        };

        if let Err(e) = write_config(&path, &config) {
            error!("{}", e);
        }
        Self {
            path,
            current: RwLock::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> WelcomeConfig {
        self.current.read().await.clone()
    }

    /// Read-modify-write. The change is kept in memory even if saving fails.
    pub async fn update<T>(
        &self,
        f: impl FnOnce(&mut WelcomeConfig) -> T,
    ) -> Result<T, ConfigError> {
        let mut guard = self.current.write().await;
        let out = f(&mut guard);
        write_config(&self.path, &guard).inspect_err(|e| error!("{}", e))?;
        Ok(out)
    }
}

fn write_config(path: &Path, config: &WelcomeConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Save {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, json).map_err(|source| ConfigError::Save {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Settings saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::num::NonZeroU64;

    pub(crate) fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "welcome_bot_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = temp_dir("store_missing");
        let path = dir.join("config.json");

        let store = ConfigStore::open(&path);
        assert_eq!(store.snapshot().await, WelcomeConfig::default());
        let on_disk: WelcomeConfig =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, WelcomeConfig::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn malformed_file_is_reset() {
        let dir = temp_dir("store_malformed");
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = ConfigStore::open(&path);
        assert_eq!(store.snapshot().await, WelcomeConfig::default());
        assert!(serde_json::from_str::<WelcomeConfig>(&std::fs::read_to_string(&path).unwrap()).is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn updates_are_persisted_and_reloaded() {
        let dir = temp_dir("store_update");
        let path = dir.join("config.json");

        let store = ConfigStore::open(&path);
        let enabled = store
            .update(|cfg| {
                cfg.welcome_enabled = !cfg.welcome_enabled;
                cfg.welcome_channel_id = NonZeroU64::new(42);
                cfg.welcome_enabled
            })
            .await
            .unwrap();
        assert!(!enabled);

        let reopened = ConfigStore::open(&path).snapshot().await;
        assert!(!reopened.welcome_enabled);
        assert_eq!(reopened.welcome_channel_id, NonZeroU64::new(42));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn failed_save_keeps_change_in_memory() {
        let dir = temp_dir("store_unwritable");
        // a directory where the file should be makes every write fail
        let path = dir.join("config.json");
        std::fs::create_dir_all(&path).unwrap();

        let store = ConfigStore::open(&path);
        let result = store.update(|cfg| cfg.font_color = [1, 2, 3]).await;
        assert!(matches!(result, Err(ConfigError::Save { .. })));
        assert_eq!(store.snapshot().await.font_color, [1, 2, 3]);

        std::fs::remove_dir_all(&dir).ok();
    }
}
