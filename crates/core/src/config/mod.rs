use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Result;

const ENV_PREFIX: &str = "AUTOCUT_";

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub media_root: PathBuf,
    pub sfx_dir: PathBuf,
    pub captions_dir: PathBuf,
    pub template_path: PathBuf,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_media_root("media")
    }
}

impl AppConfig {
    /// Builds a configuration whose media directories all live under `root`.
    pub fn with_media_root(root: impl Into<PathBuf>) -> Self {
        let media_root = root.into();
        Self {
            sfx_dir: media_root.join("sfx"),
            captions_dir: media_root.join("captions"),
            media_root,
            template_path: PathBuf::from("templates").join("realistic_chaos.yaml"),
            log_level: "info".to_string(),
        }
    }

    /// Defaults overridden by `AUTOCUT_*` variables from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(format!("{ENV_PREFIX}{name}").as_str())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = match var("MEDIA_ROOT") {
            Some(root) => Self::with_media_root(root),
            None => Self::default(),
        };
        if let Some(dir) = var("SFX_DIR") {
            config.sfx_dir = PathBuf::from(dir);
        }
        if let Some(dir) = var("CAPTIONS_DIR") {
            config.captions_dir = PathBuf::from(dir);
        }
        if let Some(path) = var("TEMPLATE_PATH") {
            config.template_path = PathBuf::from(path);
        }
        if let Some(level) = var("LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }
        if var("DEBUG").is_some_and(|flag| matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes")) {
            config.log_level = "debug".to_string();
        }
        config
    }

    /// Creates every media directory referenced by the configuration.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.media_root, &self.sfx_dir, &self.captions_dir] {
            ensure_dir(dir)?;
        }
        Ok(())
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}
