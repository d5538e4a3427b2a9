//! Durable storage for the user configuration

use super::ChatConfig;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load/save of the single configuration record
pub trait ConfigRepository: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<ChatConfig>, ConfigError>;

    fn save(&self, config: &ChatConfig) -> Result<(), ConfigError>;
}

/// Configuration stored as one JSON file
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigRepository for FileConfigStore {
    fn load(&self) -> Result<Option<ChatConfig>, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, config: &ChatConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(config)?;

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        tracing::debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}
