use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::combine::CombineOptions;
use crate::error::{CallweaveError, Result};

/// Default config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "callweave.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage locations
    pub storage: StorageConfig,

    /// Default options for combining definitions
    pub combine: CombineConfig,

    /// Loader worker pool
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory scanned for `.json` / `.bin` definition records
    pub definitions_dir: PathBuf,

    /// TOML file holding memos, modules, aliases and classifications
    pub metadata_path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombineConfig {
    pub group_by_module: bool,
    pub compound: bool,
    pub concentrate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Share of CPU cores given to the loader pool, in (0, 1]
    pub worker_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            combine: CombineConfig::default(),
            workers: WorkerConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            definitions_dir: PathBuf::from("definitions"),
            metadata_path: PathBuf::from("metadata.toml"),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { worker_ratio: 0.5 }
    }
}

impl CombineConfig {
    pub fn to_options(&self) -> CombineOptions {
        CombineOptions {
            group_by_module: self.group_by_module,
            compound: self.compound,
            concentrate: self.concentrate,
            ..CombineOptions::default()
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| CallweaveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CallweaveError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load `path`, or `callweave.toml` when no path is given. A missing
    /// file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let path = match &path {
            Some(p) => p.as_ref().to_path_buf(),
            None => PathBuf::from(CONFIG_FILE_NAME),
        };

        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        let ratio = self.workers.worker_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(CallweaveError::Config(format!(
                "workers.worker_ratio must be in (0, 1], got {}",
                ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[combine]\ncompound = true\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.combine.compound);
        assert!(!config.combine.group_by_module);
        assert_eq!(config.storage.definitions_dir, PathBuf::from("definitions"));
        assert_eq!(config.workers.worker_ratio, 0.5);
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_or_default(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = Config::default();
        config.combine.group_by_module = true;
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);
        assert!(Config::load(&path).unwrap().combine.to_options().group_by_module);
    }

    #[test]
    fn test_invalid_worker_ratio() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[workers]\nworker_ratio = 0.0\n").unwrap();
        assert!(matches!(Config::load(&path), Err(CallweaveError::Config(_))));
    }
}
