use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::driver::DEFAULT_MAX_AGE_HOURS;
use crate::record::BuildState;
use crate::{rlog_debug, Error, Result};

/// Settings file, `~/.buildreap/config.toml` unless overridden. Every field
/// is optional in the file; command-line flags win over file values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub redis_host: String,
    pub redis_port: u16,
    pub artifacts_dir: String,
    pub max_age_hours: u32,
    /// States removed by `--clean-failed`.
    pub clean_statuses: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            artifacts_dir: "base/artifacts".to_string(),
            max_age_hours: DEFAULT_MAX_AGE_HOURS,
            clean_statuses: BuildState::DEFAULT_CLEAN
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        }
    }
}

impl Config {
    pub fn buildreap_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".buildreap"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::buildreap_dir()?.join("config.toml"))
    }

    /// Loads the default config file, falling back to defaults when there
    /// is no home directory or no file.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Ok(path) => Self::load_from(&path),
            Err(Error::NoHomeDir) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        rlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            rlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        rlog_debug!(
            "Config loaded: redis={}:{}, artifacts_dir={}, max_age_hours={}, statuses={:?}",
            config.redis_host,
            config.redis_port,
            config.artifacts_dir,
            config.max_age_hours,
            config.clean_statuses
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                rlog_debug!("Creating config directory: {}", parent.display());
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        rlog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.redis_host.trim().is_empty() {
            return Err(Error::Validation("redis_host must not be empty".to_string()));
        }
        if self.redis_port == 0 {
            return Err(Error::Validation("redis_port must not be 0".to_string()));
        }
        self.statuses()?;
        Ok(())
    }

    pub fn artifacts_path(&self) -> PathBuf {
        expand_tilde(&self.artifacts_dir)
    }

    pub fn statuses(&self) -> Result<BTreeSet<BuildState>> {
        self.clean_statuses.iter().map(|s| s.parse()).collect()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
