// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Runtime configuration, optionally read from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Paths and limits shared by all subcommands.
///
/// Every key is optional in the file; missing keys keep their defaults.
/// Durations are given in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub db_path: PathBuf,
    /// Raw payloads of each poll are copied here when set
    pub backup_dir: Option<PathBuf>,
    pub pbsnodes: PathBuf,
    pub qstat: PathBuf,
    /// Repeat observations of a job within this many seconds are not stored
    pub dedup_window_secs: u64,
    pub command_timeout_secs: u64,
    pub live_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("/var/lib/pbs_monitor/pbs_stats.db"),
            backup_dir: None,
            pbsnodes: PathBuf::from("/opt/pbs/bin/pbsnodes"),
            qstat: PathBuf::from("/opt/pbs/bin/qstat"),
            dedup_window_secs: 5 * 60,
            command_timeout_secs: 30,
            live_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Defaults overlaid with the keys present in `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), ?config, "loaded config");
        Ok(config)
    }

    /// [`Config::load`] if a path was given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.dedup_window_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn live_timeout(&self) -> Duration {
        Duration::from_secs(self.live_timeout_secs)
    }
}
