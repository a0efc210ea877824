//! CLI/env/file configuration loading.
//!
//! Precedence, highest first: CLI flags, environment variables, the
//! TOML file named by `--config`, then [`dayrunner_core::PolicyConfig`]
//! defaults. `clap`'s `env` feature folds the first two layers
//! together; the TOML file is merged in underneath by treating its
//! parsed [`dayrunner_core::Config`] as the base and overlaying
//! whichever CLI/env fields were actually supplied.

use std::path::PathBuf;

use clap::Parser;
use dayrunner_core::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error(transparent)]
    Invalid(#[from] dayrunner_core::ConfigError),
}

/// CLI entry point flags. Each maps to an environment variable of the
/// same name, upper-cased and prefixed `DAYRUNNER_` (clap's `env`
/// feature).
#[derive(Debug, Parser)]
#[command(name = "dayrunner", about = "Single-writer daily batch worker")]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, env = "DAYRUNNER_CONFIG")]
    pub config: PathBuf,

    /// Overrides `worker.workerId` from the config file.
    #[arg(long, env = "DAYRUNNER_WORKER_ID")]
    pub worker_id: Option<String>,

    /// Health HTTP bind address.
    #[arg(long, env = "DAYRUNNER_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// Prometheus metrics HTTP bind address.
    #[arg(long, env = "DAYRUNNER_METRICS_ADDR", default_value = "0.0.0.0:9090")]
    pub metrics_addr: String,

    /// Storage backend for leases and progress: `memory` or `postgres`.
    #[arg(long, env = "DAYRUNNER_STORE_BACKEND", default_value = "postgres")]
    pub store_backend: String,

    /// Run once and exit instead of looping through Follower/Candidate
    /// forever; intended for dry runs and CI smoke tests.
    #[arg(long, env = "DAYRUNNER_ONCE")]
    pub once: bool,
}

impl Cli {
    /// Loads the TOML file at `self.config`, validates it, and applies
    /// CLI/env overrides.
    pub fn load(&self) -> Result<Config, ConfigLoadError> {
        let raw = std::fs::read_to_string(&self.config).map_err(|source| ConfigLoadError::Read {
            path: self.config.clone(),
            source,
        })?;
        let mut config: Config = toml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
            path: self.config.clone(),
            source,
        })?;

        if let Some(worker_id) = &self.worker_id {
            config.worker.worker_id = worker_id.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
