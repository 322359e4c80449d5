//! TOML configuration for gfakt.
//!
//! Every field has a default, so an empty or partial file is valid. Command
//! line flags are applied on top of whatever is loaded here.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "GFAKT_CONFIG";

/// Config file picked up from the current directory when present.
pub const LOCAL_CONFIG: &str = "gfakt.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GfaktConfig {
    #[serde(default)]
    pub ecm: EcmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl GfaktConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve configuration, in order:
    /// 1. `explicit` (errors if it cannot be loaded).
    /// 2. The path in `GFAKT_CONFIG` (errors if it cannot be loaded).
    /// 3. `./gfakt.toml`.
    /// 4. Compiled-in defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&env_path))
                .with_context(|| format!("{} is set to {}", CONFIG_ENV, env_path));
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            return Self::load(local);
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.pipeline.devices.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one GPU device is required".to_string(),
            ));
        }
        if self.pipeline.stage2_slots == 0 {
            return Err(PipelineError::InvalidConfig(
                "stage-2 thread count must be at least 1".to_string(),
            ));
        }
        if self.pipeline.curves == Some(0) {
            return Err(PipelineError::InvalidConfig(
                "curve count must be positive".to_string(),
            ));
        }
        match self.pipeline.b1.as_deref().map(str::trim) {
            None => Err(PipelineError::InvalidConfig(
                "B1 bound is required, on the command line or as pipeline.b1".to_string(),
            )),
            Some("") => Err(PipelineError::InvalidConfig(
                "B1 bound must not be empty".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// GMP-ECM
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EcmConfig {
    /// Path to the GPU-enabled GMP-ECM binary.
    pub path: PathBuf,
}

impl Default for EcmConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("gpu_ecm"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory for input, save, checkpoint and log files.
    pub work_dir: PathBuf,
    /// GPU device ids; one stage-1 worker per device.
    pub devices: Vec<u32>,
    /// Maximum concurrent stage-2 processes, and the number of shards each
    /// save file is split into.
    pub stage2_slots: usize,
    /// Curves per stage-1 run. Unset lets GMP-ECM choose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub curves: Option<u32>,
    /// Stage-1 bound B1. The command line value wins when both are given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub b1: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            devices: vec![0],
            stage2_slots: 1,
            curves: None,
            b1: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file; always written at debug level.
    pub log_file: PathBuf,
    /// Debug-level console output. Reports are echoed to stdout only when
    /// this is off.
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("gfakt.log"),
            verbose: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
