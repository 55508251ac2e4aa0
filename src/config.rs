use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::aggregate::ScoringConfig;
use crate::pipeline::checkers::PipelineConfig;
use crate::pipeline::extraction::ExtractionConfig;

/// Application-level constants
pub const APP_NAME: &str = "docreview";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overrides the data directory (tests, portable installs).
pub const HOME_ENV: &str = "DOCREVIEW_HOME";

/// Get the application data directory.
/// `$DOCREVIEW_HOME` if set, otherwise ~/.docreview/ (falls back to the
/// working directory when no home directory can be determined).
pub fn app_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docreview")
}

/// Directory holding one durable result file per scan job
pub fn results_dir() -> PathBuf {
    app_data_dir().join("results")
}

/// SQLite database backing the adaptive learning store
pub fn learning_db_path() -> PathBuf {
    app_data_dir().join("learning.db")
}

/// Default config file location
pub fn config_path() -> PathBuf {
    app_data_dir().join("config.json")
}

/// Filter used when RUST_LOG is not set.
pub fn default_log_filter() -> &'static str {
    "docreview=info,warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Controller
// ═══════════════════════════════════════════════════════════

/// Scheduling limits for the scan controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Workers allowed to run at the same time.
    pub max_workers: usize,
    /// Jobs allowed to wait for a worker slot. Submissions beyond this are rejected.
    pub max_queue_depth: usize,
    /// Wall-clock budget per job unless the request overrides it.
    pub default_timeout_secs: u64,
    /// Time a worker gets to stop after termination is requested.
    pub grace_period_ms: u64,
    /// Upper bound on a single monitor wait for progress.
    pub monitor_tick_ms: u64,
    /// Capacity of the shared worker → controller channel.
    pub progress_channel_capacity: usize,
    /// Terminal jobs older than this are dropped by `prune_finished`.
    pub retention_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_queue_depth: 16,
            default_timeout_secs: 600,
            grace_period_ms: 5_000,
            monitor_tick_ms: 100,
            progress_channel_capacity: 256,
            retention_secs: 24 * 60 * 60,
        }
    }
}

impl ControllerConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn monitor_tick(&self) -> Duration {
        Duration::from_millis(self.monitor_tick_ms.max(1))
    }
}

// ═══════════════════════════════════════════════════════════
// Learning
// ═══════════════════════════════════════════════════════════

/// A single correction never moves confidence, whatever the configuration.
pub const MIN_OBSERVATIONS_FLOOR: u32 = 2;

/// Tuning for confidence adjustments derived from user corrections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Observations a pattern needs before it influences confidence.
    pub min_observations: u32,
    /// Half-life of a pattern's influence, in days.
    pub half_life_days: f64,
    /// Largest absolute confidence delta a pattern can produce.
    pub max_adjustment: f32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_observations: 2,
            half_life_days: 30.0,
            max_adjustment: 0.4,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Top-level config
// ═══════════════════════════════════════════════════════════

/// Everything the review engine can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub controller: ControllerConfig,
    pub extraction: ExtractionConfig,
    pub pipeline: PipelineConfig,
    pub scoring: ScoringConfig,
    pub learning: LearningConfig,
}

impl ReviewConfig {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ReviewConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.max_workers == 0 {
            return Err(ConfigError::Invalid("controller.max_workers must be at least 1".into()));
        }
        if self.controller.progress_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "controller.progress_channel_capacity must be at least 1".into(),
            ));
        }
        if self.learning.min_observations < MIN_OBSERVATIONS_FLOOR {
            return Err(ConfigError::Invalid(format!(
                "learning.min_observations must be at least {MIN_OBSERVATIONS_FLOOR}"
            )));
        }
        if self.learning.half_life_days <= 0.0 {
            return Err(ConfigError::Invalid("learning.half_life_days must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.learning.max_adjustment) {
            return Err(ConfigError::Invalid("learning.max_adjustment must be within 0..=1".into()));
        }
        self.pipeline
            .phase_weights
            .validate()
            .map_err(ConfigError::Invalid)?;
        self.scoring.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}
