// src/config.rs
use anyhow::{Context, Result, bail};
use log::{info, warn};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

// Absolute-points tolerance used by both the per-criterion and the aggregate rubric check
pub const SCORE_EPSILON: f64 = 0.01;

// Grader profile training
pub const MIN_TRAINING_SAMPLES: usize = 5;
pub const HOLDOUT_MIN_SAMPLES: usize = 10; // holdout evaluation only above this size
pub const HOLDOUT_FRACTION: f64 = 0.2;
pub const MODEL_SEED: u64 = 42;

// Random forest regressor
pub const FOREST_TREES: usize = 100;

// Isolation forest anomaly detector
pub const ISOLATION_TREES: usize = 100;
pub const ISOLATION_MAX_SAMPLES: usize = 256;
pub const ISOLATION_CONTAMINATION: f64 = 0.1;

// Strictness classification on the overall mean percentage
pub const STRICT_GRADING_MEAN: f64 = 75.0;
pub const LENIENT_GRADING_MEAN: f64 = 85.0;
pub const DETAILED_FEEDBACK_LENGTH: f64 = 100.0;

// Prediction confidence heuristic
pub const BASE_CONFIDENCE: f64 = 0.3;
pub const CONFIDENCE_PER_SAMPLE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 0.9;

// Anomaly significance
pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 15.0; // percentage points
pub const ANOMALY_STD_MULTIPLIER: f64 = 2.0;
pub const HIGH_SEVERITY_FACTOR: f64 = 1.5;

const DEFAULT_CANVAS_API_BASE: &str = "https://canvas.instructure.com";
const DEFAULT_CACHE_FILE: &str = "grades_cache.json";
const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_MONITOR_INTERVAL_HOURS: u64 = 6;

/// Runtime configuration for the binaries.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub canvas_api_base: String,
    pub canvas_token: String,
    pub grades_cache_file: PathBuf,
    pub model_dir: PathBuf,
    /// When unset, discrepancy drafts are only logged.
    pub outbox_file: Option<PathBuf>,
    pub monitor_interval: Duration,
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self> {
        let monitor_interval = match env::var("MONITOR_INTERVAL_HOURS") {
            Ok(raw) => parse_interval_hours(&raw)?,
            Err(_) => Duration::from_secs(DEFAULT_MONITOR_INTERVAL_HOURS * 3600),
        };

        let canvas_token = env::var("CANVAS_TOKEN").unwrap_or_default();
        if canvas_token.is_empty() {
            warn!("CANVAS_TOKEN is not set; Canvas requests will be unauthenticated");
        }

        Ok(AppConfig {
            canvas_api_base: env::var("CANVAS_API_BASE")
                .unwrap_or_else(|_| DEFAULT_CANVAS_API_BASE.to_string()),
            canvas_token,
            grades_cache_file: env::var("GRADES_CACHE_FILE")
                .unwrap_or_else(|_| DEFAULT_CACHE_FILE.to_string())
                .into(),
            model_dir: env::var("MODEL_DIR")
                .unwrap_or_else(|_| DEFAULT_MODEL_DIR.to_string())
                .into(),
            outbox_file: env::var("OUTBOX_FILE").ok().map(PathBuf::from),
            monitor_interval,
        })
    }
}

/// Parses `MONITOR_INTERVAL_HOURS`; the monitor ticker needs a positive period.
pub fn parse_interval_hours(raw: &str) -> Result<Duration> {
    let hours = raw
        .trim()
        .parse::<u64>()
        .with_context(|| format!("MONITOR_INTERVAL_HOURS is not a number: {}", raw))?;
    if hours == 0 {
        bail!("MONITOR_INTERVAL_HOURS must be at least 1");
    }
    let secs = hours
        .checked_mul(3600)
        .with_context(|| format!("MONITOR_INTERVAL_HOURS is too large: {}", raw))?;
    Ok(Duration::from_secs(secs))
}

/// Loads the first `.env` file found among the usual locations.
/// Variables already present in the environment win.
pub fn load_env_files() {
    let env_paths = [".env", ".env.local", "../.env"];
    for path in env_paths.iter() {
        if Path::new(path).exists() {
            match dotenv::from_path(path) {
                Ok(_) => {
                    info!("Loaded environment variables from {}", path);
                    return;
                }
                Err(e) => warn!("Failed to load environment from {}: {}", path, e),
            }
        }
    }
    info!("No .env file found, using environment variables from system");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_hours_convert_to_seconds() {
        assert_eq!(parse_interval_hours("6").unwrap(), Duration::from_secs(6 * 3600));
        assert_eq!(parse_interval_hours(" 1 ").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_or_overflowing_interval_is_rejected() {
        assert!(parse_interval_hours("0").is_err());
        assert!(parse_interval_hours(&u64::MAX.to_string()).is_err());
        assert!(parse_interval_hours("six").is_err());
    }
}
