//! TOML configuration for tempstats.
//!
//! Layered: an explicit path, then the `TEMPSTATS_CONFIG` environment variable,
//! then `./tempstats.toml`, then compiled-in defaults. Command-line flags are
//! applied on top by the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accel::{BackendChoice, DeviceSelection};
use crate::stats::DEFAULT_GROUP_SIZE;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "TEMPSTATS_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "tempstats.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StatsConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try to load configuration from, in order:
    /// 1. The path specified by the `TEMPSTATS_CONFIG` environment variable.
    /// 2. `./tempstats.toml`.
    /// 3. Fall back to compiled-in defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "TEMPSTATS_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    pub fn device_selection(&self) -> DeviceSelection {
        DeviceSelection {
            backend: self.device.backend,
            platform: self.device.platform,
            device: self.device.device,
        }
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Dataset location and dispatch shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Whitespace-separated temperature records.
    pub data_path: PathBuf,
    /// Work-items per local group.
    pub group_size: usize,
    /// Number of histogram bins.
    pub bins: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("temp_lincolnshire.txt"),
            group_size: DEFAULT_GROUP_SIZE,
            bins: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: BackendChoice,
    pub platform: usize,
    pub device: usize,
    /// Deadline for the whole run in seconds; 0 disables it.
    pub timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: BackendChoice::Auto,
            platform: 0,
            device: 0,
            timeout_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = StatsConfig::default();
        assert_eq!(cfg.analysis.group_size, 1024);
        assert_eq!(cfg.analysis.bins, 10);
        assert_eq!(cfg.device.backend, BackendChoice::Auto);
        assert_eq!(cfg.device.timeout_secs, 300);
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn test_full_toml_parse() {
        let toml_str = r#"
[analysis]
data_path = "/data/temps.txt"
group_size = 256
bins = 24

[device]
backend = "opencl"
platform = 1
device = 2
timeout_secs = 0

[logging]
level = "debug"
json = true
"#;
        let cfg: StatsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.analysis.data_path, PathBuf::from("/data/temps.txt"));
        assert_eq!(cfg.analysis.group_size, 256);
        assert_eq!(cfg.analysis.bins, 24);
        assert_eq!(cfg.device.backend, BackendChoice::OpenCl);
        assert_eq!(cfg.device.platform, 1);
        assert_eq!(cfg.device.device, 2);
        assert_eq!(cfg.device.timeout_secs, 0);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
[device]
backend = "work-group"
"#;
        let cfg: StatsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.device.backend, BackendChoice::WorkGroup);
        assert_eq!(cfg.device.platform, 0);
        assert_eq!(cfg.analysis.group_size, 1024);
        assert_eq!(cfg.logging.level, "warn");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let toml_str = r#"
[device]
backend = "cuda"
"#;
        assert!(toml::from_str::<StatsConfig>(toml_str).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tempstats.toml");
        std::fs::write(&path, "[analysis]\nbins = 5\n").unwrap();

        let cfg = StatsConfig::load(&path).unwrap();
        assert_eq!(cfg.analysis.bins, 5);
    }

    #[test]
    fn test_load_missing_file_errors() {
        assert!(StatsConfig::load(Path::new("/nonexistent/tempstats.toml")).is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = StatsConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let back: StatsConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(cfg.analysis.group_size, back.analysis.group_size);
        assert_eq!(cfg.device.backend, back.device.backend);
    }
}
