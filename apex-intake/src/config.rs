//! Service settings resolution for apex-intake
//!
//! **Priority:** CLI → ENV → TOML → compiled default
//!
//! clap covers the first two tiers (`env = ...` fallbacks); the TOML layer
//! comes from [`apex_common::config`].

use crate::detection::orchestrator::{DEFAULT_TICK_INTERVAL, DEFAULT_TIER_TIMEOUT};
use crate::detection::OrchestratorConfig;
use apex_common::config::TomlConfig;
use apex_common::{ReferenceDataset, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5740";
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Command-line arguments
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "apex-intake", version, about = "APEX document-intake detection service")]
pub struct Args {
    /// TOML config file (default: ~/.config/apex/apex-intake.toml, then /etc/apex/)
    #[arg(long, env = "APEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Socket address to listen on
    #[arg(long, env = "APEX_LISTEN")]
    pub listen: Option<String>,

    /// Reference dataset JSON fixture
    #[arg(long, env = "APEX_DATASET")]
    pub dataset: Option<PathBuf>,

    /// Scheduling tick per job, in milliseconds
    #[arg(long, env = "APEX_TICK_INTERVAL_MS")]
    pub tick_interval_ms: Option<u64>,

    /// Upper bound on a single tier call, in milliseconds
    #[arg(long, env = "APEX_TIER_TIMEOUT_MS")]
    pub tier_timeout_ms: Option<u64>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub listen: String,
    pub dataset_path: Option<PathBuf>,
    pub tick_interval: Duration,
    pub tier_timeout: Duration,
    pub event_capacity: usize,
    pub log_level: String,
}

impl Settings {
    /// Merge CLI/ENV arguments over the TOML file over defaults
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Self {
        let tick_interval = args
            .tick_interval_ms
            .or(toml.detection.tick_interval_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TICK_INTERVAL);

        let tier_timeout = args
            .tier_timeout_ms
            .or(toml.detection.tier_timeout_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIER_TIMEOUT);

        Self {
            listen: args
                .listen
                .clone()
                .or_else(|| toml.listen.clone())
                .unwrap_or_else(|| DEFAULT_LISTEN.to_string()),
            dataset_path: args.dataset.clone().or_else(|| toml.dataset_path.clone()),
            tick_interval,
            tier_timeout,
            event_capacity: toml.events.capacity.unwrap_or(DEFAULT_EVENT_CAPACITY),
            log_level: toml.logging.level.clone(),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            tick_interval: self.tick_interval,
            tier_timeout: self.tier_timeout,
        }
    }

    /// Load the configured dataset; an empty dataset when none is configured
    pub fn load_dataset(&self) -> Result<ReferenceDataset> {
        match &self.dataset_path {
            Some(path) => {
                let dataset = ReferenceDataset::load(path)?;
                info!(
                    path = %path.display(),
                    routines = dataset.routines.len(),
                    reports = dataset.reports.len(),
                    "Reference dataset loaded"
                );
                Ok(dataset)
            }
            None => {
                warn!("No reference dataset configured; every report will resolve as not found");
                Ok(ReferenceDataset::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_common::config::DetectionConfig;

    #[test]
    fn test_defaults_without_any_source() {
        let settings = Settings::resolve(&Args::default(), &TomlConfig::default());
        assert_eq!(settings.listen, DEFAULT_LISTEN);
        assert_eq!(settings.tick_interval, Duration::from_millis(500));
        assert_eq!(settings.tier_timeout, Duration::from_secs(10));
        assert_eq!(settings.event_capacity, DEFAULT_EVENT_CAPACITY);
        assert_eq!(settings.dataset_path, None);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let toml = TomlConfig {
            listen: Some("0.0.0.0:9000".to_string()),
            detection: DetectionConfig {
                tick_interval_ms: Some(250),
                tier_timeout_ms: None,
            },
            ..TomlConfig::default()
        };
        let settings = Settings::resolve(&Args::default(), &toml);
        assert_eq!(settings.listen, "0.0.0.0:9000");
        assert_eq!(settings.tick_interval, Duration::from_millis(250));
        assert_eq!(settings.tier_timeout, DEFAULT_TIER_TIMEOUT);
    }

    #[test]
    fn test_cli_overrides_toml() {
        let toml = TomlConfig {
            listen: Some("0.0.0.0:9000".to_string()),
            dataset_path: Some(PathBuf::from("/etc/apex/dataset.json")),
            detection: DetectionConfig {
                tick_interval_ms: Some(250),
                tier_timeout_ms: Some(1000),
            },
            ..TomlConfig::default()
        };
        let args = Args {
            listen: Some("127.0.0.1:1234".to_string()),
            dataset: Some(PathBuf::from("./fixtures/dataset.json")),
            tick_interval_ms: Some(50),
            ..Args::default()
        };

        let settings = Settings::resolve(&args, &toml);
        assert_eq!(settings.listen, "127.0.0.1:1234");
        assert_eq!(settings.dataset_path, Some(PathBuf::from("./fixtures/dataset.json")));
        assert_eq!(settings.tick_interval, Duration::from_millis(50));
        assert_eq!(settings.tier_timeout, Duration::from_millis(1000));
    }

    #[test]
    fn test_zero_interval_falls_back_to_default() {
        let args = Args {
            tick_interval_ms: Some(0),
            ..Args::default()
        };
        let settings = Settings::resolve(&args, &TomlConfig::default());
        assert_eq!(settings.tick_interval, DEFAULT_TICK_INTERVAL);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "apex-intake",
            "--listen",
            "0.0.0.0:8080",
            "--tier-timeout-ms",
            "750",
        ])
        .unwrap();
        assert_eq!(args.listen.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(args.tier_timeout_ms, Some(750));
    }
}
