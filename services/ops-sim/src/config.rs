// services/ops-sim/src/config.rs
//
// Simulator configuration: optional YAML file layered under OPS_SIM__* env vars
//

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use svckit::config::ObservabilityConfig;
use svckit::errors::SimError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub publisher: PublisherConfig,
    pub panels: PanelConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub interval_ms: u64,
    /// Chance per tick of appending a synthesized transaction
    pub transaction_probability: f64,
    /// Chance per tick of nudging the compliance metrics
    pub metrics_probability: f64,
    pub transaction_capacity: usize,
    /// Fixed seed for reproducible runs; entropy when unset
    pub seed: Option<u64>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            transaction_probability: 0.3,
            metrics_probability: 0.2,
            transaction_capacity: 10,
            seed: None,
        }
    }
}

impl PublisherConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.interval_ms == 0 {
            return Err(SimError::ConfigError("publisher.interval_ms must be > 0".to_string()));
        }
        if self.transaction_capacity == 0 {
            return Err(SimError::ConfigError(
                "publisher.transaction_capacity must be > 0".to_string(),
            ));
        }
        check_probability("publisher.transaction_probability", self.transaction_probability)?;
        check_probability("publisher.metrics_probability", self.metrics_probability)?;
        Ok(())
    }
}

/// Cadence of the dashboard panel simulations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub interval_ms: u64,
    pub update_probability: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            update_probability: 0.7,
        }
    }
}

impl PanelConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if self.interval_ms == 0 {
            return Err(SimError::ConfigError("panels.interval_ms must be > 0".to_string()));
        }
        check_probability("panels.update_probability", self.update_probability)
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        self.publisher.validate()?;
        self.panels.validate()
    }
}

fn check_probability(field: &str, value: f64) -> Result<(), SimError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::ConfigError(format!(
            "{} must be within [0, 1], got {}",
            field, value
        )))
    }
}

/// Load configuration from `path` (skipped when the file does not exist)
/// with `OPS_SIM__SECTION__KEY` environment overrides on top.
pub fn load_config(path: &str) -> Result<SimulatorConfig, SimError> {
    let config = Config::builder()
        .add_source(File::with_name(path).required(Path::new(path).exists()))
        .add_source(
            Environment::with_prefix("OPS_SIM")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config: SimulatorConfig = config.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.publisher.interval(), Duration::from_millis(3_000));
        assert_eq!(config.publisher.transaction_capacity, 10);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut publisher = PublisherConfig::default();
        publisher.transaction_probability = 1.5;
        assert!(matches!(publisher.validate(), Err(SimError::ConfigError(_))));

        let mut publisher = PublisherConfig::default();
        publisher.interval_ms = 0;
        assert!(publisher.validate().is_err());

        let mut publisher = PublisherConfig::default();
        publisher.transaction_capacity = 0;
        assert!(publisher.validate().is_err());

        let mut panels = PanelConfig::default();
        panels.update_probability = -0.1;
        assert!(panels.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_load_yaml_file() {
        let dir = std::env::temp_dir().join(format!("ops-sim-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ops-sim.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "publisher:\n  interval_ms: 250\n  seed: 42\nobservability:\n  log_level: debug"
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.publisher.interval_ms, 250);
        assert_eq!(config.publisher.seed, Some(42));
        assert_eq!(config.publisher.transaction_capacity, 10);
        assert_eq!(config.observability.log_level, "debug");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config("/nonexistent/ops-sim.yaml").unwrap();
        assert_eq!(config.publisher.interval_ms, 3_000);
    }

    #[test]
    #[serial]
    fn test_invalid_file_is_rejected() {
        let dir = std::env::temp_dir().join(format!("ops-sim-bad-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ops-sim.yaml");
        std::fs::write(&path, "publisher:\n  metrics_probability: 3.0\n").unwrap();

        let result = load_config(path.to_str().unwrap());
        assert!(matches!(result, Err(SimError::ConfigError(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_env_overrides_yaml_file() {
        let dir = std::env::temp_dir().join(format!("ops-sim-env-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ops-sim.yaml");
        std::fs::write(
            &path,
            "publisher:\n  interval_ms: 250\n  transaction_capacity: 6\npanels:\n  update_probability: 0.9\n",
        )
        .unwrap();

        std::env::set_var("OPS_SIM__PUBLISHER__INTERVAL_MS", "750");
        std::env::set_var("OPS_SIM__PANELS__UPDATE_PROBABILITY", "0.25");
        let result = load_config(path.to_str().unwrap());
        std::env::remove_var("OPS_SIM__PUBLISHER__INTERVAL_MS");
        std::env::remove_var("OPS_SIM__PANELS__UPDATE_PROBABILITY");
        std::fs::remove_dir_all(&dir).unwrap();

        let config = result.unwrap();
        assert_eq!(config.publisher.interval_ms, 750);
        assert_eq!(config.panels.update_probability, 0.25);
        // Keys without an override still come from the file
        assert_eq!(config.publisher.transaction_capacity, 6);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_rejected() {
        std::env::set_var("OPS_SIM__PUBLISHER__TRANSACTION_PROBABILITY", "2.5");
        let result = load_config("/nonexistent/ops-sim.yaml");
        std::env::remove_var("OPS_SIM__PUBLISHER__TRANSACTION_PROBABILITY");

        assert!(matches!(result, Err(SimError::ConfigError(_))));
    }
}
