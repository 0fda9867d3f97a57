//! Configuration management for meterflow.
//!
//! Meters are declared in YAML:
//!
//! ```yaml
//! meters:
//!   - name: request_count
//!     scope: { type: SERVICE }
//!     meter: { operation: avg, value: request_count }
//! logging:
//!   level: info
//! ```

use crate::core::types::{MeterOperation, Scope};
use crate::core::{MeterError, Result};
use crate::meter::builder::format_meter_name;
use crate::meter::entity::validate_scope;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Complete configuration for meterflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Meter definitions
    pub meters: Vec<MeterDefinition>,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// A named meter: scope, expression and aggregation operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterDefinition {
    /// Configured name, registered as `meter_<name>`
    pub name: String,
    /// Granularity the meter's entity is resolved at
    pub scope: Scope,
    /// Expression and aggregation
    pub meter: MeterFunction,
}

/// Expression and aggregation of a meter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterFunction {
    /// Operation name, one of `avg`, `avgHistogram`, `avgHistogramPercentile`
    pub operation: String,
    /// Expression handed to the evaluator
    pub value: String,
    /// Percentile ranks, only for `avgHistogramPercentile`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub percentile: Vec<i32>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl MeterDefinition {
    /// Creates a definition without percentiles
    pub fn new<N, O, V>(name: N, scope: Scope, operation: O, value: V) -> Self
    where
        N: Into<String>,
        O: Into<String>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            scope,
            meter: MeterFunction {
                operation: operation.into(),
                value: value.into(),
                percentile: Vec::new(),
            },
        }
    }

    /// Sets percentile ranks
    pub fn with_percentiles(mut self, percentiles: Vec<i32>) -> Self {
        self.meter.percentile = percentiles;
        self
    }

    /// Parsed operation, if supported
    pub fn operation(&self) -> Result<MeterOperation> {
        self.meter.operation.parse()
    }

    /// Validate a single definition
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MeterError::config("meter name must not be empty"));
        }

        if self.meter.value.trim().is_empty() {
            return Err(MeterError::config(format!(
                "meter '{}' has an empty value expression",
                self.name
            )));
        }

        let operation = self.operation().map_err(|_| {
            MeterError::config(format!(
                "meter '{}' uses unsupported operation '{}'",
                self.name, self.meter.operation
            ))
        })?;

        if operation.requires_percentiles() && self.meter.percentile.is_empty() {
            return Err(MeterError::config(format!(
                "meter '{}' uses {} but declares no percentiles",
                self.name, operation
            )));
        }

        if !operation.requires_percentiles() && !self.meter.percentile.is_empty() {
            return Err(MeterError::config(format!(
                "meter '{}' declares percentiles but uses {}",
                self.name, operation
            )));
        }

        if let Some(rank) = self.meter.percentile.iter().find(|rank| !(1..=100).contains(*rank)) {
            return Err(MeterError::config(format!(
                "meter '{}' has percentile {} outside 1..=100",
                self.name, rank
            )));
        }

        validate_scope(&format_meter_name(&self.name), &self.scope)
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for meter in &self.meters {
            meter.validate()?;
            if !names.insert(meter.name.as_str()) {
                return Err(MeterError::config(format!("duplicate meter name '{}'", meter.name)));
            }
        }
        Ok(())
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| MeterError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MeterError::config(format!("Failed to read config file {:?}: {}", path.as_ref(), e))
        })?;
        self.from_yaml(&content)
    }

    /// Add a meter definition
    pub fn meter(mut self, meter: MeterDefinition) -> Self {
        self.config.meters.push(meter);
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ScopeType;

    fn avg(name: &str) -> MeterDefinition {
        MeterDefinition::new(name, Scope::service(), "avg", name)
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.meters.is_empty());
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_unsupported_operation() {
        let config = ConfigBuilder::new()
            .meter(MeterDefinition::new("total", Scope::service(), "sum", "total"))
            .build();
        assert!(config.is_err());
    }

    #[test]
    fn test_percentiles_required_for_percentile_operation() {
        let meter = MeterDefinition::new("latency", Scope::service(), "avgHistogramPercentile", "latency");
        assert!(meter.validate().is_err());
        assert!(meter.clone().with_percentiles(vec![50, 99]).validate().is_ok());
        assert!(meter.with_percentiles(vec![0]).validate().is_err());
    }

    #[test]
    fn test_percentiles_rejected_for_other_operations() {
        let meter = MeterDefinition::new("latency", Scope::service(), "avgHistogram", "latency")
            .with_percentiles(vec![50]);
        assert!(meter.validate().is_err());
    }

    #[test]
    fn test_duplicate_names() {
        let config = ConfigBuilder::new().meter(avg("a")).meter(avg("a")).build();
        assert!(config.is_err());
    }

    #[test]
    fn test_endpoint_scope_requires_endpoint() {
        let meter = MeterDefinition::new(
            "latency",
            Scope {
                scope_type: ScopeType::Endpoint,
                endpoint: None,
            },
            "avg",
            "latency",
        );
        assert!(matches!(meter.validate(), Err(MeterError::MissingEndpoint { .. })));
    }

    #[test]
    fn test_empty_name_and_expression() {
        assert!(avg("  ").validate().is_err());
        let mut meter = avg("a");
        meter.meter.value = String::new();
        assert!(meter.validate().is_err());
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
meters:
  - name: request_count
    scope:
      type: SERVICE
    meter:
      operation: avg
      value: request_count
  - name: latency
    scope:
      type: ENDPOINT
      endpoint: /orders
    meter:
      operation: avgHistogramPercentile
      value: latency
      percentile: [50, 99]
logging:
  level: debug
"#;

        let config = ConfigBuilder::new().from_yaml(yaml).unwrap().build();

        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.meters.len(), 2);
        assert_eq!(config.meters[0].operation().unwrap(), MeterOperation::Avg);
        assert_eq!(config.meters[1].scope, Scope::endpoint("/orders"));
        assert_eq!(config.meters[1].meter.percentile, vec![50, 99]);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_yaml_unsupported_scope() {
        let yaml = r#"
meters:
  - name: a
    scope: { type: DATABASE }
    meter: { operation: avg, value: a }
"#;
        let err = ConfigBuilder::new().from_yaml(yaml).err().unwrap();
        assert!(err.to_string().contains("Unsupported scope type: DATABASE"));
    }
}
