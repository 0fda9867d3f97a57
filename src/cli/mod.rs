//! Command-line interface for Meterflow.
//!
//! Loads meter definitions, replays a JSON-lines file of events through
//! them and reports what reached the meter system.

use crate::core::config::ConfigBuilder;
use crate::core::{Config, MeterError, Result};
use crate::meter::{InMemoryMeterSystem, MeterEvent, MeterProcessService, MeterSystem, StatsSnapshot};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Replay metric events through declarative meters
#[derive(Parser, Debug)]
#[command(name = "meterflow")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/meterflow/meters.yaml)
    #[arg(short, long, env = "METERFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON-lines file of events to replay
    #[arg(short, long, env = "METERFLOW_EVENTS")]
    pub events: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "METERFLOW_DEBUG")]
    pub debug: bool,

    /// Print recorded values as JSON lines instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration from the given file or the default location.
    ///
    /// A missing default file yields an empty configuration; a missing
    /// explicit file is an error.
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = if let Some(path) = &self.config {
            path.clone()
        } else {
            let default_path = dirs::config_dir()
                .map(|d| d.join("meterflow").join("meters.yaml"))
                .unwrap_or_else(|| PathBuf::from("~/.config/meterflow/meters.yaml"));

            if default_path.exists() {
                default_path
            } else {
                return builder.debug(self.debug).build();
            }
        };

        match tokio::fs::read_to_string(&config_path).await {
            Ok(content) => {
                builder = builder.from_yaml(&content)?;
                tracing::info!("Loaded configuration from: {:?}", config_path);
            }
            Err(e) if self.config.is_some() => {
                return Err(MeterError::config(format!(
                    "Failed to read config file {:?}: {}",
                    config_path, e
                )));
            }
            Err(_) => {
                tracing::debug!("No config file found at {:?}, using defaults", config_path);
            }
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging.
    ///
    /// Debug mode wins over `METERFLOW_LOG_LEVEL`, which wins over the
    /// configured level.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = if config.debug {
            "debug".to_string()
        } else {
            std::env::var("METERFLOW_LOG_LEVEL")
                .unwrap_or_else(|_| config.logging.level.as_str().to_string())
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let fmt_layer = if config.logging.structured {
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .compact()
        } else {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact()
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| MeterError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Parse a JSON-lines event stream. Blank lines are skipped.
pub fn parse_events(content: &str) -> Result<Vec<MeterEvent>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| MeterError::InvalidEvent {
                line: index + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

/// Execute the Meterflow application.
pub async fn execute(cli: Cli) -> Result<()> {
    // Config is loaded before logging is up, so load failures are only returned
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Meters: {}", config.meters.len());
        for meter in &config.meters {
            println!(
                "    {} ({}, {})",
                meter.name, meter.scope.scope_type, meter.meter.operation
            );
        }
        return Ok(());
    }

    let Some(events_path) = &cli.events else {
        return Err(MeterError::config("No events file given, pass --events <FILE>"));
    };

    let content = tokio::fs::read_to_string(events_path).await?;
    let events = parse_events(&content)?;
    tracing::info!(events = events.len(), meters = config.meters.len(), "Replaying events");

    let system = Arc::new(InMemoryMeterSystem::new());
    let service = MeterProcessService::new(&config, Arc::clone(&system) as Arc<dyn MeterSystem>)?;
    let stats = service.process_batch(&events)?;

    if cli.json {
        for value in system.all_recorded() {
            println!("{}", serde_json::to_string(&value)?);
        }
    } else {
        print_summary(&system, &stats);
    }

    Ok(())
}

fn print_summary(system: &InMemoryMeterSystem, stats: &StatsSnapshot) {
    let mut per_meter: BTreeMap<String, usize> = BTreeMap::new();
    for value in system.all_recorded() {
        *per_meter.entry(value.metrics_name).or_default() += 1;
    }

    println!("Forwarded: {}", stats.forwarded);
    for (meter, count) in &per_meter {
        println!("  {}: {}", meter, count);
    }
    println!("Dropped: {}", stats.total_dropped());
    for (reason, count) in stats.drops() {
        println!("  {}: {}", reason.as_str(), count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["meterflow"]);

        assert!(!cli.debug);
        assert!(!cli.json);
        assert!(!cli.check_config);
        assert!(cli.events.is_none());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "meterflow",
            "--config",
            "meters.yaml",
            "--events",
            "events.jsonl",
            "--debug",
            "--json",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("meters.yaml")));
        assert_eq!(cli.events, Some(PathBuf::from("events.jsonl")));
        assert!(cli.debug);
        assert!(cli.json);
    }

    #[tokio::test]
    async fn test_load_config_carries_debug_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meters.yaml");
        std::fs::write(
            &path,
            "meters:\n  - name: requests\n    scope: { type: SERVICE }\n    meter: { operation: avg, value: requests }\n",
        )
        .unwrap();

        let cli = Cli::parse_from(["meterflow", "--config", path.to_str().unwrap(), "--debug"]);
        let config = cli.load_config().await.unwrap();
        assert!(config.debug);
        assert_eq!(config.meters.len(), 1);

        let cli = Cli::parse_from(["meterflow", "--config", path.to_str().unwrap()]);
        assert!(!cli.load_config().await.unwrap().debug);
    }

    #[tokio::test]
    async fn test_load_config_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let cli = Cli::parse_from(["meterflow", "--config", path.to_str().unwrap()]);
        assert!(matches!(cli.load_config().await, Err(MeterError::Config(_))));
    }

    #[test]
    fn test_parse_events() {
        let content = r#"
{"service":"checkout","service_instance":"pod-1","timestamp":0,"samples":[{"name":"requests","value":3.0}]}

{"service":"checkout","service_instance":"pod-2","timestamp":60000}
"#;
        let events = parse_events(content).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].samples.len(), 1);
        assert!(events[1].samples.is_empty());
    }

    #[test]
    fn test_parse_events_reports_line() {
        let content = "{\"service\":\"a\",\"service_instance\":\"b\",\"timestamp\":0}\nnot json\n";
        let err = parse_events(content).unwrap_err();

        assert!(matches!(err, MeterError::InvalidEvent { line: 2, .. }));
    }
}
