// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor forwarder CLI
//!
//! Forwards air-quality uplinks from a TTN application to public data
//! collectors.
//!
//! # Usage
//!
//! ```bash
//! # Run with a configuration file
//! sensor-forwarder --config forwarder.toml
//!
//! # Write an example configuration
//! sensor-forwarder gen-config --output forwarder.toml
//!
//! # Check a configuration file
//! sensor-forwarder validate --config forwarder.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam::channel::{self, RecvTimeoutError};
use sensor_forwarder::{
    AttributeRefresher, DispatchStatsSnapshot, Forwarder, ForwarderConfig, MqttListener,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "sensor-forwarder")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Forward LoRaWAN air-quality uplinks to Luftdaten, FeinStaub and openSenseMap")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "forwarder.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "forwarder.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(cmd) = cli.command {
        init_logging(cli.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config = ForwarderConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    init_logging(cli.log_level.as_deref().unwrap_or(&config.log_level));

    run(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn run(config: ForwarderConfig) -> Result<()> {
    tracing::info!(
        name = %config.name,
        encoding = %config.encoding,
        destinations = ?config.enabled_destinations(),
        "Starting sensor forwarder v{}",
        env!("CARGO_PKG_VERSION")
    );

    let forwarder =
        Arc::new(Forwarder::from_config(&config).context("Failed to create destinations")?);
    forwarder.start().context("Failed to start dispatchers")?;

    let mut refresher = match &config.attributes.file {
        Some(path) => {
            let fwd = Arc::clone(&forwarder);
            let refresher = AttributeRefresher::spawn(
                path.clone(),
                config.attributes.refresh_interval(),
                move |attributes| fwd.process_attributes(attributes),
            )
            .context("Failed to start attribute refresher")?;
            Some(refresher)
        }
        None => {
            tracing::info!("No attribute file configured, routed destinations will skip");
            None
        }
    };

    let mut listener = if config.mqtt.enabled {
        let fwd = Arc::clone(&forwarder);
        let listener = MqttListener::start(&config.mqtt, move |received_at, topic, message| {
            fwd.on_message(received_at, topic, message)
        })
        .context("Failed to start MQTT listener")?;
        Some(listener)
    } else {
        tracing::warn!("MQTT disabled, no uplinks will be received");
        None
    };

    let (stop_tx, stop_rx) = channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        let _ = stop_tx.try_send(());
    })
    .context("Failed to install Ctrl+C handler")?;

    if config.stats_interval_secs > 0 {
        let interval = Duration::from_secs(config.stats_interval_secs);
        loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => log_stats(&forwarder.stats()),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    } else {
        let _ = stop_rx.recv();
    }

    // Stop ingestion first, then drain the upload queues up to the deadline.
    if let Some(listener) = listener.as_mut() {
        listener.stop();
    }
    if let Some(refresher) = refresher.as_mut() {
        refresher.stop();
    }
    forwarder.stop();

    tracing::info!("Final statistics:");
    log_stats(&forwarder.stats());
    tracing::info!("Sensor forwarder shutdown complete");
    Ok(())
}

fn log_stats(stats: &[DispatchStatsSnapshot]) {
    for stat in stats {
        tracing::info!("{}", format_stats(stat));
    }
}

fn format_stats(stat: &DispatchStatsSnapshot) -> String {
    format!(
        "{}: {} scheduled, {} delivered, {} rejected, {} failed, {} skipped, {} dropped, {} faults",
        stat.destination,
        stat.scheduled,
        stat.delivered,
        stat.rejected,
        stat.transport_errors,
        stat.skipped,
        stat.dropped + stat.rejected_tasks + stat.abandoned,
        stat.faults
    )
}

fn cmd_gen_config(output: PathBuf) -> Result<()> {
    let mut config = ForwarderConfig::default();
    config.mqtt.app_id = "my-ttn-application".into();
    config.mqtt.app_key = "ttn-account-v2.replace-me".into();
    config.attributes.file = Some(PathBuf::from("devices.toml"));

    let toml_str = config.to_toml_string()?;
    let content = format!(
        r#"# Sensor Forwarder Configuration
# Generated by sensor-forwarder gen-config
#
# Device attributes (devices.toml):
#   [devices."0004A30B001F1234"]
#   opensense-id = "5a0c2cc89fd3c200111118f0"

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<()> {
    match ForwarderConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Forwarder: {}", config.name);
            println!("Encoding: {}", config.encoding);
            println!("Destinations: {}", config.enabled_destinations().join(", "));
            if config.mqtt.enabled {
                println!(
                    "MQTT: {}:{} topic '{}'",
                    config.mqtt.host, config.mqtt.port, config.mqtt.topic
                );
            }
            if let Some(file) = &config.attributes.file {
                println!(
                    "Attributes: {} (every {}s)",
                    file.display(),
                    config.attributes.refresh_secs
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_stats() {
        let stat = DispatchStatsSnapshot {
            destination: "opensense".into(),
            scheduled: 10,
            delivered: 7,
            rejected: 1,
            transport_errors: 1,
            skipped: 1,
            dropped: 2,
            rejected_tasks: 1,
            faults: 0,
            abandoned: 2,
            uptime_secs: 60,
        };
        assert_eq!(
            format_stats(&stat),
            concat!(
                "opensense: 10 scheduled, 7 delivered, 1 rejected, 1 failed, 1 skipped, ",
                "5 dropped, 0 faults"
            )
        );
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["sensor-forwarder", "validate", "--config", "x.toml"]);
        assert!(matches!(cli.command, Some(Commands::Validate { .. })));

        let cli = Cli::parse_from(["sensor-forwarder", "--log-level", "debug"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, PathBuf::from("forwarder.toml"));
    }

    #[test]
    fn test_gen_config_is_valid() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("forwarder.toml");
        cmd_gen_config(path.clone()).expect("gen-config");
        let config = ForwarderConfig::from_file(&path).expect("generated config loads");
        assert_eq!(config.mqtt.app_id, "my-ttn-application");
    }
}
