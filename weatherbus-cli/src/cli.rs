use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::watch;
use tracing::{error, info, warn};

use weatherbus_core::{Config, NatsPublisher, OpenWeatherClient, Pipeline, Scheduler};

use crate::logging;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weatherbus",
    version,
    about = "Publish OpenWeather current conditions to a NATS topic"
)]
pub struct Cli {
    /// Path to a YAML (or .toml) config file. Environment variables override it.
    #[arg(short, long, env = "WEATHERBUS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Run a single cycle and exit.
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load(self.config.as_deref()).context("Failed to load configuration")?;
        logging::init(&config.log_level)?;

        info!(
            nats_server = %config.nats_server,
            topic = %config.nats_topic,
            zip = %config.zip_code,
            interval_secs = config.poll_interval_secs,
            unit = %config.temperature_unit,
            "Starting weatherbus"
        );

        let source = OpenWeatherClient::new(config.upstream_url()?, config.http_timeout())
            .context("Failed to build HTTP client")?;
        let publisher = NatsPublisher::connect(&config.nats_server, config.nats_connect_timeout())
            .await
            .context("Could not instantiate NATS client")?;

        let config = Arc::new(config);
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(source),
            Arc::new(publisher.clone()),
            Arc::clone(&config),
        ));

        let result = if self.once {
            pipeline
                .run_cycle()
                .await
                .map(|report| info!(id = %report.envelope_id, "Single cycle complete"))
                .context("Weather cycle failed")
        } else {
            let (shutdown_tx, shutdown_rx) = watch::channel(());
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Received Ctrl+C, shutting down gracefully...");
                        let _ = shutdown_tx.send(());
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to listen for Ctrl+C");
                        // Holding the sender keeps the loop running.
                        std::future::pending::<()>().await;
                    }
                }
            });

            Scheduler::new(pipeline, config.poll_interval())
                .run(shutdown_rx, None)
                .await;
            Ok(())
        };

        if let Err(e) = publisher.close().await {
            warn!(error = %e, "Failed to flush NATS connection");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_config_and_once() {
        let cli = Cli::try_parse_from(["weatherbus", "--config", "/etc/weatherbus.yaml", "--once"])
            .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("/etc/weatherbus.yaml")));
        assert!(cli.once);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(Cli::try_parse_from(["weatherbus", "--interval", "5"]).is_err());
    }
}
