//! scopelink - twin-telescope observation coordinator
//!
//! CLI entry point for the watcher and control nodes and the bus helpers.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use scopelink::bus::{Bus, RedisBus};
use scopelink::cli::{Cli, Command, ConfigCommand, OutputFormat};
use scopelink::config::Config;
use scopelink::control::ControlEngine;
use scopelink::hardware::{SimulatedCamera, SimulatedFilterWheel};
use scopelink::record::{
    CAM_INFO_KEY, CameraStateRecord, OVERRIDE_KEY, SURVEY_KEY, SurveyRecord, format_timestamp,
};
use scopelink::watcher::CaptureWatcher;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Watch => cmd_watch(&config).await,
        Command::Control => cmd_control(&config).await,
        Command::Override {
            exposure,
            filter,
            temperature,
        } => cmd_override(&config, exposure, filter, temperature).await,
        Command::Peek { key, format } => cmd_peek(&config, &key, format).await,
        Command::Config {
            command: ConfigCommand::Init { force },
        } => cmd_config_init(force),
    }
}

async fn connect_bus(config: &Config) -> Result<Arc<RedisBus>> {
    let bus = RedisBus::connect_with_retry(&config.bus.url(), config.bus.retry.clone())
        .await
        .context("Failed to connect to the bus")?;
    Ok(Arc::new(bus))
}

/// Run the capture watcher node
async fn cmd_watch(config: &Config) -> Result<()> {
    let bus = connect_bus(config).await?;
    let mut watcher = CaptureWatcher::new(config.watcher.clone(), bus.clone())
        .context("Failed to create capture watcher")?;

    tokio::select! {
        result = watcher.run() => {
            result.context("Capture watcher failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down bus server");
            bus.shutdown_server()
                .await
                .context("Failed to shut down bus server")?;
        }
    }
    Ok(())
}

/// Run the control loop node
async fn cmd_control(config: &Config) -> Result<()> {
    let bus = connect_bus(config).await?;

    // Simulator drivers; real rigs swap in their own Camera/FilterWheel
    // implementations.
    let camera = Box::new(SimulatedCamera::new());
    let wheel = Box::new(SimulatedFilterWheel::new(config.control.filters.len()));

    let mut engine = ControlEngine::new(config.control.clone(), bus, camera, wheel);
    engine.run().await.context("Control loop failed")?;
    Ok(())
}

/// Publish an override record, as the dashboard would
async fn cmd_override(
    config: &Config,
    exposure: Option<i64>,
    filter: Option<String>,
    temperature: Option<f64>,
) -> Result<()> {
    let bus = connect_bus(config).await?;
    let record = CameraStateRecord {
        timestamp: chrono::Local::now().naive_local(),
        exposure_seconds: exposure,
        filter,
        temperature,
    };
    bus.set(OVERRIDE_KEY, &record.encode())
        .await
        .context("Failed to publish override")?;

    let stored = bus.get(OVERRIDE_KEY).await?;
    println!("Override published: {stored}");
    Ok(())
}

/// Read and decode a bus key
async fn cmd_peek(config: &Config, key: &str, format: OutputFormat) -> Result<()> {
    let bus = connect_bus(config).await?;
    let raw = bus.get(key).await?;

    match key {
        SURVEY_KEY => {
            let record = SurveyRecord::decode(&raw).context("Undecodable survey record")?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "can_observe": record.can_observe,
                        "scheduled": format_timestamp(record.scheduled),
                        "mode": record.mode,
                        "filter": record.filter,
                        "exposure_seconds": record.exposure_seconds,
                    })
                ),
                OutputFormat::Text => {
                    println!("can_observe: {}", record.can_observe);
                    println!("scheduled: {}", format_timestamp(record.scheduled));
                    println!("mode: {}", record.mode);
                    println!("filter: {}", record.filter);
                    println!("exposure_seconds: {}", record.exposure_seconds);
                }
            }
        }
        CAM_INFO_KEY | OVERRIDE_KEY => {
            let record =
                CameraStateRecord::decode(&raw).context("Undecodable camera state record")?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({
                        "timestamp": format_timestamp(record.timestamp),
                        "exposure_seconds": record.exposure_seconds,
                        "filter": record.filter,
                        "temperature": record.temperature,
                    })
                ),
                OutputFormat::Text => {
                    println!("timestamp: {}", format_timestamp(record.timestamp));
                    println!("exposure_seconds: {:?}", record.exposure_seconds);
                    println!("filter: {:?}", record.filter);
                    println!("temperature: {:?}", record.temperature);
                }
            }
        }
        _ => println!("{raw}"),
    }
    Ok(())
}

/// Write a commented default config file
fn cmd_config_init(force: bool) -> Result<()> {
    let path = PathBuf::from(".scopelink.yml");
    if path.exists() && !force {
        return Err(eyre::eyre!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ));
    }
    std::fs::write(&path, Config::default_file_contents()).context("Failed to write config")?;
    println!("Wrote {}", path.display());
    Ok(())
}
