//! Replay one recorded sensor read through the full pipeline
//!
//! ```text
//! glucosync <config.json> <sensor-read.json>
//! ```
//!
//! Prints the resulting canonical state as JSON on stdout.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use glucosync_connectors::{load_sensor_read, AppConfig, NightscoutClient, OopClient};
use glucosync_core::{OwnedState, Pipeline, StateOwner};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(config_path), Some(read_path)) = (args.next(), args.next()) else {
        bail!("usage: glucosync <config.json> <sensor-read.json>");
    };

    let config = AppConfig::load(&config_path).context("failed to load configuration")?;
    let read = load_sensor_read(&read_path).context("failed to load sensor read")?;

    let oop = OopClient::new(config.calibration_server.clone())
        .context("invalid calibration server configuration")?;

    let owner = StateOwner::spawn(OwnedState::default());
    let mut builder = Pipeline::builder(Arc::new(oop)).config(config.pipeline.clone());
    if let Some(store) = &config.entry_store {
        let nightscout = NightscoutClient::new(store).context("invalid entry store configuration")?;
        builder = builder.entry_store(Arc::new(nightscout));
    }
    let mut pipeline = builder.build(owner.handle()).context("invalid pipeline configuration")?;
    pipeline
        .refresh_remote_mirror()
        .await
        .context("failed to seed remote mirror")?;

    let report = pipeline.run_cycle(read).await.context("reconciliation cycle aborted")?;
    info!(
        "cycle done: current glucose {:?}, history {} entries, calibration {:?}, history call {:?}",
        report.current_glucose, report.history_len, report.calibration, report.history
    );
    if let Some(alarm) = &report.alarm {
        warn!("alarm: {:?} at {}", alarm.kind, alarm.magnitude);
    }

    drop(pipeline);
    let state = owner.shutdown().await.context("state owner stopped early")?;
    for notice in state.canonical.notices.notices() {
        warn!("notice: {notice}");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&state.canonical).context("failed to serialize state")?
    );
    Ok(())
}
