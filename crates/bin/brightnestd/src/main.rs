//! # brightnestd — brightnest daemon
//!
//! Composition root that wires all adapters together and runs the rule
//! engine.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Build the driver table and re-attach every persisted device to its driver
//! - Construct application services, injecting repositories via port traits
//! - Run the rule engine and, when enabled, the MQTT telemetry bridge
//! - Shut down on Ctrl-C, letting in-flight evaluations finish
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use brightnest_adapter_drivers::build_registry;
use brightnest_adapter_mqtt::TelemetryBridge;
use brightnest_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteDeviceRepository, SqliteMeasureRepository,
    SqliteRuleRepository,
};
use brightnest_app::evaluation_queue::InProcessEvaluationQueue;
use brightnest_app::rule_engine::RuleEngine;
use brightnest_app::services::{DeviceService, IngestionService, RuleService};
use brightnest_domain::device::DeviceKind;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Database
    let db = StorageConfig {
        database_url: config.database.url.clone(),
    }
    .build()
    .await
    .context("failed to open database")?;
    let pool = db.pool().clone();

    // Repositories
    let device_repo = SqliteDeviceRepository::new(pool.clone());
    let measure_repo = SqliteMeasureRepository::new(pool.clone());
    let rule_repo = SqliteRuleRepository::new(pool);

    // Drivers
    let drivers = build_registry(&config.drivers);
    tracing::info!(
        sensors = ?drivers.types(DeviceKind::Sensor),
        actuators = ?drivers.types(DeviceKind::Actuator),
        "driver table loaded"
    );

    // Services
    let devices = DeviceService::new(device_repo.clone(), drivers);
    let failures = devices
        .reload_drivers()
        .await
        .context("failed to reload persisted devices")?;
    for failure in &failures {
        tracing::warn!(
            device_id = %failure.device_id,
            key = %failure.key,
            error = %failure.error,
            "device could not be re-attached to its driver"
        );
    }

    let rules = RuleService::new(rule_repo.clone(), device_repo.clone());
    let rule_count = rules.list_rules().await.context("failed to read rules")?.len();
    tracing::info!(rules = rule_count, "rule store ready");

    let (queue, receiver) = InProcessEvaluationQueue::new(config.evaluation.queue_capacity);
    let ingestion = Arc::new(IngestionService::new(device_repo, measure_repo, queue));
    let engine = Arc::new(RuleEngine::new(rule_repo, devices));
    let engine_task = tokio::spawn(Arc::clone(&engine).run(receiver));

    // Telemetry
    let bridge_task = config.mqtt.enabled.then(|| {
        let bridge = TelemetryBridge::new(config.mqtt.clone(), Arc::clone(&ingestion));
        tokio::spawn(async move {
            if let Err(error) = bridge.run().await {
                tracing::error!(%error, "MQTT bridge stopped");
            }
        })
    });

    tracing::info!("brightnestd running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");

    if let Some(task) = bridge_task {
        task.abort();
        let _ = task.await;
    }
    // Dropping the last sender closes the queue and lets the engine drain.
    drop(ingestion);
    engine_task.await.context("rule engine task failed")?;

    Ok(())
}
