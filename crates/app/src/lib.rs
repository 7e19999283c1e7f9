//! # brightnest-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceRepository`, `MeasureRepository` — device and telemetry persistence
//!   - `RuleRepository` — rules, sensor rules and actuator rules
//!   - `Driver` — the uniform capability contract of a device-type adapter
//!   - `EvaluationQueue` — hand-off from ingestion to the rule engine
//! - Define **driving/inbound ports** as use-case structs/traits:
//!   - `DeviceService` — register, update, remove, apply (with compensation)
//!   - `RuleService` — rule store CRUD with integrity checks
//!   - `IngestionService` — record telemetry (also the `TelemetrySink` port)
//!   - `RuleEngine` — match measures against rules and dispatch actuation
//! - Provide **in-process infrastructure** (driver registry, keyed locks,
//!   evaluation queue) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `brightnest-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod driver_registry;
pub mod evaluation_queue;
pub mod keyed_lock;
pub mod ports;
pub mod rule_engine;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
