//! Application services — use-case implementations.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod device_service;
pub mod ingestion_service;
pub mod rule_service;

pub use device_service::{DeviceService, DeviceUpdate, ReloadFailure};
pub use ingestion_service::IngestionService;
pub use rule_service::{ActuatorRuleDraft, RuleService, SensorRuleDraft};
