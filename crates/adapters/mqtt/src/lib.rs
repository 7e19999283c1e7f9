//! # brightnest-adapter-mqtt
//!
//! MQTT adapter — the telemetry transport feeding sensor readings into
//! brightnest.
//!
//! ## Responsibilities
//! - Connect to an MQTT broker and subscribe to `{base}/sensors/+/measures`
//! - Decode JSON readings into [`MeasureReport`](brightnest_app::ports::MeasureReport)s
//! - Hand them to a [`TelemetrySink`](brightnest_app::ports::TelemetrySink)
//! - Keep reconnecting with backoff when the broker goes away
//!
//! ## Dependency rule
//! Same as other adapters: depends on `brightnest-app` and `brightnest-domain`.

mod bridge;
mod config;
mod error;
mod payload;

pub use bridge::TelemetryBridge;
pub use config::MqttConfig;
pub use error::MqttError;
pub use payload::{decode_report, sensor_id_from_topic};
