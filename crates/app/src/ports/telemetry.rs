//! Telemetry port — the inbound side used by transports (MQTT, …).

use std::future::Future;

use brightnest_domain::error::BrightnestError;
use brightnest_domain::id::MeasureId;
use brightnest_domain::time::Timestamp;

/// A reading as reported by a sensor, before it is resolved and persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureReport {
    /// Driver-scoped id of the reporting sensor.
    pub sensor_custom_id: String,
    /// Disambiguates sensors of different types sharing a custom id.
    pub sensor_type: Option<String>,
    pub value: f64,
    pub measure_type: String,
    /// Defaults to the ingestion instant.
    pub time: Option<Timestamp>,
}

/// Receives telemetry from a transport.
pub trait TelemetrySink {
    /// Record one reading and return the id of the persisted measure.
    fn ingest(
        &self,
        report: MeasureReport,
    ) -> impl Future<Output = Result<MeasureId, BrightnestError>> + Send;
}

impl<T: TelemetrySink + Send + Sync> TelemetrySink for std::sync::Arc<T> {
    fn ingest(
        &self,
        report: MeasureReport,
    ) -> impl Future<Output = Result<MeasureId, BrightnestError>> + Send {
        (**self).ingest(report)
    }
}
