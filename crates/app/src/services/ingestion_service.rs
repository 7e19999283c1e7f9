//! Ingestion service — the measure ingestion pipeline.
//!
//! Resolves the reporting sensor, persists the measure and hands it to the
//! evaluation queue. Evaluation happens elsewhere; ingestion never waits for
//! rules to run.

use std::future::Future;

use brightnest_domain::device::{Device, DeviceKind};
use brightnest_domain::error::{BrightnestError, NotFoundError, ValidationError};
use brightnest_domain::id::{DeviceId, MeasureId};
use brightnest_domain::measure::Measure;

use crate::ports::{DeviceRepository, EvaluationQueue, MeasureReport, MeasureRepository, TelemetrySink};

/// Application service recording telemetry.
pub struct IngestionService<D, M, Q> {
    devices: D,
    measures: M,
    queue: Q,
}

impl<D, M, Q> IngestionService<D, M, Q>
where
    D: DeviceRepository,
    M: MeasureRepository,
    Q: EvaluationQueue,
{
    /// Create a new service over the given repositories and evaluation queue.
    pub fn new(devices: D, measures: M, queue: Q) -> Self {
        Self {
            devices,
            measures,
            queue,
        }
    }

    /// Record a reading and queue it for rule evaluation.
    ///
    /// A failed hand-off to the queue is logged; the measure stays stored
    /// and its id is still returned.
    ///
    /// # Errors
    ///
    /// - [`BrightnestError::UnknownSensor`] if no sensor matches the report.
    /// - [`BrightnestError::Validation`] if the value is not finite, the
    ///   measure type is empty, or the custom id is shared by several sensor
    ///   types and the report does not name one.
    /// - a storage error if the measure cannot be persisted.
    #[tracing::instrument(
        skip(self, report),
        fields(custom_id = %report.sensor_custom_id, measure_type = %report.measure_type)
    )]
    pub async fn ingest_measure(&self, report: MeasureReport) -> Result<MeasureId, BrightnestError> {
        let sensor = self
            .resolve_sensor(&report.sensor_custom_id, report.sensor_type.as_deref())
            .await?;
        let measure = Measure::builder()
            .sensor_id(sensor.id)
            .value(report.value)
            .measure_type(report.measure_type)
            .maybe_time(report.time)
            .build()?;

        let measure = self.measures.create(measure).await?;
        let measure_id = measure.id;
        tracing::debug!(%measure_id, sensor_id = %sensor.id, value = measure.value, "measure stored");

        if let Err(error) = self.queue.enqueue(measure).await {
            tracing::warn!(%measure_id, %error, "measure stored but not queued for evaluation");
        }
        Ok(measure_id)
    }

    async fn resolve_sensor(
        &self,
        custom_id: &str,
        sensor_type: Option<&str>,
    ) -> Result<Device, BrightnestError> {
        let mut candidates = self
            .devices
            .find_by_custom_id(DeviceKind::Sensor, custom_id)
            .await?;
        let sensor = match sensor_type {
            Some(sensor_type) => candidates.into_iter().find(|d| d.device_type == sensor_type),
            None if candidates.len() > 1 => {
                return Err(ValidationError::AmbiguousSensor(custom_id.to_string()).into());
            }
            None => candidates.pop(),
        };
        sensor.ok_or_else(|| BrightnestError::UnknownSensor {
            custom_id: custom_id.to_string(),
        })
    }

    /// The latest measures of a sensor, newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_measures(
        &self,
        sensor_id: DeviceId,
        limit: u32,
    ) -> Result<Vec<Measure>, BrightnestError> {
        self.measures.find_by_sensor(sensor_id, limit).await
    }

    /// Fix the value or type of a stored measure.
    ///
    /// Corrections are not re-evaluated against rules.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::NotFound`] if the measure does not exist,
    /// [`BrightnestError::Validation`] if the corrected measure is invalid, or
    /// a storage error from the repository.
    #[tracing::instrument(skip(self, measure_type))]
    pub async fn correct_measure(
        &self,
        id: MeasureId,
        value: f64,
        measure_type: &str,
    ) -> Result<Measure, BrightnestError> {
        let mut measure = self.measures.get_by_id(id).await?.ok_or_else(|| {
            BrightnestError::from(NotFoundError {
                entity: "Measure",
                id: id.to_string(),
            })
        })?;
        measure.value = value;
        measure.measure_type = measure_type.to_string();
        measure.validate()?;
        self.measures.update(measure).await
    }
}

impl<D, M, Q> TelemetrySink for IngestionService<D, M, Q>
where
    D: DeviceRepository + Sync,
    M: MeasureRepository + Sync,
    Q: EvaluationQueue + Sync,
{
    fn ingest(
        &self,
        report: MeasureReport,
    ) -> impl Future<Output = Result<MeasureId, BrightnestError>> + Send {
        self.ingest_measure(report)
    }
}
