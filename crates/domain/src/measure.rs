//! Measure — one timestamped reading produced by a sensor.

use serde::{Deserialize, Serialize};

use crate::error::{BrightnestError, ValidationError};
use crate::id::{DeviceId, MeasureId};
use crate::time::{Timestamp, now};

/// A scalar reading of a given measure type (e.g. `TEMPERATURE`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub id: MeasureId,
    /// The sensor that produced the reading.
    pub sensor_id: DeviceId,
    pub value: f64,
    pub measure_type: String,
    pub time: Timestamp,
}

impl Measure {
    /// Create a builder for constructing a [`Measure`].
    #[must_use]
    pub fn builder() -> MeasureBuilder {
        MeasureBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] when `measure_type` is empty
    /// or `value` is not finite.
    pub fn validate(&self) -> Result<(), BrightnestError> {
        if self.measure_type.is_empty() {
            return Err(ValidationError::EmptyMeasureType.into());
        }
        if !self.value.is_finite() {
            return Err(ValidationError::NonFinite { field: "value" }.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Measure`].
#[derive(Debug, Default)]
pub struct MeasureBuilder {
    id: Option<MeasureId>,
    sensor_id: Option<DeviceId>,
    value: Option<f64>,
    measure_type: Option<String>,
    time: Option<Timestamp>,
}

impl MeasureBuilder {
    #[must_use]
    pub fn id(mut self, id: MeasureId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn sensor_id(mut self, sensor_id: DeviceId) -> Self {
        self.sensor_id = Some(sensor_id);
        self
    }

    #[must_use]
    pub fn value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn measure_type(mut self, measure_type: impl Into<String>) -> Self {
        self.measure_type = Some(measure_type.into());
        self
    }

    /// Set the reading time. Left unset, the measure is stamped when built.
    #[must_use]
    pub fn time(mut self, time: Timestamp) -> Self {
        self.time = Some(time);
        self
    }

    /// Like [`time`](Self::time), but keeps the build-time default for `None`.
    #[must_use]
    pub fn maybe_time(mut self, time: Option<Timestamp>) -> Self {
        self.time = time;
        self
    }

    /// Consume the builder, validate, and return a [`Measure`].
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] if the measure type is missing
    /// or the value is missing or not finite.
    pub fn build(self) -> Result<Measure, BrightnestError> {
        let measure = Measure {
            id: self.id.unwrap_or_default(),
            sensor_id: self.sensor_id.unwrap_or_default(),
            value: self.value.unwrap_or(f64::NAN),
            measure_type: self.measure_type.unwrap_or_default(),
            time: self.time.unwrap_or_else(now),
        };
        measure.validate()?;
        Ok(measure)
    }
}
