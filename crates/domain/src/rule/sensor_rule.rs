//! SensorRule — the threshold condition side of a rule.

use serde::{Deserialize, Serialize};

use crate::error::{BrightnestError, ValidationError};
use crate::id::{DeviceId, RuleId, SensorRuleId};
use crate::measure::Measure;

/// Matches measures of one type whose value lies in `[interval_start, interval_end]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRule {
    pub id: SensorRuleId,
    pub rule_id: RuleId,
    /// When set, only measures from this sensor match.
    pub sensor_id: Option<DeviceId>,
    pub measure_type: String,
    pub interval_start: f64,
    pub interval_end: f64,
}

impl SensorRule {
    /// Create a builder for constructing a [`SensorRule`].
    #[must_use]
    pub fn builder() -> SensorRuleBuilder {
        SensorRuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] when the measure type is
    /// empty, a bound is not finite, or `interval_start > interval_end`.
    pub fn validate(&self) -> Result<(), BrightnestError> {
        if self.measure_type.is_empty() {
            return Err(ValidationError::EmptyMeasureType.into());
        }
        if !self.interval_start.is_finite() {
            return Err(ValidationError::NonFinite {
                field: "interval_start",
            }
            .into());
        }
        if !self.interval_end.is_finite() {
            return Err(ValidationError::NonFinite {
                field: "interval_end",
            }
            .into());
        }
        if self.interval_start > self.interval_end {
            return Err(ValidationError::InvalidInterval {
                start: self.interval_start,
                end: self.interval_end,
            }
            .into());
        }
        Ok(())
    }

    /// Closed-interval membership: both bounds are inclusive.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.interval_start <= value && value <= self.interval_end
    }

    /// Whether `measure` satisfies this condition.
    #[must_use]
    pub fn matches(&self, measure: &Measure) -> bool {
        self.measure_type == measure.measure_type
            && self.contains(measure.value)
            && self.sensor_id.is_none_or(|id| id == measure.sensor_id)
    }
}

/// Step-by-step builder for [`SensorRule`].
#[derive(Debug, Default)]
pub struct SensorRuleBuilder {
    id: Option<SensorRuleId>,
    rule_id: Option<RuleId>,
    sensor_id: Option<DeviceId>,
    measure_type: Option<String>,
    interval: Option<(f64, f64)>,
}

impl SensorRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: SensorRuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn rule_id(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    #[must_use]
    pub fn sensor_id(mut self, sensor_id: DeviceId) -> Self {
        self.sensor_id = Some(sensor_id);
        self
    }

    #[must_use]
    pub fn measure_type(mut self, measure_type: impl Into<String>) -> Self {
        self.measure_type = Some(measure_type.into());
        self
    }

    #[must_use]
    pub fn interval(mut self, start: f64, end: f64) -> Self {
        self.interval = Some((start, end));
        self
    }

    /// Consume the builder, validate, and return a [`SensorRule`].
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] if the measure type or the
    /// interval is missing or invalid.
    pub fn build(self) -> Result<SensorRule, BrightnestError> {
        let (interval_start, interval_end) = self.interval.unwrap_or((f64::NAN, f64::NAN));
        let sensor_rule = SensorRule {
            id: self.id.unwrap_or_default(),
            rule_id: self.rule_id.unwrap_or_default(),
            sensor_id: self.sensor_id,
            measure_type: self.measure_type.unwrap_or_default(),
            interval_start,
            interval_end,
        };
        sensor_rule.validate()?;
        Ok(sensor_rule)
    }
}
