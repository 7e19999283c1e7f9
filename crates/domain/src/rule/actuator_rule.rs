//! ActuatorRule — the action side of a rule.

use serde::{Deserialize, Serialize};

use crate::error::BrightnestError;
use crate::id::{ActuatorRuleId, DeviceId, RuleId};

/// Payload sent to an actuator when a sibling sensor rule matches.
///
/// Inactive actuator rules are stored but never dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorRule {
    pub id: ActuatorRuleId,
    pub rule_id: RuleId,
    /// Target actuator.
    pub actuator_id: DeviceId,
    /// Opaque payload handed to the actuator's driver.
    pub value: serde_json::Value,
    #[serde(default)]
    pub is_active: bool,
}

impl ActuatorRule {
    /// Create a builder for constructing an [`ActuatorRule`].
    #[must_use]
    pub fn builder() -> ActuatorRuleBuilder {
        ActuatorRuleBuilder::default()
    }
}

/// Step-by-step builder for [`ActuatorRule`].
#[derive(Debug, Default)]
pub struct ActuatorRuleBuilder {
    id: Option<ActuatorRuleId>,
    rule_id: Option<RuleId>,
    actuator_id: Option<DeviceId>,
    value: Option<serde_json::Value>,
    is_active: Option<bool>,
}

impl ActuatorRuleBuilder {
    #[must_use]
    pub fn id(mut self, id: ActuatorRuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn rule_id(mut self, rule_id: RuleId) -> Self {
        self.rule_id = Some(rule_id);
        self
    }

    #[must_use]
    pub fn actuator_id(mut self, actuator_id: DeviceId) -> Self {
        self.actuator_id = Some(actuator_id);
        self
    }

    #[must_use]
    pub fn value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    /// Consume the builder and return an [`ActuatorRule`].
    ///
    /// A rule is inactive unless activated explicitly; a missing value is `null`.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible like the other builders.
    pub fn build(self) -> Result<ActuatorRule, BrightnestError> {
        Ok(ActuatorRule {
            id: self.id.unwrap_or_default(),
            rule_id: self.rule_id.unwrap_or_default(),
            actuator_id: self.actuator_id.unwrap_or_default(),
            value: self.value.unwrap_or(serde_json::Value::Null),
            is_active: self.is_active.unwrap_or(false),
        })
    }
}
