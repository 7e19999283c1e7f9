//! Rule — a named automation grouping threshold conditions and actuations.
//!
//! A [`Rule`] owns zero or more [`SensorRule`]s (the condition side) and zero
//! or more [`ActuatorRule`]s (the action side). When a measure falls inside a
//! sensor rule's closed interval, every *active* sibling actuator rule is
//! dispatched to its actuator. Children reference their rule by id only.

mod actuator_rule;
mod sensor_rule;

pub use actuator_rule::{ActuatorRule, ActuatorRuleBuilder};
pub use sensor_rule::{SensorRule, SensorRuleBuilder};

use serde::{Deserialize, Serialize};

use crate::error::{BrightnestError, ValidationError};
use crate::id::RuleId;

/// A named automation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), BrightnestError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
}

impl RuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Rule, BrightnestError> {
        let rule = Rule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
        };
        rule.validate()?;
        Ok(rule)
    }
}

/// A rule together with its condition and action children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDetails {
    pub rule: Rule,
    pub sensor_rules: Vec<SensorRule>,
    pub actuator_rules: Vec<ActuatorRule>,
}

impl RuleDetails {
    /// Whether at least one actuator rule would be dispatched on a match.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.actuator_rules.iter().any(|ar| ar.is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DeviceId;

    #[test]
    fn should_build_valid_rule_when_name_provided() {
        let rule = Rule::builder().name("Cool down").build().unwrap();
        assert_eq!(rule.name, "Cool down");
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Rule::builder().build();
        assert!(matches!(
            result,
            Err(BrightnestError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_be_armed_only_with_an_active_actuator_rule() {
        let rule = Rule::builder().name("R1").build().unwrap();
        let inactive = ActuatorRule::builder()
            .rule_id(rule.id)
            .actuator_id(DeviceId::new())
            .value(serde_json::json!(25))
            .build()
            .unwrap();
        let mut details = RuleDetails {
            rule,
            sensor_rules: Vec::new(),
            actuator_rules: vec![inactive.clone()],
        };
        assert!(!details.is_armed());

        let mut active = inactive;
        active.is_active = true;
        details.actuator_rules.push(active);
        assert!(details.is_armed());
    }
}
