//! Rule repository port — persistence for rules and their children.

use std::future::Future;

use brightnest_domain::error::BrightnestError;
use brightnest_domain::id::{ActuatorRuleId, RuleId, SensorRuleId};
use brightnest_domain::rule::{ActuatorRule, Rule, SensorRule};

/// Repository for [`Rule`]s, [`SensorRule`]s and [`ActuatorRule`]s.
///
/// Deleting a rule deletes its children.
pub trait RuleRepository {
    /// Create a new rule.
    fn create_rule(&self, rule: Rule) -> impl Future<Output = Result<Rule, BrightnestError>> + Send;

    /// Get a rule by its unique identifier.
    fn get_rule(
        &self,
        id: RuleId,
    ) -> impl Future<Output = Result<Option<Rule>, BrightnestError>> + Send;

    /// Get all rules, ordered by name.
    fn list_rules(&self) -> impl Future<Output = Result<Vec<Rule>, BrightnestError>> + Send;

    /// Update an existing rule.
    fn update_rule(&self, rule: Rule) -> impl Future<Output = Result<Rule, BrightnestError>> + Send;

    /// Delete a rule and every sensor and actuator rule under it.
    fn delete_rule(&self, id: RuleId) -> impl Future<Output = Result<(), BrightnestError>> + Send;

    /// Create a sensor rule.
    fn create_sensor_rule(
        &self,
        sensor_rule: SensorRule,
    ) -> impl Future<Output = Result<SensorRule, BrightnestError>> + Send;

    /// Get a sensor rule by its unique identifier.
    fn get_sensor_rule(
        &self,
        id: SensorRuleId,
    ) -> impl Future<Output = Result<Option<SensorRule>, BrightnestError>> + Send;

    /// Sensor rules owned by a rule.
    fn find_sensor_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<SensorRule>, BrightnestError>> + Send;

    /// Sensor rules of `measure_type` whose closed interval contains `value`.
    ///
    /// Runs as a single read, so the result is a consistent snapshot.
    fn find_matching_sensor_rules(
        &self,
        measure_type: &str,
        value: f64,
    ) -> impl Future<Output = Result<Vec<SensorRule>, BrightnestError>> + Send;

    /// Update an existing sensor rule.
    fn update_sensor_rule(
        &self,
        sensor_rule: SensorRule,
    ) -> impl Future<Output = Result<SensorRule, BrightnestError>> + Send;

    /// Delete a sensor rule.
    fn delete_sensor_rule(
        &self,
        id: SensorRuleId,
    ) -> impl Future<Output = Result<(), BrightnestError>> + Send;

    /// Create an actuator rule.
    fn create_actuator_rule(
        &self,
        actuator_rule: ActuatorRule,
    ) -> impl Future<Output = Result<ActuatorRule, BrightnestError>> + Send;

    /// Get an actuator rule by its unique identifier.
    fn get_actuator_rule(
        &self,
        id: ActuatorRuleId,
    ) -> impl Future<Output = Result<Option<ActuatorRule>, BrightnestError>> + Send;

    /// Actuator rules owned by a rule, active or not.
    fn find_actuator_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<ActuatorRule>, BrightnestError>> + Send;

    /// Active actuator rules owned by a rule.
    fn find_active_actuator_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<ActuatorRule>, BrightnestError>> + Send;

    /// Update an existing actuator rule.
    fn update_actuator_rule(
        &self,
        actuator_rule: ActuatorRule,
    ) -> impl Future<Output = Result<ActuatorRule, BrightnestError>> + Send;

    /// Delete an actuator rule.
    fn delete_actuator_rule(
        &self,
        id: ActuatorRuleId,
    ) -> impl Future<Output = Result<(), BrightnestError>> + Send;
}
