//! Rule service — the rule store.
//!
//! CRUD over rules and their sensor and actuator children. Children always
//! point at an existing parent rule and at a device of the right kind, and
//! interval bounds are checked on every write.

use brightnest_domain::device::DeviceKind;
use brightnest_domain::error::{BrightnestError, NotFoundError};
use brightnest_domain::id::{ActuatorRuleId, DeviceId, RuleId, SensorRuleId};
use brightnest_domain::rule::{ActuatorRule, Rule, RuleDetails, SensorRule};

use crate::ports::{DeviceRepository, RuleRepository};

/// Condition half of [`RuleService::create_simple_rule`].
#[derive(Debug, Clone, PartialEq)]
pub struct SensorRuleDraft {
    pub sensor_id: Option<DeviceId>,
    pub measure_type: String,
    pub interval_start: f64,
    pub interval_end: f64,
}

/// Action half of [`RuleService::create_simple_rule`].
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorRuleDraft {
    pub actuator_id: DeviceId,
    pub value: serde_json::Value,
    pub is_active: bool,
}

/// Application service for rule CRUD operations.
pub struct RuleService<R, D> {
    repo: R,
    devices: D,
}

impl<R: RuleRepository, D: DeviceRepository> RuleService<R, D> {
    /// Create a new service storing rules in `repo` and resolving the
    /// devices they reference through `devices`.
    pub fn new(repo: R, devices: D) -> Self {
        Self { repo, devices }
    }

    /// Fail unless `id` is a stored device of `kind`.
    async fn expect_device(&self, id: DeviceId, kind: DeviceKind) -> Result<(), BrightnestError> {
        let device = self.devices.get_by_id(id).await?.ok_or_else(|| NotFoundError {
            entity: "Device",
            id: id.to_string(),
        })?;
        device.expect_kind(kind)
    }

    async fn check_sensor_rule(&self, sensor_rule: &SensorRule) -> Result<(), BrightnestError> {
        sensor_rule.validate()?;
        self.get_rule(sensor_rule.rule_id).await?;
        if let Some(sensor_id) = sensor_rule.sensor_id {
            self.expect_device(sensor_id, DeviceKind::Sensor).await?;
        }
        Ok(())
    }

    async fn check_actuator_rule(&self, actuator_rule: &ActuatorRule) -> Result<(), BrightnestError> {
        self.get_rule(actuator_rule.rule_id).await?;
        self.expect_device(actuator_rule.actuator_id, DeviceKind::Actuator)
            .await
    }

    /// Create a new rule after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] if the name is empty, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, rule), fields(rule_name = %rule.name))]
    pub async fn create_rule(&self, rule: Rule) -> Result<Rule, BrightnestError> {
        rule.validate()?;
        self.repo.create_rule(rule).await
    }

    /// Look up a rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::RuleNotFound`] when no rule with `id`
    /// exists, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_rule(&self, id: RuleId) -> Result<Rule, BrightnestError> {
        self.repo
            .get_rule(id)
            .await?
            .ok_or(BrightnestError::RuleNotFound(id))
    }

    /// List all rules.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_rules(&self) -> Result<Vec<Rule>, BrightnestError> {
        self.repo.list_rules().await
    }

    /// Rename an existing rule.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] if invariants fail,
    /// [`BrightnestError::RuleNotFound`] if the rule does not exist, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, rule), fields(rule_id = %rule.id))]
    pub async fn update_rule(&self, rule: Rule) -> Result<Rule, BrightnestError> {
        rule.validate()?;
        self.get_rule(rule.id).await?;
        self.repo.update_rule(rule).await
    }

    /// Delete a rule together with its sensor and actuator rules.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_rule(&self, id: RuleId) -> Result<(), BrightnestError> {
        self.repo.delete_rule(id).await
    }

    /// A rule with both of its child lists.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::RuleNotFound`] when no rule with `id`
    /// exists, or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_rule_details(&self, id: RuleId) -> Result<RuleDetails, BrightnestError> {
        let rule = self.get_rule(id).await?;
        let sensor_rules = self.repo.find_sensor_rules(id).await?;
        let actuator_rules = self.repo.find_actuator_rules(id).await?;
        Ok(RuleDetails {
            rule,
            sensor_rules,
            actuator_rules,
        })
    }

    /// Create a rule with exactly one condition and one action.
    ///
    /// Everything is validated before the first write. If a child cannot be
    /// stored the rule is deleted again, taking any stored child with it.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] if any part is invalid,
    /// [`BrightnestError::NotFound`] if a referenced device is missing, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, sensor, actuator))]
    pub async fn create_simple_rule(
        &self,
        name: &str,
        sensor: SensorRuleDraft,
        actuator: ActuatorRuleDraft,
    ) -> Result<RuleDetails, BrightnestError> {
        let rule = Rule::builder().name(name).build()?;
        let mut sensor_rule = SensorRule::builder()
            .rule_id(rule.id)
            .measure_type(sensor.measure_type)
            .interval(sensor.interval_start, sensor.interval_end);
        if let Some(sensor_id) = sensor.sensor_id {
            sensor_rule = sensor_rule.sensor_id(sensor_id);
        }
        let sensor_rule = sensor_rule.build()?;
        let actuator_rule = ActuatorRule::builder()
            .rule_id(rule.id)
            .actuator_id(actuator.actuator_id)
            .value(actuator.value)
            .is_active(actuator.is_active)
            .build()?;
        if let Some(sensor_id) = sensor_rule.sensor_id {
            self.expect_device(sensor_id, DeviceKind::Sensor).await?;
        }
        self.expect_device(actuator_rule.actuator_id, DeviceKind::Actuator)
            .await?;

        let rule = self.repo.create_rule(rule).await?;
        let children = async {
            let sensor_rule = self.repo.create_sensor_rule(sensor_rule).await?;
            let actuator_rule = self.repo.create_actuator_rule(actuator_rule).await?;
            Ok::<_, BrightnestError>((sensor_rule, actuator_rule))
        }
        .await;

        match children {
            Ok((sensor_rule, actuator_rule)) => Ok(RuleDetails {
                rule,
                sensor_rules: vec![sensor_rule],
                actuator_rules: vec![actuator_rule],
            }),
            Err(err) => {
                if let Err(cleanup) = self.repo.delete_rule(rule.id).await {
                    tracing::error!(rule_id = %rule.id, error = %cleanup, "could not delete partially created rule");
                }
                Err(err)
            }
        }
    }

    // -- sensor rules ------------------------------------------------------

    /// Create a sensor rule under an existing rule.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] (e.g. an inverted interval or a
    /// binding to an actuator), [`BrightnestError::RuleNotFound`] if the
    /// parent is missing, [`BrightnestError::NotFound`] if the bound sensor is
    /// missing, or a storage error from the repository.
    #[tracing::instrument(skip(self, sensor_rule), fields(rule_id = %sensor_rule.rule_id))]
    pub async fn create_sensor_rule(
        &self,
        sensor_rule: SensorRule,
    ) -> Result<SensorRule, BrightnestError> {
        self.check_sensor_rule(&sensor_rule).await?;
        self.repo.create_sensor_rule(sensor_rule).await
    }

    /// Look up a sensor rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::NotFound`] when it does not exist, or a
    /// storage error from the repository.
    pub async fn get_sensor_rule(&self, id: SensorRuleId) -> Result<SensorRule, BrightnestError> {
        self.repo.get_sensor_rule(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "SensorRule",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Sensor rules of a rule.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_sensor_rules(&self, rule_id: RuleId) -> Result<Vec<SensorRule>, BrightnestError> {
        self.repo.find_sensor_rules(rule_id).await
    }

    /// Replace a sensor rule, possibly moving it to another rule.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`],
    /// [`BrightnestError::NotFound`] if the sensor rule is missing,
    /// [`BrightnestError::RuleNotFound`] if the (new) parent is missing, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self, sensor_rule), fields(sensor_rule_id = %sensor_rule.id))]
    pub async fn update_sensor_rule(
        &self,
        sensor_rule: SensorRule,
    ) -> Result<SensorRule, BrightnestError> {
        self.get_sensor_rule(sensor_rule.id).await?;
        self.check_sensor_rule(&sensor_rule).await?;
        self.repo.update_sensor_rule(sensor_rule).await
    }

    /// Delete a sensor rule.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_sensor_rule(&self, id: SensorRuleId) -> Result<(), BrightnestError> {
        self.repo.delete_sensor_rule(id).await
    }

    // -- actuator rules ----------------------------------------------------

    /// Create an actuator rule under an existing rule.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::RuleNotFound`] if the parent is missing,
    /// [`BrightnestError::NotFound`] if the actuator is missing,
    /// [`BrightnestError::Validation`] if it is a sensor, or a storage error
    /// from the repository.
    #[tracing::instrument(skip(self, actuator_rule), fields(rule_id = %actuator_rule.rule_id))]
    pub async fn create_actuator_rule(
        &self,
        actuator_rule: ActuatorRule,
    ) -> Result<ActuatorRule, BrightnestError> {
        self.check_actuator_rule(&actuator_rule).await?;
        self.repo.create_actuator_rule(actuator_rule).await
    }

    /// Look up an actuator rule by id.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::NotFound`] when it does not exist, or a
    /// storage error from the repository.
    pub async fn get_actuator_rule(
        &self,
        id: ActuatorRuleId,
    ) -> Result<ActuatorRule, BrightnestError> {
        self.repo.get_actuator_rule(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "ActuatorRule",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// Actuator rules of a rule, active or not.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_actuator_rules(
        &self,
        rule_id: RuleId,
    ) -> Result<Vec<ActuatorRule>, BrightnestError> {
        self.repo.find_actuator_rules(rule_id).await
    }

    /// Replace an actuator rule, possibly moving it to another rule.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::NotFound`] if the actuator rule or the
    /// actuator is missing, [`BrightnestError::RuleNotFound`] if the (new)
    /// parent is missing, [`BrightnestError::Validation`] if the target is a
    /// sensor, or a storage error from the repository.
    #[tracing::instrument(skip(self, actuator_rule), fields(actuator_rule_id = %actuator_rule.id))]
    pub async fn update_actuator_rule(
        &self,
        actuator_rule: ActuatorRule,
    ) -> Result<ActuatorRule, BrightnestError> {
        self.get_actuator_rule(actuator_rule.id).await?;
        self.check_actuator_rule(&actuator_rule).await?;
        self.repo.update_actuator_rule(actuator_rule).await
    }

    /// Arm or disarm one action of a rule.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::NotFound`] if the actuator rule is missing,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn set_actuator_rule_active(
        &self,
        id: ActuatorRuleId,
        is_active: bool,
    ) -> Result<ActuatorRule, BrightnestError> {
        let mut actuator_rule = self.get_actuator_rule(id).await?;
        actuator_rule.is_active = is_active;
        self.repo.update_actuator_rule(actuator_rule).await
    }

    /// Delete an actuator rule.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_actuator_rule(&self, id: ActuatorRuleId) -> Result<(), BrightnestError> {
        self.repo.delete_actuator_rule(id).await
    }
}
