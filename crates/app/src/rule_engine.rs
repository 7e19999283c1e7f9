//! Rule engine — evaluates measures against threshold rules and actuates.
//!
//! For each measure the engine takes one snapshot of the sensor rules whose
//! closed interval contains the value, then dispatches the active actuator
//! rules of every matched rule through the [`DeviceService`]. Matches are
//! dispatched concurrently and independently: a failing actuator never stops
//! its siblings, and failures are collected in the [`EvaluationReport`].

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

use brightnest_domain::error::BrightnestError;
use brightnest_domain::id::{ActuatorRuleId, MeasureId, SensorRuleId};
use brightnest_domain::measure::Measure;
use brightnest_domain::rule::{ActuatorRule, SensorRule};

use crate::ports::{DeviceRepository, RuleRepository};
use crate::services::DeviceService;

/// One dispatch that did not go through.
#[derive(Debug)]
pub struct DispatchFailure {
    pub sensor_rule_id: SensorRuleId,
    /// `None` when the failure happened before any actuator rule was loaded.
    pub actuator_rule_id: Option<ActuatorRuleId>,
    pub error: BrightnestError,
}

/// Outcome of evaluating one measure.
#[derive(Debug)]
pub struct EvaluationReport {
    pub measure_id: MeasureId,
    /// Sensor rules satisfied by the measure.
    pub matched: usize,
    /// Actuations that succeeded.
    pub dispatched: usize,
    pub failures: Vec<DispatchFailure>,
}

impl EvaluationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct MatchOutcome {
    dispatched: usize,
    failures: Vec<DispatchFailure>,
}

/// Threshold rule engine.
pub struct RuleEngine<RR, DR> {
    rules: RR,
    devices: DeviceService<DR>,
}

impl<RR, DR> RuleEngine<RR, DR>
where
    RR: RuleRepository + Send + Sync + 'static,
    DR: DeviceRepository + Send + Sync + 'static,
{
    /// Create a new engine reading `rules` and actuating through `devices`.
    pub fn new(rules: RR, devices: DeviceService<DR>) -> Self {
        Self { rules, devices }
    }

    /// Evaluate one measure and dispatch every armed action it triggers.
    ///
    /// # Errors
    ///
    /// Fails only if the matching sensor rules cannot be read. Every later
    /// failure is reported in [`EvaluationReport::failures`].
    #[tracing::instrument(
        skip(self, measure),
        fields(measure_id = %measure.id, measure_type = %measure.measure_type, value = measure.value)
    )]
    pub async fn evaluate(&self, measure: &Measure) -> Result<EvaluationReport, BrightnestError> {
        let matches: Vec<SensorRule> = self
            .rules
            .find_matching_sensor_rules(&measure.measure_type, measure.value)
            .await?
            .into_iter()
            .filter(|sensor_rule| sensor_rule.matches(measure))
            .collect();

        let outcomes = join_all(matches.iter().map(|sensor_rule| self.dispatch_match(sensor_rule, measure))).await;

        let mut report = EvaluationReport {
            measure_id: measure.id,
            matched: matches.len(),
            dispatched: 0,
            failures: Vec::new(),
        };
        for outcome in outcomes {
            report.dispatched += outcome.dispatched;
            report.failures.extend(outcome.failures);
        }

        for failure in &report.failures {
            tracing::warn!(
                sensor_rule_id = %failure.sensor_rule_id,
                actuator_rule_id = ?failure.actuator_rule_id,
                error = %failure.error,
                "dispatch failed"
            );
        }
        if report.matched > 0 {
            tracing::info!(
                matched = report.matched,
                dispatched = report.dispatched,
                failed = report.failures.len(),
                "measure evaluated"
            );
        }
        Ok(report)
    }

    async fn dispatch_match(&self, sensor_rule: &SensorRule, measure: &Measure) -> MatchOutcome {
        let failed = |error| MatchOutcome {
            dispatched: 0,
            failures: vec![DispatchFailure {
                sensor_rule_id: sensor_rule.id,
                actuator_rule_id: None,
                error,
            }],
        };

        let rule = match self.rules.get_rule(sensor_rule.rule_id).await {
            Ok(Some(rule)) => rule,
            Ok(None) => return failed(BrightnestError::RuleNotFound(sensor_rule.rule_id)),
            Err(error) => return failed(error),
        };
        let actions = match self.rules.find_active_actuator_rules(rule.id).await {
            Ok(actions) => actions,
            Err(error) => return failed(error),
        };
        if actions.is_empty() {
            tracing::debug!(rule_id = %rule.id, measure_id = %measure.id, "rule matched but not armed");
            return MatchOutcome::default();
        }

        let results = join_all(actions.iter().map(|action| self.dispatch_action(action))).await;

        let mut outcome = MatchOutcome::default();
        for (action, result) in actions.iter().zip(results) {
            match result {
                Ok(()) => outcome.dispatched += 1,
                Err(error) => outcome.failures.push(DispatchFailure {
                    sensor_rule_id: sensor_rule.id,
                    actuator_rule_id: Some(action.id),
                    error,
                }),
            }
        }
        outcome
    }

    async fn dispatch_action(&self, action: &ActuatorRule) -> Result<(), BrightnestError> {
        self.devices
            .apply(action.actuator_id, action.value.clone())
            .await
    }

    /// Consume the evaluation queue until every sender is gone.
    ///
    /// Each measure is evaluated in its own task, so evaluations of different
    /// measures are not ordered. Returns once the queue is closed and all
    /// in-flight evaluations have finished.
    pub async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<Measure>) {
        let mut in_flight = JoinSet::new();
        tracing::info!("rule engine started");

        while let Some(measure) = receiver.recv().await {
            while let Some(finished) = in_flight.try_join_next() {
                report_task_failure(finished);
            }

            let engine = Arc::clone(&self);
            in_flight.spawn(async move {
                if let Err(error) = engine.evaluate(&measure).await {
                    tracing::error!(measure_id = %measure.id, %error, "rule evaluation failed");
                }
            });
        }

        while let Some(finished) = in_flight.join_next().await {
            report_task_failure(finished);
        }
        tracing::info!("rule engine stopped");
    }
}

/// Log an evaluation task that panicked or was cancelled. Returns whether it
/// completed normally.
fn report_task_failure(finished: Result<(), JoinError>) -> bool {
    match finished {
        Ok(()) => true,
        Err(join_error) => {
            tracing::error!(error = %join_error, panicked = join_error.is_panic(), "rule evaluation task died");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver_registry::DriverRegistry;
    use crate::evaluation_queue::InProcessEvaluationQueue;
    use crate::ports::EvaluationQueue;
    use crate::testing::{DriverOp, InMemoryDeviceRepo, InMemoryRuleRepo, RecordingDriver};
    use brightnest_domain::device::DeviceKind;
    use brightnest_domain::id::DeviceId;
    use brightnest_domain::rule::Rule;

    struct Fixture {
        engine: RuleEngine<InMemoryRuleRepo, InMemoryDeviceRepo>,
        rules: InMemoryRuleRepo,
        devices: DeviceService<InMemoryDeviceRepo>,
        driver: Arc<RecordingDriver>,
        sensor_id: DeviceId,
    }

    async fn fixture() -> Fixture {
        let driver = Arc::new(RecordingDriver::default());
        let drivers = DriverRegistry::builder()
            .actuator("hue", driver.clone())
            .sensor("sunspot", driver.clone())
            .build();
        let devices = DeviceService::new(InMemoryDeviceRepo::default(), drivers);
        let sensor_id = devices
            .register_device(DeviceKind::Sensor, "sunspot", "Probe", "AA11")
            .await
            .unwrap();
        let rules = InMemoryRuleRepo::default();
        Fixture {
            engine: RuleEngine::new(rules.clone(), devices.clone()),
            rules,
            devices,
            driver,
            sensor_id,
        }
    }

    async fn lamp(f: &Fixture, custom_id: &str) -> DeviceId {
        f.devices
            .register_device(DeviceKind::Actuator, "hue", "Lamp", custom_id)
            .await
            .unwrap()
    }

    /// A rule on TEMPERATURE in `[start, end]` with one action per `(actuator, active)`.
    async fn rule(f: &Fixture, start: f64, end: f64, actions: &[(DeviceId, bool)]) -> Rule {
        let rule = f
            .rules
            .create_rule(Rule::builder().name("Cool down").build().unwrap())
            .await
            .unwrap();
        let sensor_rule = SensorRule::builder()
            .rule_id(rule.id)
            .measure_type("TEMPERATURE")
            .interval(start, end)
            .build()
            .unwrap();
        f.rules.create_sensor_rule(sensor_rule).await.unwrap();
        for &(actuator_id, is_active) in actions {
            let action = ActuatorRule::builder()
                .rule_id(rule.id)
                .actuator_id(actuator_id)
                .value(serde_json::json!(25))
                .is_active(is_active)
                .build()
                .unwrap();
            f.rules.create_actuator_rule(action).await.unwrap();
        }
        rule
    }

    fn measure(f: &Fixture, value: f64) -> Measure {
        Measure::builder()
            .sensor_id(f.sensor_id)
            .value(value)
            .measure_type("TEMPERATURE")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_match_closed_interval_bounds() {
        let f = fixture().await;
        let actuator = lamp(&f, "BB22").await;
        rule(&f, 40.0, 50.0, &[(actuator, true)]).await;

        for (value, expected) in [(40.0, 1), (50.0, 1), (45.0, 1), (50.0001, 0), (39.9999, 0)] {
            let report = f.engine.evaluate(&measure(&f, value)).await.unwrap();
            assert_eq!(report.matched, expected, "value {value}");
        }
        assert_eq!(f.driver.applied().len(), 3);
    }

    #[tokio::test]
    async fn should_ignore_measure_of_other_type() {
        let f = fixture().await;
        let actuator = lamp(&f, "BB22").await;
        rule(&f, 40.0, 50.0, &[(actuator, true)]).await;
        let mut humidity = measure(&f, 45.0);
        humidity.measure_type = "HUMIDITY".to_string();

        let report = f.engine.evaluate(&humidity).await.unwrap();

        assert_eq!(report.matched, 0);
        assert!(f.driver.applied().is_empty());
    }

    #[tokio::test]
    async fn should_not_dispatch_when_no_actuator_rule_active() {
        let f = fixture().await;
        let actuator = lamp(&f, "BB22").await;
        rule(&f, 40.0, 50.0, &[(actuator, false)]).await;

        let report = f.engine.evaluate(&measure(&f, 45.0)).await.unwrap();

        assert_eq!(report.matched, 1);
        assert_eq!(report.dispatched, 0);
        assert!(report.is_clean());
        assert!(f.driver.applied().is_empty());
    }

    #[tokio::test]
    async fn should_dispatch_only_active_actuator_rules() {
        let f = fixture().await;
        let on = lamp(&f, "ON").await;
        let off = lamp(&f, "OFF").await;
        rule(&f, 40.0, 50.0, &[(on, true), (off, false)]).await;

        let report = f.engine.evaluate(&measure(&f, 45.0)).await.unwrap();

        assert_eq!(report.dispatched, 1);
        assert_eq!(f.driver.applied(), vec![("ON".to_string(), serde_json::json!(25))]);
    }

    #[tokio::test]
    async fn should_isolate_dispatch_failures() {
        let f = fixture().await;
        let broken = lamp(&f, "BROKEN").await;
        let healthy = lamp(&f, "HEALTHY").await;
        rule(&f, 40.0, 50.0, &[(broken, true)]).await;
        rule(&f, 40.0, 50.0, &[(healthy, true)]).await;
        f.driver.fail_for(DriverOp::Apply, "BROKEN");

        let report = f.engine.evaluate(&measure(&f, 45.0)).await.unwrap();

        assert_eq!(report.matched, 2);
        assert_eq!(report.dispatched, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, BrightnestError::DriverIntegration { .. }));
        assert!(
            f.driver
                .applied()
                .iter()
                .any(|(custom_id, _)| custom_id == "HEALTHY")
        );
    }

    #[tokio::test]
    async fn should_report_failure_when_actuator_is_gone() {
        let f = fixture().await;
        rule(&f, 40.0, 50.0, &[(DeviceId::new(), true)]).await;

        let report = f.engine.evaluate(&measure(&f, 45.0)).await.unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].error, BrightnestError::NotFound(_)));
    }

    #[tokio::test]
    async fn should_respect_sensor_binding() {
        let f = fixture().await;
        let actuator = lamp(&f, "BB22").await;
        let rule = rule(&f, 40.0, 50.0, &[(actuator, true)]).await;
        let bound = SensorRule::builder()
            .rule_id(rule.id)
            .sensor_id(DeviceId::new())
            .measure_type("TEMPERATURE")
            .interval(0.0, 100.0)
            .build()
            .unwrap();
        f.rules.create_sensor_rule(bound).await.unwrap();

        let report = f.engine.evaluate(&measure(&f, 45.0)).await.unwrap();

        assert_eq!(report.matched, 1);
    }

    #[tokio::test]
    async fn should_fail_evaluation_when_snapshot_read_fails() {
        let f = fixture().await;
        f.rules.fail_matching(true);

        let result = f.engine.evaluate(&measure(&f, 45.0)).await;

        assert!(matches!(result, Err(BrightnestError::Storage(_))));
    }

    #[tokio::test]
    async fn should_flag_evaluation_task_that_panicked() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { panic!("evaluation blew up") });
        tasks.spawn(async {});

        let mut clean = 0;
        let mut died = 0;
        while let Some(finished) = tasks.join_next().await {
            if report_task_failure(finished) {
                clean += 1;
            } else {
                died += 1;
            }
        }

        assert_eq!((clean, died), (1, 1));
    }

    #[tokio::test]
    async fn should_evaluate_queued_measures_until_queue_closed() {
        let f = fixture().await;
        let actuator = lamp(&f, "BB22").await;
        rule(&f, 40.0, 50.0, &[(actuator, true)]).await;
        let (queue, receiver) = InProcessEvaluationQueue::new(8);
        let measures = [measure(&f, 45.0), measure(&f, 10.0), measure(&f, 50.0)];
        let driver = Arc::clone(&f.driver);
        let worker = tokio::spawn(Arc::new(f.engine).run(receiver));

        for m in measures {
            queue.enqueue(m).await.unwrap();
        }
        drop(queue);
        worker.await.unwrap();

        assert_eq!(driver.applied().len(), 2);
    }
}
