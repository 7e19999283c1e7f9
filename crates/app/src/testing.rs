//! In-memory port implementations shared by the unit tests of this crate.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use brightnest_domain::device::{Device, DeviceKind};
use brightnest_domain::error::{BrightnestError, DriverError, NotFoundError};
use brightnest_domain::id::{ActuatorRuleId, DeviceId, MeasureId, RuleId, SensorRuleId};
use brightnest_domain::measure::Measure;
use brightnest_domain::rule::{ActuatorRule, Rule, SensorRule};

use crate::ports::{DeviceRepository, Driver, EvaluationQueue, MeasureRepository, Page, RuleRepository};

fn storage_failure(what: &str) -> BrightnestError {
    BrightnestError::Storage(format!("simulated {what} failure").into())
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct InMemoryDeviceRepo {
    store: Arc<Mutex<HashMap<DeviceId, Device>>>,
    /// Updates still allowed to succeed, offset by one; zero means unlimited.
    update_budget: Arc<AtomicUsize>,
    fail_deletes: Arc<AtomicBool>,
}

impl InMemoryDeviceRepo {
    /// Let the next `allowed` updates succeed and fail every later one.
    pub fn fail_updates_after(&self, allowed: usize) {
        self.update_budget.store(allowed + 1, Ordering::SeqCst);
    }

    fn take_update_budget(&self) -> bool {
        self.update_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| match budget {
                0 => Some(0),
                1 => None,
                n => Some(n - 1),
            })
            .is_ok()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn devices(&self) -> Vec<Device> {
        self.store.lock().unwrap().values().cloned().collect()
    }

    pub fn insert(&self, device: Device) {
        self.store.lock().unwrap().insert(device.id, device);
    }

    fn check_unique(store: &HashMap<DeviceId, Device>, device: &Device) -> Result<(), BrightnestError> {
        let key = device.key();
        if store.values().any(|d| d.id != device.id && d.key() == key) {
            return Err(BrightnestError::DeviceAlreadyExists {
                kind: device.kind,
                device_type: device.device_type.clone(),
                custom_id: device.custom_id.clone(),
            });
        }
        Ok(())
    }
}

impl DeviceRepository for InMemoryDeviceRepo {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, BrightnestError>> + Send {
        let mut store = self.store.lock().unwrap();
        let result = Self::check_unique(&store, &device).map(|()| {
            store.insert(device.id, device.clone());
            device
        });
        async { result }
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, BrightnestError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn list(
        &self,
        kind: DeviceKind,
        page: Page,
    ) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send {
        let mut devices: Vec<Device> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.kind == kind)
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        let limit = page.limit.map_or(usize::MAX, |l| l as usize);
        let result = devices
            .into_iter()
            .skip(page.offset as usize)
            .take(limit)
            .collect();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send {
        let result = self.devices();
        async { Ok(result) }
    }

    fn find_by_custom_id(
        &self,
        kind: DeviceKind,
        custom_id: &str,
    ) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send {
        let result = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|d| d.kind == kind && d.custom_id == custom_id)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, BrightnestError>> + Send {
        let result = if !self.take_update_budget() {
            Err(storage_failure("update"))
        } else {
            let mut store = self.store.lock().unwrap();
            if store.contains_key(&device.id) {
                Self::check_unique(&store, &device).map(|()| {
                    store.insert(device.id, device.clone());
                    device
                })
            } else {
                Err(NotFoundError {
                    entity: "Device",
                    id: device.id.to_string(),
                }
                .into())
            }
        };
        async { result }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        let result = if self.fail_deletes.load(Ordering::SeqCst) {
            Err(storage_failure("delete"))
        } else {
            self.store.lock().unwrap().remove(&id);
            Ok(())
        };
        async { result }
    }
}

// ---------------------------------------------------------------------------
// Measures
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct InMemoryMeasureRepo {
    store: Arc<Mutex<HashMap<MeasureId, Measure>>>,
}

impl InMemoryMeasureRepo {
    pub fn measures(&self) -> Vec<Measure> {
        self.store.lock().unwrap().values().cloned().collect()
    }
}

impl MeasureRepository for InMemoryMeasureRepo {
    fn create(&self, measure: Measure) -> impl Future<Output = Result<Measure, BrightnestError>> + Send {
        self.store.lock().unwrap().insert(measure.id, measure.clone());
        async { Ok(measure) }
    }

    fn get_by_id(
        &self,
        id: MeasureId,
    ) -> impl Future<Output = Result<Option<Measure>, BrightnestError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn find_by_sensor(
        &self,
        sensor_id: DeviceId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Measure>, BrightnestError>> + Send {
        let mut measures: Vec<Measure> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.sensor_id == sensor_id)
            .cloned()
            .collect();
        measures.sort_by(|a, b| b.time.cmp(&a.time));
        measures.truncate(limit as usize);
        async { Ok(measures) }
    }

    fn update(&self, measure: Measure) -> impl Future<Output = Result<Measure, BrightnestError>> + Send {
        self.store.lock().unwrap().insert(measure.id, measure.clone());
        async { Ok(measure) }
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RuleTables {
    rules: HashMap<RuleId, Rule>,
    sensor_rules: HashMap<SensorRuleId, SensorRule>,
    actuator_rules: HashMap<ActuatorRuleId, ActuatorRule>,
}

#[derive(Clone, Default)]
pub struct InMemoryRuleRepo {
    tables: Arc<Mutex<RuleTables>>,
    fail_matching: Arc<AtomicBool>,
}

impl InMemoryRuleRepo {
    pub fn fail_matching(&self, fail: bool) {
        self.fail_matching.store(fail, Ordering::SeqCst);
    }

    pub fn counts(&self) -> (usize, usize, usize) {
        let tables = self.tables.lock().unwrap();
        (
            tables.rules.len(),
            tables.sensor_rules.len(),
            tables.actuator_rules.len(),
        )
    }
}

impl RuleRepository for InMemoryRuleRepo {
    fn create_rule(&self, rule: Rule) -> impl Future<Output = Result<Rule, BrightnestError>> + Send {
        self.tables.lock().unwrap().rules.insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn get_rule(&self, id: RuleId) -> impl Future<Output = Result<Option<Rule>, BrightnestError>> + Send {
        let result = self.tables.lock().unwrap().rules.get(&id).cloned();
        async { Ok(result) }
    }

    fn list_rules(&self) -> impl Future<Output = Result<Vec<Rule>, BrightnestError>> + Send {
        let mut rules: Vec<Rule> = self.tables.lock().unwrap().rules.values().cloned().collect();
        rules.sort_by(|a, b| a.name.cmp(&b.name));
        async { Ok(rules) }
    }

    fn update_rule(&self, rule: Rule) -> impl Future<Output = Result<Rule, BrightnestError>> + Send {
        self.tables.lock().unwrap().rules.insert(rule.id, rule.clone());
        async { Ok(rule) }
    }

    fn delete_rule(&self, id: RuleId) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        let mut tables = self.tables.lock().unwrap();
        tables.rules.remove(&id);
        tables.sensor_rules.retain(|_, sr| sr.rule_id != id);
        tables.actuator_rules.retain(|_, ar| ar.rule_id != id);
        async { Ok(()) }
    }

    fn create_sensor_rule(
        &self,
        sensor_rule: SensorRule,
    ) -> impl Future<Output = Result<SensorRule, BrightnestError>> + Send {
        self.tables
            .lock()
            .unwrap()
            .sensor_rules
            .insert(sensor_rule.id, sensor_rule.clone());
        async { Ok(sensor_rule) }
    }

    fn get_sensor_rule(
        &self,
        id: SensorRuleId,
    ) -> impl Future<Output = Result<Option<SensorRule>, BrightnestError>> + Send {
        let result = self.tables.lock().unwrap().sensor_rules.get(&id).cloned();
        async { Ok(result) }
    }

    fn find_sensor_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<SensorRule>, BrightnestError>> + Send {
        let result = self
            .tables
            .lock()
            .unwrap()
            .sensor_rules
            .values()
            .filter(|sr| sr.rule_id == rule_id)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn find_matching_sensor_rules(
        &self,
        measure_type: &str,
        value: f64,
    ) -> impl Future<Output = Result<Vec<SensorRule>, BrightnestError>> + Send {
        let result = if self.fail_matching.load(Ordering::SeqCst) {
            Err(storage_failure("rule snapshot"))
        } else {
            Ok(self
                .tables
                .lock()
                .unwrap()
                .sensor_rules
                .values()
                .filter(|sr| sr.measure_type == measure_type && sr.contains(value))
                .cloned()
                .collect())
        };
        async { result }
    }

    fn update_sensor_rule(
        &self,
        sensor_rule: SensorRule,
    ) -> impl Future<Output = Result<SensorRule, BrightnestError>> + Send {
        self.tables
            .lock()
            .unwrap()
            .sensor_rules
            .insert(sensor_rule.id, sensor_rule.clone());
        async { Ok(sensor_rule) }
    }

    fn delete_sensor_rule(
        &self,
        id: SensorRuleId,
    ) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        self.tables.lock().unwrap().sensor_rules.remove(&id);
        async { Ok(()) }
    }

    fn create_actuator_rule(
        &self,
        actuator_rule: ActuatorRule,
    ) -> impl Future<Output = Result<ActuatorRule, BrightnestError>> + Send {
        self.tables
            .lock()
            .unwrap()
            .actuator_rules
            .insert(actuator_rule.id, actuator_rule.clone());
        async { Ok(actuator_rule) }
    }

    fn get_actuator_rule(
        &self,
        id: ActuatorRuleId,
    ) -> impl Future<Output = Result<Option<ActuatorRule>, BrightnestError>> + Send {
        let result = self.tables.lock().unwrap().actuator_rules.get(&id).cloned();
        async { Ok(result) }
    }

    fn find_actuator_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<ActuatorRule>, BrightnestError>> + Send {
        let result = self
            .tables
            .lock()
            .unwrap()
            .actuator_rules
            .values()
            .filter(|ar| ar.rule_id == rule_id)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn find_active_actuator_rules(
        &self,
        rule_id: RuleId,
    ) -> impl Future<Output = Result<Vec<ActuatorRule>, BrightnestError>> + Send {
        let result = self
            .tables
            .lock()
            .unwrap()
            .actuator_rules
            .values()
            .filter(|ar| ar.rule_id == rule_id && ar.is_active)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn update_actuator_rule(
        &self,
        actuator_rule: ActuatorRule,
    ) -> impl Future<Output = Result<ActuatorRule, BrightnestError>> + Send {
        self.tables
            .lock()
            .unwrap()
            .actuator_rules
            .insert(actuator_rule.id, actuator_rule.clone());
        async { Ok(actuator_rule) }
    }

    fn delete_actuator_rule(
        &self,
        id: ActuatorRuleId,
    ) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        self.tables.lock().unwrap().actuator_rules.remove(&id);
        async { Ok(()) }
    }
}

// ---------------------------------------------------------------------------
// Evaluation queue
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct RecordingQueue {
    queued: Arc<Mutex<Vec<Measure>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingQueue {
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn queued(&self) -> Vec<Measure> {
        self.queued.lock().unwrap().clone()
    }
}

impl EvaluationQueue for RecordingQueue {
    fn enqueue(&self, measure: Measure) -> impl Future<Output = Result<(), BrightnestError>> + Send {
        let result = if self.closed.load(Ordering::SeqCst) {
            Err(BrightnestError::Internal("queue closed".into()))
        } else {
            self.queued.lock().unwrap().push(measure);
            Ok(())
        };
        async { result }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOp {
    Add,
    Update,
    Remove,
    Apply,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Add(String),
    Update(String, String),
    Remove(String),
    Apply(String, serde_json::Value),
}

#[derive(Default)]
struct DriverState {
    added: BTreeSet<String>,
    calls: Vec<DriverCall>,
    failing: HashSet<DriverOp>,
    failing_ids: HashSet<(DriverOp, String)>,
    delay: Duration,
}

/// A driver keeping the add/update/remove bookkeeping of a real one,
/// recording every call and failing on demand.
#[derive(Default)]
pub struct RecordingDriver {
    state: Mutex<DriverState>,
}

impl RecordingDriver {
    /// Fail every call of `op`.
    pub fn fail(&self, op: DriverOp) {
        self.state.lock().unwrap().failing.insert(op);
    }

    /// Fail calls of `op` addressing `custom_id`.
    pub fn fail_for(&self, op: DriverOp, custom_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_ids
            .insert((op, custom_id.to_string()));
    }

    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing.clear();
        state.failing_ids.clear();
    }

    /// Sleep for `delay` before every call.
    pub fn slow(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    async fn pause(&self) {
        let delay = self.state.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn added(&self) -> Vec<String> {
        self.state.lock().unwrap().added.iter().cloned().collect()
    }

    pub fn applied(&self) -> Vec<(String, serde_json::Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DriverCall::Apply(id, value) => Some((id, value)),
                _ => None,
            })
            .collect()
    }

    fn check(state: &DriverState, op: DriverOp, custom_id: &str) -> Result<(), DriverError> {
        if state.failing.contains(&op) || state.failing_ids.contains(&(op, custom_id.to_string())) {
            return Err(DriverError::Backend(format!("simulated {op:?} failure").into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn add(&self, custom_id: &str) -> Result<(), DriverError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriverCall::Add(custom_id.to_string()));
        Self::check(&state, DriverOp::Add, custom_id)?;
        if !state.added.insert(custom_id.to_string()) {
            return Err(DriverError::AlreadyRegistered(custom_id.to_string()));
        }
        Ok(())
    }

    async fn update(&self, prev_custom_id: &str, new_custom_id: &str) -> Result<(), DriverError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriverCall::Update(
            prev_custom_id.to_string(),
            new_custom_id.to_string(),
        ));
        Self::check(&state, DriverOp::Update, prev_custom_id)?;
        if !state.added.remove(prev_custom_id) {
            return Err(DriverError::UnknownDevice(prev_custom_id.to_string()));
        }
        state.added.insert(new_custom_id.to_string());
        Ok(())
    }

    async fn remove(&self, custom_id: &str) -> Result<(), DriverError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(DriverCall::Remove(custom_id.to_string()));
        Self::check(&state, DriverOp::Remove, custom_id)?;
        state.added.remove(custom_id);
        Ok(())
    }

    async fn apply(&self, custom_id: &str, value: &serde_json::Value) -> Result<(), DriverError> {
        self.pause().await;
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(DriverCall::Apply(custom_id.to_string(), value.clone()));
        Self::check(&state, DriverOp::Apply, custom_id)?;
        if !state.added.contains(custom_id) {
            return Err(DriverError::UnknownDevice(custom_id.to_string()));
        }
        Ok(())
    }
}
