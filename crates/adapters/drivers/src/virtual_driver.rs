//! Virtual driver — an in-memory stand-in for a hub-backed actuator.
//!
//! Keeps a `custom_id -> last payload` table and a log of every applied
//! payload so demos and tests can observe actuation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use brightnest_app::ports::Driver;
use brightnest_domain::error::DriverError;

#[derive(Debug, Default)]
struct State {
    devices: HashMap<String, Option<serde_json::Value>>,
    applied: Vec<(String, serde_json::Value)>,
}

/// A simulated driver that enforces add/update/apply bookkeeping.
#[derive(Debug, Default)]
pub struct VirtualDriver {
    state: Mutex<State>,
}

impl VirtualDriver {
    /// Ids currently known to the driver, sorted.
    pub async fn devices(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut ids: Vec<_> = state.devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Last payload applied to `custom_id`, if any.
    pub async fn current(&self, custom_id: &str) -> Option<serde_json::Value> {
        self.state
            .lock()
            .await
            .devices
            .get(custom_id)
            .cloned()
            .flatten()
    }

    /// Every `(custom_id, payload)` applied so far, in order.
    pub async fn applied(&self) -> Vec<(String, serde_json::Value)> {
        self.state.lock().await.applied.clone()
    }
}

#[async_trait]
impl Driver for VirtualDriver {
    fn name(&self) -> &'static str {
        "virtual"
    }

    async fn add(&self, custom_id: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        if state.devices.contains_key(custom_id) {
            return Err(DriverError::AlreadyRegistered(custom_id.to_string()));
        }
        state.devices.insert(custom_id.to_string(), None);
        tracing::debug!(custom_id, "virtual device added");
        Ok(())
    }

    async fn update(&self, prev_custom_id: &str, new_custom_id: &str) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        if prev_custom_id != new_custom_id && state.devices.contains_key(new_custom_id) {
            return Err(DriverError::AlreadyRegistered(new_custom_id.to_string()));
        }
        let current = state
            .devices
            .remove(prev_custom_id)
            .ok_or_else(|| DriverError::UnknownDevice(prev_custom_id.to_string()))?;
        state.devices.insert(new_custom_id.to_string(), current);
        Ok(())
    }

    async fn remove(&self, custom_id: &str) -> Result<(), DriverError> {
        self.state.lock().await.devices.remove(custom_id);
        Ok(())
    }

    async fn apply(&self, custom_id: &str, value: &serde_json::Value) -> Result<(), DriverError> {
        let mut state = self.state.lock().await;
        let slot = state
            .devices
            .get_mut(custom_id)
            .ok_or_else(|| DriverError::UnknownDevice(custom_id.to_string()))?;
        *slot = Some(value.clone());
        state.applied.push((custom_id.to_string(), value.clone()));
        tracing::info!(custom_id, %value, "virtual actuator applied");
        Ok(())
    }
}
