//! Noop driver — accepts every operation without side effects.

use async_trait::async_trait;

use brightnest_app::ports::Driver;
use brightnest_domain::error::DriverError;

/// A driver for devices that need no bookkeeping, such as sensors whose
/// readings arrive over the telemetry transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDriver;

#[async_trait]
impl Driver for NoopDriver {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn add(&self, _custom_id: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn update(&self, _prev_custom_id: &str, _new_custom_id: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn remove(&self, _custom_id: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn apply(&self, _custom_id: &str, _value: &serde_json::Value) -> Result<(), DriverError> {
        Ok(())
    }
}
