//! Driver port — the capability contract of a device-type adapter.
//!
//! A driver bridges one device type (a vendor hub, a local media player, a
//! polled web API, …) into brightnest. Whatever protocol it speaks stays
//! inside the adapter; the core only sees these four operations.
//!
//! Every operation reports failure as a [`DriverError`] value. Drivers may
//! hold internal state (an id → address table, say) but own it exclusively,
//! behind their own synchronization.

use async_trait::async_trait;

use brightnest_domain::error::DriverError;

/// A pluggable device-type adapter.
///
/// Implementations live in adapter crates (e.g. `adapter_drivers`) and are
/// indexed by type in the [`DriverRegistry`](crate::driver_registry::DriverRegistry).
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short name of the implementation (e.g. `"virtual"`), used in logs.
    fn name(&self) -> &'static str;

    /// Bring a device online (discover its address, register with a hub, …).
    ///
    /// Not idempotent: adding an id twice may fail with
    /// [`DriverError::AlreadyRegistered`].
    async fn add(&self, custom_id: &str) -> Result<(), DriverError>;

    /// Re-point the driver from `prev_custom_id` to `new_custom_id`.
    ///
    /// Fails with [`DriverError::UnknownDevice`] if `prev_custom_id` was never added.
    async fn update(&self, prev_custom_id: &str, new_custom_id: &str) -> Result<(), DriverError>;

    /// Release external resources. Removing an unknown id succeeds.
    async fn remove(&self, custom_id: &str) -> Result<(), DriverError>;

    /// Send an actuation payload.
    ///
    /// Fails with [`DriverError::UnknownDevice`] if `custom_id` was never added.
    async fn apply(&self, custom_id: &str, value: &serde_json::Value) -> Result<(), DriverError>;
}
