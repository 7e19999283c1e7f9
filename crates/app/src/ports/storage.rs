//! Storage port — repository traits for devices and measures.

use std::future::Future;

use brightnest_domain::device::{Device, DeviceKind};
use brightnest_domain::error::BrightnestError;
use brightnest_domain::id::{DeviceId, MeasureId};
use brightnest_domain::measure::Measure;

/// Window over a listing, as `(limit, offset)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows; `None` means no limit.
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub offset: u32,
}

impl Page {
    /// Every row.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: Some(limit),
            offset,
        }
    }
}

/// Repository for persisting and querying [`Device`]s.
///
/// Only the device registry service writes through this port.
pub trait DeviceRepository {
    /// Insert a new device.
    ///
    /// Check and insert are one atomic step: when another device already has
    /// the same `(kind, device_type, custom_id)`, nothing is written and
    /// [`BrightnestError::DeviceAlreadyExists`] is returned.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, BrightnestError>> + Send;

    /// Get a device by its unique identifier.
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, BrightnestError>> + Send;

    /// List devices of one role, ordered by name.
    fn list(
        &self,
        kind: DeviceKind,
        page: Page,
    ) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send;

    /// List every device, sensors and actuators alike.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send;

    /// Find devices of one role by driver custom id, across device types.
    fn find_by_custom_id(
        &self,
        kind: DeviceKind,
        custom_id: &str,
    ) -> impl Future<Output = Result<Vec<Device>, BrightnestError>> + Send;

    /// Overwrite an existing device.
    ///
    /// Fails with [`BrightnestError::DeviceAlreadyExists`] when the new key
    /// collides with another device.
    fn update(&self, device: Device) -> impl Future<Output = Result<Device, BrightnestError>> + Send;

    /// Delete a device by its unique identifier.
    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), BrightnestError>> + Send;
}

/// Repository for persisting and querying [`Measure`]s.
pub trait MeasureRepository {
    /// Persist a new measure.
    fn create(
        &self,
        measure: Measure,
    ) -> impl Future<Output = Result<Measure, BrightnestError>> + Send;

    /// Get a measure by its unique identifier.
    fn get_by_id(
        &self,
        id: MeasureId,
    ) -> impl Future<Output = Result<Option<Measure>, BrightnestError>> + Send;

    /// Most recent measures of a sensor, newest first.
    fn find_by_sensor(
        &self,
        sensor_id: DeviceId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Measure>, BrightnestError>> + Send;

    /// Overwrite an existing measure (administrative correction only).
    fn update(
        &self,
        measure: Measure,
    ) -> impl Future<Output = Result<Measure, BrightnestError>> + Send;
}
