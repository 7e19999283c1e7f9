//! Driver registry — the immutable `(kind, type) → driver` table.

use std::collections::BTreeMap;
use std::sync::Arc;

use brightnest_domain::device::DeviceKind;
use brightnest_domain::error::BrightnestError;

use crate::ports::Driver;

/// Maps a device role and type to the driver handling it.
///
/// Built once at startup and read-only afterwards, so it is shared without
/// locking. Sensor and actuator types live in separate namespaces: a
/// `"hue"` sensor and a `"hue"` actuator may use different drivers.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    drivers: BTreeMap<(DeviceKind, String), Arc<dyn Driver>>,
}

impl DriverRegistry {
    /// Create a builder for constructing a [`DriverRegistry`].
    #[must_use]
    pub fn builder() -> DriverRegistryBuilder {
        DriverRegistryBuilder::default()
    }

    /// Look up the driver for a device role and type.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::DeviceNotSupported`] when no driver is
    /// registered for the pair.
    pub fn get(&self, kind: DeviceKind, device_type: &str) -> Result<Arc<dyn Driver>, BrightnestError> {
        self.drivers
            .get(&(kind, device_type.to_string()))
            .cloned()
            .ok_or_else(|| BrightnestError::DeviceNotSupported {
                kind,
                device_type: device_type.to_string(),
            })
    }

    /// Registered device types of one role, sorted.
    #[must_use]
    pub fn types(&self, kind: DeviceKind) -> Vec<&str> {
        self.drivers
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, device_type)| device_type.as_str())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.drivers
                    .iter()
                    .map(|((kind, device_type), driver)| (format!("{kind}:{device_type}"), driver.name())),
            )
            .finish()
    }
}

/// Step-by-step builder for [`DriverRegistry`].
///
/// Registering the same `(kind, type)` twice keeps the last driver.
#[derive(Default)]
pub struct DriverRegistryBuilder {
    drivers: BTreeMap<(DeviceKind, String), Arc<dyn Driver>>,
}

impl DriverRegistryBuilder {
    /// Register the driver for a device role and type.
    #[must_use]
    pub fn driver(
        mut self,
        kind: DeviceKind,
        device_type: impl Into<String>,
        driver: Arc<dyn Driver>,
    ) -> Self {
        self.drivers.insert((kind, device_type.into()), driver);
        self
    }

    /// Register the driver for a sensor type.
    #[must_use]
    pub fn sensor(self, device_type: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        self.driver(DeviceKind::Sensor, device_type, driver)
    }

    /// Register the driver for an actuator type.
    #[must_use]
    pub fn actuator(self, device_type: impl Into<String>, driver: Arc<dyn Driver>) -> Self {
        self.driver(DeviceKind::Actuator, device_type, driver)
    }

    #[must_use]
    pub fn build(self) -> DriverRegistry {
        DriverRegistry {
            drivers: self.drivers,
        }
    }
}
