//! Device — a sensor or actuator bound to exactly one driver by its type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BrightnestError, ValidationError};
use crate::id::DeviceId;

/// The two disjoint device roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Produces measures.
    Sensor,
    /// Receives actuation payloads.
    Actuator,
}

impl DeviceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Actuator => "actuator",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`DeviceKind`] label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown device kind {0:?}")]
pub struct UnknownDeviceKind(pub String);

impl FromStr for DeviceKind {
    type Err = UnknownDeviceKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensor" => Ok(Self::Sensor),
            "actuator" => Ok(Self::Actuator),
            other => Err(UnknownDeviceKind(other.to_string())),
        }
    }
}

/// Identity of a physical device from the driver's point of view.
///
/// Unique among persisted devices, and the unit of serialization in the
/// device registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    pub kind: DeviceKind,
    pub device_type: String,
    pub custom_id: String,
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.kind, self.device_type, self.custom_id)
    }
}

/// A persisted sensor or actuator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub kind: DeviceKind,
    /// Selects the driver handling this device.
    pub device_type: String,
    /// Identifier the driver uses to address the physical device.
    pub custom_id: String,
    pub name: String,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] when `device_type`,
    /// `custom_id` or `name` is empty.
    pub fn validate(&self) -> Result<(), BrightnestError> {
        if self.device_type.is_empty() {
            return Err(ValidationError::EmptyDeviceType.into());
        }
        if self.custom_id.is_empty() {
            return Err(ValidationError::EmptyCustomId.into());
        }
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    /// The registry key of this device.
    #[must_use]
    pub fn key(&self) -> DeviceKey {
        DeviceKey {
            kind: self.kind,
            device_type: self.device_type.clone(),
            custom_id: self.custom_id.clone(),
        }
    }

    /// Check that this device plays the `expected` role.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::WrongDeviceKind`] otherwise.
    pub fn expect_kind(&self, expected: DeviceKind) -> Result<(), BrightnestError> {
        if self.kind == expected {
            Ok(())
        } else {
            Err(ValidationError::WrongDeviceKind {
                id: self.id,
                expected,
            }
            .into())
        }
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    kind: Option<DeviceKind>,
    device_type: Option<String>,
    custom_id: Option<String>,
    name: Option<String>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = Some(device_type.into());
        self
    }

    #[must_use]
    pub fn custom_id(mut self, custom_id: impl Into<String>) -> Self {
        self.custom_id = Some(custom_id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// The kind defaults to [`DeviceKind::Sensor`].
    ///
    /// # Errors
    ///
    /// Returns [`BrightnestError::Validation`] if a required field is missing or empty.
    pub fn build(self) -> Result<Device, BrightnestError> {
        let device = Device {
            id: self.id.unwrap_or_default(),
            kind: self.kind.unwrap_or(DeviceKind::Sensor),
            device_type: self.device_type.unwrap_or_default(),
            custom_id: self.custom_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
        };
        device.validate()?;
        Ok(device)
    }
}
