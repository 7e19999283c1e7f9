//! Error taxonomy shared across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`BrightnestError`] via `From`. Nothing in the core retries: a failed
//! compensation step always surfaces as
//! [`BrightnestError::ManualIntervention`].

use std::fmt;

use crate::device::DeviceKind;
use crate::id::{DeviceId, RuleId};

/// Top-level error returned by every public operation.
#[derive(Debug, thiserror::Error)]
pub enum BrightnestError {
    /// A domain invariant does not hold.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A record addressed by id does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// No sensor is registered under the reported custom id.
    #[error("no sensor registered with custom id {custom_id:?}")]
    UnknownSensor { custom_id: String },

    /// The parent rule of a sensor or actuator rule does not exist.
    #[error("rule {0} not found")]
    RuleNotFound(RuleId),

    /// No driver handles this device type. Nothing was written.
    #[error("no {kind} driver registered for type {device_type:?}")]
    DeviceNotSupported {
        kind: DeviceKind,
        device_type: String,
    },

    /// The `(kind, type, custom_id)` triple is already registered. Nothing was written.
    #[error("{kind} {device_type}/{custom_id} already exists")]
    DeviceAlreadyExists {
        kind: DeviceKind,
        device_type: String,
        custom_id: String,
    },

    /// A driver call failed. Compensation has already run successfully.
    #[error("driver for type {device_type:?} failed")]
    DriverIntegration {
        device_type: String,
        #[source]
        source: DriverError,
    },

    /// Compensation failed: persisted and driver state may disagree.
    #[error(transparent)]
    ManualIntervention(#[from] ManualInterventionError),

    /// The underlying store failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A background registry task ended without reporting an outcome.
    #[error("internal error")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A name field was empty.
    #[error("name must not be empty")]
    EmptyName,

    /// A device type was empty.
    #[error("device type must not be empty")]
    EmptyDeviceType,

    /// A driver custom id was empty.
    #[error("custom id must not be empty")]
    EmptyCustomId,

    /// A measure type was empty.
    #[error("measure type must not be empty")]
    EmptyMeasureType,

    /// A numeric value was NaN or infinite.
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },

    /// A sensor rule interval has its bounds reversed.
    #[error("interval start {start} is greater than interval end {end}")]
    InvalidInterval { start: f64, end: f64 },

    /// The addressed device exists but has the wrong role.
    #[error("device {id} is not a {expected}")]
    WrongDeviceKind { id: DeviceId, expected: DeviceKind },

    /// Several sensor types share this custom id and no type was given.
    #[error("custom id {0:?} is shared by several sensor types, a sensor type is required")]
    AmbiguousSensor(String),
}

/// A record lookup returned nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Failure reported by a driver. Drivers never panic; they return one of these.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// `add` was called for an id the driver already knows.
    #[error("device {0:?} is already registered")]
    AlreadyRegistered(String),

    /// The id was never added to the driver.
    #[error("device {0:?} is unknown to the driver")]
    UnknownDevice(String),

    /// The external side (process, network, hub) failed.
    #[error("driver backend failure")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Which compensation step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationStage {
    /// Deleting the row inserted by a registration whose driver `add` failed.
    DiscardRegistration,
    /// Restoring the previous fields after a failed driver update.
    RevertUpdate,
    /// Undoing the driver side of a type migration.
    RollbackMigration,
    /// Re-adding a device to its driver after the row could not be deleted.
    RestoreDriver,
}

impl fmt::Display for CompensationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DiscardRegistration => "discarding the new row after a failed driver add",
            Self::RevertUpdate => "reverting the row after a failed driver update",
            Self::RollbackMigration => "rolling back a driver type migration",
            Self::RestoreDriver => "re-adding the device to its driver after a failed delete",
        };
        f.write_str(label)
    }
}

/// Terminal state: automatic compensation failed and an operator must
/// reconcile the device row with its driver.
#[derive(Debug, thiserror::Error)]
#[error("device {device_id} needs manual intervention: {stage} failed")]
pub struct ManualInterventionError {
    pub device_id: DeviceId,
    pub stage: CompensationStage,
    #[source]
    pub cause: Box<BrightnestError>,
}

impl ManualInterventionError {
    #[must_use]
    pub fn new(device_id: DeviceId, stage: CompensationStage, cause: BrightnestError) -> Self {
        Self {
            device_id,
            stage,
            cause: Box::new(cause),
        }
    }
}
