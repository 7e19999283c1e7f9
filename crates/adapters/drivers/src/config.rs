//! Driver table configuration.
//!
//! Each `[[drivers]]` entry binds a `(kind, type)` pair to one driver
//! implementation. Every entry gets its own driver instance.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use brightnest_app::driver_registry::DriverRegistry;
use brightnest_app::ports::Driver;
use brightnest_domain::device::DeviceKind;

use crate::command::DEFAULT_WAIT;
use crate::{CommandDriver, NoopDriver, VirtualDriver};

/// One row of the driver table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriverSpec {
    pub kind: DeviceKind,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(flatten)]
    pub driver: DriverImpl,
}

/// Which implementation serves a device type.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "driver", rename_all = "snake_case")]
pub enum DriverImpl {
    Noop,
    Virtual,
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        /// Seconds `apply` waits for the exit status before detaching.
        #[serde(default = "default_wait_secs")]
        wait_secs: u64,
    },
}

fn default_wait_secs() -> u64 {
    DEFAULT_WAIT.as_secs()
}

impl DriverSpec {
    #[must_use]
    pub fn new(kind: DeviceKind, device_type: impl Into<String>, driver: DriverImpl) -> Self {
        Self {
            kind,
            device_type: device_type.into(),
            driver,
        }
    }

    fn instantiate(&self) -> Arc<dyn Driver> {
        match &self.driver {
            DriverImpl::Noop => Arc::new(NoopDriver),
            DriverImpl::Virtual => Arc::new(VirtualDriver::default()),
            DriverImpl::Command {
                program,
                args,
                wait_secs,
            } => Arc::new(
                CommandDriver::new(program.clone(), args.clone())
                    .with_wait(Duration::from_secs(*wait_secs)),
            ),
        }
    }
}

/// The stock device types: two telemetry-fed sensors, a media player and a
/// simulated light hub.
#[must_use]
pub fn default_specs() -> Vec<DriverSpec> {
    vec![
        DriverSpec::new(DeviceKind::Sensor, "sunspot", DriverImpl::Noop),
        DriverSpec::new(DeviceKind::Sensor, "openweathermap", DriverImpl::Noop),
        DriverSpec::new(
            DeviceKind::Actuator,
            "vlc",
            DriverImpl::Command {
                program: "vlc".to_string(),
                args: vec!["--play-and-exit".to_string()],
                wait_secs: default_wait_secs(),
            },
        ),
        DriverSpec::new(DeviceKind::Actuator, "hue", DriverImpl::Virtual),
    ]
}

/// Build the read-only registry from a driver table.
///
/// Later entries for the same `(kind, type)` replace earlier ones; callers
/// validate uniqueness beforehand.
#[must_use]
pub fn build_registry(specs: &[DriverSpec]) -> DriverRegistry {
    specs
        .iter()
        .fold(DriverRegistry::builder(), |builder, spec| {
            builder.driver(spec.kind, spec.device_type.clone(), spec.instantiate())
        })
        .build()
}
