//! # brightnest-adapter-drivers
//!
//! Concrete [`Driver`](brightnest_app::ports::Driver) implementations and the
//! table that binds them to device types.
//!
//! ## Provided drivers
//!
//! | Driver | Behaviour |
//! |--------|-----------|
//! | `noop` | Every operation succeeds. For passive sensors fed by telemetry. |
//! | `virtual` | In-memory device table; records every applied payload. |
//! | `command` | Runs a local program per actuation, payload as one argument. |
//!
//! ## Dependency rule
//!
//! Depends on `brightnest-app` (port traits) and `brightnest-domain` only.

mod command;
mod config;
mod noop;
mod virtual_driver;

pub use command::{CommandDriver, CommandError};
pub use config::{DriverImpl, DriverSpec, build_registry, default_specs};
pub use noop::NoopDriver;
pub use virtual_driver::VirtualDriver;
