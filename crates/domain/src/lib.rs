//! # brightnest-domain
//!
//! Pure domain model for the brightnest home automation backend.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, the error taxonomy, timestamps
//! - Define **Devices** (sensors and actuators bound to a driver by type)
//! - Define **Measures** (timestamped readings produced by sensors)
//! - Define **Rules** (a threshold condition plus the actuation it triggers)
//! - Contain all invariant enforcement (non-empty fields, closed intervals)
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod measure;
pub mod rule;
