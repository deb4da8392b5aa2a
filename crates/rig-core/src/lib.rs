//! Core types and traits for the RF DUT check/measure rig.
//!
//! This crate defines everything the sequencing engine and the drivers agree
//! on but neither owns alone:
//!
//! - [`capabilities`] — per-role instrument contracts (`CurrentSource`,
//!   `SignalGenerator`, `SpectrumAnalyzer`) plus the common [`capabilities::Instrument`]
//!   discovery surface. The engine depends only on these traits, never on a
//!   concrete transport.
//! - [`units`] — frequency/power/current/voltage unit tags carried alongside
//!   raw `f64` values at the capability boundary.
//! - [`params`] — the validated device-parameter catalog (one closed record
//!   per device type) and the trailing-digit device index convention.
//! - [`config`] — TOML catalog loading with load-time validation.
//! - [`driver`] — the factory plugin surface drivers register through.
//! - [`error`] — the typed error enum shared across the workspace.
//! - [`rng`] — seeded RNG wrapper used by mock drivers and mock value
//!   generation.

pub mod capabilities;
pub mod config;
pub mod driver;
pub mod error;
pub mod params;
pub mod rng;
pub mod units;

pub use error::{AppResult, RigError};
pub use params::{DeviceCatalog, DeviceTypeParams, SecondaryParams};
