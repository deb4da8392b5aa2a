//! Typed errors shared across the rig workspace.
//!
//! [`RigError`] covers the failures the engine must surface with a stable
//! shape: catalog preconditions, malformed device identifiers, missing
//! reference data. Driver and engine boundaries otherwise use
//! `anyhow::Result`, wrapping a `RigError` where a typed variant exists so
//! callers can still match on it.

use thiserror::Error;

/// Convenience alias for results using the rig error type.
pub type AppResult<T> = std::result::Result<T, RigError>;

/// Primary error type for the rig.
///
/// Precondition failures (`UnknownDeviceType`, `MalformedDeviceIndex`) are
/// fatal to the call that raised them and are never silently defaulted.
/// Threshold misses and interlock trips are *not* errors — they are ordinary
/// `false`/`None` outcomes of the sequencing engine.
#[derive(Error, Debug)]
pub enum RigError {
    /// Requested device type has no catalog entry.
    #[error("unknown device type '{0}'")]
    UnknownDeviceType(String),

    /// Device-type identifier does not end in two decimal digits.
    ///
    /// The trailing two characters select the reference-table entry in mock
    /// mode; anything else is a caller bug, not a recoverable condition.
    #[error("device type '{0}' does not end in a two-digit index")]
    MalformedDeviceIndex(String),

    /// Catalog entry failed load-time validation.
    #[error("catalog entry '{device}': {message}")]
    Catalog { device: String, message: String },

    /// Reference table has no entry for the requested device index.
    #[error("reference table has no entry for device index {0}")]
    ReferenceEntryMissing(u32),

    /// Reference table content failed load-time validation.
    #[error("reference table: {0}")]
    Reference(String),

    /// Standard I/O failure (catalog or reference file access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Instrument-level fault reported by a driver.
    ///
    /// Not retried anywhere in the engine; the sequence restores instrument
    /// state and reports.
    #[error("instrument error: {0}")]
    Instrument(String),
}

impl RigError {
    /// Build a catalog validation error.
    pub fn catalog(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Catalog {
            device: device.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unknown_device() {
        let err = RigError::UnknownDeviceType("DUT 99".into());
        assert_eq!(err.to_string(), "unknown device type 'DUT 99'");
    }

    #[test]
    fn display_catalog() {
        let err = RigError::catalog("DUT 01", "i_min_ma must be below i_max_ma");
        assert!(err.to_string().contains("DUT 01"));
        assert!(err.to_string().contains("i_min_ma"));
    }
}
