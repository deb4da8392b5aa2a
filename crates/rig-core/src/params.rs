//! Device parameter catalog.
//!
//! One closed, validated record per device type: the frequency plan, the two
//! sweep powers, the presence-check tone power and threshold, the optional
//! bias-current safety window, and the reduced-sweep attenuation. Records
//! are immutable once the catalog is built; anything malformed is rejected
//! at load time, never at use time.

use crate::error::{AppResult, RigError};
use std::collections::BTreeMap;

/// Bias-current safety window, mA.
///
/// Absence of the window on a device type disables the current interlock
/// entirely for that type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentWindow {
    pub i_min_ma: f64,
    pub i_max_ma: f64,
}

/// Measurement parameters for one device type.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTypeParams {
    /// Frequency plan F1..F8, GHz. All positive.
    pub f_ghz: [f64; 8],
    /// Generator 1 sweep power, dBm.
    pub p1_dbm: f64,
    /// Generator 2 sweep power, dBm.
    pub p2_dbm: f64,
    /// Tone power used during the presence check, dBm.
    pub p_check_dbm: f64,
    /// Minimum acceptable analyzer reading for the presence check, dBm.
    pub level_dbm: f64,
    /// Optional bias-current interlock window.
    pub interlock: Option<CurrentWindow>,
    /// Attenuation applied during the reduced sweep, dB.
    pub att_db: f64,
}

impl DeviceTypeParams {
    /// Validate the record's invariants.
    ///
    /// `device` is only used to label the error.
    pub fn validate(&self, device: &str) -> AppResult<()> {
        for (i, f) in self.f_ghz.iter().enumerate() {
            if !f.is_finite() || *f <= 0.0 {
                return Err(RigError::catalog(
                    device,
                    format!("F{} must be a positive frequency, got {}", i + 1, f),
                ));
            }
        }
        if let Some(win) = &self.interlock {
            if !(win.i_min_ma < win.i_max_ma) {
                return Err(RigError::catalog(
                    device,
                    format!(
                        "i_min_ma ({}) must be below i_max_ma ({})",
                        win.i_min_ma, win.i_max_ma
                    ),
                ));
            }
        }
        if !self.att_db.is_finite() || self.att_db < 0.0 {
            return Err(RigError::catalog(
                device,
                format!("att must be a non-negative dB value, got {}", self.att_db),
            ));
        }
        Ok(())
    }
}

/// Per-invocation flags supplied by the caller.
///
/// The engine treats this as a read-only snapshot for the duration of one
/// check or measure call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondaryParams {
    /// When true, the reduced sweep stage is skipped entirely.
    pub important: bool,
}

/// Immutable mapping from device-type identifier to its parameter record.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    entries: BTreeMap<String, DeviceTypeParams>,
}

impl DeviceCatalog {
    /// Build a catalog from validated entries.
    ///
    /// Every record is re-validated here so a catalog can only exist in a
    /// consistent state no matter how it was assembled.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, DeviceTypeParams)>,
    ) -> AppResult<Self> {
        let mut map = BTreeMap::new();
        for (device, params) in entries {
            params.validate(&device)?;
            map.insert(device, params);
        }
        Ok(Self { entries: map })
    }

    /// Look up a device type. Unknown types are a precondition failure.
    pub fn get(&self, device_type: &str) -> AppResult<&DeviceTypeParams> {
        self.entries
            .get(device_type)
            .ok_or_else(|| RigError::UnknownDeviceType(device_type.to_string()))
    }

    /// Device-type identifiers in catalog order.
    pub fn device_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse the numeric device index from a device-type identifier.
///
/// The last two characters are interpreted as a base-10 integer; this is a
/// strict positional convention used to key the reference table, not a
/// general parser. Identifiers that do not end in two ASCII digits are a
/// precondition violation.
pub fn device_index(device_type: &str) -> AppResult<u32> {
    let tail: Vec<char> = device_type
        .chars()
        .rev()
        .take(2)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if tail.len() != 2 || !tail.iter().all(|c| c.is_ascii_digit()) {
        return Err(RigError::MalformedDeviceIndex(device_type.to_string()));
    }
    let digits: String = tail.into_iter().collect();
    digits
        .parse()
        .map_err(|_| RigError::MalformedDeviceIndex(device_type.to_string()))
}
