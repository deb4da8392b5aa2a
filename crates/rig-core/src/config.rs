//! Catalog loading from TOML.
//!
//! The on-disk catalog is a TOML table of device records:
//!
//! ```toml
//! [device."DUT 01"]
//! f = [1.15, 1.35, 1.75, 1.92, 2.25, 2.54, 2.7, 3.0]
//! p1 = 15.0
//! p2 = 21.0
//! p_check = -10.0
//! level = -20.0
//! i_min_ma = 5.0    # optional; both bounds or neither
//! i_max_ma = 50.0
//! att = 30.0
//! ```
//!
//! Unknown fields are rejected and every record is validated before the
//! catalog is handed out, so a loaded [`DeviceCatalog`] is always coherent.

use crate::error::RigError;
use crate::params::{CurrentWindow, DeviceCatalog, DeviceTypeParams};
use anyhow::{Context, Result};
use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDeviceParams {
    f: Vec<f64>,
    p1: f64,
    p2: f64,
    p_check: f64,
    level: f64,
    #[serde(default)]
    i_min_ma: Option<f64>,
    #[serde(default)]
    i_max_ma: Option<f64>,
    att: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCatalog {
    device: BTreeMap<String, RawDeviceParams>,
}

impl RawDeviceParams {
    fn into_params(self, device: &str) -> Result<DeviceTypeParams> {
        let f_ghz: [f64; 8] = self.f.as_slice().try_into().map_err(|_| {
            RigError::catalog(
                device,
                format!("expected exactly 8 frequencies, got {}", self.f.len()),
            )
        })?;
        let interlock = match (self.i_min_ma, self.i_max_ma) {
            (Some(i_min_ma), Some(i_max_ma)) => Some(CurrentWindow { i_min_ma, i_max_ma }),
            (None, None) => None,
            _ => {
                return Err(RigError::catalog(
                    device,
                    "i_min_ma and i_max_ma must be given together or not at all",
                )
                .into())
            }
        };
        Ok(DeviceTypeParams {
            f_ghz,
            p1_dbm: self.p1,
            p2_dbm: self.p2,
            p_check_dbm: self.p_check,
            level_dbm: self.level,
            interlock,
            att_db: self.att,
        })
    }
}

fn build_catalog(raw: RawCatalog) -> Result<DeviceCatalog> {
    let mut entries = Vec::with_capacity(raw.device.len());
    for (device, raw_params) in raw.device {
        let params = raw_params.into_params(&device)?;
        debug!(device = %device, "catalog entry parsed");
        entries.push((device, params));
    }
    let catalog = DeviceCatalog::from_entries(entries)?;
    Ok(catalog)
}

/// Load the device catalog from a TOML file.
pub fn load_catalog(path: &Path) -> Result<DeviceCatalog> {
    let figment = Figment::new().merge(Toml::file(path));
    let raw: RawCatalog = figment
        .extract()
        .with_context(|| format!("failed to parse catalog file: {}", path.display()))?;
    let catalog = build_catalog(raw)?;
    info!(
        path = %path.display(),
        devices = catalog.len(),
        "device catalog loaded"
    );
    Ok(catalog)
}

/// Parse a catalog from an in-memory TOML string.
pub fn catalog_from_str(text: &str) -> Result<DeviceCatalog> {
    let raw: RawCatalog = toml::from_str(text).context("failed to parse catalog TOML")?;
    build_catalog(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG: &str = r#"
        [device."DUT 01"]
        f = [1.15, 1.35, 1.75, 1.92, 2.25, 2.54, 2.7, 3.0]
        p1 = 15.0
        p2 = 21.0
        p_check = -10.0
        level = -20.0
        i_min_ma = 5.0
        i_max_ma = 50.0
        att = 30.0

        [device."DUT 02"]
        f = [2.0, 2.2, 2.4, 2.6, 2.8, 3.0, 3.2, 3.4]
        p1 = 12.0
        p2 = 18.0
        p_check = -12.0
        level = -25.0
        att = 20.0
    "#;

    #[test]
    fn parses_two_devices() {
        let catalog = catalog_from_str(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        let first = catalog.get("DUT 01").unwrap();
        assert!(first.interlock.is_some());
        let second = catalog.get("DUT 02").unwrap();
        assert!(second.interlock.is_none());
    }

    #[test]
    fn rejects_unknown_field() {
        let text = r#"
            [device."DUT 01"]
            f = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
            p1 = 1.0
            p2 = 1.0
            p_check = 1.0
            level = 1.0
            att = 0.0
            bogus = 3
        "#;
        assert!(catalog_from_str(text).is_err());
    }

    #[test]
    fn rejects_wrong_frequency_count() {
        let text = r#"
            [device."DUT 01"]
            f = [1.0, 2.0, 3.0]
            p1 = 1.0
            p2 = 1.0
            p_check = 1.0
            level = 1.0
            att = 0.0
        "#;
        let err = catalog_from_str(text).unwrap_err();
        assert!(err.to_string().contains("8 frequencies"));
    }

    #[test]
    fn rejects_lone_window_bound() {
        let text = r#"
            [device."DUT 01"]
            f = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]
            p1 = 1.0
            p2 = 1.0
            p_check = 1.0
            level = 1.0
            i_min_ma = 5.0
            att = 0.0
        "#;
        assert!(catalog_from_str(text).is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let catalog = load_catalog(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
    }
}
