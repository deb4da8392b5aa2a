//! Reference tolerance table for mock value generation.
//!
//! In mock mode, measured values are synthesized from a table mapping each
//! device index to an ordered list of columns, each carrying a
//! (tolerance-span, quantization-step, nominal-mean) triple. The table is
//! loaded once at startup and read-only afterwards.
//!
//! The table file lives in a reference directory that must contain exactly
//! one `.toml` file at check time — zero or several is a hard validation
//! failure of the presence check, caught by [`ReferenceSource::validate`].
//!
//! File format:
//!
//! ```toml
//! [[device]]
//! index = 1
//! columns = [
//!     { label = "F1, GHz", mean = 1.15 },
//!     { label = "Kp, dB", span = 0.5, step = 0.05, mean = 12.0 },
//!     { label = "IIP3, dBm" },   # no triple: reported as "-"
//! ]
//! ```

use anyhow::{bail, Context, Result};
use rig_core::error::RigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One tolerance triple: span, quantization step, nominal mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefTriple {
    pub span: f64,
    pub step: f64,
    pub mean: f64,
}

/// One labeled column of a device's reference entry.
///
/// The triple is all-or-nothing: a column with only some of span/step/mean
/// is rejected at load time. A column with none reports the "-" sentinel.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RefColumn {
    pub label: String,
    #[serde(default)]
    span: Option<f64>,
    #[serde(default)]
    step: Option<f64>,
    #[serde(default)]
    mean: Option<f64>,
}

impl RefColumn {
    /// The tolerance triple, if the column carries one.
    pub fn triple(&self) -> Option<RefTriple> {
        match (self.span, self.step, self.mean) {
            (Some(span), Some(step), Some(mean)) => Some(RefTriple { span, step, mean }),
            _ => None,
        }
    }

    fn validate(&self, index: u32) -> Result<()> {
        let given = [self.span, self.step, self.mean]
            .iter()
            .filter(|v| v.is_some())
            .count();
        if given != 0 && given != 3 {
            bail!(RigError::Reference(format!(
                "device {}: column '{}' must give span, step and mean together or none",
                index, self.label
            )));
        }
        if let Some(t) = self.triple() {
            if !t.span.is_finite() || t.span < 0.0 || !t.step.is_finite() || t.step < 0.0 {
                bail!(RigError::Reference(format!(
                    "device {}: column '{}' has negative or non-finite span/step",
                    index, self.label
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RefDeviceEntry {
    index: u32,
    columns: Vec<RefColumn>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RefFile {
    device: Vec<RefDeviceEntry>,
}

/// Device index → ordered column list. Read-only after load.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    entries: BTreeMap<u32, Vec<RefColumn>>,
}

impl ReferenceTable {
    /// Parse a table from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let raw: RefFile = toml::from_str(text).context("failed to parse reference table")?;
        let mut entries = BTreeMap::new();
        for device in raw.device {
            for column in &device.columns {
                column.validate(device.index)?;
            }
            if entries.insert(device.index, device.columns).is_some() {
                bail!(RigError::Reference(format!(
                    "duplicate entry for device index {}",
                    device.index
                )));
            }
        }
        debug!(devices = entries.len(), "reference table parsed");
        Ok(Self { entries })
    }

    /// Load the table from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read reference table: {}", path.display()))?;
        let table = Self::from_toml_str(&text)?;
        info!(path = %path.display(), devices = table.entries.len(), "reference table loaded");
        Ok(table)
    }

    /// Columns for one device index, in file order.
    pub fn entry(&self, index: u32) -> Option<&[RefColumn]> {
        self.entries.get(&index).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The directory the reference table is expected in.
///
/// Mirrors the bench convention of dropping one per-batch reference file
/// next to the application: the check refuses to run unless the directory
/// holds exactly one candidate file.
#[derive(Debug, Clone)]
pub struct ReferenceSource {
    dir: PathBuf,
}

impl ReferenceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the single reference file, or an error describing why the
    /// directory is not in a usable state.
    pub fn locate(&self) -> Result<PathBuf> {
        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("failed to list reference dir: {}", self.dir.display()))?
        {
            let path = entry?.path();
            let is_table = path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
            if is_table {
                candidates.push(path);
            }
        }
        match candidates.len() {
            1 => Ok(candidates.remove(0)),
            n => bail!(
                "expected exactly one reference table in {}, found {}",
                self.dir.display(),
                n
            ),
        }
    }

    /// Whether the directory currently holds exactly one reference file.
    pub fn validate(&self) -> bool {
        match self.locate() {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "reference source validation failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TABLE: &str = r#"
        [[device]]
        index = 1
        columns = [
            { label = "F1, GHz", span = 0.0, step = 0.0, mean = 1.15 },
            { label = "Kp, dB", span = 0.5, step = 0.05, mean = 12.0 },
            { label = "IIP3, dBm" },
        ]

        [[device]]
        index = 2
        columns = [
            { label = "Kp, dB", span = 1.0, step = 0.1, mean = 10.0 },
        ]
    "#;

    #[test]
    fn parses_ordered_columns() {
        let table = ReferenceTable::from_toml_str(TABLE).unwrap();
        let columns = table.entry(1).unwrap();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].label, "F1, GHz");
        assert!(columns[2].triple().is_none());
        assert!(table.entry(3).is_none());
    }

    #[test]
    fn rejects_partial_triple() {
        let text = r#"
            [[device]]
            index = 1
            columns = [ { label = "Kp", span = 0.5 } ]
        "#;
        let err = ReferenceTable::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("together or none"));
    }

    #[test]
    fn rejects_negative_step() {
        let text = r#"
            [[device]]
            index = 1
            columns = [ { label = "Kp", span = 0.5, step = -0.1, mean = 1.0 } ]
        "#;
        assert!(ReferenceTable::from_toml_str(text).is_err());
    }

    #[test]
    fn rejects_duplicate_index() {
        let text = r#"
            [[device]]
            index = 1
            columns = []

            [[device]]
            index = 1
            columns = []
        "#;
        let err = ReferenceTable::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    fn write_table(dir: &Path, name: &str) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();
    }

    #[test]
    fn source_requires_exactly_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = ReferenceSource::new(dir.path());

        assert!(!source.validate());

        write_table(dir.path(), "batch_a.toml");
        assert!(source.validate());

        write_table(dir.path(), "batch_b.toml");
        assert!(!source.validate());
    }

    #[test]
    fn source_ignores_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "batch.toml");
        fs::File::create(dir.path().join("notes.txt")).unwrap();

        let source = ReferenceSource::new(dir.path());
        let path = source.locate().unwrap();
        assert!(path.ends_with("batch.toml"));
    }

    #[test]
    fn load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_table(dir.path(), "batch.toml");
        let source = ReferenceSource::new(dir.path());
        let table = ReferenceTable::load(&source.locate().unwrap()).unwrap();
        assert!(table.entry(2).is_some());
    }
}
