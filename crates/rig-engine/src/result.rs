//! Measurement result model.
//!
//! Owns the captured (or, in mock mode, generated) sample vector exposed to
//! the presentation layer. The model is reset at the start of every check
//! and populated at the end of a successful measure; it is never left
//! partially populated — the sample vector is either fully replaced or the
//! prior state is kept.

use crate::reference::{ReferenceSource, ReferenceTable};
use rig_core::error::{AppResult, RigError};
use rig_core::rng::MockRng;
use std::fmt;
use tracing::debug;

/// One result column value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Value(f64),
    /// No reference data for this column.
    NoData,
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::NoData => write!(f, "-"),
        }
    }
}

/// Generate one plausible sample within a declared tolerance band.
///
/// A zero span or zero step collapses to the nominal mean (a fixed reference
/// point, no jitter). Otherwise the band `[mean - span, mean + span]` is
/// quantized into `step`-sized increments, one grid point is drawn uniformly
/// at random, and the result is rounded to two decimal places.
pub fn generate_value(rng: &MockRng, span: f64, step: f64, mean: f64) -> f64 {
    if span == 0.0 || step == 0.0 {
        return mean;
    }
    let start = mean - span;
    let stop = mean + span;
    let step_count = ((stop - start) / step).floor() as i64;
    let k = rng.gen_range(0..=step_count);
    round2(k as f64 * step + start)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

enum ResultMode {
    /// Samples arrive from live instrument readings.
    Live,
    /// Samples are synthesized from the reference table.
    Mock {
        source: ReferenceSource,
        table: ReferenceTable,
        rng: MockRng,
    },
}

/// The result model behind the presentation layer's table view.
pub struct MeasureResult {
    mode: ResultMode,
    headers: Vec<String>,
    raw_data: Vec<Sample>,
    only_important: bool,
    /// Set by a successful `init`; gates `ready` in mock mode.
    valid: bool,
}

impl MeasureResult {
    /// Result model fed by live instrument readings.
    pub fn live() -> Self {
        Self {
            mode: ResultMode::Live,
            headers: Vec::new(),
            raw_data: Vec::new(),
            only_important: false,
            valid: false,
        }
    }

    /// Result model that synthesizes samples from a reference table.
    ///
    /// `seed` pins the RNG for reproducible sequences in tests.
    pub fn mock(source: ReferenceSource, table: ReferenceTable, seed: Option<u64>) -> Self {
        Self {
            mode: ResultMode::Mock {
                source,
                table,
                rng: MockRng::new(seed),
            },
            headers: Vec::new(),
            raw_data: Vec::new(),
            only_important: false,
            valid: false,
        }
    }

    /// Reset the model at the start of a check.
    ///
    /// Clears prior samples. In mock mode this also validates the reference
    /// data source (exactly one table file must be present); a failed
    /// validation fails the presence check.
    pub fn init(&mut self) -> bool {
        self.clear();
        self.valid = match &self.mode {
            ResultMode::Live => true,
            ResultMode::Mock { source, .. } => source.validate(),
        };
        self.valid
    }

    fn clear(&mut self) {
        self.headers.clear();
        self.raw_data.clear();
        self.only_important = false;
    }

    /// Whether the model holds a presentable result.
    ///
    /// Live mode: once samples are in. Mock mode: unconditionally after a
    /// successful `init`.
    pub fn ready(&self) -> bool {
        match &self.mode {
            ResultMode::Live => !self.raw_data.is_empty(),
            ResultMode::Mock { .. } => self.valid,
        }
    }

    /// Ordered column labels.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Ordered samples, one per column.
    pub fn data(&self) -> &[Sample] {
        &self.raw_data
    }

    /// Copy of the important-only flag taken at measurement time.
    pub fn only_important(&self) -> bool {
        self.only_important
    }

    /// Install live-captured samples, replacing the previous result whole.
    pub fn set_samples(&mut self, headers: Vec<String>, samples: Vec<Sample>, only_important: bool) {
        self.headers = headers;
        self.raw_data = samples;
        self.only_important = only_important;
    }

    /// Populate the model after a successful measure, mock mode.
    ///
    /// Applies [`generate_value`] to every column of the reference entry for
    /// `device_index`, in table order. On any failure the prior state is
    /// left untouched.
    pub fn populate(&mut self, device_index: u32, only_important: bool) -> AppResult<()> {
        let (table, rng) = match &self.mode {
            ResultMode::Live => {
                debug!("populate is a no-op for a live result model");
                return Ok(());
            }
            ResultMode::Mock { table, rng, .. } => (table, rng),
        };
        let columns = table
            .entry(device_index)
            .ok_or(RigError::ReferenceEntryMissing(device_index))?;

        let mut headers = Vec::with_capacity(columns.len());
        let mut samples = Vec::with_capacity(columns.len());
        for column in columns {
            headers.push(column.label.clone());
            samples.push(match column.triple() {
                Some(t) => Sample::Value(generate_value(rng, t.span, t.step, t.mean)),
                None => Sample::NoData,
            });
        }
        debug!(device_index, columns = samples.len(), "mock result generated");
        self.set_samples(headers, samples, only_important);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;

    const TABLE: &str = r#"
        [[device]]
        index = 7
        columns = [
            { label = "F1, GHz", span = 0.0, step = 0.0, mean = 1.15 },
            { label = "Kp, dB", span = 0.5, step = 0.05, mean = 12.0 },
            { label = "IIP3, dBm" },
        ]
    "#;

    fn seeded_rng() -> MockRng {
        MockRng::new(Some(42))
    }

    #[test]
    fn zero_span_collapses_to_mean() {
        let rng = seeded_rng();
        assert_eq!(generate_value(&rng, 0.0, 0.05, -12.3), -12.3);
    }

    #[test]
    fn zero_step_collapses_to_mean() {
        let rng = seeded_rng();
        assert_eq!(generate_value(&rng, 0.5, 0.0, -12.3), -12.3);
    }

    #[test]
    fn values_stay_inside_tolerance_band() {
        let rng = seeded_rng();
        let (span, step, mean) = (0.5, 0.05, 12.0);
        for _ in 0..1000 {
            let v = generate_value(&rng, span, step, mean);
            assert!(v >= mean - span - 1e-9, "{v} below band");
            assert!(v <= mean + span + 1e-9, "{v} above band");
        }
    }

    #[test]
    fn values_sit_on_the_quantization_grid() {
        let rng = seeded_rng();
        let (span, step, mean) = (1.0, 0.25, -3.0);
        for _ in 0..1000 {
            let v = generate_value(&rng, span, step, mean);
            let offset = (v - (mean - span)) / step;
            assert!(
                (offset - offset.round()).abs() < 1e-6,
                "{v} not on the grid"
            );
        }
    }

    #[test]
    fn values_round_to_two_decimals() {
        let rng = seeded_rng();
        for _ in 0..100 {
            let v = generate_value(&rng, 0.37, 0.013, 5.0);
            assert_eq!(v, round2(v));
        }
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = MockRng::new(Some(9));
        let b = MockRng::new(Some(9));
        for _ in 0..32 {
            assert_eq!(
                generate_value(&a, 0.5, 0.05, 12.0),
                generate_value(&b, 0.5, 0.05, 12.0)
            );
        }
    }

    #[test]
    fn sample_display_uses_dash_sentinel() {
        assert_eq!(Sample::NoData.to_string(), "-");
        assert_eq!(Sample::Value(-12.5).to_string(), "-12.5");
    }

    fn mock_result(dir: &std::path::Path) -> MeasureResult {
        let table = ReferenceTable::from_toml_str(TABLE).unwrap();
        MeasureResult::mock(ReferenceSource::new(dir), table, Some(42))
    }

    fn write_table_file(dir: &std::path::Path) {
        let mut file = std::fs::File::create(dir.join("batch.toml")).unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();
    }

    #[test]
    fn init_fails_without_reference_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut result = mock_result(dir.path());
        assert!(!result.init());
        assert!(!result.ready());
    }

    #[test]
    fn mock_is_ready_after_successful_init() {
        let dir = tempfile::tempdir().unwrap();
        write_table_file(dir.path());
        let mut result = mock_result(dir.path());
        assert!(result.init());
        assert!(result.ready());
    }

    #[test]
    fn populate_preserves_column_order_and_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        write_table_file(dir.path());
        let mut result = mock_result(dir.path());
        assert!(result.init());

        result.populate(7, true).unwrap();
        assert_eq!(
            result.headers(),
            &["F1, GHz".to_string(), "Kp, dB".to_string(), "IIP3, dBm".to_string()]
        );
        assert_eq!(result.data()[0], Sample::Value(1.15));
        assert!(matches!(result.data()[1], Sample::Value(v) if (11.5..=12.5).contains(&v)));
        assert_eq!(result.data()[2], Sample::NoData);
        assert!(result.only_important());
    }

    #[test]
    fn populate_missing_entry_leaves_prior_state() {
        let dir = tempfile::tempdir().unwrap();
        write_table_file(dir.path());
        let mut result = mock_result(dir.path());
        assert!(result.init());
        result.populate(7, false).unwrap();
        let before = result.data().to_vec();

        let err = result.populate(99, false).unwrap_err();
        assert!(matches!(err, RigError::ReferenceEntryMissing(99)));
        assert_eq!(result.data(), before.as_slice());
    }

    #[test]
    fn init_clears_previous_samples() {
        let dir = tempfile::tempdir().unwrap();
        write_table_file(dir.path());
        let mut result = mock_result(dir.path());
        assert!(result.init());
        result.populate(7, false).unwrap();
        assert!(!result.data().is_empty());

        assert!(result.init());
        assert!(result.data().is_empty());
        assert!(result.headers().is_empty());
    }

    #[test]
    fn live_result_not_ready_until_samples_arrive() {
        let mut result = MeasureResult::live();
        assert!(result.init());
        assert!(!result.ready());

        result.set_samples(
            vec!["Kp, dB".to_string()],
            vec![Sample::Value(11.9)],
            false,
        );
        assert!(result.ready());
    }
}
