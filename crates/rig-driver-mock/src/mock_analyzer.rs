//! Mock spectrum analyzer.

use crate::common::{MockMode, TimingConfig};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use rig_core::capabilities::{Instrument, InstrumentStatus, MarkerMode, SpectrumAnalyzer};
use rig_core::driver::{DriverComponents, DriverFactory, Role};
use rig_core::units::FreqUnit;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

// =============================================================================
// MockAnalyzerFactory - DriverFactory implementation
// =============================================================================

/// Configuration for the mock analyzer.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockAnalyzerConfig {
    /// Bus address (default: "GPIB0::9::INSTR").
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Power reported under any active marker, dBm (default: noise floor).
    #[serde(default = "default_marker_power")]
    pub marker_power_dbm: f64,

    /// Whether discovery succeeds (default: true).
    #[serde(default = "default_present")]
    pub present: bool,
}

fn default_addr() -> String {
    "GPIB0::9::INSTR".to_string()
}

fn default_marker_power() -> f64 {
    -135.0
}

fn default_present() -> bool {
    true
}

impl Default for MockAnalyzerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            marker_power_dbm: default_marker_power(),
            present: true,
        }
    }
}

/// Factory for creating [`MockAnalyzer`] instances.
pub struct MockAnalyzerFactory;

static MOCK_ANALYZER_ROLES: &[Role] = &[Role::Analyzer];

impl DriverFactory for MockAnalyzerFactory {
    fn driver_type(&self) -> &'static str {
        "mock_analyzer"
    }

    fn name(&self) -> &'static str {
        "Mock Spectrum Analyzer"
    }

    fn roles(&self) -> &'static [Role] {
        MOCK_ANALYZER_ROLES
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        let cfg: MockAnalyzerConfig = config.clone().try_into()?;
        if cfg.addr.is_empty() {
            return Err(anyhow!("addr must not be empty"));
        }
        if !cfg.marker_power_dbm.is_finite() {
            return Err(anyhow!("marker_power_dbm must be finite"));
        }
        Ok(())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DriverComponents>> {
        Box::pin(async move {
            let cfg: MockAnalyzerConfig = config.try_into()?;
            let analyzer = Arc::new(MockAnalyzer::with_config(cfg));
            Ok(DriverComponents::new().with_analyzer(analyzer))
        })
    }
}

// =============================================================================
// MockAnalyzer
// =============================================================================

/// One active marker.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Marker {
    mode: MarkerMode,
    x_hz: f64,
}

/// Snapshot of the analyzer's programmed state.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerState {
    /// Background autocalibration state. Analyzers power up autocalibrating.
    pub autocal_on: bool,
    /// Sweep span, Hz.
    pub span_hz: f64,
    /// Measurement center frequency, Hz.
    pub center_hz: f64,
    /// Input attenuation, dB.
    pub attenuation_db: f64,
    /// Active marker numbers.
    pub active_markers: Vec<u8>,
}

/// Mock spectrum analyzer.
///
/// The marker power reading is injected ([`MockAnalyzer::set_marker_power`])
/// so presence-check thresholds can be tested exactly; the center-frequency
/// log records every point a sweep visited.
pub struct MockAnalyzer {
    addr: Mutex<String>,
    present: AtomicBool,
    status: Mutex<InstrumentStatus>,
    autocal_on: AtomicBool,
    span_hz: Mutex<f64>,
    center_hz: Mutex<f64>,
    attenuation_db: Mutex<f64>,
    markers: Mutex<BTreeMap<u8, Marker>>,
    marker_power_dbm: Mutex<f64>,
    center_log_hz: Mutex<Vec<f64>>,
    reset_count: AtomicU32,
    mode: MockMode,
    timing: TimingConfig,
}

impl MockAnalyzer {
    pub fn new() -> Self {
        Self::with_config(MockAnalyzerConfig::default())
    }

    pub fn with_config(config: MockAnalyzerConfig) -> Self {
        Self {
            addr: Mutex::new(config.addr),
            present: AtomicBool::new(config.present),
            status: Mutex::new(InstrumentStatus::Unknown),
            autocal_on: AtomicBool::new(true),
            span_hz: Mutex::new(0.0),
            center_hz: Mutex::new(0.0),
            attenuation_db: Mutex::new(0.0),
            markers: Mutex::new(BTreeMap::new()),
            marker_power_dbm: Mutex::new(config.marker_power_dbm),
            center_log_hz: Mutex::new(Vec::new()),
            reset_count: AtomicU32::new(0),
            mode: MockMode::Instant,
            timing: TimingConfig::analyzer(),
        }
    }

    /// Switch to realistic bus timing.
    pub fn with_mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Inject the power reported under any active marker, dBm.
    pub fn set_marker_power(&self, dbm: f64) {
        *self.marker_power_dbm.lock() = dbm;
    }

    /// Snapshot of the programmed state.
    pub fn state(&self) -> AnalyzerState {
        AnalyzerState {
            autocal_on: self.autocal_on.load(Ordering::Relaxed),
            span_hz: *self.span_hz.lock(),
            center_hz: *self.center_hz.lock(),
            attenuation_db: *self.attenuation_db.lock(),
            active_markers: self.markers.lock().keys().copied().collect(),
        }
    }

    /// Every measurement center frequency received, Hz, in order.
    pub fn center_log_hz(&self) -> Vec<f64> {
        self.center_log_hz.lock().clone()
    }

    /// Number of full resets received.
    pub fn reset_count(&self) -> u32 {
        self.reset_count.load(Ordering::Relaxed)
    }

    async fn command_delay(&self) {
        if self.mode == MockMode::Realistic {
            sleep(Duration::from_millis(self.timing.command_delay_ms)).await;
        }
    }
}

impl Default for MockAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Instrument for MockAnalyzer {
    fn label(&self) -> &str {
        "analyzer"
    }

    fn set_address(&self, addr: &str) {
        *self.addr.lock() = addr.to_string();
    }

    fn address(&self) -> String {
        self.addr.lock().clone()
    }

    async fn discover(&self) -> Result<bool> {
        if self.mode == MockMode::Realistic {
            sleep(Duration::from_millis(self.timing.discovery_delay_ms)).await;
        }
        let found = self.present.load(Ordering::Relaxed);
        *self.status.lock() = if found {
            InstrumentStatus::Ready
        } else {
            InstrumentStatus::NotFound
        };
        debug!(addr = %self.address(), found, "analyzer discovery");
        Ok(found)
    }

    fn status(&self) -> InstrumentStatus {
        *self.status.lock()
    }
}

#[async_trait]
impl SpectrumAnalyzer for MockAnalyzer {
    async fn set_autocalibrate(&self, enabled: bool) -> Result<()> {
        self.command_delay().await;
        self.autocal_on.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    async fn set_span(&self, value: f64, unit: FreqUnit) -> Result<()> {
        self.command_delay().await;
        *self.span_hz.lock() = unit.to_hz(value);
        Ok(())
    }

    async fn set_marker_mode(&self, marker: u8, mode: MarkerMode) -> Result<()> {
        self.command_delay().await;
        self.markers
            .lock()
            .entry(marker)
            .and_modify(|m| m.mode = mode)
            .or_insert(Marker { mode, x_hz: 0.0 });
        Ok(())
    }

    async fn set_measure_center_freq(&self, value: f64, unit: FreqUnit) -> Result<()> {
        self.command_delay().await;
        let hz = unit.to_hz(value);
        *self.center_hz.lock() = hz;
        self.center_log_hz.lock().push(hz);
        Ok(())
    }

    async fn set_marker_x_center(&self, marker: u8, value: f64, unit: FreqUnit) -> Result<()> {
        self.command_delay().await;
        let mut markers = self.markers.lock();
        let entry = markers
            .get_mut(&marker)
            .ok_or_else(|| anyhow!("marker {} is not active", marker))?;
        entry.x_hz = unit.to_hz(value);
        Ok(())
    }

    async fn read_power(&self, marker: u8) -> Result<f64> {
        self.command_delay().await;
        if !self.markers.lock().contains_key(&marker) {
            return Err(anyhow!("marker {} is not active", marker));
        }
        Ok(*self.marker_power_dbm.lock())
    }

    async fn remove_marker(&self, marker: u8) -> Result<()> {
        self.command_delay().await;
        self.markers.lock().remove(&marker);
        Ok(())
    }

    async fn set_attenuation(&self, db: f64) -> Result<()> {
        self.command_delay().await;
        *self.attenuation_db.lock() = db;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.command_delay().await;
        self.autocal_on.store(true, Ordering::Relaxed);
        *self.span_hz.lock() = 0.0;
        *self.center_hz.lock() = 0.0;
        *self.attenuation_db.lock() = 0.0;
        self.markers.lock().clear();
        self.reset_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn factory_builds_analyzer_component() {
        let factory = MockAnalyzerFactory;
        let config = toml::toml! {
            addr = "GPIB0::9::INSTR"
            marker_power_dbm = -10.0
        };
        let components = factory.build(toml::Value::Table(config)).await.unwrap();
        let analyzer = components.analyzer.unwrap();
        assert_eq!(analyzer.address(), "GPIB0::9::INSTR");
    }

    #[tokio::test]
    async fn marker_lifecycle() {
        let analyzer = MockAnalyzer::new();
        analyzer.set_marker_mode(1, MarkerMode::Position).await.unwrap();
        analyzer
            .set_marker_x_center(1, 1.15, FreqUnit::GHz)
            .await
            .unwrap();
        assert_eq!(analyzer.state().active_markers, vec![1]);

        analyzer.remove_marker(1).await.unwrap();
        assert!(analyzer.state().active_markers.is_empty());
    }

    #[tokio::test]
    async fn read_power_requires_active_marker() {
        let analyzer = MockAnalyzer::new();
        assert!(analyzer.read_power(1).await.is_err());

        analyzer.set_marker_mode(1, MarkerMode::Position).await.unwrap();
        analyzer.set_marker_power(-12.5);
        assert_eq!(analyzer.read_power(1).await.unwrap(), -12.5);
    }

    #[tokio::test]
    async fn marker_placement_requires_mode_first() {
        let analyzer = MockAnalyzer::new();
        assert!(analyzer
            .set_marker_x_center(1, 1.0, FreqUnit::GHz)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn center_log_records_visits() {
        let analyzer = MockAnalyzer::new();
        analyzer
            .set_measure_center_freq(1.15, FreqUnit::GHz)
            .await
            .unwrap();
        analyzer
            .set_measure_center_freq(1.92, FreqUnit::GHz)
            .await
            .unwrap();
        assert_eq!(analyzer.center_log_hz(), vec![1.15e9, 1.92e9]);
    }

    #[tokio::test]
    async fn reset_restores_autocal_and_clears_markers() {
        let analyzer = MockAnalyzer::new();
        analyzer.set_autocalibrate(false).await.unwrap();
        analyzer.set_marker_mode(1, MarkerMode::Position).await.unwrap();
        analyzer.set_attenuation(30.0).await.unwrap();

        analyzer.reset().await.unwrap();
        let state = analyzer.state();
        assert!(state.autocal_on);
        assert!(state.active_markers.is_empty());
        assert_eq!(state.attenuation_db, 0.0);
        assert_eq!(analyzer.reset_count(), 1);
    }
}
