//! Mock CW signal generator.

use crate::common::{MockMode, TimingConfig};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use rig_core::capabilities::{Instrument, InstrumentStatus, SignalGenerator};
use rig_core::driver::{DriverComponents, DriverFactory, Role};
use rig_core::units::{FreqUnit, PowerUnit};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

// =============================================================================
// MockGeneratorFactory - DriverFactory implementation
// =============================================================================

/// Configuration for the mock generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockGeneratorConfig {
    /// Bus address (default: "GPIB0::19::INSTR").
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Role label used in logs (default: "generator").
    #[serde(default = "default_label")]
    pub label: String,

    /// Whether discovery succeeds (default: true).
    #[serde(default = "default_present")]
    pub present: bool,
}

fn default_addr() -> String {
    "GPIB0::19::INSTR".to_string()
}

fn default_label() -> String {
    "generator".to_string()
}

fn default_present() -> bool {
    true
}

impl Default for MockGeneratorConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            label: default_label(),
            present: true,
        }
    }
}

/// Factory for creating [`MockGenerator`] instances.
pub struct MockGeneratorFactory;

static MOCK_GENERATOR_ROLES: &[Role] = &[Role::Generator];

impl DriverFactory for MockGeneratorFactory {
    fn driver_type(&self) -> &'static str {
        "mock_generator"
    }

    fn name(&self) -> &'static str {
        "Mock CW Signal Generator"
    }

    fn roles(&self) -> &'static [Role] {
        MOCK_GENERATOR_ROLES
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        let cfg: MockGeneratorConfig = config.clone().try_into()?;
        if cfg.addr.is_empty() {
            return Err(anyhow!("addr must not be empty"));
        }
        Ok(())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DriverComponents>> {
        Box::pin(async move {
            let cfg: MockGeneratorConfig = config.try_into()?;
            let generator = Arc::new(MockGenerator::with_config(cfg));
            Ok(DriverComponents::new().with_generator(generator))
        })
    }
}

// =============================================================================
// MockGenerator
// =============================================================================

/// Programmed state of the generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneratorState {
    /// Modulation subsystem state. Generators power up modulating.
    pub modulation_on: bool,
    /// Carrier frequency, Hz.
    pub freq_hz: f64,
    /// Output power, dBm.
    pub power_dbm: f64,
    /// RF output relay state.
    pub output_on: bool,
}

impl Default for GeneratorState {
    fn default() -> Self {
        Self {
            modulation_on: true,
            freq_hz: 1e9,
            power_dbm: -135.0,
            output_on: false,
        }
    }
}

/// Mock CW signal generator.
///
/// Records every frequency and power command so tests can replay the exact
/// ladder a sweep stepped through.
pub struct MockGenerator {
    label: String,
    addr: Mutex<String>,
    present: AtomicBool,
    status: Mutex<InstrumentStatus>,
    state: Mutex<GeneratorState>,
    freq_log_hz: Mutex<Vec<f64>>,
    power_log_dbm: Mutex<Vec<f64>>,
    reset_count: AtomicU32,
    mode: MockMode,
    timing: TimingConfig,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_config(MockGeneratorConfig::default())
    }

    pub fn with_config(config: MockGeneratorConfig) -> Self {
        Self {
            label: config.label,
            addr: Mutex::new(config.addr),
            present: AtomicBool::new(config.present),
            status: Mutex::new(InstrumentStatus::Unknown),
            state: Mutex::new(GeneratorState::default()),
            freq_log_hz: Mutex::new(Vec::new()),
            power_log_dbm: Mutex::new(Vec::new()),
            reset_count: AtomicU32::new(0),
            mode: MockMode::Instant,
            timing: TimingConfig::generator(),
        }
    }

    /// Switch to realistic bus timing.
    pub fn with_mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Snapshot of the programmed state.
    pub fn state(&self) -> GeneratorState {
        *self.state.lock()
    }

    /// Every frequency command received, Hz, in order.
    pub fn freq_log_hz(&self) -> Vec<f64> {
        self.freq_log_hz.lock().clone()
    }

    /// Every power command received, dBm, in order.
    pub fn power_log_dbm(&self) -> Vec<f64> {
        self.power_log_dbm.lock().clone()
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

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Instrument for MockGenerator {
    fn label(&self) -> &str {
        &self.label
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
        debug!(label = %self.label, addr = %self.address(), found, "generator discovery");
        Ok(found)
    }

    fn status(&self) -> InstrumentStatus {
        *self.status.lock()
    }
}

#[async_trait]
impl SignalGenerator for MockGenerator {
    async fn set_modulation(&self, enabled: bool) -> Result<()> {
        self.command_delay().await;
        self.state.lock().modulation_on = enabled;
        Ok(())
    }

    async fn set_frequency(&self, value: f64, unit: FreqUnit) -> Result<()> {
        self.command_delay().await;
        let hz = unit.to_hz(value);
        self.state.lock().freq_hz = hz;
        self.freq_log_hz.lock().push(hz);
        Ok(())
    }

    async fn set_power(&self, value: f64, unit: PowerUnit) -> Result<()> {
        self.command_delay().await;
        let _ = unit;
        self.state.lock().power_dbm = value;
        self.power_log_dbm.lock().push(value);
        Ok(())
    }

    async fn set_output(&self, enabled: bool) -> Result<()> {
        self.command_delay().await;
        self.state.lock().output_on = enabled;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        self.command_delay().await;
        *self.state.lock() = GeneratorState::default();
        self.reset_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
