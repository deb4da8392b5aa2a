//! Mock DC bias source.

use crate::common::{MockMode, TimingConfig};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use rig_core::capabilities::{CurrentSource, Instrument, InstrumentStatus};
use rig_core::driver::{DriverComponents, DriverFactory, Role};
use rig_core::units::{CurrentUnit, VoltageUnit};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

// =============================================================================
// MockSourceFactory - DriverFactory implementation
// =============================================================================

/// Configuration for the mock source.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockSourceConfig {
    /// Bus address (default: "GPIB0::5::INSTR").
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Current the DUT appears to draw, mA (default: 0.0).
    #[serde(default)]
    pub drawn_current_ma: f64,

    /// Whether discovery succeeds (default: true).
    #[serde(default = "default_present")]
    pub present: bool,
}

fn default_addr() -> String {
    "GPIB0::5::INSTR".to_string()
}

fn default_present() -> bool {
    true
}

impl Default for MockSourceConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            drawn_current_ma: 0.0,
            present: true,
        }
    }
}

/// Factory for creating [`MockSource`] instances.
pub struct MockSourceFactory;

static MOCK_SOURCE_ROLES: &[Role] = &[Role::Source];

impl DriverFactory for MockSourceFactory {
    fn driver_type(&self) -> &'static str {
        "mock_source"
    }

    fn name(&self) -> &'static str {
        "Mock DC Bias Source"
    }

    fn roles(&self) -> &'static [Role] {
        MOCK_SOURCE_ROLES
    }

    fn validate(&self, config: &toml::Value) -> Result<()> {
        let cfg: MockSourceConfig = config.clone().try_into()?;
        if cfg.addr.is_empty() {
            return Err(anyhow!("addr must not be empty"));
        }
        if !cfg.drawn_current_ma.is_finite() || cfg.drawn_current_ma < 0.0 {
            return Err(anyhow!(
                "drawn_current_ma must be non-negative, got {}",
                cfg.drawn_current_ma
            ));
        }
        Ok(())
    }

    fn build(&self, config: toml::Value) -> BoxFuture<'static, Result<DriverComponents>> {
        Box::pin(async move {
            let cfg: MockSourceConfig = config.try_into()?;
            let source = Arc::new(MockSource::with_config(cfg));
            Ok(DriverComponents::new().with_source(source))
        })
    }
}

// =============================================================================
// MockSource
// =============================================================================

/// Programmed state of one output channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelState {
    /// Programmed current limit, mA.
    pub current_limit_ma: f64,
    /// Programmed output voltage, V.
    pub voltage_v: f64,
    /// Output relay state.
    pub output_on: bool,
}

/// Mock DC bias source.
///
/// The drawn-current reading is injected by the test
/// ([`MockSource::set_drawn_current`]) rather than modeled, so interlock
/// scenarios are exact.
pub struct MockSource {
    addr: Mutex<String>,
    present: AtomicBool,
    status: Mutex<InstrumentStatus>,
    drawn_current_ma: Mutex<f64>,
    channels: Mutex<BTreeMap<u8, ChannelState>>,
    reset_count: AtomicU32,
    mode: MockMode,
    timing: TimingConfig,
}

impl MockSource {
    pub fn new() -> Self {
        Self::with_config(MockSourceConfig::default())
    }

    pub fn with_config(config: MockSourceConfig) -> Self {
        Self {
            addr: Mutex::new(config.addr),
            present: AtomicBool::new(config.present),
            status: Mutex::new(InstrumentStatus::Unknown),
            drawn_current_ma: Mutex::new(config.drawn_current_ma),
            channels: Mutex::new(BTreeMap::new()),
            reset_count: AtomicU32::new(0),
            mode: MockMode::Instant,
            timing: TimingConfig::source(),
        }
    }

    /// Switch to realistic bus timing.
    pub fn with_mode(mut self, mode: MockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Inject the current the DUT appears to draw, mA.
    pub fn set_drawn_current(&self, ma: f64) {
        *self.drawn_current_ma.lock() = ma;
    }

    /// Snapshot of a channel's programmed state.
    pub fn channel_state(&self, channel: u8) -> ChannelState {
        self.channels
            .lock()
            .get(&channel)
            .copied()
            .unwrap_or_default()
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

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Instrument for MockSource {
    fn label(&self) -> &str {
        "source"
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
        debug!(addr = %self.address(), found, "source discovery");
        Ok(found)
    }

    fn status(&self) -> InstrumentStatus {
        *self.status.lock()
    }
}

#[async_trait]
impl CurrentSource for MockSource {
    async fn set_current(&self, channel: u8, value: f64, unit: CurrentUnit) -> Result<()> {
        self.command_delay().await;
        self.channels.lock().entry(channel).or_default().current_limit_ma = unit.to_ma(value);
        Ok(())
    }

    async fn set_voltage(&self, channel: u8, value: f64, unit: VoltageUnit) -> Result<()> {
        self.command_delay().await;
        self.channels.lock().entry(channel).or_default().voltage_v = unit.to_volts(value);
        Ok(())
    }

    async fn set_output(&self, channel: u8, enabled: bool) -> Result<()> {
        self.command_delay().await;
        self.channels.lock().entry(channel).or_default().output_on = enabled;
        Ok(())
    }

    async fn read_current(&self, channel: u8) -> Result<f64> {
        self.command_delay().await;
        let output_on = self.channel_state(channel).output_on;
        if !output_on {
            // Nothing can flow through an open relay.
            return Ok(0.0);
        }
        Ok(*self.drawn_current_ma.lock())
    }

    async fn reset(&self) -> Result<()> {
        self.command_delay().await;
        self.channels.lock().clear();
        self.reset_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
