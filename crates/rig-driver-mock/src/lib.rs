//! Mock instrument drivers for the RF check/measure rig.
//!
//! Simulated bench instruments for developing and testing sequences without
//! hardware. All mocks use async-safe delays (`tokio::time::sleep`) and are
//! silent in [`MockMode::Instant`] so unit tests run with zero wall-clock
//! cost.
//!
//! # Available mocks
//!
//! - [`MockSource`] — DC bias source with an injectable drawn-current reading
//! - [`MockGenerator`] — CW signal generator with frequency/power command logs
//! - [`MockAnalyzer`] — spectrum analyzer with marker bookkeeping and an
//!   injectable marker power
//!
//! Every mock records enough state for tests to assert the exact instrument
//! trail a sequence leaves behind (outputs restored, markers removed,
//! autocalibration re-enabled).
//!
//! # Driver factories
//!
//! Each mock ships a [`rig_core::driver::DriverFactory`] implementation so a
//! bench can be assembled from TOML config the same way a live bench would
//! be:
//!
//! ```rust,ignore
//! let factory = MockAnalyzerFactory;
//! let config = toml::toml! { addr = "GPIB0::9::INSTR" };
//! let components = factory.build(toml::Value::Table(config)).await?;
//! let analyzer = components.analyzer.unwrap();
//! ```

pub mod common;
mod mock_analyzer;
mod mock_generator;
mod mock_source;

pub use common::{MockMode, TimingConfig};

pub use mock_analyzer::{AnalyzerState, MockAnalyzer, MockAnalyzerConfig, MockAnalyzerFactory};
pub use mock_generator::{GeneratorState, MockGenerator, MockGeneratorConfig, MockGeneratorFactory};
pub use mock_source::{ChannelState, MockSource, MockSourceConfig, MockSourceFactory};

// Re-export the seeded RNG the mocks and the result model share.
pub use rig_core::rng::MockRng;
