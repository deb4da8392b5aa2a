//! The check/measure sequencing engine.
//!
//! Drives the instrument rack through ordered, timed command sequences.
//! Exactly one sequence runs at a time (the execution host serializes
//! invocations); the engine itself holds no mutable state between calls
//! beyond the read-only catalog.
//!
//! Both entry points guarantee instrument-state hygiene: every exit path of
//! [`SequenceEngine::check`] restores outputs to off and analyzer
//! autocalibration to on, and every exit path of
//! [`SequenceEngine::measure`] past the interlock gate ends in a full reset
//! of all four instruments.

use crate::rack::InstrumentRack;
use crate::result::MeasureResult;
use anyhow::Result;
use rig_core::capabilities::MarkerMode;
use rig_core::params::{device_index, CurrentWindow, DeviceCatalog, DeviceTypeParams, SecondaryParams};
use rig_core::units::{CurrentUnit, FreqUnit, PowerUnit, VoltageUnit};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Source channel the DUT bias is wired to.
const SOURCE_CHANNEL: u8 = 1;

/// Fixed bias voltage applied while sampling drawn current, V.
const BIAS_VOLTAGE_V: f64 = 5.0;

/// Narrow analyzer span used for marker readings, MHz.
const ANALYZER_SPAN_MHZ: f64 = 1.0;

/// The single marker every sequence works with.
const MARKER: u8 = 1;

/// Two-tone ladder: gen2 power offsets relative to P2, dB.
const LADDER_START_DB: f64 = -30.0;
const LADDER_STOP_DB: f64 = -2.0;
const LADDER_STEP_DB: f64 = 2.0;
const LADDER_STEPS: u32 = ((LADDER_STOP_DB - LADDER_START_DB) / LADDER_STEP_DB) as u32;

/// Second-tone offset for the repeated ladder, GHz (5 MHz below nominal).
const IIP3_DELTA_GHZ: f64 = 0.005;

/// Default settle delay after repositioning instruments.
const DEFAULT_SETTLE: Duration = Duration::from_millis(300);

/// Outcome marker of a completed measure sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    /// Numeric index parsed from the device-type identifier's trailing
    /// digits; keys the reference table in mock mode.
    pub device_index: u32,
    /// Spectral/power points the sweep positioned instruments for.
    pub points_visited: usize,
}

struct CheckReadings {
    power_dbm: f64,
    drawn_ma: Option<f64>,
}

/// The check/measure state machine.
pub struct SequenceEngine {
    catalog: Arc<DeviceCatalog>,
    settle: Duration,
}

impl SequenceEngine {
    pub fn new(catalog: Arc<DeviceCatalog>) -> Self {
        Self {
            catalog,
            settle: DEFAULT_SETTLE,
        }
    }

    /// Override the per-point settle delay. Zero elides the sleeps entirely
    /// (mock/test runs).
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    async fn settle(&self) {
        if !self.settle.is_zero() {
            sleep(self.settle).await;
        }
    }

    // =========================================================================
    // Check
    // =========================================================================

    /// Presence check: is a device of this type connected and biased
    /// sensibly?
    ///
    /// Programs a single tone at F1 and compares the analyzer's marker
    /// reading against the device's threshold; if the type declares a
    /// bias-current window, the drawn current must also fall strictly inside
    /// it. Instrument outputs and analyzer autocalibration are restored on
    /// every exit path.
    pub async fn check(
        &self,
        rack: &InstrumentRack,
        device_type: &str,
        secondary: &SecondaryParams,
        result: &mut MeasureResult,
    ) -> Result<bool> {
        let params = self.catalog.get(device_type)?;
        info!(device_type, important_only = secondary.important, "presence check started");

        if !result.init() {
            warn!(device_type, "result model init failed, check aborted");
            return Ok(false);
        }

        let body = self.check_body(rack, params).await;
        if let Err(e) = Self::restore_after_check(rack).await {
            warn!(error = %e, "post-check restore incomplete");
        }
        let readings = body?;

        let current_ok = match (&params.interlock, readings.drawn_ma) {
            (Some(window), Some(drawn)) => {
                window.i_min_ma < drawn && drawn < window.i_max_ma
            }
            _ => true,
        };
        let present = readings.power_dbm > params.level_dbm && current_ok;
        info!(
            device_type,
            read_power = readings.power_dbm,
            level = params.level_dbm,
            current_ok,
            present,
            "presence check complete"
        );
        Ok(present)
    }

    async fn check_body(
        &self,
        rack: &InstrumentRack,
        params: &DeviceTypeParams,
    ) -> Result<CheckReadings> {
        let drawn_ma = match &params.interlock {
            Some(window) => Some(self.sample_bias_current(rack, window).await?),
            None => None,
        };

        let f1 = params.f_ghz[0];
        rack.gen1.set_modulation(false).await?;
        rack.gen1.set_frequency(f1, FreqUnit::GHz).await?;
        rack.gen1.set_power(params.p_check_dbm, PowerUnit::Dbm).await?;
        rack.gen1.set_output(true).await?;

        let analyzer = &rack.analyzer;
        analyzer.set_autocalibrate(false).await?;
        analyzer.set_span(ANALYZER_SPAN_MHZ, FreqUnit::MHz).await?;
        analyzer.set_marker_mode(MARKER, MarkerMode::Position).await?;
        analyzer.set_measure_center_freq(f1, FreqUnit::GHz).await?;
        analyzer.set_marker_x_center(MARKER, f1, FreqUnit::GHz).await?;
        self.settle().await;
        let power_dbm = analyzer.read_power(MARKER).await?;

        Ok(CheckReadings { power_dbm, drawn_ma })
    }

    /// Restore the rack to its idle posture after a check, continuing past
    /// individual failures so one bad command cannot leave outputs live.
    async fn restore_after_check(rack: &InstrumentRack) -> Result<()> {
        let mut first_err: Option<anyhow::Error> = None;
        let mut note = |step: &'static str, outcome: Result<()>| {
            if let Err(e) = outcome {
                warn!(step, error = %e, "restore step failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        };
        note("remove marker", rack.analyzer.remove_marker(MARKER).await);
        note("gen1 output off", rack.gen1.set_output(false).await);
        note("gen1 modulation on", rack.gen1.set_modulation(true).await);
        note(
            "source output off",
            rack.source.set_output(SOURCE_CHANNEL, false).await,
        );
        note(
            "analyzer autocal on",
            rack.analyzer.set_autocalibrate(true).await,
        );
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Measure
    // =========================================================================

    /// Parametric sweep over the device's frequency plan.
    ///
    /// Returns `Ok(None)` if the bias-current interlock trips before the
    /// sweep starts — the one safety-triggered early termination in the
    /// engine; it is reported, not retried. On any other exit path the
    /// sequence ends with a full reset of all four instruments.
    pub async fn measure(
        &self,
        rack: &InstrumentRack,
        device_type: &str,
        secondary: &SecondaryParams,
    ) -> Result<Option<SweepSummary>> {
        let params = self.catalog.get(device_type)?;
        let index = device_index(device_type)?;
        info!(
            device_type,
            device_index = index,
            important_only = secondary.important,
            "measure sequence started"
        );

        if let Some(window) = &params.interlock {
            let drawn = self.sample_bias_current(rack, window).await?;
            if drawn >= window.i_max_ma {
                warn!(
                    device_type,
                    drawn_ma = drawn,
                    i_max_ma = window.i_max_ma,
                    "bias current at limit, measure aborted"
                );
                rack.source.set_output(SOURCE_CHANNEL, false).await?;
                return Ok(None);
            }
        }

        let body = self.measure_body(rack, params, secondary).await;
        if let Err(e) = Self::reset_all(rack).await {
            warn!(error = %e, "post-measure reset incomplete");
        }
        let points_visited = body?;

        info!(device_type, points_visited, "measure sequence complete");
        Ok(Some(SweepSummary {
            device_index: index,
            points_visited,
        }))
    }

    async fn measure_body(
        &self,
        rack: &InstrumentRack,
        params: &DeviceTypeParams,
        secondary: &SecondaryParams,
    ) -> Result<usize> {
        let analyzer = &rack.analyzer;
        analyzer.set_autocalibrate(false).await?;
        analyzer.set_span(ANALYZER_SPAN_MHZ, FreqUnit::MHz).await?;
        analyzer.set_marker_mode(MARKER, MarkerMode::Position).await?;

        for generator in [&rack.gen1, &rack.gen2] {
            generator.set_modulation(false).await?;
            generator.set_output(true).await?;
        }

        let mut points = self.important_stage(rack, params).await?;
        if !secondary.important {
            points += self.reduced_stage(rack, params).await?;
        }
        Ok(points)
    }

    /// Important stage: two tone pairs plus two probe points, six spectral
    /// points total. Always runs.
    async fn important_stage(
        &self,
        rack: &InstrumentRack,
        params: &DeviceTypeParams,
    ) -> Result<usize> {
        debug!("important stage");
        let f = &params.f_ghz;
        let mut points = 0;

        for (primary, secondary_tone) in [(f[0], f[3]), (f[2], f[5])] {
            rack.gen1.set_frequency(primary, FreqUnit::GHz).await?;
            rack.gen1.set_power(params.p1_dbm, PowerUnit::Dbm).await?;
            rack.gen2.set_frequency(secondary_tone, FreqUnit::GHz).await?;
            rack.gen2.set_power(params.p2_dbm, PowerUnit::Dbm).await?;

            for freq in [primary, secondary_tone] {
                self.visit_point(rack, freq).await?;
                points += 1;
            }
        }

        for probe in [f[6], f[7]] {
            self.visit_point(rack, probe).await?;
            points += 1;
        }

        Ok(points)
    }

    /// Reduced stage: attenuated secondary pair plus the two-tone
    /// intermodulation ladders. Skipped when the important-only flag is set.
    async fn reduced_stage(
        &self,
        rack: &InstrumentRack,
        params: &DeviceTypeParams,
    ) -> Result<usize> {
        debug!("reduced stage");
        let f = &params.f_ghz;
        let mut points = 0;

        rack.analyzer.set_attenuation(params.att_db).await?;
        rack.gen1.set_frequency(f[1], FreqUnit::GHz).await?;
        rack.gen1.set_power(params.p1_dbm, PowerUnit::Dbm).await?;
        rack.gen2.set_frequency(f[4], FreqUnit::GHz).await?;
        rack.gen2.set_power(params.p2_dbm, PowerUnit::Dbm).await?;

        for freq in [f[4], f[1]] {
            self.visit_point(rack, freq).await?;
            points += 1;
        }

        // Two-tone IIP3 ladder: step gen2 from P2-30 to P2-2 in 2 dB
        // increments, at the nominal second tone and again 5 MHz below it.
        for tone in [f[4], f[4] - IIP3_DELTA_GHZ] {
            rack.gen2.set_frequency(tone, FreqUnit::GHz).await?;
            for k in 0..=LADDER_STEPS {
                let power = params.p2_dbm + LADDER_START_DB + f64::from(k) * LADDER_STEP_DB;
                rack.gen2.set_power(power, PowerUnit::Dbm).await?;
                self.settle().await;
                points += 1;
            }
        }

        Ok(points)
    }

    /// Re-center the analyzer sweep and marker on a frequency, then settle.
    async fn visit_point(&self, rack: &InstrumentRack, freq_ghz: f64) -> Result<()> {
        rack.analyzer
            .set_measure_center_freq(freq_ghz, FreqUnit::GHz)
            .await?;
        rack.analyzer
            .set_marker_x_center(MARKER, freq_ghz, FreqUnit::GHz)
            .await?;
        self.settle().await;
        Ok(())
    }

    /// Program the bias source for the window's maximum current at the fixed
    /// bias voltage, enable the output, and sample the drawn current.
    async fn sample_bias_current(
        &self,
        rack: &InstrumentRack,
        window: &CurrentWindow,
    ) -> Result<f64> {
        rack.source
            .set_current(SOURCE_CHANNEL, window.i_max_ma, CurrentUnit::Ma)
            .await?;
        rack.source
            .set_voltage(SOURCE_CHANNEL, BIAS_VOLTAGE_V, VoltageUnit::V)
            .await?;
        rack.source.set_output(SOURCE_CHANNEL, true).await?;
        self.settle().await;
        let drawn = rack.source.read_current(SOURCE_CHANNEL).await?;
        debug!(drawn_ma = drawn, "bias current sampled");
        Ok(drawn)
    }

    /// Full reinitialization of every instrument, continuing past individual
    /// failures.
    async fn reset_all(rack: &InstrumentRack) -> Result<()> {
        let mut first_err: Option<anyhow::Error> = None;
        let mut note = |step: &'static str, outcome: Result<()>| {
            if let Err(e) = outcome {
                warn!(step, error = %e, "reset step failed");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        };
        note("analyzer reset", rack.analyzer.reset().await);
        note("gen1 reset", rack.gen1.reset().await);
        note("gen2 reset", rack.gen2.reset().await);
        note("source reset", rack.source.reset().await);
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
