//! The instrument rack: one handle per bench role.
//!
//! Handles are acquired once at connect time and held for the process
//! lifetime. The execution host owns the rack; the sequencing engine borrows
//! it for the duration of one call.

use anyhow::Result;
use rig_core::capabilities::{
    CurrentSource, Instrument, InstrumentStatus, SignalGenerator, SpectrumAnalyzer,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Bench roles the rack requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentRole {
    Source,
    Generator1,
    Generator2,
    Analyzer,
}

impl fmt::Display for InstrumentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Generator1 => write!(f, "generator1"),
            Self::Generator2 => write!(f, "generator2"),
            Self::Analyzer => write!(f, "analyzer"),
        }
    }
}

/// Per-role bus address overrides applied before discovery.
pub type AddressMap = HashMap<InstrumentRole, String>;

/// The full set of instrument handles a sequence needs.
pub struct InstrumentRack {
    pub source: Arc<dyn CurrentSource>,
    pub gen1: Arc<dyn SignalGenerator>,
    pub gen2: Arc<dyn SignalGenerator>,
    pub analyzer: Arc<dyn SpectrumAnalyzer>,
}

impl InstrumentRack {
    pub fn new(
        source: Arc<dyn CurrentSource>,
        gen1: Arc<dyn SignalGenerator>,
        gen2: Arc<dyn SignalGenerator>,
        analyzer: Arc<dyn SpectrumAnalyzer>,
    ) -> Self {
        Self {
            source,
            gen1,
            gen2,
            analyzer,
        }
    }

    fn instruments(&self) -> [(InstrumentRole, &dyn Instrument); 4] {
        [
            (InstrumentRole::Source, &*self.source as &dyn Instrument),
            (InstrumentRole::Generator1, &*self.gen1 as &dyn Instrument),
            (InstrumentRole::Generator2, &*self.gen2 as &dyn Instrument),
            (InstrumentRole::Analyzer, &*self.analyzer as &dyn Instrument),
        ]
    }

    /// Apply address overrides, then attempt discovery for every role.
    ///
    /// Returns true only if every role answers; partial discovery is total
    /// failure, there is no reduced-capability mode. Idempotent — a failed
    /// attempt may simply be re-invoked.
    pub async fn connect(&self, overrides: &AddressMap) -> Result<bool> {
        for (role, instrument) in self.instruments() {
            if let Some(addr) = overrides.get(&role) {
                instrument.set_address(addr);
            }
        }

        let mut found = true;
        for (role, instrument) in self.instruments() {
            let answered = instrument.discover().await?;
            info!(
                role = %role,
                address = %instrument.address(),
                found = answered,
                "instrument discovery"
            );
            found &= answered;
        }
        Ok(found)
    }

    /// Status token of every role, from the most recent discovery attempt.
    pub fn statuses(&self) -> Vec<(InstrumentRole, InstrumentStatus)> {
        self.instruments()
            .into_iter()
            .map(|(role, instrument)| (role, instrument.status()))
            .collect()
    }
}
