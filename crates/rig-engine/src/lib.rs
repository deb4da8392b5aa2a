//! Check/measure sequencing engine for the RF DUT rig.
//!
//! The engine drives a bank of bench instruments — a DC bias source, two
//! signal generators, and a spectrum analyzer — through timed command
//! sequences to answer two questions about a device under test:
//!
//! 1. [`SequenceEngine::check`] — is a device of the selected type actually
//!    connected and biased sensibly? (boolean presence verdict)
//! 2. [`SequenceEngine::measure`] — what are its parameters? (a sweep over
//!    the device's frequency plan, populating the [`result::MeasureResult`])
//!
//! Sequences run on the [`host::ExecutionHost`]'s dedicated worker, strictly
//! one at a time, because the instrument handles are shared unprotected
//! resources. The interactive side dispatches a job and is notified on
//! completion; it never blocks on bus I/O.
//!
//! In mock mode the result model synthesizes plausible readings from a
//! reference tolerance table ([`reference::ReferenceTable`]) instead of live
//! hardware, and settle delays are configured to zero so tests run fast and
//! deterministic.

pub mod host;
pub mod rack;
pub mod reference;
pub mod result;
pub mod sequence;

pub use host::{ExecutionHost, HostEvent, HostState, ResultSnapshot};
pub use rack::{AddressMap, InstrumentRack, InstrumentRole};
pub use reference::{ReferenceSource, ReferenceTable};
pub use result::{generate_value, MeasureResult, Sample};
pub use sequence::{SequenceEngine, SweepSummary};
