//! Unit tags carried with raw values at the capability boundary.
//!
//! Instrument commands take an explicit unit next to the `f64` so a driver
//! can scale into whatever its bus dialect wants without the engine caring.

use std::fmt;

/// Frequency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreqUnit {
    Hz,
    MHz,
    GHz,
}

impl FreqUnit {
    /// Scale a value in this unit to Hz.
    pub fn to_hz(self, value: f64) -> f64 {
        match self {
            Self::Hz => value,
            Self::MHz => value * 1e6,
            Self::GHz => value * 1e9,
        }
    }
}

impl fmt::Display for FreqUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hz => write!(f, "Hz"),
            Self::MHz => write!(f, "MHz"),
            Self::GHz => write!(f, "GHz"),
        }
    }
}

/// Power units. Everything on this rig speaks dBm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerUnit {
    Dbm,
}

impl fmt::Display for PowerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dBm")
    }
}

/// Current units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentUnit {
    A,
    Ma,
}

impl CurrentUnit {
    /// Scale a value in this unit to mA.
    pub fn to_ma(self, value: f64) -> f64 {
        match self {
            Self::A => value * 1e3,
            Self::Ma => value,
        }
    }
}

impl fmt::Display for CurrentUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::Ma => write!(f, "mA"),
        }
    }
}

/// Voltage units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageUnit {
    V,
    Mv,
}

impl VoltageUnit {
    /// Scale a value in this unit to volts.
    pub fn to_volts(self, value: f64) -> f64 {
        match self {
            Self::V => value,
            Self::Mv => value * 1e-3,
        }
    }
}

impl fmt::Display for VoltageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V => write!(f, "V"),
            Self::Mv => write!(f, "mV"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn freq_scaling() {
        assert_eq!(FreqUnit::GHz.to_hz(1.15), 1.15e9);
        assert_eq!(FreqUnit::MHz.to_hz(5.0), 5.0e6);
        assert_eq!(FreqUnit::Hz.to_hz(42.0), 42.0);
    }

    #[test]
    fn current_scaling() {
        assert_eq!(CurrentUnit::A.to_ma(0.05), 50.0);
        assert_eq!(CurrentUnit::Ma.to_ma(50.0), 50.0);
    }

    #[test]
    fn voltage_scaling() {
        assert_eq!(VoltageUnit::Mv.to_volts(4700.0), 4.7);
        assert_eq!(VoltageUnit::V.to_volts(4.7), 4.7);
    }

    #[test]
    fn labels() {
        assert_eq!(FreqUnit::GHz.to_string(), "GHz");
        assert_eq!(PowerUnit::Dbm.to_string(), "dBm");
        assert_eq!(CurrentUnit::Ma.to_string(), "mA");
    }
}
