//! Shared types used across the tuner driver
//!
//! Small domain enums that enforce invariants at compile time: the chip
//! variant, the five crystal load capacitors, the gain mode and the result
//! of a single `step()` call.

use core::fmt;

use crate::error::Error;
use crate::hal::i2c::BusError;

/// Rafael Micro chip variant behind the bridge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Chip {
    /// R820T / R820T2 (most RTL-SDR sticks)
    #[default]
    R820T,
    /// R620D
    R620D,
    /// R828D (RTL-SDR Blog V4 and friends)
    R828D,
    /// R828
    R828,
    /// R828S
    R828S,
    /// R820C
    R820C,
}

impl Chip {
    /// VCO power reference used by the fine-tune readback and the
    /// integer multiplier limit
    #[must_use]
    pub const fn vco_power_ref(self) -> u8 {
        match self {
            Self::R828D => 1,
            _ => 2,
        }
    }

    /// Largest integer PLL multiplier the chip accepts
    #[must_use]
    pub const fn max_nint(self) -> u32 {
        128 / self.vco_power_ref() as u32 - 1
    }

    /// Whether the chip has the Cable1 / Air-In RF input switch
    #[must_use]
    pub const fn has_input_switch(self) -> bool {
        matches!(self, Self::R828D)
    }
}

/// Tuner application type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum TunerType {
    /// FM / general radio
    Radio,
    /// Analog television
    AnalogTv,
    /// Digital television (used for SDR operation)
    #[default]
    DigitalTv,
}

/// Delivery system the system-frequency parameters are selected for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum DeliverySystem {
    /// No standard selected
    Undefined,
    /// DVB-T
    #[default]
    Dvbt,
    /// DVB-T2
    Dvbt2,
    /// ISDB-T
    Isdbt,
}

/// Crystal load capacitance selection
///
/// Exactly one value is active at a time; calibration walks [`XtalCap::ALL`]
/// in order and keeps the first one that reports a stable PLL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum XtalCap {
    /// 30 pF, low drive
    Low30p,
    /// 20 pF, low drive
    Low20p,
    /// 10 pF, low drive
    Low10p,
    /// 0 pF, low drive
    Low0p,
    /// 0 pF, high drive
    #[default]
    High0p,
}

impl XtalCap {
    /// Calibration order
    pub const ALL: [Self; 5] = [
        Self::Low30p,
        Self::Low20p,
        Self::Low10p,
        Self::Low0p,
        Self::High0p,
    ];

    /// Value for register 0x10 bits [4,3,1,0] used while probing
    #[must_use]
    pub const fn probe_bits(self) -> u8 {
        match self {
            Self::Low30p => 0x0b,
            Self::Low20p => 0x02,
            Self::Low10p => 0x01,
            Self::Low0p => 0x00,
            Self::High0p => 0x10,
        }
    }
}

/// Gain mode for the RF stages
///
/// Manual levels are in tenths of a dB.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum GainMode {
    /// LNA and mixer AGC enabled
    #[default]
    Auto,
    /// Fixed gain, tenths of a dB
    Manual(i32),
}

impl GainMode {
    /// Whether the AGC loops are running
    #[must_use]
    pub const fn is_auto(self) -> bool {
        matches!(self, Self::Auto)
    }
}

/// Result of a single [`crate::Tuner::step`] call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Step {
    /// Work is pending; poll again later
    Run,
    /// A stage finished and the next one is now current
    Inc,
    /// The command is finished (check [`Health`] for the outcome)
    Complete,
}

/// Top-level phase of the in-flight command
///
/// Ordered: a command only ever moves `Run` → `Inc` → `Complete`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Phase {
    /// Accepted, first stage running
    Run,
    /// At least one stage boundary passed
    Inc,
    /// Finished or aborted
    Complete,
}

/// Sticky health flags reported alongside `Step::Complete`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Health {
    /// Last bus fault; cleared when the next command is accepted
    pub bus_fault: Option<BusError>,
    /// Fatal init failure (chip probe or filter calibration)
    pub fatal: Option<Error>,
    /// A calibration fell back to default trims
    pub calibration_degraded: bool,
    /// PLL lock state after the last frequency tune
    pub locked: bool,
    /// Error that aborted the last command, if any
    pub last_error: Option<Error>,
}

impl Health {
    /// True when no fault is latched
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.bus_fault.is_none() && self.fatal.is_none()
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.bus_fault, self.fatal) {
            (Some(bus), _) => write!(f, "bus fault ({bus})"),
            (None, Some(fatal)) => write!(f, "fatal ({fatal})"),
            (None, None) if self.calibration_degraded => f.write_str("degraded"),
            (None, None) => f.write_str("ok"),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Health {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Health(bus={}, fatal={}, degraded={}, locked={}, last={})",
            self.bus_fault,
            self.fatal,
            self.calibration_degraded,
            self.locked,
            self.last_error
        );
    }
}
