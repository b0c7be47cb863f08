//! Error and dispatch result types
//!
//! Every failure crosses the API as a value: command submission returns
//! `Result<(), Error>`, and faults raised while stepping land in
//! [`crate::types::Health`].

use core::fmt;

use crate::hal::i2c::BusError;

/// Driver error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Error {
    /// Bus transaction was NACKed, timed out or faulted
    BusFault(BusError),
    /// Frequency or bandwidth outside the supported tables
    OutOfRange,
    /// Gain level or configuration field outside its domain
    InvalidArgument,
    /// A command is still in flight
    Busy,
    /// Probe read back something other than the R82xx check value
    ChipIdMismatch {
        /// Byte read from the check register
        found: u8,
    },
    /// Filter self-calibration failed twice; the chip is inoperable
    FilterCalibration,
    /// Command needs a completed init
    NotReady,
}

impl Error {
    /// Whether the error leaves the chip unusable until re-init
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::ChipIdMismatch { .. } | Self::FilterCalibration)
    }
}

impl From<BusError> for Error {
    fn from(err: BusError) -> Self {
        Self::BusFault(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusFault(bus) => write!(f, "bus fault: {bus}"),
            Self::OutOfRange => f.write_str("out of range"),
            Self::InvalidArgument => f.write_str("invalid argument"),
            Self::Busy => f.write_str("busy"),
            Self::ChipIdMismatch { found } => {
                write!(f, "chip id mismatch (read 0x{found:02x})")
            }
            Self::FilterCalibration => f.write_str("filter calibration failed"),
            Self::NotReady => f.write_str("tuner not initialized"),
        }
    }
}

/// Outcome of [`crate::Tuner::dispatch`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Dispatch {
    /// Request accepted
    Ok,
    /// The tuner has no handler for this request
    Unhandled,
    /// Request rejected
    Error(Error),
}

impl From<Result<(), Error>> for Dispatch {
    fn from(result: Result<(), Error>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(err) => Self::Error(err),
        }
    }
}
