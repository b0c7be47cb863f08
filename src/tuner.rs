//! R82xx tuner core
//!
//! Leaves first: the register shadow, the pure PLL/band/bandwidth/gain
//! computations, the calibration and tuning sequences, and the
//! [`orchestrator::Tuner`] that drives them one bounded step at a time.

pub mod bands;
pub mod bandwidth;
pub mod calibration;
pub mod gain;
pub mod orchestrator;
pub mod pll;
pub mod registers;
pub mod state;
pub mod tune;

/// Outcome of one call into a stage machine
///
/// `nb::Error::WouldBlock` from the same call means the bus has not
/// acknowledged yet and nothing advanced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Progress {
    /// Work done, the stage has more to do
    Pending,
    /// The stage is finished
    Done,
}
