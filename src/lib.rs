//! R82xx Tuner Driver Library
//!
//! Non-blocking driver for the Rafael Micro R820T/R828D silicon tuner used
//! as the RF front end of RTL-SDR style receivers. The tuner is reached over
//! a USB/I2C bridge whose transactions complete asynchronously, so every
//! multi-step hardware sequence is expressed as a state machine that is
//! advanced by repeated [`Tuner::step`] calls from a single poll loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ORCHESTRATOR                           │
//! │     Init  │  Retune  │  Bandwidth  │  Gain  →  step()       │
//! ├─────────────────────────────────────────────────────────────┤
//! │        SEQUENCES                │        PURE TABLES        │
//! │  Xtal cap │ Filter cal │ IMR    │  PLL  │ Bands │ IF filter │
//! │  Freq tune │ Param tune │ Gain  │  Gain steps               │
//! ├─────────────────────────────────────────────────────────────┤
//! │              REGISTER SHADOW & TRANSACTIONS                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │          TRANSPORT (bridge or embedded-hal I2C)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Never blocks**: a `WouldBlock` from the bus is reported as
//!   [`Step::Run`]; delays between dependent writes are the caller's cadence
//! - **Shadow follows the bus**: a register value is cached only once its
//!   transaction is acknowledged
//! - **One owner**: a single [`TunerState`] per tuner, one command at a time
//! - **Explicit error handling**: rejections are `Result`s, step-time
//!   faults are sticky [`Health`] flags

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
mod fmt;

/// Hardware Abstraction Layer
///
/// Byte transport to the tuner.
pub mod hal;

/// Tuner core: registers, synthesis, calibration, orchestration
pub mod tuner;

/// Driver errors and dispatch results
pub mod error;

/// Shared types used across modules
pub mod types;

/// Chip constants and per-attach configuration
pub mod config;

pub use config::TunerConfig;
pub use error::{Dispatch, Error};
pub use hal::i2c::{BlockingI2c, BusError, I2cAddress, Transport};
pub use tuner::orchestrator::{Command, Request, Stage, Tuner};
pub use tuner::state::TunerState;
pub use types::{Chip, GainMode, Health, Phase, Step, XtalCap};

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for common types and traits.

    pub use crate::config::*;
    pub use crate::error::{Dispatch, Error};
    pub use crate::hal::i2c::{BlockingI2c, BusError, BusResult, I2cAddress, Transport};
    pub use crate::tuner::orchestrator::{Request, Tuner};
    pub use crate::types::*;

    // Embassy
    #[cfg(feature = "embedded")]
    pub use embassy_time::{Duration, Instant, Timer};

    // Logging
    #[cfg(feature = "embedded")]
    pub use defmt::{debug, error, info, trace, warn};
}
