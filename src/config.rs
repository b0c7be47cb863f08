//! Tuner configuration and chip constants
//!
//! Compile-time constants for the R82xx family and the per-attach
//! [`TunerConfig`]. The config is validated once when the tuner is built and
//! never mutated afterwards.

use crate::error::Error;
use crate::hal::i2c::I2cAddress;
use crate::tuner::pll;
use crate::types::Chip;

/// R820T I2C address (8-bit form)
pub const R820T_I2C_ADDR: u8 = 0x34;

/// R828D I2C address (8-bit form)
pub const R828D_I2C_ADDR: u8 = 0x74;

/// Crystal fitted next to the R828D on Blog V4 style boards
pub const R828D_XTAL_FREQ: u32 = 16_000_000;

/// Crystal shared with the RTL2832U on most sticks
pub const DEFAULT_XTAL_FREQ: u32 = 28_800_000;

/// Register holding the chip identification byte
pub const CHECK_ADDR: u8 = 0x00;

/// Identification byte every R82xx returns
pub const CHECK_VAL: u8 = 0x69;

/// IF used for the 6 MHz DVB-T filter setting
pub const IF_FREQ: u32 = 3_570_000;

/// First register covered by the shadow
pub const REG_SHADOW_START: u8 = 0x05;

/// Number of shadowed registers
pub const NUM_REGS: usize = 30;

/// Number of image-rejection calibration bands
pub const NUM_IMR: usize = 5;

/// Trim codes tried per image-rejection band
pub const IMR_TRIAL: usize = 9;

/// Version field programmed into register 0x13
pub const VER_NUM: u8 = 49;

/// Largest I2C message the RTL2832U bridge forwards (register byte included)
pub const DEFAULT_MAX_I2C_MSG_LEN: usize = 8;

/// Frequency tuned at the end of init when none was requested yet
pub const DEFAULT_FREQUENCY_HZ: u32 = 100_000_000;

/// Bandwidth selected by init (the 6 MHz DVB-T preset)
pub const DEFAULT_BANDWIDTH_HZ: u32 = 6_000_000;

/// Accepted crystal range; the chip may narrow it further
pub const MIN_XTAL_FREQ: u32 = 12_000_000;
/// Accepted crystal range
pub const MAX_XTAL_FREQ: u32 = 40_000_000;

/// Power-on register contents for 0x05..=0x22
pub const INIT_ARRAY: [u8; NUM_REGS] = [
    0x83, 0x32, 0x75, // 05 to 07
    0xc0, 0x40, 0xd6, 0x6c, // 08 to 0b
    0xf5, 0x63, 0x75, 0x68, // 0c to 0f
    0x6c, 0x83, 0x80, 0x00, // 10 to 13
    0x0f, 0x00, 0xc0, 0x30, // 14 to 17
    0x48, 0xcc, 0x60, 0x00, // 18 to 1b
    0x54, 0xae, 0x4a, 0xc0, // 1c to 1f
    0x00, 0x00, 0x00, // 20 to 22
];

/// Per-attach tuner configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TunerConfig {
    /// Tuner bus address
    pub i2c_addr: I2cAddress,
    /// Tuner reference crystal in Hz
    pub xtal_hz: u32,
    /// Demodulator (RTL2832U) reference crystal in Hz
    pub rtl_xtal_hz: u32,
    /// Chip variant
    pub chip: Chip,
    /// Longest bus transaction in bytes, register byte included
    pub max_i2c_msg_len: usize,
    /// Enable the power pre-detector during parameter setup
    pub use_predetect: bool,
}

impl TunerConfig {
    /// R820T on a standard RTL-SDR stick
    #[must_use]
    pub const fn r820t() -> Self {
        Self {
            i2c_addr: I2cAddress::R820T,
            xtal_hz: DEFAULT_XTAL_FREQ,
            rtl_xtal_hz: DEFAULT_XTAL_FREQ,
            chip: Chip::R820T,
            max_i2c_msg_len: DEFAULT_MAX_I2C_MSG_LEN,
            use_predetect: false,
        }
    }

    /// R828D with its own 16 MHz crystal
    #[must_use]
    pub const fn r828d() -> Self {
        Self {
            i2c_addr: I2cAddress::R828D,
            xtal_hz: R828D_XTAL_FREQ,
            rtl_xtal_hz: DEFAULT_XTAL_FREQ,
            chip: Chip::R828D,
            max_i2c_msg_len: DEFAULT_MAX_I2C_MSG_LEN,
            use_predetect: false,
        }
    }

    /// Override the tuner crystal
    #[must_use]
    pub const fn with_xtal(self, xtal_hz: u32) -> Self {
        Self { xtal_hz, ..self }
    }

    /// Override the longest bus transaction
    #[must_use]
    pub const fn with_max_msg_len(self, max_i2c_msg_len: usize) -> Self {
        Self {
            max_i2c_msg_len,
            ..self
        }
    }

    /// Enable or disable the pre-detector
    #[must_use]
    pub const fn with_predetect(self, use_predetect: bool) -> Self {
        Self {
            use_predetect,
            ..self
        }
    }

    /// Check every field against its domain
    pub const fn validate(&self) -> Result<(), Error> {
        if self.xtal_hz < MIN_XTAL_FREQ || self.xtal_hz > MAX_XTAL_FREQ {
            return Err(Error::InvalidArgument);
        }
        // The R820T multiplier tops out at 63, which needs a fast crystal
        if !pll::supports_xtal(self.xtal_hz, self.chip) {
            return Err(Error::InvalidArgument);
        }
        if self.rtl_xtal_hz == 0 {
            return Err(Error::InvalidArgument);
        }
        // Need room for the register byte plus at least one data byte
        if self.max_i2c_msg_len < 2 || self.max_i2c_msg_len > NUM_REGS + 1 {
            return Err(Error::InvalidArgument);
        }
        if self.i2c_addr.addr() == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self::r820t()
    }
}
