//! I2C Transport Abstractions
//!
//! The tuner sits behind a USB/I2C bridge owned by the host stack. The core
//! only needs two non-blocking primitives from it, expressed by
//! [`Transport`]; [`BlockingI2c`] adapts any `embedded-hal` bus for boards
//! that wire the tuner straight to an MCU.

use core::fmt;

use embedded_hal::i2c::{Error as _, ErrorKind, I2c};

/// Bus-level failure reported by a transport
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum BusError {
    /// Device did not acknowledge
    Nack,
    /// Transaction timed out in the bridge
    Timeout,
    /// Any other bus or bridge failure
    Fault,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Nack => "nack",
            Self::Timeout => "timeout",
            Self::Fault => "fault",
        })
    }
}

/// Non-blocking transport result; `WouldBlock` means "not acknowledged yet"
pub type BusResult<T> = nb::Result<T, BusError>;

/// I2C device address (8-bit, write form, as R82xx datasheets list it)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct I2cAddress(u8);

impl I2cAddress {
    /// R820T / R820T2 tuner address
    pub const R820T: Self = Self(0x34);

    /// R828D tuner address
    pub const R828D: Self = Self(0x74);

    /// Create from an 8-bit address
    #[must_use]
    pub const fn new(addr: u8) -> Self {
        Self(addr & 0xFE)
    }

    /// Get the 8-bit address
    #[must_use]
    pub const fn addr(self) -> u8 {
        self.0
    }

    /// Get the 7-bit address used by `embedded-hal`
    #[must_use]
    pub const fn seven_bit(self) -> u8 {
        self.0 >> 1
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for I2cAddress {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "0x{:02X}", self.0);
    }
}

/// Byte transport to the tuner
///
/// Both calls either complete, report a bus error, or return
/// `nb::Error::WouldBlock` when the bridge has not finished yet. A caller
/// repeats a blocked call with the same arguments.
pub trait Transport {
    /// Write `bytes` (register address first) to the device
    fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> BusResult<()>;

    /// Read `buffer.len()` bytes from the device
    fn read(&mut self, address: I2cAddress, buffer: &mut [u8]) -> BusResult<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> BusResult<()> {
        (**self).write(address, bytes)
    }

    fn read(&mut self, address: I2cAddress, buffer: &mut [u8]) -> BusResult<()> {
        (**self).read(address, buffer)
    }
}

/// [`Transport`] over a blocking `embedded-hal` I2C bus
///
/// Every call completes before returning, so it never reports `WouldBlock`.
pub struct BlockingI2c<I> {
    i2c: I,
}

impl<I: I2c> BlockingI2c<I> {
    /// Wrap a blocking I2C bus
    #[must_use]
    pub const fn new(i2c: I) -> Self {
        Self { i2c }
    }

    /// Give the bus back
    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> Transport for BlockingI2c<I> {
    fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> BusResult<()> {
        self.i2c
            .write(address.seven_bit(), bytes)
            .map_err(|e| nb::Error::Other(classify(e.kind())))
    }

    fn read(&mut self, address: I2cAddress, buffer: &mut [u8]) -> BusResult<()> {
        self.i2c
            .read(address.seven_bit(), buffer)
            .map_err(|e| nb::Error::Other(classify(e.kind())))
    }
}

/// Map an `embedded-hal` error kind onto the tuner's bus taxonomy
#[must_use]
pub fn classify(kind: ErrorKind) -> BusError {
    match kind {
        ErrorKind::NoAcknowledge(_) => BusError::Nack,
        _ => BusError::Fault,
    }
}
