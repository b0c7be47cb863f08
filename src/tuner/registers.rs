//! Register shadow and transaction builder
//!
//! The shadow holds the last acknowledged value of every register in
//! 0x05..=0x22. Writes land in a staging copy first; [`Registers::commit`]
//! turns the dirty bytes into as few block writes as the bridge allows and
//! only promotes a byte into the shadow once its transaction is acknowledged.

use heapless::Vec;

use crate::config::{TunerConfig, CHECK_ADDR, NUM_REGS, REG_SHADOW_START};
use crate::error::Error;
use crate::hal::i2c::{BusResult, I2cAddress, Transport};

/// One masked register update
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub struct RegWrite {
    /// Register address
    pub reg: u8,
    /// New bits
    pub value: u8,
    /// Bits of `value` that are applied
    pub mask: u8,
}

impl RegWrite {
    /// Masked write
    #[must_use]
    pub const fn new(reg: u8, value: u8, mask: u8) -> Self {
        Self { reg, value, mask }
    }

    /// Whole-byte write
    #[must_use]
    pub const fn full(reg: u8, value: u8) -> Self {
        Self::new(reg, value, 0xff)
    }
}

/// Shadowed register file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registers {
    /// Last acknowledged values
    shadow: [u8; NUM_REGS],
    /// Values to be written by the next commit
    staged: [u8; NUM_REGS],
    /// Bytes that must be written even if unchanged
    forced: u32,
}

impl Registers {
    /// Create a register file with an all-zero shadow
    #[must_use]
    pub const fn new() -> Self {
        Self {
            shadow: [0; NUM_REGS],
            staged: [0; NUM_REGS],
            forced: 0,
        }
    }

    const fn index(reg: u8) -> Option<usize> {
        if reg < REG_SHADOW_START {
            return None;
        }
        let i = (reg - REG_SHADOW_START) as usize;
        if i < NUM_REGS {
            Some(i)
        } else {
            None
        }
    }

    /// Shadow value of a register (no bus access)
    #[must_use]
    pub fn read(&self, reg: u8) -> u8 {
        Self::index(reg).map_or(0, |i| self.shadow[i])
    }

    /// Value the next commit will leave in a register
    #[must_use]
    pub fn staged(&self, reg: u8) -> u8 {
        Self::index(reg).map_or(0, |i| self.staged[i])
    }

    /// The whole shadow, indexed from [`REG_SHADOW_START`]
    #[must_use]
    pub const fn shadow(&self) -> &[u8; NUM_REGS] {
        &self.shadow
    }

    /// Stage a masked update
    ///
    /// Registers outside the shadow window are ignored.
    pub fn write(&mut self, reg: u8, value: u8, mask: u8) {
        if let Some(i) = Self::index(reg) {
            self.staged[i] = (self.staged[i] & !mask) | (value & mask);
        }
    }

    /// Stage a list of masked updates in order
    pub fn apply(&mut self, writes: &[RegWrite]) {
        for w in writes {
            self.write(w.reg, w.value, w.mask);
        }
    }

    /// Stage a block starting at `base` and force it onto the bus
    ///
    /// Used for the power-on load, where the shadow does not reflect the
    /// chip yet.
    pub fn load(&mut self, base: u8, values: &[u8]) {
        for (offset, &value) in values.iter().enumerate() {
            let Ok(offset) = u8::try_from(offset) else {
                break;
            };
            if let Some(i) = base.checked_add(offset).and_then(Self::index) {
                self.staged[i] = value;
                self.forced |= 1 << i;
            }
        }
    }

    /// Bitmask of registers the next commit will write (bit 0 = 0x05)
    #[must_use]
    pub fn dirty_mask(&self) -> u32 {
        let mut mask = self.forced;
        for i in 0..NUM_REGS {
            if self.staged[i] != self.shadow[i] {
                mask |= 1 << i;
            }
        }
        mask
    }

    /// Whether anything is waiting to be committed
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty_mask() != 0
    }

    /// Whether a given register is waiting to be committed
    #[must_use]
    pub fn is_reg_dirty(&self, reg: u8) -> bool {
        Self::index(reg).is_some_and(|i| self.dirty_mask() & (1 << i) != 0)
    }

    /// Drop every staged change
    pub fn discard(&mut self) {
        self.staged = self.shadow;
        self.forced = 0;
    }

    /// Write every dirty run to the device
    ///
    /// Contiguous dirty registers go out as one `[first_reg, data..]`
    /// transaction, split so no transaction exceeds `max_len` bytes. Each
    /// acknowledged transaction is promoted into the shadow immediately.
    /// `WouldBlock` leaves the remaining runs dirty for the next call; a bus
    /// error discards them and keeps what was already acknowledged.
    pub fn commit<T: Transport + ?Sized>(
        &mut self,
        bus: &mut T,
        address: I2cAddress,
        max_len: usize,
    ) -> BusResult<()> {
        let max_data = max_len.saturating_sub(1).max(1);

        loop {
            let dirty = self.dirty_mask();
            if dirty == 0 {
                return Ok(());
            }

            let start = dirty.trailing_zeros() as usize;
            let mut end = start + 1;
            while end < NUM_REGS && end - start < max_data && dirty & (1 << end) != 0 {
                end += 1;
            }

            let mut buf: Vec<u8, { NUM_REGS + 1 }> = Vec::new();
            // A run never exceeds NUM_REGS bytes, so both pushes fit
            let _ = buf.push(REG_SHADOW_START + start as u8);
            let _ = buf.extend_from_slice(&self.staged[start..end]);

            match bus.write(address, &buf) {
                Ok(()) => {
                    self.shadow[start..end].copy_from_slice(&self.staged[start..end]);
                    self.forced &= !run_mask(start, end);
                    trace!(
                        "r82xx: wrote {=usize} byte(s) at 0x{=u8:02x}",
                        end - start,
                        buf[0]
                    );
                }
                Err(nb::Error::WouldBlock) => return Err(nb::Error::WouldBlock),
                Err(nb::Error::Other(e)) => {
                    warn!("r82xx: write at 0x{=u8:02x} failed: {}", buf[0], e);
                    self.discard();
                    return Err(nb::Error::Other(e));
                }
            }
        }
    }

    /// Read status bytes starting at register 0
    ///
    /// The R82xx shifts status bytes out LSB first, so each byte is
    /// bit-reversed before it is returned.
    pub fn read_status<T: Transport + ?Sized>(
        bus: &mut T,
        address: I2cAddress,
        buf: &mut [u8],
    ) -> BusResult<()> {
        bus.write(address, &[CHECK_ADDR])?;
        bus.read(address, buf)?;
        for byte in buf.iter_mut() {
            *byte = byte.reverse_bits();
        }
        Ok(())
    }

    /// Read the identification byte (no bit reversal)
    pub fn read_chip_id<T: Transport + ?Sized>(bus: &mut T, address: I2cAddress) -> BusResult<u8> {
        let mut id = [0u8; 1];
        bus.write(address, &[CHECK_ADDR])?;
        bus.read(address, &mut id)?;
        Ok(id[0])
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

const fn run_mask(start: usize, end: usize) -> u32 {
    ((1u32 << (end - start)) - 1) << start
}

/// Transport bound to one tuner's address and message limit
pub struct Link<'a, T: ?Sized> {
    bus: &'a mut T,
    address: I2cAddress,
    max_len: usize,
}

impl<'a, T: Transport + ?Sized> Link<'a, T> {
    /// Bind a transport to a configuration
    pub fn new(bus: &'a mut T, config: &TunerConfig) -> Self {
        Self {
            bus,
            address: config.i2c_addr,
            max_len: config.max_i2c_msg_len,
        }
    }

    /// Commit staged registers
    pub fn commit(&mut self, regs: &mut Registers) -> nb::Result<(), Error> {
        regs.commit(&mut *self.bus, self.address, self.max_len)
            .map_err(|e| e.map(Error::from))
    }

    /// Read (bit-reversed) status bytes from register 0
    pub fn status(&mut self, buf: &mut [u8]) -> nb::Result<(), Error> {
        Registers::read_status(&mut *self.bus, self.address, buf).map_err(|e| e.map(Error::from))
    }

    /// Read the identification byte
    pub fn chip_id(&mut self) -> nb::Result<u8, Error> {
        Registers::read_chip_id(&mut *self.bus, self.address).map_err(|e| e.map(Error::from))
    }
}
