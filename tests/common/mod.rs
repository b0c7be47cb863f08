//! Simulated R82xx for host tests
//!
//! Register writes land in a 256-byte file; status reads return the
//! identification byte followed by bit-reversed status bytes, the way the
//! chip shifts them out. Lock, filter code, fine-tune, gain and the IMR
//! detector are scriptable, and NACK / not-ready transactions can be
//! injected.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use r82xx_tuner::hal::i2c::{BusError, BusResult, I2cAddress, Transport};

/// Status byte 2 for a locked PLL with a mid-range VCO band
pub const LOCKED: u8 = 0x60;
/// Status byte 2 for an unlocked PLL
pub const UNLOCKED: u8 = 0x20;

/// IMR detector with a single clear minimum at trial 4 (gain 0x01, phase 0x01)
pub fn default_detector(gain: u8, phase: u8) -> u8 {
    if gain == 0x01 && phase == 0x01 {
        0x08
    } else {
        0x20
    }
}

/// Scriptable chip state
pub struct MockState {
    /// Register file indexed by register address
    pub regs: [u8; 256],
    /// Byte returned by a 1-byte identification read
    pub chip_id: u8,
    /// Status byte 2 for successive 3-byte reads; `LOCKED` once empty
    pub status2: VecDeque<u8>,
    /// Filter calibration code reported after a good trigger
    pub filter_code: u8,
    /// Number of upcoming filter triggers that report a bad code
    pub filter_failures: usize,
    /// VCO fine-tune band, status byte 4 bits 5:4
    pub fine_tune: u8,
    /// Gain status byte (LNA index low nibble, mixer index high nibble)
    pub gain_status: u8,
    /// IMR detector reading for a gain/phase trim pair
    pub detector: fn(u8, u8) -> u8,
    /// NACK the data write with this index (0-based)
    pub fail_on_data_write: Option<usize>,
    /// NACK every read
    pub fail_reads: bool,
    /// Upcoming transactions that report `WouldBlock`
    pub busy: usize,
    /// Acknowledged data writes, register byte first
    pub log: Vec<Vec<u8>>,
    /// Data writes attempted (acked or not)
    pub data_writes: usize,
    /// Reads completed
    pub reads: usize,
    /// Filter triggers seen
    pub triggers: usize,
    /// Largest transaction seen
    pub max_write_len: usize,
    current_code: u8,
}

impl MockState {
    fn status(&mut self, len: usize) -> [u8; 5] {
        let s1 = (self.detector)(self.regs[0x08] & 0x3f, self.regs[0x09] & 0x3f) & 0x3f;
        let s2 = if len == 3 {
            self.status2.pop_front().unwrap_or(LOCKED)
        } else {
            LOCKED
        };
        let s4 = (self.fine_tune << 4) | self.current_code;
        [
            self.chip_id,
            s1.reverse_bits(),
            s2.reverse_bits(),
            self.gain_status.reverse_bits(),
            s4.reverse_bits(),
        ]
    }

    fn apply(&mut self, bytes: &[u8]) {
        let start = usize::from(bytes[0]);
        for (i, &value) in bytes[1..].iter().enumerate() {
            let reg = start + i;
            if reg == 0x0b && self.regs[reg] & 0x10 == 0 && value & 0x10 != 0 {
                self.trigger();
            }
            if reg < self.regs.len() {
                self.regs[reg] = value;
            }
        }
    }

    fn trigger(&mut self) {
        self.triggers += 1;
        if self.filter_failures > 0 {
            self.filter_failures -= 1;
            self.current_code = 0x0f;
        } else {
            self.current_code = self.filter_code;
        }
    }
}

/// Shared handle to a simulated chip
#[derive(Clone)]
pub struct MockR82xx(Rc<RefCell<MockState>>);

impl MockR82xx {
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(MockState {
            regs: [0; 256],
            chip_id: 0x69,
            status2: VecDeque::new(),
            filter_code: 0x05,
            filter_failures: 0,
            fine_tune: 2,
            gain_status: 0x00,
            detector: default_detector,
            fail_on_data_write: None,
            fail_reads: false,
            busy: 0,
            log: Vec::new(),
            data_writes: 0,
            reads: 0,
            triggers: 0,
            max_write_len: 0,
            current_code: 0,
        })))
    }

    /// Inspect or script the chip
    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    /// Register value on the chip
    pub fn reg(&self, reg: u8) -> u8 {
        self.0.borrow().regs[usize::from(reg)]
    }

    /// Number of acknowledged data writes
    pub fn acked_writes(&self) -> usize {
        self.0.borrow().log.len()
    }
}

impl Transport for MockR82xx {
    fn write(&mut self, _address: I2cAddress, bytes: &[u8]) -> BusResult<()> {
        let mut m = self.0.borrow_mut();
        if m.busy > 0 {
            m.busy -= 1;
            return Err(nb::Error::WouldBlock);
        }
        m.max_write_len = m.max_write_len.max(bytes.len());
        if bytes.len() < 2 {
            // Register pointer for the next read
            return Ok(());
        }
        let index = m.data_writes;
        m.data_writes += 1;
        if m.fail_on_data_write == Some(index) {
            return Err(nb::Error::Other(BusError::Nack));
        }
        m.apply(bytes);
        m.log.push(bytes.to_vec());
        Ok(())
    }

    fn read(&mut self, _address: I2cAddress, buffer: &mut [u8]) -> BusResult<()> {
        let mut m = self.0.borrow_mut();
        if m.busy > 0 {
            m.busy -= 1;
            return Err(nb::Error::WouldBlock);
        }
        if m.fail_reads {
            return Err(nb::Error::Other(BusError::Timeout));
        }
        m.reads += 1;
        let status = m.status(buffer.len());
        for (dst, src) in buffer.iter_mut().zip(status.iter()) {
            *dst = *src;
        }
        Ok(())
    }
}
