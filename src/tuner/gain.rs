//! RF and IF gain control
//!
//! Manual gain is composed from alternating LNA and mixer steps until the
//! requested level is reached. All levels are tenths of a dB.

use heapless::Vec;

use crate::error::Error;
use crate::tuner::registers::RegWrite;
use crate::types::GainMode;

/// Gains the driver reports as supported, tenths of a dB
pub const GAIN_TABLE: [i32; 29] = [
    0, 9, 14, 27, 37, 77, 87, 125, 144, 157, 166, 197, 207, 229, 254, 280, 297, 328, 338, 364, 372,
    386, 402, 421, 434, 439, 445, 480, 496,
];

/// Highest manual level accepted
pub const MAX_GAIN: i32 = GAIN_TABLE[GAIN_TABLE.len() - 1];

/// Gain added by each LNA index step
pub const LNA_GAIN_STEPS: [i32; 16] = [0, 9, 13, 40, 38, 13, 31, 22, 26, 31, 26, 14, 19, 5, 35, 13];

/// Gain added by each mixer index step
pub const MIXER_GAIN_STEPS: [i32; 16] = [0, 5, 10, 10, 19, 9, 10, 25, 17, 10, 8, 16, 13, 6, 3, -8];

/// VGA code used with manual gain (16.3 dB)
const VGA_MANUAL: u8 = 0x08;
/// VGA code used with AGC (26.5 dB)
const VGA_AUTO: u8 = 0x0b;

/// LNA and mixer indices for a manual level
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GainSteps {
    /// LNA gain index (register 0x05 bits 3:0)
    pub lna: u8,
    /// Mixer gain index (register 0x07 bits 3:0)
    pub mixer: u8,
    /// Sum of the selected steps
    pub total: i32,
}

/// Walk the step tables until `gain` is reached
#[must_use]
pub fn manual_steps(gain: i32) -> GainSteps {
    let mut lna = 0usize;
    let mut mixer = 0usize;
    let mut total = 0;

    for _ in 0..15 {
        if total >= gain {
            break;
        }
        lna += 1;
        total += LNA_GAIN_STEPS[lna];
        if total >= gain {
            break;
        }
        mixer += 1;
        total += MIXER_GAIN_STEPS[mixer];
    }

    GainSteps {
        lna: lna as u8,
        mixer: mixer as u8,
        total,
    }
}

/// Convert the gain status byte (LNA index low nibble, mixer index high
/// nibble) into tenths of a dB
#[must_use]
pub fn readback_gain(status3: u8) -> i32 {
    let lna = usize::from(status3 & 0x0f);
    let mixer = usize::from(status3 >> 4);
    LNA_GAIN_STEPS[..=lna].iter().sum::<i32>() + MIXER_GAIN_STEPS[..=mixer].iter().sum::<i32>()
}

/// Check a gain mode against the supported range
pub const fn validate(mode: GainMode) -> Result<GainMode, Error> {
    match mode {
        GainMode::Manual(level) if level < 0 || level > MAX_GAIN => Err(Error::InvalidArgument),
        _ => Ok(mode),
    }
}

/// Current gain mode plus the last measured gain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct GainController {
    mode: GainMode,
    measured: Option<i32>,
}

impl GainController {
    /// Start in AGC mode
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mode: GainMode::Auto,
            measured: None,
        }
    }

    /// Active mode
    #[must_use]
    pub const fn mode(&self) -> GainMode {
        self.mode
    }

    /// Gain measured after the last IF gain stage, if any
    #[must_use]
    pub const fn measured(&self) -> Option<i32> {
        self.measured
    }

    /// Validate and record a new mode
    ///
    /// Returns whether anything changed; an invalid level leaves the
    /// controller untouched.
    pub fn set_mode(&mut self, mode: GainMode) -> Result<bool, Error> {
        let mode = validate(mode)?;
        if mode == self.mode {
            return Ok(false);
        }
        self.mode = mode;
        Ok(true)
    }

    /// LNA and mixer writes for the active mode
    #[must_use]
    pub fn rf_writes(&self) -> Vec<RegWrite, 4> {
        let mut writes = Vec::new();
        match self.mode {
            GainMode::Auto => {
                // LNA AGC on, mixer AGC on
                let _ = writes.push(RegWrite::new(0x05, 0x00, 0x10));
                let _ = writes.push(RegWrite::new(0x07, 0x10, 0x10));
            }
            GainMode::Manual(level) => {
                let steps = manual_steps(level);
                let _ = writes.push(RegWrite::new(0x05, 0x10, 0x10));
                let _ = writes.push(RegWrite::new(0x07, 0x00, 0x10));
                let _ = writes.push(RegWrite::new(0x05, steps.lna, 0x0f));
                let _ = writes.push(RegWrite::new(0x07, steps.mixer, 0x0f));
            }
        }
        writes
    }

    /// VGA write for the active mode
    #[must_use]
    pub const fn vga_write(&self) -> RegWrite {
        let code = if self.mode.is_auto() { VGA_AUTO } else { VGA_MANUAL };
        RegWrite::new(0x0c, code, 0x9f)
    }

    /// Store the gain decoded from status byte 3
    pub fn record_readback(&mut self, status3: u8) -> i32 {
        let gain = readback_gain(status3);
        self.measured = Some(gain);
        gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_gain_uses_no_steps() {
        assert_eq!(
            manual_steps(0),
            GainSteps {
                lna: 0,
                mixer: 0,
                total: 0
            }
        );
    }

    #[test]
    fn steps_alternate() {
        // 9 from LNA 1 reaches 9
        assert_eq!(manual_steps(9).lna, 1);
        assert_eq!(manual_steps(9).mixer, 0);
        // 9 + 5 = 14 needs mixer 1
        let s = manual_steps(14);
        assert_eq!((s.lna, s.mixer, s.total), (1, 1, 14));
    }

    #[test]
    fn validate_range() {
        assert!(validate(GainMode::Manual(MAX_GAIN)).is_ok());
        assert_eq!(validate(GainMode::Manual(MAX_GAIN + 1)), Err(Error::InvalidArgument));
        assert_eq!(validate(GainMode::Manual(-1)), Err(Error::InvalidArgument));
        assert!(validate(GainMode::Auto).is_ok());
    }

    #[test]
    fn readback_nibbles() {
        assert_eq!(readback_gain(0x00), 0);
        // LNA 1, mixer 1
        assert_eq!(readback_gain(0x11), 14);
    }

    #[test]
    fn vga_code_tracks_mode() {
        let mut gc = GainController::new();
        assert_eq!(gc.vga_write().value, 0x0b);
        assert_eq!(gc.set_mode(GainMode::Manual(100)), Ok(true));
        assert_eq!(gc.set_mode(GainMode::Manual(100)), Ok(false));
        assert_eq!(gc.vga_write().value, 0x08);
        assert_eq!(gc.rf_writes().len(), 4);
    }
}
