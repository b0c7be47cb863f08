//! IF filter selection
//!
//! Maps a requested bandwidth onto the 8/7/6 MHz presets or onto the
//! narrow low-pass/high-pass combination, and reports the IF that centres
//! the passband.

use crate::error::Error;
use crate::tuner::registers::RegWrite;

/// High-pass corner 1
const FILT_HP_BW1: u32 = 350_000;
/// High-pass corner 2
const FILT_HP_BW2: u32 = 380_000;

/// Low-pass corners selectable in narrow mode, widest first
pub const IF_LOW_PASS_BW: [u32; 10] = [
    1_700_000, 1_600_000, 1_550_000, 1_450_000, 1_200_000, 900_000, 700_000, 550_000, 450_000,
    350_000,
];

/// Computed filter settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub struct IfFilter {
    /// Register 0x0a bit 4
    pub reg_0a: u8,
    /// Register 0x0b (mask 0xef)
    pub reg_0b: u8,
    /// Resulting intermediate frequency
    pub if_hz: u32,
    /// Passband actually selected
    pub real_bw_hz: u32,
}

impl IfFilter {
    /// Select filter settings for `bw_hz`; a zero bandwidth falls back to
    /// the sample rate
    pub fn select(bw_hz: u32, rate_hz: u32) -> Result<Self, Error> {
        let mut bw = if bw_hz == 0 { rate_hz } else { bw_hz };
        if bw == 0 {
            return Err(Error::OutOfRange);
        }

        if bw > 7_000_000 {
            return Ok(Self::preset(0x0b, 4_570_000, 8_000_000));
        }
        if bw > 6_000_000 {
            return Ok(Self::preset(0x2a, 4_570_000, 7_000_000));
        }
        if bw > IF_LOW_PASS_BW[0] + FILT_HP_BW1 + FILT_HP_BW2 {
            return Ok(Self::preset(0x6b, 3_570_000, 6_000_000));
        }

        let mut reg_0b = 0x80;
        let mut if_hz = 2_300_000;
        let mut real_bw = 0;

        if bw > IF_LOW_PASS_BW[0] + FILT_HP_BW1 {
            bw -= FILT_HP_BW2;
            if_hz += FILT_HP_BW2;
            real_bw += FILT_HP_BW2;
        } else {
            reg_0b |= 0x20;
        }

        if bw > IF_LOW_PASS_BW[0] {
            bw -= FILT_HP_BW1;
            if_hz += FILT_HP_BW1;
            real_bw += FILT_HP_BW1;
        } else {
            reg_0b |= 0x40;
        }

        let i = IF_LOW_PASS_BW
            .iter()
            .position(|&lp| bw > lp)
            .unwrap_or(IF_LOW_PASS_BW.len())
            .saturating_sub(1);
        reg_0b |= 15 - i as u8;
        real_bw += IF_LOW_PASS_BW[i];
        if_hz -= real_bw / 2;

        Ok(Self {
            reg_0a: 0x00,
            reg_0b,
            if_hz,
            real_bw_hz: real_bw,
        })
    }

    const fn preset(reg_0b: u8, if_hz: u32, real_bw_hz: u32) -> Self {
        Self {
            reg_0a: 0x10,
            reg_0b,
            if_hz,
            real_bw_hz,
        }
    }

    /// Register writes for this setting
    #[must_use]
    pub const fn writes(&self) -> [RegWrite; 2] {
        [
            RegWrite::new(0x0a, self.reg_0a, 0x10),
            RegWrite::new(0x0b, self.reg_0b, 0xef),
        ]
    }
}

/// Reapply the filter calibration code after a bandwidth change
#[must_use]
pub const fn refresh_write(fil_cal_code: u8) -> RegWrite {
    RegWrite::new(0x0a, fil_cal_code, 0x0f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        assert_eq!(IfFilter::select(8_000_000, 0).unwrap().reg_0b, 0x0b);
        assert_eq!(IfFilter::select(6_500_000, 0).unwrap().reg_0b, 0x2a);
        let f = IfFilter::select(6_000_000, 0).unwrap();
        assert_eq!((f.reg_0a, f.reg_0b, f.if_hz), (0x10, 0x6b, 3_570_000));
    }

    #[test]
    fn narrow_two_megahertz() {
        // 2.0 MHz: above 1.7 + 0.35 is false, so only HP1 applies
        let f = IfFilter::select(2_000_000, 0).unwrap();
        // bw 2.0 - 0.35 = 1.65 MHz > 1.6 MHz: low-pass index 0 (1.7 MHz)
        assert_eq!(f.reg_0b, 0x80 | 0x20 | 15);
        assert_eq!(f.real_bw_hz, 350_000 + 1_700_000);
        assert_eq!(f.if_hz, 2_300_000 + 350_000 - (2_050_000 / 2));
    }

    #[test]
    fn narrowest() {
        let f = IfFilter::select(200_000, 0).unwrap();
        assert_eq!(f.reg_0b, 0x80 | 0x20 | 0x40 | 6);
        assert_eq!(f.real_bw_hz, 350_000);
        assert_eq!(f.if_hz, 2_300_000 - 175_000);
    }

    #[test]
    fn zero_uses_rate() {
        assert_eq!(
            IfFilter::select(0, 2_400_000),
            IfFilter::select(2_400_000, 0)
        );
        assert_eq!(IfFilter::select(0, 0), Err(Error::OutOfRange));
    }
}
