//! RF band table
//!
//! Static per-range front-end settings (open-drain, RF/poly mux, tracking
//! filter, crystal cap bits and image-rejection band), ascending by start
//! frequency and searched by binary search.

use crate::config::NUM_IMR;
use crate::tuner::calibration::ImrTrim;
use crate::tuner::registers::RegWrite;
use crate::types::XtalCap;

/// Front-end settings for one RF range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreqRange {
    /// Start of the range in MHz
    pub start_mhz: u32,
    /// Register 0x17 bit 3
    pub open_d: u8,
    /// Register 0x1a bits [7:6] and [1:0]
    pub rf_mux_ploy: u8,
    /// Tracking filter cap, register 0x1b
    pub tf_c: u8,
    /// Crystal cap bits with a 20/30 pF selection
    pub xtal_cap20p: u8,
    /// Crystal cap bits with a 10 pF selection
    pub xtal_cap10p: u8,
    /// Crystal cap bits with a 0 pF selection
    pub xtal_cap0p: u8,
    /// Image-rejection calibration band used in this range
    pub imr_mem: u8,
}

const fn range(
    start_mhz: u32,
    open_d: u8,
    rf_mux_ploy: u8,
    tf_c: u8,
    caps: [u8; 3],
    imr_mem: u8,
) -> FreqRange {
    FreqRange {
        start_mhz,
        open_d,
        rf_mux_ploy,
        tf_c,
        xtal_cap20p: caps[0],
        xtal_cap10p: caps[1],
        xtal_cap0p: caps[2],
        imr_mem,
    }
}

/// Range table, ascending by start frequency
pub const FREQ_RANGES: [FreqRange; 21] = [
    range(0, 0x08, 0x02, 0xdf, [0x02, 0x01, 0x00], 0),
    range(50, 0x08, 0x02, 0xbe, [0x02, 0x01, 0x00], 0),
    range(55, 0x08, 0x02, 0x8b, [0x02, 0x01, 0x00], 0),
    range(60, 0x08, 0x02, 0x7b, [0x02, 0x01, 0x00], 0),
    range(65, 0x08, 0x02, 0x69, [0x02, 0x01, 0x00], 0),
    range(70, 0x08, 0x02, 0x58, [0x02, 0x01, 0x00], 0),
    range(75, 0x00, 0x02, 0x44, [0x02, 0x01, 0x00], 0),
    range(80, 0x00, 0x02, 0x44, [0x02, 0x01, 0x00], 0),
    range(90, 0x00, 0x02, 0x34, [0x01, 0x01, 0x00], 0),
    range(100, 0x00, 0x02, 0x34, [0x01, 0x01, 0x00], 0),
    range(110, 0x00, 0x02, 0x24, [0x01, 0x01, 0x00], 0),
    range(120, 0x00, 0x02, 0x24, [0x01, 0x01, 0x00], 0),
    range(140, 0x00, 0x02, 0x14, [0x01, 0x01, 0x00], 1),
    range(180, 0x00, 0x02, 0x13, [0x00, 0x00, 0x00], 1),
    range(220, 0x00, 0x02, 0x13, [0x00, 0x00, 0x00], 1),
    range(250, 0x00, 0x02, 0x11, [0x00, 0x00, 0x00], 2),
    range(280, 0x00, 0x02, 0x00, [0x00, 0x00, 0x00], 2),
    range(310, 0x00, 0x41, 0x00, [0x00, 0x00, 0x00], 3),
    range(450, 0x00, 0x41, 0x00, [0x00, 0x00, 0x00], 3),
    range(588, 0x00, 0x40, 0x00, [0x00, 0x00, 0x00], 4),
    range(650, 0x00, 0x40, 0x00, [0x00, 0x00, 0x00], 4),
];

/// Range containing `freq_hz`
#[must_use]
pub fn lookup(freq_hz: u32) -> &'static FreqRange {
    let mhz = freq_hz / 1_000_000;
    let idx = FREQ_RANGES.partition_point(|r| r.start_mhz <= mhz);
    // Entry 0 starts at 0 MHz, so idx is at least 1
    &FREQ_RANGES[idx.saturating_sub(1)]
}

impl FreqRange {
    /// Register 0x10 crystal bits for the active cap
    #[must_use]
    pub const fn xtal_bits(&self, cap: XtalCap) -> u8 {
        match cap {
            XtalCap::Low30p | XtalCap::Low20p => self.xtal_cap20p | 0x08,
            XtalCap::Low10p => self.xtal_cap10p | 0x08,
            XtalCap::Low0p => self.xtal_cap0p | 0x08,
            XtalCap::High0p => self.xtal_cap0p,
        }
    }

    /// Band-select writes for this range
    #[must_use]
    pub fn select_writes(&self, cap: XtalCap, imr: &[ImrTrim; NUM_IMR]) -> [RegWrite; 6] {
        let trim = imr[usize::from(self.imr_mem).min(NUM_IMR - 1)];
        [
            RegWrite::new(0x17, self.open_d, 0x08),
            RegWrite::new(0x1a, self.rf_mux_ploy, 0xc3),
            RegWrite::full(0x1b, self.tf_c),
            RegWrite::new(0x10, self.xtal_bits(cap), 0x0b),
            RegWrite::new(0x08, trim.gain, 0x3f),
            RegWrite::new(0x09, trim.phase, 0x3f),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ascending() {
        for pair in FREQ_RANGES.windows(2) {
            assert!(pair[0].start_mhz < pair[1].start_mhz);
            assert!(pair[0].imr_mem <= pair[1].imr_mem);
        }
    }

    #[test]
    fn lookup_boundaries() {
        assert_eq!(lookup(0).start_mhz, 0);
        assert_eq!(lookup(49_999_999).start_mhz, 0);
        assert_eq!(lookup(50_000_000).start_mhz, 50);
        assert_eq!(lookup(103_570_000).start_mhz, 100);
        assert_eq!(lookup(1_700_000_000).start_mhz, 650);
    }

    #[test]
    fn xtal_drive_bits() {
        let r = lookup(100_000_000);
        assert_eq!(r.xtal_bits(XtalCap::Low30p), 0x09);
        assert_eq!(r.xtal_bits(XtalCap::Low0p), 0x08);
        assert_eq!(r.xtal_bits(XtalCap::High0p), 0x00);
    }

    #[test]
    fn imr_trim_follows_band() {
        let mut imr = [ImrTrim::default(); NUM_IMR];
        imr[3] = ImrTrim { gain: 0x21, phase: 0x01 };
        let w = lookup(400_000_000).select_writes(XtalCap::High0p, &imr);
        assert_eq!(w[4], RegWrite::new(0x08, 0x21, 0x3f));
        assert_eq!(w[5], RegWrite::new(0x09, 0x01, 0x3f));
    }
}
