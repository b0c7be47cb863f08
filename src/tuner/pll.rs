//! R82xx PLL Frequency Calculation
//!
//! Pure computation, testable on the host.
//!
//! # Theory of Operation
//!
//! The R82xx LO is synthesized in two stages:
//! 1. Fractional-N PLL: FVCO = 2 × FXTAL × (nint + sdm/65536), 1.77 GHz ≤ FVCO < 3.54 GHz
//! 2. Mixer divider: FLO = FVCO / mix_div, with mix_div = 2 << div_exp (2..=64)
//!
//! The divider is taken from a fixed band table so that the VCO range covers
//! the request; the 16.16 multiplier is then rounded to the nearest step.

use crate::error::Error;
use crate::tuner::registers::RegWrite;
use crate::types::Chip;

/// Lowest VCO frequency
pub const VCO_MIN_HZ: u64 = 1_770_000_000;
/// VCO upper bound (exclusive)
pub const VCO_MAX_HZ: u64 = 3_540_000_000;

/// Smallest integer multiplier the PLL accepts
pub const MIN_NINT: u32 = 13;

/// Largest divider exponent (mix_div = 64)
pub const MAX_DIV_EXP: u8 = 5;

/// Highest tunable LO (exclusive)
pub const MAX_LO_HZ: u32 = 1_770_000_000;

/// Lowest tunable LO
pub const MIN_LO_HZ: u32 = PLL_BANDS[0].min_lo_hz;

/// Status byte 2 bit set while the PLL is locked
pub const LOCK_BIT: u8 = 0x40;

/// Writes that precede every PLL programming: reference divider off,
/// autotune 128 kHz, VCO current default
pub const PLL_PREPARE: [RegWrite; 3] = [
    RegWrite::new(0x10, 0x00, 0x10),
    RegWrite::new(0x1a, 0x00, 0x0c),
    RegWrite::new(0x12, 0x80, 0xe0),
];

/// Whether status byte 2 reports lock
#[must_use]
pub const fn is_locked(status2: u8) -> bool {
    status2 & LOCK_BIT != 0
}

/// One row of the divider table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PllBand {
    /// Lowest LO served by this divider
    pub min_lo_hz: u32,
    /// Divider exponent, mix_div = 2 << div_exp
    pub div_exp: u8,
}

/// Divider bands, ascending by LO
///
/// Each band spans exactly VCO_MIN / mix_div ..< VCO_MAX / mix_div; the
/// next band starts where the previous one ends.
pub const PLL_BANDS: [PllBand; 6] = [
    PllBand { min_lo_hz: 27_656_250, div_exp: 5 },
    PllBand { min_lo_hz: 55_312_500, div_exp: 4 },
    PllBand { min_lo_hz: 110_625_000, div_exp: 3 },
    PllBand { min_lo_hz: 221_250_000, div_exp: 2 },
    PllBand { min_lo_hz: 442_500_000, div_exp: 1 },
    PllBand { min_lo_hz: 885_000_000, div_exp: 0 },
];

/// Find the divider band for an LO frequency
#[must_use]
pub fn band_for(lo_hz: u32) -> Option<usize> {
    if !(MIN_LO_HZ..MAX_LO_HZ).contains(&lo_hz) {
        return None;
    }
    let idx = PLL_BANDS.partition_point(|band| band.min_lo_hz <= lo_hz);
    idx.checked_sub(1)
}

/// Synthesizer solution for one LO request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub struct PllParams {
    /// VCO frequency in Hz
    pub fosc_hz: u64,
    /// Requested LO in Hz
    pub intended_lo_hz: u32,
    /// Realized LO in Hz
    pub lo_hz: u32,
    /// 16.16 fixed-point multiplier (nint << 16 | sdm)
    pub multiplier: u32,
    /// Divider exponent, mix_div = 2 << div_exp
    pub div_exp: u8,
    /// Row of [`PLL_BANDS`] the divider came from
    pub band_index: usize,
    /// Three-phase mixer clock (used for the two largest dividers)
    pub threephase: bool,
    /// Realized minus requested LO in Hz
    pub corr: i32,
}

impl PllParams {
    /// Mixer divider
    #[must_use]
    pub const fn mix_div(&self) -> u32 {
        2 << self.div_exp
    }

    /// Integer part of the multiplier
    #[must_use]
    pub const fn nint(&self) -> u32 {
        self.multiplier >> 16
    }

    /// Sigma-delta (fractional) part of the multiplier
    #[must_use]
    pub const fn sdm(&self) -> u16 {
        (self.multiplier & 0xffff) as u16
    }

    /// Register fields for this solution
    ///
    /// `div_num` is the divider code after the VCO fine-tune correction
    /// (see [`adjust_div`]).
    #[must_use]
    pub fn register_writes(&self, div_num: u8) -> [RegWrite; 6] {
        let nint = self.nint();
        let ni = (nint - MIN_NINT) / 4;
        let si = nint - 4 * ni - MIN_NINT;
        let sdm = self.sdm();
        // SDM powered down for integer-N
        let pw_sdm = if sdm == 0 { 0x08 } else { 0x00 };

        [
            RegWrite::new(0x10, div_num << 5, 0xe0),
            RegWrite::new(0x10, if self.threephase { 0x04 } else { 0x00 }, 0x04),
            RegWrite::full(0x14, (ni | (si << 6)) as u8),
            RegWrite::new(0x12, pw_sdm, 0x08),
            RegWrite::full(0x16, (sdm >> 8) as u8),
            RegWrite::full(0x15, (sdm & 0xff) as u8),
        ]
    }
}

/// Compute PLL parameters for an LO frequency
///
/// Fails with `OutOfRange` outside the divider table or when the multiplier
/// falls outside what the chip accepts for this crystal.
pub fn synthesize(lo_hz: u32, xtal_hz: u32, chip: Chip) -> Result<PllParams, Error> {
    if xtal_hz == 0 {
        return Err(Error::InvalidArgument);
    }
    let band_index = band_for(lo_hz).ok_or(Error::OutOfRange)?;
    let div_exp = PLL_BANDS[band_index].div_exp;
    let mix_div = 2u64 << div_exp;
    let xtal = u64::from(xtal_hz);

    // N = FVCO × 65536 / (2 × FXTAL), rounded to nearest
    let vco = u64::from(lo_hz) * mix_div;
    let n = (vco * 65536 + xtal) / (2 * xtal);
    let min_n = u64::from(MIN_NINT) << 16;
    let max_n = (u64::from(chip.max_nint()) << 16) | 0xffff;
    if n < min_n || n > max_n {
        warn!("r82xx: no valid multiplier for {=u32} Hz", lo_hz);
        return Err(Error::OutOfRange);
    }

    let fosc_hz = (n * 2 * xtal + 32_768) / 65_536;
    let denom = 65_536 * mix_div;
    let realized = (n * 2 * xtal + denom / 2) / denom;
    let realized = u32::try_from(realized).map_err(|_| Error::OutOfRange)?;

    Ok(PllParams {
        fosc_hz,
        intended_lo_hz: lo_hz,
        lo_hz: realized,
        multiplier: n as u32,
        div_exp,
        band_index,
        threephase: div_exp >= 4,
        corr: realized as i32 - lo_hz as i32,
    })
}

/// Whether the multiplier range covers the whole VCO range for a crystal
#[must_use]
pub const fn supports_xtal(xtal_hz: u32, chip: Chip) -> bool {
    if xtal_hz == 0 {
        return false;
    }
    let xtal = xtal_hz as u64;
    // Multipliers at both VCO edges, rounded as synthesize rounds
    let top = (VCO_MAX_HZ * 65_536 + xtal) / (2 * xtal);
    let bottom = (VCO_MIN_HZ * 65_536 + xtal) / (2 * xtal);
    bottom >= (MIN_NINT as u64) << 16 && top <= ((chip.max_nint() as u64) << 16 | 0xffff)
}

/// Frequency resolution for a divider, in Hz (rounded up)
#[must_use]
pub const fn step_hz(xtal_hz: u32, div_exp: u8) -> u32 {
    let denom = 65_536u64 * (2u64 << div_exp);
    ((2 * xtal_hz as u64).div_ceil(denom)) as u32
}

/// Correct the divider code from the VCO fine-tune readback
///
/// `status4` is status byte 4; its bits 5:4 report the VCO band. A band
/// above the chip's power reference needs one divider step less, a band
/// below it one step more.
#[must_use]
pub const fn adjust_div(div_exp: u8, status4: u8, chip: Chip) -> u8 {
    let fine = (status4 & 0x30) >> 4;
    let reference = chip.vco_power_ref();
    if fine > reference {
        div_exp.saturating_sub(1)
    } else if fine < reference && div_exp < 7 {
        div_exp + 1
    } else {
        div_exp
    }
}
