//! PLL Synthesizer Tests
//!
//! Run with: cargo test --no-default-features --features std --test pll_tests

use r82xx_tuner::config::{DEFAULT_XTAL_FREQ, R828D_XTAL_FREQ};
use r82xx_tuner::tuner::pll::{
    band_for, step_hz, supports_xtal, synthesize, MAX_LO_HZ, MIN_LO_HZ, PLL_BANDS, VCO_MAX_HZ,
    VCO_MIN_HZ,
};
use r82xx_tuner::types::Chip;
use r82xx_tuner::Error;

/// Realized LO is within one synthesis step of the request
fn assert_within_step(lo_hz: u32, xtal_hz: u32, chip: Chip) {
    let p = synthesize(lo_hz, xtal_hz, chip).unwrap();
    let err = u64::from(lo_hz.abs_diff(p.lo_hz));
    // |err| < 2 × xtal / (65536 × mix_div)
    assert!(
        err * 65_536 * u64::from(p.mix_div()) < 2 * u64::from(xtal_hz),
        "{lo_hz} Hz -> {} Hz",
        p.lo_hz
    );
    assert_eq!(p.corr, p.lo_hz as i32 - lo_hz as i32);
}

// =============================================================================
// Accuracy
// =============================================================================

#[test]
fn error_below_one_step_r820t() {
    let mut lo = MIN_LO_HZ;
    while lo < MAX_LO_HZ {
        assert_within_step(lo, DEFAULT_XTAL_FREQ, Chip::R820T);
        lo += 7_777_777;
    }
    assert_within_step(MAX_LO_HZ - 1, DEFAULT_XTAL_FREQ, Chip::R820T);
}

#[test]
fn error_below_one_step_r828d() {
    let mut lo = MIN_LO_HZ;
    while lo < MAX_LO_HZ {
        assert_within_step(lo, R828D_XTAL_FREQ, Chip::R828D);
        lo += 9_876_543;
    }
}

#[test]
fn vco_stays_in_range() {
    for lo in [MIN_LO_HZ, 100_000_000, 433_920_000, 1_090_000_000, MAX_LO_HZ - 1] {
        let p = synthesize(lo, DEFAULT_XTAL_FREQ, Chip::R820T).unwrap();
        let vco = u64::from(lo) * u64::from(p.mix_div());
        assert!((VCO_MIN_HZ..VCO_MAX_HZ).contains(&vco));
        // fosc is the VCO the multiplier actually yields
        assert!(p.fosc_hz.abs_diff(vco) < u64::from(p.mix_div()) * 440);
    }
}

// =============================================================================
// Band Table
// =============================================================================

#[test]
fn divider_shrinks_with_frequency() {
    let mut last = u8::MAX;
    for band in PLL_BANDS {
        assert!(band.div_exp < last);
        last = band.div_exp;
    }
    assert_eq!(band_for(1_090_000_000), Some(5));
    assert_eq!(
        synthesize(1_090_000_000, DEFAULT_XTAL_FREQ, Chip::R820T).unwrap().mix_div(),
        2
    );
}

#[test]
fn out_of_band_is_rejected_not_clamped() {
    assert_eq!(
        synthesize(MIN_LO_HZ - 1, DEFAULT_XTAL_FREQ, Chip::R820T),
        Err(Error::OutOfRange)
    );
    assert_eq!(
        synthesize(MAX_LO_HZ, DEFAULT_XTAL_FREQ, Chip::R820T),
        Err(Error::OutOfRange)
    );
}

#[test]
fn multiplier_over_chip_limit_is_rejected() {
    // R820T at 16 MHz: nint 110 needed, 63 allowed
    assert_eq!(
        synthesize(1_700_000_000, R828D_XTAL_FREQ, Chip::R820T),
        Err(Error::OutOfRange)
    );
    assert!(!supports_xtal(R828D_XTAL_FREQ, Chip::R820T));

    // every band edge stays within one step where the crystal is supported
    for chip in [Chip::R820T, Chip::R828D] {
        for xtal in [R828D_XTAL_FREQ, 27_700_000, DEFAULT_XTAL_FREQ, 40_000_000] {
            if !supports_xtal(xtal, chip) {
                continue;
            }
            for band in PLL_BANDS {
                assert_within_step(band.min_lo_hz, xtal, chip);
            }
            assert_within_step(MAX_LO_HZ - 1, xtal, chip);
        }
    }
}

// =============================================================================
// Register Fields
// =============================================================================

#[test]
fn fields_for_103_57_mhz() {
    // 100 MHz RF + 3.57 MHz IF
    let p = synthesize(103_570_000, DEFAULT_XTAL_FREQ, Chip::R820T).unwrap();
    assert_eq!(p.div_exp, 4);
    assert!(p.threephase);

    // N = 103.57 MHz × 32 × 65536 / 57.6 MHz
    let n = (103_570_000u64 * 32 * 65_536 + 28_800_000) / 57_600_000;
    assert_eq!(u64::from(p.multiplier), n);
    assert_eq!(p.nint(), 57);

    let w = p.register_writes(p.div_exp);
    // nint 57: ni = 11, si = 0
    assert_eq!(w[2].value, 11);
    assert_eq!(w[4].value, (n >> 8 & 0xff) as u8);
    assert_eq!(w[5].value, (n & 0xff) as u8);
    // fractional: SDM stays powered
    assert_eq!(w[3].value, 0x00);
}

#[test]
fn step_shrinks_with_divider() {
    assert!(step_hz(DEFAULT_XTAL_FREQ, 5) < step_hz(DEFAULT_XTAL_FREQ, 0));
}
