//! Configuration and Constants Tests
//!
//! Tests to verify configuration values are valid and consistent.
//! Run with: cargo test --no-default-features --features std --test config_tests

use r82xx_tuner::config::*;
use r82xx_tuner::hal::i2c::I2cAddress;
use r82xx_tuner::tuner::bandwidth::IfFilter;
use r82xx_tuner::tuner::pll::{MAX_LO_HZ, MIN_LO_HZ};
use r82xx_tuner::types::Chip;
use r82xx_tuner::Error;

// =============================================================================
// Chip Constants
// =============================================================================

#[test]
fn addresses_match_presets() {
    assert_eq!(TunerConfig::r820t().i2c_addr.addr(), R820T_I2C_ADDR);
    assert_eq!(TunerConfig::r828d().i2c_addr.addr(), R828D_I2C_ADDR);
    // 8-bit form; the bus sees the 7-bit address
    assert_eq!(I2cAddress::R820T.seven_bit(), 0x1a);
}

#[test]
fn shadow_window_ends_at_0x22() {
    assert_eq!(usize::from(REG_SHADOW_START) + NUM_REGS - 1, 0x22);
    assert_eq!(INIT_ARRAY.len(), NUM_REGS);
}

#[test]
fn default_if_is_the_6mhz_preset() {
    let f = IfFilter::select(DEFAULT_BANDWIDTH_HZ, 0).unwrap();
    assert_eq!(f.if_hz, IF_FREQ);
    assert_eq!(f.real_bw_hz, DEFAULT_BANDWIDTH_HZ);
}

#[test]
fn default_frequency_is_tunable() {
    let lo = DEFAULT_FREQUENCY_HZ + IF_FREQ;
    assert!((MIN_LO_HZ..MAX_LO_HZ).contains(&lo));
}

#[test]
fn version_fits_register_field() {
    assert!(VER_NUM <= 0x3f);
    assert_eq!(CHECK_VAL, 0x69);
    assert_eq!(CHECK_ADDR, 0x00);
}

// =============================================================================
// Tuner Configuration
// =============================================================================

#[test]
fn presets_validate() {
    assert_eq!(TunerConfig::r820t().validate(), Ok(()));
    assert_eq!(TunerConfig::r828d().validate(), Ok(()));
    assert_eq!(TunerConfig::default(), TunerConfig::r820t());
}

#[test]
fn r828d_preset() {
    let c = TunerConfig::r828d();
    assert_eq!(c.chip, Chip::R828D);
    assert_eq!(c.xtal_hz, R828D_XTAL_FREQ);
    assert_eq!(c.rtl_xtal_hz, DEFAULT_XTAL_FREQ);
}

#[test]
fn crystal_range_enforced() {
    let low = TunerConfig::r820t().with_xtal(MIN_XTAL_FREQ - 1);
    let high = TunerConfig::r820t().with_xtal(MAX_XTAL_FREQ + 1);
    assert_eq!(low.validate(), Err(Error::InvalidArgument));
    assert_eq!(high.validate(), Err(Error::InvalidArgument));
    assert_eq!(TunerConfig::r820t().with_xtal(MAX_XTAL_FREQ).validate(), Ok(()));
}

#[test]
fn crystal_must_reach_vco_ceiling() {
    // 63 × 2 × 16 MHz is far below the 3.54 GHz VCO ceiling
    let slow = TunerConfig::r820t().with_xtal(R828D_XTAL_FREQ);
    assert_eq!(slow.validate(), Err(Error::InvalidArgument));

    // just fast enough for a multiplier of 63
    let r820t = |xtal| TunerConfig::r820t().with_xtal(xtal).validate();
    assert_eq!(r820t(27_700_000), Ok(()));
    assert_eq!(r820t(27_000_000), Err(Error::InvalidArgument));

    // the R828D accepts twice the multiplier
    let r828d = |xtal| TunerConfig::r828d().with_xtal(xtal).validate();
    assert_eq!(r828d(14_000_000), Ok(()));
    assert_eq!(r828d(MIN_XTAL_FREQ), Err(Error::InvalidArgument));
}

#[test]
fn message_length_bounds() {
    assert_eq!(
        TunerConfig::r820t().with_max_msg_len(1).validate(),
        Err(Error::InvalidArgument)
    );
    assert_eq!(TunerConfig::r820t().with_max_msg_len(2).validate(), Ok(()));
    assert_eq!(
        TunerConfig::r820t()
            .with_max_msg_len(NUM_REGS + 1)
            .validate(),
        Ok(())
    );
    assert_eq!(
        TunerConfig::r820t()
            .with_max_msg_len(NUM_REGS + 2)
            .validate(),
        Err(Error::InvalidArgument)
    );
}

#[test]
fn predetect_defaults_off() {
    assert!(!TunerConfig::r820t().use_predetect);
    assert!(TunerConfig::r820t().with_predetect(true).use_predetect);
}
