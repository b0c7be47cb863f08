//! Calibration Sequence Tests
//!
//! Crystal cap, filter and image-rejection sequences driven against the
//! simulated chip one step at a time.
//! Run with: cargo test --no-default-features --features std --test calibration_tests

mod common;

use common::{MockR82xx, LOCKED, UNLOCKED};
use r82xx_tuner::config::{TunerConfig, VER_NUM};
use r82xx_tuner::hal::i2c::BusError;
use r82xx_tuner::tuner::calibration::{FilterCal, ImrCal, ImrTrim, XtalCapCal};
use r82xx_tuner::tuner::registers::Link;
use r82xx_tuner::tuner::state::TunerState;
use r82xx_tuner::tuner::Progress;
use r82xx_tuner::{Error, XtalCap};

/// Step a sequence until it finishes or fails
fn drive(mut step: impl FnMut() -> nb::Result<Progress, Error>) -> Result<usize, Error> {
    for calls in 1..10_000 {
        match step() {
            Ok(Progress::Done) => return Ok(calls),
            Ok(Progress::Pending) | Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(err)) => return Err(err),
        }
    }
    panic!("sequence never finished");
}

fn run_xtal(mock: &mut MockR82xx, state: &mut TunerState) -> Result<usize, Error> {
    let config = TunerConfig::r820t();
    let mut cal = XtalCapCal::start(state);
    let mut link = Link::new(mock, &config);
    drive(|| cal.step(&mut link, state))
}

fn run_filter(mock: &mut MockR82xx, state: &mut TunerState) -> Result<usize, Error> {
    let config = TunerConfig::r820t();
    let mut cal = FilterCal::start(state, &config).unwrap();
    let mut link = Link::new(mock, &config);
    drive(|| cal.step(&mut link, state))
}

fn run_imr(mock: &mut MockR82xx, state: &mut TunerState) -> Result<usize, Error> {
    let config = TunerConfig::r820t();
    let mut cal = ImrCal::start(state);
    let mut link = Link::new(mock, &config);
    drive(|| cal.step(&mut link, state, &config))
}

// =============================================================================
// Crystal Cap
// =============================================================================

#[test]
fn xtal_first_stable_cap_wins() {
    let mut mock = MockR82xx::new();
    // unlocked, then locked but saturated, then good
    mock.with(|m| m.status2.extend([UNLOCKED, 0x7f, LOCKED]));
    let mut state = TunerState::new();

    run_xtal(&mut mock, &mut state).unwrap();

    assert_eq!(state.xtal_cap(), XtalCap::Low10p);
    assert!(!state.health().calibration_degraded);
    assert_eq!(mock.reg(0x10) & 0x1b, XtalCap::Low10p.probe_bits());
    assert_eq!(mock.reg(0x13) & 0x3f, VER_NUM);
    mock.with(|m| assert_eq!(m.reads, 3));
}

#[test]
fn xtal_falls_back_to_high_drive() {
    let mut mock = MockR82xx::new();
    mock.with(|m| m.status2.extend([UNLOCKED; 5]));
    let mut state = TunerState::new();

    run_xtal(&mut mock, &mut state).unwrap();

    assert_eq!(state.xtal_cap(), XtalCap::High0p);
    assert!(state.health().calibration_degraded);
    assert_eq!(mock.reg(0x10) & 0x1b, 0x10);
}

#[test]
fn xtal_waits_on_busy_bus() {
    let mut mock = MockR82xx::new();
    mock.with(|m| m.busy = 3);
    let mut state = TunerState::new();

    run_xtal(&mut mock, &mut state).unwrap();

    assert_eq!(state.xtal_cap(), XtalCap::Low30p);
}

// =============================================================================
// Filter
// =============================================================================

#[test]
fn filter_code_applied() {
    let mut mock = MockR82xx::new();
    let mut state = TunerState::new();

    run_filter(&mut mock, &mut state).unwrap();

    assert_eq!(state.fil_cal_code(), 0x05);
    assert_eq!(mock.reg(0x0a) & 0x1f, 0x10 | 0x05);
    // trigger and calibration clock released
    assert_eq!(mock.reg(0x0b) & 0x10, 0);
    assert_eq!(mock.reg(0x0f) & 0x04, 0);
    mock.with(|m| assert_eq!(m.triggers, 1));
}

#[test]
fn filter_retries_once() {
    let mut mock = MockR82xx::new();
    mock.with(|m| m.filter_failures = 1);
    let mut state = TunerState::new();

    run_filter(&mut mock, &mut state).unwrap();

    assert_eq!(state.fil_cal_code(), 0x05);
    mock.with(|m| assert_eq!(m.triggers, 2));
}

#[test]
fn filter_second_bad_code_is_fatal() {
    let mut mock = MockR82xx::new();
    mock.with(|m| m.filter_failures = 2);
    let mut state = TunerState::new();

    let err = run_filter(&mut mock, &mut state).unwrap_err();

    assert_eq!(err, Error::FilterCalibration);
    assert!(err.is_fatal());
    assert_eq!(state.fil_cal_code(), 0);
}

#[test]
fn filter_without_lock_is_fatal() {
    let mut mock = MockR82xx::new();
    mock.with(|m| m.status2.extend([UNLOCKED, UNLOCKED]));
    let mut state = TunerState::new();

    assert_eq!(
        run_filter(&mut mock, &mut state),
        Err(Error::FilterCalibration)
    );
    mock.with(|m| assert_eq!(m.triggers, 0));
}

// =============================================================================
// Image Rejection
// =============================================================================

#[test]
fn imr_picks_minimum() {
    fn detector(gain: u8, phase: u8) -> u8 {
        // trial 5: gain 0x01, phase 0x21
        if gain == 0x01 && phase == 0x21 {
            0x04
        } else {
            0x18 + gain
        }
    }
    let mut mock = MockR82xx::new();
    mock.with(|m| m.detector = detector);
    let mut state = TunerState::new();

    run_imr(&mut mock, &mut state).unwrap();

    assert!(state.imr_done());
    assert!(!state.health().calibration_degraded);
    for trim in state.imr_trims() {
        assert_eq!(*trim, ImrTrim::trial(5));
    }
    // five bands of nine measurements
    mock.with(|m| assert_eq!(m.reads, 45));
    // search trims are cleared afterwards
    assert_eq!(mock.reg(0x08) & 0x3f, 0);
    assert_eq!(mock.reg(0x09) & 0x3f, 0);
}

#[test]
fn imr_tie_goes_to_first_trial() {
    fn detector(gain: u8, phase: u8) -> u8 {
        // trials 2 and 6 read the same low value
        match (gain, phase) {
            (0x00, 0x21) | (0x21, 0x00) => 0x06,
            _ => 0x20,
        }
    }
    let mut mock = MockR82xx::new();
    mock.with(|m| m.detector = detector);
    let mut state = TunerState::new();

    run_imr(&mut mock, &mut state).unwrap();

    assert_eq!(state.imr_trims()[0], ImrTrim::trial(2));
}

#[test]
fn imr_flat_readings_degrade() {
    let mut mock = MockR82xx::new();
    mock.with(|m| m.detector = |_, _| 0x20);
    let mut state = TunerState::new();

    run_imr(&mut mock, &mut state).unwrap();

    assert!(state.imr_done());
    assert!(state.health().calibration_degraded);
    assert!(state.imr_trims().iter().all(|t| *t == ImrTrim::ZERO));
}

#[test]
fn imr_read_fault_stops_search() {
    let mut mock = MockR82xx::new();
    mock.with(|m| m.fail_reads = true);
    let mut state = TunerState::new();

    assert_eq!(
        run_imr(&mut mock, &mut state),
        Err(Error::BusFault(BusError::Timeout))
    );
    assert!(!state.imr_done());
}
