//! Calibration Engine
//!
//! Three sequences run once per init:
//! - crystal cap: first load capacitance that gives a stable PLL wins
//! - filter: the chip's RC self-calibration, retried once
//! - image rejection: a 3x3 gain/phase trim search at five frequencies
//!
//! Every call to `step` performs at most one commit or one status read.

use crate::config::{TunerConfig, IMR_TRIAL, NUM_IMR, VER_NUM};
use crate::error::Error;
use crate::hal::i2c::Transport;
use crate::tuner::bands;
use crate::tuner::pll::{self, PllParams, PLL_PREPARE};
use crate::tuner::registers::{Link, RegWrite};
use crate::tuner::state::TunerState;
use crate::tuner::Progress;
use crate::types::XtalCap;

/// Image-rejection calibration frequencies, one per band
pub const IMR_FREQS_HZ: [u32; NUM_IMR] = [
    80_000_000,
    180_000_000,
    280_000_000,
    450_000_000,
    650_000_000,
];

/// Trim codes for either axis; bit 5 selects the direction
const TRIM_CODES: [u8; 3] = [0x00, 0x01, 0x21];

/// Saturated detector reading
pub const DETECTOR_MAX: u8 = 0x3f;

/// Frequency the filter calibration runs the PLL at
pub const FILTER_CAL_LO_HZ: u32 = 56_000_000;

/// Filter Q bit of register 0x0a
const FILT_Q: u8 = 0x10;

/// High-pass corner / bandwidth code of the 6 MHz preset
const HP_COR: u8 = 0x6b;

const XTAL_SETUP: [RegWrite; 4] = [
    // 30 pF, low drive
    RegWrite::new(0x10, 0x0b, 0x0b),
    // autotune 128 kHz
    RegWrite::new(0x1a, 0x00, 0x0c),
    // manual initial value, then auto
    RegWrite::new(0x13, 0x7f, 0x7f),
    RegWrite::new(0x13, 0x00, 0x40),
];

const FILTER_CAL_PREPARE: [RegWrite; 3] = [
    RegWrite::new(0x0b, HP_COR, 0x60),
    // calibration clock on
    RegWrite::new(0x0f, 0x04, 0x04),
    // 0 pF crystal cap for the PLL
    RegWrite::new(0x10, 0x00, 0x03),
];

const FILTER_CAL_TRIGGER: RegWrite = RegWrite::new(0x0b, 0x10, 0x10);

const FILTER_CAL_RELEASE: [RegWrite; 2] = [
    RegWrite::new(0x0b, 0x00, 0x10),
    RegWrite::new(0x0f, 0x00, 0x04),
];

const IMR_PREPARE: [RegWrite; 10] = [
    RegWrite::new(0x05, 0x20, 0x20),
    RegWrite::new(0x07, 0x00, 0x10),
    RegWrite::new(0x0a, 0x0f, 0x0f),
    RegWrite::new(0x0b, 0x60, 0x6f),
    RegWrite::new(0x0c, 0x0b, 0x9f),
    RegWrite::new(0x0f, 0x00, 0x08),
    RegWrite::new(0x18, 0x10, 0x10),
    RegWrite::new(0x1c, 0x02, 0x02),
    RegWrite::new(0x1e, 0x80, 0x80),
    RegWrite::new(0x06, 0x20, 0x20),
];

/// Channel filter settings applied once the calibration code is known
#[must_use]
pub const fn filter_apply_writes(code: u8) -> [RegWrite; 9] {
    [
        RegWrite::new(0x0a, FILT_Q | code, 0x1f),
        RegWrite::new(0x0b, HP_COR, 0xef),
        // image rejection on
        RegWrite::new(0x07, 0x00, 0x80),
        // filter gain, 3 dB point
        RegWrite::new(0x06, 0x10, 0x30),
        // channel filter extension
        RegWrite::new(0x1e, 0x60, 0x60),
        // loop-through on, attenuation off
        RegWrite::new(0x05, 0x00, 0x80),
        RegWrite::new(0x1f, 0x00, 0x80),
        RegWrite::new(0x0f, 0x00, 0x80),
        // RF poly filter current
        RegWrite::new(0x19, 0x60, 0x60),
    ]
}

const fn imr_restore_writes(code: u8) -> [RegWrite; 10] {
    [
        RegWrite::new(0x0f, 0x08, 0x08),
        RegWrite::new(0x18, 0x00, 0x10),
        RegWrite::new(0x1c, 0x00, 0x02),
        RegWrite::new(0x1e, 0x00, 0x80),
        RegWrite::new(0x05, 0x00, 0x20),
        RegWrite::new(0x06, 0x10, 0x30),
        RegWrite::new(0x0a, FILT_Q | code, 0x1f),
        RegWrite::new(0x0b, HP_COR, 0xef),
        RegWrite::new(0x08, 0x00, 0x3f),
        RegWrite::new(0x09, 0x00, 0x3f),
    ]
}

/// Gain/phase trim pair for registers 0x08/0x09
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub struct ImrTrim {
    /// Register 0x08 bits 5:0
    pub gain: u8,
    /// Register 0x09 bits 5:0
    pub phase: u8,
}

impl ImrTrim {
    /// No correction
    pub const ZERO: Self = Self { gain: 0, phase: 0 };

    /// Trim for trial `index` of the 3x3 grid (gain major)
    #[must_use]
    pub const fn trial(index: usize) -> Self {
        Self {
            gain: TRIM_CODES[(index / 3) % 3],
            phase: TRIM_CODES[index % 3],
        }
    }
}

/// Index of the lowest reading; ties go to the earliest trial
#[must_use]
pub fn best_trial(readings: &[u8]) -> Option<usize> {
    let mut best: Option<(usize, u8)> = None;
    for (index, &reading) in readings.iter().enumerate() {
        match best {
            Some((_, lowest)) if lowest <= reading => {}
            _ => best = Some((index, reading)),
        }
    }
    best.map(|(index, _)| index)
}

/// A series that cannot be trusted: flat, empty, or saturated
#[must_use]
pub fn is_degraded(readings: &[u8]) -> bool {
    let Some(&first) = readings.first() else {
        return true;
    };
    let lowest = readings.iter().copied().min().unwrap_or(first);
    readings.iter().all(|&r| r == first) || lowest >= DETECTOR_MAX
}

/// Whether a crystal probe gave a locked, unsaturated VCO
#[must_use]
pub const fn xtal_stable(status2: u8) -> bool {
    pll::is_locked(status2) && (status2 & 0x3f) != 0x3f
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
enum XtalStep {
    Setup,
    Probe(usize),
    Check(usize),
    Restore,
}

/// Crystal cap selection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct XtalCapCal {
    step: XtalStep,
}

impl XtalCapCal {
    /// Stage the setup writes
    pub fn start(state: &mut TunerState) -> Self {
        state.regs.apply(&XTAL_SETUP);
        Self {
            step: XtalStep::Setup,
        }
    }

    fn stage_probe(state: &mut TunerState, index: usize) {
        state.regs.write(0x10, XtalCap::ALL[index].probe_bits(), 0x1b);
    }

    fn finish(&mut self, state: &mut TunerState) {
        state.regs.write(0x10, state.xtal_cap.probe_bits(), 0x1b);
        state.regs.write(0x13, VER_NUM, 0x3f);
        self.step = XtalStep::Restore;
    }

    /// Advance by one bus operation
    pub fn step<T: Transport + ?Sized>(
        &mut self,
        link: &mut Link<'_, T>,
        state: &mut TunerState,
    ) -> nb::Result<Progress, Error> {
        match self.step {
            XtalStep::Setup => {
                link.commit(&mut state.regs)?;
                Self::stage_probe(state, 0);
                self.step = XtalStep::Probe(0);
            }
            XtalStep::Probe(index) => {
                link.commit(&mut state.regs)?;
                self.step = XtalStep::Check(index);
            }
            XtalStep::Check(index) => {
                let mut status = [0u8; 3];
                link.status(&mut status)?;
                let cap = XtalCap::ALL[index];
                if xtal_stable(status[2]) {
                    debug!("r82xx: xtal cap {} stable", cap);
                    state.xtal_cap = cap;
                    self.finish(state);
                } else if index + 1 < XtalCap::ALL.len() {
                    Self::stage_probe(state, index + 1);
                    self.step = XtalStep::Probe(index + 1);
                } else {
                    warn!("r82xx: no stable xtal cap, using default");
                    state.xtal_cap = XtalCap::High0p;
                    state.health.calibration_degraded = true;
                    self.finish(state);
                }
            }
            XtalStep::Restore => {
                link.commit(&mut state.regs)?;
                return Ok(Progress::Done);
            }
        }
        Ok(Progress::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
enum FilterStep {
    Prepare,
    Lock,
    Trigger,
    Release,
    Readback,
    Apply,
}

/// Filter RC self-calibration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterCal {
    step: FilterStep,
    attempts: u8,
    pll: PllParams,
}

impl FilterCal {
    /// Failed attempts allowed before the chip is declared dead
    pub const MAX_ATTEMPTS: u8 = 2;

    /// Stage the first attempt
    pub fn start(state: &mut TunerState, config: &TunerConfig) -> Result<Self, Error> {
        let pll = pll::synthesize(FILTER_CAL_LO_HZ, config.xtal_hz, config.chip)?;
        let cal = Self {
            step: FilterStep::Prepare,
            attempts: 0,
            pll,
        };
        cal.stage_prepare(state);
        Ok(cal)
    }

    fn stage_prepare(&self, state: &mut TunerState) {
        state.regs.apply(&FILTER_CAL_PREPARE);
        state.regs.apply(&PLL_PREPARE);
        state.regs.apply(&self.pll.register_writes(self.pll.div_exp));
    }

    fn fail(&mut self, state: &mut TunerState) -> nb::Result<Progress, Error> {
        self.attempts += 1;
        if self.attempts >= Self::MAX_ATTEMPTS {
            error!("r82xx: filter calibration failed");
            return Err(nb::Error::Other(Error::FilterCalibration));
        }
        warn!("r82xx: filter calibration retry");
        self.stage_prepare(state);
        self.step = FilterStep::Prepare;
        Ok(Progress::Pending)
    }

    /// Advance by one bus operation
    pub fn step<T: Transport + ?Sized>(
        &mut self,
        link: &mut Link<'_, T>,
        state: &mut TunerState,
    ) -> nb::Result<Progress, Error> {
        match self.step {
            FilterStep::Prepare => {
                link.commit(&mut state.regs)?;
                self.step = FilterStep::Lock;
            }
            FilterStep::Lock => {
                let mut status = [0u8; 3];
                link.status(&mut status)?;
                if !pll::is_locked(status[2]) {
                    return self.fail(state);
                }
                state.regs.apply(&[FILTER_CAL_TRIGGER]);
                self.step = FilterStep::Trigger;
            }
            FilterStep::Trigger => {
                link.commit(&mut state.regs)?;
                state.regs.apply(&FILTER_CAL_RELEASE);
                self.step = FilterStep::Release;
            }
            FilterStep::Release => {
                link.commit(&mut state.regs)?;
                self.step = FilterStep::Readback;
            }
            FilterStep::Readback => {
                let mut status = [0u8; 5];
                link.status(&mut status)?;
                let code = status[4] & 0x0f;
                if code == 0 || code == 0x0f {
                    return self.fail(state);
                }
                debug!("r82xx: filter cal code {=u8}", code);
                state.fil_cal_code = code;
                state.regs.apply(&filter_apply_writes(code));
                self.step = FilterStep::Apply;
            }
            FilterStep::Apply => {
                link.commit(&mut state.regs)?;
                return Ok(Progress::Done);
            }
        }
        Ok(Progress::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
enum ImrStep {
    Prepare,
    Tune(usize),
    Trial { point: usize, trial: usize },
    Measure { point: usize, trial: usize },
    Restore,
}

/// Image-rejection trim search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImrCal {
    step: ImrStep,
    readings: [u8; IMR_TRIAL],
}

impl ImrCal {
    /// Stage the calibration path setup
    pub fn start(state: &mut TunerState) -> Self {
        state.regs.apply(&IMR_PREPARE);
        Self {
            step: ImrStep::Prepare,
            readings: [DETECTOR_MAX; IMR_TRIAL],
        }
    }

    fn stage_tune(state: &mut TunerState, config: &TunerConfig, point: usize) -> Result<(), Error> {
        let freq = IMR_FREQS_HZ[point];
        let pll = pll::synthesize(freq, config.xtal_hz, config.chip)?;
        let range = bands::lookup(freq);
        state.regs.apply(&PLL_PREPARE);
        state.regs.apply(&pll.register_writes(pll.div_exp));
        state.regs.apply(&[
            RegWrite::new(0x17, range.open_d, 0x08),
            RegWrite::new(0x1a, range.rf_mux_ploy, 0xc3),
            RegWrite::full(0x1b, range.tf_c),
        ]);
        Ok(())
    }

    fn stage_trial(state: &mut TunerState, trial: usize) {
        let trim = ImrTrim::trial(trial);
        state.regs.write(0x08, trim.gain, 0x3f);
        state.regs.write(0x09, trim.phase, 0x3f);
    }

    fn evaluate(&self, state: &mut TunerState, point: usize) {
        let trim = match best_trial(&self.readings) {
            Some(best) if !is_degraded(&self.readings) => ImrTrim::trial(best),
            _ => {
                warn!("r82xx: imr band {=usize} degraded", point);
                state.health.calibration_degraded = true;
                ImrTrim::ZERO
            }
        };
        debug!("r82xx: imr band {=usize} trim {}", point, trim);
        state.imr[point] = trim;
    }

    /// Advance by one bus operation
    pub fn step<T: Transport + ?Sized>(
        &mut self,
        link: &mut Link<'_, T>,
        state: &mut TunerState,
        config: &TunerConfig,
    ) -> nb::Result<Progress, Error> {
        match self.step {
            ImrStep::Prepare => {
                link.commit(&mut state.regs)?;
                Self::stage_tune(state, config, 0).map_err(nb::Error::Other)?;
                self.step = ImrStep::Tune(0);
            }
            ImrStep::Tune(point) => {
                link.commit(&mut state.regs)?;
                Self::stage_trial(state, 0);
                self.step = ImrStep::Trial { point, trial: 0 };
            }
            ImrStep::Trial { point, trial } => {
                link.commit(&mut state.regs)?;
                self.step = ImrStep::Measure { point, trial };
            }
            ImrStep::Measure { point, trial } => {
                let mut status = [0u8; 2];
                link.status(&mut status)?;
                self.readings[trial] = status[1] & DETECTOR_MAX;

                if trial + 1 < IMR_TRIAL {
                    Self::stage_trial(state, trial + 1);
                    self.step = ImrStep::Trial {
                        point,
                        trial: trial + 1,
                    };
                } else {
                    self.evaluate(state, point);
                    if point + 1 < NUM_IMR {
                        Self::stage_tune(state, config, point + 1).map_err(nb::Error::Other)?;
                        self.step = ImrStep::Tune(point + 1);
                    } else {
                        state.regs.apply(&imr_restore_writes(state.fil_cal_code));
                        self.step = ImrStep::Restore;
                    }
                }
            }
            ImrStep::Restore => {
                link.commit(&mut state.regs)?;
                state.imr_done = true;
                return Ok(Progress::Done);
            }
        }
        Ok(Progress::Pending)
    }
}
