//! Frequency and system-parameter tuning sequences

use crate::config::TunerConfig;
use crate::error::Error;
use crate::hal::i2c::Transport;
use crate::tuner::pll::{self, PllParams, PLL_PREPARE};
use crate::tuner::registers::{Link, RegWrite};
use crate::tuner::state::TunerState;
use crate::tuner::Progress;
use crate::types::{Chip, DeliverySystem};

/// DVB-T channels that need the reduced mixer TOP and charge pump current
const DVBT_SPECIAL_HZ: [u32; 3] = [506_000_000, 666_000_000, 818_000_000];

/// R828D input switch point (Cable1 below, Air-In above)
const R828D_AIR_IN_ABOVE_HZ: u32 = 345_000_000;

/// Per-standard front-end parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SysFreq {
    /// Mixer TOP, register 0x1c
    pub mixer_top: u8,
    /// LNA TOP, register 0x1d
    pub lna_top: u8,
    /// LNA threshold, register 0x0d
    pub lna_vth_l: u8,
    /// Mixer threshold, register 0x0e
    pub mixer_vth_l: u8,
    /// Cable1 / Air-In selection, register 0x05 bits 6:5
    pub air_cable1_in: u8,
    /// Cable2 input, register 0x06 bit 3
    pub cable2_in: u8,
    /// Pre-detector enable, register 0x06 bit 6
    pub pre_dect: u8,
    /// LNA discharge current, register 0x1e
    pub lna_discharge: u8,
    /// Charge pump current, register 0x11
    pub cp_cur: u8,
    /// Divider buffer current, register 0x17
    pub div_buf_cur: u8,
    /// Filter current, register 0x0a
    pub filter_cur: u8,
}

impl SysFreq {
    /// Parameters for a delivery system at an RF frequency
    #[must_use]
    pub fn select(delsys: DeliverySystem, freq_hz: u32, chip: Chip) -> Self {
        let mut params = Self {
            mixer_top: 0x24,
            lna_top: 0xe5,
            lna_vth_l: 0x53,
            mixer_vth_l: 0x75,
            air_cable1_in: 0x00,
            cable2_in: 0x00,
            pre_dect: 0x40,
            lna_discharge: 14,
            cp_cur: 0x38,
            div_buf_cur: 0x30,
            filter_cur: 0x40,
        };

        match delsys {
            DeliverySystem::Dvbt if DVBT_SPECIAL_HZ.contains(&freq_hz) => {
                params.mixer_top = 0x14;
                params.cp_cur = 0x28;
                params.div_buf_cur = 0x20;
            }
            DeliverySystem::Isdbt => params.lna_vth_l = 0x75,
            _ => {}
        }

        if chip.has_input_switch() && freq_hz <= R828D_AIR_IN_ABOVE_HZ {
            params.air_cable1_in = 0x60;
        }

        params
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
enum FreqStep {
    Prepare,
    FineTune,
    Program,
    Lock { retried: bool },
    Boost,
    Autotune,
}

/// PLL programming with fine-tune correction and one lock retry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FreqTune {
    step: FreqStep,
    pll: PllParams,
}

impl FreqTune {
    /// Solve the PLL for `lo_hz` and stage the preparation writes
    pub fn start(state: &mut TunerState, config: &TunerConfig, lo_hz: u32) -> Result<Self, Error> {
        let pll = pll::synthesize(lo_hz, config.xtal_hz, config.chip)?;
        state.regs.apply(&PLL_PREPARE);
        Ok(Self {
            step: FreqStep::Prepare,
            pll,
        })
    }

    /// Synthesizer solution being programmed
    #[must_use]
    pub const fn pll(&self) -> PllParams {
        self.pll
    }

    /// Advance by one bus operation
    pub fn step<T: Transport + ?Sized>(
        &mut self,
        link: &mut Link<'_, T>,
        state: &mut TunerState,
        config: &TunerConfig,
    ) -> nb::Result<Progress, Error> {
        match self.step {
            FreqStep::Prepare => {
                link.commit(&mut state.regs)?;
                self.step = FreqStep::FineTune;
            }
            FreqStep::FineTune => {
                let mut status = [0u8; 5];
                link.status(&mut status)?;
                let div_num = pll::adjust_div(self.pll.div_exp, status[4], config.chip);
                state.regs.apply(&self.pll.register_writes(div_num));
                self.step = FreqStep::Program;
            }
            FreqStep::Program => {
                link.commit(&mut state.regs)?;
                state.pll = Some(self.pll);
                self.step = FreqStep::Lock { retried: false };
            }
            FreqStep::Lock { retried } => {
                let mut status = [0u8; 3];
                link.status(&mut status)?;
                if pll::is_locked(status[2]) {
                    // autotune 8 kHz once locked
                    state.regs.write(0x1a, 0x08, 0x08);
                    self.step = FreqStep::Autotune;
                } else if !retried {
                    // raise VCO current and look again
                    state.regs.write(0x12, 0x60, 0xe0);
                    self.step = FreqStep::Boost;
                } else {
                    warn!("r82xx: pll not locked at {=u32} Hz", self.pll.lo_hz);
                    state.health.locked = false;
                    return Ok(Progress::Done);
                }
            }
            FreqStep::Boost => {
                link.commit(&mut state.regs)?;
                self.step = FreqStep::Lock { retried: true };
            }
            FreqStep::Autotune => {
                link.commit(&mut state.regs)?;
                state.health.locked = true;
                return Ok(Progress::Done);
            }
        }
        Ok(Progress::Pending)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
enum ParamStep {
    Setup,
    AgcFast,
    AgcSlow,
}

/// System-frequency parameters and the AGC start-up sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParamTune {
    step: ParamStep,
    params: SysFreq,
}

impl ParamTune {
    /// Stage the parameter block for `freq_hz`
    pub fn start(state: &mut TunerState, config: &TunerConfig, freq_hz: u32) -> Self {
        let params = SysFreq::select(state.delsys, freq_hz, config.chip);
        let regs = &mut state.regs;

        if config.use_predetect {
            regs.write(0x06, params.pre_dect, 0x40);
        }
        regs.apply(&[
            RegWrite::new(0x1d, params.lna_top, 0xc7),
            RegWrite::new(0x1c, params.mixer_top, 0xf8),
            RegWrite::full(0x0d, params.lna_vth_l),
            RegWrite::full(0x0e, params.mixer_vth_l),
            RegWrite::new(0x05, params.air_cable1_in, 0x60),
            RegWrite::new(0x06, params.cable2_in, 0x08),
            RegWrite::new(0x11, params.cp_cur, 0x38),
            RegWrite::new(0x17, params.div_buf_cur, 0x30),
            RegWrite::new(0x0a, params.filter_cur, 0x60),
        ]);

        Self {
            step: ParamStep::Setup,
            params,
        }
    }

    /// Advance by one commit
    pub fn step<T: Transport + ?Sized>(
        &mut self,
        link: &mut Link<'_, T>,
        state: &mut TunerState,
    ) -> nb::Result<Progress, Error> {
        link.commit(&mut state.regs)?;
        match self.step {
            ParamStep::Setup => {
                state.input = self.params.air_cable1_in;
                state.regs.apply(&[
                    // LNA TOP lowest, normal mode, pre-detector off
                    RegWrite::new(0x1d, 0x00, 0x38),
                    RegWrite::new(0x1c, 0x00, 0x04),
                    RegWrite::new(0x06, 0x00, 0x40),
                    // AGC clock 250 Hz
                    RegWrite::new(0x1a, 0x30, 0x30),
                ]);
                self.step = ParamStep::AgcFast;
                Ok(Progress::Pending)
            }
            ParamStep::AgcFast => {
                state.regs.apply(&[
                    // LNA TOP 3, discharge mode
                    RegWrite::new(0x1d, 0x18, 0x38),
                    RegWrite::new(0x1c, self.params.mixer_top, 0x04),
                    RegWrite::new(0x1e, self.params.lna_discharge, 0x1f),
                    // AGC clock 60 Hz
                    RegWrite::new(0x1a, 0x20, 0x30),
                ]);
                self.step = ParamStep::AgcSlow;
                Ok(Progress::Pending)
            }
            ParamStep::AgcSlow => Ok(Progress::Done),
        }
    }
}
