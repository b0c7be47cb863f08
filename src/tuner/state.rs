//! Tuner State
//!
//! The single owned record of chip state: register shadow, calibration
//! results and the tags the sequences consult. The orchestrator hands it to
//! one stage at a time; nothing else holds a copy.

use crate::config::{DEFAULT_BANDWIDTH_HZ, IF_FREQ, NUM_IMR};
use crate::tuner::calibration::ImrTrim;
use crate::tuner::gain::GainController;
use crate::tuner::pll::PllParams;
use crate::tuner::registers::Registers;
use crate::types::{DeliverySystem, Health, TunerType, XtalCap};

/// Chip state owned by one [`crate::Tuner`]
#[derive(Clone, Debug)]
pub struct TunerState {
    /// Register shadow and staged writes
    pub(crate) regs: Registers,
    /// Selected crystal load capacitance
    pub(crate) xtal_cap: XtalCap,
    /// Requested RF frequency, once a tune has completed
    pub(crate) freq_hz: Option<u32>,
    /// Last synthesizer solution
    pub(crate) pll: Option<PllParams>,
    /// Intermediate frequency
    pub(crate) int_freq_hz: u32,
    /// IF filter bandwidth
    pub(crate) bw_hz: u32,
    /// Filter calibration code (0..=14)
    pub(crate) fil_cal_code: u8,
    /// Register 0x05 input selection bits
    pub(crate) input: u8,
    /// Calibration and defaults done
    pub(crate) init_done: bool,
    /// Image-rejection trims per band
    pub(crate) imr: [ImrTrim; NUM_IMR],
    /// Image-rejection calibration ran
    pub(crate) imr_done: bool,
    /// Standard the system parameters are chosen for
    pub(crate) delsys: DeliverySystem,
    /// Application type
    pub(crate) tuner_type: TunerType,
    /// RF and IF gain
    pub(crate) gain: GainController,
    /// Sticky health flags
    pub(crate) health: Health,
}

impl TunerState {
    /// Fresh state before the first init
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regs: Registers::new(),
            xtal_cap: XtalCap::High0p,
            freq_hz: None,
            pll: None,
            int_freq_hz: IF_FREQ,
            bw_hz: DEFAULT_BANDWIDTH_HZ,
            fil_cal_code: 0,
            input: 0,
            init_done: false,
            imr: [ImrTrim::ZERO; NUM_IMR],
            imr_done: false,
            delsys: DeliverySystem::Dvbt,
            tuner_type: TunerType::DigitalTv,
            gain: GainController::new(),
            health: Health {
                bus_fault: None,
                fatal: None,
                calibration_degraded: false,
                locked: false,
                last_error: None,
            },
        }
    }

    /// Forget calibration results before a new init
    ///
    /// Gain mode, delivery system and the last requested frequency survive.
    pub(crate) fn reset_calibration(&mut self) {
        self.xtal_cap = XtalCap::High0p;
        self.pll = None;
        self.int_freq_hz = IF_FREQ;
        self.bw_hz = DEFAULT_BANDWIDTH_HZ;
        self.fil_cal_code = 0;
        self.imr = [ImrTrim::ZERO; NUM_IMR];
        self.imr_done = false;
        self.init_done = false;
        self.health = Health::default();
    }

    /// Register shadow
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Selected crystal cap
    #[must_use]
    pub const fn xtal_cap(&self) -> XtalCap {
        self.xtal_cap
    }

    /// Requested RF frequency of the last completed tune
    #[must_use]
    pub const fn frequency(&self) -> Option<u32> {
        self.freq_hz
    }

    /// Realized LO of the last tune
    #[must_use]
    pub fn lo_frequency(&self) -> Option<u32> {
        self.pll.map(|p| p.lo_hz)
    }

    /// Synthesizer solution of the last tune
    #[must_use]
    pub const fn pll(&self) -> Option<PllParams> {
        self.pll
    }

    /// Intermediate frequency
    #[must_use]
    pub const fn int_freq(&self) -> u32 {
        self.int_freq_hz
    }

    /// IF filter bandwidth
    #[must_use]
    pub const fn bandwidth(&self) -> u32 {
        self.bw_hz
    }

    /// Filter calibration code
    #[must_use]
    pub const fn fil_cal_code(&self) -> u8 {
        self.fil_cal_code
    }

    /// Register 0x05 input selection bits
    #[must_use]
    pub const fn input(&self) -> u8 {
        self.input
    }

    /// Whether init completed
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.init_done
    }

    /// Image-rejection trims
    #[must_use]
    pub const fn imr_trims(&self) -> &[ImrTrim; NUM_IMR] {
        &self.imr
    }

    /// Whether image-rejection calibration ran
    #[must_use]
    pub const fn imr_done(&self) -> bool {
        self.imr_done
    }

    /// Delivery system
    #[must_use]
    pub const fn delivery_system(&self) -> DeliverySystem {
        self.delsys
    }

    /// Application type
    #[must_use]
    pub const fn tuner_type(&self) -> TunerType {
        self.tuner_type
    }

    /// Gain controller
    #[must_use]
    pub const fn gain(&self) -> &GainController {
        &self.gain
    }

    /// Health flags
    #[must_use]
    pub const fn health(&self) -> Health {
        self.health
    }
}

impl Default for TunerState {
    fn default() -> Self {
        Self::new()
    }
}
