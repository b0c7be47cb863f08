//! Orchestrating State Machine
//!
//! Every command (init, retune, bandwidth change, gain change) becomes an
//! [`Operation`]: an ordered plan of stages plus the one stage machine that
//! is currently running. [`Tuner::step`] performs a single bounded unit of
//! work per call and never waits; pacing is left to the caller's poll loop.

use heapless::Vec;

use crate::config::{
    TunerConfig, CHECK_VAL, DEFAULT_FREQUENCY_HZ, IF_FREQ, INIT_ARRAY, REG_SHADOW_START, VER_NUM,
};
use crate::error::{Dispatch, Error};
use crate::hal::i2c::Transport;
use crate::tuner::bands;
use crate::tuner::bandwidth::{self, IfFilter};
use crate::tuner::calibration::{FilterCal, ImrCal, XtalCapCal};
use crate::tuner::gain;
use crate::tuner::pll;
use crate::tuner::registers::{Link, RegWrite, Registers};
use crate::tuner::state::TunerState;
use crate::tuner::tune::{FreqTune, ParamTune};
use crate::tuner::Progress;
use crate::types::{DeliverySystem, GainMode, Health, Phase, Step};

/// Longest plan a command can grow to
const PLAN_CAPACITY: usize = 16;

type Plan = Vec<Stage, PLAN_CAPACITY>;

const INIT_PLAN: [Stage; 10] = [
    Stage::Probe,
    Stage::LoadDefaults,
    Stage::XtalCap,
    Stage::FilterCal,
    Stage::Imr,
    Stage::BandSelect,
    Stage::FreqTune,
    Stage::ParamTune,
    Stage::RfGain,
    Stage::IfGain,
];

const RETUNE_PLAN: [Stage; 3] = [Stage::BandSelect, Stage::FreqTune, Stage::ParamTune];

const GAIN_PLAN: [Stage; 2] = [Stage::RfGain, Stage::IfGain];

/// TV-standard fields programmed right after the default load
const TV_STANDARD_WRITES: [RegWrite; 3] = [
    // VGA init
    RegWrite::new(0x0c, 0x00, 0x0f),
    // version, for the LT gain test
    RegWrite::new(0x13, VER_NUM, 0x3f),
    RegWrite::new(0x1d, 0x00, 0x38),
];

/// Power-down register values
pub const STANDBY_WRITES: [RegWrite; 11] = [
    RegWrite::full(0x06, 0xb1),
    RegWrite::full(0x05, 0x03),
    RegWrite::full(0x07, 0x3a),
    RegWrite::full(0x08, 0x40),
    RegWrite::full(0x09, 0xc0),
    RegWrite::full(0x0a, 0x36),
    RegWrite::full(0x0c, 0x35),
    RegWrite::full(0x0f, 0x68),
    RegWrite::full(0x11, 0x03),
    RegWrite::full(0x17, 0xf4),
    RegWrite::full(0x19, 0x0c),
];

/// Top-level command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Command {
    /// Probe, load defaults, calibrate and tune
    Init,
    /// Tune to a new frequency
    Retune,
    /// Change the IF filter
    Bandwidth,
    /// Apply a new gain mode
    Gain,
}

/// Unit of a command's plan
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Stage {
    /// Check the identification byte
    Probe,
    /// Power-on register load and TV-standard fields
    LoadDefaults,
    /// Crystal cap selection
    XtalCap,
    /// Filter self-calibration
    FilterCal,
    /// Image-rejection trim search
    Imr,
    /// Mux, tracking filter and crystal cap for the LO band
    BandSelect,
    /// PLL programming and lock check
    FreqTune,
    /// System-frequency parameters and AGC start-up
    ParamTune,
    /// LNA and mixer gain
    RfGain,
    /// VGA gain and gain readback
    IfGain,
    /// IF filter selection
    BandwidthSet,
    /// Filter calibration code after a bandwidth change
    FilterRefresh,
}

/// Request accepted by [`Tuner::dispatch`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "embedded", derive(defmt::Format))]
pub enum Request {
    /// Restart init
    Init,
    /// Tune to an RF frequency in Hz
    SetFrequency(u32),
    /// Change the IF filter
    SetBandwidth {
        /// Requested bandwidth in Hz, 0 to follow the sample rate
        bw_hz: u32,
        /// Sample rate in Hz
        rate_hz: u32,
    },
    /// Change the RF gain mode
    SetGain(GainMode),
    /// Set a demodulator-style IF gain stage (no R82xx equivalent)
    SetIfGain {
        /// Stage index
        stage: u8,
        /// Gain in tenths of a dB
        gain: i32,
    },
    /// Power down
    Standby,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum IfGainStep {
    Vga,
    Readback,
}

/// State of the stage that is currently running
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Machine {
    Idle,
    Probe,
    Commit,
    XtalCap(XtalCapCal),
    FilterCal(FilterCal),
    Imr(ImrCal),
    FreqTune(FreqTune),
    ParamTune(ParamTune),
    IfGain(IfGainStep),
}

impl Machine {
    /// Stage the writes a stage starts with
    fn enter(
        stage: Stage,
        target_hz: u32,
        filter: Option<IfFilter>,
        state: &mut TunerState,
        config: &TunerConfig,
    ) -> Result<Self, Error> {
        let machine = match stage {
            Stage::Probe => Self::Probe,
            Stage::LoadDefaults => {
                state.regs.load(REG_SHADOW_START, &INIT_ARRAY);
                state.regs.apply(&TV_STANDARD_WRITES);
                Self::Commit
            }
            Stage::XtalCap => Self::XtalCap(XtalCapCal::start(state)),
            Stage::FilterCal => Self::FilterCal(FilterCal::start(state, config)?),
            Stage::Imr => Self::Imr(ImrCal::start(state)),
            Stage::BandSelect => {
                let lo = lo_for(target_hz, state)?;
                let writes = bands::lookup(lo).select_writes(state.xtal_cap, &state.imr);
                state.regs.apply(&writes);
                Self::Commit
            }
            Stage::FreqTune => {
                let lo = lo_for(target_hz, state)?;
                Self::FreqTune(FreqTune::start(state, config, lo)?)
            }
            Stage::ParamTune => Self::ParamTune(ParamTune::start(state, config, target_hz)),
            Stage::RfGain => {
                let writes = state.gain.rf_writes();
                state.regs.apply(&writes);
                Self::Commit
            }
            Stage::IfGain => {
                let vga = state.gain.vga_write();
                state.regs.apply(&[vga]);
                Self::IfGain(IfGainStep::Vga)
            }
            Stage::BandwidthSet => {
                let filter = filter.ok_or(Error::InvalidArgument)?;
                state.regs.apply(&filter.writes());
                Self::Commit
            }
            Stage::FilterRefresh => {
                state.regs.apply(&[bandwidth::refresh_write(state.fil_cal_code)]);
                Self::Commit
            }
        };
        Ok(machine)
    }

    fn step<T: Transport + ?Sized>(
        &mut self,
        link: &mut Link<'_, T>,
        state: &mut TunerState,
        config: &TunerConfig,
    ) -> nb::Result<Progress, Error> {
        match self {
            Self::Idle => Ok(Progress::Done),
            Self::Probe => {
                let found = link.chip_id()?;
                if found != CHECK_VAL {
                    return Err(nb::Error::Other(Error::ChipIdMismatch { found }));
                }
                debug!("r82xx: chip found");
                Ok(Progress::Done)
            }
            Self::Commit => {
                link.commit(&mut state.regs)?;
                Ok(Progress::Done)
            }
            Self::XtalCap(cal) => cal.step(link, state),
            Self::FilterCal(cal) => cal.step(link, state),
            Self::Imr(cal) => cal.step(link, state, config),
            Self::FreqTune(tune) => tune.step(link, state, config),
            Self::ParamTune(tune) => tune.step(link, state),
            Self::IfGain(step) => match *step {
                IfGainStep::Vga => {
                    link.commit(&mut state.regs)?;
                    *step = IfGainStep::Readback;
                    Ok(Progress::Pending)
                }
                IfGainStep::Readback => {
                    let mut status = [0u8; 4];
                    link.status(&mut status)?;
                    let measured = state.gain.record_readback(status[3]);
                    trace!("r82xx: gain readback {=i32}", measured);
                    Ok(Progress::Done)
                }
            },
        }
    }
}

fn lo_for(target_hz: u32, state: &TunerState) -> Result<u32, Error> {
    target_hz
        .checked_add(state.int_freq_hz)
        .ok_or(Error::OutOfRange)
}

/// One in-flight command
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    command: Command,
    phase: Phase,
    plan: Plan,
    index: usize,
    machine: Machine,
    /// RF frequency the command tunes to
    target_hz: u32,
    /// Filter chosen by a bandwidth command
    filter: Option<IfFilter>,
    /// Residual of the last PLL solution
    corr: i32,
}

impl Operation {
    /// Command being run
    #[must_use]
    pub const fn command(&self) -> Command {
        self.command
    }

    /// Top-level phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Stage currently running, if any
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        if self.phase == Phase::Complete {
            return None;
        }
        self.plan.get(self.index).copied()
    }

    /// Position in the plan
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Stages of this command
    #[must_use]
    pub fn plan(&self) -> &[Stage] {
        &self.plan
    }

    /// Realized minus requested LO of the last frequency tune
    #[must_use]
    pub const fn corr(&self) -> i32 {
        self.corr
    }

    fn is_running(&self) -> bool {
        self.phase != Phase::Complete
    }

    /// Append a gain pass unless one is still ahead
    fn schedule_gain(&mut self) -> Result<(), Error> {
        if self.plan[self.index + 1..].contains(&Stage::RfGain) {
            return Ok(());
        }
        if self.plan.len() + GAIN_PLAN.len() > PLAN_CAPACITY {
            return Err(Error::Busy);
        }
        self.plan.extend_from_slice(&GAIN_PLAN).map_err(|()| Error::Busy)
    }

    fn enter_current(&mut self, state: &mut TunerState, config: &TunerConfig) -> Result<(), Error> {
        if let Some(&stage) = self.plan.get(self.index) {
            trace!("r82xx: stage {}", stage);
            self.machine = Machine::enter(stage, self.target_hz, self.filter, state, config)?;
        }
        Ok(())
    }

    /// Effects of a finished stage that depend on its commit being acked
    fn finish_stage(&mut self, state: &mut TunerState) {
        match (self.plan.get(self.index), self.machine) {
            (Some(Stage::FreqTune), Machine::FreqTune(tune)) => {
                self.corr = tune.pll().corr;
            }
            (Some(Stage::BandwidthSet), _) => {
                if let Some(filter) = self.filter {
                    state.int_freq_hz = filter.if_hz;
                    state.bw_hz = filter.real_bw_hz;
                }
            }
            _ => {}
        }
    }

    fn advance(&mut self, state: &mut TunerState, config: &TunerConfig) -> Step {
        self.finish_stage(state);
        self.index += 1;
        if self.index >= self.plan.len() {
            self.complete(state);
            return Step::Complete;
        }
        self.phase = Phase::Inc;
        match self.enter_current(state, config) {
            Ok(()) => Step::Inc,
            Err(err) => {
                self.abort(state, err);
                Step::Complete
            }
        }
    }

    fn complete(&mut self, state: &mut TunerState) {
        self.phase = Phase::Complete;
        self.machine = Machine::Idle;
        match self.command {
            Command::Init => {
                state.init_done = true;
                state.freq_hz = Some(self.target_hz);
            }
            Command::Retune => state.freq_hz = Some(self.target_hz),
            Command::Bandwidth | Command::Gain => {}
        }
        info!("r82xx: {} complete ({})", self.command, state.health);
    }

    fn abort(&mut self, state: &mut TunerState, err: Error) {
        error!("r82xx: {} aborted: {}", self.command, err);
        self.phase = Phase::Complete;
        self.machine = Machine::Idle;
        state.regs.discard();
        record_error(state, err);
    }
}

fn record_error(state: &mut TunerState, err: Error) {
    state.health.last_error = Some(err);
    match err {
        Error::BusFault(bus) => state.health.bus_fault = Some(bus),
        err if err.is_fatal() => {
            state.health.fatal = Some(err);
            state.init_done = false;
        }
        _ => {}
    }
}

/// R82xx tuner driver
///
/// Owns the transport, the configuration and the single [`TunerState`].
/// Commands are accepted only while no other command is running and are
/// then driven to completion by repeated [`Tuner::step`] calls.
pub struct Tuner<T> {
    config: TunerConfig,
    bus: T,
    state: TunerState,
    op: Option<Operation>,
}

impl<T: Transport> Tuner<T> {
    /// Validate the configuration and begin init
    pub fn new(config: TunerConfig, bus: T) -> Result<Self, Error> {
        config.validate()?;
        let mut tuner = Self {
            config,
            bus,
            state: TunerState::new(),
            op: None,
        };
        tuner.init()?;
        Ok(tuner)
    }

    /// Begin init (again): probe, defaults, calibration, tune, gain
    ///
    /// Tunes to the last requested frequency, or
    /// [`DEFAULT_FREQUENCY_HZ`] if none was set yet.
    pub fn init(&mut self) -> Result<(), Error> {
        self.ensure_idle()?;
        let target = self.state.freq_hz.unwrap_or(DEFAULT_FREQUENCY_HZ);
        let lo = target.checked_add(IF_FREQ).ok_or(Error::OutOfRange)?;
        pll::synthesize(lo, self.config.xtal_hz, self.config.chip)?;

        self.state.reset_calibration();
        self.begin(Command::Init, &INIT_PLAN, target, None)
    }

    /// Tune to `freq_hz`
    ///
    /// Rejected with no side effect if busy, before init, or if the LO is
    /// outside the synthesizer range.
    pub fn set_frequency(&mut self, freq_hz: u32) -> Result<(), Error> {
        self.ensure_ready()?;
        let lo = freq_hz
            .checked_add(self.state.int_freq_hz)
            .ok_or(Error::OutOfRange)?;
        pll::synthesize(lo, self.config.xtal_hz, self.config.chip)?;
        self.begin(Command::Retune, &RETUNE_PLAN, freq_hz, None)
    }

    /// Select the IF filter for `bw_hz` (or `rate_hz` when `bw_hz` is 0)
    ///
    /// If the IF moves while tuned, the LO is retuned in the same command.
    pub fn set_bandwidth(&mut self, bw_hz: u32, rate_hz: u32) -> Result<(), Error> {
        self.ensure_ready()?;
        let filter = IfFilter::select(bw_hz, rate_hz)?;

        let mut plan = Plan::new();
        plan.extend_from_slice(&[Stage::BandwidthSet, Stage::FilterRefresh])
            .map_err(|()| Error::Busy)?;
        let target = self.state.freq_hz.unwrap_or(0);
        if self.state.freq_hz.is_some() && filter.if_hz != self.state.int_freq_hz {
            let lo = target.checked_add(filter.if_hz).ok_or(Error::OutOfRange)?;
            pll::synthesize(lo, self.config.xtal_hz, self.config.chip)?;
            plan.extend_from_slice(&[Stage::BandSelect, Stage::FreqTune])
                .map_err(|()| Error::Busy)?;
        }
        self.begin(Command::Bandwidth, &plan, target, Some(filter))
    }

    /// Change the gain mode
    ///
    /// An out-of-range manual level is rejected with no side effect. A
    /// repeated mode is a no-op. While a command runs, a gain pass is
    /// appended to it; before init the mode is only recorded.
    pub fn set_gain(&mut self, mode: GainMode) -> Result<(), Error> {
        let mode = gain::validate(mode)?;
        if mode == self.state.gain.mode() {
            return Ok(());
        }

        let running = self.is_busy();
        if running {
            if let Some(op) = self.op.as_mut() {
                op.schedule_gain()?;
            }
        }
        self.state.gain.set_mode(mode)?;

        if !running && self.state.init_done {
            let target = self.state.freq_hz.unwrap_or(0);
            self.begin(Command::Gain, &GAIN_PLAN, target, None)?;
        }
        Ok(())
    }

    /// Select the delivery system used by the next parameter tune
    pub fn set_delivery_system(&mut self, delsys: DeliverySystem) -> Result<(), Error> {
        self.ensure_idle()?;
        self.state.delsys = delsys;
        Ok(())
    }

    /// Power down
    ///
    /// Terminates any running command at once and drops its staged writes.
    /// If init had completed, the power-down values are committed (a
    /// blocked bus leaves them for [`Tuner::flush`]). The next init
    /// recalibrates from scratch.
    pub fn standby(&mut self) {
        if let Some(op) = self.op.as_mut() {
            if op.is_running() {
                warn!("r82xx: {} cancelled by standby", op.command);
            }
            op.phase = Phase::Complete;
            op.machine = Machine::Idle;
        }
        self.state.regs.discard();

        if self.state.init_done {
            self.state.regs.apply(&STANDBY_WRITES);
            let mut link = Link::new(&mut self.bus, &self.config);
            match link.commit(&mut self.state.regs) {
                Ok(()) => info!("r82xx: standby"),
                Err(nb::Error::WouldBlock) => debug!("r82xx: standby writes pending"),
                Err(nb::Error::Other(err)) => record_error(&mut self.state, err),
            }
        }
        self.state.init_done = false;
        self.state.health.locked = false;
    }

    /// Commit writes left staged outside a command
    pub fn flush(&mut self) -> nb::Result<(), Error> {
        if self.is_busy() {
            return Err(nb::Error::Other(Error::Busy));
        }
        let mut link = Link::new(&mut self.bus, &self.config);
        let result = link.commit(&mut self.state.regs);
        if let Err(nb::Error::Other(err)) = result {
            record_error(&mut self.state, err);
        }
        result
    }

    /// Run one unit of work of the current command
    pub fn step(&mut self) -> Step {
        let Self {
            config,
            bus,
            state,
            op,
        } = self;
        let Some(op) = op.as_mut() else {
            return Step::Complete;
        };
        if !op.is_running() {
            return Step::Complete;
        }

        let mut link = Link::new(bus, config);
        match op.machine.step(&mut link, state, config) {
            Err(nb::Error::WouldBlock) | Ok(Progress::Pending) => Step::Run,
            Ok(Progress::Done) => op.advance(state, config),
            Err(nb::Error::Other(err)) => {
                op.abort(state, err);
                Step::Complete
            }
        }
    }

    /// Route a request to the matching command
    pub fn dispatch(&mut self, request: Request) -> Dispatch {
        match request {
            Request::Init => self.init().into(),
            Request::SetFrequency(hz) => self.set_frequency(hz).into(),
            Request::SetBandwidth { bw_hz, rate_hz } => self.set_bandwidth(bw_hz, rate_hz).into(),
            Request::SetGain(mode) => self.set_gain(mode).into(),
            Request::SetIfGain { .. } => Dispatch::Unhandled,
            Request::Standby => {
                self.standby();
                Dispatch::Ok
            }
        }
    }

    fn begin(
        &mut self,
        command: Command,
        stages: &[Stage],
        target_hz: u32,
        filter: Option<IfFilter>,
    ) -> Result<(), Error> {
        let plan = Plan::from_slice(stages).map_err(|()| Error::InvalidArgument)?;
        self.state.health.bus_fault = None;
        self.state.health.last_error = None;

        let mut op = Operation {
            command,
            phase: Phase::Run,
            plan,
            index: 0,
            machine: Machine::Idle,
            target_hz,
            filter,
            corr: 0,
        };
        debug!("r82xx: {} accepted", command);
        if let Err(err) = op.enter_current(&mut self.state, &self.config) {
            op.abort(&mut self.state, err);
        }
        self.op = Some(op);
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), Error> {
        if self.is_busy() {
            return Err(Error::Busy);
        }
        Ok(())
    }

    fn ensure_ready(&self) -> Result<(), Error> {
        self.ensure_idle()?;
        if !self.state.init_done {
            return Err(Error::NotReady);
        }
        Ok(())
    }
}

impl<T> Tuner<T> {
    /// Whether a command is running
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.op.as_ref().is_some_and(Operation::is_running)
    }

    /// Top-level phase (`Complete` when idle)
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.op.as_ref().map_or(Phase::Complete, Operation::phase)
    }

    /// Current or last command
    #[must_use]
    pub fn operation(&self) -> Option<&Operation> {
        self.op.as_ref()
    }

    /// Stage currently running
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        self.op.as_ref().and_then(Operation::stage)
    }

    /// Register shadow
    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.state.regs
    }

    /// Chip state
    #[must_use]
    pub const fn state(&self) -> &TunerState {
        &self.state
    }

    /// Sticky health flags
    #[must_use]
    pub const fn health(&self) -> Health {
        self.state.health
    }

    /// Configuration the tuner was built with
    #[must_use]
    pub const fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Demodulator and tuner reference crystals, in Hz
    #[must_use]
    pub const fn crystal_frequencies(&self) -> (u32, u32) {
        (self.config.rtl_xtal_hz, self.config.xtal_hz)
    }

    /// Detach and return the transport
    pub fn release(self) -> T {
        self.bus
    }
}
