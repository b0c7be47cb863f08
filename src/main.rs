//! R82xx Tuner Demo Application
//!
//! Entry point for an STM32G474 board with an R820T wired to I2C1.
//! Runs init, tunes to the 1090 MHz ADS-B channel and reports health.

#![no_std]
#![no_main]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_stm32::i2c::I2c;
use embassy_stm32::time::Hertz;
use {defmt_rtt as _, panic_probe as _};

use r82xx_tuner::prelude::*;

/// ADS-B downlink frequency
const ADSB_FREQ_HZ: u32 = 1_090_000_000;

/// ADS-B sample rate used to size the IF filter
const ADSB_RATE_HZ: u32 = 2_400_000;

/// Poll interval while a command is waiting on the chip
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("R82xx tuner demo v{}", env!("CARGO_PKG_VERSION"));

    let p = embassy_stm32::init(embassy_stm32::Config::default());

    let led = Output::new(p.PA5, Level::Low, Speed::Low);
    spawner.spawn(heartbeat_task(led)).unwrap();

    // PB8 = SCL, PB9 = SDA for I2C1 on STM32G474
    let i2c = I2c::new_blocking(p.I2C1, p.PB8, p.PB9, Hertz(400_000), Default::default());
    info!("I2C1 initialized at 400kHz");

    let mut tuner = match Tuner::new(TunerConfig::r820t(), BlockingI2c::new(i2c)) {
        Ok(tuner) => tuner,
        Err(err) => {
            error!("tuner config rejected: {}", err);
            return;
        }
    };

    drive(&mut tuner).await;
    info!("init done: {}", tuner.health());

    if let Err(err) = tuner.set_bandwidth(0, ADSB_RATE_HZ) {
        warn!("bandwidth rejected: {}", err);
    }
    drive(&mut tuner).await;

    match tuner.set_frequency(ADSB_FREQ_HZ) {
        Ok(()) => {
            drive(&mut tuner).await;
            let (rtl_xtal, tuner_xtal) = tuner.crystal_frequencies();
            info!(
                "tuned: lo={} Hz, if={} Hz, xtal={}/{} Hz, {}",
                tuner.state().lo_frequency(),
                tuner.state().int_freq(),
                rtl_xtal,
                tuner_xtal,
                tuner.health()
            );
        }
        Err(err) => error!("tune rejected: {}", err),
    }

    loop {
        Timer::after(Duration::from_secs(10)).await;
        info!("{}", tuner.health());
    }
}

/// Step the current command to completion, yielding while the bus is busy
async fn drive<T: Transport>(tuner: &mut Tuner<T>) {
    loop {
        match tuner.step() {
            Step::Run => Timer::after(POLL_INTERVAL).await,
            Step::Inc => {}
            Step::Complete => break,
        }
    }
}

/// Heartbeat task - blinks LED to show system is running
#[embassy_executor::task]
async fn heartbeat_task(mut led: Output<'static>) {
    loop {
        led.set_high();
        Timer::after(Duration::from_millis(100)).await;
        led.set_low();
        Timer::after(Duration::from_millis(900)).await;
    }
}
