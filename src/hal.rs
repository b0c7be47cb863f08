//! Hardware Abstraction Layer
//!
//! The driver core talks to the tuner only through [`i2c::Transport`].
//! Hosts that reach the chip through a USB bridge implement the trait
//! themselves; boards with a direct I2C connection use
//! [`i2c::BlockingI2c`].

pub mod i2c;
