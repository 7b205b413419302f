//! WS2811 LED strip driver for the Raspberry Pi
//!
//! `rpi-ws2811` drives WS2811 / WS2812 strips from Linux userspace. It
//! shapes the LED waveform with the PWM controller, running as a serializer,
//! and feeds the PWM FIFO from a DMA engine. Once a frame starts, the CPU is
//! free until the next one.
//!
//! The driver provides
//!
//! - a [`Ws2811`] device with an `initialize` / `render` / `wait` / `finalize`
//!   lifecycle, driving up to two strips, one per PWM channel
//! - the waveform encoder, the DMA descriptor chain builder, and the address
//!   translation they rely on
//! - a [`Platform`] seam for pinned memory, register mappings and page frame
//!   lookups, implemented by [`Linux`]
//!
//! # Privileges
//!
//! Mapping the peripherals needs `/dev/mem`, and resolving bus addresses
//! needs `CAP_SYS_ADMIN`. Run as root.
//!
//! # Example
//!
//! ```no_run
//! use rpi_ws2811::{rgb, Config, Strip, Ws2811};
//!
//! let mut config = Config::default();
//! config.strips[0] = Strip::new(18, 60);
//!
//! let mut leds = Ws2811::new(config);
//! leds.initialize()?;
//! leds.strip_mut(0).leds_mut().fill(rgb(0x20, 0, 0));
//! leds.render()?;
//! leds.wait()?;
//! # Ok::<(), rpi_ws2811::Error>(())
//! ```
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0) ([LICENSE-APACHE](./LICENSE-APACHE))
//! - [MIT License](http://opensource.org/licenses/MIT) ([LICENSE-MIT](./LICENSE-MIT))
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

pub mod bus;
mod cache;
pub mod chain;
mod channel;
mod clock;
mod device;
pub mod encoder;
mod error;
mod gpio;
pub mod mapper;
pub mod pages;
pub mod platform;
mod poll;
mod ral;
pub mod soc;
mod strip;

#[cfg(test)]
mod sim;

pub use bus::BusAddress;
pub use clock::divisor;
pub use device::{Config, State, Ws2811};
pub use encoder::{bit_count, pwm_byte_count};
pub use error::{DmaStatus, Error};
pub use gpio::{alt_function, Function};
pub use platform::{DmaMemory, Linux, Platform, RegisterMapping};
pub use soc::Soc;
pub use strip::{rgb, Strip, CHANNELS};

/// A driver result
pub type Result<T> = core::result::Result<T, Error>;
