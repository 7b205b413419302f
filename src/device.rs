//! The WS2811 device and its lifecycle

use core::slice;
use std::time::Duration;

use crate::{
    bus::BusAddress,
    chain::{self, Chain, MAX_PAGES},
    channel::Channel,
    clock, encoder, gpio,
    mapper::{self, RegisterHandles},
    platform::{DmaMemory, Linux, Platform},
    poll::{self, SETTLE},
    soc::Soc,
    strip::{Strip, CHANNELS},
    Error, Result,
};

/// Where a device is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Created, or a call to `initialize` failed
    Uninitialized,
    /// Hardware is set up, and no transfer is in flight
    Ready,
    /// A frame may still be going out
    Rendering,
    /// Everything is released. The device can't be used again
    Finalized,
}

/// Device configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// LED data rate, in bits per second
    pub frequency: u32,
    /// DMA engine that feeds the PWM FIFO
    pub dma: u8,
    /// Peripheral addresses and clock of the board
    pub soc: Soc,
    /// Longest time to wait for the hardware to change state
    pub timeout: Duration,
    /// One strip per PWM channel
    pub strips: [Strip; CHANNELS],
}

impl Default for Config {
    fn default() -> Self {
        Config {
            frequency: 800_000,
            dma: 5,
            soc: Soc::default(),
            timeout: Duration::from_secs(1),
            strips: Default::default(),
        }
    }
}

/// Everything `initialize` acquires
///
/// Fields drop in declaration order: registers are unmapped before the chain
/// and the output buffer are freed.
struct Hardware<P: Platform> {
    registers: RegisterHandles<P::Mapping>,
    chain: Chain<P::Memory>,
    buffer: P::Memory,
    /// Bytes of `buffer` that the chain moves
    bytes: usize,
    /// LEDs per strip that `buffer` has room for
    capacity: usize,
    /// Inversion of each strip when the buffer was last primed
    primed: [bool; CHANNELS],
    /// How long one frame takes on the wire
    frame_time: Duration,
}

/// View the first `bytes` of `memory` as words
fn words<M: DmaMemory>(memory: &mut M, bytes: usize) -> &mut [u32] {
    let len = bytes.min(memory.len()) / 4;
    // Safety: DmaMemory points at len() writable, page-aligned bytes, and the
    // exclusive borrow of memory covers the slice.
    unsafe { slice::from_raw_parts_mut(memory.as_ptr().cast(), len) }
}

fn inversions(strips: &[Strip; CHANNELS]) -> [bool; CHANNELS] {
    [strips[0].invert, strips[1].invert]
}

/// A WS2811 driver, running two LED strips from the PWM and a DMA engine
///
/// Call [`initialize`](Ws2811::initialize) once, set colors through
/// [`strip_mut`](Ws2811::strip_mut), then [`render`](Ws2811::render) each
/// frame. Dropping the device finalizes it.
pub struct Ws2811<P: Platform = Linux> {
    config: Config,
    platform: P,
    state: State,
    hardware: Option<Hardware<P>>,
}

impl Ws2811<Linux> {
    /// A device on this Linux host
    pub fn new(config: Config) -> Self {
        Ws2811::with_platform(config, Linux::new())
    }
}

impl<P: Platform> Ws2811<P> {
    /// A device that gets its memory, registers and delays from `platform`
    pub fn with_platform(config: Config, platform: P) -> Self {
        Ws2811 {
            config,
            platform,
            state: State::Uninitialized,
            hardware: None,
        }
    }

    /// Returns the lifecycle state
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the strip on PWM `channel`
    ///
    /// # Panics
    ///
    /// Panics if `channel` is 2 or more.
    pub fn strip(&self, channel: usize) -> &Strip {
        &self.config.strips[channel]
    }

    /// Returns the strip on PWM `channel`, to change its colors
    ///
    /// Changing `invert` takes effect at the next render. Changing `pin` or
    /// `count` after initialization has no effect.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is 2 or more.
    pub fn strip_mut(&mut self, channel: usize) -> &mut Strip {
        &mut self.config.strips[channel]
    }

    /// Acquire memory and registers, and start the PWM clock
    ///
    /// On failure, everything acquired so far is released, and the device
    /// stays uninitialized.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != State::Uninitialized {
            return Err(Error::InvalidState(self.state));
        }

        for strip in &mut self.config.strips {
            strip.allocate();
        }
        match self.bring_up() {
            Ok(hardware) => {
                log::info!(
                    "WS2811 ready: {} Hz, DMA {}, {} byte frames",
                    self.config.frequency,
                    self.config.dma,
                    hardware.bytes
                );
                self.hardware = Some(hardware);
                self.state = State::Ready;
                Ok(())
            }
            Err(err) => {
                for strip in &mut self.config.strips {
                    strip.release();
                }
                Err(err)
            }
        }
    }

    /// Acquire everything in order. Returning early drops what was acquired,
    /// in reverse.
    fn bring_up(&self) -> Result<Hardware<P>> {
        let config = &self.config;
        let soc = &config.soc;

        // Reject bad configurations before touching anything
        gpio::validate(&config.strips)?;
        soc.dma_base(config.dma)?;
        clock::divisor(soc.oscillator, config.frequency)?;
        let longest = config.strips.iter().map(|strip| strip.count).max().unwrap_or(0);
        let bytes = encoder::pwm_byte_count(longest, config.frequency);
        let pages = chain::descriptor_count(bytes);
        if pages > MAX_PAGES {
            return Err(Error::TooManyPages {
                pages,
                max: MAX_PAGES,
            });
        }

        log::debug!("{longest} LEDs per strip, {bytes} byte output buffer");
        let mut buffer = self.platform.allocate(bytes)?;
        encoder::prime(words(&mut buffer, bytes), &config.strips);

        let fifo = BusAddress::new(soc.pwm_fifo_bus());
        let chain = Chain::build(&self.platform, &buffer, bytes, fifo, soc.bus_alias)?;

        let registers = mapper::map_all(&self.platform, soc, config.dma)?;
        gpio::bind_pins(&registers.gpio, &config.strips)?;
        if let Err(err) = clock::configure(
            &self.platform,
            &registers.pwm,
            &registers.cm,
            soc.oscillator,
            config.frequency,
            config.timeout,
        ) {
            let stopped = clock::stop(&self.platform, &registers.pwm, &registers.cm, config.timeout);
            if let Err(stop) = stopped {
                log::warn!("cannot stop the PWM clock: {stop}");
            }
            return Err(err);
        }
        Channel::new(config.dma, &registers.dma).stop();

        // Four symbol bits per output byte and channel, at three symbols per
        // LED bit
        let symbols = bytes as u64 * 4;
        let rate = u64::from(config.frequency) * u64::from(clock::SYMBOLS_PER_BIT);
        let frame_time = Duration::from_micros(symbols * 1_000_000 / rate);

        Ok(Hardware {
            registers,
            chain,
            buffer,
            bytes,
            capacity: longest,
            primed: inversions(&config.strips),
            frame_time,
        })
    }

    /// Send the strips' colors to the LEDs
    ///
    /// Waits for the previous frame to finish, encodes the new one, and
    /// starts the transfer. Returns without waiting for it.
    ///
    /// Fails with [`Error::TooManyLeds`] if a strip was replaced by a longer
    /// one after [`initialize`](Self::initialize).
    pub fn render(&mut self) -> Result<()> {
        self.wait()?;
        let Some(hardware) = self.hardware.as_mut() else {
            return Err(Error::InvalidState(self.state));
        };

        let strips = &self.config.strips;
        for (channel, strip) in strips.iter().enumerate() {
            if strip.leds().len() > hardware.capacity {
                return Err(Error::TooManyLeds {
                    channel,
                    leds: strip.leds().len(),
                    max: hardware.capacity,
                });
            }
        }
        let bytes = hardware.bytes;
        let output = words(&mut hardware.buffer, bytes);
        if hardware.primed != inversions(strips) {
            log::debug!("strip inversion changed, priming the output again");
            encoder::prime(output, strips);
            hardware.primed = inversions(strips);
        }
        encoder::encode(output, strips);
        self.platform.flush_cache(hardware.buffer.as_ptr(), bytes);

        let channel = Channel::new(self.config.dma, &hardware.registers.dma);
        // Safety: the chain and the buffer live in hardware. Every path that
        // drops hardware stops the engine first. The cache was just flushed.
        unsafe { channel.start(hardware.chain.head()) };
        log::trace!("rendering from {}", hardware.chain.head());

        self.state = State::Rendering;
        Ok(())
    }

    /// Block until the frame in flight, if any, is on the wire
    ///
    /// If the engine reports an error, it's reset, the device is ready for
    /// another render, and the error carries the engine's debug register.
    pub fn wait(&mut self) -> Result<()> {
        let hardware = match (self.state, self.hardware.as_ref()) {
            (State::Ready | State::Rendering, Some(hardware)) => hardware,
            (state, _) => return Err(Error::InvalidState(state)),
        };

        let channel = Channel::new(self.config.dma, &hardware.registers.dma);
        let timeout = self.config.timeout + 2 * hardware.frame_time;
        poll::until(&self.platform, timeout, "DMA transfer", || {
            !channel.is_active() || channel.is_error()
        })?;

        if channel.is_error() {
            let status = channel.error_status();
            log::error!("DMA {} failed: {status:?}", channel.channel());
            channel.reset();
            self.platform.delay(SETTLE);
            self.state = State::Ready;
            return Err(Error::Dma(status));
        }

        self.state = State::Ready;
        Ok(())
    }

    /// Stop the output, and release everything
    ///
    /// Allowed in any state, and more than once. Teardown always runs to the
    /// end. The first problem it met, if any, is returned.
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == State::Finalized {
            return Ok(());
        }

        let mut result = Ok(());
        if self.hardware.is_some() {
            if let Err(err) = self.wait() {
                log::warn!("finalizing while the DMA is unhappy: {err}");
                result = Err(err);
            }
        }
        if let Some(hardware) = self.hardware.take() {
            let registers = &hardware.registers;
            let stopped = clock::stop(&self.platform, &registers.pwm, &registers.cm, self.config.timeout);
            if let Err(err) = stopped {
                log::warn!("cannot stop the PWM clock: {err}");
                result = result.and(Err(err));
            }
            // Abort the engine in case the wait gave up on it
            Channel::new(self.config.dma, &registers.dma).reset();
            self.platform.delay(SETTLE);
        }
        for strip in &mut self.config.strips {
            strip.release();
        }

        self.state = State::Finalized;
        log::info!("WS2811 finalized");
        result
    }
}

impl<P: Platform> Drop for Ws2811<P> {
    fn drop(&mut self) {
        if let Err(err) = self.finalize() {
            log::warn!("error while dropping the WS2811 device: {err}");
        }
    }
}
