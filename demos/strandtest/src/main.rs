//! Color chase on one or two LED strips
//!
//! Setup
//! =====
//!
//! - Strip 0 data line on GPIO 18 (PWM channel 0)
//! - Optionally, strip 1 data line on GPIO 13 (PWM channel 1)
//!
//! Run as root, since the driver maps `/dev/mem`.
//!
//! Demo
//! ====
//!
//! A block of color walks down each strip, changing hue every lap. After
//! `--frames` frames, the strips go dark and the driver shuts down. Set
//! `RUST_LOG=debug` to watch the driver set up the hardware.

use std::{thread, time::Duration};

use anyhow::Context;
use clap::Parser;
use rpi_ws2811::{rgb, Config, Soc, Strip, Ws2811};

/// Walks colors down WS2811 strips
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// GPIO pin of strip 0
    #[arg(short, long, default_value_t = 18)]
    pin: u8,
    /// LEDs on strip 0
    #[arg(short, long, default_value_t = 60)]
    count: usize,
    /// GPIO pin of strip 1. 0 leaves it unused
    #[arg(long, default_value_t = 0)]
    pin2: u8,
    /// LEDs on strip 1
    #[arg(long, default_value_t = 0)]
    count2: usize,
    /// Strips sit behind an inverting level shifter
    #[arg(short, long)]
    invert: bool,
    /// DMA engine
    #[arg(short, long, default_value_t = 5)]
    dma: u8,
    /// Frames to render before quitting
    #[arg(short, long, default_value_t = 1000)]
    frames: usize,
}

const PALETTE: [u32; 6] = [
    rgb(0x20, 0x00, 0x00),
    rgb(0x20, 0x10, 0x00),
    rgb(0x10, 0x20, 0x00),
    rgb(0x00, 0x20, 0x00),
    rgb(0x00, 0x00, 0x20),
    rgb(0x10, 0x00, 0x10),
];

/// Width of the moving block
const BLOCK: usize = 8;
const FRAME_TIME: Duration = Duration::from_millis(1000 / 30);

fn chase(strip: &mut Strip, frame: usize) {
    let count = strip.count.max(1);
    let head = frame % count;
    let color = PALETTE[(frame / count) % PALETTE.len()];
    for (index, led) in strip.leds_mut().iter_mut().enumerate() {
        let behind = (head + count - index) % count;
        *led = if behind < BLOCK { color } else { 0 };
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let soc = Soc::detect().unwrap_or_else(|err| {
        log::warn!("{err}, assuming a Pi 1");
        Soc::BCM2835
    });
    let mut config = Config {
        dma: args.dma,
        soc,
        ..Config::default()
    };
    config.strips[0] = Strip::new(args.pin, args.count);
    config.strips[1] = Strip::new(args.pin2, args.count2);
    for strip in &mut config.strips {
        strip.invert = args.invert;
    }

    let mut leds = Ws2811::new(config);
    leds.initialize().context("cannot set up the LED driver")?;

    for frame in 0..args.frames {
        for channel in 0..rpi_ws2811::CHANNELS {
            chase(leds.strip_mut(channel), frame);
        }
        leds.render().context("render failed")?;
        thread::sleep(FRAME_TIME);
    }

    for channel in 0..rpi_ws2811::CHANNELS {
        leds.strip_mut(channel).leds_mut().fill(0);
    }
    leds.render()?;
    leds.finalize()?;
    log::info!("rendered {} frames", args.frames);
    Ok(())
}
