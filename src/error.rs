//! Driver errors

use core::fmt::{self, Debug, Display};
use std::io;

use crate::State;

/// Errors reported by the driver
///
/// Configuration mistakes (`UnsupportedPin`, `UnsupportedFrequency`, ...) are
/// fixed at startup. `Dma` and `Timeout` come from the hardware at run time,
/// and the caller may retry.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Pinned, DMA-visible memory could not be allocated
    #[error("cannot allocate {bytes} bytes of DMA memory")]
    Allocation {
        bytes: usize,
        #[source]
        source: io::Error,
    },
    /// The output buffer spans more pages than there are descriptors
    #[error("output buffer needs {pages} pages, more than the {max} supported")]
    TooManyPages { pages: usize, max: usize },
    /// The memory is shorter than the transfer it should back
    #[error("{len} byte buffer cannot hold a {bytes} byte transfer")]
    BufferTooSmall { len: usize, bytes: usize },
    /// A strip holds more LEDs than the output buffer was sized for
    #[error("strip {channel} has {leds} LEDs, the device was initialized for {max}")]
    TooManyLeds {
        channel: usize,
        leds: usize,
        max: usize,
    },
    /// Peripheral registers could not be mapped
    #[error("cannot map peripheral registers at {phys:#010X}")]
    Map {
        phys: u32,
        #[source]
        source: io::Error,
    },
    /// A virtual address could not be resolved to a bus address
    #[error("cannot resolve the bus address of {addr:#X}")]
    Translation {
        addr: usize,
        #[source]
        source: io::Error,
    },
    /// The pin cannot be routed to the PWM channel
    #[error("GPIO {pin} cannot drive PWM channel {channel}")]
    UnsupportedPin { channel: usize, pin: u8 },
    /// The SoC description couldn't be read from the device tree
    #[error("cannot detect the SoC")]
    SocDetection(#[source] io::Error),
    /// There's no DMA engine with this index
    #[error("DMA engine {0} does not exist")]
    UnsupportedDmaEngine(u8),
    /// The PWM clock can't produce this output frequency
    #[error("unsupported output frequency {0} Hz")]
    UnsupportedFrequency(u32),
    /// The peripheral base address doesn't match a known SoC
    #[error("unknown SoC with peripherals at {0:#010X}")]
    UnsupportedSoc(u32),
    /// The DMA engine reported a transfer error
    #[error("DMA error: {0}")]
    Dma(DmaStatus),
    /// Hardware didn't reach the expected state in time
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    /// The operation isn't allowed in the device's current state
    #[error("operation not allowed while the device is {0:?}")]
    InvalidState(State),
}

/// A wrapper around a DMA debug register value
///
/// The wrapper contains a copy of the DMA engine's
/// DEBUG register at the point of an error. The
/// wrapper implements both `Debug` and `Display`. The
/// type may be printed to understand why there was a
/// DMA error.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DmaStatus {
    /// The raw debug register
    debug: u32,
}

impl DmaStatus {
    pub(crate) const fn new(debug: u32) -> Self {
        DmaStatus { debug }
    }
    /// Returns the raw debug register value
    pub const fn raw(self) -> u32 {
        self.debug
    }
}

impl Debug for DmaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DMA_DEBUG({:#010X})", self.debug)
    }
}

impl Display for DmaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f,
             "DMA_DEBUG: LITE {lite} VERSION {version} STATE {state:#X} ID {id} WRITES {writes} READ_ERROR {read} FIFO_ERROR {fifo} READ_LAST_NOT_SET {last}",
             lite = (self.debug >> 28) & 0x1,
             version = (self.debug >> 25) & 0x7,
             state = (self.debug >> 16) & 0x1FF,
             id = (self.debug >> 8) & 0xFF,
             writes = (self.debug >> 4) & 0xF,
             read = (self.debug >> 2) & 0x1,
             fifo = (self.debug >> 1) & 0x1,
             last = self.debug & 0x1,
         )
    }
}
