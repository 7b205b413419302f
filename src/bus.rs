//! Bus addresses
//!
//! The DMA engines don't use CPU virtual addresses, and they don't use CPU
//! physical addresses either. They use bus addresses: the physical page frame,
//! shifted into place, with an alias that selects how the access goes through
//! the VideoCore cache.

use core::fmt;
use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::PathBuf,
};

use crate::{pages, platform::Platform, Error, Result};

/// An address in the DMA engine's view of memory
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BusAddress(u32);

impl BusAddress {
    /// The zero address, which ends a descriptor chain
    pub const NULL: BusAddress = BusAddress(0);

    /// Wrap a raw bus address
    pub const fn new(raw: u32) -> Self {
        BusAddress(raw)
    }
    /// Returns the raw address
    pub const fn raw(self) -> u32 {
        self.0
    }
    /// Compose the bus address of `addr` from the page frame behind it
    pub const fn compose(frame: u64, alias: u32, addr: usize) -> Self {
        BusAddress(((frame << 12) as u32) | alias | (pages::page_offset(addr) as u32))
    }
}

impl fmt::Debug for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BusAddress({:#010X})", self.0)
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

/// Resolve the bus address of `addr`, a pointer into pinned memory
///
/// `alias` is the SoC's uncached (or L2-coherent) alias. Any failure is fatal
/// for the caller. A misresolved address silently corrupts the transfer.
pub fn translate<P: Platform>(platform: &P, addr: *const u8, alias: u32) -> Result<BusAddress> {
    let frame = platform.page_frame(addr)?;
    Ok(BusAddress::compose(frame, alias, addr as usize))
}

/// Size of one pagemap entry
const ENTRY_SIZE: u64 = 8;
/// The page is present in RAM
const PRESENT: u64 = 1 << 63;
/// Bits 0 through 54 hold the page frame number
const FRAME_MASK: u64 = (1 << 55) - 1;

/// A process's `/proc/<pid>/pagemap`
#[derive(Debug, Clone)]
pub struct Pagemap {
    path: PathBuf,
}

impl Default for Pagemap {
    fn default() -> Self {
        Pagemap::current()
    }
}

impl Pagemap {
    /// The pagemap of this process
    pub fn current() -> Self {
        Pagemap {
            path: PathBuf::from(format!("/proc/{}/pagemap", std::process::id())),
        }
    }

    /// Look up the page frame number backing `addr`
    pub fn page_frame(&self, addr: *const u8) -> Result<u64> {
        let fail = |source| Error::Translation {
            addr: addr as usize,
            source,
        };
        let position = (addr as usize / pages::PAGE_SIZE) as u64 * ENTRY_SIZE;

        let mut file = File::open(&self.path).map_err(fail)?;
        if file.seek(SeekFrom::Start(position)).map_err(fail)? != position {
            return Err(fail(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "pagemap seek fell short",
            )));
        }
        let mut entry = [0; ENTRY_SIZE as usize];
        file.read_exact(&mut entry).map_err(fail)?;

        decode_entry(u64::from_le_bytes(entry)).map_err(fail)
    }
}

fn decode_entry(entry: u64) -> io::Result<u64> {
    if entry & PRESENT == 0 {
        return Err(io::Error::new(io::ErrorKind::NotFound, "page not present"));
    }
    match entry & FRAME_MASK {
        0 => Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "page frame hidden, CAP_SYS_ADMIN required",
        )),
        frame => Ok(frame),
    }
}
