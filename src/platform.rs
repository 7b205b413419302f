//! The operating system services the driver depends on
//!
//! The driver needs four things from its host: pinned memory the DMA engine
//! can read, mappings of the peripheral registers, the physical page frame
//! behind a virtual address, and a way to push CPU cache lines out to memory.
//! [`Platform`] bundles them. [`Linux`] implements them for a privileged
//! Linux process.

use std::time::Duration;

use crate::{bus::Pagemap, cache, mapper::DevMem, pages::LockedPages, Result};

/// Pinned memory that a DMA engine can read
///
/// # Safety
///
/// `as_ptr()` must point to `len()` bytes of writable, page-aligned memory.
/// The memory must stay resident at the same physical pages until the value
/// drops, and it must be zero-filled when handed out.
pub unsafe trait DmaMemory {
    /// Start of the memory
    fn as_ptr(&self) -> *mut u8;
    /// Length in bytes. Always a whole number of pages
    fn len(&self) -> usize;
    /// Returns `true` if there's no memory
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A mapping of a peripheral register range
///
/// # Safety
///
/// `as_ptr()` must point at the first requested physical register, and the
/// whole requested range must stay mapped until the value drops.
pub unsafe trait RegisterMapping {
    /// Virtual address of the first requested register
    fn as_ptr(&self) -> *const u8;
}

/// Host services for the driver
///
/// # Safety
///
/// `page_frame` must report the frame that really backs the address. A wrong
/// frame sends the DMA engine to the wrong memory.
pub unsafe trait Platform {
    /// Pinned memory for the output buffer and the descriptor chain
    type Memory: DmaMemory;
    /// A mapped register block
    type Mapping: RegisterMapping;

    /// Allocate at least `bytes` of zero-filled, pinned memory
    fn allocate(&self, bytes: usize) -> Result<Self::Memory>;
    /// Map the physical range `[phys, phys + len)`
    fn map_registers(&self, phys: u32, len: usize) -> Result<Self::Mapping>;
    /// Returns the physical page frame number backing `addr`
    fn page_frame(&self, addr: *const u8) -> Result<u64>;
    /// Write back and invalidate the data cache over `[addr, addr + len)`
    fn flush_cache(&self, addr: *const u8, len: usize);
    /// Sleep for roughly `duration`
    fn delay(&self, duration: Duration);
}

/// A privileged Linux process
///
/// Register mapping needs `/dev/mem`, and page frame lookups need
/// `CAP_SYS_ADMIN`. In practice, run as root.
#[derive(Debug, Default)]
pub struct Linux {
    pagemap: Pagemap,
}

impl Linux {
    /// Use the current process's page tables
    pub fn new() -> Self {
        Linux {
            pagemap: Pagemap::current(),
        }
    }
}

unsafe impl Platform for Linux {
    type Memory = LockedPages;
    type Mapping = DevMem;

    fn allocate(&self, bytes: usize) -> Result<LockedPages> {
        LockedPages::new(bytes)
    }

    fn map_registers(&self, phys: u32, len: usize) -> Result<DevMem> {
        DevMem::map(phys, len)
    }

    fn page_frame(&self, addr: *const u8) -> Result<u64> {
        self.pagemap.page_frame(addr)
    }

    fn flush_cache(&self, addr: *const u8, len: usize) {
        cache::flush(addr, len);
    }

    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
