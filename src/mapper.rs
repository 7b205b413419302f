//! Peripheral register mappings

use core::ops::Deref;
use std::{fs::OpenOptions, io, os::unix::fs::OpenOptionsExt, os::unix::io::AsRawFd};

use crate::{
    pages::{page_align, page_offset, PAGE_MASK},
    platform::{Platform, RegisterMapping},
    ral::{cm, dma, gpio, pwm, Static},
    soc::Soc,
    Error, Result,
};

/// A range of physical memory mapped through `/dev/mem`
///
/// The mapping covers whole pages. [`as_ptr`](RegisterMapping::as_ptr)
/// points at the requested address within the first page.
#[derive(Debug)]
pub struct DevMem {
    base: *mut libc::c_void,
    len: usize,
    offset: usize,
}

impl DevMem {
    /// Map the physical range `[phys, phys + len)`
    pub fn map(phys: u32, len: usize) -> Result<Self> {
        let fail = |source| Error::Map { phys, source };
        let start = phys as usize & PAGE_MASK;
        let offset = page_offset(phys as usize);
        let map_len = page_align(offset + len);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")
            .map_err(fail)?;

        // Safety: shared mapping of a device file we opened. The file can
        // close after mmap; the mapping keeps its own reference.
        let base = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                map_len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                file.as_raw_fd(),
                start as libc::off_t,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(fail(io::Error::last_os_error()));
        }

        Ok(DevMem {
            base,
            len: map_len,
            offset,
        })
    }
}

unsafe impl RegisterMapping for DevMem {
    fn as_ptr(&self) -> *const u8 {
        // Safety: offset is less than a page, inside the mapping.
        unsafe { self.base.cast::<u8>().add(self.offset) }
    }
}

impl Drop for DevMem {
    fn drop(&mut self) {
        // Safety: we own the mapping.
        unsafe { libc::munmap(self.base, self.len) };
    }
}

// It's OK to send a mapping across threads. It can't be cloned or copied.
unsafe impl Send for DevMem {}

/// A register block that owns its mapping
///
/// Dropping the block unmaps the registers.
pub struct Mapped<M, T> {
    block: Static<T>,
    _mapping: M,
}

impl<M: RegisterMapping, T> Mapped<M, T> {
    /// Treat the start of `mapping` as a `T` register block
    ///
    /// # Safety
    ///
    /// `mapping` must cover `size_of::<T>()` bytes of the peripheral
    /// described by `T`.
    pub unsafe fn new(mapping: M) -> Self {
        Mapped {
            block: Static(mapping.as_ptr().cast()),
            _mapping: mapping,
        }
    }
}

impl<M, T> Deref for Mapped<M, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.block
    }
}

// It's OK to send a block along with the mapping that owns it. Registers
// are shared with the hardware, not with other threads.
unsafe impl<M: Send, T> Send for Mapped<M, T> {}

/// Every register block the driver touches
///
/// Fields drop in declaration order, which unmaps the DMA engine last.
pub struct RegisterHandles<M> {
    pub cm: Mapped<M, cm::RegisterBlock>,
    pub gpio: Mapped<M, gpio::RegisterBlock>,
    pub pwm: Mapped<M, pwm::RegisterBlock>,
    pub dma: Mapped<M, dma::RegisterBlock>,
}

/// Map a register block of type `T` at `phys`
fn map_block<P: Platform, T>(platform: &P, name: &str, phys: u32) -> Result<Mapped<P::Mapping, T>> {
    let mapping = platform.map_registers(phys, core::mem::size_of::<T>())?;
    log::debug!("mapped {name} registers at {phys:#010X}");
    // Safety: mapping covers the size of T, and the address comes from the SoC
    // description of that peripheral.
    Ok(unsafe { Mapped::new(mapping) })
}

/// Map the DMA engine `dma`, the PWM controller, the GPIO block and the
/// PWM clock manager
///
/// If one mapping fails, the ones that succeeded are unmapped before the
/// error returns.
pub fn map_all<P: Platform>(platform: &P, soc: &Soc, dma: u8) -> Result<RegisterHandles<P::Mapping>> {
    let dma = map_block(platform, "DMA", soc.dma_base(dma)?)?;
    let pwm = map_block(platform, "PWM", soc.pwm_base())?;
    let gpio = map_block(platform, "GPIO", soc.gpio_base())?;
    let cm = map_block(platform, "PWM clock", soc.cm_pwm_base())?;
    Ok(RegisterHandles { cm, gpio, pwm, dma })
}
