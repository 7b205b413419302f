//! CPU data cache maintenance
//!
//! The DMA engines don't snoop the CPU's data cache. Anything the CPU writes
//! for the DMA engine has to be pushed out to memory before the transfer
//! starts.

use core::sync::atomic::{fence, Ordering};

/// Write back, and invalidate, the data cache lines covering `[addr, addr + len)`
pub fn flush(addr: *const u8, len: usize) {
    fence(Ordering::SeqCst);
    if len == 0 {
        return;
    }
    imp::flush(addr, len);
}

#[cfg(all(target_arch = "arm", target_os = "linux"))]
mod imp {
    /// ARM private system call `cacheflush(start, end, flags)`
    const ARM_NR_CACHEFLUSH: libc::c_long = 0x000f_0002;

    pub(super) fn flush(addr: *const u8, len: usize) {
        let start = addr as usize;
        let end = start + len;
        // Safety: the kernel validates the range against our mappings.
        let rc = unsafe { libc::syscall(ARM_NR_CACHEFLUSH, start, end, 0) };
        if rc != 0 {
            log::warn!(
                "cacheflush({start:#x}, {end:#x}) failed: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(target_arch = "aarch64")]
mod imp {
    use core::arch::asm;

    /// Smallest data cache line, in bytes, from `CTR_EL0.DminLine`
    fn line_size() -> usize {
        let ctr: u64;
        // Safety: Linux lets EL0 read CTR_EL0.
        unsafe { asm!("mrs {}, ctr_el0", out(reg) ctr, options(nomem, nostack)) };
        4 << ((ctr >> 16) & 0xF)
    }

    pub(super) fn flush(addr: *const u8, len: usize) {
        let line = line_size();
        let end = addr as usize + len;
        let mut cursor = addr as usize & !(line - 1);
        while cursor < end {
            // Safety: clean and invalidate by VA on memory we own.
            unsafe { asm!("dc civac, {}", in(reg) cursor, options(nostack)) };
            cursor += line;
        }
        // Safety: barrier only.
        unsafe { asm!("dsb sy", options(nostack)) };
    }
}

#[cfg(not(any(all(target_arch = "arm", target_os = "linux"), target_arch = "aarch64")))]
mod imp {
    pub(super) fn flush(_: *const u8, _: usize) {}
}
