//! Pinned memory pages for DMA

use std::io;

use crate::{platform::DmaMemory, Error, Result};

/// Size of a memory page, and of the largest region one descriptor covers
pub const PAGE_SIZE: usize = 1 << 12;
/// Mask that selects the page-aligned part of an address
pub const PAGE_MASK: usize = !(PAGE_SIZE - 1);

/// Returns the offset of `addr` within its page
pub const fn page_offset(addr: usize) -> usize {
    addr & (PAGE_SIZE - 1)
}

/// Round `bytes` up to a whole number of pages
pub const fn page_align(bytes: usize) -> usize {
    (bytes + PAGE_SIZE - 1) & PAGE_MASK
}

/// Returns the start of every page in `memory`
///
/// The pages are virtually contiguous, but each one may live anywhere in
/// physical memory.
pub fn pages<M: DmaMemory>(memory: &M) -> impl Iterator<Item = *mut u8> + '_ {
    (0..memory.len())
        .step_by(PAGE_SIZE)
        // Safety: offset stays within the allocation.
        .map(move |offset| unsafe { memory.as_ptr().add(offset) })
}

/// Anonymous memory, locked into RAM
///
/// Locked pages stay resident, so their page frames don't change while the
/// DMA engine reads them. The memory is zero-filled, and it's unlocked and
/// unmapped on drop.
#[derive(Debug)]
pub struct LockedPages {
    ptr: *mut u8,
    len: usize,
}

impl LockedPages {
    /// Allocate and lock at least `bytes` of memory
    pub fn new(bytes: usize) -> Result<Self> {
        let len = page_align(bytes.max(1));
        let fail = |source| Error::Allocation { bytes, source };

        // Safety: anonymous mapping, no file or fixed address involved.
        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(fail(io::Error::last_os_error()));
        }
        // Owned from here on; drop unmaps on the error paths below.
        let pages = LockedPages {
            ptr: ptr.cast(),
            len,
        };

        // Safety: range is the mapping we just created.
        if unsafe { libc::mlock(ptr, len) } != 0 {
            return Err(fail(io::Error::last_os_error()));
        }

        // Fault every page in, so that each one has a frame before anyone
        // asks the page tables about it.
        for page in self::pages(&pages) {
            // Safety: page is inside the writable mapping.
            unsafe { page.write_volatile(0) };
        }

        log::debug!("locked {} pages at {:p}", len / PAGE_SIZE, pages.ptr);
        Ok(pages)
    }
}

unsafe impl DmaMemory for LockedPages {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }
    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for LockedPages {
    fn drop(&mut self) {
        // Safety: we own the mapping. munlock on memory that was never
        // locked is harmless.
        unsafe {
            libc::munlock(self.ptr.cast(), self.len);
            libc::munmap(self.ptr.cast(), self.len);
        }
    }
}

// It's OK to send pages across threads. They can't be cloned or copied,
// so there's no chance of them being (mutably) shared.
unsafe impl Send for LockedPages {}
