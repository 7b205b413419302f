//! DMA descriptor chains
//!
//! The output buffer is virtually contiguous, but its pages are scattered in
//! physical memory. The DMA engine only sees bus addresses, so the transfer is
//! split into one control block per page. Each block names the next one by
//! its bus address.

use core::{mem::size_of, slice};

use crate::{
    bus::{self, BusAddress},
    pages::{self, PAGE_SIZE},
    platform::{DmaMemory, Platform},
    ral::dma,
    Error, Result,
};

/// The most pages one output buffer may span
pub const MAX_PAGES: usize = 1024;

/// 32-bit transfers from incrementing memory to the PWM FIFO, paced by the
/// PWM's data request, waiting for each write to complete
pub const TRANSFER_INFO: u32 = dma::TI::NO_WIDE_BURSTS::mask
    | dma::TI::WAIT_RESP::mask
    | dma::TI::DEST_DREQ::mask
    | (dma::TI::PERMAP::RW::PWM << dma::TI::PERMAP::offset)
    | dma::TI::SRC_INC::mask;

/// A DMA control block, as the engine reads it
#[repr(C, align(32))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlBlock {
    /// Transfer information
    pub ti: u32,
    /// Bus address of the first byte to move
    pub source_ad: u32,
    /// Bus address the bytes go to
    pub dest_ad: u32,
    /// Bytes to move
    pub txfr_len: u32,
    /// 2D mode stride. Unused
    pub stride: u32,
    /// Bus address of the next block. Zero ends the chain
    pub nextconbk: u32,
    _reserved: [u32; 2],
}

/// Returns how many control blocks cover `bytes` of output
pub const fn descriptor_count(bytes: usize) -> usize {
    (bytes + PAGE_SIZE - 1) / PAGE_SIZE
}

/// A chain of control blocks in pinned memory
///
/// The chain moves an output buffer, page by page, into the PWM FIFO. It
/// holds bus addresses of that buffer, so the buffer must outlive any transfer
/// that runs the chain.
pub struct Chain<M> {
    storage: M,
    head: BusAddress,
    len: usize,
}

impl<M: DmaMemory> Chain<M> {
    /// Build the chain that moves the first `bytes` of `buffer` to `fifo`
    ///
    /// Allocates the control block storage from `platform`. Every page of the
    /// buffer and every control block is translated with the bus `alias`. No
    /// chain is returned if any translation fails, or if `buffer` is shorter
    /// than `bytes`.
    pub fn build<P>(
        platform: &P,
        buffer: &M,
        bytes: usize,
        fifo: BusAddress,
        alias: u32,
    ) -> Result<Self>
    where
        P: Platform<Memory = M>,
    {
        let len = descriptor_count(bytes);
        if len > MAX_PAGES {
            return Err(Error::TooManyPages {
                pages: len,
                max: MAX_PAGES,
            });
        }
        if buffer.len() < bytes {
            return Err(Error::BufferTooSmall {
                len: buffer.len(),
                bytes,
            });
        }

        let storage = platform.allocate(len * size_of::<ControlBlock>())?;
        let blocks = storage.as_ptr().cast::<ControlBlock>();

        // Resolve every link before writing anything
        let links = (0..len)
            // Safety: storage holds len blocks.
            .map(|index| bus::translate(platform, unsafe { blocks.add(index) }.cast::<u8>(), alias))
            .collect::<Result<Vec<_>>>()?;

        let mut remaining = bytes;
        for (index, page) in pages::pages(buffer).take(len).enumerate() {
            let page_bytes = remaining.min(PAGE_SIZE);
            let next = links.get(index + 1).copied().unwrap_or(BusAddress::NULL);
            let block = ControlBlock {
                ti: TRANSFER_INFO,
                source_ad: bus::translate(platform, page, alias)?.raw(),
                dest_ad: fifo.raw(),
                txfr_len: page_bytes as u32,
                stride: 0,
                nextconbk: next.raw(),
                _reserved: [0; 2],
            };
            // Safety: index < len, inside the storage. Nothing reads the
            // storage until the chain is returned.
            unsafe { blocks.add(index).write_volatile(block) };
            remaining -= page_bytes;
        }
        platform.flush_cache(storage.as_ptr(), len * size_of::<ControlBlock>());

        let head = links.first().copied().unwrap_or(BusAddress::NULL);
        log::debug!("{len} control blocks for {bytes} bytes, head at {head}");
        Ok(Chain { storage, head, len })
    }
}

impl<M: DmaMemory> Chain<M> {
    /// Bus address of the first control block
    pub fn head(&self) -> BusAddress {
        self.head
    }

    /// Returns the control blocks, in chain order
    pub fn descriptors(&self) -> &[ControlBlock] {
        // Safety: build() wrote len blocks into storage, which lives as long
        // as self.
        unsafe { slice::from_raw_parts(self.storage.as_ptr().cast(), self.len) }
    }
}
