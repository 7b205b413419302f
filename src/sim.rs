//! A simulated Raspberry Pi, for tests
//!
//! Memory comes from the heap, page aligned, with made-up page frames that
//! are deliberately not contiguous. Register mappings are heap pages too, one
//! per physical page. Hardware only moves when the driver calls
//! [`delay`](Platform::delay): the clock manager's BUSY flag follows ENAB and
//! KILL, and an active DMA engine runs its whole chain into a captured FIFO.

use std::{
    alloc::{self, Layout},
    cell::RefCell,
    collections::{HashMap, HashSet},
    io,
    rc::Rc,
    time::Duration,
};

use crate::{
    chain::ControlBlock,
    pages::{page_align, page_offset, PAGE_MASK, PAGE_SIZE},
    platform::{DmaMemory, Platform, RegisterMapping},
    ral::{cm, dma},
    soc::Soc,
    Error, Result,
};

const FIRST_FRAME: u64 = 0x1000;
/// Gap between the frames of two consecutive pages
const FRAME_STEP: u64 = 3;
/// Bits of a bus address that select the cache alias
const ALIAS_MASK: u32 = 0xC000_0000;

fn page_layout(len: usize) -> Layout {
    Layout::from_size_align(len, PAGE_SIZE).unwrap()
}

#[derive(Default)]
struct State {
    next_frame: u64,
    frames: HashMap<usize, u64>,
    pages: HashMap<u64, usize>,
    live_memory: usize,

    registers: HashMap<u32, *mut u8>,
    fail_mapping: HashSet<u32>,
    fail_translation: bool,

    clock_frozen: bool,
    dma_error: Option<u32>,
    fifo: Vec<u32>,
    flushed: Vec<(usize, usize)>,
}

/// Simulated platform. Clones share the same hardware
#[derive(Clone)]
pub struct Sim {
    soc: Soc,
    state: Rc<RefCell<State>>,
}

impl Sim {
    pub fn new() -> Self {
        Sim {
            soc: Soc::BCM2835,
            state: Rc::new(RefCell::new(State {
                next_frame: FIRST_FRAME,
                ..State::default()
            })),
        }
    }

    /// Allocations that haven't dropped
    pub fn live_memory(&self) -> usize {
        self.state.borrow().live_memory
    }

    /// Register pages that are still mapped
    pub fn live_mappings(&self) -> usize {
        self.state.borrow().registers.len()
    }

    /// Refuse to map the registers at `phys`
    pub fn fail_mapping(&self, phys: u32) {
        self.state.borrow_mut().fail_mapping.insert(phys);
    }

    /// Hide every page frame from now on
    pub fn fail_translation(&self) {
        self.state.borrow_mut().fail_translation = true;
    }

    /// Stop the clock manager from ever changing its BUSY flag
    pub fn freeze_clock(&self) {
        self.state.borrow_mut().clock_frozen = true;
    }

    /// Fail the next transfer with this DEBUG register value
    pub fn inject_dma_error(&self, debug: u32) {
        self.state.borrow_mut().dma_error = Some(debug);
    }

    /// Take every word written to the PWM FIFO so far
    pub fn take_fifo(&self) -> Vec<u32> {
        core::mem::take(&mut self.state.borrow_mut().fifo)
    }

    /// Ranges passed to `flush_cache`
    pub fn flushed(&self) -> Vec<(usize, usize)> {
        self.state.borrow().flushed.clone()
    }

    /// Read the register at `phys`, if its page is mapped
    pub fn peek(&self, phys: u32) -> Option<u32> {
        let register = self.register(phys)?;
        // Safety: register points into a live register page.
        Some(unsafe { register.read_volatile() })
    }

    fn register_page(&self, phys: u32) -> Option<*mut u8> {
        self.state
            .borrow()
            .registers
            .get(&(phys & PAGE_MASK as u32))
            .copied()
    }

    /// Returns a pointer to the register at `phys`, if its page is mapped
    fn register(&self, phys: u32) -> Option<*mut u32> {
        let page = self.register_page(phys)?;
        // Safety: offset stays within the page.
        Some(unsafe { page.add(page_offset(phys as usize)) }.cast())
    }

    /// Resolve a bus address to the simulated memory behind it
    fn resolve(&self, bus: u32) -> Option<*mut u8> {
        let frame = u64::from((bus & !ALIAS_MASK) >> 12);
        let page = *self.state.borrow().pages.get(&frame)?;
        Some((page + page_offset(bus as usize)) as *mut u8)
    }

    fn step_clock(&self) {
        if self.state.borrow().clock_frozen {
            return;
        }
        let Some(ctl) = self.register(self.soc.cm_pwm_base()) else {
            return;
        };
        // Safety: register points into a live register page.
        unsafe {
            let value = ctl.read_volatile();
            let running = value & cm::CTL::ENAB::mask != 0 && value & cm::CTL::KILL::mask == 0;
            let value = if running {
                value | cm::CTL::BUSY::mask
            } else {
                value & !cm::CTL::BUSY::mask
            };
            ctl.write_volatile(value);
        }
    }

    fn step_dma(&self, index: u8) {
        let Ok(base) = self.soc.dma_base(index) else {
            return;
        };
        let (Some(cs), Some(conblk_ad), Some(debug)) = (
            self.register(base),
            self.register(base + 0x04),
            self.register(base + 0x20),
        ) else {
            return;
        };

        // Safety: all three point into a live register page.
        unsafe {
            let status = cs.read_volatile();
            if status & dma::CS::RESET::mask != 0 {
                cs.write_volatile(0);
                debug.write_volatile(0);
                return;
            }
            if status & dma::CS::ACTIVE::mask == 0 {
                return;
            }
            if let Some(value) = self.state.borrow_mut().dma_error.take() {
                debug.write_volatile(value);
                cs.write_volatile(status | dma::CS::ERROR::mask);
                return;
            }

            let fifo = self.soc.pwm_fifo_bus();
            let mut next = conblk_ad.read_volatile();
            while next != 0 {
                let Some(block) = self.resolve(next) else {
                    break;
                };
                let block = block.cast::<ControlBlock>().read_volatile();
                if block.dest_ad == fifo {
                    if let Some(source) = self.resolve(block.source_ad) {
                        let words = block.txfr_len as usize / 4;
                        let source = core::slice::from_raw_parts(source.cast::<u32>(), words);
                        self.state.borrow_mut().fifo.extend_from_slice(source);
                    }
                }
                next = block.nextconbk;
            }
            conblk_ad.write_volatile(0);
            cs.write_volatile((status & !dma::CS::ACTIVE::mask) | dma::CS::END::mask);
        }
    }
}

/// Heap pages with made-up frames
pub struct SimMemory {
    state: Rc<RefCell<State>>,
    ptr: *mut u8,
    len: usize,
}

unsafe impl DmaMemory for SimMemory {
    fn as_ptr(&self) -> *mut u8 {
        self.ptr
    }
    fn len(&self) -> usize {
        self.len
    }
}

impl Drop for SimMemory {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        for page in (0..self.len).step_by(PAGE_SIZE) {
            let addr = self.ptr as usize + page;
            if let Some(frame) = state.frames.remove(&addr) {
                state.pages.remove(&frame);
            }
        }
        state.live_memory -= 1;
        // Safety: allocated in Sim::allocate with this layout.
        unsafe { alloc::dealloc(self.ptr, page_layout(self.len)) };
    }
}

/// One heap page standing in for a page of registers
pub struct SimMapping {
    state: Rc<RefCell<State>>,
    page: u32,
    ptr: *const u8,
}

unsafe impl RegisterMapping for SimMapping {
    fn as_ptr(&self) -> *const u8 {
        self.ptr
    }
}

impl Drop for SimMapping {
    fn drop(&mut self) {
        if let Some(page) = self.state.borrow_mut().registers.remove(&self.page) {
            // Safety: allocated in map_registers with a one-page layout.
            unsafe { alloc::dealloc(page, page_layout(PAGE_SIZE)) };
        }
    }
}

unsafe impl Platform for Sim {
    type Memory = SimMemory;
    type Mapping = SimMapping;

    fn allocate(&self, bytes: usize) -> Result<SimMemory> {
        let len = page_align(bytes.max(1));
        // Safety: layout has a nonzero size.
        let ptr = unsafe { alloc::alloc_zeroed(page_layout(len)) };
        assert!(!ptr.is_null());

        let mut state = self.state.borrow_mut();
        for page in (0..len).step_by(PAGE_SIZE) {
            let frame = state.next_frame;
            state.next_frame += FRAME_STEP;
            state.frames.insert(ptr as usize + page, frame);
            state.pages.insert(frame, ptr as usize + page);
        }
        state.live_memory += 1;

        Ok(SimMemory {
            state: Rc::clone(&self.state),
            ptr,
            len,
        })
    }

    fn map_registers(&self, phys: u32, len: usize) -> Result<SimMapping> {
        let mut state = self.state.borrow_mut();
        if state.fail_mapping.contains(&phys) {
            return Err(Error::Map {
                phys,
                source: io::Error::from(io::ErrorKind::PermissionDenied),
            });
        }
        let page = phys & PAGE_MASK as u32;
        assert!(page_offset(phys as usize) + len <= PAGE_SIZE);
        assert!(!state.registers.contains_key(&page), "{page:#X} mapped twice");

        // Safety: layout has a nonzero size.
        let ptr = unsafe { alloc::alloc_zeroed(page_layout(PAGE_SIZE)) };
        assert!(!ptr.is_null());
        state.registers.insert(page, ptr);

        Ok(SimMapping {
            state: Rc::clone(&self.state),
            page,
            // Safety: offset is within the page.
            ptr: unsafe { ptr.add(page_offset(phys as usize)) },
        })
    }

    fn page_frame(&self, addr: *const u8) -> Result<u64> {
        let state = self.state.borrow();
        let frame = state
            .frames
            .get(&(addr as usize & PAGE_MASK))
            .filter(|_| !state.fail_translation);
        frame.copied().ok_or_else(|| Error::Translation {
            addr: addr as usize,
            source: io::Error::from(io::ErrorKind::NotFound),
        })
    }

    fn flush_cache(&self, addr: *const u8, len: usize) {
        self.state.borrow_mut().flushed.push((addr as usize, len));
    }

    fn delay(&self, _: Duration) {
        self.step_clock();
        for index in 0..=15 {
            self.step_dma(index);
        }
        std::thread::yield_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ral::pwm;

    #[test]
    fn frames_are_scattered_and_released() {
        let sim = Sim::new();
        let memory = sim.allocate(2 * PAGE_SIZE).unwrap();
        let first = sim.page_frame(memory.as_ptr()).unwrap();
        // Safety: second page of the allocation.
        let second = sim.page_frame(unsafe { memory.as_ptr().add(PAGE_SIZE + 8) }).unwrap();
        assert_eq!(second, first + FRAME_STEP);
        assert_eq!(sim.live_memory(), 1);

        let addr = memory.as_ptr();
        drop(memory);
        assert_eq!(sim.live_memory(), 0);
        assert!(sim.page_frame(addr).is_err());
    }

    #[test]
    fn pwm_registers_are_plain_memory() {
        let sim = Sim::new();
        let base = sim.soc.pwm_base();
        let mapping = sim.map_registers(base, core::mem::size_of::<pwm::RegisterBlock>()).unwrap();
        assert_eq!(sim.peek(base), Some(0));
        // Safety: first register of the mapped page.
        unsafe { (mapping.as_ptr() as *mut u32).write_volatile(0x2323) };
        assert_eq!(sim.peek(base), Some(0x2323));
        drop(mapping);
        assert_eq!(sim.peek(base), None);
    }
}
