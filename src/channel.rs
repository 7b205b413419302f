//! DMA channel

use core::sync::atomic::{fence, Ordering};

use crate::{
    bus::BusAddress,
    ral::{self, dma},
    DmaStatus,
};

/// Highest AXI priority, used for both normal and panic requests
const MAX_PRIORITY: u32 = 15;

/// A DMA engine, borrowed from its register mapping
///
/// The driver owns exactly one engine. Nothing else may program it while the
/// `Channel`'s mapping is alive.
pub struct Channel<'a> {
    /// Engine number, 0 through 15
    index: u8,
    /// The engine's registers
    registers: &'a dma::RegisterBlock,
}

impl<'a> Channel<'a> {
    /// Wrap the registers of DMA engine `index`
    pub fn new(index: u8, registers: &'a dma::RegisterBlock) -> Self {
        Channel { index, registers }
    }

    /// Returns the DMA engine number
    pub fn channel(&self) -> u8 {
        self.index
    }

    /// Idle the engine, and forget any transfer length
    pub fn stop(&self) {
        let registers = self.registers;
        ral::write_reg!(ral::dma, registers, CS, 0);
        ral::write_reg!(ral::dma, registers, TXFR_LEN, 0);
    }

    /// Abort whatever the engine is doing, and clear its error flags
    ///
    /// The reset takes effect after a short delay.
    pub fn reset(&self) {
        let registers = self.registers;
        ral::write_reg!(ral::dma, registers, CS, RESET: 1);
        // Error flags are write-one-to-clear
        ral::write_reg!(
            ral::dma,
            registers,
            DEBUG,
            READ_LAST_NOT_SET_ERROR: 1,
            FIFO_ERROR: 1,
            READ_ERROR: 1
        );
    }

    /// Indicates if the engine is running a chain
    pub fn is_active(&self) -> bool {
        let registers = self.registers;
        ral::read_reg!(ral::dma, registers, CS, ACTIVE == 1)
    }

    /// Indicates if the engine stopped on an error
    pub fn is_error(&self) -> bool {
        let registers = self.registers;
        ral::read_reg!(ral::dma, registers, CS, ERROR == 1)
    }

    /// Returns the engine's debug register, which says why it failed
    pub fn error_status(&self) -> DmaStatus {
        DmaStatus::new(self.registers.DEBUG.read())
    }

    /// Run the control block chain that starts at `head`
    ///
    /// # Safety
    ///
    /// Every control block in the chain, and every source it names, must stay
    /// valid and unchanged until the engine is no longer active. Their CPU
    /// cache lines must already be written back.
    pub unsafe fn start(&self, head: BusAddress) {
        // The chain and the output buffer are complete before the engine
        // reads them.
        fence(Ordering::SeqCst);
        let registers = self.registers;
        ral::write_reg!(ral::dma, registers, CONBLK_AD, head.raw());
        ral::write_reg!(
            ral::dma,
            registers,
            CS,
            WAIT_FOR_OUTSTANDING_WRITES: 1,
            PANIC_PRIORITY: MAX_PRIORITY,
            PRIORITY: MAX_PRIORITY,
            ACTIVE: 1
        );
    }
}
