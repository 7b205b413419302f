//! DMA engine registers
//!
//! One block per engine. Engines 0 through 14 sit `0x100` apart in a
//! single page; engine 15 lives elsewhere.

use super::{RORegister, RWRegister};

/// Offset of DMA engine 0 from the peripheral base
pub const DMA0_OFFSET: u32 = 0x0000_7000;
/// Distance between consecutive DMA engines
pub const STRIDE: u32 = 0x100;
/// Offset of DMA engine 15 from the peripheral base
pub const DMA15_OFFSET: u32 = 0x00E0_5000;

#[repr(C)]
pub struct RegisterBlock {
    /// Control and status
    pub CS: RWRegister<u32>,
    /// Control block address
    pub CONBLK_AD: RWRegister<u32>,
    pub TI: RORegister<u32>,
    pub SOURCE_AD: RORegister<u32>,
    pub DEST_AD: RORegister<u32>,
    pub TXFR_LEN: RWRegister<u32>,
    pub STRIDE: RORegister<u32>,
    pub NEXTCONBK: RWRegister<u32>,
    pub DEBUG: RWRegister<u32>,
}

pub mod CS {
    fields! {
        /// The engine is running, or has a transfer to run
        ACTIVE: 0, 1;
        /// Transfer complete. Write 1 to clear
        END: 1, 1;
        INT: 2, 1;
        DREQ: 3, 1;
        PAUSED: 4, 1;
        DREQ_STOPS_DMA: 5, 1;
        WAITING_FOR_OUTSTANDING_WRITES: 6, 1;
        /// An error flag is set in the DEBUG register
        ERROR: 8, 1;
        PRIORITY: 16, 4;
        PANIC_PRIORITY: 20, 4;
        WAIT_FOR_OUTSTANDING_WRITES: 28, 1;
        DISDEBUG: 29, 1;
        ABORT: 30, 1;
        RESET: 31, 1;
    }
}

/// Transfer information
///
/// The same layout applies to the `ti` word of a control block.
pub mod TI {
    fields! {
        INTEN: 0, 1;
        TDMODE: 1, 1;
        WAIT_RESP: 3, 1;
        DEST_INC: 4, 1;
        DEST_WIDTH: 5, 1;
        DEST_DREQ: 6, 1;
        DEST_IGNORE: 7, 1;
        SRC_INC: 8, 1;
        SRC_WIDTH: 9, 1;
        SRC_DREQ: 10, 1;
        SRC_IGNORE: 11, 1;
        BURST_LENGTH: 12, 4;
        /// Peripheral that paces the transfer
        PERMAP: 16, 5, { PWM = 5 };
        WAITS: 21, 5;
        NO_WIDE_BURSTS: 26, 1;
    }
}

pub mod DEBUG {
    fields! {
        /// AXI read last signal was not set when expected. Write 1 to clear
        READ_LAST_NOT_SET_ERROR: 0, 1;
        /// FIFO error. Write 1 to clear
        FIFO_ERROR: 1, 1;
        /// Slave read response error. Write 1 to clear
        READ_ERROR: 2, 1;
        OUTSTANDING_WRITES: 4, 4;
        DMA_ID: 8, 8;
        DMA_STATE: 16, 9;
        VERSION: 25, 3;
        LITE: 28, 1;
    }
}
