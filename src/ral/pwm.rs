//! PWM controller registers

use super::{RWRegister, WORegister};

/// Offset of the PWM controller from the peripheral base
pub const OFFSET: u32 = 0x0020_C000;

#[repr(C)]
pub struct RegisterBlock {
    pub CTL: RWRegister<u32>,
    pub STA: RWRegister<u32>,
    pub DMAC: RWRegister<u32>,
    _reserved0: u32,
    pub RNG1: RWRegister<u32>,
    pub DAT1: RWRegister<u32>,
    pub FIF1: WORegister<u32>,
    _reserved1: u32,
    pub RNG2: RWRegister<u32>,
    pub DAT2: RWRegister<u32>,
}

/// Byte offset of `FIF1` within the block
pub const FIF1_OFFSET: u32 = 0x18;

pub mod CTL {
    fields! {
        PWEN1: 0, 1;
        /// Serializer mode, rather than PWM
        MODE1: 1, 1;
        RPTL1: 2, 1;
        SBIT1: 3, 1;
        POLA1: 4, 1;
        /// Take data from the FIFO
        USEF1: 5, 1;
        /// Clear the FIFO. Single shot
        CLRF1: 6, 1;
        MSEN1: 7, 1;
        PWEN2: 8, 1;
        MODE2: 9, 1;
        RPTL2: 10, 1;
        SBIT2: 11, 1;
        POLA2: 12, 1;
        USEF2: 13, 1;
        MSEN2: 15, 1;
    }
}

pub mod STA {
    fields! {
        FULL1: 0, 1;
        EMPT1: 1, 1;
        WERR1: 2, 1;
        RERR1: 3, 1;
        GAPO1: 4, 1;
        GAPO2: 5, 1;
        GAPO3: 6, 1;
        GAPO4: 7, 1;
        BERR: 8, 1;
        STA1: 9, 1;
        STA2: 10, 1;
        STA3: 11, 1;
        STA4: 12, 1;
    }
}

pub mod DMAC {
    fields! {
        /// FIFO level that raises DREQ
        DREQ: 0, 8;
        /// FIFO level that raises PANIC
        PANIC: 8, 8;
        ENAB: 31, 1;
    }
}
