//! GPIO registers

use super::{RORegister, RWRegister, WORegister};

/// Offset of the GPIO block from the peripheral base
pub const OFFSET: u32 = 0x0020_0000;

#[repr(C)]
pub struct RegisterBlock {
    /// Function select, ten pins per register, three bits per pin
    pub GPFSEL: [RWRegister<u32>; 6],
    _reserved0: u32,
    pub GPSET: [WORegister<u32>; 2],
    _reserved1: u32,
    pub GPCLR: [WORegister<u32>; 2],
    _reserved2: u32,
    pub GPLEV: [RORegister<u32>; 2],
    _reserved3: u32,
    pub GPEDS: [RWRegister<u32>; 2],
    _reserved4: u32,
    pub GPREN: [RWRegister<u32>; 2],
    _reserved5: u32,
    pub GPFEN: [RWRegister<u32>; 2],
    _reserved6: u32,
    pub GPHEN: [RWRegister<u32>; 2],
    _reserved7: u32,
    pub GPLEN: [RWRegister<u32>; 2],
    _reserved8: u32,
    pub GPAREN: [RWRegister<u32>; 2],
    _reserved9: u32,
    pub GPAFEN: [RWRegister<u32>; 2],
    _reserved10: u32,
    pub GPPUD: RWRegister<u32>,
    pub GPPUDCLK: [RWRegister<u32>; 2],
    _reserved11: [u32; 4],
    pub TEST: RWRegister<u32>,
}

/// Width of one pin's function select field
pub const FSEL_WIDTH: u32 = 3;
/// Pins covered by one function select register
pub const PINS_PER_FSEL: u8 = 10;
