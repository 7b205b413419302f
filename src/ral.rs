//! A RAL-like module for the BCM283x peripherals driven by this crate
//!
//! Each peripheral is a `#[repr(C)]` register block. Bit-fields follow the
//! RAL convention (an `offset`, a `mask`, and `R` / `W` / `RW` modules of
//! enumerated values) so that the `ral_registers` macros work on them.
//!
//! Register arrays (GPIO function selects, for instance) can't go through the
//! macros. Access those registers directly.

#![allow(
    non_snake_case, // Compatibility with RAL
    non_upper_case_globals, // `offset` and `mask`
    unused, // Full register layouts, not all of it is used
)]

/// Describe the bit-fields of a register
///
/// `NAME: offset, width;` defines a field. Enumerated values go in braces
/// after the width, and land in the field's `RW` module.
macro_rules! fields {
    ($(
        $(#[$meta:meta])*
        $name:ident : $offset:expr, $width:expr $(, { $($value:ident = $raw:expr),* $(,)? })? ;
    )*) => {
        $(
            $(#[$meta])*
            pub mod $name {
                pub const offset: u32 = $offset;
                pub const mask: u32 = (((1u64 << $width) - 1) as u32) << offset;
                pub mod R {}
                pub mod W {}
                pub mod RW {
                    $($(pub const $value: u32 = $raw;)*)?
                }
            }
        )*
    };
}

pub mod cm;
pub mod dma;
pub mod gpio;
pub mod pwm;

pub use ral_registers::{modify_reg, read_reg, write_reg};
use ral_registers::{RORegister, RWRegister, WORegister};

//
// Helper type for mapped memory
//
// Similar to the RAL's `Instance` type, but more copy. The pointer
// is only valid while the mapping it came from is alive.
//

pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to mapped peripheral memory, and the
        // owner of the mapping outlives this handle.
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}

/// Bus address of the peripheral window, as seen by the DMA engines
pub const PERIPHERAL_BUS_BASE: u32 = 0x7E00_0000;
