//! Clock manager registers for the PWM clock

use super::RWRegister;

/// Offset of the PWM clock manager from the peripheral base
pub const OFFSET: u32 = 0x0010_10A0;

#[repr(C)]
pub struct RegisterBlock {
    pub CTL: RWRegister<u32>,
    pub DIV: RWRegister<u32>,
}

pub mod CTL {
    fields! {
        SRC: 0, 4, {
            GND = 0,
            OSC = 1,
            TSTDBG0 = 2,
            TSTDBG1 = 3,
            PLLA = 4,
            PLLC = 5,
            PLLD = 6,
            HDMIAUX = 7,
        };
        ENAB: 4, 1;
        KILL: 5, 1;
        /// The clock generator is running
        BUSY: 7, 1;
        FLIP: 8, 1;
        MASH: 9, 2;
        /// Writes are ignored unless this field holds the password
        PASSWD: 24, 8, { PASSWORD = 0x5A };
    }
}

pub mod DIV {
    fields! {
        DIVF: 0, 12;
        DIVI: 12, 12;
        PASSWD: 24, 8, { PASSWORD = 0x5A };
    }
}
