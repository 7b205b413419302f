//! PWM clock and serializer setup
//!
//! The PWM controller runs both channels as serializers, each shifting out
//! one 32-bit FIFO word per 32 clocks. The clock manager feeds it three clocks
//! per LED data bit, one per symbol bit.
//!
//! The PWM block is rumored to lock up when its registers are written back
//! to back. Every write here is followed by a short settle delay.

use std::time::Duration;

use crate::{
    platform::Platform,
    poll::{self, SETTLE},
    ral::{self, cm, pwm},
    Error, Result,
};

/// Symbol bits per LED data bit
pub const SYMBOLS_PER_BIT: u32 = 3;
/// Bits the serializer shifts out per FIFO word
const WORD_BITS: u32 = 32;
/// Largest integer clock divisor
const DIVI_MAX: u32 = 0xFFF;

/// FIFO level below which the PWM asks for data
const DREQ_THRESHOLD: u32 = 3;
/// FIFO level below which the PWM raises its AXI priority
const PANIC_THRESHOLD: u32 = 7;

/// Compute the clock divisor that yields `frequency` LED bits per second
///
/// Fails if the divisor doesn't fit the clock manager's 12-bit integer field.
pub fn divisor(oscillator: u32, frequency: u32) -> Result<u32> {
    let symbol_rate = u64::from(frequency) * u64::from(SYMBOLS_PER_BIT);
    if symbol_rate == 0 {
        return Err(Error::UnsupportedFrequency(frequency));
    }
    let divi = u64::from(oscillator) / symbol_rate;
    if !(1..=u64::from(DIVI_MAX)).contains(&divi) {
        return Err(Error::UnsupportedFrequency(frequency));
    }
    Ok(divi as u32)
}

/// Stop the PWM output and kill its clock
///
/// Waits for the clock manager to report that the clock stopped.
pub fn stop<P: Platform>(
    platform: &P,
    pwm: &pwm::RegisterBlock,
    cm: &cm::RegisterBlock,
    timeout: Duration,
) -> Result<()> {
    // Turn off the PWM in case it's already running
    ral::write_reg!(ral::pwm, pwm, CTL, 0);
    platform.delay(SETTLE);

    // Kill the clock if it was already running
    ral::write_reg!(ral::cm, cm, CTL, PASSWD: PASSWORD, KILL: 1);
    platform.delay(SETTLE);
    poll::until(platform, timeout, "PWM clock to stop", || {
        ral::read_reg!(ral::cm, cm, CTL, BUSY == 0)
    })
}

/// Run the PWM clock at `frequency`, and put both PWM channels in DMA-fed
/// serializer mode
///
/// Any running output is stopped first.
pub fn configure<P: Platform>(
    platform: &P,
    pwm: &pwm::RegisterBlock,
    cm: &cm::RegisterBlock,
    oscillator: u32,
    frequency: u32,
    timeout: Duration,
) -> Result<()> {
    let divi = divisor(oscillator, frequency)?;
    stop(platform, pwm, cm, timeout)?;

    // Oscillator source, integer divisor, then enable and wait for lock
    log::debug!("PWM clock: {oscillator} Hz / {divi}");
    ral::write_reg!(ral::cm, cm, DIV, PASSWD: PASSWORD, DIVI: divi);
    ral::write_reg!(ral::cm, cm, CTL, PASSWD: PASSWORD, SRC: OSC);
    ral::write_reg!(ral::cm, cm, CTL, PASSWD: PASSWORD, SRC: OSC, ENAB: 1);
    platform.delay(SETTLE);
    poll::until(platform, timeout, "PWM clock to start", || {
        ral::read_reg!(ral::cm, cm, CTL, BUSY == 1)
    })?;

    // The FIFO drains far slower than DMA fills it, so a low DREQ threshold
    // with a panic boost is enough to avoid underruns.
    ral::write_reg!(ral::pwm, pwm, RNG1, WORD_BITS);
    platform.delay(SETTLE);
    ral::write_reg!(ral::pwm, pwm, RNG2, WORD_BITS);
    platform.delay(SETTLE);
    ral::write_reg!(ral::pwm, pwm, CTL, CLRF1: 1);
    platform.delay(SETTLE);
    ral::write_reg!(ral::pwm, pwm, DMAC, ENAB: 1, PANIC: PANIC_THRESHOLD, DREQ: DREQ_THRESHOLD);
    platform.delay(SETTLE);
    ral::write_reg!(ral::pwm, pwm, CTL, USEF1: 1, MODE1: 1, USEF2: 1, MODE2: 1);
    platform.delay(SETTLE);
    ral::modify_reg!(ral::pwm, pwm, CTL, PWEN1: 1, PWEN2: 1);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mapper, sim::Sim, soc::Soc};

    const OSC: u32 = 19_200_000;

    #[test]
    fn divisor_for_common_rates() {
        assert_eq!(divisor(OSC, 800_000).unwrap(), 8);
        assert_eq!(divisor(OSC, 400_000).unwrap(), 16);
        assert!(matches!(divisor(OSC, 0), Err(Error::UnsupportedFrequency(0))));
        // Faster than a third of the oscillator
        assert!(divisor(OSC, 7_000_000).is_err());
        // Slower than the divisor can reach
        assert!(divisor(OSC, 1_000).is_err());
        assert_eq!(divisor(OSC, 1_600).unwrap(), 4000);
        // Either side of the largest divisor
        assert_eq!(divisor(OSC, 1_563).unwrap(), 4094);
        assert!(matches!(divisor(OSC, 1_562), Err(Error::UnsupportedFrequency(1_562))));
    }

    #[test]
    fn configure_programs_clock_and_serializers() {
        let sim = Sim::new();
        let soc = Soc::BCM2835;
        let regs = mapper::map_all(&sim, &soc, 5).unwrap();

        configure(&sim, &regs.pwm, &regs.cm, OSC, 800_000, Duration::from_millis(50)).unwrap();

        assert_eq!(regs.cm.DIV.read(), 0x5A00_0000 | (8 << 12));
        let ctl = regs.cm.CTL.read();
        assert_eq!(ctl & 0xFF00_001F, 0x5A00_0011, "{ctl:#X}");
        assert_ne!(ctl & (1 << 7), 0, "clock reports busy");

        assert_eq!(regs.pwm.RNG1.read(), 32);
        assert_eq!(regs.pwm.RNG2.read(), 32);
        assert_eq!(regs.pwm.DMAC.read(), 0x8000_0703);
        // USEF1 | MODE1 | PWEN1 | USEF2 | MODE2 | PWEN2
        assert_eq!(regs.pwm.CTL.read(), 0x2323);
    }

    #[test]
    fn clock_that_never_locks_times_out() {
        let sim = Sim::new();
        let regs = mapper::map_all(&sim, &Soc::BCM2835, 5).unwrap();
        sim.freeze_clock();

        let err = configure(&sim, &regs.pwm, &regs.cm, OSC, 800_000, Duration::from_millis(2))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout("PWM clock to start")), "{err:?}");
    }

    #[test]
    fn stop_kills_the_clock() {
        let sim = Sim::new();
        let regs = mapper::map_all(&sim, &Soc::BCM2835, 5).unwrap();
        configure(&sim, &regs.pwm, &regs.cm, OSC, 800_000, Duration::from_millis(50)).unwrap();

        stop(&sim, &regs.pwm, &regs.cm, Duration::from_millis(50)).unwrap();
        assert_eq!(regs.pwm.CTL.read(), 0);
        assert_eq!(regs.cm.CTL.read() & (1 << 7), 0);
        assert_ne!(regs.cm.CTL.read() & (1 << 5), 0);
    }
}
