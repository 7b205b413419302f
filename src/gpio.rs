//! GPIO routing of the PWM outputs

use crate::{ral::gpio, strip::Strip, Error, Result};

/// A GPIO function select code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Function {
    Input = 0,
    Output = 1,
    Alt0 = 4,
    Alt1 = 5,
    Alt2 = 6,
    Alt3 = 7,
    Alt4 = 3,
    Alt5 = 2,
}

/// Pins that can carry each PWM channel, and the function that routes them
const PINS: [&[(u8, Function)]; 2] = [
    &[(12, Function::Alt0), (18, Function::Alt5), (40, Function::Alt0)],
    &[
        (13, Function::Alt0),
        (19, Function::Alt5),
        (41, Function::Alt0),
        (45, Function::Alt0),
    ],
];

/// Returns the function that routes PWM `channel` to `pin`
///
/// `None` if the pin can't carry that channel.
pub fn alt_function(channel: usize, pin: u8) -> Option<Function> {
    PINS.get(channel)?
        .iter()
        .find(|(candidate, _)| *candidate == pin)
        .map(|&(_, function)| function)
}

/// Select `function` for `pin`
///
/// Other pins in the same function select register are untouched.
pub fn set_function(gpio: &gpio::RegisterBlock, pin: u8, function: Function) {
    let register = &gpio.GPFSEL[usize::from(pin / gpio::PINS_PER_FSEL)];
    let shift = u32::from(pin % gpio::PINS_PER_FSEL) * gpio::FSEL_WIDTH;
    let mask = ((1 << gpio::FSEL_WIDTH) - 1) << shift;
    let value = register.read() & !mask;
    register.write(value | ((function as u32) << shift));
}

/// Check that every used strip's pin can carry its channel
pub fn validate(strips: &[Strip]) -> Result<()> {
    for (channel, strip) in strips.iter().enumerate() {
        if strip.is_used() && alt_function(channel, strip.pin).is_none() {
            return Err(Error::UnsupportedPin {
                channel,
                pin: strip.pin,
            });
        }
    }
    Ok(())
}

/// Route every used strip's pin to its PWM channel
///
/// Strips with pin 0 are skipped. Fails before touching any register if a pin
/// can't carry its channel.
pub fn bind_pins(gpio: &gpio::RegisterBlock, strips: &[Strip]) -> Result<()> {
    validate(strips)?;
    for (channel, strip) in strips.iter().enumerate() {
        if let Some(function) = alt_function(channel, strip.pin).filter(|_| strip.is_used()) {
            log::debug!("GPIO {} -> PWM channel {channel} ({function:?})", strip.pin);
            set_function(gpio, strip.pin, function);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mapper, sim::Sim, soc::Soc};

    #[test]
    fn pin_table() {
        assert_eq!(alt_function(0, 18), Some(Function::Alt5));
        assert_eq!(alt_function(0, 12), Some(Function::Alt0));
        assert_eq!(alt_function(1, 19), Some(Function::Alt5));
        assert_eq!(alt_function(1, 45), Some(Function::Alt0));
        assert_eq!(alt_function(1, 18), None);
        assert_eq!(alt_function(0, 13), None);
        assert_eq!(alt_function(2, 18), None);
    }

    #[test]
    fn binds_only_used_pins() {
        let sim = Sim::new();
        let regs = mapper::map_all(&sim, &Soc::BCM2835, 5).unwrap();
        // Other pins in the register keep their functions
        regs.gpio.GPFSEL[1].write(0o1_1_1_1_1_1_1_1_1_1);

        let strips = [Strip::new(18, 10), Strip::default()];
        bind_pins(&regs.gpio, &strips).unwrap();

        assert_eq!(regs.gpio.GPFSEL[1].read(), 0o1_2_1_1_1_1_1_1_1_1);
        assert_eq!(regs.gpio.GPFSEL[0].read(), 0);
        assert_eq!(regs.gpio.GPFSEL[4].read(), 0);
    }

    #[test]
    fn binds_both_channels() {
        let sim = Sim::new();
        let regs = mapper::map_all(&sim, &Soc::BCM2835, 5).unwrap();
        let strips = [Strip::new(12, 1), Strip::new(45, 1)];
        bind_pins(&regs.gpio, &strips).unwrap();

        assert_eq!(regs.gpio.GPFSEL[1].read(), 4 << 6);
        assert_eq!(regs.gpio.GPFSEL[4].read(), 4 << 15);
    }

    #[test]
    fn unsupported_pin_touches_nothing() {
        let sim = Sim::new();
        let regs = mapper::map_all(&sim, &Soc::BCM2835, 5).unwrap();
        let strips = [Strip::new(18, 1), Strip::new(18, 1)];

        let err = bind_pins(&regs.gpio, &strips).unwrap_err();
        assert!(matches!(err, Error::UnsupportedPin { channel: 1, pin: 18 }));
        assert_eq!(regs.gpio.GPFSEL[1].read(), 0);
    }
}
