//! LED strips and their colors

/// Number of PWM channels, and so of strips one device drives
pub const CHANNELS: usize = 2;

/// Pack a color as `0x00RRGGBB`
pub const fn rgb(red: u8, green: u8, blue: u8) -> u32 {
    (red as u32) << 16 | (green as u32) << 8 | blue as u32
}

/// One LED strip, driven by one PWM channel
///
/// The device allocates the color storage when it initializes, and releases
/// it when it finalizes. Until then, [`leds`](Strip::leds) is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Strip {
    /// GPIO pin carrying the strip's data line. 0 leaves the channel unused
    pub pin: u8,
    /// Number of LEDs on the strip
    pub count: usize,
    /// Complement the output, for strips behind an inverting level shifter
    pub invert: bool,
    leds: Vec<u32>,
}

impl Strip {
    /// A strip of `count` LEDs on `pin`
    pub fn new(pin: u8, count: usize) -> Self {
        Strip {
            pin,
            count,
            ..Strip::default()
        }
    }

    /// Returns the LED colors, packed as `0x00RRGGBB`
    pub fn leds(&self) -> &[u32] {
        &self.leds
    }

    /// Returns the LED colors, to change them before the next render
    pub fn leds_mut(&mut self) -> &mut [u32] {
        &mut self.leds
    }

    /// Set LED `index` to `color`
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the end of the strip, or if the device
    /// isn't initialized.
    pub fn set(&mut self, index: usize, color: u32) {
        self.leds[index] = color;
    }

    /// Returns `true` if the strip's channel carries data
    pub(crate) fn is_used(&self) -> bool {
        self.pin != 0
    }

    pub(crate) fn allocate(&mut self) {
        self.leds = vec![0; self.count];
    }

    pub(crate) fn release(&mut self) {
        self.leds = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_follows_the_device() {
        let mut strip = Strip::new(18, 3);
        assert!(strip.leds().is_empty());

        strip.allocate();
        assert_eq!(strip.leds(), &[0, 0, 0]);
        strip.set(2, rgb(0x12, 0x34, 0x56));
        assert_eq!(strip.leds()[2], 0x0012_3456);

        strip.release();
        assert!(strip.leds().is_empty());
        assert_eq!(strip.count, 3);
    }
}
