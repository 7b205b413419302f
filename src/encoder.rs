//! Waveform encoding
//!
//! Each LED data bit goes out as a three-bit symbol: `110` for a one, `100`
//! for a zero. At three symbol bits per data bit, the PWM serializer shapes
//! the high and low pulse widths the strips expect.
//!
//! The output buffer feeds both PWM channels through a single FIFO. The
//! serializers take words in turn, so even words belong to channel 0 and odd
//! words to channel 1. Symbols pack from bit 31 down.

use crate::strip::{Strip, CHANNELS};

/// Shortest low time between two frames, in microseconds
pub const RESET_MICROS: u64 = 55;
/// Symbol for a one bit
pub const SYMBOL_HIGH: u8 = 0b110;
/// Symbol for a zero bit
pub const SYMBOL_LOW: u8 = 0b100;

const SYMBOL_BITS: u32 = 3;
/// Bits on the wire per LED: three colors, eight bits, three symbol bits each
const BITS_PER_LED: u64 = 3 * 8 * SYMBOL_BITS as u64;

/// Returns the number of symbol bits one channel needs for `leds` LEDs,
/// including the reset interval
pub fn bit_count(leds: usize, frequency: u32) -> u64 {
    let reset = RESET_MICROS * u64::from(SYMBOL_BITS) * u64::from(frequency) / 1_000_000;
    leds as u64 * BITS_PER_LED + reset
}

/// Returns the size of the output buffer for `leds` LEDs per channel
///
/// The size covers both channels, and it's a multiple of 8 so that every
/// word pair feeds both serializers.
pub fn pwm_byte_count(leds: usize, frequency: u32) -> usize {
    let bytes = ((bit_count(leds, frequency) >> 3) & !7) + 4 + 4;
    (bytes * CHANNELS as u64) as usize
}

/// Fill each channel's words with its idle level
///
/// Inverted channels idle high. Must run again whenever a strip's inversion
/// changes, since [`encode`] only writes the words that carry LED data.
pub fn prime(words: &mut [u32], strips: &[Strip]) {
    for (channel, strip) in strips.iter().enumerate() {
        let idle = if strip.invert { !0 } else { 0 };
        for word in words.iter_mut().skip(channel).step_by(CHANNELS) {
            *word = idle;
        }
    }
}

/// Write position within one channel's words
struct Cursor {
    word: usize,
    bit: u32,
}

impl Cursor {
    fn new(channel: usize) -> Self {
        Cursor {
            word: channel,
            bit: 31,
        }
    }

    fn put(&mut self, words: &mut [u32], high: bool) {
        let word = &mut words[self.word];
        *word &= !(1 << self.bit);
        *word |= u32::from(high) << self.bit;

        if self.bit == 0 {
            self.word += CHANNELS;
            self.bit = 31;
        } else {
            self.bit -= 1;
        }
    }
}

/// Returns how many LEDs fit in `channel`'s share of `len` words
fn capacity(len: usize, channel: usize) -> usize {
    let words = len.saturating_sub(channel).div_ceil(CHANNELS);
    (words as u64 * 32 / BITS_PER_LED) as usize
}

/// Returns the wire order of a color's bytes: green, red, blue
const fn wire_order(color: u32) -> [u8; 3] {
    [(color >> 8) as u8, (color >> 16) as u8, color as u8]
}

/// Encode every strip's colors into `words`
///
/// `words` should be sized by [`pwm_byte_count`] for the longest strip, and
/// primed with [`prime`]. LEDs that don't fit in `words` are dropped.
pub fn encode(words: &mut [u32], strips: &[Strip]) {
    for (channel, strip) in strips.iter().enumerate() {
        let mut cursor = Cursor::new(channel);
        for &color in strip.leds().iter().take(capacity(words.len(), channel)) {
            for byte in wire_order(color) {
                for bit in (0..8).rev() {
                    let mut symbol = if byte & (1 << bit) != 0 {
                        SYMBOL_HIGH
                    } else {
                        SYMBOL_LOW
                    };
                    if strip.invert {
                        symbol = !symbol & 0b111;
                    }
                    for position in (0..SYMBOL_BITS).rev() {
                        cursor.put(words, symbol & (1 << position) != 0);
                    }
                }
            }
        }
    }
}
