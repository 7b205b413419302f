//! SoC descriptions
//!
//! The peripherals are the same across the BCM283x family. What moves is
//! the physical base of the peripheral window, and the bus alias that the DMA
//! engines must use to see memory the CPU wrote.

use std::{fs, io, path::Path};

use crate::{
    ral::{cm, dma, gpio, pwm, PERIPHERAL_BUS_BASE},
    Error, Result,
};

/// Where the device tree publishes the peripheral window
const SOC_RANGES: &str = "/proc/device-tree/soc/ranges";

/// Addresses and clocks of one SoC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Soc {
    /// Physical (CPU) address of the peripheral window
    pub peripheral_base: u32,
    /// Bus alias OR'd into the bus address of RAM
    pub bus_alias: u32,
    /// Frequency of the oscillator clock source, in Hz
    pub oscillator: u32,
}

impl Default for Soc {
    fn default() -> Self {
        Soc::BCM2835
    }
}

impl Soc {
    /// Raspberry Pi 1 and Zero
    ///
    /// RAM is accessed through the L2-coherent alias.
    pub const BCM2835: Soc = Soc {
        peripheral_base: 0x2000_0000,
        bus_alias: 0x4000_0000,
        oscillator: 19_200_000,
    };
    /// Raspberry Pi 2 and 3
    ///
    /// RAM is accessed through the uncached alias.
    pub const BCM2836: Soc = Soc {
        peripheral_base: 0x3F00_0000,
        bus_alias: 0xC000_0000,
        oscillator: 19_200_000,
    };

    /// Detect the SoC from the device tree
    pub fn detect() -> Result<Self> {
        Self::from_ranges(Path::new(SOC_RANGES))
    }

    fn from_ranges(path: &Path) -> Result<Self> {
        let ranges = fs::read(path).map_err(Error::SocDetection)?;
        let base = peripheral_base(&ranges).ok_or_else(|| {
            Error::SocDetection(io::Error::new(io::ErrorKind::InvalidData, "short soc/ranges"))
        })?;
        match base {
            base if base == Soc::BCM2835.peripheral_base => Ok(Soc::BCM2835),
            base if base == Soc::BCM2836.peripheral_base => Ok(Soc::BCM2836),
            base => Err(Error::UnsupportedSoc(base)),
        }
    }

    /// Physical address of DMA engine `index`
    pub fn dma_base(&self, index: u8) -> Result<u32> {
        let offset = match index {
            0..=14 => dma::DMA0_OFFSET + u32::from(index) * dma::STRIDE,
            15 => dma::DMA15_OFFSET,
            _ => return Err(Error::UnsupportedDmaEngine(index)),
        };
        Ok(self.peripheral_base + offset)
    }

    /// Physical address of the PWM controller
    pub const fn pwm_base(&self) -> u32 {
        self.peripheral_base + pwm::OFFSET
    }

    /// Physical address of the GPIO block
    pub const fn gpio_base(&self) -> u32 {
        self.peripheral_base + gpio::OFFSET
    }

    /// Physical address of the PWM clock manager
    pub const fn cm_pwm_base(&self) -> u32 {
        self.peripheral_base + cm::OFFSET
    }

    /// Bus address of the PWM FIFO, the destination of every transfer
    pub const fn pwm_fifo_bus(&self) -> u32 {
        PERIPHERAL_BUS_BASE + pwm::OFFSET + pwm::FIF1_OFFSET
    }
}

/// Find the CPU address of the peripheral window in a `soc/ranges` property
///
/// Each entry is big-endian cells: child address, parent address, size. With
/// a single-cell parent the address sits at bytes 4..8. A two-cell parent
/// (BCM2711) puts a zero high word there, and the address follows it.
fn peripheral_base(ranges: &[u8]) -> Option<u32> {
    let cell = |at: usize| -> Option<u32> {
        Some(u32::from_be_bytes(ranges.get(at..at + 4)?.try_into().ok()?))
    };
    match cell(4)? {
        0 => cell(8),
        base => Some(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peripheral_addresses() {
        let soc = Soc::BCM2835;
        assert_eq!(soc.dma_base(0).unwrap(), 0x2000_7000);
        assert_eq!(soc.dma_base(5).unwrap(), 0x2000_7500);
        assert_eq!(soc.dma_base(14).unwrap(), 0x2000_7E00);
        assert_eq!(soc.dma_base(15).unwrap(), 0x20E0_5000);
        assert!(matches!(soc.dma_base(16), Err(Error::UnsupportedDmaEngine(16))));
        assert_eq!(soc.pwm_base(), 0x2020_C000);
        assert_eq!(soc.gpio_base(), 0x2020_0000);
        assert_eq!(soc.cm_pwm_base(), 0x2010_10A0);
        assert_eq!(soc.pwm_fifo_bus(), 0x7E20_C018);

        assert_eq!(Soc::BCM2836.pwm_base(), 0x3F20_C000);
        assert_eq!(Soc::BCM2836.pwm_fifo_bus(), 0x7E20_C018);
    }

    #[test]
    fn ranges_decoding() {
        let pi1 = [0x7E, 0, 0, 0, 0x20, 0, 0, 0, 0x01, 0, 0, 0];
        assert_eq!(peripheral_base(&pi1), Some(0x2000_0000));
        let pi3 = [0x7E, 0, 0, 0, 0x3F, 0, 0, 0, 0x01, 0, 0, 0];
        assert_eq!(peripheral_base(&pi3), Some(0x3F00_0000));
        let pi4 = [0x7E, 0, 0, 0, 0, 0, 0, 0, 0xFE, 0, 0, 0, 0x01, 0x80, 0, 0];
        assert_eq!(peripheral_base(&pi4), Some(0xFE00_0000));
        assert_eq!(peripheral_base(&[0x7E, 0]), None);
    }

    #[test]
    fn unknown_soc_is_rejected() {
        let path = std::env::temp_dir().join(format!("rpi-ws2811-ranges-{}", std::process::id()));
        fs::write(&path, [0x7E, 0, 0, 0, 0, 0, 0, 0, 0xFE, 0, 0, 0]).unwrap();
        let result = Soc::from_ranges(&path);
        fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(Error::UnsupportedSoc(0xFE00_0000))));
    }
}
