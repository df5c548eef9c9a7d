//! Interrupt handling.

use std::fmt::Display;

use log::trace;
use vantage_arch::{Block, Half};

/// Interrupt source.
///
/// Each source has a corresponding bit position in the enable and request
/// registers:
///
/// | Bit | Source           |
/// |-----|------------------|
/// |  0  | Vertical blank   |
/// |  1  | Horizontal blank |
/// |  2  | Scanline match   |
/// |  3  | Timer 0 overflow |
/// |  4  | Timer 1 overflow |
/// |  5  | Timer 2 overflow |
/// |  6  | Timer 3 overflow |
/// |  7  | Serial           |
/// |  8  | DMA 0            |
/// |  9  | DMA 1            |
/// | 10  | DMA 2            |
/// | 11  | DMA 3            |
/// | 12  | Keypad           |
/// | 13  | Cartridge        |
#[must_use]
#[rustfmt::skip]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    /// Vertical blank.
    VBlank = 0,
    /// Horizontal blank.
    HBlank = 1,
    /// Scanline counter matched its compare target.
    VCount = 2,
    /// Timer 0 overflow.
    Timer0 = 3,
    /// Timer 1 overflow.
    Timer1 = 4,
    /// Timer 2 overflow.
    Timer2 = 5,
    /// Timer 3 overflow.
    Timer3 = 6,
    /// Serial transfer (never raised; no link hardware modelled).
    Serial = 7,
    /// DMA channel 0 completion.
    Dma0   = 8,
    /// DMA channel 1 completion.
    Dma1   = 9,
    /// DMA channel 2 completion.
    Dma2   = 10,
    /// DMA channel 3 completion.
    Dma3   = 11,
    /// Keypad match.
    Keypad = 12,
    /// Cartridge (never raised; no cartridge IRQ hardware modelled).
    Cart   = 13,
}

impl Source {
    /// Returns the source's bit in the control registers.
    #[must_use]
    pub fn mask(self) -> Half {
        1 << (self as Half)
    }

    /// Returns the timer overflow source for the given channel.
    pub fn timer(channel: usize) -> Self {
        match channel {
            0 => Self::Timer0,
            1 => Self::Timer1,
            2 => Self::Timer2,
            3 => Self::Timer3,
            _ => unreachable!("no such timer channel: {channel}"),
        }
    }

    /// Returns the completion source for the given DMA channel.
    pub fn dma(channel: usize) -> Self {
        match channel {
            0 => Self::Dma0,
            1 => Self::Dma1,
            2 => Self::Dma2,
            3 => Self::Dma3,
            _ => unreachable!("no such DMA channel: {channel}"),
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Programmable interrupt controller.
///
/// | Address | Size | Name | Description        |
/// |:-------:|------|------|--------------------|
/// | `$0200` | Half | IE   | Interrupt enable   |
/// | `$0202` | Half | IF   | Interrupt request  |
/// | `$0208` | Half | IME  | Master enable      |
#[derive(Debug, Default)]
pub struct Pic {
    /// Interrupt enable.
    pub ena: Half,
    /// Interrupt request flags.
    pub req: Half,
    /// Interrupt master enable.
    pub ime: Half,
}

impl Pic {
    /// Valid source bits.
    pub const MASK: Half = 0x3fff;

    /// Raises an interrupt request.
    pub fn raise(&mut self, int: Source) {
        self.req |= int.mask();
        trace!("interrupt requested: {int}");
    }

    /// Acknowledges request bits (write-1-to-clear semantics).
    pub fn acknowledge(&mut self, bits: Half) {
        self.req &= !bits;
    }

    /// Returns the set of pending, enabled sources.
    ///
    /// Nonzero results wake a halted CPU regardless of the master enable or
    /// the CPU-side mask; whether an exception is actually taken is decided
    /// by the CPU.
    #[must_use]
    pub fn pending(&self) -> Half {
        self.ena & self.req & Self::MASK
    }

    /// Checks whether the master enable allows interrupt delivery.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.ime & 1 != 0
    }
}

impl Block for Pic {
    fn reset(&mut self) {
        std::mem::take(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_and_acknowledge_work() {
        let mut pic = Pic::default();
        pic.raise(Source::VBlank);
        pic.raise(Source::Dma3);
        assert_eq!(pic.req, 0x0801);
        pic.acknowledge(0x0001);
        assert_eq!(pic.req, 0x0800);
    }

    #[test]
    fn pending_respects_enable_mask() {
        let mut pic = Pic::default();
        pic.raise(Source::Timer0);
        assert_eq!(pic.pending(), 0);
        pic.ena = Source::Timer0.mask();
        assert_eq!(pic.pending(), Source::Timer0.mask());
    }
}
