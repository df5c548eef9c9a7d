//! Hardware timers.

use bitfield_struct::bitfield;
use log::trace;
use vantage_arch::{Block, Half, Word};

use super::pic::{Pic, Source};

/// Timer array.
///
/// Four 16-bit up-counters. Channels 1..=3 may cascade, counting overflows
/// of the previous channel instead of prescaled cycles.
#[derive(Debug, Default)]
pub struct Timers {
    /// Timer channels.
    pub ch: [Channel; 4],
}

/// Per-step overflow counts, used to drive sound FIFO sampling and the
/// FIFO-refill DMA trigger.
pub type Overflows = [Word; 4];

impl Timers {
    /// Advances all channels by `cycles` elapsed CPU cycles.
    ///
    /// Returns how many times each channel overflowed during this step.
    pub fn run(&mut self, cycles: Word, pic: &mut Pic) -> Overflows {
        let mut overflows = Overflows::default();
        let mut carried = 0;

        for (idx, ch) in self.ch.iter_mut().enumerate() {
            if !ch.ctrl.enable() {
                carried = 0;
                continue;
            }

            let increments = if ch.ctrl.cascade() && idx > 0 {
                carried
            } else {
                ch.prescale(cycles)
            };

            let count = ch.advance(increments);
            if count > 0 {
                trace!("timer {idx} overflowed ({count}x)");
                if ch.ctrl.irq() {
                    pic.raise(Source::timer(idx));
                }
            }
            overflows[idx] = count;
            carried = count;
        }

        overflows
    }

    /// Reads the live counter of a channel.
    #[must_use]
    pub fn counter(&self, idx: usize) -> Half {
        self.ch[idx].counter
    }

    /// Stores a channel's reload value.
    pub fn set_reload(&mut self, idx: usize, value: Half) {
        self.ch[idx].reload = value;
    }

    /// Stores a channel's control register.
    ///
    /// A rising edge on the enable bit reloads the counter and resets the
    /// prescaler.
    pub fn set_ctrl(&mut self, idx: usize, value: Half) {
        let ch = &mut self.ch[idx];
        let was = ch.ctrl.enable();
        ch.ctrl = Control::from_bits(value & Control::MASK);
        if !was && ch.ctrl.enable() {
            ch.counter = ch.reload;
            ch.scaled = 0;
        }
    }
}

impl Block for Timers {
    fn reset(&mut self) {
        std::mem::take(self);
    }
}

/// Timer channel.
#[derive(Debug, Default)]
pub struct Channel {
    /// Reload value, loaded into the counter on enable and on overflow.
    pub reload: Half,
    /// Live counter.
    pub counter: Half,
    /// Control register.
    pub ctrl: Control,
    /// Prescaler accumulator.
    scaled: Word,
}

impl Channel {
    /// Accumulates cycles into the prescaler, yielding counter increments.
    fn prescale(&mut self, cycles: Word) -> Word {
        let threshold = match self.ctrl.freq() {
            0 => 1,
            1 => 64,
            2 => 256,
            3 => 1024,
            _ => unreachable!(),
        };
        self.scaled += cycles;
        let ticks = self.scaled / threshold;
        self.scaled %= threshold;
        ticks
    }

    /// Advances the counter, returning the number of overflows.
    fn advance(&mut self, increments: Word) -> Word {
        if increments == 0 {
            return 0;
        }
        let space = 0x1_0000 - Word::from(self.counter);
        if increments < space {
            self.counter += increments as Half;
            return 0;
        }
        // Overflowed at least once; further wraps repeat from the reload.
        let period = 0x1_0000 - Word::from(self.reload);
        let rest = increments - space;
        self.counter = self.reload + (rest % period) as Half;
        1 + rest / period
    }
}

/// Timer control register.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct Control {
    /// `CNT[1:0]`: Prescaler select (1, 64, 256, 1024).
    #[bits(2)]
    pub freq: u8,
    /// `CNT[2]`: Count-up on previous channel overflow (channels 1..=3).
    pub cascade: bool,
    #[bits(3)]
    __: u8,
    /// `CNT[6]`: Raise interrupt on overflow.
    pub irq: bool,
    /// `CNT[7]`: Channel enable.
    pub enable: bool,
    #[bits(8)]
    __: u8,
}

impl Control {
    /// Writable bit mask.
    pub const MASK: Half = 0b0000_0000_1100_0111;
}
