//! Audio model.
//!
//! The console streams pre-encoded 8-bit PCM through two byte-wise FIFOs,
//! each clocked by a timer overflow. This unit latches the popped byte as
//! the channel's output level, mixes both channels into stereo 16-bit pairs
//! at a fixed cadence, and hands them to the host through a lock-free ring.

use bitfield_struct::bitfield;
use log::trace;
use vantage_arch::{Block, Half, Word};

use self::fifo::Fifo;
use self::ring::Ring;
use crate::api::part::audio::{Audio as Api, Sample};
use crate::parts::timer::Overflows;

mod fifo;
mod ring;

/// CPU cycles per output sample (16.78 MHz / 32768 Hz).
pub const CADENCE: Word = 512;

/// Output ring depth in stereo pairs (a few frames of audio).
const RING_DEPTH: usize = 0x2000;

/// Direct-sound channel select.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Channel {
    /// FIFO A.
    A,
    /// FIFO B.
    B,
}

/// Audio processing unit.
///
/// | Address | Size | Name       | Description             |
/// |:-------:|------|------------|-------------------------|
/// | `$0082` | Half | SOUNDCNT_H | Direct-sound control    |
/// | `$0084` | Half | SOUNDCNT_X | Master enable           |
/// | `$0088` | Half | SOUNDBIAS  | Output bias             |
/// | `$00A0` | Word | FIFO_A     | Sample port (write-only)|
/// | `$00A4` | Word | FIFO_B     | Sample port (write-only)|
#[derive(Debug)]
pub struct Apu {
    /// Direct-sound control.
    pub ctrl: Control,
    /// Master enable (bit 7).
    pub master: Half,
    /// Output bias.
    pub bias: Half,
    /// Sample queues.
    fifo: [Fifo; 2],
    /// Latched output level per channel.
    level: [i8; 2],
    /// Output cadence accumulator.
    clock: Word,
    /// Host sample ring.
    ring: Ring,
}

impl Default for Apu {
    fn default() -> Self {
        Self {
            ctrl: Control::default(),
            master: 0,
            bias: 0x0200,
            fifo: [Fifo::default(), Fifo::default()],
            level: [0; 2],
            clock: 0,
            ring: Ring::new(RING_DEPTH),
        }
    }
}

impl Apu {
    /// Constructs a new `Apu`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the host sample ring.
    ///
    /// The clone shares storage with the unit; hand it to the audio thread.
    #[must_use]
    pub fn ring(&self) -> Ring {
        self.ring.clone()
    }

    /// Handles a write to a FIFO port.
    pub fn write_fifo(&mut self, ch: Channel, value: Word) {
        trace!("fifo {ch:?} <- {value:#010x}");
        self.fifo[ch as usize].push_word(value);
    }

    /// Stores the direct-sound control register, acting on the reset bits.
    pub fn set_ctrl(&mut self, value: Half) {
        let value = Control::from_bits(value);
        if value.reset_a() {
            self.fifo[0].clear();
        }
        if value.reset_b() {
            self.fifo[1].clear();
        }
        // Reset bits act immediately and read back clear.
        self.ctrl = value.with_reset_a(false).with_reset_b(false);
    }

    /// Checks whether master sound output is enabled.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.master & 0x0080 != 0
    }

    /// Consumes timer overflows, popping one sample per overflow of the
    /// routed timer.
    ///
    /// Returns, per FIFO, whether it has drained to half depth and wants a
    /// refill DMA.
    pub fn on_timer_overflow(&mut self, overflows: &Overflows) -> [bool; 2] {
        let mut refill = [false; 2];
        if !self.enabled() {
            return refill;
        }
        let routed = [self.ctrl.timer_a() as usize, self.ctrl.timer_b() as usize];
        for ch in 0..2 {
            let pops = overflows[routed[ch]];
            for _ in 0..pops {
                if let Some(sample) = self.fifo[ch].pop() {
                    self.level[ch] = sample;
                }
            }
            if pops > 0 && self.fifo[ch].len() <= Fifo::DEPTH / 2 {
                refill[ch] = true;
            }
        }
        refill
    }

    /// Advances the output clock, mixing samples at the fixed cadence.
    pub fn run(&mut self, cycles: Word) {
        self.clock += cycles;
        while self.clock >= CADENCE {
            self.clock -= CADENCE;
            let sample = self.mix();
            self.ring.push(sample);
        }
    }

    /// Mixes both channels into one stereo pair.
    fn mix(&self) -> Sample {
        if !self.enabled() {
            return Sample::default();
        }
        // Full volume scales an 8-bit sample into a comfortable 16-bit
        // range; the half-volume bit drops one further bit.
        let scale = |level: i8, full: bool| -> i16 {
            let base = i16::from(level) << 6;
            if full { base } else { base >> 1 }
        };
        let a = scale(self.level[0], self.ctrl.volume_a());
        let b = scale(self.level[1], self.ctrl.volume_b());

        let mut lt = 0i16;
        let mut rt = 0i16;
        if self.ctrl.left_a() {
            lt = lt.saturating_add(a);
        }
        if self.ctrl.right_a() {
            rt = rt.saturating_add(a);
        }
        if self.ctrl.left_b() {
            lt = lt.saturating_add(b);
        }
        if self.ctrl.right_b() {
            rt = rt.saturating_add(b);
        }
        Sample { lt, rt }
    }
}

impl Api for Apu {
    fn drain(&mut self, buf: &mut [i16]) -> usize {
        self.ring.pop(buf)
    }
}

impl Block for Apu {
    fn ready(&self) -> bool {
        self.enabled()
    }

    fn reset(&mut self) {
        std::mem::take(self);
    }
}

/// Direct-sound control register.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct Control {
    /// `CNT[1:0]`: Tone channel volume (unused; no tone hardware modelled).
    #[bits(2)]
    __: u8,
    /// `CNT[2]`: FIFO A volume (0 = 50%, 1 = 100%).
    pub volume_a: bool,
    /// `CNT[3]`: FIFO B volume (0 = 50%, 1 = 100%).
    pub volume_b: bool,
    #[bits(4)]
    __: u8,
    /// `CNT[8]`: FIFO A right output enable.
    pub right_a: bool,
    /// `CNT[9]`: FIFO A left output enable.
    pub left_a: bool,
    /// `CNT[10]`: FIFO A timer select (0 or 1).
    #[bits(1)]
    pub timer_a: u8,
    /// `CNT[11]`: FIFO A reset (acts on write, reads back 0).
    pub reset_a: bool,
    /// `CNT[12]`: FIFO B right output enable.
    pub right_b: bool,
    /// `CNT[13]`: FIFO B left output enable.
    pub left_b: bool,
    /// `CNT[14]`: FIFO B timer select (0 or 1).
    #[bits(1)]
    pub timer_b: u8,
    /// `CNT[15]`: FIFO B reset (acts on write, reads back 0).
    pub reset_b: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_apu() -> Apu {
        let mut apu = Apu::new();
        apu.master = 0x0080;
        // FIFO A at full volume, both sides, timer 0.
        apu.set_ctrl(0x0304);
        apu
    }

    #[test]
    fn timer_overflow_latches_sample() {
        let mut apu = enabled_apu();
        apu.write_fifo(Channel::A, 0x0000_0040);
        apu.on_timer_overflow(&[1, 0, 0, 0]);
        assert_eq!(apu.level[0], 0x40);
        let mut buf = [0i16; 2];
        apu.run(CADENCE);
        assert_eq!(apu.drain(&mut buf), 2);
        assert_eq!(buf[0], 0x40 << 6);
        assert_eq!(buf[0], buf[1]);
    }

    #[test]
    fn master_disable_outputs_silence() {
        let mut apu = enabled_apu();
        apu.write_fifo(Channel::A, 0x7f7f_7f7f);
        apu.on_timer_overflow(&[1, 0, 0, 0]);
        apu.master = 0;
        apu.run(CADENCE);
        let mut buf = [0i16; 2];
        apu.drain(&mut buf);
        assert_eq!(buf, [0, 0]);
    }

    #[test]
    fn fifo_reset_bits_clear_queues() {
        let mut apu = enabled_apu();
        apu.write_fifo(Channel::A, 0x0102_0304);
        apu.set_ctrl(0x0304 | 0x0800);
        assert!(apu.fifo[0].is_empty());
        assert!(!apu.ctrl.reset_a());
    }

    #[test]
    fn half_empty_fifo_requests_refill() {
        let mut apu = enabled_apu();
        for _ in 0..4 {
            apu.write_fifo(Channel::A, 0);
        }
        // 16 bytes buffered; one pop drains to 15 and requests a refill.
        let refill = apu.on_timer_overflow(&[1, 0, 0, 0]);
        assert!(refill[0]);
        assert!(!refill[1]);
    }
}
