//! Direct memory access.
//!
//! Four prioritized channels perform bulk bus transfers on behalf of the
//! program. A channel latches its source and destination when the enable bit
//! rises, then fires according to its start timing: immediately, on video
//! blanking edges, or on sound FIFO drain.

use bitfield_struct::bitfield;
use log::{debug, trace};
use vantage_arch::{Block, Half, Word};

/// FIFO-A port address, the fixed destination of channel 1/2 sound DMA.
pub const FIFO_A: Word = 0x0400_00a0;
/// FIFO-B port address.
pub const FIFO_B: Word = 0x0400_00a4;

/// Transfer start timing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timing {
    /// Fire on the enable edge.
    Immediate,
    /// Fire at vertical-blank entry.
    VBlank,
    /// Fire at each horizontal-blank edge on visible lines.
    HBlank,
    /// Channel-specific: sound FIFO refill (1, 2) or video capture (3).
    Special,
}

impl Timing {
    /// Decodes the two timing bits.
    #[must_use]
    pub fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            0 => Self::Immediate,
            1 => Self::VBlank,
            2 => Self::HBlank,
            _ => Self::Special,
        }
    }
}

/// DMA engine.
#[derive(Debug, Default)]
pub struct Dma {
    /// DMA channels, in priority order (0 highest).
    pub ch: [Channel; 4],
}

impl Dma {
    /// Stores a channel's source address register.
    pub fn set_src(&mut self, idx: usize, value: Word) {
        self.ch[idx].sad = value & if idx == 0 { 0x07ff_ffff } else { 0x0fff_ffff };
    }

    /// Stores a channel's destination address register.
    pub fn set_dst(&mut self, idx: usize, value: Word) {
        self.ch[idx].dad = value & if idx == 3 { 0x0fff_ffff } else { 0x07ff_ffff };
    }

    /// Stores a channel's word-count register.
    pub fn set_count(&mut self, idx: usize, value: Half) {
        self.ch[idx].count = value & Channel::count_mask(idx);
    }

    /// Stores a channel's control register.
    ///
    /// A rising edge on the enable bit latches the internal source and
    /// destination; immediate-timing channels become pending at once.
    pub fn set_ctrl(&mut self, idx: usize, value: Half) {
        let ch = &mut self.ch[idx];
        let was = ch.ctrl.enable();
        ch.ctrl = Control::from_bits(value);
        if !was && ch.ctrl.enable() {
            ch.src = ch.sad;
            ch.dst = ch.dad;
            debug!(
                "dma {idx} armed: {:#010x} -> {:#010x} x{:#x} ({:?})",
                ch.src,
                ch.dst,
                ch.units(idx, false),
                ch.timing(),
            );
            if ch.timing() == Timing::Immediate {
                ch.pending = true;
            }
        }
    }

    /// Reads back a channel's control register.
    #[must_use]
    pub fn ctrl(&self, idx: usize) -> Half {
        self.ch[idx].ctrl.into_bits()
    }

    /// Marks enabled channels with the given timing as pending.
    pub fn request(&mut self, timing: Timing) {
        for (idx, ch) in self.ch.iter_mut().enumerate() {
            // Channel 3's special timing is video capture, which is not
            // modelled; FIFO requests arrive via `request_fifo` instead.
            if timing == Timing::Special {
                continue;
            }
            if ch.ctrl.enable() && ch.timing() == timing {
                trace!("dma {idx} triggered ({timing:?})");
                ch.pending = true;
            }
        }
    }

    /// Marks a sound-FIFO channel as pending if it is bound to `port`.
    pub fn request_fifo(&mut self, port: Word) {
        for idx in 1..=2 {
            let ch = &mut self.ch[idx];
            if ch.ctrl.enable() && ch.timing() == Timing::Special && ch.dad == port {
                trace!("dma {idx} triggered (fifo)");
                ch.pending = true;
            }
        }
    }

    /// Returns the highest-priority pending channel, if any.
    #[must_use]
    pub fn pending(&self) -> Option<usize> {
        self.ch.iter().position(|ch| ch.pending)
    }
}

impl Block for Dma {
    fn reset(&mut self) {
        std::mem::take(self);
    }
}

/// DMA channel.
#[derive(Debug, Default)]
pub struct Channel {
    /// Source address register.
    pub sad: Word,
    /// Destination address register.
    pub dad: Word,
    /// Word-count register.
    pub count: Half,
    /// Control register.
    pub ctrl: Control,
    /// Latched source address.
    pub src: Word,
    /// Latched destination address.
    pub dst: Word,
    /// Transfer requested and not yet performed.
    pub pending: bool,
}

impl Channel {
    /// Returns the count-field mask for a channel index.
    #[must_use]
    pub fn count_mask(idx: usize) -> Half {
        if idx == 3 { 0xffff } else { 0x3fff }
    }

    /// Returns the channel's start timing.
    #[must_use]
    pub fn timing(&self) -> Timing {
        Timing::from_bits(self.ctrl.timing())
    }

    /// Returns the number of units to transfer.
    ///
    /// Zero encodes the channel's maximum; sound-FIFO transfers are fixed at
    /// four words.
    #[must_use]
    pub fn units(&self, idx: usize, fifo: bool) -> Word {
        if fifo {
            return 4;
        }
        match self.count & Self::count_mask(idx) {
            0 if idx == 3 => 0x1_0000,
            0 => 0x4000,
            n => Word::from(n),
        }
    }
}

/// DMA control register.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct Control {
    #[bits(5)]
    __: u8,
    /// `CNT[6:5]`: Destination adjustment (increment, decrement, fixed,
    /// increment+reload).
    #[bits(2)]
    pub dst_adjust: u8,
    /// `CNT[8:7]`: Source adjustment (increment, decrement, fixed).
    #[bits(2)]
    pub src_adjust: u8,
    /// `CNT[9]`: Repeat on retrigger.
    pub repeat: bool,
    /// `CNT[10]`: Transfer 32-bit words instead of halfwords.
    pub word: bool,
    /// `CNT[11]`: Game-pak DRQ (not modelled).
    pub drq: bool,
    /// `CNT[13:12]`: Start timing.
    #[bits(2)]
    pub timing: u8,
    /// `CNT[14]`: Raise interrupt on completion.
    pub irq: bool,
    /// `CNT[15]`: Channel enable.
    pub enable: bool,
}
