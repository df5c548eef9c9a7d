//! I/O register window.
//!
//! The 1 KiB register window multiplexes every peripheral's register file.
//! Live registers dispatch to their owning part; everything else falls back
//! to raw halfword storage so programs read back what they wrote.

use vantage_arch::mem::Ram;
use vantage_arch::{Byte, Half, Word};

use super::super::apu::Apu;
use super::super::dma::Dma;
use super::super::joypad::Joypad;
use super::super::pic::Pic;
use super::super::ppu::{reg, Ppu};
use super::super::timer::Timers;

/// I/O window and the peripherals behind it.
#[derive(Debug, Default)]
pub struct Io {
    /// Video unit.
    pub ppu: Ppu,
    /// Audio unit.
    pub apu: Apu,
    /// DMA engine.
    pub dma: Dma,
    /// Timer array.
    pub timers: Timers,
    /// Interrupt controller.
    pub pic: Pic,
    /// Joypad controller.
    pub joypad: Joypad,
    /// Fallback register storage.
    raw: Ram<0x400>,
}

impl Io {
    /// Updates the joypad state, wiring the keypad interrupt through.
    pub fn set_keys(&mut self, state: Half) {
        let Self { joypad, pic, .. } = self;
        joypad.set_state(state, pic);
    }

    /// Resets every peripheral and the fallback storage.
    pub fn reset(&mut self) {
        use vantage_arch::Block;
        self.ppu.reset();
        self.apu.reset();
        self.dma.reset();
        self.timers.reset();
        self.pic.reset();
        self.joypad.reset();
        self.raw.clear();
    }

    /// Reads a register halfword.
    #[must_use]
    pub fn read_16(&self, offset: usize) -> Half {
        let ppu = &self.ppu.reg;
        match offset {
            0x000 => ppu.dispcnt.into_bits(),
            0x004 => ppu.dispstat.into_bits(),
            0x006 => self.ppu.line(),
            0x008..=0x00e => ppu.bgcnt[(offset - 0x008) / 2].into_bits(),
            0x048 => ppu.winin,
            0x04a => ppu.winout,
            0x050 => ppu.bldcnt.into_bits(),
            0x052 => ppu.bldalpha,
            0x054 => ppu.bldy,
            0x082 => self.apu.ctrl.into_bits(),
            // Only the master-enable bit reads back; the tone-channel
            // status bits stay clear (no tone hardware).
            0x084 => self.apu.master & 0x0080,
            0x0ba | 0x0c6 | 0x0d2 | 0x0de => self.dma.ctrl((offset - 0x0ba) / 12),
            0x100 | 0x104 | 0x108 | 0x10c => self.timers.counter((offset - 0x100) / 4),
            0x102 | 0x106 | 0x10a | 0x10e => {
                self.timers.ch[(offset - 0x102) / 4].ctrl.into_bits()
            }
            0x130 => self.joypad.keys,
            0x132 => self.joypad.ctrl,
            0x200 => self.pic.ena,
            0x202 => self.pic.req,
            0x208 => self.pic.ime,
            _ => self.raw.load_16(offset & 0x3fe),
        }
    }

    /// Writes a register halfword.
    #[allow(clippy::too_many_lines)]
    pub fn write_16(&mut self, offset: usize, value: Half) {
        let ppu = &mut self.ppu.reg;
        match offset {
            0x000 => ppu.dispcnt = reg::DisplayControl::from_bits(value),
            0x004 => {
                // Status bits 0..=2 are read-only.
                let status = ppu.dispstat.into_bits() & reg::DisplayStatus::STATUS;
                ppu.dispstat = reg::DisplayStatus::from_bits(
                    (value & !reg::DisplayStatus::STATUS) | status,
                );
            }
            0x008..=0x00e => {
                ppu.bgcnt[(offset - 0x008) / 2] = reg::Background::from_bits(value);
            }
            0x010..=0x01e => {
                let bg = (offset - 0x010) / 4;
                if offset & 2 == 0 {
                    ppu.hofs[bg] = value & 0x1ff;
                } else {
                    ppu.vofs[bg] = value & 0x1ff;
                }
            }
            0x020..=0x026 | 0x030..=0x036 => {
                let bg = (offset - 0x020) / 0x10;
                match offset & 0x6 {
                    0x0 => ppu.pa[bg] = value,
                    0x2 => ppu.pb[bg] = value,
                    0x4 => ppu.pc[bg] = value,
                    _ => ppu.pd[bg] = value,
                }
            }
            0x028..=0x02e | 0x038..=0x03e => {
                let bg = (offset - 0x028) / 0x10;
                let word = if offset & 0x4 == 0 {
                    &mut ppu.refx[bg]
                } else {
                    &mut ppu.refy[bg]
                };
                if offset & 2 == 0 {
                    *word = (*word & 0xffff_0000) | Word::from(value);
                } else {
                    *word = (*word & 0x0000_ffff) | (Word::from(value) << 16);
                }
                *word &= 0x0fff_ffff;
            }
            0x040 => ppu.win0h = value,
            0x042 => ppu.win1h = value,
            0x044 => ppu.win0v = value,
            0x046 => ppu.win1v = value,
            0x048 => ppu.winin = value & 0x3f3f,
            0x04a => ppu.winout = value & 0x3f3f,
            0x04c => ppu.mosaic = value,
            0x050 => ppu.bldcnt = reg::Blend::from_bits(value),
            0x052 => ppu.bldalpha = value & 0x1f1f,
            0x054 => ppu.bldy = value & 0x1f,
            0x082 => self.apu.set_ctrl(value),
            0x084 => self.apu.master = value & 0x0080,
            0x088 => self.apu.bias = value,
            0x0b0..=0x0de => self.write_dma(offset, value),
            0x100..=0x10e => {
                let ch = (offset - 0x100) / 4;
                if offset & 2 == 0 {
                    self.timers.set_reload(ch, value);
                } else {
                    self.timers.set_ctrl(ch, value);
                }
            }
            // Key state is read-only.
            0x130 => return,
            0x132 => self.joypad.ctrl = value,
            0x200 => self.pic.ena = value & Pic::MASK,
            // Write-1-to-clear; nothing is stored.
            0x202 => {
                self.pic.acknowledge(value);
                return;
            }
            0x208 => self.pic.ime = value,
            _ => {}
        }
        self.raw.store_16(offset & 0x3fe, value);
    }

    /// Writes a register byte via read-modify-write of its halfword.
    pub fn write_8(&mut self, offset: usize, data: Byte) {
        // Byte writes to the request register clear only that byte's bits.
        if offset & !1 == 0x202 {
            self.pic.acknowledge(Half::from(data) << (8 * (offset & 1)));
            return;
        }
        let aligned = offset & !1;
        let current = self.read_16(aligned);
        let value = if offset & 1 == 0 {
            (current & 0xff00) | Half::from(data)
        } else {
            (current & 0x00ff) | (Half::from(data) << 8)
        };
        self.write_16(aligned, value);
    }

    /// Handles a write into a DMA channel's register block.
    fn write_dma(&mut self, offset: usize, value: Half) {
        // Word registers assemble from raw halves, so store first.
        self.raw.store_16(offset & 0x3fe, value);
        let ch = (offset - 0x0b0) / 12;
        let base = 0x0b0 + ch * 12;
        match offset - base {
            0x0 | 0x2 => {
                let sad = Word::from(self.raw.load_16(base))
                    | (Word::from(self.raw.load_16(base + 2)) << 16);
                self.dma.set_src(ch, sad);
            }
            0x4 | 0x6 => {
                let dad = Word::from(self.raw.load_16(base + 4))
                    | (Word::from(self.raw.load_16(base + 6)) << 16);
                self.dma.set_dst(ch, dad);
            }
            0x8 => self.dma.set_count(ch, value),
            0xa => self.dma.set_ctrl(ch, value),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_fallback_round_trips() {
        let mut io = Io::default();
        io.write_16(0x060, 0x1234); // tone register, unmodelled
        assert_eq!(io.read_16(0x060), 0x1234);
    }

    #[test]
    fn request_register_is_write_one_to_clear() {
        let mut io = Io::default();
        io.pic.req = 0x0005;
        io.write_16(0x202, 0x0001);
        assert_eq!(io.read_16(0x202), 0x0004);
        // Byte writes clear only their half.
        io.pic.req = 0x0101;
        io.write_8(0x203, 0x01);
        assert_eq!(io.read_16(0x202), 0x0001);
    }

    #[test]
    fn display_status_protects_flag_bits() {
        let mut io = Io::default();
        io.ppu.reg.dispstat = reg::DisplayStatus::from_bits(0x0003);
        io.write_16(0x004, 0xffff);
        let stat = io.read_16(0x004);
        assert_eq!(stat & 0x0007, 0x0003);
        assert_ne!(stat & 0x0008, 0);
    }

    #[test]
    fn affine_reference_assembles_from_halves() {
        let mut io = Io::default();
        io.write_16(0x028, 0x4567);
        io.write_16(0x02a, 0xf123);
        assert_eq!(io.ppu.reg.refx[0], 0x0123_4567);
        io.write_16(0x03c, 0x8000);
        io.write_16(0x03e, 0x0004);
        assert_eq!(io.ppu.reg.refy[1], 0x0004_8000);
    }

    #[test]
    fn timer_counter_reads_live_value() {
        let mut io = Io::default();
        io.write_16(0x100, 0xfff0); // reload
        io.write_16(0x102, 0x0080); // enable
        assert_eq!(io.read_16(0x100), 0xfff0);
        assert_eq!(io.read_16(0x102) & 0x0080, 0x0080);
    }
}
