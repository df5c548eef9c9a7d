//! Memory bus.
//!
//! Owns every memory region and, through the [I/O window](Io), every
//! peripheral except the CPU. Routes typed reads and writes with the
//! region's width restrictions, mirror rules, wait states, and open-bus
//! behaviour, and advances the peripheral clocks between instructions.

use log::warn;
use vantage_arch::mem::{Ram, Rom};
use vantage_arch::{Block, Byte, Half, Word};

use super::cart::save::Backing;
use super::cart::Cartridge;
use super::dma::{self, Timing};
use super::pic::Source;
use super::ppu::{Oam, Palette, Vram};

mod io;

pub use self::io::Io;

/// External work RAM.
pub type Ewram = Ram<0x4_0000>;
/// Internal work RAM.
pub type Iwram = Ram<0x8000>;

/// Memory bus.
#[derive(Debug, Default)]
pub struct Bus {
    /// Firmware ROM.
    pub bios: Rom,
    /// External work RAM (16-bit bus, waited).
    pub ewram: Ewram,
    /// Internal work RAM (32-bit bus, zero-wait).
    pub iwram: Iwram,
    /// Palette RAM.
    pub palette: Palette,
    /// Video RAM.
    pub vram: Vram,
    /// Sprite attribute RAM.
    pub oam: Oam,
    /// Game cartridge.
    pub cart: Option<Cartridge>,
    /// I/O window and peripherals.
    pub io: Io,
    /// Address of the executing instruction (firmware read protection).
    pub pc: Word,
    /// Last fetched instruction word (open-bus value).
    pub fetched: Word,
}

impl Bus {
    /// Constructs a new `Bus` with the given firmware image.
    #[must_use]
    pub fn new(bios: Rom) -> Self {
        Self {
            bios,
            ..Self::default()
        }
    }

    /// Folds a video RAM address onto the 96 KiB physical region.
    #[must_use]
    pub fn vram_offset(addr: Word) -> usize {
        (addr as usize & 0xff_ffff) % 0x1_8000
    }

    /// Returns the access cycle count for an address and width.
    #[must_use]
    pub fn cycles_for(&self, addr: Word, width: Word) -> Word {
        let wide = width == 4;
        match addr >> 24 {
            // 16-bit bus, zero-wait.
            0x00 | 0x05 | 0x06 => {
                if wide {
                    2
                } else {
                    1
                }
            }
            // 16-bit bus, two wait states.
            0x02 => {
                if wide {
                    6
                } else {
                    3
                }
            }
            // 32-bit bus, zero-wait.
            0x03 | 0x04 | 0x07 => 1,
            // ROM wait-state windows.
            0x08 | 0x09 => {
                if wide {
                    8
                } else {
                    5
                }
            }
            0x0a | 0x0b => {
                if wide {
                    10
                } else {
                    6
                }
            }
            0x0c | 0x0d => {
                if wide {
                    14
                } else {
                    9
                }
            }
            // 8-bit save bus.
            0x0e | 0x0f => 5,
            _ => 1,
        }
    }

    /// Checks whether an address lies in the EEPROM overlay.
    fn is_eeprom(&self, addr: Word) -> bool {
        addr >> 24 == 0x0d
            && matches!(
                self.cart.as_ref().map(|cart| &cart.save),
                Some(Backing::Eeprom(_))
            )
    }

    /// Reads a byte.
    pub fn read_8(&mut self, addr: Word) -> Byte {
        match addr >> 24 {
            0x00 => {
                // Firmware is only readable while executing inside it.
                if addr < 0x4000 && self.pc < 0x4000 {
                    self.bios.load_8(addr as usize)
                } else {
                    self.open_8(addr)
                }
            }
            0x02 => self.ewram.load_8(addr as usize & 0x3_ffff),
            0x03 => self.iwram.load_8(addr as usize & 0x7fff),
            0x04 => {
                let value = self.io.read_16(addr as usize & 0x3fe);
                (value >> (8 * (addr & 1))) as Byte
            }
            0x05 => self.palette.load_8(addr as usize & 0x3ff),
            0x06 => self.vram.load_8(Self::vram_offset(addr)),
            0x07 => self.oam.load_8(addr as usize & 0x3ff),
            0x08..=0x0c => self.rom_8(addr),
            0x0d => {
                if self.is_eeprom(addr) {
                    (self.eeprom_read() & 0xff) as Byte
                } else {
                    self.rom_8(addr)
                }
            }
            0x0e | 0x0f => self.save_8(addr),
            _ => self.open_8(addr),
        }
    }

    /// Reads an aligned halfword.
    fn get_16(&mut self, addr: Word) -> Half {
        match addr >> 24 {
            0x00 => {
                if addr < 0x4000 && self.pc < 0x4000 {
                    self.bios.load_16(addr as usize)
                } else {
                    self.open_16(addr)
                }
            }
            0x02 => self.ewram.load_16(addr as usize & 0x3_fffe),
            0x03 => self.iwram.load_16(addr as usize & 0x7ffe),
            0x04 => self.io.read_16(addr as usize & 0x3fe),
            0x05 => self.palette.load_16(addr as usize & 0x3fe),
            0x06 => self.vram.load_16(Self::vram_offset(addr) & !1),
            0x07 => self.oam.load_16(addr as usize & 0x3fe),
            0x08..=0x0c => self.rom_16(addr),
            0x0d => {
                if self.is_eeprom(addr) {
                    self.eeprom_read()
                } else {
                    self.rom_16(addr)
                }
            }
            0x0e | 0x0f => {
                let lo = Half::from(self.save_8(addr));
                let hi = Half::from(self.save_8(addr | 1));
                lo | (hi << 8)
            }
            _ => self.open_16(addr),
        }
    }

    /// Reads a halfword; misaligned accesses rotate by 8 bits.
    pub fn read_16(&mut self, addr: Word) -> Half {
        let value = self.get_16(addr & !1);
        if addr & 1 == 0 {
            value
        } else {
            value.rotate_right(8)
        }
    }

    /// Reads a word; misaligned accesses rotate into place.
    pub fn read_32(&mut self, addr: Word) -> Word {
        let base = addr & !3;
        let value = if self.is_eeprom(addr) {
            // Two serial halfword reads, low first.
            let lo = Word::from(self.eeprom_read());
            let hi = Word::from(self.eeprom_read());
            lo | (hi << 16)
        } else {
            let lo = Word::from(self.get_16(base));
            let hi = Word::from(self.get_16(base + 2));
            lo | (hi << 16)
        };
        value.rotate_right(8 * (addr & 3))
    }

    /// Writes a byte, honoring the video-memory width restrictions.
    pub fn write_8(&mut self, addr: Word, data: Byte) {
        match addr >> 24 {
            0x02 => self.ewram.store_8(addr as usize & 0x3_ffff, data),
            0x03 => self.iwram.store_8(addr as usize & 0x7fff, data),
            0x04 => self.io.write_8(addr as usize & 0x3ff, data),
            0x05 => {
                // Byte writes duplicate into the aligned halfword.
                let offset = addr as usize & 0x3fe;
                self.palette.store_16(offset, Half::from(data) * 0x0101);
            }
            0x06 => {
                let offset = Self::vram_offset(addr);
                if offset >= 0x1_0000 {
                    // Sprite tiles ignore byte writes.
                    return;
                }
                self.vram.store_16(offset & !1, Half::from(data) * 0x0101);
            }
            // Sprite attributes ignore byte writes.
            0x07 => {}
            0x0e | 0x0f => self.save_write(addr, data),
            // Byte writes cannot clock the EEPROM serial line.
            _ => {}
        }
    }

    /// Writes an aligned halfword.
    pub fn write_16(&mut self, addr: Word, data: Half) {
        let addr = addr & !1;
        match addr >> 24 {
            0x02 => self.ewram.store_16(addr as usize & 0x3_fffe, data),
            0x03 => self.iwram.store_16(addr as usize & 0x7ffe, data),
            0x04 => self.io.write_16(addr as usize & 0x3fe, data),
            0x05 => self.palette.store_16(addr as usize & 0x3fe, data),
            0x06 => self.vram.store_16(Self::vram_offset(addr) & !1, data),
            0x07 => self.oam.store_16(addr as usize & 0x3fe, data),
            0x0d if self.is_eeprom(addr) => self.eeprom_write(data),
            0x0e | 0x0f => self.save_write(addr, data as Byte),
            _ => {}
        }
    }

    /// Writes an aligned word.
    pub fn write_32(&mut self, addr: Word, data: Word) {
        let addr = addr & !3;
        // The sound FIFO ports accept whole words.
        if addr == dma::FIFO_A {
            self.io.apu.write_fifo(super::apu::Channel::A, data);
            return;
        }
        if addr == dma::FIFO_B {
            self.io.apu.write_fifo(super::apu::Channel::B, data);
            return;
        }
        if self.is_eeprom(addr) {
            self.eeprom_write(data as Half);
            self.eeprom_write((data >> 16) as Half);
            return;
        }
        self.write_16(addr, data as Half);
        self.write_16(addr + 2, (data >> 16) as Half);
    }

    /// Fetches an instruction halfword, bypassing save-state machinery.
    pub fn fetch_16(&mut self, addr: Word) -> Half {
        let addr = addr & !1;
        self.pc = addr;
        let value = match addr >> 24 {
            0x08..=0x0d => self.rom_16(addr),
            _ => self.get_16(addr),
        };
        self.fetched = Word::from(value) | (Word::from(value) << 16);
        value
    }

    /// Fetches an instruction word, bypassing save-state machinery.
    pub fn fetch_32(&mut self, addr: Word) -> Word {
        let addr = addr & !3;
        self.pc = addr;
        let value = match addr >> 24 {
            0x08..=0x0d => {
                let lo = Word::from(self.rom_16(addr));
                let hi = Word::from(self.rom_16(addr + 2));
                lo | (hi << 16)
            }
            _ => {
                let lo = Word::from(self.get_16(addr));
                let hi = Word::from(self.get_16(addr + 2));
                lo | (hi << 16)
            }
        };
        self.fetched = value;
        value
    }

    /// Advances all peripheral clocks, servicing any DMA they trigger.
    ///
    /// Returns the extra cycles consumed by DMA transfers.
    pub fn tick(&mut self, cycles: Word) -> Word {
        // DMA armed during the instruction fires before time advances.
        let mut extra = self.service_dma();
        let mut advance = cycles + extra;
        // DMA consumes time, which can itself cross a timing edge and
        // trigger more DMA; bound the feedback to keep a pathological
        // configuration from spinning forever.
        for _ in 0..8 {
            if advance == 0 {
                break;
            }
            self.advance(advance);
            advance = self.service_dma();
            extra += advance;
        }
        extra
    }

    /// Advances the video, timer, audio, and save-backing clocks.
    fn advance(&mut self, cycles: Word) {
        let Self {
            palette,
            vram,
            oam,
            cart,
            io,
            ..
        } = self;
        let Io {
            ppu,
            apu,
            dma,
            timers,
            pic,
            ..
        } = io;

        // Video first: blanking edges arm their DMA channels.
        let events = ppu.run(cycles, vram, palette, oam, pic);
        if events.vblank {
            dma.request(Timing::VBlank);
        }
        for _ in 0..events.hblanks {
            dma.request(Timing::HBlank);
        }

        // Timers next: overflows feed the audio FIFOs and their refill DMA.
        let overflows = timers.run(cycles, pic);
        let refill = apu.on_timer_overflow(&overflows);
        if refill[0] {
            dma.request_fifo(dma::FIFO_A);
        }
        if refill[1] {
            dma.request_fifo(dma::FIFO_B);
        }
        apu.run(cycles);

        if let Some(Backing::Eeprom(chip)) = cart.as_mut().map(|cart| &mut cart.save) {
            chip.tick(cycles);
        }
    }

    /// Runs every pending DMA channel in priority order.
    fn service_dma(&mut self) -> Word {
        let mut cycles = 0;
        let mut guard = 0;
        while let Some(idx) = self.io.dma.pending() {
            cycles += self.run_dma(idx);
            guard += 1;
            if guard > 16 {
                warn!("dma retrigger storm; deferring");
                break;
            }
        }
        cycles
    }

    /// Performs one channel's transfer.
    #[allow(clippy::too_many_lines)]
    fn run_dma(&mut self, idx: usize) -> Word {
        // Copy the channel state out so the bus is free for transfers.
        let ch = &mut self.io.dma.ch[idx];
        ch.pending = false;
        let ctrl = ch.ctrl;
        let fifo = ch.timing() == Timing::Special && (1..=2).contains(&idx);
        if ch.timing() == Timing::Special && idx == 3 {
            // Video capture is not modelled; drop the request.
            return 0;
        }
        let units = ch.units(idx, fifo);
        let wide = ctrl.word() || fifo;
        let step: Word = if wide { 4 } else { 2 };
        let mut src = ch.src;
        let mut dst = ch.dst;
        let dad = ch.dad;

        // The first burst aimed at the EEPROM region sizes the chip.
        if dst >> 24 == 0x0d {
            if let Some(Backing::Eeprom(chip)) = self.cart.as_mut().map(|cart| &mut cart.save) {
                chip.hint(units);
            }
        }

        let src_adjust = ctrl.src_adjust();
        let dst_adjust = if fifo { 2 } else { ctrl.dst_adjust() };
        let mut cycles = 2; // engine startup overhead

        let src_is_eeprom = self.is_eeprom(src);
        let dst_is_eeprom = self.is_eeprom(dst);
        let fast_read = src_is_eeprom
            && match self.cart.as_ref().map(|cart| &cart.save) {
                Some(Backing::Eeprom(chip)) => chip.readable(),
                _ => false,
            };

        for _ in 0..units {
            cycles += self.cycles_for(src, step) + self.cycles_for(dst, step);
            if dst_is_eeprom {
                // Serial write: each halfword carries one protocol bit.
                let bit = self.read_16(src & !1);
                self.eeprom_write(bit);
            } else if fast_read {
                // Serial read fast path: clock the state machine directly
                // instead of taking the general dispatch per halfword.
                let bit = self.eeprom_read();
                self.write_16(dst & !1, bit);
            } else if wide {
                let value = self.read_32(src & !3);
                self.write_32(dst & !3, value);
            } else {
                let value = self.read_16(src & !1);
                self.write_16(dst & !1, value);
            }

            match src_adjust {
                0 | 3 => src = src.wrapping_add(step),
                1 => src = src.wrapping_sub(step),
                _ => {}
            }
            match dst_adjust {
                0 | 3 => dst = dst.wrapping_add(step),
                1 => dst = dst.wrapping_sub(step),
                _ => {}
            }
        }

        // Write the walked addresses back; repeat with reload-mode
        // destination refetches the public register instead.
        let repeat = ctrl.repeat() && ctrl.timing() != 0;
        let ch = &mut self.io.dma.ch[idx];
        ch.src = src;
        ch.dst = if repeat && ctrl.dst_adjust() == 3 {
            dad
        } else {
            dst
        };
        if !repeat {
            // Immediate transfers always disable, regardless of repeat.
            ch.ctrl = ctrl.with_enable(false);
        }

        if ctrl.irq() {
            self.io.pic.raise(Source::dma(idx));
        }
        cycles
    }

    /// Reads a cartridge ROM byte through the wait-state windows.
    fn rom_8(&mut self, addr: Word) -> Byte {
        match &self.cart {
            Some(cart) => cart.rom().load_8(addr as usize & 0x1ff_ffff),
            None => self.open_8(addr),
        }
    }

    /// Reads a cartridge ROM halfword through the wait-state windows.
    fn rom_16(&mut self, addr: Word) -> Half {
        match &self.cart {
            Some(cart) => cart.rom().load_16(addr as usize & 0x1ff_fffe),
            None => self.open_16(addr),
        }
    }

    /// Reads the save region (SRAM or Flash; open bus otherwise).
    fn save_8(&mut self, addr: Word) -> Byte {
        match self.cart.as_mut().map(|cart| &mut cart.save) {
            Some(Backing::Sram(chip)) => chip.read(addr as usize & 0xffff),
            Some(Backing::Flash(chip)) => chip.read(addr as usize & 0xffff),
            // No chip in the socket: the floating bus echoes the address,
            // which presence checks rely on.
            _ => {
                let echo = addr & 0xffff;
                if addr & 1 == 0 {
                    echo as Byte
                } else {
                    (echo >> 8) as Byte
                }
            }
        }
    }

    /// Writes the save region (SRAM or Flash).
    fn save_write(&mut self, addr: Word, data: Byte) {
        match self.cart.as_mut().map(|cart| &mut cart.save) {
            Some(Backing::Sram(chip)) => chip.write(addr as usize & 0xffff, data),
            Some(Backing::Flash(chip)) => chip.write(addr as usize & 0xffff, data),
            _ => {}
        }
    }

    /// Clocks one bit out of the EEPROM.
    fn eeprom_read(&mut self) -> Half {
        match self.cart.as_mut().map(|cart| &mut cart.save) {
            Some(Backing::Eeprom(chip)) => chip.read_bit(),
            _ => 1,
        }
    }

    /// Clocks one bit into the EEPROM.
    fn eeprom_write(&mut self, data: Half) {
        if let Some(Backing::Eeprom(chip)) = self.cart.as_mut().map(|cart| &mut cart.save) {
            chip.write_bit(data);
        }
    }

    /// Open-bus byte: echoes the last fetched instruction word.
    fn open_8(&self, addr: Word) -> Byte {
        (self.fetched >> (8 * (addr & 3))) as Byte
    }

    /// Open-bus halfword.
    fn open_16(&self, addr: Word) -> Half {
        (self.fetched >> (8 * (addr & 2))) as Half
    }
}

impl Block for Bus {
    fn reset(&mut self) {
        self.ewram.clear();
        self.iwram.clear();
        self.palette.clear();
        self.vram.clear();
        self.oam.clear();
        self.io.reset();
        if let Some(cart) = &mut self.cart {
            cart.reset();
        }
        self.pc = 0;
        self.fetched = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parts::cart::header::Header;

    fn bus() -> Bus {
        Bus::new(Rom::from(vec![0u8; 0x4000]))
    }

    fn bus_with_rom(marker: &[u8], size: usize) -> Bus {
        let mut rom = vec![0u8; size];
        rom[0xbd] = Header::hchk(&rom);
        rom[0x1c0..0x1c0 + marker.len()].copy_from_slice(marker);
        for (i, byte) in rom.iter_mut().enumerate().skip(0x200).take(0x100) {
            *byte = i as u8;
        }
        let mut bus = bus();
        bus.cart = Some(Cartridge::new(&rom).unwrap());
        bus
    }

    #[test]
    fn iwram_mirrors_across_region() {
        let mut bus = bus();
        bus.write_32(0x0300_0010, 0x1234_5678);
        assert_eq!(bus.read_32(0x0300_8010), 0x1234_5678);
        assert_eq!(bus.read_32(0x03ff_8010), 0x1234_5678);
    }

    #[test]
    fn word_store_reads_back_as_bytes() {
        let mut bus = bus();
        bus.write_32(0x0200_0000, 0xdead_beef);
        assert_eq!(bus.read_8(0x0200_0000), 0xef);
        assert_eq!(bus.read_8(0x0200_0001), 0xbe);
        assert_eq!(bus.read_8(0x0200_0002), 0xad);
        assert_eq!(bus.read_8(0x0200_0003), 0xde);
    }

    #[test]
    fn small_rom_mirrors_within_window() {
        let bus = &mut bus_with_rom(b"SRAM_V113", 0x1000);
        let direct = bus.read_16(0x0800_0200);
        assert_eq!(bus.read_16(0x0800_1200), direct);
        assert_eq!(bus.read_16(0x0a00_0200), direct);
    }

    #[test]
    fn palette_byte_writes_duplicate() {
        let mut bus = bus();
        bus.write_8(0x0500_0021, 0xab);
        assert_eq!(bus.read_16(0x0500_0020), 0xabab);
    }

    #[test]
    fn oam_ignores_byte_writes() {
        let mut bus = bus();
        bus.write_16(0x0700_0000, 0x1234);
        bus.write_8(0x0700_0000, 0xff);
        assert_eq!(bus.read_16(0x0700_0000), 0x1234);
    }

    #[test]
    fn sprite_vram_ignores_byte_writes() {
        let mut bus = bus();
        bus.write_8(0x0601_0000, 0xff);
        assert_eq!(bus.read_16(0x0601_0000), 0x0000);
        // Background VRAM duplicates instead.
        bus.write_8(0x0600_0001, 0x77);
        assert_eq!(bus.read_16(0x0600_0000), 0x7777);
    }

    #[test]
    fn vram_upper_window_mirrors() {
        let mut bus = bus();
        bus.write_16(0x0601_0000, 0x4242);
        assert_eq!(bus.read_16(0x0601_8000), 0x4242);
    }

    #[test]
    fn misaligned_word_reads_rotate() {
        let mut bus = bus();
        bus.write_32(0x0300_0000, 0x1122_3344);
        assert_eq!(bus.read_32(0x0300_0001), 0x4411_2233);
    }

    #[test]
    fn open_bus_echoes_last_fetch() {
        let mut bus = bus();
        bus.iwram.store_32(0, 0xcafe_f00d);
        bus.fetch_32(0x0300_0000);
        assert_eq!(bus.read_32(0x1000_0000), 0xcafe_f00d);
        // Firmware reads from outside the firmware do the same.
        bus.pc = 0x0800_0000;
        assert_eq!(bus.read_32(0x0000_0000), 0xcafe_f00d);
    }

    #[test]
    fn immediate_dma_copies_a_block() {
        let mut bus = bus();
        for i in 0..4u32 {
            bus.write_32(0x0300_0000 + i * 4, 0x1111_0000 + i);
        }
        bus.write_32(0x0400_00b0, 0x0300_0000); // source
        bus.write_32(0x0400_00b4, 0x0200_0000); // destination
        bus.write_16(0x0400_00b8, 4); // count
        bus.write_16(0x0400_00ba, 0x8400); // enable, 32-bit, immediate
        bus.tick(0);
        for i in 0..4u32 {
            assert_eq!(bus.read_32(0x0200_0000 + i * 4), 0x1111_0000 + i);
        }
        // Immediate timing clears the enable bit.
        assert_eq!(bus.io.dma.ctrl(0) & 0x8000, 0);
    }

    #[test]
    fn dma_count_zero_transfers_maximum() {
        let mut bus = bus();
        bus.write_32(0x0400_00b0, 0x0300_0000);
        bus.write_32(0x0400_00b4, 0x0200_0000);
        bus.write_16(0x0400_00b8, 0); // zero count: channel 0 max
        bus.write_16(0x0400_00ba, 0x8000);
        bus.tick(0);
        let ch = &bus.io.dma.ch[0];
        assert_eq!(ch.src, 0x0300_0000 + 0x4000 * 2);
        assert_eq!(ch.dst, 0x0200_0000 + 0x4000 * 2);
    }

    #[test]
    fn dma_interrupt_raises_flag() {
        let mut bus = bus();
        bus.write_16(0x0400_00b8, 1);
        bus.write_16(0x0400_00ba, 0xc000); // enable, irq, immediate
        bus.tick(0);
        assert_ne!(bus.io.pic.req & Source::Dma0.mask(), 0);
    }

    #[test]
    fn eeprom_dma_burst_round_trips() {
        let mut bus = bus_with_rom(b"EEPROM_V122", 0x1000);
        // Assemble the 81-halfword write burst: start, write, 14-bit
        // address 0x10, 64 data bits, termination.
        let value = 0xdead_beef_cafe_babeu64;
        let mut bits = vec![1u16, 0];
        for i in (0..14).rev() {
            bits.push(((0x10 >> i) & 1) as u16);
        }
        for i in (0..64).rev() {
            bits.push(((value >> i) & 1) as u16);
        }
        bits.push(0);
        for (i, bit) in bits.iter().enumerate() {
            bus.write_16(0x0200_0000 + (i as Word) * 2, *bit);
        }
        bus.write_32(0x0400_00d4, 0x0200_0000);
        bus.write_32(0x0400_00d8, 0x0d00_0000);
        bus.write_16(0x0400_00dc, 81);
        bus.write_16(0x0400_00de, 0x8000);
        bus.tick(0);
        bus.tick(2000); // busy window

        // Read request: start, read, address, stop (17 halfwords).
        let mut bits = vec![1u16, 1];
        for i in (0..14).rev() {
            bits.push(((0x10 >> i) & 1) as u16);
        }
        bits.push(0);
        for (i, bit) in bits.iter().enumerate() {
            bus.write_16(0x0200_0200 + (i as Word) * 2, *bit);
        }
        bus.write_32(0x0400_00d4, 0x0200_0200);
        bus.write_32(0x0400_00d8, 0x0d00_0000);
        bus.write_16(0x0400_00dc, 17);
        bus.write_16(0x0400_00de, 0x8000);
        bus.tick(0);

        // Fetch 68 halfwords back out of the chip.
        bus.write_32(0x0400_00d4, 0x0d00_0000);
        bus.write_32(0x0400_00d8, 0x0200_0400);
        bus.write_16(0x0400_00dc, 68);
        bus.write_16(0x0400_00de, 0x8000);
        bus.tick(0);

        for i in 0..4 {
            assert_eq!(bus.read_16(0x0200_0400 + i * 2), 0, "busy bit {i}");
        }
        let mut data = 0u64;
        for i in 0..64 {
            data = (data << 1) | u64::from(bus.read_16(0x0200_0408 + i * 2) & 1);
        }
        assert_eq!(data, value);
    }
}
