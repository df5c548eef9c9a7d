//! Serial EEPROM save memory.

use log::{debug, trace, warn};
use vantage_arch::{Block, Byte, Half, Word};

/// EEPROM protocol state.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum State {
    /// Awaiting a start bit.
    #[default]
    Idle,
    /// Start bit seen; the next bit selects read or write.
    Command,
    /// Accumulating a read address.
    ReadAddress,
    /// Awaiting the read request's stop bit.
    ReadStop,
    /// Producing the four leading busy bits of a read.
    ReadDummy,
    /// Producing the 64 data bits of a read.
    ReadData,
    /// Accumulating a write address.
    WriteAddress,
    /// Accumulating 64 data bits.
    WriteData,
    /// Awaiting the write's termination bit.
    WriteStop,
}

/// Serial EEPROM backing.
///
/// Storage is addressed in 64-bit blocks over a one-bit serial interface:
/// the program clocks request bits in with halfword writes and data bits out
/// with halfword reads, usually via DMA. The 4 Kbit part carries a 6-bit
/// address, the 64 Kbit part a 14-bit address of which only 10 bits select a
/// block.
#[derive(Debug)]
pub struct Eeprom {
    /// Storage, erased to `0xFF`.
    data: Box<[Byte]>,
    /// Size variant (64 Kbit when set).
    large: bool,
    /// Size variant latch; set on first use.
    latched: bool,
    /// Protocol state.
    state: State,
    /// Bit counter within the current phase.
    bits: u32,
    /// Address accumulator.
    addr: Word,
    /// 64-bit transfer buffer.
    buffer: u64,
    /// Buffer holds data for the current read transaction.
    valid: bool,
    /// Post-write busy countdown in cycles.
    busy: Word,
    /// Unsaved-changes flag.
    dirty: bool,
}

impl Eeprom {
    /// Bytes per addressed block.
    pub const BLOCK: usize = 8;
    /// Leading busy bits of a read.
    pub const DUMMY_BITS: u32 = 4;
    /// Data bits per transaction.
    pub const DATA_BITS: u32 = 64;
    /// Busy window after a committed write, in cycles.
    pub const WRITE_DELAY: Word = 1000;

    /// Constructs a new, erased `Eeprom`.
    #[must_use]
    pub fn new(large: bool) -> Self {
        let size = if large { 0x2000 } else { 0x200 };
        Self {
            data: vec![0xff; size].into_boxed_slice(),
            large,
            latched: false,
            state: State::Idle,
            bits: 0,
            addr: 0,
            buffer: 0,
            valid: false,
            busy: 0,
            dirty: false,
        }
    }

    /// Checks if this is the 64 Kbit part.
    #[must_use]
    pub fn is_large(&self) -> bool {
        self.large
    }

    /// Checks whether a read transaction is in its data phase.
    ///
    /// The DMA fast path only engages when this holds; otherwise bursts fall
    /// back to ordinary per-halfword bus traffic.
    #[must_use]
    pub fn readable(&self) -> bool {
        self.valid && matches!(self.state, State::ReadDummy | State::ReadData)
    }

    /// Applies the size hint from the word count of a DMA burst.
    ///
    /// A 9-unit burst carries a 6-bit address (4 Kbit part); a 17-unit burst
    /// a 14-bit address (64 Kbit part). The first hint latches the variant.
    pub fn hint(&mut self, count: Word) {
        if self.latched {
            return;
        }
        let large = match count {
            9 => false,
            17 => true,
            _ => return,
        };
        self.latched = true;
        if large != self.large {
            debug!("eeprom size latched: {} Kbit", if large { 64 } else { 4 });
            self.large = large;
            let size = if large { 0x2000 } else { 0x200 };
            let mut data = vec![0xff; size].into_boxed_slice();
            let keep = data.len().min(self.data.len());
            data[..keep].copy_from_slice(&self.data[..keep]);
            self.data = data;
        }
    }

    /// Latches the size variant explicitly (e.g. from a save blob's size).
    pub fn latch_size(&mut self, large: bool) {
        self.latched = false;
        self.hint(if large { 17 } else { 9 });
    }

    /// Advances the post-write busy countdown.
    pub fn tick(&mut self, cycles: Word) {
        self.busy = self.busy.saturating_sub(cycles);
    }

    /// Address bits expected for the current variant.
    fn addr_bits(&self) -> u32 {
        if self.large { 14 } else { 6 }
    }

    /// Block-select mask for the current variant.
    fn addr_mask(&self) -> Word {
        if self.large { 0x3ff } else { 0x3f }
    }

    /// Clocks one bit out of the chip.
    pub fn read_bit(&mut self) -> Half {
        if self.busy > 0 {
            return 0;
        }
        match self.state {
            State::ReadDummy => {
                self.bits += 1;
                if self.bits >= Self::DUMMY_BITS {
                    self.state = State::ReadData;
                    self.bits = 0;
                }
                0
            }
            State::ReadData => {
                let bit = (self.buffer >> (Self::DATA_BITS - 1 - self.bits)) & 1;
                self.bits += 1;
                if self.bits >= Self::DATA_BITS {
                    self.state = State::Idle;
                    self.bits = 0;
                    self.valid = false;
                }
                bit as Half
            }
            // Not driving the line: reads float high.
            _ => 1,
        }
    }

    /// Clocks one bit into the chip.
    pub fn write_bit(&mut self, value: Half) {
        if self.busy > 0 {
            return;
        }
        let bit = Word::from(value & 1);
        self.state = match self.state {
            State::Idle => {
                if bit == 1 {
                    State::Command
                } else {
                    State::Idle
                }
            }
            State::Command => {
                self.bits = 0;
                self.addr = 0;
                if bit == 1 {
                    State::ReadAddress
                } else {
                    State::WriteAddress
                }
            }
            State::ReadAddress => {
                self.addr = (self.addr << 1) | bit;
                self.bits += 1;
                if self.bits >= self.addr_bits() {
                    self.latched = true;
                    self.load_buffer();
                    self.bits = 0;
                    State::ReadStop
                } else {
                    State::ReadAddress
                }
            }
            State::ReadStop => {
                // Conventionally a 0 bit; a 1 is tolerated (some titles send
                // it and still expect the dummy bits).
                if bit != 0 {
                    trace!("eeprom: nonstandard read stop bit");
                }
                self.valid = true;
                self.bits = 0;
                State::ReadDummy
            }
            State::WriteAddress => {
                self.addr = (self.addr << 1) | bit;
                self.bits += 1;
                if self.bits >= self.addr_bits() {
                    self.latched = true;
                    self.bits = 0;
                    self.buffer = 0;
                    State::WriteData
                } else {
                    State::WriteAddress
                }
            }
            State::WriteData => {
                self.buffer = (self.buffer << 1) | u64::from(bit);
                self.bits += 1;
                if self.bits >= Self::DATA_BITS {
                    self.bits = 0;
                    State::WriteStop
                } else {
                    State::WriteData
                }
            }
            State::WriteStop => {
                // Termination bit: either level commits.
                if bit != 0 {
                    trace!("eeprom: nonstandard write termination bit");
                }
                self.commit();
                State::Idle
            }
            // During read phases, writes are DMA clocking noise.
            State::ReadDummy | State::ReadData => self.state,
        };
    }

    /// Loads the addressed block into the transfer buffer.
    fn load_buffer(&mut self) {
        let block = (self.addr & self.addr_mask()) as usize;
        let offset = block * Self::BLOCK;
        self.buffer = if offset + Self::BLOCK <= self.data.len() {
            u64::from_be_bytes(self.data[offset..offset + Self::BLOCK].try_into().unwrap())
        } else {
            warn!("eeprom: read past storage (block {block})");
            u64::MAX
        };
        trace!("eeprom: read block {block}: {:#018x}", self.buffer);
    }

    /// Commits the transfer buffer to the addressed block.
    fn commit(&mut self) {
        let block = (self.addr & self.addr_mask()) as usize;
        let offset = block * Self::BLOCK;
        if offset + Self::BLOCK <= self.data.len() {
            self.data[offset..offset + Self::BLOCK].copy_from_slice(&self.buffer.to_be_bytes());
            self.dirty = true;
            trace!("eeprom: wrote block {block}: {:#018x}", self.buffer);
        } else {
            warn!("eeprom: write past storage (block {block})");
        }
        self.busy = Self::WRITE_DELAY;
        self.valid = false;
    }

    /// Returns the save blob.
    #[must_use]
    pub fn data(&self) -> &[Byte] {
        &self.data
    }

    /// Loads a save blob.
    pub fn load(&mut self, blob: &[Byte]) {
        let len = blob.len().min(self.data.len());
        self.data[..len].copy_from_slice(&blob[..len]);
    }

    /// Checks and clears the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Block for Eeprom {
    fn reset(&mut self) {
        self.state = State::Idle;
        self.bits = 0;
        self.addr = 0;
        self.buffer = 0;
        self.valid = false;
        self.busy = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_block(chip: &mut Eeprom, addr: Word, data: u64) {
        chip.write_bit(1); // start
        chip.write_bit(0); // write command
        let bits = chip.addr_bits();
        for i in (0..bits).rev() {
            chip.write_bit(((addr >> i) & 1) as Half);
        }
        for i in (0..64).rev() {
            chip.write_bit(((data >> i) & 1) as Half);
        }
        chip.write_bit(0); // termination
    }

    fn read_block(chip: &mut Eeprom, addr: Word) -> (Vec<Half>, u64) {
        chip.write_bit(1); // start
        chip.write_bit(1); // read command
        let bits = chip.addr_bits();
        for i in (0..bits).rev() {
            chip.write_bit(((addr >> i) & 1) as Half);
        }
        chip.write_bit(0); // stop
        let busy = (0..4).map(|_| chip.read_bit()).collect();
        let mut data = 0u64;
        for _ in 0..64 {
            data = (data << 1) | u64::from(chip.read_bit());
        }
        (busy, data)
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut chip = Eeprom::new(true);
        write_block(&mut chip, 0x10, 0xdead_beef_cafe_babe);
        chip.tick(Eeprom::WRITE_DELAY);
        let (busy, data) = read_block(&mut chip, 0x10);
        assert_eq!(busy, vec![0, 0, 0, 0]);
        assert_eq!(data, 0xdead_beef_cafe_babe);
    }

    #[test]
    fn busy_window_reads_low() {
        let mut chip = Eeprom::new(false);
        write_block(&mut chip, 0x01, 0x1122_3344_5566_7788);
        assert_eq!(chip.read_bit(), 0);
        chip.tick(Eeprom::WRITE_DELAY);
        // Idle line floats high again.
        assert_eq!(chip.read_bit(), 1);
    }

    #[test]
    fn nonstandard_stop_bits_are_tolerated() {
        let mut chip = Eeprom::new(false);
        // Write with termination bit 1 still commits.
        chip.write_bit(1);
        chip.write_bit(0);
        for _ in 0..6 {
            chip.write_bit(0);
        }
        for _ in 0..64 {
            chip.write_bit(0);
        }
        chip.write_bit(1);
        chip.tick(Eeprom::WRITE_DELAY);
        // Read with stop bit 1 still produces dummy + data bits.
        chip.write_bit(1);
        chip.write_bit(1);
        for _ in 0..6 {
            chip.write_bit(0);
        }
        chip.write_bit(1);
        assert!(chip.readable());
        let mut data = u64::MAX;
        for _ in 0..4 {
            assert_eq!(chip.read_bit(), 0);
        }
        for _ in 0..64 {
            data = (data << 1) | u64::from(chip.read_bit());
        }
        assert_eq!(data, 0);
    }

    #[test]
    fn dma_count_hint_latches_size() {
        let mut chip = Eeprom::new(true);
        chip.hint(9);
        assert!(!chip.is_large());
        assert_eq!(chip.data().len(), 0x200);
        // Latched: a later conflicting hint is ignored.
        chip.hint(17);
        assert!(!chip.is_large());
    }

    #[test]
    fn large_addresses_ignore_upper_bits() {
        let mut chip = Eeprom::new(true);
        write_block(&mut chip, 0x3c05, 0x0123_4567_89ab_cdef);
        chip.tick(Eeprom::WRITE_DELAY);
        // Upper 4 of the 14 address bits are ignored; block 5 was written.
        let (_, data) = read_block(&mut chip, 0x0005);
        assert_eq!(data, 0x0123_4567_89ab_cdef);
    }
}
