//! Battery-backed static RAM.

use vantage_arch::{Block, Byte};

/// Static RAM backing.
///
/// 32 KiB of directly-addressed byte-wide storage.
#[derive(Debug)]
pub struct Sram {
    /// Storage, erased to `0xFF`.
    data: Box<[Byte]>,
    /// Unsaved-changes flag.
    dirty: bool,
}

impl Sram {
    /// Storage size in bytes.
    pub const SIZE: usize = 0x8000;

    /// Constructs a new, erased `Sram`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the byte at `offset`.
    #[must_use]
    pub fn read(&self, offset: usize) -> Byte {
        self.data[offset % Self::SIZE]
    }

    /// Writes the byte at `offset`.
    pub fn write(&mut self, offset: usize, value: Byte) {
        self.data[offset % Self::SIZE] = value;
        self.dirty = true;
    }

    /// Returns the save blob.
    #[must_use]
    pub fn data(&self) -> &[Byte] {
        &self.data
    }

    /// Loads a save blob.
    pub fn load(&mut self, blob: &[Byte]) {
        let len = blob.len().min(Self::SIZE);
        self.data[..len].copy_from_slice(&blob[..len]);
    }

    /// Checks and clears the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Default for Sram {
    fn default() -> Self {
        Self {
            data: vec![0xff; Self::SIZE].into_boxed_slice(),
            dirty: false,
        }
    }
}

impl Block for Sram {
    fn reset(&mut self) {
        // Battery-backed contents survive a reset.
    }
}
