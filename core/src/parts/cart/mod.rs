//! Game cartridge.
//!
//! Encoded within the ROM is a [header] describing the software; the save
//! backing (SRAM, Flash, or EEPROM) is detected from driver strings embedded
//! in the image and locked for the session.
//!
//! [header]: self::header::Header

use log::info;
use thiserror::Error;
use vantage_arch::mem::Rom;
use vantage_arch::{Block, Byte};

use self::header::Header;
use self::save::{Backing, Kind};

pub mod header;
pub mod save;

/// Game cartridge.
#[derive(Debug)]
pub struct Cartridge {
    /// Cartridge header.
    head: Header,
    /// ROM image.
    rom: Rom,
    /// Save backing.
    pub save: Backing,
}

impl Cartridge {
    /// Largest supported ROM image.
    pub const MAX_ROM: usize = 0x0200_0000;

    /// Constructs a new `Cartridge` from a ROM image.
    ///
    /// # Errors
    ///
    /// Returns an error when the image is empty, oversized, or too short to
    /// contain a header.
    pub fn new(rom: &[Byte]) -> Result<Self> {
        if rom.is_empty() || rom.len() > Self::MAX_ROM {
            return Err(Error::Image { size: rom.len() });
        }
        let head = Header::new(rom)?;
        let save = Backing::new(Kind::detect(rom));
        info!("loaded cartridge: {head}");
        Ok(Self {
            head,
            rom: Rom::from(rom),
            save,
        })
    }

    /// Gets the cartridge's header.
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.head
    }

    /// Gets the cartridge's ROM.
    #[must_use]
    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    /// Loads a save blob into the backing.
    ///
    /// An EEPROM cartridge accepts either EEPROM size and latches the
    /// variant accordingly; other backings require an exact size match.
    ///
    /// # Errors
    ///
    /// Returns an error when the blob does not fit the detected backing.
    pub fn load_save(&mut self, blob: &[Byte]) -> Result<()> {
        match &mut self.save {
            Backing::Eeprom(chip) => {
                let large = match blob.len() {
                    0x200 => false,
                    0x2000 => true,
                    found => {
                        return Err(Error::Save {
                            expected: self.save.kind().size(),
                            found,
                        })
                    }
                };
                chip.latch_size(large);
                chip.load(blob);
            }
            backing => {
                let expected = backing.kind().size();
                if blob.len() != expected {
                    return Err(Error::Save {
                        expected,
                        found: blob.len(),
                    });
                }
                backing.load(blob);
            }
        }
        Ok(())
    }
}

impl Block for Cartridge {
    fn reset(&mut self) {
        self.save.reset();
    }
}

/// A convenient type alias for [`Result`](std::result::Result).
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error caused by constructing a [cartridge](Cartridge).
#[derive(Debug, Error)]
pub enum Error {
    /// ROM image too short to contain a header.
    #[error("missing cartridge header")]
    Missing,
    /// ROM image empty or oversized.
    #[error("bad ROM image size: {size:#x} bytes")]
    Image {
        /// Image size in bytes.
        size: usize,
    },
    /// Save blob does not fit the detected backing.
    #[error("bad save size: expected {expected:#x}, found {found:#x}")]
    Save {
        /// Backing size in bytes.
        expected: usize,
        /// Blob size in bytes.
        found: usize,
    },
}
