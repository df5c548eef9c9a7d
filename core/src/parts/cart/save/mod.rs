//! Cartridge save memory.
//!
//! A cartridge carries at most one battery-backed storage part: plain SRAM,
//! a command-driven Flash chip, or a bit-serial EEPROM. The kind is detected
//! from driver identification strings the library linker embeds in the ROM,
//! and locks when the ROM is loaded.

use log::debug;
use vantage_arch::{Block, Byte};

mod eeprom;
mod flash;
mod sram;

pub use self::eeprom::Eeprom;
pub use self::flash::Flash;
pub use self::sram::Sram;

/// Save backing kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Kind {
    /// 4 Kbit serial EEPROM.
    Eeprom4k,
    /// 64 Kbit serial EEPROM.
    Eeprom64k,
    /// 32 KiB static RAM.
    Sram,
    /// 512 Kbit Flash.
    Flash512k,
    /// 1 Mbit Flash.
    Flash1m,
}

impl Kind {
    /// Detects the save kind from the ROM image's driver strings.
    ///
    /// Defaults to the 64 Kbit EEPROM when no marker is present; the first
    /// DMA burst to the EEPROM region may still narrow the EEPROM size.
    #[must_use]
    pub fn detect(rom: &[Byte]) -> Self {
        const MARKERS: [(&[Byte], Kind); 5] = [
            (b"EEPROM_V", Kind::Eeprom64k),
            (b"SRAM_V", Kind::Sram),
            (b"FLASH1M_V", Kind::Flash1m),
            (b"FLASH512_V", Kind::Flash512k),
            (b"FLASH_V", Kind::Flash512k),
        ];
        for (marker, kind) in MARKERS {
            if rom
                .windows(marker.len())
                .any(|window| window == marker)
            {
                debug!("save backing detected: {kind:?}");
                return kind;
            }
        }
        debug!("no save marker found; assuming 64 Kbit EEPROM");
        Kind::Eeprom64k
    }

    /// Returns the save blob size for this kind in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            Kind::Eeprom4k => 0x200,
            Kind::Eeprom64k => 0x2000,
            Kind::Sram => 0x8000,
            Kind::Flash512k => 0x1_0000,
            Kind::Flash1m => 0x2_0000,
        }
    }
}

/// Save backing.
#[derive(Debug)]
pub enum Backing {
    /// Bit-serial EEPROM in the upper ROM window.
    Eeprom(Eeprom),
    /// Byte-wide static RAM.
    Sram(Sram),
    /// Command-driven Flash.
    Flash(Flash),
}

impl Backing {
    /// Constructs the backing for a detected kind.
    #[must_use]
    pub fn new(kind: Kind) -> Self {
        match kind {
            Kind::Eeprom4k => Self::Eeprom(Eeprom::new(false)),
            Kind::Eeprom64k => Self::Eeprom(Eeprom::new(true)),
            Kind::Sram => Self::Sram(Sram::new()),
            Kind::Flash512k => Self::Flash(Flash::new(false)),
            Kind::Flash1m => Self::Flash(Flash::new(true)),
        }
    }

    /// Returns the current kind.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Eeprom(chip) if chip.is_large() => Kind::Eeprom64k,
            Self::Eeprom(_) => Kind::Eeprom4k,
            Self::Sram(_) => Kind::Sram,
            Self::Flash(chip) if chip.is_banked() => Kind::Flash1m,
            Self::Flash(_) => Kind::Flash512k,
        }
    }

    /// Returns the save blob.
    #[must_use]
    pub fn data(&self) -> &[Byte] {
        match self {
            Self::Eeprom(chip) => chip.data(),
            Self::Sram(chip) => chip.data(),
            Self::Flash(chip) => chip.data(),
        }
    }

    /// Loads a save blob (sized per the kind).
    pub fn load(&mut self, data: &[Byte]) {
        match self {
            Self::Eeprom(chip) => chip.load(data),
            Self::Sram(chip) => chip.load(data),
            Self::Flash(chip) => chip.load(data),
        }
    }

    /// Checks and clears the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        match self {
            Self::Eeprom(chip) => chip.take_dirty(),
            Self::Sram(chip) => chip.take_dirty(),
            Self::Flash(chip) => chip.take_dirty(),
        }
    }
}

impl Block for Backing {
    fn reset(&mut self) {
        match self {
            Self::Eeprom(chip) => chip.reset(),
            Self::Sram(chip) => chip.reset(),
            Self::Flash(chip) => chip.reset(),
        }
    }
}
