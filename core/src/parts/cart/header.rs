//! Game ROM cartridge header.
//!
//! Encoded in the ROM at the address range `[$00A0..$00C0)` is the header,
//! which carries the game title, publisher codes, and a complement checksum
//! that the boot firmware validates before handing control to the game.

use std::fmt::Display;

use log::warn;
use vantage_arch::Byte;

use super::{Error, Result};

/// Cartridge header.
///
/// Information about the ROM stored in the byte range `[0xA0, 0xC0)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Header {
    /// Title of this ROM.
    pub title: Option<String>,
    /// 4-character game code.
    pub code: Option<String>,
    /// 2-character maker code.
    pub maker: Option<String>,
    /// Software revision number.
    pub version: Byte,
    /// Declared 8-bit complement checksum.
    pub hchk: Byte,
    /// Whether the declared checksum matches the computed one.
    ///
    /// A mismatch does not prevent boot; the firmware records the outcome
    /// where games can observe it.
    pub valid: bool,
}

impl Header {
    /// Constructs a new `Header`.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM is too short to contain a header.
    pub fn new(rom: &[Byte]) -> Result<Self> {
        let head: &[Byte] = rom.get(0xa0..0xc0).ok_or(Error::Missing)?;

        // Parse title
        let title = parse_str(&head[0x00..0x0c]);
        // Parse game code
        let code = parse_str(&head[0x0c..0x10]);
        // Parse maker code
        let maker = parse_str(&head[0x10..0x12]);
        // Parse version
        let version = head[0x1c];
        // Parse declared checksum
        let hchk = head[0x1d];

        // Verify the complement checksum
        let chk = Self::hchk(rom);
        let valid = chk == hchk;
        if !valid {
            warn!("header checksum mismatch: computed {chk:#04x}, declared {hchk:#04x}");
        }

        Ok(Self {
            title,
            code,
            maker,
            version,
            hchk,
            valid,
        })
    }

    /// Calculates the complement checksum over bytes `[0xA0, 0xBD)`.
    #[must_use]
    pub fn hchk(rom: &[Byte]) -> Byte {
        let sum = rom[0xa0..=0xbc]
            .iter()
            .fold(0u8, |chk, &byte| chk.wrapping_sub(byte));
        sum.wrapping_sub(0x19)
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] v{}",
            self.title.as_deref().unwrap_or("Unknown"),
            self.code.as_deref().unwrap_or("????"),
            self.version,
        )
    }
}

/// Parses a fixed-width NUL-padded ASCII field.
fn parse_str(bytes: &[Byte]) -> Option<String> {
    match std::str::from_utf8(bytes).ok()?.trim_matches('\0') {
        "" => None,
        ok => Some(ok.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Vec<Byte> {
        let mut rom = vec![0u8; 0x200];
        rom[0xa0..0xac].copy_from_slice(b"TESTGAME\0\0\0\0");
        rom[0xac..0xb0].copy_from_slice(b"AXYZ");
        rom[0xb0..0xb2].copy_from_slice(b"01");
        rom[0xbd] = Header::hchk(&rom);
        rom
    }

    #[test]
    fn parse_works() {
        let header = Header::new(&image()).unwrap();
        assert_eq!(header.title.as_deref(), Some("TESTGAME"));
        assert_eq!(header.code.as_deref(), Some("AXYZ"));
        assert_eq!(header.maker.as_deref(), Some("01"));
        assert!(header.valid);
    }

    #[test]
    fn checksum_mismatch_is_tolerated() {
        let mut rom = image();
        rom[0xbd] ^= 0xff;
        let header = Header::new(&rom).unwrap();
        assert!(!header.valid);
    }

    #[test]
    fn short_rom_is_an_error() {
        assert!(matches!(Header::new(&[0u8; 0x40]), Err(Error::Missing)));
    }
}
