//! Video registers.

use bitfield_struct::bitfield;
use vantage_arch::{Half, Word};

/// Display control.
///
/// | Bit   | Name                        |
/// |-------|-----------------------------|
/// | 2-0   | Video mode (0..=5)          |
/// | 4     | Bitmap page select          |
/// | 6     | 1-D sprite tile mapping     |
/// | 7     | Forced blank                |
/// | 11-8  | Background enables          |
/// | 12    | Sprite enable               |
/// | 14-13 | Window 0/1 enables          |
/// | 15    | Sprite-window enable        |
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct DisplayControl {
    /// `DISPCNT[2:0]`: Video mode.
    #[bits(3)]
    pub mode: u8,
    #[bits(1)]
    __: u8,
    /// `DISPCNT[4]`: Bitmap frame page select (modes 4 and 5).
    pub page: bool,
    /// `DISPCNT[5]`: Allow OAM access during horizontal blank (unused).
    pub hblank_oam: bool,
    /// `DISPCNT[6]`: 1-D sprite tile mapping.
    pub obj_1d: bool,
    /// `DISPCNT[7]`: Forced blank; the display shows white.
    pub blank: bool,
    /// `DISPCNT[8]`: Background 0 enable.
    pub bg0: bool,
    /// `DISPCNT[9]`: Background 1 enable.
    pub bg1: bool,
    /// `DISPCNT[10]`: Background 2 enable.
    pub bg2: bool,
    /// `DISPCNT[11]`: Background 3 enable.
    pub bg3: bool,
    /// `DISPCNT[12]`: Sprite enable.
    pub obj: bool,
    /// `DISPCNT[13]`: Window 0 enable.
    pub win0: bool,
    /// `DISPCNT[14]`: Window 1 enable.
    pub win1: bool,
    /// `DISPCNT[15]`: Sprite-window enable.
    pub objwin: bool,
}

impl DisplayControl {
    /// Checks a background enable by index.
    #[must_use]
    pub fn bg(&self, idx: usize) -> bool {
        match idx {
            0 => self.bg0(),
            1 => self.bg1(),
            2 => self.bg2(),
            3 => self.bg3(),
            _ => unreachable!("no such background: {idx}"),
        }
    }
}

/// Display status.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct DisplayStatus {
    /// `DISPSTAT[0]`: In vertical blank (read-only).
    pub vblank: bool,
    /// `DISPSTAT[1]`: In horizontal blank (read-only).
    pub hblank: bool,
    /// `DISPSTAT[2]`: Scanline matches the compare target (read-only).
    pub vmatch: bool,
    /// `DISPSTAT[3]`: Raise interrupt at vertical-blank entry.
    pub irq_vblank: bool,
    /// `DISPSTAT[4]`: Raise interrupt at horizontal-blank entry.
    pub irq_hblank: bool,
    /// `DISPSTAT[5]`: Raise interrupt on scanline match.
    pub irq_vmatch: bool,
    #[bits(2)]
    __: u8,
    /// `DISPSTAT[15:8]`: Scanline compare target.
    #[bits(8)]
    pub vtarget: u8,
}

impl DisplayStatus {
    /// Read-only (status) bits.
    pub const STATUS: Half = 0b0000_0000_0000_0111;
}

/// Background control.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct Background {
    /// `BGCNT[1:0]`: Priority (0 draws in front).
    #[bits(2)]
    pub prio: u8,
    /// `BGCNT[3:2]`: Tile data base, in 16 KiB blocks.
    #[bits(2)]
    pub tile_base: u8,
    #[bits(2)]
    __: u8,
    /// `BGCNT[6]`: Mosaic (not modelled; stored for read-back).
    pub mosaic: bool,
    /// `BGCNT[7]`: 8-bit (single palette) tiles.
    pub depth8: bool,
    /// `BGCNT[12:8]`: Map base, in 2 KiB blocks.
    #[bits(5)]
    pub map_base: u8,
    /// `BGCNT[13]`: Affine overflow wraps (else transparent).
    pub wrap: bool,
    /// `BGCNT[15:14]`: Size class.
    #[bits(2)]
    pub size: u8,
}

/// Color special effects control.
#[bitfield(u16)]
#[derive(PartialEq, Eq)]
pub struct Blend {
    /// `BLDCNT[5:0]`: First-target layer mask.
    #[bits(6)]
    pub first: u8,
    /// `BLDCNT[7:6]`: Effect (none, alpha, brighten, darken).
    #[bits(2)]
    pub mode: u8,
    /// `BLDCNT[13:8]`: Second-target layer mask.
    #[bits(6)]
    pub second: u8,
    #[bits(2)]
    __: u8,
}

/// Video register file.
#[derive(Debug, Default)]
pub struct Control {
    /// Display control.
    pub dispcnt: DisplayControl,
    /// Display status.
    pub dispstat: DisplayStatus,
    /// Background control.
    pub bgcnt: [Background; 4],
    /// Background horizontal scroll (9 bits).
    pub hofs: [Half; 4],
    /// Background vertical scroll (9 bits).
    pub vofs: [Half; 4],
    /// Affine parameters (2.8 fixed), backgrounds 2..=3.
    pub pa: [Half; 2],
    /// Affine parameter B.
    pub pb: [Half; 2],
    /// Affine parameter C.
    pub pc: [Half; 2],
    /// Affine parameter D.
    pub pd: [Half; 2],
    /// Affine reference point X (20.8 fixed, 28 bits).
    pub refx: [Word; 2],
    /// Affine reference point Y.
    pub refy: [Word; 2],
    /// Window 0 horizontal bounds (left in high byte, right in low).
    pub win0h: Half,
    /// Window 1 horizontal bounds.
    pub win1h: Half,
    /// Window 0 vertical bounds.
    pub win0v: Half,
    /// Window 1 vertical bounds.
    pub win1v: Half,
    /// Inside-window layer masks (window 0 low byte, window 1 high).
    pub winin: Half,
    /// Outside/object-window layer masks.
    pub winout: Half,
    /// Mosaic sizes (stored; effect not modelled).
    pub mosaic: Half,
    /// Color effect control.
    pub bldcnt: Blend,
    /// Alpha coefficients.
    pub bldalpha: Half,
    /// Brightness coefficient.
    pub bldy: Half,
}
