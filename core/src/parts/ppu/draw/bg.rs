//! Background layers.

use vantage_arch::Half;

use super::{color, insert, Control, Internal, Palette, Pixel, Vram, WD};

/// Background rendering class.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub(super) enum Kind {
    /// Tiled, scrolled.
    Text,
    /// Tiled, transformed by the affine matrix.
    Affine,
    /// Direct or palette-indexed bitmap (modes 3..=5).
    Bitmap,
}

/// Per-call rendering context.
pub(super) struct Style<'a> {
    /// Background index.
    pub idx: usize,
    /// Scanline being rendered.
    pub line: Half,
    /// Window layer masks for this line.
    pub masks: &'a [u8; WD],
}

impl Style<'_> {
    /// Checks the window mask for this background at `x`.
    fn open(&self, x: usize) -> bool {
        self.masks[x] & (1 << self.idx) != 0
    }
}

/// Paints a tiled, scrolled background.
pub(super) fn text(
    reg: &Control,
    vram: &Vram,
    palette: &Palette,
    style: &Style,
    top: &mut [Pixel; WD],
    below: &mut [Pixel; WD],
) {
    let idx = style.idx;
    let bgcnt = reg.bgcnt[idx];
    let prio = bgcnt.prio();
    let map_base = usize::from(bgcnt.map_base()) * 0x800;
    let tile_base = usize::from(bgcnt.tile_base()) * 0x4000;
    let hofs = usize::from(reg.hofs[idx] & 0x1ff);
    let vofs = usize::from(reg.vofs[idx] & 0x1ff);

    for x in 0..WD {
        if !style.open(x) {
            continue;
        }
        let sx = (x + hofs) & 0x1ff;
        let sy = (usize::from(style.line) + vofs) & 0x1ff;

        // Maps larger than one 32x32-tile screen block tile together from
        // additional 2 KiB blocks to the right and below.
        let (tx, ty) = (sx / 8, sy / 8);
        let block = match bgcnt.size() {
            0 => 0,
            1 => usize::from(tx >= 32),
            2 => usize::from(ty >= 32),
            3 => usize::from(tx >= 32) + 2 * usize::from(ty >= 32),
            _ => unreachable!(),
        };
        let entry = vram.load_16(map_base + block * 0x800 + ((ty & 31) * 32 + (tx & 31)) * 2);

        let tile = usize::from(entry & 0x3ff);
        let hflip = entry & 0x0400 != 0;
        let vflip = entry & 0x0800 != 0;
        let bank = usize::from(entry >> 12);

        let mut px = sx % 8;
        let mut py = sy % 8;
        if hflip {
            px = 7 - px;
        }
        if vflip {
            py = 7 - py;
        }

        // Tile fetches wrap within the video RAM region.
        let pixel = if bgcnt.depth8() {
            let index = usize::from(vram.load_8((tile_base + tile * 64 + py * 8 + px) % 0x1_8000));
            (index != 0).then(|| color(palette, index * 2))
        } else {
            let byte = vram.load_8((tile_base + tile * 32 + py * 4 + px / 2) % 0x1_8000);
            let index = usize::from(if px & 1 == 0 { byte & 0xf } else { byte >> 4 });
            (index != 0).then(|| color(palette, bank * 32 + index * 2))
        };

        if let Some(color) = pixel {
            insert(
                &mut top[x],
                &mut below[x],
                Pixel {
                    color,
                    prio,
                    layer: idx as u8,
                    semi: false,
                },
            );
        }
    }
}

/// Paints an affine background, advancing its internal reference point.
pub(super) fn affine(
    reg: &Control,
    etc: &mut Internal,
    vram: &Vram,
    palette: &Palette,
    style: &Style,
    top: &mut [Pixel; WD],
    below: &mut [Pixel; WD],
) {
    let idx = style.idx;
    let aff = idx - 2;
    let bgcnt = reg.bgcnt[idx];
    let prio = bgcnt.prio();
    let map_base = usize::from(bgcnt.map_base()) * 0x800;
    let tile_base = usize::from(bgcnt.tile_base()) * 0x4000;

    // Map edge in pixels: 128 << size, square.
    let size_mask = (128i32 << bgcnt.size()) - 1;
    let tiles = 16usize << bgcnt.size();

    let pa = i32::from(reg.pa[aff] as i16);
    let pc = i32::from(reg.pc[aff] as i16);
    let mut cx = etc.refx[aff];
    let mut cy = etc.refy[aff];

    for x in 0..WD {
        let tx = cx >> 8;
        let ty = cy >> 8;
        cx += pa;
        cy += pc;

        if !style.open(x) {
            continue;
        }
        if !bgcnt.wrap() && (tx < 0 || tx > size_mask || ty < 0 || ty > size_mask) {
            continue;
        }
        let mx = (tx & size_mask) as usize;
        let my = (ty & size_mask) as usize;

        // Affine maps are byte-per-tile and always use 8-bit tiles.
        let tile = usize::from(vram.load_8(map_base + (my / 8) * tiles + mx / 8));
        let index =
            usize::from(vram.load_8((tile_base + tile * 64 + (my % 8) * 8 + mx % 8) % 0x1_8000));
        if index != 0 {
            insert(
                &mut top[x],
                &mut below[x],
                Pixel {
                    color: color(palette, index * 2),
                    prio,
                    layer: idx as u8,
                    semi: false,
                },
            );
        }
    }

    // The reference point steps by (pb, pd) once per scanline.
    etc.refx[aff] += i32::from(reg.pb[aff] as i16);
    etc.refy[aff] += i32::from(reg.pd[aff] as i16);
}

/// Paints the bitmap layer of modes 3..=5.
pub(super) fn bitmap(
    reg: &Control,
    vram: &Vram,
    palette: &Palette,
    style: &Style,
    top: &mut [Pixel; WD],
    below: &mut [Pixel; WD],
) {
    let y = usize::from(style.line);
    let prio = reg.bgcnt[2].prio();
    let mode = reg.dispcnt.mode();
    let page = if mode != 3 && reg.dispcnt.page() {
        0xa000
    } else {
        0
    };

    for x in 0..WD {
        if !style.open(x) {
            continue;
        }
        let pixel = match mode {
            // Direct 16-bit, full screen.
            3 => Some(vram.load_16((y * WD + x) * 2)),
            // Palette-indexed 8-bit, double-buffered.
            4 => {
                let index = usize::from(vram.load_8(page + y * WD + x));
                (index != 0).then(|| color(palette, index * 2))
            }
            // Direct 16-bit, 160x128, double-buffered.
            5 => (x < 160 && y < 128).then(|| vram.load_16(page + (y * 160 + x) * 2)),
            _ => unreachable!("bitmap render in mode {mode}"),
        };
        if let Some(color) = pixel {
            insert(
                &mut top[x],
                &mut below[x],
                Pixel {
                    color,
                    prio,
                    layer: 2,
                    semi: false,
                },
            );
        }
    }
}
