//! Sprite layer.

use super::{color, Control, Oam, Palette, Pixel, Vram, WD};

/// Sprite tile data base within video RAM (character blocks 4..=5).
const TILE_BASE: usize = 0x10000;
/// Sprite palette page within palette RAM.
const PAL_BASE: usize = 0x200;

/// Pixel dimensions by shape and size class.
#[rustfmt::skip]
const SIZES: [[(i32, i32); 4]; 3] = [
    [(8, 8),  (16, 16), (32, 32), (64, 64)], // square
    [(16, 8), (32, 8),  (32, 16), (64, 32)], // horizontal
    [(8, 16), (8, 32),  (16, 32), (32, 64)], // vertical
];

/// Composes the sprite layer for one scanline.
///
/// Entries are walked from last to first so that lower indices win their
/// priority class; the result is at most one candidate pixel per column plus
/// the sprite-window coverage.
pub(super) fn render(
    reg: &Control,
    y: usize,
    vram: &Vram,
    palette: &Palette,
    oam: &Oam,
    objs: &mut [Option<Pixel>; WD],
    objwin: &mut [bool; WD],
) {
    for entry in (0..128usize).rev() {
        let attr0 = oam.load_16(entry * 8);
        let attr1 = oam.load_16(entry * 8 + 2);
        let attr2 = oam.load_16(entry * 8 + 4);

        let mode = (attr0 >> 8) & 0x3;
        if mode == 2 {
            continue; // hidden
        }
        let affine = mode & 1 != 0;
        let double = mode == 3;

        let gfx = (attr0 >> 10) & 0x3;
        if gfx == 3 {
            continue; // prohibited mode
        }
        let window = gfx == 2;
        let semi = gfx == 1;

        let depth8 = attr0 & 0x2000 != 0;
        let shape = usize::from(attr0 >> 14);
        let size = usize::from(attr1 >> 14);
        let (width, height) = SIZES[shape.min(2)][size];

        // The affine-double bounding box is twice the sprite on both axes.
        let (bound_w, bound_h) = if double {
            (width * 2, height * 2)
        } else {
            (width, height)
        };

        let mut top = i32::from(attr0 & 0xff);
        if top > 160 {
            top -= 256;
        }
        let row = y as i32 - top;
        if row < 0 || row >= bound_h {
            continue;
        }

        let mut left = i32::from(attr1 & 0x1ff);
        if left >= 256 {
            left -= 512;
        }

        let tile = usize::from(attr2 & 0x3ff);
        let prio = ((attr2 >> 10) & 0x3) as u8;
        let bank = usize::from(attr2 >> 12);

        // Affine sprites sample texture coordinates through the inverse
        // matrix stored alongside the attributes; normal sprites just flip.
        let params = usize::from((attr1 >> 9) & 0x1f) * 32;
        let (pa, pb, pc, pd) = if affine {
            (
                i32::from(oam.load_16(params + 0x06) as i16),
                i32::from(oam.load_16(params + 0x0e) as i16),
                i32::from(oam.load_16(params + 0x16) as i16),
                i32::from(oam.load_16(params + 0x1e) as i16),
            )
        } else {
            (0x100, 0, 0, 0x100)
        };
        let hflip = !affine && attr1 & 0x1000 != 0;
        let vflip = !affine && attr1 & 0x2000 != 0;

        for sx in 0..bound_w {
            let x = left + sx;
            if !(0..WD as i32).contains(&x) {
                continue;
            }
            let x = x as usize;

            let (tex_x, tex_y) = if affine {
                let px = sx - bound_w / 2;
                let py = row - bound_h / 2;
                let tex_x = ((pa * px + pb * py) >> 8) + width / 2;
                let tex_y = ((pc * px + pd * py) >> 8) + height / 2;
                if !(0..width).contains(&tex_x) || !(0..height).contains(&tex_y) {
                    continue;
                }
                (tex_x, tex_y)
            } else {
                let tex_x = if hflip { width - 1 - sx } else { sx };
                let tex_y = if vflip { height - 1 - row } else { row };
                (tex_x, tex_y)
            };

            let index = fetch(
                reg,
                vram,
                tile,
                depth8,
                width as usize,
                tex_x as usize,
                tex_y as usize,
            );
            if index == 0 {
                continue;
            }

            if window {
                objwin[x] = true;
                continue;
            }

            let cand = Pixel {
                color: if depth8 {
                    color(palette, PAL_BASE + index * 2)
                } else {
                    color(palette, PAL_BASE + bank * 32 + index * 2)
                },
                prio,
                layer: 4,
                semi,
            };
            // Walking back to front, a later (lower-index) sprite claims the
            // column whenever its priority is no worse.
            if objs[x].map_or(true, |prev| cand.prio <= prev.prio) {
                objs[x] = Some(cand);
            }
        }
    }
}

/// Fetches a sprite tile pixel's palette index.
fn fetch(
    reg: &Control,
    vram: &Vram,
    tile: usize,
    depth8: bool,
    width: usize,
    x: usize,
    y: usize,
) -> usize {
    // 2-D mapping arranges tiles in a 32-tile-wide grid; 1-D packs each
    // sprite's tiles consecutively. 8-bit tiles consume two tile slots.
    let number = if reg.dispcnt.obj_1d() {
        let stride = (width / 8) * if depth8 { 2 } else { 1 };
        tile + (y / 8) * stride + (x / 8) * if depth8 { 2 } else { 1 }
    } else {
        tile + (y / 8) * 32 + (x / 8) * if depth8 { 2 } else { 1 }
    };
    let (ix, iy) = (x % 8, y % 8);
    // Tile fetches wrap within the sprite character blocks.
    if depth8 {
        usize::from(vram.load_8(TILE_BASE + ((number * 32 + iy * 8 + ix) & 0x7fff)))
    } else {
        let byte = vram.load_8(TILE_BASE + ((number * 32 + iy * 4 + ix / 2) & 0x7fff));
        usize::from(if ix & 1 == 0 { byte & 0xf } else { byte >> 4 })
    }
}
