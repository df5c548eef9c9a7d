//! Graphics model.
//!
//! A cycle-driven scanline renderer. The CPU's elapsed cycles advance an
//! intra-line dot counter through 228 scanlines of 1232 cycles each;
//! horizontal blank begins at dot 960, vertical blank at scanline 160. Each
//! visible line is composed at end-of-line from the tile maps, bitmaps,
//! sprites, windows, and color effects selected by the register file.

use log::trace;
use vantage_arch::mem::Ram;
use vantage_arch::{Block, Half, Word};

use self::reg::Control;
use super::pic::{Pic, Source};
use crate::api::part::video::{Aspect, Video as Api};

mod draw;

pub mod reg;

/// Display resolution.
pub const LCD: Aspect = Aspect { wd: 240, ht: 160 };

/// Scanlines per frame, including vertical blank.
pub const LINES: Half = 228;
/// First scanline of vertical blank.
pub const VBLANK: Half = 160;
/// Cycles per scanline.
pub const DOTS: Word = 1232;
/// Dot at which horizontal blank begins.
pub const HBLANK: Word = 960;

/// Video RAM.
///
/// 96 KiB backing tile data, tile maps, and the bitmap pages.
pub type Vram = Ram<0x18000>;

/// Palette RAM.
///
/// 1 KiB of BGR555 entries: the background page, then the sprite page.
pub type Palette = Ram<0x400>;

/// Sprite attribute RAM.
///
/// 1 KiB holding 128 sprite descriptors interleaved with affine parameters.
pub type Oam = Ram<0x400>;

/// Timing edges produced by an update.
#[derive(Clone, Copy, Debug, Default)]
pub struct Events {
    /// Entered vertical blank.
    pub vblank: bool,
    /// Horizontal-blank edges crossed on visible lines.
    pub hblanks: Word,
}

/// Picture processing unit.
#[derive(Debug)]
pub struct Ppu {
    /// Video registers.
    pub reg: Control,
    /// Video internals.
    pub etc: Internal,
}

/// Video internals.
#[derive(Debug)]
pub struct Internal {
    /// Current scanline.
    line: Half,
    /// Intra-line dot counter.
    dot: Word,
    /// Previous vertical-blank level, for edge detection.
    vblanked: bool,
    /// Frame completed and not yet superseded.
    ready: bool,
    /// Internal affine reference points (latched at vertical blank).
    refx: [i32; 2],
    /// Internal affine reference points (latched at vertical blank).
    refy: [i32; 2],
    /// Framebuffer, ARGB32.
    frame: Box<[Word]>,
}

impl Default for Internal {
    fn default() -> Self {
        Self {
            line: 0,
            dot: 0,
            vblanked: false,
            ready: false,
            refx: [0; 2],
            refy: [0; 2],
            frame: vec![0xff00_0000; LCD.depth()].into_boxed_slice(),
        }
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self {
            reg: Control::default(),
            etc: Internal::default(),
        }
    }
}

impl Ppu {
    /// Constructs a new `Ppu`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the current scanline.
    #[must_use]
    pub fn line(&self) -> Half {
        self.etc.line
    }

    /// Advances video timing by `cycles`, rendering completed scanlines.
    ///
    /// Returns the blanking edges crossed, which the caller forwards to the
    /// DMA engine.
    pub fn run(
        &mut self,
        mut cycles: Word,
        vram: &Vram,
        palette: &Palette,
        oam: &Oam,
        pic: &mut Pic,
    ) -> Events {
        let mut events = Events::default();

        while cycles > 0 {
            // Advance no further than the next timing edge.
            let target = if self.etc.dot < HBLANK { HBLANK } else { DOTS };
            let step = cycles.min(target - self.etc.dot);
            self.etc.dot += step;
            cycles -= step;

            if self.etc.dot == HBLANK {
                self.enter_hblank(&mut events, pic);
            } else if self.etc.dot >= DOTS {
                self.enter_line(&mut events, vram, palette, oam, pic);
            }
        }

        events
    }

    /// Handles the horizontal-blank edge.
    fn enter_hblank(&mut self, events: &mut Events, pic: &mut Pic) {
        if self.etc.line >= VBLANK {
            return;
        }
        events.hblanks += 1;
        self.reg.dispstat = self.reg.dispstat.with_hblank(true);
        if self.reg.dispstat.irq_hblank() {
            pic.raise(Source::HBlank);
        }
    }

    /// Handles end-of-line: renders, advances the scanline, and manages the
    /// vertical-blank and scanline-match flags.
    fn enter_line(
        &mut self,
        events: &mut Events,
        vram: &Vram,
        palette: &Palette,
        oam: &Oam,
        pic: &mut Pic,
    ) {
        self.etc.dot = 0;
        self.reg.dispstat = self.reg.dispstat.with_hblank(false);

        if self.etc.line < VBLANK {
            draw::line(self, vram, palette, oam);
        }

        self.etc.line += 1;
        if self.etc.line >= LINES {
            self.etc.line = 0;
            self.etc.ready = false;
        }

        let vblank = self.etc.line >= VBLANK;
        let entered = vblank && !self.etc.vblanked;
        self.etc.vblanked = vblank;
        self.reg.dispstat = self.reg.dispstat.with_vblank(vblank);

        if entered {
            trace!("vblank (frame complete)");
            events.vblank = true;
            self.etc.ready = true;
            self.latch_affine();
            if self.reg.dispstat.irq_vblank() {
                pic.raise(Source::VBlank);
            }
        }

        let vmatch = self.etc.line == Half::from(self.reg.dispstat.vtarget());
        self.reg.dispstat = self.reg.dispstat.with_vmatch(vmatch);
        if vmatch && self.reg.dispstat.irq_vmatch() {
            pic.raise(Source::VCount);
        }
    }

    /// Latches the public affine reference registers into the internal
    /// points, sign-extending from 28 bits.
    fn latch_affine(&mut self) {
        fn extend(value: Word) -> i32 {
            ((value << 4) as i32) >> 4
        }
        for bg in 0..2 {
            self.etc.refx[bg] = extend(self.reg.refx[bg]);
            self.etc.refy[bg] = extend(self.reg.refy[bg]);
        }
    }
}

impl Api for Ppu {
    const SIZE: Aspect = LCD;

    type Pixel = Word;

    fn vsync(&self) -> bool {
        self.etc.ready
    }

    fn frame(&self) -> &[Self::Pixel] {
        &self.etc.frame
    }
}

impl Block for Ppu {
    fn ready(&self) -> bool {
        !self.reg.dispcnt.blank()
    }

    fn reset(&mut self) {
        self.reg = Control::default();
        self.etc = Internal::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_lines(ppu: &mut Ppu, lines: Word) -> (Events, Pic) {
        let vram = Vram::new();
        let palette = Palette::new();
        let oam = Oam::new();
        let mut pic = Pic::default();
        let mut events = Events::default();
        for _ in 0..lines {
            let e = ppu.run(DOTS, &vram, &palette, &oam, &mut pic);
            events.vblank |= e.vblank;
            events.hblanks += e.hblanks;
        }
        (events, pic)
    }

    #[test]
    fn hblank_edges_only_on_visible_lines() {
        let mut ppu = Ppu::new();
        let (events, _) = run_lines(&mut ppu, Word::from(LINES));
        assert_eq!(events.hblanks, Word::from(VBLANK));
    }

    #[test]
    fn vblank_edge_fires_once_per_frame() {
        let mut ppu = Ppu::new();
        ppu.reg.dispstat = ppu.reg.dispstat.with_irq_vblank(true);
        let (events, pic) = run_lines(&mut ppu, Word::from(VBLANK));
        assert!(events.vblank);
        assert!(ppu.vsync());
        assert_ne!(pic.req & Source::VBlank.mask(), 0);
        // The rest of the frame produces no second edge.
        let (events, _) = run_lines(&mut ppu, Word::from(LINES - VBLANK));
        assert!(!events.vblank);
    }

    #[test]
    fn vcount_match_raises_interrupt() {
        let mut ppu = Ppu::new();
        ppu.reg.dispstat = ppu.reg.dispstat.with_vtarget(3).with_irq_vmatch(true);
        let (_, pic) = run_lines(&mut ppu, 3);
        assert!(ppu.reg.dispstat.vmatch());
        assert_ne!(pic.req & Source::VCount.mask(), 0);
    }

    #[test]
    fn affine_reference_latches_at_vblank_only() {
        let mut ppu = Ppu::new();
        ppu.reg.refx[0] = 0x0123_4567; // 28-bit field
        let (_, _) = run_lines(&mut ppu, Word::from(VBLANK));
        assert_eq!(ppu.etc.refx[0], 0x0123_4567 << 4 >> 4);
        // Writes during vblank do not re-latch until the next frame edge.
        ppu.reg.refx[0] = 0x0fff_ffff;
        let (_, _) = run_lines(&mut ppu, 10);
        assert_eq!(ppu.etc.refx[0], 0x0123_4567 << 4 >> 4);
    }

    #[test]
    fn negative_affine_reference_sign_extends() {
        let mut ppu = Ppu::new();
        ppu.reg.refx[1] = 0x0800_0000;
        let (_, _) = run_lines(&mut ppu, Word::from(VBLANK));
        assert_eq!(ppu.etc.refx[1], -(0x0800_0000i32));
    }
}
