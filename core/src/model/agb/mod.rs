//! AGB-001: Game Boy Advance.

use log::info;
use thiserror::Error;
use vantage_arch::{Block, Half, Word};

use crate::api::part::audio::Audio;
use crate::api::part::video::Video;
use crate::parts::bios;
use crate::parts::bus::Bus;
use crate::parts::cart::{self, Cartridge};
use crate::parts::cpu::arm7::{Cpu, Crash};
use crate::parts::ppu;

#[cfg(test)]
mod tests;

pub use crate::parts::cpu::arm7 as cpu;
pub use crate::parts::joypad::Button;
pub use crate::parts::pic::Source as Interrupt;
pub use crate::parts::ppu::LCD as SCREEN;

/// Peripheral quantum while the processor is halted, in cycles.
const IDLE_QUANTUM: Word = 64;

/// AGB-001 Game Boy Advance emulator.
#[derive(Debug)]
pub struct GameBoyAdvance {
    /// Central processing unit.
    cpu: Cpu,
    /// Memory bus and peripherals.
    bus: Bus,
}

impl Default for GameBoyAdvance {
    fn default() -> Self {
        let mut this = Self {
            cpu: Cpu::new(),
            bus: Bus::new(bios::image()),
        };
        this.scratch();
        this
    }
}

impl GameBoyAdvance {
    /// Constructs a new `GameBoyAdvance`.
    ///
    /// The returned instance boots directly to the cartridge entry point
    /// once a ROM is [loaded](Self::load_rom).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a ROM image, detecting its save backing.
    ///
    /// # Errors
    ///
    /// Returns an error when the image cannot be parsed; the console is left
    /// without a cartridge in that case.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        let cart = Cartridge::new(rom)?;
        self.bus.cart = Some(cart);
        self.reset();
        Ok(())
    }

    /// Loads a save blob for the detected backing.
    ///
    /// # Errors
    ///
    /// Returns an error when no cartridge is loaded or the blob does not fit
    /// the backing.
    pub fn load_save(&mut self, blob: &[u8]) -> Result<()> {
        let cart = self.bus.cart.as_mut().ok_or(Error::NoCartridge)?;
        cart.load_save(blob)?;
        Ok(())
    }

    /// Resets the console to its direct-boot state.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset();
        self.scratch();
    }

    /// Installs the firmware scratch state in work RAM: the header-valid
    /// marker and the default interrupt handler pointer.
    fn scratch(&mut self) {
        let valid = self
            .bus
            .cart
            .as_ref()
            .is_some_and(|cart| cart.header().valid);
        self.bus
            .iwram
            .store_8((bios::HEADER_OK & 0x7fff) as usize, u8::from(valid));
        self.bus
            .iwram
            .store_32((bios::HANDLER & 0x7fff) as usize, bios::STUB);
        if let Some(cart) = &self.bus.cart {
            info!("booting: {}", cart.header());
        }
    }

    /// Executes one instruction, advancing peripherals by its cost.
    ///
    /// While the processor is halted (or crashed), peripherals advance by a
    /// small fixed quantum per call so an interrupt can eventually wake it.
    pub fn step(&mut self) -> Word {
        let cycles = self.cpu.step(&mut self.bus);
        if cycles == 0 {
            self.bus.tick(IDLE_QUANTUM);
            return IDLE_QUANTUM;
        }
        cycles + self.bus.tick(cycles)
    }

    /// Runs until the video unit completes the current frame.
    pub fn frame(&mut self) {
        // Finish a vertical blank already in progress, then run up to the
        // next one.
        while self.bus.io.ppu.vsync() {
            self.step();
        }
        while !self.bus.io.ppu.vsync() {
            self.step();
        }
    }

    /// Updates the pressed-key state (active-low register encoding).
    pub fn set_key_state(&mut self, bits: Half) {
        self.bus.io.set_keys(bits);
    }

    /// Gets the current ARGB32 framebuffer.
    ///
    /// Valid between frames; sample it when [`frame`](Self::frame) returns.
    #[must_use]
    pub fn framebuffer(&self) -> &[Word] {
        self.bus.io.ppu.frame()
    }

    /// Drains buffered stereo samples into `out`, returning the count.
    pub fn audio_samples(&mut self, out: &mut [i16]) -> usize {
        self.bus.io.apu.drain(out)
    }

    /// Returns the current save blob.
    #[must_use]
    pub fn save_data(&self) -> Vec<u8> {
        self.bus
            .cart
            .as_ref()
            .map(|cart| cart.save.data().to_vec())
            .unwrap_or_default()
    }

    /// Checks and clears the save-changed flag, for host flush debouncing.
    pub fn save_dirty(&mut self) -> bool {
        self.bus
            .cart
            .as_mut()
            .is_some_and(|cart| cart.save.take_dirty())
    }

    /// Returns the crash record, if a crash-grade fault occurred.
    #[must_use]
    pub fn crash(&self) -> Option<&Crash> {
        self.cpu.etc.crash.as_ref()
    }

    /// Gets the console's CPU.
    #[must_use]
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Mutably gets the console's CPU.
    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    /// Gets the console's bus.
    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Mutably gets the console's bus.
    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    /// Gets the console's video unit.
    #[must_use]
    pub fn ppu(&self) -> &ppu::Ppu {
        &self.bus.io.ppu
    }
}

impl Block for GameBoyAdvance {
    fn reset(&mut self) {
        GameBoyAdvance::reset(self);
    }
}

/// A convenient type alias for [`Result`](std::result::Result).
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error caused by the console facade.
#[derive(Debug, Error)]
pub enum Error {
    /// Cartridge loading failed.
    #[error(transparent)]
    Cart(#[from] cart::Error),
    /// No cartridge is loaded.
    #[error("no cartridge loaded")]
    NoCartridge,
}
