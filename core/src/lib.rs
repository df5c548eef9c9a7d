//! # Handheld Console Core
//!
//! This library implements the core behaviour of the various hardware
//! components of a 32-bit RISC handheld game console: the dual-mode CPU
//! interpreter, the memory bus and its peripherals, the scanline video unit,
//! direct-sound audio, and the cartridge interface.

#![warn(clippy::pedantic)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

pub mod api;
pub mod parts;

mod model;

pub use self::model::agb;
