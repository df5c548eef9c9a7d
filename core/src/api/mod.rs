//! Emulator API.
//!
//! Host-facing interfaces implemented by the assembled console and its parts.

pub mod part;

pub use self::part::audio::Audio;
pub use self::part::joypad::Joypad;
pub use self::part::proc::Processor;
pub use self::part::video::Video;
