//! Processor API.

/// Processor interface.
pub trait Processor {
    /// Move the PC to the provided address.
    fn goto(&mut self, pc: u32);

    /// Enable (or wake) the processor.
    fn wake(&mut self);

    /// Checks whether the processor is halted awaiting an interrupt.
    #[must_use]
    fn halted(&self) -> bool;
}
