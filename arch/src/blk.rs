/// Logical emulation block.
pub trait Block {
    /// Check if the block is enabled.
    ///
    /// # Note
    ///
    /// When disabled, this indicates that the block has no work to perform
    /// until external state (usually a control register) re-enables it.
    fn ready(&self) -> bool {
        true
    }

    /// Performs a reset on the block.
    ///
    /// Afterwards, the block should behave as if it has just been
    /// initialized[^1] to its powered-on state.
    ///
    /// [^1]: Models should be aware that sometimes persistent data is left
    ///       behind intentionally by the implementation. Within the context of
    ///       an emulator, accessing persistent data after a reset should be
    ///       considered undefined behaviour.
    fn reset(&mut self) {}
}
