//! Joypad API.

/// Joypad interface.
pub trait Joypad {
    /// User input.
    type Button: Copy + Eq;

    /// Updates the complete pressed-key set.
    ///
    /// Keys not present in `keys` are considered released.
    fn input(&mut self, keys: &[Self::Button]);
}
