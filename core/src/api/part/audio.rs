//! Audio API.

/// Audio interface.
pub trait Audio {
    /// Drains buffered output into `buf` as interleaved stereo pairs.
    ///
    /// Returns the number of `i16` values written (always even). Intended to
    /// be called from the host's audio callback; the producer side never
    /// blocks on the consumer.
    fn drain(&mut self, buf: &mut [i16]) -> usize;
}

/// Audio sample.
///
/// A pair of signed 16-bit pulse-code modulated stereo channel outputs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Sample {
    /// Left channel.
    pub lt: i16,
    /// Right channel.
    pub rt: i16,
}

impl From<(i16, i16)> for Sample {
    fn from((lt, rt): (i16, i16)) -> Self {
        Self { lt, rt }
    }
}
