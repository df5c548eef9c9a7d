//! Host sample ring.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::api::part::audio::Sample;

/// Lock-free stereo sample ring.
///
/// Single-producer (the emulation step) / single-consumer (the host audio
/// callback). Each slot stores one stereo pair packed into an atomic word;
/// only the two position counters are shared and neither side ever blocks.
#[derive(Clone, Debug)]
pub struct Ring(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    /// Packed stereo slots.
    data: Box<[AtomicSlot]>,
    /// Consumer position.
    head: AtomicUsize,
    /// Producer position.
    tail: AtomicUsize,
}

type AtomicSlot = std::sync::atomic::AtomicU32;

impl Ring {
    /// Constructs a ring holding `depth` stereo pairs.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        let data = (0..depth).map(|_| AtomicSlot::new(0)).collect();
        Self(Arc::new(Inner {
            data,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }))
    }

    /// Pushes one stereo pair, dropping it if the consumer has stalled.
    pub fn push(&self, sample: Sample) {
        let inner = &*self.0;
        let tail = inner.tail.load(Ordering::Relaxed);
        let next = (tail + 1) % inner.data.len();
        if next == inner.head.load(Ordering::Acquire) {
            // Full: the host is not draining; drop rather than block.
            return;
        }
        let packed = (sample.lt as u16 as u32) | ((sample.rt as u16 as u32) << 16);
        inner.data[tail].store(packed, Ordering::Relaxed);
        inner.tail.store(next, Ordering::Release);
    }

    /// Pops buffered pairs into `buf` as interleaved `i16`s.
    ///
    /// Returns the number of values written (always even).
    pub fn pop(&self, buf: &mut [i16]) -> usize {
        let inner = &*self.0;
        let mut head = inner.head.load(Ordering::Relaxed);
        let tail = inner.tail.load(Ordering::Acquire);
        let mut written = 0;
        for chunk in buf.chunks_exact_mut(2) {
            if head == tail {
                break;
            }
            let packed = inner.data[head].load(Ordering::Relaxed);
            chunk[0] = packed as u16 as i16;
            chunk[1] = (packed >> 16) as u16 as i16;
            head = (head + 1) % inner.data.len();
            written += 2;
        }
        inner.head.store(head, Ordering::Release);
        written
    }

    /// Returns the number of buffered stereo pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = &*self.0;
        let head = inner.head.load(Ordering::Acquire);
        let tail = inner.tail.load(Ordering::Acquire);
        (tail + inner.data.len() - head) % inner.data.len()
    }

    /// Checks if the ring holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_pairs() {
        let ring = Ring::new(8);
        ring.push(Sample { lt: -100, rt: 200 });
        ring.push(Sample { lt: 300, rt: -400 });
        let mut buf = [0i16; 8];
        let n = ring.pop(&mut buf);
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], &[-100, 200, 300, -400]);
    }

    #[test]
    fn full_ring_drops_new_samples() {
        let ring = Ring::new(3); // capacity 2 pairs
        ring.push(Sample { lt: 1, rt: 1 });
        ring.push(Sample { lt: 2, rt: 2 });
        ring.push(Sample { lt: 3, rt: 3 });
        let mut buf = [0i16; 6];
        let n = ring.pop(&mut buf);
        assert_eq!(n, 4);
        assert_eq!(&buf[..4], &[1, 1, 2, 2]);
    }
}
