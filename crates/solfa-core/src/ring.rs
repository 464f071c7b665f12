//! Lock-free SPSC ring buffer for position-tagged audio frames
//!
//! Carries captured microphone frames from the recording thread to the
//! analysis thread. Every frame is tagged with its absolute sample position
//! so the consumer can recover exact timing after buffering.
//!
//! Unlike a bounded queue, the producer **never blocks and never fails**:
//! when the consumer falls behind, the oldest frames are silently
//! overwritten. Losing an analysis window is an accepted tradeoff; stalling
//! the capture path is not.
//!
//! Head and tail are monotonic frame counters. The producer is the only
//! writer of `head`, the consumer the only writer of `tail` - no mutex, no
//! compare-and-swap. The consumer validates `head` again after copying and
//! retries if the producer lapped the region it just read.
//!
//! Slots are atomics because a lapping producer may write a slot while the
//! consumer is still copying it. Per-slot accesses are `Relaxed`; the
//! Acquire/Release pairing on `head` orders them, and the post-copy
//! re-validation discards any read that raced a lap. Samples are stored as
//! `f32` bit patterns since there is no atomic float.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

struct RingShared {
    samples: Box<[AtomicU32]>,
    positions: Box<[AtomicI64]>,
    /// Total frames ever written
    head: AtomicU64,
    /// Total frames ever consumed (or skipped)
    tail: AtomicU64,
}

impl RingShared {
    fn capacity(&self) -> u64 {
        self.samples.len() as u64
    }
}

/// Writer half, owned by the recording thread
pub struct RingProducer {
    shared: Arc<RingShared>,
}

/// Reader half, owned by the analysis thread
pub struct RingConsumer {
    shared: Arc<RingShared>,
}

/// Create a position-tagged SPSC ring with room for `capacity` frames
///
/// Capacity should cover at least 2 seconds of audio at the configured
/// sample rate so a briefly stalled analysis thread loses nothing.
pub fn tagged_ring(capacity: usize) -> (RingProducer, RingConsumer) {
    assert!(capacity > 0, "ring capacity must be non-zero");
    let shared = Arc::new(RingShared {
        samples: (0..capacity).map(|_| AtomicU32::new(0)).collect(),
        positions: (0..capacity).map(|_| AtomicI64::new(0)).collect(),
        head: AtomicU64::new(0),
        tail: AtomicU64::new(0),
    });
    (
        RingProducer { shared: Arc::clone(&shared) },
        RingConsumer { shared },
    )
}

impl RingProducer {
    /// Append frames tagged `start_position..start_position + len`
    ///
    /// Always succeeds. If the buffer is full the oldest frames are
    /// overwritten without signalling the consumer.
    pub fn push(&mut self, samples: &[f32], start_position: i64) {
        let shared = &*self.shared;
        let cap = shared.capacity();
        let head = shared.head.load(Ordering::Relaxed);

        for (i, &sample) in samples.iter().enumerate() {
            let slot = ((head + i as u64) % cap) as usize;
            shared.samples[slot].store(sample.to_bits(), Ordering::Relaxed);
            shared.positions[slot].store(start_position + i as i64, Ordering::Relaxed);
        }

        shared
            .head
            .store(head + samples.len() as u64, Ordering::Release);
    }
}

impl RingConsumer {
    /// Frames ready to read (at most the ring capacity)
    pub fn available(&self) -> usize {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Acquire);
        let tail = shared.tail.load(Ordering::Relaxed);
        (head - tail).min(shared.capacity()) as usize
    }

    /// Drain up to `out.len()` frames with their absolute positions
    ///
    /// Returns the number of frames copied, which may be less than
    /// requested (including 0). Never blocks. If the producer overwrote
    /// frames the consumer had not yet read, those frames are skipped and
    /// the read continues from the oldest still-valid frame.
    pub fn pop(&mut self, out: &mut [f32], positions: &mut [i64]) -> usize {
        assert!(positions.len() >= out.len(), "position buffer too small");
        let shared = &*self.shared;
        let cap = shared.capacity();

        loop {
            let head = shared.head.load(Ordering::Acquire);
            let mut tail = shared.tail.load(Ordering::Relaxed);

            // Skip anything already overwritten
            if head - tail > cap {
                tail = head - cap;
            }

            let take = ((head - tail) as usize).min(out.len());
            if take == 0 {
                return 0;
            }

            for i in 0..take {
                let slot = ((tail + i as u64) % cap) as usize;
                out[i] = f32::from_bits(shared.samples[slot].load(Ordering::Relaxed));
                positions[i] = shared.positions[slot].load(Ordering::Relaxed);
            }

            // Re-validate: if the producer lapped the region mid-copy the
            // data above may be torn. Retry from the new oldest frame.
            let head_after = shared.head.load(Ordering::Acquire);
            if head_after - tail <= cap {
                shared.tail.store(tail + take as u64, Ordering::Release);
                return take;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read_preserves_samples_and_positions() {
        let (mut tx, mut rx) = tagged_ring(16);
        tx.push(&[1.0, 2.0, 3.0], 100);

        assert_eq!(rx.available(), 3);
        let mut out = [0.0f32; 8];
        let mut pos = [0i64; 8];
        let n = rx.pop(&mut out, &mut pos);

        assert_eq!(n, 3);
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&pos[..3], &[100, 101, 102]);
        assert_eq!(rx.available(), 0);
    }

    #[test]
    fn test_partial_read_returns_what_is_available() {
        let (mut tx, mut rx) = tagged_ring(16);
        tx.push(&[0.5, 0.6], 0);

        let mut out = [0.0f32; 8];
        let mut pos = [0i64; 8];
        assert_eq!(rx.pop(&mut out, &mut pos), 2);
        assert_eq!(rx.pop(&mut out, &mut pos), 0);
    }

    #[test]
    fn test_overrun_keeps_most_recent_frames() {
        let (mut tx, mut rx) = tagged_ring(4);
        // 8 frames into a 4-frame ring: the first 4 are overwritten
        let frames: Vec<f32> = (0..8).map(|i| i as f32).collect();
        tx.push(&frames, 0);

        assert_eq!(rx.available(), 4);
        let mut out = [0.0f32; 4];
        let mut pos = [0i64; 4];
        let n = rx.pop(&mut out, &mut pos);

        assert_eq!(n, 4);
        assert_eq!(out, [4.0, 5.0, 6.0, 7.0]);
        assert_eq!(pos, [4, 5, 6, 7]);
    }

    #[test]
    fn test_overrun_across_multiple_pushes() {
        let (mut tx, mut rx) = tagged_ring(4);
        tx.push(&[1.0, 2.0, 3.0], 0);
        tx.push(&[4.0, 5.0, 6.0], 3);

        let mut out = [0.0f32; 4];
        let mut pos = [0i64; 4];
        let n = rx.pop(&mut out, &mut pos);

        assert_eq!(n, 4);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
        assert_eq!(pos, [2, 3, 4, 5]);
    }

    #[test]
    fn test_interleaved_write_read() {
        let (mut tx, mut rx) = tagged_ring(8);
        let mut out = [0.0f32; 4];
        let mut pos = [0i64; 4];

        let mut written = 0i64;
        for round in 0..10 {
            let chunk = [round as f32; 4];
            tx.push(&chunk, written);
            written += 4;

            let n = rx.pop(&mut out, &mut pos);
            assert_eq!(n, 4);
            assert_eq!(out, chunk);
            assert_eq!(pos[0], written - 4);
        }
    }

    #[test]
    fn test_threaded_producer_consumer() {
        let (mut tx, mut rx) = tagged_ring(1024);

        let producer = std::thread::spawn(move || {
            let mut position = 0i64;
            for _ in 0..200 {
                let chunk: Vec<f32> = (0..64).map(|i| (position + i) as f32).collect();
                tx.push(&chunk, position);
                position += 64;
                std::thread::yield_now();
            }
        });

        let mut out = vec![0.0f32; 128];
        let mut pos = vec![0i64; 128];
        let mut last_position = -1i64;
        let mut total = 0usize;

        while total < 200 * 64 {
            let n = rx.pop(&mut out, &mut pos);
            if n == 0 {
                if producer.is_finished() && rx.available() == 0 {
                    break;
                }
                std::thread::yield_now();
                continue;
            }
            for i in 0..n {
                // Positions strictly increase and every frame carries its
                // position as payload, so drops are visible but never torn.
                assert!(pos[i] > last_position);
                assert_eq!(out[i], pos[i] as f32);
                last_position = pos[i];
            }
            total += n;
        }

        producer.join().unwrap();
    }

    /// A tiny ring and a producer that never yields force constant laps
    /// over the region the consumer is copying. Re-validation must discard
    /// every raced copy: frames may be dropped but never torn.
    #[test]
    fn test_lapping_producer_never_tears_frames() {
        let (mut tx, mut rx) = tagged_ring(64);

        let producer = std::thread::spawn(move || {
            let mut position = 0i64;
            for _ in 0..2_000 {
                let chunk: Vec<f32> = (0..48).map(|i| (position + i) as f32).collect();
                tx.push(&chunk, position);
                position += 48;
            }
        });

        let mut out = vec![0.0f32; 64];
        let mut pos = vec![0i64; 64];
        let mut last_position = -1i64;

        loop {
            let n = rx.pop(&mut out, &mut pos);
            for i in 0..n {
                assert!(pos[i] > last_position);
                assert_eq!(out[i], pos[i] as f32);
                last_position = pos[i];
            }
            if n == 0 && producer.is_finished() && rx.available() == 0 {
                break;
            }
        }

        producer.join().unwrap();
        assert!(last_position >= 0);
    }
}
