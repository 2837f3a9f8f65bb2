/**
 * A fixed-capacity single-producer/single-consumer ring of sample buffers.
 *
 * The pool decouples the blocking radio reads from the CPU-bound decoding
 * services. Exactly one producer and one consumer exist per pool, enforced
 * by the ownership of the [`Producer`] and [`Consumer`] handles; the shared
 * `size` counter is the only synchronisation point, released on `publish`
 * and acquired on `peek_tail` so that the consumer observes every byte the
 * producer wrote into the slot.
 *
 * A full pool never blocks the producer: the incoming sample set is dropped
 * so the reader keeps its periodic cadence.
 */
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One radio read worth of samples: RTLOUTBUFSZ × rate multiplier × 2 bytes
pub const BLOCK_SIZE: usize = 1024 * 160 * 2;

/// Number of slots in a pool
pub const POOL_CAPACITY: usize = 100;

/// A block of interleaved unsigned 8-bit I/Q pairs
pub struct SampleBuffer {
    pub bytes: Box<[u8]>,
    /// Number of bytes actually filled by the last read
    pub filled: usize,
}

impl SampleBuffer {
    fn new(block_size: usize) -> Self {
        SampleBuffer {
            bytes: vec![0u8; block_size].into_boxed_slice(),
            filled: 0,
        }
    }

    pub fn samples(&self) -> &[u8] {
        &self.bytes[..self.filled]
    }
}

struct Ring {
    slots: Box<[UnsafeCell<SampleBuffer>]>,
    size: AtomicUsize,
}

// Slots are only ever accessed from the single producer (head side) or the
// single consumer (tail side), with the size counter ordering the handoff.
unsafe impl Sync for Ring {}
unsafe impl Send for Ring {}

/// Build a pool of `capacity` buffers of `block_size` bytes each
pub fn buffer_pool(
    capacity: usize,
    block_size: usize,
) -> (Producer, Consumer) {
    assert!(capacity >= 2, "a pool needs at least two slots");
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(SampleBuffer::new(block_size)))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let ring = Arc::new(Ring {
        slots,
        size: AtomicUsize::new(0),
    });
    (
        Producer {
            ring: ring.clone(),
            head: 0,
        },
        Consumer { ring, tail: 0 },
    )
}

/// The writing end of a pool, owned by the Reader service
pub struct Producer {
    ring: Arc<Ring>,
    head: usize,
}

impl Producer {
    /// A mutable reference to the current producer slot, or None when the
    /// pool is full. Pair with [`Producer::publish`].
    pub fn acquire_head(&mut self) -> Option<&mut SampleBuffer> {
        if self.ring.size.load(Ordering::Acquire) == self.ring.slots.len() {
            return None;
        }
        // Sound: the slot at head is outside the published window, and this
        // handle is the only producer.
        Some(unsafe { &mut *self.ring.slots[self.head].get() })
    }

    /// Hand the slot written through [`Producer::acquire_head`] over to the
    /// consumer.
    pub fn publish(&mut self) {
        self.head = (self.head + 1) % self.ring.slots.len();
        self.ring.size.fetch_add(1, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.ring.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn head_index(&self) -> usize {
        self.head
    }
}

/// The reading end of a pool, owned by a decoder service
pub struct Consumer {
    ring: Arc<Ring>,
    tail: usize,
}

impl Consumer {
    /// A reference to the oldest unread slot, or None when the pool is
    /// empty. Pair with [`Consumer::release`].
    pub fn peek_tail(&mut self) -> Option<&SampleBuffer> {
        if self.ring.size.load(Ordering::Acquire) == 0 {
            return None;
        }
        // Sound: the slot at tail is inside the published window, which the
        // producer never touches until release.
        Some(unsafe { &*self.ring.slots[self.tail].get() })
    }

    /// Return the slot read through [`Consumer::peek_tail`] to the
    /// producer.
    pub fn release(&mut self) {
        self.tail = (self.tail + 1) % self.ring.slots.len();
        self.ring.size.fetch_sub(1, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.ring.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn tail_index(&self) -> usize {
        self.tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_pool_overflow() {
        let (mut producer, mut consumer) = buffer_pool(4, 16);

        for i in 0..4 {
            let slot = producer.acquire_head().unwrap();
            slot.bytes[0] = i;
            slot.filled = 1;
            producer.publish();
        }

        // a fifth acquire reports a full pool
        assert!(producer.acquire_head().is_none());
        assert_eq!(producer.len(), 4);

        // one release frees exactly one slot
        assert_eq!(consumer.peek_tail().unwrap().bytes[0], 0);
        consumer.release();
        assert!(producer.acquire_head().is_some());
    }

    #[test]
    fn test_pool_invariants() {
        let (mut producer, mut consumer) = buffer_pool(5, 8);
        let capacity = producer.capacity();

        let check = |producer: &Producer, consumer: &Consumer| {
            let size = producer.len();
            assert!(size <= capacity);
            assert_eq!(
                producer.head_index(),
                (consumer.tail_index() + size) % capacity
            );
        };

        for round in 0..17 {
            for _ in 0..=(round % 4) {
                if producer.acquire_head().is_some() {
                    producer.publish();
                }
                check(&producer, &consumer);
            }
            while consumer.peek_tail().is_some() {
                consumer.release();
                check(&producer, &consumer);
            }
        }
    }

    #[test]
    fn test_fifo_order_across_threads() {
        let (mut producer, mut consumer) = buffer_pool(8, 8);

        let feeder = thread::spawn(move || {
            let mut next: u32 = 0;
            while next < 1000 {
                let written = match producer.acquire_head() {
                    Some(slot) => {
                        slot.bytes[..4].copy_from_slice(&next.to_le_bytes());
                        slot.filled = 4;
                        true
                    }
                    None => false,
                };
                if written {
                    producer.publish();
                    next += 1;
                } else {
                    thread::yield_now();
                }
            }
        });

        let mut expected: u32 = 0;
        while expected < 1000 {
            let read = match consumer.peek_tail() {
                Some(slot) => {
                    let mut word = [0u8; 4];
                    word.copy_from_slice(&slot.bytes[..4]);
                    Some(u32::from_le_bytes(word))
                }
                None => None,
            };
            if let Some(value) = read {
                assert_eq!(value, expected);
                consumer.release();
                expected += 1;
            } else {
                thread::yield_now();
            }
        }

        feeder.join().unwrap();
    }
}
