//! Bounded many-producer / single-consumer command channel.
//!
//! Storage is a preallocated ring of fixed-size slots. Each slot carries a
//! sequence number that encodes whose turn it is:
//!
//! ```text
//! sequence == pos              slot empty, claimable by the producer holding `pos`
//! sequence == pos + 1          slot filled, readable by the consumer at `pos`
//! sequence == pos + capacity   slot released, empty for the next lap
//! ```
//!
//! ### Write (any producer)
//! 1. Load the write cursor
//! 2. Check the slot sequence: equal to the cursor means claimable, lower means full
//! 3. CAS the cursor forward to claim the position
//! 4. Copy the encoded command into the slot
//! 5. Publish with a Release store of `pos + 1`
//!
//! ### Drain (single consumer)
//! 1. Acquire-load the sequence of the slot at the read cursor
//! 2. Stop at the first slot that is not published yet
//! 3. Copy the frame out, then release the slot with `pos + capacity`
//!
//! Within one producer, commands come out in submission order. Across
//! producers the only order is the slot-claim order.

use super::codec::{self, Frame};
use super::error::{BufferError, CodecError};
use crate::domain::Command;
use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const MIN_CAPACITY: usize = 2;

/// Cache-line aligned wrapper to keep the cursors off each other's line.
#[repr(align(64))]
struct CachePadded<T>(T);

impl<T> std::ops::Deref for CachePadded<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &T {
        &self.0
    }
}

#[repr(align(64))]
struct Slot {
    sequence: AtomicUsize,
    frame: UnsafeCell<Frame>,
}

struct Ring {
    slots: Box<[Slot]>,
    mask: usize,
    write_cursor: CachePadded<AtomicUsize>,
    read_cursor: CachePadded<AtomicUsize>,
}

// SAFETY: a slot's frame is only written by the producer that won the CAS for
// its position and only read by the consumer after the matching Release store
// of the sequence, so no two threads touch the same frame at once.
unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

impl Ring {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        let write = self.write_cursor.load(Ordering::Acquire);
        let read = self.read_cursor.load(Ordering::Acquire);
        write.wrapping_sub(read).min(self.capacity())
    }
}

/// Creates a channel with `capacity` slots.
///
/// Capacity must be a power of two so positions can be masked instead of
/// divided, and at least 2 so a filled slot and a claimable slot never share
/// a sequence number.
pub fn bounded(capacity: usize) -> Result<(ChannelProducer, ChannelConsumer), BufferError> {
    if capacity < MIN_CAPACITY || !capacity.is_power_of_two() {
        return Err(BufferError::InvalidCapacity { capacity });
    }

    let slots = (0..capacity)
        .map(|pos| Slot {
            sequence: AtomicUsize::new(pos),
            frame: UnsafeCell::new(Frame::empty()),
        })
        .collect::<Vec<_>>()
        .into_boxed_slice();

    let ring = Arc::new(Ring {
        slots,
        mask: capacity - 1,
        write_cursor: CachePadded(AtomicUsize::new(0)),
        read_cursor: CachePadded(AtomicUsize::new(0)),
    });

    Ok((
        ChannelProducer { ring: ring.clone() },
        ChannelConsumer { ring },
    ))
}

/// Producer side. Cheap to clone; every clone writes into the same ring.
#[derive(Clone)]
pub struct ChannelProducer {
    ring: Arc<Ring>,
}

impl ChannelProducer {
    /// Claims the next slot and copies `command` into it.
    ///
    /// Never blocks. Returns [`BufferError::ChannelFull`] when every slot is
    /// waiting on the consumer.
    pub fn try_send(&self, command: &Command) -> Result<(), BufferError> {
        let ring = &*self.ring;
        let mut pos = ring.write_cursor.load(Ordering::Relaxed);

        loop {
            let slot = &ring.slots[pos & ring.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let lag = seq.wrapping_sub(pos) as isize;

            if lag == 0 {
                match ring.write_cursor.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: winning the CAS gives this producer exclusive
                        // access to the slot until the sequence is published.
                        unsafe { codec::encode_into(command, &mut *slot.frame.get()) };
                        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if lag < 0 {
                // Slot still holds last lap's message.
                return Err(BufferError::ChannelFull);
            } else {
                // Another producer claimed this position first.
                pos = ring.write_cursor.load(Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub fn try_write(&self, command: &Command) -> bool {
        self.try_send(command).is_ok()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumer side. Not `Clone`: there is exactly one per channel, and
/// `drain` takes `&mut self`, so draining can never run on two threads.
pub struct ChannelConsumer {
    ring: Arc<Ring>,
}

impl ChannelConsumer {
    /// Reads every message published so far (at most one capacity's worth)
    /// and hands each decoded command to `visit`. A frame that fails to decode
    /// is passed on as the error; its slot is released either way.
    ///
    /// Returns the number of slots consumed, including undecodable ones.
    pub fn drain<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(Result<Command, CodecError>),
    {
        self.drain_frames(|frame| visit(codec::decode(&frame)))
    }

    fn drain_frames<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(Frame),
    {
        let ring = &*self.ring;
        let capacity = ring.capacity();
        let mut pos = ring.read_cursor.load(Ordering::Relaxed);
        let mut read = 0;

        while read < capacity {
            let slot = &ring.slots[pos & ring.mask];
            if slot.sequence.load(Ordering::Acquire) != pos.wrapping_add(1) {
                break;
            }

            // SAFETY: the Acquire load above observed the producer's publish,
            // and the slot cannot be reclaimed until we release it below.
            let frame = unsafe { *slot.frame.get() };
            slot.sequence
                .store(pos.wrapping_add(capacity), Ordering::Release);

            pos = pos.wrapping_add(1);
            ring.read_cursor.store(pos, Ordering::Release);
            read += 1;

            visit(frame);
        }

        read
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ChannelProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelProducer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl std::fmt::Debug for ChannelConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConsumer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Operator;
    use std::thread;

    fn cmd(n: u64) -> Command {
        Command::with_timestamp(n as f64, 1.0, Operator::Add, n)
    }

    #[test]
    fn test_rejects_invalid_capacity() {
        assert_eq!(
            bounded(0).unwrap_err(),
            BufferError::InvalidCapacity { capacity: 0 }
        );
        assert_eq!(
            bounded(100).unwrap_err(),
            BufferError::InvalidCapacity { capacity: 100 }
        );
        assert_eq!(
            bounded(1).unwrap_err(),
            BufferError::InvalidCapacity { capacity: 1 }
        );
        assert!(bounded(2).is_ok());
        assert!(bounded(1024).is_ok());
    }

    #[test]
    fn test_write_until_full_then_drain() {
        let (tx, mut rx) = bounded(4).unwrap();

        for n in 0..4 {
            assert!(tx.try_write(&cmd(n)));
        }
        assert_eq!(tx.len(), 4);
        assert_eq!(tx.try_send(&cmd(99)), Err(BufferError::ChannelFull));

        let mut seen = Vec::new();
        let read = rx.drain(|c| seen.push(c.unwrap().submitted_at_nanos));
        assert_eq!(read, 4);
        assert_eq!(seen, vec![0, 1, 2, 3]);
        assert!(rx.is_empty());

        // Slots are reusable on the next lap.
        assert!(tx.try_write(&cmd(4)));
        assert_eq!(rx.drain(|_| {}), 1);
    }

    #[test]
    fn test_drain_on_empty_channel_reads_nothing() {
        let (_tx, mut rx) = bounded(8).unwrap();
        let mut called = false;
        assert_eq!(rx.drain(|_| called = true), 0);
        assert!(!called);
    }

    #[test]
    fn test_many_laps_preserve_order() {
        let (tx, mut rx) = bounded(2).unwrap();
        let mut seen = Vec::new();

        for n in 0..1000 {
            assert!(tx.try_write(&cmd(n)));
            if n % 2 == 1 {
                rx.drain(|c| seen.push(c.unwrap().submitted_at_nanos));
            }
        }

        assert_eq!(seen, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_drain_reports_undecodable_frames() {
        let (tx, mut rx) = bounded(4).unwrap();
        tx.try_write(&cmd(7));
        tx.try_write(&cmd(8));

        // Corrupt the operator byte of the second slot in place.
        {
            let slot = &rx.ring.slots[1];
            // SAFETY: the slot is published and no drain is running.
            unsafe { (*slot.frame.get()).payload[16] = b'%' };
        }

        let mut decoded = Vec::new();
        assert_eq!(rx.drain(|c| decoded.push(c)), 2);
        assert_eq!(decoded[0], Ok(cmd(7)));
        assert_eq!(decoded[1], Err(CodecError::UnknownOperator(b'%')));
        assert!(rx.is_empty());

        // The corrupt slot was released for the next lap.
        for n in 0..4 {
            assert!(tx.try_write(&cmd(n)));
        }
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 10_000;

        let (tx, mut rx) = bounded(64).unwrap();

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let c = cmd(p * PER_PRODUCER + i);
                        while !tx.try_write(&c) {
                            thread::yield_now();
                        }
                    }
                })
            })
            .collect();

        let mut last_per_producer = vec![None::<u64>; PRODUCERS as usize];
        let mut total = 0;
        while total < PRODUCERS * PER_PRODUCER {
            let read = rx.drain(|c| {
                let id = c.unwrap().submitted_at_nanos;
                let producer = (id / PER_PRODUCER) as usize;
                // Per-producer FIFO.
                if let Some(prev) = last_per_producer[producer] {
                    assert!(id > prev);
                }
                last_per_producer[producer] = Some(id);
            });
            total += read as u64;
            if read == 0 {
                thread::yield_now();
            }
        }

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(total, PRODUCERS * PER_PRODUCER);
        assert!(rx.is_empty());
    }
}
