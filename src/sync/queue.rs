//! Bounded lock-free multi-producer multi-consumer queue
//!
//! Every slot carries its own sequence number: a producer may only write a
//! slot whose sequence equals its claimed position, and a consumer may only
//! read a slot whose sequence is one past its claimed position. Positions are
//! claimed with a single compare-exchange, so neither side ever blocks or
//! allocates once the queue has been constructed.

use std::{
    cell::UnsafeCell,
    fmt,
    mem::MaybeUninit,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::error::{Result, RosrtError};

struct Slot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// Fixed-capacity queue safe for any number of producers and consumers
pub struct BoundedQueue<T> {
    slots: Box<[Slot<T>]>,
    /// Mask for fast modulo operation
    mask: usize,
    enqueue_pos: AtomicUsize,
    dequeue_pos: AtomicUsize,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at least `capacity` items
    ///
    /// The capacity is rounded up to a power of two (minimum 2).
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RosrtError::invalid_parameter(
                "capacity",
                "Capacity must be greater than 0",
            ));
        }

        let capacity = capacity
            .max(2)
            .checked_next_power_of_two()
            .ok_or_else(|| RosrtError::invalid_parameter("capacity", "Capacity is too large"))?;

        let slots = (0..capacity)
            .map(|i| Slot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            slots,
            mask: capacity - 1,
            enqueue_pos: AtomicUsize::new(0),
            dequeue_pos: AtomicUsize::new(0),
        })
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Approximate number of queued items
    pub fn len(&self) -> usize {
        // dequeue first: enqueue only grows, so the difference cannot go negative
        let dequeue = self.dequeue_pos.load(Ordering::Acquire);
        let enqueue = self.enqueue_pos.load(Ordering::Acquire);
        enqueue.wrapping_sub(dequeue).min(self.capacity())
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the queue is full
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// Try to push an item; hands the item back when the queue is full
    pub fn try_push(&self, value: T) -> std::result::Result<(), T> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);

        loop {
            let slot = &self.slots[pos & self.mask];
            let sequence = slot.sequence.load(Ordering::Acquire);
            let diff = (sequence as isize).wrapping_sub(pos as isize);

            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe {
                            (*slot.value.get()).write(value);
                        }
                        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return Err(value);
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Try to pop the oldest item
    pub fn try_pop(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Ordering::Relaxed);

        loop {
            let slot = &self.slots[pos & self.mask];
            let sequence = slot.sequence.load(Ordering::Acquire);
            let diff = (sequence as isize).wrapping_sub(pos.wrapping_add(1) as isize);

            if diff == 0 {
                match self.dequeue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        slot.sequence
                            .store(pos.wrapping_add(self.mask).wrapping_add(1), Ordering::Release);
                        return Some(value);
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return None;
            } else {
                pos = self.dequeue_pos.load(Ordering::Relaxed);
            }
        }
    }

    /// Push an item, evicting the oldest entries until it fits
    ///
    /// Returns the number of evicted items. Evicted items are dropped on the
    /// calling thread, so this is meant for non-real-time producers.
    pub fn force_push(&self, mut value: T) -> usize {
        let mut evicted = 0;

        loop {
            match self.try_push(value) {
                Ok(()) => return evicted,
                Err(rejected) => {
                    value = rejected;
                    if self.try_pop().is_some() {
                        evicted += 1;
                    }
                }
            }
        }
    }

    /// Pop every queued item into `f`, returning how many were drained
    pub fn drain_with<F: FnMut(T)>(&self, mut f: F) -> usize {
        let mut drained = 0;
        while let Some(value) = self.try_pop() {
            f(value);
            drained += 1;
        }
        drained
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        // Drop any remaining elements
        while self.try_pop().is_some() {}
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

unsafe impl<T: Send> Send for BoundedQueue<T> {}
unsafe impl<T: Send> Sync for BoundedQueue<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_capacity_rounding() {
        assert!(BoundedQueue::<u32>::new(0).is_err());
        assert_eq!(BoundedQueue::<u32>::new(1).unwrap().capacity(), 2);
        assert_eq!(BoundedQueue::<u32>::new(5).unwrap().capacity(), 8);
        assert_eq!(BoundedQueue::<u32>::new(1000).unwrap().capacity(), 1024);
    }

    #[test]
    fn test_fifo_and_full() {
        let queue = BoundedQueue::new(4).unwrap();

        for i in 0..4 {
            assert!(queue.try_push(i).is_ok());
        }
        assert!(queue.is_full());
        assert_eq!(queue.try_push(99), Err(99));

        for i in 0..4 {
            assert_eq!(queue.try_pop(), Some(i));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_wraparound() {
        let queue = BoundedQueue::new(2).unwrap();
        for round in 0..100 {
            queue.try_push(round).unwrap();
            queue.try_push(round + 1000).unwrap();
            assert_eq!(queue.try_pop(), Some(round));
            assert_eq!(queue.try_pop(), Some(round + 1000));
        }
    }

    #[test]
    fn test_force_push_evicts_oldest() {
        let queue = BoundedQueue::new(2).unwrap();
        assert_eq!(queue.force_push(1), 0);
        assert_eq!(queue.force_push(2), 0);
        assert_eq!(queue.force_push(3), 1);

        let mut drained = Vec::new();
        assert_eq!(queue.drain_with(|v| drained.push(v)), 2);
        assert_eq!(drained, vec![2, 3]);
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        let item = Arc::new(());
        {
            let queue = BoundedQueue::new(4).unwrap();
            queue.try_push(item.clone()).unwrap();
            queue.try_push(item.clone()).unwrap();
            assert_eq!(Arc::strong_count(&item), 3);
        }
        assert_eq!(Arc::strong_count(&item), 1);
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(BoundedQueue::new(4096).unwrap());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..500 {
                        queue.try_push(p * 1000 + i).unwrap();
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }

        let mut values = Vec::new();
        queue.drain_with(|v| values.push(v));
        values.sort_unstable();
        values.dedup();
        assert_eq!(values.len(), 2000);
    }
}
