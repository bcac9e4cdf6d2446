//! Fixed-capacity ring buffer used as a delay line.
//!
//! Storage is allocated once at construction; `push` overwrites the oldest
//! sample when full and never moves the others.

use std::num::NonZeroUsize;

use crate::error::OutOfRange;

#[derive(Debug, Clone)]
pub struct CyclicBuffer<T> {
    slots: Box<[T]>,
    /// Slot the next push writes to.
    head: usize,
    len: usize,
}

impl<T: Clone + Default> CyclicBuffer<T> {
    /// Empty buffer holding at most `capacity` samples.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: vec![T::default(); capacity.get()].into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }
}

impl<T: Clone> CyclicBuffer<T> {
    /// Full buffer with every slot set to `value`.
    pub fn filled(capacity: NonZeroUsize, value: T) -> Self {
        Self {
            slots: vec![value; capacity.get()].into_boxed_slice(),
            head: 0,
            len: capacity.get(),
        }
    }

    /// Overwrite every slot with `value` and mark the buffer full.
    pub fn fill(&mut self, value: T) {
        self.slots.fill(value);
        self.head = 0;
        self.len = self.slots.len();
    }
}

impl<T> CyclicBuffer<T> {
    #[inline]
    pub fn push(&mut self, value: T) {
        self.slots[self.head] = value;
        self.head = (self.head + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// Sample pushed `k` pushes before the most recent one (`k = 0` is the newest).
    #[inline]
    pub fn at(&self, k: usize) -> Result<&T, OutOfRange> {
        if k >= self.len {
            return Err(OutOfRange {
                index: k,
                len: self.len,
            });
        }
        let cap = self.slots.len();
        Ok(&self.slots[(self.head + cap - 1 - k) % cap])
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Newest-first iterator over the retained samples.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |k| self.at(k).ok())
    }
}
