// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-type event ring buffer with handled-flag discard.
//!
//! `EventStore<T>` lives as a resource (see [`crate::resource::ResourceTable`]),
//! one per event type `T`, created on demand by `register_event`. Systems
//! read it through a non-consuming iterator and mark entries handled as they
//! consume them; the terminal stage then compacts away everything marked.

/// One queued event plus its handled flag.
struct Slot<T> {
    value: T,
    handled: bool,
}

/// Typed bounded-growable queue, backed by a ring buffer of `(head, tail,
/// len, capacity)`. Grows geometrically (2×) on overflow rather than
/// rejecting pushes.
pub struct EventStore<T> {
    buf: Vec<Option<Slot<T>>>,
    head: usize,
    len: usize,
}

impl<T> EventStore<T> {
    pub fn new() -> Self {
        Self::with_capacity(10)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || None);
        Self { buf, head: 0, len: 0 }
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn actual_index(&self, logical: usize) -> usize {
        (self.head + logical) % self.capacity()
    }

    /// Append `value` with `handled = false`, growing capacity 2× (and
    /// rebuilding into a contiguous, head-at-zero layout) if the buffer is full.
    pub fn push(&mut self, value: T) {
        if self.len == self.capacity() {
            self.grow();
        }
        let idx = self.actual_index(self.len);
        self.buf[idx] = Some(Slot { value, handled: false });
        self.len += 1;
    }

    fn grow(&mut self) {
        let new_capacity = (self.capacity() * 2).max(1);
        let mut new_buf = Vec::with_capacity(new_capacity);
        for logical in 0..self.len {
            let idx = self.actual_index(logical);
            new_buf.push(self.buf[idx].take());
        }
        new_buf.resize_with(new_capacity, || None);
        self.buf = new_buf;
        self.head = 0;
    }

    /// Dequeue the oldest entry, regardless of its handled flag.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let idx = self.head;
        let slot = self.buf[idx].take()?;
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        Some(slot.value)
    }

    pub fn peek(&self) -> Option<&T> {
        let idx = self.head;
        self.buf[idx].as_ref().map(|s| &s.value)
    }

    /// Non-consuming, oldest-first iterator. `mark_handled` on the iterator
    /// flags the most recently yielded entry.
    pub fn iterator(&mut self) -> EventIter<'_, T> {
        EventIter {
            store: self,
            cursor: 0,
            last_yielded: None,
        }
    }

    /// Keep only unhandled entries, in their original relative order.
    pub fn discard_handled(&mut self) {
        let capacity = self.capacity();
        let mut kept = Vec::with_capacity(capacity);
        for logical in 0..self.len {
            let idx = (self.head + logical) % capacity;
            if let Some(slot) = self.buf[idx].take() {
                if !slot.handled {
                    kept.push(Some(slot));
                }
            }
        }
        let new_len = kept.len();
        kept.resize_with(capacity, || None);
        self.buf = kept;
        self.head = 0;
        self.len = new_len;
    }

    pub fn clear(&mut self) {
        for slot in &mut self.buf {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    pub fn count(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shrink the backing buffer down to exactly `len` (minimum 1), rebuilding
    /// into a contiguous, head-at-zero layout.
    pub fn shrink_to_fit(&mut self) {
        let target = self.len.max(1);
        if target == self.capacity() {
            return;
        }
        let mut new_buf = Vec::with_capacity(target);
        for logical in 0..self.len {
            let idx = self.actual_index(logical);
            new_buf.push(self.buf[idx].take());
        }
        new_buf.resize_with(target, || None);
        self.buf = new_buf;
        self.head = 0;
    }
}

impl<T> Default for EventStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-consuming iterator over an [`EventStore`]'s logical order.
pub struct EventIter<'a, T> {
    store: &'a mut EventStore<T>,
    cursor: usize,
    last_yielded: Option<usize>,
}

impl<'a, T> EventIter<'a, T> {
    /// Mark the most recently yielded entry as handled. No-op if `next` has
    /// not been called yet on this iterator.
    pub fn mark_handled(&mut self) {
        if let Some(idx) = self.last_yielded {
            if let Some(slot) = self.store.buf[idx].as_mut() {
                slot.handled = true;
            }
        }
    }
}

impl<'a, T> Iterator for EventIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.store.len {
            return None;
        }
        let idx = self.store.actual_index(self.cursor);
        self.cursor += 1;
        self.last_yielded = Some(idx);
        // SAFETY: extends the borrow to 'a; `store` is exclusively borrowed
        // for the iterator's whole lifetime, and we never hand out two
        // references to the same slot at once.
        let slot = self.store.buf[idx].as_ref()?;
        Some(unsafe { &*(&slot.value as *const T) })
    }
}
