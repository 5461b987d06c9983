//! Fixed-capacity command history.
//!
//! Entries live in a ring of `N` slots. `head` always points at the slot that
//! will be overwritten next, which is the oldest entry once the ring has wrapped.

use crate::error::{Result, ShellError};
use std::num::NonZeroUsize;

/// Default number of remembered lines.
pub const DEFAULT_CAPACITY: usize = 100;

/// Ring buffer of previously accepted lines.
#[derive(Debug, Clone)]
pub struct History {
    slots: Box<[Option<String>]>,
    head: usize,
    /// Lines recorded since creation or the last `clear`, independent of `head`.
    recorded: usize,
}

impl History {
    /// Create an empty history with room for `capacity` lines.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            slots: vec![None; capacity.get()].into_boxed_slice(),
            head: 0,
            recorded: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of entries currently retrievable.
    pub fn len(&self) -> usize {
        self.recorded.min(self.capacity())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a copy of `line`, replacing the oldest entry when full.
    ///
    /// Blank lines are the caller's responsibility to filter out.
    pub fn record(&mut self, line: &str) -> Result<()> {
        let mut entry = String::new();
        entry
            .try_reserve_exact(line.len())
            .map_err(|_| ShellError::AllocationFailure)?;
        entry.push_str(line);

        // release whatever the slot held before writing the new entry
        drop(self.slots[self.head].take());
        self.slots[self.head] = Some(entry);
        self.head = (self.head + 1) % self.capacity();
        self.recorded = self.recorded.saturating_add(1);
        tracing::debug!(head = self.head, recorded = self.recorded, "history entry recorded");
        Ok(())
    }

    /// Drop every entry and start over from slot 0.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.recorded = 0;
    }

    /// Iterate over `(index, line)` pairs, oldest first.
    ///
    /// The index is the one accepted by [`History::recall`]. Each slot is
    /// visited at most once, starting at the oldest.
    pub fn list(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        let capacity = self.capacity();
        (0..capacity)
            .map(move |offset| (self.head + offset) % capacity)
            .filter_map(move |slot| self.slots[slot].as_deref())
            .enumerate()
    }

    /// Return an owned copy of the entry shown at `index` by [`History::list`].
    ///
    /// The copy is independent of the ring, so the caller may keep using it
    /// while new lines overwrite the slot it came from.
    pub fn recall(&self, index: usize) -> Result<String> {
        if index >= self.capacity() || index >= self.len() {
            return Err(ShellError::InvalidIndex {
                index: index.to_string(),
            });
        }
        let oldest = if self.recorded >= self.capacity() {
            self.head
        } else {
            0
        };
        self.slots[(oldest + index) % self.capacity()]
            .clone()
            .ok_or_else(|| ShellError::InvalidIndex {
                index: index.to_string(),
            })
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}
