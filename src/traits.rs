//! Common contract for the mergeable heap engines
//!
//! Every engine in this crate implements the same [`Heap`] trait: insert,
//! peek-minimum, extract-minimum, decrease-key, delete, union, plus O(1)
//! entry-ownership queries via [`Heap::holds_entry`]. Inserting returns an
//! [`HeapEntry`] handle that stays readable even after the element leaves
//! the heap; only `holds_entry` tells you whether the heap still owns it.

use std::cell::Ref;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Pluggable key ordering. `None` in an engine means the natural `Ord`.
pub type KeyComparator<K> = Rc<dyn Fn(&K, &K) -> Ordering>;

/// Error type for heap operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    /// The heap contains no entries
    Empty,
    /// The entry is not currently held by this heap
    NotHeld,
    /// The new key is greater than the entry's current key
    KeyNotDecreased,
    /// The heap was structurally modified while an iterator was live
    ConcurrentModification,
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::Empty => write!(f, "heap is empty"),
            HeapError::NotHeld => write!(f, "entry is not held by this heap"),
            HeapError::KeyNotDecreased => {
                write!(f, "new key is greater than the current key")
            }
            HeapError::ConcurrentModification => {
                write!(f, "heap was modified during iteration")
            }
        }
    }
}

impl std::error::Error for HeapError {}

/// A handle to an entry stored in (or extracted from) a heap
///
/// Handles are cheap to clone and compare by identity. The key and value
/// remain readable after the entry has been extracted, deleted, or orphaned
/// by `clear`; use [`Heap::holds_entry`] to check current ownership.
pub trait HeapEntry<K, V>: Clone {
    /// Borrows the entry's key.
    fn key(&self) -> Ref<'_, K>;

    /// Borrows the entry's value.
    fn value(&self) -> Ref<'_, V>;

    /// Replaces the entry's value, returning the old one.
    ///
    /// Values do not participate in the ordering, so this never restructures
    /// the heap and is allowed on stale handles too.
    fn set_value(&self, value: V) -> V;
}

/// A mergeable min-heap over `(key, value)` entries
///
/// All engines share this contract; they differ only in their internal tree
/// discipline and therefore in per-operation cost. Mutating operations
/// validate their arguments before touching the structure, so a returned
/// error means the heap is unchanged.
///
/// # Example
///
/// ```rust
/// use linked_heaps::{Heap, HeapEntry};
/// use linked_heaps::pairing::PairingHeap;
///
/// let mut heap = PairingHeap::new();
/// let entry = heap.insert(10, "item");
/// heap.decrease_key(&entry, 5).unwrap();
/// assert_eq!(*heap.minimum().unwrap().key(), 5);
/// ```
pub trait Heap<K: Ord, V> {
    /// The entry handle type returned by `insert`
    type Entry: HeapEntry<K, V>;

    /// The iterator type returned by `entries`
    type Iter: Iterator<Item = Result<Self::Entry, HeapError>>;

    /// Creates a new empty heap using the natural key order.
    fn new() -> Self;

    /// Inserts a key/value pair, returning a handle to the new entry.
    fn insert(&mut self, key: K, value: V) -> Self::Entry;

    /// Returns the entry with the minimum key without removing it.
    ///
    /// # Errors
    /// [`HeapError::Empty`] if the heap contains no entries.
    fn minimum(&self) -> Result<Self::Entry, HeapError>;

    /// Removes and returns the entry with the minimum key.
    ///
    /// The returned handle is no longer held by the heap but its key and
    /// value remain readable.
    ///
    /// # Errors
    /// [`HeapError::Empty`] if the heap contains no entries.
    fn extract_minimum(&mut self) -> Result<Self::Entry, HeapError>;

    /// Lowers the key of a held entry.
    ///
    /// An equal key is accepted and may still reposition the entry.
    ///
    /// # Errors
    /// [`HeapError::NotHeld`] if this heap does not hold the entry;
    /// [`HeapError::KeyNotDecreased`] if `key` is greater than the current key.
    fn decrease_key(&mut self, entry: &Self::Entry, key: K) -> Result<(), HeapError>;

    /// Removes an arbitrary held entry.
    ///
    /// # Errors
    /// [`HeapError::NotHeld`] if this heap does not hold the entry.
    fn delete(&mut self, entry: &Self::Entry) -> Result<(), HeapError>;

    /// Moves every entry of `other` into this heap, leaving `other` empty.
    ///
    /// All of `other`'s outstanding entry handles become held by `self`, in
    /// O(1) ownership bookkeeping. `other` remains usable afterwards.
    fn union(&mut self, other: &mut Self);

    /// Returns true if this heap currently owns `entry`. O(1).
    fn holds_entry(&self, entry: &Self::Entry) -> bool;

    /// Returns the number of entries in the heap.
    fn size(&self) -> usize;

    /// Returns true if the heap contains no entries.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Removes all entries, orphaning every outstanding handle in O(1).
    fn clear(&mut self);

    /// Iterates over the entries in structural (not sorted) order.
    ///
    /// The iterator does not borrow the heap. If the heap is structurally
    /// modified while the iterator is live, its next step yields
    /// `Err(HeapError::ConcurrentModification)` and the iterator fuses.
    fn entries(&self) -> Self::Iter;
}

/// Compares two keys through an optional comparator, falling back to `Ord`.
pub(crate) fn compare_keys<K: Ord>(
    comparator: &Option<KeyComparator<K>>,
    a: &K,
    b: &K,
) -> Ordering {
    match comparator {
        Some(compare) => compare(a, b),
        None => a.cmp(b),
    }
}

/// Orders two (sentinel, key) pairs: a negative-infinity sentinel sorts
/// before every real key. Used by `delete` to float an entry to the root.
pub(crate) fn compare_with_sentinel<K: Ord>(
    comparator: &Option<KeyComparator<K>>,
    a_infinite: bool,
    a_key: &K,
    b_infinite: bool,
    b_key: &K,
) -> Ordering {
    match (a_infinite, b_infinite) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare_keys(comparator, a_key, b_key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(HeapError::Empty.to_string(), "heap is empty");
        assert_eq!(
            HeapError::ConcurrentModification.to_string(),
            "heap was modified during iteration"
        );
    }

    #[test]
    fn sentinel_sorts_below_everything() {
        let natural: Option<KeyComparator<i32>> = None;
        assert_eq!(
            compare_with_sentinel(&natural, true, &100, false, &-100),
            Ordering::Less
        );
        assert_eq!(
            compare_with_sentinel(&natural, false, &-100, true, &100),
            Ordering::Greater
        );
        assert_eq!(
            compare_with_sentinel(&natural, false, &3, false, &7),
            Ordering::Less
        );
    }

    #[test]
    fn comparator_overrides_natural_order() {
        let reversed: Option<KeyComparator<i32>> = Some(Rc::new(|a, b| b.cmp(a)));
        assert_eq!(compare_keys(&reversed, &1, &2), Ordering::Greater);
    }
}
