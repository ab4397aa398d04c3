//! Mergeable Heap Data Structures for Rust
//!
//! This crate provides a family of pointer-linked min-heaps sharing one
//! contract ([`Heap`]): insert, peek/extract minimum, decrease-key, delete,
//! union, and O(1) entry-ownership checks. Every insert returns a cheap,
//! clonable entry handle that stays readable after removal and can be
//! validated against any heap with [`Heap::holds_entry`].
//!
//! # Engines
//!
//! - **Binomial Heap**: O(log n) insert, extract-min, decrease-key, union
//! - **Fibonacci Heap**: O(1) amortized insert, decrease-key, and union; O(log n) amortized extract-min
//! - **Leftist Heap**: O(log n) worst-case insert, extract-min, union
//! - **Pairing Heap**: O(1) insert, union, decrease-key; O(log n) amortized extract-min
//! - **Skew Heap**: O(log n) amortized insert, extract-min, union
//!
//! All engines support a pluggable key comparator, fail-fast structural
//! iteration, and flat `(key, value)` serde serialization. They are
//! single-threaded by design.
//!
//! # Example
//!
//! ```rust
//! use linked_heaps::fibonacci::FibonacciHeap;
//! use linked_heaps::{Heap, HeapEntry};
//!
//! let mut heap = FibonacciHeap::new();
//! let entry = heap.insert(5, "item");
//! heap.insert(3, "other");
//! heap.decrease_key(&entry, 1).unwrap();
//! assert_eq!(*heap.minimum().unwrap().key(), 1);
//! ```

pub mod binomial;
pub mod fibonacci;
pub mod leftist;
mod owner;
pub mod pairing;
mod serial;
pub mod skew;
pub mod traits;

// Re-export the main traits for convenience
pub use pairing::MergeStrategy;
pub use traits::{Heap, HeapEntry, HeapError, KeyComparator};
