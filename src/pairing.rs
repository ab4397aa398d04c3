//! Pairing heap
//!
//! A pairing heap is a single multi-way tree held together by one primitive:
//! `join`, which makes the larger of two roots the leftmost child of the
//! smaller. Each node carries a dual-purpose `previous` pointer — parent for
//! a leftmost child, left sibling otherwise — so a node can be cut from its
//! child list in O(1) without a separate parent pointer.
//!
//! Extract-minimum consolidates the orphaned child list with one of two
//! selectable strategies ([`MergeStrategy::TwoPass`] or
//! [`MergeStrategy::Multi`], the default), switchable at runtime.

use std::cell::{Cell, Ref, RefCell};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::mem;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::owner::{HeapIdentity, OwnerRef};
use crate::traits::{compare_keys, compare_with_sentinel, Heap, HeapEntry, HeapError, KeyComparator};

/// Child-list consolidation strategy used by extract-minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Pair the children left to right, then fold the pairs right to left.
    TwoPass,
    /// Repeatedly join the two front trees of a FIFO queue.
    #[default]
    Multi,
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    infinite: bool,
    owner: Option<Rc<OwnerRef>>,
    child: Link<K, V>,
    next: Link<K, V>,
    // parent if this node is the leftmost child, left sibling otherwise
    previous: Weak<RefCell<Node<K, V>>>,
}

type NodeRef<K, V> = Rc<RefCell<Node<K, V>>>;
type Link<K, V> = Option<NodeRef<K, V>>;

/// Handle to an entry in a [`PairingHeap`].
#[derive(Debug)]
pub struct PairingEntry<K, V> {
    node: NodeRef<K, V>,
}

impl<K, V> Clone for PairingEntry<K, V> {
    fn clone(&self) -> Self {
        PairingEntry {
            node: Rc::clone(&self.node),
        }
    }
}

impl<K, V> PartialEq for PairingEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl<K, V> Eq for PairingEntry<K, V> {}

impl<K, V> HeapEntry<K, V> for PairingEntry<K, V> {
    fn key(&self) -> Ref<'_, K> {
        Ref::map(self.node.borrow(), |node| &node.key)
    }

    fn value(&self) -> Ref<'_, V> {
        Ref::map(self.node.borrow(), |node| &node.value)
    }

    fn set_value(&self, value: V) -> V {
        mem::replace(&mut self.node.borrow_mut().value, value)
    }
}

/// A pairing heap: O(1) insert, union, decrease-key; O(log n) amortized
/// extract-minimum.
pub struct PairingHeap<K, V> {
    root: Link<K, V>,
    size: usize,
    mods: Rc<Cell<u64>>,
    comparator: Option<KeyComparator<K>>,
    strategy: MergeStrategy,
    identity: Rc<HeapIdentity>,
    owner_ref: Rc<OwnerRef>,
}

impl<K: Ord, V> PairingHeap<K, V> {
    /// Creates an empty heap with natural key order and the default
    /// (multi-pass) merge strategy.
    pub fn new() -> Self {
        Self::with_order(None, MergeStrategy::default())
    }

    /// Creates an empty heap ordered by `comparator`.
    pub fn with_comparator(comparator: KeyComparator<K>) -> Self {
        Self::with_order(Some(comparator), MergeStrategy::default())
    }

    /// Creates an empty heap using the given merge strategy.
    pub fn with_merge_strategy(strategy: MergeStrategy) -> Self {
        Self::with_order(None, strategy)
    }

    /// Returns the comparator, or `None` for natural ordering.
    pub fn comparator(&self) -> Option<&KeyComparator<K>> {
        self.comparator.as_ref()
    }

    /// Returns the merge strategy currently in use.
    pub fn merge_strategy(&self) -> MergeStrategy {
        self.strategy
    }

    /// Switches the merge strategy; takes effect on the next extract.
    pub fn set_merge_strategy(&mut self, strategy: MergeStrategy) {
        self.strategy = strategy;
    }

    fn with_order(comparator: Option<KeyComparator<K>>, strategy: MergeStrategy) -> Self {
        let identity = HeapIdentity::new();
        let owner_ref = OwnerRef::new(&identity);
        PairingHeap {
            root: None,
            size: 0,
            mods: Rc::new(Cell::new(0)),
            comparator,
            strategy,
            identity,
            owner_ref,
        }
    }

    fn bump(&self) {
        self.mods.set(self.mods.get().wrapping_add(1));
    }

    fn node_cmp(&self, a: &NodeRef<K, V>, b: &NodeRef<K, V>) -> Ordering {
        let a = a.borrow();
        let b = b.borrow();
        compare_with_sentinel(&self.comparator, a.infinite, &a.key, b.infinite, &b.key)
    }

    /// Makes the larger root the leftmost child of the smaller and returns
    /// the smaller. On a tie `second` wins, so insert favors the incoming
    /// entry and relink favors the sitting minimum.
    fn join(&self, first: NodeRef<K, V>, second: Link<K, V>) -> NodeRef<K, V> {
        let second = match second {
            Some(second) => second,
            None => return first,
        };
        if self.node_cmp(&first, &second) != Ordering::Less {
            // first becomes the leftmost child of second
            let first_previous = first.borrow().previous.clone();
            second.borrow_mut().previous = first_previous;
            first.borrow_mut().previous = Rc::downgrade(&second);
            let second_child = second.borrow_mut().child.take();
            if let Some(child) = &second_child {
                child.borrow_mut().previous = Rc::downgrade(&first);
            }
            first.borrow_mut().next = second_child;
            second.borrow_mut().child = Some(first);
            second
        } else {
            // second becomes the leftmost child of first
            second.borrow_mut().previous = Rc::downgrade(&first);
            let second_next = second.borrow_mut().next.take();
            if let Some(next) = &second_next {
                next.borrow_mut().previous = Rc::downgrade(&first);
            }
            first.borrow_mut().next = second_next;
            let first_child = first.borrow_mut().child.take();
            if let Some(child) = &first_child {
                child.borrow_mut().previous = Rc::downgrade(&second);
            }
            second.borrow_mut().next = first_child;
            first.borrow_mut().child = Some(second);
            first
        }
    }

    /// Consolidates a detached child list into a single tree.
    fn merge_siblings(&self, first: NodeRef<K, V>) -> NodeRef<K, V> {
        match self.strategy {
            MergeStrategy::TwoPass => self.two_pass_merge(first),
            MergeStrategy::Multi => self.multi_pass_merge(first),
        }
    }

    fn two_pass_merge(&self, first: NodeRef<K, V>) -> NodeRef<K, V> {
        if first.borrow().next.is_none() {
            return first;
        }

        let mut trees: SmallVec<[NodeRef<K, V>; 16]> = SmallVec::new();
        let mut cursor = Some(first);
        while let Some(node) = cursor {
            cursor = node.borrow_mut().next.take();
            trees.push(node);
        }
        let count = trees.len();

        // pair up left to right
        let mut index = 0;
        while index + 1 < count {
            let joined = self.join(
                Rc::clone(&trees[index]),
                Some(Rc::clone(&trees[index + 1])),
            );
            trees[index] = joined;
            index += 2;
        }

        // an odd count leaves a straggler: fold it into the last pair
        let mut jindex = index as isize - 2;
        if jindex == count as isize - 3 {
            let at = jindex as usize;
            let joined = self.join(Rc::clone(&trees[at]), Some(Rc::clone(&trees[at + 2])));
            trees[at] = joined;
        }

        // fold the pairs right to left
        while jindex >= 2 {
            let at = jindex as usize;
            let joined = self.join(Rc::clone(&trees[at - 2]), Some(Rc::clone(&trees[at])));
            trees[at - 2] = joined;
            jindex -= 2;
        }

        Rc::clone(&trees[0])
    }

    fn multi_pass_merge(&self, first: NodeRef<K, V>) -> NodeRef<K, V> {
        if first.borrow().next.is_none() {
            return first;
        }

        let mut queue: VecDeque<NodeRef<K, V>> = VecDeque::new();
        let mut cursor = Some(first);
        while let Some(node) = cursor {
            cursor = node.borrow_mut().next.take();
            queue.push_front(node);
        }

        // the queue shrinks by one per round, ending at the survivor
        while queue.len() > 1 {
            let one = queue.pop_front().unwrap();
            let two = queue.pop_front().unwrap();
            let joined = if one.borrow().next.is_none() {
                self.join(one, Some(two))
            } else {
                self.join(two, Some(one))
            };
            queue.push_back(joined);
        }
        queue.pop_front().unwrap()
    }

    /// Cuts a non-root node out of its child list and joins it with the
    /// root. Called after the node's key has been lowered.
    fn relink(&mut self, node: &NodeRef<K, V>) {
        if self.root.as_ref().map_or(true, |r| Rc::ptr_eq(r, node)) {
            return;
        }
        let next = node.borrow_mut().next.take();
        let previous = node.borrow().previous.upgrade();
        if let Some(previous) = &previous {
            if let Some(next) = &next {
                next.borrow_mut().previous = Rc::downgrade(previous);
            }
            let was_leftmost = previous
                .borrow()
                .child
                .as_ref()
                .map_or(false, |c| Rc::ptr_eq(c, node));
            if was_leftmost {
                previous.borrow_mut().child = next;
            } else {
                previous.borrow_mut().next = next;
            }
        }

        if let Some(root) = self.root.take() {
            let joined = self.join(Rc::clone(node), Some(root));
            {
                let mut j = joined.borrow_mut();
                j.previous = Weak::new();
                j.next = None;
            }
            self.root = Some(joined);
        }
    }

    fn reset_owner_ref(&mut self) {
        self.identity = HeapIdentity::new();
        self.owner_ref = OwnerRef::new(&self.identity);
    }
}

impl<K, V> PairingHeap<K, V> {
    fn teardown(&mut self) {
        let mut stack: Vec<NodeRef<K, V>> = Vec::new();
        if let Some(root) = self.root.take() {
            stack.push(root);
        }
        while let Some(node) = stack.pop() {
            let mut n = node.borrow_mut();
            n.previous = Weak::new();
            if let Some(child) = n.child.take() {
                stack.push(child);
            }
            if let Some(next) = n.next.take() {
                stack.push(next);
            }
        }
    }
}

impl<K: Ord, V> Default for PairingHeap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for PairingHeap<K, V> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<K: Ord, V> Heap<K, V> for PairingHeap<K, V> {
    type Entry = PairingEntry<K, V>;
    type Iter = PairingEntries<K, V>;

    fn new() -> Self {
        PairingHeap::new()
    }

    fn insert(&mut self, key: K, value: V) -> PairingEntry<K, V> {
        let node = Rc::new(RefCell::new(Node {
            key,
            value,
            infinite: false,
            owner: Some(Rc::clone(&self.owner_ref)),
            child: None,
            next: None,
            previous: Weak::new(),
        }));
        self.root = match self.root.take() {
            None => Some(Rc::clone(&node)),
            Some(root) => {
                let joined = self.join(root, Some(Rc::clone(&node)));
                joined.borrow_mut().previous = Weak::new();
                Some(joined)
            }
        };
        self.size += 1;
        self.bump();
        PairingEntry { node }
    }

    fn minimum(&self) -> Result<PairingEntry<K, V>, HeapError> {
        self.root
            .as_ref()
            .map(|root| PairingEntry {
                node: Rc::clone(root),
            })
            .ok_or(HeapError::Empty)
    }

    fn extract_minimum(&mut self) -> Result<PairingEntry<K, V>, HeapError> {
        let old_min = self.root.take().ok_or(HeapError::Empty)?;
        if self.size > 1 {
            if let Some(child) = old_min.borrow_mut().child.take() {
                let new_root = self.merge_siblings(child);
                {
                    let mut r = new_root.borrow_mut();
                    r.previous = Weak::new();
                    r.next = None;
                }
                self.root = Some(new_root);
            }
        }
        self.size -= 1;
        self.bump();
        {
            let mut m = old_min.borrow_mut();
            m.owner = None;
            m.child = None;
            m.next = None;
            m.previous = Weak::new();
        }
        Ok(PairingEntry { node: old_min })
    }

    fn decrease_key(&mut self, entry: &PairingEntry<K, V>, key: K) -> Result<(), HeapError> {
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
        }
        {
            let node = entry.node.borrow();
            if compare_keys(&self.comparator, &node.key, &key) == Ordering::Less {
                return Err(HeapError::KeyNotDecreased);
            }
        }
        entry.node.borrow_mut().key = key;
        self.relink(&entry.node);
        self.bump();
        Ok(())
    }

    fn delete(&mut self, entry: &PairingEntry<K, V>) -> Result<(), HeapError> {
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
        }
        let node = Rc::clone(&entry.node);
        if self.root.as_ref().map_or(false, |r| Rc::ptr_eq(r, &node)) {
            self.extract_minimum()?;
            return Ok(());
        }
        node.borrow_mut().infinite = true;
        self.relink(&node);
        let result = self.extract_minimum().map(|_| ());
        node.borrow_mut().infinite = false;
        result
    }

    fn union(&mut self, other: &mut Self) {
        if other.is_empty() {
            return;
        }
        let donated = other.root.take();
        self.root = match self.root.take() {
            None => donated,
            Some(root) => {
                let joined = self.join(root, donated);
                joined.borrow_mut().previous = Weak::new();
                Some(joined)
            }
        };
        self.size += other.size;
        self.bump();

        other.owner_ref.retarget(&self.identity);
        other.owner_ref = OwnerRef::new(&other.identity);
        other.size = 0;
        other.bump();
    }

    fn holds_entry(&self, entry: &PairingEntry<K, V>) -> bool {
        entry
            .node
            .borrow()
            .owner
            .as_ref()
            .map_or(false, |owner| owner.is_owned_by(&self.identity))
    }

    fn size(&self) -> usize {
        self.size
    }

    fn clear(&mut self) {
        self.teardown();
        self.size = 0;
        self.bump();
        self.reset_owner_ref();
    }

    fn entries(&self) -> PairingEntries<K, V> {
        PairingEntries {
            next: self.root.clone(),
            mods: Rc::clone(&self.mods),
            snapshot: self.mods.get(),
        }
    }
}

/// Eulerian tour over the tree: child first, then next sibling, then climb
/// left along `previous` until a parent with an unvisited sibling is found.
/// The root is recognized by its empty `previous` pointer.
fn tour_successor<K, V>(node: &NodeRef<K, V>) -> Link<K, V> {
    {
        let n = node.borrow();
        if let Some(child) = &n.child {
            return Some(Rc::clone(child));
        }
        if let Some(next) = &n.next {
            return Some(Rc::clone(next));
        }
    }
    let mut current = Rc::clone(node);
    loop {
        let previous = current.borrow().previous.upgrade()?;
        let is_parent = previous
            .borrow()
            .child
            .as_ref()
            .map_or(false, |c| Rc::ptr_eq(c, &current));
        if is_parent {
            if let Some(next) = &previous.borrow().next {
                return Some(Rc::clone(next));
            }
        }
        current = previous;
    }
}

/// Fail-fast iterator over a [`PairingHeap`].
pub struct PairingEntries<K, V> {
    next: Link<K, V>,
    mods: Rc<Cell<u64>>,
    snapshot: u64,
}

impl<K, V> Iterator for PairingEntries<K, V> {
    type Item = Result<PairingEntry<K, V>, HeapError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if self.mods.get() != self.snapshot {
            return Some(Err(HeapError::ConcurrentModification));
        }
        self.next = tour_successor(&current);
        Some(Ok(PairingEntry { node: current }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(heap: &mut PairingHeap<i32, i32>) -> Vec<i32> {
        let mut keys = Vec::new();
        while let Ok(entry) = heap.extract_minimum() {
            keys.push(*entry.key());
        }
        keys
    }

    #[test]
    fn insert_and_extract_sorted_multi() {
        let mut heap = PairingHeap::new();
        for key in [6, 2, 9, 2, 5, 0, 7, 3] {
            heap.insert(key, 0);
        }
        assert_eq!(drain(&mut heap), vec![0, 2, 2, 3, 5, 6, 7, 9]);
    }

    #[test]
    fn insert_and_extract_sorted_two_pass() {
        let mut heap = PairingHeap::with_merge_strategy(MergeStrategy::TwoPass);
        for key in [6, 2, 9, 2, 5, 0, 7, 3] {
            heap.insert(key, 0);
        }
        assert_eq!(drain(&mut heap), vec![0, 2, 2, 3, 5, 6, 7, 9]);
    }

    #[test]
    fn strategy_is_switchable_mid_heap() {
        let mut heap = PairingHeap::new();
        assert_eq!(heap.merge_strategy(), MergeStrategy::Multi);
        for key in (0..100).rev() {
            heap.insert(key, 0);
        }
        for expected in 0..50 {
            assert_eq!(*heap.extract_minimum().unwrap().key(), expected);
        }
        heap.set_merge_strategy(MergeStrategy::TwoPass);
        for expected in 50..100 {
            assert_eq!(*heap.extract_minimum().unwrap().key(), expected);
        }
    }

    #[test]
    fn equal_key_insert_wins_tie() {
        // join ties favor the second argument, so on insert the newcomer
        // becomes the root
        let mut heap = PairingHeap::new();
        heap.insert(5, 1);
        let second = heap.insert(5, 2);
        assert_eq!(*heap.minimum().unwrap().value(), 2);
        assert!(heap.holds_entry(&second));
    }

    #[test]
    fn decrease_key_relinks_to_root() {
        let mut heap = PairingHeap::new();
        heap.insert(10, 0);
        heap.insert(20, 0);
        let entry = heap.insert(30, 0);
        heap.extract_minimum().unwrap();
        heap.decrease_key(&entry, 5).unwrap();
        assert_eq!(*heap.minimum().unwrap().key(), 5);
        assert_eq!(drain(&mut heap), vec![5, 20]);
    }

    #[test]
    fn delete_non_root_entry() {
        let mut heap = PairingHeap::new();
        let entries: Vec<_> = [4, 1, 3, 2].iter().map(|&k| heap.insert(k, 0)).collect();
        heap.delete(&entries[2]).unwrap();
        assert!(!heap.holds_entry(&entries[2]));
        assert_eq!(*entries[2].key(), 3);
        assert_eq!(drain(&mut heap), vec![1, 2, 4]);
    }

    #[test]
    fn union_adopts_donor_entries() {
        let mut a = PairingHeap::new();
        let mut b = PairingHeap::new();
        let kept = a.insert(3, 0);
        let donated = b.insert(1, 0);
        a.union(&mut b);
        assert_eq!(a.size(), 2);
        assert!(b.is_empty());
        assert!(a.holds_entry(&kept));
        assert!(a.holds_entry(&donated));
        assert_eq!(*a.minimum().unwrap().key(), 1);
        // donor stays usable with a fresh ownership reference
        let fresh = b.insert(9, 0);
        assert!(b.holds_entry(&fresh));
        assert!(!a.holds_entry(&fresh));
    }

    #[test]
    fn iterator_fails_fast_on_decrease_key() {
        let mut heap = PairingHeap::new();
        let entry = heap.insert(10, 0);
        heap.insert(20, 0);
        let mut iter = heap.entries();
        assert!(iter.next().unwrap().is_ok());
        heap.decrease_key(&entry, 1).unwrap();
        assert_eq!(
            iter.next().unwrap().unwrap_err(),
            HeapError::ConcurrentModification
        );
        assert!(iter.next().is_none());
    }

    #[test]
    fn tour_visits_every_entry_once() {
        let mut heap = PairingHeap::new();
        for key in 0..25 {
            heap.insert((key * 7) % 25, 0);
        }
        heap.extract_minimum().unwrap();
        let mut seen: Vec<i32> = heap.entries().map(|e| *e.unwrap().key()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..25).collect::<Vec<_>>());
    }
}
