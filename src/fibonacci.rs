//! Fibonacci heap
//!
//! A forest of heap-ordered trees with a cached minimum pointer. Insert and
//! union are lazy O(1) root-list splices; extract-minimum pays the deferred
//! cost by consolidating equal-degree trees into a degree table. Decrease-key
//! cuts the shrunken node to the root list and walks up with cascading cuts,
//! using the mark bit to bound every tree by the Fibonacci sequence.
//!
//! The root list and each child list are doubly-linked: `next` owns the
//! right neighbor, `prev` is a weak back-reference, and the root list keeps
//! a weak tail pointer so union can splice in O(1).

use std::cell::{Cell, Ref, RefCell};
use std::cmp::Ordering;
use std::mem;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::owner::{HeapIdentity, OwnerRef};
use crate::traits::{compare_keys, compare_with_sentinel, Heap, HeapEntry, HeapError, KeyComparator};

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    infinite: bool,
    owner: Option<Rc<OwnerRef>>,
    degree: usize,
    marked: bool,
    parent: WeakLink<K, V>,
    child: Link<K, V>,
    next: Link<K, V>,
    prev: WeakLink<K, V>,
}

type NodeRef<K, V> = Rc<RefCell<Node<K, V>>>;
type Link<K, V> = Option<NodeRef<K, V>>;
type WeakLink<K, V> = Weak<RefCell<Node<K, V>>>;

/// Handle to an entry in a [`FibonacciHeap`].
#[derive(Debug)]
pub struct FibonacciEntry<K, V> {
    node: NodeRef<K, V>,
}

impl<K, V> Clone for FibonacciEntry<K, V> {
    fn clone(&self) -> Self {
        FibonacciEntry {
            node: Rc::clone(&self.node),
        }
    }
}

impl<K, V> PartialEq for FibonacciEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl<K, V> Eq for FibonacciEntry<K, V> {}

impl<K, V> HeapEntry<K, V> for FibonacciEntry<K, V> {
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

/// A Fibonacci heap: O(1) insert, union, decrease-key (amortized);
/// O(log n) amortized extract-minimum.
pub struct FibonacciHeap<K, V> {
    roots: Link<K, V>,
    tail: WeakLink<K, V>,
    minimum: WeakLink<K, V>,
    size: usize,
    mods: Rc<Cell<u64>>,
    comparator: Option<KeyComparator<K>>,
    identity: Rc<HeapIdentity>,
    owner_ref: Rc<OwnerRef>,
}

impl<K: Ord, V> FibonacciHeap<K, V> {
    /// Creates an empty heap ordered by the keys' natural order.
    pub fn new() -> Self {
        Self::with_order(None)
    }

    /// Creates an empty heap ordered by `comparator`.
    pub fn with_comparator(comparator: KeyComparator<K>) -> Self {
        Self::with_order(Some(comparator))
    }

    /// Returns the comparator, or `None` for natural ordering.
    pub fn comparator(&self) -> Option<&KeyComparator<K>> {
        self.comparator.as_ref()
    }

    fn with_order(comparator: Option<KeyComparator<K>>) -> Self {
        let identity = HeapIdentity::new();
        let owner_ref = OwnerRef::new(&identity);
        FibonacciHeap {
            roots: None,
            tail: Weak::new(),
            minimum: Weak::new(),
            size: 0,
            mods: Rc::new(Cell::new(0)),
            comparator,
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

    /// Prepends a detached node to the root list.
    fn push_root_front(&mut self, node: &NodeRef<K, V>) {
        let old_head = self.roots.take();
        if let Some(head) = &old_head {
            head.borrow_mut().prev = Rc::downgrade(node);
        } else {
            self.tail = Rc::downgrade(node);
        }
        {
            let mut n = node.borrow_mut();
            n.parent = Weak::new();
            n.prev = Weak::new();
            n.next = old_head;
        }
        self.roots = Some(Rc::clone(node));
    }

    /// Appends a detached node to the root list, maintaining the cached
    /// minimum. Used when consolidate rebuilds the list from the degree
    /// table.
    fn append_root(&mut self, node: &NodeRef<K, V>) {
        {
            let mut n = node.borrow_mut();
            n.parent = Weak::new();
            n.next = None;
        }
        match self.tail.upgrade() {
            Some(tail) => {
                node.borrow_mut().prev = Rc::downgrade(&tail);
                tail.borrow_mut().next = Some(Rc::clone(node));
            }
            None => {
                node.borrow_mut().prev = Weak::new();
                self.roots = Some(Rc::clone(node));
            }
        }
        self.tail = Rc::downgrade(node);
        let is_new_min = match self.minimum.upgrade() {
            Some(min) => self.node_cmp(node, &min) == Ordering::Less,
            None => true,
        };
        if is_new_min {
            self.minimum = Rc::downgrade(node);
        }
    }

    /// Unlinks a node from the root list. The caller keeps it alive.
    fn remove_root(&mut self, node: &NodeRef<K, V>) {
        let next = node.borrow_mut().next.take();
        let prev = node.borrow().prev.upgrade();
        if let Some(next) = &next {
            next.borrow_mut().prev = match &prev {
                Some(prev) => Rc::downgrade(prev),
                None => Weak::new(),
            };
        } else {
            self.tail = match &prev {
                Some(prev) => Rc::downgrade(prev),
                None => Weak::new(),
            };
        }
        match prev {
            Some(prev) => prev.borrow_mut().next = next,
            None => self.roots = next,
        }
        node.borrow_mut().prev = Weak::new();
    }

    /// Makes `y` a child of `x` (both detached roots of equal degree).
    fn link_child(&self, y: NodeRef<K, V>, x: &NodeRef<K, V>) {
        {
            let mut yb = y.borrow_mut();
            yb.parent = Rc::downgrade(x);
            yb.marked = false;
            yb.prev = Weak::new();
        }
        let old_child = x.borrow_mut().child.take();
        if let Some(child) = &old_child {
            child.borrow_mut().prev = Rc::downgrade(&y);
        }
        y.borrow_mut().next = old_child;
        let mut xb = x.borrow_mut();
        xb.child = Some(y);
        xb.degree += 1;
    }

    /// Melds equal-degree trees until every root has a distinct degree,
    /// then rebuilds the root list (and the minimum) from the table.
    fn consolidate(&mut self) {
        let mut detached: Vec<NodeRef<K, V>> = Vec::new();
        let mut cursor = self.roots.take();
        while let Some(node) = cursor {
            cursor = node.borrow_mut().next.take();
            node.borrow_mut().prev = Weak::new();
            detached.push(node);
        }
        self.tail = Weak::new();
        self.minimum = Weak::new();

        let mut buckets: SmallVec<[Link<K, V>; 32]> = SmallVec::new();
        for root in detached {
            let mut x = root;
            loop {
                let degree = x.borrow().degree;
                while buckets.len() <= degree {
                    buckets.push(None);
                }
                match buckets[degree].take() {
                    None => {
                        buckets[degree] = Some(x);
                        break;
                    }
                    Some(y) => {
                        let (winner, loser) = if self.node_cmp(&y, &x) == Ordering::Less {
                            (y, x)
                        } else {
                            (x, y)
                        };
                        self.link_child(loser, &winner);
                        x = winner;
                    }
                }
            }
        }

        for slot in buckets {
            if let Some(node) = slot {
                self.append_root(&node);
            }
        }
    }

    /// Moves `x` from `parent`'s child list to the root list.
    fn cut(&mut self, x: &NodeRef<K, V>, parent: &NodeRef<K, V>) {
        let next = x.borrow_mut().next.take();
        let prev = x.borrow().prev.upgrade();
        if let Some(next) = &next {
            next.borrow_mut().prev = match &prev {
                Some(prev) => Rc::downgrade(prev),
                None => Weak::new(),
            };
        }
        match prev {
            Some(prev) => prev.borrow_mut().next = next,
            // x was the first child
            None => parent.borrow_mut().child = next,
        }
        parent.borrow_mut().degree -= 1;
        self.push_root_front(x);
        x.borrow_mut().marked = false;
    }

    /// Walks up from a node that just lost a child, cutting marked
    /// ancestors until an unmarked one (or a root) absorbs the loss.
    fn cascading_cut(&mut self, node: NodeRef<K, V>) {
        let mut y = node;
        loop {
            let z = match y.borrow().parent.upgrade() {
                Some(z) => z,
                None => break,
            };
            let marked = y.borrow().marked;
            if !marked {
                y.borrow_mut().marked = true;
                break;
            }
            self.cut(&y, &z);
            y = z;
        }
    }

    fn decrease_key_impl(&mut self, node: &NodeRef<K, V>) {
        let parent = node.borrow().parent.upgrade();
        if let Some(parent) = parent {
            if self.node_cmp(node, &parent) == Ordering::Less {
                self.cut(node, &parent);
                self.cascading_cut(parent);
            }
        }
        let is_new_min = match self.minimum.upgrade() {
            Some(min) => self.node_cmp(node, &min) == Ordering::Less,
            None => true,
        };
        if is_new_min {
            self.minimum = Rc::downgrade(node);
        }
    }

    fn reset_owner_ref(&mut self) {
        self.identity = HeapIdentity::new();
        self.owner_ref = OwnerRef::new(&self.identity);
    }
}

impl<K, V> FibonacciHeap<K, V> {
    fn teardown(&mut self) {
        let mut stack: Vec<NodeRef<K, V>> = Vec::new();
        if let Some(head) = self.roots.take() {
            stack.push(head);
        }
        while let Some(node) = stack.pop() {
            let mut n = node.borrow_mut();
            n.parent = Weak::new();
            n.prev = Weak::new();
            if let Some(child) = n.child.take() {
                stack.push(child);
            }
            if let Some(next) = n.next.take() {
                stack.push(next);
            }
        }
        self.tail = Weak::new();
        self.minimum = Weak::new();
    }
}

impl<K: Ord, V> Default for FibonacciHeap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for FibonacciHeap<K, V> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<K: Ord, V> Heap<K, V> for FibonacciHeap<K, V> {
    type Entry = FibonacciEntry<K, V>;
    type Iter = FibonacciEntries<K, V>;

    fn new() -> Self {
        FibonacciHeap::new()
    }

    fn insert(&mut self, key: K, value: V) -> FibonacciEntry<K, V> {
        let node = Rc::new(RefCell::new(Node {
            key,
            value,
            infinite: false,
            owner: Some(Rc::clone(&self.owner_ref)),
            degree: 0,
            marked: false,
            parent: Weak::new(),
            child: None,
            next: None,
            prev: Weak::new(),
        }));
        let is_new_min = match self.minimum.upgrade() {
            Some(min) => self.node_cmp(&node, &min) == Ordering::Less,
            None => true,
        };
        self.push_root_front(&node);
        if is_new_min {
            self.minimum = Rc::downgrade(&node);
        }
        self.size += 1;
        self.bump();
        FibonacciEntry { node }
    }

    fn minimum(&self) -> Result<FibonacciEntry<K, V>, HeapError> {
        self.minimum
            .upgrade()
            .map(|node| FibonacciEntry { node })
            .ok_or(HeapError::Empty)
    }

    fn extract_minimum(&mut self) -> Result<FibonacciEntry<K, V>, HeapError> {
        let min = self.minimum.upgrade().ok_or(HeapError::Empty)?;
        self.remove_root(&min);

        // promote the children to roots
        let mut child = min.borrow_mut().child.take();
        while let Some(node) = child {
            child = node.borrow_mut().next.take();
            node.borrow_mut().marked = false;
            self.push_root_front(&node);
        }
        min.borrow_mut().degree = 0;

        if self.roots.is_some() {
            self.consolidate();
        } else {
            self.minimum = Weak::new();
            self.tail = Weak::new();
        }

        self.size -= 1;
        self.bump();
        min.borrow_mut().owner = None;
        Ok(FibonacciEntry { node: min })
    }

    fn decrease_key(&mut self, entry: &FibonacciEntry<K, V>, key: K) -> Result<(), HeapError> {
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
        }
        {
            let node = entry.node.borrow();
            if compare_keys(&self.comparator, &key, &node.key) == Ordering::Greater {
                return Err(HeapError::KeyNotDecreased);
            }
        }
        entry.node.borrow_mut().key = key;
        self.decrease_key_impl(&entry.node);
        self.bump();
        Ok(())
    }

    fn delete(&mut self, entry: &FibonacciEntry<K, V>) -> Result<(), HeapError> {
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
        }
        entry.node.borrow_mut().infinite = true;
        self.decrease_key_impl(&entry.node);
        let result = self.extract_minimum().map(|_| ());
        entry.node.borrow_mut().infinite = false;
        result
    }

    fn union(&mut self, other: &mut Self) {
        if other.is_empty() {
            return;
        }
        if self.roots.is_none() {
            self.roots = other.roots.take();
            self.tail = mem::replace(&mut other.tail, Weak::new());
            self.minimum = mem::replace(&mut other.minimum, Weak::new());
        } else {
            // splice the donated root list onto our tail
            if let Some(head) = other.roots.take() {
                if let Some(tail) = self.tail.upgrade() {
                    head.borrow_mut().prev = Rc::downgrade(&tail);
                    tail.borrow_mut().next = Some(head);
                }
            }
            self.tail = mem::replace(&mut other.tail, Weak::new());
            let donated_min = mem::replace(&mut other.minimum, Weak::new());
            if let (Some(donated), Some(current)) =
                (donated_min.upgrade(), self.minimum.upgrade())
            {
                if self.node_cmp(&donated, &current) == Ordering::Less {
                    self.minimum = Rc::downgrade(&donated);
                }
            }
        }
        self.size += other.size;
        self.bump();

        other.owner_ref.retarget(&self.identity);
        other.owner_ref = OwnerRef::new(&other.identity);
        other.size = 0;
        other.bump();
    }

    fn holds_entry(&self, entry: &FibonacciEntry<K, V>) -> bool {
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

    fn entries(&self) -> FibonacciEntries<K, V> {
        FibonacciEntries {
            next: self.roots.clone(),
            mods: Rc::clone(&self.mods),
            snapshot: self.mods.get(),
        }
    }
}

/// Preorder over the forest: child list first, then the next sibling (or
/// next root), climbing until an ancestor has an unvisited right neighbor.
fn forest_successor<K, V>(node: &NodeRef<K, V>) -> Link<K, V> {
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
        let parent = current.borrow().parent.upgrade()?;
        if let Some(next) = &parent.borrow().next {
            return Some(Rc::clone(next));
        }
        current = parent;
    }
}

/// Fail-fast iterator over a [`FibonacciHeap`].
pub struct FibonacciEntries<K, V> {
    next: Link<K, V>,
    mods: Rc<Cell<u64>>,
    snapshot: u64,
}

impl<K, V> Iterator for FibonacciEntries<K, V> {
    type Item = Result<FibonacciEntry<K, V>, HeapError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if self.mods.get() != self.snapshot {
            return Some(Err(HeapError::ConcurrentModification));
        }
        self.next = forest_successor(&current);
        Some(Ok(FibonacciEntry { node: current }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(heap: &mut FibonacciHeap<i32, i32>) -> Vec<i32> {
        let mut keys = Vec::new();
        while let Ok(entry) = heap.extract_minimum() {
            keys.push(*entry.key());
        }
        keys
    }

    #[test]
    fn insert_and_extract_sorted() {
        let mut heap = FibonacciHeap::new();
        for key in [31, 7, 22, 7, 15, 2, 40, 11, 3] {
            heap.insert(key, 0);
        }
        assert_eq!(heap.size(), 9);
        assert_eq!(drain(&mut heap), vec![2, 3, 7, 7, 11, 15, 22, 31, 40]);
    }

    #[test]
    fn consolidate_leaves_distinct_root_degrees() {
        let mut heap = FibonacciHeap::new();
        for key in 0..64 {
            heap.insert(key, 0);
        }
        heap.extract_minimum().unwrap();
        let mut degrees = Vec::new();
        let mut cursor = heap.roots.clone();
        while let Some(root) = cursor {
            degrees.push(root.borrow().degree);
            cursor = root.borrow().next.clone();
        }
        let mut unique = degrees.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), degrees.len(), "duplicate root degrees");
    }

    #[test]
    fn cascading_cut_promotes_grandparent() {
        let mut heap = FibonacciHeap::new();
        heap.insert(1, 0);
        for key in [10, 20, 30, 40, 50, 60, 70, 80] {
            heap.insert(key, 0);
        }
        heap.extract_minimum().unwrap();

        // find a depth-1 node with at least two children
        let root = heap.roots.clone().expect("consolidated tree");
        let mut parent: Link<i32, i32> = None;
        let mut cursor = root.borrow().child.clone();
        while let Some(node) = cursor {
            if node.borrow().degree >= 2 {
                parent = Some(Rc::clone(&node));
                break;
            }
            cursor = node.borrow().next.clone();
        }
        let parent = parent.expect("no depth-1 node with two children");
        let first_child = parent.borrow().child.clone().unwrap();
        let second_child = first_child.borrow().next.clone().unwrap();

        heap.decrease_key(&FibonacciEntry { node: Rc::clone(&first_child) }, -1)
            .unwrap();
        assert!(parent.borrow().marked, "losing one child must mark");
        assert!(first_child.borrow().parent.upgrade().is_none());

        heap.decrease_key(&FibonacciEntry { node: Rc::clone(&second_child) }, -2)
            .unwrap();
        // losing a second child cascades: the marked parent is cut too
        assert!(parent.borrow().parent.upgrade().is_none());
        assert!(!parent.borrow().marked);
        assert_eq!(*heap.minimum().unwrap().key(), -2);
    }

    #[test]
    fn decrease_key_without_cut_updates_minimum() {
        let mut heap = FibonacciHeap::new();
        let entry = heap.insert(10, 0);
        heap.insert(5, 0);
        heap.decrease_key(&entry, 1).unwrap();
        assert_eq!(*heap.minimum().unwrap().key(), 1);
    }

    #[test]
    fn delete_deep_entry() {
        let mut heap = FibonacciHeap::new();
        let entries: Vec<_> = (0..32).map(|key| heap.insert(key, 0)).collect();
        heap.extract_minimum().unwrap();
        heap.delete(&entries[20]).unwrap();
        assert!(!heap.holds_entry(&entries[20]));
        assert_eq!(*entries[20].key(), 20);
        let mut remaining = drain(&mut heap);
        remaining.sort_unstable();
        let expected: Vec<i32> = (1..32).filter(|&k| k != 20).collect();
        assert_eq!(remaining, expected);
    }

    #[test]
    fn union_splices_in_constant_time() {
        let mut a = FibonacciHeap::new();
        let mut b = FibonacciHeap::new();
        for key in [5, 9, 13] {
            a.insert(key, 0);
        }
        for key in [2, 11] {
            b.insert(key, 0);
        }
        let donated = b.minimum().unwrap();
        a.union(&mut b);
        assert_eq!(a.size(), 5);
        assert!(b.is_empty());
        assert!(a.holds_entry(&donated));
        assert_eq!(*a.minimum().unwrap().key(), 2);
        assert_eq!(drain(&mut a), vec![2, 5, 9, 11, 13]);
    }

    #[test]
    fn union_into_empty_heap() {
        let mut a: FibonacciHeap<i32, i32> = FibonacciHeap::new();
        let mut b = FibonacciHeap::new();
        b.insert(3, 0);
        b.insert(1, 0);
        a.union(&mut b);
        assert_eq!(a.size(), 2);
        assert_eq!(*a.minimum().unwrap().key(), 1);
    }

    #[test]
    fn iterator_fails_fast_on_union() {
        let mut a = FibonacciHeap::new();
        let mut b = FibonacciHeap::new();
        a.insert(1, 0);
        b.insert(2, 0);
        let mut iter = a.entries();
        assert!(iter.next().unwrap().is_ok());
        a.union(&mut b);
        assert_eq!(
            iter.next().unwrap().unwrap_err(),
            HeapError::ConcurrentModification
        );
    }

    #[test]
    fn minimum_on_empty_heap() {
        let heap: FibonacciHeap<i32, i32> = FibonacciHeap::new();
        assert_eq!(heap.minimum().unwrap_err(), HeapError::Empty);
    }
}
