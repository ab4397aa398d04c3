//! Binomial heap
//!
//! A forest of binomial trees whose roots form a sibling list sorted by
//! strictly increasing degree. Union is a sorted merge of the two root
//! lists followed by a carry sweep that links equal-degree trees; every
//! other operation is built on union. Decrease-key percolates by swapping
//! node contents with the parent, so the externally visible entry is a
//! payload cell that travels with its key rather than a fixed tree node.

use std::cell::{Cell, Ref, RefCell};
use std::cmp::Ordering;
use std::mem;
use std::rc::{Rc, Weak};

use crate::owner::{HeapIdentity, OwnerRef};
use crate::traits::{compare_keys, compare_with_sentinel, Heap, HeapEntry, HeapError, KeyComparator};

/// Contents of an entry. Percolation swaps payloads between nodes, so the
/// payload (not the node) is what entry handles point at; `node` tracks the
/// physical node currently carrying this payload.
#[derive(Debug)]
struct Payload<K, V> {
    key: K,
    value: V,
    infinite: bool,
    owner: Option<Rc<OwnerRef>>,
    node: Weak<RefCell<Node<K, V>>>,
}

#[derive(Debug)]
struct Node<K, V> {
    degree: usize,
    payload: Rc<RefCell<Payload<K, V>>>,
    // children are kept in descending degree order, roots ascending
    child: Link<K, V>,
    sibling: Link<K, V>,
    parent: Weak<RefCell<Node<K, V>>>,
}

type NodeRef<K, V> = Rc<RefCell<Node<K, V>>>;
type Link<K, V> = Option<NodeRef<K, V>>;
type PayloadRef<K, V> = Rc<RefCell<Payload<K, V>>>;

/// Handle to an entry in a [`BinomialHeap`].
#[derive(Debug)]
pub struct BinomialEntry<K, V> {
    payload: PayloadRef<K, V>,
}

impl<K, V> Clone for BinomialEntry<K, V> {
    fn clone(&self) -> Self {
        BinomialEntry {
            payload: Rc::clone(&self.payload),
        }
    }
}

impl<K, V> PartialEq for BinomialEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.payload, &other.payload)
    }
}

impl<K, V> Eq for BinomialEntry<K, V> {}

impl<K, V> HeapEntry<K, V> for BinomialEntry<K, V> {
    fn key(&self) -> Ref<'_, K> {
        Ref::map(self.payload.borrow(), |payload| &payload.key)
    }

    fn value(&self) -> Ref<'_, V> {
        Ref::map(self.payload.borrow(), |payload| &payload.value)
    }

    fn set_value(&self, value: V) -> V {
        mem::replace(&mut self.payload.borrow_mut().value, value)
    }
}

/// A binomial heap: O(log n) insert, extract, decrease-key, union.
pub struct BinomialHeap<K, V> {
    head: Link<K, V>,
    size: usize,
    mods: Rc<Cell<u64>>,
    comparator: Option<KeyComparator<K>>,
    identity: Rc<HeapIdentity>,
    owner_ref: Rc<OwnerRef>,
}

impl<K: Ord, V> BinomialHeap<K, V> {
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
        BinomialHeap {
            head: None,
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
        let pa = Rc::clone(&a.borrow().payload);
        let pb = Rc::clone(&b.borrow().payload);
        let pa = pa.borrow();
        let pb = pb.borrow();
        compare_with_sentinel(&self.comparator, pa.infinite, &pa.key, pb.infinite, &pb.key)
    }

    /// Makes `y` the leftmost child of `z`. Both must be roots of trees of
    /// equal degree.
    fn link(&self, y: NodeRef<K, V>, z: &NodeRef<K, V>) {
        y.borrow_mut().parent = Rc::downgrade(z);
        let old_child = z.borrow_mut().child.take();
        y.borrow_mut().sibling = old_child;
        let mut zb = z.borrow_mut();
        zb.child = Some(y);
        zb.degree += 1;
    }

    /// Merges two degree-sorted root lists into one, preserving the sort.
    /// Equal degrees take from the second list first.
    fn merge_lists(&self, one: Link<K, V>, two: Link<K, V>) -> Link<K, V> {
        let (mut one, mut two) = match (one, two) {
            (None, two) => return two,
            (one, None) => return one,
            (one, two) => (one, two),
        };
        let mut head: Link<K, V> = None;
        let mut tail: Link<K, V> = None;
        loop {
            let (a, b) = match (one.take(), two.take()) {
                (Some(a), Some(b)) => (a, b),
                (rest, None) | (None, rest) => {
                    match &tail {
                        Some(tail) => tail.borrow_mut().sibling = rest,
                        None => head = rest,
                    }
                    break;
                }
            };
            let chosen = if a.borrow().degree < b.borrow().degree {
                one = a.borrow_mut().sibling.take();
                two = Some(b);
                a
            } else {
                two = b.borrow_mut().sibling.take();
                one = Some(a);
                b
            };
            match &tail {
                Some(tail) => tail.borrow_mut().sibling = Some(Rc::clone(&chosen)),
                None => head = Some(Rc::clone(&chosen)),
            }
            tail = Some(chosen);
        }
        head
    }

    /// Unions two root lists: sorted merge, then a left-to-right carry sweep
    /// linking adjacent equal-degree trees (CLRS binomial-heap-union).
    fn union_lists(&self, one: Link<K, V>, two: Link<K, V>) -> Link<K, V> {
        let mut newhead = match self.merge_lists(one, two) {
            Some(head) => head,
            None => return None,
        };

        let mut prev_x: Link<K, V> = None;
        let mut x = Rc::clone(&newhead);
        let mut next_x = x.borrow().sibling.clone();
        while let Some(next) = next_x {
            let x_degree = x.borrow().degree;
            let next_degree = next.borrow().degree;
            let after_degree = next.borrow().sibling.as_ref().map(|s| s.borrow().degree);

            if x_degree != next_degree || after_degree == Some(x_degree) {
                // either no carry, or three equal degrees: defer to the pair
                // on the right
                prev_x = Some(Rc::clone(&x));
                x = next;
            } else if self.node_cmp(&x, &next) != Ordering::Greater {
                let after = next.borrow_mut().sibling.take();
                x.borrow_mut().sibling = after;
                self.link(next, &x);
            } else {
                match &prev_x {
                    Some(prev) => prev.borrow_mut().sibling = Some(Rc::clone(&next)),
                    None => newhead = Rc::clone(&next),
                }
                self.link(Rc::clone(&x), &next);
                x = next;
            }
            next_x = x.borrow().sibling.clone();
        }
        Some(newhead)
    }

    /// Restores heap order after the key at `node` shrank, by swapping
    /// payloads up the parent chain. Handles follow their payloads.
    fn percolate_up(&self, node: &NodeRef<K, V>) {
        let mut y = Rc::clone(node);
        loop {
            let z = match y.borrow().parent.upgrade() {
                Some(z) => z,
                None => break,
            };
            if self.node_cmp(&y, &z) != Ordering::Less {
                break;
            }
            let py = Rc::clone(&y.borrow().payload);
            let pz = Rc::clone(&z.borrow().payload);
            y.borrow_mut().payload = Rc::clone(&pz);
            z.borrow_mut().payload = Rc::clone(&py);
            py.borrow_mut().node = Rc::downgrade(&z);
            pz.borrow_mut().node = Rc::downgrade(&y);
            y = z;
        }
    }

    fn reset_owner_ref(&mut self) {
        self.identity = HeapIdentity::new();
        self.owner_ref = OwnerRef::new(&self.identity);
    }
}

impl<K, V> BinomialHeap<K, V> {
    fn teardown(&mut self) {
        let mut stack: Vec<NodeRef<K, V>> = Vec::new();
        if let Some(head) = self.head.take() {
            stack.push(head);
        }
        while let Some(node) = stack.pop() {
            let mut n = node.borrow_mut();
            n.parent = Weak::new();
            n.payload.borrow_mut().node = Weak::new();
            if let Some(child) = n.child.take() {
                stack.push(child);
            }
            if let Some(sibling) = n.sibling.take() {
                stack.push(sibling);
            }
        }
    }
}

impl<K: Ord, V> Default for BinomialHeap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for BinomialHeap<K, V> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<K: Ord, V> Heap<K, V> for BinomialHeap<K, V> {
    type Entry = BinomialEntry<K, V>;
    type Iter = BinomialEntries<K, V>;

    fn new() -> Self {
        BinomialHeap::new()
    }

    fn insert(&mut self, key: K, value: V) -> BinomialEntry<K, V> {
        let payload = Rc::new(RefCell::new(Payload {
            key,
            value,
            infinite: false,
            owner: Some(Rc::clone(&self.owner_ref)),
            node: Weak::new(),
        }));
        let node = Rc::new(RefCell::new(Node {
            degree: 0,
            payload: Rc::clone(&payload),
            child: None,
            sibling: None,
            parent: Weak::new(),
        }));
        payload.borrow_mut().node = Rc::downgrade(&node);
        let head = self.head.take();
        self.head = self.union_lists(head, Some(node));
        self.size += 1;
        self.bump();
        BinomialEntry { payload }
    }

    fn minimum(&self) -> Result<BinomialEntry<K, V>, HeapError> {
        let mut min = Rc::clone(self.head.as_ref().ok_or(HeapError::Empty)?);
        let mut cursor = min.borrow().sibling.clone();
        while let Some(node) = cursor {
            if self.node_cmp(&min, &node) == Ordering::Greater {
                min = Rc::clone(&node);
            }
            cursor = node.borrow().sibling.clone();
        }
        let payload = Rc::clone(&min.borrow().payload);
        Ok(BinomialEntry { payload })
    }

    fn extract_minimum(&mut self) -> Result<BinomialEntry<K, V>, HeapError> {
        // find the minimum root and its predecessor
        let mut min = Rc::clone(self.head.as_ref().ok_or(HeapError::Empty)?);
        let mut min_prev: Link<K, V> = None;
        let mut prev = Rc::clone(&min);
        let mut cursor = min.borrow().sibling.clone();
        while let Some(node) = cursor {
            if self.node_cmp(&min, &node) == Ordering::Greater {
                min_prev = Some(Rc::clone(&prev));
                min = Rc::clone(&node);
            }
            cursor = node.borrow().sibling.clone();
            prev = node;
        }

        // unlink the minimum from the root list
        let min_sibling = min.borrow_mut().sibling.take();
        match &min_prev {
            Some(prev) => prev.borrow_mut().sibling = min_sibling,
            None => self.head = min_sibling,
        }

        // reverse the child list (descending degree becomes ascending) and
        // union it back in
        let mut child = min.borrow_mut().child.take();
        let mut reversed: Link<K, V> = None;
        while let Some(node) = child {
            child = node.borrow_mut().sibling.take();
            {
                let mut n = node.borrow_mut();
                n.parent = Weak::new();
                n.sibling = reversed.take();
            }
            reversed = Some(node);
        }
        if reversed.is_some() {
            let head = self.head.take();
            self.head = self.union_lists(head, reversed);
        }

        self.size -= 1;
        self.bump();
        let payload = Rc::clone(&min.borrow().payload);
        {
            let mut p = payload.borrow_mut();
            p.owner = None;
            p.node = Weak::new();
        }
        Ok(BinomialEntry { payload })
    }

    fn decrease_key(&mut self, entry: &BinomialEntry<K, V>, key: K) -> Result<(), HeapError> {
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
        }
        {
            let payload = entry.payload.borrow();
            if compare_keys(&self.comparator, &key, &payload.key) == Ordering::Greater {
                return Err(HeapError::KeyNotDecreased);
            }
        }
        entry.payload.borrow_mut().key = key;
        let node = entry.payload.borrow().node.upgrade();
        if let Some(node) = node {
            self.percolate_up(&node);
        }
        self.bump();
        Ok(())
    }

    fn delete(&mut self, entry: &BinomialEntry<K, V>) -> Result<(), HeapError> {
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
        }
        entry.payload.borrow_mut().infinite = true;
        let node = entry.payload.borrow().node.upgrade();
        if let Some(node) = node {
            self.percolate_up(&node);
        }
        let result = self.extract_minimum().map(|_| ());
        entry.payload.borrow_mut().infinite = false;
        result
    }

    fn union(&mut self, other: &mut Self) {
        if other.is_empty() {
            return;
        }
        let donated = other.head.take();
        let head = self.head.take();
        self.head = self.union_lists(donated, head);
        self.size += other.size;
        self.bump();

        other.owner_ref.retarget(&self.identity);
        other.owner_ref = OwnerRef::new(&other.identity);
        other.size = 0;
        other.bump();
    }

    fn holds_entry(&self, entry: &BinomialEntry<K, V>) -> bool {
        entry
            .payload
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

    fn entries(&self) -> BinomialEntries<K, V> {
        BinomialEntries {
            next: self.head.clone(),
            mods: Rc::clone(&self.mods),
            snapshot: self.mods.get(),
        }
    }
}

/// Euler-tour successor. A childless node always ends its parent's subtree,
/// so the continuation is the parent's sibling (or, for a root, the next
/// root).
fn euler_successor<K, V>(node: &NodeRef<K, V>) -> Link<K, V> {
    let n = node.borrow();
    if let Some(child) = &n.child {
        return Some(Rc::clone(child));
    }
    match n.parent.upgrade() {
        None => n.sibling.clone(),
        Some(parent) => {
            let sibling = parent.borrow().sibling.clone();
            sibling
        }
    }
}

/// Fail-fast iterator over a [`BinomialHeap`].
pub struct BinomialEntries<K, V> {
    next: Link<K, V>,
    mods: Rc<Cell<u64>>,
    snapshot: u64,
}

impl<K, V> Iterator for BinomialEntries<K, V> {
    type Item = Result<BinomialEntry<K, V>, HeapError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if self.mods.get() != self.snapshot {
            return Some(Err(HeapError::ConcurrentModification));
        }
        self.next = euler_successor(&current);
        let payload = Rc::clone(&current.borrow().payload);
        Some(Ok(BinomialEntry { payload }))
    }
}
