//! Leftist heap
//!
//! A leftist tree keeps the null-path length (npl) of every left child at
//! least that of its sibling, which bounds the rightmost path by O(log n)
//! and makes `link` along that path the single primitive: insert, extract,
//! union, decrease-key and delete are all expressed through it. All
//! operations are O(log n) worst-case.

use std::cell::{Cell, Ref, RefCell};
use std::cmp::Ordering;
use std::mem;
use std::rc::{Rc, Weak};

use crate::owner::{HeapIdentity, OwnerRef};
use crate::traits::{compare_keys, compare_with_sentinel, Heap, HeapEntry, HeapError, KeyComparator};

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    infinite: bool,
    owner: Option<Rc<OwnerRef>>,
    npl: usize,
    left: Link<K, V>,
    right: Link<K, V>,
    parent: Weak<RefCell<Node<K, V>>>,
}

type NodeRef<K, V> = Rc<RefCell<Node<K, V>>>;
type Link<K, V> = Option<NodeRef<K, V>>;

/// Handle to an entry in a [`LeftistHeap`].
#[derive(Debug)]
pub struct LeftistEntry<K, V> {
    node: NodeRef<K, V>,
}

impl<K, V> Clone for LeftistEntry<K, V> {
    fn clone(&self) -> Self {
        LeftistEntry {
            node: Rc::clone(&self.node),
        }
    }
}

impl<K, V> PartialEq for LeftistEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl<K, V> Eq for LeftistEntry<K, V> {}

impl<K, V> HeapEntry<K, V> for LeftistEntry<K, V> {
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

/// A leftist heap with O(log n) worst-case operations.
pub struct LeftistHeap<K, V> {
    root: Link<K, V>,
    size: usize,
    mods: Rc<Cell<u64>>,
    comparator: Option<KeyComparator<K>>,
    identity: Rc<HeapIdentity>,
    owner_ref: Rc<OwnerRef>,
}

impl<K: Ord, V> LeftistHeap<K, V> {
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
        LeftistHeap {
            root: None,
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

    /// Merges two subtrees, returning the new root. Ties keep the second
    /// tree on top.
    fn link(&self, first: Link<K, V>, second: Link<K, V>) -> Link<K, V> {
        match (first, second) {
            (None, second) => second,
            (first, None) => first,
            (Some(a), Some(b)) => {
                if self.node_cmp(&a, &b) == Ordering::Less {
                    self.link_under(&a, b);
                    Some(a)
                } else {
                    self.link_under(&b, a);
                    Some(b)
                }
            }
        }
    }

    /// Hangs `child` under `parent`, filling the left slot first and
    /// otherwise merging into the right spine, then restores the leftist
    /// shape of `parent`.
    fn link_under(&self, parent: &NodeRef<K, V>, child: NodeRef<K, V>) {
        let left_vacant = parent.borrow().left.is_none();
        if left_vacant {
            child.borrow_mut().parent = Rc::downgrade(parent);
            parent.borrow_mut().left = Some(child);
            return;
        }
        let old_right = parent.borrow_mut().right.take();
        let new_right = self.link(old_right, Some(child));
        if let Some(right) = &new_right {
            right.borrow_mut().parent = Rc::downgrade(parent);
        }
        parent.borrow_mut().right = new_right;

        let mut p = parent.borrow_mut();
        let p = &mut *p;
        let left_npl = p.left.as_ref().map(|l| l.borrow().npl);
        let right_npl = p.right.as_ref().map(|r| r.borrow().npl);
        if let (Some(left_npl), Some(right_npl)) = (left_npl, right_npl) {
            if right_npl > left_npl {
                mem::swap(&mut p.left, &mut p.right);
            }
        }
        p.npl = p.right.as_ref().map_or(0, |r| r.borrow().npl + 1);
    }

    /// Detaches a non-root node, merging its subtrees back into its
    /// parent's vacated slot and repairing the parent's shape one level up.
    fn cut(&mut self, node: &NodeRef<K, V>) {
        let parent = match node.borrow().parent.upgrade() {
            Some(parent) => parent,
            None => return,
        };
        let was_left = parent
            .borrow()
            .left
            .as_ref()
            .map_or(false, |l| Rc::ptr_eq(l, node));

        let (left, right) = {
            let mut n = node.borrow_mut();
            n.parent = Weak::new();
            n.npl = 0;
            (n.left.take(), n.right.take())
        };
        if let Some(left) = &left {
            left.borrow_mut().parent = Weak::new();
        }
        if let Some(right) = &right {
            right.borrow_mut().parent = Weak::new();
        }
        let replacement = self.link(left, right);
        if let Some(replacement) = &replacement {
            replacement.borrow_mut().parent = Rc::downgrade(&parent);
        }

        let mut p = parent.borrow_mut();
        let p = &mut *p;
        if was_left {
            p.left = replacement;
        } else {
            p.right = replacement;
        }
        let left_npl = p.left.as_ref().map(|l| l.borrow().npl);
        let right_npl = p.right.as_ref().map(|r| r.borrow().npl);
        match (left_npl, right_npl) {
            // right child alone: promote it and fall back to npl 0
            (None, Some(_)) => {
                mem::swap(&mut p.left, &mut p.right);
                p.npl = 0;
            }
            (Some(left_npl), Some(right_npl)) if right_npl > left_npl => {
                mem::swap(&mut p.left, &mut p.right);
                p.npl = left_npl + 1;
            }
            _ => p.npl = 0,
        }
    }

    fn is_root(&self, node: &NodeRef<K, V>) -> bool {
        self.root.as_ref().map_or(false, |r| Rc::ptr_eq(r, node))
    }

    fn reset_owner_ref(&mut self) {
        self.identity = HeapIdentity::new();
        self.owner_ref = OwnerRef::new(&self.identity);
    }
}

impl<K, V> LeftistHeap<K, V> {
    // Severs strong links with an explicit stack so dropping a deep heap
    // cannot recurse.
    fn teardown(&mut self) {
        let mut stack: Vec<NodeRef<K, V>> = Vec::new();
        if let Some(root) = self.root.take() {
            stack.push(root);
        }
        while let Some(node) = stack.pop() {
            let mut n = node.borrow_mut();
            n.parent = Weak::new();
            if let Some(left) = n.left.take() {
                stack.push(left);
            }
            if let Some(right) = n.right.take() {
                stack.push(right);
            }
        }
    }
}

impl<K: Ord, V> Default for LeftistHeap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for LeftistHeap<K, V> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<K: Ord, V> Heap<K, V> for LeftistHeap<K, V> {
    type Entry = LeftistEntry<K, V>;
    type Iter = LeftistEntries<K, V>;

    fn new() -> Self {
        LeftistHeap::new()
    }

    fn insert(&mut self, key: K, value: V) -> LeftistEntry<K, V> {
        let node = Rc::new(RefCell::new(Node {
            key,
            value,
            infinite: false,
            owner: Some(Rc::clone(&self.owner_ref)),
            npl: 0,
            left: None,
            right: None,
            parent: Weak::new(),
        }));
        let root = self.root.take();
        self.root = self.link(root, Some(Rc::clone(&node)));
        self.size += 1;
        self.bump();
        LeftistEntry { node }
    }

    fn minimum(&self) -> Result<LeftistEntry<K, V>, HeapError> {
        self.root
            .as_ref()
            .map(|root| LeftistEntry {
                node: Rc::clone(root),
            })
            .ok_or(HeapError::Empty)
    }

    fn extract_minimum(&mut self) -> Result<LeftistEntry<K, V>, HeapError> {
        let min = self.root.take().ok_or(HeapError::Empty)?;
        let (left, right) = {
            let mut m = min.borrow_mut();
            m.owner = None;
            m.npl = 0;
            (m.left.take(), m.right.take())
        };
        if let Some(left) = &left {
            left.borrow_mut().parent = Weak::new();
        }
        if let Some(right) = &right {
            right.borrow_mut().parent = Weak::new();
        }
        self.root = self.link(left, right);
        if let Some(root) = &self.root {
            root.borrow_mut().parent = Weak::new();
        }
        self.size -= 1;
        self.bump();
        Ok(LeftistEntry { node: min })
    }

    fn decrease_key(&mut self, entry: &LeftistEntry<K, V>, key: K) -> Result<(), HeapError> {
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
        }
        {
            let node = entry.node.borrow();
            if compare_keys(&self.comparator, &key, &node.key) == Ordering::Greater {
                return Err(HeapError::KeyNotDecreased);
            }
        }
        let node = Rc::clone(&entry.node);
        if self.is_root(&node) {
            node.borrow_mut().key = key;
        } else {
            self.cut(&node);
            node.borrow_mut().key = key;
            let root = self.root.take();
            self.root = self.link(root, Some(node));
            if let Some(root) = &self.root {
                root.borrow_mut().parent = Weak::new();
            }
        }
        self.bump();
        Ok(())
    }

    fn delete(&mut self, entry: &LeftistEntry<K, V>) -> Result<(), HeapError> {
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
        }
        let node = Rc::clone(&entry.node);
        if self.is_root(&node) {
            self.extract_minimum()?;
            return Ok(());
        }
        self.cut(&node);
        node.borrow_mut().owner = None;
        self.size -= 1;
        self.bump();
        Ok(())
    }

    fn union(&mut self, other: &mut Self) {
        if other.is_empty() {
            return;
        }
        let donated = other.root.take();
        let root = self.root.take();
        self.root = self.link(root, donated);
        if let Some(root) = &self.root {
            root.borrow_mut().parent = Weak::new();
        }
        self.size += other.size;
        self.bump();

        other.owner_ref.retarget(&self.identity);
        other.owner_ref = OwnerRef::new(&other.identity);
        other.size = 0;
        other.bump();
    }

    fn holds_entry(&self, entry: &LeftistEntry<K, V>) -> bool {
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

    fn entries(&self) -> LeftistEntries<K, V> {
        LeftistEntries {
            next: self.root.clone(),
            mods: Rc::clone(&self.mods),
            snapshot: self.mods.get(),
        }
    }
}

/// Preorder walk: left subtree, right subtree, then climb until a right
/// sibling subtree is available.
fn preorder_successor<K, V>(node: &NodeRef<K, V>) -> Link<K, V> {
    {
        let n = node.borrow();
        if let Some(left) = &n.left {
            return Some(Rc::clone(left));
        }
        if let Some(right) = &n.right {
            return Some(Rc::clone(right));
        }
    }
    let mut current = Rc::clone(node);
    loop {
        let parent = current.borrow().parent.upgrade()?;
        let from_left = parent
            .borrow()
            .left
            .as_ref()
            .map_or(false, |l| Rc::ptr_eq(l, &current));
        if from_left {
            if let Some(right) = &parent.borrow().right {
                return Some(Rc::clone(right));
            }
        }
        current = parent;
    }
}

/// Fail-fast iterator over a [`LeftistHeap`].
pub struct LeftistEntries<K, V> {
    next: Link<K, V>,
    mods: Rc<Cell<u64>>,
    snapshot: u64,
}

impl<K, V> Iterator for LeftistEntries<K, V> {
    type Item = Result<LeftistEntry<K, V>, HeapError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if self.mods.get() != self.snapshot {
            return Some(Err(HeapError::ConcurrentModification));
        }
        self.next = preorder_successor(&current);
        Some(Ok(LeftistEntry { node: current }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(heap: &mut LeftistHeap<i32, i32>) -> Vec<i32> {
        let mut keys = Vec::new();
        while let Ok(entry) = heap.extract_minimum() {
            keys.push(*entry.key());
        }
        keys
    }

    /// Checks the leftist shape: npl(left) >= npl(right) everywhere and the
    /// stored npl matches the right spine.
    fn assert_leftist_shape(heap: &LeftistHeap<i32, i32>) {
        fn walk(node: &NodeRef<i32, i32>) {
            let n = node.borrow();
            let left_npl = n.left.as_ref().map(|l| l.borrow().npl);
            let right_npl = n.right.as_ref().map(|r| r.borrow().npl);
            if let Some(right_npl) = right_npl {
                assert!(left_npl.unwrap_or(0) >= right_npl, "leftist rule violated");
            }
            if let Some(left) = &n.left {
                walk(left);
            }
            if let Some(right) = &n.right {
                walk(right);
            }
        }
        if let Some(root) = &heap.root {
            walk(root);
        }
    }

    #[test]
    fn insert_and_extract_sorted() {
        let mut heap = LeftistHeap::new();
        for key in [5, 3, 8, 1, 9, 3] {
            heap.insert(key, key * 10);
            assert_leftist_shape(&heap);
        }
        assert_eq!(heap.size(), 6);
        assert_eq!(drain(&mut heap), vec![1, 3, 3, 5, 8, 9]);
        assert!(heap.is_empty());
    }

    #[test]
    fn minimum_on_empty_heap() {
        let heap: LeftistHeap<i32, i32> = LeftistHeap::new();
        assert_eq!(heap.minimum().unwrap_err(), HeapError::Empty);
    }

    #[test]
    fn decrease_key_moves_entry_to_root() {
        let mut heap = LeftistHeap::new();
        heap.insert(10, 0);
        heap.insert(20, 0);
        let entry = heap.insert(30, 0);
        heap.decrease_key(&entry, 1).unwrap();
        assert_leftist_shape(&heap);
        assert_eq!(*heap.minimum().unwrap().key(), 1);
        assert_eq!(drain(&mut heap), vec![1, 10, 20]);
    }

    #[test]
    fn delete_inner_entry() {
        let mut heap = LeftistHeap::new();
        heap.insert(1, 0);
        let entry = heap.insert(2, 0);
        heap.insert(3, 0);
        heap.delete(&entry).unwrap();
        assert!(!heap.holds_entry(&entry));
        assert_eq!(*entry.key(), 2);
        assert_eq!(drain(&mut heap), vec![1, 3]);
    }

    #[test]
    fn union_transfers_ownership() {
        let mut a = LeftistHeap::new();
        let mut b = LeftistHeap::new();
        a.insert(4, 0);
        let donated = b.insert(2, 0);
        a.union(&mut b);
        assert_eq!(a.size(), 2);
        assert!(b.is_empty());
        assert!(a.holds_entry(&donated));
        assert!(!b.holds_entry(&donated));
        assert_eq!(drain(&mut a), vec![2, 4]);
    }

    #[test]
    fn clear_orphans_handles() {
        let mut heap = LeftistHeap::new();
        let entry = heap.insert(7, 0);
        heap.clear();
        assert!(heap.is_empty());
        assert!(!heap.holds_entry(&entry));
        assert_eq!(*entry.key(), 7);
    }

    #[test]
    fn iterator_fails_fast() {
        let mut heap = LeftistHeap::new();
        for key in 0..4 {
            heap.insert(key, 0);
        }
        let mut iter = heap.entries();
        assert!(iter.next().unwrap().is_ok());
        heap.insert(99, 0);
        assert_eq!(
            iter.next().unwrap().unwrap_err(),
            HeapError::ConcurrentModification
        );
        assert!(iter.next().is_none());
    }

    #[test]
    fn iteration_visits_every_entry_once() {
        let mut heap = LeftistHeap::new();
        for key in 0..32 {
            heap.insert(key, 0);
        }
        let mut seen: Vec<i32> = heap
            .entries()
            .map(|entry| *entry.unwrap().key())
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..32).collect::<Vec<_>>());
    }
}
