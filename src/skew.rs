//! Skew heap
//!
//! The self-adjusting cousin of the leftist heap: `link` walks the right
//! spines of both trees and swaps children unconditionally at every step,
//! with no balance bookkeeping at all. Everything else is expressed through
//! `link`, giving O(log n) amortized merge-family operations.

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
    left: Link<K, V>,
    right: Link<K, V>,
    parent: Weak<RefCell<Node<K, V>>>,
}

type NodeRef<K, V> = Rc<RefCell<Node<K, V>>>;
type Link<K, V> = Option<NodeRef<K, V>>;

/// Handle to an entry in a [`SkewHeap`].
#[derive(Debug)]
pub struct SkewEntry<K, V> {
    node: NodeRef<K, V>,
}

impl<K, V> Clone for SkewEntry<K, V> {
    fn clone(&self) -> Self {
        SkewEntry {
            node: Rc::clone(&self.node),
        }
    }
}

impl<K, V> PartialEq for SkewEntry<K, V> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl<K, V> Eq for SkewEntry<K, V> {}

impl<K, V> HeapEntry<K, V> for SkewEntry<K, V> {
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

/// A skew heap: O(log n) amortized insert, extract, union, decrease-key.
pub struct SkewHeap<K, V> {
    root: Link<K, V>,
    size: usize,
    mods: Rc<Cell<u64>>,
    comparator: Option<KeyComparator<K>>,
    identity: Rc<HeapIdentity>,
    owner_ref: Rc<OwnerRef>,
}

impl<K: Ord, V> SkewHeap<K, V> {
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
        SkewHeap {
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

    /// Merges two subtrees. The winner's children are swapped: its old left
    /// subtree moves to the right slot, and the old right subtree merged
    /// with the loser becomes the new left subtree.
    fn link(&self, first: Link<K, V>, second: Link<K, V>) -> Link<K, V> {
        let (a, b) = match (first, second) {
            (None, second) => return second,
            (first, None) => return first,
            (Some(a), Some(b)) => (a, b),
        };
        let (winner, loser) = if self.node_cmp(&a, &b) == Ordering::Less {
            (a, b)
        } else {
            (b, a)
        };
        let old_right = {
            let mut w = winner.borrow_mut();
            let old_right = w.right.take();
            w.right = w.left.take();
            old_right
        };
        let new_left = self.link(old_right, Some(loser));
        if let Some(left) = &new_left {
            left.borrow_mut().parent = Rc::downgrade(&winner);
        }
        winner.borrow_mut().left = new_left;
        Some(winner)
    }

    /// Detaches a non-root node, merging its subtrees into the slot it
    /// vacated.
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
        if was_left {
            p.left = replacement;
        } else {
            p.right = replacement;
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

impl<K, V> SkewHeap<K, V> {
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

impl<K: Ord, V> Default for SkewHeap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Drop for SkewHeap<K, V> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<K: Ord, V> Heap<K, V> for SkewHeap<K, V> {
    type Entry = SkewEntry<K, V>;
    type Iter = SkewEntries<K, V>;

    fn new() -> Self {
        SkewHeap::new()
    }

    fn insert(&mut self, key: K, value: V) -> SkewEntry<K, V> {
        let node = Rc::new(RefCell::new(Node {
            key,
            value,
            infinite: false,
            owner: Some(Rc::clone(&self.owner_ref)),
            left: None,
            right: None,
            parent: Weak::new(),
        }));
        let root = self.root.take();
        self.root = self.link(root, Some(Rc::clone(&node)));
        self.size += 1;
        self.bump();
        SkewEntry { node }
    }

    fn minimum(&self) -> Result<SkewEntry<K, V>, HeapError> {
        self.root
            .as_ref()
            .map(|root| SkewEntry {
                node: Rc::clone(root),
            })
            .ok_or(HeapError::Empty)
    }

    fn extract_minimum(&mut self) -> Result<SkewEntry<K, V>, HeapError> {
        let min = self.root.take().ok_or(HeapError::Empty)?;
        let (left, right) = {
            let mut m = min.borrow_mut();
            m.owner = None;
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
        Ok(SkewEntry { node: min })
    }

    fn decrease_key(&mut self, entry: &SkewEntry<K, V>, key: K) -> Result<(), HeapError> {
        {
            let node = entry.node.borrow();
            if compare_keys(&self.comparator, &key, &node.key) == Ordering::Greater {
                return Err(HeapError::KeyNotDecreased);
            }
        }
        if !self.holds_entry(entry) {
            return Err(HeapError::NotHeld);
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

    fn delete(&mut self, entry: &SkewEntry<K, V>) -> Result<(), HeapError> {
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

    fn holds_entry(&self, entry: &SkewEntry<K, V>) -> bool {
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

    fn entries(&self) -> SkewEntries<K, V> {
        SkewEntries {
            next: self.root.clone(),
            mods: Rc::clone(&self.mods),
            snapshot: self.mods.get(),
        }
    }
}

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

/// Fail-fast iterator over a [`SkewHeap`].
pub struct SkewEntries<K, V> {
    next: Link<K, V>,
    mods: Rc<Cell<u64>>,
    snapshot: u64,
}

impl<K, V> Iterator for SkewEntries<K, V> {
    type Item = Result<SkewEntry<K, V>, HeapError>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;
        if self.mods.get() != self.snapshot {
            return Some(Err(HeapError::ConcurrentModification));
        }
        self.next = preorder_successor(&current);
        Some(Ok(SkewEntry { node: current }))
    }
}
