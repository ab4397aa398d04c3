//! Shared entry-ownership bookkeeping
//!
//! Every heap owns an identity anchor and hands one shared [`OwnerRef`] to
//! all entries it creates. Membership checks, bulk orphaning (`clear`) and
//! bulk adoption (`union`) all reduce to O(1) pointer operations on these
//! two cells:
//!
//! - `clear` replaces the heap's identity anchor, so every previously issued
//!   reference dangles at once — including references that were retargeted
//!   to this heap by an earlier `union`.
//! - `union` retargets the donor's current reference at the recipient's
//!   identity and gives the donor a fresh reference for future inserts.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Identity anchor, allocated once per heap generation.
///
/// The heap holds the only strong `Rc`; dropping or replacing it invalidates
/// every `Weak` held by outstanding ownership references.
#[derive(Debug)]
pub(crate) struct HeapIdentity(());

impl HeapIdentity {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(HeapIdentity(()))
    }
}

/// Shared ownership record handed to every entry a heap creates.
///
/// Entries created between two `clear`/`union` boundaries all share one
/// record, which is what makes the bulk operations O(1).
#[derive(Debug)]
pub(crate) struct OwnerRef {
    owner: RefCell<Weak<HeapIdentity>>,
}

impl OwnerRef {
    pub(crate) fn new(identity: &Rc<HeapIdentity>) -> Rc<Self> {
        Rc::new(OwnerRef {
            owner: RefCell::new(Rc::downgrade(identity)),
        })
    }

    /// True if this record currently points at `identity`.
    pub(crate) fn is_owned_by(&self, identity: &Rc<HeapIdentity>) -> bool {
        self.owner
            .borrow()
            .upgrade()
            .map_or(false, |owner| Rc::ptr_eq(&owner, identity))
    }

    /// Re-points every entry sharing this record at a new owner. O(1).
    pub(crate) fn retarget(&self, identity: &Rc<HeapIdentity>) {
        *self.owner.borrow_mut() = Rc::downgrade(identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_follows_identity() {
        let a = HeapIdentity::new();
        let b = HeapIdentity::new();
        let owner = OwnerRef::new(&a);
        assert!(owner.is_owned_by(&a));
        assert!(!owner.is_owned_by(&b));
        owner.retarget(&b);
        assert!(!owner.is_owned_by(&a));
        assert!(owner.is_owned_by(&b));
    }

    #[test]
    fn dropped_identity_orphans_all_references() {
        let identity = HeapIdentity::new();
        let owner = OwnerRef::new(&identity);
        drop(identity);
        let replacement = HeapIdentity::new();
        assert!(!owner.is_owned_by(&replacement));
    }
}
