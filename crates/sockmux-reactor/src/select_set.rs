//! The identity-keyed set of registered selectables.

use std::{cell::RefCell, fmt, rc::Rc};

use sockmux_core::selectable::Selectable;

/// Shared handle to a registered selectable.
pub type SelectableRef = Rc<RefCell<dyn Selectable>>;

/// Identity of a registered selectable, issued by `SelectSet::insert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectableId(u64);

struct Inner {
    entries: Vec<(SelectableId, SelectableRef)>,
    next_id: u64,
}

/// The readiness set.
///
/// Cloning yields another handle to the same set, so a dispatch callback
/// can remove members mid-turn. Such removal is a pure set mutation taking
/// effect on the next turn: the running turn dispatches from the snapshot
/// it already took.
#[derive(Clone)]
pub struct SelectSet {
    inner: Rc<RefCell<Inner>>,
}

impl fmt::Debug for SelectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectSet").field("len", &self.len()).finish()
    }
}

impl Default for SelectSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectSet {
    /// Creates an empty set.
    pub fn new() -> SelectSet {
        SelectSet {
            inner: Rc::new(RefCell::new(Inner {
                entries: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Inserts a selectable, keyed by pointer identity. Re-inserting a
    /// selectable already in the set returns its existing id and leaves
    /// the set unchanged.
    pub fn insert(&self, selectable: SelectableRef) -> SelectableId {
        let mut inner = self.inner.borrow_mut();
        if let Some((id, _)) = inner
            .entries
            .iter()
            .find(|(_, existing)| Rc::ptr_eq(existing, &selectable))
        {
            return *id;
        }
        let id = SelectableId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, selectable));
        id
    }

    /// Discards a member. A no-op returning false when the id is absent.
    pub fn remove(&self, id: SelectableId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
        inner.entries.len() != before
    }

    /// Whether the id is currently registered.
    pub fn contains(&self, id: SelectableId) -> bool {
        self.inner
            .borrow()
            .entries
            .iter()
            .any(|(entry_id, _)| *entry_id == id)
    }

    /// Number of registered members.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// One consistent copy of the membership for this turn's partition.
    pub fn snapshot(&self) -> Vec<(SelectableId, SelectableRef)> {
        self.inner.borrow().entries.clone()
    }

    /// Keeps only the members the predicate accepts.
    pub fn retain(&self, mut keep: impl FnMut(SelectableId, &SelectableRef) -> bool) {
        self.inner
            .borrow_mut()
            .entries
            .retain(|(id, selectable)| keep(*id, selectable));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sockmux_core::error::Result;

    struct Dummy;

    impl Selectable for Dummy {
        fn descriptor(&self) -> Option<sockmux_core::selectable::Descriptor> {
            None
        }
        fn perform_read(&mut self) -> Result<usize> {
            Ok(0)
        }
        fn needs_write(&mut self) -> bool {
            false
        }
        fn perform_write(&mut self) -> Result<usize> {
            Ok(0)
        }
    }

    fn dummy() -> SelectableRef {
        Rc::new(RefCell::new(Dummy))
    }

    #[test]
    fn test_insert_is_idempotent_on_identity() {
        let set = SelectSet::new();
        let selectable = dummy();
        let first = set.insert(Rc::clone(&selectable));
        let second = set.insert(selectable);
        assert_eq!(first, second);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_distinct_selectables_get_distinct_ids() {
        let set = SelectSet::new();
        let a = set.insert(dummy());
        let b = set.insert(dummy());
        assert_ne!(a, b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_remove_is_unconditional_discard() {
        let set = SelectSet::new();
        let id = set.insert(dummy());
        assert!(set.remove(id));
        assert!(set.is_empty());
        assert!(!set.remove(id));
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_mutation() {
        let set = SelectSet::new();
        let id = set.insert(dummy());
        let snapshot = set.snapshot();
        set.remove(id);
        assert_eq!(snapshot.len(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn test_cloned_handle_mutates_the_same_set() {
        let set = SelectSet::new();
        let handle = set.clone();
        let id = handle.insert(dummy());
        assert!(set.contains(id));
        handle.remove(id);
        assert!(set.is_empty());
    }
}
