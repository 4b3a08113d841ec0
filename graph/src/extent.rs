//! Association containers.
//!
//! An extent is the live extension of one endpoint on one object. These are
//! plain data operations; mirroring onto the peer side is the associators'
//! job.

use std::collections::HashSet;
use std::ops::Range;
use tether_core::ObjectId;
use tether_registry::RelKind;

/// Ordered container: a sequence with set uniqueness on top.
///
/// `seq` and `values` always hold the same elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderedExtent {
    seq: Vec<ObjectId>,
    values: HashSet<ObjectId>,
}

impl OrderedExtent {
    pub fn as_slice(&self) -> &[ObjectId] {
        &self.seq
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.values.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn position(&self, id: ObjectId) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        self.seq.iter().position(|x| *x == id)
    }

    /// True when the sequence and the membership set agree.
    pub fn is_consistent(&self) -> bool {
        self.seq.len() == self.values.len() && self.seq.iter().all(|x| self.values.contains(x))
    }

    /// Insert `id` at `index`, clamped to the length.
    pub(crate) fn insert(&mut self, index: usize, id: ObjectId) {
        assert!(
            self.values.insert(id),
            "ordered extent already holds {}",
            id
        );
        let index = index.min(self.seq.len());
        self.seq.insert(index, id);
    }

    pub(crate) fn push(&mut self, id: ObjectId) {
        let len = self.seq.len();
        self.insert(len, id);
    }

    pub(crate) fn remove(&mut self, id: ObjectId) -> Option<usize> {
        if !self.values.remove(&id) {
            return None;
        }
        let index = self.seq.iter().position(|x| *x == id)?;
        self.seq.remove(index);
        Some(index)
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> ObjectId {
        let id = self.seq.remove(index);
        self.values.remove(&id);
        id
    }

    /// Replace the element at `index`, returning the old one.
    pub(crate) fn replace(&mut self, index: usize, id: ObjectId) -> ObjectId {
        let old = std::mem::replace(&mut self.seq[index], id);
        self.values.remove(&old);
        self.values.insert(id);
        old
    }

    /// Replace `range` with `items`, returning what was there.
    ///
    /// The caller has checked that the result is free of duplicates.
    pub(crate) fn splice(&mut self, range: Range<usize>, items: Vec<ObjectId>) -> Vec<ObjectId> {
        let removed: Vec<ObjectId> = self.seq.splice(range, items).collect();
        self.values = self.seq.iter().copied().collect();
        removed
    }

    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        self.seq.swap(a, b);
    }

    pub(crate) fn reverse(&mut self) {
        self.seq.reverse();
    }

    pub(crate) fn sort_by_key<K: Ord>(&mut self, f: impl FnMut(&ObjectId) -> K) {
        self.seq.sort_by_key(f);
    }
}

/// The extension of one endpoint on one object.
#[derive(Debug, Clone, PartialEq)]
pub enum Extent {
    Singleton(Option<ObjectId>),
    Set(HashSet<ObjectId>),
    Ordered(OrderedExtent),
}

impl Extent {
    /// Empty container for an endpoint of `kind`.
    pub fn empty(kind: RelKind) -> Self {
        match kind {
            RelKind::One => Extent::Singleton(None),
            RelKind::Many => Extent::Set(HashSet::new()),
            RelKind::Ordered => Extent::Ordered(OrderedExtent::default()),
        }
    }

    pub fn kind(&self) -> RelKind {
        match self {
            Extent::Singleton(_) => RelKind::One,
            Extent::Set(_) => RelKind::Many,
            Extent::Ordered(_) => RelKind::Ordered,
        }
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        match self {
            Extent::Singleton(value) => *value == Some(id),
            Extent::Set(values) => values.contains(&id),
            Extent::Ordered(ordered) => ordered.contains(id),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Extent::Singleton(value) => usize::from(value.is_some()),
            Extent::Set(values) => values.len(),
            Extent::Ordered(ordered) => ordered.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Members in container order; sets come out sorted by ID.
    pub fn ids(&self) -> Vec<ObjectId> {
        match self {
            Extent::Singleton(value) => value.iter().copied().collect(),
            Extent::Set(values) => {
                let mut ids: Vec<ObjectId> = values.iter().copied().collect();
                ids.sort();
                ids
            }
            Extent::Ordered(ordered) => ordered.as_slice().to_vec(),
        }
    }

    pub fn as_singleton(&self) -> Option<Option<ObjectId>> {
        match self {
            Extent::Singleton(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_ordered(&self) -> Option<&OrderedExtent> {
        match self {
            Extent::Ordered(ordered) => Some(ordered),
            _ => None,
        }
    }

    pub(crate) fn as_singleton_mut(&mut self) -> Option<&mut Option<ObjectId>> {
        match self {
            Extent::Singleton(value) => Some(value),
            _ => None,
        }
    }

    pub(crate) fn as_set_mut(&mut self) -> Option<&mut HashSet<ObjectId>> {
        match self {
            Extent::Set(values) => Some(values),
            _ => None,
        }
    }

    pub(crate) fn as_ordered_mut(&mut self) -> Option<&mut OrderedExtent> {
        match self {
            Extent::Ordered(ordered) => Some(ordered),
            _ => None,
        }
    }

    /// Drop `id` without touching any peer. Returns whether it was present.
    pub(crate) fn remove_link(&mut self, id: ObjectId) -> bool {
        match self {
            Extent::Singleton(value) if *value == Some(id) => {
                *value = None;
                true
            }
            Extent::Singleton(_) => false,
            Extent::Set(values) => values.remove(&id),
            Extent::Ordered(ordered) => ordered.remove(id).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn o(n: u64) -> ObjectId {
        ObjectId::new(n)
    }

    #[test]
    fn test_empty_matches_kind() {
        assert_eq!(Extent::empty(RelKind::One).kind(), RelKind::One);
        assert_eq!(Extent::empty(RelKind::Many).kind(), RelKind::Many);
        assert_eq!(Extent::empty(RelKind::Ordered).kind(), RelKind::Ordered);
        assert!(Extent::empty(RelKind::Many).is_empty());
    }

    #[test]
    fn test_ordered_insert_clamps() {
        let mut ordered = OrderedExtent::default();
        ordered.push(o(1));
        ordered.insert(10, o(2));
        ordered.insert(0, o(3));

        assert_eq!(ordered.as_slice(), &[o(3), o(1), o(2)]);
        assert!(ordered.is_consistent());
    }

    #[test]
    #[should_panic(expected = "already holds")]
    fn test_ordered_insert_duplicate_panics() {
        let mut ordered = OrderedExtent::default();
        ordered.push(o(1));
        ordered.push(o(1));
    }

    #[test]
    fn test_ordered_splice_keeps_set_in_sync() {
        let mut ordered = OrderedExtent::default();
        for n in 1..=4 {
            ordered.push(o(n));
        }

        let removed = ordered.splice(1..3, vec![o(9), o(2)]);

        assert_eq!(removed, vec![o(2), o(3)]);
        assert_eq!(ordered.as_slice(), &[o(1), o(9), o(2), o(4)]);
        assert!(ordered.contains(o(9)));
        assert!(!ordered.contains(o(3)));
        assert!(ordered.is_consistent());
    }

    #[test]
    fn test_remove_link_per_kind() {
        let mut single = Extent::Singleton(Some(o(1)));
        assert!(!single.remove_link(o(2)));
        assert!(single.remove_link(o(1)));
        assert_eq!(single.as_singleton(), Some(None));

        let mut set = Extent::empty(RelKind::Many);
        set.as_set_mut().unwrap().insert(o(5));
        assert!(set.remove_link(o(5)));
        assert!(!set.remove_link(o(5)));
    }

    #[test]
    fn test_set_ids_are_sorted() {
        let mut set = Extent::empty(RelKind::Many);
        for n in [7, 3, 5] {
            set.as_set_mut().unwrap().insert(o(n));
        }
        assert_eq!(set.ids(), vec![o(3), o(5), o(7)]);
    }
}
