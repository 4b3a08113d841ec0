//! Object storage.

use crate::Extent;
use std::collections::HashMap;
use tether_core::{ClassId, EndpointId, ObjectId};
use tether_registry::RelKind;

/// ID allocator for objects.
#[derive(Debug)]
struct IdAllocator {
    next_object_id: u64,
}

impl IdAllocator {
    fn new() -> Self {
        Self { next_object_id: 1 }
    }

    fn alloc_object_id(&mut self) -> ObjectId {
        let id = ObjectId::new(self.next_object_id);
        self.next_object_id += 1;
        id
    }
}

/// A stored object: its class and the containers created for it so far.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub id: ObjectId,
    pub class: ClassId,
    slots: HashMap<EndpointId, Extent>,
}

impl ObjectRecord {
    pub fn slot(&self, endpoint: EndpointId) -> Option<&Extent> {
        self.slots.get(&endpoint)
    }

    pub fn slots(&self) -> impl Iterator<Item = (EndpointId, &Extent)> {
        self.slots.iter().map(|(ep, extent)| (*ep, extent))
    }

    pub(crate) fn slots_mut(&mut self) -> impl Iterator<Item = (EndpointId, &mut Extent)> {
        self.slots.iter_mut().map(|(ep, extent)| (*ep, extent))
    }
}

/// In-memory object storage. Containers are created lazily on first write.
#[derive(Debug)]
pub struct ObjectStore {
    objects: HashMap<ObjectId, ObjectRecord>,
    id_alloc: IdAllocator,
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            objects: HashMap::with_capacity(capacity),
            id_alloc: IdAllocator::new(),
        }
    }

    /// Store a new object of `class`.
    pub fn insert(&mut self, class: ClassId) -> ObjectId {
        let id = self.id_alloc.alloc_object_id();
        self.objects.insert(
            id,
            ObjectRecord {
                id,
                class,
                slots: HashMap::new(),
            },
        );
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<ObjectRecord> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&ObjectRecord> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn class_of(&self, id: ObjectId) -> Option<ClassId> {
        self.objects.get(&id).map(|r| r.class)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObjectRecord> {
        self.objects.values()
    }

    /// All object IDs in creation order.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Container of `endpoint` on `id`, if one was ever created.
    pub fn extent(&self, id: ObjectId, endpoint: EndpointId) -> Option<&Extent> {
        self.objects.get(&id)?.slots.get(&endpoint)
    }

    /// Container of `endpoint` on `id`, created empty on first use.
    ///
    /// Panics if the object is not stored; callers validate objects first.
    pub(crate) fn extent_mut(
        &mut self,
        id: ObjectId,
        endpoint: EndpointId,
        kind: RelKind,
    ) -> &mut Extent {
        self.objects
            .get_mut(&id)
            .unwrap_or_else(|| panic!("object {} is not stored", id))
            .slots
            .entry(endpoint)
            .or_insert_with(|| Extent::empty(kind))
    }

    pub(crate) fn records_mut(&mut self) -> impl Iterator<Item = &mut ObjectRecord> {
        self.objects.values_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_allocated_in_order() {
        let mut store = ObjectStore::new();
        let a = store.insert(ClassId::new(0));
        let b = store.insert(ClassId::new(1));

        assert_eq!(a, ObjectId::new(1));
        assert_eq!(b, ObjectId::new(2));
        assert_eq!(store.class_of(b), Some(ClassId::new(1)));
        assert_eq!(store.object_ids(), vec![a, b]);
    }

    #[test]
    fn test_extents_are_created_lazily() {
        let mut store = ObjectStore::new();
        let a = store.insert(ClassId::new(0));
        let ep = EndpointId::new(3);
        assert!(store.extent(a, ep).is_none());

        store.extent_mut(a, ep, RelKind::Ordered);

        assert_eq!(store.extent(a, ep).map(Extent::kind), Some(RelKind::Ordered));
    }

    #[test]
    fn test_removed_ids_are_not_reused() {
        let mut store = ObjectStore::new();
        let a = store.insert(ClassId::new(0));
        store.remove(a);
        let b = store.insert(ClassId::new(0));
        assert_ne!(a, b);
        assert!(!store.contains(a));
    }
}
