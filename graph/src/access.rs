//! Typed accessors for one endpoint of one object.
//!
//! Every mutating call validates its whole input before touching any
//! container, then updates the owner's container and mirrors each link that
//! changed onto the peer endpoint. A call that returns an error leaves the
//! graph unchanged.

use crate::{AssocError, AssocResult, ObjectGraph, OrderedExtent};
use log::trace;
use std::collections::HashSet;
use std::ops::Range;
use tether_core::{EndpointId, ObjectId};
use tether_registry::RelKind;

/// Accessor for a ONE endpoint.
#[derive(Debug)]
pub struct OneRef<'g> {
    graph: &'g mut ObjectGraph,
    owner: ObjectId,
    endpoint: EndpointId,
}

impl<'g> OneRef<'g> {
    pub(crate) fn new(graph: &'g mut ObjectGraph, owner: ObjectId, endpoint: EndpointId) -> Self {
        Self {
            graph,
            owner,
            endpoint,
        }
    }

    pub fn get(&self) -> Option<ObjectId> {
        self.graph
            .store
            .extent(self.owner, self.endpoint)
            .and_then(|e| e.as_singleton())
            .flatten()
    }

    /// Point the endpoint at `value`, or unset it with `None`.
    ///
    /// The previous target loses its back-link; the new target drops
    /// whatever it was linked to through the peer.
    pub fn set(&mut self, value: Option<ObjectId>) -> AssocResult<()> {
        self.graph.check_writable(self.endpoint)?;
        if value.is_none() && !self.graph.endpoint_def(self.endpoint).nullable {
            return Err(AssocError::null_violation(
                self.graph.qualified_name(self.endpoint),
            ));
        }
        let current = self.get();
        if current == value {
            return Ok(());
        }
        if let Some(new) = value {
            self.graph.validate(self.endpoint, new)?;
        }

        if let Some(old) = current {
            self.graph.mirror_dissociate(self.endpoint, self.owner, old);
        }
        *slot(self.graph, self.owner, self.endpoint) = value;
        if let Some(new) = value {
            self.graph.mirror_associate(self.endpoint, self.owner, new);
        }
        trace!(
            "event=one_set owner={} endpoint={} old={:?} new={:?}",
            self.owner,
            self.endpoint,
            current,
            value
        );
        self.graph.after_mutation();
        Ok(())
    }

    pub fn clear(&mut self) -> AssocResult<()> {
        self.set(None)
    }
}

fn slot(graph: &mut ObjectGraph, owner: ObjectId, endpoint: EndpointId) -> &mut Option<ObjectId> {
    graph
        .store
        .extent_mut(owner, endpoint, RelKind::One)
        .as_singleton_mut()
        .unwrap_or_else(|| panic!("{} on {} is not a singleton", endpoint, owner))
}

/// Accessor for a MANY endpoint.
#[derive(Debug)]
pub struct ManyRefs<'g> {
    graph: &'g mut ObjectGraph,
    owner: ObjectId,
    endpoint: EndpointId,
}

impl<'g> ManyRefs<'g> {
    pub(crate) fn new(graph: &'g mut ObjectGraph, owner: ObjectId, endpoint: EndpointId) -> Self {
        Self {
            graph,
            owner,
            endpoint,
        }
    }

    pub fn contains(&self, obj: ObjectId) -> bool {
        self.graph.is_linked(self.owner, self.endpoint, obj)
    }

    pub fn len(&self) -> usize {
        self.graph
            .store
            .extent(self.owner, self.endpoint)
            .map_or(0, |e| e.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Members sorted by ID.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.graph.linked(self.owner, self.endpoint)
    }

    /// Add `obj`. Returns `false` if it was already a member.
    pub fn add(&mut self, obj: ObjectId) -> AssocResult<bool> {
        self.graph.check_writable(self.endpoint)?;
        self.graph.validate(self.endpoint, obj)?;
        if self.contains(obj) {
            return Ok(false);
        }
        self.link(obj);
        self.graph.after_mutation();
        Ok(true)
    }

    /// Add `obj`, failing with `Duplicate` if it is already a member.
    pub fn insert(&mut self, obj: ObjectId) -> AssocResult<()> {
        if self.contains(obj) {
            self.graph.check_writable(self.endpoint)?;
            return Err(AssocError::duplicate(
                self.graph.qualified_name(self.endpoint),
                obj,
            ));
        }
        self.add(obj).map(|_| ())
    }

    /// Remove `obj` if present. Returns whether it was a member.
    pub fn discard(&mut self, obj: ObjectId) -> AssocResult<bool> {
        self.graph.check_writable(self.endpoint)?;
        if !self.contains(obj) {
            return Ok(false);
        }
        self.unlink(obj);
        self.graph.after_mutation();
        Ok(true)
    }

    /// Remove `obj`, failing with `NotMember` if it is absent.
    pub fn remove(&mut self, obj: ObjectId) -> AssocResult<()> {
        if self.discard(obj)? {
            Ok(())
        } else {
            Err(AssocError::not_member(
                self.graph.qualified_name(self.endpoint),
                obj,
            ))
        }
    }

    pub fn clear(&mut self) -> AssocResult<()> {
        self.assign(Vec::new())
    }

    /// Replace the whole extension with `items`.
    ///
    /// Repeated items count once. Only the difference between the old and
    /// the new extension is mirrored.
    pub fn assign(&mut self, items: impl IntoIterator<Item = ObjectId>) -> AssocResult<()> {
        self.graph.check_writable(self.endpoint)?;
        let mut seen = HashSet::new();
        let items: Vec<ObjectId> = items.into_iter().filter(|id| seen.insert(*id)).collect();
        for &item in &items {
            self.graph.validate(self.endpoint, item)?;
        }

        let current = self.ids();
        let kept: HashSet<ObjectId> = items.iter().copied().collect();
        let removed: Vec<ObjectId> = current
            .iter()
            .copied()
            .filter(|id| !kept.contains(id))
            .collect();
        let added: Vec<ObjectId> = items
            .iter()
            .copied()
            .filter(|id| !self.contains(*id))
            .collect();
        for &obj in &removed {
            self.unlink(obj);
        }
        for &obj in &added {
            self.link(obj);
        }
        trace!(
            "event=many_assign owner={} endpoint={} removed={} added={}",
            self.owner,
            self.endpoint,
            removed.len(),
            added.len()
        );
        self.graph.after_mutation();
        Ok(())
    }

    fn values(&mut self) -> &mut HashSet<ObjectId> {
        let (owner, endpoint) = (self.owner, self.endpoint);
        self.graph
            .store
            .extent_mut(owner, endpoint, RelKind::Many)
            .as_set_mut()
            .unwrap_or_else(|| panic!("{} on {} is not a set", endpoint, owner))
    }

    fn link(&mut self, obj: ObjectId) {
        self.values().insert(obj);
        self.graph.mirror_associate(self.endpoint, self.owner, obj);
    }

    fn unlink(&mut self, obj: ObjectId) {
        self.values().remove(&obj);
        self.graph.mirror_dissociate(self.endpoint, self.owner, obj);
    }
}

/// Accessor for an ORDERED endpoint.
#[derive(Debug)]
pub struct OrderedRefs<'g> {
    graph: &'g mut ObjectGraph,
    owner: ObjectId,
    endpoint: EndpointId,
}

impl<'g> OrderedRefs<'g> {
    pub(crate) fn new(graph: &'g mut ObjectGraph, owner: ObjectId, endpoint: EndpointId) -> Self {
        Self {
            graph,
            owner,
            endpoint,
        }
    }

    fn current(&self) -> Option<&OrderedExtent> {
        self.graph
            .store
            .extent(self.owner, self.endpoint)
            .and_then(|e| e.as_ordered())
    }

    fn sequence(&mut self) -> &mut OrderedExtent {
        let (owner, endpoint) = (self.owner, self.endpoint);
        self.graph
            .store
            .extent_mut(owner, endpoint, RelKind::Ordered)
            .as_ordered_mut()
            .unwrap_or_else(|| panic!("{} on {} is not ordered", endpoint, owner))
    }

    fn name(&self) -> String {
        self.graph.qualified_name(self.endpoint)
    }

    pub fn get(&self, index: usize) -> Option<ObjectId> {
        self.current()?.as_slice().get(index).copied()
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.current()
            .map(|o| o.as_slice().to_vec())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.current().map_or(0, |o| o.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, obj: ObjectId) -> bool {
        self.current().is_some_and(|o| o.contains(obj))
    }

    pub fn index_of(&self, obj: ObjectId) -> Option<usize> {
        self.current()?.position(obj)
    }

    /// Replace the element at `index` with `obj`.
    pub fn set(&mut self, index: usize, obj: ObjectId) -> AssocResult<()> {
        self.graph.check_writable(self.endpoint)?;
        let len = self.len();
        let Some(old) = self.get(index) else {
            return Err(AssocError::index_out_of_range(self.name(), index, len));
        };
        if old == obj {
            return Ok(());
        }
        if self.contains(obj) {
            return Err(AssocError::duplicate(self.name(), obj));
        }
        self.graph.validate(self.endpoint, obj)?;

        self.sequence().replace(index, obj);
        self.graph.mirror_dissociate(self.endpoint, self.owner, old);
        self.graph.mirror_associate(self.endpoint, self.owner, obj);
        self.graph.after_mutation();
        Ok(())
    }

    /// Insert `obj` before `index`; an index past the end appends.
    pub fn insert(&mut self, index: usize, obj: ObjectId) -> AssocResult<()> {
        self.graph.check_writable(self.endpoint)?;
        if self.contains(obj) {
            return Err(AssocError::duplicate(self.name(), obj));
        }
        self.graph.validate(self.endpoint, obj)?;

        self.sequence().insert(index, obj);
        self.graph.mirror_associate(self.endpoint, self.owner, obj);
        self.graph.after_mutation();
        Ok(())
    }

    pub fn append(&mut self, obj: ObjectId) -> AssocResult<()> {
        let len = self.len();
        self.insert(len, obj)
    }

    pub fn prepend(&mut self, obj: ObjectId) -> AssocResult<()> {
        self.insert(0, obj)
    }

    pub fn remove_at(&mut self, index: usize) -> AssocResult<ObjectId> {
        self.graph.check_writable(self.endpoint)?;
        let len = self.len();
        if index >= len {
            return Err(AssocError::index_out_of_range(self.name(), index, len));
        }
        let obj = self.sequence().remove_at(index);
        self.graph.mirror_dissociate(self.endpoint, self.owner, obj);
        self.graph.after_mutation();
        Ok(obj)
    }

    /// Remove `obj`, returning the index it held.
    pub fn remove(&mut self, obj: ObjectId) -> AssocResult<usize> {
        match self.index_of(obj) {
            Some(index) => self.remove_at(index).map(|_| index),
            None => {
                self.graph.check_writable(self.endpoint)?;
                Err(AssocError::not_member(self.name(), obj))
            }
        }
    }

    pub fn remove_range(&mut self, range: Range<usize>) -> AssocResult<Vec<ObjectId>> {
        self.splice(range, Vec::new())
    }

    /// Replace the elements in `range` with `items`, returning the elements
    /// that were there.
    ///
    /// Rejected as a whole with `Duplicate` if `items` repeats an object or
    /// names one that stays outside `range`.
    pub fn splice(
        &mut self,
        range: Range<usize>,
        items: Vec<ObjectId>,
    ) -> AssocResult<Vec<ObjectId>> {
        self.graph.check_writable(self.endpoint)?;
        let len = self.len();
        if range.start > range.end || range.end > len {
            return Err(AssocError::index_out_of_range(
                self.name(),
                range.end.max(range.start),
                len,
            ));
        }

        let current = self.ids();
        let displaced: HashSet<ObjectId> = current[range.clone()].iter().copied().collect();
        let mut incoming = HashSet::with_capacity(items.len());
        for &item in &items {
            if !incoming.insert(item) {
                return Err(AssocError::duplicate(self.name(), item));
            }
            if self.contains(item) && !displaced.contains(&item) {
                return Err(AssocError::duplicate(self.name(), item));
            }
        }
        for &item in &items {
            self.graph.validate(self.endpoint, item)?;
        }

        let removed = self.sequence().splice(range, items.clone());
        for &obj in removed.iter().filter(|id| !incoming.contains(*id)) {
            self.graph.mirror_dissociate(self.endpoint, self.owner, obj);
        }
        for &obj in items.iter().filter(|id| !displaced.contains(*id)) {
            self.graph.mirror_associate(self.endpoint, self.owner, obj);
        }
        trace!(
            "event=ordered_splice owner={} endpoint={} removed={} inserted={}",
            self.owner,
            self.endpoint,
            removed.len(),
            items.len()
        );
        self.graph.after_mutation();
        Ok(removed)
    }

    /// Append all of `items`, or none of them.
    pub fn extend(&mut self, items: impl IntoIterator<Item = ObjectId>) -> AssocResult<()> {
        let len = self.len();
        self.splice(len..len, items.into_iter().collect()).map(|_| ())
    }

    /// Replace the whole sequence, keeping the order of `items`.
    pub fn assign(&mut self, items: impl IntoIterator<Item = ObjectId>) -> AssocResult<()> {
        let len = self.len();
        self.splice(0..len, items.into_iter().collect()).map(|_| ())
    }

    pub fn clear(&mut self) -> AssocResult<()> {
        self.assign(Vec::new())
    }

    // Reordering keeps membership, so peers are left alone.

    pub fn swap(&mut self, a: usize, b: usize) -> AssocResult<()> {
        self.graph.check_writable(self.endpoint)?;
        let len = self.len();
        if let Some(bad) = [a, b].into_iter().find(|i| *i >= len) {
            return Err(AssocError::index_out_of_range(self.name(), bad, len));
        }
        self.sequence().swap(a, b);
        Ok(())
    }

    pub fn reverse(&mut self) -> AssocResult<()> {
        self.graph.check_writable(self.endpoint)?;
        self.sequence().reverse();
        Ok(())
    }

    pub fn sort_by_key<K: Ord>(&mut self, f: impl FnMut(&ObjectId) -> K) -> AssocResult<()> {
        self.graph.check_writable(self.endpoint)?;
        self.sequence().sort_by_key(f);
        Ok(())
    }
}
