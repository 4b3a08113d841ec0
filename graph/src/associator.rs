//! Peer associators.
//!
//! One associator exists per endpoint definition and is shared by every
//! object. `associate(own, other)` makes `own`'s container for that endpoint
//! hold `other`; it is what a container on the peer endpoint calls after it
//! changed itself. Associators write straight into the backing container and
//! never call back into the peer that invoked them, so one user-level edit
//! causes exactly one mirrored edit.
//!
//! Dissociating a value that is not present means the two sides were out of
//! sync before the call. That is an engine defect and panics.

use crate::{AssocError, AssocResult, Extent, ObjectStore, OrderedExtent};
use log::trace;
use std::collections::HashSet;
use std::fmt;
use tether_core::{EndpointId, ObjectId};
use tether_registry::{ContentType, EndpointDef, Registry, RelKind};

/// Container manager for one side of a relationship.
pub trait Associator: fmt::Debug {
    /// The endpoint whose containers this associator writes.
    fn endpoint(&self) -> EndpointId;

    fn peer(&self) -> Option<EndpointId>;

    fn kind(&self) -> RelKind;

    fn content(&self) -> &ContentType;

    fn create_container(&self) -> Extent {
        Extent::empty(self.kind())
    }

    /// Check `obj` before this side links to it.
    fn validate_object(
        &self,
        registry: &Registry,
        store: &ObjectStore,
        obj: ObjectId,
    ) -> AssocResult<()> {
        let class = store.class_of(obj).ok_or(AssocError::UnknownObject(obj))?;
        if self.content().admits(registry, class) {
            Ok(())
        } else {
            Err(AssocError::type_violation(
                registry.qualified_name(self.endpoint()),
                self.content().describe(registry),
                format!("{} of class {}", obj, registry.class_name(class)),
            ))
        }
    }

    /// An object linked to itself through a symmetric endpoint has a single
    /// physical edge; the mirrored edit must be skipped.
    fn is_self_loop(&self, own: ObjectId, other: ObjectId) -> bool {
        own == other && self.peer() == Some(self.endpoint())
    }

    fn associate(
        &self,
        table: &AssociatorTable,
        store: &mut ObjectStore,
        own: ObjectId,
        other: ObjectId,
    );

    fn dissociate(
        &self,
        table: &AssociatorTable,
        store: &mut ObjectStore,
        own: ObjectId,
        other: ObjectId,
    );
}

/// Associator for ONE endpoints.
#[derive(Debug)]
pub struct SingletonAssociator {
    endpoint: EndpointId,
    peer: Option<EndpointId>,
    content: ContentType,
}

impl SingletonAssociator {
    pub fn new(def: &EndpointDef) -> Self {
        Self {
            endpoint: def.id,
            peer: def.peer,
            content: def.content.clone(),
        }
    }

    fn slot<'s>(&self, store: &'s mut ObjectStore, own: ObjectId) -> &'s mut Option<ObjectId> {
        store
            .extent_mut(own, self.endpoint, RelKind::One)
            .as_singleton_mut()
            .unwrap_or_else(|| panic!("{} on {} is not a singleton", self.endpoint, own))
    }
}

impl Associator for SingletonAssociator {
    fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    fn peer(&self) -> Option<EndpointId> {
        self.peer
    }

    fn kind(&self) -> RelKind {
        RelKind::One
    }

    fn content(&self) -> &ContentType {
        &self.content
    }

    fn associate(
        &self,
        table: &AssociatorTable,
        store: &mut ObjectStore,
        own: ObjectId,
        other: ObjectId,
    ) {
        if self.is_self_loop(own, other) {
            return;
        }
        let current = *self.slot(store, own);
        if current == Some(other) {
            return;
        }
        // The previous occupant loses its link to `own` first.
        if let Some(previous) = current {
            if let Some(peer) = table.peer_of(self.endpoint) {
                peer.dissociate(table, store, previous, own);
            }
        }
        *self.slot(store, own) = Some(other);
        trace!(
            "event=associate endpoint={} own={} other={} displaced={:?}",
            self.endpoint,
            own,
            other,
            current
        );
    }

    fn dissociate(
        &self,
        _table: &AssociatorTable,
        store: &mut ObjectStore,
        own: ObjectId,
        other: ObjectId,
    ) {
        if self.is_self_loop(own, other) {
            return;
        }
        let slot = self.slot(store, own);
        assert_eq!(
            *slot,
            Some(other),
            "dissociate {} from {} on {}: not linked",
            other,
            own,
            self.endpoint
        );
        *slot = None;
        trace!(
            "event=dissociate endpoint={} own={} other={}",
            self.endpoint,
            own,
            other
        );
    }
}

/// Associator for MANY endpoints.
#[derive(Debug)]
pub struct SetAssociator {
    endpoint: EndpointId,
    peer: Option<EndpointId>,
    content: ContentType,
}

impl SetAssociator {
    pub fn new(def: &EndpointDef) -> Self {
        Self {
            endpoint: def.id,
            peer: def.peer,
            content: def.content.clone(),
        }
    }

    fn values<'s>(&self, store: &'s mut ObjectStore, own: ObjectId) -> &'s mut HashSet<ObjectId> {
        store
            .extent_mut(own, self.endpoint, RelKind::Many)
            .as_set_mut()
            .unwrap_or_else(|| panic!("{} on {} is not a set", self.endpoint, own))
    }
}

impl Associator for SetAssociator {
    fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    fn peer(&self) -> Option<EndpointId> {
        self.peer
    }

    fn kind(&self) -> RelKind {
        RelKind::Many
    }

    fn content(&self) -> &ContentType {
        &self.content
    }

    fn associate(
        &self,
        _table: &AssociatorTable,
        store: &mut ObjectStore,
        own: ObjectId,
        other: ObjectId,
    ) {
        if self.is_self_loop(own, other) {
            return;
        }
        self.values(store, own).insert(other);
        trace!(
            "event=associate endpoint={} own={} other={}",
            self.endpoint,
            own,
            other
        );
    }

    fn dissociate(
        &self,
        _table: &AssociatorTable,
        store: &mut ObjectStore,
        own: ObjectId,
        other: ObjectId,
    ) {
        if self.is_self_loop(own, other) {
            return;
        }
        assert!(
            self.values(store, own).remove(&other),
            "dissociate {} from {} on {}: not a member",
            other,
            own,
            self.endpoint
        );
        trace!(
            "event=dissociate endpoint={} own={} other={}",
            self.endpoint,
            own,
            other
        );
    }
}

/// Associator for ORDERED endpoints.
///
/// A link created from the peer side is appended, or inserted at the
/// endpoint's configured index.
#[derive(Debug)]
pub struct OrderedAssociator {
    endpoint: EndpointId,
    peer: Option<EndpointId>,
    content: ContentType,
    insert_at: Option<usize>,
}

impl OrderedAssociator {
    pub fn new(def: &EndpointDef) -> Self {
        Self {
            endpoint: def.id,
            peer: def.peer,
            content: def.content.clone(),
            insert_at: def.insert_at,
        }
    }

    fn sequence<'s>(&self, store: &'s mut ObjectStore, own: ObjectId) -> &'s mut OrderedExtent {
        store
            .extent_mut(own, self.endpoint, RelKind::Ordered)
            .as_ordered_mut()
            .unwrap_or_else(|| panic!("{} on {} is not ordered", self.endpoint, own))
    }
}

impl Associator for OrderedAssociator {
    fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    fn peer(&self) -> Option<EndpointId> {
        self.peer
    }

    fn kind(&self) -> RelKind {
        RelKind::Ordered
    }

    fn content(&self) -> &ContentType {
        &self.content
    }

    fn associate(
        &self,
        _table: &AssociatorTable,
        store: &mut ObjectStore,
        own: ObjectId,
        other: ObjectId,
    ) {
        if self.is_self_loop(own, other) {
            return;
        }
        let insert_at = self.insert_at;
        let sequence = self.sequence(store, own);
        match insert_at {
            Some(index) => sequence.insert(index, other),
            None => sequence.push(other),
        }
        trace!(
            "event=associate endpoint={} own={} other={} at={:?}",
            self.endpoint,
            own,
            other,
            insert_at
        );
    }

    fn dissociate(
        &self,
        _table: &AssociatorTable,
        store: &mut ObjectStore,
        own: ObjectId,
        other: ObjectId,
    ) {
        if self.is_self_loop(own, other) {
            return;
        }
        let removed = self.sequence(store, own).remove(other);
        assert!(
            removed.is_some(),
            "dissociate {} from {} on {}: not a member",
            other,
            own,
            self.endpoint
        );
        trace!(
            "event=dissociate endpoint={} own={} other={}",
            self.endpoint,
            own,
            other
        );
    }
}

/// Associators for every endpoint of a registry, indexed by endpoint.
#[derive(Debug)]
pub struct AssociatorTable {
    associators: Vec<Box<dyn Associator>>,
}

impl AssociatorTable {
    pub fn from_registry(registry: &Registry) -> Self {
        let associators = registry
            .all_endpoints()
            .map(|def| -> Box<dyn Associator> {
                match def.kind {
                    RelKind::One => Box::new(SingletonAssociator::new(def)),
                    RelKind::Many => Box::new(SetAssociator::new(def)),
                    RelKind::Ordered => Box::new(OrderedAssociator::new(def)),
                }
            })
            .collect();
        Self { associators }
    }

    pub fn get(&self, endpoint: EndpointId) -> Option<&dyn Associator> {
        self.associators.get(endpoint.index()).map(|a| &**a)
    }

    /// Associator of a registered endpoint.
    pub(crate) fn associator(&self, endpoint: EndpointId) -> &dyn Associator {
        self.get(endpoint)
            .unwrap_or_else(|| panic!("no associator for {}", endpoint))
    }

    /// Associator of the peer of `endpoint`; `None` for one-way endpoints.
    pub fn peer_of(&self, endpoint: EndpointId) -> Option<&dyn Associator> {
        self.get(endpoint)?.peer().and_then(|peer| self.get(peer))
    }

    pub fn len(&self) -> usize {
        self.associators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.associators.is_empty()
    }
}
