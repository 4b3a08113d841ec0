//! The object graph: registry, store and associators behind one handle.

use crate::{
    AssocError, AssocResult, AssociatorTable, GraphConfig, ManyRefs, ObjectStore, OneRef,
    OrderedRefs,
};
use log::debug;
use tether_core::{ClassId, EndpointId, ObjectId};
use tether_registry::{EndpointDef, Registry, RelKind};

/// How a link breaks referential symmetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationKind {
    /// `other` is linked from `object`, but the peer container of `other`
    /// does not hold `object`.
    MissingBackLink,
    /// `other` is no longer stored.
    DanglingLink,
    /// An ordered container whose sequence and membership set disagree.
    OrderedMismatch,
}

/// One finding of [`ObjectGraph::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymmetryViolation {
    pub object: ObjectId,
    pub endpoint: EndpointId,
    pub other: ObjectId,
    pub kind: ViolationKind,
}

/// Objects and their relationship extensions for one registry.
#[derive(Debug)]
pub struct ObjectGraph {
    pub(crate) registry: Registry,
    pub(crate) associators: AssociatorTable,
    pub(crate) store: ObjectStore,
    config: GraphConfig,
}

impl ObjectGraph {
    pub fn new(registry: Registry) -> Self {
        Self::with_config(registry, GraphConfig::default())
    }

    pub fn with_config(registry: Registry, config: GraphConfig) -> Self {
        let associators = AssociatorTable::from_registry(&registry);
        Self {
            store: ObjectStore::with_capacity(config.object_capacity),
            registry,
            associators,
            config,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    // ==================== Objects ====================

    /// Create an object of `class` with every endpoint empty.
    pub fn create(&mut self, class: ClassId) -> AssocResult<ObjectId> {
        if self.registry.get_class(class).is_none() {
            return Err(AssocError::UnknownClass(class.to_string()));
        }
        let id = self.store.insert(class);
        debug!(
            "event=object_created object={} class={}",
            id,
            self.registry.class_name(class)
        );
        Ok(id)
    }

    pub fn create_named(&mut self, class: &str) -> AssocResult<ObjectId> {
        let id = self
            .registry
            .get_class_id(class)
            .ok_or_else(|| AssocError::UnknownClass(class.to_string()))?;
        self.create(id)
    }

    /// Remove an object after unlinking it everywhere.
    ///
    /// Peered links are dissociated on both sides. One-way links that point
    /// at the object from elsewhere are dropped as well.
    pub fn remove_object(&mut self, obj: ObjectId) -> AssocResult<()> {
        let class = self.class_of(obj).ok_or(AssocError::UnknownObject(obj))?;
        let endpoints: Vec<EndpointId> = self
            .registry
            .all_endpoints_of(class)
            .iter()
            .map(|e| e.id)
            .collect();

        let mut unlinked = 0;
        for endpoint in endpoints {
            for other in self.linked(obj, endpoint) {
                if !self.is_linked(obj, endpoint, other) {
                    continue;
                }
                let kind = self.endpoint_def(endpoint).kind;
                self.store.extent_mut(obj, endpoint, kind).remove_link(other);
                self.mirror_dissociate(endpoint, obj, other);
                unlinked += 1;
            }
        }

        for record in self.store.records_mut() {
            for (_, extent) in record.slots_mut() {
                if extent.remove_link(obj) {
                    unlinked += 1;
                }
            }
        }
        self.store.remove(obj);
        debug!("event=object_removed object={} links={}", obj, unlinked);
        self.after_mutation();
        Ok(())
    }

    pub fn class_of(&self, obj: ObjectId) -> Option<ClassId> {
        self.store.class_of(obj)
    }

    pub fn contains(&self, obj: ObjectId) -> bool {
        self.store.contains(obj)
    }

    pub fn object_count(&self) -> usize {
        self.store.len()
    }

    /// All object IDs in creation order.
    pub fn objects(&self) -> Vec<ObjectId> {
        self.store.object_ids()
    }

    // ==================== Endpoints ====================

    /// The endpoint called `name` on the class of `obj`.
    pub fn endpoint(&self, obj: ObjectId, name: &str) -> AssocResult<EndpointId> {
        let class = self.class_of(obj).ok_or(AssocError::UnknownObject(obj))?;
        self.registry
            .find_endpoint(class, name)
            .map(|e| e.id)
            .ok_or_else(|| AssocError::UnknownEndpoint {
                class: self.registry.class_name(class).to_string(),
                name: name.to_string(),
            })
    }

    /// Accessor for a ONE endpoint of `obj`.
    pub fn one(&mut self, obj: ObjectId, endpoint: EndpointId) -> AssocResult<OneRef<'_>> {
        self.check_endpoint(obj, endpoint, RelKind::One)?;
        Ok(OneRef::new(self, obj, endpoint))
    }

    /// Accessor for a MANY endpoint of `obj`.
    pub fn many(&mut self, obj: ObjectId, endpoint: EndpointId) -> AssocResult<ManyRefs<'_>> {
        self.check_endpoint(obj, endpoint, RelKind::Many)?;
        Ok(ManyRefs::new(self, obj, endpoint))
    }

    /// Accessor for an ORDERED endpoint of `obj`.
    pub fn ordered(
        &mut self,
        obj: ObjectId,
        endpoint: EndpointId,
    ) -> AssocResult<OrderedRefs<'_>> {
        self.check_endpoint(obj, endpoint, RelKind::Ordered)?;
        Ok(OrderedRefs::new(self, obj, endpoint))
    }

    /// Objects linked from `obj` through `endpoint`, in container order.
    pub fn linked(&self, obj: ObjectId, endpoint: EndpointId) -> Vec<ObjectId> {
        self.store
            .extent(obj, endpoint)
            .map(|e| e.ids())
            .unwrap_or_default()
    }

    pub fn is_linked(&self, obj: ObjectId, endpoint: EndpointId, other: ObjectId) -> bool {
        self.store
            .extent(obj, endpoint)
            .is_some_and(|e| e.contains(other))
    }

    /// Check referential symmetry over the whole graph.
    ///
    /// Returns every violation found, sorted by object, endpoint and other.
    pub fn verify(&self) -> Vec<SymmetryViolation> {
        let mut violations = Vec::new();
        for record in self.store.iter() {
            for (endpoint, extent) in record.slots() {
                if let Some(ordered) = extent.as_ordered() {
                    if !ordered.is_consistent() {
                        violations.push(SymmetryViolation {
                            object: record.id,
                            endpoint,
                            other: record.id,
                            kind: ViolationKind::OrderedMismatch,
                        });
                    }
                }
                let peer = self.registry.get_endpoint(endpoint).and_then(|e| e.peer);
                for other in extent.ids() {
                    let kind = if !self.store.contains(other) {
                        Some(ViolationKind::DanglingLink)
                    } else {
                        match peer {
                            Some(peer) if !self.is_linked(other, peer, record.id) => {
                                Some(ViolationKind::MissingBackLink)
                            }
                            _ => None,
                        }
                    };
                    if let Some(kind) = kind {
                        violations.push(SymmetryViolation {
                            object: record.id,
                            endpoint,
                            other,
                            kind,
                        });
                    }
                }
            }
        }
        violations.sort_by_key(|v| (v.object, v.endpoint, v.other, v.kind));
        violations
    }

    // ==================== Internals ====================

    pub(crate) fn endpoint_def(&self, endpoint: EndpointId) -> &EndpointDef {
        self.registry
            .get_endpoint(endpoint)
            .unwrap_or_else(|| panic!("endpoint {} is not registered", endpoint))
    }

    pub(crate) fn qualified_name(&self, endpoint: EndpointId) -> String {
        self.registry.qualified_name(endpoint)
    }

    /// Check that `obj` exists and carries `endpoint` of the given kind.
    pub(crate) fn check_endpoint(
        &self,
        obj: ObjectId,
        endpoint: EndpointId,
        kind: RelKind,
    ) -> AssocResult<()> {
        let class = self.class_of(obj).ok_or(AssocError::UnknownObject(obj))?;
        let def = self
            .registry
            .get_endpoint(endpoint)
            .ok_or_else(|| AssocError::UnknownEndpoint {
                class: self.registry.class_name(class).to_string(),
                name: endpoint.to_string(),
            })?;
        if !self.registry.class_has_endpoint(class, endpoint) {
            return Err(AssocError::EndpointNotOnClass {
                endpoint: self.qualified_name(endpoint),
                class: self.registry.class_name(class).to_string(),
            });
        }
        if def.kind != kind {
            return Err(AssocError::WrongKind {
                endpoint: self.qualified_name(endpoint),
                expected: kind,
                actual: def.kind,
            });
        }
        Ok(())
    }

    pub(crate) fn check_writable(&self, endpoint: EndpointId) -> AssocResult<()> {
        if self.endpoint_def(endpoint).read_only {
            Err(AssocError::ReadOnly(self.qualified_name(endpoint)))
        } else {
            Ok(())
        }
    }

    /// Check that `obj` may be stored in containers of `endpoint`.
    pub(crate) fn validate(&self, endpoint: EndpointId, obj: ObjectId) -> AssocResult<()> {
        self.associators
            .associator(endpoint)
            .validate_object(&self.registry, &self.store, obj)
    }

    /// `own`'s container on `endpoint` gained `other`; link back from `other`.
    pub(crate) fn mirror_associate(&mut self, endpoint: EndpointId, own: ObjectId, other: ObjectId) {
        if let Some(peer) = self.associators.peer_of(endpoint) {
            peer.associate(&self.associators, &mut self.store, other, own);
        }
    }

    /// `own`'s container on `endpoint` lost `other`; unlink it back.
    pub(crate) fn mirror_dissociate(
        &mut self,
        endpoint: EndpointId,
        own: ObjectId,
        other: ObjectId,
    ) {
        if let Some(peer) = self.associators.peer_of(endpoint) {
            peer.dissociate(&self.associators, &mut self.store, other, own);
        }
    }

    pub(crate) fn after_mutation(&self) {
        if !self.config.verify_symmetry {
            return;
        }
        let violations = self.verify();
        if !violations.is_empty() {
            panic!("referential symmetry violated: {:?}", violations);
        }
    }
}
