//! RegistryBuilder for constructing an immutable Registry.

use crate::{ClassDef, ClassHandle, ContentType, EndpointDef, RelKind, Registry, SchemaValue};
use log::{debug, trace};
use std::collections::{BTreeMap, HashMap, HashSet};
use tether_core::{ClassId, EndpointId};
use tether_forward::{is_legal_identifier, ForwardContext, ForwardError, RefId};
use thiserror::Error;

/// Result type for registry construction.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors that can occur during registry construction.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Illegal identifier: {0:?}")]
    IllegalName(String),

    #[error("Duplicate class name: {0}")]
    DuplicateClassName(String),

    #[error("Duplicate endpoint {endpoint} on class {class}")]
    DuplicateEndpointName { class: String, endpoint: String },

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Unknown superclass: {0}")]
    UnknownSuperclass(String),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Class {0} names more than one superclass")]
    MultipleSuperclasses(String),

    #[error("Endpoint {endpoint} on class {class} hides an inherited endpoint")]
    HiddenEndpoint { class: String, endpoint: String },

    #[error("Forward reference {0} was never resolved")]
    UnresolvedForward(String),

    #[error("Forward reference {0} does not resolve to a class")]
    NotAClass(String),

    #[error("Forward reference {0} does not resolve to an endpoint")]
    NotAnEndpoint(String),

    #[error("Endpoint {endpoint} names {peer} as peer, but {peer} is paired elsewhere")]
    PeerMismatch { endpoint: String, peer: String },

    #[error("Endpoint {endpoint} targets {found}, but its peer lives on {expected}")]
    TargetMismatch {
        endpoint: String,
        expected: String,
        found: String,
    },

    #[error("Endpoint {0} has neither a target nor a peer to infer one from")]
    MissingTarget(String),

    #[error("Class {class} was registered, but a forward callback failed: {source}")]
    CallbackFailed {
        class: String,
        #[source]
        source: ForwardError,
    },

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

/// Target of an endpoint declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Infer from the peer: the target is the class that owns the peer.
    Infer,
    /// Any object. One-way endpoints only.
    Any,
    /// A class by name; it may be declared after this one.
    Class(String),
    /// A closed union of classes. One-way endpoints only.
    OneOf(Vec<String>),
    /// A forward reference that resolves to a class.
    Forward(RefId),
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Class(name.to_string())
    }
}

impl From<RefId> for Target {
    fn from(r: RefId) -> Self {
        Target::Forward(r)
    }
}

/// Peer of an endpoint declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Peer {
    /// One-way endpoint.
    None,
    /// The endpoint is its own peer.
    Symmetric,
    /// An endpoint of a class that is already done.
    Endpoint(EndpointId),
    /// A forward reference that resolves to an endpoint, e.g. `Person.employer`.
    Forward(RefId),
}

impl From<EndpointId> for Peer {
    fn from(e: EndpointId) -> Self {
        Peer::Endpoint(e)
    }
}

impl From<RefId> for Peer {
    fn from(r: RefId) -> Self {
        Peer::Forward(r)
    }
}

/// Declaration of a relationship endpoint on a class under construction.
#[derive(Debug, Clone)]
pub struct EndpointDecl {
    pub name: String,
    pub kind: RelKind,
    pub target: Target,
    pub peer: Peer,
    pub read_only: bool,
    pub nullable: bool,
    pub insert_at: Option<usize>,
}

impl EndpointDecl {
    pub fn new(name: impl Into<String>, kind: RelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            target: Target::Infer,
            peer: Peer::None,
            read_only: false,
            nullable: true,
            insert_at: None,
        }
    }

    pub fn one(name: impl Into<String>) -> Self {
        Self::new(name, RelKind::One)
    }

    pub fn many(name: impl Into<String>) -> Self {
        Self::new(name, RelKind::Many)
    }

    pub fn ordered(name: impl Into<String>) -> Self {
        Self::new(name, RelKind::Ordered)
    }

    pub fn target(mut self, target: impl Into<Target>) -> Self {
        self.target = target.into();
        self
    }

    pub fn peer(mut self, peer: impl Into<Peer>) -> Self {
        self.peer = peer.into();
        self
    }

    pub fn symmetric(mut self) -> Self {
        self.peer = Peer::Symmetric;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// A ONE endpoint that may not be unset.
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Insert links created from the peer side at `index` instead of appending.
    pub fn insert_at(mut self, index: usize) -> Self {
        self.insert_at = Some(index);
        self
    }
}

#[derive(Debug)]
struct EndpointDraft {
    id: EndpointId,
    owner: ClassId,
    decl: EndpointDecl,
}

/// Builder for constructing an immutable Registry.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    /// Completed classes, indexed by ID.
    classes: Vec<ClassDef>,
    /// Class name to ID mapping.
    class_names: HashMap<String, ClassId>,
    /// Endpoints declared so far, indexed by ID.
    drafts: Vec<EndpointDraft>,
    /// Names of classes and endpoints that are not declared yet.
    forward: ForwardContext<SchemaValue>,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class definition.
    pub fn add_class(&mut self, name: impl Into<String>) -> ClassBuilder<'_> {
        ClassBuilder {
            builder: self,
            name: name.into(),
            superclass: None,
            extra_superclass: None,
            endpoints: Vec::new(),
        }
    }

    /// Forward reference to the class `name`.
    ///
    /// The reference is bound when the class is done, or right away if it
    /// already is.
    pub fn forward(&mut self, name: &str) -> RegistryResult<RefId> {
        if let Some(existing) = self.forward.lookup(name) {
            return Ok(existing);
        }
        let r = self.forward.reference(name)?;
        if let Some(&id) = self.class_names.get(name) {
            let handle = self.class_handle(id);
            self.forward.define(name, SchemaValue::Class(handle))?;
        }
        Ok(r)
    }

    /// Forward reference to a dotted path such as `Person.employer`.
    pub fn forward_path(&mut self, path: &str) -> RegistryResult<RefId> {
        let mut parts = path.split('.');
        let root = parts.next().unwrap_or_default();
        let mut current = self.forward(root)?;
        for part in parts {
            current = self.forward.child(current, part)?;
        }
        Ok(current)
    }

    pub fn forward_context(&self) -> &ForwardContext<SchemaValue> {
        &self.forward
    }

    pub fn forward_context_mut(&mut self) -> &mut ForwardContext<SchemaValue> {
        &mut self.forward
    }

    /// Get a completed class ID by name.
    pub fn class_id(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    /// Endpoint `endpoint` visible on the completed class `class`.
    pub fn endpoint_of(&self, class: &str, endpoint: &str) -> Option<EndpointId> {
        let id = self.class_id(class)?;
        self.visible_endpoints(id).get(endpoint).copied()
    }

    /// Build the immutable Registry.
    ///
    /// Resolves forward targets and peers, pairs every peer with its
    /// counterpart and infers targets from peers.
    pub fn build(self) -> RegistryResult<Registry> {
        if let Some(r) = self.forward.pending().next() {
            return Err(RegistryError::UnresolvedForward(self.forward.path(r)?));
        }

        let mut peers = Vec::with_capacity(self.drafts.len());
        for draft in &self.drafts {
            peers.push(self.resolve_peer(draft)?);
        }

        // Pair peers: a peer that declared none adopts the endpoint naming it.
        for draft in &self.drafts {
            let Some(peer) = peers[draft.id.index()] else {
                continue;
            };
            let back = peers[peer.index()];
            match back {
                None => peers[peer.index()] = Some(draft.id),
                Some(back) if back == draft.id => {}
                Some(_) => {
                    return Err(RegistryError::PeerMismatch {
                        endpoint: self.qualified_name(draft.id),
                        peer: self.qualified_name(peer),
                    })
                }
            }
        }

        let mut endpoints = Vec::with_capacity(self.drafts.len());
        for draft in &self.drafts {
            let peer = peers[draft.id.index()];
            let content = self.resolve_target(draft, peer)?;
            endpoints.push(EndpointDef {
                id: draft.id,
                name: draft.decl.name.clone(),
                owner: draft.owner,
                kind: draft.decl.kind,
                content,
                peer,
                read_only: draft.decl.read_only,
                nullable: draft.decl.nullable,
                insert_at: draft.decl.insert_at,
            });
        }

        debug!(
            "event=registry_built classes={} endpoints={}",
            self.classes.len(),
            endpoints.len()
        );
        Ok(Registry::new(self.classes, self.class_names, endpoints))
    }

    fn resolve_peer(&self, draft: &EndpointDraft) -> RegistryResult<Option<EndpointId>> {
        match &draft.decl.peer {
            Peer::None => Ok(None),
            Peer::Symmetric => Ok(Some(draft.id)),
            Peer::Endpoint(id) => {
                if id.index() < self.drafts.len() {
                    Ok(Some(*id))
                } else {
                    Err(RegistryError::UnknownEndpoint(id.to_string()))
                }
            }
            Peer::Forward(r) => match self.forward.resolved(*r) {
                Some(SchemaValue::Endpoint(id)) => Ok(Some(*id)),
                Some(SchemaValue::Class(_)) => {
                    Err(RegistryError::NotAnEndpoint(self.forward.path(*r)?))
                }
                None => Err(RegistryError::UnresolvedForward(self.forward.path(*r)?)),
            },
        }
    }

    fn resolve_target(
        &self,
        draft: &EndpointDraft,
        peer: Option<EndpointId>,
    ) -> RegistryResult<ContentType> {
        let declared = match &draft.decl.target {
            Target::Infer => None,
            Target::Any => Some(ContentType::Any),
            Target::Class(name) => Some(ContentType::Class(self.lookup_class(name)?)),
            Target::OneOf(names) => Some(ContentType::OneOf(
                names
                    .iter()
                    .map(|n| self.lookup_class(n))
                    .collect::<RegistryResult<_>>()?,
            )),
            Target::Forward(r) => match self.forward.resolved(*r) {
                Some(SchemaValue::Class(handle)) => Some(ContentType::Class(handle.id)),
                Some(SchemaValue::Endpoint(_)) => {
                    return Err(RegistryError::NotAClass(self.forward.path(*r)?))
                }
                None => return Err(RegistryError::UnresolvedForward(self.forward.path(*r)?)),
            },
        };

        let Some(peer) = peer else {
            return declared.ok_or_else(|| RegistryError::MissingTarget(self.qualified_name(draft.id)));
        };
        let peer_owner = self.drafts[peer.index()].owner;
        match declared {
            None => Ok(ContentType::Class(peer_owner)),
            Some(ContentType::Class(class)) if self.is_subclass(class, peer_owner) => {
                Ok(ContentType::Class(class))
            }
            Some(other) => Err(RegistryError::TargetMismatch {
                endpoint: self.qualified_name(draft.id),
                expected: self.classes[peer_owner.index()].name.clone(),
                found: self.describe(&other),
            }),
        }
    }

    fn lookup_class(&self, name: &str) -> RegistryResult<ClassId> {
        self.class_id(name)
            .ok_or_else(|| RegistryError::UnknownClass(name.to_string()))
    }

    fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        let mut current = Some(sub);
        while let Some(class) = current {
            if class == sup {
                return true;
            }
            current = self.classes[class.index()].superclass;
        }
        false
    }

    /// Endpoints visible on `class` by name, inherited ones included.
    fn visible_endpoints(&self, class: ClassId) -> BTreeMap<String, EndpointId> {
        let mut members = BTreeMap::new();
        let mut current = Some(class);
        while let Some(c) = current {
            let def = &self.classes[c.index()];
            for &e in &def.endpoints {
                members
                    .entry(self.drafts[e.index()].decl.name.clone())
                    .or_insert(e);
            }
            current = def.superclass;
        }
        members
    }

    /// Fails if binding `class_ref` to a class with the `visible` endpoint
    /// names would miss a member asked for through it.
    fn check_forward_members(&self, class_ref: RefId, visible: &HashSet<&str>) -> RegistryResult<()> {
        if self.forward.is_bound(class_ref)? {
            return Err(ForwardError::already_bound(self.forward.path(class_ref)?).into());
        }
        for child in self.forward.children(class_ref)? {
            if self.forward.is_bound(child)? {
                continue;
            }
            let member = self.forward.name(child)?;
            if !visible.contains(member) {
                return Err(
                    ForwardError::missing_member(self.forward.path(class_ref)?, member).into(),
                );
            }
            // Endpoints have no members of their own.
            if let Some(&grandchild) = self.forward.children(child)?.first() {
                let path = self.forward.path(child)?;
                return Err(ForwardError::missing_member(path, self.forward.name(grandchild)?).into());
            }
        }
        Ok(())
    }

    fn class_handle(&self, class: ClassId) -> ClassHandle {
        ClassHandle::new(
            class,
            self.classes[class.index()].name.clone(),
            self.visible_endpoints(class),
        )
    }

    fn qualified_name(&self, endpoint: EndpointId) -> String {
        let draft = &self.drafts[endpoint.index()];
        format!("{}.{}", self.classes[draft.owner.index()].name, draft.decl.name)
    }

    fn describe(&self, content: &ContentType) -> String {
        let name = |id: &ClassId| self.classes[id.index()].name.clone();
        match content {
            ContentType::Any => "any object".to_string(),
            ContentType::Class(id) => name(id),
            ContentType::OneOf(ids) => ids.iter().map(name).collect::<Vec<_>>().join(" | "),
        }
    }
}

/// Builder for a class definition.
pub struct ClassBuilder<'a> {
    builder: &'a mut RegistryBuilder,
    name: String,
    superclass: Option<String>,
    extra_superclass: Option<String>,
    endpoints: Vec<EndpointDecl>,
}

impl<'a> ClassBuilder<'a> {
    /// Set the superclass by name. A class has at most one.
    pub fn extends(mut self, parent_name: impl Into<String>) -> Self {
        let parent_name = parent_name.into();
        if self.superclass.is_none() {
            self.superclass = Some(parent_name);
        } else {
            self.extra_superclass = Some(parent_name);
        }
        self
    }

    /// Add a relationship endpoint.
    pub fn endpoint(mut self, decl: EndpointDecl) -> Self {
        self.endpoints.push(decl);
        self
    }

    /// Finish building this class.
    ///
    /// A forward reference with the class name, if one was handed out, is
    /// bound to the class here. Paths through it that name endpoints the
    /// class lacks fail before anything is registered. A callback failing
    /// while the reference binds yields `CallbackFailed`; the class stays
    /// registered in that case.
    pub fn done(self) -> RegistryResult<ClassId> {
        let ClassBuilder {
            builder,
            name,
            superclass,
            extra_superclass,
            endpoints,
        } = self;

        if !is_legal_identifier(&name) {
            return Err(RegistryError::IllegalName(name));
        }
        if builder.class_names.contains_key(&name) {
            return Err(RegistryError::DuplicateClassName(name));
        }
        if extra_superclass.is_some() {
            return Err(RegistryError::MultipleSuperclasses(name));
        }
        let superclass = match superclass {
            Some(parent) => match builder.class_names.get(&parent) {
                Some(&id) => Some(id),
                None => return Err(RegistryError::UnknownSuperclass(parent)),
            },
            None => None,
        };

        let inherited = match superclass {
            Some(parent) => builder.visible_endpoints(parent),
            None => BTreeMap::new(),
        };
        let mut seen = HashSet::new();
        for decl in &endpoints {
            if !is_legal_identifier(&decl.name) {
                return Err(RegistryError::IllegalName(decl.name.clone()));
            }
            if !seen.insert(decl.name.as_str()) {
                return Err(RegistryError::DuplicateEndpointName {
                    class: name.clone(),
                    endpoint: decl.name.clone(),
                });
            }
            if inherited.contains_key(&decl.name) {
                return Err(RegistryError::HiddenEndpoint {
                    class: name.clone(),
                    endpoint: decl.name.clone(),
                });
            }
        }

        // Everything already asked of the class through its forward
        // reference must exist before the class is registered.
        let class_ref = builder.forward.lookup(&name);
        if let Some(class_ref) = class_ref {
            let visible: HashSet<&str> = seen
                .iter()
                .copied()
                .chain(inherited.keys().map(String::as_str))
                .collect();
            builder.check_forward_members(class_ref, &visible)?;
        }

        let id = ClassId::new(builder.classes.len() as u32);
        let mut own = Vec::with_capacity(endpoints.len());
        for decl in endpoints {
            let endpoint = EndpointId::new(builder.drafts.len() as u32);
            own.push(endpoint);
            builder.drafts.push(EndpointDraft {
                id: endpoint,
                owner: id,
                decl,
            });
        }
        trace!(
            "event=class_done class={} superclass={:?} endpoints={}",
            name,
            superclass,
            own.len()
        );
        builder.classes.push(ClassDef {
            id,
            name: name.clone(),
            superclass,
            endpoints: own,
        });
        builder.class_names.insert(name.clone(), id);

        if class_ref.is_some() {
            let handle = builder.class_handle(id);
            builder
                .forward
                .define(&name, SchemaValue::Class(handle))
                .map_err(|source| RegistryError::CallbackFailed { class: name, source })?;
        }
        Ok(id)
    }
}
