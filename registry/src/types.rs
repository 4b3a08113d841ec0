//! Schema definition types.

use crate::Registry;
use std::fmt;
use tether_core::{ClassId, EndpointId};

/// Cardinality kind of a relationship endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelKind {
    /// At most one peer.
    One,
    /// Unordered, unique peers.
    Many,
    /// Ordered, unique peers.
    Ordered,
}

impl fmt::Display for RelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelKind::One => write!(f, "ONE"),
            RelKind::Many => write!(f, "MANY"),
            RelKind::Ordered => write!(f, "ORDERED"),
        }
    }
}

/// The classes an endpoint accepts, resolved when the registry is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    /// Any object. Only one-way endpoints may be untyped.
    Any,
    /// Instances of the class or any of its subclasses.
    Class(ClassId),
    /// Instances of any listed class or their subclasses.
    OneOf(Vec<ClassId>),
}

impl ContentType {
    /// Check whether an object of class `class` may be stored.
    pub fn admits(&self, registry: &Registry, class: ClassId) -> bool {
        match self {
            ContentType::Any => true,
            ContentType::Class(target) => registry.is_subclass(class, *target),
            ContentType::OneOf(targets) => targets.iter().any(|t| registry.is_subclass(class, *t)),
        }
    }

    /// Human-readable description, e.g. `Person` or `File | Directory`.
    pub fn describe(&self, registry: &Registry) -> String {
        let name = |id: &ClassId| {
            registry
                .get_class(*id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        match self {
            ContentType::Any => "any object".to_string(),
            ContentType::Class(id) => name(id),
            ContentType::OneOf(ids) => ids.iter().map(name).collect::<Vec<_>>().join(" | "),
        }
    }
}

/// Class definition.
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub id: ClassId,
    pub name: String,
    /// Single optional superclass.
    pub superclass: Option<ClassId>,
    /// Endpoints declared on this class itself, in declaration order.
    pub endpoints: Vec<EndpointId>,
}

/// Relationship endpoint definition.
#[derive(Debug, Clone)]
pub struct EndpointDef {
    pub id: EndpointId,
    pub name: String,
    /// Class that declares the endpoint.
    pub owner: ClassId,
    pub kind: RelKind,
    pub content: ContentType,
    /// Endpoint on the target class that mirrors this one. `None` for a
    /// one-way endpoint; `Some(self.id)` for a symmetric one.
    pub peer: Option<EndpointId>,
    /// Writes through the public accessors are rejected.
    pub read_only: bool,
    /// ONE endpoints only: whether it may be unset explicitly.
    pub nullable: bool,
    /// ORDERED endpoints only: where a link created from the peer side is
    /// inserted. `None` appends.
    pub insert_at: Option<usize>,
}

impl EndpointDef {
    /// True if the endpoint is its own peer.
    pub fn is_symmetric(&self) -> bool {
        self.peer == Some(self.id)
    }

    /// The single target class, when the content type names exactly one.
    pub fn target_class(&self) -> Option<ClassId> {
        match self.content {
            ContentType::Class(id) => Some(id),
            _ => None,
        }
    }
}
