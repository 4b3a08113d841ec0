//! Endpoint access by name, through dynamic values.

use crate::{AssocError, AssocResult, ObjectGraph};
use tether_core::{EndpointId, ObjectId, Value};
use tether_registry::{Registry, RelKind};

/// Reads and writes one endpoint as a [`Value`].
///
/// ONE endpoints read as `Ref` or `Null`. MANY endpoints read as a `List`
/// sorted by ID, ORDERED ones as a `List` in sequence order. Writes replace
/// the whole extension.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDescriptor {
    endpoint: EndpointId,
    kind: RelKind,
    name: String,
}

impl RelationshipDescriptor {
    pub fn new(registry: &Registry, endpoint: EndpointId) -> AssocResult<Self> {
        let def = registry
            .get_endpoint(endpoint)
            .ok_or_else(|| AssocError::UnknownEndpoint {
                class: "<any>".to_string(),
                name: endpoint.to_string(),
            })?;
        Ok(Self {
            endpoint,
            kind: def.kind,
            name: registry.qualified_name(endpoint),
        })
    }

    pub fn endpoint(&self) -> EndpointId {
        self.endpoint
    }

    pub fn kind(&self) -> RelKind {
        self.kind
    }

    /// `Owner.name` of the endpoint.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, graph: &ObjectGraph, obj: ObjectId) -> AssocResult<Value> {
        graph.check_endpoint(obj, self.endpoint, self.kind)?;
        let linked = graph.linked(obj, self.endpoint);
        let value: Value = match self.kind {
            RelKind::One => linked.first().copied().into(),
            RelKind::Many | RelKind::Ordered => linked.into_iter().collect(),
        };
        Ok(value)
    }

    pub fn set(&self, graph: &mut ObjectGraph, obj: ObjectId, value: Value) -> AssocResult<()> {
        graph.check_endpoint(obj, self.endpoint, self.kind)?;
        match self.kind {
            RelKind::One => {
                let target = match value {
                    Value::Null => None,
                    Value::Ref(id) => Some(id),
                    other => return Err(self.mistyped("reference or null", &other)),
                };
                graph.one(obj, self.endpoint)?.set(target)
            }
            RelKind::Many => {
                let items = self.references(value)?;
                graph.many(obj, self.endpoint)?.assign(items)
            }
            RelKind::Ordered => {
                let items = self.references(value)?;
                graph.ordered(obj, self.endpoint)?.assign(items)
            }
        }
    }

    fn references(&self, value: Value) -> AssocResult<Vec<ObjectId>> {
        let items = match value {
            Value::List(items) => items,
            Value::Null => return Err(AssocError::null_violation(&self.name)),
            other => return Err(self.mistyped("list of references", &other)),
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::Ref(id) => Ok(id),
                Value::Null => Err(AssocError::null_violation(&self.name)),
                other => Err(self.mistyped("reference", &other)),
            })
            .collect()
    }

    fn mistyped(&self, expected: &str, found: &Value) -> AssocError {
        AssocError::type_violation(&self.name, expected, found.type_name())
    }
}

impl ObjectGraph {
    /// Descriptor for endpoint `name` as seen on class `class`.
    pub fn descriptor(&self, class: &str, name: &str) -> AssocResult<RelationshipDescriptor> {
        let class_id = self
            .registry
            .get_class_id(class)
            .ok_or_else(|| AssocError::UnknownClass(class.to_string()))?;
        let def = self
            .registry
            .find_endpoint(class_id, name)
            .ok_or_else(|| AssocError::UnknownEndpoint {
                class: class.to_string(),
                name: name.to_string(),
            })?;
        RelationshipDescriptor::new(&self.registry, def.id)
    }

    /// Read endpoint `name` of `obj`.
    pub fn get(&self, obj: ObjectId, name: &str) -> AssocResult<Value> {
        let endpoint = self.endpoint(obj, name)?;
        RelationshipDescriptor::new(&self.registry, endpoint)?.get(self, obj)
    }

    /// Replace the extension of endpoint `name` of `obj` with `value`.
    pub fn set(&mut self, obj: ObjectId, name: &str, value: Value) -> AssocResult<()> {
        let endpoint = self.endpoint(obj, name)?;
        RelationshipDescriptor::new(&self.registry, endpoint)?.set(self, obj, value)
    }
}
