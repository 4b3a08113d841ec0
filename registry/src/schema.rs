//! Values that schema forward references resolve to.

use std::collections::BTreeMap;
use std::rc::Rc;
use tether_core::{ClassId, EndpointId};
use tether_forward::{Member, Named};

/// A completed class as seen through a forward reference.
///
/// Its members are the endpoints visible on the class, inherited ones
/// included, so `Person.employer` resolves to an endpoint once `Person`
/// is done.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassHandle {
    pub id: ClassId,
    pub name: String,
    members: Rc<BTreeMap<String, EndpointId>>,
}

impl ClassHandle {
    pub(crate) fn new(id: ClassId, name: String, members: BTreeMap<String, EndpointId>) -> Self {
        Self {
            id,
            name,
            members: Rc::new(members),
        }
    }

    pub fn endpoint(&self, name: &str) -> Option<EndpointId> {
        self.members.get(name).copied()
    }
}

/// What a schema forward reference is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaValue {
    Class(ClassHandle),
    Endpoint(EndpointId),
}

impl SchemaValue {
    pub fn as_class(&self) -> Option<&ClassHandle> {
        match self {
            SchemaValue::Class(handle) => Some(handle),
            SchemaValue::Endpoint(_) => None,
        }
    }

    pub fn as_endpoint(&self) -> Option<EndpointId> {
        match self {
            SchemaValue::Endpoint(id) => Some(*id),
            SchemaValue::Class(_) => None,
        }
    }
}

impl Member for SchemaValue {
    fn member(&self, name: &str) -> Option<Self> {
        match self {
            SchemaValue::Class(handle) => handle.endpoint(name).map(SchemaValue::Endpoint),
            SchemaValue::Endpoint(_) => None,
        }
    }
}

impl Named for SchemaValue {
    fn forward_name(&self) -> Option<&str> {
        self.as_class().map(|c| c.name.as_str())
    }
}
