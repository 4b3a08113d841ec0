//! The Registry - immutable schema lookup.

use crate::{ClassDef, EndpointDef};
use std::collections::HashMap;
use tether_core::{ClassId, EndpointId};

/// The Registry provides runtime lookup of classes and endpoints.
/// It is immutable after construction.
#[derive(Debug)]
pub struct Registry {
    /// Class definitions, indexed by `ClassId`.
    classes: Vec<ClassDef>,
    /// Class ID lookup by name.
    class_names: HashMap<String, ClassId>,
    /// Endpoint definitions, indexed by `EndpointId`.
    endpoints: Vec<EndpointDef>,
    /// Superclass chain per class, starting with the class itself.
    ancestry: Vec<Vec<ClassId>>,
}

impl Registry {
    pub(crate) fn new(
        classes: Vec<ClassDef>,
        class_names: HashMap<String, ClassId>,
        endpoints: Vec<EndpointDef>,
    ) -> Self {
        let ancestry = classes
            .iter()
            .map(|class| {
                let mut chain = vec![class.id];
                let mut current = class.superclass;
                while let Some(parent) = current {
                    chain.push(parent);
                    current = classes[parent.index()].superclass;
                }
                chain
            })
            .collect();

        Self {
            classes,
            class_names,
            endpoints,
            ancestry,
        }
    }

    // ==================== Class Lookups ====================

    /// Get a class definition by ID.
    pub fn get_class(&self, id: ClassId) -> Option<&ClassDef> {
        self.classes.get(id.index())
    }

    /// Get a class definition by name.
    pub fn get_class_by_name(&self, name: &str) -> Option<&ClassDef> {
        self.class_names.get(name).and_then(|id| self.get_class(*id))
    }

    /// Get a class ID by name.
    pub fn get_class_id(&self, name: &str) -> Option<ClassId> {
        self.class_names.get(name).copied()
    }

    pub fn all_classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.iter()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// The class followed by its superclasses, nearest first.
    pub fn superclasses(&self, id: ClassId) -> &[ClassId] {
        self.ancestry.get(id.index()).map_or(&[], Vec::as_slice)
    }

    /// Check if `sub` is `sup` or one of its subclasses.
    pub fn is_subclass(&self, sub: ClassId, sup: ClassId) -> bool {
        self.superclasses(sub).contains(&sup)
    }

    // ==================== Endpoint Lookups ====================

    /// Get an endpoint definition by ID.
    pub fn get_endpoint(&self, id: EndpointId) -> Option<&EndpointDef> {
        self.endpoints.get(id.index())
    }

    pub fn all_endpoints(&self) -> impl Iterator<Item = &EndpointDef> {
        self.endpoints.iter()
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Find an endpoint visible on `class`, including inherited ones.
    pub fn find_endpoint(&self, class: ClassId, name: &str) -> Option<&EndpointDef> {
        self.superclasses(class).iter().find_map(|c| {
            self.classes[c.index()]
                .endpoints
                .iter()
                .map(|e| &self.endpoints[e.index()])
                .find(|e| e.name == name)
        })
    }

    /// All endpoints visible on `class`: inherited ones first, then its own.
    pub fn all_endpoints_of(&self, class: ClassId) -> Vec<&EndpointDef> {
        self.superclasses(class)
            .iter()
            .rev()
            .flat_map(|c| self.classes[c.index()].endpoints.iter())
            .map(|e| &self.endpoints[e.index()])
            .collect()
    }

    /// Check if objects of `class` carry `endpoint`.
    pub fn class_has_endpoint(&self, class: ClassId, endpoint: EndpointId) -> bool {
        self.get_endpoint(endpoint)
            .is_some_and(|e| self.is_subclass(class, e.owner))
    }

    /// `Owner.name` form of an endpoint, for messages.
    pub fn qualified_name(&self, endpoint: EndpointId) -> String {
        match self.get_endpoint(endpoint) {
            Some(e) => format!("{}.{}", self.classes[e.owner.index()].name, e.name),
            None => endpoint.to_string(),
        }
    }

    /// Class name, for messages.
    pub fn class_name(&self, class: ClassId) -> &str {
        self.get_class(class).map_or("<unknown>", |c| c.name.as_str())
    }
}
