//! Tether Graph Storage
//!
//! This crate keeps the relationship extensions of every object:
//! - Object store with per-endpoint containers (singleton, set, ordered)
//! - Associators that mirror each change onto the peer endpoint
//! - Typed accessors for ONE / MANY / ORDERED endpoints
//! - Dynamic get/set by endpoint name through relationship descriptors
//! - Transitive closure over endpoint paths
//!
//! After every successful mutation, `y` is linked from `x` through an
//! endpoint exactly when `x` is linked from `y` through its peer.

mod access;
mod associator;
mod closure;
mod config;
mod descriptor;
mod error;
mod extent;
mod graph;
mod store;

pub use access::{ManyRefs, OneRef, OrderedRefs};
pub use associator::{
    Associator, AssociatorTable, OrderedAssociator, SetAssociator, SingletonAssociator,
};
pub use config::GraphConfig;
pub use descriptor::RelationshipDescriptor;
pub use error::{AssocError, AssocResult};
pub use extent::{Extent, OrderedExtent};
pub use graph::{ObjectGraph, SymmetryViolation, ViolationKind};
pub use store::{ObjectRecord, ObjectStore};
