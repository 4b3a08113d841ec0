//! Tether Registry
//!
//! Runtime lookup of classes and relationship endpoints. Single source of
//! truth for endpoint kinds, content types and peers. The registry is
//! immutable after construction via RegistryBuilder; forward references let a
//! class name a target or peer that is only declared further down.

mod builder;
mod registry;
mod schema;
mod types;

pub use builder::{
    ClassBuilder, EndpointDecl, Peer, RegistryBuilder, RegistryError, RegistryResult, Target,
};
pub use registry::Registry;
pub use schema::{ClassHandle, SchemaValue};
pub use types::*;
