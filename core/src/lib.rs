//! Tether Core Types
//!
//! This crate provides the foundational types used throughout Tether:
//! - Identity types (ObjectId, ClassId, EndpointId)
//! - Value types (the Value enum exchanged by dynamic endpoint access)

mod id;
mod value;

pub use id::*;
pub use value::*;
