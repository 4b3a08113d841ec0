//! Tether Forward References
//!
//! Names that can be used before the thing they name exists. A
//! [`ForwardContext`] hands out [`RefId`] handles for top-level names and
//! their attribute paths; callbacks attached to a handle run once the name is
//! defined. [`ForwardContext::forward_call`] defers a whole function call
//! until its arguments are resolved.
//!
//! The schema builder uses this to let a class declare a relationship whose
//! peer lives on a class that is defined later.

mod call;
mod context;
mod error;
mod name;

#[cfg(test)]
pub(crate) mod testing;

pub use call::{Arg, CallArgs, CallBuilder, CallFn, CallId};
pub use context::{Binding, Callback, ForwardContext, Member, Named, RefId, Slot};
pub use error::{ForwardError, ForwardResult};
pub use name::is_legal_identifier;
