//! Value types for dynamic endpoint access.
//!
//! Values are what a relationship descriptor hands out and accepts when an
//! endpoint is addressed by name rather than through a typed accessor.
//! References are `Ref`, collections are `List`, an unset ONE endpoint is
//! `Null`. Scalars exist so callers can pass arbitrary data and receive a
//! type violation instead of a silent conversion.

use crate::ObjectId;
use std::fmt;

/// A value read from or written to an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null/missing value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit floating point.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Reference to an object.
    Ref(ObjectId),
    /// List of values.
    List(Vec<Value>),
}

impl Value {
    /// Returns true if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this is an object reference.
    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    /// Returns true if this is a list.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Get as object ID if this is a Ref value.
    pub fn as_ref_id(&self) -> Option<ObjectId> {
        match self {
            Value::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Get the list items if this is a List value.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Collect the references of a List value.
    ///
    /// Returns `None` when this is not a list or when any item is not a `Ref`.
    pub fn ref_ids(&self) -> Option<Vec<ObjectId>> {
        self.as_list()?.iter().map(Value::as_ref_id).collect()
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Ref(_) => "Ref",
            Value::List(_) => "List",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Ref(id) => write!(f, "#{}", id),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

// Convenient From implementations
impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Ref(id)
    }
}

impl From<Option<ObjectId>> for Value {
    fn from(id: Option<ObjectId>) -> Self {
        id.map_or(Value::Null, Value::Ref)
    }
}

impl FromIterator<ObjectId> for Value {
    fn from_iter<I: IntoIterator<Item = ObjectId>>(iter: I) -> Self {
        Value::List(iter.into_iter().map(Value::Ref).collect())
    }
}

/// Helper macro to build a `Value::List` of references.
#[macro_export]
macro_rules! refs {
    () => {
        $crate::Value::List(Vec::new())
    };
    ($($id:expr),+ $(,)?) => {
        $crate::Value::List(vec![$($crate::Value::Ref($id)),+])
    };
}
