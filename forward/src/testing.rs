//! Shared fixtures for forward-reference tests.

use crate::{ForwardContext, ForwardResult, Member, Named, Slot};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub enum TestValue {
    Int(i64),
    Str(String),
    Record(BTreeMap<String, TestValue>),
}

impl TestValue {
    pub fn record<const N: usize>(fields: [(&str, TestValue); N]) -> Self {
        TestValue::Record(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl Member for TestValue {
    fn member(&self, name: &str) -> Option<Self> {
        match self {
            TestValue::Record(fields) => fields.get(name).cloned(),
            _ => None,
        }
    }
}

impl Named for TestValue {
    fn forward_name(&self) -> Option<&str> {
        match self {
            TestValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

pub type Recorded = Rc<RefCell<Vec<(Slot, TestValue)>>>;

/// Callback that appends every resolution it sees to `log`.
pub fn record(
    log: &Recorded,
) -> impl FnOnce(&mut ForwardContext<TestValue>, TestValue, &Slot) -> ForwardResult<()> + 'static {
    let log = Rc::clone(log);
    move |_, value, slot| {
        log.borrow_mut().push((slot.clone(), value));
        Ok(())
    }
}
