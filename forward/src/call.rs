//! Forward calls.
//!
//! A forward call runs a function once every argument it was given has
//! resolved. Arguments may be plain values, forward references or other
//! forward calls. The call keeps a barrier counter that starts at one while
//! the arguments are being registered; each unresolved argument raises it and
//! each resolution lowers it. Releasing the initial count after registration
//! means a call with no unresolved arguments runs immediately.

use crate::context::Waiter;
use crate::name::ensure_legal;
use crate::{ForwardContext, ForwardError, ForwardResult, Member, RefId, Slot};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Handle to a forward call inside a [`ForwardContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallId(u32);

impl CallId {
    pub fn raw(&self) -> u32 {
        self.0
    }

    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call{}", self.0)
    }
}

/// One argument of a forward call.
#[derive(Debug, Clone)]
pub enum Arg<V> {
    Value(V),
    Ref(RefId),
    Call(CallId),
}

impl<V> Arg<V> {
    pub fn value(value: V) -> Self {
        Arg::Value(value)
    }
}

impl<V> From<RefId> for Arg<V> {
    fn from(r: RefId) -> Self {
        Arg::Ref(r)
    }
}

impl<V> From<CallId> for Arg<V> {
    fn from(c: CallId) -> Self {
        Arg::Call(c)
    }
}

/// Resolved arguments handed to the function of a forward call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallArgs<V> {
    pub positional: Vec<V>,
    pub keyword: BTreeMap<String, V>,
}

impl<V> CallArgs<V> {
    pub fn arg(&self, index: usize) -> Option<&V> {
        self.positional.get(index)
    }

    pub fn kwarg(&self, name: &str) -> Option<&V> {
        self.keyword.get(name)
    }
}

/// Function run when a forward call resolves.
pub type CallFn<V> = Box<dyn FnOnce(&mut ForwardContext<V>, CallArgs<V>) -> ForwardResult<V>>;

#[derive(Debug)]
enum CallState<V> {
    Waiting,
    Resolved(V),
    Failed,
}

pub(crate) struct CallNode<V> {
    func: Option<CallFn<V>>,
    positional: Vec<Option<V>>,
    keyword: BTreeMap<String, Option<V>>,
    barrier: usize,
    state: CallState<V>,
    waiters: Vec<Waiter<V>>,
}

impl<V> fmt::Debug for CallNode<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallNode")
            .field("barrier", &self.barrier)
            .field("waiters", &self.waiters)
            .finish()
    }
}

/// Builder for a forward call, finished with [`CallBuilder::done`].
pub struct CallBuilder<'a, V: Member> {
    ctx: &'a mut ForwardContext<V>,
    func: CallFn<V>,
    positional: Vec<Arg<V>>,
    keyword: Vec<(String, Arg<V>)>,
}

impl<'a, V: Member> CallBuilder<'a, V> {
    /// Add a positional argument.
    pub fn arg(mut self, arg: impl Into<Arg<V>>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Add a keyword argument.
    pub fn kwarg(mut self, name: &str, arg: impl Into<Arg<V>>) -> Self {
        self.keyword.push((name.to_string(), arg.into()));
        self
    }

    /// Register the call. It runs now if every argument is already resolved.
    pub fn done(self) -> ForwardResult<CallId> {
        let CallBuilder {
            ctx,
            func,
            positional,
            keyword,
        } = self;

        let mut seen = BTreeSet::new();
        for (name, arg) in keyword.iter() {
            ensure_legal(name)?;
            if !seen.insert(name.as_str()) {
                return Err(ForwardError::duplicate_name(name.clone()));
            }
            ctx.check_arg(arg)?;
        }
        for arg in &positional {
            ctx.check_arg(arg)?;
        }

        let id = CallId(ctx.calls.len() as u32);
        ctx.calls.push(Some(CallNode {
            func: Some(func),
            positional: positional.iter().map(|_| None).collect(),
            keyword: keyword.iter().map(|(k, _)| (k.clone(), None)).collect(),
            barrier: 1,
            state: CallState::Waiting,
            waiters: Vec::new(),
        }));

        for (i, arg) in positional.into_iter().enumerate() {
            ctx.register_arg(id, Slot::Index(i), arg)?;
        }
        for (name, arg) in keyword {
            ctx.register_arg(id, Slot::Key(name), arg)?;
        }
        debug!(
            "event=forward_call call={} barrier={}",
            id,
            ctx.barrier(id)?.saturating_sub(1)
        );
        ctx.lower_barrier(id)?;
        Ok(id)
    }
}

impl<V: Member> ForwardContext<V> {
    /// Start building a forward call of `func`.
    ///
    /// Calling a method on something not defined yet, or storing into one
    /// of its fields, is written as a forward call over its reference plus a
    /// callback on the result:
    ///
    /// ```
    /// use std::cell::RefCell;
    /// use std::collections::BTreeMap;
    /// use std::rc::Rc;
    /// use tether_forward::{ForwardContext, ForwardError, ForwardResult, Member, Slot};
    ///
    /// #[derive(Debug, Clone, PartialEq)]
    /// enum Val {
    ///     Int(i64),
    ///     Obj(BTreeMap<String, Val>),
    /// }
    ///
    /// impl Member for Val {
    ///     fn member(&self, name: &str) -> Option<Self> {
    ///         match self {
    ///             Val::Obj(fields) => fields.get(name).cloned(),
    ///             Val::Int(_) => None,
    ///         }
    ///     }
    /// }
    ///
    /// # fn main() -> ForwardResult<()> {
    /// let mut ctx: ForwardContext<Val> = ForwardContext::new();
    /// let counter = ctx.reference("Counter")?;
    /// let step = ctx.child(counter, "step")?;
    ///
    /// // Counter.step * 2, once Counter exists.
    /// let doubled = ctx
    ///     .forward_call(|_, args| match args.arg(0) {
    ///         Some(Val::Int(n)) => Ok(Val::Int(n * 2)),
    ///         _ => Err(ForwardError::callback("step is not a number")),
    ///     })
    ///     .arg(step)
    ///     .done()?;
    ///
    /// // Store the result into a field held elsewhere.
    /// let fields = Rc::new(RefCell::new(BTreeMap::new()));
    /// let sink = Rc::clone(&fields);
    /// ctx.attach_call(doubled, Slot::Key("doubled".into()), move |_, value, slot| {
    ///     if let Slot::Key(name) = slot {
    ///         sink.borrow_mut().insert(name.clone(), value);
    ///     }
    ///     Ok(())
    /// })?;
    ///
    /// let counter_fields = BTreeMap::from([("step".to_string(), Val::Int(21))]);
    /// ctx.define("Counter", Val::Obj(counter_fields))?;
    /// assert_eq!(fields.borrow().get("doubled"), Some(&Val::Int(42)));
    /// # Ok(())
    /// # }
    /// ```
    pub fn forward_call<F>(&mut self, func: F) -> CallBuilder<'_, V>
    where
        F: FnOnce(&mut ForwardContext<V>, CallArgs<V>) -> ForwardResult<V> + 'static,
    {
        CallBuilder {
            ctx: self,
            func: Box::new(func),
            positional: Vec::new(),
            keyword: Vec::new(),
        }
    }

    /// Register `func` to run with the result of `call`.
    ///
    /// Runs immediately when the call has already resolved.
    pub fn attach_call<F>(&mut self, call: CallId, slot: Slot, func: F) -> ForwardResult<()>
    where
        F: FnOnce(&mut ForwardContext<V>, V, &Slot) -> ForwardResult<()> + 'static,
    {
        let resolved = match &self.call_node(call)?.state {
            CallState::Resolved(value) => Some(value.clone()),
            CallState::Failed => return Err(ForwardError::CallFailed(call)),
            CallState::Waiting => None,
        };
        match resolved {
            Some(value) => func(self, value, &slot),
            None => {
                self.call_node_mut(call)?.waiters.push(Waiter::Func {
                    func: Box::new(func),
                    slot,
                });
                Ok(())
            }
        }
    }

    /// Result of `call`, once it has run successfully.
    pub fn call_result(&self, call: CallId) -> Option<&V> {
        match &self.call_node(call).ok()?.state {
            CallState::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self, call: CallId) -> bool {
        self.call_result(call).is_some()
    }

    pub fn is_failed(&self, call: CallId) -> bool {
        matches!(
            self.call_node(call).map(|n| &n.state),
            Ok(CallState::Failed)
        )
    }

    /// Number of arguments `call` is still waiting for.
    pub fn barrier(&self, call: CallId) -> ForwardResult<usize> {
        Ok(self.call_node(call)?.barrier)
    }

    /// Drop a call that has finished, successfully or not.
    pub fn release_call(&mut self, call: CallId) -> ForwardResult<()> {
        if matches!(self.call_node(call)?.state, CallState::Waiting) {
            return Err(ForwardError::still_pending(call.to_string()));
        }
        self.calls[call.index()] = None;
        Ok(())
    }

    fn check_arg(&self, arg: &Arg<V>) -> ForwardResult<()> {
        match arg {
            Arg::Value(_) => Ok(()),
            Arg::Ref(r) => self.is_bound(*r).map(|_| ()),
            Arg::Call(c) => match self.call_node(*c)?.state {
                CallState::Failed => Err(ForwardError::CallFailed(*c)),
                _ => Ok(()),
            },
        }
    }

    fn register_arg(&mut self, call: CallId, slot: Slot, arg: Arg<V>) -> ForwardResult<()> {
        match arg {
            Arg::Value(value) => self.store_slot(call, slot, value),
            Arg::Ref(r) => match self.bound_value(r)? {
                Some(value) => self.store_slot(call, slot, value),
                None => {
                    self.call_node_mut(call)?.barrier += 1;
                    self.push_waiter(r, Waiter::Fill { call, slot })
                }
            },
            Arg::Call(source) => {
                let resolved = match &self.call_node(source)?.state {
                    CallState::Resolved(value) => Some(value.clone()),
                    CallState::Failed => return Err(ForwardError::CallFailed(source)),
                    CallState::Waiting => None,
                };
                match resolved {
                    Some(value) => self.store_slot(call, slot, value),
                    None => {
                        self.call_node_mut(call)?.barrier += 1;
                        self.call_node_mut(source)?
                            .waiters
                            .push(Waiter::Fill { call, slot });
                        Ok(())
                    }
                }
            }
        }
    }

    fn store_slot(&mut self, call: CallId, slot: Slot, value: V) -> ForwardResult<()> {
        let node = self.call_node_mut(call)?;
        match slot {
            Slot::Index(i) => node.positional[i] = Some(value),
            Slot::Key(name) => {
                node.keyword.insert(name, Some(value));
            }
            Slot::Unit => unreachable!("forward call arguments are positional or keyword"),
        }
        Ok(())
    }

    /// An argument of `call` resolved.
    pub(crate) fn fill_slot(&mut self, call: CallId, slot: Slot, value: V) -> ForwardResult<()> {
        self.store_slot(call, slot, value)?;
        self.lower_barrier(call)
    }

    fn lower_barrier(&mut self, call: CallId) -> ForwardResult<()> {
        let node = self.call_node_mut(call)?;
        node.barrier -= 1;
        if node.barrier > 0 {
            return Ok(());
        }
        self.run_call(call)
    }

    fn run_call(&mut self, call: CallId) -> ForwardResult<()> {
        let node = self.call_node_mut(call)?;
        let func = node
            .func
            .take()
            .unwrap_or_else(|| panic!("forward call {} ran twice", call));
        let args = CallArgs {
            positional: std::mem::take(&mut node.positional)
                .into_iter()
                .map(|v| v.unwrap_or_else(|| panic!("forward call {} ran with a hole", call)))
                .collect(),
            keyword: std::mem::take(&mut node.keyword)
                .into_iter()
                .map(|(k, v)| {
                    let v = v.unwrap_or_else(|| panic!("forward call {} ran with a hole", call));
                    (k, v)
                })
                .collect(),
        };

        match func(self, args) {
            Ok(result) => {
                let node = self.call_node_mut(call)?;
                node.state = CallState::Resolved(result.clone());
                let waiters = std::mem::take(&mut node.waiters);
                debug!("event=call_resolved call={} waiters={}", call, waiters.len());

                let mut first_error = None;
                for waiter in waiters {
                    if let Err(err) = self.emit(waiter, result.clone()) {
                        warn!("event=callback_failed call={} error={}", call, err);
                        first_error.get_or_insert(err);
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
            Err(err) => {
                let node = self.call_node_mut(call)?;
                node.state = CallState::Failed;
                let dropped = std::mem::take(&mut node.waiters).len();
                warn!(
                    "event=call_failed call={} dropped_waiters={} error={}",
                    call, dropped, err
                );
                Err(err)
            }
        }
    }

    fn call_node(&self, call: CallId) -> ForwardResult<&CallNode<V>> {
        self.calls
            .get(call.index())
            .and_then(Option::as_ref)
            .ok_or(ForwardError::UnknownCall(call))
    }

    fn call_node_mut(&mut self, call: CallId) -> ForwardResult<&mut CallNode<V>> {
        self.calls
            .get_mut(call.index())
            .and_then(Option::as_mut)
            .ok_or(ForwardError::UnknownCall(call))
    }
}
