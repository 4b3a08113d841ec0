//! Forward-reference context.
//!
//! A context owns an arena of reference nodes. Every node has a name, an
//! optional parent and a map of children by name, so `Node.parent` is the
//! child `parent` of the top-level reference `Node`. Callbacks attached to an
//! unbound node wait until the node is bound; binding a node binds its whole
//! unbound subtree by member lookup on the bound value.

use crate::call::CallNode;
use crate::name::ensure_legal;
use crate::{CallId, ForwardError, ForwardResult};
use log::{debug, trace, warn};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Handle to a forward reference inside a [`ForwardContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(u32);

impl RefId {
    pub fn raw(&self) -> u32 {
        self.0
    }

    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref{}", self.0)
    }
}

/// Opaque data handed back to a callback when its reference resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Unit,
    Index(usize),
    Key(String),
}

/// Values that forward references can be bound to.
///
/// `member` is the attribute lookup used to bind child references: when
/// `Node` is bound to `v`, its child `parent` is bound to `v.member("parent")`.
pub trait Member: Clone {
    fn member(&self, name: &str) -> Option<Self>;
}

/// Values that carry their own name, so they can be declared or defined
/// without spelling the name out.
pub trait Named {
    fn forward_name(&self) -> Option<&str>;
}

impl Named for str {
    fn forward_name(&self) -> Option<&str> {
        Some(self)
    }
}

impl Named for String {
    fn forward_name(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

/// Callback run with the resolved value and the slot given at attach time.
pub type Callback<V> = Box<dyn FnOnce(&mut ForwardContext<V>, V, &Slot) -> ForwardResult<()>>;

/// What a reference is bound to.
#[derive(Debug, Clone)]
pub enum Binding<V> {
    /// A concrete value.
    Value(V),
    /// Another forward reference; this one resolves when that one does.
    Ref(RefId),
}

/// Something waiting for a reference or call to resolve.
pub(crate) enum Waiter<V> {
    Func { func: Callback<V>, slot: Slot },
    Chain(RefId),
    Fill { call: CallId, slot: Slot },
}

impl<V> fmt::Debug for Waiter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Waiter::Func { slot, .. } => f.debug_struct("Func").field("slot", slot).finish(),
            Waiter::Chain(target) => f.debug_tuple("Chain").field(target).finish(),
            Waiter::Fill { call, slot } => f
                .debug_struct("Fill")
                .field("call", call)
                .field("slot", slot)
                .finish(),
        }
    }
}

#[derive(Debug)]
struct RefNode<V> {
    name: String,
    parent: Option<RefId>,
    children: BTreeMap<String, RefId>,
    waiters: Vec<Waiter<V>>,
    value: Option<V>,
}

/// Namespace of forward references and forward calls.
pub struct ForwardContext<V> {
    refs: Vec<Option<RefNode<V>>>,
    pub(crate) calls: Vec<Option<CallNode<V>>>,
    toplevel: HashMap<String, RefId>,
    pending: BTreeSet<RefId>,
}

impl<V> Default for ForwardContext<V> {
    fn default() -> Self {
        Self {
            refs: Vec::new(),
            calls: Vec::new(),
            toplevel: HashMap::new(),
            pending: BTreeSet::new(),
        }
    }
}

impl<V> fmt::Debug for ForwardContext<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardContext")
            .field("references", &self.refs.iter().flatten().count())
            .field("calls", &self.calls.iter().flatten().count())
            .field("pending", &self.pending)
            .finish()
    }
}

impl<V: Member> ForwardContext<V> {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------- Declaration ----------

    /// Declare a top-level forward reference.
    pub fn reference(&mut self, name: &str) -> ForwardResult<RefId> {
        ensure_legal(name)?;
        if self.toplevel.contains_key(name) {
            return Err(ForwardError::duplicate_name(name));
        }
        let id = self.alloc(name, None);
        self.toplevel.insert(name.to_string(), id);
        trace!("event=declare ref={} name={}", id, name);
        Ok(id)
    }

    /// Declare a top-level forward reference named after `target`.
    pub fn reference_for<T: Named + ?Sized>(&mut self, target: &T) -> ForwardResult<RefId> {
        let name = target
            .forward_name()
            .ok_or_else(|| ForwardError::illegal_name("<unnamed>"))?
            .to_string();
        self.reference(&name)
    }

    /// Get or create the child reference `name` of `parent`.
    ///
    /// The same child is returned for repeated access. If `parent` is already
    /// bound, the new child is bound immediately to the matching member.
    pub fn child(&mut self, parent: RefId, name: &str) -> ForwardResult<RefId> {
        ensure_legal(name)?;
        let node = self.node(parent)?;
        if let Some(&existing) = node.children.get(name) {
            return Ok(existing);
        }
        let member = match &node.value {
            Some(value) => Some(value.member(name).ok_or_else(|| {
                ForwardError::missing_member(self.path_unchecked(parent), name)
            })?),
            None => None,
        };

        let id = self.alloc(name, Some(parent));
        self.node_mut(parent)?.children.insert(name.to_string(), id);
        if let Some(value) = member {
            self.node_mut(id)?.value = Some(value);
        }
        Ok(id)
    }

    /// Resolve a dotted path such as `Node.parent` without creating anything.
    pub fn lookup(&self, path: &str) -> Option<RefId> {
        let mut parts = path.split('.');
        let mut current = *self.toplevel.get(parts.next()?)?;
        for part in parts {
            current = *self.node(current).ok()?.children.get(part)?;
        }
        Some(current)
    }

    /// Register `func` to run once `reference` is bound.
    pub fn attach<F>(&mut self, reference: RefId, slot: Slot, func: F) -> ForwardResult<()>
    where
        F: FnOnce(&mut ForwardContext<V>, V, &Slot) -> ForwardResult<()> + 'static,
    {
        if self.node(reference)?.value.is_some() {
            return Err(ForwardError::already_bound(self.path_unchecked(reference)));
        }
        self.push_waiter(
            reference,
            Waiter::Func {
                func: Box::new(func),
                slot,
            },
        )
    }

    // ---------- Binding ----------

    /// Bind `target` and fire every callback waiting on it or its subtree.
    ///
    /// All member lookups for the subtree are checked before anything is
    /// marked bound, so a `MissingMember` error leaves the tree untouched.
    /// Once binding has started, every callback runs even if an earlier one
    /// fails; the first failure is returned. Chaining onto a reference that
    /// already waits on `target`, directly or through other chains, is a
    /// `CyclicBinding`.
    pub fn bind(&mut self, target: RefId, binding: Binding<V>) -> ForwardResult<()> {
        match binding {
            Binding::Value(value) => self.bind_value(target, value),
            Binding::Ref(source) => self.chain(target, source),
        }
    }

    /// Bind the top-level reference `name` to `value` and return the value.
    pub fn define(&mut self, name: &str, value: V) -> ForwardResult<V> {
        let root = *self
            .toplevel
            .get(name)
            .ok_or_else(|| ForwardError::undefined_name(name))?;
        self.bind_value(root, value.clone())?;
        Ok(value)
    }

    /// Bind the top-level reference named after `value`.
    pub fn define_named(&mut self, value: V) -> ForwardResult<V>
    where
        V: Named,
    {
        let name = value
            .forward_name()
            .ok_or_else(|| ForwardError::illegal_name("<unnamed>"))?
            .to_string();
        self.define(&name, value)
    }

    fn chain(&mut self, target: RefId, source: RefId) -> ForwardResult<()> {
        if self.node(target)?.value.is_some() {
            return Err(ForwardError::already_bound(self.path_unchecked(target)));
        }
        if let Some(value) = self.node(source)?.value.clone() {
            return self.bind_value(target, value);
        }
        if self.feeds(target, source) {
            return Err(ForwardError::cyclic_binding(self.path_unchecked(target)));
        }
        debug!(
            "event=chain target={} source={}",
            self.path_unchecked(target),
            self.path_unchecked(source)
        );
        self.push_waiter(source, Waiter::Chain(target))
    }

    /// Whether binding `from` would eventually bind `to` through chained
    /// references, `from` itself included.
    fn feeds(&self, from: RefId, to: RefId) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Ok(node) = self.node(id) {
                stack.extend(node.waiters.iter().filter_map(|w| match w {
                    Waiter::Chain(next) => Some(*next),
                    _ => None,
                }));
            }
        }
        false
    }

    pub(crate) fn bind_value(&mut self, target: RefId, value: V) -> ForwardResult<()> {
        if self.node(target)?.value.is_some() {
            return Err(ForwardError::already_bound(self.path_unchecked(target)));
        }

        let nodes = self.check_members(target, &value)?;
        debug!(
            "event=bind ref={} nodes={}",
            self.path_unchecked(target),
            nodes
        );

        let mut first_error = None;
        self.bind_subtree(target, value, &mut first_error);
        first_error.map_or(Ok(()), Err)
    }

    /// Checks every member lookup binding `id` to `value` will make and
    /// returns the number of nodes it will bind.
    fn check_members(&self, id: RefId, value: &V) -> ForwardResult<usize> {
        let mut count = 1;
        for (name, &child) in &self.node(id)?.children {
            if self.node(child)?.value.is_some() {
                continue;
            }
            let member = value
                .member(name)
                .ok_or_else(|| ForwardError::missing_member(self.path_unchecked(id), name))?;
            count += self.check_members(child, &member)?;
        }
        Ok(count)
    }

    /// Binds `id`, fires its waiters, then binds its unbound children.
    ///
    /// Children are read after the waiters ran, so references created by a
    /// callback under a node that is not bound yet are bound as well.
    fn bind_subtree(&mut self, id: RefId, value: V, first_error: &mut Option<ForwardError>) {
        // Earlier callbacks may have bound or released this node already.
        let waiters = match self.node_mut(id) {
            Ok(node) if node.value.is_none() => {
                node.value = Some(value.clone());
                std::mem::take(&mut node.waiters)
            }
            _ => return,
        };
        self.pending.remove(&id);
        for waiter in waiters {
            if let Err(err) = self.emit(waiter, value.clone()) {
                warn!("event=callback_failed ref={} error={}", id, err);
                first_error.get_or_insert(err);
            }
        }

        let children: Vec<(String, RefId)> = match self.node(id) {
            Ok(node) => node
                .children
                .iter()
                .map(|(name, &child)| (name.clone(), child))
                .collect(),
            Err(_) => return,
        };
        for (name, child) in children {
            if !matches!(self.node(child), Ok(node) if node.value.is_none()) {
                continue;
            }
            match value.member(&name) {
                Some(member) => self.bind_subtree(child, member, first_error),
                None => {
                    let err = ForwardError::missing_member(self.path_unchecked(id), name);
                    warn!("event=bind_failed ref={} error={}", child, err);
                    first_error.get_or_insert(err);
                }
            }
        }
    }

    pub(crate) fn emit(&mut self, waiter: Waiter<V>, value: V) -> ForwardResult<()> {
        match waiter {
            Waiter::Func { func, slot } => func(self, value, &slot),
            Waiter::Chain(target) => self.bind_value(target, value),
            Waiter::Fill { call, slot } => self.fill_slot(call, slot, value),
        }
    }

    pub(crate) fn push_waiter(&mut self, reference: RefId, waiter: Waiter<V>) -> ForwardResult<()> {
        trace!("event=attach ref={} waiter={:?}", reference, waiter);
        self.node_mut(reference)?.waiters.push(waiter);
        self.pending.insert(reference);
        Ok(())
    }

    /// Bound value of `reference`, cloned.
    pub(crate) fn bound_value(&self, reference: RefId) -> ForwardResult<Option<V>> {
        Ok(self.node(reference)?.value.clone())
    }

    // ---------- Inspection ----------

    pub fn name(&self, reference: RefId) -> ForwardResult<&str> {
        Ok(&self.node(reference)?.name)
    }

    /// Dotted path from the top-level reference, e.g. `Node.parent`.
    pub fn path(&self, reference: RefId) -> ForwardResult<String> {
        self.node(reference)?;
        Ok(self.path_unchecked(reference))
    }

    pub fn parent(&self, reference: RefId) -> ForwardResult<Option<RefId>> {
        Ok(self.node(reference)?.parent)
    }

    /// Children of `reference` ordered by name.
    pub fn children(&self, reference: RefId) -> ForwardResult<Vec<RefId>> {
        Ok(self.node(reference)?.children.values().copied().collect())
    }

    pub fn callback_count(&self, reference: RefId) -> ForwardResult<usize> {
        Ok(self.node(reference)?.waiters.len())
    }

    pub fn is_bound(&self, reference: RefId) -> ForwardResult<bool> {
        Ok(self.node(reference)?.value.is_some())
    }

    /// The value `reference` resolved to, if it is bound.
    pub fn resolved(&self, reference: RefId) -> Option<&V> {
        self.node(reference).ok()?.value.as_ref()
    }

    /// References that have at least one callback waiting on them.
    pub fn pending(&self) -> impl Iterator<Item = RefId> + '_ {
        self.pending.iter().copied()
    }

    pub fn is_pending(&self, reference: RefId) -> bool {
        self.pending.contains(&reference)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Top-level references with their names.
    pub fn toplevel(&self) -> impl Iterator<Item = (&str, RefId)> + '_ {
        self.toplevel.iter().map(|(name, id)| (name.as_str(), *id))
    }

    // ---------- Release ----------

    /// Drop `reference` and its subtree.
    ///
    /// Fails while any node in the subtree still has callbacks waiting, since
    /// those callbacks could never run afterwards.
    pub fn release(&mut self, reference: RefId) -> ForwardResult<()> {
        let mut subtree = Vec::new();
        self.collect_subtree(reference, &mut subtree)?;
        if let Some(waiting) = subtree.iter().find(|id| self.pending.contains(*id)) {
            return Err(ForwardError::still_pending(self.path_unchecked(*waiting)));
        }

        let (name, parent) = {
            let node = self.node(reference)?;
            (node.name.clone(), node.parent)
        };
        match parent {
            Some(parent) => {
                self.node_mut(parent)?.children.remove(&name);
            }
            None => {
                self.toplevel.remove(&name);
            }
        }
        for id in &subtree {
            self.refs[id.index()] = None;
        }
        trace!("event=release ref={} nodes={}", name, subtree.len());
        Ok(())
    }

    fn collect_subtree(&self, id: RefId, out: &mut Vec<RefId>) -> ForwardResult<()> {
        out.push(id);
        for &child in self.node(id)?.children.values() {
            self.collect_subtree(child, out)?;
        }
        Ok(())
    }

    // ---------- Arena ----------

    fn alloc(&mut self, name: &str, parent: Option<RefId>) -> RefId {
        let id = RefId(self.refs.len() as u32);
        self.refs.push(Some(RefNode {
            name: name.to_string(),
            parent,
            children: BTreeMap::new(),
            waiters: Vec::new(),
            value: None,
        }));
        id
    }

    fn node(&self, id: RefId) -> ForwardResult<&RefNode<V>> {
        self.refs
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(ForwardError::UnknownReference(id))
    }

    fn node_mut(&mut self, id: RefId) -> ForwardResult<&mut RefNode<V>> {
        self.refs
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(ForwardError::UnknownReference(id))
    }

    fn path_unchecked(&self, id: RefId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            match self.node(cur) {
                Ok(node) => {
                    parts.push(node.name.as_str());
                    current = node.parent;
                }
                Err(_) => break,
            }
        }
        parts.reverse();
        parts.join(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, Recorded, TestValue};
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    // ========== TEST: forward_resolution ==========
    #[test]
    fn test_define_fires_root_then_children() {
        // GIVEN a reference X with a child X.bar, each with a callback
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let bar = ctx.child(x, "bar").unwrap();
        let log: Recorded = Default::default();
        ctx.attach(x, Slot::Key("root".into()), record(&log)).unwrap();
        ctx.attach(bar, Slot::Key("bar".into()), record(&log)).unwrap();
        assert_eq!(ctx.pending().collect::<Vec<_>>(), vec![x, bar]);

        // WHEN X is defined as a record whose bar is 42
        let obj = TestValue::record([("bar", TestValue::Int(42))]);
        let returned = ctx.define("X", obj.clone()).unwrap();

        // THEN the root fires first, then the child, and nothing is pending
        assert_eq!(returned, obj);
        assert_eq!(
            log.borrow().clone(),
            vec![
                (Slot::Key("root".into()), obj),
                (Slot::Key("bar".into()), TestValue::Int(42)),
            ]
        );
        assert!(!ctx.has_pending());
        assert_eq!(ctx.resolved(bar), Some(&TestValue::Int(42)));
    }

    #[test]
    fn test_reference_names_are_validated() {
        let mut ctx: ForwardContext<TestValue> = ForwardContext::new();
        assert!(matches!(
            ctx.reference("howdy there"),
            Err(ForwardError::IllegalName { .. })
        ));
        let x = ctx.reference("X").unwrap();
        assert!(matches!(
            ctx.reference("X"),
            Err(ForwardError::DuplicateName { .. })
        ));
        assert!(matches!(
            ctx.child(x, "1st"),
            Err(ForwardError::IllegalName { .. })
        ));
    }

    #[test]
    fn test_child_access_is_stable() {
        let mut ctx: ForwardContext<TestValue> = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let a = ctx.child(x, "foo").unwrap();
        let b = ctx.child(x, "foo").unwrap();
        let deep = ctx.child(a, "bar").unwrap();

        assert_eq!(a, b);
        assert_eq!(ctx.path(deep).unwrap(), "X.foo.bar");
        assert_eq!(ctx.parent(deep).unwrap(), Some(a));
        assert_eq!(ctx.lookup("X.foo.bar"), Some(deep));
        assert_eq!(ctx.lookup("X.nope"), None);
        assert_eq!(ctx.children(x).unwrap(), vec![a]);
    }

    #[test]
    fn test_callbacks_fire_in_attach_order() {
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let log: Recorded = Default::default();
        for i in 0..3 {
            ctx.attach(x, Slot::Index(i), record(&log)).unwrap();
        }
        assert_eq!(ctx.callback_count(x).unwrap(), 3);

        ctx.define("X", TestValue::Int(1)).unwrap();

        let slots: Vec<Slot> = log.borrow().iter().map(|(s, _)| s.clone()).collect();
        assert_eq!(slots, vec![Slot::Index(0), Slot::Index(1), Slot::Index(2)]);
        assert_eq!(ctx.callback_count(x).unwrap(), 0);
    }

    #[test]
    fn test_missing_member_leaves_tree_untouched() {
        // GIVEN X with children a and b, where b will be missing
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let a = ctx.child(x, "a").unwrap();
        let b = ctx.child(x, "b").unwrap();
        let log: Recorded = Default::default();
        ctx.attach(x, Slot::Unit, record(&log)).unwrap();
        ctx.attach(a, Slot::Unit, record(&log)).unwrap();

        // WHEN X is bound to a value that only has `a`
        let err = ctx
            .define("X", TestValue::record([("a", TestValue::Int(1))]))
            .unwrap_err();

        // THEN nothing was bound and no callback ran
        assert!(matches!(err, ForwardError::MissingMember { ref member, .. } if member == "b"));
        assert!(!ctx.is_bound(x).unwrap());
        assert!(!ctx.is_bound(a).unwrap());
        assert!(!ctx.is_bound(b).unwrap());
        assert!(log.borrow().is_empty());
        assert!(ctx.is_pending(x));
    }

    #[test]
    fn test_child_of_bound_reference_binds_immediately() {
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        ctx.define("X", TestValue::record([("size", TestValue::Int(3))]))
            .unwrap();

        let size = ctx.child(x, "size").unwrap();
        assert_eq!(ctx.resolved(size), Some(&TestValue::Int(3)));
        assert!(matches!(
            ctx.child(x, "color"),
            Err(ForwardError::MissingMember { .. })
        ));
    }

    #[test]
    fn test_attach_to_bound_reference_is_rejected() {
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        ctx.define("X", TestValue::Int(5)).unwrap();

        let log: Recorded = Default::default();
        assert!(matches!(
            ctx.attach(x, Slot::Unit, record(&log)),
            Err(ForwardError::AlreadyBound { .. })
        ));
        assert!(matches!(
            ctx.define("X", TestValue::Int(6)),
            Err(ForwardError::AlreadyBound { .. })
        ));
        assert!(matches!(
            ctx.define("Y", TestValue::Int(6)),
            Err(ForwardError::UndefinedName { .. })
        ));
    }

    #[test]
    fn test_chained_binding_resolves_with_source() {
        // GIVEN Y chained onto X, with a callback on Y's child
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let y = ctx.reference("Y").unwrap();
        let y_n = ctx.child(y, "n").unwrap();
        let log: Recorded = Default::default();
        ctx.attach(y_n, Slot::Unit, record(&log)).unwrap();
        ctx.bind(y, Binding::Ref(x)).unwrap();
        assert!(!ctx.is_bound(y).unwrap());

        // WHEN X is defined
        ctx.define("X", TestValue::record([("n", TestValue::Int(9))]))
            .unwrap();

        // THEN Y and its child resolve through X
        assert!(ctx.is_bound(y).unwrap());
        assert_eq!(log.borrow().clone(), vec![(Slot::Unit, TestValue::Int(9))]);
        assert!(!ctx.has_pending());
    }

    #[test]
    fn test_chain_onto_bound_or_self() {
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let y = ctx.reference("Y").unwrap();
        ctx.define("X", TestValue::Int(2)).unwrap();

        ctx.bind(y, Binding::Ref(x)).unwrap();
        assert_eq!(ctx.resolved(y), Some(&TestValue::Int(2)));

        let z = ctx.reference("Z").unwrap();
        assert!(matches!(
            ctx.bind(z, Binding::Ref(z)),
            Err(ForwardError::CyclicBinding { .. })
        ));
    }

    #[test]
    fn test_longer_chain_cycle_is_rejected() {
        let mut ctx: ForwardContext<TestValue> = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let y = ctx.reference("Y").unwrap();
        let z = ctx.reference("Z").unwrap();
        ctx.bind(y, Binding::Ref(x)).unwrap();
        ctx.bind(z, Binding::Ref(y)).unwrap();

        assert!(matches!(
            ctx.bind(x, Binding::Ref(z)),
            Err(ForwardError::CyclicBinding { ref path }) if path == "X"
        ));
        assert_eq!(ctx.callback_count(z).unwrap(), 0);

        ctx.define("X", TestValue::Int(3)).unwrap();
        assert_eq!(ctx.resolved(z), Some(&TestValue::Int(3)));
    }

    // ========== TEST: grandchild_declared_while_binding ==========
    #[test]
    fn test_grandchild_declared_by_callback_is_bound() {
        // GIVEN X with child a, and an X callback that declares X.a.b
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let a = ctx.child(x, "a").unwrap();
        let log: Recorded = Default::default();
        let sink = Rc::clone(&log);
        ctx.attach(x, Slot::Unit, move |ctx, _, _| {
            let b = ctx.child(a, "b")?;
            ctx.attach(b, Slot::Key("b".into()), record(&sink))
        })
        .unwrap();

        // WHEN X is defined with a.b = 7
        let inner = TestValue::record([("b", TestValue::Int(7))]);
        ctx.define("X", TestValue::record([("a", inner)])).unwrap();

        // THEN X.a.b is bound and its callback fired
        let b = ctx.lookup("X.a.b").unwrap();
        assert_eq!(ctx.resolved(b), Some(&TestValue::Int(7)));
        assert_eq!(
            log.borrow().clone(),
            vec![(Slot::Key("b".into()), TestValue::Int(7))]
        );
        assert!(!ctx.has_pending());
    }

    #[test]
    fn test_grandchild_missing_member_is_reported() {
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let a = ctx.child(x, "a").unwrap();
        ctx.attach(x, Slot::Unit, move |ctx, _, _| ctx.child(a, "nope").map(drop))
            .unwrap();

        let err = ctx
            .define("X", TestValue::record([("a", TestValue::Int(1))]))
            .unwrap_err();

        assert!(matches!(err, ForwardError::MissingMember { ref member, .. } if member == "nope"));
        assert!(ctx.is_bound(a).unwrap());
    }

    #[test]
    fn test_failing_callback_does_not_stop_others() {
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let log: Recorded = Default::default();
        ctx.attach(x, Slot::Index(0), |_, _, _| Err(ForwardError::callback("boom")))
            .unwrap();
        ctx.attach(x, Slot::Index(1), record(&log)).unwrap();

        let err = ctx.define("X", TestValue::Int(1)).unwrap_err();

        assert!(matches!(err, ForwardError::Callback { .. }));
        assert_eq!(log.borrow().len(), 1);
        assert!(ctx.is_bound(x).unwrap());
    }

    #[test]
    fn test_callback_can_declare_more_references() {
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        ctx.attach(x, Slot::Unit, |ctx, _, _| {
            let y = ctx.reference("Y")?;
            ctx.bind(y, Binding::Value(TestValue::Int(7)))
        })
        .unwrap();

        ctx.define("X", TestValue::Int(1)).unwrap();

        let y = ctx.lookup("Y").unwrap();
        assert_eq!(ctx.resolved(y), Some(&TestValue::Int(7)));
    }

    #[test]
    fn test_define_named() {
        let mut ctx = ForwardContext::new();
        let r = ctx.reference_for("Widget").unwrap();
        ctx.define_named(TestValue::Str("Widget".into())).unwrap();
        assert!(ctx.is_bound(r).unwrap());
    }

    #[test]
    fn test_release_requires_no_pending() {
        let mut ctx = ForwardContext::new();
        let x = ctx.reference("X").unwrap();
        let a = ctx.child(x, "a").unwrap();
        let log: Recorded = Default::default();
        ctx.attach(a, Slot::Unit, record(&log)).unwrap();

        assert!(matches!(
            ctx.release(x),
            Err(ForwardError::StillPending { ref path }) if path == "X.a"
        ));

        ctx.define("X", TestValue::record([("a", TestValue::Int(0))]))
            .unwrap();
        ctx.release(x).unwrap();

        assert_eq!(ctx.lookup("X"), None);
        assert!(matches!(ctx.name(a), Err(ForwardError::UnknownReference(_))));
        // The name is free again.
        ctx.reference("X").unwrap();
    }
}
