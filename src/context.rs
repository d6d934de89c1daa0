use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dependency::Dependency;
use crate::error::FlowError;
use crate::invoker::{FlowFunction, Invoker};
use crate::run::RunScope;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one flow context, and so one invocation of one flow, within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);
impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The dependencies bound for one invocation of a flow, by name.
///
/// A fresh context is created every time a flow is invoked and dropped once it returns.  Handles
/// resolved from a context keep a reference to it, so that whatever they invoke resolves its own
/// dependencies against the same context.  The context itself only holds descriptors, never
/// handles, so no reference cycle can form.
#[derive(Clone)]
pub struct FlowContext(Arc<ContextInner>);

struct ContextInner {
    id: ContextId,
    flow: String,
    run: RunScope,
    bindings: RwLock<Bindings>,
}

/// Name to dependency map that remembers insertion order for error messages.
#[derive(Default)]
struct Bindings {
    map: HashMap<String, Dependency>,
    order: Vec<String>,
}
impl Bindings {
    fn insert(&mut self, name: &str, dependency: Dependency) -> Option<Dependency> {
        let previous = self.map.insert(String::from(name), dependency);
        if previous.is_none() {
            self.order.push(String::from(name));
        }
        previous
    }
}

impl FlowContext {
    pub(crate) fn new(flow: impl Into<String>, run: RunScope) -> Self {
        Self(Arc::new(ContextInner {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Relaxed)),
            flow: flow.into(),
            run,
            bindings: RwLock::new(Bindings::default()),
        }))
    }

    pub fn id(&self) -> ContextId {
        self.0.id
    }

    pub fn flow(&self) -> &str {
        &self.0.flow
    }

    pub fn run(&self) -> &RunScope {
        &self.0.run
    }

    /// Binds `dependency` under `name`, which must not be bound yet.
    pub(crate) fn bind(&self, name: &str, dependency: Dependency) -> Result<(), FlowError> {
        let mut bindings = self.0.bindings.write();
        if bindings.map.contains_key(name) {
            return Err(FlowError::AlreadyDefined {
                flow: self.0.flow.clone(),
                name: String::from(name),
            });
        }
        bindings.insert(name, dependency);
        Ok(())
    }

    /// Binds `dependency` under `name`, replacing any earlier binding.
    pub(crate) fn rebind(&self, name: &str, dependency: Dependency) {
        self.0.bindings.write().insert(name, dependency);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.bindings.read().map.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<Dependency> {
        self.0.bindings.read().map.get(name).cloned()
    }

    /// Names bound so far, in binding order.
    pub fn names(&self) -> Vec<String> {
        self.0.bindings.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.0.bindings.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A handle on the dependency bound under `name`.
    pub fn invoker(&self, name: &str) -> Result<Invoker, FlowError> {
        self.lookup(name)
            .map(|dependency| Invoker::new(name, dependency, self.clone()))
            .ok_or_else(|| FlowError::UnknownDependency {
                flow: self.0.flow.clone(),
                name: String::from(name),
            })
    }

    /// A typed handle on the dependency bound under `name`.
    pub fn function<T: Any + Clone + Send + Sync>(
        &self,
        name: &str,
    ) -> Result<FlowFunction<T>, FlowError> {
        self.invoker(name).map(FlowFunction::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::Argument;

    fn context() -> FlowContext {
        FlowContext::new("hello_world", RunScope::begin())
    }

    #[test]
    fn binding_twice_is_an_error() {
        let context = context();
        context
            .bind("greeting", Dependency::from(Argument::with_default(1_i32)))
            .unwrap();
        assert_eq!(
            context
                .bind("greeting", Dependency::from(Argument::with_default(2_i32)))
                .unwrap_err(),
            FlowError::AlreadyDefined {
                flow: String::from("hello_world"),
                name: String::from("greeting"),
            }
        );
    }

    #[test]
    fn rebinding_replaces_and_keeps_order() {
        let context = context();
        let first = Dependency::from(Argument::with_default(1_i32));
        let second = Dependency::from(Argument::with_default(2_i32));
        context.rebind("greet", first);
        context.rebind("greeting", second.clone());
        context.rebind("greet", second.clone());
        assert_eq!(context.names(), vec!["greet", "greeting"]);
        assert_eq!(context.lookup("greet"), Some(second));
    }

    #[test]
    fn every_context_is_distinct() {
        let run = RunScope::begin();
        let outer = FlowContext::new("hello_world", run.clone());
        let nested = FlowContext::new("greet_user", run);
        assert_ne!(outer.id(), nested.id());
        assert_eq!(outer.id(), outer.clone().id());
    }

    #[test]
    fn unknown_names() {
        let context = context();
        assert!(!context.contains("greeting"));
        assert!(context.is_empty());
        assert!(matches!(
            context.invoker("greeting"),
            Err(FlowError::UnknownDependency { .. })
        ));
    }
}
