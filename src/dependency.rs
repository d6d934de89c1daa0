use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use tracing::trace;

use crate::arguments::{Arguments, BoundArguments};
use crate::cache::MemoTable;
use crate::context::FlowContext;
use crate::error::{FlowError, Owner};
use crate::flow::Flow;
use crate::invoker::Call;
use crate::run::RunId;
use crate::signature::{Parameter, Signature};
use crate::value::{Fingerprint, Value};

/// The body of a flow or flow function.
///
/// Implemented for every async closure taking a [`Call`] and returning
/// `Result<T, FlowError>`, which is how bodies are normally written.
#[async_trait::async_trait]
pub trait Invocable: Send + Sync {
    async fn invoke(&self, call: Call) -> Result<Value, FlowError>;
}

#[async_trait::async_trait]
impl<F, Fut, T> Invocable for F
where
    F: Fn(Call) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, FlowError>> + Send + 'static,
    T: Any + Send + Sync,
{
    async fn invoke(&self, call: Call) -> Result<Value, FlowError> {
        (self)(call).await.map(Value::opaque)
    }
}

/// A typed leaf value that can stand wherever a dependency is expected.
///
/// Invoking a leaf argument simply returns its value.  The value is either given up front, as a
/// default, or supplied by the caller of a flow, which binds a fresh argument carrying it into
/// that one invocation's context.
///
/// ```
/// use flow_compose::Argument;
///
/// let greeting = Argument::with_default(String::from("Hello World!"));
/// assert!(greeting.value().is_some());
/// assert!(Argument::new::<String>().value().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Argument {
    type_id: TypeId,
    type_name: &'static str,
    value: Option<Value>,
}
impl Argument {
    pub fn new<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            value: None,
        }
    }

    pub fn with_default<T: Any + Hash + Eq + fmt::Debug + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            value: Some(Value::new(value)),
        }
    }

    /// An argument of the same type as `value`, holding it.
    pub fn from_value(value: Value) -> Self {
        Self {
            type_id: value.type_id(),
            type_name: value.type_name(),
            value: Some(value),
        }
    }

    /// The same argument, holding `value` instead.
    pub fn bind(&self, name: &str, value: Value) -> Result<Self, FlowError> {
        if value.type_id() != self.type_id {
            return Err(FlowError::TypeMismatch {
                name: String::from(name),
                expected: self.type_name,
                found: value.type_name(),
            });
        }
        Ok(Self {
            value: Some(value),
            ..self.clone()
        })
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

/// Something that can be configured into a flow: a flow function, a flow, or a leaf argument.
///
/// Dependencies are shared, so cloning one is cheap, and two dependencies are equal only if they
/// are clones of each other.  A cached dependency keeps its memoized results here, partitioned by
/// the top-level run and the flow context they were computed in.
#[derive(Clone)]
pub struct Dependency(Arc<Descriptor>);

struct Descriptor {
    name: String,
    cached: bool,
    kind: Kind,
    memo: MemoTable,
}

enum Kind {
    Function {
        signature: Signature,
        body: Arc<dyn Invocable>,
    },
    Flow(Flow),
    Argument(Argument),
}

impl Dependency {
    fn from_kind(name: String, cached: bool, kind: Kind) -> Self {
        Self(Arc::new(Descriptor {
            name,
            cached,
            kind,
            memo: MemoTable::new(),
        }))
    }

    pub(crate) fn flow(flow: Flow, cached: bool) -> Self {
        Self::from_kind(String::from(flow.name()), cached, Kind::Flow(flow))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_cached(&self) -> bool {
        self.0.cached
    }

    pub fn is_argument(&self) -> bool {
        matches!(self.0.kind, Kind::Argument(_))
    }

    pub fn as_argument(&self) -> Option<&Argument> {
        match &self.0.kind {
            Kind::Argument(argument) => Some(argument),
            _ => None,
        }
    }

    /// False only for a leaf argument that has no value yet.
    pub fn is_resolvable(&self) -> bool {
        self.as_argument().map_or(true, |argument| argument.value().is_some())
    }

    /// How many results are memoized for `run`.
    pub fn memoized(&self, run: RunId) -> usize {
        self.0.memo.len(run)
    }

    pub(crate) fn invalidate(&self, run: RunId) -> usize {
        self.0.memo.invalidate(run)
    }

    /// Invokes the dependency bound under `name` against `context`, consulting and filling its
    /// memo table when it is cached.
    pub(crate) async fn invoke(
        &self,
        name: &str,
        arguments: Arguments,
        context: &FlowContext,
    ) -> Result<Value, FlowError> {
        let bound = match &self.0.kind {
            Kind::Argument(argument) => return leaf(name, argument, arguments, context),
            Kind::Function { signature, .. } => {
                arguments.bind(self.name(), signature.ordinary(), &[], |_| false)?
            }
            Kind::Flow(flow) => flow.bind(arguments)?,
        };
        if !self.0.cached {
            return self.execute(bound, context).await;
        }

        let fingerprint = Fingerprint::of(bound.iter()).map_err(|argument| {
            FlowError::Unfingerprintable {
                function: String::from(self.name()),
                argument,
            }
        })?;
        let run = context.run();
        if let Some(value) = self.0.memo.get(run.id(), context.id(), &fingerprint) {
            trace!(
                dependency = %self.name(),
                run = %run.id(),
                context = %context.id(),
                "cache hit"
            );
            return Ok(value);
        }
        trace!(
            dependency = %self.name(),
            run = %run.id(),
            context = %context.id(),
            "cache miss"
        );
        let value = self.execute(bound, context).await?;
        run.track(self);
        Ok(self.0.memo.insert(run.id(), context.id(), fingerprint, value))
    }

    async fn execute(
        &self,
        bound: BoundArguments,
        context: &FlowContext,
    ) -> Result<Value, FlowError> {
        match &self.0.kind {
            Kind::Function { signature, body } => {
                let resolved = resolve(signature, context)?;
                body.invoke(Call::new(self.name(), bound, resolved, context.clone()))
                    .await
            }
            Kind::Flow(flow) => flow.execute(bound, Some(context)).await,
            Kind::Argument(argument) => leaf(self.name(), argument, Arguments::new(), context),
        }
    }
}

/// The value of a leaf argument bound under `name`.  Leaves take no arguments, and one that is
/// still unvalued when invoked counts as a missing argument of the flow it was bound in.
fn leaf(
    name: &str,
    argument: &Argument,
    arguments: Arguments,
    context: &FlowContext,
) -> Result<Value, FlowError> {
    if !arguments.is_empty() {
        return Err(FlowError::TooManyArguments {
            function: String::from(name),
            expected: 0,
            given: arguments.len(),
        });
    }
    argument.value().cloned().ok_or_else(|| FlowError::MissingArgument {
        function: String::from(context.flow()),
        argument: String::from(name),
    })
}

/// Resolves the dependency parameters of a flow function: whatever the context binds under the
/// parameter's name, else the parameter's default descriptor.  Fails naming every parameter that
/// neither provides.
fn resolve(
    signature: &Signature,
    context: &FlowContext,
) -> Result<HashMap<String, Dependency>, FlowError> {
    let mut resolved = HashMap::new();
    let mut missing = Vec::new();
    for parameter in signature.dependencies() {
        let dependency = context
            .lookup(parameter.name())
            .filter(Dependency::is_resolvable)
            .or_else(|| {
                parameter
                    .default_dependency_ref()
                    .filter(|dependency| dependency.is_resolvable())
                    .cloned()
            });
        match dependency {
            Some(dependency) => {
                resolved.insert(String::from(parameter.name()), dependency);
            }
            None => missing.push(String::from(parameter.name())),
        }
    }
    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(FlowError::MissingDependencies {
            owner: Owner::Function(String::from(signature.owner())),
            names: missing,
        })
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for Dependency {}
impl Hash for Dependency {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}
impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.0.kind {
            Kind::Function { .. } => "function",
            Kind::Flow(_) => "flow",
            Kind::Argument(_) => "argument",
        };
        f.debug_struct("Dependency")
            .field("name", &self.0.name)
            .field("kind", &kind)
            .field("cached", &self.0.cached)
            .finish()
    }
}
impl From<Argument> for Dependency {
    fn from(argument: Argument) -> Self {
        Self::from_kind(String::from(argument.type_name), false, Kind::Argument(argument))
    }
}
impl From<&Dependency> for Dependency {
    fn from(dependency: &Dependency) -> Self {
        dependency.clone()
    }
}

/// Starts declaring a flow function: a dependency backed by an async body.
///
/// ```
/// use flow_compose::{declare_dependency, Call, FlowError, Parameter};
///
/// let greeting = declare_dependency("greeting")
///     .cached(true)
///     .parameter(Parameter::value::<i32>("index"))
///     .build(|call: Call| async move {
///         let index = call.argument::<i32>("index")?;
///         Ok::<_, FlowError>(format!("Hello World! - {}", index))
///     })
///     .unwrap();
/// assert!(greeting.is_cached());
/// ```
pub fn declare_dependency(name: impl Into<String>) -> DependencyBuilder {
    DependencyBuilder {
        name: name.into(),
        cached: false,
        parameters: Vec::new(),
    }
}

pub struct DependencyBuilder {
    name: String,
    cached: bool,
    parameters: Vec<Parameter>,
}
impl DependencyBuilder {
    /// Whether results are memoized per argument fingerprint within a top-level run.
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn build<B: Invocable + 'static>(self, body: B) -> Result<Dependency, FlowError> {
        let signature = Signature::classify(self.name.clone(), self.parameters)?;
        Ok(Dependency::from_kind(
            self.name,
            self.cached,
            Kind::Function {
                signature,
                body: Arc::new(body),
            },
        ))
    }
}
