use std::any::{type_name, Any};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::task::{self, JoinHandle};

use crate::arguments::{Arguments, BoundArguments};
use crate::context::FlowContext;
use crate::dependency::Dependency;
use crate::error::FlowError;
use crate::value::Value;

/// A dependency bound to the flow context it was resolved from.
///
/// Nothing runs until the handle is invoked, so a dependency that a body never calls is never
/// executed.
#[derive(Clone)]
pub struct Invoker {
    name: String,
    dependency: Dependency,
    context: FlowContext,
}
impl Invoker {
    pub(crate) fn new(name: &str, dependency: Dependency, context: FlowContext) -> Self {
        Self {
            name: String::from(name),
            dependency,
            context,
        }
    }

    /// The name the dependency is bound under.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    pub fn context(&self) -> &FlowContext {
        &self.context
    }

    pub async fn invoke(&self, arguments: Arguments) -> Result<Value, FlowError> {
        self.dependency.invoke(&self.name, arguments, &self.context).await
    }

    fn downcast<T: Any + Clone>(&self, value: Value) -> Result<T, FlowError> {
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| FlowError::TypeMismatch {
                name: self.name.clone(),
                expected: type_name::<T>(),
                found: value.type_name(),
            })
    }

    /// Drives `future` to completion from synchronous code.
    ///
    /// On a multi-thread runtime the calling thread is handed over with `block_in_place` first.
    /// A current-thread runtime can only be blocked on from a body running on the blocking pool;
    /// anywhere else the one runtime thread would block on itself.
    fn block_on<T>(
        &self,
        future: impl Future<Output = Result<T, FlowError>>,
    ) -> Result<T, FlowError> {
        let handle = Handle::try_current().map_err(|_| FlowError::NoRuntime {
            function: self.name.clone(),
        })?;
        match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => {
                let _blocking = BlockingBody::suspend().ok_or_else(|| FlowError::BlockedRuntime {
                    function: self.name.clone(),
                })?;
                handle.block_on(future)
            }
            _ => task::block_in_place(|| handle.block_on(future)),
        }
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("name", &self.name)
            .field("dependency", &self.dependency)
            .field("flow", &self.context.flow())
            .finish()
    }
}

thread_local! {
    static IN_BLOCKING_BODY: Cell<bool> = Cell::new(false);
}

/// Marks the current thread as running a blocking body for as long as the body runs.
struct BlockingBody;
impl BlockingBody {
    fn enter() -> Self {
        IN_BLOCKING_BODY.with(|flag| flag.set(true));
        Self
    }

    /// Clears the mark while the body blocks on the runtime, since the futures driven there run
    /// in an async context again.  `None` if the thread is not running a blocking body.
    fn suspend() -> Option<Suspended> {
        IN_BLOCKING_BODY.with(|flag| flag.replace(false)).then_some(Suspended)
    }
}
impl Drop for BlockingBody {
    fn drop(&mut self) {
        IN_BLOCKING_BODY.with(|flag| flag.set(false));
    }
}

struct Suspended;
impl Drop for Suspended {
    fn drop(&mut self) {
        IN_BLOCKING_BODY.with(|flag| flag.set(true));
    }
}

/// Runs the body of a non-async flow function on tokio's blocking pool, where its handles may
/// block on the runtime.
#[doc(hidden)]
pub fn spawn_blocking<F, R>(body: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    task::spawn_blocking(move || {
        let _blocking = BlockingBody::enter();
        body()
    })
}

/// Handle on a dependency that returns a `T`.
///
/// This is what a flow or flow function receives for each parameter declared as
/// [`Parameter::dependency`](crate::Parameter::dependency).
pub struct FlowFunction<T> {
    invoker: Invoker,
    output: PhantomData<fn() -> T>,
}
impl<T: Any + Clone + Send + Sync> FlowFunction<T> {
    pub fn new(invoker: Invoker) -> Self {
        Self {
            invoker,
            output: PhantomData,
        }
    }

    /// Invokes the dependency without arguments.
    pub async fn call(&self) -> Result<T, FlowError> {
        self.call_with(Arguments::new()).await
    }

    pub async fn call_with(&self, arguments: Arguments) -> Result<T, FlowError> {
        let value = self.invoker.invoke(arguments).await?;
        self.invoker.downcast(value)
    }

    /// Invokes the dependency from blocking code running inside a tokio runtime, such as the
    /// body of a non-async flow function.  Fails with [`FlowError::BlockedRuntime`] when called
    /// from async code on a current-thread runtime.
    pub fn blocking_call(&self) -> Result<T, FlowError> {
        self.blocking_call_with(Arguments::new())
    }

    pub fn blocking_call_with(&self, arguments: Arguments) -> Result<T, FlowError> {
        self.invoker.block_on(self.call_with(arguments))
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }
}
impl<T> Clone for FlowFunction<T> {
    fn clone(&self) -> Self {
        Self {
            invoker: self.invoker.clone(),
            output: PhantomData,
        }
    }
}
impl<T> fmt::Debug for FlowFunction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FlowFunction").field(&self.invoker).finish()
    }
}

/// Handle on a leaf argument of type `T`, or on whatever dependency was configured in its place.
pub struct FlowArgument<T> {
    invoker: Invoker,
    output: PhantomData<fn() -> T>,
}
impl<T: Any + Clone + Send + Sync> FlowArgument<T> {
    pub fn new(invoker: Invoker) -> Self {
        Self {
            invoker,
            output: PhantomData,
        }
    }

    pub async fn value(&self) -> Result<T, FlowError> {
        let value = self.invoker.invoke(Arguments::new()).await?;
        self.invoker.downcast(value)
    }

    pub fn blocking_value(&self) -> Result<T, FlowError> {
        self.invoker.block_on(self.value())
    }

    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }
}
impl<T> Clone for FlowArgument<T> {
    fn clone(&self) -> Self {
        Self {
            invoker: self.invoker.clone(),
            output: PhantomData,
        }
    }
}
impl<T> fmt::Debug for FlowArgument<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FlowArgument").field(&self.invoker).finish()
    }
}

/// What a flow or flow function body is invoked with: its ordinary arguments, its resolved
/// dependencies and the flow context they were resolved from.
pub struct Call {
    name: String,
    arguments: BoundArguments,
    dependencies: HashMap<String, Dependency>,
    context: FlowContext,
}
impl Call {
    pub(crate) fn new(
        name: &str,
        arguments: BoundArguments,
        dependencies: HashMap<String, Dependency>,
        context: FlowContext,
    ) -> Self {
        Self {
            name: String::from(name),
            arguments,
            dependencies,
            context,
        }
    }

    /// The name of the flow or flow function being invoked.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &FlowContext {
        &self.context
    }

    pub fn value(&self, name: &str) -> Result<&Value, FlowError> {
        self.arguments
            .get(name)
            .ok_or_else(|| FlowError::MissingArgument {
                function: self.name.clone(),
                argument: String::from(name),
            })
    }

    /// The ordinary argument `name`.
    pub fn argument<T: Any + Clone>(&self, name: &str) -> Result<T, FlowError> {
        let value = self.value(name)?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| FlowError::TypeMismatch {
                name: String::from(name),
                expected: type_name::<T>(),
                found: value.type_name(),
            })
    }

    /// A handle on the dependency `name`: the resolved dependency parameter of that name if there
    /// is one, otherwise whatever the flow context binds under it.
    pub fn invoker(&self, name: &str) -> Result<Invoker, FlowError> {
        match self.dependencies.get(name) {
            Some(dependency) => Ok(Invoker::new(name, dependency.clone(), self.context.clone())),
            None => self.context.invoker(name),
        }
    }

    pub fn dependency<T: Any + Clone + Send + Sync>(
        &self,
        name: &str,
    ) -> Result<FlowFunction<T>, FlowError> {
        self.invoker(name).map(FlowFunction::new)
    }

    pub fn flow_argument<T: Any + Clone + Send + Sync>(
        &self,
        name: &str,
    ) -> Result<FlowArgument<T>, FlowError> {
        self.invoker(name).map(FlowArgument::new)
    }
}
impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dependencies: Vec<&String> = self.dependencies.keys().collect();
        dependencies.sort();
        f.debug_struct("Call")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .field("dependencies", &dependencies)
            .field("flow", &self.context.flow())
            .finish()
    }
}
