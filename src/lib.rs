//! Composes async functions into flows by injecting their dependencies.
//!
//! A flow function declares what it depends on as typed parameters.  A flow binds names to
//! concrete dependencies in its configuration, and every time the flow is invoked those
//! dependencies are resolved into a fresh [`FlowContext`] and handed to the function body as
//! lazily-invocable handles.  Nothing runs until a body invokes a handle, and cached
//! dependencies run at most once per argument fingerprint within a top-level invocation.
mod arguments;
mod cache;
mod context;
mod dependency;
mod error;
mod flow;
mod invoker;
mod run;
mod signature;
mod value;

pub use arguments::Arguments;
pub use context::{ContextId, FlowContext};
pub use dependency::{declare_dependency, Argument, Dependency, DependencyBuilder, Invocable};
pub use error::{FlowError, Owner};
pub use flow::{declare_flow, Configuration, Flow, FlowBuilder};
pub use invoker::{Call, FlowArgument, FlowFunction, Invoker};
pub use run::{RunId, RunScope};
pub use signature::{Declared, Parameter, ParameterClass, ParameterDefault, Signature};
pub use value::Value;

/// Defines a flow function: a dependency backed by a function, usable in the configuration of
/// any flow.
///
/// # Parameters
///
/// The parameters of a flow function are either ordinary or dependencies, decided by type:
///
/// * `FlowFunction<T>` -- A [`FlowFunction`] handle on the dependency of the same name, which
/// returns a `T` when called.
/// * `FlowArgument<T>` -- A [`FlowArgument`] handle on a leaf argument of the same name.  A leaf
/// argument is a plain value, supplied by the caller of the flow or configured as an
/// [`Argument`].
/// * Anything else -- An ordinary argument, supplied by whoever invokes the flow function.
///
/// Dependencies are resolved when the flow function is invoked: whatever the flow context binds
/// under the parameter's name, else the parameter's `#[default(...)]`.  Ordinary parameters must
/// all come before the dependency parameters.
///
/// # Caching
///
/// A cached flow function runs at most once per distinct set of argument values within one
/// top-level flow invocation.  Calling it positionally or by name makes no difference, and
/// defaults count as passed.  The next top-level invocation starts with an empty cache.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use flow_compose::{flow, flow_function, Arguments, FlowError, FlowFunction};
///
/// static CALLS: AtomicUsize = AtomicUsize::new(0);
///
/// #[flow_function(cached)]
/// async fn greeting_hello_world() -> String {
///     CALLS.fetch_add(1, Ordering::SeqCst);
///     String::from("Hello, World!")
/// }
///
/// #[flow(greeting = greeting_hello_world())]
/// async fn greet_twice(greeting: FlowFunction<String>) -> Result<String, FlowError> {
///     Ok(format!("{} {}", greeting.call().await?, greeting.call().await?))
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let greeting: String = greet_twice().call(Arguments::new()).await.unwrap();
/// assert_eq!(greeting, "Hello, World! Hello, World!");
/// assert_eq!(CALLS.load(Ordering::SeqCst), 1);
/// # });
/// ```
///
/// # Blocking Versus Non-Blocking
///
/// Flows are built on `tokio`, so flow functions are invoked as async functions.  If a regular
/// function is passed into the `flow_function` macro, it is assumed to be blocking and runs on
/// tokio's blocking thread pool, where its dependencies are called with
/// [`FlowFunction::blocking_call`].  Use `async fn` wherever possible.
///
/// ```
/// use flow_compose::{flow, flow_function, Arguments, FlowError, FlowFunction};
///
/// #[flow_function]
/// fn shout(greeting: FlowFunction<String>) -> Result<String, FlowError> {
///     Ok(greeting.blocking_call()?.to_uppercase())
/// }
///
/// #[flow_function]
/// async fn greeting_hello_world() -> String {
///     String::from("Hello, World!")
/// }
///
/// #[flow(greeting = greeting_hello_world(), shout = shout())]
/// async fn hello_world(shout: FlowFunction<String>) -> Result<String, FlowError> {
///     shout.call().await
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let greeting: String = hello_world().call(Arguments::new()).await.unwrap();
/// assert_eq!(greeting, "HELLO, WORLD!");
/// # });
/// ```
#[cfg(feature = "macros")]
pub use flow_compose_macros::flow_function;

/// Defines a flow: a function whose dependencies are bound from a configuration every time it
/// is invoked.
///
/// The attribute lists the configuration as `name = dependency` entries, where a dependency is
/// anything convertible into a [`Dependency`]: a flow function, another [`Flow`], or an
/// [`Argument`].  The flow's parameters are declared as for
/// [`flow_function`](macro@flow_function).
///
/// # Public Signature
///
/// The generated function returns the [`Flow`], which is invoked with [`Arguments`].  What a
/// caller may pass, positionally or by name:
///
/// * Leaf arguments configured without a value, that are not parameters of the flow, first.
/// * The ordinary parameters and leaf-argument parameters, in declared order.
/// * Leaf arguments configured with a value, that are not parameters of the flow, last.
///
/// Dependency parameters can additionally be overridden by name, with a value of the type the
/// dependency returns or with another [`Dependency`].  What is passed at call time takes
/// precedence over the configuration, which takes precedence over parameter defaults.
///
/// ```
/// use flow_compose::{
///     flow, flow_function, Argument, Arguments, FlowArgument, FlowError, FlowFunction,
/// };
///
/// #[flow_function]
/// async fn greeting_hello_world() -> String {
///     String::from("Hello, World!")
/// }
///
/// #[flow_function]
/// async fn greet_user(
///     greeting: FlowFunction<String>,
///     user: FlowArgument<String>,
/// ) -> Result<String, FlowError> {
///     Ok(format!("{} - {}", greeting.call().await?, user.value().await?))
/// }
///
/// #[flow(
///     greeting = greeting_hello_world(),
///     greet = greet_user(),
///     user = Argument::new::<String>(),
/// )]
/// async fn hello_user(greet: FlowFunction<String>) -> Result<String, FlowError> {
///     greet.call().await
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let greeting: String = hello_user()
///     .call(Arguments::new().named("user", String::from("Ferris")))
///     .await
///     .unwrap();
/// assert_eq!(greeting, "Hello, World! - Ferris");
///
/// let greeting: String = hello_user()
///     .call(
///         Arguments::new()
///             .arg(String::from("Ferris"))
///             .named("greet", String::from("Hi!")),
///     )
///     .await
///     .unwrap();
/// assert_eq!(greeting, "Hi!");
/// # });
/// ```
///
/// # Composition
///
/// A flow is itself a dependency, so flows nest.  A nested flow binds its own configuration into
/// its own context, but shares the top-level invocation, and with it the cached results, of the
/// flow that invokes it.
#[cfg(feature = "macros")]
pub use flow_compose_macros::flow;

#[doc(hidden)]
pub mod __private {
    pub use crate::invoker::spawn_blocking;
    pub use once_cell::sync::OnceCell;
}
