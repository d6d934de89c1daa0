//! See the [flow-compose](https://docs.rs/flow-compose) documentation for details about the
//! macros contained in this crate.
mod dependency;
mod flow;
mod funcutils;

use crate::dependency::{flow_function_impl, FunctionOptions};
use crate::flow::{flow_impl, FlowOptions};
use proc_macro::TokenStream;
use syn::{parse_macro_input, ItemFn};

/// Turns a function into a flow function: a dependency that flows can be configured with.
///
/// The annotated function is replaced by a function of the same name, taking no arguments and
/// returning its [`Dependency`](../flow_compose/struct.Dependency.html).  Calling it more than
/// once returns the same dependency every time.
///
/// # Parameters
///
/// Parameters are registered by name, in order, according to their type:
///
/// * `FlowFunction<T>` -- A dependency returning `T`, resolved from the flow context.
/// * `FlowArgument<T>` -- A leaf argument of type `T`, resolved from the flow context or supplied
/// by the caller of the flow.
/// * Anything else -- An ordinary parameter, supplied by whoever invokes the flow function.
///
/// Ordinary parameters must all come before the dependency parameters.  A `#[default(expr)]`
/// attribute gives a parameter its default: a value for ordinary parameters, a dependency for
/// the others.
///
/// # Caching
///
/// `#[flow_function(cached)]` memoizes results by the values of the ordinary arguments, for
/// as long as the top-level flow invocation they were computed in.  Arguments of a cached flow
/// function must be `Hash + Eq + Debug`.
///
/// # Blocking Versus Non-Blocking
///
/// If a regular function is passed into the `flow_function` macro, it is assumed to be blocking
/// and runs on tokio's blocking thread pool.  Use `blocking_call` on its `FlowFunction`
/// parameters.  Use `async fn` wherever possible.
///
/// # Examples
/// ```ignore
/// use flow_compose::{flow_function, FlowError, FlowFunction};
///
/// #[flow_function(cached)]
/// async fn greeting_hello_world() -> String {
///     String::from("Hello, World!")
/// }
///
/// #[flow_function]
/// async fn greet(index: i32, greeting: FlowFunction<String>) -> Result<String, FlowError> {
///     Ok(format!("{} - {}", greeting.call().await?, index))
/// }
/// ```
///
/// # See Also
/// * [`flow`](macro@flow) -- Macro for wiring flow functions into a flow.
#[proc_macro_attribute]
pub fn flow_function(args: TokenStream, func: TokenStream) -> TokenStream {
    let options = parse_macro_input!(args as FunctionOptions);
    TokenStream::from(flow_function_impl(options, parse_macro_input!(func as ItemFn)))
}

/// Turns a function into a flow, configured with the dependencies named in the attribute.
///
/// The annotated function is replaced by a function of the same name, taking no arguments and
/// returning its [`Flow`](../flow_compose/struct.Flow.html).  Parameters are declared as for
/// [`flow_function`](macro@flow_function).
///
/// # Configuration
///
/// Each `name = expr` entry binds the dependency `expr` under `name` every time the flow is
/// invoked.  Configured leaf arguments that are not parameters of the flow become part of its
/// public signature, so callers can supply them.  `cached` makes the flow memoize its results
/// when it is used as a dependency of another flow.
///
/// # Examples
/// ```ignore
/// use flow_compose::{
///     flow, flow_function, Argument, Arguments, FlowArgument, FlowError, FlowFunction,
/// };
///
/// #[flow_function]
/// async fn greeting_hello_world() -> String {
///     String::from("Hello, World!")
/// }
///
/// #[flow(greeting = greeting_hello_world(), punctuation = Argument::with_default('!'))]
/// async fn hello_world(
///     greeting: FlowFunction<String>,
///     punctuation: FlowArgument<char>,
/// ) -> Result<String, FlowError> {
///     Ok(format!("{}{}", greeting.call().await?, punctuation.value().await?))
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let greeting: String = hello_world().call(Arguments::new()).await.unwrap();
/// assert_eq!(greeting, "Hello, World!!");
/// # });
/// ```
#[proc_macro_attribute]
pub fn flow(args: TokenStream, func: TokenStream) -> TokenStream {
    let options = parse_macro_input!(args as FlowOptions);
    TokenStream::from(flow_impl(options, parse_macro_input!(func as ItemFn)))
}
