use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::arguments::{Arguments, BoundArguments};
use crate::context::FlowContext;
use crate::dependency::{Argument, Dependency, Invocable};
use crate::error::{FlowError, Owner};
use crate::invoker::Call;
use crate::run::RunScope;
use crate::signature::{Declared, Parameter, ParameterClass, Signature};
use crate::value::Value;

/// Names mapped to the dependencies a flow binds into every context it creates.
///
/// Entries keep the order they were configured in.  A name configured twice makes every
/// invocation of the flow fail with [`FlowError::AlreadyDefined`].
#[derive(Debug, Clone, Default)]
pub struct Configuration(Vec<(String, Dependency)>);
impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, dependency: impl Into<Dependency>) -> Self {
        self.insert(name, dependency);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, dependency: impl Into<Dependency>) {
        self.0.push((name.into(), dependency.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.0
            .iter()
            .find(|(configured, _)| configured == name)
            .map(|(_, dependency)| dependency)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Dependency)> {
        self.0.iter().map(|(name, dependency)| (name.as_str(), dependency))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
impl<N: Into<String>, D: Into<Dependency>> FromIterator<(N, D)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (N, D)>>(entries: I) -> Self {
        let mut configuration = Self::new();
        for (name, dependency) in entries {
            configuration.insert(name, dependency);
        }
        configuration
    }
}

/// Starts declaring a flow: a function whose dependencies are resolved from a configuration
/// every time it is invoked.
///
/// ```
/// use flow_compose::{declare_dependency, declare_flow, Arguments, Call, FlowError, Parameter};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let greeting = declare_dependency("greeting_hello_world")
///     .build(|_: Call| async { Ok::<_, FlowError>(String::from("Hello, World!")) })
///     .unwrap();
///
/// let hello_world = declare_flow("hello_world")
///     .configure("greeting", greeting)
///     .parameter(Parameter::dependency::<String>("greeting"))
///     .build(|call: Call| async move { call.dependency::<String>("greeting")?.call().await })
///     .unwrap();
///
/// let greeting: String = hello_world.call(Arguments::new()).await.unwrap();
/// assert_eq!(greeting, "Hello, World!");
/// # });
/// ```
pub fn declare_flow(name: impl Into<String>) -> FlowBuilder {
    FlowBuilder {
        name: name.into(),
        cached: false,
        configuration: Configuration::new(),
        parameters: Vec::new(),
    }
}

pub struct FlowBuilder {
    name: String,
    cached: bool,
    configuration: Configuration,
    parameters: Vec<Parameter>,
}
impl FlowBuilder {
    /// Whether the flow memoizes its results when used as a dependency of another flow.
    pub fn cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn configure(mut self, name: impl Into<String>, dependency: impl Into<Dependency>) -> Self {
        self.configuration.insert(name, dependency);
        self
    }

    pub fn configuration(mut self, configuration: Configuration) -> Self {
        self.configuration = configuration;
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Classifies the parameters, validates the configuration against them and computes the
    /// public signature of the flow.
    pub fn build<B: Invocable + 'static>(self, body: B) -> Result<Flow, FlowError> {
        let FlowBuilder {
            name,
            cached,
            configuration,
            parameters,
        } = self;
        let signature = Signature::classify(name.clone(), parameters)?;
        if let Some(parameter) = signature
            .ordinary()
            .iter()
            .find(|parameter| configuration.contains(parameter.name()))
        {
            return Err(FlowError::NonDependencyConfigured {
                flow: name,
                parameter: String::from(parameter.name()),
            });
        }

        let mut auxiliary = Vec::new();
        let mut required = Vec::new();
        let mut defaulted = Vec::new();
        for (configured, dependency) in configuration.iter() {
            if signature.contains(configured) {
                continue;
            }
            if let Some(argument) = dependency.as_argument() {
                let parameter = Parameter::leaf(
                    configured,
                    argument.type_id(),
                    argument.type_name(),
                    argument.value().cloned(),
                );
                if argument.value().is_some() {
                    defaulted.push(parameter);
                } else {
                    required.push(parameter);
                }
                auxiliary.push((String::from(configured), argument.clone()));
            }
        }

        let mut public = required;
        for parameter in signature.parameters() {
            match parameter.class() {
                ParameterClass::Ordinary => public.push(parameter.clone()),
                ParameterClass::Argument => public.push(public_leaf(parameter, &configuration)),
                ParameterClass::Dependency => {}
            }
        }
        public.extend(defaulted);

        let overridable = signature
            .dependencies()
            .iter()
            .filter(|parameter| parameter.class() == ParameterClass::Dependency)
            .map(|parameter| String::from(parameter.name()))
            .collect();

        Ok(Flow(Arc::new(FlowInner {
            name,
            cached,
            signature,
            configuration,
            public,
            auxiliary,
            overridable,
            body: Arc::new(body),
        })))
    }
}

/// The public form of a leaf-argument parameter: its configured value, if any, pre-bound as a
/// concrete default, else the value of its declared default.  A leaf configured with anything
/// but an argument has no default, so that the configured dependency is what resolves it.
fn public_leaf(parameter: &Parameter, configuration: &Configuration) -> Parameter {
    let entry = configuration.get(parameter.name());
    if entry.map_or(false, |dependency| !dependency.is_argument()) {
        return Parameter::leaf(parameter.name(), parameter.type_id(), parameter.type_name(), None);
    }
    let configured = entry.and_then(Dependency::as_argument);
    let (type_id, type_name) = configured.map_or(
        (parameter.type_id(), parameter.type_name()),
        |argument| (argument.type_id(), argument.type_name()),
    );
    let default = configured
        .and_then(Argument::value)
        .or_else(|| {
            parameter
                .default_dependency_ref()
                .and_then(Dependency::as_argument)
                .and_then(Argument::value)
        })
        .or_else(|| parameter.default_value_ref())
        .cloned();
    Parameter::leaf(parameter.name(), type_id, type_name, default)
}

/// A flow ready to be invoked, either directly or as a dependency of another flow.
#[derive(Clone)]
pub struct Flow(Arc<FlowInner>);

struct FlowInner {
    name: String,
    cached: bool,
    signature: Signature,
    configuration: Configuration,
    /// Auxiliary leaf arguments without a value first, then ordinary and leaf-argument
    /// parameters in declared order, then auxiliary leaf arguments with a value.
    public: Vec<Parameter>,
    /// Configured leaf arguments that are not declared parameters.
    auxiliary: Vec<(String, Argument)>,
    /// Dependency parameters that a caller may override by name.
    overridable: Vec<String>,
    body: Arc<dyn Invocable>,
}

impl Flow {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn is_cached(&self) -> bool {
        self.0.cached
    }

    pub fn signature(&self) -> &Signature {
        &self.0.signature
    }

    pub fn configuration(&self) -> &Configuration {
        &self.0.configuration
    }

    /// The parameters a caller can supply, positionally or by name.  Dependency parameters may
    /// additionally be overridden by name.
    pub fn public_parameters(&self) -> &[Parameter] {
        &self.0.public
    }

    /// This flow as a dependency of another flow, with or without memoized results.
    pub fn as_dependency(&self, cached: bool) -> Dependency {
        Dependency::flow(self.clone(), cached)
    }

    /// Invokes the flow as a top-level run.
    #[instrument(skip_all, fields(flow = %self.name()))]
    pub async fn invoke(&self, arguments: Arguments) -> Result<Value, FlowError> {
        let bound = self.bind(arguments)?;
        self.execute(bound, None).await
    }

    pub async fn call<T: Any + Clone>(&self, arguments: Arguments) -> Result<T, FlowError> {
        let value = self.invoke(arguments).await?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| FlowError::TypeMismatch {
                name: self.0.name.clone(),
                expected: type_name::<T>(),
                found: value.type_name(),
            })
    }

    pub(crate) fn bind(&self, arguments: Arguments) -> Result<BoundArguments, FlowError> {
        let overridable: Vec<&str> = self.0.overridable.iter().map(String::as_str).collect();
        arguments.bind(&self.0.name, &self.0.public, &overridable, |parameter| {
            parameter.declared() == Declared::Argument
        })
    }

    /// Runs the flow with already bound arguments.  Without a `parent` this is a top-level run:
    /// it gets a fresh run scope, and the results cached during it are dropped once it returns.
    pub(crate) async fn execute(
        &self,
        bound: BoundArguments,
        parent: Option<&FlowContext>,
    ) -> Result<Value, FlowError> {
        let run = parent.map_or_else(RunScope::begin, |parent| parent.run().clone());
        let result = self.run(bound, parent, run.clone()).await;
        if parent.is_none() {
            run.finish();
        }
        result
    }

    async fn run(
        &self,
        bound: BoundArguments,
        parent: Option<&FlowContext>,
        run: RunScope,
    ) -> Result<Value, FlowError> {
        let inner = &self.0;
        debug!(flow = %inner.name, run = %run.id(), nested = parent.is_some(), "invoking flow");
        let context = FlowContext::new(inner.name.clone(), run);
        for (name, dependency) in inner.configuration.iter() {
            context.bind(name, dependency.clone())?;
        }

        let mut missing = Vec::new();
        for parameter in inner.signature.dependencies() {
            let name = parameter.name();
            if let Some(value) = bound.get(name) {
                trace!(flow = %inner.name, dependency = %name, "binding call-time value");
                context.rebind(name, call_time_dependency(parameter, value)?);
                continue;
            }
            if context.lookup(name).map_or(false, |bound| bound.is_resolvable()) {
                continue;
            }
            let fallback = parameter
                .default_dependency_ref()
                .filter(|dependency| dependency.is_resolvable())
                .cloned()
                .or_else(|| match (parameter.class(), parent) {
                    (ParameterClass::Argument, Some(parent)) => {
                        parent.lookup(name).filter(Dependency::is_resolvable)
                    }
                    _ => None,
                });
            match fallback {
                Some(dependency) => context.rebind(name, dependency),
                None => missing.push(String::from(name)),
            }
        }
        for (name, argument) in inner.auxiliary.iter() {
            match bound.get(name) {
                Some(value) => {
                    context.rebind(name, Dependency::from(argument.bind(name, value.clone())?))
                }
                None if argument.value().is_none() => missing.push(name.clone()),
                None => {}
            }
        }
        if !missing.is_empty() {
            return Err(FlowError::MissingDependencies {
                owner: Owner::Flow(inner.name.clone()),
                names: missing,
            });
        }

        let dependencies: HashMap<String, Dependency> = inner
            .signature
            .dependencies()
            .iter()
            .filter_map(|parameter| {
                context
                    .lookup(parameter.name())
                    .map(|dependency| (String::from(parameter.name()), dependency))
            })
            .collect();
        let ordinary = inner.signature.ordinary();
        let arguments =
            bound.retain(|name| ordinary.iter().any(|parameter| parameter.name() == name));
        inner
            .body
            .invoke(Call::new(&inner.name, arguments, dependencies, context))
            .await
    }
}
impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.0.name)
            .field("cached", &self.0.cached)
            .field("public", &self.0.public)
            .field("configuration", &self.0.configuration)
            .finish()
    }
}
impl From<Flow> for Dependency {
    fn from(flow: Flow) -> Self {
        let cached = flow.is_cached();
        Dependency::flow(flow, cached)
    }
}
impl From<&Flow> for Dependency {
    fn from(flow: &Flow) -> Self {
        Dependency::from(flow.clone())
    }
}

/// What a value supplied at call time for a dependency parameter is bound as: the dependency
/// itself if one was passed, else a leaf argument holding the value.
fn call_time_dependency(parameter: &Parameter, value: &Value) -> Result<Dependency, FlowError> {
    if let Some(dependency) = value.downcast_ref::<Dependency>() {
        return Ok(dependency.clone());
    }
    if parameter.class() == ParameterClass::Dependency {
        parameter.check(value)?;
    }
    Ok(Dependency::from(Argument::from_value(value.clone())))
}
