use std::any::{type_name, Any, TypeId};

use crate::dependency::Dependency;
use crate::error::FlowError;
use crate::value::Value;

/// What a parameter was declared as, before looking at its default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Declared {
    /// A plain runtime value.
    Value,
    /// A [`FlowFunction`](crate::FlowFunction) handle.
    Dependency,
    /// A [`FlowArgument`](crate::FlowArgument) handle.
    Argument,
}

/// Where a parameter ends up once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterClass {
    /// Bound from the call site only.
    Ordinary,
    /// Resolved from the flow context.
    Dependency,
    /// Resolved from the flow context, but may also be supplied as a call-time value.
    Argument,
}

#[derive(Debug, Clone)]
pub enum ParameterDefault {
    Value(Value),
    Dependency(Dependency),
}

/// One declared parameter of a flow or flow function.
///
/// ```
/// use flow_compose::{Argument, Parameter, ParameterClass};
///
/// let index = Parameter::value::<i32>("index");
/// let greeting = Parameter::dependency::<String>("greeting");
/// let name = Parameter::value::<String>("name").default_dependency(Argument::new::<String>());
///
/// assert_eq!(index.class(), ParameterClass::Ordinary);
/// assert_eq!(greeting.class(), ParameterClass::Dependency);
/// assert_eq!(name.class(), ParameterClass::Argument);
/// ```
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    declared: Declared,
    type_id: TypeId,
    type_name: &'static str,
    default: Option<ParameterDefault>,
}
impl Parameter {
    fn new<T: Any>(name: impl Into<String>, declared: Declared) -> Self {
        Self {
            name: name.into(),
            declared,
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            default: None,
        }
    }

    pub fn value<T: Any>(name: impl Into<String>) -> Self {
        Self::new::<T>(name, Declared::Value)
    }

    /// A dependency parameter whose dependency returns a `T`.
    pub fn dependency<T: Any>(name: impl Into<String>) -> Self {
        Self::new::<T>(name, Declared::Dependency)
    }

    pub fn argument<T: Any>(name: impl Into<String>) -> Self {
        Self::new::<T>(name, Declared::Argument)
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(ParameterDefault::Value(value));
        self
    }

    pub fn default_dependency(mut self, dependency: impl Into<Dependency>) -> Self {
        self.default = Some(ParameterDefault::Dependency(dependency.into()));
        self
    }

    /// A leaf-argument parameter of an already erased type.
    pub(crate) fn leaf(
        name: impl Into<String>,
        type_id: TypeId,
        type_name: &'static str,
        default: Option<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            declared: Declared::Argument,
            type_id,
            type_name,
            default: default.map(ParameterDefault::Value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared(&self) -> Declared {
        self.declared
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn default(&self) -> Option<&ParameterDefault> {
        self.default.as_ref()
    }

    pub fn default_value_ref(&self) -> Option<&Value> {
        match &self.default {
            Some(ParameterDefault::Value(value)) => Some(value),
            _ => None,
        }
    }

    pub fn default_dependency_ref(&self) -> Option<&Dependency> {
        match &self.default {
            Some(ParameterDefault::Dependency(dependency)) => Some(dependency),
            _ => None,
        }
    }

    /// A parameter is a dependency if it was declared as one or if its default is a descriptor.
    /// Among those, leaf arguments are the ones declared as arguments or defaulting to one.
    pub fn class(&self) -> ParameterClass {
        match (self.declared, &self.default) {
            (Declared::Argument, _) => ParameterClass::Argument,
            (_, Some(ParameterDefault::Dependency(dependency))) if dependency.is_argument() => {
                ParameterClass::Argument
            }
            (Declared::Dependency, _) | (_, Some(ParameterDefault::Dependency(_))) => {
                ParameterClass::Dependency
            }
            _ => ParameterClass::Ordinary,
        }
    }

    pub fn is_dependency(&self) -> bool {
        self.class() != ParameterClass::Ordinary
    }

    /// Checks that a value supplied for this parameter has its declared type.  A dependency
    /// parameter also accepts a dependency in place of a value.
    pub(crate) fn check(&self, value: &Value) -> Result<(), FlowError> {
        if value.type_id() == self.type_id || (self.is_dependency() && value.is::<Dependency>()) {
            Ok(())
        } else {
            Err(FlowError::TypeMismatch {
                name: self.name.clone(),
                expected: self.type_name,
                found: value.type_name(),
            })
        }
    }
}

/// The classified parameter list of a flow or flow function.
///
/// All ordinary parameters come first, followed by all dependency parameters.
#[derive(Debug, Clone)]
pub struct Signature {
    owner: String,
    parameters: Vec<Parameter>,
    split: usize,
}
impl Signature {
    /// Partitions `parameters` left to right, failing on the first ordinary parameter that
    /// follows a dependency parameter.
    pub fn classify(
        owner: impl Into<String>,
        parameters: Vec<Parameter>,
    ) -> Result<Self, FlowError> {
        let owner = owner.into();
        let mut split = None;
        for (index, parameter) in parameters.iter().enumerate() {
            match (parameter.is_dependency(), split) {
                (true, None) => split = Some(index),
                (false, Some(_)) => {
                    return Err(FlowError::ParameterOrder {
                        owner,
                        parameter: parameter.name.clone(),
                    })
                }
                _ => {}
            }
        }
        let split = split.unwrap_or(parameters.len());
        Ok(Self {
            owner,
            parameters,
            split,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn ordinary(&self) -> &[Parameter] {
        &self.parameters[..self.split]
    }

    /// Dependency parameters, leaf arguments included.
    pub fn dependencies(&self) -> &[Parameter] {
        &self.parameters[self.split..]
    }

    pub fn arguments(&self) -> impl Iterator<Item = &Parameter> {
        self.dependencies()
            .iter()
            .filter(|parameter| parameter.class() == ParameterClass::Argument)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|parameter| parameter.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}
