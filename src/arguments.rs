use std::any::Any;
use std::fmt;
use std::hash::Hash;

use crate::dependency::Dependency;
use crate::error::FlowError;
use crate::signature::Parameter;
use crate::value::Value;

/// The arguments of one call to a dependency or flow, as written at the call site.
///
/// ```
/// use flow_compose::Arguments;
///
/// let positional = Arguments::new().arg(11);
/// let named = Arguments::new().named("index", 11);
/// assert_eq!(positional.len(), named.len());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}
impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg<T: Any + Hash + Eq + fmt::Debug + Send + Sync>(self, value: T) -> Self {
        self.arg_value(Value::new(value))
    }

    pub fn arg_value(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    pub fn named<T: Any + Hash + Eq + fmt::Debug + Send + Sync>(
        self,
        name: impl Into<String>,
        value: T,
    ) -> Self {
        self.named_value(name, Value::new(value))
    }

    pub fn named_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.push((name.into(), value));
        self
    }

    /// Supplies a dependency by name, overriding whatever the flow would otherwise bind there.
    pub fn named_dependency(
        self,
        name: impl Into<String>,
        dependency: impl Into<Dependency>,
    ) -> Self {
        self.named_value(name, Value::new(dependency.into()))
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Matches the arguments against `parameters`: positionals in declared order, then named
    /// ones by name.  Named arguments that match no parameter are accepted only if listed in
    /// `extra`; they come last in the result, in call-site order.  Missing parameters take their
    /// default value; parameters for which `optional` holds may also stay unbound.
    pub(crate) fn bind<F>(
        self,
        function: &str,
        parameters: &[Parameter],
        extra: &[&str],
        optional: F,
    ) -> Result<BoundArguments, FlowError>
    where
        F: Fn(&Parameter) -> bool,
    {
        if self.positional.len() > parameters.len() {
            return Err(FlowError::TooManyArguments {
                function: String::from(function),
                expected: parameters.len(),
                given: self.positional.len(),
            });
        }
        let mut slots: Vec<Option<Value>> = vec![None; parameters.len()];
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }
        let mut extras = Vec::new();
        for (name, value) in self.named {
            match parameters.iter().position(|parameter| parameter.name() == name) {
                Some(index) if slots[index].is_some() => {
                    return Err(FlowError::DuplicateArgument {
                        function: String::from(function),
                        argument: name,
                    })
                }
                Some(index) => slots[index] = Some(value),
                None if extra.contains(&name.as_str()) => {
                    if extras.iter().any(|(seen, _): &(String, Value)| *seen == name) {
                        return Err(FlowError::DuplicateArgument {
                            function: String::from(function),
                            argument: name,
                        });
                    }
                    extras.push((name, value));
                }
                None => {
                    return Err(FlowError::UnexpectedArgument {
                        function: String::from(function),
                        argument: name,
                    })
                }
            }
        }

        let mut bound = Vec::with_capacity(parameters.len() + extras.len());
        for (parameter, slot) in parameters.iter().zip(slots) {
            match slot.or_else(|| parameter.default_value_ref().cloned()) {
                Some(value) => {
                    parameter.check(&value)?;
                    bound.push((String::from(parameter.name()), value));
                }
                None if optional(parameter) => {}
                None => {
                    return Err(FlowError::MissingArgument {
                        function: String::from(function),
                        argument: String::from(parameter.name()),
                    })
                }
            }
        }
        bound.extend(extras);
        Ok(BoundArguments(bound))
    }
}

/// Arguments matched to parameter names, in declared order.
#[derive(Debug, Clone, Default)]
pub(crate) struct BoundArguments(Vec<(String, Value)>);
impl BoundArguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Keeps only the arguments for which `keep` holds.
    pub(crate) fn retain<F: Fn(&str) -> bool>(mut self, keep: F) -> Self {
        self.0.retain(|(name, _)| keep(name));
        self
    }
}
