use std::fmt;
use thiserror::Error;

/// Who asked for a set of dependencies that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Flow(String),
    Function(String),
}
impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Flow(name) => write!(f, "the flow `{}`", name),
            Owner::Function(name) => write!(f, "`{}`", name),
        }
    }
}

/// Every way wiring a flow together can go wrong.
///
/// Structural errors (`ParameterOrder`, `NonDependencyConfigured`) are returned when a flow or
/// dependency is declared.  Everything else is returned by an invocation, before the body of the
/// offending function runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error(
        "`{owner}` has to have all non-dependency parameters before dependency parameters, \
         but `{parameter}` follows a dependency parameter"
    )]
    ParameterOrder { owner: String, parameter: String },

    #[error(
        "parameter `{parameter}` in flow `{flow}` is not a dependency and is also present in the \
         flow configuration; non-dependency arguments cannot appear in the configuration"
    )]
    NonDependencyConfigured { flow: String, parameter: String },

    #[error("{}", missing_message(.owner, .names))]
    MissingDependencies { owner: Owner, names: Vec<String> },

    #[error("`{name}` is already defined in the flow context of `{flow}`")]
    AlreadyDefined { flow: String, name: String },

    #[error("`{name}` is not defined in the flow context of `{flow}`")]
    UnknownDependency { flow: String, name: String },

    #[error("`{function}` is missing a value for argument `{argument}`")]
    MissingArgument { function: String, argument: String },

    #[error("`{function}` got an unexpected argument `{argument}`")]
    UnexpectedArgument { function: String, argument: String },

    #[error("`{function}` got multiple values for argument `{argument}`")]
    DuplicateArgument { function: String, argument: String },

    #[error("`{function}` takes {expected} positional arguments but {given} were given")]
    TooManyArguments { function: String, expected: usize, given: usize },

    #[error("`{name}` expected a value of type `{expected}` but got `{found}`")]
    TypeMismatch { name: String, expected: &'static str, found: &'static str },

    #[error("argument `{argument}` of cached `{function}` cannot be fingerprinted")]
    Unfingerprintable { function: String, argument: String },

    #[error("`{function}` panicked")]
    Panicked { function: String },

    #[error("`{function}` needs a tokio runtime to block on")]
    NoRuntime { function: String },

    #[error(
        "`{function}` was called blocking from async code on a current-thread runtime; \
         await it instead"
    )]
    BlockedRuntime { function: String },

    #[error("{0}")]
    Failed(String),
}

impl FlowError {
    /// Wraps an error raised by the body of a flow or flow function.
    pub fn failed(error: impl fmt::Display) -> Self {
        FlowError::Failed(error.to_string())
    }
}

fn missing_message(owner: &Owner, names: &[String]) -> String {
    let (noun, verb) = if names.len() == 1 {
        ("dependency is", "is")
    } else {
        ("dependencies are", "are")
    };
    format!(
        "`{}` {} required by {} but {} missing in the flow context.",
        names.join("`, `"),
        noun,
        owner,
        verb
    )
}
