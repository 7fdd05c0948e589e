//! Error types surfaced by the query planner.

use std::fmt;

/// A single failure raised while composing, validating, or planning against a
/// supergraph schema. Each variant corresponds to one of the error kinds in
/// the planner's error handling design.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SingleFederationError {
    #[error("schema validation error: {message}")]
    SchemaValidation { message: String },

    #[error("operation validation error: {message}")]
    OperationValidation { message: String },

    #[error("no operation named \"{name}\" was found in the document")]
    NoMatchingOperation { name: String },

    #[error("document defines multiple operations; an operation name must be provided")]
    AmbiguousOperation,

    #[error("no key on type \"{type_name}\" is resolvable by service \"{service_name}\"")]
    UnsatisfiableKey {
        type_name: String,
        service_name: String,
    },

    #[error("internal error: {message}")]
    Internal { message: String },

    #[error("invalid GraphQL: {message}")]
    InvalidGraphQL { message: String },

    #[error("invalid federation supergraph: {message}")]
    InvalidFederationSupergraph { message: String },
}

/// Either a single error, or a collected batch raised together (e.g. schema
/// validation, which reports every problem it finds rather than failing on
/// the first one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederationError {
    Single(SingleFederationError),
    Multiple(Vec<SingleFederationError>),
}

impl FederationError {
    pub fn internal(message: impl Into<String>) -> Self {
        SingleFederationError::Internal {
            message: message.into(),
        }
        .into()
    }

    /// Flattens into a `Vec` of the underlying single errors.
    pub fn into_errors(self) -> Vec<SingleFederationError> {
        match self {
            Self::Single(e) => vec![e],
            Self::Multiple(es) => es,
        }
    }
}

impl From<SingleFederationError> for FederationError {
    fn from(e: SingleFederationError) -> Self {
        Self::Single(e)
    }
}

impl fmt::Display for FederationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(e) => write!(f, "{e}"),
            Self::Multiple(es) => {
                write!(f, "{} errors:", es.len())?;
                for e in es {
                    write!(f, "\n  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for FederationError {}

impl From<apollo_compiler::validation::WithErrors<apollo_compiler::Schema>> for FederationError {
    fn from(errors: apollo_compiler::validation::WithErrors<apollo_compiler::Schema>) -> Self {
        SingleFederationError::SchemaValidation {
            message: errors.to_string(),
        }
        .into()
    }
}

impl From<apollo_compiler::validation::WithErrors<apollo_compiler::ExecutableDocument>>
    for FederationError
{
    fn from(
        errors: apollo_compiler::validation::WithErrors<apollo_compiler::ExecutableDocument>,
    ) -> Self {
        SingleFederationError::OperationValidation {
            message: errors.to_string(),
        }
        .into()
    }
}
