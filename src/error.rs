// Error taxonomy shared by the parser, path resolver, function library and evaluator

use thiserror::Error;

/// Coarse classification of an [`EvalError`], stable across message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SyntaxError,
    PathSyntaxError,
    UnknownFunctionError,
    TypeError,
    DivisionByZeroError,
    NoMatchError,
    ResourceLimitExceeded,
    InvalidDocument,
}

/// Errors surfaced by `evaluate`.
///
/// Lookups that fail because data is absent are not errors: they resolve to
/// `null`. Only malformed input and programmer-level mistakes end up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Syntax error at offset {offset}: {message} (near '{fragment}')")]
    Syntax {
        message: String,
        fragment: String,
        offset: usize,
    },

    #[error("Path syntax error at offset {offset}: {message} (near '{fragment}')")]
    PathSyntax {
        message: String,
        fragment: String,
        offset: usize,
    },

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("No match arm matched value {0}")]
    NoMatch(String),

    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl EvalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Syntax { .. } => ErrorKind::SyntaxError,
            EvalError::PathSyntax { .. } => ErrorKind::PathSyntaxError,
            EvalError::UnknownFunction(_) => ErrorKind::UnknownFunctionError,
            EvalError::TypeError(_) => ErrorKind::TypeError,
            EvalError::DivisionByZero => ErrorKind::DivisionByZeroError,
            EvalError::NoMatch(_) => ErrorKind::NoMatchError,
            EvalError::ResourceLimitExceeded(_) => ErrorKind::ResourceLimitExceeded,
            EvalError::InvalidDocument(_) => ErrorKind::InvalidDocument,
        }
    }

    /// Offending source fragment and its character offset, when known.
    pub fn span(&self) -> Option<(&str, usize)> {
        match self {
            EvalError::Syntax {
                fragment, offset, ..
            }
            | EvalError::PathSyntax {
                fragment, offset, ..
            } => Some((fragment.as_str(), *offset)),
            _ => None,
        }
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        EvalError::TypeError(message.into())
    }
}

impl From<serde_json::Error> for EvalError {
    fn from(e: serde_json::Error) -> Self {
        EvalError::InvalidDocument(e.to_string())
    }
}
