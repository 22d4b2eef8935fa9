// Builtin signatures and argument-count validation

use thiserror::Error;

/// Signature validation errors
#[derive(Error, Debug, PartialEq)]
pub enum SignatureError {
    #[error("{name}() expects {expected} argument(s), got {actual}")]
    ArgumentCountMismatch {
        name: String,
        expected: String,
        actual: usize,
    },
}

impl From<SignatureError> for crate::EvalError {
    fn from(e: SignatureError) -> Self {
        crate::EvalError::TypeError(e.to_string())
    }
}

/// Arity of a builtin: `min` required arguments, up to `max` (None = variadic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub min: usize,
    pub max: Option<usize>,
}

impl Signature {
    pub const fn exact(n: usize) -> Self {
        Signature {
            min: n,
            max: Some(n),
        }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Signature {
            min,
            max: Some(max),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Signature { min, max: None }
    }

    /// Validate argument count
    pub fn validate_arg_count(&self, name: &str, actual: usize) -> Result<(), SignatureError> {
        let too_many = self.max.is_some_and(|max| actual > max);
        if actual < self.min || too_many {
            let expected = match self.max {
                Some(max) if max == self.min => max.to_string(),
                Some(max) => format!("{}..{}", self.min, max),
                None => format!("at least {}", self.min),
            };
            return Err(SignatureError::ArgumentCountMismatch {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }
}

/// Find a builtin's signature in a catalog.
pub fn lookup(catalog: &[(&'static str, Signature)], name: &str) -> Option<Signature> {
    catalog
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|(_, sig)| *sig)
}
