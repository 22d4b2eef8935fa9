// snapexpr - SnapLogic-style expression evaluator over JSON documents
// Copyright (c) 2025 snapexpr contributors
// Licensed under the MIT License

//! # snapexpr
//!
//! An interpreter for the SnapLogic expression language: JSONPath-style
//! access into a document, a fixed library of string/number/array/object/date
//! builtins, operators, ternaries and structural `match` expressions.
//!
//! ## Architecture
//!
//! - `value` - Runtime value type (`JValue`) and its coercions
//! - `parser` - Tokenizer and Pratt parser (expression text to AST)
//! - `ast` - Abstract Syntax Tree definitions
//! - `evaluator` - Tree-walking evaluator and evaluation limits
//! - `path` - Path resolution against a document
//! - `functions` - Built-in function implementations
//! - `pattern` - Pattern matching for `match` arms
//! - `datetime` - Date/time primitives
//! - `signature` - Builtin arity tables
//! - `utils` - Number formatting and other helpers
//!
//! ## Example
//!
//! ```
//! use snapexpr::{evaluate, JValue};
//!
//! let doc = JValue::from_json_str(r#"{"user": {"name": "John"}}"#).unwrap();
//! let greeting = evaluate("'Hello, ' + $.user.name.toUpperCase()", &doc).unwrap();
//! assert_eq!(greeting, JValue::from("Hello, JOHN"));
//! ```

pub mod ast;
pub mod datetime;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod path;
pub mod pattern;
pub mod value;
mod error;
mod signature;
mod utils;

pub use error::{ErrorKind, EvalError};
pub use evaluator::{EvalOptions, Evaluator};
pub use parser::parse;
pub use value::JValue;

/// Parse and evaluate `expression` against `document` with default limits.
pub fn evaluate(expression: &str, document: &JValue) -> Result<JValue, EvalError> {
    evaluate_with_options(expression, document, &EvalOptions::default())
}

/// Parse and evaluate with explicit limits.
pub fn evaluate_with_options(
    expression: &str,
    document: &JValue,
    options: &EvalOptions,
) -> Result<JValue, EvalError> {
    compile_with_options(expression, options)?.evaluate(document)
}

/// Evaluate against a document given as JSON text and return the result as JSON text.
///
/// # Errors
///
/// `InvalidDocument` when `json` does not parse, plus any evaluation error.
pub fn evaluate_json(expression: &str, json: &str) -> Result<String, EvalError> {
    let document = JValue::from_json_str(json)?;
    let result = evaluate(expression, &document)?;
    Ok(result.to_json_string()?)
}

/// A parsed expression that can be evaluated against many documents.
///
/// # Examples
///
/// ```
/// use snapexpr::{compile, JValue};
///
/// let expr = compile("$.items[*].price.reduce((a, b) => a + b, 0)").unwrap();
/// let doc = JValue::from_json_str(r#"{"items": [{"price": 2}, {"price": 3}]}"#).unwrap();
/// assert_eq!(expr.evaluate(&doc).unwrap(), JValue::from(5i64));
/// ```
#[derive(Debug, Clone)]
pub struct Expression {
    /// The parsed Abstract Syntax Tree
    ast: ast::AstNode,
    options: EvalOptions,
}

impl Expression {
    /// Evaluate this expression with `document` as `$`.
    pub fn evaluate(&self, document: &JValue) -> Result<JValue, EvalError> {
        let mut evaluator = Evaluator::with_options(self.options.clone());
        evaluator.evaluate(&self.ast, document)
    }

    pub fn ast(&self) -> &ast::AstNode {
        &self.ast
    }
}

/// Parse `expression` once for repeated evaluation.
pub fn compile(expression: &str) -> Result<Expression, EvalError> {
    compile_with_options(expression, &EvalOptions::default())
}

pub fn compile_with_options(expression: &str, options: &EvalOptions) -> Result<Expression, EvalError> {
    let ast = parser::parse_with_depth(expression, options.max_depth)?;
    Ok(Expression {
        ast,
        options: options.clone(),
    })
}

/// Resolve a `$`-rooted path string against `document`.
pub fn jsonpath(document: &JValue, path: &str) -> Result<JValue, EvalError> {
    use functions::CallbackHost;
    Evaluator::new().resolve_path(document, path)
}
