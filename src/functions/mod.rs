// Built-in function implementations
//
// Builtins are grouped by the runtime kind of their receiver (string, number,
// array, object, date) plus the Math/Date/JSON namespaces and a handful of
// globals. Every builtin has an entry in its module's signature catalog;
// dispatch validates the argument count against it before calling in.

pub mod array;
pub mod date;
pub mod global;
pub mod math;
pub mod number;
pub mod object;
pub mod string;

use std::sync::Arc;

use crate::datetime::DateKind;
use crate::signature::{self, Signature};
use crate::value::{JValue, Lambda};
use crate::EvalError;

/// What builtins need from the evaluator: turning callback arguments into
/// callables, invoking them, and re-entering evaluation.
pub trait CallbackHost {
    /// Accept a lambda, or expression text whose free parameters are `defaults`.
    fn callable(&mut self, callback: &JValue, defaults: &[&str]) -> Result<Arc<Lambda>, EvalError>;

    fn call(&mut self, f: &Lambda, args: &[JValue], root: &JValue) -> Result<JValue, EvalError>;

    /// Parse and evaluate `text` with `root` as `$`.
    fn eval_text(&mut self, text: &str, root: &JValue) -> Result<JValue, EvalError>;

    /// Resolve a `$`-rooted path string against `value`.
    fn resolve_path(&mut self, value: &JValue, path: &str) -> Result<JValue, EvalError>;

    /// Largest string, in bytes, a builtin may produce.
    fn max_string_length(&self) -> usize;
}

static NULL: JValue = JValue::Null;

const UNIVERSAL: &[(&str, Signature)] = &[("toString", Signature::range(0, 1))];

/// Reject a string of `len` bytes before it is allocated.
pub(crate) fn check_string_length(len: usize, limit: usize) -> Result<(), EvalError> {
    if len > limit {
        log::warn!("string length limit of {} exceeded", limit);
        return Err(EvalError::ResourceLimitExceeded(format!(
            "string of {} bytes exceeds the limit of {}",
            len, limit
        )));
    }
    Ok(())
}

/// Argument `i`, or null when absent.
pub(crate) fn arg(args: &[JValue], i: usize) -> &JValue {
    args.get(i).unwrap_or(&NULL)
}

/// Numeric argument `i`, or `default` when absent.
pub(crate) fn num_arg(args: &[JValue], i: usize, default: f64) -> f64 {
    args.get(i).map(JValue::to_number).unwrap_or(default)
}

/// Text of argument `i`, or `None` when absent.
pub(crate) fn str_arg(args: &[JValue], i: usize) -> Option<String> {
    args.get(i).map(JValue::to_display_string)
}

fn receiver_catalog(receiver: &JValue) -> &'static [(&'static str, Signature)] {
    match receiver {
        JValue::String(_) => string::SIGNATURES,
        JValue::Number(_) => number::SIGNATURES,
        JValue::Array(_) => array::SIGNATURES,
        JValue::Object(_) => object::SIGNATURES,
        JValue::Date(_) => date::SIGNATURES,
        _ => &[],
    }
}

fn known_anywhere(name: &str) -> bool {
    [
        string::SIGNATURES,
        number::SIGNATURES,
        array::SIGNATURES,
        object::SIGNATURES,
        date::SIGNATURES,
    ]
    .iter()
    .any(|catalog| signature::lookup(catalog, name).is_some())
}

/// `receiver.name(args)`
pub fn call_method(
    host: &mut dyn CallbackHost,
    root: &JValue,
    receiver: &JValue,
    name: &str,
    args: &[JValue],
) -> Result<JValue, EvalError> {
    log::trace!("dispatch {}.{}/{}", receiver.type_name(), name, args.len());

    if receiver.is_null() {
        return Err(EvalError::type_error(format!(
            "Cannot call '{}' on null",
            name
        )));
    }

    if let Some(sig) = signature::lookup(receiver_catalog(receiver), name) {
        sig.validate_arg_count(name, args.len())?;
        return match receiver {
            JValue::String(s) => string::call(host, root, s, name, args),
            JValue::Number(n) => number::call(*n, name, args),
            JValue::Array(items) => array::call(host, root, items, name, args),
            JValue::Object(_) => object::call(host, root, receiver, name, args),
            JValue::Date(d) => date::call(d, name, args),
            _ => Err(EvalError::UnknownFunction(name.to_string())),
        };
    }

    if let Some(sig) = signature::lookup(UNIVERSAL, name) {
        sig.validate_arg_count(name, args.len())?;
        return Ok(JValue::String(receiver.to_display_string().into()));
    }

    if known_anywhere(name) {
        return Err(EvalError::type_error(format!(
            "{}() cannot be called on a {}",
            name,
            receiver.type_name()
        )));
    }
    Err(EvalError::UnknownFunction(format!(
        "{}.{}",
        receiver.type_name(),
        name
    )))
}

/// `Namespace.name(args)`
pub fn call_namespace(
    namespace: &str,
    name: &str,
    args: &[JValue],
) -> Result<JValue, EvalError> {
    log::trace!("dispatch {}.{}/{}", namespace, name, args.len());

    let unknown = || EvalError::UnknownFunction(format!("{}.{}", namespace, name));
    let catalog = match namespace {
        "Math" => math::SIGNATURES,
        "JSON" => global::JSON_SIGNATURES,
        "Date" => date::DATE_NAMESPACE,
        "LocalDate" | "LocalDateTime" | "LocalTime" => date::LOCAL_NAMESPACE,
        _ => return Err(unknown()),
    };
    let sig = signature::lookup(catalog, name).ok_or_else(unknown)?;
    sig.validate_arg_count(name, args.len())?;

    match namespace {
        "Math" => math::call(name, args),
        "JSON" => global::call_json(name, args),
        "LocalDate" => date::call_namespace(DateKind::LocalDate, name, args),
        "LocalDateTime" => date::call_namespace(DateKind::LocalDateTime, name, args),
        "LocalTime" => date::call_namespace(DateKind::LocalTime, name, args),
        _ => date::call_namespace(DateKind::DateTime, name, args),
    }
}

/// `Namespace.name` without a call
pub fn namespace_member(namespace: &str, name: &str) -> Result<JValue, EvalError> {
    match namespace {
        "Math" => math::constant(name),
        _ => None,
    }
    .map(JValue::Number)
    .ok_or_else(|| EvalError::UnknownFunction(format!("{}.{}", namespace, name)))
}

/// `name(args)` with no receiver
pub fn call_global(
    host: &mut dyn CallbackHost,
    root: &JValue,
    name: &str,
    args: &[JValue],
) -> Result<JValue, EvalError> {
    log::trace!("dispatch global {}/{}", name, args.len());
    let sig = signature::lookup(global::SIGNATURES, name)
        .ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
    sig.validate_arg_count(name, args.len())?;
    global::call(host, root, name, args)
}
