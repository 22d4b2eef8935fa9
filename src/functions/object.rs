// Object methods

use indexmap::IndexMap;

use super::{arg, CallbackHost};
use crate::ast::PathSegment;
use crate::path::{lookup_exact, parse_dotted};
use crate::signature::Signature;
use crate::value::JValue;
use crate::EvalError;

pub const SIGNATURES: &[(&str, Signature)] = &[
    ("entries", Signature::exact(0)),
    ("extend", Signature::at_least(0)),
    ("filter", Signature::exact(1)),
    ("get", Signature::range(1, 2)),
    ("getFirst", Signature::at_least(1)),
    ("hasOwnProperty", Signature::exact(1)),
    ("hasPath", Signature::exact(1)),
    ("isEmpty", Signature::exact(0)),
    ("keys", Signature::exact(0)),
    ("mapKeys", Signature::exact(1)),
    ("mapValues", Signature::exact(1)),
    ("merge", Signature::at_least(0)),
    ("values", Signature::exact(0)),
];

const ENTRY_PARAMS: &[&str] = &["value", "key", "object"];

/// A path argument: dotted text (`a.b[0]`) or an array of keys.
fn path_segments(path: &JValue) -> Vec<PathSegment> {
    match path {
        JValue::Array(parts) => parts
            .iter()
            .map(|p| match p {
                JValue::Number(n) if n.fract() == 0.0 => PathSegment::Index(*n as i64),
                other => PathSegment::Field(other.to_display_string()),
            })
            .collect(),
        other => parse_dotted(&other.to_display_string()),
    }
}

pub(crate) fn call(
    host: &mut dyn CallbackHost,
    root: &JValue,
    receiver: &JValue,
    name: &str,
    args: &[JValue],
) -> Result<JValue, EvalError> {
    let map = match receiver.as_object() {
        Some(map) => map,
        None => {
            return Err(EvalError::type_error(format!(
                "{}() cannot be called on a {}",
                name,
                receiver.type_name()
            )))
        }
    };

    Ok(match name {
        "keys" => JValue::array(map.keys().map(|k| JValue::from(k.as_str())).collect()),
        "values" => JValue::array(map.values().cloned().collect()),
        "entries" => JValue::array(
            map.iter()
                .map(|(k, v)| JValue::array(vec![JValue::from(k.as_str()), v.clone()]))
                .collect(),
        ),
        "isEmpty" => JValue::Bool(map.is_empty()),
        "hasOwnProperty" => JValue::Bool(map.contains_key(&arg(args, 0).to_display_string())),
        "hasPath" => JValue::Bool(lookup_exact(receiver, &path_segments(arg(args, 0))).is_some()),
        "get" => lookup_exact(receiver, &path_segments(arg(args, 0)))
            .unwrap_or_else(|| arg(args, 1).clone()),
        "getFirst" => {
            let (keys, default) = match &args[0] {
                JValue::Array(keys) => (keys.to_vec(), arg(args, 1).clone()),
                _ => (args.to_vec(), JValue::Null),
            };
            keys.iter()
                .find_map(|k| map.get(&k.to_display_string()).cloned())
                .unwrap_or(default)
        }

        "filter" => {
            let f = host.callable(arg(args, 0), ENTRY_PARAMS)?;
            let mut out = IndexMap::new();
            for (k, v) in map.iter() {
                let keep = host.call(&f, &[v.clone(), JValue::from(k.as_str()), receiver.clone()], root)?;
                if keep.is_truthy() {
                    out.insert(k.clone(), v.clone());
                }
            }
            JValue::object(out)
        }
        "mapKeys" | "mapValues" => {
            let f = host.callable(arg(args, 0), ENTRY_PARAMS)?;
            let mut out = IndexMap::with_capacity(map.len());
            for (k, v) in map.iter() {
                let mapped = host.call(&f, &[v.clone(), JValue::from(k.as_str()), receiver.clone()], root)?;
                if name == "mapKeys" {
                    out.insert(mapped.to_display_string(), v.clone());
                } else {
                    out.insert(k.clone(), mapped);
                }
            }
            JValue::object(out)
        }

        "extend" => {
            let mut out = map.clone();
            for source in args.iter().filter_map(JValue::as_object) {
                for (k, v) in source {
                    out.insert(k.clone(), v.clone());
                }
            }
            JValue::object(out)
        }
        "merge" => {
            let mut out = map.clone();
            for source in args.iter().filter_map(JValue::as_object) {
                merge_into(&mut out, source);
            }
            JValue::object(out)
        }
        _ => return Err(EvalError::UnknownFunction(format!("object.{}", name))),
    })
}

/// Deep merge: nested objects merge key by key, anything else replaces.
fn merge_into(target: &mut IndexMap<String, JValue>, source: &IndexMap<String, JValue>) {
    for (k, v) in source {
        let merged = match (target.get(k), v) {
            (Some(JValue::Object(existing)), JValue::Object(incoming)) => {
                let mut inner = (**existing).clone();
                merge_into(&mut inner, incoming);
                JValue::object(inner)
            }
            _ => v.clone(),
        };
        target.insert(k.clone(), merged);
    }
}
