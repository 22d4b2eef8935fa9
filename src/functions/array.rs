// Array methods
//
// Nothing here mutates the receiver. The "mutating" methods (push, pop,
// shift, unshift, splice, sort, reverse) return the resulting new array.

use std::cmp::Ordering;

use indexmap::IndexMap;

use super::{arg, num_arg, CallbackHost};
use crate::signature::Signature;
use crate::utils::relative_index;
use crate::value::JValue;
use crate::EvalError;

pub const SIGNATURES: &[(&str, Signature)] = &[
    ("concat", Signature::at_least(0)),
    ("filter", Signature::exact(1)),
    ("find", Signature::exact(1)),
    ("findIndex", Signature::exact(1)),
    ("includes", Signature::range(1, 2)),
    ("indexOf", Signature::range(1, 2)),
    ("join", Signature::range(0, 1)),
    ("lastIndexOf", Signature::range(1, 2)),
    ("length", Signature::exact(0)),
    ("map", Signature::exact(1)),
    ("pop", Signature::exact(0)),
    ("push", Signature::at_least(0)),
    ("reduce", Signature::range(1, 2)),
    ("reduceRight", Signature::range(1, 2)),
    ("reverse", Signature::exact(0)),
    ("shift", Signature::exact(0)),
    ("slice", Signature::range(0, 2)),
    ("sort", Signature::range(0, 1)),
    ("splice", Signature::at_least(0)),
    ("toObject", Signature::range(1, 2)),
    ("toString", Signature::exact(0)),
    ("unshift", Signature::at_least(0)),
];

const ELEMENT_PARAMS: &[&str] = &["x", "index", "array"];
const REDUCE_PARAMS: &[&str] = &["acc", "curr", "index", "array"];
const SORT_PARAMS: &[&str] = &["a", "b"];

/// SameValueZero: strict equality except that NaN equals NaN.
fn same_value_zero(a: &JValue, b: &JValue) -> bool {
    match (a, b) {
        (JValue::Number(x), JValue::Number(y)) if x.is_nan() && y.is_nan() => true,
        _ => a == b,
    }
}

fn join(items: &[JValue], sep: &str) -> String {
    items
        .iter()
        .map(|v| match v {
            JValue::Null => String::new(),
            JValue::Array(inner) => join(inner, ","),
            other => other.to_display_string(),
        })
        .collect::<Vec<_>>()
        .join(sep)
}

pub(crate) fn call(
    host: &mut dyn CallbackHost,
    root: &JValue,
    items: &[JValue],
    name: &str,
    args: &[JValue],
) -> Result<JValue, EvalError> {
    let len = items.len();
    let receiver = || JValue::array(items.to_vec());

    Ok(match name {
        "length" => JValue::from(len),
        "toString" => JValue::from(join(items, ",")),
        "join" => {
            let sep = match args.first() {
                None | Some(JValue::Null) => ",".to_string(),
                Some(v) => v.to_display_string(),
            };
            JValue::from(join(items, &sep))
        }
        "concat" => {
            let mut out = items.to_vec();
            for a in args {
                match a {
                    JValue::Array(inner) => out.extend(inner.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            JValue::array(out)
        }
        "includes" => {
            let from = relative_index(num_arg(args, 1, 0.0), len);
            let needle = arg(args, 0);
            JValue::Bool(items[from..].iter().any(|v| same_value_zero(v, needle)))
        }
        "indexOf" => {
            let from = relative_index(num_arg(args, 1, 0.0), len);
            let needle = arg(args, 0);
            match items[from..].iter().position(|v| v == needle) {
                Some(i) => JValue::from(from + i),
                None => JValue::Number(-1.0),
            }
        }
        "lastIndexOf" => {
            let needle = arg(args, 0);
            let from = match args.get(1) {
                Some(v) => {
                    let n = v.to_number();
                    if n < 0.0 {
                        (len as f64 + n.trunc()) as i64
                    } else {
                        n.trunc().min(len as f64 - 1.0) as i64
                    }
                }
                None => len as i64 - 1,
            };
            let found = (0..=from)
                .rev()
                .filter_map(|i| usize::try_from(i).ok())
                .find(|&i| items.get(i) == Some(needle));
            match found {
                Some(i) => JValue::from(i),
                None => JValue::Number(-1.0),
            }
        }

        "filter" => {
            let f = host.callable(arg(args, 0), ELEMENT_PARAMS)?;
            let array = receiver();
            let mut out = Vec::new();
            for (i, item) in items.iter().enumerate() {
                let keep = host.call(&f, &[item.clone(), JValue::from(i), array.clone()], root)?;
                if keep.is_truthy() {
                    out.push(item.clone());
                }
            }
            JValue::array(out)
        }
        "find" | "findIndex" => {
            let f = host.callable(arg(args, 0), ELEMENT_PARAMS)?;
            let array = receiver();
            let mut found = None;
            for (i, item) in items.iter().enumerate() {
                if host
                    .call(&f, &[item.clone(), JValue::from(i), array.clone()], root)?
                    .is_truthy()
                {
                    found = Some(i);
                    break;
                }
            }
            match (name, found) {
                ("find", Some(i)) => items[i].clone(),
                ("find", None) => JValue::Null,
                (_, Some(i)) => JValue::from(i),
                (_, None) => JValue::Number(-1.0),
            }
        }
        "map" => {
            let f = host.callable(arg(args, 0), ELEMENT_PARAMS)?;
            let array = receiver();
            let mut out = Vec::with_capacity(len);
            for (i, item) in items.iter().enumerate() {
                out.push(host.call(&f, &[item.clone(), JValue::from(i), array.clone()], root)?);
            }
            JValue::array(out)
        }
        "reduce" | "reduceRight" => {
            let f = host.callable(arg(args, 0), REDUCE_PARAMS)?;
            let array = receiver();
            let mut order: Vec<usize> = (0..len).collect();
            if name == "reduceRight" {
                order.reverse();
            }
            let mut order = order.into_iter();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match order.next() {
                    Some(i) => items[i].clone(),
                    None => {
                        return Err(EvalError::type_error(
                            "Reduce of empty array with no initial value",
                        ))
                    }
                },
            };
            for i in order {
                acc = host.call(
                    &f,
                    &[acc, items[i].clone(), JValue::from(i), array.clone()],
                    root,
                )?;
            }
            acc
        }
        "toObject" => {
            let key_fn = host.callable(arg(args, 0), ELEMENT_PARAMS)?;
            let value_fn = match args.get(1) {
                Some(cb) => Some(host.callable(cb, ELEMENT_PARAMS)?),
                None => None,
            };
            let array = receiver();
            let mut map = IndexMap::with_capacity(len);
            for (i, item) in items.iter().enumerate() {
                let call_args = [item.clone(), JValue::from(i), array.clone()];
                let key = host.call(&key_fn, &call_args, root)?.to_display_string();
                let value = match &value_fn {
                    Some(vf) => host.call(vf, &call_args, root)?,
                    None => item.clone(),
                };
                map.insert(key, value);
            }
            JValue::object(map)
        }

        "pop" => JValue::array(items[..len.saturating_sub(1)].to_vec()),
        "shift" => JValue::array(items.get(1..).unwrap_or_default().to_vec()),
        "push" => {
            let mut out = items.to_vec();
            out.extend(args.iter().cloned());
            JValue::array(out)
        }
        "unshift" => {
            let mut out = args.to_vec();
            out.extend(items.iter().cloned());
            JValue::array(out)
        }
        "reverse" => JValue::array(items.iter().rev().cloned().collect()),
        "slice" => {
            let start = relative_index(num_arg(args, 0, 0.0), len);
            let end = relative_index(num_arg(args, 1, len as f64), len);
            JValue::array(items[start..end.max(start)].to_vec())
        }
        "splice" => {
            let start = relative_index(num_arg(args, 0, 0.0), len);
            let delete = match args.get(1) {
                Some(v) => (v.to_number().trunc().max(0.0) as usize).min(len - start),
                None if args.is_empty() => 0,
                None => len - start,
            };
            let mut out = items[..start].to_vec();
            out.extend(args.iter().skip(2).cloned());
            out.extend(items[start + delete..].iter().cloned());
            JValue::array(out)
        }
        "sort" => {
            let sorted = match args.first() {
                None | Some(JValue::Null) => merge_sort(items.to_vec(), &mut |a, b| {
                    Ok(default_compare(a, b))
                })?,
                Some(cb) => {
                    let f = host.callable(cb, SORT_PARAMS)?;
                    merge_sort(items.to_vec(), &mut |a, b| {
                        let n = host.call(&f, &[a.clone(), b.clone()], root)?.to_number();
                        Ok(if n < 0.0 {
                            Ordering::Less
                        } else if n > 0.0 {
                            Ordering::Greater
                        } else {
                            Ordering::Equal
                        })
                    })?
                }
            };
            JValue::array(sorted)
        }
        _ => return Err(EvalError::UnknownFunction(format!("array.{}", name))),
    })
}

/// Default ordering: compare display strings, nulls last.
fn default_compare(a: &JValue, b: &JValue) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ => {
            let (x, y) = (a.to_display_string(), b.to_display_string());
            // Code-unit order, as in ECMAScript
            x.encode_utf16().cmp(y.encode_utf16())
        }
    }
}

type Comparator<'a> = dyn FnMut(&JValue, &JValue) -> Result<Ordering, EvalError> + 'a;

/// Stable merge sort with a fallible comparator. Inconsistent comparators
/// yield some permutation of the input rather than a panic.
fn merge_sort(mut items: Vec<JValue>, cmp: &mut Comparator<'_>) -> Result<Vec<JValue>, EvalError> {
    if items.len() <= 1 {
        return Ok(items);
    }
    let right = items.split_off(items.len() / 2);
    let left = merge_sort(items, cmp)?;
    let right = merge_sort(right, cmp)?;

    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();
    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        if cmp(r, l)? == Ordering::Less {
            out.extend(right.next());
        } else {
            out.extend(left.next());
        }
    }
    out.extend(left);
    out.extend(right);
    Ok(out)
}
