// Path resolution against a document
//
// A path starts out singular. Wildcards, recursive descent, filters and field
// access on an array switch it to plural; from then on every segment maps over
// each match independently and the result is always an array.

use crate::ast::{AstNode, PathSegment};
use crate::value::JValue;
use crate::EvalError;

/// Hooks the resolver needs from whoever drives evaluation.
pub trait SegmentEvaluator {
    /// Evaluate a filter predicate with `@` bound to `candidate`.
    fn test_predicate(
        &mut self,
        predicate: &AstNode,
        candidate: &JValue,
        root: &JValue,
    ) -> Result<bool, EvalError>;

    /// Evaluate the expression inside a dynamic `[expr]` accessor.
    fn eval_key(&mut self, expr: &AstNode, root: &JValue) -> Result<JValue, EvalError>;

    /// Maximum document depth explored by recursive descent.
    fn max_depth(&self) -> usize;
}

enum Resolved {
    Single(JValue),
    Many(Vec<JValue>),
}

/// Apply `segments` left to right starting from `start`.
pub fn resolve<E: SegmentEvaluator + ?Sized>(
    start: JValue,
    segments: &[PathSegment],
    root: &JValue,
    ev: &mut E,
) -> Result<JValue, EvalError> {
    let mut state = Resolved::Single(start);

    for segment in segments {
        state = match segment {
            PathSegment::Field(name) => field(state, name),
            PathSegment::Index(i) => index(state, *i),
            PathSegment::Wildcard => wildcard(state),
            PathSegment::RecursiveDescent(name) => {
                let limit = ev.max_depth();
                let mut found = Vec::new();
                for value in into_values(state) {
                    descend(&value, name, 0, limit, &mut found)?;
                }
                Resolved::Many(found)
            }
            PathSegment::Filter(predicate) => {
                let candidates = match state {
                    Resolved::Single(JValue::Array(arr)) => arr.as_ref().clone(),
                    Resolved::Single(JValue::Object(map)) => map.values().cloned().collect(),
                    Resolved::Single(_) => Vec::new(),
                    Resolved::Many(values) => values
                        .into_iter()
                        .flat_map(|v| match v {
                            JValue::Array(arr) => arr.as_ref().clone(),
                            other => vec![other],
                        })
                        .collect(),
                };
                let mut kept = Vec::with_capacity(candidates.len());
                for candidate in candidates {
                    if ev.test_predicate(predicate, &candidate, root)? {
                        kept.push(candidate);
                    }
                }
                Resolved::Many(kept)
            }
            PathSegment::Dynamic(expr) => match ev.eval_key(expr, root)? {
                JValue::Number(n) if n.fract() == 0.0 => index(state, n as i64),
                JValue::String(s) => field(state, &s),
                _ => match state {
                    Resolved::Single(_) => Resolved::Single(JValue::Null),
                    Resolved::Many(_) => Resolved::Many(Vec::new()),
                },
            },
        };
    }

    Ok(match state {
        Resolved::Single(value) => value,
        Resolved::Many(values) => JValue::array(values),
    })
}

fn into_values(state: Resolved) -> Vec<JValue> {
    match state {
        Resolved::Single(value) => vec![value],
        Resolved::Many(values) => values,
    }
}

fn length_of(value: &JValue) -> Option<JValue> {
    match value {
        JValue::String(s) => Some(JValue::from(s.chars().count())),
        JValue::Array(arr) => Some(JValue::from(arr.len())),
        _ => None,
    }
}

fn field(state: Resolved, name: &str) -> Resolved {
    match state {
        Resolved::Single(value) => {
            if name == "length" {
                if let Some(len) = length_of(&value) {
                    return Resolved::Single(len);
                }
            }
            match &value {
                JValue::Object(map) => {
                    Resolved::Single(map.get(name).cloned().unwrap_or(JValue::Null))
                }
                JValue::Array(arr) => Resolved::Many(
                    arr.iter()
                        .filter_map(|item| item.get(name).cloned())
                        .collect(),
                ),
                _ => Resolved::Single(JValue::Null),
            }
        }
        Resolved::Many(values) => {
            let mut out = Vec::with_capacity(values.len());
            for value in values {
                match &value {
                    JValue::Object(map) => {
                        if let Some(v) = map.get(name) {
                            out.push(v.clone());
                        }
                    }
                    JValue::Array(arr) if name != "length" => {
                        out.extend(arr.iter().filter_map(|item| item.get(name).cloned()));
                    }
                    other if name == "length" => out.extend(length_of(other)),
                    _ => {}
                }
            }
            Resolved::Many(out)
        }
    }
}

fn element(value: &JValue, i: i64) -> Option<JValue> {
    match value {
        JValue::Array(arr) => usize::try_from(i).ok().and_then(|i| arr.get(i)).cloned(),
        JValue::Object(map) => map.get(&i.to_string()).cloned(),
        _ => None,
    }
}

fn index(state: Resolved, i: i64) -> Resolved {
    match state {
        Resolved::Single(value) => Resolved::Single(element(&value, i).unwrap_or(JValue::Null)),
        Resolved::Many(values) => {
            Resolved::Many(values.iter().filter_map(|v| element(v, i)).collect())
        }
    }
}

fn children(value: JValue, out: &mut Vec<JValue>) {
    match value {
        JValue::Array(arr) => out.extend(arr.iter().cloned()),
        JValue::Object(map) => out.extend(map.values().cloned()),
        _ => {}
    }
}

fn wildcard(state: Resolved) -> Resolved {
    let mut out = Vec::new();
    for value in into_values(state) {
        children(value, &mut out);
    }
    Resolved::Many(out)
}

/// Pre-order collection of every value stored under `name`.
fn descend(
    value: &JValue,
    name: &str,
    depth: usize,
    limit: usize,
    found: &mut Vec<JValue>,
) -> Result<(), EvalError> {
    if depth > limit {
        log::warn!("recursive descent exceeded depth {}", limit);
        return Err(EvalError::ResourceLimitExceeded(format!(
            "document nesting deeper than {}",
            limit
        )));
    }
    match value {
        JValue::Object(map) => {
            if let Some(hit) = map.get(name) {
                found.push(hit.clone());
            }
            for child in map.values() {
                descend(child, name, depth + 1, limit, found)?;
            }
        }
        JValue::Array(arr) => {
            for child in arr.iter() {
                descend(child, name, depth + 1, limit, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Split a lodash-style dotted path (`a.b[0]['c.d']`) into field and index segments.
pub fn parse_dotted(path: &str) -> Vec<PathSegment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();

    let flush = |current: &mut String, segments: &mut Vec<PathSegment>| {
        if !current.is_empty() {
            segments.push(PathSegment::Field(std::mem::take(current)));
        }
    };

    while let Some(ch) = chars.next() {
        match ch {
            '.' => flush(&mut current, &mut segments),
            '[' => {
                flush(&mut current, &mut segments);
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                let inner = inner.trim();
                let unquoted = inner
                    .strip_prefix('\'')
                    .and_then(|s| s.strip_suffix('\''))
                    .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
                segments.push(match (unquoted, inner.parse::<i64>()) {
                    (Some(key), _) => PathSegment::Field(key.to_string()),
                    (None, Ok(i)) => PathSegment::Index(i),
                    (None, Err(_)) => PathSegment::Field(inner.to_string()),
                });
            }
            c => current.push(c),
        }
    }
    flush(&mut current, &mut segments);
    segments
}

/// Field-and-index walk with no plurality; `None` when any step is absent.
pub fn lookup_exact(value: &JValue, segments: &[PathSegment]) -> Option<JValue> {
    let mut current = value.clone();
    for segment in segments {
        current = match segment {
            PathSegment::Field(name) => match &current {
                JValue::Object(map) => map.get(name).cloned()?,
                JValue::Array(arr) => name
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| arr.get(i))
                    .cloned()?,
                _ => return None,
            },
            PathSegment::Index(i) => element(&current, *i)?,
            _ => return None,
        };
    }
    Some(current)
}
