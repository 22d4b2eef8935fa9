// Structural matching for `match` arms
//
// Matching never fails: a pattern that cannot be applied (bad regex, range
// bounds that are not numbers, wrong subject kind) simply does not match.

use crate::ast::{KeyPresence, ObjectPatternEntry, Pattern};
use crate::functions::string::build_regex;
use crate::value::JValue;

/// Does `subject` satisfy `pattern`?
pub fn matches(subject: &JValue, pattern: &Pattern) -> bool {
    match pattern {
        Pattern::Wildcard => true,
        Pattern::Null => subject.is_null(),
        Pattern::Boolean(b) => subject.as_bool() == Some(*b),
        Pattern::Number(n) => subject.as_f64() == Some(*n),
        // Range-shaped text still matches itself verbatim
        Pattern::String(s) => {
            subject.as_str() == Some(s.as_str())
                || parse_range(s).is_some_and(|range| range.contains(subject))
        }
        Pattern::Regex { pattern, flags } => match (subject.as_str(), build_regex(pattern, flags)) {
            (Some(text), Ok(re)) => re.is_match(text),
            _ => false,
        },
        Pattern::Object(entries) => match subject.as_object() {
            Some(_) => entries.iter().all(|entry| entry_matches(subject, entry)),
            None => false,
        },
        Pattern::Array {
            prefix,
            suffix,
            spread,
        } => match subject.as_array() {
            Some(items) => array_matches(items, prefix, suffix, *spread),
            None => false,
        },
    }
}

fn entry_matches(subject: &JValue, entry: &ObjectPatternEntry) -> bool {
    match (subject.get(&entry.key), entry.presence) {
        (None, KeyPresence::Optional) => true,
        (None, _) => false,
        (Some(JValue::Null), KeyPresence::Required) => false,
        (Some(value), _) => matches(value, &entry.value),
    }
}

fn array_matches(items: &[JValue], prefix: &[Pattern], suffix: &[Pattern], spread: bool) -> bool {
    let fixed = prefix.len() + suffix.len();
    if spread {
        if items.len() < fixed {
            return false;
        }
    } else if items.len() != fixed {
        return false;
    }
    let tail = &items[items.len() - suffix.len()..];
    prefix.iter().zip(items).all(|(p, v)| matches(v, p))
        && suffix.iter().zip(tail).all(|(p, v)| matches(v, p))
}

/// `"N..M"` (upper bound exclusive) or `"N..M="` (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Range {
    low: f64,
    high: f64,
    inclusive: bool,
}

impl Range {
    fn contains(&self, subject: &JValue) -> bool {
        let n = match subject {
            JValue::Number(n) => *n,
            JValue::String(_) => subject.to_number(),
            _ => return false,
        };
        if n.is_nan() || n < self.low {
            return false;
        }
        if self.inclusive {
            n <= self.high
        } else {
            n < self.high
        }
    }
}

fn parse_range(s: &str) -> Option<Range> {
    let (low, rest) = s.split_once("..")?;
    let (high, inclusive) = match rest.strip_suffix('=') {
        Some(high) => (high, true),
        None => (rest, false),
    };
    Some(Range {
        low: low.trim().parse().ok()?,
        high: high.trim().parse().ok()?,
        inclusive,
    })
}
