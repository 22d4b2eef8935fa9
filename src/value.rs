// JValue: Arc-wrapped value type for O(1) cloning
// The runtime representation of every value the evaluator touches

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::ast::AstNode;
use crate::datetime::SnapDate;
use crate::utils::format_number;

/// A JSON-like value with O(1) clone semantics via Arc-wrapping.
///
/// Standard JSON types (Array, Object, String) are wrapped in Arc for cheap
/// cloning and so that documents can be shared between threads. `Date` is a
/// first-class scalar. `Regex` and `Lambda` are internal kinds produced by
/// regex literals and arrow functions; they never come from JSON input.
#[derive(Clone, Debug)]
pub enum JValue {
    // Standard JSON types
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Array(Arc<Vec<JValue>>),
    Object(Arc<IndexMap<String, JValue>>),

    Date(SnapDate),

    // Internal types
    Regex {
        pattern: Arc<str>,
        flags: Arc<str>,
    },
    Lambda(Arc<Lambda>),
}

/// An arrow function together with the bindings visible where it was written.
#[derive(Debug)]
pub struct Lambda {
    pub params: Vec<String>,
    pub body: Arc<AstNode>,
    pub captured: Vec<(String, JValue)>,
}

// ── Type checks ──────────────────────────────────────────────────────────────

impl JValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, JValue::Null)
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, JValue::String(_))
    }

    #[inline]
    pub fn is_date(&self) -> bool {
        matches!(self, JValue::Date(_))
    }

    /// The name reported by `typeof`.
    pub fn type_name(&self) -> &'static str {
        match self {
            JValue::Null => "null",
            JValue::Bool(_) => "boolean",
            JValue::Number(_) => "number",
            JValue::String(_) => "string",
            JValue::Array(_) => "array",
            JValue::Object(_) => "object",
            JValue::Date(_) => "date",
            JValue::Regex { .. } => "regexp",
            JValue::Lambda(_) => "function",
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────────

impl JValue {
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_array(&self) -> Option<&Vec<JValue>> {
        match self {
            JValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    #[inline]
    pub fn as_object(&self) -> Option<&IndexMap<String, JValue>> {
        match self {
            JValue::Object(map) => Some(map),
            _ => None,
        }
    }

    #[inline]
    pub fn as_date(&self) -> Option<&SnapDate> {
        match self {
            JValue::Date(d) => Some(d),
            _ => None,
        }
    }

    /// Index into an object by key.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&JValue> {
        match self {
            JValue::Object(map) => map.get(key),
            _ => None,
        }
    }
}

// ── Constructors ─────────────────────────────────────────────────────────────

impl JValue {
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        JValue::String(s.into())
    }

    #[inline]
    pub fn array(v: Vec<JValue>) -> Self {
        JValue::Array(Arc::new(v))
    }

    #[inline]
    pub fn object(m: IndexMap<String, JValue>) -> Self {
        JValue::Object(Arc::new(m))
    }

    #[inline]
    pub fn regex(pattern: impl Into<Arc<str>>, flags: impl Into<Arc<str>>) -> Self {
        JValue::Regex {
            pattern: pattern.into(),
            flags: flags.into(),
        }
    }
}

// ── Coercions ────────────────────────────────────────────────────────────────

impl JValue {
    /// Numeric coercion used by arithmetic and relational operators.
    ///
    /// Never fails: anything without a numeric reading becomes NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            JValue::Null => 0.0,
            JValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            JValue::Number(n) => *n,
            JValue::String(s) => string_to_number(s),
            JValue::Date(d) => d.millis() as f64,
            _ => f64::NAN,
        }
    }

    /// Text used when a value takes part in string concatenation.
    pub fn to_display_string(&self) -> String {
        match self {
            JValue::String(s) => s.to_string(),
            JValue::Number(n) => format_number(*n),
            JValue::Date(d) => d.to_iso_string(),
            JValue::Regex { pattern, flags } => format!("/{}/{}", pattern, flags),
            JValue::Lambda(_) => "[function]".to_string(),
            other => other.to_string(),
        }
    }

    /// Conditional truthiness: null, false, 0, NaN and "" are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            JValue::Null => false,
            JValue::Bool(b) => *b,
            JValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// Equality as used by `==`/`!=` (loose) and `===`/`!==` (strict).
    pub fn equals(&self, other: &JValue, strict: bool) -> bool {
        if strict {
            return self == other;
        }
        match (self, other) {
            (JValue::Null, JValue::Null) => true,
            (JValue::Null, _) | (_, JValue::Null) => false,
            (
                JValue::Number(_) | JValue::String(_) | JValue::Bool(_),
                JValue::Number(_) | JValue::String(_) | JValue::Bool(_),
            ) if std::mem::discriminant(self) != std::mem::discriminant(other) => {
                self.to_number() == other.to_number()
            }
            (JValue::Date(d), JValue::Number(n)) | (JValue::Number(n), JValue::Date(d)) => {
                d.millis() as f64 == *n
            }
            (JValue::Date(d), JValue::String(s)) | (JValue::String(s), JValue::Date(d)) => {
                d.to_iso_string() == s.as_ref()
            }
            _ => self == other,
        }
    }
}

/// ECMAScript `StringToNumber`: blank is 0, hex is accepted, anything else
/// that is not a plain decimal literal is NaN.
fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }
    let plain = t
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !plain {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

// ── From impls ───────────────────────────────────────────────────────────────

impl From<bool> for JValue {
    #[inline]
    fn from(b: bool) -> Self {
        JValue::Bool(b)
    }
}

impl From<i64> for JValue {
    #[inline]
    fn from(n: i64) -> Self {
        JValue::Number(n as f64)
    }
}

impl From<i32> for JValue {
    #[inline]
    fn from(n: i32) -> Self {
        JValue::Number(n as f64)
    }
}

impl From<usize> for JValue {
    #[inline]
    fn from(n: usize) -> Self {
        JValue::Number(n as f64)
    }
}

impl From<f64> for JValue {
    #[inline]
    fn from(n: f64) -> Self {
        JValue::Number(n)
    }
}

impl From<&str> for JValue {
    #[inline]
    fn from(s: &str) -> Self {
        JValue::String(s.into())
    }
}

impl From<String> for JValue {
    #[inline]
    fn from(s: String) -> Self {
        JValue::String(s.into())
    }
}

impl From<SnapDate> for JValue {
    #[inline]
    fn from(d: SnapDate) -> Self {
        JValue::Date(d)
    }
}

impl From<Vec<JValue>> for JValue {
    #[inline]
    fn from(v: Vec<JValue>) -> Self {
        JValue::Array(Arc::new(v))
    }
}

impl From<IndexMap<String, JValue>> for JValue {
    #[inline]
    fn from(m: IndexMap<String, JValue>) -> Self {
        JValue::Object(Arc::new(m))
    }
}

// ── PartialEq ────────────────────────────────────────────────────────────────

/// Structural, strict equality: same kind and same content. NaN is never
/// equal to anything, including itself.
impl PartialEq for JValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JValue::Null, JValue::Null) => true,
            (JValue::Bool(a), JValue::Bool(b)) => a == b,
            (JValue::Number(a), JValue::Number(b)) => a == b,
            (JValue::String(a), JValue::String(b)) => a == b,
            (JValue::Array(a), JValue::Array(b)) => a == b,
            (JValue::Object(a), JValue::Object(b)) => a == b,
            (JValue::Date(a), JValue::Date(b)) => a.instant == b.instant,
            (
                JValue::Regex {
                    pattern: ap,
                    flags: af,
                },
                JValue::Regex {
                    pattern: bp,
                    flags: bf,
                },
            ) => ap == bp && af == bf,
            (JValue::Lambda(a), JValue::Lambda(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────────

/// Compact JSON text.
impl fmt::Display for JValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JValue::Null => write!(f, "null"),
            JValue::Bool(b) => write!(f, "{}", b),
            JValue::Number(n) => write_json_number(*n, f),
            JValue::String(s) => write!(f, "\"{}\"", escape_json_string(s)),
            JValue::Array(arr) => {
                write!(f, "[")?;
                for (i, v) in arr.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            JValue::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "\"{}\":{}", escape_json_string(k), v)?;
                }
                write!(f, "}}")
            }
            JValue::Date(d) => write!(f, "\"{}\"", d.to_iso_string()),
            JValue::Regex { pattern, flags } => {
                write!(f, "\"/{}/{}\"", escape_json_string(pattern), flags)
            }
            JValue::Lambda(_) => write!(f, "null"),
        }
    }
}

fn escape_json_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c < '\x20' => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

fn write_json_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if !n.is_finite() {
        // NaN and +/-Infinity have no JSON form and serialize as null
        write!(f, "null")
    } else {
        write!(f, "{}", format_number(n))
    }
}

// ── Serialization ────────────────────────────────────────────────────────────

impl Serialize for JValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            JValue::Null | JValue::Lambda(_) => serializer.serialize_none(),
            JValue::Bool(b) => serializer.serialize_bool(*b),
            JValue::Number(n) => {
                if n.is_nan() || n.is_infinite() {
                    serializer.serialize_none()
                } else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                    serializer.serialize_i64(*n as i64)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            JValue::String(s) => serializer.serialize_str(s),
            JValue::Array(arr) => {
                let mut seq = serializer.serialize_seq(Some(arr.len()))?;
                for v in arr.iter() {
                    seq.serialize_element(v)?;
                }
                seq.end()
            }
            JValue::Object(map) => {
                let mut m = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            JValue::Date(d) => serializer.serialize_str(&d.to_iso_string()),
            JValue::Regex { pattern, flags } => {
                let mut m = serializer.serialize_map(Some(2))?;
                m.serialize_entry("pattern", &**pattern)?;
                m.serialize_entry("flags", &**flags)?;
                m.end()
            }
        }
    }
}

// ── Deserialization (single-pass JSON→JValue) ────────────────────────────────

impl<'de> serde::Deserialize<'de> for JValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(JValueVisitor)
    }
}

struct JValueVisitor;

impl<'de> Visitor<'de> for JValueVisitor {
    type Value = JValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "any valid JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<JValue, E> {
        Ok(JValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<JValue, E> {
        Ok(JValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<JValue, E> {
        Ok(JValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<JValue, E> {
        Ok(JValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<JValue, E> {
        Ok(JValue::string(v))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<JValue, E> {
        Ok(JValue::String(v.into()))
    }

    fn visit_none<E: de::Error>(self) -> Result<JValue, E> {
        Ok(JValue::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<JValue, E> {
        Ok(JValue::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<JValue, A::Error> {
        let mut vec = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(elem) = seq.next_element()? {
            vec.push(elem);
        }
        Ok(JValue::array(vec))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<JValue, A::Error> {
        let mut m = IndexMap::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((k, v)) = map.next_entry()? {
            m.insert(k, v);
        }
        Ok(JValue::object(m))
    }
}

// ── JSON string I/O ──────────────────────────────────────────────────────────

impl JValue {
    /// Serialize to a JSON string.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a JSON string into a JValue (single-pass, no intermediate serde_json::Value).
    pub fn from_json_str(s: &str) -> Result<JValue, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// ── Conversion from serde_json::Value ────────────────────────────────────────

impl From<serde_json::Value> for JValue {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => JValue::Null,
            serde_json::Value::Bool(b) => JValue::Bool(b),
            serde_json::Value::Number(n) => JValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => JValue::String(s.into()),
            serde_json::Value::Array(arr) => {
                JValue::Array(Arc::new(arr.into_iter().map(JValue::from).collect()))
            }
            serde_json::Value::Object(map) => {
                let m: IndexMap<String, JValue> =
                    map.into_iter().map(|(k, v)| (k, JValue::from(v))).collect();
                JValue::Object(Arc::new(m))
            }
        }
    }
}

// ── Conversion to serde_json::Value ──────────────────────────────────────────

impl From<&JValue> for serde_json::Value {
    fn from(v: &JValue) -> Self {
        match v {
            JValue::Null | JValue::Lambda(_) => serde_json::Value::Null,
            JValue::Bool(b) => serde_json::Value::Bool(*b),
            JValue::Number(n) => {
                if n.is_nan() || n.is_infinite() {
                    serde_json::Value::Null
                } else if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
                    serde_json::json!(*n as i64)
                } else {
                    serde_json::json!(*n)
                }
            }
            JValue::String(s) => serde_json::Value::String(s.to_string()),
            JValue::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(serde_json::Value::from).collect())
            }
            JValue::Object(map) => {
                let m: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v)))
                    .collect();
                serde_json::Value::Object(m)
            }
            JValue::Date(d) => serde_json::Value::String(d.to_iso_string()),
            JValue::Regex { pattern, flags } => {
                serde_json::json!({ "pattern": pattern.to_string(), "flags": flags.to_string() })
            }
        }
    }
}

// ── jvalue! macro ────────────────────────────────────────────────────────────

/// Macro for constructing JValue literals, similar to serde_json::json!
///
/// Usage:
///   jvalue!(null)           → JValue::Null
///   jvalue!(true)           → JValue::Bool(true)
///   jvalue!(42)             → JValue::Number(42.0)
///   jvalue!("hello")        → JValue::String(Arc::from("hello"))
///   jvalue!([1, 2, 3])      → JValue::Array(Arc::new(vec![...]))
///   jvalue!({"k": v, ...})  → JValue::Object(Arc::new(IndexMap from pairs))
///   jvalue!(expr)           → JValue::from(expr)
#[macro_export]
macro_rules! jvalue {
    (null) => {
        $crate::value::JValue::Null
    };

    (true) => {
        $crate::value::JValue::Bool(true)
    };

    (false) => {
        $crate::value::JValue::Bool(false)
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::value::JValue::Array(std::sync::Arc::new(vec![ $( $crate::jvalue!($elem) ),* ]))
    };

    ({ $($key:tt : $val:tt),* $(,)? }) => {
        {
            let mut map = indexmap::IndexMap::new();
            $(
                map.insert(($key).to_string(), $crate::jvalue!($val));
            )*
            $crate::value::JValue::Object(std::sync::Arc::new(map))
        }
    };

    ($other:expr) => {
        $crate::value::JValue::from($other)
    };
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::{parse_default, DateKind};

    #[test]
    fn test_clone_is_cheap() {
        let arr = JValue::array(vec![JValue::from(1i64), JValue::from(2i64)]);
        let arr2 = arr.clone();
        if let (JValue::Array(a), JValue::Array(b)) = (&arr, &arr2) {
            assert!(Arc::ptr_eq(a, b));
        } else {
            panic!("expected arrays");
        }
    }

    #[test]
    fn test_type_names() {
        assert_eq!(JValue::Null.type_name(), "null");
        assert_eq!(JValue::array(vec![]).type_name(), "array");
        assert_eq!(JValue::object(IndexMap::new()).type_name(), "object");
        let date = JValue::Date(SnapDate::now(DateKind::DateTime));
        assert_eq!(date.type_name(), "date");
        assert_eq!(JValue::regex("a+", "g").type_name(), "regexp");
    }

    #[test]
    fn test_to_number() {
        assert_eq!(JValue::string("42").to_number(), 42.0);
        assert_eq!(JValue::string(" 1.5 ").to_number(), 1.5);
        assert_eq!(JValue::string("").to_number(), 0.0);
        assert_eq!(JValue::string("0x1F").to_number(), 31.0);
        assert!(JValue::string("abc").to_number().is_nan());
        assert!(JValue::string("inf").to_number().is_nan());
        assert_eq!(JValue::Bool(true).to_number(), 1.0);
        assert_eq!(JValue::Null.to_number(), 0.0);
        assert!(JValue::array(vec![]).to_number().is_nan());
    }

    #[test]
    fn test_display_string() {
        assert_eq!(JValue::from(1.0).to_display_string(), "1");
        assert_eq!(JValue::from(2.5).to_display_string(), "2.5");
        assert_eq!(JValue::string("x").to_display_string(), "x");
        assert_eq!(jvalue!([1, "a"]).to_display_string(), "[1,\"a\"]");
        assert_eq!(jvalue!({"a": null}).to_display_string(), "{\"a\":null}");
        let date = JValue::Date(parse_default("2020-01-02T03:04:05Z").unwrap());
        assert_eq!(date.to_display_string(), "2020-01-02T03:04:05.000Z");
    }

    #[test]
    fn test_truthiness() {
        assert!(!JValue::Null.is_truthy());
        assert!(!JValue::from(0.0).is_truthy());
        assert!(!JValue::from(f64::NAN).is_truthy());
        assert!(!JValue::string("").is_truthy());
        assert!(JValue::array(vec![]).is_truthy());
        assert!(JValue::object(IndexMap::new()).is_truthy());
    }

    #[test]
    fn test_loose_and_strict_equality() {
        let one = JValue::from(1.0);
        let one_str = JValue::string("1");
        assert!(one.equals(&one_str, false));
        assert!(!one.equals(&one_str, true));
        assert!(JValue::Bool(true).equals(&one, false));
        assert!(!JValue::Null.equals(&JValue::from(0.0), false));
        assert!(JValue::Null.equals(&JValue::Null, true));
        assert!(!JValue::from(f64::NAN).equals(&JValue::from(f64::NAN), true));
        assert!(jvalue!({"a": [1, 2]}).equals(&jvalue!({"a": [1, 2]}), true));
    }

    #[test]
    fn test_jvalue_macro() {
        let obj = jvalue!({"name": "Alice", "age": 30i64});
        assert_eq!(obj.get("name").and_then(|v| v.as_str()), Some("Alice"));
        let arr = jvalue!([1i64, 2i64, 3i64]);
        assert_eq!(arr.as_array().map(|a| a.len()), Some(3));
    }

    #[test]
    fn test_serde_roundtrip() {
        let v = jvalue!({"name": "Alice", "scores": [1i64, 2.5, 3i64], "active": true});
        let json_str = v.to_json_string().unwrap();
        assert_eq!(json_str, r#"{"name":"Alice","scores":[1,2.5,3],"active":true}"#);
        let parsed = JValue::from_json_str(&json_str).unwrap();
        assert_eq!(v, parsed);
    }

    #[test]
    fn test_from_serde_json_preserves_order() {
        let jv = JValue::from_json_str(r#"{"z": 1, "a": 2}"#).unwrap();
        let keys: Vec<&String> = jv.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
