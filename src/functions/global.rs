// Global functions and the JSON namespace

use super::{arg, num_arg, str_arg, CallbackHost};
use crate::datetime::DateKind;
use crate::signature::Signature;
use crate::utils::to_integer;
use crate::value::JValue;
use crate::EvalError;

pub const SIGNATURES: &[(&str, Signature)] = &[
    ("decodeURIComponent", Signature::exact(1)),
    ("encodeURIComponent", Signature::exact(1)),
    ("eval", Signature::range(1, 2)),
    ("instanceOf", Signature::exact(2)),
    ("isNaN", Signature::exact(1)),
    ("jsonPath", Signature::exact(2)),
    ("parseFloat", Signature::exact(1)),
    ("parseInt", Signature::range(1, 2)),
];

pub const JSON_SIGNATURES: &[(&str, Signature)] = &[
    ("parse", Signature::exact(1)),
    ("stringify", Signature::exact(1)),
];

pub(crate) fn call(
    host: &mut dyn CallbackHost,
    root: &JValue,
    name: &str,
    args: &[JValue],
) -> Result<JValue, EvalError> {
    Ok(match name {
        "encodeURIComponent" => JValue::from(encode_uri_component(&arg(args, 0).to_display_string())),
        "decodeURIComponent" => decode_uri_component(&arg(args, 0).to_display_string())
            .map(JValue::from)
            .unwrap_or(JValue::Null),
        "isNaN" => JValue::Bool(arg(args, 0).to_number().is_nan()),
        "parseFloat" => JValue::Number(parse_float(&arg(args, 0).to_display_string())),
        "parseInt" => {
            let radix = match args.get(1) {
                None | Some(JValue::Null) => 0.0,
                Some(_) => to_integer(num_arg(args, 1, 0.0)),
            };
            if radix != 0.0 && !(2.0..=36.0).contains(&radix) {
                return Ok(JValue::Number(f64::NAN));
            }
            JValue::Number(parse_int(&arg(args, 0).to_display_string(), radix as u32))
        }
        "instanceOf" => {
            let type_name = str_arg(args, 1).unwrap_or_default();
            JValue::Bool(instance_of(arg(args, 0), &type_name))
        }
        "eval" => match arg(args, 0) {
            JValue::String(text) => {
                let context = args.get(1).unwrap_or(root);
                log::debug!("nested eval: {}", text);
                host.eval_text(text, context)?
            }
            other => other.clone(),
        },
        "jsonPath" => {
            let path = arg(args, 1).to_display_string();
            host.resolve_path(arg(args, 0), &path)?
        }
        _ => return Err(EvalError::UnknownFunction(name.to_string())),
    })
}

pub(crate) fn call_json(name: &str, args: &[JValue]) -> Result<JValue, EvalError> {
    match name {
        "parse" => JValue::from_json_str(&arg(args, 0).to_display_string())
            .map_err(|e| EvalError::type_error(format!("JSON.parse: {}", e))),
        "stringify" => arg(args, 0)
            .to_json_string()
            .map(JValue::from)
            .map_err(|e| EvalError::type_error(format!("JSON.stringify: {}", e))),
        _ => Err(EvalError::UnknownFunction(format!("JSON.{}", name))),
    }
}

/// `value instanceof TypeName`. Arrays are not Objects; `Date` accepts any date flavour.
pub fn instance_of(value: &JValue, type_name: &str) -> bool {
    match (type_name, value) {
        ("Null", JValue::Null) => true,
        ("Boolean", JValue::Bool(_)) => true,
        ("String", JValue::String(_)) => true,
        ("Number", JValue::Number(_)) => true,
        ("Object", JValue::Object(_)) => true,
        ("Array", JValue::Array(_)) => true,
        ("Date", JValue::Date(_)) => true,
        ("DateTime", JValue::Date(d)) => d.kind == DateKind::DateTime,
        ("LocalDateTime", JValue::Date(d)) => d.kind == DateKind::LocalDateTime,
        ("LocalDate", JValue::Date(d)) => d.kind == DateKind::LocalDate,
        ("LocalTime", JValue::Date(d)) => d.kind == DateKind::LocalTime,
        _ => false,
    }
}

pub fn encode_uri_component(s: &str) -> String {
    urlencoding::encode(s)
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%2A", "*")
}

/// `None` for a stray `%` or an escape sequence that is not UTF-8.
pub fn decode_uri_component(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let well_formed = bytes.iter().enumerate().all(|(i, b)| {
        *b != b'%'
            || (bytes.get(i + 1).is_some_and(u8::is_ascii_hexdigit)
                && bytes.get(i + 2).is_some_and(u8::is_ascii_hexdigit))
    });
    if !well_formed {
        return None;
    }
    urlencoding::decode(s).ok().map(|text| text.into_owned())
}

/// Longest decimal-literal prefix after leading whitespace; NaN when there is none.
pub fn parse_float(s: &str) -> f64 {
    let s = s.trim_start();
    let unsigned = s.trim_start_matches(['+', '-']);
    if unsigned.starts_with("Infinity") && s.len() - unsigned.len() <= 1 {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
        }
    }
    if end == digits_start || &s[digits_start..end] == "." {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

/// `parseInt(text, radix)`; radix 0 means "10, or 16 with a 0x prefix".
pub fn parse_int(s: &str, radix: u32) -> f64 {
    let s = s.trim();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let hex_body = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"));
    let (radix, body) = match (radix, hex_body) {
        (0 | 16, Some(rest)) => (16, rest),
        (0, None) => (10, s),
        (r, _) => (r, s),
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    let digits: Vec<u32> = body.chars().map_while(|c| c.to_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .iter()
        .fold(0.0, |acc, d| acc * radix as f64 + *d as f64);
    if negative {
        -value
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvalue;

    #[test]
    fn test_uri_round_trip() {
        assert_eq!(encode_uri_component("a b&c=d/é"), "a%20b%26c%3Dd%2F%C3%A9");
        assert_eq!(encode_uri_component("(hi)!*'"), "(hi)!*'");
        assert_eq!(decode_uri_component("a%20b%26c").as_deref(), Some("a b&c"));
        assert_eq!(decode_uri_component("%E0%A4%A"), None);
        assert_eq!(decode_uri_component("%C3"), None);
        assert_eq!(decode_uri_component("100%"), None);
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.14abc"), 3.14);
        assert_eq!(parse_float("  -2.5e3x"), -2500.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float(".5"), 0.5);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("abc").is_nan());
        assert!(parse_float(".").is_nan());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", 0), 42.0);
        assert_eq!(parse_int("-0x1F", 0), -31.0);
        assert_eq!(parse_int("ff", 16), 255.0);
        assert_eq!(parse_int("101", 2), 5.0);
        assert_eq!(parse_int("3.9", 10), 3.0);
        assert!(parse_int("z", 10).is_nan());
        assert!(parse_int("1", 40).is_nan());
    }

    #[test]
    fn test_parse_int_rejects_out_of_range_radix() {
        let call_parse_int = |radix: f64| {
            let mut host = crate::Evaluator::new();
            call(&mut host, &JValue::Null, "parseInt", &[jvalue!("11"), JValue::Number(radix)]).unwrap()
        };
        assert!(call_parse_int(-2.0).as_f64().unwrap().is_nan());
        assert!(call_parse_int(1.0).as_f64().unwrap().is_nan());
        assert!(call_parse_int(37.0).as_f64().unwrap().is_nan());
        assert_eq!(call_parse_int(0.0), JValue::Number(11.0));
        assert_eq!(call_parse_int(2.0), JValue::Number(3.0));
    }

    #[test]
    fn test_instance_of() {
        assert!(instance_of(&jvalue!({"a": 1i64}), "Object"));
        assert!(!instance_of(&jvalue!([1i64]), "Object"));
        assert!(instance_of(&jvalue!([1i64]), "Array"));
        assert!(instance_of(&JValue::Null, "Null"));
        assert!(!instance_of(&jvalue!("1"), "Number"));
    }

    #[test]
    fn test_json_namespace() {
        let parsed = call_json("parse", &[jvalue!("{\"a\":[1,2]}")]).unwrap();
        assert_eq!(parsed, jvalue!({"a": [1i64, 2i64]}));
        let text = call_json("stringify", &[parsed]).unwrap();
        assert_eq!(text, jvalue!("{\"a\":[1,2]}"));
        let err = call_json("parse", &[jvalue!("{nope")]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::TypeError);
    }
}
