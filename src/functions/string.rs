// String methods
//
// Positions are counted in characters, not bytes.

use std::cmp::Ordering;

use regex::{Captures, Regex};

use super::{arg, check_string_length, num_arg, str_arg, CallbackHost};
use crate::signature::Signature;
use crate::utils::{format_number, lower_first, relative_index, split_words, to_integer, upper_first};
use crate::value::JValue;
use crate::EvalError;

pub const SIGNATURES: &[(&str, Signature)] = &[
    ("camelCase", Signature::exact(0)),
    ("capitalize", Signature::exact(0)),
    ("charAt", Signature::range(0, 1)),
    ("charCodeAt", Signature::range(0, 1)),
    ("concat", Signature::at_least(0)),
    ("contains", Signature::range(1, 2)),
    ("endsWith", Signature::range(1, 2)),
    ("indexOf", Signature::range(1, 2)),
    ("kebabCase", Signature::exact(0)),
    ("lastIndexOf", Signature::range(1, 2)),
    ("length", Signature::exact(0)),
    ("localeCompare", Signature::exact(1)),
    ("lowerFirst", Signature::exact(0)),
    ("match", Signature::exact(1)),
    ("repeat", Signature::exact(1)),
    ("replace", Signature::exact(2)),
    ("replaceAll", Signature::exact(2)),
    ("search", Signature::exact(1)),
    ("slice", Signature::range(0, 2)),
    ("snakeCase", Signature::exact(0)),
    ("split", Signature::range(0, 2)),
    ("sprintf", Signature::at_least(0)),
    ("startsWith", Signature::range(1, 2)),
    ("substr", Signature::range(0, 2)),
    ("substring", Signature::range(0, 2)),
    ("toLowerCase", Signature::exact(0)),
    ("toUpperCase", Signature::exact(0)),
    ("trim", Signature::exact(0)),
    ("trimLeft", Signature::exact(0)),
    ("trimRight", Signature::exact(0)),
    ("upperFirst", Signature::exact(0)),
];

/// Compile a regex literal. `i`, `m` and `s` become inline flags; `g` is
/// handled by the callers that care about it.
pub fn build_regex(pattern: &str, flags: &str) -> Result<Regex, EvalError> {
    let inline: String = flags.chars().filter(|c| matches!(c, 'i' | 'm' | 's')).collect();
    let source = if inline.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", inline, pattern)
    };
    Regex::new(&source).map_err(|e| {
        EvalError::type_error(format!("Invalid regular expression /{}/: {}", pattern, e))
    })
}

/// A regex argument: a regex literal, or text compiled as a pattern.
fn regex_arg(value: &JValue) -> Result<(Regex, bool), EvalError> {
    match value {
        JValue::Regex { pattern, flags } => Ok((build_regex(pattern, flags)?, flags.contains('g'))),
        other => Ok((build_regex(&other.to_display_string(), "")?, false)),
    }
}

/// Translate `$1`, `$<name>`, `$&` and `$$` into the regex crate's `${..}` syntax.
fn translate_replacement(replacement: &str) -> String {
    let chars: Vec<char> = replacement.chars().collect();
    let mut out = String::with_capacity(replacement.len() + 4);
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars.get(i + 1) {
            Some('&') => {
                out.push_str("${0}");
                i += 2;
            }
            Some(d) if d.is_ascii_digit() => {
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_ascii_digit() && j < i + 3 {
                    j += 1;
                }
                let digits: String = chars[i + 1..j].iter().collect();
                out.push_str(&format!("${{{}}}", digits));
                i = j;
            }
            Some('<') => match chars[i + 2..].iter().position(|c| *c == '>') {
                Some(end) => {
                    let name: String = chars[i + 2..i + 2 + end].iter().collect();
                    out.push_str(&format!("${{{}}}", name));
                    i += end + 3;
                }
                None => {
                    out.push_str("$$");
                    i += 1;
                }
            },
            Some('$') => {
                out.push_str("$$");
                i += 2;
            }
            _ => {
                out.push_str("$$");
                i += 1;
            }
        }
    }
    out
}

fn char_offset(s: &str, byte: usize) -> usize {
    s[..byte].chars().count()
}

fn find_chars(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(hay.len()));
    }
    if needle.len() > hay.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()] == *needle)
}

fn rfind_chars(hay: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.len() > hay.len() {
        return None;
    }
    let last = (hay.len() - needle.len()).min(from);
    (0..=last).rev().find(|&i| hay[i..i + needle.len()] == *needle)
}

fn clamp_index(n: f64, len: usize) -> usize {
    to_integer(n).max(0.0).min(len as f64) as usize
}

fn text(chars: &[char]) -> JValue {
    JValue::String(chars.iter().collect::<String>().into())
}

fn match_array(caps: &Captures<'_>) -> JValue {
    JValue::array(
        caps.iter()
            .map(|m| match m {
                Some(m) => JValue::string(m.as_str()),
                None => JValue::Null,
            })
            .collect(),
    )
}

pub(crate) fn call(
    host: &mut dyn CallbackHost,
    root: &JValue,
    s: &str,
    name: &str,
    args: &[JValue],
) -> Result<JValue, EvalError> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();

    Ok(match name {
        "camelCase" => {
            let words = split_words(s);
            let mut out = String::new();
            for (i, word) in words.iter().enumerate() {
                let lower = word.to_lowercase();
                if i == 0 {
                    out.push_str(&lower);
                } else {
                    out.push_str(&upper_first(&lower));
                }
            }
            JValue::from(out)
        }
        "capitalize" => JValue::from(upper_first(&s.to_lowercase())),
        "kebabCase" | "snakeCase" => {
            let sep = if name == "kebabCase" { "-" } else { "_" };
            let words: Vec<String> = split_words(s).iter().map(|w| w.to_lowercase()).collect();
            JValue::from(words.join(sep))
        }
        "lowerFirst" => JValue::from(lower_first(s)),
        "upperFirst" => JValue::from(upper_first(s)),
        "toLowerCase" => JValue::from(s.to_lowercase()),
        "toUpperCase" => JValue::from(s.to_uppercase()),
        "trim" => JValue::string(s.trim()),
        "trimLeft" => JValue::string(s.trim_start()),
        "trimRight" => JValue::string(s.trim_end()),
        "length" => JValue::from(len),

        "charAt" => {
            let i = to_integer(num_arg(args, 0, 0.0));
            if i < 0.0 || i >= len as f64 {
                JValue::string("")
            } else {
                text(&chars[i as usize..i as usize + 1])
            }
        }
        // Indexed by UTF-16 code unit, so astral characters yield their surrogates
        "charCodeAt" => {
            let i = to_integer(num_arg(args, 0, 0.0));
            if i < 0.0 {
                JValue::Number(f64::NAN)
            } else {
                s.encode_utf16()
                    .nth(i as usize)
                    .map(|unit| JValue::Number(unit as f64))
                    .unwrap_or(JValue::Number(f64::NAN))
            }
        }
        "concat" => {
            let mut out = s.to_string();
            for a in args {
                let piece = a.to_display_string();
                check_string_length(out.len().saturating_add(piece.len()), host.max_string_length())?;
                out.push_str(&piece);
            }
            JValue::from(out)
        }
        "contains" => {
            let needle: Vec<char> = str_arg(args, 0).unwrap_or_default().chars().collect();
            let from = clamp_index(num_arg(args, 1, 0.0), len);
            JValue::Bool(find_chars(&chars, &needle, from).is_some())
        }
        "startsWith" => {
            let needle: Vec<char> = str_arg(args, 0).unwrap_or_default().chars().collect();
            let from = clamp_index(num_arg(args, 1, 0.0), len);
            JValue::Bool(chars[from..].starts_with(&needle))
        }
        "endsWith" => {
            let needle: Vec<char> = str_arg(args, 0).unwrap_or_default().chars().collect();
            let end = clamp_index(num_arg(args, 1, len as f64), len);
            JValue::Bool(chars[..end].ends_with(&needle))
        }
        "indexOf" => {
            let needle: Vec<char> = str_arg(args, 0).unwrap_or_default().chars().collect();
            let from = clamp_index(num_arg(args, 1, 0.0), len);
            match find_chars(&chars, &needle, from) {
                Some(i) => JValue::from(i),
                None => JValue::Number(-1.0),
            }
        }
        "lastIndexOf" => {
            let needle: Vec<char> = str_arg(args, 0).unwrap_or_default().chars().collect();
            let from_arg = num_arg(args, 1, f64::INFINITY);
            let from = if from_arg.is_nan() {
                len
            } else {
                clamp_index(from_arg, len)
            };
            match rfind_chars(&chars, &needle, from) {
                Some(i) => JValue::from(i),
                None => JValue::Number(-1.0),
            }
        }
        "localeCompare" => {
            let other = str_arg(args, 0).unwrap_or_default();
            JValue::Number(match s.cmp(other.as_str()) {
                Ordering::Less => -1.0,
                Ordering::Equal => 0.0,
                Ordering::Greater => 1.0,
            })
        }
        "repeat" => {
            let n = to_integer(num_arg(args, 0, 0.0));
            if n < 0.0 || n.is_infinite() {
                return Err(EvalError::type_error(format!(
                    "Invalid count value: {}",
                    format_number(n)
                )));
            }
            let count = n as usize;
            check_string_length(s.len().saturating_mul(count), host.max_string_length())?;
            JValue::from(s.repeat(count))
        }

        "slice" => {
            let start = relative_index(num_arg(args, 0, 0.0), len);
            let end = relative_index(num_arg(args, 1, len as f64), len);
            if start >= end {
                JValue::string("")
            } else {
                text(&chars[start..end])
            }
        }
        "substring" => {
            let a = clamp_index(num_arg(args, 0, 0.0), len);
            let b = clamp_index(num_arg(args, 1, len as f64), len);
            let (from, to) = if a <= b { (a, b) } else { (b, a) };
            text(&chars[from..to])
        }
        "substr" => {
            let start = relative_index(num_arg(args, 0, 0.0), len);
            let count = to_integer(num_arg(args, 1, len as f64)).max(0.0);
            let end = (start as f64 + count).min(len as f64) as usize;
            text(&chars[start..end.max(start)])
        }

        "split" => split(s, &chars, args)?,
        "match" => {
            let (re, global) = regex_arg(arg(args, 0))?;
            if global {
                let all: Vec<JValue> = re.find_iter(s).map(|m| JValue::string(m.as_str())).collect();
                if all.is_empty() {
                    JValue::Null
                } else {
                    JValue::array(all)
                }
            } else {
                re.captures(s).map(|caps| match_array(&caps)).unwrap_or(JValue::Null)
            }
        }
        "search" => {
            let (re, _) = regex_arg(arg(args, 0))?;
            match re.find(s) {
                Some(m) => JValue::from(char_offset(s, m.start())),
                None => JValue::Number(-1.0),
            }
        }
        "replace" | "replaceAll" => replace(host, root, s, name == "replaceAll", args)?,
        "sprintf" => JValue::from(sprintf(s, args)),
        _ => return Err(EvalError::UnknownFunction(format!("string.{}", name))),
    })
}

fn split(s: &str, chars: &[char], args: &[JValue]) -> Result<JValue, EvalError> {
    let limit = match args.get(1) {
        Some(v) => to_integer(v.to_number()).max(0.0) as usize,
        None => usize::MAX,
    };
    let parts: Vec<JValue> = match args.first() {
        None | Some(JValue::Null) => vec![JValue::string(s)],
        Some(JValue::Regex { pattern, flags }) => {
            let re = build_regex(pattern, flags)?;
            re.split(s).map(JValue::string).collect()
        }
        Some(sep) => {
            let sep = sep.to_display_string();
            if sep.is_empty() {
                chars.iter().map(|c| JValue::from(c.to_string())).collect()
            } else {
                s.split(sep.as_str()).map(JValue::string).collect()
            }
        }
    };
    Ok(JValue::array(parts.into_iter().take(limit).collect()))
}

fn replace(
    host: &mut dyn CallbackHost,
    root: &JValue,
    s: &str,
    all: bool,
    args: &[JValue],
) -> Result<JValue, EvalError> {
    let replacement = arg(args, 1);

    if let JValue::Lambda(f) = replacement {
        let (re, global) = match arg(args, 0) {
            JValue::Regex { .. } => regex_arg(arg(args, 0))?,
            other => (build_regex(&regex::escape(&other.to_display_string()), "")?, false),
        };
        let limit = if all || global { usize::MAX } else { 1 };
        let mut out = String::with_capacity(s.len());
        let mut last = 0;
        for caps in re.captures_iter(s).take(limit) {
            let Some(whole) = caps.get(0) else { continue };
            out.push_str(&s[last..whole.start()]);
            let mut call_args: Vec<JValue> = caps
                .iter()
                .map(|m| m.map(|m| JValue::string(m.as_str())).unwrap_or(JValue::Null))
                .collect();
            call_args.push(JValue::from(char_offset(s, whole.start())));
            call_args.push(JValue::string(s));
            out.push_str(&host.call(f, &call_args, root)?.to_display_string());
            last = whole.end();
        }
        out.push_str(&s[last..]);
        return Ok(JValue::from(out));
    }

    let replacement = replacement.to_display_string();
    Ok(match arg(args, 0) {
        JValue::Regex { pattern, flags } => {
            let re = build_regex(pattern, flags)?;
            let rep = translate_replacement(&replacement);
            if all || flags.contains('g') {
                JValue::from(re.replace_all(s, rep.as_str()).into_owned())
            } else {
                JValue::from(re.replace(s, rep.as_str()).into_owned())
            }
        }
        other => {
            let needle = other.to_display_string();
            if all {
                JValue::from(s.replace(needle.as_str(), &replacement))
            } else {
                JValue::from(s.replacen(needle.as_str(), &replacement, 1))
            }
        }
    })
}

/// printf-style formatting: `%s %d %i %f %j %%`, optional `.N` precision on
/// `%f`, and positional `%2$s`. A placeholder without a matching argument is
/// left in the output unchanged.
pub fn sprintf(format: &str, args: &[JValue]) -> String {
    let chars: Vec<char> = format.chars().collect();
    let mut out = String::with_capacity(format.len());
    let mut next_arg = 0;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'%') {
            out.push('%');
            i += 2;
            continue;
        }

        let start = i;
        let mut j = i + 1;

        // %N$...
        let mut position = None;
        let digits_end = (j..chars.len())
            .find(|&k| !chars[k].is_ascii_digit())
            .unwrap_or(chars.len());
        if digits_end > j && chars.get(digits_end) == Some(&'$') {
            let digits: String = chars[j..digits_end].iter().collect();
            position = digits.parse::<usize>().ok().filter(|p| *p > 0);
            j = digits_end + 1;
        }

        // .N
        let mut precision = None;
        if chars.get(j) == Some(&'.') {
            let p_end = (j + 1..chars.len())
                .find(|&k| !chars[k].is_ascii_digit())
                .unwrap_or(chars.len());
            let digits: String = chars[j + 1..p_end].iter().collect();
            precision = digits.parse::<usize>().ok();
            j = p_end;
        }

        let conversion = match chars.get(j) {
            Some(&c) if matches!(c, 's' | 'd' | 'i' | 'f' | 'j') => c,
            _ => {
                out.push('%');
                i += 1;
                continue;
            }
        };
        let placeholder: String = chars[start..=j].iter().collect();
        i = j + 1;

        let value = match position {
            Some(p) => args.get(p - 1),
            None => {
                next_arg += 1;
                args.get(next_arg - 1)
            }
        };
        let Some(value) = value else {
            out.push_str(&placeholder);
            continue;
        };

        match conversion {
            's' => out.push_str(&value.to_display_string()),
            'd' | 'i' => out.push_str(&format_number(value.to_number().trunc())),
            'f' => {
                let n = value.to_number();
                match precision {
                    Some(p) if n.is_finite() => out.push_str(&format!("{:.*}", p, n)),
                    _ => out.push_str(&format_number(n)),
                }
            }
            _ => out.push_str(&value.to_string()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jvalue;

    #[test]
    fn test_translate_replacement() {
        assert_eq!(translate_replacement("$1-$2"), "${1}-${2}");
        assert_eq!(translate_replacement("[$&]"), "[${0}]");
        assert_eq!(translate_replacement("$$"), "$$");
        assert_eq!(translate_replacement("cost: $"), "cost: $$");
        assert_eq!(translate_replacement("$<year>"), "${year}");
    }

    #[test]
    fn test_build_regex_flags() {
        let re = build_regex("^abc$", "im").unwrap();
        assert!(re.is_match("x\nABC\ny"));
        assert!(build_regex("(", "").is_err());
    }

    #[test]
    fn test_sprintf() {
        assert_eq!(sprintf("%s is %d", &[jvalue!("x"), jvalue!(5.7)]), "x is 5");
        assert_eq!(sprintf("%2$s %1$s", &[jvalue!("a"), jvalue!("b")]), "b a");
        assert_eq!(sprintf("%.2f%%", &[jvalue!(3.14159)]), "3.14%");
        assert_eq!(sprintf("%j", &[jvalue!({"a": 1i64})]), "{\"a\":1}");
        assert_eq!(sprintf("%s and %s", &[jvalue!("one")]), "one and %s");
        assert_eq!(sprintf("100% sure", &[]), "100% sure");
    }

    #[test]
    fn test_find_chars() {
        let hay: Vec<char> = "héllo héllo".chars().collect();
        let needle: Vec<char> = "llo".chars().collect();
        assert_eq!(find_chars(&hay, &needle, 0), Some(2));
        assert_eq!(find_chars(&hay, &needle, 3), Some(8));
        assert_eq!(rfind_chars(&hay, &needle, hay.len()), Some(8));
        assert_eq!(rfind_chars(&hay, &needle, 7), Some(2));
    }
}
