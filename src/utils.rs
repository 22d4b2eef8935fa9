// Utility functions shared by the value model and the function library

/// Format a number the way ECMAScript `Number.prototype.toString` does.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        // Rust renders `1e21` / `1.5e-7`; ECMAScript always signs the exponent.
        let s = format!("{:e}", n);
        match s.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => s,
        }
    } else {
        format!("{}", n)
    }
}

/// ECMAScript `ToIntegerOrInfinity`: NaN becomes 0, fractions truncate.
pub fn to_integer(n: f64) -> f64 {
    if n.is_nan() {
        0.0
    } else {
        n.trunc()
    }
}

/// Resolve a possibly negative relative index against `len`, clamped to `0..=len`.
pub fn relative_index(n: f64, len: usize) -> usize {
    let n = to_integer(n);
    let len_f = len as f64;
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}

/// Split text into words for the case-conversion helpers.
///
/// Boundaries are non-alphanumeric characters, lower-to-upper transitions
/// (`fooBar`), acronym ends (`XMLHttp` → `XML`, `Http`) and letter/digit changes.
pub fn split_words(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let boundary = (prev.is_lowercase() && ch.is_uppercase())
                || (prev.is_alphabetic() && ch.is_ascii_digit())
                || (prev.is_ascii_digit() && ch.is_alphabetic())
                || (prev.is_uppercase()
                    && ch.is_uppercase()
                    && next.is_some_and(|c| c.is_lowercase()));
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Uppercase the first character, leaving the rest untouched.
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase the first character, leaving the rest untouched.
pub fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Clip a source fragment for error messages.
pub fn clip(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1.5e-7), "1.5e-7");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_relative_index() {
        assert_eq!(relative_index(-1.0, 5), 4);
        assert_eq!(relative_index(-10.0, 5), 0);
        assert_eq!(relative_index(10.0, 5), 5);
        assert_eq!(relative_index(f64::NAN, 5), 0);
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("fooBar"), vec!["foo", "Bar"]);
        assert_eq!(split_words("--foo-bar--"), vec!["foo", "bar"]);
        assert_eq!(split_words("__FOO_BAR__"), vec!["FOO", "BAR"]);
        assert_eq!(split_words("XMLHttpRequest"), vec!["XML", "Http", "Request"]);
        assert_eq!(split_words("Foo Bar"), vec!["Foo", "Bar"]);
    }

    #[test]
    fn test_first_char_case() {
        assert_eq!(upper_first("fred"), "Fred");
        assert_eq!(lower_first("FRED"), "fRED");
        assert_eq!(upper_first(""), "");
    }
}
