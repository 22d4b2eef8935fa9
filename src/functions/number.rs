// Number methods

use super::num_arg;
use crate::signature::Signature;
use crate::utils::{format_number, to_integer};
use crate::value::JValue;
use crate::EvalError;

pub const SIGNATURES: &[(&str, Signature)] = &[
    ("toExponential", Signature::range(0, 1)),
    ("toFixed", Signature::range(0, 1)),
    ("toPrecision", Signature::range(0, 1)),
    ("toString", Signature::range(0, 1)),
];

fn digits_arg(args: &[JValue], i: usize, min: f64, max: f64, name: &str) -> Result<usize, EvalError> {
    let d = to_integer(num_arg(args, i, 0.0));
    if d < min || d > max {
        return Err(EvalError::type_error(format!(
            "{}() digits argument must be between {} and {}",
            name, min, max
        )));
    }
    Ok(d as usize)
}

pub(crate) fn call(n: f64, name: &str, args: &[JValue]) -> Result<JValue, EvalError> {
    let text = match name {
        "toFixed" => {
            let digits = digits_arg(args, 0, 0.0, 100.0, name)?;
            to_fixed(n, digits)
        }
        "toExponential" => match args.first() {
            None | Some(JValue::Null) => to_exponential(n, None),
            Some(_) => to_exponential(n, Some(digits_arg(args, 0, 0.0, 100.0, name)?)),
        },
        "toPrecision" => match args.first() {
            None | Some(JValue::Null) => format_number(n),
            Some(_) => to_precision(n, digits_arg(args, 0, 1.0, 100.0, name)?),
        },
        "toString" => match args.first() {
            None | Some(JValue::Null) => format_number(n),
            Some(_) => {
                let radix = to_integer(num_arg(args, 0, 10.0));
                if !(2.0..=36.0).contains(&radix) {
                    return Err(EvalError::type_error("toString() radix must be between 2 and 36"));
                }
                to_radix(n, radix as u32)
            }
        },
        _ => return Err(EvalError::UnknownFunction(format!("number.{}", name))),
    };
    Ok(JValue::from(text))
}

/// `Number.prototype.toFixed`: round half away from zero on the exact value.
pub fn to_fixed(x: f64, digits: usize) -> String {
    if !x.is_finite() {
        return format_number(x);
    }
    if x.abs() >= 1e21 {
        return format_number(x);
    }
    const EXTRA: usize = 25;
    let abs = x.abs();
    let long = format!("{:.*}", digits + EXTRA, abs);
    let (head, tail) = long.split_at(long.len() - EXTRA);
    let tie = tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0');

    let body = if tie {
        round_up_decimal(head.trim_end_matches('.'))
    } else {
        format!("{:.*}", digits, abs)
    };
    if x < 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Add one unit in the last place of a plain decimal string.
fn round_up_decimal(s: &str) -> String {
    let mut bytes: Vec<u8> = s.bytes().collect();
    let mut i = bytes.len();
    loop {
        if i == 0 {
            bytes.insert(0, b'1');
            break;
        }
        i -= 1;
        match bytes[i] {
            b'.' => continue,
            b'9' => bytes[i] = b'0',
            d => {
                bytes[i] = d + 1;
                break;
            }
        }
    }
    String::from_utf8(bytes).unwrap_or_default()
}

fn with_signed_exponent(s: String) -> String {
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => s,
    }
}

pub fn to_exponential(x: f64, digits: Option<usize>) -> String {
    if !x.is_finite() {
        return format_number(x);
    }
    let s = match digits {
        Some(d) => format!("{:.*e}", d, x),
        None => format!("{:e}", x),
    };
    with_signed_exponent(s)
}

pub fn to_precision(x: f64, precision: usize) -> String {
    if !x.is_finite() {
        return format_number(x);
    }
    if x == 0.0 {
        return to_fixed(0.0, precision - 1);
    }
    let sci = format!("{:.*e}", precision - 1, x);
    let exponent: i64 = sci
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if exponent < -6 || exponent >= precision as i64 {
        with_signed_exponent(sci)
    } else {
        let digits = (precision as i64 - 1 - exponent).max(0) as usize;
        format!("{:.*}", digits, x)
    }
}

fn to_radix(x: f64, radix: u32) -> String {
    if radix == 10 || !x.is_finite() || x.fract() != 0.0 || x.abs() >= 9.007_199_254_740_992e15 {
        return format_number(x);
    }
    let mut n = x.abs() as u64;
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        let d = (n % radix as u64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('?'));
        n /= radix as u64;
    }
    if x < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}
