// Math namespace

use std::f64::consts;

use super::num_arg;
use crate::signature::Signature;
use crate::value::JValue;
use crate::EvalError;

pub const SIGNATURES: &[(&str, Signature)] = &[
    ("abs", Signature::exact(1)),
    ("ceil", Signature::exact(1)),
    ("floor", Signature::exact(1)),
    ("max", Signature::at_least(0)),
    ("min", Signature::at_least(0)),
    ("pow", Signature::exact(2)),
    ("random", Signature::exact(0)),
    ("randomUUID", Signature::exact(0)),
    ("round", Signature::exact(1)),
    ("sign", Signature::exact(1)),
    ("trunc", Signature::exact(1)),
];

pub fn constant(name: &str) -> Option<f64> {
    Some(match name {
        "E" => consts::E,
        "LN2" => consts::LN_2,
        "LN10" => consts::LN_10,
        "LOG2E" => consts::LOG2_E,
        "LOG10E" => consts::LOG10_E,
        "PI" => consts::PI,
        "SQRT1_2" => consts::FRAC_1_SQRT_2,
        "SQRT2" => consts::SQRT_2,
        _ => return None,
    })
}

/// Arguments to max/min; a single array argument spreads.
fn numbers(args: &[JValue]) -> Vec<f64> {
    match args {
        [JValue::Array(items)] => items.iter().map(JValue::to_number).collect(),
        _ => args.iter().map(JValue::to_number).collect(),
    }
}

pub(crate) fn call(name: &str, args: &[JValue]) -> Result<JValue, EvalError> {
    let x = num_arg(args, 0, f64::NAN);
    let n = match name {
        "abs" => x.abs(),
        "ceil" => x.ceil(),
        "floor" => x.floor(),
        "trunc" => x.trunc(),
        "round" => round(x),
        "sign" => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        "pow" => pow(x, num_arg(args, 1, f64::NAN)),
        "max" => numbers(args)
            .into_iter()
            .try_fold(f64::NEG_INFINITY, |acc, v| if v.is_nan() { None } else { Some(acc.max(v)) })
            .unwrap_or(f64::NAN),
        "min" => numbers(args)
            .into_iter()
            .try_fold(f64::INFINITY, |acc, v| if v.is_nan() { None } else { Some(acc.min(v)) })
            .unwrap_or(f64::NAN),
        "random" => rand::random::<f64>(),
        "randomUUID" => return Ok(JValue::from(uuid::Uuid::new_v4().to_string())),
        _ => return Err(EvalError::UnknownFunction(format!("Math.{}", name))),
    };
    Ok(JValue::Number(n))
}

/// Rounds half toward positive infinity: `round(-2.5)` is `-2`.
fn round(x: f64) -> f64 {
    if !x.is_finite() || x.fract() == 0.0 {
        return x;
    }
    let floor = x.floor();
    let r = if x - floor >= 0.5 { floor + 1.0 } else { floor };
    if r == 0.0 && x < 0.0 {
        -0.0
    } else {
        r
    }
}

/// `Math.pow` differs from `powf` on a few inputs.
fn pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() {
        return f64::NAN;
    }
    if base.abs() == 1.0 && exponent.is_infinite() {
        return f64::NAN;
    }
    base.powf(exponent)
}
