// Date methods and the Date / LocalDate / LocalDateTime / LocalTime namespaces
//
// No host time zone is involved, so the local getters and their UTC
// counterparts agree and getTimezoneOffset() is always 0.

use chrono::{Datelike, Offset, Timelike, Utc};

use super::{arg, num_arg, str_arg};
use crate::datetime::{self, DateKind, SnapDate};
use crate::signature::Signature;
use crate::value::JValue;
use crate::EvalError;

pub const SIGNATURES: &[(&str, Signature)] = &[
    ("getDate", Signature::exact(0)),
    ("getDay", Signature::exact(0)),
    ("getFullYear", Signature::exact(0)),
    ("getHours", Signature::exact(0)),
    ("getMilliseconds", Signature::exact(0)),
    ("getMinutes", Signature::exact(0)),
    ("getMonth", Signature::exact(0)),
    ("getSeconds", Signature::exact(0)),
    ("getTime", Signature::exact(0)),
    ("getTimezoneOffset", Signature::exact(0)),
    ("getUTCDate", Signature::exact(0)),
    ("getUTCDay", Signature::exact(0)),
    ("getUTCFullYear", Signature::exact(0)),
    ("getUTCHours", Signature::exact(0)),
    ("getUTCMilliseconds", Signature::exact(0)),
    ("getUTCMinutes", Signature::exact(0)),
    ("getUTCMonth", Signature::exact(0)),
    ("getUTCSeconds", Signature::exact(0)),
    ("minus", Signature::exact(1)),
    ("minusDays", Signature::exact(1)),
    ("minusHours", Signature::exact(1)),
    ("minusMillis", Signature::exact(1)),
    ("minusMinutes", Signature::exact(1)),
    ("minusMonths", Signature::exact(1)),
    ("minusSeconds", Signature::exact(1)),
    ("minusWeeks", Signature::exact(1)),
    ("minusYears", Signature::exact(1)),
    ("plus", Signature::exact(1)),
    ("plusDays", Signature::exact(1)),
    ("plusHours", Signature::exact(1)),
    ("plusMillis", Signature::exact(1)),
    ("plusMinutes", Signature::exact(1)),
    ("plusMonths", Signature::exact(1)),
    ("plusSeconds", Signature::exact(1)),
    ("plusWeeks", Signature::exact(1)),
    ("plusYears", Signature::exact(1)),
    ("toISOString", Signature::exact(0)),
    ("toJSON", Signature::exact(0)),
    ("toLocaleDateString", Signature::range(0, 1)),
    ("toLocaleDateTimeString", Signature::range(0, 1)),
    ("toLocaleString", Signature::range(0, 1)),
    ("toLocaleTimeString", Signature::range(0, 1)),
    ("toString", Signature::exact(0)),
    ("withDayOfMonth", Signature::exact(1)),
    ("withDayOfYear", Signature::exact(1)),
    ("withHourOfDay", Signature::exact(1)),
    ("withMillisOfSecond", Signature::exact(1)),
    ("withMinuteOfHour", Signature::exact(1)),
    ("withMonthOfYear", Signature::exact(1)),
    ("withSecondOfMinute", Signature::exact(1)),
    ("withYear", Signature::exact(1)),
];

pub const DATE_NAMESPACE: &[(&str, Signature)] = &[
    ("UTC", Signature::range(1, 7)),
    ("now", Signature::exact(0)),
    ("parse", Signature::range(1, 2)),
];

pub const LOCAL_NAMESPACE: &[(&str, Signature)] = &[
    ("now", Signature::exact(0)),
    ("parse", Signature::range(1, 2)),
];

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
const MS_PER_WEEK: i64 = 7 * MS_PER_DAY;

fn whole(args: &[JValue], i: usize, name: &str) -> Result<i64, EvalError> {
    let n = num_arg(args, i, f64::NAN);
    if !n.is_finite() {
        return Err(EvalError::type_error(format!(
            "{}() expects a number, got {}",
            name,
            arg(args, i).to_display_string()
        )));
    }
    Ok(n.trunc() as i64)
}

/// Shift by `amount` of the unit named after the plus/minus prefix.
fn shift(d: &SnapDate, unit: &str, amount: i64) -> Result<SnapDate, EvalError> {
    let scaled = |per: i64| {
        amount
            .checked_mul(per)
            .ok_or_else(|| EvalError::type_error(format!("{} {} is out of range", amount, unit)))
    };
    let shifted = match unit {
        "" | "Millis" => d.plus_millis(amount)?,
        "Seconds" => d.plus_millis(scaled(MS_PER_SECOND)?)?,
        "Minutes" => d.plus_millis(scaled(MS_PER_MINUTE)?)?,
        "Hours" => d.plus_millis(scaled(MS_PER_HOUR)?)?,
        "Days" => d.plus_millis(scaled(MS_PER_DAY)?)?,
        "Weeks" => d.plus_millis(scaled(MS_PER_WEEK)?)?,
        "Months" => d.plus_months(amount)?,
        "Years" => d.plus_months(scaled(12)?)?,
        _ => return Err(EvalError::UnknownFunction(format!("date.plus{}", unit))),
    };
    Ok(shifted)
}

/// `{format, timeZone}` options for the toLocale* family.
fn locale_format(
    d: &SnapDate,
    options: Option<&JValue>,
    default_format: &str,
) -> Result<String, EvalError> {
    let (format, zone) = match options {
        Some(JValue::Object(map)) => (
            map.get("format").map(JValue::to_display_string),
            map.get("timeZone").map(JValue::to_display_string),
        ),
        Some(JValue::String(format)) => (Some(format.to_string()), None),
        _ => (None, None),
    };
    let offset = match zone {
        Some(tz) => datetime::parse_offset(&tz)?,
        None => Utc.fix(),
    };
    let format = format.unwrap_or_else(|| default_format.to_string());
    Ok(d.format_with(&format, offset)?)
}

pub(crate) fn call(d: &SnapDate, name: &str, args: &[JValue]) -> Result<JValue, EvalError> {
    let dt = d.instant;
    let number = |n: u32| JValue::Number(n as f64);

    if let Some(unit) = name.strip_prefix("plus") {
        return Ok(JValue::Date(shift(d, unit, whole(args, 0, name)?)?));
    }
    if let Some(unit) = name.strip_prefix("minus") {
        let amount = whole(args, 0, name)?;
        return Ok(JValue::Date(shift(d, unit, amount.saturating_neg())?));
    }
    if let Some(field) = name.strip_prefix("with") {
        return Ok(JValue::Date(datetime::with_field(d, field, whole(args, 0, name)?)?));
    }

    let getter = name.strip_prefix("getUTC").or_else(|| name.strip_prefix("get"));
    if let Some(field) = getter {
        return Ok(match field {
            "Date" => number(dt.day()),
            "Day" => number(d.day_of_week()),
            "FullYear" => JValue::Number(dt.year() as f64),
            "Hours" => number(dt.hour()),
            "Milliseconds" => number(d.millisecond()),
            "Minutes" => number(dt.minute()),
            "Month" => number(dt.month()),
            "Seconds" => number(dt.second()),
            "Time" => JValue::Number(d.millis() as f64),
            "TimezoneOffset" => JValue::Number(0.0),
            _ => return Err(EvalError::UnknownFunction(format!("date.{}", name))),
        });
    }

    Ok(JValue::from(match name {
        "toString" | "toISOString" | "toJSON" => d.to_iso_string(),
        "toLocaleString" | "toLocaleDateTimeString" => {
            locale_format(d, args.first(), "yyyy-MM-dd'T'HH:mm:ss.SSS")?
        }
        "toLocaleDateString" => locale_format(d, args.first(), "yyyy-MM-dd")?,
        "toLocaleTimeString" => locale_format(d, args.first(), "HH:mm:ss.SSS")?,
        _ => return Err(EvalError::UnknownFunction(format!("date.{}", name))),
    }))
}

/// `Date.*`, `LocalDate.*`, `LocalDateTime.*`, `LocalTime.*`
pub(crate) fn call_namespace(kind: DateKind, name: &str, args: &[JValue]) -> Result<JValue, EvalError> {
    match name {
        "now" => Ok(JValue::Date(SnapDate::now(kind))),
        "UTC" => {
            let parts: Vec<f64> = args.iter().map(JValue::to_number).collect();
            Ok(datetime::utc_millis(&parts)
                .map(|ms| JValue::Number(ms as f64))
                .unwrap_or(JValue::Number(f64::NAN)))
        }
        "parse" => {
            let parsed = match (arg(args, 0), str_arg(args, 1)) {
                (JValue::Null, _) => None,
                (JValue::Number(ms), _) if ms.is_finite() => SnapDate::from_millis(*ms as i64)
                    .map(|date| SnapDate::new(date.instant, kind)),
                (JValue::Date(date), _) => Some(SnapDate::new(date.instant, kind)),
                (text, Some(format)) => {
                    datetime::parse_with_format(&text.to_display_string(), &format, kind)
                }
                (text, None) if kind == DateKind::DateTime => {
                    datetime::parse_default(&text.to_display_string())
                }
                (text, None) => datetime::parse_local(&text.to_display_string(), kind),
            };
            if parsed.is_none() {
                log::debug!("{}.parse: unparseable input", kind.name());
            }
            Ok(parsed.map(JValue::Date).unwrap_or(JValue::Null))
        }
        _ => Err(EvalError::UnknownFunction(format!("{}.{}", kind.name(), name))),
    }
}
