// Date and time primitives
//
// Every date is an instant in UTC tagged with the flavour it was created as.
// The host time zone is never consulted: "local" dates are wall-clock values
// interpreted as UTC, which keeps evaluation deterministic across machines.

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, Datelike, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta,
    Timelike, Utc,
};
use thiserror::Error;

/// DateTime errors
#[derive(Error, Debug)]
pub enum DateTimeError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),
}

impl From<DateTimeError> for crate::EvalError {
    fn from(e: DateTimeError) -> Self {
        crate::EvalError::TypeError(e.to_string())
    }
}

/// Which constructor produced a date; drives `instanceOf` and default rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateKind {
    DateTime,
    LocalDateTime,
    LocalDate,
    LocalTime,
}

impl DateKind {
    pub fn name(self) -> &'static str {
        match self {
            DateKind::DateTime => "DateTime",
            DateKind::LocalDateTime => "LocalDateTime",
            DateKind::LocalDate => "LocalDate",
            DateKind::LocalTime => "LocalTime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapDate {
    pub instant: DateTime<Utc>,
    pub kind: DateKind,
}

impl SnapDate {
    pub fn new(instant: DateTime<Utc>, kind: DateKind) -> Self {
        SnapDate { instant, kind }
    }

    pub fn now(kind: DateKind) -> Self {
        SnapDate::new(Utc::now(), kind)
    }

    pub fn from_millis(ms: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(ms).map(|dt| SnapDate::new(dt, DateKind::DateTime))
    }

    pub fn millis(&self) -> i64 {
        self.instant.timestamp_millis()
    }

    /// ISO-8601 rendering appropriate to the date's kind.
    pub fn to_iso_string(&self) -> String {
        let fmt = match self.kind {
            DateKind::DateTime => "%Y-%m-%dT%H:%M:%S%.3fZ",
            DateKind::LocalDateTime => "%Y-%m-%dT%H:%M:%S%.3f",
            DateKind::LocalDate => "%Y-%m-%d",
            DateKind::LocalTime => "%H:%M:%S%.3f",
        };
        self.instant.format(fmt).to_string()
    }

    /// Same flavour, different instant.
    pub fn with_instant(&self, instant: DateTime<Utc>) -> Self {
        SnapDate::new(instant, self.kind)
    }

    pub fn plus_millis(&self, ms: i64) -> Result<Self, DateTimeError> {
        TimeDelta::try_milliseconds(ms)
            .and_then(|delta| self.instant.checked_add_signed(delta))
            .map(|dt| self.with_instant(dt))
            .ok_or_else(|| DateTimeError::OutOfRange(format!("{} ms", ms)))
    }

    pub fn plus_months(&self, months: i64) -> Result<Self, DateTimeError> {
        let magnitude = u32::try_from(months.unsigned_abs())
            .map_err(|_| DateTimeError::OutOfRange(format!("{} months", months)))?;
        let shifted = if months >= 0 {
            self.instant.checked_add_months(Months::new(magnitude))
        } else {
            self.instant.checked_sub_months(Months::new(magnitude))
        };
        shifted
            .map(|dt| self.with_instant(dt))
            .ok_or_else(|| DateTimeError::OutOfRange(format!("{} months", months)))
    }

    pub fn day_of_week(&self) -> u32 {
        self.instant.weekday().num_days_from_sunday()
    }

    pub fn millisecond(&self) -> u32 {
        self.instant.timestamp_subsec_millis()
    }

    /// Format with a Joda-style pattern after shifting into `offset`.
    pub fn format_with(&self, pattern: &str, offset: FixedOffset) -> Result<String, DateTimeError> {
        let fmt = joda_to_strftime(pattern);
        let items: Vec<Item<'_>> = StrftimeItems::new(&fmt).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(DateTimeError::FormatError(pattern.to_string()));
        }
        Ok(self
            .instant
            .with_timezone(&offset)
            .format_with_items(items.into_iter())
            .to_string())
    }
}

/// Parse a date without an explicit format: RFC 3339 first, then the common
/// ISO-8601 shapes with the offset omitted (read as UTC).
pub fn parse_default(s: &str) -> Option<SnapDate> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(SnapDate::new(dt.with_timezone(&Utc), DateKind::DateTime));
    }
    parse_naive_datetime(s)
        .map(|naive| SnapDate::new(naive.and_utc(), DateKind::DateTime))
}

fn parse_naive_datetime(s: &str) -> Option<NaiveDateTime> {
    const SHAPES: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];
    for shape in SHAPES {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, shape) {
            return Some(naive);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_naive_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// Parse with a Joda-style pattern. Patterns without a time part yield
/// midnight; patterns without a date part yield a time on 1970-01-01.
pub fn parse_with_format(s: &str, pattern: &str, kind: DateKind) -> Option<SnapDate> {
    let fmt = joda_to_strftime(pattern);
    if let Ok(dt) = DateTime::parse_from_str(s, &fmt) {
        return Some(SnapDate::new(dt.with_timezone(&Utc), kind));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, &fmt) {
        return Some(SnapDate::new(naive.and_utc(), kind));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, &fmt) {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| SnapDate::new(naive.and_utc(), kind));
    }
    if let Ok(time) = NaiveTime::parse_from_str(s, &fmt) {
        return epoch_day()
            .map(|day| SnapDate::new(day.and_time(time).and_utc(), DateKind::LocalTime));
    }
    None
}

pub fn parse_local(s: &str, kind: DateKind) -> Option<SnapDate> {
    let s = s.trim();
    match kind {
        DateKind::LocalTime => parse_naive_time(s)
            .and_then(|time| epoch_day().map(|day| day.and_time(time)))
            .map(|naive| SnapDate::new(naive.and_utc(), kind)),
        DateKind::LocalDate => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| SnapDate::new(naive.and_utc(), kind)),
        DateKind::LocalDateTime | DateKind::DateTime => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(SnapDate::new(dt.with_timezone(&Utc), kind));
            }
            parse_naive_datetime(s).map(|naive| SnapDate::new(naive.and_utc(), kind))
        }
    }
}

fn epoch_day() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
}

/// `Date.UTC(year, monthIndex, day, hours, minutes, seconds, millis)` with
/// ECMAScript overflow semantics (month 12 rolls into the next year, etc).
pub fn utc_millis(parts: &[f64]) -> Option<i64> {
    let get = |i: usize, default: f64| parts.get(i).copied().unwrap_or(default);
    let year = get(0, f64::NAN);
    if parts.iter().any(|p| !p.is_finite()) || year.is_nan() {
        return None;
    }
    let month_index = get(1, 0.0).trunc() as i64;
    let year = year.trunc() as i64 + month_index.div_euclid(12);
    let month = month_index.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, 1)?
        .and_hms_opt(0, 0, 0)?
        .and_utc();
    let offset_ms = (get(2, 1.0).trunc() - 1.0) * 86_400_000.0
        + get(3, 0.0).trunc() * 3_600_000.0
        + get(4, 0.0).trunc() * 60_000.0
        + get(5, 0.0).trunc() * 1_000.0
        + get(6, 0.0).trunc();
    let delta = TimeDelta::try_milliseconds(offset_ms as i64)?;
    first.checked_add_signed(delta).map(|dt| dt.timestamp_millis())
}

/// Parse `UTC`, `GMT`, `Z`, or a fixed `±HH[:MM]` offset (optionally prefixed by UTC/GMT).
pub fn parse_offset(tz: &str) -> Result<FixedOffset, DateTimeError> {
    let trimmed = tz.trim();
    let rest = trimmed
        .strip_prefix("UTC")
        .or_else(|| trimmed.strip_prefix("GMT"))
        .unwrap_or(trimmed);
    if rest.is_empty() || rest == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(|| DateTimeError::ParseError(tz.to_string()));
    }
    let (sign, digits) = match rest.as_bytes().first() {
        Some(b'+') => (1, &rest[1..]),
        Some(b'-') => (-1, &rest[1..]),
        _ => return Err(DateTimeError::ParseError(format!("unsupported time zone '{}'", tz))),
    };
    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    let (hours, minutes) = match digits.len() {
        1 | 2 => (digits.parse::<i32>().ok(), Some(0)),
        4 => (digits[..2].parse::<i32>().ok(), digits[2..].parse::<i32>().ok()),
        _ => (None, None),
    };
    match (hours, minutes) {
        (Some(h), Some(m)) if h <= 18 && m < 60 => FixedOffset::east_opt(sign * (h * 3600 + m * 60))
            .ok_or_else(|| DateTimeError::ParseError(tz.to_string())),
        _ => Err(DateTimeError::ParseError(format!("unsupported time zone '{}'", tz))),
    }
}

/// Translate a Joda/Java date pattern (`yyyy-MM-dd HH:mm:ss.SSS`) to strftime.
pub fn joda_to_strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if ch == '\'' {
            // Quoted literal; '' is an escaped quote.
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == ch {
            run += 1;
        }

        let spec = match (ch, run) {
            ('y', 2) => Some("%y"),
            ('y', _) | ('Y', _) => Some("%Y"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1) => Some("%-d"),
            ('d', _) => Some("%d"),
            ('D', 1) => Some("%-j"),
            ('D', _) => Some("%j"),
            ('H', 1) => Some("%-H"),
            ('H', _) => Some("%H"),
            ('h', 1) => Some("%-I"),
            ('h', _) => Some("%I"),
            ('m', 1) => Some("%-M"),
            ('m', _) => Some("%M"),
            ('s', 1) => Some("%-S"),
            ('s', _) => Some("%S"),
            ('S', 1..=3) => Some("%3f"),
            ('S', 4..=6) => Some("%6f"),
            ('S', _) => Some("%9f"),
            ('a', _) => Some("%p"),
            ('E', 1..=3) => Some("%a"),
            ('E', _) => Some("%A"),
            ('Z', 1) | ('X', 1) => Some("%z"),
            ('Z', _) | ('X', _) => Some("%:z"),
            ('z', _) => Some("%Z"),
            _ => None,
        };

        match spec {
            Some(s) => out.push_str(s),
            None => {
                for _ in 0..run {
                    push_literal(&mut out, ch);
                }
            }
        }
        i += run;
    }
    out
}

fn push_literal(out: &mut String, ch: char) {
    if ch == '%' {
        out.push_str("%%");
    } else {
        out.push(ch);
    }
}

/// Field setters shared by the `withX` date methods.
pub fn with_field(date: &SnapDate, field: &str, value: i64) -> Result<SnapDate, DateTimeError> {
    let dt = date.instant;
    let small = u32::try_from(value).ok();
    let updated = match field {
        "DayOfMonth" => small.and_then(|v| dt.with_day(v)),
        "DayOfYear" => small.and_then(|v| dt.with_ordinal(v)),
        "HourOfDay" => small.and_then(|v| dt.with_hour(v)),
        "MillisOfSecond" => small
            .filter(|v| *v < 1000)
            .and_then(|v| dt.with_nanosecond(v * 1_000_000)),
        "MinuteOfHour" => small.and_then(|v| dt.with_minute(v)),
        "MonthOfYear" => small.and_then(|v| dt.with_month(v)),
        "SecondOfMinute" => small.and_then(|v| dt.with_second(v)),
        "Year" => i32::try_from(value).ok().and_then(|v| dt.with_year(v)),
        _ => return Err(DateTimeError::FormatError(format!("unknown field {}", field))),
    };
    updated
        .map(|dt| date.with_instant(dt))
        .ok_or_else(|| DateTimeError::OutOfRange(format!("with{}({})", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now() {
        let now = SnapDate::now(DateKind::DateTime);
        assert!(now.millis() > 0);
    }

    #[test]
    fn test_parse_default() {
        let d = parse_default("2024-03-15T10:30:00Z").unwrap();
        assert_eq!(d.to_iso_string(), "2024-03-15T10:30:00.000Z");

        let d = parse_default("2024-03-15T10:30:00+02:00").unwrap();
        assert_eq!(d.to_iso_string(), "2024-03-15T08:30:00.000Z");

        let d = parse_default("2024-03-15").unwrap();
        assert_eq!(d.to_iso_string(), "2024-03-15T00:00:00.000Z");

        assert!(parse_default("not a date").is_none());
    }

    #[test]
    fn test_joda_translation() {
        assert_eq!(joda_to_strftime("yyyy-MM-dd"), "%Y-%m-%d");
        assert_eq!(joda_to_strftime("dd/MM/yy HH:mm:ss.SSS"), "%d/%m/%y %H:%M:%S.%3f");
        assert_eq!(joda_to_strftime("EEE, MMM d"), "%a, %b %-d");
        assert_eq!(joda_to_strftime("yyyy'T'HH"), "%YT%H");
        assert_eq!(joda_to_strftime("100%"), "100%%");
    }

    #[test]
    fn test_parse_with_format() {
        let d = parse_with_format("15/03/2024", "dd/MM/yyyy", DateKind::DateTime).unwrap();
        assert_eq!(d.to_iso_string(), "2024-03-15T00:00:00.000Z");

        let d = parse_with_format("2024-03-15 07:05", "yyyy-MM-dd HH:mm", DateKind::DateTime).unwrap();
        assert_eq!(d.to_iso_string(), "2024-03-15T07:05:00.000Z");

        assert!(parse_with_format("garbage", "yyyy-MM-dd", DateKind::DateTime).is_none());
    }

    #[test]
    fn test_utc_millis() {
        assert_eq!(utc_millis(&[1970.0, 0.0, 1.0]), Some(0));
        assert_eq!(utc_millis(&[2020.0, 0.0]), Some(1_577_836_800_000));
        // month 12 rolls over into January of the next year
        assert_eq!(utc_millis(&[2019.0, 12.0, 1.0]), Some(1_577_836_800_000));
        assert_eq!(utc_millis(&[f64::NAN]), None);
    }

    #[test]
    fn test_plus_months_clamps_day() {
        let d = parse_default("2024-01-31T00:00:00Z").unwrap();
        let next = d.plus_months(1).unwrap();
        assert_eq!(next.to_iso_string(), "2024-02-29T00:00:00.000Z");
        let prev = d.plus_months(-2).unwrap();
        assert_eq!(prev.to_iso_string(), "2023-11-30T00:00:00.000Z");
    }

    #[test]
    fn test_parse_offset() {
        assert_eq!(parse_offset("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_offset("GMT-08").unwrap().local_minus_utc(), -28_800);
        assert!(parse_offset("America/New_York").is_err());
    }

    #[test]
    fn test_with_field() {
        let d = parse_default("2024-02-10T12:00:00Z").unwrap();
        assert_eq!(
            with_field(&d, "DayOfMonth", 29).unwrap().to_iso_string(),
            "2024-02-29T12:00:00.000Z"
        );
        assert!(with_field(&d, "DayOfMonth", 30).is_err());
        assert_eq!(
            with_field(&d, "MonthOfYear", 12).unwrap().to_iso_string(),
            "2024-12-10T12:00:00.000Z"
        );
    }
}
