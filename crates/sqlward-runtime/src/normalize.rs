//! Conversion of [`NativeValue`]s into JSON-safe values.
//!
//! Integers stay integers at full width. Values JSON cannot carry as numbers
//! (non-finite floats, decimals, money) and every structured database type
//! become canonical text, so results read the same whichever client decodes
//! them.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{FixedOffset, NaiveTime, SecondsFormat, Timelike};
use serde_json::{Number, Value};

use crate::value::{Date, Inet, Interval, NativeValue, Numeric, Point, Range, RangeBound, Timestamp};

/// Normalize one value. Pure, so safe to call from any number of tasks.
pub fn normalize(value: &NativeValue) -> Value {
    match value {
        NativeValue::Null => Value::Null,
        NativeValue::Bool(b) => Value::Bool(*b),
        NativeValue::Int(i) => Value::from(*i),
        NativeValue::Real(f) => float(widen(*f)),
        NativeValue::Double(f) => float(*f),
        NativeValue::Numeric(n) => Value::String(numeric(n)),
        NativeValue::Money(cents) => Value::String(money(*cents)),
        NativeValue::Text(text) => Value::String(text.clone()),
        NativeValue::Uuid(id) => Value::String(id.to_string()),
        NativeValue::Json(json) => json.clone(),
        NativeValue::Bytes(bytes) => binary(bytes),
        NativeValue::Timestamp(ts) => Value::String(timestamp(ts)),
        NativeValue::Date(date) => Value::String(midnight(date)),
        NativeValue::Time(time) => Value::String(time_of_day(time)),
        NativeValue::TimeTz(time, offset) => {
            Value::String(format!("{}{}", time_of_day(time), utc_offset(offset)))
        }
        NativeValue::Interval(interval) => Value::String(render_interval(interval)),
        NativeValue::Inet(inet) => Value::String(render_inet(inet)),
        NativeValue::MacAddr(bytes) => Value::String(
            bytes
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":"),
        ),
        NativeValue::Point(p) => Value::String(point(p)),
        NativeValue::Line { a, b, c } => {
            Value::String(format!("{{{},{},{}}}", geo(*a), geo(*b), geo(*c)))
        }
        NativeValue::LineSegment(p1, p2) => Value::String(format!("[{},{}]", point(p1), point(p2))),
        NativeValue::Box(p1, p2) => Value::String(format!("{},{}", point(p1), point(p2))),
        NativeValue::Path { closed, points } => {
            let inner = point_list(points);
            Value::String(if *closed {
                format!("({inner})")
            } else {
                format!("[{inner}]")
            })
        }
        NativeValue::Polygon(points) => Value::String(format!("({})", point_list(points))),
        NativeValue::Circle { center, radius } => {
            Value::String(format!("<{},{}>", point(center), geo(*radius)))
        }
        NativeValue::Bits { len, bytes } => Value::String(bits(*len, bytes)),
        NativeValue::Range(range) => Value::String(render_range(range)),
        NativeValue::Array(items) => Value::Array(items.iter().map(normalize).collect()),
    }
}

fn float(f: f64) -> Value {
    if f.is_nan() {
        Value::String("NaN".to_string())
    } else if f.is_infinite() {
        Value::String(if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string())
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

/// `0.1f32 as f64` is 0.10000000149011612; go through the f32's shortest
/// decimal form instead.
fn widen(f: f32) -> f64 {
    f.to_string().parse().unwrap_or(f64::from(f))
}

fn numeric(n: &Numeric) -> String {
    match n {
        Numeric::Finite(text) => text.clone(),
        Numeric::NaN => "NaN".to_string(),
        Numeric::Infinity => "Infinity".to_string(),
        Numeric::NegInfinity => "-Infinity".to_string(),
    }
}

fn money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Bytes holding a JSON document are returned parsed; anything else as base64.
fn binary(bytes: &[u8]) -> Value {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(parsed) => parsed,
        Err(_) => Value::String(BASE64.encode(bytes)),
    }
}

fn timestamp(ts: &Timestamp) -> String {
    match ts {
        Timestamp::Finite(at) => at.to_rfc3339_opts(seconds_format(at.nanosecond()), true),
        Timestamp::Infinity => "infinity".to_string(),
        Timestamp::NegInfinity => "-infinity".to_string(),
    }
}

/// Whole seconds, or exactly six fractional digits, as for `time`.
fn seconds_format(nanos: u32) -> SecondsFormat {
    if nanos == 0 {
        SecondsFormat::Secs
    } else {
        SecondsFormat::Micros
    }
}

fn midnight(date: &Date) -> String {
    match date {
        Date::Finite(day) => match day.and_hms_opt(0, 0, 0) {
            Some(at) => at.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true),
            None => day.to_string(),
        },
        Date::Infinity => "infinity".to_string(),
        Date::NegInfinity => "-infinity".to_string(),
    }
}

fn time_of_day(time: &NaiveTime) -> String {
    let micros = time.nanosecond() / 1_000;
    let base = time.format("%H:%M:%S");
    if micros == 0 {
        base.to_string()
    } else {
        format!("{base}.{micros:06}")
    }
}

fn utc_offset(offset: &FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let abs = seconds.unsigned_abs();
    let (h, m, s) = (abs / 3600, (abs / 60) % 60, abs % 60);
    if s == 0 {
        format!("{sign}{h:02}:{m:02}")
    } else {
        format!("{sign}{h:02}:{m:02}:{s:02}")
    }
}

fn render_interval(interval: &Interval) -> String {
    let mut parts = Vec::new();
    let years = interval.months / 12;
    let months = interval.months % 12;
    if years != 0 {
        parts.push(unit(i64::from(years), "year"));
    }
    if months != 0 {
        parts.push(unit(i64::from(months), "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day"));
    }
    if interval.microseconds != 0 {
        parts.push(clock(interval.microseconds));
    }
    if parts.is_empty() {
        "0".to_string()
    } else {
        parts.join(" ")
    }
}

fn unit(n: i64, name: &str) -> String {
    if n.abs() == 1 {
        format!("{n} {name}")
    } else {
        format!("{n} {name}s")
    }
}

fn clock(microseconds: i64) -> String {
    let sign = if microseconds < 0 { "-" } else { "" };
    let abs = microseconds.unsigned_abs();
    let hours = abs / 3_600_000_000;
    let minutes = (abs / 60_000_000) % 60;
    let seconds = (abs / 1_000_000) % 60;
    let fraction = abs % 1_000_000;
    let mut out = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
    if fraction != 0 {
        let digits = format!("{fraction:06}");
        out.push('.');
        out.push_str(digits.trim_end_matches('0'));
    }
    out
}

fn render_inet(inet: &Inet) -> String {
    let full = if inet.addr.is_ipv4() { 32 } else { 128 };
    if !inet.cidr && inet.prefix == full {
        inet.addr.to_string()
    } else {
        format!("{}/{}", inet.addr, inet.prefix)
    }
}

fn geo(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        f.to_string()
    }
}

fn point(p: &Point) -> String {
    format!("({},{})", geo(p.x), geo(p.y))
}

fn point_list(points: &[Point]) -> String {
    points.iter().map(point).collect::<Vec<_>>().join(",")
}

fn bits(len: usize, bytes: &[u8]) -> String {
    (0..len)
        .map(|i| {
            let set = bytes
                .get(i / 8)
                .is_some_and(|byte| byte & (0x80 >> (i % 8)) != 0);
            if set { '1' } else { '0' }
        })
        .collect()
}

fn render_range(range: &Range) -> String {
    match range {
        Range::Empty => "empty".to_string(),
        Range::Bounds { lower, upper } => {
            let (open, low) = match lower {
                Some(RangeBound { value, inclusive }) => {
                    (if *inclusive { '[' } else { '(' }, bound_text(value))
                }
                None => ('(', String::new()),
            };
            let (close, high) = match upper {
                Some(RangeBound { value, inclusive }) => {
                    (if *inclusive { ']' } else { ')' }, bound_text(value))
                }
                None => (')', String::new()),
            };
            format!("{open}{low},{high}{close}")
        }
    }
}

fn bound_text(value: &NativeValue) -> String {
    match normalize(value) {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
