//! Database-native values as produced by a [`Backend`](crate::Backend).
//!
//! Adapters decode their wire formats into [`NativeValue`]; the pipeline
//! turns those into JSON with [`normalize`](crate::normalize). Keeping the
//! two steps apart means no adapter has to know the canonical renderings.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Utc};
use std::net::IpAddr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Null,
    Bool(bool),
    /// Any integer type up to 64 bits.
    Int(i64),
    /// Single precision, kept apart so it renders with its own shortest form.
    Real(f32),
    Double(f64),
    Numeric(Numeric),
    /// Currency amount in hundredths.
    Money(i64),
    Text(String),
    Uuid(Uuid),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
    Timestamp(Timestamp),
    Date(Date),
    Time(NaiveTime),
    TimeTz(NaiveTime, FixedOffset),
    Interval(Interval),
    Inet(Inet),
    MacAddr(Vec<u8>),
    Point(Point),
    /// `Ax + By + C = 0`
    Line { a: f64, b: f64, c: f64 },
    LineSegment(Point, Point),
    Box(Point, Point),
    Path { closed: bool, points: Vec<Point> },
    Polygon(Vec<Point>),
    Circle { center: Point, radius: f64 },
    /// Bit string of exactly `len` bits, most significant bit first.
    Bits { len: usize, bytes: Vec<u8> },
    Range(Range),
    Array(Vec<NativeValue>),
}

/// Arbitrary-precision decimal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Numeric {
    /// Exact decimal text, e.g. `-12.3400`.
    Finite(String),
    NaN,
    Infinity,
    NegInfinity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Finite(DateTime<Utc>),
    Infinity,
    NegInfinity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Date {
    Finite(NaiveDate),
    Infinity,
    NegInfinity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub microseconds: i64,
}

/// `inet` or `cidr` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inet {
    pub addr: IpAddr,
    pub prefix: u8,
    pub cidr: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Range {
    Empty,
    Bounds {
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    },
}

/// A finite range bound. `None` in [`Range::Bounds`] means unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBound {
    pub value: Box<NativeValue>,
    pub inclusive: bool,
}

impl RangeBound {
    pub fn new(value: NativeValue, inclusive: bool) -> Self {
        Self {
            value: Box::new(value),
            inclusive,
        }
    }
}
