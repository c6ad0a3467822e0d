//! Decoders for the PostgreSQL binary wire format.
//!
//! Everything is keyed by type OID so array elements (whose OID travels in
//! the array header) decode the same way as top-level columns. A decoder
//! returns `None` when the payload is not what the type promises; the caller
//! then falls back to text or raw bytes.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use sqlward_runtime::{
    Date, Inet, Interval, NativeValue, Numeric, Point, Range, RangeBound, Timestamp,
};
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use uuid::Uuid;

pub mod oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const CHAR: u32 = 18;
    pub const NAME: u32 = 19;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const JSON: u32 = 114;
    pub const XML: u32 = 142;
    pub const POINT: u32 = 600;
    pub const LSEG: u32 = 601;
    pub const PATH: u32 = 602;
    pub const BOX: u32 = 603;
    pub const POLYGON: u32 = 604;
    pub const LINE: u32 = 628;
    pub const CIDR: u32 = 650;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const CIRCLE: u32 = 718;
    pub const MACADDR8: u32 = 774;
    pub const MONEY: u32 = 790;
    pub const MACADDR: u32 = 829;
    pub const INET: u32 = 869;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIME: u32 = 1083;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const INTERVAL: u32 = 1186;
    pub const TIMETZ: u32 = 1266;
    pub const BIT: u32 = 1560;
    pub const VARBIT: u32 = 1562;
    pub const NUMERIC: u32 = 1700;
    pub const UUID: u32 = 2950;
    pub const JSONB: u32 = 3802;
    pub const INT4RANGE: u32 = 3904;
    pub const NUMRANGE: u32 = 3906;
    pub const TSRANGE: u32 = 3908;
    pub const TSTZRANGE: u32 = 3910;
    pub const DATERANGE: u32 = 3912;
    pub const INT8RANGE: u32 = 3926;
}

/// Microseconds between the Unix epoch and 2000-01-01, the PostgreSQL epoch.
const PG_EPOCH_MICROS: i64 = 946_684_800_000_000;
const MICROS_PER_DAY: i64 = 86_400_000_000;

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

const RANGE_EMPTY: u8 = 0x01;
const RANGE_LB_INC: u8 = 0x02;
const RANGE_UB_INC: u8 = 0x04;
const RANGE_LB_INF: u8 = 0x08;
const RANGE_UB_INF: u8 = 0x10;

/// Big-endian cursor over a binary value.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.buf.len() < n {
            return None;
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Some(head)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }

    fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|b| b[0])
    }

    fn i16(&mut self) -> Option<i16> {
        self.array().map(i16::from_be_bytes)
    }

    fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_be_bytes)
    }

    fn i32(&mut self) -> Option<i32> {
        self.array().map(i32::from_be_bytes)
    }

    fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_be_bytes)
    }

    fn i64(&mut self) -> Option<i64> {
        self.array().map(i64::from_be_bytes)
    }

    fn f64(&mut self) -> Option<f64> {
        self.array().map(f64::from_be_bytes)
    }

    fn point(&mut self) -> Option<Point> {
        Some(Point {
            x: self.f64()?,
            y: self.f64()?,
        })
    }

    fn points(&mut self) -> Option<Vec<Point>> {
        let count = usize::try_from(self.i32()?).ok()?;
        (0..count).map(|_| self.point()).collect()
    }

    /// A length-prefixed element; `Some(None)` for SQL NULL.
    fn element(&mut self) -> Option<Option<&'a [u8]>> {
        match self.i32()? {
            -1 => Some(None),
            len => self.take(usize::try_from(len).ok()?).map(Some),
        }
    }

    /// The value must be fully consumed.
    fn finish<T>(&self, value: T) -> Option<T> {
        self.buf.is_empty().then_some(value)
    }
}

/// Decode a binary value of a built-in type.
pub fn decode(type_oid: u32, bytes: &[u8]) -> Option<NativeValue> {
    let mut r = Reader::new(bytes);
    let value = match type_oid {
        oid::BOOL => NativeValue::Bool(r.u8()? != 0),
        oid::BYTEA => return Some(NativeValue::Bytes(bytes.to_vec())),
        oid::CHAR => return Some(NativeValue::Text(String::from_utf8_lossy(bytes).into_owned())),
        oid::NAME | oid::TEXT | oid::XML | oid::BPCHAR | oid::VARCHAR => {
            return std::str::from_utf8(bytes)
                .ok()
                .map(|s| NativeValue::Text(s.to_string()));
        }
        oid::INT2 => NativeValue::Int(r.i16()?.into()),
        oid::INT4 => NativeValue::Int(r.i32()?.into()),
        oid::INT8 => NativeValue::Int(r.i64()?),
        oid::OID => NativeValue::Int(r.u32()?.into()),
        oid::FLOAT4 => NativeValue::Real(f32::from_be_bytes(r.array()?)),
        oid::FLOAT8 => NativeValue::Double(r.f64()?),
        oid::MONEY => NativeValue::Money(r.i64()?),
        oid::NUMERIC => NativeValue::Numeric(numeric(&mut r)?),
        oid::UUID => NativeValue::Uuid(Uuid::from_bytes(r.array()?)),
        oid::JSON => return serde_json::from_slice(bytes).ok().map(NativeValue::Json),
        oid::JSONB => {
            // Version byte, then the document as text.
            let (&version, document) = bytes.split_first()?;
            if version != 1 {
                return None;
            }
            return serde_json::from_slice(document).ok().map(NativeValue::Json);
        }
        oid::DATE => NativeValue::Date(date(r.i32()?)?),
        oid::TIME => time(r.i64()?)?,
        oid::TIMETZ => {
            let micros = r.i64()?;
            // Stored as seconds west of UTC.
            let offset = FixedOffset::west_opt(r.i32()?)?;
            match time(micros)? {
                NativeValue::Time(t) => NativeValue::TimeTz(t, offset),
                _ => return None,
            }
        }
        oid::TIMESTAMP | oid::TIMESTAMPTZ => NativeValue::Timestamp(timestamp(r.i64()?)?),
        oid::INTERVAL => {
            let microseconds = r.i64()?;
            let days = r.i32()?;
            let months = r.i32()?;
            NativeValue::Interval(Interval {
                months,
                days,
                microseconds,
            })
        }
        oid::INET | oid::CIDR => NativeValue::Inet(inet(&mut r)?),
        oid::MACADDR | oid::MACADDR8 => return Some(NativeValue::MacAddr(bytes.to_vec())),
        oid::POINT => NativeValue::Point(r.point()?),
        oid::LINE => NativeValue::Line {
            a: r.f64()?,
            b: r.f64()?,
            c: r.f64()?,
        },
        oid::LSEG => NativeValue::LineSegment(r.point()?, r.point()?),
        oid::BOX => NativeValue::Box(r.point()?, r.point()?),
        oid::PATH => NativeValue::Path {
            closed: r.u8()? != 0,
            points: r.points()?,
        },
        oid::POLYGON => NativeValue::Polygon(r.points()?),
        oid::CIRCLE => NativeValue::Circle {
            center: r.point()?,
            radius: r.f64()?,
        },
        oid::BIT | oid::VARBIT => {
            let len = usize::try_from(r.i32()?).ok()?;
            let bytes = r.take(len.div_ceil(8))?.to_vec();
            NativeValue::Bits { len, bytes }
        }
        oid::INT4RANGE | oid::NUMRANGE | oid::TSRANGE | oid::TSTZRANGE | oid::DATERANGE
        | oid::INT8RANGE => {
            return range_subtype(type_oid).and_then(|subtype| decode_range(subtype, bytes));
        }
        _ => return None,
    };
    r.finish(value)
}

/// Element type of the built-in range types.
pub fn range_subtype(range_oid: u32) -> Option<u32> {
    match range_oid {
        oid::INT4RANGE => Some(oid::INT4),
        oid::NUMRANGE => Some(oid::NUMERIC),
        oid::TSRANGE => Some(oid::TIMESTAMP),
        oid::TSTZRANGE => Some(oid::TIMESTAMPTZ),
        oid::DATERANGE => Some(oid::DATE),
        oid::INT8RANGE => Some(oid::INT8),
        _ => None,
    }
}

/// Decode a range whose bounds are of type `subtype_oid`.
pub fn decode_range(subtype_oid: u32, bytes: &[u8]) -> Option<NativeValue> {
    let mut r = Reader::new(bytes);
    let flags = r.u8()?;
    if flags & RANGE_EMPTY != 0 {
        return r.finish(NativeValue::Range(Range::Empty));
    }
    let mut bound = |infinite: u8, inclusive: u8| -> Option<Option<RangeBound>> {
        if flags & infinite != 0 {
            return Some(None);
        }
        let raw = r.element()??;
        let value = decode(subtype_oid, raw).unwrap_or_else(|| fallback(raw));
        Some(Some(RangeBound::new(value, flags & inclusive != 0)))
    };
    let lower = bound(RANGE_LB_INF, RANGE_LB_INC)?;
    let upper = bound(RANGE_UB_INF, RANGE_UB_INC)?;
    r.finish(NativeValue::Range(Range::Bounds { lower, upper }))
}

/// Decode an array of any dimensionality. Element types come from the
/// array header.
pub fn decode_array(bytes: &[u8]) -> Option<NativeValue> {
    let mut r = Reader::new(bytes);
    let ndim = usize::try_from(r.i32()?).ok()?;
    let _has_nulls = r.i32()?;
    let element_oid = r.u32()?;
    if ndim == 0 {
        return r.finish(NativeValue::Array(Vec::new()));
    }

    let mut dims = Vec::with_capacity(ndim);
    for _ in 0..ndim {
        dims.push(usize::try_from(r.i32()?).ok()?);
        let _lower_bound = r.i32()?;
    }
    let total = dims.iter().try_fold(1usize, |acc, &len| acc.checked_mul(len))?;

    let mut elements = Vec::with_capacity(total);
    for _ in 0..total {
        elements.push(match r.element()? {
            None => NativeValue::Null,
            Some(raw) => decode(element_oid, raw).unwrap_or_else(|| fallback(raw)),
        });
    }
    if !r.buf.is_empty() {
        return None;
    }

    let mut iter = elements.into_iter();
    nest(&mut iter, &dims)
}

fn nest(iter: &mut std::vec::IntoIter<NativeValue>, dims: &[usize]) -> Option<NativeValue> {
    let (&len, inner) = dims.split_first()?;
    let items = if inner.is_empty() {
        iter.by_ref().take(len).collect::<Vec<_>>()
    } else {
        (0..len)
            .map(|_| nest(iter, inner))
            .collect::<Option<Vec<_>>>()?
    };
    (items.len() == len).then_some(NativeValue::Array(items))
}

/// Text when the payload is UTF-8, otherwise raw bytes.
pub fn fallback(bytes: &[u8]) -> NativeValue {
    match std::str::from_utf8(bytes) {
        Ok(text) => NativeValue::Text(text.to_string()),
        Err(_) => NativeValue::Bytes(bytes.to_vec()),
    }
}

fn numeric(r: &mut Reader<'_>) -> Option<Numeric> {
    let ndigits = usize::try_from(r.i16()?).ok()?;
    let weight = i64::from(r.i16()?);
    let sign = r.u16()?;
    let dscale = usize::from(r.u16()?);
    let digits = (0..ndigits).map(|_| r.i16()).collect::<Option<Vec<_>>>()?;

    match sign {
        NUMERIC_NAN => return Some(Numeric::NaN),
        NUMERIC_PINF => return Some(Numeric::Infinity),
        NUMERIC_NINF => return Some(Numeric::NegInfinity),
        _ => {}
    }

    // value = sum(digits[i] * 10000^(weight - i))
    let digit = |i: i64| -> i16 {
        usize::try_from(i)
            .ok()
            .and_then(|i| digits.get(i).copied())
            .unwrap_or(0)
    };
    let mut out = String::new();
    if sign == NUMERIC_NEG && !digits.iter().all(|&d| d == 0) {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for i in 0..=weight {
            let d = digit(i);
            if i == 0 {
                let _ = write!(out, "{d}");
            } else {
                let _ = write!(out, "{d:04}");
            }
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut i = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit(i));
            i += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Some(Numeric::Finite(out))
}

fn timestamp(micros: i64) -> Option<Timestamp> {
    match micros {
        i64::MAX => Some(Timestamp::Infinity),
        i64::MIN => Some(Timestamp::NegInfinity),
        _ => {
            let unix = micros.checked_add(PG_EPOCH_MICROS)?;
            DateTime::<Utc>::from_timestamp_micros(unix).map(Timestamp::Finite)
        }
    }
}

fn date(days: i32) -> Option<Date> {
    match days {
        i32::MAX => Some(Date::Infinity),
        i32::MIN => Some(Date::NegInfinity),
        _ => NaiveDate::from_ymd_opt(2000, 1, 1)?
            .checked_add_signed(Duration::days(days.into()))
            .map(Date::Finite),
    }
}

fn time(micros: i64) -> Option<NativeValue> {
    // 24:00:00 is a valid PostgreSQL time but not a chrono one.
    if micros == MICROS_PER_DAY {
        return Some(NativeValue::Text("24:00:00".to_string()));
    }
    let seconds = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = u32::try_from(micros.rem_euclid(1_000_000) * 1_000).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos).map(NativeValue::Time)
}

fn inet(r: &mut Reader<'_>) -> Option<Inet> {
    // PGSQL_AF_INET is 2, PGSQL_AF_INET6 is 3.
    let family = r.u8()?;
    let prefix = r.u8()?;
    let cidr = r.u8()? != 0;
    let len = r.u8()?;
    let addr = match (family, len) {
        (2, 4) => IpAddr::V4(Ipv4Addr::from(r.array::<4>()?)),
        (3, 16) => IpAddr::V6(Ipv6Addr::from(r.array::<16>()?)),
        _ => return None,
    };
    Some(Inet { addr, prefix, cidr })
}
