//! PostgreSQL parameter encoding.
//!
//! Parameters travel in binary format, so each one has to be encoded as
//! exactly the type the server inferred for its placeholder. A value that
//! cannot be encoded as that type is rejected before anything is sent.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{
    PgArgumentBuffer, PgArguments, PgHasArrayType, PgTypeInfo, PgTypeKind, Postgres,
};
use sqlx::query::Query;
use sqlx::{Encode, Type, TypeInfo};
use uuid::Uuid;

use super::types::PgValueConverter;
use crate::traits::Param;

pub(super) type PgQuery<'q> = Query<'q, Postgres, PgArguments>;
type BindResult<'q> = Result<PgQuery<'q>, sqlx::Error>;

/// Types whose binary input format is the raw text
const TEXTUAL: &[&str] = &[
    "TEXT", "VARCHAR", "CHAR", "BPCHAR", "\"CHAR\"", "NAME", "CITEXT", "XML", "JSON", "UNKNOWN",
];

impl PgValueConverter {
    /// Bind parameters positionally, encoding each one as the type the
    /// server inferred for its placeholder.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error::Encode` when a value cannot be represented in
    /// its placeholder's type.
    pub fn bind_params<'q>(
        mut query: PgQuery<'q>,
        params: &[Param],
        types: &[PgTypeInfo],
    ) -> BindResult<'q> {
        for (idx, param) in params.iter().enumerate() {
            query = bind_one(query, param, types.get(idx))?;
        }
        Ok(query)
    }
}

fn bind_one<'q>(query: PgQuery<'q>, param: &Param, info: Option<&PgTypeInfo>) -> BindResult<'q> {
    match info.and_then(resolved_kind) {
        Some(PgTypeKind::Domain(base)) => return bind_one(query, param, Some(base)),
        Some(PgTypeKind::Enum(_)) => return Ok(bind_as_text(query, param)),
        _ => {}
    }

    let type_name = info.map(TypeInfo::name).unwrap_or("");
    if TEXTUAL.iter().any(|t| t.eq_ignore_ascii_case(type_name)) {
        return Ok(bind_as_text(query, param));
    }

    match param {
        Param::Null => Ok(query.bind(None::<String>)),
        Param::Bool(b) => bind_bool(query, *b, type_name),
        Param::Int(v) => bind_int(query, *v, type_name),
        Param::Float(v) => bind_float(query, *v, type_name),
        Param::Text(s) => bind_text(query, s, type_name),
        Param::LargeObject(lob) => match type_name {
            "BYTEA" | "" => Ok(query.bind(lob.as_bytes().to_vec())),
            other => Err(cannot_encode(format_args!("{} bytes", lob.len()), other)),
        },
    }
}

/// Kind of a type the server resolved; declared-only types have no OID yet.
fn resolved_kind(info: &PgTypeInfo) -> Option<&PgTypeKind> {
    info.oid().map(|_| info.kind())
}

/// Booleans render as 0/1 like every other backend
fn bind_as_text<'q>(query: PgQuery<'q>, param: &Param) -> PgQuery<'q> {
    match param {
        Param::Null => query.bind(None::<String>),
        Param::Bool(b) => query.bind(Param::bool_as_int(*b).to_string()),
        Param::Int(v) => query.bind(v.to_string()),
        Param::Float(v) => query.bind(v.to_string()),
        Param::Text(s) => query.bind(s.clone()),
        Param::LargeObject(lob) => query.bind(lob.as_bytes().to_vec()),
    }
}

fn bind_bool<'q>(query: PgQuery<'q>, b: bool, type_name: &str) -> BindResult<'q> {
    let n = Param::bool_as_int(b);
    match type_name {
        "BOOL" => Ok(query.bind(b)),
        "INT2" => Ok(query.bind(i16::from(b))),
        "INT4" => Ok(query.bind(i32::from(b))),
        "INT8" | "" => Ok(query.bind(n)),
        "FLOAT4" => Ok(query.bind(f32::from(u8::from(b)))),
        "FLOAT8" => Ok(query.bind(f64::from(u8::from(b)))),
        "NUMERIC" => Ok(query.bind(Decimal::from(n))),
        other => Err(cannot_encode(b, other)),
    }
}

fn bind_int<'q>(query: PgQuery<'q>, v: i64, type_name: &str) -> BindResult<'q> {
    match type_name {
        "INT2" => convert(query, i16::try_from(v), v, type_name),
        "INT4" => convert(query, i32::try_from(v), v, type_name),
        "INT8" | "" => Ok(query.bind(v)),
        "OID" => convert(query, u32::try_from(v).map(Oid), v, type_name),
        "FLOAT4" => Ok(query.bind(v as f32)),
        "FLOAT8" => Ok(query.bind(v as f64)),
        "NUMERIC" => Ok(query.bind(Decimal::from(v))),
        "BOOL" => Ok(query.bind(v != 0)),
        other => Err(cannot_encode(v, other)),
    }
}

fn bind_float<'q>(query: PgQuery<'q>, v: f64, type_name: &str) -> BindResult<'q> {
    match type_name {
        "FLOAT4" => Ok(query.bind(v as f32)),
        "FLOAT8" | "" => Ok(query.bind(v)),
        "NUMERIC" => convert(query, Decimal::try_from(v), v, type_name),
        "INT2" => convert(query, whole_as::<i16>(v), v, type_name),
        "INT4" => convert(query, whole_as::<i32>(v), v, type_name),
        "INT8" => convert(query, whole_as::<i64>(v), v, type_name),
        other => Err(cannot_encode(v, other)),
    }
}

fn bind_text<'q>(query: PgQuery<'q>, s: &str, type_name: &str) -> BindResult<'q> {
    let trimmed = s.trim();
    match type_name {
        "INT2" => convert(query, trimmed.parse::<i16>(), s, type_name),
        "INT4" => convert(query, trimmed.parse::<i32>(), s, type_name),
        "INT8" => convert(query, trimmed.parse::<i64>(), s, type_name),
        "OID" => convert(query, trimmed.parse::<u32>().map(Oid), s, type_name),
        "FLOAT4" => convert(query, trimmed.parse::<f32>(), s, type_name),
        "FLOAT8" => convert(query, trimmed.parse::<f64>(), s, type_name),
        "NUMERIC" => convert(query, Decimal::from_str(trimmed), s, type_name),
        "BOOL" => convert(query, parse_bool(trimmed), s, type_name),
        "DATE" => convert(query, parse_date(trimmed), s, type_name),
        "TIME" => convert(query, NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f"), s, type_name),
        "TIMESTAMP" => convert(query, parse_timestamp(trimmed), s, type_name),
        "TIMESTAMPTZ" => convert(query, parse_timestamptz(trimmed), s, type_name),
        "UUID" => convert(query, Uuid::parse_str(trimmed), s, type_name),
        "JSONB" => convert(query, serde_json::from_str::<serde_json::Value>(s), s, type_name),
        "INTERVAL" => convert(query, parse_interval(trimmed).ok_or(()), s, type_name),
        "INET" => convert(query, PgInet::parse(trimmed, false).ok_or(()), s, type_name),
        "CIDR" => convert(query, PgInet::parse(trimmed, true).ok_or(()), s, type_name),
        "BYTEA" => Ok(query.bind(s.as_bytes().to_vec())),
        "" => Ok(query.bind(s.to_string())),
        other => match other.strip_suffix("[]") {
            Some(element) => bind_array(query, s, element, other),
            None => Err(cannot_encode(s, other)),
        },
    }
}

/// Bind an array literal such as `{1,2,NULL}` as a typed array
fn bind_array<'q>(
    query: PgQuery<'q>,
    literal: &str,
    element: &str,
    type_name: &str,
) -> BindResult<'q> {
    let items = parse_array_literal(literal).ok_or_else(|| cannot_encode(literal, type_name))?;

    match element {
        "INT2" => bind_elements(query, &items, |s| s.parse::<i16>(), literal, type_name),
        "INT4" => bind_elements(query, &items, |s| s.parse::<i32>(), literal, type_name),
        "INT8" => bind_elements(query, &items, |s| s.parse::<i64>(), literal, type_name),
        "FLOAT4" => bind_elements(query, &items, |s| s.parse::<f32>(), literal, type_name),
        "FLOAT8" => bind_elements(query, &items, |s| s.parse::<f64>(), literal, type_name),
        "NUMERIC" => bind_elements(query, &items, Decimal::from_str, literal, type_name),
        "BOOL" => bind_elements(query, &items, parse_bool, literal, type_name),
        "DATE" => bind_elements(query, &items, parse_date, literal, type_name),
        "UUID" => bind_elements(query, &items, Uuid::parse_str, literal, type_name),
        "TEXT" => bind_elements(query, &items, |s| Ok::<_, ()>(s.to_string()), literal, type_name),
        _ => Err(cannot_encode(literal, type_name)),
    }
}

fn bind_elements<'q, T, E>(
    query: PgQuery<'q>,
    items: &[Option<String>],
    parse: impl Fn(&str) -> Result<T, E>,
    literal: &str,
    type_name: &str,
) -> BindResult<'q>
where
    T: 'q + PgHasArrayType + Encode<'q, Postgres> + Type<Postgres>,
{
    let values = items
        .iter()
        .map(|item| item.as_deref().map(&parse).transpose())
        .collect::<Result<Vec<Option<T>>, E>>()
        .map_err(|_| cannot_encode(literal, type_name))?;

    Ok(query.bind(values))
}

fn convert<'q, T, E>(
    query: PgQuery<'q>,
    parsed: Result<T, E>,
    value: impl fmt::Debug,
    type_name: &str,
) -> BindResult<'q>
where
    T: 'q + Encode<'q, Postgres> + Type<Postgres>,
{
    match parsed {
        Ok(v) => Ok(query.bind(v)),
        Err(_) => Err(cannot_encode(value, type_name)),
    }
}

fn cannot_encode(value: impl fmt::Debug, type_name: &str) -> sqlx::Error {
    sqlx::Error::Encode(format!("cannot encode {value:?} as {type_name}").into())
}

/// Integral value of `v`, if it has no fractional part and fits an i64
fn whole(v: f64) -> Option<i64> {
    // 2^63 is exactly representable; i64::MAX is not
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (v.fract() == 0.0 && v >= -LIMIT && v < LIMIT).then(|| v as i64)
}

fn whole_as<T: TryFrom<i64>>(v: f64) -> Result<T, ()> {
    whole(v).and_then(|n| T::try_from(n).ok()).ok_or(())
}

fn parse_bool(s: &str) -> Result<bool, ()> {
    match s {
        "1" | "t" | "true" | "TRUE" | "y" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "FALSE" | "n" | "no" | "off" => Ok(false),
        _ => Err(()),
    }
}

fn parse_date(s: &str) -> chrono::ParseResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

fn parse_timestamp(s: &str) -> chrono::ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
}

fn parse_timestamptz(s: &str) -> chrono::ParseResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| parse_timestamp(s).map(|dt| dt.and_utc()))
}

/// Parse a one-dimensional array literal. Unquoted `NULL` is a null element.
fn parse_array_literal(literal: &str) -> Option<Vec<Option<String>>> {
    let inner = literal.trim().strip_prefix('{')?.strip_suffix('}')?;
    if inner.trim().is_empty() {
        return Some(Vec::new());
    }

    let mut items = Vec::new();
    let mut chars = inner.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let item = if chars.next_if_eq(&'"').is_some() {
            let mut value = String::new();
            loop {
                match chars.next()? {
                    '"' => break,
                    '\\' => value.push(chars.next()?),
                    c => value.push(c),
                }
            }
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            Some(value)
        } else {
            let mut raw = String::new();
            while let Some(c) = chars.next_if(|c| *c != ',') {
                if matches!(c, '{' | '}' | '"') {
                    return None;
                }
                raw.push(c);
            }
            match raw.trim() {
                "" => return None,
                null if null.eq_ignore_ascii_case("NULL") => None,
                value => Some(value.to_string()),
            }
        };
        items.push(item);

        match chars.next() {
            None => return Some(items),
            Some(',') => {}
            Some(_) => return None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntervalUnit {
    Months(i32),
    Days(i32),
    Micros(i64),
}

impl IntervalUnit {
    fn parse(token: &str) -> Option<Self> {
        use IntervalUnit::*;
        let unit = match token.to_ascii_lowercase().as_str() {
            "microsecond" | "microseconds" | "us" | "usec" | "usecs" => Micros(1),
            "millisecond" | "milliseconds" | "ms" | "msec" | "msecs" => Micros(1_000),
            "second" | "seconds" | "s" | "sec" | "secs" => Micros(1_000_000),
            "minute" | "minutes" | "m" | "min" | "mins" => Micros(60_000_000),
            "hour" | "hours" | "h" | "hr" | "hrs" => Micros(3_600_000_000),
            "day" | "days" | "d" => Days(1),
            "week" | "weeks" | "w" => Days(7),
            "month" | "months" | "mon" | "mons" => Months(1),
            "year" | "years" | "y" | "yr" | "yrs" => Months(12),
            "decade" | "decades" => Months(120),
            "century" | "centuries" => Months(1200),
            _ => return None,
        };
        Some(unit)
    }
}

/// Parse the common interval forms: `1 day`, `2 hours 30 mins`,
/// `1 year 2 mons 3 days 04:05:06.5`, `01:30:00`, `3 days ago`.
/// A bare number counts as seconds.
fn parse_interval(input: &str) -> Option<PgInterval> {
    let mut interval = PgInterval {
        months: 0,
        days: 0,
        microseconds: 0,
    };
    let mut tokens = input.split_whitespace().peekable();
    let mut seen = false;
    let mut ago = false;

    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("ago") && seen && tokens.peek().is_none() {
            ago = true;
            break;
        }

        if token.contains(':') {
            interval.microseconds = interval.microseconds.checked_add(parse_clock(token)?)?;
        } else {
            let amount: f64 = token.parse().ok()?;
            let unit = tokens
                .next_if(|t| IntervalUnit::parse(t).is_some())
                .and_then(IntervalUnit::parse)
                .unwrap_or(IntervalUnit::Micros(1_000_000));

            match unit {
                IntervalUnit::Months(f) => {
                    let n = i32::try_from(whole(amount)?).ok()?.checked_mul(f)?;
                    interval.months = interval.months.checked_add(n)?;
                }
                IntervalUnit::Days(f) => {
                    let n = i32::try_from(whole(amount)?).ok()?.checked_mul(f)?;
                    interval.days = interval.days.checked_add(n)?;
                }
                IntervalUnit::Micros(f) => {
                    let n = whole((amount * f as f64).round())?;
                    interval.microseconds = interval.microseconds.checked_add(n)?;
                }
            }
        }
        seen = true;
    }

    if !seen {
        return None;
    }
    if ago {
        interval.months = interval.months.checked_neg()?;
        interval.days = interval.days.checked_neg()?;
        interval.microseconds = interval.microseconds.checked_neg()?;
    }
    Some(interval)
}

/// `[-]HH:MM[:SS[.ffffff]]` as microseconds
fn parse_clock(token: &str) -> Option<i64> {
    let (sign, body) = match token.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, token.strip_prefix('+').unwrap_or(token)),
    };

    let mut parts = body.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: f64 = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() || !(0..60).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let micros = hours
        .checked_mul(3_600_000_000)?
        .checked_add(minutes * 60_000_000)?
        .checked_add(whole((seconds * 1_000_000.0).round())?)?;
    Some(sign * micros)
}

/// An INET or CIDR value in the server's binary layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PgInet {
    addr: IpAddr,
    prefix: u8,
    cidr: bool,
}

impl PgInet {
    /// `address[/prefix]`; the prefix defaults to the full address width
    fn parse(input: &str, cidr: bool) -> Option<Self> {
        let (addr, prefix) = match input.split_once('/') {
            Some((addr, bits)) => (addr, Some(bits)),
            None => (input, None),
        };
        let addr = IpAddr::from_str(addr).ok()?;
        let width = if addr.is_ipv4() { 32 } else { 128 };
        let prefix = match prefix {
            Some(bits) => bits.parse::<u8>().ok().filter(|b| *b <= width)?,
            None => width,
        };

        Some(Self { addr, prefix, cidr })
    }
}

impl Type<Postgres> for PgInet {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(869))
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        matches!(ty.name(), "INET" | "CIDR")
    }
}

impl Encode<'_, Postgres> for PgInet {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> Result<IsNull, BoxDynError> {
        // PGSQL_AF_INET is 2 and PGSQL_AF_INET6 is 3
        let (family, octets) = match self.addr {
            IpAddr::V4(addr) => (2u8, addr.octets().to_vec()),
            IpAddr::V6(addr) => (3u8, addr.octets().to_vec()),
        };

        buf.extend_from_slice(&[family, self.prefix, u8::from(self.cidr), octets.len() as u8]);
        buf.extend_from_slice(&octets);
        Ok(IsNull::No)
    }
}
