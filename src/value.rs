//! Value module for reportq
//!
//! This module provides the common value type every record property is read as,
//! together with the type tags and conversions the expression compiler relies on:
//!
//! - Dynamic type inference for text loaded from delimited files
//! - Coercion between value types (numeric widening, date serials, text parsing)
//! - SQL-style equality and ordering with mixed numeric types

use std::cmp::Ordering;
use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, ReportResult};

/// Static type tag of a value or of an expression node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Type of the `null` literal
    Null,
    /// 64-bit signed integer
    Integer,
    /// 64-bit floating point number
    Float,
    /// UTF-8 string
    String,
    /// Boolean value
    Boolean,
    /// Date and time of day
    Date,
}

impl ValueType {
    /// Whether values of this type take part in arithmetic
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Null => "NULL",
            ValueType::Integer => "INTEGER",
            ValueType::Float => "FLOAT",
            ValueType::String => "STRING",
            ValueType::Boolean => "BOOLEAN",
            ValueType::Date => "DATE",
        };
        f.write_str(name)
    }
}

/// Represents a single property value read from a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Represents a NULL or missing value
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Boolean value (true/false)
    Boolean(bool),
    /// Date and time of day
    Date(NaiveDateTime),
}

/// Base date used to anchor time-only literals
pub fn time_base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Parse the textual date formats accepted in literals and data files
///
/// Accepts ISO dates with or without a time part (`T` or space separated),
/// slash separated dates, and bare times which are anchored on 1900-01-01.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    const DATE_TIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }

    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(text, format) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    for format in ["%H:%M:%S%.f", "%H:%M"] {
        if let Ok(t) = NaiveTime::parse_from_str(text, format) {
            return Some(time_base_date().and_time(t));
        }
    }

    None
}

/// Convert a `yyyymmdd` date serial (or `yyyymm` period serial) to a date
pub fn date_from_serial(serial: i64) -> Option<NaiveDateTime> {
    let (year, month, day) = if serial >= 10_000_000 {
        (serial / 10_000, (serial / 100) % 100, serial % 100)
    } else if serial >= 100_000 {
        (serial / 100, serial % 100, 1)
    } else {
        return None;
    };
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)?.and_hms_opt(0, 0, 0)
}

/// Convert a date to its `yyyymmdd` serial
pub fn serial_from_date(date: &NaiveDateTime) -> i64 {
    date.year() as i64 * 10_000 + date.month() as i64 * 100 + date.day() as i64
}

impl Value {
    /// The type tag of this value
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Integer(_) => ValueType::Integer,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Date(_) => ValueType::Date,
        }
    }

    /// Whether this is the NULL value
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert this value to the given type
    ///
    /// NULL converts to NULL of any type. Float to Integer truncates, Integer
    /// to Date reads a `yyyymmdd` (or `yyyymm`) serial and Date to Integer
    /// produces one. Text is parsed for every non-text target.
    ///
    /// # Returns
    /// * `Ok(Value)` holding a value of the target type (or NULL)
    /// * `Err(ReportError::TypeError)` if the conversion is not possible
    pub fn convert(&self, target: ValueType) -> ReportResult<Value> {
        if self.value_type() == target || target == ValueType::Null {
            return Ok(self.clone());
        }

        let converted = match (self, target) {
            (Value::Null, _) => Some(Value::Null),

            (Value::Integer(i), ValueType::Float) => Some(Value::Float(*i as f64)),
            (Value::Integer(i), ValueType::Boolean) => Some(Value::Boolean(*i != 0)),
            (Value::Integer(i), ValueType::Date) => date_from_serial(*i).map(Value::Date),

            (Value::Float(f), ValueType::Integer) => Some(Value::Integer(f.trunc() as i64)),
            (Value::Float(f), ValueType::Boolean) => Some(Value::Boolean(*f != 0.0)),
            (Value::Float(f), ValueType::Date) => date_from_serial(f.trunc() as i64).map(Value::Date),

            (Value::Boolean(b), ValueType::Integer) => Some(Value::Integer(i64::from(*b))),
            (Value::Boolean(b), ValueType::Float) => Some(Value::Float(if *b { 1.0 } else { 0.0 })),

            (Value::Date(d), ValueType::Integer) => Some(Value::Integer(serial_from_date(d))),
            (Value::Date(d), ValueType::Float) => Some(Value::Float(serial_from_date(d) as f64)),

            (Value::String(s), ValueType::Integer) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (Value::String(s), ValueType::Float) => s.trim().parse::<f64>().ok().map(Value::Float),
            (Value::String(s), ValueType::Date) => parse_date(s).map(Value::Date),
            (Value::String(s), ValueType::Boolean) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Value::Boolean(true)),
                "false" | "no" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },

            (_, ValueType::String) => Some(Value::String(self.to_string())),

            _ => None,
        };

        converted.ok_or_else(|| {
            ReportError::TypeError(format!("Cannot convert {:?} to {}", self, target))
        })
    }

    /// Truth value for logical operators
    ///
    /// NULL counts as false; any non-boolean value is a type error.
    pub fn truthy(&self) -> ReportResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Null => Ok(false),
            other => Err(ReportError::TypeError(format!(
                "Expected a boolean, got {:?}",
                other
            ))),
        }
    }
}

/// Equality with Integer/Float coercion; other type combinations are not equal
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                integral_eq(*a, *b)
            }
            _ => false,
        }
    }
}

/// An integer equals a float only when the float holds exactly that integer
fn integral_eq(i: i64, f: f64) -> bool {
    let bound = -(i64::MIN as f64);
    f.fract() == 0.0 && (-bound..bound).contains(&f) && f as i64 == i
}

/// Bits a float hashes by; every NaN and both zeros share one key
fn float_key(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0_f64.to_bits()
    } else {
        f.to_bits()
    }
}

// Needed for grouping keys and DISTINCT aggregates
impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0_i32.hash(state),
            Value::Integer(i) => {
                // Integers hash as floats so 1 and 1.0 land in the same bucket
                2_i32.hash(state);
                float_key(*i as f64).hash(state);
            }
            Value::Float(f) => {
                2_i32.hash(state);
                float_key(*f).hash(state);
            }
            Value::String(s) => {
                3_i32.hash(state);
                s.hash(state);
            }
            Value::Boolean(b) => {
                4_i32.hash(state);
                b.hash(state);
            }
            Value::Date(d) => {
                5_i32.hash(state);
                d.hash(state);
            }
        }
    }
}

/// Ordering used for sorting
///
/// NULL sorts first. Numbers compare across Integer/Float. Different types
/// follow the precedence order NULL < Boolean < Number < Date < String.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Boolean(_) => 1,
                Value::Integer(_) | Value::Float(_) => 2,
                Value::Date(_) => 3,
                Value::String(_) => 4,
            }
        }

        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.partial_cmp(b),
            _ => rank(self).partial_cmp(&rank(other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(float) => write!(f, "{}", float),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Date(d) => {
                if d.hour() == 0 && d.minute() == 0 && d.second() == 0 {
                    write!(f, "{}", d.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

/// String conversion with automatic type inference
///
/// Used when loading delimited data. Tries, in order: integer, float,
/// boolean words, ISO date; empty text becomes NULL and anything else
/// stays a string.
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        if let Ok(i) = s.parse::<i64>() {
            return Value::Integer(i);
        }

        // words such as "nan" or "inf" stay text
        if let Ok(fl) = s.parse::<f64>() {
            if fl.is_finite() {
                return Value::Float(fl);
            }
        }

        match s.to_lowercase().as_str() {
            "true" | "yes" => return Value::Boolean(true),
            "false" | "no" => return Value::Boolean(false),
            "" => return Value::Null,
            _ => {}
        }

        if s.contains('-') {
            if let Some(d) = parse_date(s) {
                return Value::Date(d);
            }
        }

        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d.and_time(NaiveTime::MIN))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
