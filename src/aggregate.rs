//! Aggregate function module for reportq
//!
//! This module evaluates the field aggregates in memory over one group of
//! values. The distinct variants de-duplicate the group before aggregating.

use std::collections::HashSet;

use crate::error::ReportResult;
use crate::field::Aggregate;
use crate::value::Value;

impl Aggregate {
    /// Execute the aggregate on a column of values
    ///
    /// # Arguments
    /// * `values` - The column values of one group
    ///
    /// # Returns
    /// * The aggregated value; NULL when no value qualifies
    pub fn execute(&self, values: &[Value]) -> ReportResult<Value> {
        if self.is_distinct() {
            let distinct = distinct(values);
            return self.base().execute(&distinct);
        }

        match self {
            Aggregate::None => Ok(values.first().cloned().unwrap_or(Value::Null)),
            Aggregate::Count => Ok(count(values)),
            Aggregate::Sum => Ok(sum(values)),
            Aggregate::Average => Ok(average(values)),
            Aggregate::Min => Ok(extreme(values, |candidate, best| candidate < best)),
            Aggregate::Max => Ok(extreme(values, |candidate, best| candidate > best)),
            _ => Ok(Value::Null),
        }
    }

    /// The non-distinct counterpart of this aggregate
    fn base(&self) -> Aggregate {
        match self {
            Aggregate::DistinctSum => Aggregate::Sum,
            Aggregate::DistinctCount => Aggregate::Count,
            Aggregate::DistinctAverage => Aggregate::Average,
            other => *other,
        }
    }
}

/// Values with duplicates removed, keeping first appearances
fn distinct(values: &[Value]) -> Vec<Value> {
    let mut seen = HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(*v))
        .cloned()
        .collect()
}

/// Counts non-NULL values
fn count(values: &[Value]) -> Value {
    let count = values.iter().filter(|v| !v.is_null()).count();
    Value::Integer(count as i64)
}

/// Sums numeric values, staying integral until a float or an overflow shows up
fn sum(values: &[Value]) -> Value {
    let mut is_float = false;
    let mut int_sum: i64 = 0;
    let mut float_sum: f64 = 0.0;
    let mut count = 0;

    for value in values {
        match value {
            Value::Integer(i) => {
                if is_float {
                    float_sum += *i as f64;
                } else if let Some(total) = int_sum.checked_add(*i) {
                    int_sum = total;
                } else {
                    // widen to float once the integer total overflows
                    float_sum = int_sum as f64 + *i as f64;
                    is_float = true;
                }
                count += 1;
            }
            Value::Float(f) => {
                if !is_float {
                    float_sum = int_sum as f64;
                    is_float = true;
                }
                float_sum += *f;
                count += 1;
            }
            _ => {}
        }
    }

    if count == 0 {
        Value::Null
    } else if is_float {
        Value::Float(float_sum)
    } else {
        Value::Integer(int_sum)
    }
}

fn average(values: &[Value]) -> Value {
    let count = values.iter().filter(|v| v.value_type().is_numeric()).count();
    match sum(values) {
        Value::Integer(i) => Value::Float(i as f64 / count as f64),
        Value::Float(f) => Value::Float(f / count as f64),
        _ => Value::Null,
    }
}

/// Smallest or largest non-NULL value according to `better`
fn extreme(values: &[Value], better: impl Fn(&Value, &Value) -> bool) -> Value {
    let mut best: Option<&Value> = None;
    for value in values.iter().filter(|v| !v.is_null()) {
        best = match best {
            Some(current) if !better(value, current) => Some(current),
            _ => Some(value),
        };
    }
    best.cloned().unwrap_or(Value::Null)
}
