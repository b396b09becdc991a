//! Tree-walking evaluator for compiled filter expressions

use std::cmp::Ordering;

use chrono::Datelike;

use crate::accessor::AccessorCache;
use crate::error::{ReportError, ReportResult};
use crate::value::Value;

use super::ast::{BinaryOp, CaseMode, Expr, Function, UnaryOp};

impl Expr {
    /// Evaluate this expression against one record
    ///
    /// Field values are read through `cache`, which builds each accessor the
    /// first time it is needed.
    pub fn evaluate<R>(&self, record: &R, cache: &AccessorCache<R>) -> ReportResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Field { index, name } => cache
                .read(record, *index)
                .ok_or_else(|| ReportError::ColumnNotFound(name.clone())),
            Expr::Convert { expr, target } => expr.evaluate(record, cache)?.convert(*target),
            Expr::Unary { op, expr } => {
                let value = expr.evaluate(record, cache)?;
                match op {
                    UnaryOp::Not => Ok(Value::Boolean(!value.truthy()?)),
                    UnaryOp::Neg => negate(value),
                }
            }
            Expr::Binary { left, op, right } => {
                if op.is_logical() {
                    return logical(*op, left, right, record, cache);
                }
                let l = left.evaluate(record, cache)?;
                let r = right.evaluate(record, cache)?;
                if op.is_comparison() {
                    Ok(Value::Boolean(compare(*op, &l, &r)))
                } else {
                    arithmetic(*op, l, r)
                }
            }
            Expr::Call {
                function,
                args,
                null_guard,
            } => call(*function, args, *null_guard, record, cache),
        }
    }
}

fn negate(value: Value) -> ReportResult<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Integer(i) => Ok(Value::Integer(i.wrapping_neg())),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(ReportError::TypeError(format!("Cannot negate {:?}", other))),
    }
}

/// AND / OR with short-circuit; NULL operands count as false
fn logical<R>(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    record: &R,
    cache: &AccessorCache<R>,
) -> ReportResult<Value> {
    let l = left.evaluate(record, cache)?.truthy()?;
    let result = match op {
        BinaryOp::And => l && right.evaluate(record, cache)?.truthy()?,
        _ => l || right.evaluate(record, cache)?.truthy()?,
    };
    Ok(Value::Boolean(result))
}

/// Relational comparison
///
/// `=` holds only for NULL against NULL, `<>` is its negation, and ordered
/// comparisons involving NULL are false.
pub fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        let both = left.is_null() && right.is_null();
        return match op {
            BinaryOp::Eq => both,
            BinaryOp::Ne => !both,
            _ => false,
        };
    }

    match op {
        BinaryOp::Eq => left == right,
        BinaryOp::Ne => left != right,
        _ => {
            let ordering = match left.partial_cmp(right) {
                Some(ordering) => ordering,
                None => return false,
            };
            match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                BinaryOp::Ge => ordering != Ordering::Less,
                _ => false,
            }
        }
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> ReportResult<Value> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Integer(a), Value::Integer(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                _ => {
                    if b == 0 {
                        return Err(ReportError::DivideByZero);
                    }
                    a.checked_div(b)
                }
            };
            result
                .map(Value::Integer)
                .ok_or_else(|| ReportError::TypeError(format!("Integer overflow in {} {} {}", a, op, b)))
        }
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => Ok(Value::String(a + &b)),
        (l, r) => {
            let (a, b) = match (as_float(&l), as_float(&r)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(ReportError::TypeError(format!(
                        "Cannot apply '{}' to {:?} and {:?}",
                        op, l, r
                    )))
                }
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ => {
                    if b == 0.0 {
                        return Err(ReportError::DivideByZero);
                    }
                    a / b
                }
            };
            Ok(Value::Float(result))
        }
    }
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn call<R>(
    function: Function,
    args: &[Expr],
    null_guard: bool,
    record: &R,
    cache: &AccessorCache<R>,
) -> ReportResult<Value> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        values.push(arg.evaluate(record, cache)?);
    }

    match function {
        Function::IsNull => Ok(Value::Boolean(values.first().map_or(true, Value::is_null))),
        Function::Year | Function::Month | Function::Day => {
            let date = match values.first() {
                Some(Value::Date(date)) => date,
                Some(Value::Null) if null_guard => return Ok(Value::Integer(-1)),
                Some(Value::Null) => {
                    return Err(ReportError::TypeError(
                        "Date part requested from a null value".to_string(),
                    ))
                }
                other => {
                    return Err(ReportError::TypeError(format!(
                        "Date part requested from {:?}",
                        other
                    )))
                }
            };
            let part = match function {
                Function::Year => date.year() as i64,
                Function::Month => date.month() as i64,
                _ => date.day() as i64,
            };
            Ok(Value::Integer(part))
        }
        Function::StrEquals(mode) => {
            let (a, b) = match (values.first(), values.get(1)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Ok(Value::Boolean(false)),
            };
            if a.is_null() || b.is_null() {
                return Ok(Value::Boolean(a.is_null() && b.is_null()));
            }
            let (a, b) = (a.to_string(), b.to_string());
            let equal = match mode {
                CaseMode::IgnoreCase => a.to_lowercase() == b.to_lowercase(),
                CaseMode::SameCase => a == b,
            };
            Ok(Value::Boolean(equal))
        }
    }
}
