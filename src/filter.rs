//! Filter predicate module for reportq
//!
//! A filter predicate is one comparison condition bound to a field descriptor.
//! The same predicate renders both as a SQL WHERE fragment and as a filter
//! expression for in-memory evaluation, so the two query paths agree.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{ReportResult, ValidationError};
use crate::field::{quote, FieldDescriptor};

/// Parameter values supplied at evaluation time, keyed by parameter name
pub type Parameters = HashMap<String, String>;

/// Comparison operator of a filter predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterOperator {
    #[default]
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    /// Inclusive range; the only operator that reads the second bound
    Between,
    /// Presence sentinel: the value is null or blank
    Space,
    /// Presence sentinel: the value is not null
    Exists,
}

impl FilterOperator {
    /// Whether this operator tests presence instead of comparing a value
    pub fn is_presence(&self) -> bool {
        matches!(self, FilterOperator::Space | FilterOperator::Exists)
    }

    /// Relational symbol shared by SQL and the filter expression language
    fn symbol(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "<>",
            FilterOperator::Less => "<",
            FilterOperator::LessOrEqual => "<=",
            FilterOperator::Greater => ">",
            FilterOperator::GreaterOrEqual | FilterOperator::Between => ">=",
            FilterOperator::Space | FilterOperator::Exists => "",
        }
    }
}

/// A single comparison condition, optionally negated, bound to one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterPredicate {
    pub field: FieldDescriptor,
    pub operator: FilterOperator,
    pub negated: bool,
    /// Raw first operand; a parameter name when `from_is_parameter`
    pub value_from: String,
    /// Raw second operand; empty means a single-bound comparison
    pub value_to: String,
    pub from_is_parameter: bool,
    pub to_is_parameter: bool,
}

impl Default for FilterPredicate {
    fn default() -> Self {
        FilterPredicate {
            field: FieldDescriptor::default(),
            operator: FilterOperator::Equal,
            negated: false,
            value_from: String::new(),
            value_to: String::new(),
            from_is_parameter: false,
            to_is_parameter: false,
        }
    }
}

impl FilterPredicate {
    /// Create a single-bound literal comparison
    pub fn new(field: FieldDescriptor, operator: FilterOperator, value: &str) -> Self {
        FilterPredicate {
            field,
            operator,
            value_from: value.to_string(),
            ..Default::default()
        }
    }

    /// Create an inclusive range comparison
    pub fn between(field: FieldDescriptor, from: &str, to: &str) -> Self {
        FilterPredicate {
            field,
            operator: FilterOperator::Between,
            value_from: from.to_string(),
            value_to: to.to_string(),
            ..Default::default()
        }
    }

    /// Create a presence test (`Space` or `Exists`)
    pub fn presence(field: FieldDescriptor, operator: FilterOperator) -> Self {
        FilterPredicate {
            field,
            operator,
            ..Default::default()
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    /// Mark the first bound (and second, if present) as parameter names
    pub fn parameterized(mut self) -> Self {
        self.from_is_parameter = true;
        self.to_is_parameter = !self.value_to.is_empty();
        self
    }

    /// Whether the predicate carries no condition at all
    pub fn is_inert(&self) -> bool {
        self.value_from.trim().is_empty()
            && self.value_to.trim().is_empty()
            && !self.operator.is_presence()
    }

    /// Whether the predicate contributes a WHERE condition
    ///
    /// Requires a first bound (or a presence operator) and a field code that
    /// is neither a macro reference nor an internal marker.
    pub fn is_where_candidate(&self) -> bool {
        (self.operator.is_presence() || !self.value_from.trim().is_empty())
            && !self.field.is_macro()
            && !self.field.is_internal()
    }

    fn has_range(&self) -> bool {
        self.operator == FilterOperator::Between && !self.value_to.trim().is_empty()
    }

    /// Render the condition as SQL
    ///
    /// Parameter bounds become `@name` placeholders; literals are rendered per
    /// the field's data type without further escaping beyond quote doubling.
    pub fn to_sql(&self) -> String {
        let reference = self.field.reference();
        let sql_operand = |raw: &str, is_parameter: bool| {
            if is_parameter {
                format!("@{}", raw.trim().trim_start_matches('@'))
            } else {
                self.field.data_type.literal(raw)
            }
        };

        let condition = match self.operator {
            FilterOperator::Space => {
                if self.field.data_type.is_numeric() {
                    format!("{} IS NULL", reference)
                } else {
                    format!("({0} IS NULL OR {0} = '')", reference)
                }
            }
            FilterOperator::Exists => format!("{} IS NOT NULL", reference),
            FilterOperator::Between if self.has_range() => format!(
                "{} BETWEEN {} AND {}",
                reference,
                sql_operand(&self.value_from, self.from_is_parameter),
                sql_operand(&self.value_to, self.to_is_parameter)
            ),
            op => format!(
                "{} {} {}",
                reference,
                op.symbol(),
                sql_operand(&self.value_from, self.from_is_parameter)
            ),
        };

        if self.negated {
            format!("NOT ({})", condition)
        } else {
            condition
        }
    }

    /// Render the condition in the filter expression language
    ///
    /// Parameter bounds are resolved from `params` here, so the result is
    /// ready to compile.
    ///
    /// # Returns
    /// * `Ok(String)` with the expression text
    /// * `Err(ValidationError::MissingParameter)` if a parameter has no value
    pub fn to_expression(&self, params: &Parameters) -> ReportResult<String> {
        let field = format!("[{}]", self.field.code);
        let resolve = |raw: &str, is_parameter: bool| -> ReportResult<String> {
            if !is_parameter {
                return Ok(self.field.data_type.literal(raw));
            }
            let name = raw.trim().trim_start_matches('@');
            params
                .get(name)
                .map(|value| self.field.data_type.literal(value))
                .ok_or_else(|| ValidationError::MissingParameter(name.to_string()).into())
        };

        let condition = match self.operator {
            FilterOperator::Space => {
                if self.field.data_type.is_numeric() {
                    format!("ISNULL({})", field)
                } else {
                    format!("(ISNULL({0}) OR {0} = {1})", field, quote(""))
                }
            }
            FilterOperator::Exists => format!("NOT ISNULL({})", field),
            FilterOperator::Between if self.has_range() => format!(
                "({0} >= {1} AND {0} <= {2})",
                field,
                resolve(&self.value_from, self.from_is_parameter)?,
                resolve(&self.value_to, self.to_is_parameter)?
            ),
            op => format!(
                "{} {} {}",
                field,
                op.symbol(),
                resolve(&self.value_from, self.from_is_parameter)?
            ),
        };

        Ok(if self.negated {
            format!("NOT ({})", condition)
        } else {
            condition
        })
    }
}

/// Group WHERE candidates by field code
///
/// Candidates are stably sorted by field code and consecutive predicates on
/// the same code form one group. Groups are OR-ed internally and AND-ed with
/// each other by both the SQL compiler and the in-memory evaluator.
pub fn group_by_field(filters: &[FilterPredicate]) -> Vec<Vec<&FilterPredicate>> {
    let mut candidates: Vec<&FilterPredicate> =
        filters.iter().filter(|f| f.is_where_candidate()).collect();
    candidates.sort_by(|a, b| a.field.code.cmp(&b.field.code));

    let mut groups: Vec<Vec<&FilterPredicate>> = Vec::new();
    for filter in candidates {
        match groups.last_mut() {
            Some(group) if group[0].field.code == filter.field.code => group.push(filter),
            _ => groups.push(vec![filter]),
        }
    }
    groups
}
