//! Field descriptor module for reportq
//!
//! A field descriptor describes one selectable column of a report query:
//! its stable code, display text, data type tag, aggregate, optional computed
//! expression, sort direction and the table family used to order joins.

use serde::{Deserialize, Serialize};

/// Data type tag carried by a field descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DataType {
    /// Numeric column
    Number,
    /// Date stored as a `yyyymmdd` serial number
    DateSerial,
    /// Accounting period stored as a `yyyymm` serial number
    PeriodSerial,
    /// Text column
    String,
    /// Anything else; treated as text
    #[default]
    Other,
}

impl DataType {
    /// Whether values of this type are written without quotes
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Number | DataType::DateSerial | DataType::PeriodSerial
        )
    }

    /// Render a raw operand as a literal
    ///
    /// The SQL dialect and the filter expression language share the same
    /// literal syntax: numbers are bare, text is single-quoted with embedded
    /// quotes doubled.
    pub fn literal(&self, raw: &str) -> String {
        if self.is_numeric() {
            raw.trim().to_string()
        } else {
            quote(raw)
        }
    }
}

/// Single-quote a string, doubling embedded quotes
pub fn quote(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Aggregate function applied to a selected field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Aggregate {
    /// No aggregate; the field is a grouping key
    #[default]
    None,
    Sum,
    Count,
    Average,
    Min,
    Max,
    DistinctSum,
    DistinctCount,
    DistinctAverage,
}

impl Aggregate {
    /// Whether an aggregate is assigned
    pub fn is_some(&self) -> bool {
        *self != Aggregate::None
    }

    /// Whether duplicates are removed before aggregating
    pub fn is_distinct(&self) -> bool {
        matches!(
            self,
            Aggregate::DistinctSum | Aggregate::DistinctCount | Aggregate::DistinctAverage
        )
    }

    /// Wrap a column reference in this aggregate's SQL function
    pub fn wrap(&self, reference: &str) -> String {
        let function = match self {
            Aggregate::None => return reference.to_string(),
            Aggregate::Sum | Aggregate::DistinctSum => "SUM",
            Aggregate::Count | Aggregate::DistinctCount => "COUNT",
            Aggregate::Average | Aggregate::DistinctAverage => "AVG",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        };
        if self.is_distinct() {
            format!("{}(DISTINCT {})", function, reference)
        } else {
            format!("{}({})", function, reference)
        }
    }
}

/// Sort direction for a selected field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    /// Not sorted
    #[default]
    None,
    /// Sort in ascending order
    Ascending,
    /// Sort in descending order
    Descending,
}

impl SortDirection {
    /// SQL keyword for this direction, if any
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            SortDirection::None => None,
            SortDirection::Ascending => Some("ASC"),
            SortDirection::Descending => Some("DESC"),
        }
    }

    pub fn is_some(&self) -> bool {
        *self != SortDirection::None
    }
}

/// Metadata for one selectable column or computed value
///
/// `code` is the stable identifier and doubles as the SQL column reference; it
/// may be table-qualified (`Customers.Name`). Codes starting with `@` are macro
/// references and codes starting with `__` are internal computed markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldDescriptor {
    pub code: String,
    pub description: String,
    pub data_type: DataType,
    pub aggregate: Aggregate,
    /// Non-empty for derived fields
    pub computed_expression: Option<String>,
    pub sort: SortDirection,
    /// Table-group key used to linearize joins
    pub family: String,
}

impl Default for FieldDescriptor {
    fn default() -> Self {
        FieldDescriptor {
            code: String::new(),
            description: String::new(),
            data_type: DataType::Other,
            aggregate: Aggregate::None,
            computed_expression: None,
            sort: SortDirection::None,
            family: String::new(),
        }
    }
}

impl FieldDescriptor {
    /// Create a plain column descriptor
    pub fn new(code: &str, description: &str, data_type: DataType) -> Self {
        FieldDescriptor {
            code: code.to_string(),
            description: description.to_string(),
            data_type,
            ..Default::default()
        }
    }

    pub fn with_family(mut self, family: &str) -> Self {
        self.family = family.to_string();
        self
    }

    pub fn with_aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = aggregate;
        self
    }

    pub fn with_sort(mut self, sort: SortDirection) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_computed(mut self, expression: &str) -> Self {
        self.computed_expression = Some(expression.to_string());
        self
    }

    /// Whether this field is derived rather than a plain column
    pub fn is_computed(&self) -> bool {
        self.computed_expression
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty())
    }

    /// Whether the code is a macro reference (`@name`)
    pub fn is_macro(&self) -> bool {
        self.code.starts_with('@')
    }

    /// Whether the code is an internal computed marker (`__name`)
    pub fn is_internal(&self) -> bool {
        self.code.starts_with("__")
    }

    /// SQL column reference
    pub fn reference(&self) -> &str {
        &self.code
    }

    /// Reference wrapped in the field's aggregate (if any)
    pub fn aggregated_reference(&self) -> String {
        self.aggregate.wrap(self.reference())
    }

    /// The table qualifier of the code, if it has one
    pub fn table(&self) -> Option<&str> {
        self.code.rsplit_once('.').map(|(table, _)| table)
    }

    /// The column part of the code
    pub fn column(&self) -> &str {
        self.code
            .rsplit_once('.')
            .map_or(self.code.as_str(), |(_, column)| column)
    }

    /// Display text, falling back to the code
    pub fn label(&self) -> &str {
        if self.description.is_empty() {
            &self.code
        } else {
            &self.description
        }
    }
}
