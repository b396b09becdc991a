//! Dynamic records for reportq
//!
//! `DataRow` is the record type used when the columns are only known at run
//! time, e.g. after loading a delimited file. Its layout is built from the
//! column list, and a row can carry child tables for nested master-detail
//! links.

use std::collections::HashMap;
use std::rc::Rc;

use crate::accessor::RecordLayout;
use crate::cursor::Nested;
use crate::value::{Value, ValueType};

/// Name and static type of one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub value_type: ValueType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: &str, value_type: ValueType, nullable: bool) -> Self {
        Column {
            name: name.to_string(),
            value_type,
            nullable,
        }
    }
}

/// One record with positional values and optional child tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataRow {
    values: Vec<Value>,
    children: HashMap<String, Rc<Vec<DataRow>>>,
}

impl DataRow {
    pub fn new(values: Vec<Value>) -> Self {
        DataRow {
            values,
            children: HashMap::new(),
        }
    }

    /// Attach the child rows of `table`
    pub fn with_child(mut self, table: &str, rows: Vec<DataRow>) -> Self {
        self.children.insert(table.to_string(), Rc::new(rows));
        self
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at `index`, NULL past the end
    pub fn get(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or(Value::Null)
    }

    /// Layout reading each column by position
    pub fn layout(columns: &[Column]) -> RecordLayout<DataRow> {
        columns
            .iter()
            .enumerate()
            .fold(RecordLayout::new(), |layout, (index, column)| {
                layout.property(
                    &column.name,
                    column.value_type,
                    column.nullable,
                    move |row: &DataRow| row.get(index),
                )
            })
    }
}

impl Nested<DataRow> for DataRow {
    fn nested(&self, table: &str) -> Option<Rc<Vec<DataRow>>> {
        self.children.get(table).cloned()
    }
}

/// Infer one type per column from the raw cell text and type every cell
///
/// Columns mixing integers and floats become floats; any other mix falls
/// back to text. A column with no value at all is text. Text columns keep
/// the cell text exactly as read, so `00501` stays `00501`.
pub fn infer_columns(names: &[String], cells: &[Vec<String>]) -> (Vec<Column>, Vec<Vec<Value>>) {
    let inferred: Vec<Vec<Value>> = cells
        .iter()
        .map(|row| row.iter().map(|text| Value::from(text.as_str())).collect())
        .collect();

    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let mut value_type: Option<ValueType> = None;
            let mut nullable = false;
            for row in &inferred {
                let cell = match row.get(index) {
                    Some(cell) if !cell.is_null() => cell,
                    _ => {
                        nullable = true;
                        continue;
                    }
                };
                value_type = Some(match value_type {
                    None => cell.value_type(),
                    Some(current) if current == cell.value_type() => current,
                    Some(current) if current.is_numeric() && cell.value_type().is_numeric() => {
                        ValueType::Float
                    }
                    Some(_) => ValueType::String,
                });
            }
            Column::new(name, value_type.unwrap_or(ValueType::String), nullable)
        })
        .collect();

    let rows = cells
        .iter()
        .zip(inferred)
        .map(|(texts, values)| {
            texts
                .iter()
                .zip(values)
                .zip(&columns)
                .map(|((text, value), column)| type_cell(text, value, column.value_type))
                .collect()
        })
        .collect();
    (columns, rows)
}

/// Final value of one cell once its column type is known
fn type_cell(text: &str, inferred: Value, value_type: ValueType) -> Value {
    match value_type {
        _ if inferred.is_null() => Value::Null,
        ValueType::String => Value::String(text.to_string()),
        _ => inferred
            .convert(value_type)
            .unwrap_or_else(|_| Value::String(text.to_string())),
    }
}
