//! Table module for reportq
//!
//! This module provides the in-memory result table produced by evaluating a
//! query specification. It handles:
//!
//! - Column naming and lookup by label
//! - Row storage with width validation
//! - Multi-key sorting with per-key direction
//! - Delimited output for the command line

use std::collections::HashMap;
use std::io::Write;

use anyhow::Result;

use crate::error::{ReportError, ReportResult};
use crate::field::SortDirection;
use crate::value::Value;

/// Represents a row in a table
pub type Row = Vec<Value>;

/// Represents an in-memory result table
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Name of the table
    name: String,

    /// Column labels
    columns: Vec<String>,

    /// Map of column labels to their indices
    column_map: HashMap<String, usize>,

    /// Rows of data
    rows: Vec<Row>,
}

impl Table {
    /// Create a new empty table with the given name and columns
    pub fn new(name: &str, columns: Vec<String>) -> Self {
        let column_map = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        Table {
            name: name.to_string(),
            columns,
            column_map,
            rows: Vec::new(),
        }
    }

    /// Get the column labels of the table
    ///
    /// The labels keep the order of the selected fields.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Get the rows of the table
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Add a row to the table
    ///
    /// # Arguments
    /// * `row` - Vector of values to add as a new row
    ///
    /// # Returns
    /// * `Ok(())` if the row was successfully added
    /// * `Err` if the row width doesn't match the column count
    pub fn add_row(&mut self, row: Row) -> ReportResult<()> {
        if row.len() != self.columns.len() {
            return Err(ReportError::TypeError(format!(
                "Row has {} columns, but table '{}' has {} columns",
                row.len(),
                self.name,
                self.columns.len()
            )));
        }

        self.rows.push(row);
        Ok(())
    }

    /// Get the index of a column by label
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_map.get(name).copied()
    }

    /// Value of column `name` in row `row`
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        let index = self.column_index(name)?;
        self.rows.get(row)?.get(index)
    }

    /// Sort the rows by one or more columns
    ///
    /// Compares each sort column in order until a difference is found; keys
    /// with no direction are skipped. The sort is stable.
    ///
    /// # Arguments
    /// * `sort_columns` - Column indices with their sort directions
    ///
    /// # Returns
    /// * `Ok(())` once sorted
    /// * `Err` if any column index is out of bounds
    pub fn sort(&mut self, sort_columns: &[(usize, SortDirection)]) -> ReportResult<()> {
        for (col_idx, _) in sort_columns {
            if *col_idx >= self.column_count() {
                return Err(ReportError::ColumnNotFound(format!(
                    "Column index {} out of bounds for sorting (table has {} columns)",
                    col_idx,
                    self.column_count()
                )));
            }
        }

        self.rows.sort_by(|row_a, row_b| {
            for &(col_idx, direction) in sort_columns {
                let ordering = match row_a[col_idx].partial_cmp(&row_b[col_idx]) {
                    Some(ordering) => ordering,
                    None => continue,
                };
                if ordering != std::cmp::Ordering::Equal {
                    return match direction {
                        SortDirection::Descending => ordering.reverse(),
                        _ => ordering,
                    };
                }
            }
            std::cmp::Ordering::Equal
        });
        Ok(())
    }

    /// Write the table in delimited format, header first
    ///
    /// Cells holding the delimiter, a quote or a line break are quoted.
    pub fn write_delimited<W: Write>(&self, out: &mut W, delimiter: u8) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(out);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Print the table to stdout in comma-delimited format
    pub fn print_to_stdout(&self) -> Result<()> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.write_delimited(&mut handle, b',')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new("t", vec!["Region".into(), "Total".into()]);
        table
            .add_row(vec![Value::from("West".to_string()), Value::Integer(5)])
            .unwrap();
        table
            .add_row(vec![Value::from("East".to_string()), Value::Integer(5)])
            .unwrap();
        table
            .add_row(vec![Value::from("North".to_string()), Value::Integer(9)])
            .unwrap();
        table
    }

    #[test]
    fn test_add_row_checks_width() {
        let mut table = sample();
        assert!(table.add_row(vec![Value::Null]).is_err());
        assert_eq!(table.row_count(), 3);
    }

    #[test]
    fn test_multi_key_sort() {
        let mut table = sample();
        table
            .sort(&[(1, SortDirection::Descending), (0, SortDirection::Ascending)])
            .unwrap();
        let regions: Vec<String> = table.rows().iter().map(|r| r[0].to_string()).collect();
        assert_eq!(regions, vec!["North", "East", "West"]);
        assert!(table.sort(&[(7, SortDirection::Ascending)]).is_err());
    }

    #[test]
    fn test_write_delimited() {
        let table = sample();
        let mut out = Vec::new();
        table.write_delimited(&mut out, b',').unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Region,Total\nWest,5\n"));
        assert_eq!(table.value(2, "Total"), Some(&Value::Integer(9)));
    }

    #[test]
    fn test_write_delimited_quotes_cells() {
        let mut table = Table::new("t", vec!["Name".into(), "Note".into()]);
        table
            .add_row(vec![
                Value::from("Smith, John".to_string()),
                Value::from("said \"hi\"".to_string()),
            ])
            .unwrap();
        let mut out = Vec::new();
        table.write_delimited(&mut out, b',').unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Name,Note\n\"Smith, John\",\"said \"\"hi\"\"\"\n");

        let mut out = Vec::new();
        table.write_delimited(&mut out, b';').unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("Smith, John;\"said \"\"hi\"\"\"\n"));
    }
}
