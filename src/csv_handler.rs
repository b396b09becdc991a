//! CSV file handling module for reportq
//!
//! This module loads CSV files into in-memory record sources. It provides
//! functionality for:
//!
//! - Loading CSV files with a header row
//! - Parsing file specifications in the format [table_name=]file_path.csv
//! - Inferring one value type per column from the cell text
//! - Building the record layout and cursor source for the loaded table

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use crate::accessor::RecordLayout;
use crate::cursor::MemorySource;
use crate::error::{ReportError, ReportResult};
use crate::record::{infer_columns, Column, DataRow};

/// A table loaded from a delimited file
#[derive(Debug, Clone)]
pub struct CsvTable {
    name: String,
    columns: Vec<Column>,
    rows: Vec<DataRow>,
}

impl CsvTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[DataRow] {
        &self.rows
    }

    pub fn layout(&self) -> RecordLayout<DataRow> {
        DataRow::layout(&self.columns)
    }

    /// Split into the layout and the record source a cursor reads
    pub fn into_source(self) -> (Rc<RecordLayout<DataRow>>, Rc<MemorySource<DataRow>>) {
        let layout = Rc::new(self.layout());
        (layout, Rc::new(MemorySource::new(&self.name, self.rows)))
    }
}

/// Load a CSV file into an in-memory table
///
/// # Arguments
/// * `file_spec` - File specification in the format `[table_name=]file_path.csv`
///                 If table_name is not specified, the file name without extension is used.
///
/// # Returns
/// * `Ok(CsvTable)` if the file was successfully loaded
/// * `Err` if there was an error parsing the file spec, opening the file, or parsing the CSV data
pub fn load_csv(file_spec: &str) -> ReportResult<CsvTable> {
    let (table_name, file_path) = parse_file_spec(file_spec)?;
    let file = File::open(&file_path)?;
    let table = read_csv(&table_name, BufReader::new(file))?;
    debug!(
        "Loaded {} rows into table {} from {}",
        table.rows.len(),
        table.name,
        file_path.display()
    );
    Ok(table)
}

/// Read CSV data with a header row from any reader
pub fn read_csv<R: Read>(table_name: &str, reader: R) -> ReportResult<CsvTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()?
        .iter()
        .map(|s| s.trim().to_string())
        .collect::<Vec<_>>();

    let mut cells = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        let row: Vec<String> = record.iter().map(|field| field.trim().to_string()).collect();
        cells.push(row);
    }

    let (columns, rows) = infer_columns(&headers, &cells);
    Ok(CsvTable {
        name: table_name.to_string(),
        columns,
        rows: rows.into_iter().map(DataRow::new).collect(),
    })
}

/// Parse a file specification into table name and file path
///
/// Handles two formats:
/// 1. `table_name=file_path.csv` - Explicit table name and file path
/// 2. `file_path.csv` - Table name derived from file name
pub fn parse_file_spec(file_spec: &str) -> ReportResult<(String, PathBuf)> {
    if let Some((table_name, file_path)) = file_spec.split_once('=') {
        return Ok((table_name.to_string(), PathBuf::from(file_path)));
    }

    let path = PathBuf::from(file_spec);
    let stem = path
        .file_stem()
        .ok_or_else(|| ReportError::InvalidFileSpec(file_spec.to_string()))?
        .to_string_lossy()
        .to_string();
    Ok((stem, path))
}
