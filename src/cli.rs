//! CLI argument parsing module for reportq
//!
//! This module handles parsing command-line arguments using the clap crate.
//! A report query is read from a JSON definition file; the command line then
//! decides what to do with it: print the generated SQL, validate it, or
//! evaluate it against CSV files loaded into memory.

use anyhow::Result;
use clap::Parser;

/// Command-line arguments for reportq
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Report query engine: build SQL from a query definition or evaluate it over CSV files"
)]
pub struct ReportArgs {
    /// Query definition file (JSON)
    ///
    /// Holds the query specification under `query` and the join catalog
    /// under `joins`.
    #[clap(short, long, help = "Query definition file (JSON)")]
    pub query: String,

    /// Print the generated SQL statement instead of evaluating
    #[clap(long, help = "Print the generated SQL statement")]
    pub sql: bool,

    /// Validate the query and the syntax of its generated SQL
    ///
    /// Loaded CSV table names and every `--known-table` make up the
    /// reference catalog the target table is checked against.
    #[clap(long, help = "Validate the query definition")]
    pub check: bool,

    /// Additional filter expression applied during evaluation
    /// Example: -e "[Amount] > 100 AND YEAR([Date]) = 2021"
    #[clap(short, long, help = "Additional filter expression")]
    pub expr: Option<String>,

    /// Parameter values - format: NAME=VALUE
    #[clap(short, long = "param", help = "Filter parameter as NAME=VALUE")]
    pub params: Vec<String>,

    /// Live value for the %LEDGER% placeholder (defaults to the target table)
    #[clap(long, help = "Value substituted for %LEDGER%")]
    pub ledger: Option<String>,

    /// Extra table names accepted by --check
    #[clap(long = "known-table", help = "Table name accepted by --check")]
    pub known_tables: Vec<String>,

    /// Input files to evaluate against - format: [table_name=]file_path
    ///
    /// If no table name is specified, the base filename (without extension)
    /// is used. The file whose table name matches the query's target table
    /// is evaluated.
    #[clap(help = "Input CSV files as [table_name=]file_path")]
    pub files: Vec<String>,

    /// Enable verbose diagnostic output on stderr
    #[clap(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

/// Parse command-line arguments into the ReportArgs structure
///
/// # Returns
/// * `Ok(ReportArgs)` - Command-line arguments successfully parsed
/// * `Err` - Error during argument parsing (handled by clap, usually results in help text display)
pub fn parse_args() -> Result<ReportArgs> {
    Ok(ReportArgs::parse())
}
