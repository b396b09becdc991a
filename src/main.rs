//! reportq - a report query engine for the command line
//!
//! Reads a query definition (selected fields, filters, processing mode and a
//! join catalog) and either compiles it into a single SQL statement or
//! evaluates it directly over CSV files loaded into memory.
//!
//! # Program Flow
//!
//! 1. Parse command-line arguments and set up logging
//! 2. Load the query definition and any input files
//! 3. Validate, print SQL, or evaluate as requested
//! 4. Print results to stdout

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use reportq::cli;
use reportq::config::{Action, AppConfig, QueryDefinition};
use reportq::csv_handler::{load_csv, CsvTable};
use reportq::engine::QueryEvaluator;
use reportq::error::{ReportError, ValidationError};
use reportq::query::QuerySpecification;

fn main() -> Result<()> {
    let args = cli::parse_args()?;
    let config = AppConfig::from_args(&args)?;
    init_logging(config.verbose());
    debug!("Arguments: {:?}", args);

    let mut definition = QueryDefinition::load(Path::new(&args.query))?;
    if let Some(ledger) = config.ledger() {
        definition.query.set_ledger(ledger);
    }

    let mut tables = Vec::with_capacity(args.files.len());
    for file_spec in &args.files {
        let table =
            load_csv(file_spec).with_context(|| format!("Failed to load file: {file_spec}"))?;
        info!("Table '{}' loaded with {} rows", table.name(), table.rows().len());
        tables.push(table);
    }

    match config.action() {
        Action::Check => check(&definition, &tables, &config),
        Action::PrintSql => print_sql(&definition),
        Action::CheckAndPrint => {
            check(&definition, &tables, &config)?;
            print_sql(&definition)
        }
        Action::Evaluate => evaluate(&definition.query, tables, &config),
    }
}

/// Route tracing output to stderr; `-v` raises the default level to debug
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .with_env_filter(filter)
        .init();
}

fn check(definition: &QueryDefinition, tables: &[CsvTable], config: &AppConfig) -> Result<()> {
    let known: Vec<&str> = tables
        .iter()
        .map(|t| t.name())
        .chain(config.known_tables().iter().map(String::as_str))
        .collect();
    definition
        .query
        .validation_check(&known)
        .context("Query definition failed validation")?;

    let sql = definition.query.build_sql(&definition.joins)?;
    QuerySpecification::check_syntax(&sql).context("Generated SQL failed to parse")?;
    println!("Query OK");
    Ok(())
}

fn print_sql(definition: &QueryDefinition) -> Result<()> {
    let sql = definition
        .query
        .build_sql(&definition.joins)
        .context("Failed to build SQL")?;
    println!("{sql}");
    Ok(())
}

fn evaluate(spec: &QuerySpecification, tables: Vec<CsvTable>, config: &AppConfig) -> Result<()> {
    let table = tables
        .into_iter()
        .find(|t| t.name().eq_ignore_ascii_case(spec.target_table()))
        .ok_or_else(|| ReportError::from(ValidationError::UnknownTable(spec.target_table().to_string())))
        .context("No input file provides the target table")?;

    let mut evaluator = QueryEvaluator::new(config.parameters().clone());
    if let Some(expression) = config.expression() {
        evaluator = evaluator.with_expression(expression);
    }

    let (layout, source) = table.into_source();
    let result = evaluator
        .evaluate(spec, layout, source)
        .with_context(|| format!("Failed to evaluate query on {}", spec.target_table()))?;
    info!("Query returned {} rows", result.row_count());
    result.print_to_stdout()
}
