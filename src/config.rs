//! Configuration module for reportq
//!
//! This module provides a centralized configuration structure for the
//! application, built once from the command line, and the on-disk query
//! definition format.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::ReportArgs;
use crate::filter::Parameters;
use crate::join::JoinTable;
use crate::query::QuerySpecification;

/// A query specification together with the join catalog it is built against
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub query: QuerySpecification,
    #[serde(default)]
    pub joins: JoinTable,
}

impl QueryDefinition {
    /// Read a definition from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read query definition: {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Invalid query definition: {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// What the run should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Print the generated SQL
    PrintSql,
    /// Validate only
    Check,
    /// Validate, then print the SQL
    CheckAndPrint,
    /// Evaluate against the loaded files
    Evaluate,
}

/// Application configuration
///
/// Created at startup from the parsed arguments and passed to the run loop.
#[derive(Debug, Clone)]
pub struct AppConfig {
    verbose: bool,
    action: Action,
    parameters: Parameters,
    expression: Option<String>,
    ledger: Option<String>,
    known_tables: Vec<String>,
}

impl AppConfig {
    /// Build the configuration from parsed arguments
    ///
    /// # Returns
    /// * `Ok(AppConfig)` on success
    /// * `Err` if a `--param` value is not in `NAME=VALUE` form
    pub fn from_args(args: &ReportArgs) -> Result<Self> {
        let action = match (args.check, args.sql) {
            (true, true) => Action::CheckAndPrint,
            (true, false) => Action::Check,
            (false, true) => Action::PrintSql,
            (false, false) => Action::Evaluate,
        };
        Ok(AppConfig {
            verbose: args.verbose,
            action,
            parameters: parse_parameters(&args.params)?,
            expression: args.expr.clone(),
            ledger: args.ledger.clone(),
            known_tables: args.known_tables.clone(),
        })
    }

    /// Get the verbose flag
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn expression(&self) -> Option<&str> {
        self.expression.as_deref()
    }

    pub fn ledger(&self) -> Option<&str> {
        self.ledger.as_deref()
    }

    /// Table names accepted by validation in addition to the loaded files
    pub fn known_tables(&self) -> &[String] {
        &self.known_tables
    }
}

/// Parse `NAME=VALUE` pairs into a parameter map
fn parse_parameters(raw: &[String]) -> Result<Parameters> {
    let mut parameters = Parameters::new();
    for item in raw {
        match item.split_once('=') {
            Some((name, value)) if !name.trim().is_empty() => {
                parameters.insert(name.trim().to_string(), value.to_string());
            }
            _ => bail!("Invalid parameter '{}': expected NAME=VALUE", item),
        }
    }
    Ok(parameters)
}
