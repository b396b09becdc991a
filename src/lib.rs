//! reportq library crate
//!
//! This is the library component of reportq, a report query engine. A report
//! query is a set of selected fields, filter predicates and a processing mode.
//! The library provides:
//!
//! - The field and filter data model with SQL and expression rendering
//! - A clause builder that compiles a query into one SQL statement, ordering
//!   joins by table family through a pluggable join catalog
//! - A filter expression language compiled into predicates over any record type
//! - Lazily built, cached field accessors for records
//! - A forward-only table cursor with filtering, sorting, master-detail
//!   re-scoping and paging
//! - In-memory evaluation of a query over CSV data, with grouping and aggregates

pub mod accessor;
pub mod aggregate;
pub mod cli;
pub mod config;
pub mod csv_handler;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod expr;
pub mod field;
pub mod filter;
pub mod join;
pub mod query;
pub mod record;
pub mod table;
pub mod value;
