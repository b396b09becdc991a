//! Integration tests for reportq
//!
//! End-to-end runs of the command-line tool against temporary CSV files and
//! query definitions.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const SALES: &str = "\
Region,Year,Amount,Rep
West,2021,100,Ann
East,2021,50,Bob
West,2021,25,Cid
West,2020,70,Ann
North,2021,10,
";

const TOTALS_QUERY: &str = r#"{
    "query": {
        "target_table": "Sales",
        "fields": [
            {"code": "Region", "description": "Region", "data_type": "String"},
            {"code": "Amount", "description": "Total", "data_type": "Number",
             "aggregate": "Sum", "sort": "Descending"}
        ],
        "filters": [
            {"field": {"code": "Year", "description": "Year", "data_type": "Number"},
             "operator": "Equal", "value_from": "2021"}
        ]
    }
}"#;

const JOINED_QUERY: &str = r#"{
    "query": {
        "target_table": "Orders",
        "base_family": "Orders",
        "fields": [
            {"code": "Customers.Name", "description": "Customer", "data_type": "String",
             "family": "Customers"},
            {"code": "Orders.Amount", "description": "Amount", "data_type": "Number",
             "family": "Orders"}
        ]
    },
    "joins": [
        {"target": "Customers", "current": "Orders",
         "clause": "LEFT JOIN Customers ON Customers.Id = Orders.CustomerId"}
    ]
}"#;

fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, std::io::Error> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

#[test]
fn test_evaluate_aggregated_query() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let data = write_file(temp_dir.path(), "sales.csv", SALES)?;
    let query = write_file(temp_dir.path(), "totals.json", TOTALS_QUERY)?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q").arg(&query).arg(format!("Sales={}", data.display()));

    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("Region,Total\nWest,125\nEast,50\nNorth,10\n"));

    Ok(())
}

#[test]
fn test_table_name_from_file_stem() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let data = write_file(temp_dir.path(), "sales.csv", SALES)?;
    let query = write_file(temp_dir.path(), "totals.json", TOTALS_QUERY)?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q").arg(&query).arg(&data);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("West,125"));

    Ok(())
}

#[test]
fn test_extra_expression_filters_rows() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let data = write_file(temp_dir.path(), "sales.csv", SALES)?;
    let query = write_file(temp_dir.path(), "totals.json", TOTALS_QUERY)?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q")
        .arg(&query)
        .arg("-e")
        .arg("STREQUALS([Rep], 'ann', IGNORECASE)")
        .arg(&data);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("West,100"))
        .stdout(predicate::str::contains("East").not());

    Ok(())
}

#[test]
fn test_malformed_expression_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let data = write_file(temp_dir.path(), "sales.csv", SALES)?;
    let query = write_file(temp_dir.path(), "totals.json", TOTALS_QUERY)?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q").arg(&query).arg("-e").arg("[Rep] = 'Ann").arg(&data);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("unterminated string literal"));

    Ok(())
}

#[test]
fn test_print_sql_with_joins() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let query = write_file(temp_dir.path(), "joined.json", JOINED_QUERY)?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q").arg(&query).arg("--sql");

    cmd.assert().success().stdout(predicate::str::contains(
        "FROM Orders LEFT JOIN Customers ON Customers.Id = Orders.CustomerId",
    ));

    Ok(())
}

#[test]
fn test_check_accepts_known_table() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let query = write_file(temp_dir.path(), "joined.json", JOINED_QUERY)?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q")
        .arg(&query)
        .arg("--check")
        .arg("--known-table")
        .arg("orders");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Query OK"));

    Ok(())
}

#[test]
fn test_check_rejects_unknown_table() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let query = write_file(temp_dir.path(), "joined.json", JOINED_QUERY)?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q").arg(&query).arg("--check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Table 'Orders' is unknown"));

    Ok(())
}

#[test]
fn test_missing_parameter_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let data = write_file(temp_dir.path(), "sales.csv", SALES)?;
    let query = write_file(
        temp_dir.path(),
        "param.json",
        r#"{
            "query": {
                "target_table": "Sales",
                "fields": [{"code": "Rep", "description": "Rep", "data_type": "String"}],
                "filters": [
                    {"field": {"code": "Amount", "description": "Amount", "data_type": "Number"},
                     "operator": "GreaterOrEqual", "value_from": "min", "from_is_parameter": true}
                ]
            }
        }"#,
    )?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q").arg(&query).arg(&data);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No value supplied for parameter 'min'"));

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q").arg(&query).arg("-p").arg("min=70").arg(&data);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Rep\nAnn\nAnn\n"));

    Ok(())
}

#[test]
fn test_missing_target_file_fails() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let data = write_file(temp_dir.path(), "other.csv", SALES)?;
    let query = write_file(temp_dir.path(), "totals.json", TOTALS_QUERY)?;

    let mut cmd = Command::cargo_bin("reportq")?;
    cmd.arg("-q").arg(&query).arg(&data);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No input file provides the target table"));

    Ok(())
}
