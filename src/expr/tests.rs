use std::rc::Rc;

use chrono::NaiveDate;
use proptest::prelude::*;

use super::*;
use crate::accessor::{Record, RecordLayout};
use crate::error::{ParseErrorKind, ReportError};

struct Employee {
    name: String,
    age: i64,
    salary: f64,
    hire_date: Option<NaiveDate>,
}

impl Record for Employee {
    fn layout() -> RecordLayout<Self> {
        RecordLayout::new()
            .property("Name", ValueType::String, false, |e: &Employee| {
                Value::from(e.name.clone())
            })
            .property("Age", ValueType::Integer, false, |e: &Employee| Value::from(e.age))
            .property("Salary", ValueType::Float, false, |e: &Employee| {
                Value::from(e.salary)
            })
            .property("HireDate", ValueType::Date, true, |e: &Employee| {
                Value::from(e.hire_date)
            })
    }
}

fn employee(name: &str, age: i64) -> Employee {
    Employee {
        name: name.to_string(),
        age,
        salary: 1000.0,
        hire_date: None,
    }
}

fn hired(name: &str, y: i32, m: u32, d: u32) -> Employee {
    Employee {
        hire_date: NaiveDate::from_ymd_opt(y, m, d),
        ..employee(name, 30)
    }
}

fn compiler() -> ExpressionCompiler<Employee> {
    ExpressionCompiler::new(Rc::new(Employee::layout()))
}

fn check(expression: &str, record: &Employee) -> bool {
    let predicate = compiler().compile_predicate(expression).unwrap();
    predicate(record).unwrap()
}

fn parse_error(expression: &str) -> ParseError {
    match compiler().compile_predicate(expression) {
        Ok(_) => panic!("expected {:?} to fail", expression),
        Err(err) => err,
    }
}

#[test]
fn test_age_range() {
    let predicate = compiler()
        .compile_predicate("[Age] > 10 AND [Age] < 20")
        .unwrap();
    let results: Vec<bool> = [5, 15, 25]
        .iter()
        .map(|&age| predicate(&employee("x", age)).unwrap())
        .collect();
    assert_eq!(results, vec![false, true, false]);
}

#[test]
fn test_year_of_null_date_is_false() {
    assert!(!check("YEAR([HireDate]) = 2020", &employee("Ann", 40)));
    assert!(check("YEAR([HireDate]) = -1", &employee("Ann", 40)));
    assert!(check("YEAR([HireDate]) = 2020", &hired("Ann", 2020, 5, 1)));
    assert!(check("MONTH([HireDate]) = 5 AND DAY([HireDate]) = 1", &hired("Ann", 2020, 5, 1)));
}

#[test]
fn test_strequals_ignore_case() {
    let predicate = compiler()
        .compile_predicate("STREQUALS([Name],'Bob',IGNORECASE)")
        .unwrap();
    for name in ["BOB", "bob", "Bob"] {
        assert!(predicate(&employee(name, 1)).unwrap(), "{}", name);
    }
    assert!(!predicate(&employee("Bobby", 1)).unwrap());
}

#[test]
fn test_strequals_same_case_and_null() {
    assert!(!check("STREQUALS([Name], 'BOB', SAMECASE)", &employee("Bob", 1)));
    assert!(check("STREQUALS([Name], 'Bob', SAMECASE)", &employee("Bob", 1)));
    // a null operand degrades to a null/null check
    assert!(!check("STREQUALS([HireDate], 'x', SAMECASE)", &employee("Bob", 1)));
    assert!(check("STREQUALS([HireDate], null, SAMECASE)", &employee("Bob", 1)));
}

#[test]
fn test_unterminated_string() {
    let err = parse_error("[Name] = 'abc");
    assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
    assert_eq!(err.input, "[Name] = 'abc");
}

#[test]
fn test_missing_parenthesis() {
    assert_eq!(parse_error("(A").kind, ParseErrorKind::MissingParenthesis);
    assert_eq!(parse_error("([Age] > 1").kind, ParseErrorKind::MissingParenthesis);
}

#[test]
fn test_unknown_field() {
    let err = parse_error("[Salery] > 10");
    assert_eq!(err.kind, ParseErrorKind::UnknownField);
    assert_eq!(err.token, "Salery");
}

#[test]
fn test_unexpected_tokens() {
    assert_eq!(parse_error("1 < 2 < 3").kind, ParseErrorKind::UnexpectedToken);
    assert_eq!(parse_error("[Age] > ").kind, ParseErrorKind::UnexpectedEnd);
    assert_eq!(parse_error("").kind, ParseErrorKind::UnexpectedEnd);
    assert_eq!(parse_error("[Age] = AND").kind, ParseErrorKind::UnexpectedToken);
    assert_eq!(
        parse_error("STREQUALS([Name], 'x', LOUDLY)").kind,
        ParseErrorKind::UnexpectedToken
    );
}

#[test]
fn test_invalid_dates() {
    assert_eq!(parse_error("[HireDate] > {D 'soon'}").kind, ParseErrorKind::InvalidDate);
    assert_eq!(parse_error("[HireDate] > 'soon'").kind, ParseErrorKind::InvalidDate);
    assert_eq!(parse_error("[Age] = 'abc'").kind, ParseErrorKind::InvalidLiteral);
}

#[test]
fn test_predicate_must_be_boolean() {
    assert_eq!(parse_error("[Age] + 1").kind, ParseErrorKind::NotBoolean);
}

#[test]
fn test_date_literal_syntaxes_agree() {
    let record = hired("Ann", 2020, 1, 1);
    assert!(check("[HireDate] = {D '2020-01-01'}", &record));
    assert!(check("[HireDate] = DATE '2020-01-01'", &record));
    assert!(check("[HireDate] < {TS '2020-01-01 00:00:01'}", &record));
    assert!(check("[HireDate] < TIMESTAMP '2020-01-01 00:00:01'", &record));
    assert!(check("{T '10:30:00'} = TIME '10:30'", &record));
}

#[test]
fn test_literals_take_the_field_type() {
    let record = hired("Ann", 2020, 3, 15);
    // text and serial literals become dates
    assert!(check("[HireDate] > '2019-06-01'", &record));
    assert!(check("[HireDate] = 20200315", &record));
    // a decimal literal compared to an integer field is truncated
    assert!(check("[Age] = 30.7", &record));
    assert!(check("[Salary] = 1000", &record));
}

#[test]
fn test_both_literals_convert_left_to_right() {
    let record = employee("x", 1);
    assert!(check("1.9 = 1", &record));
    assert!(!check("1 = 1.9", &record));
    assert!(check("'5' = 5", &record));
}

#[test]
fn test_and_or_share_precedence() {
    let record = employee("x", 1);
    // evaluated as (true OR false) AND false
    assert!(!check("true OR false AND false", &record));
    assert!(check("false AND false OR true", &record));
    assert!(check("NOT [Age] > 5", &record));
}

#[test]
fn test_null_comparisons() {
    let record = employee("x", 1);
    assert!(check("[HireDate] = null", &record));
    assert!(!check("[HireDate] <> null", &record));
    assert!(!check("[HireDate] > {D '2000-01-01'}", &record));
    assert!(check("ISNULL([HireDate])", &record));
    assert!(!check("ISNULL([Name])", &record));
}

#[test]
fn test_arithmetic() {
    let record = employee("Bob", 15);
    assert!(check("[Age] * 2 + 1 = 31", &record));
    assert!(check("7 / 2 = 3", &record));
    assert!(check("-[Age] < 0", &record));
    assert!(check("[Name] + 'x' = 'Bobx'", &record));
    assert!(check("Age - 5 = 10", &record));
}

#[test]
fn test_division_by_zero_raises_on_evaluation() {
    let predicate = compiler().compile_predicate("[Age] / 0 = 1").unwrap();
    assert!(matches!(
        predicate(&employee("x", 3)),
        Err(ReportError::DivideByZero)
    ));
}

#[test]
fn test_compile_value() {
    let expression = compiler().compile_value("[Salary] * 2").unwrap();
    assert_eq!(expression.value_type(), ValueType::Float);
    assert_eq!(
        expression.evaluate(&employee("x", 1)).unwrap(),
        Value::Float(2000.0)
    );
}

#[test]
fn test_accessors_compiled_on_demand() {
    let compiler = compiler();
    let predicate = compiler.compile_predicate("[Age] > 1 OR [Salary] > 0").unwrap();
    assert_eq!(compiler.cache().compiled_count(), 0);
    assert!(predicate(&employee("x", 5)).unwrap());
    // OR short-circuits before reading Salary
    assert_eq!(compiler.cache().compiled_count(), 1);
}

proptest! {
    #[test]
    fn prop_matches_manual_evaluation(
        age in -50i64..150,
        lo in -50i64..150,
        hi in -50i64..150,
        negated in any::<bool>(),
        either in any::<bool>(),
    ) {
        let join = if either { "OR" } else { "AND" };
        let condition = format!("[Age] >= {} {} [Age] <= {}", lo, join, hi);
        let text = if negated { format!("NOT ({})", condition) } else { condition };

        let predicate = compiler().compile_predicate(&text).unwrap();
        let inner = if either { age >= lo || age <= hi } else { age >= lo && age <= hi };
        let expected = inner != negated;
        prop_assert_eq!(predicate(&employee("p", age)).unwrap(), expected);
    }
}
