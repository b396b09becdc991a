//! Query specification and SQL clause compiler for reportq
//!
//! `QuerySpecification` is the aggregate root of a report query: the ordered
//! selection of field descriptors, the filter predicates, the target table and
//! the processing mode. This module turns it into SQL text with the clause
//! order fixed as SELECT, FROM, WHERE, GROUP BY, ORDER BY.
//!
//! Values are injected literally; callers are expected to have validated them.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::error::{ReportResult, ValidationError};
use crate::field::{Aggregate, DataType, FieldDescriptor};
use crate::filter::{group_by_field, FilterPredicate};
use crate::join::JoinCatalog;

/// Reserved token replaced with the live ledger (target) value
pub const LEDGER_PLACEHOLDER: &str = "%LEDGER%";

/// Processing mode; decides the default aggregate of newly added fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessingMode {
    /// Plain detail rows
    #[default]
    Details,
    /// Balances: numbers are summed, everything else counted
    Balance,
    /// Link lists: every field takes its maximum
    Link,
}

impl ProcessingMode {
    /// Default aggregate for a field added in this mode
    pub fn default_aggregate(&self, data_type: DataType) -> Aggregate {
        match self {
            ProcessingMode::Details => Aggregate::None,
            ProcessingMode::Balance if data_type == DataType::Number => Aggregate::Sum,
            ProcessingMode::Balance => Aggregate::Count,
            ProcessingMode::Link => Aggregate::Max,
        }
    }

    /// Whether every selected field must carry an aggregate
    pub fn requires_aggregates(&self) -> bool {
        *self != ProcessingMode::Details
    }
}

/// A report query: selected fields, filters, target table and mode
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySpecification {
    target_table: String,
    /// Family of the target table; fields with an empty family belong to it
    base_family: String,
    mode: ProcessingMode,
    fields: Vec<FieldDescriptor>,
    filters: Vec<FilterPredicate>,
    /// Live value for `%LEDGER%`; defaults to the target table
    ledger: Option<String>,
}

impl QuerySpecification {
    /// Create an empty query over `target_table` in Details mode
    pub fn new(target_table: &str) -> Self {
        QuerySpecification {
            target_table: target_table.to_string(),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_base_family(mut self, family: &str) -> Self {
        self.base_family = family.to_string();
        self
    }

    pub fn target_table(&self) -> &str {
        &self.target_table
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn filters(&self) -> &[FilterPredicate] {
        &self.filters
    }

    pub fn set_ledger(&mut self, ledger: &str) {
        self.ledger = Some(ledger.to_string());
    }

    /// Live value of `%LEDGER%`
    pub fn ledger(&self) -> &str {
        self.ledger.as_deref().unwrap_or(&self.target_table)
    }

    /// Family the join chain starts from
    pub fn base_family(&self) -> &str {
        if self.base_family.is_empty() {
            &self.target_table
        } else {
            &self.base_family
        }
    }

    /// Append a field to the selection
    ///
    /// In Balance and Link mode a plain field without an aggregate receives
    /// the mode's default aggregate.
    pub fn add_output_node(&mut self, mut field: FieldDescriptor) {
        if !field.aggregate.is_some() && !field.is_computed() {
            field.aggregate = self.mode.default_aggregate(field.data_type);
        }
        self.fields.push(field);
    }

    /// Remove the first selected field with the given code
    pub fn remove_output_node(&mut self, code: &str) -> Option<FieldDescriptor> {
        let index = self.fields.iter().position(|f| f.code == code)?;
        Some(self.fields.remove(index))
    }

    pub fn add_filter(&mut self, filter: FilterPredicate) {
        self.filters.push(filter);
    }

    pub fn remove_filter(&mut self, index: usize) -> Option<FilterPredicate> {
        if index < self.filters.len() {
            Some(self.filters.remove(index))
        } else {
            None
        }
    }

    fn plain_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_computed())
    }

    /// Build the SELECT clause
    pub fn build_select(&self) -> String {
        let columns: Vec<String> = self
            .plain_fields()
            .map(|f| format!("{} AS [{}]", f.aggregated_reference(), f.label()))
            .collect();

        if columns.is_empty() {
            "SELECT *".to_string()
        } else {
            format!("SELECT {}", columns.join(", "))
        }
    }

    /// Build the FROM clause with its join chain
    ///
    /// Families of every selected field and every filter field are merged,
    /// sorted by (family, code) and deduplicated. Each family transition asks
    /// the catalog for the clause joining it onto the previous family.
    ///
    /// # Returns
    /// * `Ok(String)` with `FROM <table>` followed by the join clauses
    /// * `Err(ValidationError::MissingJoin)` if a transition has no clause
    pub fn build_from(&self, catalog: &dyn JoinCatalog) -> ReportResult<String> {
        let base = self.base_family();

        let mut members: Vec<(&str, &str)> = self
            .fields
            .iter()
            .chain(self.filters.iter().map(|f| &f.field))
            .filter(|f| !f.family.is_empty() && f.family != base)
            .map(|f| (f.family.as_str(), f.code.as_str()))
            .collect();
        members.sort();
        members.dedup_by(|a, b| a.0 == b.0);

        let mut from = format!("FROM {}", self.target_table);
        let mut registered: HashSet<&str> = HashSet::from([base]);
        let mut current = base;

        for (family, _) in members {
            if registered.contains(family) {
                continue;
            }
            let clause = catalog.join_clause(family, current).ok_or_else(|| {
                ValidationError::MissingJoin {
                    from: current.to_string(),
                    to: family.to_string(),
                }
            })?;
            from.push(' ');
            from.push_str(&clause);
            registered.insert(family);
            current = family;
        }

        Ok(from)
    }

    /// Build the WHERE clause
    ///
    /// Same-field predicates are OR-ed inside one parenthesized group and the
    /// groups are AND-ed. Returns an empty string when nothing qualifies.
    pub fn build_where(&self) -> String {
        let groups: Vec<String> = group_by_field(&self.filters)
            .into_iter()
            .map(|group| {
                let conditions: Vec<String> = group.iter().map(|f| f.to_sql()).collect();
                format!("({})", conditions.join(" OR "))
            })
            .collect();

        if groups.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", groups.join(" AND "))
        }
    }

    /// Build the GROUP BY clause from plain fields without an aggregate
    pub fn build_group_by(&self) -> String {
        let keys: Vec<&str> = self
            .plain_fields()
            .filter(|f| !f.aggregate.is_some())
            .map(|f| f.reference())
            .collect();

        if keys.is_empty() {
            String::new()
        } else {
            format!("GROUP BY {}", keys.join(", "))
        }
    }

    /// Build the ORDER BY clause from plain fields with a sort direction
    pub fn build_order_by(&self) -> String {
        let keys: Vec<String> = self
            .plain_fields()
            .filter_map(|f| {
                f.sort
                    .keyword()
                    .map(|dir| format!("{} {}", f.aggregated_reference(), dir))
            })
            .collect();

        if keys.is_empty() {
            String::new()
        } else {
            format!("ORDER BY {}", keys.join(", "))
        }
    }

    /// Compose the full statement
    ///
    /// Concatenates the five clauses, then applies macro substitution (every
    /// `@code` filter replaces whole-word occurrences of its code with its
    /// first bound) and replaces `%LEDGER%` with the live ledger value.
    pub fn build_sql(&self, catalog: &dyn JoinCatalog) -> ReportResult<String> {
        let clauses = [
            self.build_select(),
            self.build_from(catalog)?,
            self.build_where(),
            self.build_group_by(),
            self.build_order_by(),
        ];
        let mut sql = clauses
            .iter()
            .filter(|c| !c.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        sql = self.substitute(&sql)?;

        debug!(sql = %sql, "built query");
        Ok(sql)
    }

    /// Apply macro substitution and the `%LEDGER%` placeholder to `text`
    ///
    /// Every `@code` filter replaces whole-word occurrences of its code with
    /// its first bound. Used for both generated SQL and in-memory filter text.
    pub fn substitute(&self, text: &str) -> ReportResult<String> {
        let mut text = text.to_string();
        for filter in self.filters.iter().filter(|f| f.field.is_macro()) {
            let pattern = Regex::new(&format!(r"{}\b", regex::escape(&filter.field.code)))?;
            text = pattern
                .replace_all(&text, regex::NoExpand(filter.value_from.trim()))
                .into_owned();
        }
        Ok(text.replace(LEDGER_PLACEHOLDER, self.ledger()))
    }

    /// Check the query before building
    ///
    /// # Arguments
    /// * `known_tables` - Reference catalog of table names (case-insensitive)
    ///
    /// # Returns
    /// * `Ok(())` if the query is complete
    /// * `Err(ValidationError)` naming the first problem found
    pub fn validation_check<S: AsRef<str>>(&self, known_tables: &[S]) -> ReportResult<()> {
        if !known_tables
            .iter()
            .any(|t| t.as_ref().eq_ignore_ascii_case(&self.target_table))
        {
            return Err(ValidationError::UnknownTable(self.target_table.clone()).into());
        }

        if let Some(filter) = self
            .filters
            .iter()
            .find(|f| !f.operator.is_presence() && f.value_from.trim().is_empty())
        {
            return Err(ValidationError::MissingFilterValue(filter.field.code.clone()).into());
        }

        if self.fields.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }

        if self.mode.requires_aggregates() {
            if let Some(field) = self.plain_fields().find(|f| !f.aggregate.is_some()) {
                return Err(ValidationError::MissingAggregate(field.code.clone()).into());
            }
        }

        Ok(())
    }

    /// Re-parse generated SQL to catch malformed join or literal text
    pub fn check_syntax(sql: &str) -> ReportResult<()> {
        let dialect = MsSqlDialect {};
        Parser::parse_sql(&dialect, sql)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::field::SortDirection;
    use crate::filter::FilterOperator;
    use crate::join::JoinTable;

    fn amount() -> FieldDescriptor {
        FieldDescriptor::new("Orders.Amount", "Amount", DataType::Number).with_family("Orders")
    }

    fn region() -> FieldDescriptor {
        FieldDescriptor::new("Orders.Region", "Region", DataType::String).with_family("Orders")
    }

    fn customer() -> FieldDescriptor {
        FieldDescriptor::new("Customers.Name", "Customer", DataType::String)
            .with_family("Customers")
    }

    fn catalog() -> JoinTable {
        JoinTable::new().with(
            "Customers",
            "Orders",
            "INNER JOIN Customers ON Customers.Id = Orders.CustomerId",
        )
    }

    #[test]
    fn test_empty_selection_selects_star() {
        let query = QuerySpecification::new("Orders").with_base_family("Orders");
        let sql = query.build_sql(&catalog()).unwrap();
        assert_eq!(sql, "SELECT * FROM Orders");
        assert!(!sql.contains("GROUP BY"));
        assert!(!sql.contains("ORDER BY"));
    }

    #[test]
    fn test_balance_mode_default_aggregates() {
        let mut query = QuerySpecification::new("Orders").with_mode(ProcessingMode::Balance);
        query.add_output_node(amount());
        query.add_output_node(region());
        assert_eq!(query.fields()[0].aggregate, Aggregate::Sum);
        assert_eq!(query.fields()[1].aggregate, Aggregate::Count);

        let mut link = QuerySpecification::new("Orders").with_mode(ProcessingMode::Link);
        link.add_output_node(region());
        assert_eq!(link.fields()[0].aggregate, Aggregate::Max);
    }

    #[test]
    fn test_explicit_aggregate_is_kept() {
        let mut query = QuerySpecification::new("Orders").with_mode(ProcessingMode::Balance);
        query.add_output_node(amount().with_aggregate(Aggregate::Average));
        assert_eq!(query.fields()[0].aggregate, Aggregate::Average);
    }

    #[test]
    fn test_select_skips_computed_fields() {
        let mut query = QuerySpecification::new("Orders");
        query.add_output_node(region());
        query.add_output_node(
            FieldDescriptor::new("__Net", "Net", DataType::Number).with_computed("[a] - [b]"),
        );
        assert_eq!(query.build_select(), "SELECT Orders.Region AS [Region]");
        assert_eq!(query.build_group_by(), "GROUP BY Orders.Region");
    }

    #[test]
    fn test_where_groups_same_field_with_or() {
        let mut query = QuerySpecification::new("Orders");
        query.add_filter(FilterPredicate::new(region(), FilterOperator::Equal, "East"));
        query.add_filter(FilterPredicate::new(amount(), FilterOperator::Greater, "10"));
        query.add_filter(FilterPredicate::new(region(), FilterOperator::Equal, "West"));
        assert_eq!(
            query.build_where(),
            "WHERE (Orders.Amount > 10) AND (Orders.Region = 'East' OR Orders.Region = 'West')"
        );
    }

    #[test]
    fn test_where_skips_macros_and_inert_filters() {
        let mut query = QuerySpecification::new("Orders");
        query.add_filter(FilterPredicate::new(amount(), FilterOperator::Equal, ""));
        query.add_filter(FilterPredicate::new(
            FieldDescriptor::new("@Year", "", DataType::Number),
            FilterOperator::Equal,
            "2020",
        ));
        query.add_filter(FilterPredicate::new(
            FieldDescriptor::new("__Marker", "", DataType::Number),
            FilterOperator::Equal,
            "1",
        ));
        assert_eq!(query.build_where(), "");
    }

    #[test]
    fn test_from_joins_each_family_once() {
        let mut query = QuerySpecification::new("Orders").with_base_family("Orders");
        query.add_output_node(amount());
        query.add_output_node(customer());
        query.add_filter(FilterPredicate::new(
            FieldDescriptor::new("Customers.City", "City", DataType::String)
                .with_family("Customers"),
            FilterOperator::Equal,
            "Oslo",
        ));
        assert_eq!(
            query.build_from(&catalog()).unwrap(),
            "FROM Orders INNER JOIN Customers ON Customers.Id = Orders.CustomerId"
        );
    }

    #[test]
    fn test_from_reports_missing_join() {
        let mut query = QuerySpecification::new("Orders").with_base_family("Orders");
        query.add_output_node(
            FieldDescriptor::new("Regions.Name", "Region", DataType::String).with_family("Regions"),
        );
        let err = query.build_from(&catalog()).unwrap_err();
        assert!(matches!(
            err,
            ReportError::Validation(ValidationError::MissingJoin { ref from, ref to })
                if from == "Orders" && to == "Regions"
        ));
    }

    #[test]
    fn test_order_by_wraps_aggregates_only() {
        let mut query = QuerySpecification::new("Orders");
        query.add_output_node(region().with_sort(SortDirection::Ascending));
        query.add_output_node(
            amount()
                .with_aggregate(Aggregate::Sum)
                .with_sort(SortDirection::Descending),
        );
        assert_eq!(
            query.build_order_by(),
            "ORDER BY Orders.Region ASC, SUM(Orders.Amount) DESC"
        );
    }

    #[test]
    fn test_full_sql_with_macro_and_ledger() {
        let mut query = QuerySpecification::new("Orders").with_base_family("Orders");
        query.add_output_node(region());
        query.add_output_node(
            FieldDescriptor::new("Orders.Amount", "Total", DataType::Number)
                .with_family("Orders")
                .with_aggregate(Aggregate::Sum),
        );
        query.add_filter(FilterPredicate::new(
            FieldDescriptor::new("Orders.Year", "Year", DataType::Number).with_family("Orders"),
            FilterOperator::Equal,
            "@Year",
        ));
        query.add_filter(FilterPredicate::new(
            FieldDescriptor::new("@Year", "", DataType::Number),
            FilterOperator::Equal,
            "2021",
        ));
        query.add_filter(FilterPredicate::new(
            FieldDescriptor::new("Orders.Ledger", "", DataType::String).with_family("Orders"),
            FilterOperator::Equal,
            LEDGER_PLACEHOLDER,
        ));
        query.set_ledger("GL01");

        let sql = query.build_sql(&catalog()).unwrap();
        assert_eq!(
            sql,
            "SELECT Orders.Region AS [Region], SUM(Orders.Amount) AS [Total] FROM Orders \
             WHERE (Orders.Ledger = 'GL01') AND (Orders.Year = 2021) \
             GROUP BY Orders.Region"
        );
        QuerySpecification::check_syntax(&sql).unwrap();
    }

    #[test]
    fn test_validation_check() {
        let mut query = QuerySpecification::new("Orders");
        assert!(matches!(
            query.validation_check(&["Invoices"]),
            Err(ReportError::Validation(ValidationError::UnknownTable(_)))
        ));
        assert!(matches!(
            query.validation_check(&["orders"]),
            Err(ReportError::Validation(ValidationError::EmptySelection))
        ));

        query.add_output_node(region());
        query.validation_check(&["Orders"]).unwrap();

        query.add_filter(FilterPredicate::new(amount(), FilterOperator::Greater, " "));
        assert!(matches!(
            query.validation_check(&["Orders"]),
            Err(ReportError::Validation(ValidationError::MissingFilterValue(_)))
        ));
        query.remove_filter(0);
        query.add_filter(FilterPredicate::presence(amount(), FilterOperator::Exists));
        query.validation_check(&["Orders"]).unwrap();
    }

    #[test]
    fn test_validation_requires_aggregates_outside_details() {
        let mut query = QuerySpecification::new("Orders").with_mode(ProcessingMode::Balance);
        query.add_output_node(region());
        query.validation_check(&["Orders"]).unwrap();

        // bypass the default by editing the stored descriptor
        let mut plain = query.remove_output_node("Orders.Region").unwrap();
        plain.aggregate = Aggregate::None;
        query.fields.push(plain);
        assert!(matches!(
            query.validation_check(&["Orders"]),
            Err(ReportError::Validation(ValidationError::MissingAggregate(_)))
        ));
    }

    #[test]
    fn test_check_syntax_rejects_garbage() {
        assert!(QuerySpecification::check_syntax("SELECT * FROM Orders WHERE (").is_err());
    }
}
