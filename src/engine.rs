//! In-memory query evaluation for reportq
//!
//! `QueryEvaluator` runs a query specification directly over a record source
//! instead of a database. The query's WHERE groups are rendered as
//! filter expressions and compiled onto a table cursor, so both paths share
//! one predicate definition. Rows are then projected, grouped and aggregated
//! when any selected field carries an aggregate, and finally sorted.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::accessor::RecordLayout;
use crate::cursor::{RecordSource, TableCursor};
use crate::error::{ReportError, ReportResult};
use crate::expr::CompiledExpression;
use crate::field::{Aggregate, FieldDescriptor};
use crate::filter::{group_by_field, Parameters};
use crate::query::QuerySpecification;
use crate::table::{Row, Table};
use crate::value::Value;

/// How one output column is read from a record
enum Projection<R> {
    Column(usize),
    Computed(CompiledExpression<R>),
}

/// Evaluates query specifications in memory
#[derive(Debug, Clone, Default)]
pub struct QueryEvaluator {
    parameters: Parameters,
    extra_expression: Option<String>,
}

impl QueryEvaluator {
    pub fn new(parameters: Parameters) -> Self {
        QueryEvaluator {
            parameters,
            extra_expression: None,
        }
    }

    /// Apply an additional filter expression after the query's own filters
    pub fn with_expression(mut self, expression: &str) -> Self {
        if !expression.trim().is_empty() {
            self.extra_expression = Some(expression.to_string());
        }
        self
    }

    /// Evaluate `spec` over every record of `source`
    ///
    /// # Returns
    /// * `Ok(Table)` with one column per output field, labelled by description
    /// * `Err(ReportError)` for a malformed filter, a missing parameter or
    ///   column, or a data source failure
    pub fn evaluate<R: Clone + 'static>(
        &self,
        spec: &QuerySpecification,
        layout: Rc<RecordLayout<R>>,
        source: Rc<dyn RecordSource<R>>,
    ) -> ReportResult<Table> {
        let mut cursor = TableCursor::new(source, layout);
        self.apply_filters(spec, &mut cursor)?;

        let aggregated = spec.fields().iter().any(|f| f.aggregate.is_some());
        let outputs: Vec<&FieldDescriptor> = spec
            .fields()
            .iter()
            .filter(|f| !(aggregated && f.is_computed()))
            .collect();
        let projections = outputs
            .iter()
            .map(|field| projection(&cursor, field))
            .collect::<ReportResult<Vec<_>>>()?;

        let mut rows = Vec::new();
        cursor.move_first();
        while !cursor.eof()? {
            cursor.move_next()?;
            let record = match cursor.current() {
                Some(record) => record,
                None => break,
            };
            let mut row = Vec::with_capacity(projections.len());
            for projection in &projections {
                row.push(match projection {
                    Projection::Column(index) => {
                        cursor.cache().read(record, *index).unwrap_or(Value::Null)
                    }
                    Projection::Computed(expression) => expression.evaluate(record)?,
                });
            }
            rows.push(row);
        }
        cursor.close();
        debug!("Evaluated {} source rows for {}", rows.len(), spec.target_table());

        if aggregated {
            rows = aggregate_rows(&outputs, rows)?;
        }

        let labels = outputs.iter().map(|f| f.label().to_string()).collect();
        let mut table = Table::new(spec.target_table(), labels);
        for row in rows {
            table.add_row(row)?;
        }

        let sort: Vec<_> = outputs
            .iter()
            .enumerate()
            .filter(|(_, f)| f.sort.is_some() && !f.is_computed())
            .map(|(i, f)| (i, f.sort))
            .collect();
        table.sort(&sort)?;
        Ok(table)
    }

    /// Compile the WHERE groups (and the extra expression) onto the cursor
    fn apply_filters<R: Clone + 'static>(
        &self,
        spec: &QuerySpecification,
        cursor: &mut TableCursor<R>,
    ) -> ReportResult<()> {
        for group in group_by_field(spec.filters()) {
            let conditions = group
                .iter()
                .map(|f| f.to_expression(&self.parameters))
                .collect::<ReportResult<Vec<_>>>()?;
            let expression = spec.substitute(&conditions.join(" OR "))?;
            debug!("In-memory filter: {}", expression);
            cursor.add_filter_expression(&expression)?;
        }

        if let Some(expression) = &self.extra_expression {
            cursor.add_filter_expression(expression)?;
        }
        Ok(())
    }
}

fn projection<R: Clone + 'static>(
    cursor: &TableCursor<R>,
    field: &FieldDescriptor,
) -> ReportResult<Projection<R>> {
    if let Some(expression) = field.computed_expression.as_deref().filter(|e| !e.trim().is_empty()) {
        return Ok(Projection::Computed(cursor.compiler().compile_value(expression)?));
    }
    cursor
        .layout()
        .find(field.reference())
        .map(Projection::Column)
        .ok_or_else(|| ReportError::ColumnNotFound(field.code.clone()))
}

/// Group rows by their non-aggregated columns and aggregate the rest
///
/// Groups keep the order in which their first row appeared.
fn aggregate_rows(fields: &[&FieldDescriptor], rows: Vec<Row>) -> ReportResult<Vec<Row>> {
    let key_columns: Vec<usize> = fields
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.aggregate.is_some())
        .map(|(i, _)| i)
        .collect();

    let mut index: HashMap<Vec<Value>, usize> = HashMap::new();
    let mut groups: Vec<Vec<Row>> = Vec::new();
    for row in rows {
        let key: Vec<Value> = key_columns.iter().map(|&i| row[i].clone()).collect();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(row);
    }

    // without grouping columns the whole input is one group, even when empty
    if groups.is_empty() && key_columns.is_empty() {
        groups.push(Vec::new());
    }

    let mut result = Vec::with_capacity(groups.len());
    for group in groups {
        let mut out = Vec::with_capacity(fields.len());
        for (column, field) in fields.iter().enumerate() {
            if field.aggregate == Aggregate::None {
                out.push(group.first().map_or(Value::Null, |row| row[column].clone()));
            } else {
                let values: Vec<Value> = group.iter().map(|row| row[column].clone()).collect();
                out.push(field.aggregate.execute(&values)?);
            }
        }
        result.push(out);
    }
    Ok(result)
}
