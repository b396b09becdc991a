//! Table cursor module for reportq
//!
//! A `TableCursor` walks the records of one table through a lazily built
//! pipeline: base sequence, master-detail link filters, user filters, then
//! sort. Nothing is read until the first positional access. The cursor keeps
//! one record of lookahead so `eof` can be answered without moving.
//!
//! States:
//!
//! ```text
//! Uninitialized -> BeforeFirst -> Positioned(i) -> EndOfStream
//! ```
//!
//! Detail cursors are re-scoped from a parent cursor with
//! `move_master_record`, either by pulling rows the parent record already
//! holds (nested link) or by filtering on a key equal to a parent field
//! (keyed link).

use std::cmp::Ordering;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::accessor::{AccessorCache, RecordLayout};
use crate::error::{ParseError, ReportError, ReportResult};
use crate::expr::ast::BinaryOp;
use crate::expr::eval::compare;
use crate::expr::{ExpressionCompiler, Predicate};
use crate::field::SortDirection;
use crate::value::Value;

/// A fallible stream of records
pub type RowIter<R> = Box<dyn Iterator<Item = ReportResult<R>>>;

/// Supplier of the unfiltered records of one table
pub trait RecordSource<R> {
    /// Origin table name
    fn name(&self) -> &str;

    /// Start a fresh pass over the records
    fn records(&self) -> ReportResult<RowIter<R>>;
}

/// Record source over rows already held in memory
pub struct MemorySource<R> {
    name: String,
    rows: Rc<Vec<R>>,
}

impl<R> MemorySource<R> {
    pub fn new(name: &str, rows: Vec<R>) -> Self {
        MemorySource {
            name: name.to_string(),
            rows: Rc::new(rows),
        }
    }

    pub fn rows(&self) -> &Rc<Vec<R>> {
        &self.rows
    }
}

fn iterate<R: Clone + 'static>(rows: Rc<Vec<R>>) -> RowIter<R> {
    Box::new((0..rows.len()).map(move |i| Ok(rows[i].clone())))
}

impl<R: Clone + 'static> RecordSource<R> for MemorySource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn records(&self) -> ReportResult<RowIter<R>> {
        Ok(iterate(Rc::clone(&self.rows)))
    }
}

/// Records that carry pre-materialized child rows
pub trait Nested<C> {
    /// Child rows of `table` held by this record
    fn nested(&self, table: &str) -> Option<Rc<Vec<C>>>;
}

/// The parent side of a master-detail relationship
pub trait Master<C> {
    /// Value of `field` in the current parent record, `None` if not positioned
    fn master_value(&self, field: &str) -> ReportResult<Option<Value>>;

    /// Child rows of `table` held by the current parent record
    fn nested_rows(&self, table: &str) -> Option<Rc<Vec<C>>>;
}

/// One parent-to-child field mapping
///
/// Without a child field the link is nested: the child rows come from the
/// parent record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterDetailLink {
    pub parent_field: String,
    pub child_field: Option<String>,
}

impl MasterDetailLink {
    pub fn keyed(parent_field: &str, child_field: &str) -> Self {
        MasterDetailLink {
            parent_field: parent_field.to_string(),
            child_field: Some(child_field.to_string()),
        }
    }

    pub fn nested() -> Self {
        MasterDetailLink {
            parent_field: String::new(),
            child_field: None,
        }
    }
}

/// A page of a parent record's children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitLink {
    pub page_size: usize,
    /// Zero-based page of the current parent record
    pub page: usize,
}

/// Position of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Uninitialized,
    BeforeFirst,
    Positioned(usize),
    EndOfStream,
}

#[derive(Debug, Clone, Copy)]
struct SortKey {
    index: usize,
    direction: SortDirection,
}

/// Lazily filtered and sorted view of one table
pub struct TableCursor<R> {
    name: String,
    source: Option<Rc<dyn RecordSource<R>>>,
    nested: Option<Rc<Vec<R>>>,
    compiler: ExpressionCompiler<R>,
    link_filters: Vec<Predicate<R>>,
    filters: Vec<Predicate<R>>,
    sort: Vec<SortKey>,
    rows: Option<RowIter<R>>,
    current: Option<R>,
    lookahead: Option<R>,
    state: CursorState,
    row_count: Option<usize>,
    split: Option<SplitLink>,
}

impl<R: Clone + 'static> TableCursor<R> {
    /// Cursor over every record of `source`
    pub fn new(source: Rc<dyn RecordSource<R>>, layout: Rc<RecordLayout<R>>) -> Self {
        let name = source.name().to_string();
        let mut cursor = TableCursor::detail(&name, layout);
        cursor.source = Some(source);
        cursor
    }

    /// Cursor whose rows only come from a parent record through a nested link
    pub fn detail(name: &str, layout: Rc<RecordLayout<R>>) -> Self {
        TableCursor {
            name: name.to_string(),
            source: None,
            nested: None,
            compiler: ExpressionCompiler::new(layout),
            link_filters: Vec::new(),
            filters: Vec::new(),
            sort: Vec::new(),
            rows: None,
            current: None,
            lookahead: None,
            state: CursorState::Uninitialized,
            row_count: None,
            split: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layout(&self) -> &Rc<RecordLayout<R>> {
        self.compiler.cache().layout()
    }

    /// Accessor cache shared by every expression compiled for this cursor
    pub fn cache(&self) -> &Rc<AccessorCache<R>> {
        self.compiler.cache()
    }

    pub fn compiler(&self) -> &ExpressionCompiler<R> {
        &self.compiler
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Zero-based index of the current record
    pub fn position(&self) -> Option<usize> {
        match self.state {
            CursorState::Positioned(i) => Some(i),
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&R> {
        self.current.as_ref()
    }

    /// Read `field` from the current record
    pub fn value(&self, field: &str) -> ReportResult<Option<Value>> {
        let current = match &self.current {
            Some(record) => record,
            None => return Ok(None),
        };
        let index = self
            .layout()
            .find(field)
            .ok_or_else(|| ReportError::ColumnNotFound(field.to_string()))?;
        Ok(self.cache().read(current, index))
    }

    /// Append a filter, applied after those already registered
    pub fn add_filter(&mut self, predicate: Predicate<R>) {
        self.filters.push(predicate);
        self.rescope();
    }

    /// Compile and append a filter expression
    pub fn add_filter_expression(&mut self, expression: &str) -> Result<(), ParseError> {
        let predicate = self.compiler.compile_predicate(expression)?;
        self.add_filter(predicate);
        Ok(())
    }

    /// Declare the sort order
    ///
    /// The first key is the primary ordering, later keys break ties in turn.
    /// Keys with no direction are ignored.
    pub fn set_sort(&mut self, keys: &[(&str, SortDirection)]) -> ReportResult<()> {
        let mut sort = Vec::new();
        for (field, direction) in keys {
            if !direction.is_some() {
                continue;
            }
            let index = self
                .layout()
                .find(field)
                .ok_or_else(|| ReportError::ColumnNotFound(field.to_string()))?;
            sort.push(SortKey {
                index,
                direction: *direction,
            });
        }
        self.sort = sort;
        self.rescope();
        Ok(())
    }

    /// Return to before the first record
    ///
    /// Inside a split scope past its first page the cursor keeps its place.
    pub fn move_first(&mut self) {
        if self.split.is_some_and(|split| split.page > 0) {
            return;
        }
        if self.state == CursorState::BeforeFirst {
            return;
        }
        self.release();
        self.state = CursorState::BeforeFirst;
    }

    /// Advance to the next record
    ///
    /// # Returns
    /// * `Ok(true)` if the cursor is positioned on a record
    /// * `Ok(false)` once the end of the stream is reached
    /// * `Err(ReportError)` from the data source or a filter; the pipeline is released
    pub fn move_next(&mut self) -> ReportResult<bool> {
        if self.state == CursorState::EndOfStream {
            return Ok(false);
        }
        self.ensure_open()?;

        self.current = self.lookahead.take();
        match self.current {
            Some(_) => {
                self.state = match self.state {
                    CursorState::Positioned(i) => CursorState::Positioned(i + 1),
                    _ => CursorState::Positioned(0),
                };
                self.prefetch()?;
                Ok(true)
            }
            None => {
                self.state = CursorState::EndOfStream;
                Ok(false)
            }
        }
    }

    /// Whether no record remains to move onto
    ///
    /// Never changes the position; repeated calls give the same answer.
    pub fn eof(&mut self) -> ReportResult<bool> {
        if self.state == CursorState::EndOfStream {
            return Ok(true);
        }
        self.ensure_open()?;
        Ok(self.lookahead.is_none())
    }

    /// Number of records in the current scope
    ///
    /// Counted once per scope. Inside a split scope this is the number of
    /// rows left for the current page, at most the page size.
    pub fn row_count(&mut self) -> ReportResult<usize> {
        let total = match self.row_count {
            Some(total) => total,
            None => {
                let mut total = 0;
                for row in self.pipeline()? {
                    row?;
                    total += 1;
                }
                self.row_count = Some(total);
                total
            }
        };
        Ok(match self.split {
            Some(split) => total
                .saturating_sub(split.page * split.page_size)
                .min(split.page_size),
            None => total,
        })
    }

    /// Re-scope this detail cursor to the current record of `parent`
    ///
    /// Past the first page of a split scope this only advances, since the
    /// rows already selected stay valid across pages.
    pub fn move_master_record(
        &mut self,
        parent: &dyn Master<R>,
        links: &[MasterDetailLink],
        split: Option<SplitLink>,
    ) -> ReportResult<()> {
        if split.is_some_and(|split| split.page > 0) {
            self.split = split;
            self.move_next()?;
            return Ok(());
        }

        let (nested, link_filters) = match self.link_scope(parent, links) {
            Ok(scope) => scope,
            Err(err) => {
                self.close();
                return Err(err);
            }
        };
        debug!(
            "Re-scoped {} to master record ({} link filters, nested: {})",
            self.name,
            link_filters.len(),
            nested.is_some()
        );

        self.split = split;
        self.row_count = None;
        self.nested = nested;
        self.link_filters = link_filters;
        self.release();
        self.state = CursorState::BeforeFirst;
        Ok(())
    }

    /// Resolve the base rows and key filters of `links` against `parent`
    fn link_scope(
        &self,
        parent: &dyn Master<R>,
        links: &[MasterDetailLink],
    ) -> ReportResult<(Option<Rc<Vec<R>>>, Vec<Predicate<R>>)> {
        let mut nested = None;
        let mut link_filters = Vec::new();
        for link in links {
            match &link.child_field {
                None => {
                    let rows = parent
                        .nested_rows(&self.name)
                        .ok_or_else(|| ReportError::Configuration(self.name.clone()))?;
                    nested = Some(rows);
                }
                Some(child_field) => {
                    link_filters.push(self.link_predicate(parent, &link.parent_field, child_field)?);
                }
            }
        }
        Ok((nested, link_filters))
    }

    /// Release the pipeline and forget the position
    pub fn close(&mut self) {
        self.release();
        self.state = CursorState::Uninitialized;
    }

    fn link_predicate(
        &self,
        parent: &dyn Master<R>,
        parent_field: &str,
        child_field: &str,
    ) -> ReportResult<Predicate<R>> {
        let layout = self.layout();
        let index = layout
            .find(child_field)
            .ok_or_else(|| ReportError::ColumnNotFound(child_field.to_string()))?;
        let key = match parent.master_value(parent_field)? {
            Some(value) => match layout.get(index) {
                Some(property) => value.convert(property.value_type())?,
                None => value,
            },
            // no parent record: the child scope is empty
            None => return Ok(Rc::new(|_: &R| -> ReportResult<bool> { Ok(false) })),
        };

        let cache = Rc::clone(self.cache());
        Ok(Rc::new(move |record: &R| -> ReportResult<bool> {
            let value = cache.read(record, index).unwrap_or(Value::Null);
            Ok(compare(BinaryOp::Eq, &value, &key))
        }))
    }

    /// Drop cached state after the filters or sort changed
    fn rescope(&mut self) {
        self.row_count = None;
        if self.rows.is_some() || self.current.is_some() {
            self.release();
            self.state = CursorState::BeforeFirst;
        }
    }

    fn release(&mut self) {
        if self.rows.take().is_some() {
            trace!("Released pipeline of {}", self.name);
        }
        self.current = None;
        self.lookahead = None;
    }

    fn ensure_open(&mut self) -> ReportResult<()> {
        if self.rows.is_some() {
            return Ok(());
        }
        debug!(
            "Opening {} ({} filters, {} sort keys)",
            self.name,
            self.link_filters.len() + self.filters.len(),
            self.sort.len()
        );
        let rows = match self.pipeline() {
            Ok(rows) => rows,
            Err(err) => {
                self.close();
                return Err(err);
            }
        };
        self.rows = Some(rows);
        self.state = CursorState::BeforeFirst;
        self.prefetch()
    }

    fn prefetch(&mut self) -> ReportResult<()> {
        let next = match self.rows.as_mut() {
            Some(rows) => rows.next(),
            None => None,
        };
        match next {
            Some(Ok(record)) => {
                self.lookahead = Some(record);
                Ok(())
            }
            Some(Err(err)) => {
                self.close();
                Err(err)
            }
            None => {
                self.lookahead = None;
                Ok(())
            }
        }
    }

    /// Build base, link filters, user filters, then sort
    fn pipeline(&self) -> ReportResult<RowIter<R>> {
        let base = match (&self.nested, &self.source) {
            (Some(rows), _) => iterate(Rc::clone(rows)),
            (None, Some(source)) => source.records()?,
            (None, None) => return Err(ReportError::Configuration(self.name.clone())),
        };

        let predicates: Vec<Predicate<R>> = self
            .link_filters
            .iter()
            .chain(self.filters.iter())
            .cloned()
            .collect();
        let filtered = base.filter_map(move |item| {
            let record = match item {
                Ok(record) => record,
                Err(err) => return Some(Err(err)),
            };
            for predicate in &predicates {
                match predicate(&record) {
                    Ok(true) => {}
                    Ok(false) => return None,
                    Err(err) => return Some(Err(err)),
                }
            }
            Some(Ok(record))
        });

        if self.sort.is_empty() {
            return Ok(Box::new(filtered));
        }

        let cache = self.cache();
        let mut keyed = Vec::new();
        for item in filtered {
            let record = item?;
            let key: Vec<Value> = self
                .sort
                .iter()
                .map(|k| cache.read(&record, k.index).unwrap_or(Value::Null))
                .collect();
            keyed.push((key, record));
        }
        let sort = self.sort.clone();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, &sort));
        Ok(Box::new(keyed.into_iter().map(|(_, record)| Ok(record))))
    }
}

fn compare_keys(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    for ((left, right), key) in a.iter().zip(b.iter()).zip(keys) {
        let ordering = left.partial_cmp(right).unwrap_or(Ordering::Equal);
        let ordering = match key.direction {
            SortDirection::Descending => ordering.reverse(),
            _ => ordering,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl<R, C> Master<C> for TableCursor<R>
where
    R: Nested<C> + Clone + 'static,
{
    fn master_value(&self, field: &str) -> ReportResult<Option<Value>> {
        self.value(field)
    }

    fn nested_rows(&self, table: &str) -> Option<Rc<Vec<C>>> {
        self.current.as_ref()?.nested(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::Record;
    use crate::value::ValueType;
    use std::cell::Cell;

    #[derive(Clone)]
    struct Customer {
        id: i64,
        name: String,
        orders: Option<Rc<Vec<Order>>>,
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Order {
        id: i64,
        customer: i64,
        amount: f64,
    }

    impl Record for Customer {
        fn layout() -> RecordLayout<Self> {
            RecordLayout::new()
                .property("Id", ValueType::Integer, false, |c: &Customer| Value::from(c.id))
                .property("Name", ValueType::String, false, |c: &Customer| {
                    Value::from(c.name.clone())
                })
        }
    }

    impl Nested<Order> for Customer {
        fn nested(&self, table: &str) -> Option<Rc<Vec<Order>>> {
            if table == "Orders" {
                self.orders.clone()
            } else {
                None
            }
        }
    }

    impl Record for Order {
        fn layout() -> RecordLayout<Self> {
            RecordLayout::new()
                .property("Id", ValueType::Integer, false, |o: &Order| Value::from(o.id))
                .property("Customer", ValueType::Integer, false, |o: &Order| {
                    Value::from(o.customer)
                })
                .property("Amount", ValueType::Float, false, |o: &Order| {
                    Value::from(o.amount)
                })
        }
    }

    fn order(id: i64, customer: i64, amount: f64) -> Order {
        Order {
            id,
            customer,
            amount,
        }
    }

    fn orders() -> Vec<Order> {
        vec![
            order(1, 10, 50.0),
            order(2, 20, 75.0),
            order(3, 10, 20.0),
            order(4, 30, 5.0),
            order(5, 10, 90.0),
        ]
    }

    fn order_cursor() -> TableCursor<Order> {
        TableCursor::new(
            Rc::new(MemorySource::new("Orders", orders())),
            Rc::new(Order::layout()),
        )
    }

    fn customer_cursor() -> TableCursor<Customer> {
        let customers = vec![
            Customer {
                id: 10,
                name: "Acme".into(),
                orders: Some(Rc::new(vec![order(1, 10, 50.0)])),
            },
            Customer {
                id: 20,
                name: "Bolt".into(),
                orders: None,
            },
        ];
        TableCursor::new(
            Rc::new(MemorySource::new("Customers", customers)),
            Rc::new(Customer::layout()),
        )
    }

    fn ids(cursor: &mut TableCursor<Order>) -> Vec<i64> {
        let mut ids = Vec::new();
        cursor.move_first();
        while !cursor.eof().unwrap() {
            cursor.move_next().unwrap();
            ids.push(cursor.current().unwrap().id);
        }
        ids
    }

    #[test]
    fn test_walk_and_states() {
        let mut cursor = order_cursor();
        assert_eq!(cursor.state(), CursorState::Uninitialized);
        assert!(cursor.move_next().unwrap());
        assert_eq!(cursor.state(), CursorState::Positioned(0));
        assert_eq!(cursor.value("Amount").unwrap(), Some(Value::Float(50.0)));

        for _ in 0..4 {
            assert!(cursor.move_next().unwrap());
        }
        assert_eq!(cursor.position(), Some(4));
        assert!(!cursor.move_next().unwrap());
        assert_eq!(cursor.state(), CursorState::EndOfStream);
        assert!(cursor.current().is_none());
    }

    #[test]
    fn test_eof_is_idempotent() {
        let mut cursor = order_cursor();
        cursor.move_next().unwrap();
        for _ in 0..5 {
            assert!(!cursor.eof().unwrap());
            assert_eq!(cursor.position(), Some(0));
        }
        while cursor.move_next().unwrap() {}
        assert!(cursor.eof().unwrap());
        assert!(cursor.eof().unwrap());
    }

    #[test]
    fn test_empty_cursor_is_immediately_eof() {
        let mut cursor = order_cursor();
        cursor.add_filter_expression("[Amount] > 1000").unwrap();
        assert!(cursor.eof().unwrap());
        assert!(!cursor.move_next().unwrap());
        assert_eq!(cursor.row_count().unwrap(), 0);
    }

    #[test]
    fn test_filters_then_sort() {
        let mut cursor = order_cursor();
        cursor.add_filter_expression("[Customer] = 10").unwrap();
        cursor.add_filter_expression("[Amount] >= 20").unwrap();
        cursor
            .set_sort(&[("Amount", SortDirection::Descending)])
            .unwrap();
        assert_eq!(ids(&mut cursor), vec![5, 1, 3]);
        assert_eq!(cursor.row_count().unwrap(), 3);
    }

    #[test]
    fn test_then_by_keys() {
        let mut cursor = order_cursor();
        cursor
            .set_sort(&[
                ("Customer", SortDirection::Ascending),
                ("Amount", SortDirection::Ascending),
            ])
            .unwrap();
        assert_eq!(ids(&mut cursor), vec![3, 1, 5, 2, 4]);
    }

    #[test]
    fn test_move_first_restarts() {
        let mut cursor = order_cursor();
        cursor.move_next().unwrap();
        cursor.move_next().unwrap();
        cursor.move_first();
        assert_eq!(cursor.state(), CursorState::BeforeFirst);
        cursor.move_next().unwrap();
        assert_eq!(cursor.current().map(|o| o.id), Some(1));
    }

    #[test]
    fn test_pipeline_is_lazy() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut cursor = order_cursor();
        cursor.add_filter(Rc::new(move |_: &Order| -> ReportResult<bool> {
            counter.set(counter.get() + 1);
            Ok(true)
        }));
        assert_eq!(calls.get(), 0);
        cursor.move_next().unwrap();
        // the current record plus one of lookahead
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_keyed_master_detail() {
        let mut customers = customer_cursor();
        let mut detail = order_cursor();
        let links = [MasterDetailLink::keyed("Id", "Customer")];

        customers.move_next().unwrap();
        detail.move_master_record(&customers, &links, None).unwrap();
        assert_eq!(ids(&mut detail), vec![1, 3, 5]);

        // same parent position, same children
        detail.move_master_record(&customers, &links, None).unwrap();
        assert_eq!(ids(&mut detail), vec![1, 3, 5]);

        customers.move_next().unwrap();
        detail.move_master_record(&customers, &links, None).unwrap();
        assert_eq!(ids(&mut detail), vec![2]);
    }

    #[test]
    fn test_nested_master_detail() {
        let mut customers = customer_cursor();
        let mut detail = TableCursor::detail("Orders", Rc::new(Order::layout()));
        let links = [MasterDetailLink::nested()];

        customers.move_next().unwrap();
        detail.move_master_record(&customers, &links, None).unwrap();
        assert_eq!(ids(&mut detail), vec![1]);

        customers.move_next().unwrap();
        let err = detail
            .move_master_record(&customers, &links, None)
            .unwrap_err();
        assert!(matches!(err, ReportError::Configuration(ref table) if table == "Orders"));
    }

    #[test]
    fn test_failed_rescope_closes_cursor() {
        let mut customers = customer_cursor();
        let mut detail = order_cursor();

        customers.move_next().unwrap();
        detail
            .move_master_record(&customers, &[MasterDetailLink::keyed("Id", "Customer")], None)
            .unwrap();
        detail.move_next().unwrap();
        assert_eq!(detail.current().map(|o| o.id), Some(1));

        customers.move_next().unwrap();
        assert!(detail
            .move_master_record(&customers, &[MasterDetailLink::nested()], None)
            .is_err());
        assert_eq!(detail.state(), CursorState::Uninitialized);
        assert!(detail.current().is_none());
        assert_eq!(detail.position(), None);
    }

    #[test]
    fn test_detail_without_rows_is_a_configuration_error() {
        let mut detail: TableCursor<Order> =
            TableCursor::detail("Orders", Rc::new(Order::layout()));
        assert!(matches!(
            detail.move_next(),
            Err(ReportError::Configuration(_))
        ));
        assert_eq!(detail.state(), CursorState::Uninitialized);
    }

    #[test]
    fn test_split_pages() {
        let mut customers = customer_cursor();
        let mut detail = order_cursor();
        let links = [MasterDetailLink::keyed("Id", "Customer")];
        customers.move_next().unwrap();

        let first = SplitLink {
            page_size: 2,
            page: 0,
        };
        detail
            .move_master_record(&customers, &links, Some(first))
            .unwrap();
        assert_eq!(detail.row_count().unwrap(), 2);
        detail.move_next().unwrap();
        detail.move_next().unwrap();
        assert_eq!(detail.current().map(|o| o.id), Some(3));

        let second = SplitLink {
            page_size: 2,
            page: 1,
        };
        detail
            .move_master_record(&customers, &links, Some(second))
            .unwrap();
        // the second page continues where the first stopped
        assert_eq!(detail.current().map(|o| o.id), Some(5));
        assert_eq!(detail.row_count().unwrap(), 1);
        detail.move_first();
        assert_eq!(detail.current().map(|o| o.id), Some(5));
    }

    struct FailingSource;

    impl RecordSource<Order> for FailingSource {
        fn name(&self) -> &str {
            "Broken"
        }

        fn records(&self) -> ReportResult<RowIter<Order>> {
            let rows: Vec<ReportResult<Order>> = vec![
                Ok(order(1, 1, 1.0)),
                Err(ReportError::TypeError("bad row".into())),
            ];
            Ok(Box::new(rows.into_iter()))
        }
    }

    #[test]
    fn test_source_errors_propagate() {
        let mut cursor = TableCursor::new(Rc::new(FailingSource), Rc::new(Order::layout()));
        // the failing row is the lookahead of the first record
        assert!(matches!(
            cursor.move_next(),
            Err(ReportError::TypeError(_))
        ));
        assert_eq!(cursor.state(), CursorState::Uninitialized);
        assert!(cursor.current().is_none());
    }
}
