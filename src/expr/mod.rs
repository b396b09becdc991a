//! Filter expression language
//!
//! Compiles single-line boolean or arithmetic expressions such as
//! `[Age] > 10 AND STREQUALS([Name], 'Bob', IGNORECASE)` into closures over a
//! record type. Parsing, type reconciliation and literal conversion all
//! happen once at compile time; evaluation walks the resulting tree and reads
//! fields through a shared [`AccessorCache`].

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

#[cfg(test)]
mod tests;

use std::rc::Rc;

use tracing::trace;

use crate::accessor::{AccessorCache, RecordLayout};
use crate::error::{ParseError, ParseErrorKind, ReportResult};
use crate::value::{Value, ValueType};

use ast::{Expr, Operand};
use parser::Parser;

/// A compiled boolean condition over records of type `R`
pub type Predicate<R> = Rc<dyn Fn(&R) -> ReportResult<bool>>;

/// A compiled value expression over records of type `R`
pub struct CompiledExpression<R> {
    expr: Expr,
    value_type: ValueType,
    cache: Rc<AccessorCache<R>>,
}

impl<R> CompiledExpression<R> {
    /// Static result type
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn evaluate(&self, record: &R) -> ReportResult<Value> {
        self.expr.evaluate(record, &self.cache)
    }
}

/// Compiles expression text against one record layout
pub struct ExpressionCompiler<R> {
    cache: Rc<AccessorCache<R>>,
}

impl<R: 'static> ExpressionCompiler<R> {
    pub fn new(layout: Rc<RecordLayout<R>>) -> Self {
        ExpressionCompiler {
            cache: Rc::new(AccessorCache::new(layout)),
        }
    }

    /// Compile against an accessor cache shared with other compilers
    pub fn with_cache(cache: Rc<AccessorCache<R>>) -> Self {
        ExpressionCompiler { cache }
    }

    pub fn cache(&self) -> &Rc<AccessorCache<R>> {
        &self.cache
    }

    /// Parse `input` into a typed expression tree
    pub fn parse(&self, input: &str) -> Result<Operand, ParseError> {
        let layout = Rc::clone(self.cache.layout());
        Parser::new(input, &layout)?.parse()
    }

    /// Compile a boolean condition
    ///
    /// # Returns
    /// * `Ok(Predicate)` that evaluates the condition on a record
    /// * `Err(ParseError)` if the text is malformed or does not yield a boolean
    pub fn compile_predicate(&self, input: &str) -> Result<Predicate<R>, ParseError> {
        let operand = self.parse(input)?;
        if !matches!(operand.value_type, ValueType::Boolean | ValueType::Null) {
            return Err(ParseError::new(ParseErrorKind::NotBoolean, input, input));
        }
        trace!("Compiled predicate: {}", input);

        let expr = operand.expr;
        let cache = Rc::clone(&self.cache);
        Ok(Rc::new(move |record: &R| -> ReportResult<bool> {
            expr.evaluate(record, &cache)?.truthy()
        }))
    }

    /// Compile an expression of any type
    pub fn compile_value(&self, input: &str) -> Result<CompiledExpression<R>, ParseError> {
        let operand = self.parse(input)?;
        trace!("Compiled value expression: {} ({})", input, operand.value_type);
        Ok(CompiledExpression {
            expr: operand.expr,
            value_type: operand.value_type,
            cache: Rc::clone(&self.cache),
        })
    }
}
