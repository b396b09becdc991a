//! Expression tree for compiled filter expressions

use std::fmt;

use crate::value::{Value, ValueType};

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Case handling for `STREQUALS`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    IgnoreCase,
    SameCase,
}

/// Built-in functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    IsNull,
    Year,
    Month,
    Day,
    StrEquals(CaseMode),
}

impl Function {
    /// Look up a function by name (case-insensitive)
    ///
    /// `STREQUALS` is resolved by the parser since its mode is an argument.
    pub fn from_name(name: &str) -> Option<Function> {
        match name.to_uppercase().as_str() {
            "ISNULL" => Some(Function::IsNull),
            "YEAR" => Some(Function::Year),
            "MONTH" => Some(Function::Month),
            "DAY" => Some(Function::Day),
            _ => None,
        }
    }
}

/// A node of the expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant value
    Literal(Value),
    /// Property read through the accessor cache
    Field { index: usize, name: String },
    /// Run-time conversion of a non-constant operand
    Convert { expr: Box<Expr>, target: ValueType },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    /// Function call; `null_guard` makes date extraction yield -1 for null
    Call {
        function: Function,
        args: Vec<Expr>,
        null_guard: bool,
    },
}

/// An expression node with the static facts the parser needs for coercion
#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub expr: Expr,
    pub value_type: ValueType,
    pub nullable: bool,
    /// True for constants, false for field references and function results
    pub literal: bool,
}

impl Operand {
    pub fn constant(value: Value) -> Self {
        Operand {
            value_type: value.value_type(),
            nullable: value.is_null(),
            literal: true,
            expr: Expr::Literal(value),
        }
    }

    pub fn computed(expr: Expr, value_type: ValueType, nullable: bool) -> Self {
        Operand {
            expr,
            value_type,
            nullable,
            literal: false,
        }
    }
}
