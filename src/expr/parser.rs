//! Recursive-descent parser for filter expressions
//!
//! Precedence, loosest first:
//!
//! ```text
//! expr      := notExpr ( (AND | OR) notExpr )*
//! notExpr   := NOT? compare
//! compare   := addsub ( relop addsub )?
//! addsub    := multdiv ( (+ | -) multdiv )*
//! multdiv   := unary ( (* | /) unary )*
//! unary     := (+ | -)? primary
//! ```
//!
//! `AND` and `OR` share one precedence level and associate to the left.
//! Comparisons do not chain.
//!
//! Operand types are reconciled while the tree is built: when the two sides
//! of a binary operator differ in type, the constant side is converted to
//! the type of the other side. If both sides are constants the left one is
//! converted. Constants are converted immediately, so a bad literal fails
//! here instead of on every record.

use crate::accessor::RecordLayout;
use crate::error::{ParseError, ParseErrorKind};
use crate::value::{parse_date, Value, ValueType};

use super::ast::{BinaryOp, CaseMode, Expr, Function, Operand, UnaryOp};
use super::lexer::{Lexer, Token};

/// Parser over the tokens of one expression
pub struct Parser<'a, R> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    layout: &'a RecordLayout<R>,
}

impl<'a, R> Parser<'a, R> {
    /// Tokenize `input` and prepare to parse it against `layout`
    pub fn new(input: &'a str, layout: &'a RecordLayout<R>) -> Result<Self, ParseError> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Parser {
            input,
            tokens,
            pos: 0,
            layout,
        })
    }

    /// Parse the complete input
    ///
    /// # Returns
    /// * `Ok(Operand)` with the typed expression tree
    /// * `Err(ParseError)` at the first violation; nothing partial is returned
    pub fn parse(mut self) -> Result<Operand, ParseError> {
        if self.tokens.is_empty() {
            return Err(self.error(ParseErrorKind::UnexpectedEnd, ""));
        }
        let operand = self.parse_or_and()?;
        match self.peek() {
            None => Ok(operand),
            Some(token) => Err(self.error(ParseErrorKind::UnexpectedToken, token.to_string())),
        }
    }

    fn error(&self, kind: ParseErrorKind, token: impl Into<String>) -> ParseError {
        ParseError::new(kind, token, self.input)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(self.error(ParseErrorKind::UnexpectedToken, token.to_string())),
            None if expected == Token::RParen => {
                Err(self.error(ParseErrorKind::MissingParenthesis, "("))
            }
            None => Err(self.error(ParseErrorKind::UnexpectedEnd, expected.to_string())),
        }
    }

    fn parse_or_and(&mut self) -> Result<Operand, ParseError> {
        let mut left = self.parse_not()?;
        loop {
            let op = match self.peek() {
                Some(t) if t.is_keyword("AND") => BinaryOp::And,
                Some(t) if t.is_keyword("OR") => BinaryOp::Or,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_not()?;
            left = Operand::computed(
                Expr::Binary {
                    left: Box::new(left.expr),
                    op,
                    right: Box::new(right.expr),
                },
                ValueType::Boolean,
                false,
            );
        }
    }

    fn parse_not(&mut self) -> Result<Operand, ParseError> {
        if self.peek().is_some_and(|t| t.is_keyword("NOT")) {
            self.advance();
            let operand = self.parse_compare()?;
            return Ok(Operand::computed(
                Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(operand.expr),
                },
                ValueType::Boolean,
                false,
            ));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Operand, ParseError> {
        let left = self.parse_add_sub()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_add_sub()?;
        let (left, right) = self.coerce(left, right)?;
        Ok(Operand::computed(
            Expr::Binary {
                left: Box::new(left.expr),
                op,
                right: Box::new(right.expr),
            },
            ValueType::Boolean,
            false,
        ))
    }

    fn parse_add_sub(&mut self) -> Result<Operand, ParseError> {
        let mut left = self.parse_mul_div()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_mul_div()?;
            left = self.arithmetic(left, op, right)?;
        }
    }

    fn parse_mul_div(&mut self) -> Result<Operand, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.arithmetic(left, op, right)?;
        }
    }

    fn arithmetic(&self, left: Operand, op: BinaryOp, right: Operand) -> Result<Operand, ParseError> {
        let (left, right) = self.coerce(left, right)?;
        Ok(Operand {
            value_type: left.value_type,
            nullable: left.nullable || right.nullable,
            literal: left.literal && right.literal,
            expr: Expr::Binary {
                left: Box::new(left.expr),
                op,
                right: Box::new(right.expr),
            },
        })
    }

    fn parse_unary(&mut self) -> Result<Operand, ParseError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                self.parse_primary()
            }
            Some(Token::Minus) => {
                self.advance();
                let operand = self.parse_primary()?;
                Ok(match operand.expr {
                    Expr::Literal(Value::Integer(i)) => Operand::constant(Value::Integer(-i)),
                    Expr::Literal(Value::Float(f)) => Operand::constant(Value::Float(-f)),
                    expr => Operand {
                        expr: Expr::Unary {
                            op: UnaryOp::Neg,
                            expr: Box::new(expr),
                        },
                        ..operand
                    },
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Operand, ParseError> {
        let token = match self.advance() {
            Some(token) => token,
            None => return Err(self.error(ParseErrorKind::UnexpectedEnd, "")),
        };

        match token {
            Token::LParen => {
                let operand = self.parse_or_and()?;
                self.expect(Token::RParen)?;
                Ok(operand)
            }
            Token::Str(text) => Ok(Operand::constant(Value::String(text))),
            Token::Field(name) => self.field(&name),
            Token::LBrace => self.braced_date(),
            Token::Word(word) => self.word(word),
            other => Err(self.error(ParseErrorKind::UnexpectedToken, other.to_string())),
        }
    }

    fn word(&mut self, word: String) -> Result<Operand, ParseError> {
        let upper = word.to_uppercase();
        match upper.as_str() {
            "TRUE" => return Ok(Operand::constant(Value::Boolean(true))),
            "FALSE" => return Ok(Operand::constant(Value::Boolean(false))),
            "NULL" => return Ok(Operand::constant(Value::Null)),
            "AND" | "OR" | "NOT" => {
                return Err(self.error(ParseErrorKind::UnexpectedToken, word));
            }
            "DATE" | "TIME" | "TIMESTAMP" => {
                if let Some(Token::Str(text)) = self.peek().cloned() {
                    self.advance();
                    return self.date_literal(&text);
                }
            }
            _ => {}
        }

        if self.peek() == Some(&Token::LParen) {
            if upper == "STREQUALS" {
                return self.str_equals();
            }
            if let Some(function) = Function::from_name(&upper) {
                return self.function(function);
            }
        }

        if word.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return self.number(&word);
        }

        self.field(&word)
    }

    fn number(&self, text: &str) -> Result<Operand, ParseError> {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Operand::constant(Value::Integer(i)));
        }
        match text.parse::<f64>() {
            Ok(f) => Ok(Operand::constant(Value::Float(f))),
            Err(_) => Err(self.error(ParseErrorKind::UnexpectedToken, text)),
        }
    }

    fn field(&self, name: &str) -> Result<Operand, ParseError> {
        let property = self
            .layout
            .find(name)
            .and_then(|index| self.layout.get(index).map(|p| (index, p)));
        match property {
            Some((index, property)) => Ok(Operand::computed(
                Expr::Field {
                    index,
                    name: property.name().to_string(),
                },
                property.value_type(),
                property.nullable(),
            )),
            None => Err(self.error(ParseErrorKind::UnknownField, name)),
        }
    }

    /// `{D '...'}`, `{T '...'}` or `{TS '...'}`
    fn braced_date(&mut self) -> Result<Operand, ParseError> {
        match self.advance() {
            Some(Token::Word(kind))
                if ["D", "T", "TS"].contains(&kind.to_uppercase().as_str()) => {}
            Some(other) => {
                return Err(self.error(ParseErrorKind::UnexpectedToken, other.to_string()))
            }
            None => return Err(self.error(ParseErrorKind::UnexpectedEnd, "{")),
        }
        let text = match self.advance() {
            Some(Token::Str(text)) => text,
            Some(other) => {
                return Err(self.error(ParseErrorKind::UnexpectedToken, other.to_string()))
            }
            None => return Err(self.error(ParseErrorKind::UnexpectedEnd, "{")),
        };
        self.expect(Token::RBrace)?;
        self.date_literal(&text)
    }

    fn date_literal(&self, text: &str) -> Result<Operand, ParseError> {
        parse_date(text)
            .map(|date| Operand::constant(Value::Date(date)))
            .ok_or_else(|| self.error(ParseErrorKind::InvalidDate, text))
    }

    /// One-argument functions: `ISNULL`, `YEAR`, `MONTH`, `DAY`
    fn function(&mut self, function: Function) -> Result<Operand, ParseError> {
        self.expect(Token::LParen)?;
        let argument = self.parse_or_and()?;
        self.expect(Token::RParen)?;

        match function {
            Function::IsNull => Ok(Operand::computed(
                Expr::Call {
                    function,
                    args: vec![argument.expr],
                    null_guard: false,
                },
                ValueType::Boolean,
                false,
            )),
            _ => {
                let null_guard = argument.nullable;
                let argument = self.convert_operand(argument, ValueType::Date)?;
                Ok(Operand::computed(
                    Expr::Call {
                        function,
                        args: vec![argument.expr],
                        null_guard,
                    },
                    ValueType::Integer,
                    false,
                ))
            }
        }
    }

    /// `STREQUALS(a, b, IGNORECASE | SAMECASE)`
    fn str_equals(&mut self) -> Result<Operand, ParseError> {
        self.expect(Token::LParen)?;
        let first = self.parse_or_and()?;
        self.expect(Token::Comma)?;
        let second = self.parse_or_and()?;
        self.expect(Token::Comma)?;

        let mode = match self.advance() {
            Some(t) if t.is_keyword("IGNORECASE") => CaseMode::IgnoreCase,
            Some(t) if t.is_keyword("SAMECASE") => CaseMode::SameCase,
            Some(other) => {
                return Err(self.error(ParseErrorKind::UnexpectedToken, other.to_string()))
            }
            None => return Err(self.error(ParseErrorKind::UnexpectedEnd, "STREQUALS")),
        };
        self.expect(Token::RParen)?;

        let first = self.convert_operand(first, ValueType::String)?;
        let second = self.convert_operand(second, ValueType::String)?;
        Ok(Operand::computed(
            Expr::Call {
                function: Function::StrEquals(mode),
                args: vec![first.expr, second.expr],
                null_guard: false,
            },
            ValueType::Boolean,
            false,
        ))
    }

    /// Reconcile the operand types of a binary operator
    fn coerce(&self, left: Operand, right: Operand) -> Result<(Operand, Operand), ParseError> {
        if left.value_type == right.value_type {
            return Ok((left, right));
        }

        if right.literal && !left.literal {
            let target = left.value_type;
            return Ok((left, self.convert_operand(right, target)?));
        }
        if left.literal {
            let target = right.value_type;
            return Ok((self.convert_operand(left, target)?, right));
        }

        // Neither side is constant: widen numbers, otherwise follow the left side
        if left.value_type.is_numeric() && right.value_type.is_numeric() {
            let left = self.convert_operand(left, ValueType::Float)?;
            let right = self.convert_operand(right, ValueType::Float)?;
            return Ok((left, right));
        }
        let target = left.value_type;
        Ok((left, self.convert_operand(right, target)?))
    }

    fn convert_operand(&self, operand: Operand, target: ValueType) -> Result<Operand, ParseError> {
        if operand.value_type == target {
            return Ok(operand);
        }

        let Operand {
            expr,
            nullable,
            literal,
            ..
        } = operand;
        match expr {
            Expr::Literal(value) => {
                let converted = value.convert(target).map_err(|_| {
                    let kind = if target == ValueType::Date {
                        ParseErrorKind::InvalidDate
                    } else {
                        ParseErrorKind::InvalidLiteral
                    };
                    self.error(kind, value.to_string())
                })?;
                Ok(Operand {
                    expr: Expr::Literal(converted),
                    value_type: target,
                    nullable,
                    literal,
                })
            }
            expr => Ok(Operand {
                expr: Expr::Convert {
                    expr: Box::new(expr),
                    target,
                },
                value_type: target,
                nullable,
                literal,
            }),
        }
    }
}
