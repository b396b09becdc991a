//! Tokenizer for the filter expression language
//!
//! Letters, digits, `_` and `.` run together into one word token, so both
//! `Orders.Amount` and `12.5` come out as single tokens. `'...'` is a string
//! (with `''` as an escaped quote) and `[...]` is a field reference.
//! Two-character relational operators are found by peeking one character
//! past `<` or `>`.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::{ParseError, ParseErrorKind};

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier, keyword or number
    Word(String),
    /// Contents of a `'...'` literal
    Str(String),
    /// Contents of a `[...]` field reference
    Field(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Token {
    /// Whether this word token is the given keyword (case-insensitive)
    pub fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "{}", w),
            Token::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Token::Field(name) => write!(f, "[{}]", name),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBrace => f.write_str("{"),
            Token::RBrace => f.write_str("}"),
            Token::Comma => f.write_str(","),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Eq => f.write_str("="),
            Token::Ne => f.write_str("<>"),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Expression tokenizer
pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn error(&self, kind: ParseErrorKind, token: &str) -> ParseError {
        ParseError::new(kind, token, self.input)
    }

    /// Split the whole input into tokens
    ///
    /// Parentheses are balance-checked here so an unclosed `(` is reported
    /// as such before any field lookup happens.
    ///
    /// # Returns
    /// * `Ok(Vec<Token>)` for well-formed input
    /// * `Err(ParseError)` for an unterminated string or field reference,
    ///   an unknown character, or unbalanced parentheses
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        let mut depth: usize = 0;

        while let Some((start, c)) = self.chars.next() {
            let token = match c {
                c if c.is_whitespace() => continue,
                c if is_word_char(c) => {
                    let mut end = start + c.len_utf8();
                    while let Some(&(i, next)) = self.chars.peek() {
                        if !is_word_char(next) {
                            break;
                        }
                        end = i + next.len_utf8();
                        self.chars.next();
                    }
                    Token::Word(self.input[start..end].to_string())
                }
                '\'' => self.read_string(start)?,
                '[' => self.read_field(start)?,
                '(' => {
                    depth += 1;
                    Token::LParen
                }
                ')' => {
                    if depth == 0 {
                        return Err(self.error(ParseErrorKind::UnexpectedToken, ")"));
                    }
                    depth -= 1;
                    Token::RParen
                }
                '{' => Token::LBrace,
                '}' => Token::RBrace,
                ',' => Token::Comma,
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' => Token::Star,
                '/' => Token::Slash,
                '=' => Token::Eq,
                '<' => match self.chars.peek() {
                    Some(&(_, '=')) => {
                        self.chars.next();
                        Token::Le
                    }
                    Some(&(_, '>')) => {
                        self.chars.next();
                        Token::Ne
                    }
                    _ => Token::Lt,
                },
                '>' => match self.chars.peek() {
                    Some(&(_, '=')) => {
                        self.chars.next();
                        Token::Ge
                    }
                    _ => Token::Gt,
                },
                other => {
                    return Err(self.error(ParseErrorKind::UnexpectedToken, &other.to_string()))
                }
            };
            tokens.push(token);
        }

        if depth > 0 {
            return Err(self.error(ParseErrorKind::MissingParenthesis, "("));
        }
        Ok(tokens)
    }

    fn read_string(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\'')) => {
                    // '' is an escaped quote
                    if let Some(&(_, '\'')) = self.chars.peek() {
                        self.chars.next();
                        text.push('\'');
                    } else {
                        return Ok(Token::Str(text));
                    }
                }
                Some((_, c)) => text.push(c),
                None => {
                    let rest = &self.input[start..];
                    return Err(self.error(ParseErrorKind::UnterminatedString, rest));
                }
            }
        }
    }

    fn read_field(&mut self, start: usize) -> Result<Token, ParseError> {
        let mut name = String::new();
        for (_, c) in self.chars.by_ref() {
            if c == ']' {
                return Ok(Token::Field(name.trim().to_string()));
            }
            name.push(c);
        }
        let rest = &self.input[start..];
        Err(self.error(ParseErrorKind::UnexpectedEnd, rest))
    }
}
