//! Cost-Expression Parser
//!
//! Recursive-descent parser for the textual cost grammar the annotator
//! emits: rational and decimal numbers, identifiers, `+ - * /`, `**` (and
//! `^` as an alias), parentheses, `Sum(body, (var, lo, hi), ...)`,
//! `min`/`max`, and `unknown(<raw text>)` whose payload is captured
//! verbatim without being parsed.

use crate::domain::expr::{Rat, SumLimit, SymExpr};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected character '{0}' at offset {1}")]
    UnexpectedChar(char, usize),
    #[error("expected '{expected}' at offset {at}")]
    Expected { expected: char, at: usize },
    #[error("malformed summation limits at offset {0}")]
    BadSumLimits(usize),
    #[error("{name}() expects {expected} arguments, got {got}")]
    BadArity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("number '{0}' out of range")]
    NumberRange(String),
    #[error("empty expression")]
    Empty,
}

/// A parsed expression plus whether the raw text contained decimal literals
/// (drives the solver's "rationalize" step visibility).
#[derive(Debug, Clone)]
pub struct ParsedExpr {
    pub expr: SymExpr,
    pub had_decimals: bool,
}

/// Parse a cost-expression string.
pub fn parse_cost_expr(text: &str) -> Result<ParsedExpr, ParseError> {
    let mut p = Parser::new(text);
    p.skip_ws();
    if p.at_end() {
        return Err(ParseError::Empty);
    }
    let expr = p.parse_expr()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(ParseError::UnexpectedChar(p.peek().unwrap(), p.pos));
    }
    Ok(ParsedExpr {
        expr,
        had_decimals: p.had_decimals,
    })
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    had_decimals: bool,
}

impl Parser {
    fn new(src: &str) -> Self {
        Parser {
            chars: src.chars().collect(),
            pos: 0,
            had_decimals: false,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ParseError::Expected {
                expected: c,
                at: self.pos,
            })
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<SymExpr, ParseError> {
        let mut terms = vec![self.parse_term()?];
        loop {
            self.skip_ws();
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    terms.push(self.parse_term()?);
                }
                Some('-') => {
                    self.pos += 1;
                    terms.push(SymExpr::neg(self.parse_term()?));
                }
                _ => break,
            }
        }
        Ok(SymExpr::add(terms))
    }

    // term := power (('*' | '/') power)*
    fn parse_term(&mut self) -> Result<SymExpr, ParseError> {
        let mut acc = self.parse_power()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('*') if self.peek2() != Some('*') => {
                    self.pos += 1;
                    let rhs = self.parse_power()?;
                    acc = SymExpr::mul(vec![acc, rhs]);
                }
                Some('/') => {
                    self.pos += 1;
                    let rhs = self.parse_power()?;
                    let folded = match (&acc, &rhs) {
                        (SymExpr::Num(a), SymExpr::Num(b)) if !b.is_zero() => a.div(b),
                        _ => None,
                    };
                    acc = match folded {
                        Some(q) => SymExpr::Num(q),
                        None => SymExpr::Div(Box::new(acc), Box::new(rhs)),
                    };
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    // power := unary (('**' | '^') power)?   (right associative)
    fn parse_power(&mut self) -> Result<SymExpr, ParseError> {
        let base = self.parse_unary()?;
        self.skip_ws();
        let has_pow = match self.peek() {
            Some('^') => {
                self.pos += 1;
                true
            }
            Some('*') if self.peek2() == Some('*') => {
                self.pos += 2;
                true
            }
            _ => false,
        };
        if !has_pow {
            return Ok(base);
        }
        let exp = self.parse_power()?;
        Ok(SymExpr::Pow(Box::new(base), Box::new(exp)))
    }

    fn parse_unary(&mut self) -> Result<SymExpr, ParseError> {
        self.skip_ws();
        if self.eat('-') {
            return Ok(SymExpr::neg(self.parse_unary()?));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<SymExpr, ParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(ParseError::UnexpectedEnd),
            Some('(') => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(')')?;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_ident(),
            Some(c) => Err(ParseError::UnexpectedChar(c, self.pos)),
        }
    }

    fn parse_number(&mut self) -> Result<SymExpr, ParseError> {
        let start = self.pos;
        let mut saw_dot = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' && !saw_dot {
                saw_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if saw_dot {
            self.had_decimals = true;
            let v: f64 = text
                .parse()
                .map_err(|_| ParseError::NumberRange(text.clone()))?;
            Ok(SymExpr::Num(Rat::approx_f64(v)))
        } else {
            let v: i64 = text
                .parse()
                .map_err(|_| ParseError::NumberRange(text.clone()))?;
            Ok(SymExpr::int(v))
        }
    }

    fn parse_ident(&mut self) -> Result<SymExpr, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        self.skip_ws();
        if self.peek() != Some('(') {
            return Ok(SymExpr::var(name));
        }
        match name.as_str() {
            "Sum" | "sum" => self.parse_sum(),
            "unknown" => self.parse_unknown(),
            "min" | "Min" => {
                let args = self.parse_args()?;
                two_args(&name, args).map(|(a, b)| SymExpr::min_of(a, b))
            }
            "max" | "Max" => {
                let args = self.parse_args()?;
                two_args(&name, args).map(|(a, b)| SymExpr::max_of(a, b))
            }
            _ => {
                let args = self.parse_args()?;
                Ok(SymExpr::Func(name, args))
            }
        }
    }

    // Sum(body, (var, lo, hi) [, (var, lo, hi)]*)
    fn parse_sum(&mut self) -> Result<SymExpr, ParseError> {
        self.expect('(')?;
        let body = self.parse_expr()?;
        let mut limits = Vec::new();
        while self.eat(',') {
            self.expect('(')?;
            self.skip_ws();
            let var_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                self.pos += 1;
            }
            if self.pos == var_start {
                return Err(ParseError::BadSumLimits(self.pos));
            }
            let var: String = self.chars[var_start..self.pos].iter().collect();
            self.expect(',')?;
            let lo = self.parse_expr()?;
            self.expect(',')?;
            let hi = self.parse_expr()?;
            self.expect(')')?;
            limits.push(SumLimit { var, lo, hi });
        }
        self.expect(')')?;
        if limits.is_empty() {
            return Err(ParseError::BadSumLimits(self.pos));
        }
        Ok(SymExpr::Sum(Box::new(body), limits))
    }

    // unknown(<raw>) - captures the payload verbatim, balancing parentheses.
    fn parse_unknown(&mut self) -> Result<SymExpr, ParseError> {
        self.expect('(')?;
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        let raw: String = self.chars[start..self.pos - 1].iter().collect();
                        return Ok(SymExpr::Unknown(raw.trim().to_string()));
                    }
                }
                _ => {}
            }
        }
        Err(ParseError::UnexpectedEnd)
    }

    fn parse_args(&mut self) -> Result<Vec<SymExpr>, ParseError> {
        self.expect('(')?;
        let mut args = Vec::new();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.eat(',') {
                continue;
            }
            self.expect(')')?;
            return Ok(args);
        }
    }
}

fn two_args(name: &str, args: Vec<SymExpr>) -> Result<(SymExpr, SymExpr), ParseError> {
    if args.len() != 2 {
        return Err(ParseError::BadArity {
            name: name.to_string(),
            expected: 2,
            got: args.len(),
        });
    }
    let mut it = args.into_iter();
    let a = it.next().unwrap();
    let b = it.next().unwrap();
    Ok((a, b))
}
