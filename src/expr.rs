//! Arithmetic expressions for widget geometry.
//!
//! Widget positions and sizes may be written relative to the canvas, e.g.
//! `"w / 2 - 10"`. Supported: numbers, named variables, `+ - * / //`,
//! unary minus and parentheses. The parser is hand-written and evaluates as
//! it goes.

use std::collections::HashMap;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub struct ExprError {
    pub message: String,
    pub col: usize,
}

type Result<T> = std::result::Result<T, ExprError>;

struct Parser<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    vars: &'a HashMap<&'a str, f64>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, vars: &'a HashMap<&'a str, f64>) -> Self {
        Self { input, chars: input.char_indices().peekable(), vars }
    }

    fn error<T>(&mut self, message: impl Into<String>) -> Result<T> {
        let col = self.chars.peek().map(|(i, _)| *i).unwrap_or(self.input.len()) + 1;
        Err(ExprError { message: message.into(), col })
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().map(|(_, c)| *c)
    }

    fn parse(mut self) -> Result<f64> {
        let value = self.parse_sum()?;
        if let Some(c) = self.peek() {
            return self.error(format!("unexpected character '{}'", c));
        }
        Ok(value)
    }

    fn parse_sum(&mut self) -> Result<f64> {
        let mut value = self.parse_product()?;
        loop {
            match self.peek() {
                Some('+') => {
                    self.chars.next();
                    value += self.parse_product()?;
                }
                Some('-') => {
                    self.chars.next();
                    value -= self.parse_product()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_product(&mut self) -> Result<f64> {
        let mut value = self.parse_unary()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.chars.next();
                    value *= self.parse_unary()?;
                }
                Some('/') => {
                    self.chars.next();
                    let floor = matches!(self.chars.peek(), Some((_, '/')));
                    if floor {
                        self.chars.next();
                    }
                    let rhs = self.parse_unary()?;
                    if rhs == 0.0 {
                        return self.error("division by zero");
                    }
                    value = if floor { (value / rhs).floor() } else { value / rhs };
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some('-') => {
                self.chars.next();
                Ok(-self.parse_unary()?)
            }
            Some('+') => {
                self.chars.next();
                self.parse_unary()
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_atom(&mut self) -> Result<f64> {
        match self.peek() {
            Some('(') => {
                self.chars.next();
                let value = self.parse_sum()?;
                if self.peek() != Some(')') {
                    return self.error("expected ')'");
                }
                self.chars.next();
                Ok(value)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_variable(),
            Some(c) => self.error(format!("unexpected character '{}'", c)),
            None => self.error("unexpected end of expression"),
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.chars.peek().map(|(i, _)| *i).unwrap_or(self.input.len());
        let mut end = start;
        while let Some(&(i, c)) = self.chars.peek() {
            if !pred(c) {
                break;
            }
            end = i + c.len_utf8();
            self.chars.next();
        }
        &self.input[start..end]
    }

    fn parse_number(&mut self) -> Result<f64> {
        let text = self.take_while(|c| c.is_ascii_digit() || c == '.');
        match text.parse() {
            Ok(n) => Ok(n),
            Err(_) => self.error(format!("invalid number '{}'", text)),
        }
    }

    fn parse_variable(&mut self) -> Result<f64> {
        let name = self.take_while(|c| c.is_alphanumeric() || c == '_');
        match self.vars.get(name) {
            Some(v) => Ok(*v),
            None => self.error(format!("unknown variable '{}'", name)),
        }
    }
}

/// Evaluate `expr` with the given variables in scope.
pub fn eval(expr: &str, vars: &HashMap<&str, f64>) -> Result<f64> {
    Parser::new(expr, vars).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> HashMap<&'static str, f64> {
        HashMap::from([("w", 1080.0), ("h", 720.0)])
    }

    #[test]
    fn test_arithmetic() {
        let vars = canvas();
        assert_eq!(eval("0", &vars).unwrap(), 0.0);
        assert_eq!(eval("w/2", &vars).unwrap(), 540.0);
        assert_eq!(eval(" w / 2 - 10 ", &vars).unwrap(), 530.0);
        assert_eq!(eval("(w - 20) * 0.5", &vars).unwrap(), 530.0);
        assert_eq!(eval("h // 7", &vars).unwrap(), 102.0);
        assert_eq!(eval("-h + 2 * 3", &vars).unwrap(), -714.0);
        assert_eq!(eval("w*h/w", &vars).unwrap(), 720.0);
    }

    #[test]
    fn test_errors_report_column() {
        let vars = canvas();
        let err = eval("w + q", &vars).unwrap_err();
        assert!(err.message.contains("unknown variable"));

        let err = eval("w +", &vars).unwrap_err();
        assert_eq!(err.col, 4);

        assert!(eval("(w", &vars).is_err());
        assert!(eval("w 2", &vars).is_err());
        assert!(eval("1..2", &vars).is_err());
        assert!(eval("w / 0", &vars).is_err());
        assert!(eval("", &vars).is_err());
    }
}
