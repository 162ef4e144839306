//! Placeholder expression evaluator
//!
//! Templates may embed small arithmetic expressions over bound parameters,
//! e.g. `{{ uk_years + 1 }}`. The grammar is deliberately tiny — identifier,
//! numeric literal, the four arithmetic operators, and parentheses — so no
//! general code evaluation facility is ever involved:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := NUMBER | IDENT | '(' expr ')'
//! ```

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ExpressionError;

/// Parameter bindings available to an expression
pub type Bindings = HashMap<String, Value>;

/// Result of evaluating a placeholder expression
#[derive(Debug, Clone, PartialEq)]
pub enum ExprValue {
    Number(f64),
    Text(String),
}

impl ExprValue {
    pub fn into_json(self) -> Value {
        match self {
            ExprValue::Number(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ExprValue::Text(s) => Value::String(s),
        }
    }

    pub fn render(&self) -> String {
        match self {
            // Integral results render without a trailing ".0"
            ExprValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            ExprValue::Number(n) => format!("{}", n),
            ExprValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExpressionError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        literal.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| ExpressionError::UnexpectedToken(literal.clone()))?;
                tokens.push(Token::Number(number));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(ExpressionError::UnexpectedToken(other.to_string())),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    bindings: &'a Bindings,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.next();
                    value += self.term()?;
                }
                Token::Minus => {
                    self.next();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, ExpressionError> {
        let mut value = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.next();
                    value *= self.factor()?;
                }
                Token::Slash => {
                    self.next();
                    let divisor = self.factor()?;
                    if divisor == 0.0 {
                        return Err(ExpressionError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<f64, ExpressionError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Ident(name)) => self.lookup_number(&name),
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::LParen) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(ExpressionError::UnexpectedToken(")".into())),
                }
            }
            Some(token) => Err(ExpressionError::UnexpectedToken(format!("{:?}", token))),
            None => Err(ExpressionError::UnexpectedToken("end of input".into())),
        }
    }

    fn lookup_number(&self, name: &str) -> Result<f64, ExpressionError> {
        match self.bindings.get(name) {
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| ExpressionError::NonNumericOperand(name.to_string())),
            Some(_) => Err(ExpressionError::NonNumericOperand(name.to_string())),
            None => Err(ExpressionError::UnknownIdentifier(name.to_string())),
        }
    }
}

/// Evaluate a placeholder expression against the given bindings
///
/// A bare identifier bound to a string evaluates to that string; everything
/// else must reduce to a number. Pure function, no side effects.
pub fn evaluate(input: &str, bindings: &Bindings) -> Result<ExprValue, ExpressionError> {
    let tokens = tokenize(input.trim())?;

    // A lone identifier may carry a string binding straight through
    if let [Token::Ident(name)] = tokens.as_slice() {
        match bindings.get(name) {
            Some(Value::String(s)) => return Ok(ExprValue::Text(s.clone())),
            Some(Value::Number(_)) => {}
            Some(_) => return Err(ExpressionError::NonNumericOperand(name.clone())),
            None => return Err(ExpressionError::UnknownIdentifier(name.clone())),
        }
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        bindings,
    };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        let rest: Vec<String> = parser.tokens[parser.pos..]
            .iter()
            .map(|t| format!("{:?}", t))
            .collect();
        return Err(ExpressionError::TrailingInput(rest.join(" ")));
    }
    Ok(ExprValue::Number(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    fn bindings() -> Bindings {
        let mut b = Bindings::new();
        b.insert("uk_years".into(), json!(3));
        b.insert("multiplier".into(), json!(1.2));
        b.insert("market".into(), json!("seattle"));
        b
    }

    fn eval_num(input: &str) -> f64 {
        match evaluate(input, &bindings()).unwrap() {
            ExprValue::Number(n) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_identifier_plus_literal() {
        assert_relative_eq!(eval_num("uk_years + 1"), 4.0);
    }

    #[test]
    fn test_operator_precedence() {
        assert_relative_eq!(eval_num("uk_years + 2 * 3"), 9.0);
        assert_relative_eq!(eval_num("(uk_years + 2) * 3"), 15.0);
    }

    #[test]
    fn test_left_to_right_same_precedence() {
        assert_relative_eq!(eval_num("10 - 4 - 3"), 3.0);
        assert_relative_eq!(eval_num("12 / 3 / 2"), 2.0);
    }

    #[test]
    fn test_decimal_and_multiplication() {
        assert_relative_eq!(eval_num("multiplier * 100"), 120.0, epsilon = 1e-9);
    }

    #[test]
    fn test_string_binding_passthrough() {
        let value = evaluate("market", &bindings()).unwrap();
        assert_eq!(value, ExprValue::Text("seattle".into()));
    }

    #[test]
    fn test_string_in_arithmetic_rejected() {
        let err = evaluate("market + 1", &bindings()).unwrap_err();
        assert_eq!(err, ExpressionError::NonNumericOperand("market".into()));
    }

    #[test]
    fn test_unknown_identifier() {
        let err = evaluate("years + 1", &bindings()).unwrap_err();
        assert_eq!(err, ExpressionError::UnknownIdentifier("years".into()));
    }

    #[test]
    fn test_unsupported_operator() {
        assert!(evaluate("uk_years % 2", &bindings()).is_err());
    }

    #[test]
    fn test_division_by_zero() {
        let err = evaluate("1 / 0", &bindings()).unwrap_err();
        assert_eq!(err, ExpressionError::DivisionByZero);
    }

    #[test]
    fn test_render_integral() {
        assert_eq!(ExprValue::Number(4.0).render(), "4");
        assert_eq!(ExprValue::Number(4.5).render(), "4.5");
    }
}
