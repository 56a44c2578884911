//! Arithmetic-only expression evaluator for the calculate action.
//!
//! Accepts decimal literals (optional fraction and exponent), `+ - * /`,
//! unary sign and parentheses. Nothing else is recognised, so identifiers,
//! calls, strings and attribute access all fail at the tokenizer.

/// Maximum parenthesis / unary nesting.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },
    #[error("unexpected token '{token}' at position {pos}")]
    UnexpectedToken { token: String, pos: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NonFinite,
    #[error("expression nested too deeply")]
    TooDeep,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

impl Token {
    fn text(&self) -> String {
        match self {
            Token::Num(n) => n.to_string(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
        }
    }
}

/// Evaluate `input` to a finite `f64`.
pub fn evaluate(input: &str) -> Result<f64, ExprError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens: &tokens, pos: 0, depth: 0 };
    let value = parser.expr()?;
    if let Some((token, pos)) = parser.peek() {
        return Err(ExprError::UnexpectedToken { token: token.text(), pos });
    }
    if !value.is_finite() {
        return Err(ExprError::NonFinite);
    }
    Ok(value)
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                i = scan_number(&chars, i);
                let literal: String = chars[start..i].iter().collect();
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(literal.clone()))?;
                // "1e400" parses to infinity
                if !n.is_finite() {
                    return Err(ExprError::InvalidNumber(literal));
                }
                tokens.push((Token::Num(n), start));
                continue;
            }
            ch => return Err(ExprError::UnexpectedChar { ch, pos: i }),
        };
        tokens.push((token, i));
        i += 1;
    }
    Ok(tokens)
}

/// Index just past a numeric literal starting at `i`.
fn scan_number(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    i
}

struct Parser<'a> {
    tokens: &'a [(Token, usize)],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<(Token, usize)> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, ExprError> {
        let mut acc = self.term()?;
        while let Some((op @ (Token::Plus | Token::Minus), _)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            acc = if op == Token::Plus { acc + rhs } else { acc - rhs };
        }
        Ok(acc)
    }

    // term := unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, ExprError> {
        let mut acc = self.unary()?;
        while let Some((op @ (Token::Star | Token::Slash), _)) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            acc = if op == Token::Star {
                acc * rhs
            } else if rhs == 0.0 {
                return Err(ExprError::DivisionByZero);
            } else {
                acc / rhs
            };
        }
        Ok(acc)
    }

    // unary := ('+' | '-') unary | primary
    fn unary(&mut self) -> Result<f64, ExprError> {
        match self.peek() {
            Some((Token::Minus, _)) => {
                self.pos += 1;
                self.descend()?;
                let v = self.unary()?;
                self.depth -= 1;
                Ok(-v)
            }
            Some((Token::Plus, _)) => {
                self.pos += 1;
                self.descend()?;
                let v = self.unary()?;
                self.depth -= 1;
                Ok(v)
            }
            _ => self.primary(),
        }
    }

    // primary := number | '(' expr ')'
    fn primary(&mut self) -> Result<f64, ExprError> {
        match self.next() {
            Some((Token::Num(n), _)) => Ok(n),
            Some((Token::LParen, _)) => {
                self.descend()?;
                let v = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some((Token::RParen, _)) => Ok(v),
                    Some((t, pos)) => Err(ExprError::UnexpectedToken { token: t.text(), pos }),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some((t, pos)) => Err(ExprError::UnexpectedToken { token: t.text(), pos }),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_arithmetic() {
        assert_eq!(evaluate("2+2"), Ok(4.0));
        assert_eq!(evaluate(" 7 - 10 "), Ok(-3.0));
        assert_eq!(evaluate("6 / 4"), Ok(1.5));
        assert_eq!(evaluate("1.5e2"), Ok(150.0));
        assert_eq!(evaluate(".5 * 4"), Ok(2.0));
    }

    #[test]
    fn precedence_and_parentheses() {
        assert_eq!(evaluate("2 + 3 * 4"), Ok(14.0));
        assert_eq!(evaluate("(2 + 3) * 4"), Ok(20.0));
        assert_eq!(evaluate("10 - 4 - 3"), Ok(3.0));
        assert_eq!(evaluate("8 / 4 / 2"), Ok(1.0));
    }

    #[test]
    fn unary_signs() {
        assert_eq!(evaluate("-3 * -2"), Ok(6.0));
        assert_eq!(evaluate("+4"), Ok(4.0));
        assert_eq!(evaluate("-(1 + 1)"), Ok(-2.0));
    }

    #[test]
    fn rejects_code() {
        assert_eq!(
            evaluate("__import__('os')"),
            Err(ExprError::UnexpectedChar { ch: '_', pos: 0 })
        );
        assert!(matches!(evaluate("2 ** 3"), Err(ExprError::UnexpectedToken { .. })));
        assert!(matches!(evaluate("abs(-1)"), Err(ExprError::UnexpectedChar { ch: 'a', .. })));
    }

    #[test]
    fn malformed_inputs() {
        assert_eq!(evaluate(""), Err(ExprError::UnexpectedEnd));
        assert_eq!(evaluate("(1 + 2"), Err(ExprError::UnexpectedEnd));
        assert!(matches!(evaluate("1 + 2)"), Err(ExprError::UnexpectedToken { pos: 5, .. })));
        assert!(matches!(evaluate("1.2.3"), Err(ExprError::InvalidNumber(_))));
        assert!(matches!(evaluate("4 4"), Err(ExprError::UnexpectedToken { .. })));
    }

    #[test]
    fn numeric_failures() {
        assert_eq!(evaluate("1 / 0"), Err(ExprError::DivisionByZero));
        assert_eq!(evaluate("1e308 * 10"), Err(ExprError::NonFinite));
    }

    #[test]
    fn overflowing_literals_are_rejected() {
        assert_eq!(evaluate("1/1e400"), Err(ExprError::InvalidNumber("1e400".into())));
        assert_eq!(evaluate("-1e309 + 1"), Err(ExprError::InvalidNumber("1e309".into())));
        assert_eq!(evaluate("1e308 / 1e308"), Ok(1.0));
    }

    #[test]
    fn nesting_is_bounded() {
        let deep = format!("{}1{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert_eq!(evaluate(&deep), Err(ExprError::TooDeep));
        let ok = format!("{}1{}", "(".repeat(10), ")".repeat(10));
        assert_eq!(evaluate(&ok), Ok(1.0));
    }
}
