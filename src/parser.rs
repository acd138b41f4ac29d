//! Reader for index polynomial text
//!
//! Parses expressions like:
//! - `i`
//! - `2*i + j - 1`
//! - `(x + k)/2`
//! - `-i + 4`
//!
//! Products are only accepted when one side is constant, and division only
//! by a nonzero constant, so every result stays linear.

use crate::error::{CompileError, CompileResult};
use crate::lexer::{Lexer, Token};
use crate::poly::{Polynomial, Rational};

/// Parse a complete polynomial, rejecting trailing input
pub fn parse_polynomial(source: &str) -> CompileResult<Polynomial> {
    let mut parser = Parser::new(source)?;
    let poly = parser.parse_expr()?;
    match &parser.current {
        None => Ok(poly),
        Some(tok) => Err(CompileError::syntax(
            parser.position,
            format!("unexpected trailing token '{}'", tok),
        )),
    }
}

/// Recursive-descent parser over the polynomial token stream
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    current: Option<Token>,
    position: usize,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> CompileResult<Self> {
        let mut parser = Self {
            lexer: Lexer::new(source),
            current: None,
            position: 0,
        };
        parser.advance()?;
        Ok(parser)
    }

    /// Advance to the next token, returning the previous one
    fn advance(&mut self) -> CompileResult<Option<Token>> {
        let next = match self.lexer.next() {
            Some(Ok(tok)) => Some(tok),
            Some(Err(slice)) => {
                return Err(CompileError::syntax(
                    self.lexer.position(),
                    format!("unexpected character '{}'", slice),
                ))
            }
            None => None,
        };
        self.position = self.lexer.position();
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn check(&self, expected: &Token) -> bool {
        self.current.as_ref() == Some(expected)
    }

    fn expect(&mut self, expected: Token) -> CompileResult<()> {
        if self.check(&expected) {
            self.advance()?;
            Ok(())
        } else {
            Err(CompileError::syntax(
                self.position,
                format!("expected '{}', got {:?}", expected, self.current),
            ))
        }
    }

    /// Parse additive expressions: a + b, a - b
    pub fn parse_expr(&mut self) -> CompileResult<Polynomial> {
        let mut left = self.parse_term()?;
        loop {
            if self.check(&Token::Plus) {
                self.advance()?;
                left += self.parse_term()?;
            } else if self.check(&Token::Minus) {
                self.advance()?;
                left -= self.parse_term()?;
            } else {
                return Ok(left);
            }
        }
    }

    /// Parse multiplicative expressions: a * b, a / b
    fn parse_term(&mut self) -> CompileResult<Polynomial> {
        let mut left = self.parse_unary()?;
        loop {
            if self.check(&Token::Star) {
                let position = self.position;
                self.advance()?;
                let right = self.parse_unary()?;
                left = if right.is_constant() {
                    left * right.constant()
                } else if left.is_constant() {
                    right * left.constant()
                } else {
                    return Err(CompileError::syntax(position, "product of two indices is not linear"));
                };
            } else if self.check(&Token::Slash) {
                let position = self.position;
                self.advance()?;
                let right = self.parse_unary()?;
                if !right.is_constant() || right.constant().is_zero() {
                    return Err(CompileError::syntax(position, "divisor must be a nonzero constant"));
                }
                left = left * (Rational::ONE / right.constant());
            } else {
                return Ok(left);
            }
        }
    }

    fn parse_unary(&mut self) -> CompileResult<Polynomial> {
        if self.check(&Token::Minus) {
            self.advance()?;
            Ok(-self.parse_unary()?)
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> CompileResult<Polynomial> {
        match self.advance()? {
            Some(Token::Number(n)) => Ok(Polynomial::constant_of(n)),
            Some(Token::Ident(name)) => Ok(Polynomial::var(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            None => Err(CompileError::syntax(self.position, "unexpected end of input")),
            Some(other) => Err(CompileError::syntax(
                self.position,
                format!("unexpected token '{}'", other),
            )),
        }
    }
}
