//! Recursive-descent parser producing an [`Expr`] tree

use super::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::errors::ExprError;
use super::lexer::{Token, TokenKind, tokenize};
use super::value::Value;

/// Maximum nesting of sub-expressions
const MAX_DEPTH: usize = 128;

/// Parse a complete expression
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    let expr = parser.expression()?;
    match parser.peek() {
        TokenKind::Eof => Ok(expr),
        other => Err(ExprError::syntax(
            format!("unexpected {}", other.describe()),
            parser.offset(),
        )),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ExprError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(ExprError::syntax(
                format!("expected {}, found {}", kind.describe(), self.peek().describe()),
                self.offset(),
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ExprError> {
        match self.advance() {
            TokenKind::Ident(name) => Ok(name),
            other => Err(ExprError::syntax(
                format!("expected a property name, found {}", other.describe()),
                self.tokens[self.pos.saturating_sub(1)].offset,
            )),
        }
    }

    fn descend<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExprError>,
    ) -> Result<T, ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Count one more link of a left-associative chain toward the depth limit
    fn link(&mut self, links: &mut usize) -> Result<(), ExprError> {
        *links += 1;
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }

    fn unlink(&mut self, links: usize) {
        self.depth -= links;
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.descend(|p| p.conditional())
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let test = self.coalesce()?;
        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.expression()?;
        self.expect(TokenKind::Colon)?;
        let alternate = self.expression()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    fn coalesce(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.logical_or()?;
        let mut links = 0;
        while self.eat(&TokenKind::QuestionQuestion) {
            let right = self.logical_or()?;
            self.link(&mut links)?;
            left = logical(LogicalOp::Coalesce, left, right);
        }
        self.unlink(links);
        Ok(left)
    }

    fn logical_or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.logical_and()?;
        let mut links = 0;
        while self.eat(&TokenKind::OrOr) {
            let right = self.logical_and()?;
            self.link(&mut links)?;
            left = logical(LogicalOp::Or, left, right);
        }
        self.unlink(links);
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.equality()?;
        let mut links = 0;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.equality()?;
            self.link(&mut links)?;
            left = logical(LogicalOp::And, left, right);
        }
        self.unlink(links);
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.relational()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::EqEq => BinaryOp::Eq,
                TokenKind::NotEq => BinaryOp::NotEq,
                TokenKind::EqEqEq => BinaryOp::StrictEq,
                TokenKind::NotEqEq => BinaryOp::StrictNotEq,
                _ => {
                    self.unlink(links);
                    return Ok(left);
                }
            };
            self.advance();
            let right = self.relational()?;
            self.link(&mut links)?;
            left = binary(op, left, right);
        }
    }

    fn relational(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.additive()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => BinaryOp::Lt,
                TokenKind::Le => BinaryOp::Le,
                TokenKind::Gt => BinaryOp::Gt,
                TokenKind::Ge => BinaryOp::Ge,
                _ => {
                    self.unlink(links);
                    return Ok(left);
                }
            };
            self.advance();
            let right = self.additive()?;
            self.link(&mut links)?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.multiplicative()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => {
                    self.unlink(links);
                    return Ok(left);
                }
            };
            self.advance();
            let right = self.multiplicative()?;
            self.link(&mut links)?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        let mut links = 0;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => {
                    self.unlink(links);
                    return Ok(left);
                }
            };
            self.advance();
            let right = self.unary()?;
            self.link(&mut links)?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.peek() {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            _ => return self.postfix(),
        };
        self.advance();
        let operand = self.descend(|p| p.unary())?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            if !matches!(
                self.peek(),
                TokenKind::Dot | TokenKind::QuestionDot | TokenKind::LBracket | TokenKind::LParen
            ) {
                self.unlink(links);
                return Ok(expr);
            }
            self.link(&mut links)?;
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.expect_ident()?;
                    expr = Expr::Member {
                        object: Box::new(expr),
                        property,
                        optional: false,
                    };
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    if self.eat(&TokenKind::LBracket) {
                        let index = self.expression()?;
                        self.expect(TokenKind::RBracket)?;
                        expr = Expr::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                            optional: true,
                        };
                    } else {
                        let property = self.expect_ident()?;
                        expr = Expr::Member {
                            object: Box::new(expr),
                            property,
                            optional: true,
                        };
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                        optional: false,
                    };
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.list(TokenKind::RParen, |p| p.expression())?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                    };
                }
                _ => {}
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let offset = self.offset();
        match self.peek().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Literal(Value::Number(n)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            TokenKind::Ident(name) => {
                if self.peek_at(1) == &TokenKind::Arrow {
                    self.advance();
                    self.advance();
                    return self.lambda_body(vec![name]);
                }
                self.advance();
                Ok(match name.as_str() {
                    "true" => Expr::Literal(Value::Bool(true)),
                    "false" => Expr::Literal(Value::Bool(false)),
                    "null" => Expr::Literal(Value::Null),
                    "undefined" => Expr::Literal(Value::Undefined),
                    _ => Expr::Ident(name),
                })
            }
            TokenKind::LParen => {
                if let Some((params, consumed)) = self.arrow_params_ahead() {
                    self.pos += consumed;
                    return self.lambda_body(params);
                }
                self.advance();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                let items = self.list(TokenKind::RBracket, |p| p.expression())?;
                Ok(Expr::Array(items))
            }
            TokenKind::LBrace => {
                self.advance();
                let entries = self.list(TokenKind::RBrace, |p| p.object_entry())?;
                Ok(Expr::Object(entries))
            }
            TokenKind::Eof => Err(ExprError::syntax("unexpected end of expression", offset)),
            other => Err(ExprError::syntax(
                format!("unexpected {}", other.describe()),
                offset,
            )),
        }
    }

    fn object_entry(&mut self) -> Result<(String, Expr), ExprError> {
        let offset = self.offset();
        let key = match self.advance() {
            TokenKind::Ident(name) => {
                if !matches!(self.peek(), TokenKind::Colon) {
                    // shorthand `{ name }`
                    return Ok((name.clone(), Expr::Ident(name)));
                }
                name
            }
            TokenKind::Str(s) => s,
            TokenKind::Number(n) => super::value::format_number(n),
            other => {
                return Err(ExprError::syntax(
                    format!("expected an object key, found {}", other.describe()),
                    offset,
                ));
            }
        };
        self.expect(TokenKind::Colon)?;
        let value = self.expression()?;
        Ok((key, value))
    }

    /// Parse comma-separated items up to `close`, allowing a trailing comma
    fn list<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> Result<T, ExprError>,
    ) -> Result<Vec<T>, ExprError> {
        let mut items = Vec::new();
        loop {
            if self.eat(&close) {
                return Ok(items);
            }
            items.push(item(self)?);
            if !self.eat(&TokenKind::Comma) {
                self.expect(close)?;
                return Ok(items);
            }
        }
    }

    /// Detect `(a, b) =>` at the current `(`; returns params and tokens to skip
    fn arrow_params_ahead(&self) -> Option<(Vec<String>, usize)> {
        let mut params = Vec::new();
        let mut i = 1;

        if self.peek_at(i) == &TokenKind::RParen {
            return (self.peek_at(i + 1) == &TokenKind::Arrow).then_some((params, i + 2));
        }

        loop {
            match self.peek_at(i) {
                TokenKind::Ident(name) => params.push(name.clone()),
                _ => return None,
            }
            i += 1;
            match self.peek_at(i) {
                TokenKind::Comma => i += 1,
                TokenKind::RParen => break,
                _ => return None,
            }
        }

        (self.peek_at(i + 1) == &TokenKind::Arrow).then_some((params, i + 2))
    }

    fn lambda_body(&mut self, params: Vec<String>) -> Result<Expr, ExprError> {
        let body = self.expression()?;
        Ok(Expr::Lambda {
            params,
            body: Box::new(body),
        })
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
