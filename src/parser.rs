use crate::ast::*;
use crate::lexer::{tokenize, Span, Token, TokenKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unexpected token: expected {expected}, found {found} at {span:?}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Invalid expression at {0:?}")]
    InvalidExpression(Span),
    #[error("Unknown query method '{name}' at {span:?}")]
    UnknownMethod { name: String, span: Span },
    #[error("Method '{method}' takes {expected} argument(s), found {found} at {span:?}")]
    WrongArgumentCount {
        method: String,
        expected: usize,
        found: usize,
        span: Span,
    },
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a query expression such as
/// `Outer.join(Inner, o => o.Id, i => i.OuterId, (o, i) => new { i.Val })`.
///
/// Identifiers that are not lambda parameters in scope name entity tables.
pub fn parse_query(source: &str) -> ParseResult<Expr> {
    Parser::new(source).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Lambda parameters in scope, innermost last
    parameters: Vec<String>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            tokens: tokenize(source),
            pos: 0,
            parameters: Vec::new(),
        }
    }

    /// Parse a complete expression
    pub fn parse(&mut self) -> ParseResult<Expr> {
        let expr = self.parse_expression()?;
        if !self.is_at_end() {
            return Err(self.unexpected("end of input"));
        }
        Ok(expr)
    }

    // ==================== Helper Methods ====================

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind_at(&self, offset: usize) -> &TokenKind {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].kind
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn consume(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.is_at_end() {
            return ParseError::UnexpectedEof;
        }
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found: self.current().kind.to_string(),
            span: self.current().span,
        }
    }

    fn consume_identifier(&mut self, expected: &str) -> ParseResult<String> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    /// Parse `item (, item)*` up to and including `close`
    fn parse_list<T>(
        &mut self,
        close: &TokenKind,
        expected: &str,
        mut item: impl FnMut(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<Vec<T>> {
        let mut items = Vec::new();
        if self.match_token(close) {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if self.match_token(&TokenKind::Comma) {
                continue;
            }
            self.consume(close, expected)?;
            return Ok(items);
        }
    }

    // ==================== Expressions ====================

    fn parse_expression(&mut self) -> ParseResult<Expr> {
        if let Some(parameters) = self.lambda_parameters()? {
            return self.parse_lambda_body(parameters);
        }
        self.parse_or()
    }

    /// Consume the parameter list of a lambda if one starts here
    fn lambda_parameters(&mut self) -> ParseResult<Option<Vec<String>>> {
        if let (TokenKind::Identifier(name), TokenKind::Arrow) = (self.kind_at(0), self.kind_at(1)) {
            let name = name.clone();
            self.pos += 2;
            return Ok(Some(vec![name]));
        }
        if !self.check(&TokenKind::LParen) || !self.is_parenthesized_lambda() {
            return Ok(None);
        }
        self.advance();
        let parameters = self.parse_list(&TokenKind::RParen, ")", |p| {
            p.consume_identifier("lambda parameter")
        })?;
        self.consume(&TokenKind::Arrow, "=>")?;
        Ok(Some(parameters))
    }

    /// Whether the `(` at the current position opens `(a, b) =>`
    fn is_parenthesized_lambda(&self) -> bool {
        let mut offset = 1;
        if matches!(self.kind_at(offset), TokenKind::RParen) {
            return matches!(self.kind_at(offset + 1), TokenKind::Arrow);
        }
        loop {
            if !matches!(self.kind_at(offset), TokenKind::Identifier(_)) {
                return false;
            }
            offset += 1;
            match self.kind_at(offset) {
                TokenKind::Comma => offset += 1,
                TokenKind::RParen => return matches!(self.kind_at(offset + 1), TokenKind::Arrow),
                _ => return false,
            }
        }
    }

    fn parse_lambda_body(&mut self, parameters: Vec<String>) -> ParseResult<Expr> {
        let scope_len = self.parameters.len();
        self.parameters.extend(parameters.iter().cloned());
        let body = self.parse_expression();
        self.parameters.truncate(scope_len);
        Ok(Expr::lambda(parameters, body?))
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_and()?;
        while self.match_token(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Expr::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.match_token(&TokenKind::And) {
            let right = self.parse_comparison()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let left = self.parse_postfix()?;
        let op = match self.current().kind {
            TokenKind::EqEq => BinaryOp::Equal,
            TokenKind::NotEq => BinaryOp::NotEqual,
            TokenKind::Lt => BinaryOp::LessThan,
            TokenKind::LtEq => BinaryOp::LessOrEqual,
            TokenKind::Gt => BinaryOp::GreaterThan,
            TokenKind::GtEq => BinaryOp::GreaterOrEqual,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_postfix()?;
        Ok(Expr::binary(op, left, right))
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.match_token(&TokenKind::Dot) {
                let span = self.current().span;
                let name = self.consume_identifier("member name")?;
                if self.match_token(&TokenKind::LParen) {
                    let arguments =
                        self.parse_list(&TokenKind::RParen, ")", |p| p.parse_expression())?;
                    expr = self.method_call(expr, &name, arguments, span)?;
                } else {
                    expr = Expr::member(expr, name);
                }
            } else if self.match_token(&TokenKind::As) {
                let type_name = self.consume_identifier("type name")?;
                expr = Expr::convert(expr, type_name);
            } else {
                return Ok(expr);
            }
        }
    }

    fn method_call(
        &self,
        receiver: Expr,
        name: &str,
        arguments: Vec<Expr>,
        span: Span,
    ) -> ParseResult<Expr> {
        let expected = match name {
            "join" | "group_join" => 4,
            "where" | "select" => 1,
            "count" => 0,
            _ => {
                return Err(ParseError::UnknownMethod {
                    name: name.to_string(),
                    span,
                })
            }
        };
        if arguments.len() != expected {
            return Err(ParseError::WrongArgumentCount {
                method: name.to_string(),
                expected,
                found: arguments.len(),
                span,
            });
        }

        let mut args = arguments.into_iter();
        let mut next = || args.next().ok_or(ParseError::InvalidExpression(span));
        Ok(match name {
            "join" => Expr::join(receiver, next()?, next()?, next()?, next()?),
            "group_join" => Expr::group_join(receiver, next()?, next()?, next()?, next()?),
            "where" => Expr::filter(receiver, next()?),
            "select" => Expr::select(receiver, next()?),
            _ => Expr::count(receiver),
        })
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::IntegerLiteral(n) => {
                self.advance();
                Ok(Expr::constant(Value::Int(n)))
            }
            TokenKind::DoubleLiteral(n) => {
                self.advance();
                Ok(Expr::constant(Value::Double(n)))
            }
            TokenKind::StringLiteral(s) => {
                self.advance();
                Ok(Expr::constant(Value::Text(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::constant(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::constant(Value::Bool(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::constant(Value::Null))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.parameters.iter().any(|p| p == &name) {
                    Ok(Expr::param(name))
                } else {
                    Ok(Expr::table(name))
                }
            }
            TokenKind::LParen => {
                self.advance();
                let mut items = self.parse_list(&TokenKind::RParen, ")", |p| p.parse_expression())?;
                match items.len() {
                    0 => Err(ParseError::InvalidExpression(token.span)),
                    1 => Ok(items.remove(0)),
                    _ => Ok(Expr::tuple(items)),
                }
            }
            TokenKind::New => {
                self.advance();
                self.parse_new(token.span)
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// Parse what follows `new`
    fn parse_new(&mut self, start: Span) -> ParseResult<Expr> {
        if self.match_token(&TokenKind::LBrace) {
            let members = self.parse_list(&TokenKind::RBrace, "}", |p| p.parse_anonymous_member())?;
            return Ok(Expr::anonymous(members));
        }

        let type_name = self.consume_identifier("type name or {")?;
        let arguments = if self.match_token(&TokenKind::LParen) {
            self.parse_list(&TokenKind::RParen, ")", |p| p.parse_expression())?
        } else {
            Vec::new()
        };

        if self.match_token(&TokenKind::LBrace) {
            let bindings = self.parse_list(&TokenKind::RBrace, "}", |p| p.parse_binding())?;
            return Ok(Expr::member_init(type_name, arguments, bindings));
        }
        if arguments.is_empty() && !matches!(self.tokens[self.pos - 1].kind, TokenKind::RParen) {
            return Err(ParseError::InvalidExpression(start.merge(self.current().span)));
        }
        Ok(Expr::construct(type_name, arguments))
    }

    /// `Name = expr`, or a member chain whose last member names the member
    fn parse_anonymous_member(&mut self) -> ParseResult<(String, Expr)> {
        if let (TokenKind::Identifier(name), TokenKind::Eq) = (self.kind_at(0), self.kind_at(1)) {
            let name = name.clone();
            self.pos += 2;
            return Ok((name, self.parse_expression()?));
        }
        let span = self.current().span;
        let expr = self.parse_expression()?;
        let name = match expr.unwrap() {
            Expr::Member { member, .. } => member.clone(),
            Expr::Parameter(name) => name.clone(),
            _ => return Err(ParseError::InvalidExpression(span)),
        };
        Ok((name, expr))
    }

    fn parse_binding(&mut self) -> ParseResult<MemberBinding> {
        let member = self.consume_identifier("member name")?;
        self.consume(&TokenKind::Eq, "=")?;
        if self.match_token(&TokenKind::LBrace) {
            let bindings = self.parse_list(&TokenKind::RBrace, "}", |p| p.parse_binding())?;
            return Ok(MemberBinding::Nested { member, bindings });
        }
        if self.match_token(&TokenKind::LBracket) {
            let items = self.parse_list(&TokenKind::RBracket, "]", |p| p.parse_expression())?;
            return Ok(MemberBinding::List { member, items });
        }
        Ok(MemberBinding::assign(member, self.parse_expression()?))
    }
}
