// Expression parsing: precedence climbing with backtracking for the two
// ambiguous corners of the grammar (arrow parameter lists vs parenthesized
// expressions, and explicit type arguments vs less-than).

use crate::ParseError;
use lode_ast::*;
use lode_lexer::{unescape_string, Token};

use super::Parser;

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }

        let start = self.cur_start();
        let target = self.parse_logical_or()?;

        let op = match self.peek_opt() {
            Some(Token::Eq) => Some(AssignOp::Assign),
            Some(Token::PlusEq) => Some(AssignOp::Add),
            Some(Token::MinusEq) => Some(AssignOp::Sub),
            Some(Token::StarEq) => Some(AssignOp::Mul),
            Some(Token::SlashEq) => Some(AssignOp::Div),
            Some(Token::PercentEq) => Some(AssignOp::Rem),
            _ => None,
        };

        if let Some(op) = op {
            self.advance();
            let value = self.parse_assignment()?;
            return Ok(Expr::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
                span: self.span_from(start),
            });
        }

        Ok(target)
    }

    fn peek_opt(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|ts| &ts.token)
    }

    // ==================== Arrow functions ====================

    /// `x => e`, `(a: T, b: U) => e`, `(): void => { ... }`,
    /// `async () => e`. Returns `None` (with the cursor restored) when the
    /// lookahead turns out not to be an arrow.
    fn try_parse_arrow(&mut self) -> Result<Option<Expr>, ParseError> {
        let checkpoint = self.current;
        let start = self.cur_start();

        let is_async = self.match_token(&Token::Async);

        // Single-identifier shorthand
        if let Some(Token::Ident(name)) = self.peek_opt() {
            if self.check_next(&Token::FatArrow) {
                let name = name.clone();
                let param_span = self.cur_span();
                self.advance();
                self.advance();
                let body = self.parse_arrow_body()?;
                return Ok(Some(Expr::Arrow {
                    is_async,
                    params: vec![Param {
                        pattern: ParamPattern::Ident(name),
                        ty: None,
                        optional: false,
                        default: None,
                        span: param_span,
                    }],
                    return_type: None,
                    body,
                    span: self.span_from(start),
                }));
            }
        }

        if !self.check(&Token::LParen) {
            self.current = checkpoint;
            return Ok(None);
        }
        self.advance();

        let params = match self.parse_params() {
            Ok(params) => params,
            Err(_) => {
                self.current = checkpoint;
                return Ok(None);
            }
        };
        if !self.match_token(&Token::RParen) {
            self.current = checkpoint;
            return Ok(None);
        }

        let return_type = if self.check(&Token::Colon) {
            self.advance();
            match self.parse_type() {
                Ok(ty) => Some(ty),
                Err(_) => {
                    self.current = checkpoint;
                    return Ok(None);
                }
            }
        } else {
            None
        };

        if !self.match_token(&Token::FatArrow) {
            self.current = checkpoint;
            return Ok(None);
        }

        let body = self.parse_arrow_body()?;
        Ok(Some(Expr::Arrow {
            is_async,
            params,
            return_type,
            body,
            span: self.span_from(start),
        }))
    }

    fn parse_arrow_body(&mut self) -> Result<ArrowBody, ParseError> {
        if self.check(&Token::LBrace) {
            Ok(ArrowBody::Block(self.parse_block()?))
        } else {
            Ok(ArrowBody::Expr(Box::new(self.parse_assignment()?)))
        }
    }

    // ==================== Binary operator levels ====================

    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_logical_and()?;
        while self.match_token(&Token::OrOr) {
            let right = self.parse_logical_and()?;
            left = Expr::Binary {
                op: BinaryOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_bit_or()?;
        while self.match_token(&Token::AndAnd) {
            let right = self.parse_bit_or()?;
            left = Expr::Binary {
                op: BinaryOp::And,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_bit_xor()?;
        while self.match_token(&Token::Pipe) {
            let right = self.parse_bit_xor()?;
            left = Expr::Binary {
                op: BinaryOp::BitOr,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_bit_and()?;
        while self.match_token(&Token::Caret) {
            let right = self.parse_bit_and()?;
            left = Expr::Binary {
                op: BinaryOp::BitXor,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_equality()?;
        while self.match_token(&Token::Ampersand) {
            let right = self.parse_equality()?;
            left = Expr::Binary {
                op: BinaryOp::BitAnd,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek_opt() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::StrictEq) => BinaryOp::StrictEq,
                Some(Token::StrictNotEq) => BinaryOp::StrictNotEq,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    /// Relational operators plus `as` casts, which share this level.
    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_shift()?;
        loop {
            match self.peek_opt() {
                Some(Token::Lt) | Some(Token::LtEq) | Some(Token::Gt) | Some(Token::GtEq) => {
                    let op = match self.peek() {
                        Token::Lt => BinaryOp::Lt,
                        Token::LtEq => BinaryOp::Le,
                        Token::GtEq => BinaryOp::Ge,
                        _ => BinaryOp::Gt,
                    };
                    self.advance();
                    let right = self.parse_shift()?;
                    left = Expr::Binary {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                        span: self.span_from(start),
                    };
                }
                Some(Token::As) => {
                    self.advance();
                    if self.match_token(&Token::Const) {
                        left = Expr::AsConst {
                            expr: Box::new(left),
                            span: self.span_from(start),
                        };
                    } else {
                        let ty = self.parse_type()?;
                        left = Expr::Cast {
                            expr: Box::new(left),
                            ty,
                            span: self.span_from(start),
                        };
                    }
                }
                _ => break,
            }
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_opt() {
                Some(Token::Shl) => BinaryOp::Shl,
                Some(Token::Shr) => BinaryOp::Shr,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_opt() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_opt() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();

        let op = match self.peek_opt() {
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Not) => Some(UnaryOp::Not),
            Some(Token::Void) => Some(UnaryOp::Void),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span: self.span_from(start),
            });
        }

        if self.match_token(&Token::Await) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Await {
                expr: Box::new(operand),
                span: self.span_from(start),
            });
        }

        if self.check(&Token::Increment) || self.check(&Token::Decrement) {
            let increment = self.check(&Token::Increment);
            self.advance();
            let target = self.parse_unary()?;
            return Ok(Expr::Update {
                target: Box::new(target),
                increment,
                prefix: true,
                span: self.span_from(start),
            });
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        let mut expr = self.parse_primary()?;

        loop {
            if self.match_token(&Token::Dot) {
                let property = self.consume_identifier("Expected property name after '.'")?;
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    span: self.span_from(start),
                };
            } else if self.check(&Token::LBracket) {
                self.advance();
                let index = self.parse_expression()?;
                self.consume(&Token::RBracket, "Expected ']' after index")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    span: self.span_from(start),
                };
            } else if self.check(&Token::LParen) {
                let args = self.parse_args()?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    type_args: Vec::new(),
                    args,
                    span: self.span_from(start),
                };
            } else if self.check(&Token::Lt) {
                // `f<T, U>(args)` vs `a < b`: try type arguments, restore
                // on failure and leave the `<` for the relational level.
                let checkpoint = self.current;
                match self.parse_type_args() {
                    Ok(type_args) if self.check(&Token::LParen) => {
                        let args = self.parse_args()?;
                        expr = Expr::Call {
                            callee: Box::new(expr),
                            type_args,
                            args,
                            span: self.span_from(start),
                        };
                    }
                    _ => {
                        self.current = checkpoint;
                        break;
                    }
                }
            } else if self.check(&Token::Increment) || self.check(&Token::Decrement) {
                let increment = self.check(&Token::Increment);
                self.advance();
                expr = Expr::Update {
                    target: Box::new(expr),
                    increment,
                    prefix: false,
                    span: self.span_from(start),
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.consume(&Token::LParen, "Expected '('")?;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) && !self.is_at_end() {
            args.push(self.parse_expression()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.consume(&Token::RParen, "Expected ')' after arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();

        let token = match self.peek_opt() {
            Some(token) => token.clone(),
            None => return Err(self.error("Unexpected end of input in expression")),
        };

        match token {
            Token::IntLiteral(raw) | Token::FloatLiteral(raw) | Token::HexLiteral(raw) => {
                self.advance();
                Ok(Expr::NumberLit {
                    raw,
                    span: self.span_from(start),
                })
            }
            Token::StringLiteral(value) | Token::SingleQuoteString(value) => {
                self.advance();
                Ok(Expr::StringLit {
                    value,
                    span: self.span_from(start),
                })
            }
            Token::TemplateLiteral(raw) => {
                let token_span = self.tokens[self.current].span.clone();
                self.advance();
                self.parse_template(&raw, token_span.start, self.span_from(start))
            }
            Token::True => {
                self.advance();
                Ok(Expr::BoolLit {
                    value: true,
                    span: self.span_from(start),
                })
            }
            Token::False => {
                self.advance();
                Ok(Expr::BoolLit {
                    value: false,
                    span: self.span_from(start),
                })
            }
            Token::Null => {
                self.advance();
                Ok(Expr::NullLit {
                    span: self.span_from(start),
                })
            }
            Token::Undefined => {
                self.advance();
                Ok(Expr::UndefinedLit {
                    span: self.span_from(start),
                })
            }
            Token::This => {
                self.advance();
                Ok(Expr::This {
                    span: self.span_from(start),
                })
            }
            Token::New => {
                self.advance();
                let callee = self.consume_identifier("Expected class name after 'new'")?;
                let args = self.parse_args()?;
                Ok(Expr::New {
                    callee,
                    args,
                    span: self.span_from(start),
                })
            }
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Ident {
                    name,
                    span: self.span_from(start),
                })
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(&Token::RParen, "Expected ')' after expression")?;
                Ok(Expr::Paren {
                    expr: Box::new(inner),
                    span: self.span_from(start),
                })
            }
            Token::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(&Token::RBracket) && !self.is_at_end() {
                    elements.push(self.parse_expression()?);
                    if !self.match_token(&Token::Comma) {
                        break;
                    }
                }
                self.consume(&Token::RBracket, "Expected ']' after array literal")?;
                Ok(Expr::ArrayLit {
                    elements,
                    span: self.span_from(start),
                })
            }
            Token::LBrace => self.parse_object_literal(),
            _ => Err(self.error("Expected an expression")),
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::LBrace, "Expected '{'")?;

        let mut fields = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let field_start = self.cur_start();
            if self.check(&Token::DotDotDot) {
                return Err(self.error("Spread fields are not supported"));
            }
            let name = match self.peek().clone() {
                Token::StringLiteral(s) | Token::SingleQuoteString(s) => {
                    self.advance();
                    s
                }
                _ => self.consume_identifier("Expected field name in object literal")?,
            };

            let value = if self.match_token(&Token::Colon) {
                self.parse_expression()?
            } else {
                // Shorthand `{ x }`
                Expr::Ident {
                    name: name.clone(),
                    span: self.span_from(field_start),
                }
            };

            fields.push(ObjectLitField {
                name,
                value,
                span: self.span_from(field_start),
            });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RBrace, "Expected '}' after object literal")?;
        Ok(Expr::ObjectLit {
            fields,
            span: self.span_from(start),
        })
    }

    // ==================== Template literals ====================

    /// Split a raw template body on `${ ... }` interpolations and re-parse
    /// each embedded expression with its real byte offset, so spans inside
    /// templates still point into the source file.
    fn parse_template(
        &self,
        raw: &str,
        token_start: usize,
        span: lode_diagnostics::Span,
    ) -> Result<Expr, ParseError> {
        let base = token_start + 1; // skip the opening backtick
        let mut parts = Vec::new();
        let mut text_start = 0usize;
        let mut i = 0usize;
        let bytes = raw.as_bytes();

        while i < raw.len() {
            if bytes[i] == b'\\' {
                i += 2;
                continue;
            }
            if bytes[i] == b'$' && i + 1 < raw.len() && bytes[i + 1] == b'{' {
                if text_start < i {
                    parts.push(TemplatePart::Text(unescape_string(&raw[text_start..i])));
                }
                let inner_start = i + 2;
                let mut depth = 1usize;
                let mut j = inner_start;
                while j < raw.len() && depth > 0 {
                    match bytes[j] {
                        b'{' => depth += 1,
                        b'}' => depth -= 1,
                        _ => {}
                    }
                    j += 1;
                }
                if depth > 0 {
                    return Err(ParseError::SyntaxError {
                        start: base + i,
                        end: base + raw.len(),
                        message: "Unterminated template interpolation".to_string(),
                    });
                }
                let inner_end = j - 1;
                let fragment = &raw[inner_start..inner_end];
                let mut sub =
                    Parser::fragment(&self.file, fragment, base + inner_start)?;
                let expr = sub.parse_expression()?;
                if !sub.is_at_end() {
                    return Err(sub.error("Unexpected token in template interpolation"));
                }
                parts.push(TemplatePart::Expr(expr));
                i = j;
                text_start = i;
            } else {
                i += 1;
            }
        }

        if text_start < raw.len() {
            parts.push(TemplatePart::Text(unescape_string(&raw[text_start..])));
        }

        Ok(Expr::TemplateLit { parts, span })
    }
}
