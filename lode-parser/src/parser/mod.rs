// Modular parser for the Lode source subset
// This module organizes the parser into logical components

use crate::ParseError;
use lode_ast::*;
use lode_diagnostics::Span;
use lode_lexer::{Lexer, Token, TokenSpan};

mod expressions;
mod items;
mod statements;
mod types;

pub struct Parser {
    pub(crate) tokens: Vec<TokenSpan>,
    pub(crate) current: usize,
    pub(crate) file: String,
    /// End offset of the lexed region, for end-of-file spans.
    pub(crate) end: usize,
}

impl Parser {
    pub fn new(file: &str, source: &str) -> Result<Self, ParseError> {
        Self::fragment(file, source, 0)
    }

    /// Parse a fragment that begins at byte `offset` of its file
    /// (template-literal interpolations re-enter the parser this way).
    pub fn fragment(file: &str, source: &str, offset: usize) -> Result<Self, ParseError> {
        let lexer = Lexer::with_offset(source, offset);
        let tokens: Result<Vec<_>, _> = lexer.collect();
        let tokens = tokens.map_err(|e| match e {
            lode_lexer::LexError::InvalidToken { span } => ParseError::LexerError {
                start: span.start,
                end: span.end,
            },
        })?;

        Ok(Self {
            tokens,
            current: 0,
            file: file.to_string(),
            end: offset + source.len(),
        })
    }

    pub fn parse_module(&mut self) -> Result<Module, ParseError> {
        let mut imports = Vec::new();
        let mut items = Vec::new();

        while !self.is_at_end() {
            if self.check(&Token::Import) {
                imports.push(self.parse_import()?);
            } else {
                items.push(self.parse_item()?);
            }
        }

        Ok(Module {
            file: self.file.clone(),
            imports,
            items,
        })
    }

    // ==================== Cursor helpers ====================

    pub(crate) fn match_token(&mut self, kind: &Token) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn check(&self, kind: &Token) -> bool {
        if self.is_at_end() {
            false
        } else {
            std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
        }
    }

    pub(crate) fn check_next(&self, kind: &Token) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(ts) => std::mem::discriminant(&ts.token) == std::mem::discriminant(kind),
            None => false,
        }
    }

    pub(crate) fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    pub(crate) fn peek(&self) -> &Token {
        &self.tokens[self.current].token
    }

    pub(crate) fn previous(&self) -> &Token {
        &self.tokens[self.current - 1].token
    }

    pub(crate) fn consume(&mut self, kind: &Token, message: &str) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(message))
        }
    }

    /// Consume `>` in type position, splitting a `>>` token when generics
    /// nest (`Vec<Vec<i32>>`).
    pub(crate) fn consume_type_gt(&mut self) -> Result<(), ParseError> {
        if self.check(&Token::Gt) {
            self.advance();
            Ok(())
        } else if self.check(&Token::Shr) {
            let span = self.tokens[self.current].span.clone();
            self.tokens[self.current] = TokenSpan {
                token: Token::Gt,
                span: span.start + 1..span.end,
            };
            Ok(())
        } else {
            Err(self.error("Expected '>' after type arguments"))
        }
    }

    pub(crate) fn consume_identifier(&mut self, message: &str) -> Result<String, ParseError> {
        match self.ident_like() {
            Some(name) => {
                self.advance();
                Ok(name)
            }
            None => Err(self.error(message)),
        }
    }

    /// Identifier, or one of the keywords usable as a member/field name.
    pub(crate) fn ident_like(&self) -> Option<String> {
        if self.is_at_end() {
            return None;
        }
        match self.peek() {
            Token::Ident(name) => Some(name.clone()),
            Token::From => Some("from".to_string()),
            Token::Of => Some("of".to_string()),
            Token::In => Some("in".to_string()),
            Token::Type => Some("type".to_string()),
            Token::New => Some("new".to_string()),
            Token::Default => Some("default".to_string()),
            _ => None,
        }
    }

    // ==================== Span helpers ====================

    /// Byte offset the next token starts at.
    pub(crate) fn cur_start(&self) -> usize {
        self.tokens
            .get(self.current)
            .map_or(self.end, |ts| ts.span.start)
    }

    /// Byte offset the previous token ended at.
    pub(crate) fn prev_end(&self) -> usize {
        if self.current == 0 {
            0
        } else {
            self.tokens[self.current - 1].span.end
        }
    }

    pub(crate) fn span_from(&self, start: usize) -> Span {
        Span::new(self.file.as_str(), start, self.prev_end())
    }

    pub(crate) fn cur_span(&self) -> Span {
        let range = self
            .tokens
            .get(self.current)
            .map_or(self.end..self.end, |ts| ts.span.clone());
        Span::new(self.file.as_str(), range.start, range.end)
    }

    pub(crate) fn error(&self, message: &str) -> ParseError {
        let range = self
            .tokens
            .get(self.current)
            .map_or(self.end..self.end, |ts| ts.span.clone());
        ParseError::SyntaxError {
            start: range.start,
            end: range.end,
            message: message.to_string(),
        }
    }

    // ==================== Shared productions ====================

    pub(crate) fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::LBrace, "Expected '{'")?;
        let mut stmts = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            stmts.push(self.parse_statement()?);
        }

        self.consume(&Token::RBrace, "Expected '}'")?;

        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    /// Generic type parameters: `<T>`, `<T extends Display>`,
    /// `<T extends A & B = C>`
    pub(crate) fn parse_type_params(&mut self) -> Result<Vec<TypeParam>, ParseError> {
        if !self.match_token(&Token::Lt) {
            return Ok(Vec::new());
        }

        let mut params = Vec::new();
        loop {
            let start = self.cur_start();
            let name = self.consume_identifier("Expected type parameter name")?;

            let constraint = if self.match_token(&Token::Extends) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.match_token(&Token::Eq) {
                Some(self.parse_type()?)
            } else {
                None
            };

            params.push(TypeParam {
                name,
                constraint,
                default,
                span: self.span_from(start),
            });

            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume_type_gt()?;
        Ok(params)
    }

    /// Function/arrow/constructor parameter list, after the opening paren.
    pub(crate) fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if self.check(&Token::RParen) {
            return Ok(params);
        }

        loop {
            params.push(self.parse_param()?);
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let start = self.cur_start();

        let pattern = if self.check(&Token::LBrace) || self.check(&Token::LBracket) {
            self.skip_balanced()?;
            ParamPattern::Destructured
        } else if self.match_token(&Token::This) {
            ParamPattern::Ident("this".to_string())
        } else {
            ParamPattern::Ident(self.consume_identifier("Expected parameter name")?)
        };

        let optional = self.match_token(&Token::Question);
        let ty = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let default = if self.match_token(&Token::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(Param {
            pattern,
            ty,
            optional,
            default,
            span: self.span_from(start),
        })
    }

    /// Skip one balanced `{...}` or `[...]` group (destructuring patterns
    /// are only carried far enough to be rejected with a span).
    pub(crate) fn skip_balanced(&mut self) -> Result<(), ParseError> {
        let open = self.peek().clone();
        let close = match open {
            Token::LBrace => Token::RBrace,
            Token::LBracket => Token::RBracket,
            Token::LParen => Token::RParen,
            _ => return Err(self.error("Expected an opening bracket")),
        };
        self.advance();

        let mut depth = 1usize;
        while depth > 0 {
            if self.is_at_end() {
                return Err(self.error("Unbalanced brackets"));
            }
            if self.check(&open) {
                depth += 1;
            } else if self.check(&close) {
                depth -= 1;
            }
            self.advance();
        }
        Ok(())
    }

    /// Optional statement-terminating semicolon.
    pub(crate) fn eat_semicolon(&mut self) {
        self.match_token(&Token::Semicolon);
    }
}
