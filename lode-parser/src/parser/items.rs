// Top-level item parsing: imports, exports, functions, classes,
// interfaces, type aliases. Everything else falls through to statement
// parsing so the lowering can reject it with a catalog code and a span.

use crate::ParseError;
use lode_ast::*;
use lode_lexer::Token;

use super::Parser;

impl Parser {
    pub(crate) fn parse_import(&mut self) -> Result<Import, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::Import, "Expected 'import'")?;

        // `import "m";` side-effect form
        if let Token::StringLiteral(spec) | Token::SingleQuoteString(spec) = self.peek() {
            let specifier = spec.clone();
            self.advance();
            self.eat_semicolon();
            return Ok(Import {
                clause: ImportClause::SideEffect,
                specifier,
                span: self.span_from(start),
            });
        }

        let clause = if self.match_token(&Token::Star) {
            self.consume(&Token::As, "Expected 'as' after '*'")?;
            let alias = self.consume_identifier("Expected namespace alias")?;
            ImportClause::Namespace(alias)
        } else if self.check(&Token::LBrace) {
            ImportClause::Named(self.parse_named_bindings()?)
        } else {
            let name = self.consume_identifier("Expected import binding")?;
            ImportClause::Default(name)
        };

        self.consume(&Token::From, "Expected 'from' in import")?;
        let specifier = match self.peek() {
            Token::StringLiteral(s) | Token::SingleQuoteString(s) => {
                let s = s.clone();
                self.advance();
                s
            }
            _ => return Err(self.error("Expected module specifier string")),
        };
        self.eat_semicolon();

        Ok(Import {
            clause,
            specifier,
            span: self.span_from(start),
        })
    }

    fn parse_named_bindings(&mut self) -> Result<Vec<ImportBinding>, ParseError> {
        self.consume(&Token::LBrace, "Expected '{'")?;
        let mut bindings = Vec::new();

        while !self.check(&Token::RBrace) {
            let start = self.cur_start();
            let name = self.consume_identifier("Expected import name")?;
            let alias = if self.match_token(&Token::As) {
                Some(self.consume_identifier("Expected alias after 'as'")?)
            } else {
                None
            };
            bindings.push(ImportBinding {
                name,
                alias,
                span: self.span_from(start),
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }

        self.consume(&Token::RBrace, "Expected '}' after import bindings")?;
        Ok(bindings)
    }

    pub(crate) fn parse_item(&mut self) -> Result<Item, ParseError> {
        if self.check(&Token::Export) {
            return self.parse_export();
        }
        self.parse_unexported_item(false)
    }

    fn parse_export(&mut self) -> Result<Item, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::Export, "Expected 'export'")?;

        // `export {}` marker and `export { a, b }` barrels
        if self.check(&Token::LBrace) {
            self.advance();
            let mut names = Vec::new();
            while !self.check(&Token::RBrace) {
                names.push(self.consume_identifier("Expected export name")?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.consume(&Token::RBrace, "Expected '}' after export list")?;
            self.eat_semicolon();
            let span = self.span_from(start);
            return Ok(if names.is_empty() {
                Item::ExportMarker { span }
            } else {
                Item::ExportNamed { names, span }
            });
        }

        self.parse_unexported_item(true)
    }

    fn parse_unexported_item(&mut self, is_exported: bool) -> Result<Item, ParseError> {
        let start = self.cur_start();
        if self.check(&Token::Async) && self.check_next(&Token::Function) {
            self.advance();
            self.advance();
            let mut func = self.parse_function(is_exported, start)?;
            func.is_async = true;
            return Ok(Item::Function(func));
        }
        if self.match_token(&Token::Function) {
            return Ok(Item::Function(self.parse_function(is_exported, start)?));
        }
        if self.check(&Token::Class) {
            return Ok(Item::Class(self.parse_class(is_exported)?));
        }
        if self.check(&Token::Interface) {
            return Ok(Item::Interface(self.parse_interface(is_exported)?));
        }
        // `type` is also a valid identifier; only treat it as an alias
        // declaration when followed by a name.
        if self.check(&Token::Type) && self.next_is_ident_like() {
            return Ok(Item::TypeAlias(self.parse_type_alias(is_exported)?));
        }

        Ok(Item::Statement(self.parse_statement()?))
    }

    fn next_is_ident_like(&self) -> bool {
        matches!(
            self.tokens.get(self.current + 1).map(|ts| &ts.token),
            Some(Token::Ident(_))
        )
    }

    /// Function declaration, after the `function` keyword. `start` is the
    /// byte offset of the declaration's first token (`function`, `async`,
    /// or the preceding `export`).
    pub(crate) fn parse_function(
        &mut self,
        is_exported: bool,
        start: usize,
    ) -> Result<Function, ParseError> {
        let name = self.ident_like().map(|name| {
            self.advance();
            name
        });

        let type_params = self.parse_type_params()?;
        self.consume(&Token::LParen, "Expected '(' after function name")?;
        let params = self.parse_params()?;
        self.consume(&Token::RParen, "Expected ')' after parameters")?;

        let return_type = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.check(&Token::LBrace) {
            Some(self.parse_block()?)
        } else {
            self.eat_semicolon();
            None
        };

        Ok(Function {
            name,
            is_async: false,
            is_exported,
            type_params,
            params,
            return_type,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_class(&mut self, is_exported: bool) -> Result<Class, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::Class, "Expected 'class'")?;

        let name = self.ident_like().map(|name| {
            self.advance();
            name
        });

        let mut implements = Vec::new();
        if self.match_token(&Token::Implements) {
            loop {
                implements.push(self.consume_identifier("Expected interface name")?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        self.consume(&Token::LBrace, "Expected '{' before class body")?;

        let mut fields = Vec::new();
        let mut constructor = None;
        let mut methods = Vec::new();

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.check(&Token::Constructor) {
                constructor = Some(self.parse_constructor()?);
                continue;
            }

            let member_start = self.cur_start();
            let is_static = self.match_token(&Token::Static);
            let is_async = self.match_token(&Token::Async);
            self.match_token(&Token::Readonly);

            let name = self.consume_identifier("Expected class member name")?;

            if self.check(&Token::LParen) || self.check(&Token::Lt) {
                // Method
                let type_params = self.parse_type_params()?;
                self.consume(&Token::LParen, "Expected '(' after method name")?;
                let params = self.parse_params()?;
                self.consume(&Token::RParen, "Expected ')' after parameters")?;
                let return_type = if self.match_token(&Token::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let body = Some(self.parse_block()?);
                let span = self.span_from(member_start);
                methods.push(Method {
                    is_static,
                    function: Function {
                        name: Some(name),
                        is_async,
                        is_exported: false,
                        type_params,
                        params,
                        return_type,
                        body,
                        span: span.clone(),
                    },
                    span,
                });
            } else {
                // Field
                let optional = self.match_token(&Token::Question);
                let ty = if self.match_token(&Token::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                self.eat_semicolon();
                fields.push(ClassField {
                    name,
                    ty,
                    optional,
                    span: self.span_from(member_start),
                });
            }
        }

        self.consume(&Token::RBrace, "Expected '}' after class body")?;

        Ok(Class {
            name,
            is_exported,
            implements,
            fields,
            constructor,
            methods,
            span: self.span_from(start),
        })
    }

    fn parse_constructor(&mut self) -> Result<Constructor, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::Constructor, "Expected 'constructor'")?;
        self.consume(&Token::LParen, "Expected '(' after 'constructor'")?;
        let params = self.parse_params()?;
        self.consume(&Token::RParen, "Expected ')' after parameters")?;
        let body = self.parse_block()?;

        Ok(Constructor {
            params,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_interface(&mut self, is_exported: bool) -> Result<Interface, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::Interface, "Expected 'interface'")?;
        let name = self.consume_identifier("Expected interface name")?;
        let type_params = self.parse_type_params()?;

        let mut extends = Vec::new();
        if self.match_token(&Token::Extends) {
            loop {
                extends.push(self.consume_identifier("Expected supertrait name")?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }

        self.consume(&Token::LBrace, "Expected '{' before interface body")?;

        let mut members = Vec::new();
        while !self.check(&Token::RBrace) && !self.is_at_end() {
            let member_start = self.cur_start();
            let name = self.consume_identifier("Expected interface member name")?;
            let optional = self.match_token(&Token::Question);

            if self.check(&Token::LParen) {
                self.advance();
                let params = self.parse_params()?;
                self.consume(&Token::RParen, "Expected ')' after parameters")?;
                let return_type = if self.match_token(&Token::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                self.eat_semicolon();
                members.push(InterfaceMember::Method {
                    name,
                    optional,
                    params,
                    return_type,
                    span: self.span_from(member_start),
                });
            } else {
                let ty = if self.match_token(&Token::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                self.eat_semicolon();
                members.push(InterfaceMember::Property {
                    name,
                    optional,
                    ty,
                    span: self.span_from(member_start),
                });
            }
        }

        self.consume(&Token::RBrace, "Expected '}' after interface body")?;

        Ok(Interface {
            name,
            is_exported,
            type_params,
            extends,
            members,
            span: self.span_from(start),
        })
    }

    fn parse_type_alias(&mut self, is_exported: bool) -> Result<TypeAlias, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::Type, "Expected 'type'")?;
        let name = self.consume_identifier("Expected alias name")?;
        let type_params = self.parse_type_params()?;
        self.consume(&Token::Eq, "Expected '=' in type alias")?;
        let body = self.parse_type()?;
        self.eat_semicolon();

        Ok(TypeAlias {
            name,
            is_exported,
            type_params,
            body,
            span: self.span_from(start),
        })
    }
}
