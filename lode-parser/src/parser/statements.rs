// Statement parsing.

use crate::ParseError;
use lode_ast::*;
use lode_lexer::Token;

use super::Parser;

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        if self.check(&Token::Const) || self.check(&Token::Let) || self.check(&Token::Var) {
            let decl = self.parse_var_decl()?;
            self.eat_semicolon();
            return Ok(Stmt::VarDecl(decl));
        }

        if self.check(&Token::Return) {
            let start = self.cur_start();
            self.advance();
            let value = if self.check(&Token::Semicolon) || self.check(&Token::RBrace) {
                None
            } else {
                Some(self.parse_expression()?)
            };
            self.eat_semicolon();
            return Ok(Stmt::Return {
                value,
                span: self.span_from(start),
            });
        }

        if self.check(&Token::If) {
            return self.parse_if();
        }

        if self.check(&Token::While) {
            let start = self.cur_start();
            self.advance();
            self.consume(&Token::LParen, "Expected '(' after 'while'")?;
            let cond = self.parse_expression()?;
            self.consume(&Token::RParen, "Expected ')' after condition")?;
            let body = self.parse_block()?;
            return Ok(Stmt::While {
                cond,
                body,
                span: self.span_from(start),
            });
        }

        if self.check(&Token::For) {
            return self.parse_for();
        }

        if self.check(&Token::Switch) {
            return self.parse_switch();
        }

        if self.check(&Token::Break) {
            let start = self.cur_start();
            self.advance();
            self.eat_semicolon();
            return Ok(Stmt::Break {
                span: self.span_from(start),
            });
        }

        if self.check(&Token::Continue) {
            let start = self.cur_start();
            self.advance();
            self.eat_semicolon();
            return Ok(Stmt::Continue {
                span: self.span_from(start),
            });
        }

        if self.check(&Token::LBrace) {
            return Ok(Stmt::Block(self.parse_block()?));
        }

        let start = self.cur_start();
        let expr = self.parse_expression()?;
        self.eat_semicolon();
        Ok(Stmt::Expr {
            expr,
            span: self.span_from(start),
        })
    }

    fn parse_var_decl(&mut self) -> Result<VarDecl, ParseError> {
        let start = self.cur_start();
        let kind = match self.peek() {
            Token::Const => VarKind::Const,
            Token::Let => VarKind::Let,
            Token::Var => VarKind::Var,
            _ => return Err(self.error("Expected variable declaration")),
        };
        self.advance();

        let name = self.consume_identifier("Expected variable name")?;
        let ty = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.match_token(&Token::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        Ok(VarDecl {
            kind,
            name,
            ty,
            init,
            span: self.span_from(start),
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::If, "Expected 'if'")?;
        self.consume(&Token::LParen, "Expected '(' after 'if'")?;
        let cond = self.parse_expression()?;
        self.consume(&Token::RParen, "Expected ')' after condition")?;
        let then_block = self.parse_block()?;

        let else_branch = if self.match_token(&Token::Else) {
            if self.check(&Token::If) {
                Some(Box::new(ElseBranch::ElseIf(self.parse_if()?)))
            } else {
                Some(Box::new(ElseBranch::Else(self.parse_block()?)))
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_block,
            else_branch,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::For, "Expected 'for'")?;
        self.consume(&Token::LParen, "Expected '(' after 'for'")?;

        // `for (<kind> name of iterable)` is a distinct form; detect it
        // before committing to the classic header.
        if self.check(&Token::Const) || self.check(&Token::Let) || self.check(&Token::Var) {
            let kind = match self.peek() {
                Token::Const => VarKind::Const,
                Token::Var => VarKind::Var,
                _ => VarKind::Let,
            };
            if self.of_follows_binding() {
                self.advance();
                let binding = self.consume_identifier("Expected loop binding")?;
                self.consume(&Token::Of, "Expected 'of'")?;
                let iterable = self.parse_expression()?;
                self.consume(&Token::RParen, "Expected ')' after loop header")?;
                let body = self.parse_block()?;
                return Ok(Stmt::ForOf(ForOfStmt {
                    decl_kind: kind,
                    binding,
                    iterable,
                    body,
                    span: self.span_from(start),
                }));
            }
        }

        let init = if self.match_token(&Token::Semicolon) {
            None
        } else if self.check(&Token::Const) || self.check(&Token::Let) || self.check(&Token::Var)
        {
            let decl = self.parse_var_decl()?;
            self.consume(&Token::Semicolon, "Expected ';' after loop initializer")?;
            Some(Box::new(Stmt::VarDecl(decl)))
        } else {
            let expr_start = self.cur_start();
            let expr = self.parse_expression()?;
            self.consume(&Token::Semicolon, "Expected ';' after loop initializer")?;
            Some(Box::new(Stmt::Expr {
                expr,
                span: self.span_from(expr_start),
            }))
        };

        let cond = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&Token::Semicolon, "Expected ';' after loop condition")?;

        let update = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&Token::RParen, "Expected ')' after loop header")?;
        let body = self.parse_block()?;

        Ok(Stmt::For(ForStmt {
            init,
            cond,
            update,
            body,
            span: self.span_from(start),
        }))
    }

    /// At a `const`/`let`/`var` inside a `for (` header: does `of` follow
    /// the binding name?
    fn of_follows_binding(&self) -> bool {
        matches!(
            (
                self.tokens.get(self.current + 1).map(|ts| &ts.token),
                self.tokens.get(self.current + 2).map(|ts| &ts.token),
            ),
            (Some(Token::Ident(_)), Some(Token::Of))
        )
    }

    fn parse_switch(&mut self) -> Result<Stmt, ParseError> {
        let start = self.cur_start();
        self.consume(&Token::Switch, "Expected 'switch'")?;
        self.consume(&Token::LParen, "Expected '(' after 'switch'")?;
        let scrutinee = self.parse_expression()?;
        self.consume(&Token::RParen, "Expected ')' after scrutinee")?;
        self.consume(&Token::LBrace, "Expected '{' before switch body")?;

        let mut cases = Vec::new();
        let mut default = None;

        while !self.check(&Token::RBrace) && !self.is_at_end() {
            if self.check(&Token::Case) {
                let case_start = self.cur_start();
                self.advance();
                let label = self.parse_expression()?;
                self.consume(&Token::Colon, "Expected ':' after case label")?;
                let body = self.parse_case_body()?;
                cases.push(SwitchCase {
                    label,
                    body,
                    span: self.span_from(case_start),
                });
            } else if self.check(&Token::Default) {
                let default_start = self.cur_start();
                self.advance();
                self.consume(&Token::Colon, "Expected ':' after 'default'")?;
                let body = self.parse_case_body()?;
                default = Some(SwitchDefault {
                    body,
                    span: self.span_from(default_start),
                });
            } else {
                return Err(self.error("Expected 'case' or 'default' in switch body"));
            }
        }

        self.consume(&Token::RBrace, "Expected '}' after switch body")?;

        Ok(Stmt::Switch(SwitchStmt {
            scrutinee,
            cases,
            default,
            span: self.span_from(start),
        }))
    }

    fn parse_case_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.check(&Token::Case)
            && !self.check(&Token::Default)
            && !self.check(&Token::RBrace)
            && !self.is_at_end()
        {
            stmts.push(self.parse_statement()?);
        }
        Ok(stmts)
    }
}
